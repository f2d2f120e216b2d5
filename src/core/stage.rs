//! Fixed stage order and dependency table.
//!
//! The pipeline order is static; optional stages are skipped per
//! `ModuleSettings`, never reordered. Dependencies are declared here as
//! data so the orchestrator can verify them without inspecting concrete
//! stage types.

use serde::{Deserialize, Serialize};

/// Identity of a pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Segmentation,
    StoryAnalysis,
    Rewording,
    Taxonomy,
    Continuity,
    VideoGeneration,
    VideoAssembly,
    VideoEffects,
}

impl StageKind {
    /// The fixed pipeline order
    pub const ORDER: [StageKind; 8] = [
        StageKind::Segmentation,
        StageKind::StoryAnalysis,
        StageKind::Rewording,
        StageKind::Taxonomy,
        StageKind::Continuity,
        StageKind::VideoGeneration,
        StageKind::VideoAssembly,
        StageKind::VideoEffects,
    ];

    /// Stage whose output must be present and non-empty before this stage runs.
    ///
    /// `None` means the stage reads the story directly. Rewording, taxonomy
    /// and continuity all consume the segment list, so their declared
    /// dependency is segmentation regardless of which optional stage last
    /// rewrote it. Video generation consumes the segment list as finalized
    /// prompts; assembly and effects chain off the previous video stage.
    pub fn requires(&self) -> Option<StageKind> {
        match self {
            Self::Segmentation | Self::StoryAnalysis => None,
            Self::Rewording | Self::Taxonomy | Self::Continuity => Some(Self::Segmentation),
            Self::VideoGeneration => Some(Self::Segmentation),
            Self::VideoAssembly => Some(Self::VideoGeneration),
            Self::VideoEffects => Some(Self::VideoAssembly),
        }
    }

    /// Segmentation and story analysis have no mutual dependency and may be
    /// scheduled as a fork-join pair.
    pub fn is_independent(&self) -> bool {
        matches!(self, Self::Segmentation | Self::StoryAnalysis)
    }

    /// Snake-case identifier used in telemetry metadata and checkpoints
    pub fn id(&self) -> &'static str {
        match self {
            Self::Segmentation => "segmentation",
            Self::StoryAnalysis => "story_analysis",
            Self::Rewording => "rewording",
            Self::Taxonomy => "taxonomy",
            Self::Continuity => "continuity",
            Self::VideoGeneration => "video_generation",
            Self::VideoAssembly => "video_assembly",
            Self::VideoEffects => "video_effects",
        }
    }

    /// Human-readable name used in live results and the CLI
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Segmentation => "Story Segmentation",
            Self::StoryAnalysis => "Story Analysis",
            Self::Rewording => "Text Rewording",
            Self::Taxonomy => "Cinematic Enrichment",
            Self::Continuity => "Continuity Validation",
            Self::VideoGeneration => "Video Generation",
            Self::VideoAssembly => "Video Assembly",
            Self::VideoEffects => "Video Effects",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_is_contiguous_and_complete() {
        assert_eq!(StageKind::ORDER.len(), 8);
        assert_eq!(StageKind::ORDER[0], StageKind::Segmentation);
        assert_eq!(StageKind::ORDER[7], StageKind::VideoEffects);
    }

    #[test]
    fn test_dependencies_point_backward() {
        for (idx, kind) in StageKind::ORDER.iter().enumerate() {
            if let Some(dep) = kind.requires() {
                let dep_idx = StageKind::ORDER.iter().position(|k| *k == dep).unwrap();
                assert!(dep_idx < idx, "{} depends on later stage {}", kind, dep);
            }
        }
    }

    #[test]
    fn test_independent_pair() {
        assert!(StageKind::Segmentation.is_independent());
        assert!(StageKind::StoryAnalysis.is_independent());
        assert!(!StageKind::Rewording.is_independent());
    }
}
