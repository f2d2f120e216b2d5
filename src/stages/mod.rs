//! Stage modules and the capability contract they implement.
//!
//! The orchestrator treats every stage polymorphically through
//! [`StageModule`] and never inspects concrete stage types; adding a stage
//! means implementing the trait and extending the stage table, not touching
//! the orchestrator.

pub mod analysis;
pub mod continuity;
pub mod rewording;
pub mod segmentation;
pub mod taxonomy;
pub mod video;

use std::sync::Arc;

use async_trait::async_trait;

use crate::adapters::VideoService;
use crate::core::error::PipelineError;
use crate::core::stage::StageKind;
use crate::domain::{
    AssetRef, ContinuityIssue, ModuleSettings, PromptSegment, Segment, Story, StoryAnalysis,
};

pub use analysis::StoryAnalysisModule;
pub use continuity::ContinuityModule;
pub use rewording::RewordingModule;
pub use segmentation::SegmentationModule;
pub use taxonomy::TaxonomyModule;
pub use video::{VideoAssemblyModule, VideoEffectsModule, VideoGenerationModule};

/// Read view of accumulated session state passed to `execute`.
///
/// A stage sees the story, the run settings and every artifact produced by
/// prior stages; it cannot mutate any of them.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub story: Story,
    pub settings: ModuleSettings,
    pub segments: Vec<Segment>,
    pub analysis: Option<StoryAnalysis>,
    pub issues: Vec<ContinuityIssue>,
    pub assets: Vec<AssetRef>,
    pub artifact_path: Option<std::path::PathBuf>,
}

impl StageContext {
    /// Finalized prompt view of the current segment list
    pub fn prompts(&self) -> Vec<PromptSegment> {
        self.segments.iter().map(PromptSegment::from).collect()
    }
}

/// Output of one stage execution, merged into the session by the orchestrator
#[derive(Debug, Clone)]
pub enum StageOutput {
    /// A new segment list (segmentation, rewording, taxonomy)
    Segments(Vec<Segment>),

    /// Story-level analysis
    Analysis(StoryAnalysis),

    /// Continuity issues; the segment list is untouched
    Continuity(Vec<ContinuityIssue>),

    /// Asset references from video generation
    Assets(Vec<AssetRef>),

    /// Assembled or post-processed artifact
    Artifact(std::path::PathBuf),
}

impl StageOutput {
    /// Human-readable summary line for the live-results map
    pub fn summary(&self, kind: StageKind) -> String {
        match (kind, self) {
            (StageKind::Rewording, Self::Segments(segs)) => {
                format!("Reworded {} segments", segs.len())
            }
            (StageKind::Taxonomy, Self::Segments(segs)) => {
                format!("Enhanced {} segments with cinematic tags", segs.len())
            }
            (_, Self::Segments(segs)) => format!("Generated {} segments", segs.len()),
            (_, Self::Analysis(analysis)) => format!(
                "Genre: {}, Target: {}",
                analysis.genre, analysis.target_audience
            ),
            (_, Self::Continuity(issues)) => {
                format!("Found {} continuity issues", issues.len())
            }
            (_, Self::Assets(assets)) => format!("Generated {} video clips", assets.len()),
            (_, Self::Artifact(path)) => format!("Produced {}", path.display()),
        }
    }
}

/// Capability contract every pipeline stage implements
#[async_trait]
pub trait StageModule: Send + Sync {
    /// Which stage this module implements
    fn kind(&self) -> StageKind;

    /// Validate and store parameters from the run settings.
    ///
    /// Fails with `PipelineError::Configuration` on invalid values.
    fn configure(&mut self, settings: &ModuleSettings) -> Result<(), PipelineError>;

    /// Run the stage against accumulated session state
    async fn execute(&self, ctx: &StageContext) -> Result<StageOutput, PipelineError>;

    /// Whether the module has been successfully configured and is runnable
    fn is_complete(&self) -> bool;
}

/// Construct the module for a stage, injecting the video service where needed
pub fn build_module(kind: StageKind, video_service: &Arc<dyn VideoService>) -> Box<dyn StageModule> {
    match kind {
        StageKind::Segmentation => Box::new(SegmentationModule::new()),
        StageKind::StoryAnalysis => Box::new(StoryAnalysisModule::new()),
        StageKind::Rewording => Box::new(RewordingModule::new()),
        StageKind::Taxonomy => Box::new(TaxonomyModule::new()),
        StageKind::Continuity => Box::new(ContinuityModule::new()),
        StageKind::VideoGeneration => {
            Box::new(VideoGenerationModule::new(Arc::clone(video_service)))
        }
        StageKind::VideoAssembly => Box::new(VideoAssemblyModule::new(Arc::clone(video_service))),
        StageKind::VideoEffects => Box::new(VideoEffectsModule::new(Arc::clone(video_service))),
    }
}

#[cfg(test)]
pub(crate) fn test_context(story: &str) -> StageContext {
    StageContext {
        story: Story::new(story),
        settings: ModuleSettings::default(),
        segments: Vec::new(),
        analysis: None,
        issues: Vec::new(),
        assets: Vec::new(),
        artifact_path: None,
    }
}
