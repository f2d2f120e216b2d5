//! Per-run pipeline configuration.
//!
//! Settings are defined in YAML (or built programmatically) and consist of
//! per-stage enable flags plus scalar parameters for the stages that take
//! them. Defaults stop at prompt generation: the video stages are off unless
//! explicitly enabled.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::stage::StageKind;

/// Configuration for a single pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSettings {
    /// Break the story into segments
    #[serde(default = "default_true")]
    pub segmentation: bool,

    /// Analyze narrative structure and themes
    #[serde(default = "default_true")]
    pub story_analysis: bool,

    /// Rewrite segment text for narration
    #[serde(default)]
    pub rewording: bool,

    /// Add cinematic metadata and shot types
    #[serde(default = "default_true")]
    pub taxonomy: bool,

    /// Validate visual and narrative continuity
    #[serde(default = "default_true")]
    pub continuity: bool,

    /// Invoke the external video-generation backend
    #[serde(default)]
    pub video_generation: bool,

    /// Assemble generated clips into one artifact
    #[serde(default)]
    pub video_assembly: bool,

    /// Apply post-processing effects
    #[serde(default)]
    pub video_effects: bool,

    /// Target total duration in seconds
    #[serde(default = "default_target_duration")]
    pub target_duration: f64,

    /// Style used by the rewording stage
    #[serde(default)]
    pub rewording_style: RewordingStyle,

    /// Parameters for the video stages
    #[serde(default)]
    pub video: VideoSettings,
}

fn default_true() -> bool {
    true
}

fn default_target_duration() -> f64 {
    120.0
}

impl Default for ModuleSettings {
    fn default() -> Self {
        Self {
            segmentation: true,
            story_analysis: true,
            rewording: false,
            taxonomy: true,
            continuity: true,
            video_generation: false,
            video_assembly: false,
            video_effects: false,
            target_duration: default_target_duration(),
            rewording_style: RewordingStyle::default(),
            video: VideoSettings::default(),
        }
    }
}

impl ModuleSettings {
    /// Load settings from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse settings from YAML content
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse settings YAML")
    }

    /// Whether a given stage is enabled
    pub fn enabled(&self, kind: StageKind) -> bool {
        match kind {
            StageKind::Segmentation => self.segmentation,
            StageKind::StoryAnalysis => self.story_analysis,
            StageKind::Rewording => self.rewording,
            StageKind::Taxonomy => self.taxonomy,
            StageKind::Continuity => self.continuity,
            StageKind::VideoGeneration => self.video_generation,
            StageKind::VideoAssembly => self.video_assembly,
            StageKind::VideoEffects => self.video_effects,
        }
    }

    /// Toggle a single stage
    pub fn set_enabled(&mut self, kind: StageKind, on: bool) {
        match kind {
            StageKind::Segmentation => self.segmentation = on,
            StageKind::StoryAnalysis => self.story_analysis = on,
            StageKind::Rewording => self.rewording = on,
            StageKind::Taxonomy => self.taxonomy = on,
            StageKind::Continuity => self.continuity = on,
            StageKind::VideoGeneration => self.video_generation = on,
            StageKind::VideoAssembly => self.video_assembly = on,
            StageKind::VideoEffects => self.video_effects = on,
        }
    }

    /// Stages enabled for this run, in pipeline order
    pub fn enabled_stages(&self) -> Vec<StageKind> {
        StageKind::ORDER
            .iter()
            .copied()
            .filter(|k| self.enabled(*k))
            .collect()
    }

    /// Number of enabled stages
    pub fn enabled_count(&self) -> usize {
        self.enabled_stages().len()
    }

    /// Settings with every stage disabled (build up from here in tests)
    pub fn none_enabled() -> Self {
        Self {
            segmentation: false,
            story_analysis: false,
            taxonomy: false,
            continuity: false,
            ..Self::default()
        }
    }
}

/// Styles the rewording stage can apply
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewordingStyle {
    /// Replace archaic English with modern phrasing
    #[default]
    ModernizeOldEnglish,

    /// Present-tense visual phrasing for shot descriptions
    Cinematic,

    /// Shorter sentences, simpler vocabulary
    Simplify,

    /// Spoken-narration phrasing
    Narration,
}

impl RewordingStyle {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::ModernizeOldEnglish => "modernize old English",
            Self::Cinematic => "cinematic",
            Self::Simplify => "simplify",
            Self::Narration => "narration",
        }
    }
}

/// Output resolution for generated clips
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoResolution {
    #[default]
    Sd480,
    Hd720,
    Hd1080,
}

impl VideoResolution {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Sd480 => "480p",
            Self::Hd720 => "720p",
            Self::Hd1080 => "1080p",
        }
    }

    fn cost_multiplier(&self) -> f64 {
        match self {
            Self::Sd480 => 1.0,
            Self::Hd720 => 1.5,
            Self::Hd1080 => 2.5,
        }
    }
}

/// Backend processing mode for generated clips
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    /// Faster, cheaper generation
    #[default]
    Standard,

    /// Slower, higher-fidelity generation
    Enhanced,
}

impl ProcessingMode {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Enhanced => "enhanced",
        }
    }

    fn cost_multiplier(&self) -> f64 {
        match self {
            Self::Standard => 1.0,
            Self::Enhanced => 2.0,
        }
    }
}

/// The backend accepts clip durations in this range (seconds)
pub const CLIP_DURATION_RANGE: std::ops::RangeInclusive<u32> = 3..=20;

/// Parameters passed to the external video-generation backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSettings {
    /// Per-clip duration in seconds (3-20)
    #[serde(default = "default_clip_duration")]
    pub duration_seconds: u32,

    /// Output resolution
    #[serde(default)]
    pub resolution: VideoResolution,

    /// Processing mode
    #[serde(default)]
    pub processing_mode: ProcessingMode,

    /// API credential reference (env var name or key id, never the secret)
    #[serde(default)]
    pub api_key_ref: Option<String>,
}

fn default_clip_duration() -> u32 {
    5
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            duration_seconds: default_clip_duration(),
            resolution: VideoResolution::default(),
            processing_mode: ProcessingMode::default(),
            api_key_ref: None,
        }
    }
}

impl VideoSettings {
    /// Estimated cost per generated clip in USD
    pub fn estimated_cost_per_clip(&self) -> f64 {
        let base = 0.05 * self.duration_seconds as f64;
        base * self.resolution.cost_multiplier() * self.processing_mode.cost_multiplier()
    }
}
