//! Core narrative data model.
//!
//! A `Story` flows into the pipeline and comes out the other end as a list
//! of `PromptSegment`s ready for an external video-generation service.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Raw narrative input to a pipeline run.
///
/// Immutable once a run starts; stages read it but never rewrite it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    /// The raw narrative text
    pub text: String,

    /// Optional title
    pub title: Option<String>,

    /// Target total duration in seconds (if the caller has one)
    pub target_duration: Option<f64>,
}

impl Story {
    /// Create a story from raw text
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            title: None,
            target_duration: None,
        }
    }

    /// Attach a title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// True if the text is empty or whitespace-only
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// One scene-level unit of the story.
///
/// Produced by the segmentation stage. Later stages rewrite specific fields
/// (rewording rewrites `content`, taxonomy fills `shot_type`/`tags`) but must
/// preserve `index` and every field that is not their documented output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Position in the story (0-based, contiguous, unique)
    pub index: usize,

    /// Estimated on-screen duration in seconds
    pub duration: f64,

    /// Scene text
    pub content: String,

    /// Character names, in order of appearance
    pub characters: Vec<String>,

    /// Scene setting description
    pub setting: String,

    /// Primary action in the scene
    pub action: String,

    /// Notes carried between segments for continuity
    pub continuity_notes: String,

    /// Physical location
    pub location: String,

    /// Props visible in the scene
    pub props: BTreeSet<String>,

    /// Emotional tone
    pub tone: String,

    /// Shot type assigned by the taxonomy stage
    pub shot_type: Option<ShotType>,

    /// Cinematic tags assigned by the taxonomy stage
    pub tags: Vec<String>,
}

impl Segment {
    /// Create a bare segment with just position, duration and content
    pub fn new(index: usize, duration: f64, content: impl Into<String>) -> Self {
        Self {
            index,
            duration,
            content: content.into(),
            characters: Vec::new(),
            setting: String::new(),
            action: String::new(),
            continuity_notes: String::new(),
            location: String::new(),
            props: BTreeSet::new(),
            tone: String::new(),
            shot_type: None,
            tags: Vec::new(),
        }
    }
}

/// Shot types the taxonomy stage can assign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShotType {
    /// Opening scene-setting shot
    Establishing,

    /// Wide framing of the whole scene
    Wide,

    /// Standard medium framing
    Medium,

    /// Close framing on a face or object
    CloseUp,

    /// Camera follows movement
    Tracking,
}

impl ShotType {
    /// Human-readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Establishing => "establishing shot",
            Self::Wide => "wide shot",
            Self::Medium => "medium shot",
            Self::CloseUp => "close-up",
            Self::Tracking => "tracking shot",
        }
    }
}

/// Story-level analysis, derivable directly from the raw text.
///
/// Independent of segmentation; the two stages may run concurrently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryAnalysis {
    /// Detected genre (never empty on success)
    pub genre: String,

    /// Target audience description
    pub target_audience: String,

    /// Detected themes
    pub themes: Vec<String>,
}

/// A detected inconsistency across segments.
///
/// Informational data attached to a successful run, never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuityIssue {
    /// Segments the issue spans
    pub segment_indices: Vec<usize>,

    /// What was detected
    pub description: String,

    /// How much it matters
    pub severity: Severity,
}

/// Severity of a continuity issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Terminal, normalized projection of a segment for the external
/// video-generation collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptSegment {
    pub index: usize,
    pub duration: f64,
    pub content: String,
    pub characters: Vec<String>,
    pub setting: String,
    pub action: String,
    pub continuity_notes: String,
    pub location: String,
    pub props: BTreeSet<String>,
    pub tone: String,
}

impl From<&Segment> for PromptSegment {
    fn from(seg: &Segment) -> Self {
        Self {
            index: seg.index,
            duration: seg.duration,
            content: seg.content.clone(),
            characters: seg.characters.clone(),
            setting: seg.setting.clone(),
            action: seg.action.clone(),
            continuity_notes: seg.continuity_notes.clone(),
            location: seg.location.clone(),
            props: seg.props.clone(),
            tone: seg.tone.clone(),
        }
    }
}

/// Reference to an asset produced by the video-generation backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRef {
    /// Segment this asset renders
    pub segment_index: usize,

    /// Backend-assigned asset identifier
    pub asset_id: String,

    /// Clip duration in seconds
    pub duration: f64,
}
