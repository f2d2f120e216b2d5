//! Domain types for the cineforge pipeline.
//!
//! This module contains the core data structures:
//! - Story/Segment/PromptSegment: the narrative as it moves through stages
//! - Session: run state, mutated only by the orchestrator
//! - ModuleSettings: per-run configuration

pub mod session;
pub mod settings;
pub mod story;

// Re-export commonly used types
pub use session::{LiveResult, Session, SessionState};
pub use settings::{
    ModuleSettings, ProcessingMode, RewordingStyle, VideoResolution, VideoSettings,
    CLIP_DURATION_RANGE,
};
pub use story::{
    AssetRef, ContinuityIssue, PromptSegment, Segment, Severity, ShotType, Story, StoryAnalysis,
};
