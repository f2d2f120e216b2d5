//! Session state and lifecycle.
//!
//! A session (run) is created when a pipeline starts, mutated exclusively by
//! the orchestrator while running, and handed to callers only as immutable
//! snapshots. Checkpoints serialize the whole session so a failed run can be
//! reconstructed and resumed.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::core::error::PipelineError;
use crate::core::stage::StageKind;

use super::settings::ModuleSettings;
use super::story::{AssetRef, ContinuityIssue, PromptSegment, Segment, Story, StoryAnalysis};

/// One execution of the pipeline over one story
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique run identifier
    pub id: Uuid,

    /// Input story (immutable once the run starts)
    pub story: Story,

    /// Settings for this run
    pub settings: ModuleSettings,

    /// Current position in the enabled-stage order (completed-stage count)
    pub stage_index: usize,

    /// Lifecycle state
    pub state: SessionState,

    /// Per-stage human-readable summaries, in completion order
    pub live_results: Vec<LiveResult>,

    /// Stages that completed, in order (drives resume)
    pub completed_stages: Vec<StageKind>,

    /// Accumulated segment list
    pub segments: Vec<Segment>,

    /// Story-level analysis, if the stage ran
    pub analysis: Option<StoryAnalysis>,

    /// Detected continuity issues (data, never errors)
    pub continuity_issues: Vec<ContinuityIssue>,

    /// Terminal artifact: prompts ready for video generation
    pub final_prompts: Vec<PromptSegment>,

    /// Asset references from the video-generation backend
    pub assets: Vec<AssetRef>,

    /// Assembled/post-processed artifact path, if the video stages ran
    pub artifact_path: Option<PathBuf>,

    /// Set when a checkpoint write failed; resume is no longer offered
    pub resume_disabled: bool,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Create an idle session for a story and settings
    pub fn new(story: Story, settings: ModuleSettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            story,
            settings,
            stage_index: 0,
            state: SessionState::Idle,
            live_results: Vec::new(),
            completed_stages: Vec::new(),
            segments: Vec::new(),
            analysis: None,
            continuity_issues: Vec::new(),
            final_prompts: Vec::new(),
            assets: Vec::new(),
            artifact_path: None,
            resume_disabled: false,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Fraction of enabled stages completed.
    ///
    /// Monotonically non-decreasing across a run; equals 1.0 iff completed.
    pub fn progress(&self) -> f64 {
        let total = self.settings.enabled_count();
        if total == 0 {
            return 0.0;
        }
        match self.state {
            SessionState::Completed => 1.0,
            _ => (self.stage_index.min(total)) as f64 / total as f64,
        }
    }

    /// The run reached a terminal state
    pub fn is_finished(&self) -> bool {
        matches!(
            self.state,
            SessionState::Completed | SessionState::Failed { .. } | SessionState::Cancelled
        )
    }

    /// The classified error, if the run failed
    pub fn error(&self) -> Option<&PipelineError> {
        match &self.state {
            SessionState::Failed { error } => Some(error),
            _ => None,
        }
    }

    /// Append a live-result summary for a completed stage
    pub fn push_result(&mut self, stage: StageKind, summary: impl Into<String>) {
        self.live_results.push(LiveResult {
            stage: stage.display_name().to_string(),
            summary: summary.into(),
        });
    }

    /// Append the terminal pipeline summary entry to the live results
    pub fn push_pipeline_summary(&mut self) {
        self.live_results.push(LiveResult {
            stage: "Pipeline Summary".to_string(),
            summary: format!(
                "Successfully processed {} modules",
                self.completed_stages.len()
            ),
        });
    }

    /// Explicit caller-issued reset back to `Idle`.
    ///
    /// Discards in-memory artifacts; checkpoints on disk are untouched.
    /// The only backward transition in the state machine.
    pub fn reset(&mut self) {
        self.stage_index = 0;
        self.state = SessionState::Idle;
        self.live_results.clear();
        self.completed_stages.clear();
        self.segments.clear();
        self.analysis = None;
        self.continuity_issues.clear();
        self.final_prompts.clear();
        self.assets.clear();
        self.artifact_path = None;
        self.completed_at = None;
    }

    /// Export the run in the external JSON shape:
    /// story, settings.targetDuration, per-stage results, prompt array.
    pub fn export_json(&self) -> serde_json::Value {
        let results: serde_json::Map<String, serde_json::Value> = self
            .live_results
            .iter()
            .map(|r| (r.stage.clone(), json!(r.summary)))
            .collect();

        json!({
            "story": self.story.text,
            "settings": {
                "targetDuration": self.settings.target_duration,
            },
            "results": results,
            "prompts": self.final_prompts.iter().map(|p| json!({
                "index": p.index,
                "duration": p.duration,
                "content": p.content,
                "characters": p.characters,
                "setting": p.setting,
                "action": p.action,
            })).collect::<Vec<_>>(),
        })
    }
}

/// Lifecycle of a session.
///
/// `Idle -> Configuring -> Running -> {Completed | Failed | Cancelled}`.
/// No transition moves backward except `Session::reset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum SessionState {
    /// Before any run starts
    Idle,

    /// Validating settings and story before the first stage
    Configuring,

    /// Executing stages; `stage_index` is the completed-stage count
    Running { stage_index: usize },

    /// Every enabled stage succeeded
    Completed,

    /// A non-continuity stage error aborted the run
    Failed { error: PipelineError },

    /// Cooperative cancellation observed between stage boundaries
    Cancelled,
}

/// Human-readable per-stage summary shown to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveResult {
    /// Stage display name
    pub stage: String,

    /// Summary line, e.g. "Generated 4 segments"
    pub summary: String,
}
