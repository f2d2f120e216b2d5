//! cineforge - Story-to-video prompt pipeline
//!
//! An orchestrator that turns raw narrative text into structured,
//! duration-budgeted video-generation prompts through a fixed order of
//! optional stages.
//!
//! # Architecture
//!
//! The system is built around one session per run:
//! - Stages are interchangeable modules behind a single contract
//! - The orchestrator owns ordering, dependency checks and cancellation
//! - A checkpoint is written after every completed stage, so failed runs
//!   can be resumed from the last good stage
//! - Observers only ever see immutable session snapshots
//!
//! # Modules
//!
//! - `adapters`: External video-generation backends
//! - `core`: Orchestration logic (Orchestrator, CheckpointStore, StageKind)
//! - `domain`: Data structures (Story, Segment, Session, ModuleSettings)
//! - `stages`: The stage implementations
//! - `facade`: Background-run handle for embedding callers
//! - `telemetry`: In-process event sink
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run the pipeline over a story
//! cineforge run --input story.txt
//!
//! # Check run status
//! cineforge status <run-id>
//!
//! # Resume a failed run
//! cineforge resume <run-id>
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod facade;
pub mod stages;
pub mod telemetry;

// Re-export main types at crate root for convenience
pub use self::core::{
    Checkpoint, CheckpointStore, Orchestrator, PipelineError, RunControl, StageKind,
};
pub use domain::{ModuleSettings, Segment, Session, SessionState, Story};
pub use facade::SessionHandle;
pub use stages::{StageContext, StageModule, StageOutput};
pub use telemetry::{Telemetry, TelemetryEvent};
