//! Orchestration core: stage table, error taxonomy, checkpoint store and
//! the orchestrator itself.

pub mod checkpoint;
pub mod error;
pub mod orchestrator;
pub mod stage;

pub use checkpoint::{Checkpoint, CheckpointStore};
pub use error::{PipelineError, ServiceErrorKind};
pub use orchestrator::{Orchestrator, RunControl};
pub use stage::StageKind;
