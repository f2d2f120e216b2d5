//! Session facade for embedding callers.
//!
//! Wraps a background pipeline run behind a handle the presentation layer
//! can poll: start, cancel, snapshot, wait. Observers only ever see
//! immutable session snapshots published over a watch channel; the running
//! session itself is never shared.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::error;

use crate::core::orchestrator::{Orchestrator, RunControl};
use crate::domain::{ModuleSettings, Session, Story};
use uuid::Uuid;

/// Handle over one background pipeline run
pub struct SessionHandle {
    run_id: Uuid,
    control: RunControl,
    snapshots: watch::Receiver<Session>,
    task: JoinHandle<Session>,
}

impl SessionHandle {
    /// Spawn a run in the background and return immediately
    pub fn start(orchestrator: Arc<Orchestrator>, story: Story, settings: ModuleSettings) -> Self {
        let session = Session::new(story, settings);
        let run_id = session.id;

        let (tx, rx) = watch::channel(session.clone());

        // Only the run task holds the sender; when the run finishes the
        // channel closes and `watch()` subscribers observe the end.
        let control = RunControl::new();
        let ctl = control.clone().with_snapshots(tx);
        let task = tokio::spawn(async move { orchestrator.run_session(session, &ctl).await });

        Self {
            run_id,
            control,
            snapshots: rx,
            task,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Request cooperative cancellation; returns without waiting.
    ///
    /// The run stops at the next stage boundary and any in-flight stage
    /// result is discarded.
    pub fn cancel(&self) {
        self.control.cancel();
    }

    /// Latest published session snapshot
    pub fn snapshot(&self) -> Session {
        self.snapshots.borrow().clone()
    }

    /// Fraction of enabled stages completed, in `[0.0, 1.0]`
    pub fn progress(&self) -> f64 {
        self.snapshots.borrow().progress()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Subscribe to snapshot updates
    pub fn watch(&self) -> watch::Receiver<Session> {
        self.snapshots.clone()
    }

    /// Wait for the run to reach a terminal state
    pub async fn wait(self) -> Session {
        match self.task.await {
            Ok(session) => session,
            // The run task does not panic in normal operation; fall back to
            // the last published snapshot if it ever does.
            Err(err) => {
                error!(%err, "Run task aborted");
                self.snapshots.borrow().clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::checkpoint::CheckpointStore;
    use crate::domain::SessionState;
    use crate::telemetry::Telemetry;
    use tempfile::TempDir;

    fn orchestrator(temp: &TempDir) -> Arc<Orchestrator> {
        Arc::new(Orchestrator::new(
            Arc::new(Telemetry::new()),
            CheckpointStore::open(temp.path()),
        ))
    }

    #[tokio::test]
    async fn test_start_and_wait_reaches_completed() {
        let temp = TempDir::new().unwrap();
        let handle = SessionHandle::start(
            orchestrator(&temp),
            Story::new("A knight explores a castle. He finds a sword."),
            ModuleSettings::default(),
        );
        let run_id = handle.run_id();

        let session = handle.wait().await;
        assert_eq!(session.id, run_id);
        assert_eq!(session.state, SessionState::Completed);
        assert!(!session.final_prompts.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_reaches_cancelled() {
        let temp = TempDir::new().unwrap();
        let handle = SessionHandle::start(
            orchestrator(&temp),
            Story::new("A knight explores a castle."),
            ModuleSettings::default(),
        );

        // Flag is observed at the next stage boundary
        handle.cancel();
        let session = handle.wait().await;
        assert!(matches!(
            session.state,
            SessionState::Cancelled | SessionState::Completed
        ));
    }

    #[tokio::test]
    async fn test_snapshot_matches_run_id_from_start() {
        let temp = TempDir::new().unwrap();
        let handle = SessionHandle::start(
            orchestrator(&temp),
            Story::new("A quiet village at dawn."),
            ModuleSettings::default(),
        );

        assert_eq!(handle.snapshot().id, handle.run_id());
        let progress = handle.progress();
        assert!((0.0..=1.0).contains(&progress));
        handle.wait().await;
    }
}
