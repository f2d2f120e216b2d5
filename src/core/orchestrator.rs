//! Pipeline orchestrator.
//!
//! Owns stage ordering, dependency checks, execution, progress and
//! cancellation, and checkpointing. Stages are driven polymorphically
//! through the `StageModule` contract; the orchestrator never inspects
//! concrete stage types.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{NullVideoService, VideoService};
use crate::domain::{ModuleSettings, Session, SessionState, Story};
use crate::stages::{build_module, StageContext, StageModule, StageOutput};
use crate::telemetry::{metadata, Telemetry};

use super::checkpoint::CheckpointStore;
use super::error::PipelineError;
use super::stage::StageKind;

/// Per-run cancellation flag and snapshot channel.
///
/// Cancellation is cooperative: the flag is checked between stage boundaries
/// only, and the result of an in-flight stage is discarded on return.
/// Snapshots are immutable session clones published after every transition;
/// the presentation layer never sees a live mutable reference.
#[derive(Clone, Default)]
pub struct RunControl {
    cancel: Arc<AtomicBool>,
    snapshots: Option<watch::Sender<Session>>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a snapshot channel
    pub fn with_snapshots(mut self, tx: watch::Sender<Session>) -> Self {
        self.snapshots = Some(tx);
        self
    }

    /// Request cooperative cancellation
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn publish(&self, session: &Session) {
        if let Some(tx) = &self.snapshots {
            // Receivers may be gone; publishing is best-effort
            let _ = tx.send(session.clone());
        }
    }
}

/// Drives one or more pipeline runs.
///
/// Each run owns its session exclusively; the telemetry sink and checkpoint
/// store are the only resources shared across concurrent runs.
pub struct Orchestrator {
    telemetry: Arc<Telemetry>,
    checkpoints: CheckpointStore,
    video_service: Arc<dyn VideoService>,
}

impl Orchestrator {
    /// Create an orchestrator with the offline video service
    pub fn new(telemetry: Arc<Telemetry>, checkpoints: CheckpointStore) -> Self {
        Self::with_video_service(telemetry, checkpoints, Arc::new(NullVideoService))
    }

    /// Create an orchestrator with an explicit video backend
    pub fn with_video_service(
        telemetry: Arc<Telemetry>,
        checkpoints: CheckpointStore,
        video_service: Arc<dyn VideoService>,
    ) -> Self {
        for kind in StageKind::ORDER {
            telemetry.register(kind.id());
        }
        Self {
            telemetry,
            checkpoints,
            video_service,
        }
    }

    /// Execute a full run with default control (no cancellation, no snapshots)
    pub async fn run(&self, story: Story, settings: ModuleSettings) -> Session {
        self.run_with(story, settings, &RunControl::new()).await
    }

    /// Execute a full run
    #[instrument(skip(self, story, settings, ctl))]
    pub async fn run_with(
        &self,
        story: Story,
        settings: ModuleSettings,
        ctl: &RunControl,
    ) -> Session {
        self.run_session(Session::new(story, settings), ctl).await
    }

    /// Execute a run over a caller-built idle session.
    ///
    /// The facade uses this so the session id in its snapshots matches the
    /// one the orchestrator mutates.
    pub async fn run_session(&self, mut session: Session, ctl: &RunControl) -> Session {
        info!(run_id = %session.id, "Starting pipeline run");

        self.telemetry.log_event(
            "run_started",
            metadata([("run_id", session.id.to_string())]),
        );

        self.drive(&mut session, ctl).await;
        session
    }

    /// Resume a run from its latest checkpoint, continuing with the first
    /// stage after the last completed one.
    #[instrument(skip(self, ctl))]
    pub async fn resume(&self, run_id: Uuid, ctl: &RunControl) -> Result<Session, PipelineError> {
        let checkpoint = self
            .checkpoints
            .load_latest(run_id)
            .await?
            .ok_or_else(|| {
                PipelineError::Persistence(format!("no checkpoint for run {}", run_id))
            })?;

        let mut session = checkpoint.session;
        if matches!(session.state, SessionState::Completed) {
            info!(%run_id, "Run already completed, nothing to resume");
            return Ok(session);
        }

        info!(%run_id, resume_after = %checkpoint.stage, "Resuming run");
        session.completed_at = None;
        self.telemetry.log_event(
            "run_resumed",
            metadata([
                ("run_id", run_id.to_string()),
                ("after_stage", checkpoint.stage.id().to_string()),
            ]),
        );

        self.drive(&mut session, ctl).await;
        Ok(session)
    }

    /// Reconstruct the latest known state of a run
    pub async fn status(&self, run_id: Uuid) -> Result<Session, PipelineError> {
        let checkpoint = self
            .checkpoints
            .load_latest(run_id)
            .await?
            .ok_or_else(|| PipelineError::Persistence(format!("run {} not found", run_id)))?;
        Ok(checkpoint.session)
    }

    /// List recent runs, most recent first
    pub async fn list_runs(&self, limit: usize) -> Result<Vec<Session>, PipelineError> {
        let run_ids = self.checkpoints.list_runs().await?;
        let mut sessions = Vec::new();
        for run_id in run_ids {
            if let Ok(Some(checkpoint)) = self.checkpoints.load_latest(run_id).await {
                sessions.push(checkpoint.session);
            }
        }
        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        sessions.truncate(limit);
        Ok(sessions)
    }

    /// Run every pending enabled stage of a session to a terminal state
    async fn drive(&self, session: &mut Session, ctl: &RunControl) {
        session.state = SessionState::Configuring;
        ctl.publish(session);

        // Validation: the run never starts on an empty story or empty stage set
        if session.story.is_blank() {
            self.fail(
                session,
                ctl,
                None,
                PipelineError::Validation("story text is empty or whitespace-only".to_string()),
            )
            .await;
            return;
        }
        if session.settings.enabled_count() == 0 {
            self.fail(
                session,
                ctl,
                None,
                PipelineError::Validation("no pipeline stage is enabled".to_string()),
            )
            .await;
            return;
        }

        // Configure every pending module up front; invalid parameters are
        // fatal before any stage executes.
        let pending: Vec<StageKind> = session
            .settings
            .enabled_stages()
            .into_iter()
            .filter(|k| !session.completed_stages.contains(k))
            .collect();

        let mut modules: Vec<Box<dyn StageModule>> = Vec::with_capacity(pending.len());
        for kind in &pending {
            let mut module = build_module(*kind, &self.video_service);
            if let Err(err) = module.configure(&session.settings) {
                self.fail(session, ctl, Some(*kind), err).await;
                return;
            }
            debug_assert!(module.is_complete());
            modules.push(module);
        }

        session.state = SessionState::Running {
            stage_index: session.stage_index,
        };
        ctl.publish(session);

        let mut queue = modules.into_iter().peekable();

        // Segmentation and story analysis have no mutual dependency; when
        // both are pending they run as a fork-join pair.
        if queue.peek().map(|m| m.kind()) == Some(StageKind::Segmentation) {
            let seg = queue.next().expect("peeked");
            if queue.peek().map(|m| m.kind()) == Some(StageKind::StoryAnalysis) {
                let ana = queue.next().expect("peeked");
                if !self.run_fork_join(session, ctl, seg, ana).await {
                    return;
                }
            } else if !self.run_stage(session, ctl, &*seg).await {
                return;
            }
        }

        for module in queue {
            if !self.run_stage(session, ctl, &*module).await {
                return;
            }
        }

        self.complete(session, ctl).await;
    }

    /// Execute the independent segmentation/analysis pair concurrently and
    /// merge both results in fixed order. Returns false when the run ended.
    async fn run_fork_join(
        &self,
        session: &mut Session,
        ctl: &RunControl,
        seg: Box<dyn StageModule>,
        ana: Box<dyn StageModule>,
    ) -> bool {
        if self.check_cancelled(session, ctl) {
            return false;
        }

        let ctx = self.context(session);
        let started = Instant::now();
        let (seg_result, ana_result) = tokio::join!(seg.execute(&ctx), ana.execute(&ctx));
        let duration_ms = started.elapsed().as_millis() as u64;

        // A cancellation observed while the pair was in flight discards both
        if self.check_cancelled(session, ctl) {
            return false;
        }

        for (module, result) in [(seg, seg_result), (ana, ana_result)] {
            match result {
                Ok(output) => {
                    self.complete_stage(session, ctl, module.kind(), output, duration_ms)
                        .await;
                }
                Err(err) => {
                    self.fail(session, ctl, Some(module.kind()), err).await;
                    return false;
                }
            }
        }

        true
    }

    /// Execute one stage. Returns false when the run reached a terminal state.
    async fn run_stage(
        &self,
        session: &mut Session,
        ctl: &RunControl,
        module: &dyn StageModule,
    ) -> bool {
        if self.check_cancelled(session, ctl) {
            return false;
        }

        let kind = module.kind();
        if let Err(err) = self.check_dependency(session, kind) {
            self.fail(session, ctl, Some(kind), err).await;
            return false;
        }

        debug!(stage = %kind, "Executing stage");
        let ctx = self.context(session);
        let started = Instant::now();
        let result = module.execute(&ctx).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        // Cooperative cancellation: an in-flight result is discarded on return
        if self.check_cancelled(session, ctl) {
            return false;
        }

        match result {
            Ok(output) => {
                self.complete_stage(session, ctl, kind, output, duration_ms)
                    .await;
                true
            }
            Err(err) => {
                self.fail(session, ctl, Some(kind), err).await;
                false
            }
        }
    }

    /// Verify the declared dependency's output is present and non-empty
    fn check_dependency(&self, session: &Session, kind: StageKind) -> Result<(), PipelineError> {
        let Some(missing) = kind.requires() else {
            return Ok(());
        };
        let present = match missing {
            StageKind::Segmentation => !session.segments.is_empty(),
            StageKind::VideoGeneration => !session.assets.is_empty(),
            StageKind::VideoAssembly => session.artifact_path.is_some(),
            _ => true,
        };
        if present {
            Ok(())
        } else {
            Err(PipelineError::Dependency {
                stage: kind,
                missing,
            })
        }
    }

    /// Snapshot accumulated session state into a stage context
    fn context(&self, session: &Session) -> StageContext {
        StageContext {
            story: session.story.clone(),
            settings: session.settings.clone(),
            segments: session.segments.clone(),
            analysis: session.analysis.clone(),
            issues: session.continuity_issues.clone(),
            assets: session.assets.clone(),
            artifact_path: session.artifact_path.clone(),
        }
    }

    /// Merge a stage's output into the session, advance progress, log
    /// telemetry and write a checkpoint.
    async fn complete_stage(
        &self,
        session: &mut Session,
        ctl: &RunControl,
        kind: StageKind,
        output: StageOutput,
        duration_ms: u64,
    ) {
        let summary = output.summary(kind);

        // Immutable replace of the relevant field, never partial mutation
        match output {
            StageOutput::Segments(segments) => session.segments = segments,
            StageOutput::Analysis(analysis) => session.analysis = Some(analysis),
            StageOutput::Continuity(issues) => session.continuity_issues = issues,
            StageOutput::Assets(assets) => session.assets = assets,
            StageOutput::Artifact(path) => session.artifact_path = Some(path),
        }

        session.completed_stages.push(kind);
        session.stage_index += 1;
        session.push_result(kind, summary.clone());
        session.state = SessionState::Running {
            stage_index: session.stage_index,
        };

        info!(stage = %kind, duration_ms, %summary, "Stage completed");
        self.telemetry.log_event(
            "stage_completed",
            metadata([
                ("run_id", session.id.to_string()),
                ("stage", kind.id().to_string()),
                ("duration_ms", duration_ms.to_string()),
            ]),
        );

        // A failed checkpoint write never aborts the run; it only disables
        // resume for this run.
        if let Err(err) = self.checkpoints.save(session, kind).await {
            warn!(stage = %kind, %err, "Checkpoint write failed; resume disabled");
            session.resume_disabled = true;
            self.telemetry.log_event(
                "persistence_error",
                metadata([
                    ("run_id", session.id.to_string()),
                    ("stage", kind.id().to_string()),
                    ("error", err.to_string()),
                ]),
            );
        }

        ctl.publish(session);
    }

    /// Replace the latest checkpoint with the terminal session state so
    /// `status` and `export` observe the finished run. Best-effort; the
    /// per-stage checkpoints already cover resume.
    async fn save_terminal(&self, session: &mut Session) {
        if session.resume_disabled {
            return;
        }
        let Some(last) = session.completed_stages.last().copied() else {
            return;
        };
        if let Err(err) = self.checkpoints.save(session, last).await {
            warn!(%err, "Terminal checkpoint write failed");
            session.resume_disabled = true;
        }
    }

    /// Mark the run completed and build the terminal prompt list
    async fn complete(&self, session: &mut Session, ctl: &RunControl) {
        session.final_prompts = session.segments.iter().map(Into::into).collect();
        session.push_pipeline_summary();
        session.state = SessionState::Completed;
        session.completed_at = Some(chrono::Utc::now());
        self.save_terminal(session).await;

        info!(
            run_id = %session.id,
            prompts = session.final_prompts.len(),
            issues = session.continuity_issues.len(),
            "Run completed"
        );
        self.telemetry.log_event(
            "run_completed",
            metadata([
                ("run_id", session.id.to_string()),
                ("prompts", session.final_prompts.len().to_string()),
            ]),
        );
        ctl.publish(session);
    }

    /// Mark the run failed, preserving every artifact produced so far
    async fn fail(
        &self,
        session: &mut Session,
        ctl: &RunControl,
        stage: Option<StageKind>,
        err: PipelineError,
    ) {
        error!(run_id = %session.id, stage = ?stage, %err, "Run failed");

        if let Some(kind) = stage {
            self.telemetry.log_event(
                "stage_failed",
                metadata([
                    ("run_id", session.id.to_string()),
                    ("stage", kind.id().to_string()),
                    ("error", err.to_string()),
                ]),
            );
        }
        self.telemetry.log_event(
            "run_failed",
            metadata([
                ("run_id", session.id.to_string()),
                ("error", err.to_string()),
            ]),
        );

        session.state = SessionState::Failed { error: err };
        session.completed_at = Some(chrono::Utc::now());
        self.save_terminal(session).await;
        ctl.publish(session);
    }

    /// Observe the cancellation flag at a stage boundary
    fn check_cancelled(&self, session: &mut Session, ctl: &RunControl) -> bool {
        if !ctl.is_cancelled() {
            return false;
        }
        if !matches!(session.state, SessionState::Cancelled) {
            info!(run_id = %session.id, "Run cancelled");
            self.telemetry
                .log_event("run_cancelled", metadata([("run_id", session.id.to_string())]));
            session.state = SessionState::Cancelled;
            session.completed_at = Some(chrono::Utc::now());
            ctl.publish(session);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn orchestrator(temp: &TempDir) -> Orchestrator {
        Orchestrator::new(
            Arc::new(Telemetry::new()),
            CheckpointStore::open(temp.path()),
        )
    }

    #[tokio::test]
    async fn test_empty_story_fails_validation_before_any_stage() {
        let temp = TempDir::new().unwrap();
        let session = orchestrator(&temp)
            .run(Story::new("   "), ModuleSettings::default())
            .await;

        assert!(matches!(
            session.state,
            SessionState::Failed {
                error: PipelineError::Validation(_)
            }
        ));
        assert!(session.segments.is_empty());
        assert!(session.live_results.is_empty());
    }

    #[tokio::test]
    async fn test_no_enabled_stage_fails_validation() {
        let temp = TempDir::new().unwrap();
        let session = orchestrator(&temp)
            .run(Story::new("A story."), ModuleSettings::none_enabled())
            .await;

        assert!(matches!(
            session.state,
            SessionState::Failed {
                error: PipelineError::Validation(_)
            }
        ));
    }

    #[tokio::test]
    async fn test_default_run_completes_with_prompts() {
        let temp = TempDir::new().unwrap();
        let session = orchestrator(&temp)
            .run(
                Story::new("A knight explores a castle. He finds a sword."),
                ModuleSettings::default(),
            )
            .await;

        assert_eq!(session.state, SessionState::Completed);
        assert_eq!(session.progress(), 1.0);
        assert_eq!(session.final_prompts.len(), session.segments.len());
        assert!(session.analysis.is_some());
        assert_eq!(session.stage_index, session.settings.enabled_count());
    }

    #[tokio::test]
    async fn test_dependency_error_names_missing_stage() {
        let temp = TempDir::new().unwrap();
        let settings = ModuleSettings {
            segmentation: false,
            story_analysis: false,
            taxonomy: true,
            continuity: false,
            ..ModuleSettings::default()
        };
        let session = orchestrator(&temp).run(Story::new("A story."), settings).await;

        match session.state {
            SessionState::Failed {
                error: PipelineError::Dependency { stage, missing },
            } => {
                assert_eq!(stage, StageKind::Taxonomy);
                assert_eq!(missing, StageKind::Segmentation);
            }
            other => panic!("unexpected state: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancel_before_start_yields_empty_live_results() {
        let temp = TempDir::new().unwrap();
        let ctl = RunControl::new();
        ctl.cancel();

        let session = orchestrator(&temp)
            .run_with(
                Story::new("A knight explores a castle."),
                ModuleSettings::default(),
                &ctl,
            )
            .await;

        assert_eq!(session.state, SessionState::Cancelled);
        assert!(session.live_results.is_empty());
        assert!(session.segments.is_empty());
    }
}
