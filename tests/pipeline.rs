//! End-to-end pipeline runs through the public API.

use std::sync::Arc;

use tempfile::TempDir;

use cineforge::adapters::FailingVideoService;
use cineforge::core::checkpoint::CheckpointStore;
use cineforge::core::error::{PipelineError, ServiceErrorKind};
use cineforge::core::orchestrator::{Orchestrator, RunControl};
use cineforge::core::stage::StageKind;
use cineforge::domain::{ModuleSettings, RewordingStyle, SessionState, Story};
use cineforge::facade::SessionHandle;
use cineforge::telemetry::Telemetry;

const STORY: &str = "A knight rides toward a distant castle. Inside, the king \
    paces the great hall. \"The kingdom is in danger,\" he says. The knight \
    kneels and accepts the quest.";

fn orchestrator(temp: &TempDir, telemetry: Arc<Telemetry>) -> Orchestrator {
    Orchestrator::new(telemetry, CheckpointStore::open(temp.path()))
}

#[tokio::test]
async fn test_default_run_produces_prompts_and_analysis() {
    let temp = TempDir::new().unwrap();
    let telemetry = Arc::new(Telemetry::new());
    let session = orchestrator(&temp, telemetry.clone())
        .run(Story::new(STORY), ModuleSettings::default())
        .await;

    assert_eq!(session.state, SessionState::Completed);
    assert_eq!(session.progress(), 1.0);
    assert!(!session.segments.is_empty());
    assert_eq!(session.final_prompts.len(), session.segments.len());
    assert!(session.analysis.is_some());

    // Segments are contiguous and every one got a shot type
    for (pos, seg) in session.segments.iter().enumerate() {
        assert_eq!(seg.index, pos);
        assert!(seg.duration > 0.0);
        assert!(seg.shot_type.is_some());
    }

    // One summary per enabled stage, in pipeline order, closed by the
    // terminal pipeline summary
    let stages: Vec<&str> = session.live_results.iter().map(|r| r.stage.as_str()).collect();
    assert_eq!(
        stages,
        vec![
            "Story Segmentation",
            "Story Analysis",
            "Cinematic Enrichment",
            "Continuity Validation",
            "Pipeline Summary",
        ]
    );
    assert_eq!(
        session.export_json()["results"]["Pipeline Summary"],
        "Successfully processed 4 modules"
    );
}

#[tokio::test]
async fn test_telemetry_records_the_run_lifecycle() {
    let temp = TempDir::new().unwrap();
    let telemetry = Arc::new(Telemetry::new());
    let session = orchestrator(&temp, telemetry.clone())
        .run(Story::new(STORY), ModuleSettings::default())
        .await;
    assert_eq!(session.state, SessionState::Completed);

    let events = telemetry.recent_events(100);
    assert_eq!(events.first().map(|e| e.name.as_str()), Some("run_started"));
    assert_eq!(events.last().map(|e| e.name.as_str()), Some("run_completed"));

    let completed: Vec<String> = telemetry
        .events_named("stage_completed")
        .iter()
        .map(|e| e.metadata["stage"].clone())
        .collect();
    assert_eq!(
        completed,
        vec!["segmentation", "story_analysis", "taxonomy", "continuity"]
    );

    // Every stage id was registered at construction
    for kind in StageKind::ORDER {
        assert!(telemetry.is_registered(kind.id()));
    }
}

#[tokio::test]
async fn test_empty_story_logs_no_stage_events() {
    let temp = TempDir::new().unwrap();
    let telemetry = Arc::new(Telemetry::new());
    let session = orchestrator(&temp, telemetry.clone())
        .run(Story::new("   \n\t"), ModuleSettings::default())
        .await;

    assert!(matches!(
        session.error(),
        Some(PipelineError::Validation(_))
    ));
    assert!(session.live_results.is_empty());
    // Validation happens before any stage, so no stage ever reports
    assert!(telemetry.events_named("stage_completed").is_empty());
    assert!(telemetry.events_named("stage_failed").is_empty());
    assert_eq!(telemetry.events_named("run_failed").len(), 1);
}

#[tokio::test]
async fn test_partial_failure_preserves_completed_results() {
    let temp = TempDir::new().unwrap();
    let telemetry = Arc::new(Telemetry::new());
    let orchestrator = Orchestrator::with_video_service(
        telemetry.clone(),
        CheckpointStore::open(temp.path()),
        Arc::new(FailingVideoService {
            kind: ServiceErrorKind::Network,
        }),
    );

    let mut settings = ModuleSettings::default();
    settings.video_generation = true;
    settings.video.api_key_ref = Some("POLLO_API_KEY".to_string());

    let session = orchestrator.run(Story::new(STORY), settings).await;

    match session.error() {
        Some(PipelineError::ExternalService { stage, kind, .. }) => {
            assert_eq!(*stage, StageKind::VideoGeneration);
            assert_eq!(*kind, ServiceErrorKind::Network);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(session.error().unwrap().is_retryable());

    // Everything produced before the failure survives
    assert!(!session.segments.is_empty());
    assert!(session.analysis.is_some());
    assert_eq!(session.live_results.len(), 4);
    assert_eq!(session.completed_stages.len(), 4);
    assert!(session.assets.is_empty());

    let failed = telemetry.events_named("stage_failed");
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].metadata["stage"], "video_generation");
    assert_eq!(telemetry.events_named("run_failed").len(), 1);
}

#[tokio::test]
async fn test_invalid_video_settings_fail_before_any_stage() {
    let temp = TempDir::new().unwrap();
    let telemetry = Arc::new(Telemetry::new());

    let mut settings = ModuleSettings::default();
    settings.video_generation = true;
    settings.video.api_key_ref = Some("POLLO_API_KEY".to_string());
    settings.video.duration_seconds = 25;

    let session = orchestrator(&temp, telemetry.clone())
        .run(Story::new(STORY), settings)
        .await;

    assert!(matches!(
        session.error(),
        Some(PipelineError::Configuration {
            stage: StageKind::VideoGeneration,
            ..
        })
    ));
    // Configuration happens up front, so no stage ran at all
    assert!(session.live_results.is_empty());
    assert!(telemetry.events_named("stage_completed").is_empty());
}

#[tokio::test]
async fn test_rewording_rewrites_content_only() {
    let temp = TempDir::new().unwrap();
    let telemetry = Arc::new(Telemetry::new());

    let mut settings = ModuleSettings::default();
    settings.rewording = true;
    settings.rewording_style = RewordingStyle::Cinematic;
    settings.taxonomy = false;
    settings.continuity = false;

    let baseline = orchestrator(&temp, telemetry.clone())
        .run(Story::new(STORY), {
            let mut s = settings.clone();
            s.rewording = false;
            s
        })
        .await;
    let reworded = orchestrator(&temp, telemetry)
        .run(Story::new(STORY), settings)
        .await;

    assert_eq!(reworded.state, SessionState::Completed);
    assert_eq!(reworded.segments.len(), baseline.segments.len());

    for (before, after) in baseline.segments.iter().zip(&reworded.segments) {
        assert!(after.content.starts_with("The camera holds on the scene:"));
        // Only content changes; structural fields carry through untouched
        assert_eq!(after.index, before.index);
        assert_eq!(after.duration, before.duration);
        assert_eq!(after.characters, before.characters);
        assert_eq!(after.location, before.location);
    }
}

#[tokio::test]
async fn test_analysis_only_run_skips_segmentation() {
    let temp = TempDir::new().unwrap();
    let telemetry = Arc::new(Telemetry::new());

    let mut settings = ModuleSettings::none_enabled();
    settings.story_analysis = true;

    let session = orchestrator(&temp, telemetry).run(Story::new(STORY), settings).await;

    assert_eq!(session.state, SessionState::Completed);
    assert!(session.segments.is_empty());
    assert!(session.final_prompts.is_empty());
    assert!(session.analysis.is_some());
    assert_eq!(session.live_results.len(), 2);
    assert_eq!(session.live_results[0].stage, "Story Analysis");
    assert_eq!(session.live_results[1].stage, "Pipeline Summary");
}

#[tokio::test]
async fn test_dependent_stage_without_segmentation_fails() {
    let temp = TempDir::new().unwrap();
    let telemetry = Arc::new(Telemetry::new());

    let mut settings = ModuleSettings::none_enabled();
    settings.continuity = true;

    let session = orchestrator(&temp, telemetry).run(Story::new(STORY), settings).await;

    assert!(matches!(
        session.error(),
        Some(PipelineError::Dependency {
            stage: StageKind::Continuity,
            missing: StageKind::Segmentation,
        })
    ));
}

#[tokio::test]
async fn test_facade_snapshots_show_monotonic_progress() {
    let temp = TempDir::new().unwrap();
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(Telemetry::new()),
        CheckpointStore::open(temp.path()),
    ));

    let handle = SessionHandle::start(orchestrator, Story::new(STORY), ModuleSettings::default());
    let mut rx = handle.watch();

    let mut last = 0.0;
    while rx.changed().await.is_ok() {
        let progress = rx.borrow().progress();
        assert!(progress >= last, "progress went backward: {} -> {}", last, progress);
        last = progress;
    }

    let session = handle.wait().await;
    assert_eq!(session.state, SessionState::Completed);
    assert_eq!(session.progress(), 1.0);
}

#[tokio::test]
async fn test_cancelled_run_discards_in_flight_work() {
    let temp = TempDir::new().unwrap();
    let telemetry = Arc::new(Telemetry::new());
    let ctl = RunControl::new();
    ctl.cancel();

    let session = orchestrator(&temp, telemetry.clone())
        .run_with(Story::new(STORY), ModuleSettings::default(), &ctl)
        .await;

    assert_eq!(session.state, SessionState::Cancelled);
    assert!(session.live_results.is_empty());
    assert!(session.final_prompts.is_empty());
    assert_eq!(telemetry.events_named("run_cancelled").len(), 1);
    assert!(telemetry.events_named("run_completed").is_empty());
}
