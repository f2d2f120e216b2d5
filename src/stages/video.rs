//! Video generation, assembly and effects stages.
//!
//! These stages consume finalized prompt segments through the
//! [`VideoService`] adapter and are disabled by default; the pipeline stops
//! at prompt generation unless a caller opts in. External failures are
//! surfaced with their retry class; the orchestrator never auto-retries.

use std::sync::Arc;

use async_trait::async_trait;

use crate::adapters::{ServiceError, VideoService};
use crate::core::error::PipelineError;
use crate::core::stage::StageKind;
use crate::domain::{ModuleSettings, VideoSettings, CLIP_DURATION_RANGE};

use super::{StageContext, StageModule, StageOutput};

fn service_error(stage: StageKind, err: ServiceError) -> PipelineError {
    PipelineError::ExternalService {
        stage,
        kind: err.kind,
        message: err.message,
    }
}

fn validate_video_settings(stage: StageKind, settings: &ModuleSettings) -> Result<VideoSettings, PipelineError> {
    let video = &settings.video;
    if !CLIP_DURATION_RANGE.contains(&video.duration_seconds) {
        return Err(PipelineError::Configuration {
            stage,
            message: format!(
                "clip duration {}s outside supported range {}-{}s",
                video.duration_seconds,
                CLIP_DURATION_RANGE.start(),
                CLIP_DURATION_RANGE.end()
            ),
        });
    }
    if video.api_key_ref.as_deref().map(str::trim).unwrap_or("").is_empty() {
        return Err(PipelineError::Configuration {
            stage,
            message: "video stages require an API credential reference".to_string(),
        });
    }
    Ok(video.clone())
}

/// Renders one clip per prompt segment
#[derive(Debug)]
pub struct VideoGenerationModule {
    service: Arc<dyn VideoService>,
    settings: Option<VideoSettings>,
}

impl VideoGenerationModule {
    pub fn new(service: Arc<dyn VideoService>) -> Self {
        Self {
            service,
            settings: None,
        }
    }
}

#[async_trait]
impl StageModule for VideoGenerationModule {
    fn kind(&self) -> StageKind {
        StageKind::VideoGeneration
    }

    fn configure(&mut self, settings: &ModuleSettings) -> Result<(), PipelineError> {
        self.settings = Some(validate_video_settings(self.kind(), settings)?);
        Ok(())
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutput, PipelineError> {
        if ctx.segments.is_empty() {
            return Err(PipelineError::Dependency {
                stage: self.kind(),
                missing: StageKind::Segmentation,
            });
        }
        let video = self.settings.as_ref().ok_or_else(|| PipelineError::Configuration {
            stage: self.kind(),
            message: "module executed before configuration".to_string(),
        })?;

        let mut assets = Vec::with_capacity(ctx.segments.len());
        for prompt in ctx.prompts() {
            let asset = self
                .service
                .generate_clip(&prompt, video)
                .await
                .map_err(|e| service_error(self.kind(), e))?;
            assets.push(asset);
        }

        Ok(StageOutput::Assets(assets))
    }

    fn is_complete(&self) -> bool {
        self.settings.is_some()
    }
}

/// Stitches generated clips into one artifact
#[derive(Debug)]
pub struct VideoAssemblyModule {
    service: Arc<dyn VideoService>,
    configured: bool,
}

impl VideoAssemblyModule {
    pub fn new(service: Arc<dyn VideoService>) -> Self {
        Self {
            service,
            configured: false,
        }
    }
}

#[async_trait]
impl StageModule for VideoAssemblyModule {
    fn kind(&self) -> StageKind {
        StageKind::VideoAssembly
    }

    fn configure(&mut self, settings: &ModuleSettings) -> Result<(), PipelineError> {
        validate_video_settings(self.kind(), settings)?;
        self.configured = true;
        Ok(())
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutput, PipelineError> {
        if ctx.assets.is_empty() {
            return Err(PipelineError::Dependency {
                stage: self.kind(),
                missing: StageKind::VideoGeneration,
            });
        }

        let path = self
            .service
            .assemble(&ctx.assets)
            .await
            .map_err(|e| service_error(self.kind(), e))?;

        Ok(StageOutput::Artifact(path))
    }

    fn is_complete(&self) -> bool {
        self.configured
    }
}

/// Applies post-processing effects to the assembled artifact
#[derive(Debug)]
pub struct VideoEffectsModule {
    service: Arc<dyn VideoService>,
    settings: Option<VideoSettings>,
}

impl VideoEffectsModule {
    pub fn new(service: Arc<dyn VideoService>) -> Self {
        Self {
            service,
            settings: None,
        }
    }
}

#[async_trait]
impl StageModule for VideoEffectsModule {
    fn kind(&self) -> StageKind {
        StageKind::VideoEffects
    }

    fn configure(&mut self, settings: &ModuleSettings) -> Result<(), PipelineError> {
        self.settings = Some(validate_video_settings(self.kind(), settings)?);
        Ok(())
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutput, PipelineError> {
        let Some(artifact) = &ctx.artifact_path else {
            return Err(PipelineError::Dependency {
                stage: self.kind(),
                missing: StageKind::VideoAssembly,
            });
        };
        let video = self.settings.as_ref().ok_or_else(|| PipelineError::Configuration {
            stage: self.kind(),
            message: "module executed before configuration".to_string(),
        })?;

        let path = self
            .service
            .apply_effects(artifact, video.processing_mode)
            .await
            .map_err(|e| service_error(self.kind(), e))?;

        Ok(StageOutput::Artifact(path))
    }

    fn is_complete(&self) -> bool {
        self.settings.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{FailingVideoService, NullVideoService};
    use crate::core::error::ServiceErrorKind;
    use crate::domain::Segment;
    use crate::stages::test_context;

    fn video_settings() -> ModuleSettings {
        let mut settings = ModuleSettings::default();
        settings.video.api_key_ref = Some("POLLO_API_KEY".to_string());
        settings
    }

    #[test]
    fn test_configure_rejects_out_of_range_duration() {
        let mut settings = video_settings();
        settings.video.duration_seconds = 30;

        let mut module = VideoGenerationModule::new(Arc::new(NullVideoService));
        let err = module.configure(&settings).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration { .. }));
        assert!(!module.is_complete());
    }

    #[test]
    fn test_configure_requires_credential() {
        let mut module = VideoGenerationModule::new(Arc::new(NullVideoService));
        let err = module.configure(&ModuleSettings::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_generation_produces_one_asset_per_segment() {
        let mut module = VideoGenerationModule::new(Arc::new(NullVideoService));
        module.configure(&video_settings()).unwrap();

        let mut ctx = test_context("story");
        ctx.segments = vec![
            Segment::new(0, 5.0, "First."),
            Segment::new(1, 5.0, "Second."),
        ];

        match module.execute(&ctx).await.unwrap() {
            StageOutput::Assets(assets) => {
                assert_eq!(assets.len(), 2);
                assert_eq!(assets[0].segment_index, 0);
                assert_eq!(assets[1].segment_index, 1);
            }
            other => panic!("unexpected output: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_external_failure_keeps_retry_class() {
        let mut module = VideoGenerationModule::new(Arc::new(FailingVideoService {
            kind: ServiceErrorKind::Auth,
        }));
        module.configure(&video_settings()).unwrap();

        let mut ctx = test_context("story");
        ctx.segments = vec![Segment::new(0, 5.0, "First.")];

        let err = module.execute(&ctx).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ExternalService {
                kind: ServiceErrorKind::Auth,
                ..
            }
        ));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_assembly_requires_assets() {
        let mut module = VideoAssemblyModule::new(Arc::new(NullVideoService));
        module.configure(&video_settings()).unwrap();

        let err = module.execute(&test_context("story")).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Dependency {
                missing: StageKind::VideoGeneration,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_effects_require_assembled_artifact() {
        let mut module = VideoEffectsModule::new(Arc::new(NullVideoService));
        module.configure(&video_settings()).unwrap();

        let err = module.execute(&test_context("story")).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Dependency {
                missing: StageKind::VideoAssembly,
                ..
            }
        ));
    }
}
