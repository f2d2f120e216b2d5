//! Adapter interfaces for external backends.
//!
//! The video stages talk to the generation vendor only through
//! [`VideoService`], so the wire protocol stays out of the pipeline core and
//! tests can substitute doubles.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::core::error::ServiceErrorKind;
use crate::domain::{AssetRef, ProcessingMode, PromptSegment, VideoSettings};

/// Failure reported by an external backend, carrying its retry class
#[derive(Debug, Clone, Error)]
#[error("{kind} error: {message}")]
pub struct ServiceError {
    pub kind: ServiceErrorKind,
    pub message: String,
}

impl ServiceError {
    pub fn new(kind: ServiceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Contract the video-generation vendor must satisfy
#[async_trait]
pub trait VideoService: Send + Sync + std::fmt::Debug {
    /// Human-readable service name
    fn name(&self) -> &str;

    /// Render one prompt segment into a clip
    async fn generate_clip(
        &self,
        prompt: &PromptSegment,
        settings: &VideoSettings,
    ) -> Result<AssetRef, ServiceError>;

    /// Stitch generated clips into a single artifact
    async fn assemble(&self, assets: &[AssetRef]) -> Result<PathBuf, ServiceError>;

    /// Apply post-processing to an assembled artifact
    async fn apply_effects(
        &self,
        artifact: &Path,
        mode: ProcessingMode,
    ) -> Result<PathBuf, ServiceError>;
}

/// Offline stand-in that fabricates deterministic asset references.
///
/// The default service; real vendor clients plug in behind the same trait.
#[derive(Debug, Default)]
pub struct NullVideoService;

#[async_trait]
impl VideoService for NullVideoService {
    fn name(&self) -> &str {
        "null"
    }

    async fn generate_clip(
        &self,
        prompt: &PromptSegment,
        settings: &VideoSettings,
    ) -> Result<AssetRef, ServiceError> {
        Ok(AssetRef {
            segment_index: prompt.index,
            asset_id: format!("clip-{:04}", prompt.index),
            duration: settings.duration_seconds as f64,
        })
    }

    async fn assemble(&self, assets: &[AssetRef]) -> Result<PathBuf, ServiceError> {
        if assets.is_empty() {
            return Err(ServiceError::new(
                ServiceErrorKind::Network,
                "no clips to assemble",
            ));
        }
        Ok(PathBuf::from(format!("assembled-{}-clips.mp4", assets.len())))
    }

    async fn apply_effects(
        &self,
        artifact: &Path,
        mode: ProcessingMode,
    ) -> Result<PathBuf, ServiceError> {
        let stem = artifact
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "artifact".to_string());
        Ok(PathBuf::from(format!(
            "{}-{}.mp4",
            stem,
            mode.display_name()
        )))
    }
}

/// Test double that fails every call with a fixed error class
#[derive(Debug)]
pub struct FailingVideoService {
    pub kind: ServiceErrorKind,
}

#[async_trait]
impl VideoService for FailingVideoService {
    fn name(&self) -> &str {
        "failing"
    }

    async fn generate_clip(
        &self,
        _prompt: &PromptSegment,
        _settings: &VideoSettings,
    ) -> Result<AssetRef, ServiceError> {
        Err(ServiceError::new(self.kind, "simulated backend failure"))
    }

    async fn assemble(&self, _assets: &[AssetRef]) -> Result<PathBuf, ServiceError> {
        Err(ServiceError::new(self.kind, "simulated backend failure"))
    }

    async fn apply_effects(
        &self,
        _artifact: &Path,
        _mode: ProcessingMode,
    ) -> Result<PathBuf, ServiceError> {
        Err(ServiceError::new(self.kind, "simulated backend failure"))
    }
}
