//! Error taxonomy for pipeline execution.
//!
//! Every fatal outcome a run can take is one of these variants, so the
//! terminal session state can carry the classified error and checkpoints
//! can serialize it. Continuity issues are data, not errors, and never
//! appear here.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::stage::StageKind;

/// Classified pipeline error
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum PipelineError {
    /// The run never starts: empty story or no stage enabled
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A stage rejected its parameters during configuration
    #[error("Stage '{stage}' configuration invalid: {message}")]
    Configuration { stage: StageKind, message: String },

    /// A stage ran without its required prior output
    #[error("Stage '{stage}' requires output from '{missing}' which is absent or empty")]
    Dependency { stage: StageKind, missing: StageKind },

    /// Stage-internal failure (e.g. unparseable text)
    #[error("Stage '{stage}' failed: {message}")]
    Module { stage: StageKind, message: String },

    /// Failure from an external backend, classified retryable or terminal
    #[error("Stage '{stage}' external service error ({kind}): {message}")]
    ExternalService {
        stage: StageKind,
        kind: ServiceErrorKind,
        message: String,
    },

    /// Checkpoint read/write failure; logged, disables resume, never aborts
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Cooperative cancellation observed; a distinct terminal state, not a failure
    #[error("Run cancelled")]
    Cancelled,
}

impl PipelineError {
    /// True when the caller may retry with backoff.
    ///
    /// The orchestrator never auto-retries; classification is for the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ExternalService { kind, .. } if kind.is_retryable()
        )
    }
}

/// Classification of external backend failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceErrorKind {
    /// Transient network failure (retryable)
    Network,

    /// Quota exhausted (retryable after backoff)
    Quota,

    /// Credential rejected (terminal)
    Auth,
}

impl ServiceErrorKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::Quota)
    }
}

impl std::fmt::Display for ServiceErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Network => "network",
            Self::Quota => "quota",
            Self::Auth => "auth",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let network = PipelineError::ExternalService {
            stage: StageKind::VideoGeneration,
            kind: ServiceErrorKind::Network,
            message: "connection reset".to_string(),
        };
        let auth = PipelineError::ExternalService {
            stage: StageKind::VideoGeneration,
            kind: ServiceErrorKind::Auth,
            message: "invalid API key".to_string(),
        };

        assert!(network.is_retryable());
        assert!(!auth.is_retryable());
        assert!(!PipelineError::Validation("empty story".to_string()).is_retryable());
    }

    #[test]
    fn test_error_serialization_round_trip() {
        let err = PipelineError::Dependency {
            stage: StageKind::Rewording,
            missing: StageKind::Segmentation,
        };
        let json = serde_json::to_string(&err).unwrap();
        let parsed: PipelineError = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, err);
    }
}
