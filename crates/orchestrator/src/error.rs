use discovery_core::{CoreError, StageKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Dependency error: {stage} requires {}", missing_outputs(.missing))]
    MissingDependency {
        stage: StageKind,
        missing: Vec<StageKind>,
    },

    #[error("Invalid state transition: {0}")]
    InvalidTransition(#[from] CoreError),

    #[error("State consistency violation: {}", .0.join("; "))]
    ConsistencyViolation(Vec<String>),

    #[error("Session timeout after {duration_ms}ms")]
    SessionTimeout { duration_ms: u64 },

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Checkpoint not found: {0}")]
    CheckpointNotFound(String),

    #[error("Runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl OrchestratorError {
    /// Create a dependency error for a stage missing upstream outputs.
    pub fn missing_dependency(stage: StageKind, missing: Vec<StageKind>) -> Self {
        Self::MissingDependency { stage, missing }
    }
}

fn missing_outputs(missing: &[StageKind]) -> String {
    missing
        .iter()
        .map(|kind| kind.output_name())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Failure reported by an external collaborator. Always retryable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CollaboratorError {
    #[error("{0}")]
    Failed(String),

    #[error("timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("invalid output: {0}")]
    InvalidOutput(String),
}

impl CollaboratorError {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}

pub type CollaboratorResult<T> = std::result::Result<T, CollaboratorError>;
