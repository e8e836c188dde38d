use thiserror::Error;

use crate::domain::{StageKind, StageStatus};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Invalid {stage} status transition from {from} to {to}")]
    InvalidStatusTransition {
        stage: StageKind,
        from: StageStatus,
        to: StageStatus,
    },

    #[error("Validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = CoreError::InvalidStatusTransition {
            stage: StageKind::Search,
            from: StageStatus::Failed,
            to: StageStatus::Completed,
        };
        let message = error.to_string();
        assert!(message.contains("search"));
        assert!(message.contains("failed"));
        assert!(message.contains("completed"));
    }
}
