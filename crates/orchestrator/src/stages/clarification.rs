use async_trait::async_trait;
use discovery_core::{SessionState, StageKind};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::collaborator::{ClarificationCollaborator, ClarificationInput};
use crate::config::ConfidenceThresholds;
use crate::core::stage::{self, Stage};
use crate::error::Result;

/// Validates and normalises the raw request before any content is produced.
pub struct ClarificationStage {
    collaborator: Arc<ClarificationCollaborator>,
    thresholds: ConfidenceThresholds,
    timeout: Duration,
}

impl ClarificationStage {
    pub fn new(
        collaborator: Arc<ClarificationCollaborator>,
        thresholds: ConfidenceThresholds,
        timeout: Duration,
    ) -> Self {
        Self {
            collaborator,
            thresholds,
            timeout,
        }
    }
}

#[async_trait]
impl Stage for ClarificationStage {
    fn kind(&self) -> StageKind {
        StageKind::Clarification
    }

    async fn execute(&self, state: &mut SessionState) -> Result<()> {
        let kind = self.kind();
        stage::require_dependencies(state, kind)?;
        stage::begin(state, kind)?;

        let input = ClarificationInput::from_state(state);
        let outcome = stage::invoke_with_timeout(self.collaborator.as_ref(), &input, self.timeout)
            .await
            .and_then(|result| stage::check_confidence(result.confidence_score).map(|_| result));

        let result = match outcome {
            Ok(result) => result,
            Err(e) => return stage::fail(state, kind, format!("Clarification failed: {}", e)),
        };

        let confidence = result.confidence_score;
        stage::warn_if_low_confidence(
            state,
            kind,
            confidence,
            self.thresholds.warn_below(kind),
        );

        if !result.is_valid_request || confidence < self.thresholds.clarification_reject {
            warn!(
                session_id = %state.id(),
                valid = result.is_valid_request,
                confidence,
                "Request rejected by clarification"
            );
            state.reject(kind);
            return stage::fail(
                state,
                kind,
                format!("Request validation failed. Confidence: {:.2}", confidence),
            );
        }

        state.outputs.clarification = Some(result);
        stage::complete(state, kind)
    }
}
