use async_trait::async_trait;
use discovery_core::{SessionState, StageKind};
use std::sync::Arc;
use std::time::Duration;

use crate::collaborator::{DescriptionCollaborator, DescriptionInput};
use crate::config::ConfidenceThresholds;
use crate::core::stage::{self, Stage};
use crate::error::{OrchestratorError, Result};

/// Expands the clarified request into a full service description.
pub struct DescriptionStage {
    collaborator: Arc<DescriptionCollaborator>,
    thresholds: ConfidenceThresholds,
    timeout: Duration,
}

impl DescriptionStage {
    pub fn new(
        collaborator: Arc<DescriptionCollaborator>,
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
impl Stage for DescriptionStage {
    fn kind(&self) -> StageKind {
        StageKind::Description
    }

    async fn execute(&self, state: &mut SessionState) -> Result<()> {
        let kind = self.kind();
        stage::require_dependencies(state, kind)?;

        let input = match &state.outputs.clarification {
            Some(clarification) => DescriptionInput {
                clarification: clarification.clone(),
                detail: state.detail().map(str::to_string),
            },
            None => {
                return Err(OrchestratorError::missing_dependency(
                    kind,
                    vec![StageKind::Clarification],
                ))
            }
        };

        stage::begin(state, kind)?;
        let outcome = stage::invoke_with_timeout(self.collaborator.as_ref(), &input, self.timeout)
            .await
            .and_then(|result| stage::check_confidence(result.confidence_score).map(|_| result));

        match outcome {
            Ok(result) => {
                stage::warn_if_low_confidence(
                    state,
                    kind,
                    result.confidence_score,
                    self.thresholds.warn_below(kind),
                );
                state.outputs.description = Some(result);
                stage::complete(state, kind)
            }
            Err(e) => stage::fail(state, kind, format!("Description generation failed: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::ScriptedCollaborator;
    use discovery_core::{ClarificationResult, ServiceDescription, StageStatus};

    fn stage_with(collaborator: ScriptedCollaborator<ServiceDescription>) -> DescriptionStage {
        DescriptionStage::new(
            Arc::new(collaborator),
            ConfidenceThresholds::default(),
            Duration::from_secs(5),
        )
    }

    fn clarified() -> SessionState {
        let mut state = SessionState::new("Cloud Storage", "United States", None);
        stage::begin(&mut state, StageKind::Clarification).unwrap();
        state.outputs.clarification = Some(ClarificationResult {
            is_valid_request: true,
            confidence_score: 0.9,
            ..Default::default()
        });
        stage::complete(&mut state, StageKind::Clarification).unwrap();
        state
    }

    #[tokio::test]
    async fn test_requires_clarification() {
        let stage = stage_with(ScriptedCollaborator::always(ServiceDescription::default()));
        let mut state = SessionState::new("Cloud Storage", "United States", None);

        let err = stage.execute(&mut state).await.unwrap_err();

        assert!(matches!(err, OrchestratorError::MissingDependency { .. }));
        assert_eq!(state.status(StageKind::Description), StageStatus::Pending);
    }

    #[tokio::test]
    async fn test_low_confidence_warning() {
        let stage = stage_with(ScriptedCollaborator::always(ServiceDescription {
            service_overview: "Object storage".to_string(),
            confidence_score: 0.55,
            ..Default::default()
        }));
        let mut state = clarified();

        stage.execute(&mut state).await.unwrap();

        assert_eq!(state.status(StageKind::Description), StageStatus::Completed);
        assert_eq!(state.warnings().len(), 1);
        assert_eq!(state.next_stage, Some(StageKind::Search));
    }

    #[tokio::test]
    async fn test_failure_leaves_other_stages_alone() {
        let stage = stage_with(ScriptedCollaborator::failing("quota"));
        let mut state = clarified();

        stage.execute(&mut state).await.unwrap();

        assert_eq!(state.status(StageKind::Description), StageStatus::Failed);
        assert_eq!(state.status(StageKind::Clarification), StageStatus::Completed);
        assert!(state.outputs.clarification.is_some());
        assert_eq!(state.errors(), ["Description generation failed: quota"]);
    }
}
