use async_trait::async_trait;
use chrono::Utc;
use discovery_core::{SessionState, StageKind};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::collaborator::{SearchCollaborator, SearchInput};
use crate::config::ConfidenceThresholds;
use crate::core::stage::{self, Stage};
use crate::error::{OrchestratorError, Result};

/// Finds vendors and local partners for the described service.
pub struct SearchStage {
    collaborator: Arc<SearchCollaborator>,
    thresholds: ConfidenceThresholds,
    timeout: Duration,
}

impl SearchStage {
    pub fn new(
        collaborator: Arc<SearchCollaborator>,
        thresholds: ConfidenceThresholds,
        timeout: Duration,
    ) -> Self {
        Self {
            collaborator,
            thresholds,
            timeout,
        }
    }

    fn input(&self, state: &SessionState) -> Result<SearchInput> {
        let outputs = &state.outputs;
        match (&outputs.clarification, &outputs.description) {
            (Some(clarification), Some(description)) => Ok(SearchInput {
                clarification: clarification.clone(),
                description: description.clone(),
            }),
            _ => Err(OrchestratorError::missing_dependency(
                self.kind(),
                vec![StageKind::Clarification, StageKind::Description],
            )),
        }
    }
}

#[async_trait]
impl Stage for SearchStage {
    fn kind(&self) -> StageKind {
        StageKind::Search
    }

    async fn execute(&self, state: &mut SessionState) -> Result<()> {
        let kind = self.kind();
        stage::require_dependencies(state, kind)?;
        let input = self.input(state)?;

        stage::begin(state, kind)?;
        let outcome = stage::invoke_with_timeout(self.collaborator.as_ref(), &input, self.timeout)
            .await
            .and_then(|result| stage::check_confidence(result.confidence_score).map(|_| result));

        let mut result = match outcome {
            Ok(result) => result,
            Err(e) => return stage::fail(state, kind, format!("Search failed: {}", e)),
        };

        if result.search_timestamp.is_none() {
            result.search_timestamp = Some(Utc::now());
        }
        info!(
            session_id = %state.id(),
            vendors = result.vendors.len(),
            partners = result.partners.len(),
            "Search finished"
        );

        if result.vendors.is_empty() {
            state.record_warning(format!(
                "No vendors found for {}",
                input.clarification.clarified_service_name
            ));
        }
        stage::warn_if_low_confidence(
            state,
            kind,
            result.confidence_score,
            self.thresholds.warn_below(kind),
        );

        state.outputs.search = Some(result);
        stage::complete(state, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::ScriptedCollaborator;
    use crate::error::CollaboratorError;
    use discovery_core::{
        ClarificationResult, SearchResults, ServiceDescription, StageStatus, VendorInfo,
    };

    fn stage_with(collaborator: ScriptedCollaborator<SearchResults>) -> SearchStage {
        SearchStage::new(
            Arc::new(collaborator),
            ConfidenceThresholds::default(),
            Duration::from_secs(5),
        )
    }

    fn described() -> SessionState {
        let mut state = SessionState::new("Cloud Storage", "United States", None);
        for kind in [StageKind::Clarification, StageKind::Description] {
            stage::begin(&mut state, kind).unwrap();
            match kind {
                StageKind::Clarification => {
                    state.outputs.clarification = Some(ClarificationResult {
                        is_valid_request: true,
                        clarified_service_name: "Cloud Storage".to_string(),
                        confidence_score: 0.9,
                        ..Default::default()
                    })
                }
                _ => {
                    state.outputs.description = Some(ServiceDescription {
                        confidence_score: 0.9,
                        ..Default::default()
                    })
                }
            }
            stage::complete(&mut state, kind).unwrap();
        }
        state
    }

    fn results(vendors: usize, confidence: f64) -> SearchResults {
        SearchResults {
            vendors: (0..vendors)
                .map(|i| VendorInfo {
                    vendor_name: format!("Vendor {}", i),
                    ..Default::default()
                })
                .collect(),
            confidence_score: confidence,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_success_fills_timestamp() {
        let stage = stage_with(ScriptedCollaborator::always(results(2, 0.8)));
        let mut state = described();

        stage.execute(&mut state).await.unwrap();

        let search = state.outputs.search.as_ref().unwrap();
        assert!(search.search_timestamp.is_some());
        assert_eq!(state.status(StageKind::Search), StageStatus::Completed);
        assert_eq!(state.next_stage, Some(StageKind::Report));
        assert!(state.warnings().is_empty());
    }

    #[tokio::test]
    async fn test_empty_vendor_list_warns() {
        let stage = stage_with(ScriptedCollaborator::always(results(0, 0.8)));
        let mut state = described();

        stage.execute(&mut state).await.unwrap();

        assert_eq!(state.status(StageKind::Search), StageStatus::Completed);
        assert_eq!(state.warnings(), ["No vendors found for Cloud Storage"]);
    }

    #[tokio::test]
    async fn test_missing_description_is_dependency_error() {
        let stage = stage_with(ScriptedCollaborator::always(results(1, 0.8)));
        let mut state = described();
        state.outputs.description = None;

        let err = stage.execute(&mut state).await.unwrap_err();

        assert!(matches!(
            err,
            OrchestratorError::MissingDependency { stage: StageKind::Search, .. }
        ));
        assert_eq!(state.status(StageKind::Search), StageStatus::Pending);
        assert_eq!(state.retry_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_stage_failure() {
        let stage = SearchStage::new(
            Arc::new(ScriptedCollaborator::always(results(1, 0.8)).with_delay(Duration::from_secs(30))),
            ConfidenceThresholds::default(),
            Duration::from_secs(2),
        );
        let mut state = described();

        stage.execute(&mut state).await.unwrap();

        assert_eq!(state.status(StageKind::Search), StageStatus::Failed);
        assert_eq!(
            state.errors(),
            [format!("Search failed: {}", CollaboratorError::Timeout { after_ms: 2000 })]
        );
        assert!(stage.should_retry(&state));
    }
}
