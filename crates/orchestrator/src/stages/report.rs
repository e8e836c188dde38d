use async_trait::async_trait;
use chrono::Utc;
use discovery_core::{ReportMetadata, SessionState, StageKind};
use std::sync::Arc;
use std::time::Duration;

use crate::collaborator::{ReportCollaborator, ReportInput};
use crate::config::ConfidenceThresholds;
use crate::core::stage::{self, Stage};
use crate::error::{OrchestratorError, Result};

const REPORT_VERSION: &str = "1.0";
const DEFAULT_DATA_SOURCES: [&str; 2] = ["web_search", "llm_analysis"];

/// Produces the final procurement report from every upstream output.
pub struct ReportStage {
    collaborator: Arc<ReportCollaborator>,
    thresholds: ConfidenceThresholds,
    timeout: Duration,
}

impl ReportStage {
    pub fn new(
        collaborator: Arc<ReportCollaborator>,
        thresholds: ConfidenceThresholds,
        timeout: Duration,
    ) -> Self {
        Self {
            collaborator,
            thresholds,
            timeout,
        }
    }

    fn input(&self, state: &SessionState) -> Result<ReportInput> {
        let outputs = &state.outputs;
        match (&outputs.clarification, &outputs.description, &outputs.search) {
            (Some(clarification), Some(description), Some(search)) => Ok(ReportInput {
                session_id: state.id(),
                clarification: clarification.clone(),
                description: description.clone(),
                search: search.clone(),
            }),
            _ => Err(OrchestratorError::missing_dependency(
                self.kind(),
                self.kind().dependencies().to_vec(),
            )),
        }
    }
}

#[async_trait]
impl Stage for ReportStage {
    fn kind(&self) -> StageKind {
        StageKind::Report
    }

    async fn execute(&self, state: &mut SessionState) -> Result<()> {
        let kind = self.kind();
        stage::require_dependencies(state, kind)?;
        let input = self.input(state)?;

        stage::begin(state, kind)?;
        let outcome = stage::invoke_with_timeout(self.collaborator.as_ref(), &input, self.timeout)
            .await
            .and_then(|result| stage::check_confidence(result.confidence_score).map(|_| result));

        let mut report = match outcome {
            Ok(report) => report,
            Err(e) => return stage::fail(state, kind, format!("Report generation failed: {}", e)),
        };

        let data_sources = if input.search.sources_consulted.is_empty() {
            DEFAULT_DATA_SOURCES.iter().map(|s| s.to_string()).collect()
        } else {
            input.search.sources_consulted.clone()
        };
        report.generation_metadata = Some(ReportMetadata {
            generated_at: Utc::now(),
            session_id: state.id(),
            report_version: REPORT_VERSION.to_string(),
            data_sources,
        });

        stage::warn_if_low_confidence(
            state,
            kind,
            report.confidence_score,
            self.thresholds.warn_below(kind),
        );
        state.outputs.report = Some(report);
        stage::complete(state, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::ScriptedCollaborator;
    use discovery_core::{
        ClarificationResult, FinalReport, SearchResults, ServiceDescription, StageStatus,
    };

    fn stage_with(collaborator: ScriptedCollaborator<FinalReport>) -> ReportStage {
        ReportStage::new(
            Arc::new(collaborator),
            ConfidenceThresholds::default(),
            Duration::from_secs(5),
        )
    }

    fn report(confidence: f64) -> FinalReport {
        FinalReport {
            executive_summary: "Three vendors shortlisted".to_string(),
            confidence_score: confidence,
            ..Default::default()
        }
    }

    fn searched() -> SessionState {
        let mut state = SessionState::new("Cloud Storage", "United States", None);
        for kind in [StageKind::Clarification, StageKind::Description, StageKind::Search] {
            stage::begin(&mut state, kind).unwrap();
            match kind {
                StageKind::Clarification => {
                    state.outputs.clarification = Some(ClarificationResult {
                        is_valid_request: true,
                        confidence_score: 0.9,
                        ..Default::default()
                    })
                }
                StageKind::Description => {
                    state.outputs.description = Some(ServiceDescription {
                        confidence_score: 0.9,
                        ..Default::default()
                    })
                }
                _ => {
                    state.outputs.search = Some(SearchResults {
                        sources_consulted: vec!["vendor-directory".to_string()],
                        confidence_score: 0.9,
                        ..Default::default()
                    })
                }
            }
            stage::complete(&mut state, kind).unwrap();
        }
        state
    }

    #[tokio::test]
    async fn test_report_stamps_metadata() {
        let stage = stage_with(ScriptedCollaborator::always(report(0.9)));
        let mut state = searched();

        stage.execute(&mut state).await.unwrap();

        let metadata = state
            .outputs
            .report
            .as_ref()
            .and_then(|r| r.generation_metadata.as_ref())
            .unwrap();
        assert_eq!(metadata.session_id, state.id());
        assert_eq!(metadata.report_version, "1.0");
        assert_eq!(metadata.data_sources, vec!["vendor-directory".to_string()]);
        assert!(state.is_complete());
        assert_eq!(state.next_stage, None);
    }

    #[tokio::test]
    async fn test_missing_search_output_is_fatal() {
        let stage = stage_with(ScriptedCollaborator::always(report(0.9)));
        let mut state = searched();
        state.outputs.search = None;

        let err = stage.execute(&mut state).await.unwrap_err();

        assert!(err.to_string().contains("vendor_results"));
        assert_eq!(state.status(StageKind::Report), StageStatus::Pending);
        assert_eq!(state.retry_count(), 0);
        assert!(state.errors().is_empty());
    }

    #[tokio::test]
    async fn test_failure_message() {
        let stage = stage_with(ScriptedCollaborator::failing("context too long"));
        let mut state = searched();

        stage.execute(&mut state).await.unwrap();

        assert_eq!(state.status(StageKind::Report), StageStatus::Failed);
        assert_eq!(state.errors(), ["Report generation failed: context too long"]);
    }
}
