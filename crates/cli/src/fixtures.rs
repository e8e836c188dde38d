//! Fixture files replayed in place of live collaborators.
//!
//! ```json
//! {
//!   "clarification": [{"ok": {"is_valid_request": true, "clarified_service_name": "Cloud Storage", "confidence_score": 0.9}}],
//!   "description": [{"error": "rate limited"}, {"ok": {"service_overview": "...", "confidence_score": 0.8}}],
//!   "search": [{"ok": {"vendors": [], "confidence_score": 0.7}}],
//!   "report": [{"ok": {"executive_summary": "...", "confidence_score": 0.8}}]
//! }
//! ```
//!
//! Each list is consumed in order and its last entry repeats.

use anyhow::{Context, Result};
use discovery_core::{ClarificationResult, FinalReport, SearchResults, ServiceDescription};
use orchestrator::{Collaborators, ScriptedCollaborator, ScriptedOutcome};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct FixtureFile {
    #[serde(default)]
    pub clarification: Vec<ScriptedOutcome<ClarificationResult>>,
    #[serde(default)]
    pub description: Vec<ScriptedOutcome<ServiceDescription>>,
    #[serde(default)]
    pub search: Vec<ScriptedOutcome<SearchResults>>,
    #[serde(default)]
    pub report: Vec<ScriptedOutcome<FinalReport>>,
}

impl FixtureFile {
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read fixtures {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse fixtures {}", path.display()))
    }

    pub fn into_collaborators(self) -> Collaborators {
        Collaborators {
            clarification: Arc::new(ScriptedCollaborator::from_outcomes(self.clarification)),
            description: Arc::new(ScriptedCollaborator::from_outcomes(self.description)),
            search: Arc::new(ScriptedCollaborator::from_outcomes(self.search)),
            report: Arc::new(ScriptedCollaborator::from_outcomes(self.report)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator::{DiscoveryOrchestrator, OrchestratorConfig};
    use tempfile::TempDir;

    const FIXTURES: &str = r#"{
        "clarification": [{"ok": {"is_valid_request": true, "clarified_service_name": "Cloud Storage", "confidence_score": 0.9}}],
        "description": [{"error": "rate limited"}, {"ok": {"service_overview": "Object storage", "confidence_score": 0.8}}],
        "search": [{"ok": {"vendors": [{"vendor_name": "Acme Storage"}], "confidence_score": 0.7}}],
        "report": [{"ok": {"executive_summary": "Acme Storage fits", "confidence_score": 0.8}}]
    }"#;

    #[tokio::test]
    async fn test_fixture_run() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("fixtures.json");
        std::fs::write(&path, FIXTURES).unwrap();

        let fixtures = FixtureFile::load(&path).await.unwrap();
        assert_eq!(fixtures.description.len(), 2);

        let orchestrator =
            DiscoveryOrchestrator::new(OrchestratorConfig::default(), fixtures.into_collaborators());
        let mut state = orchestrator.create_session("Cloud Storage", "United States", None);
        let result = orchestrator.run_async(&mut state).await;

        assert!(result.success);
        assert_eq!(result.retry_count, 1);
        assert_eq!(
            result.errors,
            vec!["Description generation failed: rate limited".to_string()]
        );
    }

    #[tokio::test]
    async fn test_missing_stage_fails_that_stage() {
        let fixtures: FixtureFile = serde_json::from_str(r#"{"clarification": []}"#).unwrap();
        let orchestrator = DiscoveryOrchestrator::new(
            OrchestratorConfig::new().with_max_retries(0),
            fixtures.into_collaborators(),
        );
        let mut state = orchestrator.create_session("Cloud Storage", "United States", None);

        let result = orchestrator.run_async(&mut state).await;

        assert!(!result.success);
        assert!(result.errors[0].contains("no scripted outcome"));
    }

    #[tokio::test]
    async fn test_demo_fixture_completes() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../demos/fixtures/cloud-storage.json");
        let fixtures = FixtureFile::load(&path).await.unwrap();
        let orchestrator =
            DiscoveryOrchestrator::new(OrchestratorConfig::default(), fixtures.into_collaborators());
        let mut state = orchestrator.create_session("Cloud Storage", "United States", None);

        let result = orchestrator.run_async(&mut state).await;

        assert!(result.success);
        assert_eq!(result.retry_count, 1);
        assert!(result.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_fixture_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("fixtures.json");
        std::fs::write(&path, r#"{"search": [{"maybe": 1}]}"#).unwrap();

        let err = FixtureFile::load(&path).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse fixtures"));
    }
}
