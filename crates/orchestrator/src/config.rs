use discovery_core::{StageKind, DEFAULT_MAX_RETRIES};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Confidence levels below which a stage result is rejected or flagged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceThresholds {
    /// Clarification results under this confidence are rejected outright.
    pub clarification_reject: f64,
    pub clarification_warn: f64,
    pub description_warn: f64,
    pub search_warn: f64,
    pub report_warn: f64,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            clarification_reject: 0.3,
            clarification_warn: 0.7,
            description_warn: 0.6,
            search_warn: 0.5,
            report_warn: 0.6,
        }
    }
}

impl ConfidenceThresholds {
    /// Warning threshold for a stage.
    pub fn warn_below(&self, kind: StageKind) -> f64 {
        match kind {
            StageKind::Clarification => self.clarification_warn,
            StageKind::Description => self.description_warn,
            StageKind::Search => self.search_warn,
            StageKind::Report => self.report_warn,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub max_retries: u32,
    pub collaborator_timeout_secs: u64,
    /// Whole-session budget; `None` disables it.
    pub session_timeout_secs: Option<u64>,
    pub enable_checkpoints: bool,
    /// Save a checkpoint every N stage boundaries.
    pub checkpoint_interval: u32,
    pub thresholds: ConfidenceThresholds,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            collaborator_timeout_secs: 60,
            session_timeout_secs: Some(300),
            enable_checkpoints: true,
            checkpoint_interval: 1,
            thresholds: ConfidenceThresholds::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    pub fn with_collaborator_timeout(mut self, timeout: Duration) -> Self {
        self.collaborator_timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn with_session_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.session_timeout_secs = timeout.map(|t| t.as_secs().max(1));
        self
    }

    pub fn with_checkpoints(mut self, enabled: bool) -> Self {
        self.enable_checkpoints = enabled;
        self
    }

    pub fn with_checkpoint_interval(mut self, interval: u32) -> Self {
        self.checkpoint_interval = interval;
        self
    }

    pub fn with_thresholds(mut self, thresholds: ConfidenceThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_secs(self.collaborator_timeout_secs)
    }

    pub fn session_timeout(&self) -> Option<Duration> {
        self.session_timeout_secs.map(Duration::from_secs)
    }

    /// Whether a checkpoint is due after `boundaries` stage boundaries.
    pub fn checkpoint_due(&self, boundaries: u32) -> bool {
        self.enable_checkpoints && boundaries % self.checkpoint_interval.max(1) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.collaborator_timeout(), Duration::from_secs(60));
        assert_eq!(config.session_timeout(), Some(Duration::from_secs(300)));
        assert!(config.enable_checkpoints);
        assert_eq!(config.thresholds.clarification_reject, 0.3);
    }

    #[test]
    fn test_config_builder() {
        let config = OrchestratorConfig::new()
            .with_max_retries(5)
            .with_collaborator_timeout(Duration::from_secs(10))
            .with_session_timeout(None)
            .with_checkpoint_interval(2);

        assert_eq!(config.max_retries, 5);
        assert_eq!(config.collaborator_timeout_secs, 10);
        assert!(config.session_timeout().is_none());
        assert!(!config.checkpoint_due(1));
        assert!(config.checkpoint_due(2));
    }

    #[test]
    fn test_checkpoint_due_when_disabled() {
        let config = OrchestratorConfig::new().with_checkpoints(false);
        assert!(!config.checkpoint_due(1));
    }

    #[test]
    fn test_zero_interval_treated_as_every_boundary() {
        let config = OrchestratorConfig::new().with_checkpoint_interval(0);
        assert!(config.checkpoint_due(1));
        assert!(config.checkpoint_due(3));
    }

    #[test]
    fn test_partial_deserialization_keeps_defaults() {
        let config: OrchestratorConfig =
            serde_json::from_str(r#"{"max_retries": 1, "thresholds": {"search_warn": 0.4}}"#)
                .unwrap();
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.thresholds.search_warn, 0.4);
        assert_eq!(config.thresholds.report_warn, 0.6);
        assert_eq!(config.collaborator_timeout_secs, 60);
    }

    #[test]
    fn test_warn_thresholds_per_stage() {
        let thresholds = ConfidenceThresholds::default();
        assert_eq!(thresholds.warn_below(StageKind::Clarification), 0.7);
        assert_eq!(thresholds.warn_below(StageKind::Search), 0.5);
    }
}
