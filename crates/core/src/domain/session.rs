use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::outputs::StageOutputs;
use super::stage::{StageKind, StageStatus};
use crate::error::CoreError;

pub const DEFAULT_MAX_RETRIES: u32 = 3;

const WORKFLOW_START: &str = "workflow_start";

/// The request a session was created for. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionInputs {
    pub subject: String,
    pub locale: String,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
struct StageStatuses {
    clarification: StageStatus,
    description: StageStatus,
    search: StageStatus,
    report: StageStatus,
}

impl StageStatuses {
    fn get(&self, kind: StageKind) -> StageStatus {
        match kind {
            StageKind::Clarification => self.clarification,
            StageKind::Description => self.description,
            StageKind::Search => self.search,
            StageKind::Report => self.report,
        }
    }

    fn slot(&mut self, kind: StageKind) -> &mut StageStatus {
        match kind {
            StageKind::Clarification => &mut self.clarification,
            StageKind::Description => &mut self.description,
            StageKind::Search => &mut self.search,
            StageKind::Report => &mut self.report,
        }
    }
}

/// Mutable record threaded through the pipeline for one discovery request.
///
/// Identity, inputs, statuses, the retry counter and the diagnostic logs are
/// only reachable through methods that keep them consistent: statuses move
/// along [`StageStatus::allowed_transitions`], the retry counter never goes
/// down and the error, warning and timestamp logs are append-only. Stage
/// outputs and the `next_stage` hint are plain fields; [`validate`] reports
/// any mismatch between them and the statuses.
///
/// [`validate`]: SessionState::validate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionState {
    id: Uuid,
    inputs: SessionInputs,
    statuses: StageStatuses,
    pub outputs: StageOutputs,
    /// Explicit routing hint; authoritative over the status-derived order.
    pub next_stage: Option<StageKind>,
    retry_count: u32,
    max_retries: u32,
    rejected: Option<StageKind>,
    errors: Vec<String>,
    warnings: Vec<String>,
    timestamps: BTreeMap<String, DateTime<Utc>>,
    started_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(
        subject: impl Into<String>,
        locale: impl Into<String>,
        detail: Option<String>,
    ) -> Self {
        let now = Utc::now();
        let detail = detail
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let mut timestamps = BTreeMap::new();
        timestamps.insert(WORKFLOW_START.to_string(), now);

        Self {
            id: Uuid::new_v4(),
            inputs: SessionInputs {
                subject: subject.into().trim().to_string(),
                locale: locale.into().trim().to_string(),
                detail,
            },
            statuses: StageStatuses::default(),
            outputs: StageOutputs::default(),
            next_stage: Some(StageKind::Clarification),
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            rejected: None,
            errors: Vec::new(),
            warnings: Vec::new(),
            timestamps,
            started_at: now,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn inputs(&self) -> &SessionInputs {
        &self.inputs
    }

    pub fn subject(&self) -> &str {
        &self.inputs.subject
    }

    pub fn locale(&self) -> &str {
        &self.inputs.locale
    }

    pub fn detail(&self) -> Option<&str> {
        self.inputs.detail.as_deref()
    }

    pub fn status(&self, kind: StageKind) -> StageStatus {
        self.statuses.get(kind)
    }

    /// All stage statuses in pipeline order.
    pub fn statuses(&self) -> [(StageKind, StageStatus); 4] {
        StageKind::ALL.map(|kind| (kind, self.status(kind)))
    }

    /// Move a stage to a new status, returning the previous one.
    pub fn transition(&mut self, kind: StageKind, to: StageStatus) -> Result<StageStatus, CoreError> {
        let slot = self.statuses.slot(kind);
        let from = *slot;
        if !from.can_transition_to(to) {
            return Err(CoreError::InvalidStatusTransition {
                stage: kind,
                from,
                to,
            });
        }
        *slot = to;
        Ok(from)
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn retries_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }

    /// Bump the retry counter and return the new value.
    pub fn increment_retry(&mut self) -> u32 {
        self.retry_count += 1;
        self.retry_count
    }

    pub fn rejected(&self) -> Option<StageKind> {
        self.rejected
    }

    pub fn is_rejected(&self, kind: StageKind) -> bool {
        self.rejected == Some(kind)
    }

    /// Mark a stage as rejected by business validation. Rejected stages are
    /// never retried.
    pub fn reject(&mut self, kind: StageKind) {
        self.rejected = Some(kind);
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    pub fn record_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn timestamps(&self) -> &BTreeMap<String, DateTime<Utc>> {
        &self.timestamps
    }

    pub fn timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        self.timestamps.get(key).copied()
    }

    /// Record the current instant under `key`. Re-stamping a key (a retried
    /// stage's start, for instance) keeps the latest instant.
    pub fn stamp(&mut self, key: impl Into<String>) -> DateTime<Utc> {
        let now = Utc::now();
        self.timestamps.insert(key.into(), now);
        now
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Time between session start and the latest recorded timestamp.
    ///
    /// Derived from recorded instants only, so repeated calls on an
    /// unmodified session agree.
    pub fn elapsed(&self) -> Duration {
        self.timestamps
            .values()
            .max()
            .map(|last| *last - self.started_at)
            .unwrap_or_else(Duration::zero)
    }

    /// First stage in pipeline order whose status is FAILED.
    pub fn first_failed(&self) -> Option<StageKind> {
        StageKind::ALL
            .into_iter()
            .find(|kind| self.status(*kind) == StageStatus::Failed)
    }

    /// First stage in pipeline order that has not completed yet.
    pub fn first_incomplete(&self) -> Option<StageKind> {
        StageKind::ALL
            .into_iter()
            .find(|kind| self.status(*kind) != StageStatus::Completed)
    }

    pub fn in_progress(&self) -> Vec<StageKind> {
        StageKind::ALL
            .into_iter()
            .filter(|kind| self.status(*kind) == StageStatus::InProgress)
            .collect()
    }

    pub fn completed_count(&self) -> usize {
        StageKind::ALL
            .iter()
            .filter(|kind| self.status(**kind) == StageStatus::Completed)
            .count()
    }

    pub fn is_complete(&self) -> bool {
        self.completed_count() == StageKind::ALL.len()
    }

    /// A stage failed and nothing is allowed to retry it.
    pub fn has_failed(&self) -> bool {
        match self.first_failed() {
            Some(kind) => self.retries_exhausted() || self.is_rejected(kind),
            None => false,
        }
    }

    /// Return every invariant violation; empty when the state is consistent.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.inputs.subject.is_empty() {
            errors.push("Missing required field: subject".to_string());
        }
        if self.inputs.locale.is_empty() {
            errors.push("Missing required field: locale".to_string());
        }

        for kind in StageKind::ALL {
            let completed = self.status(kind) == StageStatus::Completed;
            let present = self.outputs.is_present(kind);
            if completed && !present {
                errors.push(format!(
                    "{} marked complete but no {} found",
                    kind.label(),
                    kind.output_name()
                ));
            } else if present && !completed {
                errors.push(format!(
                    "{} holds {} while {}",
                    kind.label(),
                    kind.output_name(),
                    self.status(kind)
                ));
            }
        }

        let running = self.in_progress();
        if running.len() > 1 {
            let names: Vec<&str> = running.iter().map(|k| k.as_str()).collect();
            errors.push(format!(
                "Multiple stages in progress: {}",
                names.join(", ")
            ));
        }

        if self.retry_count > self.max_retries {
            errors.push("Retry count exceeds maximum allowed retries".to_string());
        }

        errors
    }
}
