use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four content-producing steps of the pipeline, in pipeline order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Clarification,
    Description,
    Search,
    Report,
}

impl StageKind {
    /// All stages in fixed pipeline order.
    pub const ALL: [StageKind; 4] = [
        Self::Clarification,
        Self::Description,
        Self::Search,
        Self::Report,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clarification => "clarification",
            Self::Description => "description",
            Self::Search => "search",
            Self::Report => "report",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "clarification" => Some(Self::Clarification),
            "description" => Some(Self::Description),
            "search" => Some(Self::Search),
            "report" => Some(Self::Report),
            _ => None,
        }
    }

    /// Human readable label used in error and warning messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Clarification => "Clarification",
            Self::Description => "Description",
            Self::Search => "Search",
            Self::Report => "Report",
        }
    }

    /// The stage that runs after this one, `None` after the report.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Clarification => Some(Self::Description),
            Self::Description => Some(Self::Search),
            Self::Search => Some(Self::Report),
            Self::Report => None,
        }
    }

    /// Upstream stages whose outputs must be present before this stage runs.
    pub fn dependencies(&self) -> &'static [StageKind] {
        match self {
            Self::Clarification => &[],
            Self::Description => &[Self::Clarification],
            Self::Search => &[Self::Clarification, Self::Description],
            Self::Report => &[Self::Clarification, Self::Description, Self::Search],
        }
    }

    /// Name of the output a stage produces, as it appears in diagnostics.
    pub fn output_name(&self) -> &'static str {
        match self {
            Self::Clarification => "clarification_result",
            Self::Description => "description_result",
            Self::Search => "vendor_results",
            Self::Report => "final_report",
        }
    }

    pub fn start_key(&self) -> String {
        format!("{}_start", self.as_str())
    }

    pub fn complete_key(&self) -> String {
        format!("{}_complete", self.as_str())
    }

    pub fn retry_key(&self, retry: u32) -> String {
        format!("{}_retry_{}", self.as_str(), retry)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Statuses reachable from `self`. `Failed -> Pending` is the retry path.
    pub fn allowed_transitions(&self) -> &'static [StageStatus] {
        match self {
            Self::Pending => &[Self::InProgress],
            Self::InProgress => &[Self::Completed, Self::Failed],
            Self::Failed => &[Self::Pending],
            Self::Completed => &[],
        }
    }

    pub fn can_transition_to(&self, to: StageStatus) -> bool {
        self.allowed_transitions().contains(&to)
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
