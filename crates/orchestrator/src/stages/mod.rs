//! The four pipeline stages.
//!
//! Dispatch is closed: [`Stages::get`] maps every [`StageKind`] to exactly
//! one implementation, so the router never deals with an unknown stage.

mod clarification;
mod description;
mod report;
mod search;

pub use clarification::ClarificationStage;
pub use description::DescriptionStage;
pub use report::ReportStage;
pub use search::SearchStage;

use discovery_core::StageKind;

use crate::collaborator::Collaborators;
use crate::config::OrchestratorConfig;
use crate::core::Stage;

pub struct Stages {
    clarification: ClarificationStage,
    description: DescriptionStage,
    search: SearchStage,
    report: ReportStage,
}

impl Stages {
    pub fn new(collaborators: &Collaborators, config: &OrchestratorConfig) -> Self {
        let thresholds = config.thresholds;
        let timeout = config.collaborator_timeout();
        Self {
            clarification: ClarificationStage::new(
                collaborators.clarification.clone(),
                thresholds,
                timeout,
            ),
            description: DescriptionStage::new(
                collaborators.description.clone(),
                thresholds,
                timeout,
            ),
            search: SearchStage::new(collaborators.search.clone(), thresholds, timeout),
            report: ReportStage::new(collaborators.report.clone(), thresholds, timeout),
        }
    }

    pub fn get(&self, kind: StageKind) -> &dyn Stage {
        match kind {
            StageKind::Clarification => &self.clarification,
            StageKind::Description => &self.description,
            StageKind::Search => &self.search,
            StageKind::Report => &self.report,
        }
    }
}
