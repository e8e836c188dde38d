//! Structured outputs produced by each pipeline stage.
//!
//! List fields default to empty so collaborators may omit what they did not
//! find. `confidence_score` is always required and is expected in `[0, 1]`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::stage::StageKind;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// Output of the clarification stage: the validated, normalised request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ClarificationResult {
    pub is_valid_request: bool,
    pub clarified_service_name: String,
    #[serde(default)]
    pub service_category: String,
    #[serde(default)]
    pub country_code: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub specific_requirements: Vec<String>,
    #[serde(default)]
    pub business_context: String,
    #[serde(default)]
    pub urgency_level: UrgencyLevel,
    #[serde(default)]
    pub budget_range: Option<String>,
    #[serde(default)]
    pub technical_requirements: Vec<String>,
    #[serde(default)]
    pub compliance_requirements: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    pub confidence_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ServiceDescription {
    pub service_overview: String,
    #[serde(default)]
    pub detailed_description: String,
    #[serde(default)]
    pub key_features: Vec<String>,
    #[serde(default)]
    pub technical_specifications: Vec<String>,
    #[serde(default)]
    pub use_cases: Vec<String>,
    #[serde(default)]
    pub industry_applications: Vec<String>,
    #[serde(default)]
    pub benefits: Vec<String>,
    #[serde(default)]
    pub implementation_considerations: Vec<String>,
    #[serde(default)]
    pub compliance_standards: Vec<String>,
    #[serde(default)]
    pub integration_requirements: Vec<String>,
    #[serde(default)]
    pub market_trends: Vec<String>,
    #[serde(default)]
    pub cost_factors: Vec<String>,
    pub confidence_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct VendorInfo {
    pub vendor_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub headquarters: String,
    #[serde(default)]
    pub global_presence: Vec<String>,
    #[serde(default)]
    pub specializations: Vec<String>,
    #[serde(default)]
    pub market_position: String,
    #[serde(default)]
    pub company_size: String,
    #[serde(default)]
    pub year_established: Option<i32>,
    #[serde(default)]
    pub key_clients: Vec<String>,
    #[serde(default)]
    pub certifications: Vec<String>,
    #[serde(default)]
    pub contact_info: BTreeMap<String, String>,
}

/// A regional partner or reseller of one of the discovered vendors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PartnerInfo {
    pub partner_name: String,
    #[serde(default)]
    pub vendor_relationship: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub specializations: Vec<String>,
    #[serde(default)]
    pub certifications: Vec<String>,
    #[serde(default)]
    pub contact_info: BTreeMap<String, String>,
    #[serde(default)]
    pub local_experience: String,
    #[serde(default)]
    pub client_references: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PriceAnalysis {
    #[serde(default)]
    pub price_range_low: Option<f64>,
    #[serde(default)]
    pub price_range_high: Option<f64>,
    pub currency: String,
    #[serde(default)]
    pub pricing_model: String,
    #[serde(default)]
    pub factors_affecting_price: Vec<String>,
    #[serde(default)]
    pub total_cost_ownership: Vec<String>,
    #[serde(default)]
    pub market_average: Option<f64>,
    #[serde(default)]
    pub cost_breakdown: BTreeMap<String, f64>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Output of the search stage. `vendors` is the vendor result list the
/// report stage depends on; it may legitimately be empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SearchResults {
    #[serde(default)]
    pub vendors: Vec<VendorInfo>,
    #[serde(default)]
    pub partners: Vec<PartnerInfo>,
    #[serde(default)]
    pub price_analysis: Option<PriceAnalysis>,
    #[serde(default)]
    pub search_queries_used: Vec<String>,
    #[serde(default)]
    pub sources_consulted: Vec<String>,
    pub confidence_score: f64,
    #[serde(default)]
    pub search_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct VendorRanking {
    pub vendor_name: String,
    pub rank: u32,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub rationale: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    pub session_id: Uuid,
    pub report_version: String,
    pub data_sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FinalReport {
    pub executive_summary: String,
    #[serde(default)]
    pub vendor_rankings: Vec<VendorRanking>,
    #[serde(default)]
    pub partner_recommendations: Vec<String>,
    #[serde(default)]
    pub price_benchmarking: Option<PriceAnalysis>,
    #[serde(default)]
    pub implementation_roadmap: Vec<String>,
    #[serde(default)]
    pub risk_assessment: Vec<String>,
    #[serde(default)]
    pub next_steps: Vec<String>,
    #[serde(default)]
    pub key_findings: Vec<String>,
    pub confidence_score: f64,
    #[serde(default)]
    pub generation_metadata: Option<ReportMetadata>,
}

/// The four optional stage outputs of a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StageOutputs {
    pub clarification: Option<ClarificationResult>,
    pub description: Option<ServiceDescription>,
    pub search: Option<SearchResults>,
    pub report: Option<FinalReport>,
}

impl StageOutputs {
    pub fn is_present(&self, kind: StageKind) -> bool {
        match kind {
            StageKind::Clarification => self.clarification.is_some(),
            StageKind::Description => self.description.is_some(),
            StageKind::Search => self.search.is_some(),
            StageKind::Report => self.report.is_some(),
        }
    }

    /// Self-reported confidence of a stage's output, if present.
    pub fn confidence(&self, kind: StageKind) -> Option<f64> {
        match kind {
            StageKind::Clarification => self.clarification.as_ref().map(|o| o.confidence_score),
            StageKind::Description => self.description.as_ref().map(|o| o.confidence_score),
            StageKind::Search => self.search.as_ref().map(|o| o.confidence_score),
            StageKind::Report => self.report.as_ref().map(|o| o.confidence_score),
        }
    }
}
