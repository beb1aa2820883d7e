use serde::{Deserialize, Serialize};

use research_flow::{
    InvestigationState, PatientSummaryRecord, RequestedMode, ResearchMode, ResearchStep,
};

#[derive(Debug, Deserialize)]
pub struct StartInvestigationRequest {
    /// Free-text clinical narrative or question, Spanish or English.
    pub query: String,
    /// Client-supplied id (UUID). Generated when absent.
    #[serde(default)]
    pub investigation_id: Option<String>,
    /// Explicit mode override; `auto` scores the case.
    #[serde(default)]
    pub mode: RequestedMode,
}

#[derive(Debug, Serialize)]
pub struct StartInvestigationResponse {
    pub investigation_id: String,
    pub mode: ResearchMode,
    pub status: String,
    pub plan: Vec<ResearchStep>,
    pub response: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub step_id: u32,
    pub feedback: String,
}

#[derive(Debug, Serialize)]
pub struct StepActionResponse {
    pub investigation_id: String,
    pub status: String,
    pub response: Option<String>,
    pub remaining_steps: usize,
}

#[derive(Debug, Serialize)]
pub struct InvestigationStatusResponse {
    pub investigation_id: String,
    pub state: InvestigationState,
    pub patient_summary: PatientSummaryRecord,
    /// Deterministic, bounded summary of the extracted medical context.
    pub context_summary: String,
}
