use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::generation::WebSource;
use crate::mode::ResearchMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Error,
}

/// One unit of the research plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchStep {
    pub id: u32,
    pub title: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<WebSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl ResearchStep {
    pub(crate) fn pending(id: u32, title: String) -> Self {
        Self {
            id,
            title,
            status: StepStatus::Pending,
            result: None,
            sources: Vec::new(),
            feedback: None,
        }
    }

    pub(crate) fn completed(
        id: u32,
        title: impl Into<String>,
        result: String,
        sources: Vec<WebSource>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            status: StepStatus::Completed,
            result: Some(result),
            sources,
            feedback: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvestigationPhase {
    Idle,
    Planning,
    Executing,
    Synthesizing,
    Completed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchMetadata {
    pub mode: ResearchMode,
    pub complexity_score: u32,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Generation calls issued so far, successful or not.
    pub generation_calls: u32,
}

impl Default for ResearchMetadata {
    fn default() -> Self {
        Self {
            mode: ResearchMode::Manual,
            complexity_score: 0,
            started_at: Utc::now(),
            completed_at: None,
            generation_calls: 0,
        }
    }
}

/// Aggregate state of one investigation. Serialized as-is by the persistence
/// collaborator and returned to API consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestigationState {
    pub original_query: String,
    pub plan: Vec<ResearchStep>,
    /// Index of the next step to execute; equals `plan.len()` when no step
    /// is left.
    pub current_step: usize,
    pub phase: InvestigationPhase,
    /// True only while a generation call is in flight.
    pub generating: bool,
    pub cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_report: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub final_report_sources: Vec<WebSource>,
    pub metadata: ResearchMetadata,
}

impl InvestigationState {
    pub(crate) fn idle() -> Self {
        Self {
            original_query: String::new(),
            plan: Vec::new(),
            current_step: 0,
            phase: InvestigationPhase::Idle,
            generating: false,
            cancelled: false,
            error: None,
            final_report: None,
            final_report_sources: Vec::new(),
            metadata: ResearchMetadata::default(),
        }
    }

    /// Terminal: a final report exists or the investigation was cancelled.
    /// An errored investigation is not terminal; callers may retry.
    pub fn is_terminal(&self) -> bool {
        self.final_report.is_some() || self.cancelled
    }

    pub fn completed_steps(&self) -> impl Iterator<Item = &ResearchStep> {
        self.plan
            .iter()
            .filter(|step| step.status == StepStatus::Completed)
    }

    pub fn remaining_steps(&self) -> usize {
        self.plan.len().saturating_sub(self.current_step)
    }
}

/// How one orchestrator call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// Planning finished; the investigation is ready for step execution.
    PlanReady,
    /// The current step completed and the cursor advanced.
    StepCompleted,
    /// The current step failed and was marked error; retry by calling again.
    StepFailed(String),
    /// Synthesis finished; the final report is available.
    ReportReady,
    /// An autonomous run finished end to end.
    Completed,
    /// Cancellation was observed; any late result was discarded.
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub response: Option<String>,
    pub status: ExecutionStatus,
}

impl ExecutionResult {
    pub(crate) fn status_only(status: ExecutionStatus) -> Self {
        Self {
            response: None,
            status,
        }
    }

    pub(crate) fn with_response(response: String, status: ExecutionStatus) -> Self {
        Self {
            response: Some(response),
            status,
        }
    }
}
