//! The research pipeline: phase state, plan parsing, prompts, and the
//! orchestrator that ties them to the collaborator traits.

mod orchestrator;
mod plan;
mod prompts;
mod state;

pub use orchestrator::{CancelToken, ResearchPipeline};
pub use plan::{MAX_PLAN_STEPS, parse_plan, split_autonomous_report};
pub use state::{
    ExecutionResult, ExecutionStatus, InvestigationPhase, InvestigationState, ResearchMetadata,
    ResearchStep, StepStatus,
};
