use thiserror::Error;

/// Errors surfaced by the research pipeline and its collaborators.
#[derive(Error, Debug)]
pub enum FlowError {
    /// The requested operation is not valid in the investigation's current phase.
    #[error("invalid phase for operation: {0}")]
    InvalidPhase(String),

    /// No plan step with the given id exists.
    #[error("step not found: {0}")]
    StepNotFound(u32),

    /// Report generation was requested before any step completed.
    #[error("no completed steps to synthesize")]
    NoCompletedSteps,

    /// The generation backend failed, either in transport or in-band.
    #[error("generation failed: {0}")]
    Generation(String),

    /// The investigation was cancelled.
    #[error("investigation cancelled")]
    Cancelled,

    /// Persistence failed while saving or loading an investigation.
    #[error("storage error: {0}")]
    Storage(String),

    /// No persisted investigation exists under the given id.
    #[error("investigation not found: {0}")]
    InvestigationNotFound(String),
}

pub type Result<T> = std::result::Result<T, FlowError>;
