pub mod context;
pub mod error;
pub mod generation;
pub mod mode;
pub mod pipeline;
pub mod storage;
pub mod validation;

#[cfg(feature = "gemini")]
pub mod gemini;
#[cfg(feature = "rig")]
pub mod openrouter;

// Re-export commonly used types
pub use context::{ContextEngine, MedicalContext};
pub use error::{FlowError, Result};
pub use generation::{
    GENERATION_ERROR_SENTINEL, GeneratedContent, GenerationClient, GenerationRequest, WebSource,
};
pub use mode::{
    CaseSummary, RequestedMode, ResearchMode, complexity_score, resolve_mode, select_mode,
};
pub use pipeline::{
    CancelToken, ExecutionResult, ExecutionStatus, InvestigationPhase, InvestigationState,
    ResearchPipeline, ResearchStep, StepStatus,
};
pub use storage::{
    InMemoryInvestigationStore, InvestigationRecord, InvestigationStore, PatientSummaryRecord,
    PostgresInvestigationStore,
};
pub use validation::{HeuristicValidator, SourceValidation, SourceValidator, ValidatedSource};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    struct ScriptedClient {
        responses: Mutex<VecDeque<GeneratedContent>>,
    }

    impl ScriptedClient {
        fn new(texts: &[&str]) -> Self {
            Self {
                responses: Mutex::new(
                    texts
                        .iter()
                        .map(|text| GeneratedContent {
                            text: text.to_string(),
                            sources: Vec::new(),
                        })
                        .collect(),
                ),
            }
        }
    }

    #[async_trait]
    impl GenerationClient for ScriptedClient {
        async fn generate(&self, _request: GenerationRequest) -> Result<GeneratedContent> {
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("scripted client ran out of responses"))
        }
    }

    #[tokio::test]
    async fn manual_investigation_runs_end_to_end() {
        let client = Arc::new(ScriptedClient::new(&[
            "1. Identify symptoms\n2. Review the differential\n3. Check current guidelines\n4. Summarize findings",
            "Symptoms consistent with mild evaporative dry eye.",
            "Differential is narrow; blepharitis is the main alternative.",
            "AAO preferred practice pattern favors lifestyle measures first.",
            "Findings support conservative management.",
            "Final report: conservative management with follow-up in six weeks.",
        ]));
        let store = Arc::new(InMemoryInvestigationStore::new());
        let mut pipeline =
            ResearchPipeline::new("inv-smoke", client).with_store(store.clone());

        let started = pipeline
            .start_investigation(
                "45-year-old with mild intermittent dry eye symptoms",
                RequestedMode::Manual,
            )
            .await
            .unwrap();
        assert_eq!(started.status, ExecutionStatus::PlanReady);
        assert_eq!(pipeline.state().plan.len(), 4);

        for _ in 0..4 {
            let result = pipeline.execute_next_step().await.unwrap();
            assert_eq!(result.status, ExecutionStatus::StepCompleted);
        }

        let report = pipeline.generate_report().await.unwrap();
        assert_eq!(report.status, ExecutionStatus::ReportReady);
        assert!(pipeline.state().final_report.as_deref().unwrap().contains("conservative"));
        assert_eq!(pipeline.state().phase, InvestigationPhase::Completed);

        let record = store.get("inv-smoke").await.unwrap().unwrap();
        assert_eq!(record.state.phase, InvestigationPhase::Completed);
        assert_eq!(record.state.metadata.generation_calls, 6);
    }
}
