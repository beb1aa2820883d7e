//! End-to-end pipeline flows against a scripted generation backend.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use research_flow::{
    CancelToken, ExecutionStatus, FlowError, GeneratedContent, GenerationClient,
    GenerationRequest, InMemoryInvestigationStore, InvestigationPhase, InvestigationStore,
    RequestedMode, ResearchMode, ResearchPipeline, Result, StepStatus, WebSource,
};

enum Script {
    Text(&'static str),
    TextWithSources(&'static str, Vec<WebSource>),
    /// Cancel the armed token, then return the text anyway; the pipeline
    /// must throw the result away.
    CancelThenText(&'static str),
}

struct ScriptedClient {
    script: Mutex<VecDeque<Script>>,
    prompts: Mutex<Vec<String>>,
    token: Mutex<Option<CancelToken>>,
}

impl ScriptedClient {
    fn new(script: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            prompts: Mutex::new(Vec::new()),
            token: Mutex::new(None),
        })
    }

    fn arm_cancel(&self, token: CancelToken) {
        *self.token.lock().unwrap() = Some(token);
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn generate(&self, request: GenerationRequest) -> Result<GeneratedContent> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        let action = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .expect("scripted client ran out of responses");
        let content = match action {
            Script::Text(text) => GeneratedContent {
                text: text.to_string(),
                sources: Vec::new(),
            },
            Script::TextWithSources(text, sources) => GeneratedContent {
                text: text.to_string(),
                sources,
            },
            Script::CancelThenText(text) => {
                if let Some(token) = self.token.lock().unwrap().as_ref() {
                    token.cancel();
                }
                GeneratedContent {
                    text: text.to_string(),
                    sources: Vec::new(),
                }
            }
        };
        Ok(content)
    }
}

const PLAN_TEXT: &str =
    "1. Identify symptoms\n2. Review the differential\n3. Check current guidelines\n4. Summarize findings";

const HEADED_REPORT: &str = "## Initial analysis\nAcute painless monocular vision loss in an elderly patient points to a vascular event.\n\n## Differential evaluation\nCentral retinal artery occlusion is most likely; retinal detachment and GCA-related AION must be considered.\n\n## Synthesis\nImmediate ophthalmic evaluation, ESR/CRP to exclude giant cell arteritis, and stroke workup.";

const EMERGENT_QUERY: &str = "70-year-old male with sudden painless vision loss in the right eye since this morning, history of atrial fibrillation and hypertension";

fn aao_sources() -> Vec<WebSource> {
    vec![
        WebSource::new("https://www.aao.org/education/crao", "CRAO guidance"),
        WebSource::new("https://pubmed.ncbi.nlm.nih.gov/33333", "CRAO outcomes journal study"),
        // Duplicate URI, should be collapsed by validation.
        WebSource::new("https://www.aao.org/education/crao", "CRAO guidance (again)"),
    ]
}

#[tokio::test]
async fn deep_research_splits_one_pass_into_three_steps() {
    let client = ScriptedClient::new(vec![Script::TextWithSources(HEADED_REPORT, aao_sources())]);
    let mut pipeline = ResearchPipeline::new("inv-deep", client.clone());

    let result = pipeline
        .start_investigation(EMERGENT_QUERY, RequestedMode::DeepResearch)
        .await
        .unwrap();
    assert_eq!(result.status, ExecutionStatus::Completed);

    let state = pipeline.state();
    assert_eq!(state.phase, InvestigationPhase::Completed);
    assert_eq!(state.plan.len(), 3);
    assert!(state.plan.iter().all(|s| s.status == StepStatus::Completed));
    assert_eq!(state.plan[0].title, "Initial analysis");
    assert_eq!(state.plan[1].title, "Differential evaluation");
    assert_eq!(state.plan[2].title, "Synthesis");
    assert!(state.plan[0].result.as_deref().unwrap().contains("vascular event"));
    assert!(state.plan[1].result.as_deref().unwrap().contains("artery occlusion"));
    assert!(state.plan[2].result.as_deref().unwrap().contains("giant cell"));

    // Validation deduplicated the repeated URI.
    assert_eq!(state.final_report_sources.len(), 2);
    assert_eq!(state.plan[2].sources.len(), 2);
    assert!(state.metadata.completed_at.is_some());
    assert_eq!(state.metadata.generation_calls, 1);

    // Grounded sources fed the evidence counters.
    let evidence = &pipeline.context().evidence_quality;
    assert_eq!(evidence.total_sources, 2);
    assert!(evidence.high_quality_sources >= 1);
}

#[tokio::test]
async fn hybrid_adds_transparency_steps() {
    let client = ScriptedClient::new(vec![Script::TextWithSources(HEADED_REPORT, aao_sources())]);
    let mut pipeline = ResearchPipeline::new("inv-hybrid", client);

    let result = pipeline
        .start_investigation(EMERGENT_QUERY, RequestedMode::Hybrid)
        .await
        .unwrap();
    assert_eq!(result.status, ExecutionStatus::Completed);

    let state = pipeline.state();
    assert_eq!(state.plan.len(), 5);
    assert_eq!(state.plan[3].title, "Consulted sources");
    assert!(
        state.plan[3]
            .result
            .as_deref()
            .unwrap()
            .contains("https://www.aao.org/education/crao")
    );
    assert_eq!(state.plan[4].title, "Evidence assessment");
    let assessment = state.plan[4].result.as_deref().unwrap();
    assert!(assessment.contains("Sources considered: 2"));
    assert!(assessment.contains("Consensus:"));
}

#[tokio::test]
async fn auto_mode_picks_deep_research_for_emergent_cases() {
    let client = ScriptedClient::new(vec![Script::Text(HEADED_REPORT)]);
    let mut pipeline = ResearchPipeline::new("inv-auto", client);

    pipeline
        .start_investigation(EMERGENT_QUERY, RequestedMode::Auto)
        .await
        .unwrap();
    assert_eq!(pipeline.state().metadata.mode, ResearchMode::DeepResearch);
    assert!(pipeline.state().metadata.complexity_score >= 6);
}

#[tokio::test]
async fn auto_mode_picks_manual_for_simple_cases() {
    let client = ScriptedClient::new(vec![Script::Text(PLAN_TEXT)]);
    let mut pipeline = ResearchPipeline::new("inv-auto-manual", client);

    let result = pipeline
        .start_investigation("Mild intermittent dry eye symptoms", RequestedMode::Auto)
        .await
        .unwrap();
    assert_eq!(result.status, ExecutionStatus::PlanReady);
    assert_eq!(pipeline.state().metadata.mode, ResearchMode::Manual);
}

#[tokio::test]
async fn failed_step_is_reported_and_retryable() {
    let client = ScriptedClient::new(vec![
        Script::Text(PLAN_TEXT),
        Script::Text("[GENERATION_ERROR]: upstream timeout"),
        Script::Text("Symptoms identified on retry."),
    ]);
    let mut pipeline = ResearchPipeline::new("inv-retry", client);
    pipeline
        .start_investigation("Mild dry eye", RequestedMode::Manual)
        .await
        .unwrap();

    let failed = pipeline.execute_next_step().await.unwrap();
    let ExecutionStatus::StepFailed(reason) = failed.status else {
        panic!("expected StepFailed, got {:?}", failed.status);
    };
    assert!(reason.contains("timeout"));
    assert_eq!(pipeline.state().plan[0].status, StepStatus::Error);
    assert_eq!(pipeline.state().current_step, 0, "cursor must not advance");
    assert_eq!(pipeline.state().phase, InvestigationPhase::Executing);

    let retried = pipeline.execute_next_step().await.unwrap();
    assert_eq!(retried.status, ExecutionStatus::StepCompleted);
    assert_eq!(pipeline.state().plan[0].status, StepStatus::Completed);
    assert_eq!(pipeline.state().current_step, 1);
}

#[tokio::test]
async fn planning_failure_is_retryable_from_error_phase() {
    let client = ScriptedClient::new(vec![
        Script::Text("[GENERATION_ERROR]: model overloaded"),
        Script::Text(PLAN_TEXT),
    ]);
    let mut pipeline = ResearchPipeline::new("inv-replan", client);

    let err = pipeline
        .start_investigation("Mild dry eye", RequestedMode::Manual)
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Generation(_)));
    assert_eq!(pipeline.state().phase, InvestigationPhase::Error);
    assert!(pipeline.state().error.as_deref().unwrap().contains("overloaded"));

    let retried = pipeline
        .start_investigation("Mild dry eye", RequestedMode::Manual)
        .await
        .unwrap();
    assert_eq!(retried.status, ExecutionStatus::PlanReady);
    assert_eq!(pipeline.state().phase, InvestigationPhase::Executing);
    assert!(pipeline.state().error.is_none());
    // The call meter survives the retry.
    assert_eq!(pipeline.state().metadata.generation_calls, 2);
}

#[tokio::test]
async fn cancellation_discards_the_in_flight_result() {
    let client = ScriptedClient::new(vec![
        Script::Text(PLAN_TEXT),
        Script::CancelThenText("This arrived after cancellation."),
    ]);
    let mut pipeline = ResearchPipeline::new("inv-cancel", client.clone());
    client.arm_cancel(pipeline.cancel_token());

    pipeline
        .start_investigation("Mild dry eye", RequestedMode::Manual)
        .await
        .unwrap();

    let result = pipeline.execute_next_step().await.unwrap();
    assert_eq!(result.status, ExecutionStatus::Cancelled);
    assert!(result.response.is_none());

    let state = pipeline.state();
    assert!(state.cancelled);
    assert!(state.is_terminal());
    // The late result was discarded; the step never completed.
    assert_eq!(state.plan[0].status, StepStatus::InProgress);
    assert!(state.plan[0].result.is_none());

    // Every further operation short-circuits.
    let after = pipeline.execute_next_step().await.unwrap();
    assert_eq!(after.status, ExecutionStatus::Cancelled);
    let report = pipeline.generate_report().await.unwrap();
    assert_eq!(report.status, ExecutionStatus::Cancelled);
}

#[tokio::test]
async fn report_can_be_built_from_partial_steps() {
    let client = ScriptedClient::new(vec![
        Script::Text(PLAN_TEXT),
        Script::TextWithSources(
            "Symptoms identified.",
            vec![WebSource::new("https://www.aao.org/one", "One")],
        ),
        Script::TextWithSources(
            "Differential reviewed.",
            vec![
                WebSource::new("https://www.aao.org/one", "One"),
                WebSource::new("https://www.aao.org/two", "Two"),
            ],
        ),
        Script::Text("Final report over two completed steps."),
    ]);
    let mut pipeline = ResearchPipeline::new("inv-partial", client);
    pipeline
        .start_investigation("Mild dry eye", RequestedMode::Manual)
        .await
        .unwrap();
    pipeline.execute_next_step().await.unwrap();
    pipeline.execute_next_step().await.unwrap();

    let report = pipeline.generate_report().await.unwrap();
    assert_eq!(report.status, ExecutionStatus::ReportReady);

    let state = pipeline.state();
    assert_eq!(state.phase, InvestigationPhase::Completed);
    assert!(state.final_report.as_deref().unwrap().contains("two completed"));
    // Two steps still pending; the report says so implicitly via the plan.
    assert_eq!(
        state.plan.iter().filter(|s| s.status == StepStatus::Pending).count(),
        2
    );
    // Step sources aggregate deduplicated across steps.
    let uris: Vec<&str> = state
        .final_report_sources
        .iter()
        .map(|s| s.uri.as_str())
        .collect();
    assert_eq!(uris, vec!["https://www.aao.org/one", "https://www.aao.org/two"]);
}

#[tokio::test]
async fn report_can_be_regenerated_after_completion() {
    let client = ScriptedClient::new(vec![
        Script::Text(PLAN_TEXT),
        Script::Text("Symptoms identified."),
        Script::Text("First draft of the report."),
        Script::Text("Second draft of the report."),
    ]);
    let mut pipeline = ResearchPipeline::new("inv-regen", client);
    pipeline
        .start_investigation("Mild dry eye", RequestedMode::Manual)
        .await
        .unwrap();
    pipeline.execute_next_step().await.unwrap();
    pipeline.generate_report().await.unwrap();
    assert_eq!(
        pipeline.state().final_report.as_deref(),
        Some("First draft of the report.")
    );

    let regenerated = pipeline.generate_report().await.unwrap();
    assert_eq!(regenerated.status, ExecutionStatus::ReportReady);
    assert_eq!(
        pipeline.state().final_report.as_deref(),
        Some("Second draft of the report.")
    );
    assert_eq!(pipeline.state().phase, InvestigationPhase::Completed);
}

#[tokio::test]
async fn snapshot_resume_continues_where_it_stopped() {
    let store = Arc::new(InMemoryInvestigationStore::new());
    let first_client = ScriptedClient::new(vec![
        Script::Text(PLAN_TEXT),
        Script::Text("Symptoms identified."),
    ]);
    let mut pipeline = ResearchPipeline::new("inv-resume", first_client)
        .with_store(store.clone());
    pipeline
        .start_investigation("Mild dry eye", RequestedMode::Manual)
        .await
        .unwrap();
    pipeline.execute_next_step().await.unwrap();
    let before = pipeline.state().clone();
    drop(pipeline);

    let second_client = ScriptedClient::new(vec![
        Script::Text("Differential reviewed."),
        Script::Text("Guidelines checked."),
        Script::Text("Findings summarized."),
        Script::Text("Final report."),
    ]);
    let mut resumed = ResearchPipeline::load("inv-resume", store.clone(), second_client)
        .await
        .unwrap();
    assert_eq!(resumed.state(), &before);
    assert_eq!(resumed.state().current_step, 1);

    for _ in 0..3 {
        let result = resumed.execute_next_step().await.unwrap();
        assert_eq!(result.status, ExecutionStatus::StepCompleted);
    }
    let report = resumed.generate_report().await.unwrap();
    assert_eq!(report.status, ExecutionStatus::ReportReady);

    let record = store.get("inv-resume").await.unwrap().unwrap();
    assert_eq!(record.state.phase, InvestigationPhase::Completed);
}

#[tokio::test]
async fn loading_an_unknown_investigation_fails() {
    let store = Arc::new(InMemoryInvestigationStore::new());
    let client = ScriptedClient::new(Vec::new());
    let err = ResearchPipeline::load("missing", store, client).await.unwrap_err();
    assert!(matches!(err, FlowError::InvestigationNotFound(ref id) if id == "missing"));
}

#[tokio::test]
async fn feedback_reaches_the_synthesis_prompt() {
    let client = ScriptedClient::new(vec![
        Script::Text(PLAN_TEXT),
        Script::Text("Symptoms identified."),
        Script::Text("Final report honoring feedback."),
    ]);
    let mut pipeline = ResearchPipeline::new("inv-feedback", client.clone());
    pipeline
        .start_investigation("Mild dry eye", RequestedMode::Manual)
        .await
        .unwrap();
    pipeline.execute_next_step().await.unwrap();
    pipeline
        .attach_step_feedback(1, "Prefer sources available in Spanish")
        .await
        .unwrap();

    let unknown = pipeline.attach_step_feedback(99, "nope").await.unwrap_err();
    assert!(matches!(unknown, FlowError::StepNotFound(99)));

    pipeline.generate_report().await.unwrap();
    let prompts = client.prompts();
    let synthesis = prompts.last().unwrap();
    assert!(synthesis.contains("CLINICIAN FEEDBACK"));
    assert!(synthesis.contains("Prefer sources available in Spanish"));
}

#[tokio::test]
async fn operations_out_of_phase_are_rejected() {
    let client = ScriptedClient::new(Vec::new());
    let mut pipeline = ResearchPipeline::new("inv-phase", client);

    let step_err = pipeline.execute_next_step().await.unwrap_err();
    assert!(matches!(step_err, FlowError::InvalidPhase(_)));

    let report_err = pipeline.generate_report().await.unwrap_err();
    assert!(matches!(report_err, FlowError::InvalidPhase(_)));
}
