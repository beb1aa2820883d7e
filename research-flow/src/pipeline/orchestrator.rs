//! Drives one investigation through planning, step execution, and synthesis.
//!
//! The pipeline owns no threads and spawns nothing: every operation is a
//! single `&mut self` call that advances the phase machine, talks to the
//! generation collaborator at most once, and snapshots itself through the
//! persistence collaborator before returning. Services layer their own
//! locking and concurrency on top.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tracing::{info, warn};

use crate::context::{ContextEngine, MedicalContext, consensus_level};
use crate::error::{FlowError, Result};
use crate::generation::{
    GENERATION_ERROR_SENTINEL, GeneratedContent, GenerationClient, GenerationRequest, WebSource,
};
use crate::mode::{CaseSummary, RequestedMode, ResearchMode, complexity_score, resolve_mode};
use crate::pipeline::plan::{SYNTHETIC_STEP_TITLES, parse_plan, split_autonomous_report};
use crate::pipeline::prompts;
use crate::pipeline::state::{
    ExecutionResult, ExecutionStatus, InvestigationPhase, InvestigationState, ResearchStep,
    StepStatus,
};
use crate::storage::{InvestigationRecord, InvestigationStore};
use crate::validation::{
    HeuristicValidator, QualitySignals, SourceValidation, SourceValidator, ValidatedSource,
};

/// Cooperative cancellation flag.
///
/// Clone it out of the pipeline before handing the pipeline to a worker:
/// `cancel()` takes effect without touching the pipeline itself, and the
/// in-flight generation result is discarded at the next await point.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One investigation: medical context, phase state, and the collaborators
/// the phases delegate to.
pub struct ResearchPipeline {
    id: String,
    generation: Arc<dyn GenerationClient>,
    validator: Arc<dyn SourceValidator>,
    store: Option<Arc<dyn InvestigationStore>>,
    context: MedicalContext,
    state: InvestigationState,
    cancel: CancelToken,
}

impl std::fmt::Debug for ResearchPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResearchPipeline")
            .field("id", &self.id)
            .field("context", &self.context)
            .field("state", &self.state)
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}

impl ResearchPipeline {
    pub fn new(id: impl Into<String>, generation: Arc<dyn GenerationClient>) -> Self {
        Self {
            id: id.into(),
            generation,
            validator: Arc::new(HeuristicValidator::new()),
            store: None,
            context: MedicalContext::default(),
            state: InvestigationState::idle(),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn SourceValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn InvestigationStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Rebuild a pipeline from a persisted snapshot. A restart never carries
    /// an in-flight call, so `generating` is cleared.
    pub fn resume(record: InvestigationRecord, generation: Arc<dyn GenerationClient>) -> Self {
        let cancel = CancelToken::new();
        if record.state.cancelled {
            cancel.cancel();
        }
        let mut state = record.state;
        state.generating = false;
        Self {
            id: record.id,
            generation,
            validator: Arc::new(HeuristicValidator::new()),
            store: None,
            context: record.context,
            state,
            cancel,
        }
    }

    /// Fetch a snapshot from the store and resume it.
    pub async fn load(
        id: &str,
        store: Arc<dyn InvestigationStore>,
        generation: Arc<dyn GenerationClient>,
    ) -> Result<Self> {
        let record = store
            .get(id)
            .await?
            .ok_or_else(|| FlowError::InvestigationNotFound(id.to_string()))?;
        Ok(Self::resume(record, generation).with_store(store))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> &InvestigationState {
        &self.state
    }

    pub fn context(&self) -> &MedicalContext {
        &self.context
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn snapshot(&self) -> InvestigationRecord {
        InvestigationRecord::new(self.id.clone(), self.state.clone(), self.context.clone())
    }

    /// Parse the query into a medical context, pick the research mode, and
    /// run the mode's opening move: a plan for manual investigations, the
    /// full grounded pass for deep research and hybrid ones.
    ///
    /// Callable from `Idle`, and from `Error` to retry from scratch. The
    /// generation-call counter survives a retry; everything else resets.
    pub async fn start_investigation(
        &mut self,
        query: &str,
        requested: RequestedMode,
    ) -> Result<ExecutionResult> {
        if self.state.cancelled {
            return Err(FlowError::InvalidPhase(
                "investigation was cancelled".to_string(),
            ));
        }
        if !matches!(
            self.state.phase,
            InvestigationPhase::Idle | InvestigationPhase::Error
        ) {
            return Err(FlowError::InvalidPhase(format!(
                "cannot start an investigation in phase {:?}",
                self.state.phase
            )));
        }

        let calls_so_far = self.state.metadata.generation_calls;
        self.state = InvestigationState::idle();
        self.state.metadata.generation_calls = calls_so_far;

        self.context = ContextEngine::parse(query);
        self.state.original_query = query.to_string();

        let summary = CaseSummary::from_context(&self.context);
        let mode = resolve_mode(requested, &summary);
        self.state.metadata.mode = mode;
        self.state.metadata.complexity_score = complexity_score(&summary);
        self.state.metadata.started_at = Utc::now();
        self.state.phase = InvestigationPhase::Planning;
        info!(
            id = %self.id,
            ?mode,
            score = self.state.metadata.complexity_score,
            "starting investigation"
        );

        match mode {
            ResearchMode::Manual => self.plan_manual().await,
            ResearchMode::DeepResearch | ResearchMode::Hybrid => self.run_autonomous(mode).await,
        }
    }

    /// Execute the step at the cursor with a grounded generation call.
    ///
    /// A failed step is marked `Error` and reported as `StepFailed` without
    /// failing the investigation; calling again retries the same step.
    pub async fn execute_next_step(&mut self) -> Result<ExecutionResult> {
        if self.state.cancelled || self.cancel.is_cancelled() {
            self.state.cancelled = true;
            return Ok(ExecutionResult::status_only(ExecutionStatus::Cancelled));
        }
        if self.state.phase != InvestigationPhase::Executing {
            return Err(FlowError::InvalidPhase(format!(
                "cannot execute a step in phase {:?}",
                self.state.phase
            )));
        }
        let index = self.state.current_step;
        if index >= self.state.plan.len() {
            return Err(FlowError::InvalidPhase(
                "all steps are complete; generate the report".to_string(),
            ));
        }

        let step_id = self.state.plan[index].id;
        info!(
            id = %self.id,
            step = step_id,
            title = %self.state.plan[index].title,
            "executing step"
        );
        let summary = ContextEngine::summarize(&self.context);
        self.state.plan[index].status = StepStatus::InProgress;
        let prompt = prompts::step_prompt(&summary, &self.state.plan[index], &self.state);
        self.persist().await;

        let content = match self.call_generation(prompt, true).await {
            Ok(content) => content,
            Err(FlowError::Cancelled) => return self.observe_cancellation().await,
            Err(err) => {
                warn!(id = %self.id, step = step_id, error = %err, "step failed");
                self.state.plan[index].status = StepStatus::Error;
                self.persist().await;
                return Ok(ExecutionResult::status_only(ExecutionStatus::StepFailed(
                    err.to_string(),
                )));
            }
        };

        let validation = self.validate_sources(&content.sources).await;
        let validated: Vec<WebSource> = validation
            .validated_sources
            .iter()
            .cloned()
            .map(WebSource::from)
            .collect();
        self.context = ContextEngine::update(&self.context, &content.text, &validated);

        let step = &mut self.state.plan[index];
        step.status = StepStatus::Completed;
        step.result = Some(content.text.clone());
        step.sources = validated;
        self.state.current_step = index + 1;
        self.persist().await;
        Ok(ExecutionResult::with_response(
            content.text,
            ExecutionStatus::StepCompleted,
        ))
    }

    /// Synthesize the final report from every completed step.
    ///
    /// Callable once at least one step completed, even with steps left
    /// pending; from `Error` to retry a failed synthesis; and from
    /// `Completed` to regenerate the report.
    pub async fn generate_report(&mut self) -> Result<ExecutionResult> {
        if self.state.cancelled || self.cancel.is_cancelled() {
            self.state.cancelled = true;
            return Ok(ExecutionResult::status_only(ExecutionStatus::Cancelled));
        }
        if !matches!(
            self.state.phase,
            InvestigationPhase::Executing
                | InvestigationPhase::Error
                | InvestigationPhase::Completed
        ) {
            return Err(FlowError::InvalidPhase(format!(
                "cannot synthesize a report in phase {:?}",
                self.state.phase
            )));
        }
        if self.state.completed_steps().next().is_none() {
            return Err(FlowError::NoCompletedSteps);
        }

        self.state.phase = InvestigationPhase::Synthesizing;
        self.state.error = None;
        self.persist().await;

        let summary = ContextEngine::summarize(&self.context);
        let prompt = prompts::synthesis_prompt(&summary, &self.state);
        let content = match self.call_generation(prompt, true).await {
            Ok(content) => content,
            Err(FlowError::Cancelled) => return self.observe_cancellation().await,
            Err(err) => return self.fail_investigation(err).await,
        };
        let validation = self.validate_sources(&content.sources).await;

        self.state.final_report = Some(content.text.clone());
        let mut report_sources = self.aggregate_step_sources();
        let mut seen: HashSet<String> =
            report_sources.iter().map(|s| s.uri.clone()).collect();
        for validated in validation.validated_sources {
            let source = WebSource::from(validated);
            if seen.insert(source.uri.clone()) {
                report_sources.push(source);
            }
        }
        self.state.final_report_sources = report_sources;
        self.state.phase = InvestigationPhase::Completed;
        self.state.metadata.completed_at = Some(Utc::now());
        info!(id = %self.id, "final report ready");
        self.persist().await;
        Ok(ExecutionResult::with_response(
            content.text,
            ExecutionStatus::ReportReady,
        ))
    }

    /// Flag the investigation cancelled. Safe to call in any phase; an
    /// in-flight generation result is discarded at its next await point.
    pub async fn cancel(&mut self) {
        self.cancel.cancel();
        self.state.cancelled = true;
        info!(id = %self.id, "investigation cancelled");
        self.persist().await;
    }

    /// Attach clinician feedback to a step; synthesis replays it verbatim.
    pub async fn attach_step_feedback(
        &mut self,
        step_id: u32,
        note: impl Into<String>,
    ) -> Result<()> {
        let step = self
            .state
            .plan
            .iter_mut()
            .find(|step| step.id == step_id)
            .ok_or(FlowError::StepNotFound(step_id))?;
        step.feedback = Some(note.into());
        self.persist().await;
        Ok(())
    }

    async fn plan_manual(&mut self) -> Result<ExecutionResult> {
        let summary = ContextEngine::summarize(&self.context);
        let prompt = prompts::planning_prompt(&summary);
        let content = match self.call_generation(prompt, false).await {
            Ok(content) => content,
            Err(FlowError::Cancelled) => return self.observe_cancellation().await,
            Err(err) => return self.fail_investigation(err).await,
        };

        let steps = parse_plan(&content.text);
        if steps.is_empty() {
            let err = FlowError::Generation("research plan contained no usable steps".to_string());
            return self.fail_investigation(err).await;
        }
        info!(id = %self.id, steps = steps.len(), "research plan ready");
        self.state.plan = steps;
        self.state.current_step = 0;
        self.state.phase = InvestigationPhase::Executing;
        self.persist().await;
        Ok(ExecutionResult::with_response(
            content.text,
            ExecutionStatus::PlanReady,
        ))
    }

    /// Deep research and hybrid both run one grounded pass over the whole
    /// case and expose it as three completed steps; hybrid adds two
    /// transparency steps so the clinician can audit what was consulted.
    async fn run_autonomous(&mut self, mode: ResearchMode) -> Result<ExecutionResult> {
        let summary = ContextEngine::summarize(&self.context);
        let prompt = prompts::autonomous_prompt(&summary, &self.state.original_query);
        self.state.phase = InvestigationPhase::Executing;
        let content = match self.call_generation(prompt, true).await {
            Ok(content) => content,
            Err(FlowError::Cancelled) => return self.observe_cancellation().await,
            Err(err) => return self.fail_investigation(err).await,
        };

        let validation = self.validate_sources(&content.sources).await;
        let validated: Vec<WebSource> = validation
            .validated_sources
            .iter()
            .cloned()
            .map(WebSource::from)
            .collect();
        self.context = ContextEngine::update(&self.context, &content.text, &validated);

        let [initial, differential, synthesis] = split_autonomous_report(&content.text);
        let mut plan = vec![
            ResearchStep::completed(1, SYNTHETIC_STEP_TITLES[0], initial, Vec::new()),
            ResearchStep::completed(2, SYNTHETIC_STEP_TITLES[1], differential, Vec::new()),
            ResearchStep::completed(3, SYNTHETIC_STEP_TITLES[2], synthesis, validated.clone()),
        ];
        if mode == ResearchMode::Hybrid {
            plan.push(ResearchStep::completed(
                4,
                "Consulted sources",
                sources_digest(&validation),
                Vec::new(),
            ));
            plan.push(ResearchStep::completed(
                5,
                "Evidence assessment",
                evidence_digest(&validation),
                Vec::new(),
            ));
        }
        self.state.current_step = plan.len();
        self.state.plan = plan;
        self.state.final_report = Some(content.text.clone());
        self.state.final_report_sources = validated;
        self.state.phase = InvestigationPhase::Completed;
        self.state.metadata.completed_at = Some(Utc::now());
        info!(id = %self.id, sources = self.state.final_report_sources.len(), "autonomous run complete");
        self.persist().await;
        Ok(ExecutionResult::with_response(
            content.text,
            ExecutionStatus::Completed,
        ))
    }

    /// One call to the generation collaborator. Meters the call, maps the
    /// in-band error sentinel to a real error, and reports cancellation
    /// observed across the await as `FlowError::Cancelled`.
    async fn call_generation(&mut self, prompt: String, grounded: bool) -> Result<GeneratedContent> {
        let request = GenerationRequest {
            prompt,
            ground_with_search: grounded,
            context_hint: Some(ContextEngine::summarize(&self.context)),
        };
        self.state.metadata.generation_calls += 1;
        self.state.generating = true;
        let outcome = self.generation.generate(request).await;
        self.state.generating = false;

        if self.cancel.is_cancelled() {
            return Err(FlowError::Cancelled);
        }
        let content = outcome?;
        let trimmed = content.text.trim_start();
        if trimmed.starts_with(GENERATION_ERROR_SENTINEL) {
            let detail = trimmed
                .trim_start_matches(GENERATION_ERROR_SENTINEL)
                .trim_start_matches(':')
                .trim();
            return Err(FlowError::Generation(if detail.is_empty() {
                "generation backend reported a failure".to_string()
            } else {
                detail.to_string()
            }));
        }
        if content.text.trim().is_empty() {
            return Err(FlowError::Generation(
                "generation backend returned empty text".to_string(),
            ));
        }
        Ok(content)
    }

    async fn validate_sources(&self, sources: &[WebSource]) -> SourceValidation {
        match self.validator.validate(sources).await {
            Ok(validation) => validation,
            Err(err) => {
                warn!(id = %self.id, error = %err, "source validation failed, keeping raw sources");
                SourceValidation {
                    validated_sources: sources
                        .iter()
                        .map(|source| ValidatedSource {
                            uri: source.uri.clone(),
                            title: source.title.clone(),
                            high_quality: false,
                            peer_reviewed: false,
                        })
                        .collect(),
                    quality_signals: QualitySignals::default(),
                    contradictions: Vec::new(),
                }
            }
        }
    }

    async fn observe_cancellation(&mut self) -> Result<ExecutionResult> {
        info!(id = %self.id, "cancellation observed, discarding in-flight result");
        self.state.cancelled = true;
        self.persist().await;
        Ok(ExecutionResult::status_only(ExecutionStatus::Cancelled))
    }

    async fn fail_investigation(&mut self, err: FlowError) -> Result<ExecutionResult> {
        warn!(id = %self.id, error = %err, "investigation failed");
        self.state.phase = InvestigationPhase::Error;
        self.state.error = Some(err.to_string());
        self.persist().await;
        Err(err)
    }

    async fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(err) = store.save(self.snapshot()).await {
            warn!(id = %self.id, error = %err, "failed to persist investigation snapshot");
        }
    }

    fn aggregate_step_sources(&self) -> Vec<WebSource> {
        let mut seen = HashSet::new();
        let mut sources = Vec::new();
        for step in self.state.completed_steps() {
            for source in &step.sources {
                if seen.insert(source.uri.clone()) {
                    sources.push(source.clone());
                }
            }
        }
        sources
    }
}

fn sources_digest(validation: &SourceValidation) -> String {
    if validation.validated_sources.is_empty() {
        return "No web sources were returned for this run.".to_string();
    }
    validation
        .validated_sources
        .iter()
        .map(|source| {
            let mut line = format!("- {} ({})", source.title, source.uri);
            if source.peer_reviewed {
                line.push_str(" [peer-reviewed]");
            } else if source.high_quality {
                line.push_str(" [high-quality]");
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn evidence_digest(validation: &SourceValidation) -> String {
    let total = validation.validated_sources.len() as u32;
    let signals = validation.quality_signals;
    format!(
        "Sources considered: {total}\nHigh-quality domains: {high}\nPeer-reviewed: {peer}\nConsensus: {consensus}",
        high = signals.high_quality,
        peer = signals.peer_reviewed,
        consensus = consensus_level(signals.high_quality, total),
    )
}
