//! Prompt builders for the generation collaborator.
//!
//! Every prompt carries the deterministic case summary so the model never
//! sees raw conversation history, and every prompt pins the response
//! language to the language of the case.

use crate::pipeline::plan::MAX_PLAN_STEPS;
use crate::pipeline::state::{InvestigationState, ResearchStep, StepStatus};

/// Per-step excerpt length when prior findings are replayed into a prompt.
const STEP_HISTORY_EXCERPT_CHARS: usize = 700;
/// Per-step excerpt length for the synthesis prompt, which needs more detail.
const SYNTHESIS_EXCERPT_CHARS: usize = 2_000;

pub(crate) fn planning_prompt(context_summary: &str) -> String {
    format!(
        r#"You are a clinical research planner supporting an ophthalmology practice.

CASE CONTEXT:
{context_summary}

Design a focused research plan for this case.

RULES:
- Respond with numbered lines ONLY, one step per line, in the form: <n>. <title>
- At most {MAX_PLAN_STEPS} steps; prefer 4 to 6
- Order steps from establishing the clinical picture to evaluating management evidence
- Each title is one concrete research action, not a chapter heading
- Respond in the language of the case context
- No preamble, no explanation, no markdown"#
    )
}

pub(crate) fn step_prompt(context_summary: &str, step: &ResearchStep, state: &InvestigationState) -> String {
    let history = completed_findings(state, STEP_HISTORY_EXCERPT_CHARS);
    let history = if history.is_empty() {
        "(no steps completed yet)".to_string()
    } else {
        history
    };
    format!(
        r#"You are executing one step of a clinical research plan.

CASE CONTEXT:
{context_summary}

ORIGINAL QUESTION:
{query}

RESEARCH PLAN:
{plan}

FINDINGS FROM COMPLETED STEPS:
{history}

CURRENT STEP: {id}. {title}

INSTRUCTIONS:
- Investigate the current step only; do not repeat earlier findings
- Ground claims in current clinical evidence and name the guideline or study where you can
- Be specific to this patient: age, laterality, examination findings
- Flag anything that would require urgent in-person evaluation
- Respond in the language of the case context"#,
        query = state.original_query,
        plan = plan_listing(state),
        id = step.id,
        title = step.title,
    )
}

/// Numbered listing of the whole plan, completed and pending alike, so the
/// model sees where the current step sits in the investigation.
fn plan_listing(state: &InvestigationState) -> String {
    state
        .plan
        .iter()
        .map(|step| {
            let marker = match step.status {
                StepStatus::Pending => "pending",
                StepStatus::InProgress => "in progress",
                StepStatus::Completed => "completed",
                StepStatus::Error => "failed",
            };
            format!("{}. {} [{}]", step.id, step.title, marker)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn synthesis_prompt(context_summary: &str, state: &InvestigationState) -> String {
    let findings = completed_findings(state, SYNTHESIS_EXCERPT_CHARS);
    let feedback = feedback_section(state);
    format!(
        r#"You are writing the final report of a clinical research investigation.

CASE CONTEXT:
{context_summary}

ORIGINAL QUESTION:
{query}

STEP FINDINGS:
{findings}
{feedback}
INSTRUCTIONS:
- Synthesize the findings into one coherent report
- Cover: clinical summary, differential assessment, recommended work-up, management considerations, red flags and safety netting
- Address every item of clinician feedback explicitly
- State uncertainty plainly; never invent a source
- Respond in the language of the case context"#,
        query = state.original_query,
    )
}

pub(crate) fn autonomous_prompt(context_summary: &str, query: &str) -> String {
    format!(
        r#"You are conducting an autonomous deep-research pass on the case below.

CASE CONTEXT:
{context_summary}

RESEARCH QUESTION:
{query}

Write a grounded report with EXACTLY these three sections, using these headings verbatim:

## Initial analysis
## Differential evaluation
## Synthesis

INSTRUCTIONS:
- Initial analysis: the clinical picture, the key findings, and what matters most
- Differential evaluation: ranked differential with supporting and contradicting evidence
- Synthesis: recommended work-up, management considerations, and safety netting
- Ground claims in current literature and guidelines; cite what you consulted
- Respond in the language of the case context"#
    )
}

fn completed_findings(state: &InvestigationState, max_chars: usize) -> String {
    state
        .completed_steps()
        .map(|step| {
            let body = step.result.as_deref().unwrap_or("(no result recorded)");
            format!("{}. {}\n{}\n", step.id, step.title, excerpt(body, max_chars))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn feedback_section(state: &InvestigationState) -> String {
    let notes: Vec<String> = state
        .plan
        .iter()
        .filter_map(|step| {
            step.feedback
                .as_deref()
                .map(|note| format!("- Step {} ({}): {}", step.id, step.title, note))
        })
        .collect();
    if notes.is_empty() {
        String::new()
    } else {
        format!("\nCLINICIAN FEEDBACK:\n{}\n", notes.join("\n"))
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if out.len() < text.len() {
        out.push_str("...");
    }
    out
}
