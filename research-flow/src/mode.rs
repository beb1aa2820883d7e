//! Research-mode selection.
//!
//! Scoring is pure and cheap: no generation call is ever needed to decide how
//! the investigation will run. The orchestrator derives a [`CaseSummary`]
//! from the freshly parsed context, scores it, and either honors the caller's
//! explicit mode or maps the score onto one.

use serde::{Deserialize, Serialize};

use crate::context::{MedicalContext, OnsetPattern, RedFlagUrgency, Severity};

/// Score at or above which a case runs fully autonomous.
pub const DEEP_RESEARCH_THRESHOLD: u32 = 6;
/// Score at or below which a case runs step-by-step.
pub const MANUAL_THRESHOLD: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchMode {
    Manual,
    DeepResearch,
    Hybrid,
}

/// Mode requested by the caller. `Auto` delegates to the scorer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestedMode {
    #[default]
    Auto,
    Manual,
    DeepResearch,
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseComplexity {
    Simple,
    Moderate,
    Complex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriageUrgency {
    Routine,
    Urgent,
    Emergency,
}

/// The four inputs the scorer looks at, reduced from a full context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaseSummary {
    pub age: Option<u32>,
    pub symptom_count: usize,
    pub complexity: CaseComplexity,
    pub urgency: TriageUrgency,
}

impl CaseSummary {
    pub fn from_context(context: &MedicalContext) -> Self {
        let symptom_count = context.patient_profile.symptoms.len();
        let involved = context.involved_region_count();
        let has_red_flag = !context.red_flags.is_empty();

        let complexity = if has_red_flag || involved >= 2 || symptom_count >= 5 {
            CaseComplexity::Complex
        } else if symptom_count >= 3
            || involved == 1
            || matches!(
                context.temporal_pattern.onset,
                Some(OnsetPattern::Chronic | OnsetPattern::Progressive)
            )
        {
            CaseComplexity::Moderate
        } else {
            CaseComplexity::Simple
        };

        let severe_symptom = context
            .patient_profile
            .symptoms
            .iter()
            .any(|s| s.severity == Severity::Severe);
        let urgency = match context.highest_red_flag_urgency() {
            Some(RedFlagUrgency::Immediate) => TriageUrgency::Emergency,
            Some(_) => TriageUrgency::Urgent,
            None if severe_symptom => TriageUrgency::Urgent,
            None => TriageUrgency::Routine,
        };

        Self {
            age: context.patient_profile.age,
            symptom_count,
            complexity,
            urgency,
        }
    }
}

/// Additive complexity score. Age at the extremes adds one point, symptoms
/// add up to three, complexity one to three, urgency up to two. An unknown
/// age contributes nothing.
pub fn complexity_score(summary: &CaseSummary) -> u32 {
    let age_points = match summary.age {
        Some(age) if age < 18 || age > 65 => 1,
        _ => 0,
    };
    let symptom_points = summary.symptom_count.min(3) as u32;
    let complexity_points = match summary.complexity {
        CaseComplexity::Simple => 1,
        CaseComplexity::Moderate => 2,
        CaseComplexity::Complex => 3,
    };
    let urgency_points = match summary.urgency {
        TriageUrgency::Routine => 0,
        TriageUrgency::Urgent => 1,
        TriageUrgency::Emergency => 2,
    };
    age_points + symptom_points + complexity_points + urgency_points
}

/// Map a summary onto a mode via the fixed thresholds.
pub fn select_mode(summary: &CaseSummary) -> ResearchMode {
    let score = complexity_score(summary);
    if score >= DEEP_RESEARCH_THRESHOLD {
        ResearchMode::DeepResearch
    } else if score <= MANUAL_THRESHOLD {
        ResearchMode::Manual
    } else {
        ResearchMode::Hybrid
    }
}

/// Honor an explicit request, fall back to scoring for `Auto`.
pub fn resolve_mode(requested: RequestedMode, summary: &CaseSummary) -> ResearchMode {
    match requested {
        RequestedMode::Auto => select_mode(summary),
        RequestedMode::Manual => ResearchMode::Manual,
        RequestedMode::DeepResearch => ResearchMode::DeepResearch,
        RequestedMode::Hybrid => ResearchMode::Hybrid,
    }
}
