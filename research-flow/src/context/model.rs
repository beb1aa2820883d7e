use std::fmt;

use serde::{Deserialize, Serialize};

/// Working diagnoses kept per investigation, ranked by probability.
pub const MAX_WORKING_DIAGNOSES: usize = 5;
/// Probability floor for a working diagnosis.
pub const MIN_DIAGNOSIS_PROBABILITY: f64 = 0.10;
/// Probability ceiling for a working diagnosis.
pub const MAX_DIAGNOSIS_PROBABILITY: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sex::Male => write!(f, "male"),
            Sex::Female => write!(f, "female"),
        }
    }
}

/// Symptom severity. Variant order is ascending so `max` picks the worse one
/// when merging duplicate symptoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Mild => write!(f, "mild"),
            Severity::Moderate => write!(f, "moderate"),
            Severity::Severe => write!(f, "severe"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symptom {
    pub description: String,
    pub severity: Severity,
    pub duration: Option<String>,
    /// Laterality or site; `"unspecified"` when nothing matched.
    pub location: String,
    pub quality: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub age: Option<u32>,
    pub sex: Option<Sex>,
    pub medical_history: Vec<String>,
    pub symptoms: Vec<Symptom>,
}

/// Named exam findings. Each field holds the latest extracted value;
/// re-extraction overwrites, it never appends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClinicalFindings {
    pub visual_acuity: Option<String>,
    pub intraocular_pressure: Option<String>,
    pub pupil_response: Option<String>,
    pub fundus_exam: Option<String>,
    pub imaging: Option<String>,
    pub laboratory: Option<String>,
}

impl ClinicalFindings {
    pub fn is_empty(&self) -> bool {
        self.visual_acuity.is_none()
            && self.intraocular_pressure.is_none()
            && self.pupil_response.is_none()
            && self.fundus_exam.is_none()
            && self.imaging.is_none()
            && self.laboratory.is_none()
    }
}

/// Diagnosis urgency. Variant order is ascending so `max` keeps the more
/// urgent value when two entries merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosisUrgency {
    Routine,
    Urgent,
    Emergent,
}

impl fmt::Display for DiagnosisUrgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosisUrgency::Routine => write!(f, "routine"),
            DiagnosisUrgency::Urgent => write!(f, "urgent"),
            DiagnosisUrgency::Emergent => write!(f, "emergent"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingDiagnosis {
    pub diagnosis: String,
    /// Clamped to `[MIN_DIAGNOSIS_PROBABILITY, MAX_DIAGNOSIS_PROBABILITY]`:
    /// never certain, never fully dismissed while listed.
    pub probability: f64,
    pub supporting_evidence: Vec<String>,
    pub contra_indications: Vec<String>,
    pub next_steps: Vec<String>,
    pub urgency: DiagnosisUrgency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsensusLevel {
    Low,
    Moderate,
    High,
}

impl fmt::Display for ConsensusLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsensusLevel::Low => write!(f, "low"),
            ConsensusLevel::Moderate => write!(f, "moderate"),
            ConsensusLevel::High => write!(f, "high"),
        }
    }
}

/// Monotonic counters over every source seen so far, plus the consensus
/// level derived from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceQuality {
    pub total_sources: u32,
    pub high_quality_sources: u32,
    pub peer_reviewed_sources: u32,
    pub consensus_level: ConsensusLevel,
}

impl Default for EvidenceQuality {
    fn default() -> Self {
        Self {
            total_sources: 0,
            high_quality_sources: 0,
            peer_reviewed_sources: 0,
            consensus_level: ConsensusLevel::Low,
        }
    }
}

/// Red-flag urgency. Variant order is ascending so `max` picks the tighter
/// window when triaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RedFlagUrgency {
    WithinWeek,
    SameDay,
    Immediate,
}

impl fmt::Display for RedFlagUrgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedFlagUrgency::WithinWeek => write!(f, "within-week"),
            RedFlagUrgency::SameDay => write!(f, "same-day"),
            RedFlagUrgency::Immediate => write!(f, "immediate"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedFlag {
    pub finding: String,
    pub significance: String,
    pub action: String,
    pub urgency: RedFlagUrgency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnatomicalRegion {
    pub region: String,
    /// Monotonic: once a region is involved it stays involved.
    pub involved: bool,
    pub findings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnsetPattern {
    Acute,
    Subacute,
    Chronic,
    Progressive,
}

impl fmt::Display for OnsetPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OnsetPattern::Acute => write!(f, "acute"),
            OnsetPattern::Subacute => write!(f, "subacute"),
            OnsetPattern::Chronic => write!(f, "chronic"),
            OnsetPattern::Progressive => write!(f, "progressive"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClinicalCourse {
    Stable,
    Improving,
    Worsening,
    Fluctuating,
}

impl fmt::Display for ClinicalCourse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClinicalCourse::Stable => write!(f, "stable"),
            ClinicalCourse::Improving => write!(f, "improving"),
            ClinicalCourse::Worsening => write!(f, "worsening"),
            ClinicalCourse::Fluctuating => write!(f, "fluctuating"),
        }
    }
}

/// Onset, course and duration of the presenting problem. Later, stronger
/// textual signals overwrite earlier ones (last match wins).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemporalPattern {
    pub onset: Option<OnsetPattern>,
    pub course: Option<ClinicalCourse>,
    pub duration: Option<String>,
}

/// Structured clinical picture of one investigation.
///
/// Built once from the opening narrative and then folded forward after every
/// grounded generation call. Values are never mutated in place: the engine
/// clones, applies extractions, and returns the next version, so a snapshot
/// held by a caller stays consistent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalContext {
    pub patient_profile: PatientProfile,
    pub clinical_findings: ClinicalFindings,
    pub working_diagnoses: Vec<WorkingDiagnosis>,
    pub evidence_quality: EvidenceQuality,
    pub red_flags: Vec<RedFlag>,
    pub anatomical_regions: Vec<AnatomicalRegion>,
    pub temporal_pattern: TemporalPattern,
}

impl Default for MedicalContext {
    fn default() -> Self {
        Self {
            patient_profile: PatientProfile::default(),
            clinical_findings: ClinicalFindings::default(),
            working_diagnoses: Vec::new(),
            evidence_quality: EvidenceQuality::default(),
            red_flags: Vec::new(),
            anatomical_regions: super::rules::ANATOMICAL_REGIONS
                .iter()
                .map(|(region, _)| AnatomicalRegion {
                    region: (*region).to_string(),
                    involved: false,
                    findings: Vec::new(),
                })
                .collect(),
            temporal_pattern: TemporalPattern::default(),
        }
    }
}

impl MedicalContext {
    /// Regions currently marked involved, in fixed anatomical order.
    pub fn involved_regions(&self) -> impl Iterator<Item = &AnatomicalRegion> {
        self.anatomical_regions.iter().filter(|r| r.involved)
    }

    pub fn involved_region_count(&self) -> usize {
        self.involved_regions().count()
    }

    /// Most urgent red flag currently recorded, if any.
    pub fn highest_red_flag_urgency(&self) -> Option<RedFlagUrgency> {
        self.red_flags.iter().map(|f| f.urgency).max()
    }
}
