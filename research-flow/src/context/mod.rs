//! Structured clinical context: the model, the extraction engine that keeps
//! it current, and the ranking/evidence helpers behind it.

mod engine;
pub(crate) mod evidence;
mod model;
mod ranker;
mod rules;

pub use engine::{ContextEngine, MAX_SUMMARY_CHARS};
pub use evidence::consensus_level;
pub use model::{
    AnatomicalRegion, ClinicalCourse, ClinicalFindings, ConsensusLevel, DiagnosisUrgency,
    EvidenceQuality, MAX_DIAGNOSIS_PROBABILITY, MAX_WORKING_DIAGNOSES, MIN_DIAGNOSIS_PROBABILITY,
    MedicalContext, OnsetPattern, PatientProfile, RedFlag, RedFlagUrgency, Severity, Sex, Symptom,
    TemporalPattern, WorkingDiagnosis,
};
