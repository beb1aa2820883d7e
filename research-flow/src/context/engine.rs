//! The context engine: parse, update, summarize.
//!
//! All three operations are pure. `parse` builds the initial
//! [`MedicalContext`] from the opening narrative, `update` folds a generation
//! result (text plus sources) into a clone of the current context, and
//! `summarize` renders a bounded plain-text digest that the orchestrator
//! injects into the next prompt. Determinism matters: the summary feeds
//! prompts, and a context that drifts without new input would make
//! investigations unreproducible.

use tracing::debug;

use crate::generation::WebSource;

use super::evidence;
use super::model::{
    DiagnosisUrgency, MedicalContext, RedFlag, Severity, Sex, Symptom, WorkingDiagnosis,
};
use super::ranker;
use super::rules;

/// Upper bound on the rendered summary, in characters.
pub const MAX_SUMMARY_CHARS: usize = 1500;

/// Radius for severity and quality qualifiers around a symptom keyword.
const NEAR_RADIUS: usize = 60;
/// Radius for laterality and duration, which tend to sit further out.
const WIDE_RADIUS: usize = 90;
/// Radius for probability and urgency vocabulary around a diagnosis mention.
const DIAGNOSIS_RADIUS: usize = 100;
/// A diagnosis block extends at most this far before sublist extraction stops.
const DIAGNOSIS_BLOCK: usize = 400;
/// List items consumed after a differential header.
const MAX_LIST_CANDIDATES: usize = 6;
/// Entries kept per evidence sublist on one diagnosis.
const MAX_SUBLIST_ITEMS: usize = 5;

const UNSPECIFIED_LOCATION: &str = "unspecified";

/// Stateless facade over the extraction tables in [`super::rules`].
pub struct ContextEngine;

impl ContextEngine {
    /// Build the initial context from the opening clinical narrative.
    ///
    /// Demographics are only read from the first line; diagnoses and
    /// evidence quality stay empty until generated content arrives.
    pub fn parse(narrative: &str) -> MedicalContext {
        let mut context = MedicalContext::default();
        extract_demographics(&mut context, narrative);
        extract_history(&mut context, narrative);
        extract_symptoms(&mut context, narrative);
        extract_findings(&mut context, narrative);
        extract_red_flags(&mut context, narrative);
        extract_temporal(&mut context, narrative);
        extract_anatomy(&mut context, narrative);
        debug!(
            symptoms = context.patient_profile.symptoms.len(),
            red_flags = context.red_flags.len(),
            "parsed opening narrative"
        );
        context
    }

    /// Fold one generation result into the context and return the new value.
    /// The input context is left untouched.
    pub fn update(current: &MedicalContext, text: &str, sources: &[WebSource]) -> MedicalContext {
        let mut next = current.clone();
        extract_history(&mut next, text);
        extract_symptoms(&mut next, text);
        extract_findings(&mut next, text);
        extract_red_flags(&mut next, text);
        extract_temporal(&mut next, text);
        extract_anatomy(&mut next, text);
        extract_diagnoses(&mut next, text);
        evidence::update_evidence(&mut next.evidence_quality, sources);
        debug!(
            diagnoses = next.working_diagnoses.len(),
            total_sources = next.evidence_quality.total_sources,
            "folded generated content into context"
        );
        next
    }

    /// Render the bounded prompt digest. Same context in, same string out.
    pub fn summarize(context: &MedicalContext) -> String {
        let mut lines: Vec<String> = Vec::new();
        let profile = &context.patient_profile;

        let mut who = String::from("Patient");
        if let Some(age) = profile.age {
            who.push_str(&format!(", {age} years old"));
        }
        if let Some(sex) = profile.sex {
            who.push_str(&format!(", {sex}"));
        }
        lines.push(who);

        if !profile.medical_history.is_empty() {
            let history: Vec<&str> = profile
                .medical_history
                .iter()
                .take(6)
                .map(String::as_str)
                .collect();
            lines.push(format!("History: {}", history.join(", ")));
        }

        if !profile.symptoms.is_empty() {
            let rendered: Vec<String> =
                profile.symptoms.iter().take(6).map(render_symptom).collect();
            lines.push(format!("Symptoms: {}", rendered.join("; ")));
        }

        let findings = render_findings(context);
        if !findings.is_empty() {
            lines.push(format!("Findings: {}", findings.join("; ")));
        }

        if !context.working_diagnoses.is_empty() {
            let rendered: Vec<String> = context
                .working_diagnoses
                .iter()
                .take(3)
                .map(|d| {
                    format!(
                        "{} ({}%, {})",
                        d.diagnosis,
                        (d.probability * 100.0).round() as u32,
                        d.urgency
                    )
                })
                .collect();
            lines.push(format!("Working diagnoses: {}", rendered.join("; ")));
        }

        if !context.red_flags.is_empty() {
            let rendered: Vec<String> = context
                .red_flags
                .iter()
                .take(5)
                .map(|f| format!("{} [{}]", f.finding, f.urgency))
                .collect();
            lines.push(format!("Red flags: {}", rendered.join("; ")));
        }

        let involved: Vec<&str> = context
            .involved_regions()
            .map(|r| r.region.as_str())
            .collect();
        if !involved.is_empty() {
            lines.push(format!("Anatomy involved: {}", involved.join(", ")));
        }

        let temporal = &context.temporal_pattern;
        let mut course_parts: Vec<String> = Vec::new();
        if let Some(onset) = temporal.onset {
            course_parts.push(format!("{onset} onset"));
        }
        if let Some(course) = temporal.course {
            course_parts.push(course.to_string());
        }
        if let Some(duration) = &temporal.duration {
            course_parts.push(duration.clone());
        }
        if !course_parts.is_empty() {
            lines.push(format!("Course: {}", course_parts.join(", ")));
        }

        let quality = &context.evidence_quality;
        if quality.total_sources > 0 {
            lines.push(format!(
                "Evidence: {} sources, {} high-quality, {} peer-reviewed, consensus {}",
                quality.total_sources,
                quality.high_quality_sources,
                quality.peer_reviewed_sources,
                quality.consensus_level
            ));
        }

        clip(&lines.join("\n"), MAX_SUMMARY_CHARS)
    }
}

fn render_symptom(symptom: &Symptom) -> String {
    let mut out = format!("{} ({}", symptom.description, symptom.severity);
    if symptom.location != UNSPECIFIED_LOCATION {
        out.push_str(&format!(", {}", symptom.location));
    }
    if let Some(duration) = &symptom.duration {
        out.push_str(&format!(", {duration}"));
    }
    if let Some(quality) = &symptom.quality {
        out.push_str(&format!(", {quality}"));
    }
    out.push(')');
    out
}

fn render_findings(context: &MedicalContext) -> Vec<String> {
    let f = &context.clinical_findings;
    let named = [
        ("visual acuity", &f.visual_acuity),
        ("IOP", &f.intraocular_pressure),
        ("pupils", &f.pupil_response),
        ("fundus", &f.fundus_exam),
        ("imaging", &f.imaging),
        ("laboratory", &f.laboratory),
    ];
    named
        .iter()
        .filter_map(|(label, value)| value.as_ref().map(|v| format!("{label}: {v}")))
        .collect()
}

/// Truncate on a character boundary.
fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

/// Slice a window around `[start, end)`, widened by `radius` bytes and then
/// snapped outward to character boundaries.
fn window_around(text: &str, start: usize, end: usize, radius: usize) -> &str {
    let mut lo = start.saturating_sub(radius);
    while !text.is_char_boundary(lo) {
        lo -= 1;
    }
    let mut hi = end.saturating_add(radius).min(text.len());
    while !text.is_char_boundary(hi) {
        hi += 1;
    }
    &text[lo..hi]
}

// ---------------------------------------------------------------------------
// Extractors
// ---------------------------------------------------------------------------

fn extract_demographics(context: &mut MedicalContext, text: &str) {
    let Some(first_line) = text.lines().next() else {
        return;
    };
    let profile = &mut context.patient_profile;

    if profile.age.is_none() {
        for pattern in rules::AGE_RES.iter() {
            if let Some(captures) = pattern.captures(first_line) {
                if let Ok(age) = captures[1].parse::<u32>() {
                    if age <= 120 {
                        profile.age = Some(age);
                        break;
                    }
                }
            }
        }
    }

    if profile.sex.is_none() {
        let male = rules::MALE_RE.find(first_line).map(|m| m.start());
        let female = rules::FEMALE_RE.find(first_line).map(|m| m.start());
        profile.sex = match (male, female) {
            (Some(m), Some(f)) if f <= m => Some(Sex::Female),
            (Some(_), Some(_)) | (Some(_), None) => Some(Sex::Male),
            (None, Some(_)) => Some(Sex::Female),
            (None, None) => None,
        };
    }
}

fn extract_history(context: &mut MedicalContext, text: &str) {
    let lower = text.to_lowercase();
    for rule in rules::RISK_FACTOR_RULES {
        if rule.markers.iter().any(|marker| lower.contains(marker)) {
            let history = &mut context.patient_profile.medical_history;
            if !history.iter().any(|h| h.eq_ignore_ascii_case(rule.factor)) {
                history.push(rule.factor.to_string());
            }
        }
    }
}

fn extract_symptoms(context: &mut MedicalContext, text: &str) {
    let lower = text.to_lowercase();
    for rule in rules::SYMPTOM_RULES {
        let earliest = rule
            .keywords
            .iter()
            .filter_map(|keyword| lower.find(keyword).map(|pos| (pos, keyword.len())))
            .min_by_key(|&(pos, _)| pos);
        let Some((pos, len)) = earliest else {
            continue;
        };

        let near = window_around(&lower, pos, pos + len, NEAR_RADIUS);
        let wide = window_around(&lower, pos, pos + len, WIDE_RADIUS);

        let severity = if rules::SEVERE_MARKERS.iter().any(|m| near.contains(m)) {
            Severity::Severe
        } else if rules::MODERATE_MARKERS.iter().any(|m| near.contains(m)) {
            Severity::Moderate
        } else {
            Severity::Mild
        };

        let location = rules::LATERALITY_RULES
            .iter()
            .find(|lat| lat.pattern.is_match(wide))
            .map(|lat| lat.location)
            .unwrap_or(UNSPECIFIED_LOCATION);

        let duration = rules::DURATION_RE
            .find(wide)
            .map(|m| m.as_str().trim().to_string());

        let quality = rules::QUALITY_RULES
            .iter()
            .find(|q| q.markers.iter().any(|m| near.contains(m)))
            .map(|q| q.quality.to_string());

        push_or_merge_symptom(
            context,
            Symptom {
                description: rule.category.to_string(),
                severity,
                duration,
                location: location.to_string(),
                quality,
            },
        );
    }
}

/// Duplicate symptoms merge by description: severity only escalates, and
/// missing detail gets filled in rather than overwritten.
fn push_or_merge_symptom(context: &mut MedicalContext, incoming: Symptom) {
    let symptoms = &mut context.patient_profile.symptoms;
    match symptoms
        .iter_mut()
        .find(|s| s.description.eq_ignore_ascii_case(&incoming.description))
    {
        Some(existing) => {
            existing.severity = existing.severity.max(incoming.severity);
            if existing.duration.is_none() {
                existing.duration = incoming.duration;
            }
            if existing.location == UNSPECIFIED_LOCATION
                && incoming.location != UNSPECIFIED_LOCATION
            {
                existing.location = incoming.location;
            }
            if existing.quality.is_none() {
                existing.quality = incoming.quality;
            }
        }
        None => symptoms.push(incoming),
    }
}

fn extract_findings(context: &mut MedicalContext, text: &str) {
    for rule in rules::FINDING_RULES.iter() {
        if let Some(captures) = rule.pattern.captures(text) {
            if let Some(value) = captures.get(rule.group) {
                let cleaned = clip(value.as_str().trim(), 120);
                if !cleaned.is_empty() {
                    (rule.emit)(&mut context.clinical_findings, cleaned);
                }
            }
        }
    }
}

fn extract_red_flags(context: &mut MedicalContext, text: &str) {
    for rule in rules::RED_FLAG_RULES.iter() {
        if !rule.pattern.is_match(text) {
            continue;
        }
        let already = context
            .red_flags
            .iter()
            .any(|flag| flag.finding.eq_ignore_ascii_case(rule.finding));
        if already {
            continue;
        }
        context.red_flags.push(RedFlag {
            finding: rule.finding.to_string(),
            significance: rule.significance.to_string(),
            action: rule.action.to_string(),
            urgency: rule.urgency,
        });
    }
}

/// Last match wins: the signal occurring latest in the text overwrites, on
/// the assumption that later sentences refine earlier ones.
fn extract_temporal(context: &mut MedicalContext, text: &str) {
    let temporal = &mut context.temporal_pattern;

    let onset = rules::ONSET_RULES
        .iter()
        .filter_map(|(pattern, onset)| {
            pattern.find_iter(text).last().map(|m| (m.end(), *onset))
        })
        .max_by_key(|&(end, _)| end);
    if let Some((_, onset)) = onset {
        temporal.onset = Some(onset);
    }

    let course = rules::COURSE_RULES
        .iter()
        .filter_map(|(pattern, course)| {
            pattern.find_iter(text).last().map(|m| (m.end(), *course))
        })
        .max_by_key(|&(end, _)| end);
    if let Some((_, course)) = course {
        temporal.course = Some(course);
    }

    if let Some(m) = rules::DURATION_RE.find_iter(text).last() {
        temporal.duration = Some(m.as_str().trim().to_string());
    }
}

fn extract_anatomy(context: &mut MedicalContext, text: &str) {
    let lower = text.to_lowercase();
    for (region_name, keywords) in rules::ANATOMICAL_REGIONS {
        let Some(region) = context
            .anatomical_regions
            .iter_mut()
            .find(|r| r.region == *region_name)
        else {
            continue;
        };
        for keyword in *keywords {
            if lower.contains(keyword) {
                region.involved = true;
                if !region.findings.iter().any(|f| f.eq_ignore_ascii_case(keyword)) {
                    region.findings.push((*keyword).to_string());
                }
            }
        }
    }
}

fn extract_diagnoses(context: &mut MedicalContext, text: &str) {
    let label_spans: Vec<(usize, usize)> = rules::DIAGNOSIS_LABEL_RE
        .captures_iter(text)
        .filter_map(|captures| captures.get(1).map(|m| (m.start(), m.end())))
        .collect();

    let mut candidates: Vec<(String, usize, usize)> = Vec::new();
    for &(start, end) in &label_spans {
        let remainder = &text[start..end];
        match clean_diagnosis_name(remainder) {
            Some(name) => candidates.push((name, start, end)),
            // Header form: candidates follow as list items.
            None => collect_list_candidates(text, end, &mut candidates),
        }
    }

    if candidates.is_empty() {
        return;
    }

    let label_starts: Vec<usize> = label_spans.iter().map(|&(s, _)| s).collect();
    let extracted: Vec<WorkingDiagnosis> = candidates
        .into_iter()
        .map(|(name, start, end)| build_diagnosis(text, name, start, end, &label_starts))
        .collect();

    context.working_diagnoses =
        ranker::merge_diagnoses(&context.working_diagnoses, extracted);
}

/// Walk the lines after a differential header, consuming numbered or
/// bulleted items until the first line that is neither.
fn collect_list_candidates(text: &str, header_end: usize, out: &mut Vec<(String, usize, usize)>) {
    let rest = &text[header_end..];
    let mut offset = header_end;
    let mut taken = 0;
    for (index, line) in rest.split('\n').enumerate() {
        if index == 0 {
            // Tail of the header line itself.
            offset += line.len() + 1;
            continue;
        }
        let captures = rules::DIAGNOSIS_ITEM_RE.captures(line);
        match captures.and_then(|c| c.get(1).map(|m| (m.start(), m.as_str().to_string()))) {
            Some((rel_start, raw)) if taken < MAX_LIST_CANDIDATES => {
                if let Some(name) = clean_diagnosis_name(&raw) {
                    let start = offset + rel_start;
                    out.push((name, start, start + raw.len()));
                    taken += 1;
                }
                offset += line.len() + 1;
            }
            _ => break,
        }
    }
}

fn clean_diagnosis_name(raw: &str) -> Option<String> {
    let stripped: String = raw
        .chars()
        .filter(|c| !matches!(c, '*' | '_' | '`' | '#'))
        .collect();
    let trimmed = stripped.trim();
    let mut cut = trimmed.len();
    if let Some(i) = trimmed.find(|c: char| {
        matches!(c, '.' | ',' | ';' | ':' | '(' | '\u{2013}' | '\u{2014}')
    }) {
        cut = cut.min(i);
    }
    if let Some(i) = trimmed.find(" - ") {
        cut = cut.min(i);
    }
    let name = trimmed[..cut].trim();
    let chars = name.chars().count();
    if (3..=80).contains(&chars) {
        Some(name.to_string())
    } else {
        None
    }
}

/// Score one mention: base 0.5, nudged by the certainty vocabulary found in
/// a window around the mention, then clamped by the ranker.
fn build_diagnosis(
    text: &str,
    name: String,
    start: usize,
    end: usize,
    label_starts: &[usize],
) -> WorkingDiagnosis {
    let window = window_around(text, start, end, DIAGNOSIS_RADIUS).to_lowercase();

    let mut probability = 0.5;
    if rules::MOST_LIKELY_MARKERS.iter().any(|m| window.contains(m)) {
        probability += 0.3;
    }
    if rules::POSSIBLE_MARKERS.iter().any(|m| window.contains(m)) {
        probability += 0.1;
    }
    if rules::RULE_OUT_MARKERS.iter().any(|m| window.contains(m)) {
        probability -= 0.2;
    }

    let urgency = if rules::DIAGNOSIS_EMERGENT_MARKERS.iter().any(|m| window.contains(m)) {
        DiagnosisUrgency::Emergent
    } else if rules::DIAGNOSIS_URGENT_MARKERS.iter().any(|m| window.contains(m)) {
        DiagnosisUrgency::Urgent
    } else {
        DiagnosisUrgency::Routine
    };

    let block_end = label_starts
        .iter()
        .copied()
        .filter(|&s| s > end)
        .min()
        .unwrap_or(text.len())
        .min(end + DIAGNOSIS_BLOCK);
    let block = window_around(text, start, block_end, 0);

    WorkingDiagnosis {
        diagnosis: name,
        probability: ranker::clamp_probability(probability),
        supporting_evidence: capture_sublist(&rules::SUPPORTING_RE, block),
        contra_indications: capture_sublist(&rules::CONTRA_RE, block),
        next_steps: capture_sublist(&rules::NEXT_STEPS_RE, block),
        urgency,
    }
}

fn capture_sublist(pattern: &regex::Regex, block: &str) -> Vec<String> {
    pattern
        .captures(block)
        .and_then(|c| c.get(1))
        .map(|m| {
            m.as_str()
                .split([',', ';'])
                .map(str::trim)
                .filter(|item| item.chars().count() > 2)
                .take(MAX_SUBLIST_ITEMS)
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::model::{ClinicalCourse, ConsensusLevel, OnsetPattern, RedFlagUrgency};

    #[test]
    fn parses_the_opening_narrative_of_an_urgent_case() {
        let ctx = ContextEngine::parse(
            "Patient 70 years old, male, with hypertension, presents with sudden vision loss and severe eye pain in the right eye for 2 hours",
        );
        assert_eq!(ctx.patient_profile.age, Some(70));
        assert_eq!(ctx.patient_profile.sex, Some(Sex::Male));
        assert!(
            ctx.patient_profile
                .medical_history
                .iter()
                .any(|h| h == "hypertension")
        );

        let findings: Vec<&str> = ctx.red_flags.iter().map(|f| f.finding.as_str()).collect();
        assert!(findings.contains(&"Sudden vision loss"));
        assert_eq!(ctx.highest_red_flag_urgency(), Some(RedFlagUrgency::Immediate));

        let pain = ctx
            .patient_profile
            .symptoms
            .iter()
            .find(|s| s.description == "eye pain")
            .expect("eye pain extracted");
        assert_eq!(pain.severity, Severity::Severe);
        assert_eq!(pain.location, "right eye");
        assert_eq!(pain.duration.as_deref(), Some("2 hours"));

        assert_eq!(ctx.temporal_pattern.onset, Some(OnsetPattern::Acute));
        assert!(ctx.working_diagnoses.is_empty());
        assert_eq!(ctx.evidence_quality.total_sources, 0);
    }

    #[test]
    fn parses_spanish_narratives() {
        let ctx = ContextEngine::parse(
            "Mujer de 34 años, diabética, con visión borrosa en ambos ojos desde hace 3 días, empeorando",
        );
        assert_eq!(ctx.patient_profile.age, Some(34));
        assert_eq!(ctx.patient_profile.sex, Some(Sex::Female));
        assert!(ctx.patient_profile.medical_history.iter().any(|h| h == "diabetes"));

        let blurred = ctx
            .patient_profile
            .symptoms
            .iter()
            .find(|s| s.description == "blurred vision")
            .expect("blurred vision extracted");
        assert_eq!(blurred.location, "bilateral");
        assert_eq!(blurred.duration.as_deref(), Some("3 días"));

        assert_eq!(ctx.temporal_pattern.onset, Some(OnsetPattern::Subacute));
        assert_eq!(
            ctx.temporal_pattern.course,
            Some(ClinicalCourse::Worsening)
        );
    }

    #[test]
    fn update_is_pure_and_extracts_diagnoses_with_scored_probability() {
        let ctx = ContextEngine::parse("Hombre de 55 años con dolor ocular intenso y náuseas");
        let sources = vec![
            WebSource::new("https://pubmed.ncbi.nlm.nih.gov/123", "Acute angle closure"),
            WebSource::new("https://example.com/blog", "A blog"),
        ];
        let updated = ContextEngine::update(
            &ctx,
            "Diagnóstico más probable: glaucoma agudo de ángulo cerrado. Evidencia a favor: dolor intenso, náuseas",
            &sources,
        );

        assert!(ctx.working_diagnoses.is_empty(), "input context must not change");
        assert_eq!(updated.working_diagnoses.len(), 1);
        let dx = &updated.working_diagnoses[0];
        assert_eq!(dx.diagnosis, "glaucoma agudo de ángulo cerrado");
        assert!((dx.probability - 0.8).abs() < 1e-9, "0.5 base + 0.3 most-likely");
        assert_eq!(dx.supporting_evidence, vec!["dolor intenso", "náuseas"]);

        assert_eq!(updated.evidence_quality.total_sources, 2);
        assert_eq!(updated.evidence_quality.high_quality_sources, 1);
        assert_eq!(updated.evidence_quality.consensus_level, ConsensusLevel::Moderate);

        let anterior = updated
            .anatomical_regions
            .iter()
            .find(|r| r.region == "anterior segment")
            .expect("fixed region set");
        assert!(anterior.involved);
    }

    #[test]
    fn rule_out_vocabulary_lowers_probability() {
        let ctx = MedicalContext::default();
        let updated = ContextEngine::update(
            &ctx,
            "Diagnosis: retinal detachment was considered but is unlikely, we should rule out this entity",
            &[],
        );
        assert_eq!(updated.working_diagnoses.len(), 1);
        // 0.5 base + 0.1 ("consider") - 0.2 (rule-out vocabulary).
        assert!((updated.working_diagnoses[0].probability - 0.4).abs() < 1e-9);
    }

    #[test]
    fn differential_header_lists_are_consumed_as_candidates() {
        let ctx = MedicalContext::default();
        let updated = ContextEngine::update(
            &ctx,
            "Diagnóstico diferencial:\n1. Desprendimiento de retina\n2. Hemorragia vítrea\n3. Neuritis óptica\nOtro texto.",
            &[],
        );
        let names: Vec<&str> = updated
            .working_diagnoses
            .iter()
            .map(|d| d.diagnosis.as_str())
            .collect();
        assert_eq!(names.len(), 3);
        assert!(names.contains(&"Desprendimiento de retina"));
        assert!(names.contains(&"Hemorragia vítrea"));
        assert!(names.contains(&"Neuritis óptica"));
    }

    #[test]
    fn clinical_findings_overwrite_with_latest_value() {
        let ctx = ContextEngine::parse("Exam shows IOP: 45 mmHg in the right eye");
        assert_eq!(ctx.clinical_findings.intraocular_pressure.as_deref(), Some("45 mmHg"));

        let updated = ContextEngine::update(
            &ctx,
            "After treatment the intraocular pressure was 18 mmHg",
            &[],
        );
        assert_eq!(
            updated.clinical_findings.intraocular_pressure.as_deref(),
            Some("18 mmHg")
        );
    }

    #[test]
    fn red_flags_deduplicate_by_finding() {
        let ctx = ContextEngine::parse("Sudden vision loss in the left eye");
        let count = ctx.red_flags.len();
        let updated = ContextEngine::update(
            &ctx,
            "The sudden vision loss reported by the patient suggests a vascular event",
            &[],
        );
        assert_eq!(
            updated
                .red_flags
                .iter()
                .filter(|f| f.finding == "Sudden vision loss")
                .count(),
            1
        );
        assert!(updated.red_flags.len() >= count);
    }

    #[test]
    fn involvement_is_monotonic_and_course_follows_the_last_signal() {
        let ctx = ContextEngine::parse("Dolor ocular estable, con sospecha de afectación de retina");
        assert!(
            ctx.anatomical_regions
                .iter()
                .find(|r| r.region == "posterior segment")
                .is_some_and(|r| r.involved)
        );
        assert_eq!(
            ctx.temporal_pattern.course,
            Some(ClinicalCourse::Stable)
        );

        let updated = ContextEngine::update(&ctx, "El cuadro ha empeorado claramente", &[]);
        assert!(
            updated
                .anatomical_regions
                .iter()
                .find(|r| r.region == "posterior segment")
                .is_some_and(|r| r.involved),
            "involvement must not revert"
        );
        assert_eq!(
            updated.temporal_pattern.course,
            Some(ClinicalCourse::Worsening)
        );
    }

    #[test]
    fn symptom_duplicates_merge_and_escalate() {
        let ctx = ContextEngine::parse("Mild eye pain since yesterday");
        let updated = ContextEngine::update(&ctx, "The eye pain is now severe and throbbing", &[]);
        let pain: Vec<_> = updated
            .patient_profile
            .symptoms
            .iter()
            .filter(|s| s.description == "eye pain")
            .collect();
        assert_eq!(pain.len(), 1);
        assert_eq!(pain[0].severity, Severity::Severe);
        assert_eq!(pain[0].quality.as_deref(), Some("throbbing"));
    }

    #[test]
    fn summary_is_deterministic_and_bounded() {
        let ctx = ContextEngine::parse(
            "Patient 70 years old, male, with diabetes and hypertension, sudden vision loss, severe eye pain, halos, nausea, right eye, for 2 hours",
        );
        let first = ContextEngine::summarize(&ctx);
        let second = ContextEngine::summarize(&ctx);
        assert_eq!(first, second);
        assert!(first.chars().count() <= MAX_SUMMARY_CHARS);
        assert!(first.contains("70 years old"));
        assert!(first.contains("Red flags:"));
    }

    #[test]
    fn summary_of_an_empty_context_stays_minimal() {
        let summary = ContextEngine::summarize(&MedicalContext::default());
        assert_eq!(summary, "Patient");
    }
}
