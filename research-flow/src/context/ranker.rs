//! Working-diagnosis ranking and merging.

use std::cmp::Ordering;

use super::model::{
    MAX_DIAGNOSIS_PROBABILITY, MAX_WORKING_DIAGNOSES, MIN_DIAGNOSIS_PROBABILITY, WorkingDiagnosis,
};

/// Clamp into the working range: a listed diagnosis is never certain and
/// never fully dismissed.
pub(crate) fn clamp_probability(probability: f64) -> f64 {
    probability.clamp(MIN_DIAGNOSIS_PROBABILITY, MAX_DIAGNOSIS_PROBABILITY)
}

fn names_collide(a: &str, b: &str) -> bool {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    a.contains(&b) || b.contains(&a)
}

fn union_into(target: &mut Vec<String>, extra: &[String]) {
    for item in extra {
        if !target.iter().any(|existing| existing.eq_ignore_ascii_case(item)) {
            target.push(item.clone());
        }
    }
}

fn merge_pair(kept: &mut WorkingDiagnosis, other: WorkingDiagnosis) {
    if other.probability > kept.probability {
        kept.diagnosis = other.diagnosis;
        kept.probability = other.probability;
    }
    kept.urgency = kept.urgency.max(other.urgency);
    union_into(&mut kept.supporting_evidence, &other.supporting_evidence);
    union_into(&mut kept.contra_indications, &other.contra_indications);
    union_into(&mut kept.next_steps, &other.next_steps);
}

/// Collapse any remaining substring collisions. A merge can rename an entry
/// (the higher-probability name wins) and the new name may collide with a
/// neighbour it did not collide with before, so this runs to a fixed point.
fn collapse_collisions(list: &mut Vec<WorkingDiagnosis>) {
    loop {
        let mut collided = None;
        'outer: for i in 0..list.len() {
            for j in (i + 1)..list.len() {
                if names_collide(&list[i].diagnosis, &list[j].diagnosis) {
                    collided = Some((i, j));
                    break 'outer;
                }
            }
        }
        match collided {
            Some((i, j)) => {
                let other = list.remove(j);
                merge_pair(&mut list[i], other);
            }
            None => break,
        }
    }
}

/// Merge freshly extracted diagnoses into the full reconstructed list, then
/// clamp, re-rank, and truncate. Merging happens against the complete list
/// before the cap is applied, so a strong new mention of a previously
/// truncated diagnosis reinforces it instead of duplicating it.
pub(crate) fn merge_diagnoses(
    existing: &[WorkingDiagnosis],
    extracted: Vec<WorkingDiagnosis>,
) -> Vec<WorkingDiagnosis> {
    let mut merged: Vec<WorkingDiagnosis> = existing.to_vec();
    for candidate in extracted {
        match merged
            .iter_mut()
            .find(|entry| names_collide(&entry.diagnosis, &candidate.diagnosis))
        {
            Some(entry) => merge_pair(entry, candidate),
            None => merged.push(candidate),
        }
    }
    collapse_collisions(&mut merged);
    for entry in &mut merged {
        entry.probability = clamp_probability(entry.probability);
    }
    merged.sort_by(|a, b| {
        b.probability
            .partial_cmp(&a.probability)
            .unwrap_or(Ordering::Equal)
    });
    merged.truncate(MAX_WORKING_DIAGNOSES);
    merged
}
