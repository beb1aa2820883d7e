//! Plan-text parsing and autonomous-report splitting.
//!
//! The planning prompt asks for one step per line in the form `<n>. <title>`.
//! Parsing is intentionally unforgiving about that shape (anything else on a
//! line is ignored) and forgiving about everything around it: interleaved
//! prose, markdown emphasis, inconsistent numbering.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use super::state::ResearchStep;

/// Hard cap on parsed plan steps.
pub const MAX_PLAN_STEPS: usize = 8;
/// Below this many parsed steps the plan is degenerate: usable, but logged.
pub(crate) const MIN_EXPECTED_PLAN_STEPS: usize = 4;

/// Titles of the synthetic steps an autonomous run is split into.
pub(crate) const SYNTHETIC_STEP_TITLES: [&str; 3] =
    ["Initial analysis", "Differential evaluation", "Synthesis"];

static PLAN_STEP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(\d{1,2})\.\s+(.+?)\s*$").expect("valid plan pattern"));

/// Parse a generated plan into pending steps.
///
/// Step ids are assigned by order of appearance, not by the literal numbers
/// in the text, so a model that numbers `3. 4. 5.` still yields ids `1..`.
pub fn parse_plan(text: &str) -> Vec<ResearchStep> {
    let mut steps: Vec<ResearchStep> = Vec::new();
    for captures in PLAN_STEP_RE.captures_iter(text) {
        if steps.len() == MAX_PLAN_STEPS {
            break;
        }
        let title = clean_title(&captures[2]);
        if title.is_empty() {
            continue;
        }
        let id = steps.len() as u32 + 1;
        steps.push(ResearchStep::pending(id, title));
    }
    if !steps.is_empty() && steps.len() < MIN_EXPECTED_PLAN_STEPS {
        warn!(parsed = steps.len(), "degenerate research plan, fewer steps than expected");
    }
    steps
}

fn clean_title(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| matches!(c, '*' | '_' | '`'))
        .trim()
        .trim_end_matches(':')
        .trim()
        .to_string()
}

static INITIAL_HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*(?:#{1,6}\s*)?\**\s*(?:\d+[.)]\s*)?(?:initial analysis|análisis inicial|analisis inicial|initial assessment|evaluación inicial|evaluacion inicial)\b[^\n]*$")
        .expect("valid heading pattern")
});

static DIFFERENTIAL_HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*(?:#{1,6}\s*)?\**\s*(?:\d+[.)]\s*)?(?:differential evaluation|differential diagnosis|evaluación diferencial|evaluacion diferencial|diagnóstico diferencial|diagnostico diferencial)\b[^\n]*$")
        .expect("valid heading pattern")
});

static SYNTHESIS_HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*(?:#{1,6}\s*)?\**\s*(?:\d+[.)]\s*)?(?:synthesis|síntesis|sintesis|conclusión|conclusiones|conclusions?)\b[^\n]*$")
        .expect("valid heading pattern")
});

/// Split an autonomous report into the three synthetic step bodies.
///
/// Primary path: the three section headings the autonomous prompt asks for,
/// in order. Fallback: paragraphs distributed into three runs of roughly
/// equal length, so the split never fails even on a free-form answer.
pub fn split_autonomous_report(text: &str) -> [String; 3] {
    if let Some(parts) = split_by_headings(text) {
        return parts;
    }
    split_into_thirds(text)
}

fn split_by_headings(text: &str) -> Option<[String; 3]> {
    let initial = INITIAL_HEADING_RE.find(text)?;
    let differential = DIFFERENTIAL_HEADING_RE.find(text)?;
    let synthesis = SYNTHESIS_HEADING_RE.find(text)?;
    if !(initial.start() < differential.start() && differential.start() < synthesis.start()) {
        return None;
    }
    let first = text[initial.end()..differential.start()].trim();
    let second = text[differential.end()..synthesis.start()].trim();
    let third = text[synthesis.end()..].trim();
    if first.is_empty() || second.is_empty() || third.is_empty() {
        return None;
    }
    Some([first.to_string(), second.to_string(), third.to_string()])
}

fn split_into_thirds(text: &str) -> [String; 3] {
    let paragraphs: Vec<&str> = text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    if paragraphs.len() < 3 {
        return char_thirds(text.trim());
    }

    let total: usize = paragraphs.iter().map(|p| p.chars().count()).sum();
    let mut buckets: [Vec<&str>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    let mut bucket = 0;
    let mut used = 0;
    let count = paragraphs.len();
    for (index, paragraph) in paragraphs.iter().enumerate() {
        buckets[bucket].push(paragraph);
        used += paragraph.chars().count();
        let remaining_paragraphs = count - index - 1;
        let remaining_buckets = 2 - bucket;
        // Once only one paragraph per unfilled bucket remains, advance
        // regardless of mass so no bucket ends empty.
        let must_fill = remaining_paragraphs == remaining_buckets;
        let balanced = used * 3 >= total * (bucket + 1)
            && remaining_paragraphs >= remaining_buckets;
        if bucket < 2 && (must_fill || balanced) {
            bucket += 1;
        }
    }
    buckets.map(|chunk| chunk.join("\n\n"))
}

fn char_thirds(text: &str) -> [String; 3] {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let first: String = chars[..len / 3].iter().collect();
    let second: String = chars[len / 3..2 * len / 3].iter().collect();
    let third: String = chars[2 * len / 3..].iter().collect();
    [
        first.trim().to_string(),
        second.trim().to_string(),
        third.trim().to_string(),
    ]
}
