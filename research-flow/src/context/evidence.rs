//! Evidence-quality scoring over grounded web sources.

use crate::generation::WebSource;

use super::model::{ConsensusLevel, EvidenceQuality};
use super::rules::{HIGH_QUALITY_DOMAINS, PEER_REVIEW_MARKERS};

/// Consensus from the high-quality ratio. A total of zero is low consensus,
/// never a division error.
pub fn consensus_level(high_quality: u32, total: u32) -> ConsensusLevel {
    if total == 0 {
        return ConsensusLevel::Low;
    }
    let ratio = f64::from(high_quality) / f64::from(total);
    if ratio >= 0.7 {
        ConsensusLevel::High
    } else if ratio >= 0.4 {
        ConsensusLevel::Moderate
    } else {
        ConsensusLevel::Low
    }
}

pub(crate) fn is_high_quality(source: &WebSource) -> bool {
    let uri = source.uri.to_lowercase();
    HIGH_QUALITY_DOMAINS.iter().any(|domain| uri.contains(domain))
}

pub(crate) fn is_peer_reviewed(source: &WebSource) -> bool {
    let haystack = format!("{} {}", source.uri, source.title).to_lowercase();
    PEER_REVIEW_MARKERS.iter().any(|marker| haystack.contains(marker))
}

/// Folds a batch of sources into the monotonic counters and recomputes the
/// consensus level. Counters only ever grow; sources from earlier steps keep
/// counting.
pub(crate) fn update_evidence(quality: &mut EvidenceQuality, sources: &[WebSource]) {
    for source in sources {
        quality.total_sources += 1;
        if is_high_quality(source) {
            quality.high_quality_sources += 1;
        }
        if is_peer_reviewed(source) {
            quality.peer_reviewed_sources += 1;
        }
    }
    quality.consensus_level = consensus_level(quality.high_quality_sources, quality.total_sources);
}
