use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::evidence;
use crate::error::Result;
use crate::generation::WebSource;

/// A source that passed validation, with its quality verdict attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedSource {
    pub uri: String,
    pub title: String,
    pub high_quality: bool,
    pub peer_reviewed: bool,
}

impl From<ValidatedSource> for WebSource {
    fn from(source: ValidatedSource) -> Self {
        WebSource::new(source.uri, source.title)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualitySignals {
    pub high_quality: u32,
    pub peer_reviewed: u32,
}

/// Outcome of validating one batch of grounded sources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceValidation {
    pub validated_sources: Vec<ValidatedSource>,
    pub quality_signals: QualitySignals,
    /// Conflicting claims found across sources. Populated only by validators
    /// that actually compare content; the heuristic one leaves it empty.
    pub contradictions: Vec<String>,
}

/// Validates the sources a grounded generation call returned before they are
/// attached to steps and folded into the evidence counters.
#[async_trait]
pub trait SourceValidator: Send + Sync {
    async fn validate(&self, sources: &[WebSource]) -> Result<SourceValidation>;
}

/// Offline validator: deduplicates by URI, drops non-http references, and
/// scores quality against the fixed domain allowlist. No network calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicValidator;

impl HeuristicValidator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SourceValidator for HeuristicValidator {
    async fn validate(&self, sources: &[WebSource]) -> Result<SourceValidation> {
        let mut validated: Vec<ValidatedSource> = Vec::new();
        for source in sources {
            let uri = source.uri.trim();
            if !uri.starts_with("http://") && !uri.starts_with("https://") {
                continue;
            }
            if validated.iter().any(|v| v.uri.eq_ignore_ascii_case(uri)) {
                continue;
            }
            let title = if source.title.trim().is_empty() {
                uri.to_string()
            } else {
                source.title.trim().to_string()
            };
            validated.push(ValidatedSource {
                uri: uri.to_string(),
                title,
                high_quality: evidence::is_high_quality(source),
                peer_reviewed: evidence::is_peer_reviewed(source),
            });
        }

        let quality_signals = QualitySignals {
            high_quality: validated.iter().filter(|v| v.high_quality).count() as u32,
            peer_reviewed: validated.iter().filter(|v| v.peer_reviewed).count() as u32,
        };
        debug!(
            input = sources.len(),
            kept = validated.len(),
            high_quality = quality_signals.high_quality,
            "validated grounded sources"
        );

        Ok(SourceValidation {
            validated_sources: validated,
            quality_signals,
            contradictions: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deduplicates_and_drops_non_web_references() {
        let validator = HeuristicValidator::new();
        let validation = validator
            .validate(&[
                WebSource::new("https://pubmed.ncbi.nlm.nih.gov/1/", "Study"),
                WebSource::new("https://pubmed.ncbi.nlm.nih.gov/1/", "Study again"),
                WebSource::new("ftp://old.example.com/file", "Not web"),
                WebSource::new("https://example.com/post", ""),
            ])
            .await
            .unwrap();

        assert_eq!(validation.validated_sources.len(), 2);
        assert_eq!(validation.quality_signals.high_quality, 1);
        assert_eq!(validation.quality_signals.peer_reviewed, 1);
        // Empty titles fall back to the URI.
        assert_eq!(validation.validated_sources[1].title, "https://example.com/post");
        assert!(validation.contradictions.is_empty());
    }

    #[tokio::test]
    async fn validated_sources_convert_back_to_web_sources() {
        let validator = HeuristicValidator::new();
        let validation = validator
            .validate(&[WebSource::new("https://nejm.org/a", "Trial")])
            .await
            .unwrap();
        let back: Vec<WebSource> = validation
            .validated_sources
            .into_iter()
            .map(WebSource::from)
            .collect();
        assert_eq!(back, vec![WebSource::new("https://nejm.org/a", "Trial")]);
    }
}
