use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// In-band failure marker for generation backends.
///
/// Backends that can produce partial output (an HTTP error body, an empty
/// candidate list) prefix their text with this sentinel instead of returning
/// `Err`, so the orchestrator can treat transport failures and degenerate
/// responses through one path. The orchestrator strips the prefix and converts
/// the remainder into [`crate::FlowError::Generation`].
pub const GENERATION_ERROR_SENTINEL: &str = "[GENERATION_ERROR]";

/// A web source attached to generated content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSource {
    pub uri: String,
    pub title: String,
}

impl WebSource {
    pub fn new(uri: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            title: title.into(),
        }
    }
}

/// One request to a generation backend.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// The full prompt for this call.
    pub prompt: String,
    /// Ask the backend to ground the answer in web search results.
    /// Backends that cannot ground must log a warning and answer ungrounded.
    pub ground_with_search: bool,
    /// Bounded summary of the investigation context, injected as the
    /// backend's system instruction when present.
    pub context_hint: Option<String>,
}

/// Text plus the sources it was grounded on (empty when ungrounded).
#[derive(Debug, Clone, Default)]
pub struct GeneratedContent {
    pub text: String,
    pub sources: Vec<WebSource>,
}

/// A text-generation backend the pipeline delegates to.
///
/// Implementations must be cheap to share (`Arc<dyn GenerationClient>`); the
/// pipeline issues at most one call at a time per investigation but a service
/// may drive many investigations against one client.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<GeneratedContent>;

    /// Backend name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
