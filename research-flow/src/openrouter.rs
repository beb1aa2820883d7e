//! OpenRouter backend for [`GenerationClient`], built on `rig`.
//!
//! OpenRouter has no server-side search grounding, so a grounded request is
//! answered ungrounded with a warning and an empty source list. Useful for
//! manual-mode investigations and for development without a Gemini key.

use async_trait::async_trait;
use rig::{agent::Agent, client::CompletionClient, completion::Prompt, providers::openrouter};
use tracing::warn;

use crate::error::Result;
use crate::generation::{
    GENERATION_ERROR_SENTINEL, GeneratedContent, GenerationClient, GenerationRequest,
};

const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";
const PREAMBLE: &str = "You are a clinical research assistant supporting an ophthalmology practice.";

pub struct OpenRouterClient {
    client: openrouter::Client,
    model: String,
}

impl OpenRouterClient {
    /// Build a client from `OPENROUTER_API_KEY`, honoring `OPENROUTER_MODEL`.
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENROUTER_API_KEY not set"))?;
        let model =
            std::env::var("OPENROUTER_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Ok(Self {
            client: openrouter::Client::new(&api_key),
            model,
        })
    }

    fn agent(&self, preamble: &str) -> Agent<openrouter::CompletionModel> {
        self.client.agent(&self.model).preamble(preamble).build()
    }
}

#[async_trait]
impl GenerationClient for OpenRouterClient {
    async fn generate(&self, request: GenerationRequest) -> Result<GeneratedContent> {
        if request.ground_with_search {
            warn!("openrouter backend cannot ground with web search, answering ungrounded");
        }
        let preamble = match &request.context_hint {
            Some(hint) => format!("{PREAMBLE}\nCase context for this investigation:\n{hint}"),
            None => PREAMBLE.to_string(),
        };
        let agent = self.agent(&preamble);
        match agent.prompt(&request.prompt).await {
            Ok(text) => Ok(GeneratedContent {
                text,
                sources: Vec::new(),
            }),
            Err(err) => {
                warn!(error = %err, "openrouter call failed, reporting the error sentinel");
                Ok(GeneratedContent {
                    text: format!("{GENERATION_ERROR_SENTINEL}: {err}"),
                    sources: Vec::new(),
                })
            }
        }
    }

    fn name(&self) -> &str {
        "openrouter"
    }
}
