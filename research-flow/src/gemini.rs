//! Gemini REST backend for [`GenerationClient`].
//!
//! Talks to the `generateContent` endpoint directly because grounded
//! generation (the Google Search tool plus grounding metadata) lives there.
//! Transport and API failures are reported in-band through the error
//! sentinel, so a flaky upstream marks a step as failed instead of killing
//! the investigation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::generation::{
    GENERATION_ERROR_SENTINEL, GeneratedContent, GenerationClient, GenerationRequest, WebSource,
};

const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    /// Build a client from `GEMINI_API_KEY`, honoring `GEMINI_MODEL`.
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow::anyhow!("GEMINI_API_KEY not set"))?;
        let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Ok(Self::new(api_key, model))
    }

    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{API_BASE}/{}:generateContent", self.model)
    }

    async fn post(&self, body: &GenerateContentRequest) -> anyhow::Result<GenerateContentResponse> {
        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("gemini returned {status}: {detail}");
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn generate(&self, request: GenerationRequest) -> Result<GeneratedContent> {
        let body = GenerateContentRequest::from_request(&request);
        match self.post(&body).await {
            Ok(response) => Ok(response.into_content()),
            Err(err) => {
                warn!(error = %err, "gemini call failed, reporting the error sentinel");
                Ok(GeneratedContent {
                    text: format!("{GENERATION_ERROR_SENTINEL}: {err}"),
                    sources: Vec::new(),
                })
            }
        }
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<RequestContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
}

impl GenerateContentRequest {
    fn from_request(request: &GenerationRequest) -> Self {
        let tools = if request.ground_with_search {
            vec![Tool {
                google_search: GoogleSearch {},
            }]
        } else {
            Vec::new()
        };
        let system_instruction = request.context_hint.as_ref().map(|hint| RequestContent {
            parts: vec![TextPart {
                text: format!("Case context for this investigation:\n{hint}"),
            }],
        });
        Self {
            contents: vec![RequestContent {
                parts: vec![TextPart {
                    text: request.prompt.clone(),
                }],
            }],
            system_instruction,
            tools,
        }
    }
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Debug, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    fn into_content(self) -> GeneratedContent {
        let Some(candidate) = self.candidates.into_iter().next() else {
            return GeneratedContent {
                text: format!("{GENERATION_ERROR_SENTINEL}: gemini returned no candidates"),
                sources: Vec::new(),
            };
        };
        let text: String = candidate
            .content
            .parts
            .into_iter()
            .map(|part| part.text)
            .collect();
        let sources = candidate
            .grounding_metadata
            .map(|metadata| {
                metadata
                    .grounding_chunks
                    .into_iter()
                    .filter_map(|chunk| chunk.web)
                    .map(|web| {
                        let title = if web.title.is_empty() {
                            web.uri.clone()
                        } else {
                            web.title
                        };
                        WebSource::new(web.uri, title)
                    })
                    .collect()
            })
            .unwrap_or_default();
        GeneratedContent { text, sources }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: CandidateContent,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Default, Deserialize)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<WebChunk>,
}

#[derive(Debug, Deserialize)]
struct WebChunk {
    #[serde(default)]
    uri: String,
    #[serde(default)]
    title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grounded_response_parses_text_and_sources() {
        let raw = r#"{
            "candidates": [{
                "content": {
                    "parts": [{"text": "Retinal detachment is "}, {"text": "the leading concern."}],
                    "role": "model"
                },
                "groundingMetadata": {
                    "groundingChunks": [
                        {"web": {"uri": "https://www.aao.org/detachment", "title": "AAO guidance"}},
                        {"web": {"uri": "https://pubmed.ncbi.nlm.nih.gov/12345", "title": ""}},
                        {"retrievedContext": {"uri": "ignored"}}
                    ]
                }
            }]
        }"#;
        let parsed: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        let content = parsed.into_content();
        assert_eq!(content.text, "Retinal detachment is the leading concern.");
        assert_eq!(content.sources.len(), 2);
        assert_eq!(content.sources[0].title, "AAO guidance");
        // Untitled chunks fall back to the URI.
        assert_eq!(content.sources[1].title, "https://pubmed.ncbi.nlm.nih.gov/12345");
    }

    #[test]
    fn empty_candidates_yield_the_sentinel() {
        let parsed: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        let content = parsed.into_content();
        assert!(content.text.starts_with(GENERATION_ERROR_SENTINEL));
        assert!(content.sources.is_empty());
    }

    #[test]
    fn request_wire_shape_matches_the_api() {
        let request = GenerationRequest {
            prompt: "What causes sudden vision loss?".to_string(),
            ground_with_search: true,
            context_hint: Some("70-year-old, right eye".to_string()),
        };
        let body = GenerateContentRequest::from_request(&request);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json["contents"][0]["parts"][0]["text"],
            "What causes sudden vision loss?"
        );
        assert!(json["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("70-year-old"));
        assert!(json["tools"][0]["googleSearch"].is_object());

        let ungrounded = GenerateContentRequest::from_request(&GenerationRequest {
            prompt: "p".to_string(),
            ground_with_search: false,
            context_hint: None,
        });
        let json = serde_json::to_value(&ungrounded).unwrap();
        assert!(json.get("tools").is_none());
        assert!(json.get("systemInstruction").is_none());
    }
}
