//! Google Gemini client for generation and embeddings

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{CompletionRequest, LlmClient};
use crate::rag::Embed;
use crate::retry::{self, Attempt, RetryPolicy};
use crate::{Error, Result};

/// Public Gemini API endpoint
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini REST client
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: SecretString,
    model: String,
    embedding_model: String,
    base_url: String,
    retry: RetryPolicy,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    content: Content<'a>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

impl GeminiClient {
    /// Create a client sharing an existing HTTP handle
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        api_key: SecretString,
        model: impl Into<String>,
        embedding_model: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_key,
            model: model.into(),
            embedding_model: embedding_model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    /// Point the client at another endpoint
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Generation model name
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/v1beta/models/{model}:{method}", self.base_url)
    }

    /// POST a JSON body, retrying transient failures
    async fn post<B, R>(&self, url: &str, body: &B, wrap: fn(String) -> Error) -> Result<R>
    where
        B: Serialize + Sync,
        R: serde::de::DeserializeOwned + Send,
    {
        let http = &self.http;
        let key = self.api_key.expose_secret();

        retry::run(&self.retry, "gemini", wrap, move || async move {
            let response = match http
                .post(url)
                .header("x-goog-api-key", key)
                .json(body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) if retry::is_transient(&e) => {
                    return Ok(Attempt::Retry {
                        reason: e.to_string(),
                        retry_after: None,
                    });
                }
                Err(e) => return Err(wrap(e.to_string())),
            };

            let status = response.status();
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            if status.is_success() {
                let parsed = response
                    .json::<R>()
                    .await
                    .map_err(|e| Error::MalformedLlmOutput(e.to_string()))?;
                return Ok(Attempt::Done(parsed));
            }

            let text = response.text().await.unwrap_or_default();
            if retry::is_recoverable(status.as_u16(), &text) {
                Ok(Attempt::Retry {
                    reason: format!("status {status}"),
                    retry_after: retry::parse_retry_after(&text, retry_after.as_deref()),
                })
            } else {
                Err(wrap(format!("Gemini API error {status}: {text}")))
            }
        })
        .await
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = GenerateRequest {
            system_instruction: request.system.as_deref().map(|text| Content {
                role: None,
                parts: [Part { text }],
            }),
            contents: [Content {
                role: Some("user"),
                parts: [Part {
                    text: &request.prompt,
                }],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                response_mime_type: request.json.then_some("application/json"),
            },
        };

        let url = self.endpoint(&self.model, "generateContent");
        let response: GenerateResponse = self.post(&url, &body, Error::Llm).await?;

        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(Error::MalformedLlmOutput("empty completion".to_string()));
        }

        tracing::debug!(model = %self.model, chars = text.len(), "completion received");
        Ok(text)
    }
}

#[async_trait]
impl Embed for GeminiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = EmbedRequest {
            content: Content {
                role: None,
                parts: [Part { text }],
            },
        };

        let url = self.endpoint(&self.embedding_model, "embedContent");
        let response: EmbedResponse = self.post(&url, &body, Error::Embedding).await?;

        if response.embedding.values.is_empty() {
            return Err(Error::Embedding("empty embedding response".to_string()));
        }
        Ok(response.embedding.values)
    }
}
