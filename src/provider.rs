//! Completion backends behind a single [`CompletionClient`] seam.
//!
//! Two implementations ship with the crate:
//!
//! * [`OpenAiClient`]: talks to any OpenAI-compatible `/chat/completions`
//!   and `/embeddings` endpoint with a key supplied by the caller for this
//!   session only. This is the path the CLI takes when `--api-key` is given.
//! * [`LlmProviderClient`]: wraps an `edgequake-llm` provider resolved from
//!   the environment (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, …).
//!
//! Tests and embedders of the library can supply their own implementation via
//! [`crate::config::ClientSettings::client`].

use crate::config::ClientSettings;
use crate::error::ScribeError;
use crate::index::embed::Embedder;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Default OpenAI-compatible endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// A per-session API key.
///
/// `Debug` and `Display` never print the key itself.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw key, for building the `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// A single-turn completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// The whole prompt, sent as one system message.
    pub system: String,
    /// Upper bound on generated tokens.
    pub max_tokens: Option<usize>,
    pub temperature: f32,
}

/// What came back from the backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub content: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

/// Anything that can turn a prompt into text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Short label for logs.
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ScribeError>;
}

// ── edgequake-llm adapter ────────────────────────────────────────────────

/// Completion client backed by an `edgequake-llm` provider.
pub struct LlmProviderClient {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl LlmProviderClient {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }
}

#[async_trait]
impl CompletionClient for LlmProviderClient {
    fn name(&self) -> &str {
        &self.label
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ScribeError> {
        let messages = vec![ChatMessage::system(request.system.as_str())];
        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: request.max_tokens,
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| ScribeError::LlmApiError {
                message: e.to_string(),
            })?;

        Ok(Completion {
            content: response.content,
            prompt_tokens: response.prompt_tokens as usize,
            completion_tokens: response.completion_tokens as usize,
        })
    }
}

// ── OpenAI-compatible HTTP client ────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Client for OpenAI-compatible endpoints using an explicit per-session key.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: ApiKey,
    base_url: String,
    model: String,
    embedding_model: String,
}

impl OpenAiClient {
    pub fn new(api_key: ApiKey, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            embedding_model: "text-embedding-3-small".to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, ScribeError> {
        let url = self.endpoint(path);
        debug!("POST {}", url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose())
            .json(body)
            .send()
            .await
            .map_err(|e| ScribeError::LlmApiError {
                message: format!("Failed to send request to {}: {}", url, e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ScribeError::LlmApiError {
                message: format!("HTTP {}: {}", status, error_text),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ScribeError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![WireMessage {
                role: "system",
                content: &request.system,
            }],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let parsed: ChatResponse = self
            .post_json("chat/completions", &body)
            .await?
            .json()
            .await
            .map_err(|e| ScribeError::LlmApiError {
                message: format!("Failed to parse completion response: {}", e),
            })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ScribeError::LlmApiError {
                message: "Completion response contained no choices".to_string(),
            })?;
        let usage = parsed.usage.unwrap_or_default();

        Ok(Completion {
            content,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiClient {
    fn id(&self) -> String {
        format!("openai:{}", self.embedding_model)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ScribeError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = EmbeddingRequest {
            input: texts,
            model: &self.embedding_model,
        };

        let parsed: EmbeddingResponse = self
            .post_json("embeddings", &body)
            .await?
            .json()
            .await
            .map_err(|e| ScribeError::LlmApiError {
                message: format!("Failed to parse embedding response: {}", e),
            })?;

        if parsed.data.len() != texts.len() {
            return Err(ScribeError::LlmApiError {
                message: format!(
                    "Expected {} embeddings, received {}",
                    texts.len(),
                    parsed.data.len()
                ),
            });
        }
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

// ── Resolution ───────────────────────────────────────────────────────────

/// Resolve the completion client, from most-specific to least-specific.
///
/// 1. **Pre-built client** (`settings.client`): used as-is (tests, custom
///    middleware).
/// 2. **Named provider** (`settings.provider_name`): `edgequake-llm`
///    factory, reading that provider's key from the environment.
/// 3. **Explicit key** (`settings.api_key`): an [`OpenAiClient`] against
///    `settings.base_url` or the public OpenAI endpoint.
/// 4. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_client(settings: &ClientSettings) -> Result<Arc<dyn CompletionClient>, ScribeError> {
    if let Some(ref client) = settings.client {
        return Ok(Arc::clone(client));
    }

    let model = settings.model_or_default();

    // A named provider wins over a key, which the CLI may have filled from
    // OPENAI_API_KEY without the user asking for OpenAI.
    if let Some(ref name) = settings.provider_name {
        return create_provider_client(name, model);
    }

    if let Some(ref key) = settings.api_key {
        let mut client = OpenAiClient::new(key.clone(), model);
        if let Some(ref url) = settings.base_url {
            client = client.with_base_url(url.as_str());
        }
        return Ok(Arc::new(client));
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider_client(&prov, &env_model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ScribeError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No API key was given and no LLM provider could be auto-detected.\n\
                Pass --api-key, or set OPENAI_API_KEY / ANTHROPIC_API_KEY.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(Arc::new(LlmProviderClient::new(llm_provider, "auto")))
}

fn create_provider_client(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn CompletionClient>, ScribeError> {
    let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ScribeError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    Ok(Arc::new(LlmProviderClient::new(
        provider,
        format!("{provider_name}:{model}"),
    )))
}
