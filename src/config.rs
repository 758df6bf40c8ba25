//! Configuration types for article generation and index analysis.
//!
//! Generation behaviour is controlled through [`GenerationConfig`] and the
//! indexed-query variant through [`AnalysisConfig`]. Both are built via their
//! builders; both embed a [`ClientSettings`] describing how to reach the LLM.
//!
//! Per-request inputs (the uploaded PDF, keyword, headings, query text) are
//! *not* configuration: they live in [`crate::generate::GenerationRequest`]
//! and [`crate::analyze::AnalysisRequest`].

use crate::error::ScribeError;
use crate::progress::ProgressCallback;
use crate::provider::{ApiKey, CompletionClient};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Smallest article length accepted, in tokens.
pub const MIN_ARTICLE_LENGTH: usize = 500;

/// Largest article length accepted, in tokens.
pub const MAX_ARTICLE_LENGTH: usize = 10_000;

/// Step the CLI offers between article lengths.
pub const ARTICLE_LENGTH_STEP: usize = 500;

/// Default completion model.
pub const DEFAULT_MODEL: &str = "gpt-4";

/// Default relative location of the persisted index.
pub const DEFAULT_STORAGE_DIR: &str = "./storage";

/// How to reach the completion backend.
///
/// Resolution order is documented on [`crate::provider::resolve_client`].
#[derive(Clone, Default)]
pub struct ClientSettings {
    /// Pre-constructed client. Takes precedence over everything else.
    pub client: Option<Arc<dyn CompletionClient>>,

    /// Per-session API key for the OpenAI-compatible endpoint.
    ///
    /// Held in memory only; never serialised or written to disk.
    pub api_key: Option<ApiKey>,

    /// Base URL of the OpenAI-compatible endpoint. Default: `https://api.openai.com/v1`.
    pub base_url: Option<String>,

    /// Provider name for environment-based resolution (e.g. "openai", "anthropic").
    pub provider_name: Option<String>,

    /// Model identifier. If None, uses [`DEFAULT_MODEL`].
    pub model: Option<String>,
}

impl ClientSettings {
    /// Model to request, falling back to [`DEFAULT_MODEL`].
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

impl fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSettings")
            .field("client", &self.client.as_ref().map(|_| "<dyn CompletionClient>"))
            .field("api_key", &self.api_key)
            .field("base_url", &self.base_url)
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .finish()
    }
}

/// What happens to the batch when one heading fails to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Any failing heading discards every section; the article comes back empty.
    #[default]
    WholeBatch,
    /// Keep going; each section is tagged with its own success or failure.
    Partial,
}

/// Configuration for the direct-generation variant.
///
/// # Example
/// ```rust
/// use pdfscribe::{FailurePolicy, GenerationConfig};
///
/// let config = GenerationConfig::builder()
///     .model("gpt-4o-mini")
///     .temperature(0.7)
///     .failure_policy(FailurePolicy::Partial)
///     .build()
///     .unwrap();
/// assert_eq!(config.client.model.as_deref(), Some("gpt-4o-mini"));
/// ```
#[derive(Clone)]
pub struct GenerationConfig {
    /// Backend selection.
    pub client: ClientSettings,

    /// Sampling temperature. Default: 1.0 (provider default for chat models).
    pub temperature: f32,

    /// Batch behaviour on a failing heading. Default: [`FailurePolicy::WholeBatch`].
    pub failure_policy: FailurePolicy,

    /// Retry attempts per heading. Default: 0 (failures surface immediately).
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled after each attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout. Default: None (a hung call hangs the run).
    pub api_timeout_secs: Option<u64>,

    /// Custom writing guidelines. If None, uses [`crate::prompts::DEFAULT_GUIDELINES`].
    pub guidelines: Option<String>,

    /// Apply [`crate::pipeline::postprocess::clean_section`] to every body. Default: true.
    pub clean_output: bool,

    /// Optional progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            client: ClientSettings::default(),
            temperature: 1.0,
            failure_policy: FailurePolicy::default(),
            max_retries: 0,
            retry_backoff_ms: 500,
            api_timeout_secs: None,
            guidelines: None,
            clean_output: true,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("client", &self.client)
            .field("temperature", &self.temperature)
            .field("failure_policy", &self.failure_policy)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("guidelines", &self.guidelines.as_ref().map(|g| g.len()))
            .field("clean_output", &self.clean_output)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn callback>"),
            )
            .finish()
    }
}

impl GenerationConfig {
    /// Create a new builder for `GenerationConfig`.
    pub fn builder() -> GenerationConfigBuilder {
        GenerationConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`GenerationConfig`].
#[derive(Debug)]
pub struct GenerationConfigBuilder {
    config: GenerationConfig,
}

impl GenerationConfigBuilder {
    pub fn client(mut self, client: Arc<dyn CompletionClient>) -> Self {
        self.config.client.client = Some(client);
        self
    }

    pub fn api_key(mut self, key: ApiKey) -> Self {
        self.config.client.api_key = Some(key);
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.client.base_url = Some(url.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.client.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.client.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = Some(secs);
        self
    }

    pub fn guidelines(mut self, guidelines: impl Into<String>) -> Self {
        self.config.guidelines = Some(guidelines.into());
        self
    }

    pub fn clean_output(mut self, v: bool) -> Self {
        self.config.clean_output = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GenerationConfig, ScribeError> {
        let c = &self.config;
        if c.api_timeout_secs == Some(0) {
            return Err(ScribeError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_retries > 10 {
            return Err(ScribeError::InvalidConfig(format!(
                "max_retries must be ≤ 10, got {}",
                c.max_retries
            )));
        }
        Ok(self.config)
    }
}

/// Validate a requested article length against
/// [`MIN_ARTICLE_LENGTH`]..=[`MAX_ARTICLE_LENGTH`].
pub fn validate_article_length(length: usize) -> Result<usize, ScribeError> {
    if !(MIN_ARTICLE_LENGTH..=MAX_ARTICLE_LENGTH).contains(&length) {
        return Err(ScribeError::InvalidConfig(format!(
            "Article length must be {}–{}, got {}",
            MIN_ARTICLE_LENGTH, MAX_ARTICLE_LENGTH, length
        )));
    }
    Ok(length)
}

// ── Analysis ─────────────────────────────────────────────────────────────

/// Which embedder turns chunks into vectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbedderKind {
    /// Local feature-hashing vectors of the given dimension. No network.
    Hashing { dimension: usize },
    /// OpenAI-compatible `/embeddings` endpoint with the given model.
    /// Requires [`ClientSettings::api_key`].
    Remote { model: String },
}

impl Default for EmbedderKind {
    fn default() -> Self {
        EmbedderKind::Hashing { dimension: 512 }
    }
}

/// Configuration for the indexed-query variant.
#[derive(Clone)]
pub struct AnalysisConfig {
    /// Backend used for response synthesis.
    pub client: ClientSettings,

    /// Directory holding the persisted index. Default: [`DEFAULT_STORAGE_DIR`].
    pub storage_dir: PathBuf,

    /// Chunks retrieved per query. Default: 2.
    pub top_k: usize,

    /// Maximum characters per chunk. Default: 2048.
    pub chunk_chars: usize,

    /// Characters shared between consecutive chunks, at most half of
    /// `chunk_chars`. Default: 200.
    pub chunk_overlap: usize,

    /// Embedding backend. Default: hashing, 512 dimensions.
    pub embedder: EmbedderKind,

    /// Synthesis temperature. Default: 0.1.
    pub temperature: f32,

    /// Max tokens for the synthesized answer. Default: 1024.
    pub max_tokens: usize,

    /// Per-call timeout. Default: None.
    pub api_timeout_secs: Option<u64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            client: ClientSettings::default(),
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            top_k: 2,
            chunk_chars: 2048,
            chunk_overlap: 200,
            embedder: EmbedderKind::default(),
            temperature: 0.1,
            max_tokens: 1024,
            api_timeout_secs: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("client", &self.client)
            .field("storage_dir", &self.storage_dir)
            .field("top_k", &self.top_k)
            .field("chunk_chars", &self.chunk_chars)
            .field("chunk_overlap", &self.chunk_overlap)
            .field("embedder", &self.embedder)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn client(mut self, client: Arc<dyn CompletionClient>) -> Self {
        self.config.client.client = Some(client);
        self
    }

    pub fn api_key(mut self, key: ApiKey) -> Self {
        self.config.client.api_key = Some(key);
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.client.base_url = Some(url.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.client.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.client.model = Some(model.into());
        self
    }

    pub fn storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.storage_dir = dir.into();
        self
    }

    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k.max(1);
        self
    }

    pub fn chunk_chars(mut self, n: usize) -> Self {
        self.config.chunk_chars = n;
        self
    }

    pub fn chunk_overlap(mut self, n: usize) -> Self {
        self.config.chunk_overlap = n;
        self
    }

    pub fn embedder(mut self, kind: EmbedderKind) -> Self {
        self.config.embedder = kind;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = Some(secs);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, ScribeError> {
        let c = &self.config;
        if c.chunk_chars < 64 {
            return Err(ScribeError::InvalidConfig(format!(
                "chunk_chars must be ≥ 64, got {}",
                c.chunk_chars
            )));
        }
        if c.chunk_overlap > c.chunk_chars / 2 {
            return Err(ScribeError::InvalidConfig(format!(
                "chunk_overlap ({}) must be at most half of chunk_chars ({})",
                c.chunk_overlap, c.chunk_chars
            )));
        }
        if let EmbedderKind::Hashing { dimension } = c.embedder {
            if dimension == 0 {
                return Err(ScribeError::InvalidConfig(
                    "Embedding dimension must be ≥ 1".into(),
                ));
            }
        }
        if matches!(c.embedder, EmbedderKind::Remote { .. }) && c.client.api_key.is_none() {
            return Err(ScribeError::InvalidConfig(
                "Remote embeddings require an API key".into(),
            ));
        }
        if c.api_timeout_secs == Some(0) {
            return Err(ScribeError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}
