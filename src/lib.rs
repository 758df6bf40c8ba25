//! # pdfscribe
//!
//! Generate keyword-focused articles from a sample PDF, and answer questions
//! from a persisted index over uploaded documents, using chat-completion LLMs.
//!
//! ## Two Pipelines
//!
//! ```text
//! generate
//!  ├─ 1. Extract   PDF/DOCX/TXT sample → plain text (spawn_blocking)
//!  ├─ 2. Headings  "Intro, Benefits, …" → list + per-section token budget
//!  ├─ 3. LLM       one completion call per heading, in order
//!  ├─ 4. Polish    strip fences, echoed headings, stray whitespace
//!  └─ 5. Package   "{heading}\n{body}" blocks → base64 data-URI download
//!
//! analyze
//!  ├─ 1. Stage     template + data docs into a request-scoped temp dir
//!  ├─ 2. Index     build once (chunk → embed → index.json), then reload
//!  ├─ 3. Query     top-k cosine retrieval + LLM synthesis
//!  └─ 4. Package   formatted answer → base64 data-URI download
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfscribe::{generate_article, read_file, GenerationConfig, GenerationRequest};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = GenerationConfig::default();
//!     let request = GenerationRequest {
//!         document: Some(read_file(Path::new("sample.pdf"))?),
//!         keyword: "solar panels".into(),
//!         article_length: 1500,
//!         headings: "Intro, Benefits, Conclusion".into(),
//!     };
//!     let output = generate_article(request, &config).await?;
//!     println!("{}", output.article);
//!     eprintln!("{}", output.artifact.html_link());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfscribe` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdfscribe = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod generate;
pub mod index;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod provider;
pub mod session;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze, analyze_with_handle, AnalysisRequest};
pub use config::{
    AnalysisConfig, AnalysisConfigBuilder, ClientSettings, EmbedderKind, FailurePolicy,
    GenerationConfig, GenerationConfigBuilder,
};
pub use error::{ExtractionFailure, ScribeError, SectionError};
pub use generate::{generate_article, generate_to_file, GenerationRequest};
pub use index::{IndexHandle, IndexState};
pub use output::{
    AnalysisOutput, GeneratedSection, GenerationOutput, GenerationStats, IndexAction,
    SectionResult,
};
pub use pipeline::extract::{inspect, read_file, Document, DocumentInfo, DocumentKind};
pub use pipeline::format::{format_response, QueryResponse};
pub use pipeline::package::{package_download, DownloadArtifact};
pub use progress::{GenerationProgressCallback, NoopProgressCallback, ProgressCallback};
pub use provider::{ApiKey, CompletionClient};
pub use session::{PipelineEvent, PipelineState, Session};
pub use stream::{generate_stream, SectionStream};
