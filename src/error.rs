//! Error types for the pdfscribe library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ScribeError`]: **Fatal**: the current pipeline stage cannot produce
//!   a result (unsupported input, provider not configured, index unreadable,
//!   query failed). Returned as `Err(ScribeError)` from the top-level
//!   `generate*` / `analyze*` functions.
//!
//! * [`SectionError`]: **Non-fatal**: a single heading failed to generate.
//!   Stored inside [`crate::output::SectionResult`] when the
//!   [`crate::config::FailurePolicy::Partial`] policy is active, so callers
//!   can inspect which sections made it instead of losing the whole article.
//!
//! Extraction problems are deliberately *not* fatal for the generation
//! variant: an unreadable PDF yields an empty sample text plus an
//! [`ExtractionFailure`] record, and the pipeline carries on.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdfscribe library.
#[derive(Debug, Error)]
pub enum ScribeError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Declared media type is not one of pdf / docx / txt.
    ///
    /// Raised at the input boundary, before any extraction starts.
    #[error("Unsupported file format '{format}' for '{path}'. Expected .pdf, .docx or .txt")]
    UnsupportedFormat { path: PathBuf, format: String },

    /// The document could not be turned into text and the stage cannot
    /// tolerate an empty result (index ingestion, `inspect`).
    #[error("Failed to extract text from '{source_name}': {detail}")]
    ExtractionFailed { source_name: String, detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// A completion call failed and the whole batch was discarded.
    #[error("Article generation failed at heading '{heading}': {detail}")]
    GenerationFailed { heading: String, detail: String },

    /// The LLM API returned an error outside of section generation.
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    // ── Index errors ──────────────────────────────────────────────────────
    /// The persisted index is missing, unreadable or incompatible.
    #[error("Index error at '{path}': {detail}")]
    Index { path: PathBuf, detail: String },

    /// The index query (retrieval or synthesis) failed; no partial answer.
    #[error("Query failed: {detail}")]
    QueryFailed { detail: String },

    // ── Session errors ────────────────────────────────────────────────────
    /// A pipeline event arrived in a state that does not accept it.
    #[error("Invalid pipeline transition: {event} while {state}")]
    InvalidTransition { state: String, event: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScribeError {
    /// Map an `std::io::Error` raised while reading `path` to the closest
    /// input error.
    pub(crate) fn from_read(path: PathBuf, e: &std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::PermissionDenied => ScribeError::PermissionDenied { path },
            std::io::ErrorKind::NotFound => ScribeError::FileNotFound { path },
            _ => ScribeError::Internal(format!("Failed to read '{}': {}", path.display(), e)),
        }
    }
}

/// A non-fatal error for a single generated section.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
pub enum SectionError {
    /// Completion call failed after the configured retries.
    #[error("Section {index} ('{heading}'): LLM call failed after {retries} retries: {detail}")]
    LlmFailed {
        index: usize,
        heading: String,
        retries: u8,
        detail: String,
    },

    /// Completion call exceeded the per-call timeout.
    #[error("Section {index} ('{heading}'): LLM call timed out after {secs}s")]
    Timeout {
        index: usize,
        heading: String,
        secs: u64,
    },
}

impl SectionError {
    /// Heading the failed section was generated for.
    pub fn heading(&self) -> &str {
        match self {
            SectionError::LlmFailed { heading, .. } | SectionError::Timeout { heading, .. } => {
                heading
            }
        }
    }
}

/// Record of a text extraction that did not fully succeed.
///
/// Kept alongside whatever text was accumulated before the failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractionFailure {
    /// 1-indexed page that failed, or `None` when the whole document was unreadable.
    pub page: Option<usize>,
    pub detail: String,
}

impl std::fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.page {
            Some(page) => write!(f, "page {}: {}", page, self.detail),
            None => write!(f, "{}", self.detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_format_display() {
        let e = ScribeError::UnsupportedFormat {
            path: PathBuf::from("slides.pptx"),
            format: "pptx".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("pptx"), "got: {msg}");
        assert!(msg.contains(".docx"), "got: {msg}");
    }

    #[test]
    fn generation_failed_display() {
        let e = ScribeError::GenerationFailed {
            heading: "Benefits".into(),
            detail: "HTTP 500".into(),
        };
        assert!(e.to_string().contains("Benefits"));
        assert!(e.to_string().contains("HTTP 500"));
    }

    #[test]
    fn section_error_heading_accessor() {
        let e = SectionError::Timeout {
            index: 2,
            heading: "Conclusion".into(),
            secs: 30,
        };
        assert_eq!(e.heading(), "Conclusion");
        assert!(e.to_string().contains("30s"));
    }

    #[test]
    fn from_read_maps_kinds() {
        let not_found = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(
            ScribeError::from_read(PathBuf::from("a.pdf"), &not_found),
            ScribeError::FileNotFound { .. }
        ));
        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no");
        assert!(matches!(
            ScribeError::from_read(PathBuf::from("a.pdf"), &denied),
            ScribeError::PermissionDenied { .. }
        ));
    }

    #[test]
    fn extraction_failure_display() {
        let whole = ExtractionFailure {
            page: None,
            detail: "not a PDF".into(),
        };
        assert_eq!(whole.to_string(), "not a PDF");
        let page = ExtractionFailure {
            page: Some(3),
            detail: "bad stream".into(),
        };
        assert_eq!(page.to_string(), "page 3: bad stream");
    }
}
