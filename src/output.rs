//! Result types returned by the generation and analysis pipelines.

use crate::error::{ExtractionFailure, ScribeError, SectionError};
use crate::pipeline::format::QueryResponse;
use crate::pipeline::package::DownloadArtifact;
use serde::{Deserialize, Serialize};

/// A generated (heading, body) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedSection {
    pub heading: String,
    pub body: String,
}

/// Outcome of generating one heading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionResult {
    /// 1-based position in the heading list.
    pub index: usize,
    pub heading: String,
    /// Empty when `error` is set.
    pub body: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    pub retries: u8,
    pub error: Option<SectionError>,
}

impl SectionResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn section(&self) -> GeneratedSection {
        GeneratedSection {
            heading: self.heading.clone(),
            body: self.body.clone(),
        }
    }
}

/// Join sections as `"{heading}\n{body}"` blocks separated by a blank line.
pub fn assemble_article(sections: &[GeneratedSection]) -> String {
    sections
        .iter()
        .map(|s| format!("{}\n{}", s.heading, s.body))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Counters for one generation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationStats {
    pub heading_count: usize,
    /// `None` when there were no headings to divide by.
    pub token_budget: Option<usize>,
    pub generated_sections: usize,
    pub failed_sections: usize,
    pub sample_chars: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
    pub extract_duration_ms: u64,
    pub llm_duration_ms: u64,
}

/// Everything a generation run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutput {
    /// The article text; empty when nothing was generated.
    pub article: String,
    pub sections: Vec<SectionResult>,
    /// Set when the uploaded document could not be fully read.
    pub extraction_error: Option<ExtractionFailure>,
    pub artifact: DownloadArtifact,
    pub stats: GenerationStats,
}

impl GenerationOutput {
    /// Treat any failed section as an error.
    pub fn into_result(self) -> Result<Self, ScribeError> {
        if let Some(first) = self.sections.iter().find_map(|s| s.error.as_ref()) {
            return Err(ScribeError::GenerationFailed {
                heading: first.heading().to_string(),
                detail: first.to_string(),
            });
        }
        Ok(self)
    }
}

/// How the index was made ready for a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexAction {
    /// Built from the staged documents and persisted.
    Built,
    /// Loaded from the persisted manifest.
    Loaded,
    /// Already in memory from an earlier call on the same handle.
    Reused,
}

/// Everything an analysis run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutput {
    /// Formatted result string.
    pub result: String,
    pub response: QueryResponse,
    pub index_action: IndexAction,
    pub artifact: DownloadArtifact,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(h: &str, b: &str) -> GeneratedSection {
        GeneratedSection {
            heading: h.into(),
            body: b.into(),
        }
    }

    #[test]
    fn article_layout() {
        let article = assemble_article(&[section("Intro", "Hello."), section("End", "Bye.")]);
        assert_eq!(article, "Intro\nHello.\n\nEnd\nBye.");
    }

    #[test]
    fn empty_article() {
        assert_eq!(assemble_article(&[]), "");
    }
}
