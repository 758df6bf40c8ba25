//! Direct-generation entry points.
//!
//! This module provides the eager API: every heading is generated, then the
//! article is assembled and returned in one piece. Use
//! [`crate::stream::generate_stream`] to receive sections as they finish.

use crate::config::{validate_article_length, GenerationConfig};
use crate::error::ScribeError;
use crate::output::{assemble_article, GenerationOutput, GenerationStats};
use crate::pipeline::extract::{extract_text_async, Document};
use crate::pipeline::headings::{parse_headings, token_budget};
use crate::pipeline::llm::{generate_sections, SectionContext};
use crate::pipeline::package::{package_download, write_artifact, GENERATED_ARTICLE_FILENAME};
use crate::provider::resolve_client;
use crate::session::{PipelineEvent, Session};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Inputs for one article.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Sample article whose text is passed to every prompt. Optional.
    pub document: Option<Document>,
    pub keyword: String,
    /// Requested article length in tokens, split evenly across headings.
    pub article_length: usize,
    /// Comma-separated heading list, e.g. `"Intro, Benefits, Conclusion"`.
    pub headings: String,
}

/// Generate a full article.
///
/// # Returns
/// `Ok(GenerationOutput)` when every heading was generated, or under
/// [`crate::FailurePolicy::Partial`] even if some failed (check
/// `output.stats.failed_sections`). An unreadable sample document is not an
/// error: it is reported in `output.extraction_error` and generation runs
/// without a sample.
///
/// # Errors
/// - `InvalidConfig` if the article length is out of range
/// - `ProviderNotConfigured` if no backend can be resolved
/// - `GenerationFailed` under [`crate::FailurePolicy::WholeBatch`] when any
///   heading fails
pub async fn generate_article(
    request: GenerationRequest,
    config: &GenerationConfig,
) -> Result<GenerationOutput, ScribeError> {
    let mut session = Session::new();
    let result = run(request, config, &mut session).await;
    if result.is_err() {
        session.fail();
    }
    debug!("Generation trace: {:?}", session.trace());
    result
}

async fn run(
    request: GenerationRequest,
    config: &GenerationConfig,
    session: &mut Session,
) -> Result<GenerationOutput, ScribeError> {
    let total_start = Instant::now();
    let article_length = validate_article_length(request.article_length)?;
    session.apply(PipelineEvent::Submit)?;

    // ── Step 1: Headings and budget ──────────────────────────────────────
    let headings = parse_headings(&request.headings);
    let budget = token_budget(article_length, headings.len());
    info!(
        "Starting generation: keyword '{}', {} headings, budget {:?}",
        request.keyword,
        headings.len(),
        budget
    );

    // Resolve the backend up front so a missing key fails before extraction.
    let client = if headings.is_empty() {
        None
    } else {
        Some(resolve_client(&config.client)?)
    };

    // ── Step 2: Extract the sample ───────────────────────────────────────
    session.apply(PipelineEvent::StartExtraction)?;
    let extract_start = Instant::now();
    let (sample, extraction_error) = match request.document {
        Some(doc) => {
            let extracted = extract_text_async(doc).await;
            (extracted.text, extracted.failure)
        }
        None => (String::new(), None),
    };
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;

    if let Some(ref failure) = extraction_error {
        warn!("Continuing without a complete sample: {}", failure);
        session.apply(PipelineEvent::ExtractionErrored)?;
    } else {
        session.apply(PipelineEvent::ExtractionSucceeded)?;
    }

    // ── Step 3: Generate sections ────────────────────────────────────────
    session.apply(PipelineEvent::StartGeneration)?;
    let llm_start = Instant::now();
    let sections = match client {
        Some(client) => {
            let ctx = SectionContext {
                keyword: &request.keyword,
                sample_article: &sample,
                budget,
            };
            generate_sections(&client, &headings, ctx, config).await?
        }
        None => {
            info!("No headings given: returning an empty article");
            Vec::new()
        }
    };
    let llm_duration_ms = llm_start.elapsed().as_millis() as u64;

    // ── Step 4: Assemble ─────────────────────────────────────────────────
    let generated: Vec<_> = sections
        .iter()
        .filter(|s| s.is_success())
        .map(|s| s.section())
        .collect();
    let article = assemble_article(&generated);
    let artifact = package_download(&article, GENERATED_ARTICLE_FILENAME);

    let stats = GenerationStats {
        heading_count: headings.len(),
        token_budget: budget,
        generated_sections: generated.len(),
        failed_sections: sections.len() - generated.len(),
        sample_chars: sample.chars().count(),
        total_input_tokens: sections.iter().map(|s| s.input_tokens as u64).sum(),
        total_output_tokens: sections.iter().map(|s| s.output_tokens as u64).sum(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        extract_duration_ms,
        llm_duration_ms,
    };

    session.apply(PipelineEvent::Complete)?;
    info!(
        "Generation complete: {}/{} sections, {} chars, {}ms total",
        stats.generated_sections,
        stats.heading_count,
        article.len(),
        stats.total_duration_ms
    );

    Ok(GenerationOutput {
        article,
        sections,
        extraction_error,
        artifact,
        stats,
    })
}

/// Generate an article and write it directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn generate_to_file(
    request: GenerationRequest,
    output_path: impl AsRef<Path>,
    config: &GenerationConfig,
) -> Result<GenerationStats, ScribeError> {
    let output = generate_article(request, config).await?;
    let path = output_path.as_ref();
    write_artifact(path, &output.article).await?;
    info!("Wrote article to {}", path.display());
    Ok(output.stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FailurePolicy;
    use crate::pipeline::extract::test_fixtures::pdf_with_pages;
    use crate::pipeline::extract::DocumentKind;
    use crate::pipeline::llm::test_support::ScriptedClient;
    use crate::provider::CompletionClient;
    use std::sync::Arc;

    fn config_with(client: Arc<ScriptedClient>) -> GenerationConfig {
        GenerationConfig::builder()
            .client(client as Arc<dyn CompletionClient>)
            .build()
            .unwrap()
    }

    fn request(headings: &str, document: Option<Document>) -> GenerationRequest {
        GenerationRequest {
            document,
            keyword: "solar".into(),
            article_length: 900,
            headings: headings.into(),
        }
    }

    #[tokio::test]
    async fn three_headings_make_three_sections() {
        let client = Arc::new(ScriptedClient::default());
        let doc = Document::new(
            "sample.pdf",
            pdf_with_pages(&["Sample body text"]),
            DocumentKind::Pdf,
        );
        let out = generate_article(
            request("Intro, Benefits, Conclusion", Some(doc)),
            &config_with(client.clone()),
        )
        .await
        .unwrap();

        assert_eq!(
            out.article,
            "Intro\nBody for Intro\n\nBenefits\nBody for Benefits\n\nConclusion\nBody for Conclusion"
        );
        assert_eq!(out.stats.token_budget, Some(300));
        assert_eq!(out.artifact.filename, GENERATED_ARTICLE_FILENAME);
        assert_eq!(out.artifact.decode().unwrap(), out.article);

        let requests = client.requests.lock().unwrap();
        assert!(requests[0].system.contains("Sample body text"));
    }

    #[tokio::test]
    async fn zero_headings_make_no_calls() {
        let client = Arc::new(ScriptedClient::default());
        let out = generate_article(request(" , ", None), &config_with(client.clone()))
            .await
            .unwrap();
        assert_eq!(out.article, "");
        assert!(out.sections.is_empty());
        assert_eq!(out.stats.token_budget, None);
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn corrupt_sample_is_reported_and_generation_continues() {
        let client = Arc::new(ScriptedClient::default());
        let doc = Document::new("bad.pdf", b"not a pdf".to_vec(), DocumentKind::Pdf);
        let out = generate_article(request("Intro", Some(doc)), &config_with(client.clone()))
            .await
            .unwrap();
        assert!(out.extraction_error.is_some());
        assert_eq!(out.stats.sample_chars, 0);
        assert_eq!(out.article, "Intro\nBody for Intro");
    }

    #[tokio::test]
    async fn whole_batch_failure_is_an_error() {
        let client = Arc::new(ScriptedClient::failing_on(&["Benefits"]));
        let err = generate_article(request("Intro, Benefits", None), &config_with(client))
            .await
            .unwrap_err();
        assert!(matches!(err, ScribeError::GenerationFailed { .. }));
    }

    #[tokio::test]
    async fn partial_failure_keeps_good_sections() {
        let client: Arc<dyn CompletionClient> =
            Arc::new(ScriptedClient::failing_on(&["Benefits"]));
        let config = GenerationConfig::builder()
            .client(client)
            .failure_policy(FailurePolicy::Partial)
            .build()
            .unwrap();
        let out = generate_article(request("Intro, Benefits, Conclusion", None), &config)
            .await
            .unwrap();
        assert_eq!(out.stats.generated_sections, 2);
        assert_eq!(out.stats.failed_sections, 1);
        assert!(!out.article.contains("Benefits"));
        assert!(out.clone().into_result().is_err());
    }

    #[tokio::test]
    async fn length_out_of_range_is_rejected() {
        let client = Arc::new(ScriptedClient::default());
        let mut req = request("Intro", None);
        req.article_length = 20_000;
        let err = generate_article(req, &config_with(client)).await.unwrap_err();
        assert!(matches!(err, ScribeError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn generate_to_file_writes_article() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join(GENERATED_ARTICLE_FILENAME);
        let client = Arc::new(ScriptedClient::default());
        let stats = generate_to_file(request("Intro", None), &path, &config_with(client))
            .await
            .unwrap();
        assert_eq!(stats.generated_sections, 1);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Intro\nBody for Intro"
        );
    }
}
