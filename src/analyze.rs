//! Indexed-query entry points.
//!
//! The template and data documents are staged into a request-scoped
//! temporary directory, the persisted index under
//! [`crate::config::AnalysisConfig::storage_dir`] is built from them (or
//! loaded if it already exists), and the query is answered from it.

use crate::config::AnalysisConfig;
use crate::error::ScribeError;
use crate::index::store::{BuildOptions, IndexHandle, QueryOptions};
use crate::index::make_embedder;
use crate::output::AnalysisOutput;
use crate::pipeline::extract::Document;
use crate::pipeline::format::format_response;
use crate::pipeline::package::{package_download, ANALYSIS_RESULT_FILENAME};
use crate::provider::resolve_client;
use crate::session::{PipelineEvent, Session};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::TempDir;
use tracing::{debug, info};

/// Inputs for one analysis.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// Report template describing the expected answer layout.
    pub template: Document,
    /// Data the answer is drawn from.
    pub data: Document,
    /// Free-text question.
    pub query: String,
}

/// Answer a query against the index at `config.storage_dir`.
///
/// Opens a fresh [`IndexHandle`]; use [`analyze_with_handle`] to keep one
/// across several queries.
pub async fn analyze(
    request: AnalysisRequest,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, ScribeError> {
    let mut handle = IndexHandle::open(&config.storage_dir);
    analyze_with_handle(&mut handle, request, config).await
}

/// Answer a query using an already-open handle.
///
/// The index is only built from the staged documents when `handle` has no
/// persisted manifest; otherwise the documents are staged but not read.
pub async fn analyze_with_handle(
    handle: &mut IndexHandle,
    request: AnalysisRequest,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, ScribeError> {
    let mut session = Session::new();
    let result = run(handle, request, config, &mut session).await;
    if result.is_err() {
        session.fail();
    }
    debug!("Analysis trace: {:?}", session.trace());
    result
}

async fn run(
    handle: &mut IndexHandle,
    request: AnalysisRequest,
    config: &AnalysisConfig,
    session: &mut Session,
) -> Result<AnalysisOutput, ScribeError> {
    let start = Instant::now();
    session.apply(PipelineEvent::Submit)?;
    info!(
        "Starting analysis: template '{}', data '{}', index {}",
        request.template.name,
        request.data.name,
        handle.storage_dir().display()
    );

    let client = resolve_client(&config.client)?;
    let embedder = make_embedder(&config.embedder, &config.client)?;

    // Dropped on every return path, removing the staged copies.
    let staging = TempDir::new()
        .map_err(|e| ScribeError::Internal(format!("Failed to create staging dir: {e}")))?;
    stage_documents(staging.path(), &[&request.template, &request.data]).await?;

    session.apply(PipelineEvent::StartExtraction)?;
    let build = BuildOptions {
        chunk_chars: config.chunk_chars,
        chunk_overlap: config.chunk_overlap,
    };
    let index_action = match handle
        .ensure_ready(staging.path(), embedder.as_ref(), build)
        .await
    {
        Ok(action) => action,
        Err(e) => {
            if matches!(e, ScribeError::ExtractionFailed { .. }) {
                session.apply(PipelineEvent::ExtractionErrored)?;
            }
            return Err(e);
        }
    };
    session.apply(PipelineEvent::ExtractionSucceeded)?;
    debug!("Index ready ({:?}, {} chunks)", index_action, handle.chunk_count());

    session.apply(PipelineEvent::StartQuery)?;
    let options = QueryOptions {
        top_k: config.top_k,
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        timeout_secs: config.api_timeout_secs,
    };
    let response = handle
        .query(&request.query, embedder.as_ref(), &client, options)
        .await?;

    let result = format_response(&response);
    let artifact = package_download(&result, ANALYSIS_RESULT_FILENAME);
    session.apply(PipelineEvent::Complete)?;

    let duration_ms = start.elapsed().as_millis() as u64;
    info!("Analysis complete: {} chars in {}ms", result.len(), duration_ms);

    Ok(AnalysisOutput {
        result,
        response,
        index_action,
        artifact,
        duration_ms,
    })
}

/// Write each document into `dir` under a unique name carrying the
/// extension of its declared kind.
async fn stage_documents(dir: &Path, docs: &[&Document]) -> Result<Vec<PathBuf>, ScribeError> {
    let mut used = HashSet::new();
    let mut staged = Vec::with_capacity(docs.len());
    for (i, doc) in docs.iter().enumerate() {
        let mut name = staged_name(doc);
        if !used.insert(name.clone()) {
            name = format!("{}_{}", i + 1, name);
            used.insert(name.clone());
        }
        let path = dir.join(&name);
        tokio::fs::write(&path, &doc.bytes)
            .await
            .map_err(|e| ScribeError::OutputWriteFailed {
                path: path.clone(),
                source: e,
            })?;
        debug!("Staged '{}' as {}", doc.name, path.display());
        staged.push(path);
    }
    Ok(staged)
}

fn staged_name(doc: &Document) -> String {
    let base = Path::new(&doc.name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string());
    format!("{}.{}", base, doc.kind.extension())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::store::IndexState;
    use crate::output::IndexAction;
    use crate::pipeline::extract::DocumentKind;
    use crate::pipeline::format::QueryResponse;
    use crate::provider::{Completion, CompletionClient, CompletionRequest};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Answer;

    #[async_trait]
    impl CompletionClient for Answer {
        fn name(&self) -> &str {
            "answer"
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ScribeError> {
            let found = request.system.contains("420 kWh");
            Ok(Completion {
                content: if found { "  Solar: 420 kWh\n" } else { "unknown" }.to_string(),
                ..Default::default()
            })
        }
    }

    fn request() -> AnalysisRequest {
        AnalysisRequest {
            template: Document::new(
                "template.txt",
                b"Report: list each energy source with its output.".to_vec(),
                DocumentKind::Text,
            ),
            data: Document::new(
                "march.txt",
                b"Solar output in March was 420 kWh.".to_vec(),
                DocumentKind::Text,
            ),
            query: "What was the solar output in March?".into(),
        }
    }

    fn config(storage: &Path) -> AnalysisConfig {
        AnalysisConfig::builder()
            .client(Arc::new(Answer))
            .storage_dir(storage)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn first_run_builds_second_loads() {
        let dir = tempfile::tempdir().unwrap();
        let storage = dir.path().join("storage");

        let first = analyze(request(), &config(&storage)).await.unwrap();
        assert_eq!(first.index_action, IndexAction::Built);
        assert_eq!(first.result, "Solar: 420 kWh");
        assert_eq!(first.artifact.filename, ANALYSIS_RESULT_FILENAME);
        assert_eq!(first.artifact.decode().unwrap(), first.result);
        assert!(matches!(first.response, QueryResponse::Text { .. }));

        let second = analyze(request(), &config(&storage)).await.unwrap();
        assert_eq!(second.index_action, IndexAction::Loaded);
        assert_eq!(second.result, first.result);
    }

    #[tokio::test]
    async fn handle_is_reused_across_queries() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let mut handle = IndexHandle::open(dir.path());

        analyze_with_handle(&mut handle, request(), &config).await.unwrap();
        assert_eq!(handle.state(), IndexState::Built);
        let again = analyze_with_handle(&mut handle, request(), &config)
            .await
            .unwrap();
        assert_eq!(again.index_action, IndexAction::Reused);
    }

    #[tokio::test]
    async fn colliding_names_are_both_staged() {
        let dir = tempfile::tempdir().unwrap();
        let a = Document::new("same.txt", b"a".to_vec(), DocumentKind::Text);
        let b = Document::new("same.md", b"b".to_vec(), DocumentKind::Text);
        let staged = stage_documents(dir.path(), &[&a, &b]).await.unwrap();
        assert_eq!(staged.len(), 2);
        assert_ne!(staged[0], staged[1]);
        assert_eq!(std::fs::read(&staged[1]).unwrap(), b"b");
    }

    #[test]
    fn staged_name_uses_declared_kind() {
        let doc = Document::new("upload", vec![], DocumentKind::Pdf);
        assert_eq!(staged_name(&doc), "upload.pdf");
    }
}
