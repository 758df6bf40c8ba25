//! Persisted vector index over ingested documents.
//!
//! The whole index lives in one JSON manifest (`index.json`) inside the
//! storage directory. Whether that file exists is the only thing deciding
//! between building and loading; it is written once via temp file + rename
//! so a crashed build never leaves a half-written manifest behind.

use crate::error::ScribeError;
use crate::index::chunker::chunk_text;
use crate::index::embed::{cosine_similarity, Embedder};
use crate::output::IndexAction;
use crate::pipeline::extract::{extract_text_async, read_file_async, DocumentKind};
use crate::pipeline::format::{QueryResponse, SourceChunk};
use crate::prompts::query_prompt;
use crate::provider::{CompletionClient, CompletionRequest};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

/// File name of the persisted manifest inside the storage directory.
pub const MANIFEST_FILE: &str = "index.json";

const FORMAT_VERSION: u32 = 1;

/// Texts sent per embedding request.
const EMBED_BATCH: usize = 64;

/// Lifecycle of an [`IndexHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexState {
    /// Nothing in memory yet.
    Unbuilt,
    /// Built from documents during this process and persisted.
    Built,
    /// Read from an existing manifest.
    Loaded,
}

/// One embedded chunk of an ingested document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub id: usize,
    /// File name of the document the chunk came from.
    pub source: String,
    pub text: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedIndex {
    version: u32,
    embedder: String,
    chunks: Vec<IndexedChunk>,
}

/// Chunking parameters used when the index has to be built.
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    pub chunk_chars: usize,
    pub chunk_overlap: usize,
}

/// Retrieval and synthesis parameters for [`IndexHandle::query`].
#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    pub top_k: usize,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_secs: Option<u64>,
}

/// Handle on one storage directory.
///
/// Callers open it once and pass it around; they never probe the path
/// themselves.
#[derive(Debug)]
pub struct IndexHandle {
    storage_dir: PathBuf,
    manifest_present: bool,
    state: IndexState,
    index: Option<PersistedIndex>,
}

impl IndexHandle {
    /// Record the storage location and check for a manifest. No I/O beyond
    /// that single existence check.
    pub fn open(storage_dir: impl Into<PathBuf>) -> Self {
        let storage_dir = storage_dir.into();
        let manifest_present = storage_dir.join(MANIFEST_FILE).is_file();
        debug!(
            "Opened index at {} (manifest present: {})",
            storage_dir.display(),
            manifest_present
        );
        Self {
            storage_dir,
            manifest_present,
            state: IndexState::Unbuilt,
            index: None,
        }
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.storage_dir.join(MANIFEST_FILE)
    }

    pub fn state(&self) -> IndexState {
        self.state
    }

    /// Whether a persisted manifest was found (or has since been written).
    pub fn has_manifest(&self) -> bool {
        self.manifest_present
    }

    /// Number of chunks in memory; zero until [`Self::ensure_ready`] succeeds.
    pub fn chunk_count(&self) -> usize {
        self.index.as_ref().map_or(0, |i| i.chunks.len())
    }

    /// Make the index queryable.
    ///
    /// * already in memory → nothing to do ([`IndexAction::Reused`])
    /// * manifest on disk → load it ([`IndexAction::Loaded`])
    /// * otherwise → ingest every supported file in `source_dir`, chunk,
    ///   embed and persist ([`IndexAction::Built`])
    ///
    /// `source_dir` is only read when building.
    pub async fn ensure_ready(
        &mut self,
        source_dir: &Path,
        embedder: &dyn Embedder,
        options: BuildOptions,
    ) -> Result<IndexAction, ScribeError> {
        if self.index.is_some() {
            return Ok(IndexAction::Reused);
        }

        if self.manifest_present {
            let index = self.load(embedder).await?;
            info!(
                "Loaded index from {} ({} chunks)",
                self.storage_dir.display(),
                index.chunks.len()
            );
            self.index = Some(index);
            self.state = IndexState::Loaded;
            return Ok(IndexAction::Loaded);
        }

        let index = build(source_dir, embedder, options).await?;
        self.persist(&index).await?;
        info!(
            "Built index at {} ({} chunks)",
            self.storage_dir.display(),
            index.chunks.len()
        );
        self.manifest_present = true;
        self.index = Some(index);
        self.state = IndexState::Built;
        Ok(IndexAction::Built)
    }

    async fn load(&self, embedder: &dyn Embedder) -> Result<PersistedIndex, ScribeError> {
        let path = self.manifest_path();
        let bytes = tokio::fs::read(&path).await.map_err(|e| self.index_err(e))?;
        let index: PersistedIndex = serde_json::from_slice(&bytes)
            .map_err(|e| self.index_err(format!("corrupt manifest: {e}")))?;

        if index.version != FORMAT_VERSION {
            return Err(self.index_err(format!(
                "unsupported manifest version {} (expected {})",
                index.version, FORMAT_VERSION
            )));
        }
        let wanted = embedder.id();
        if index.embedder != wanted {
            return Err(self.index_err(format!(
                "index was built with embedder '{}' but '{}' is configured",
                index.embedder, wanted
            )));
        }
        Ok(index)
    }

    async fn persist(&self, index: &PersistedIndex) -> Result<(), ScribeError> {
        tokio::fs::create_dir_all(&self.storage_dir)
            .await
            .map_err(|e| self.index_err(e))?;

        let json = serde_json::to_vec(index).map_err(|e| self.index_err(e))?;
        let path = self.manifest_path();
        let tmp = self.storage_dir.join(format!("{MANIFEST_FILE}.tmp"));
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| self.index_err(e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| self.index_err(e))?;
        debug!("Persisted {}", path.display());
        Ok(())
    }

    /// Answer `question` from the `top_k` most similar chunks.
    ///
    /// Retrieval uses cosine similarity; the retrieved chunks are handed to
    /// `client` for synthesis. Any failure is a [`ScribeError::QueryFailed`];
    /// there is no partial answer.
    pub async fn query(
        &self,
        question: &str,
        embedder: &dyn Embedder,
        client: &Arc<dyn CompletionClient>,
        options: QueryOptions,
    ) -> Result<QueryResponse, ScribeError> {
        let index = self.index.as_ref().ok_or_else(|| ScribeError::QueryFailed {
            detail: format!(
                "index at {} is not ready (state {:?})",
                self.storage_dir.display(),
                self.state
            ),
        })?;

        let query_vec = embedder
            .embed(&[question.to_string()])
            .await
            .map_err(query_failed)?
            .into_iter()
            .next()
            .ok_or_else(|| ScribeError::QueryFailed {
                detail: "embedder returned no vector for the query".into(),
            })?;

        let sources = top_k(&index.chunks, &query_vec, options.top_k);
        debug!(
            "Retrieved {} chunks: {:?}",
            sources.len(),
            sources.iter().map(|s| s.score).collect::<Vec<_>>()
        );

        let contexts: Vec<&str> = sources.iter().map(|s| s.text.as_str()).collect();
        let request = CompletionRequest {
            system: query_prompt(&contexts, question),
            max_tokens: Some(options.max_tokens),
            temperature: options.temperature,
        };

        let call = client.complete(&request);
        let completion = match options.timeout_secs {
            Some(secs) => timeout(Duration::from_secs(secs), call)
                .await
                .map_err(|_| ScribeError::QueryFailed {
                    detail: format!("synthesis timed out after {secs}s"),
                })?,
            None => call.await,
        }
        .map_err(query_failed)?;

        Ok(QueryResponse::Text {
            text: completion.content.trim().to_string(),
            sources,
        })
    }

    fn index_err(&self, detail: impl std::fmt::Display) -> ScribeError {
        ScribeError::Index {
            path: self.storage_dir.clone(),
            detail: detail.to_string(),
        }
    }
}

fn query_failed(e: ScribeError) -> ScribeError {
    match e {
        ScribeError::QueryFailed { .. } => e,
        other => ScribeError::QueryFailed {
            detail: other.to_string(),
        },
    }
}

fn top_k(chunks: &[IndexedChunk], query: &[f32], k: usize) -> Vec<SourceChunk> {
    let mut scored: Vec<(f32, &IndexedChunk)> = chunks
        .iter()
        .map(|c| (cosine_similarity(query, &c.embedding), c))
        .collect();
    // Stable sort keeps ingestion order among equal scores.
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored
        .into_iter()
        .take(k)
        .map(|(score, c)| SourceChunk {
            source: c.source.clone(),
            score,
            text: c.text.clone(),
        })
        .collect()
}

/// Ingest every supported document in `source_dir`, in file-name order.
async fn build(
    source_dir: &Path,
    embedder: &dyn Embedder,
    options: BuildOptions,
) -> Result<PersistedIndex, ScribeError> {
    let mut paths = Vec::new();
    let mut entries = tokio::fs::read_dir(source_dir)
        .await
        .map_err(|e| ScribeError::from_read(source_dir.to_path_buf(), &e))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ScribeError::from_read(source_dir.to_path_buf(), &e))?
    {
        let path = entry.path();
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(DocumentKind::from_extension)
            .is_some();
        if path.is_file() && supported {
            paths.push(path);
        } else {
            debug!("Skipping {}", path.display());
        }
    }
    paths.sort();

    let mut pending: Vec<(String, String)> = Vec::new();
    for path in &paths {
        let doc = read_file_async(path).await?;
        let name = doc.name.clone();
        let extracted = extract_text_async(doc).await;
        if let Some(failure) = &extracted.failure {
            if extracted.text.trim().is_empty() {
                return Err(ScribeError::ExtractionFailed {
                    source_name: name,
                    detail: failure.to_string(),
                });
            }
            warn!("Indexing partial text of '{}': {}", name, failure);
        }
        let chunks = chunk_text(&extracted.text, options.chunk_chars, options.chunk_overlap);
        debug!("'{}': {} chunks", name, chunks.len());
        pending.extend(chunks.into_iter().map(|text| (name.clone(), text)));
    }

    let mut chunks = Vec::with_capacity(pending.len());
    for batch in pending.chunks(EMBED_BATCH) {
        let texts: Vec<String> = batch.iter().map(|(_, t)| t.clone()).collect();
        let vectors = embedder.embed(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(ScribeError::Internal(format!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        for ((source, text), embedding) in batch.iter().cloned().zip(vectors) {
            chunks.push(IndexedChunk {
                id: chunks.len(),
                source,
                text,
                embedding,
            });
        }
    }

    Ok(PersistedIndex {
        version: FORMAT_VERSION,
        embedder: embedder.id(),
        chunks,
    })
}
