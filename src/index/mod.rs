//! Index store for the indexed-query variant.
//!
//! ```text
//! staged docs ──▶ extract ──▶ chunker ──▶ embed ──▶ index.json
//!                                                       │
//! query ──▶ embed ──▶ top-k cosine ──▶ synthesis ◀──────┘
//! ```
//!
//! * [`chunker`]: sliding-window chunking with overlap
//! * [`embed`]: the [`embed::Embedder`] seam and the local hashing embedder
//! * [`store`]: [`store::IndexHandle`]: build-or-load lifecycle, retrieval,
//!   synthesis

pub mod chunker;
pub mod embed;
pub mod store;

pub use embed::{Embedder, HashingEmbedder};
pub use store::{BuildOptions, IndexHandle, IndexState, QueryOptions, MANIFEST_FILE};

use crate::config::{ClientSettings, EmbedderKind};
use crate::error::ScribeError;
use crate::provider::OpenAiClient;
use std::sync::Arc;

/// Construct the embedder selected by `kind`.
///
/// Remote embeddings reuse the session key and base URL from `settings`.
pub fn make_embedder(
    kind: &EmbedderKind,
    settings: &ClientSettings,
) -> Result<Arc<dyn Embedder>, ScribeError> {
    match kind {
        EmbedderKind::Hashing { dimension } => Ok(Arc::new(HashingEmbedder::new(*dimension))),
        EmbedderKind::Remote { model } => {
            let key = settings.api_key.clone().ok_or_else(|| {
                ScribeError::ProviderNotConfigured {
                    provider: "openai-embeddings".to_string(),
                    hint: "Remote embeddings need an API key (--api-key or OPENAI_API_KEY)."
                        .to_string(),
                }
            })?;
            let mut client =
                OpenAiClient::new(key, settings.model_or_default()).with_embedding_model(model);
            if let Some(ref url) = settings.base_url {
                client = client.with_base_url(url.as_str());
            }
            Ok(Arc::new(client))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ApiKey;

    #[test]
    fn hashing_by_default() {
        let e = make_embedder(&EmbedderKind::default(), &ClientSettings::default()).unwrap();
        assert_eq!(e.id(), "hashing:512");
    }

    #[test]
    fn remote_requires_key() {
        let kind = EmbedderKind::Remote {
            model: "text-embedding-3-small".into(),
        };
        assert!(make_embedder(&kind, &ClientSettings::default()).is_err());

        let settings = ClientSettings {
            api_key: Some(ApiKey::new("sk-test")),
            ..Default::default()
        };
        let e = make_embedder(&kind, &settings).unwrap();
        assert_eq!(e.id(), "openai:text-embedding-3-small");
    }
}
