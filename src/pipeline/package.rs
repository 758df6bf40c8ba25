//! Download packaging: result string → self-contained `data:` URI link.
//!
//! Nothing is written server-side; the artifact carries the whole payload.
//! [`write_artifact`] exists for the CLI's `--output` flag.

use crate::error::ScribeError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// File name of the direct-generation artifact.
pub const GENERATED_ARTICLE_FILENAME: &str = "generated_article.txt";

/// File name of the indexed-query artifact.
pub const ANALYSIS_RESULT_FILENAME: &str = "analysis_result.txt";

const MIME_TYPE: &str = "file/txt";

/// A downloadable text file encoded inline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadArtifact {
    pub filename: String,
    pub mime_type: String,
    /// Standard-alphabet base64 of the UTF-8 payload.
    pub payload: String,
}

impl DownloadArtifact {
    /// `data:file/txt;base64,<payload>`.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.payload)
    }

    /// Clickable HTML anchor that downloads the artifact under its filename.
    pub fn html_link(&self) -> String {
        format!(
            r#"<a href="{}" download="{}">Download {}</a>"#,
            self.data_uri(),
            escape_attr(&self.filename),
            escape_text(&self.filename)
        )
    }

    /// Decode the payload back to the original string.
    pub fn decode(&self) -> Result<String, ScribeError> {
        decode_payload(&self.payload)
    }
}

/// Encode `result` into a downloadable artifact named `filename`.
pub fn package_download(result: &str, filename: &str) -> DownloadArtifact {
    let payload = STANDARD.encode(result.as_bytes());
    debug!("Packaged {} → {} bytes base64", filename, payload.len());
    DownloadArtifact {
        filename: filename.to_string(),
        mime_type: MIME_TYPE.to_string(),
        payload,
    }
}

/// Inverse of the encoding done by [`package_download`].
pub fn decode_payload(payload: &str) -> Result<String, ScribeError> {
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| ScribeError::Internal(format!("invalid base64 payload: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| ScribeError::Internal(format!("payload is not UTF-8: {e}")))
}

/// Write `content` to `path` atomically (temp file + rename).
pub async fn write_artifact(path: &Path, content: &str) -> Result<(), ScribeError> {
    let write_err = |source| ScribeError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, content)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(write_err)?;
    Ok(())
}

fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_various_strings() {
        let samples = [
            "",
            "a",
            "Intro\nHello.\n\nEnd\nBye.",
            "naïve café — 日本語 🚀",
            "\0\u{10FFFF}",
        ];
        for s in samples {
            let artifact = package_download(s, GENERATED_ARTICLE_FILENAME);
            assert_eq!(artifact.decode().unwrap(), s);
        }
    }

    #[test]
    fn empty_string_has_empty_payload() {
        let artifact = package_download("", ANALYSIS_RESULT_FILENAME);
        assert_eq!(artifact.payload, "");
        assert_eq!(artifact.data_uri(), "data:file/txt;base64,");
    }

    #[test]
    fn known_encoding() {
        let artifact = package_download("hello", GENERATED_ARTICLE_FILENAME);
        assert_eq!(artifact.payload, "aGVsbG8=");
        assert_eq!(
            artifact.html_link(),
            r#"<a href="data:file/txt;base64,aGVsbG8=" download="generated_article.txt">Download generated_article.txt</a>"#
        );
    }

    #[test]
    fn invalid_payload_is_an_error() {
        assert!(decode_payload("not base64!!").is_err());
    }

    #[tokio::test]
    async fn write_artifact_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/nested/generated_article.txt");
        write_artifact(&path, "body").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "body");
        assert!(!dir.path().join("out/nested/generated_article.txt.tmp").exists());
    }
}
