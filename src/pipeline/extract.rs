//! Text extraction: document bytes → plain text.
//!
//! Extraction is best-effort and total. A PDF page that fails to decode stops
//! the walk, keeps every page read so far and records an
//! [`ExtractionFailure`]; an unreadable document yields empty text plus the
//! failure. Callers decide whether empty text is tolerable.
//!
//! Unsupported formats never reach this stage: [`DocumentKind::from_path`]
//! rejects them at the input boundary with
//! [`ScribeError::UnsupportedFormat`].

use crate::error::{ExtractionFailure, ScribeError};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use tracing::{debug, error, info};

/// Declared media type of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Docx,
    Text,
}

impl DocumentKind {
    /// Map a file extension (case-insensitive, without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "docx" => Some(DocumentKind::Docx),
            "txt" | "text" | "md" => Some(DocumentKind::Text),
            _ => None,
        }
    }

    /// Declare the kind of `path` from its extension.
    pub fn from_path(path: &Path) -> Result<Self, ScribeError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        Self::from_extension(ext).ok_or_else(|| ScribeError::UnsupportedFormat {
            path: path.to_path_buf(),
            format: if ext.is_empty() {
                "<none>".to_string()
            } else {
                ext.to_string()
            },
        })
    }

    /// Canonical file extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Docx => "docx",
            DocumentKind::Text => "txt",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "application/pdf",
            DocumentKind::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            DocumentKind::Text => "text/plain",
        }
    }
}

/// An uploaded document. Lives for one request.
#[derive(Debug, Clone)]
pub struct Document {
    /// Display name (usually the file name) for logs and index sources.
    pub name: String,
    pub bytes: Vec<u8>,
    pub kind: DocumentKind,
}

impl Document {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>, kind: DocumentKind) -> Self {
        Self {
            name: name.into(),
            bytes,
            kind,
        }
    }
}

/// Result of an extraction: per-page text in page order plus any failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedText {
    /// Pages joined with a single space.
    pub text: String,
    /// Text of each successfully read page (one entry for non-paged formats).
    pub pages: Vec<String>,
    /// Set when extraction stopped early or never started.
    pub failure: Option<ExtractionFailure>,
}

impl ExtractedText {
    fn from_pages(pages: Vec<String>, failure: Option<ExtractionFailure>) -> Self {
        let text = pages
            .iter()
            .map(|p| p.trim_end())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            text,
            pages,
            failure,
        }
    }

    fn failed(page: Option<usize>, detail: impl Into<String>) -> Self {
        Self {
            failure: Some(ExtractionFailure {
                page,
                detail: detail.into(),
            }),
            ..Default::default()
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Read a file from disk, declaring its kind by extension.
///
/// The extension is checked before any bytes are read.
pub fn read_file(path: &Path) -> Result<Document, ScribeError> {
    let kind = DocumentKind::from_path(path)?;
    let bytes = std::fs::read(path).map_err(|e| ScribeError::from_read(path.to_path_buf(), &e))?;
    debug!("Read {} ({} bytes, {:?})", path.display(), bytes.len(), kind);
    Ok(Document::new(display_name(path), bytes, kind))
}

/// Async variant of [`read_file`].
pub async fn read_file_async(path: &Path) -> Result<Document, ScribeError> {
    let kind = DocumentKind::from_path(path)?;
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ScribeError::from_read(path.to_path_buf(), &e))?;
    Ok(Document::new(display_name(path), bytes, kind))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Extract plain text from a document. Never fails; see [`ExtractedText::failure`].
pub fn extract_text(doc: &Document) -> ExtractedText {
    let extracted = match doc.kind {
        DocumentKind::Pdf => extract_pdf(&doc.bytes),
        DocumentKind::Docx => match extract_docx(&doc.bytes) {
            Ok(text) => ExtractedText::from_pages(vec![text], None),
            Err(detail) => ExtractedText::failed(None, detail),
        },
        DocumentKind::Text => {
            ExtractedText::from_pages(vec![String::from_utf8_lossy(&doc.bytes).into_owned()], None)
        }
    };

    match &extracted.failure {
        Some(failure) => error!("Error reading '{}': {}", doc.name, failure),
        None => info!(
            "Extracted {} chars from '{}' ({} pages)",
            extracted.text.len(),
            doc.name,
            extracted.page_count()
        ),
    }
    extracted
}

/// Run [`extract_text`] on the blocking pool.
///
/// PDF parsing is CPU-bound and must not stall the async workers.
pub async fn extract_text_async(doc: Document) -> ExtractedText {
    let name = doc.name.clone();
    tokio::task::spawn_blocking(move || extract_text(&doc))
        .await
        .unwrap_or_else(|e| {
            error!("Extraction task for '{}' aborted: {}", name, e);
            ExtractedText::failed(None, format!("extraction task aborted: {e}"))
        })
}

// ── PDF ──────────────────────────────────────────────────────────────────

fn extract_pdf(bytes: &[u8]) -> ExtractedText {
    // lopdf can panic on hostile input; a bad upload must not take the run down.
    let document = match panic::catch_unwind(AssertUnwindSafe(|| lopdf::Document::load_mem(bytes))) {
        Ok(Ok(d)) => d,
        Ok(Err(e)) => return ExtractedText::failed(None, format!("not a readable PDF: {e}")),
        Err(_) => return ExtractedText::failed(None, "PDF parser panicked on malformed input"),
    };

    // BTreeMap keyed by 1-based page number: iteration is page order.
    let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
    if page_numbers.is_empty() {
        return ExtractedText::failed(None, "PDF contains no pages");
    }

    collect_pages(&page_numbers, |number| {
        document.extract_text(&[number]).map_err(|e| e.to_string())
    })
}

/// Extract pages in order, stopping at the first one that errors or panics.
/// Pages read before the failure are kept.
fn collect_pages<F>(page_numbers: &[u32], mut extract_page: F) -> ExtractedText
where
    F: FnMut(u32) -> Result<String, String>,
{
    let mut pages = Vec::with_capacity(page_numbers.len());
    for &number in page_numbers {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| extract_page(number)))
            .unwrap_or_else(|_| Err("PDF parser panicked on this page".to_string()));
        match outcome {
            Ok(text) => {
                debug!("Page {}: {} chars", number, text.len());
                pages.push(text);
            }
            Err(detail) => {
                return ExtractedText::from_pages(
                    pages,
                    Some(ExtractionFailure {
                        page: Some(number as usize),
                        detail,
                    }),
                );
            }
        }
    }
    ExtractedText::from_pages(pages, None)
}

// ── DOCX ─────────────────────────────────────────────────────────────────

fn extract_docx(bytes: &[u8]) -> Result<String, String> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| format!("not a DOCX archive: {e}"))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| format!("missing word/document.xml: {e}"))?
        .read_to_string(&mut xml)
        .map_err(|e| format!("unreadable word/document.xml: {e}"))?;

    let mut reader = Reader::from_str(&xml);
    let mut out = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:t" => in_text = true,
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" => out.push('\t'),
                b"w:br" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let text = t.unescape().map_err(|e| format!("bad XML text: {e}"))?;
                out.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "XML error at position {}: {e}",
                    reader.buffer_position()
                ))
            }
            _ => {}
        }
    }

    Ok(out.trim_end().to_string())
}

/// Page and character counts for a document, without any LLM involved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub name: String,
    pub kind: DocumentKind,
    pub bytes: usize,
    pub page_count: usize,
    pub char_count: usize,
    pub failure: Option<ExtractionFailure>,
}

/// Read and extract a file, reporting its shape.
pub async fn inspect(path: &Path) -> Result<(DocumentInfo, ExtractedText), ScribeError> {
    let doc = read_file_async(path).await?;
    let info_name = doc.name.clone();
    let kind = doc.kind;
    let bytes = doc.bytes.len();
    let extracted = extract_text_async(doc).await;
    let info = DocumentInfo {
        name: info_name,
        kind,
        bytes,
        page_count: extracted.page_count(),
        char_count: extracted.text.chars().count(),
        failure: extracted.failure.clone(),
    };
    Ok((info, extracted))
}

#[cfg(test)]
pub(crate) mod test_fixtures {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// Build an in-memory PDF with one Courier text line per page.
    pub fn pdf_with_pages(texts: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in texts {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![72.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().expect("encode content"),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).expect("save pdf");
        buf
    }

    /// Build a minimal DOCX archive containing the given paragraphs.
    pub fn docx_with_paragraphs(paragraphs: &[&str]) -> Vec<u8> {
        use std::io::Write;
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>"))
            .collect();
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
        );
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .expect("start file");
        zip.write_all(xml.as_bytes()).expect("write xml");
        zip.finish().expect("finish zip").into_inner()
    }
}
