//! Pipeline stages for article generation and result delivery.
//!
//! Each submodule implements exactly one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//! extract ──▶ headings ──▶ llm ──▶ postprocess ──▶ package
//! (pdf/docx)  (parse,      (one call   (cleanup)      (base64
//!              budget)      per heading)               data URI)
//!
//! index query ──▶ format ──▶ package
//! ```
//!
//! 1. [`extract`]: document bytes to plain text; runs in `spawn_blocking`
//!    because PDF parsing is CPU-bound
//! 2. [`headings`]: split the heading list and compute the per-section budget
//! 3. [`llm`]: drive one completion call per heading with retry/backoff;
//!    the only stage with network I/O
//! 4. [`postprocess`]: deterministic cleanup of each generated body
//! 5. [`format`]: reduce any index query response to one display string
//! 6. [`package`]: wrap a result string as a downloadable `data:` URI

pub mod extract;
pub mod format;
pub mod headings;
pub mod llm;
pub mod package;
pub mod postprocess;
