//! Result formatting: any [`QueryResponse`] → one display string.
//!
//! Precedence, first match wins:
//!
//! 1. a named text field (`Text::text`, or a JSON object's `"text"` string)
//! 2. a generic `"response"` field on a JSON object
//! 3. an iterable (`Iterable`, or a JSON array): elements joined by `\n`
//! 4. the value's default string form
//!
//! [`format_response`] is total: every input produces a string.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A retrieved chunk that backed a synthesized answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceChunk {
    /// Name of the ingested document.
    pub source: String,
    pub score: f32,
    pub text: String,
}

/// Answer from the index store, tagged by shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryResponse {
    /// A synthesized answer with the chunks it drew on.
    Text {
        text: String,
        #[serde(default)]
        sources: Vec<SourceChunk>,
    },
    /// A list of results with no synthesized text.
    Iterable { items: Vec<String> },
    /// Anything else, kept as raw JSON.
    Opaque { value: Value },
}

impl QueryResponse {
    pub fn text(text: impl Into<String>) -> Self {
        QueryResponse::Text {
            text: text.into(),
            sources: Vec::new(),
        }
    }
}

/// Produce the display string for a response.
pub fn format_response(response: &QueryResponse) -> String {
    match response {
        QueryResponse::Text { text, .. } => text.clone(),
        QueryResponse::Iterable { items } => items.join("\n"),
        QueryResponse::Opaque { value } => format_value(value),
    }
}

fn format_value(value: &Value) -> String {
    if let Value::Object(map) = value {
        if let Some(Value::String(text)) = map.get("text") {
            return text.clone();
        }
        if let Some(response) = map.get("response") {
            return scalar_string(response);
        }
    }
    if let Value::Array(items) = value {
        return items.iter().map(scalar_string).collect::<Vec<_>>().join("\n");
    }
    scalar_string(value)
}

/// Default string form; strings render without JSON quotes.
fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
