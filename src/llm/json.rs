//! JSON-in-markdown handling shared by every LLM call site.
//!
//! Models routinely wrap JSON in a ```` ```json ```` fence, or prepend a line
//! of prose. [`parse_fenced`] strips the fence, parses strictly, and hands back
//! the raw text as a tagged fallback when that fails.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Result of parsing LLM output as JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed<T> {
    /// The content parsed into `T`.
    Json(T),
    /// The content was not valid JSON for `T`; `raw` is the trimmed original text.
    Fallback { raw: String, error: String },
}

impl<T> Parsed<T> {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    /// The parsed value, discarding the fallback text.
    pub fn ok(self) -> Option<T> {
        match self {
            Self::Json(v) => Some(v),
            Self::Fallback { .. } => None,
        }
    }
}

/// Remove an optional markdown code fence around a JSON payload.
///
/// Handles a leading fence with or without a language tag, a missing closing
/// fence, and a fenced block preceded by prose. Unfenced content is returned
/// trimmed.
pub fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();

    let inner = if let Some(rest) = trimmed.strip_prefix("```") {
        rest
    } else if trimmed.starts_with('[') || trimmed.starts_with('{') {
        return trimmed;
    } else if let Some(start) = trimmed.find("```") {
        &trimmed[start + 3..]
    } else {
        return trimmed;
    };

    // Language tag on the opening fence (`json`, `JSON`, ...).
    let tag_end = inner
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(inner.len());
    let inner = &inner[tag_end..];

    let inner = match inner.find("```") {
        Some(end) => &inner[..end],
        None => inner,
    };
    inner.trim()
}

/// Strip an optional fence, then parse strict JSON into `T`.
pub fn parse_fenced<T: DeserializeOwned>(content: &str) -> Parsed<T> {
    match serde_json::from_str(strip_code_fence(content)) {
        Ok(v) => Parsed::Json(v),
        Err(e) => Parsed::Fallback {
            raw: content.trim().to_string(),
            error: e.to_string(),
        },
    }
}

/// Pull a list out of a JSON payload.
///
/// Accepts a bare array, or an object wrapping one (JSON mode forces models to
/// answer with an object, e.g. `{"themes": [...]}`); the first array-valued
/// field wins, preferring `key` when present.
pub fn take_list(value: Value, key: &str) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => {
            if let Some(Value::Array(items)) = map.remove(key) {
                return Some(items);
            }
            map.into_iter().find_map(|(_, v)| match v {
                Value::Array(items) => Some(items),
                _ => None,
            })
        }
        _ => None,
    }
}
