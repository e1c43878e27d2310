use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

static ARRAY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\[.*\]").unwrap());
static OBJECT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Removes a surrounding markdown code fence (with or without a language tag).
pub fn strip_code_fences(text: &str) -> &str {
    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // Drop the info string (`json`, `JSON`, ...) up to the first newline.
        text = match rest.find('\n') {
            Some(idx) if !rest[..idx].contains(['[', '{']) => &rest[idx + 1..],
            _ => rest,
        };
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// First JSON value found in model output, or `None`.
///
/// Tries the whole (fence-stripped) text first, then the widest bracketed
/// array or object, whichever starts earlier.
pub fn extract_json(text: &str) -> Option<Value> {
    let text = strip_code_fences(text);
    if text.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str(text) {
        return Some(value);
    }

    let mut spans: Vec<(usize, &str)> = [&*ARRAY_RE, &*OBJECT_RE]
        .iter()
        .filter_map(|re| re.find(text))
        .map(|m| (m.start(), m.as_str()))
        .collect();
    spans.sort_by_key(|(start, _)| *start);

    let found = spans
        .into_iter()
        .find_map(|(_, span)| serde_json::from_str::<Value>(span).ok());
    if found.is_none() {
        debug!(len = text.len(), "no JSON found in model output");
    }
    found
}

/// A JSON list from model output. A lone object becomes a one-element list;
/// anything else yields an empty list.
pub fn extract_json_array(text: &str) -> Vec<Value> {
    match extract_json(text) {
        Some(Value::Array(items)) => items,
        Some(obj @ Value::Object(_)) => vec![obj],
        _ => Vec::new(),
    }
}

/// A JSON object from model output. A list contributes its first element
/// when that element is an object.
pub fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    match extract_json(text)? {
        Value::Object(map) => Some(map),
        Value::Array(items) => match items.into_iter().next()? {
            Value::Object(map) => Some(map),
            _ => None,
        },
        _ => None,
    }
}

/// Typed records from a JSON list; elements that do not fit `T` are skipped.
pub fn extract_records<T: DeserializeOwned>(text: &str) -> Vec<T> {
    extract_json_array(text)
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect()
}
