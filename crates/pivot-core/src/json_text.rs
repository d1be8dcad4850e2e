//! Pulling JSON out of free-form model output.
//!
//! Structured output modes are preferred; these helpers are the fallback when a
//! backend wraps the JSON in prose or markdown fences.

use once_cell::sync::Lazy;
use regex::Regex;

static OBJECT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("static regex"));
static ARRAY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\[.*\]").expect("static regex"));

pub fn strip_code_fences(text: &str) -> &str {
    text.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```JSON")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Parse `text` as a JSON object, falling back to the widest `{...}` region.
pub fn parse_object(text: &str) -> Option<serde_json::Map<String, serde_json::Value>> {
    let cleaned = strip_code_fences(text);
    if let Ok(serde_json::Value::Object(m)) = serde_json::from_str(cleaned) {
        return Some(m);
    }
    let region = OBJECT_RE.find(cleaned)?;
    match serde_json::from_str(region.as_str()) {
        Ok(serde_json::Value::Object(m)) => Some(m),
        _ => None,
    }
}

/// Parse `text` as a JSON array, falling back to the widest `[...]` region.
pub fn parse_array(text: &str) -> Option<Vec<serde_json::Value>> {
    let cleaned = strip_code_fences(text);
    if let Ok(serde_json::Value::Array(v)) = serde_json::from_str(cleaned) {
        return Some(v);
    }
    let region = ARRAY_RE.find(cleaned)?;
    match serde_json::from_str(region.as_str()) {
        Ok(serde_json::Value::Array(v)) => Some(v),
        _ => None,
    }
}

/// First `max_chars` characters of `s`.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
