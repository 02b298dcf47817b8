//! JSON body helpers shared by the validator primitives.
//!
//! Two parse disciplines exist on purpose. Some branches treat an
//! unparsable body as a designed degrade path (a missing state object, an
//! empty merge target) and use the tolerant helpers; branches that require
//! a JSON object treat parse failure as a broker contract violation and
//! surface it themselves. Keeping both as named helpers avoids one ad hoc
//! parse routine with inconsistent fallbacks.

use serde_json::{Map, Value};

/// Parse response text as JSON, returning `None` on any parse failure.
pub fn parse_response_json(text: &str) -> Option<Value> {
    serde_json::from_str::<Value>(text).ok()
}

/// Tolerantly parse response text as a JSON object.
///
/// Anything that is not a JSON object (broken JSON, arrays, scalars,
/// empty bodies) degrades to an empty map. Callers that must reject
/// non-object bodies gate on [`parse_response_json`] first.
pub fn parse_object_or_default(text: &str) -> Map<String, Value> {
    match parse_response_json(text) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// Collapse a response body into a single-line preview for log lines.
pub fn truncate_body_preview(text: &str, limit: usize) -> String {
    if text.trim().is_empty() {
        return "<empty>".to_string();
    }

    let mut preview = String::new();
    for ch in text.chars() {
        if preview.len() >= limit {
            preview.push_str("...");
            break;
        }
        match ch {
            '\n' | '\r' | '\t' => {
                if !preview.ends_with(' ') {
                    preview.push(' ');
                }
            }
            _ => preview.push(ch),
        }
    }

    preview.trim().to_string()
}
