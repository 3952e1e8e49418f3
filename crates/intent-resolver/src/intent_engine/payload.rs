//! Lenient extraction of a JSON decision from whatever text the decision source returned.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

lazy_static! {
    static ref FENCED_BLOCK: Regex = Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").unwrap();
}

/// Plain JSON, JSON inside a fenced code block, or the first balanced object
/// embedded in prose. Anything else comes back as a JSON string.
pub fn parse_payload(raw: &str) -> Value {
    let trimmed = raw.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return value;
    }

    for captures in FENCED_BLOCK.captures_iter(trimmed) {
        if let Some(body) = captures.get(1) {
            if let Ok(value) = serde_json::from_str::<Value>(body.as_str().trim()) {
                debug!("Decision payload found in fenced block");
                return value;
            }
        }
    }

    let mut search_from = 0;
    while let Some(offset) = trimmed[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = balanced_object_end(&trimmed[start..]) {
            if let Ok(value) = serde_json::from_str::<Value>(&trimmed[start..start + end]) {
                debug!("Decision payload found embedded in prose");
                return value;
            }
        }
        search_from = start + 1;
    }

    debug!("Decision payload is not JSON");
    Value::String(raw.to_string())
}

/// Byte length of the `{...}` object at the start of `text`, ignoring braces in strings.
fn balanced_object_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx + 1);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_json() {
        assert_eq!(
            parse_payload(r#" {"decision": "EXECUTE", "query_id": "A"} "#),
            json!({ "decision": "EXECUTE", "query_id": "A" })
        );
    }

    #[test]
    fn test_fenced_block() {
        let raw = "Here you go:\n```json\n{\"decision\": \"OUT_OF_SCOPE\"}\n```\nThanks";
        assert_eq!(parse_payload(raw), json!({ "decision": "OUT_OF_SCOPE" }));
    }

    #[test]
    fn test_object_in_prose_with_braces_in_strings() {
        let raw = r#"I think {the answer} is {"decision": "NEED_MORE_INFO", "clarification_question": "Which {zone}?"} ok"#;
        assert_eq!(
            parse_payload(raw),
            json!({ "decision": "NEED_MORE_INFO", "clarification_question": "Which {zone}?" })
        );
    }

    #[test]
    fn test_unparseable_becomes_string() {
        assert_eq!(parse_payload("I cannot decide"), json!("I cannot decide"));
        assert_eq!(parse_payload("{ broken"), json!("{ broken"));
        assert_eq!(parse_payload(""), json!(""));
    }

    #[test]
    fn test_balanced_object_end() {
        assert_eq!(balanced_object_end(r#"{"a": {"b": "}"}} tail"#), Some(17));
        assert_eq!(balanced_object_end("{ open"), None);
    }
}
