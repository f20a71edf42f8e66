//! Structured-output recovery.
//!
//! The external tool is a free-text generator with no schema guarantee:
//! the JSON a caller asked for may arrive wrapped in markdown fences,
//! surrounded by conversational prose, or cut off mid-object by an output
//! limit. This module recovers a `serde_json::Value` from such text with
//! a layered, degrade-gracefully algorithm. It never panics on malformed
//! input; the only failure mode is the [`ParseFailure`] sentinel, which
//! callers answer with their own keyword fallback (see
//! [`classify_keywords`]).
//!
//! Everything here is a pure function over an immutable buffer.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

/// Sentinel returned when no strategy could recover a JSON value.
///
/// Deliberately carries no detail: malformed model output is an expected
/// condition, not a diagnosable fault.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("no JSON value could be recovered from model output")]
pub struct ParseFailure;

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:[a-zA-Z0-9_-]+)?[ \t]*\r?\n?(.*?)```").expect("fence regex")
});

/// Recovers a JSON value from free-form model output.
///
/// Strategies, first success wins:
/// 1. Strip markdown code fences.
/// 2. Balanced-brace scan for the first complete object.
/// 3. Truncation repair: cut back to the last complete top-level property
///    and close the object.
/// 4. Parse the entire cleaned text as JSON (covers non-object payloads:
///    arrays, strings, numbers).
pub fn extract(raw: &str) -> Result<Value, ParseFailure> {
    extract_with_keys(raw, &[])
}

/// Like [`extract`], but tries increasingly permissive regex extractions
/// keyed on the object fields the caller expects before falling back to
/// the generic scan. Useful when the payload is a known shape (an intent
/// classification, a task-group breakdown) buried in prose that may
/// contain other brace-delimited noise.
pub fn extract_with_keys(raw: &str, required_keys: &[&str]) -> Result<Value, ParseFailure> {
    let cleaned = strip_code_fences(raw);
    let cleaned = cleaned.trim();

    // Strategy: shape-directed regex candidates, all keys down to one.
    for pattern in key_patterns(required_keys) {
        for m in pattern.find_iter(cleaned) {
            if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(m.as_str()) {
                return Ok(value);
            }
        }
    }

    // Strategy: balanced-brace scan.
    if let Some(candidate) = scan_balanced_object(cleaned) {
        if let Ok(value) = serde_json::from_str::<Value>(candidate) {
            return Ok(value);
        }
    }

    // Strategy: repair a truncated object.
    if let Some(repaired) = repair_truncated_object(cleaned) {
        if let Ok(value) = serde_json::from_str::<Value>(&repaired) {
            return Ok(value);
        }
    }

    // Strategy: the whole cleaned text may already be valid JSON.
    if let Ok(value) = serde_json::from_str::<Value>(cleaned) {
        return Ok(value);
    }

    Err(ParseFailure)
}

/// Returns the contents of the first fenced code block, or the input
/// unchanged when no fence is present.
pub fn strip_code_fences(raw: &str) -> &str {
    match FENCED_BLOCK.captures(raw) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or(raw),
        None => raw,
    }
}

/// Builds the ordered regex candidates for the expected keys: an object
/// mentioning every key (in order), then a flat object containing each
/// single key. Empty when no keys were given.
fn key_patterns(required_keys: &[&str]) -> Vec<Regex> {
    let mut patterns = Vec::new();
    if required_keys.is_empty() {
        return patterns;
    }

    let escaped: Vec<String> = required_keys.iter().map(|k| regex::escape(k)).collect();

    if escaped.len() > 1 {
        let all = format!(r#"(?s)\{{.*?"{}".*?\}}"#, escaped.join(r#"".*?""#));
        if let Ok(re) = Regex::new(&all) {
            patterns.push(re);
        }
    }
    for key in &escaped {
        // Flat object (no nesting) containing this one key.
        let one = format!(r#"\{{[^{{}}]*"{}"[^{{}}]*\}}"#, key);
        if let Ok(re) = Regex::new(&one) {
            patterns.push(re);
        }
    }
    patterns
}

/// Scanner state shared by the balanced scan and the repair pass.
struct BraceScan {
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl BraceScan {
    fn new() -> Self {
        Self {
            depth: 0,
            in_string: false,
            escaped: false,
        }
    }

    /// Feeds one character. Returns the depth after the character, or
    /// `None` while inside a string literal.
    fn step(&mut self, c: char) -> Option<usize> {
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' {
                self.escaped = true;
            } else if c == '"' {
                self.in_string = false;
            }
            return None;
        }
        match c {
            '"' => {
                self.in_string = true;
                None
            }
            '{' => {
                self.depth += 1;
                Some(self.depth)
            }
            '}' => {
                self.depth = self.depth.saturating_sub(1);
                Some(self.depth)
            }
            _ => Some(self.depth),
        }
    }
}

/// Walks the text from the first `{`, tracking nesting depth and string
/// state, and returns the slice up to the matching `}`. `None` if the
/// text has no `{` or the object never closes.
fn scan_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut scan = BraceScan::new();

    for (i, c) in text[start..].char_indices() {
        if let Some(depth) = scan.step(c) {
            if depth == 0 && c == '}' {
                return Some(&text[start..start + i + c.len_utf8()]);
            }
        }
    }
    None
}

/// Repairs an object that was truncated mid-stream: rescans tracking the
/// last comma seen at depth 1 outside any string (the last complete
/// top-level property boundary), truncates there, and appends a closing
/// `}`. `None` when the text has no `{`, is not actually truncated, or
/// has no complete property to cut back to.
fn repair_truncated_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut scan = BraceScan::new();
    let mut last_boundary: Option<usize> = None;

    for (i, c) in text[start..].char_indices() {
        if let Some(depth) = scan.step(c) {
            if depth == 0 && c == '}' {
                // Balanced after all; nothing to repair.
                return None;
            }
            if depth == 1 && c == ',' {
                last_boundary = Some(start + i);
            }
        }
    }

    last_boundary.map(|cut| {
        let mut repaired = text[start..cut].to_string();
        repaired.push('}');
        repaired
    })
}

/// Keyword-based fallback classification, for callers whose structured
/// extraction came back as [`ParseFailure`]. Rules are scanned in order;
/// the first category with a keyword hit wins.
pub fn classify_keywords<'a>(text: &str, rules: &[(&'a str, &[&str])]) -> Option<&'a str> {
    let lowered = text.to_lowercase();
    for (category, keywords) in rules {
        if keywords.iter().any(|k| lowered.contains(k)) {
            return Some(category);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_is_idempotent_on_valid_json() {
        for value in [
            json!({"a": 1, "b": [1, 2, 3], "c": {"nested": true}}),
            json!([1, 2, 3]),
            json!("just a string"),
            json!(42),
            json!(null),
        ] {
            let raw = serde_json::to_string(&value).unwrap();
            assert_eq!(extract(&raw).unwrap(), value, "round trip for {raw}");
        }
    }

    #[test]
    fn test_extract_from_fenced_block_with_prose() {
        let raw = "Here is the result: ```json\n{\"category\":\"bug_fix\"}\n``` Thanks!";
        assert_eq!(extract(raw).unwrap(), json!({"category": "bug_fix"}));
    }

    #[test]
    fn test_extract_from_unlabeled_fence() {
        let raw = "```\n{\"ok\": true}\n```";
        assert_eq!(extract(raw).unwrap(), json!({"ok": true}));
    }

    #[test]
    fn test_extract_repairs_truncated_object() {
        assert_eq!(
            extract("{\"a\":1,\"b\":2,").unwrap(),
            json!({"a": 1, "b": 2})
        );
    }

    #[test]
    fn test_extract_repairs_truncation_inside_value() {
        // The last complete property is "a"; the rest is cut away.
        assert_eq!(
            extract("{\"a\":1,\"b\":\"unterminated").unwrap(),
            json!({"a": 1})
        );
    }

    #[test]
    fn test_extract_repairs_truncated_nested_object() {
        assert_eq!(
            extract("{\"a\":{\"x\":1},\"b\":{\"y\":").unwrap(),
            json!({"a": {"x": 1}})
        );
    }

    #[test]
    fn test_extract_object_embedded_in_prose() {
        let raw = "Sure! The classification is {\"intent\": \"refactor\", \"confidence\": 0.9} as requested.";
        assert_eq!(
            extract(raw).unwrap(),
            json!({"intent": "refactor", "confidence": 0.9})
        );
    }

    #[test]
    fn test_extract_respects_braces_inside_strings() {
        let raw = "{\"code\": \"fn main() { println!(\\\"}{\\\"); }\", \"lang\": \"rust\"}";
        let value = extract(raw).unwrap();
        assert_eq!(value["lang"], "rust");
    }

    #[test]
    fn test_extract_with_keys_prefers_expected_shape() {
        let raw = "Metadata: {\"version\": 1}. Result: {\"category\": \"bug_fix\", \"confidence\": 0.8}.";
        let value = extract_with_keys(raw, &["category"]).unwrap();
        assert_eq!(value["category"], "bug_fix");
    }

    #[test]
    fn test_extract_plain_text_fails_with_sentinel() {
        assert_eq!(extract("I could not produce JSON, sorry."), Err(ParseFailure));
    }

    #[test]
    fn test_extract_empty_input() {
        assert_eq!(extract(""), Err(ParseFailure));
    }

    #[test]
    fn test_strip_code_fences_no_fence_is_identity() {
        assert_eq!(strip_code_fences("plain text"), "plain text");
    }

    #[test]
    fn test_classify_keywords_first_hit_wins() {
        let rules: &[(&str, &[&str])] = &[
            ("bug_fix", &["fix", "bug", "broken"]),
            ("feature", &["add", "implement", "create"]),
        ];
        assert_eq!(
            classify_keywords("please fix the login flow", rules),
            Some("bug_fix")
        );
        assert_eq!(
            classify_keywords("add a dark mode toggle", rules),
            Some("feature")
        );
        assert_eq!(classify_keywords("hello there", rules), None);
    }
}
