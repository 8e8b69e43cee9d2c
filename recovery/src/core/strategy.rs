//! Recovery strategy seam and the two whole-document strategies.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::core::normalize::normalize;
use crate::core::scan::widest_balanced_object;
use crate::core::types::{ParseAttemptResult, RecoveryMethod};

/// One independent attempt at turning raw text into a candidate mapping.
///
/// Implementations are pure: no I/O, no shared state, `None` on failure.
pub trait RecoveryStrategy: Send + Sync {
    fn method(&self) -> RecoveryMethod;
    fn attempt(&self, raw: &str) -> Option<ParseAttemptResult>;
}

/// Parse `text` as a JSON object, verbatim first and then normalized.
pub fn parse_object(text: &str) -> Option<Map<String, Value>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
        return Some(map);
    }
    match serde_json::from_str::<Value>(&normalize(trimmed)) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// The whole text is one well-formed object.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectParse;

impl RecoveryStrategy for DirectParse {
    fn method(&self) -> RecoveryMethod {
        RecoveryMethod::DirectParse
    }

    fn attempt(&self, raw: &str) -> Option<ParseAttemptResult> {
        parse_object(raw).map(|map| ParseAttemptResult::new(map, self.method()))
    }
}

static JSON_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)```json[ \t]*\r?\n?(.*?)```").unwrap());
static ANY_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n?(.*?)```").unwrap());

/// An object embedded in prose or markdown fences.
///
/// Candidates, in priority order: ```json blocks, generic ``` blocks, the
/// widest depth-balanced `{...}` span, then first `{` to last `}`. The first
/// candidate that parses to an object with at least two keys wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct FencedExtraction;

impl FencedExtraction {
    fn candidates(raw: &str) -> Vec<&str> {
        let mut candidates: Vec<&str> = JSON_FENCE_RE
            .captures_iter(raw)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect();
        candidates.extend(
            ANY_FENCE_RE
                .captures_iter(raw)
                .filter_map(|caps| caps.get(1).map(|m| m.as_str())),
        );
        if let Some(widest) = widest_balanced_object(raw) {
            candidates.push(widest);
        }
        if let Some((start, end)) = raw
            .find('{')
            .zip(raw.rfind('}'))
            .filter(|(start, end)| end > start)
        {
            candidates.push(&raw[start..=end]);
        }
        candidates
    }
}

impl RecoveryStrategy for FencedExtraction {
    fn method(&self) -> RecoveryMethod {
        RecoveryMethod::FencedExtraction
    }

    fn attempt(&self, raw: &str) -> Option<ParseAttemptResult> {
        Self::candidates(raw)
            .into_iter()
            .filter_map(parse_object)
            .find(|map| map.len() >= 2)
            .map(|map| ParseAttemptResult::new(map, self.method()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Completeness;

    #[test]
    fn direct_parse_accepts_only_objects() {
        let result = DirectParse
            .attempt(r#"{"task_id":"t1","status":"completed","summary":"ok"}"#)
            .expect("object");
        assert_eq!(result.completeness, Completeness::Complete);
        assert_eq!(result.value["task_id"], "t1");
        assert!(DirectParse.attempt("[1, 2]").is_none());
        assert!(DirectParse.attempt("\"text\"").is_none());
        assert!(DirectParse.attempt("").is_none());
    }

    #[test]
    fn direct_parse_fixes_syntax_defects() {
        let result = DirectParse
            .attempt("\u{FEFF}{task_id: 't1', status: 'completed',}")
            .expect("normalized object");
        assert_eq!(result.value["status"], "completed");
    }

    #[test]
    fn direct_parse_rejects_surrounding_prose() {
        assert!(
            DirectParse
                .attempt(r#"Here you go: {"task_id":"t1","status":"completed"}"#)
                .is_none()
        );
    }

    #[test]
    fn fenced_json_block_wins_over_other_candidates() {
        let raw = "Result below.\n```json\n{\"task_id\":\"t1\",\"summary\":\"fenced\"}\n```\nand {\"task_id\":\"t2\",\"summary\":\"loose\",\"status\":\"failed\"}";
        let result = FencedExtraction.attempt(raw).expect("fenced");
        assert_eq!(result.method, RecoveryMethod::FencedExtraction);
        assert_eq!(result.value["summary"], "fenced");
    }

    #[test]
    fn generic_fence_with_language_tag() {
        let raw = "```javascript\n{status: 'failed', summary: 'boom'}\n```";
        let result = FencedExtraction.attempt(raw).expect("generic fence");
        assert_eq!(result.value["summary"], "boom");
    }

    #[test]
    fn balanced_scan_keeps_nested_objects() {
        let raw = r#"Output: {"task_id": "t1", "detail": {"inner": {"deep": true}}, "summary": "ok"} -- end }"#;
        let result = FencedExtraction.attempt(raw).expect("balanced");
        assert_eq!(result.value["detail"]["inner"]["deep"], true);
        assert_eq!(result.value["summary"], "ok");
    }

    #[test]
    fn single_key_objects_are_not_enough() {
        assert!(FencedExtraction.attempt(r#"see {"only": 1} here"#).is_none());
    }
}
