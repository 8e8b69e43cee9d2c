//! Field-by-field extraction when whole-document parsing fails.
//!
//! Each [`SalvageRule`] targets one contract field and is independent of the
//! others, so a garbled region only costs the fields it overlaps.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::core::normalize::{normalize, strip_invisible};
use crate::core::scan::balanced_object_at;
use crate::core::strategy::RecoveryStrategy;
use crate::core::types::{ParseAttemptResult, RecoveryMethod};

/// Minimum number of recovered fields for salvage to count as a success.
pub const MIN_SALVAGED_FIELDS: usize = 2;

const QUOTED: &str = r#""((?:[^"\\]|\\.)*)""#;

fn quoted_field_re(key: &str) -> Regex {
    Regex::new(&format!(r#""{key}"\s*:\s*{QUOTED}"#)).unwrap()
}

fn object_field_re(key: &str) -> Regex {
    Regex::new(&format!(r#""{key}"\s*:\s*\{{"#)).unwrap()
}

fn array_field_re(key: &str) -> Regex {
    Regex::new(&format!(r#"(?s)"{key}"\s*:\s*\[(.*?)(?:\]|$)"#)).unwrap()
}

static TASK_ID_RE: LazyLock<Regex> = LazyLock::new(|| quoted_field_re("task_id"));
static STATUS_RE: LazyLock<Regex> = LazyLock::new(|| quoted_field_re("status"));
static SUMMARY_RE: LazyLock<Regex> = LazyLock::new(|| quoted_field_re("summary"));
static HANDOFF_RE: LazyLock<Regex> =
    LazyLock::new(|| quoted_field_re("suggested_handoff_target_role"));
static DETAILED_STRING_RE: LazyLock<Regex> =
    LazyLock::new(|| quoted_field_re("detailed_results(?:_json)?"));
static DETAILED_OBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| object_field_re("detailed_results(?:_json)?"));
static NEXT_STEPS_RE: LazyLock<Regex> = LazyLock::new(|| array_field_re("next_steps"));
static RESOURCES_STRING_RE: LazyLock<Regex> =
    LazyLock::new(|| quoted_field_re("resources_consumed(?:_json)?"));
static RESOURCES_OBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| object_field_re("resources_consumed(?:_json)?"));
static RESOURCES_ARRAY_RE: LazyLock<Regex> =
    LazyLock::new(|| array_field_re("resources_consumed(?:_json)?"));
static QUOTED_ITEM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(QUOTED).unwrap());

/// One extraction rule per contract field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SalvageRule {
    TaskId,
    Status,
    Summary,
    DetailedResults,
    NextSteps,
    HandoffTarget,
    ResourcesConsumed,
}

impl SalvageRule {
    pub const ALL: [SalvageRule; 7] = [
        SalvageRule::TaskId,
        SalvageRule::Status,
        SalvageRule::Summary,
        SalvageRule::DetailedResults,
        SalvageRule::NextSteps,
        SalvageRule::HandoffTarget,
        SalvageRule::ResourcesConsumed,
    ];

    /// Contract field this rule fills.
    pub fn field(self) -> &'static str {
        match self {
            SalvageRule::TaskId => "task_id",
            SalvageRule::Status => "status",
            SalvageRule::Summary => "summary",
            SalvageRule::DetailedResults => "detailed_results_json",
            SalvageRule::NextSteps => "next_steps",
            SalvageRule::HandoffTarget => "suggested_handoff_target_role",
            SalvageRule::ResourcesConsumed => "resources_consumed_json",
        }
    }

    pub fn extract(self, text: &str) -> Option<Value> {
        self.extract_outside(text, &embedded_spans(text))
    }

    /// Like [`extract`](Self::extract), but scalar fields ignore matches that
    /// start inside one of `nested` (byte ranges of embedded objects).
    fn extract_outside(self, text: &str, nested: &[(usize, usize)]) -> Option<Value> {
        match self {
            SalvageRule::TaskId => quoted(&TASK_ID_RE, text, nested),
            SalvageRule::Status => quoted(&STATUS_RE, text, nested),
            SalvageRule::Summary => quoted(&SUMMARY_RE, text, nested),
            SalvageRule::HandoffTarget => quoted(&HANDOFF_RE, text, nested),
            SalvageRule::DetailedResults => embedded_object(&DETAILED_OBJECT_RE, text)
                .or_else(|| quoted(&DETAILED_STRING_RE, text, nested)),
            SalvageRule::NextSteps => quoted_items(&NEXT_STEPS_RE, text).map(Value::Array),
            SalvageRule::ResourcesConsumed => embedded_object(&RESOURCES_OBJECT_RE, text)
                .or_else(|| {
                    quoted_items(&RESOURCES_ARRAY_RE, text)
                        .map(|items| Value::String(Value::Array(items).to_string()))
                })
                .or_else(|| quoted(&RESOURCES_STRING_RE, text, nested)),
        }
    }
}

/// Decode a captured string body, falling back to the raw capture.
fn decode_json_string(body: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{body}\"")).unwrap_or_else(|_| body.to_string())
}

/// First match of `re` that does not start inside a `nested` range.
fn quoted(re: &Regex, text: &str, nested: &[(usize, usize)]) -> Option<Value> {
    let body = re
        .captures_iter(text)
        .filter(|caps| {
            caps.get(0).is_some_and(|m| {
                !nested
                    .iter()
                    .any(|&(start, end)| m.start() > start && m.start() < end)
            })
        })
        .find_map(|caps| caps.get(1))?
        .as_str();
    Some(Value::String(decode_json_string(body)))
}

/// Byte ranges of the objects embedded under the payload keys.
fn embedded_spans(text: &str) -> Vec<(usize, usize)> {
    [&*DETAILED_OBJECT_RE, &*RESOURCES_OBJECT_RE]
        .into_iter()
        .flat_map(|re| re.find_iter(text))
        .filter_map(|m| {
            let start = m.end() - 1;
            balanced_object_at(text, start).map(|object| (start, start + object.len()))
        })
        .collect()
}

/// A balanced `{...}` after the key, re-encoded as a JSON string.
fn embedded_object(re: &Regex, text: &str) -> Option<Value> {
    let m = re.find(text)?;
    let object = balanced_object_at(text, m.end() - 1)?;
    let value: Value = serde_json::from_str(object)
        .or_else(|_| serde_json::from_str(&normalize(object)))
        .ok()?;
    Some(Value::String(value.to_string()))
}

fn quoted_items(re: &Regex, text: &str) -> Option<Vec<Value>> {
    let caps = re.captures(text)?;
    let body = caps.get(1)?.as_str();
    let items: Vec<Value> = QUOTED_ITEM_RE
        .captures_iter(body)
        .filter_map(|c| c.get(1))
        .map(|m| Value::String(decode_json_string(m.as_str())))
        .collect();
    (!items.is_empty()).then_some(items)
}

/// Runs every rule and keeps what it finds.
///
/// The cleaned raw text is tried first; the normalized form only fills fields
/// the raw pass missed, since quote repair can swallow neighbouring fields in
/// badly garbled text.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldSalvage;

impl FieldSalvage {
    pub fn salvage(text: &str) -> Map<String, Value> {
        let nested = embedded_spans(text);
        let mut map = Map::new();
        for rule in SalvageRule::ALL {
            if let Some(value) = rule.extract_outside(text, &nested) {
                map.insert(rule.field().to_string(), value);
            }
        }
        map
    }
}

impl RecoveryStrategy for FieldSalvage {
    fn method(&self) -> RecoveryMethod {
        RecoveryMethod::FieldSalvage
    }

    fn attempt(&self, raw: &str) -> Option<ParseAttemptResult> {
        let mut map = Self::salvage(&strip_invisible(raw));
        if map.len() < MIN_SALVAGED_FIELDS {
            for (field, value) in Self::salvage(&normalize(raw)) {
                map.entry(field).or_insert(value);
            }
        }
        debug!(recovered = map.len(), "field salvage finished");
        if map.len() < MIN_SALVAGED_FIELDS {
            return None;
        }
        Some(ParseAttemptResult::new(map, self.method()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Completeness;

    #[test]
    fn quoted_rules_decode_escapes() {
        let text = r#"garbage "task_id": "t-9" more "summary": "line \"one\"\nnext" junk"#;
        assert_eq!(SalvageRule::TaskId.extract(text), Some(Value::from("t-9")));
        assert_eq!(
            SalvageRule::Summary.extract(text),
            Some(Value::from("line \"one\"\nnext"))
        );
        assert_eq!(SalvageRule::Status.extract(text), None);
    }

    #[test]
    fn detailed_results_from_embedded_object() {
        let text = r#""detailed_results": {"files": ["a.rs", "b.rs"], "ok": true}, "status": "#;
        let value = SalvageRule::DetailedResults.extract(text).expect("object");
        let decoded: Value =
            serde_json::from_str(value.as_str().expect("string")).expect("json text");
        assert_eq!(decoded["files"][1], "b.rs");
    }

    #[test]
    fn detailed_results_from_quoted_string() {
        let text = r#""detailed_results_json": "{\"k\":1}""#;
        assert_eq!(
            SalvageRule::DetailedResults.extract(text),
            Some(Value::from(r#"{"k":1}"#))
        );
    }

    #[test]
    fn next_steps_items_even_when_array_is_cut() {
        let text = r#""next_steps": ["write tests", "ship it", "cel"#;
        assert_eq!(
            SalvageRule::NextSteps.extract(text),
            Some(serde_json::json!(["write tests", "ship it"]))
        );
        assert_eq!(SalvageRule::NextSteps.extract(r#""next_steps": []"#), None);
    }

    #[test]
    fn resources_array_is_encoded_as_json_text() {
        let text = r#""resources_consumed": ["gpu", "4 tokens"]"#;
        assert_eq!(
            SalvageRule::ResourcesConsumed.extract(text),
            Some(Value::from(r#"["gpu","4 tokens"]"#))
        );
    }

    /// Keys inside an embedded payload object do not shadow top-level fields.
    #[test]
    fn nested_keys_do_not_win_over_top_level_fields() {
        let text = r#"oops "task_id": "t1", "detailed_results": {"status": "failed", "summary": "inner"}, "status": "completed", "summary": "outer" ]]"#;
        let map = FieldSalvage::salvage(text);
        assert_eq!(map["status"], "completed");
        assert_eq!(map["summary"], "outer");
        let details: Value =
            serde_json::from_str(map["detailed_results_json"].as_str().expect("string"))
                .expect("json text");
        assert_eq!(details["status"], "failed");
    }

    /// An embedded object that never closes excludes nothing.
    #[test]
    fn unclosed_embedded_object_does_not_hide_fields() {
        let text = r#""task_id": "t2", "detailed_results": {"status": "failed""#;
        assert_eq!(SalvageRule::Status.extract(text), Some(Value::from("failed")));
    }

    #[test]
    fn strategy_needs_two_fields() {
        assert!(FieldSalvage.attempt(r#"oops "summary": "only this""#).is_none());
        let result = FieldSalvage
            .attempt(r#"{{{ "status": "failed" ,, "summary": "half" ]]"#)
            .expect("salvaged");
        assert_eq!(result.completeness, Completeness::Partial);
        assert_eq!(result.value["status"], "failed");
        assert_eq!(result.value["summary"], "half");
    }
}
