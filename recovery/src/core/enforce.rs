//! Required-field enforcement: any candidate mapping becomes a valid record.
//!
//! Rules, applied independently:
//! - missing/empty `task_id` → the fallback id, else `"unknown"`
//! - missing or unrecognised `status` → `completed`
//! - missing/empty `summary` → `"Task <task_id> completed"`
//!
//! Degradation shows up in the cascade's completeness and method, not here.

use serde_json::{Map, Value};

use crate::core::types::{RecordContract, TaskStatus};

/// Task id used when neither the candidate nor the caller supplies one.
pub const UNKNOWN_TASK_ID: &str = "unknown";

/// Build a record satisfying every required-field invariant.
///
/// Idempotent: `enforce(&enforce(c, id).to_map(), id) == enforce(c, id)`.
pub fn enforce(candidate: &Map<String, Value>, fallback_task_id: Option<&str>) -> RecordContract {
    let task_id = non_empty_text(candidate.get("task_id"))
        .or_else(|| {
            fallback_task_id
                .filter(|id| !id.trim().is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| UNKNOWN_TASK_ID.to_string());

    let status = candidate
        .get("status")
        .and_then(Value::as_str)
        .and_then(TaskStatus::from_label)
        .unwrap_or(TaskStatus::Completed);

    let summary = non_empty_text(candidate.get("summary"))
        .unwrap_or_else(|| format!("Task {task_id} completed"));

    RecordContract {
        task_id,
        status,
        summary,
        detailed_results_json: encoded_json(candidate.get("detailed_results_json")),
        next_steps: string_list(candidate.get("next_steps")),
        suggested_handoff_target_role: optional_text(
            candidate.get("suggested_handoff_target_role"),
        ),
        resources_consumed_json: encoded_json(candidate.get("resources_consumed_json")),
    }
}

/// Strings are kept as-is when they hold any non-whitespace; numbers are
/// rendered. Everything else counts as missing.
fn non_empty_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Optional free-text fields: any string is kept verbatim, blank included.
fn optional_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// JSON-encoded payload fields: text is kept verbatim, structured values are
/// serialized.
fn encoded_json(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    match value? {
        Value::Array(items) => Some(items.iter().map(item_text).collect()),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => Some(items.iter().map(item_text).collect()),
            _ if s.trim().is_empty() => None,
            _ => Some(vec![s.clone()]),
        },
        _ => None,
    }
}

fn item_text(item: &Value) -> String {
    match item {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
