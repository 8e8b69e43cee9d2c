//! Output size governance for enforced records.
//!
//! Per-field steps run in a fixed order, each a no-op when its field is
//! already within budget:
//!
//! 1. `summary` is cut at a late sentence boundary (or hard-cut) and marked.
//! 2. `detailed_results_json` is tree-bounded, then reduced to an allow-list of
//!    top-level keys, then hard-truncated, stopping as soon as it fits.
//! 3. `next_steps` keeps its head; a `resources_consumed_json` array keeps its
//!    head and tail.
//!
//! A global check follows. When the record is still over the global ceiling,
//! emergency reduction keeps only the required fields plus a bounded
//! `detailed_results_json`.
//!
//! Every output is within every ceiling, so governing it again changes nothing.
//! Output is never longer than input except by the omission markers of
//! sampled arrays: a marker can outweigh the items it replaces, and the item
//! cap wins over the length of such a record while it stays within the global
//! ceiling.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, instrument, warn};

use crate::core::budget::SizeBudget;
use crate::core::clock::{Clock, SystemClock};
use crate::core::enforce::UNKNOWN_TASK_ID;
use crate::core::text::{char_len, truncate_chars, truncate_with_marker};
use crate::core::tree_bound::{
    TreeBound, is_omitted_marker, omitted_marker, original_item_count, rewrite,
};
use crate::core::types::{FailureKind, RecordContract};

/// Appended to a shortened `summary`.
pub const SUMMARY_MARKER: &str = " [Summary truncated for length]";

/// Appended to hard-truncated detailed results.
pub const DETAILS_MARKER: &str = " [Detailed results truncated for length]";

/// Appended when detailed results were not valid JSON.
pub const INVALID_JSON_MARKER: &str = " [Invalid JSON truncated for length]";

/// Top-level detailed-results keys kept by key filtering.
pub const ALLOWED_DETAIL_KEYS: [&str; 8] = [
    "task_id",
    "status",
    "summary",
    "error",
    "timestamp",
    "executive_summary",
    "key_findings",
    "main_results",
];

/// Fields carried through emergency reduction.
pub const PRESERVED_FIELDS: [&str; 4] = ["task_id", "status", "summary", "detailed_results_json"];

/// Characters cut from the ceiling when no sentence boundary is found.
const HARD_CUT_MARGIN: usize = 50;

/// Initial `task_id` bound during emergency reduction.
const EMERGENCY_TASK_ID_CHARS: usize = 256;

/// Emergency shrinking never cuts `task_id` or `summary` below this.
const EMERGENCY_FLOOR_CHARS: usize = 16;

/// Named governance operation, reported in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GovernanceOp {
    SummaryTruncated,
    DetailedResultsOptimized,
    DetailedResultsKeyFiltered,
    DetailedResultsHardTruncated,
    DetailedResultsInvalidJsonTruncated,
    NextStepsSampled,
    ResourcesConsumedSampled,
    EmergencyReduction,
}

impl GovernanceOp {
    pub fn as_str(self) -> &'static str {
        match self {
            GovernanceOp::SummaryTruncated => "summary_truncated",
            GovernanceOp::DetailedResultsOptimized => "detailed_results_optimized",
            GovernanceOp::DetailedResultsKeyFiltered => "detailed_results_key_filtered",
            GovernanceOp::DetailedResultsHardTruncated => "detailed_results_hard_truncated",
            GovernanceOp::DetailedResultsInvalidJsonTruncated => {
                "detailed_results_invalid_json_truncated"
            }
            GovernanceOp::NextStepsSampled => "next_steps_sampled",
            GovernanceOp::ResourcesConsumedSampled => "resources_consumed_sampled",
            GovernanceOp::EmergencyReduction => "emergency_reduction",
        }
    }
}

/// How far governance had to go. Only ever advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GovernanceStage {
    Unbounded,
    FieldBounded,
    GloballyBounded,
    EmergencyBounded,
}

/// Bounded record plus a report of what was done to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GovernOutcome {
    pub record: RecordContract,
    pub was_modified: bool,
    pub applied_ops: Vec<GovernanceOp>,
    pub stage: GovernanceStage,
}

impl GovernOutcome {
    pub fn op_labels(&self) -> Vec<&'static str> {
        self.applied_ops.iter().map(|op| op.as_str()).collect()
    }

    /// [`FailureKind::OversizedOutput`] when any operation had to fire.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.was_modified.then_some(FailureKind::OversizedOutput)
    }
}

/// Applies a validated [`SizeBudget`] to records.
pub struct SizeGovernor {
    budget: SizeBudget,
    clock: Arc<dyn Clock>,
}

impl SizeGovernor {
    /// Rejects budgets under which the ceilings cannot be guaranteed.
    pub fn new(budget: SizeBudget) -> Result<Self> {
        budget.validate().context("invalid size budget")?;
        Ok(Self {
            budget,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn budget(&self) -> &SizeBudget {
        &self.budget
    }

    #[instrument(skip_all, fields(task_id = %record.task_id))]
    pub fn govern(&self, record: &RecordContract) -> GovernOutcome {
        let original_len = record.serialized_len();
        let mut ops = Vec::new();
        let mut stage = GovernanceStage::Unbounded;
        let mut bounded = record.clone();

        if let Some(summary) = self.bound_summary(&bounded.summary) {
            bounded.summary = summary;
            ops.push(GovernanceOp::SummaryTruncated);
        }

        if let Some((details, applied)) = bounded
            .detailed_results_json
            .as_deref()
            .and_then(|details| self.bound_details(details))
        {
            bounded.detailed_results_json = Some(details);
            ops.extend(applied);
        }

        if let Some(steps) = bounded
            .next_steps
            .as_deref()
            .and_then(|steps| sample_head(steps, self.budget.array_max_items))
        {
            bounded.next_steps = Some(steps);
            ops.push(GovernanceOp::NextStepsSampled);
        }

        if let Some(resources) = bounded
            .resources_consumed_json
            .as_deref()
            .and_then(|resources| sample_encoded_array(resources, self.budget.array_max_items))
        {
            bounded.resources_consumed_json = Some(resources);
            ops.push(GovernanceOp::ResourcesConsumedSampled);
        }

        advance(&mut stage, GovernanceStage::FieldBounded);

        let field_bounded_len = bounded.serialized_len();
        if field_bounded_len <= self.budget.global_max_chars {
            advance(&mut stage, GovernanceStage::GloballyBounded);
        } else {
            let target = self.budget.global_max_chars.min(original_len);
            let reduced = self.emergency_reduce(record, &bounded, target);
            // Never trade the field-bounded record for a longer one.
            if reduced.serialized_len() < field_bounded_len {
                bounded = reduced;
            }
            ops.push(GovernanceOp::EmergencyReduction);
            advance(&mut stage, GovernanceStage::EmergencyBounded);
            warn!(
                kind = FailureKind::OversizedOutput.as_str(),
                original_len,
                field_bounded_len,
                reduced_len = bounded.serialized_len(),
                "emergency reduction applied"
            );
        }

        if !ops.is_empty() {
            debug!(
                kind = FailureKind::OversizedOutput.as_str(),
                ops = ?ops,
                ?stage,
                "record governed"
            );
        }

        GovernOutcome {
            record: bounded,
            was_modified: !ops.is_empty(),
            applied_ops: ops,
            stage,
        }
    }

    /// Summary within `summary_max_chars`, marker included.
    fn bound_summary(&self, summary: &str) -> Option<String> {
        let ceiling = self.budget.summary_max_chars;
        if char_len(summary) <= ceiling {
            return None;
        }
        let window_start = ceiling * 7 / 10;
        let window_end = ceiling.saturating_sub(char_len(SUMMARY_MARKER));
        let sentence_end = summary
            .char_indices()
            .take(window_end)
            .skip(window_start)
            .filter(|(_, c)| matches!(c, '.' | '!' | '?'))
            .last()
            .map(|(idx, c)| idx + c.len_utf8());
        let kept = match sentence_end {
            Some(end) => &summary[..end],
            None => truncate_chars(summary, ceiling.saturating_sub(HARD_CUT_MARGIN)),
        };
        Some(format!("{kept}{SUMMARY_MARKER}"))
    }

    fn bound_details(&self, details: &str) -> Option<(String, Vec<GovernanceOp>)> {
        let ceiling = self.budget.detailed_results_max_chars;
        if char_len(details) <= ceiling {
            return None;
        }
        let Ok(value) = serde_json::from_str::<Value>(details) else {
            return Some((
                hard_truncate(details, ceiling, INVALID_JSON_MARKER),
                vec![GovernanceOp::DetailedResultsInvalidJsonTruncated],
            ));
        };

        let mut ops = vec![GovernanceOp::DetailedResultsOptimized];
        let tree_bound = TreeBound {
            max_items: self.budget.array_max_items,
            max_leaf_chars: self.budget.string_leaf_max_chars,
        };
        let optimized = rewrite(&value, &tree_bound);
        let mut text = optimized.to_string();

        let filtered = (char_len(&text) > ceiling)
            .then(|| self.filter_keys(&optimized))
            .flatten();
        if let Some(filtered) = filtered {
            text = filtered.to_string();
            ops.push(GovernanceOp::DetailedResultsKeyFiltered);
        }

        if char_len(&text) > ceiling {
            text = hard_truncate(&text, ceiling, DETAILS_MARKER);
            ops.push(GovernanceOp::DetailedResultsHardTruncated);
        }
        Some((text, ops))
    }

    /// Allow-listed top-level keys plus a `_metadata` summary of what was dropped.
    fn filter_keys(&self, value: &Value) -> Option<Value> {
        let Value::Object(map) = value else {
            return None;
        };
        let mut kept = Map::new();
        let mut dropped = Vec::new();
        for (key, child) in map {
            if ALLOWED_DETAIL_KEYS.contains(&key.as_str()) {
                kept.insert(key.clone(), child.clone());
            } else {
                dropped.push(key.clone());
            }
        }
        kept.insert(
            "_metadata".to_string(),
            json!({
                "truncated": true,
                "original_field_count": map.len(),
                "dropped_field_names": dropped,
                "timestamp": self.clock.now_rfc3339(),
            }),
        );
        Some(Value::Object(kept))
    }

    /// Shrinks an emergency record until it fits `target` and the detailed
    /// ceiling, or every limit has reached its floor.
    fn emergency_reduce(
        &self,
        original: &RecordContract,
        bounded: &RecordContract,
        target: usize,
    ) -> RecordContract {
        let timestamp = self.clock.now_rfc3339();
        let original_fields = original.present_field_names();
        let mut limits = EmergencyLimits {
            task_id: EMERGENCY_TASK_ID_CHARS,
            summary: self.budget.emergency_summary_chars,
            content: self.budget.emergency_details_chars,
        };
        loop {
            let candidate = emergency_record(bounded, &original_fields, &timestamp, limits);
            let details_len = candidate.detailed_results_json.as_deref().map_or(0, char_len);
            let fits = candidate.serialized_len() <= target
                && details_len <= self.budget.detailed_results_max_chars;
            if fits {
                return candidate;
            }
            if !limits.shrink() {
                warn!(target, "emergency record cannot shrink further");
                return candidate;
            }
        }
    }
}

fn advance(stage: &mut GovernanceStage, next: GovernanceStage) {
    debug_assert!(next >= *stage, "governance stage moved backwards");
    *stage = next;
}

/// Cut to exactly `ceiling` characters, marker included.
fn hard_truncate(text: &str, ceiling: usize, marker: &str) -> String {
    let keep = ceiling.saturating_sub(char_len(marker));
    format!("{}{marker}", truncate_chars(text, keep))
}

/// Order-significant sampling: the first `cap - 1` items and one marker.
fn sample_head(items: &[String], cap: usize) -> Option<Vec<String>> {
    let originals = items
        .iter()
        .filter(|item| !is_omitted_marker(item))
        .count();
    if originals <= cap {
        return None;
    }
    let keep = cap.saturating_sub(1);
    let mut sampled = items[..keep].to_vec();
    sampled.push(omitted_marker(items.len() - keep));
    Some(sampled)
}

/// Order-insignificant sampling: `cap / 2` from each end around one marker.
fn sample_head_tail(items: &[Value], cap: usize) -> Option<Vec<Value>> {
    if original_item_count(items) <= cap {
        return None;
    }
    let half = cap / 2;
    let mut sampled = items[..half].to_vec();
    sampled.push(Value::String(omitted_marker(items.len() - 2 * half)));
    sampled.extend_from_slice(&items[items.len() - half..]);
    Some(sampled)
}

/// Head+tail sampling for JSON text encoding a top-level array.
fn sample_encoded_array(text: &str, cap: usize) -> Option<String> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) => {
            sample_head_tail(&items, cap).map(|sampled| Value::Array(sampled).to_string())
        }
        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
struct EmergencyLimits {
    task_id: usize,
    summary: usize,
    content: usize,
}

impl EmergencyLimits {
    /// Halve content first, then summary, then task id. False at the floor.
    fn shrink(&mut self) -> bool {
        if self.content > 0 {
            self.content /= 2;
        } else if self.summary > EMERGENCY_FLOOR_CHARS {
            self.summary = (self.summary / 2).max(EMERGENCY_FLOOR_CHARS);
        } else if self.task_id > EMERGENCY_FLOOR_CHARS {
            self.task_id = (self.task_id / 2).max(EMERGENCY_FLOOR_CHARS);
        } else {
            return false;
        }
        true
    }
}

fn emergency_record(
    bounded: &RecordContract,
    original_fields: &[String],
    timestamp: &str,
    limits: EmergencyLimits,
) -> RecordContract {
    let task_id = match truncate_chars(&bounded.task_id, limits.task_id) {
        id if id.trim().is_empty() => UNKNOWN_TASK_ID.to_string(),
        id => id.to_string(),
    };
    let content = bounded
        .detailed_results_json
        .as_deref()
        .map(|details| truncate_with_marker(details, limits.content, DETAILS_MARKER))
        .unwrap_or_default();
    let details = json!({
        "_emergency_truncation": {
            "applied": true,
            "timestamp": timestamp,
            "original_field_names": original_fields,
            "preserved_field_names": PRESERVED_FIELDS,
        },
        "content": content,
    });
    RecordContract {
        task_id,
        status: bounded.status,
        summary: truncate_with_marker(&bounded.summary, limits.summary, SUMMARY_MARKER),
        detailed_results_json: Some(details.to_string()),
        next_steps: None,
        suggested_handoff_target_role: None,
        resources_consumed_json: None,
    }
}
