//! Record postconditions not expressible via JSON Schema.
//!
//! A non-empty result means an enforcement or governance defect, never bad
//! input.

use crate::core::budget::SizeBudget;
use crate::core::text::char_len;
use crate::core::tree_bound::is_omitted_marker;
use crate::core::types::RecordContract;

/// Check the required-field postconditions:
/// - `task_id` is non-blank
/// - `summary` is non-blank
pub fn validate_record(record: &RecordContract) -> Vec<String> {
    let mut errors = Vec::new();
    if record.task_id.trim().is_empty() {
        errors.push("task_id must be non-empty".to_string());
    }
    if record.summary.trim().is_empty() {
        errors.push(format!("{}: summary must be non-empty", record.task_id));
    }
    errors
}

/// Check [`validate_record`] plus every ceiling in `budget`.
pub fn validate_governed(record: &RecordContract, budget: &SizeBudget) -> Vec<String> {
    let mut errors = validate_record(record);
    let id = record.task_id.as_str();

    let summary_len = char_len(&record.summary);
    if summary_len > budget.summary_max_chars {
        errors.push(format!(
            "{id}: summary length {summary_len} exceeds {}",
            budget.summary_max_chars
        ));
    }

    if let Some(details) = record.detailed_results_json.as_deref() {
        let details_len = char_len(details);
        if details_len > budget.detailed_results_max_chars {
            errors.push(format!(
                "{id}: detailed_results_json length {details_len} exceeds {}",
                budget.detailed_results_max_chars
            ));
        }
    }

    if let Some(steps) = record.next_steps.as_deref() {
        let originals = steps.iter().filter(|step| !is_omitted_marker(step)).count();
        if originals > budget.array_max_items {
            errors.push(format!(
                "{id}: next_steps holds {originals} items, cap is {}",
                budget.array_max_items
            ));
        }
    }

    let total = record.serialized_len();
    if total > budget.global_max_chars {
        errors.push(format!(
            "{id}: serialized length {total} exceeds {}",
            budget.global_max_chars
        ));
    }
    errors
}
