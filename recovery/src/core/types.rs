//! Shared deterministic types for the recovery core.
//!
//! These types define stable contracts between core components. They must not
//! depend on external state or I/O and serialize identically across runs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Terminal status of a task execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Completed,
    Failed,
    RequiresHandoff,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::RequiresHandoff => "requires_handoff",
        }
    }

    /// Parse a status label, tolerating surrounding whitespace and case.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "completed" => Some(TaskStatus::Completed),
            "failed" => Some(TaskStatus::Failed),
            "requires_handoff" => Some(TaskStatus::RequiresHandoff),
            _ => None,
        }
    }
}

/// Canonical structured result of one task execution.
///
/// Field order matches the persisted wire shape. Optional fields serialize as
/// `null` so the field set is always complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordContract {
    pub task_id: String,
    pub status: TaskStatus,
    pub summary: String,
    pub detailed_results_json: Option<String>,
    pub next_steps: Option<Vec<String>>,
    pub suggested_handoff_target_role: Option<String>,
    pub resources_consumed_json: Option<String>,
}

impl RecordContract {
    /// Wire field names in serialization order.
    pub const FIELD_NAMES: [&'static str; 7] = [
        "task_id",
        "status",
        "summary",
        "detailed_results_json",
        "next_steps",
        "suggested_handoff_target_role",
        "resources_consumed_json",
    ];

    /// Names of fields carrying a value (required fields always do).
    pub fn present_field_names(&self) -> Vec<String> {
        let optional = [
            ("detailed_results_json", self.detailed_results_json.is_some()),
            ("next_steps", self.next_steps.is_some()),
            (
                "suggested_handoff_target_role",
                self.suggested_handoff_target_role.is_some(),
            ),
            ("resources_consumed_json", self.resources_consumed_json.is_some()),
        ];
        let mut names = vec![
            "task_id".to_string(),
            "status".to_string(),
            "summary".to_string(),
        ];
        names.extend(
            optional
                .iter()
                .filter(|(_, present)| *present)
                .map(|(name, _)| name.to_string()),
        );
        names
    }

    /// Convert into a JSON mapping with the wire field names.
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Compact JSON length in characters, the unit every size ceiling uses.
    pub fn serialized_len(&self) -> usize {
        serde_json::to_string(self)
            .map(|s| s.chars().count())
            .unwrap_or(0)
    }
}

/// Parser confidence in a recovered record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Completeness {
    /// The source text contained a well-formed object.
    Complete,
    /// The source was truncated and structurally repaired.
    Recovered,
    /// Only some fields (or none) could be recovered.
    Partial,
}

/// Recovery strategy that produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryMethod {
    DirectParse,
    FencedExtraction,
    TruncationRepair,
    FieldSalvage,
    ErrorFallback,
}

impl RecoveryMethod {
    /// All methods in cascade order.
    pub const ALL: [RecoveryMethod; 5] = [
        RecoveryMethod::DirectParse,
        RecoveryMethod::FencedExtraction,
        RecoveryMethod::TruncationRepair,
        RecoveryMethod::FieldSalvage,
        RecoveryMethod::ErrorFallback,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RecoveryMethod::DirectParse => "direct_parse",
            RecoveryMethod::FencedExtraction => "fenced_extraction",
            RecoveryMethod::TruncationRepair => "truncation_repair",
            RecoveryMethod::FieldSalvage => "field_salvage",
            RecoveryMethod::ErrorFallback => "error_fallback",
        }
    }

    /// Completeness implied by a result from this method.
    pub fn completeness(self) -> Completeness {
        match self {
            RecoveryMethod::DirectParse | RecoveryMethod::FencedExtraction => {
                Completeness::Complete
            }
            RecoveryMethod::TruncationRepair => Completeness::Recovered,
            RecoveryMethod::FieldSalvage | RecoveryMethod::ErrorFallback => Completeness::Partial,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            RecoveryMethod::DirectParse => 0,
            RecoveryMethod::FencedExtraction => 1,
            RecoveryMethod::TruncationRepair => 2,
            RecoveryMethod::FieldSalvage => 3,
            RecoveryMethod::ErrorFallback => 4,
        }
    }
}

impl std::fmt::Display for RecoveryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single strategy attempt. Transient: discarded after enforcement.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseAttemptResult {
    pub value: Map<String, Value>,
    pub completeness: Completeness,
    pub method: RecoveryMethod,
}

impl ParseAttemptResult {
    pub fn new(value: Map<String, Value>, method: RecoveryMethod) -> Self {
        Self {
            value,
            completeness: method.completeness(),
            method,
        }
    }
}

/// Record produced by the cascade together with its degradation metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseOutcome {
    pub record: RecordContract,
    pub completeness: Completeness,
    pub method: RecoveryMethod,
}

/// Failure taxonomy used in diagnostics and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Unparsable by every structural strategy.
    MalformedInput,
    /// Valid prefix with a missing suffix.
    TruncatedInput,
    /// Valid but over the size budget; corrected by governance.
    OversizedOutput,
    /// A postcondition was violated. Indicates a defect, never bad input.
    InternalInconsistency,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::MalformedInput => "malformed_input",
            FailureKind::TruncatedInput => "truncated_input",
            FailureKind::OversizedOutput => "oversized_output",
            FailureKind::InternalInconsistency => "internal_inconsistency",
        }
    }
}
