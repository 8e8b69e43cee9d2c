//! Stable exit codes for recovery CLI commands.

use crate::core::types::Completeness;

/// Output parsed completely, or a record was governed.
pub const OK: i32 = 0;
/// Invalid input file, config, or record, or a postcondition violation.
pub const INVALID: i32 = 1;
/// Output was truncated and structurally repaired.
pub const RECOVERED: i32 = 2;
/// Only some fields could be recovered, or the fallback record was used.
pub const PARTIAL: i32 = 3;

/// Exit code reporting parser confidence.
pub fn for_completeness(completeness: Completeness) -> i32 {
    match completeness {
        Completeness::Complete => OK,
        Completeness::Recovered => RECOVERED,
        Completeness::Partial => PARTIAL,
    }
}
