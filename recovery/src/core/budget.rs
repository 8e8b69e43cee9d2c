//! Size ceilings applied by output governance.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

/// Per-field and global size ceilings, measured in characters (items for arrays).
///
/// Missing fields default to the production ceilings. A budget must pass
/// [`SizeBudget::validate`] before a governor accepts it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SizeBudget {
    /// Ceiling for `summary`, marker included.
    pub summary_max_chars: usize,

    /// Ceiling for the `detailed_results_json` text.
    pub detailed_results_max_chars: usize,

    /// Item cap for array fields and for lists nested in detailed results.
    pub array_max_items: usize,

    /// Cap for every string leaf nested in detailed results.
    pub string_leaf_max_chars: usize,

    /// Ceiling for the whole serialized record.
    pub global_max_chars: usize,

    /// Summary length kept by emergency reduction.
    pub emergency_summary_chars: usize,

    /// Detailed-results length kept by emergency reduction.
    pub emergency_details_chars: usize,
}

impl Default for SizeBudget {
    fn default() -> Self {
        Self {
            summary_max_chars: 2_000,
            detailed_results_max_chars: 30_000,
            array_max_items: 100,
            string_leaf_max_chars: 5_000,
            global_max_chars: 50_000,
            emergency_summary_chars: 1_000,
            emergency_details_chars: 10_000,
        }
    }
}

/// Smallest global ceiling that still fits a minimal emergency record.
pub const MIN_GLOBAL_MAX_CHARS: usize = 2_000;

impl SizeBudget {
    pub fn validate(&self) -> Result<()> {
        if self.global_max_chars < MIN_GLOBAL_MAX_CHARS {
            return Err(anyhow!(
                "global_max_chars must be >= {MIN_GLOBAL_MAX_CHARS} (got {})",
                self.global_max_chars
            ));
        }
        if self.summary_max_chars < 100 {
            return Err(anyhow!("summary_max_chars must be >= 100"));
        }
        if self.detailed_results_max_chars < 2_000 {
            return Err(anyhow!("detailed_results_max_chars must be >= 2000"));
        }
        if self.array_max_items < 2 {
            return Err(anyhow!("array_max_items must be >= 2"));
        }
        if self.string_leaf_max_chars < 100 {
            return Err(anyhow!("string_leaf_max_chars must be >= 100"));
        }
        if self.emergency_summary_chars == 0
            || self.emergency_summary_chars + 50 > self.summary_max_chars
        {
            return Err(anyhow!(
                "emergency_summary_chars must be > 0 and leave room for a marker under summary_max_chars"
            ));
        }
        if self.emergency_details_chars == 0
            || self.emergency_details_chars > self.detailed_results_max_chars / 2
        {
            return Err(anyhow!(
                "emergency_details_chars must be > 0 and <= half of detailed_results_max_chars"
            ));
        }
        if self.emergency_summary_chars + self.emergency_details_chars > self.global_max_chars / 2 {
            return Err(anyhow!(
                "emergency sizes must fit within half of global_max_chars"
            ));
        }
        Ok(())
    }
}
