//! Terminal strategy: a `failed` record describing why nothing else worked.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::core::clock::Clock;
use crate::core::normalize::strip_invisible;
use crate::core::scan::has_unclosed_object;
use crate::core::strategy::RecoveryStrategy;
use crate::core::text::{char_len, truncate_chars, truncate_with_marker};
use crate::core::types::{FailureKind, ParseAttemptResult, RecoveryMethod, TaskStatus};

/// Summary used when the raw text has no usable line at all.
pub const UNPARSEABLE_SUMMARY: &str = "Task output could not be parsed";

/// Lines shorter than this are not treated as a summary candidate.
const MIN_SUMMARY_LINE_CHARS: usize = 10;

static SUMMARY_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?im)^[\s>*#-]*summary\s*\**\s*[:\-]\s*\**\s*"?(.+?)"?\s*$"#).unwrap()
});

/// Bounds for the fallback record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ParserConfig {
    /// Longest summary derived from unparseable text.
    pub fallback_summary_max_chars: usize,

    /// Characters of raw output kept in the diagnostic preview.
    pub raw_preview_chars: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            fallback_summary_max_chars: 200,
            raw_preview_chars: 500,
        }
    }
}

/// Always succeeds with `status = "failed"` and a diagnostic payload.
pub struct ErrorFallback {
    config: ParserConfig,
    clock: Arc<dyn Clock>,
}

impl ErrorFallback {
    pub fn new(config: ParserConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    /// Classify unparseable input for diagnostics.
    pub fn classify(raw: &str) -> FailureKind {
        if has_unclosed_object(raw) {
            FailureKind::TruncatedInput
        } else {
            FailureKind::MalformedInput
        }
    }

    /// Explicit `summary:` line first, else the first substantial line that is
    /// not JSON punctuation or a fence.
    pub fn derive_summary(&self, raw: &str) -> String {
        let cleaned = strip_invisible(raw);
        let candidate = SUMMARY_LINE_RE
            .captures(&cleaned)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| {
                cleaned
                    .lines()
                    .map(str::trim)
                    .find(|line| {
                        char_len(line) >= MIN_SUMMARY_LINE_CHARS
                            && !line.starts_with(['{', '}', '[', ']'])
                            && !line.starts_with("```")
                    })
                    .map(str::to_string)
            });

        match candidate {
            Some(line) => truncate_with_marker(&line, self.config.fallback_summary_max_chars, "..."),
            None => UNPARSEABLE_SUMMARY.to_string(),
        }
    }

    fn diagnostics(&self, raw: &str) -> Value {
        let preview = strip_invisible(truncate_chars(raw, self.config.raw_preview_chars));
        json!({
            "error": "Failed to parse structured output",
            "error_kind": Self::classify(raw).as_str(),
            "raw_length": char_len(raw),
            "raw_preview": preview,
            "timestamp": self.clock.now_rfc3339(),
        })
    }
}

impl RecoveryStrategy for ErrorFallback {
    fn method(&self) -> RecoveryMethod {
        RecoveryMethod::ErrorFallback
    }

    fn attempt(&self, raw: &str) -> Option<ParseAttemptResult> {
        let mut map = Map::new();
        map.insert(
            "status".to_string(),
            Value::from(TaskStatus::Failed.as_str()),
        );
        map.insert("summary".to_string(), Value::from(self.derive_summary(raw)));
        map.insert(
            "detailed_results_json".to_string(),
            Value::from(self.diagnostics(raw).to_string()),
        );
        Some(ParseAttemptResult::new(map, self.method()))
    }
}
