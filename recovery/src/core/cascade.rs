//! Ordered recovery cascade over raw model output.
//!
//! Strategies run in a fixed order and the first `Some` wins:
//! direct parse → fenced extraction → truncation repair → field salvage →
//! error fallback. The fallback always succeeds, so [`RecoveryParser::parse`]
//! is total.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::core::clock::{Clock, SystemClock};
use crate::core::enforce::enforce;
use crate::core::fallback::{ErrorFallback, ParserConfig};
use crate::core::salvage::FieldSalvage;
use crate::core::stats::{NoopStats, StatsCollector};
use crate::core::strategy::{DirectParse, FencedExtraction, RecoveryStrategy};
use crate::core::truncation::TruncationRepair;
use crate::core::types::{
    Completeness, ParseAttemptResult, ParseOutcome, RecoveryMethod, TaskStatus,
};

/// Turns raw model text into a [`ParseOutcome`], never failing.
pub struct RecoveryParser {
    strategies: Vec<Box<dyn RecoveryStrategy>>,
    stats: Arc<dyn StatsCollector>,
}

impl Default for RecoveryParser {
    fn default() -> Self {
        Self::new(ParserConfig::default(), Arc::new(NoopStats), Arc::new(SystemClock))
    }
}

impl RecoveryParser {
    pub fn new(
        config: ParserConfig,
        stats: Arc<dyn StatsCollector>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            strategies: vec![
                Box::new(DirectParse),
                Box::new(FencedExtraction),
                Box::new(TruncationRepair),
                Box::new(FieldSalvage),
                Box::new(ErrorFallback::new(config, clock)),
            ],
            stats,
        }
    }

    /// Run the cascade and enforce the required fields on the winner.
    #[instrument(skip_all, fields(raw_len = raw.len(), task_hint = ?fallback_task_id))]
    pub fn parse(&self, raw: &str, fallback_task_id: Option<&str>) -> ParseOutcome {
        let attempt = self.first_success(raw);
        let record = enforce(&attempt.value, fallback_task_id);

        match attempt.completeness {
            Completeness::Complete => {
                debug!(method = %attempt.method, task_id = %record.task_id, "parsed output")
            }
            Completeness::Recovered => {
                info!(method = %attempt.method, task_id = %record.task_id, "recovered truncated output")
            }
            Completeness::Partial => {
                warn!(method = %attempt.method, task_id = %record.task_id, "partially recovered output")
            }
        }

        ParseOutcome {
            record,
            completeness: attempt.completeness,
            method: attempt.method,
        }
    }

    /// Lossy UTF-8 entry point for arbitrary bytes.
    pub fn parse_bytes(&self, raw: &[u8], fallback_task_id: Option<&str>) -> ParseOutcome {
        self.parse(&String::from_utf8_lossy(raw), fallback_task_id)
    }

    fn first_success(&self, raw: &str) -> ParseAttemptResult {
        for strategy in &self.strategies {
            let method = strategy.method();
            self.stats.record_attempt(method);
            match strategy.attempt(raw) {
                Some(result) => {
                    self.stats.record_success(method);
                    return result;
                }
                None => {
                    self.stats.record_failure(method);
                    debug!(%method, "strategy declined");
                }
            }
        }

        // Unreachable while ErrorFallback terminates the list.
        let mut value = Map::new();
        value.insert("status".to_string(), Value::from(TaskStatus::Failed.as_str()));
        ParseAttemptResult::new(value, RecoveryMethod::ErrorFallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::FixedClock;
    use crate::core::stats::AtomicStats;

    fn parser_with_stats() -> (RecoveryParser, Arc<AtomicStats>) {
        let stats = Arc::new(AtomicStats::new());
        let parser = RecoveryParser::new(
            ParserConfig::default(),
            stats.clone(),
            Arc::new(FixedClock("2026-01-01T00:00:00Z".to_string())),
        );
        (parser, stats)
    }

    #[test]
    fn well_formed_object_is_complete() {
        let (parser, _) = parser_with_stats();
        let outcome = parser.parse(r#"{"task_id":"t1","status":"completed","summary":"ok"}"#, None);
        assert_eq!(outcome.completeness, Completeness::Complete);
        assert_eq!(outcome.method, RecoveryMethod::DirectParse);
        assert_eq!(outcome.record.summary, "ok");
    }

    #[test]
    fn stats_count_each_attempt_until_success() {
        let (parser, stats) = parser_with_stats();
        parser.parse("plain prose without any structure", Some("t9"));
        for method in [
            RecoveryMethod::DirectParse,
            RecoveryMethod::FencedExtraction,
            RecoveryMethod::TruncationRepair,
            RecoveryMethod::FieldSalvage,
        ] {
            let counts = stats.get(method);
            assert_eq!((counts.attempts, counts.failures), (1, 1), "{method}");
        }
        let fallback = stats.get(RecoveryMethod::ErrorFallback);
        assert_eq!((fallback.attempts, fallback.successes), (1, 1));
    }

    #[test]
    fn fallback_task_id_reaches_fallback_record() {
        let (parser, _) = parser_with_stats();
        let outcome = parser.parse("", Some("t-empty"));
        assert_eq!(outcome.method, RecoveryMethod::ErrorFallback);
        assert_eq!(outcome.record.task_id, "t-empty");
        assert_eq!(outcome.record.status, TaskStatus::Failed);
        assert!(!outcome.record.summary.is_empty());
    }

    #[test]
    fn bytes_are_decoded_lossily() {
        let (parser, _) = parser_with_stats();
        let mut raw = br#"{"task_id":"t1","status":"failed","summary":"bad "#.to_vec();
        raw.extend_from_slice(&[0xff, 0xfe]);
        raw.extend_from_slice(br#" bytes"}"#);
        let outcome = parser.parse_bytes(&raw, None);
        assert_eq!(outcome.completeness, Completeness::Complete);
        assert!(outcome.record.summary.starts_with("bad "));
    }
}
