//! Attempt/success/failure tallies for the recovery cascade.
//!
//! The collector is injected into the parser; nothing here is global. Counts
//! are eventually consistent across threads, with no cross-call ordering.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::core::types::RecoveryMethod;

/// Receives one event per strategy attempt.
pub trait StatsCollector: Send + Sync {
    fn record_attempt(&self, method: RecoveryMethod);
    fn record_success(&self, method: RecoveryMethod);
    fn record_failure(&self, method: RecoveryMethod);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStats;

impl StatsCollector for NoopStats {
    fn record_attempt(&self, _method: RecoveryMethod) {}
    fn record_success(&self, _method: RecoveryMethod) {}
    fn record_failure(&self, _method: RecoveryMethod) {}
}

#[derive(Debug, Default)]
struct MethodCounters {
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
}

/// Lock-free counters, one triple per [`RecoveryMethod`].
#[derive(Debug, Default)]
pub struct AtomicStats {
    counters: [MethodCounters; RecoveryMethod::ALL.len()],
}

/// Point-in-time counts for one method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MethodStats {
    pub method: RecoveryMethod,
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
}

impl AtomicStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self, method: RecoveryMethod) -> &MethodCounters {
        &self.counters[method.index()]
    }

    /// Counts for every method, in cascade order.
    pub fn snapshot(&self) -> Vec<MethodStats> {
        RecoveryMethod::ALL.iter().map(|&method| self.get(method)).collect()
    }

    pub fn get(&self, method: RecoveryMethod) -> MethodStats {
        let c = self.counters(method);
        MethodStats {
            method,
            attempts: c.attempts.load(Ordering::Relaxed),
            successes: c.successes.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
        }
    }
}

impl StatsCollector for AtomicStats {
    fn record_attempt(&self, method: RecoveryMethod) {
        self.counters(method).attempts.fetch_add(1, Ordering::Relaxed);
    }

    fn record_success(&self, method: RecoveryMethod) {
        self.counters(method).successes.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self, method: RecoveryMethod) {
        self.counters(method).failures.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn concurrent_increments_are_not_lost() {
        let stats = Arc::new(AtomicStats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..1_000 {
                        stats.record_attempt(RecoveryMethod::DirectParse);
                        stats.record_success(RecoveryMethod::DirectParse);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("join");
        }
        let direct = stats.get(RecoveryMethod::DirectParse);
        assert_eq!(direct.attempts, 8_000);
        assert_eq!(direct.successes, 8_000);
        assert_eq!(direct.failures, 0);
    }

    #[test]
    fn snapshot_lists_methods_in_cascade_order() {
        let stats = AtomicStats::new();
        stats.record_failure(RecoveryMethod::FieldSalvage);
        let snapshot = stats.snapshot();
        let methods: Vec<RecoveryMethod> = snapshot.iter().map(|s| s.method).collect();
        assert_eq!(methods, RecoveryMethod::ALL.to_vec());
        assert_eq!(snapshot[3].failures, 1);
    }
}
