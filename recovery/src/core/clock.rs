//! Timestamp source for diagnostics and truncation metadata.

use chrono::{SecondsFormat, Utc};

/// Supplies RFC 3339 timestamps.
///
/// Governance and fallback records embed timestamps; injecting the clock keeps
/// those paths deterministic under test.
pub trait Clock: Send + Sync {
    fn now_rfc3339(&self) -> String;
}

/// Wall clock in UTC, second precision.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_rfc3339(&self) -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

/// Clock pinned to one instant.
#[derive(Debug, Clone)]
pub struct FixedClock(pub String);

impl Clock for FixedClock {
    fn now_rfc3339(&self) -> String {
        self.0.clone()
    }
}
