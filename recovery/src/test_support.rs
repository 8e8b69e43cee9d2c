//! Test-only helpers for constructing records, budgets, and parsers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::core::budget::SizeBudget;
use crate::core::clock::FixedClock;
use crate::core::governor::SizeGovernor;
use crate::core::stats::NoopStats;
use crate::core::types::{RecordContract, TaskStatus};
use crate::io::config::RecoveryConfig;
use crate::pipeline::Pipeline;

/// Timestamp reported by [`fixed_clock`].
pub const FIXED_NOW: &str = "2026-01-01T00:00:00Z";

pub fn fixed_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock(FIXED_NOW.to_string()))
}

/// Create a completed record with only the required fields set.
pub fn record(task_id: &str, summary: &str) -> RecordContract {
    RecordContract {
        task_id: task_id.to_string(),
        status: TaskStatus::Completed,
        summary: summary.to_string(),
        detailed_results_json: None,
        next_steps: None,
        suggested_handoff_target_role: None,
        resources_consumed_json: None,
    }
}

/// Create a record with every optional field populated.
pub fn full_record(task_id: &str) -> RecordContract {
    RecordContract {
        detailed_results_json: Some(r#"{"files":["src/lib.rs"],"ok":true}"#.to_string()),
        next_steps: Some(vec!["write tests".to_string(), "open review".to_string()]),
        suggested_handoff_target_role: Some("reviewer".to_string()),
        resources_consumed_json: Some(r#"{"tokens":1200}"#.to_string()),
        ..record(task_id, &format!("Task {task_id} finished the refactor."))
    }
}

/// Governor over `budget` with a fixed clock.
pub fn governor(budget: SizeBudget) -> SizeGovernor {
    SizeGovernor::new(budget)
        .expect("valid budget")
        .with_clock(fixed_clock())
}

/// Pipeline with default configuration and a fixed clock.
pub fn pipeline() -> Pipeline {
    Pipeline::new(&RecoveryConfig::default(), Arc::new(NoopStats), fixed_clock())
        .expect("default pipeline")
}

/// Temporary directory holding captured raw output files.
pub struct Captures {
    dir: TempDir,
}

impl Captures {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create tempdir")?;
        Ok(Self { dir })
    }

    /// Write `contents` to `name` inside the directory and return its path.
    pub fn write(&self, name: &str, contents: impl AsRef<[u8]>) -> Result<PathBuf> {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    pub fn path(&self) -> &std::path::Path {
        self.dir.path()
    }
}
