//! Parse, govern, and check one raw output.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tracing::{error, instrument};

use crate::core::cascade::RecoveryParser;
use crate::core::clock::{Clock, SystemClock};
use crate::core::governor::{GovernOutcome, GovernanceOp, GovernanceStage, SizeGovernor};
use crate::core::invariants::validate_governed;
use crate::core::stats::{NoopStats, StatsCollector};
use crate::core::types::{
    Completeness, FailureKind, ParseOutcome, RecordContract, RecoveryMethod,
};
use crate::io::config::RecoveryConfig;

/// Everything the caller needs to persist and report one task output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineOutcome {
    pub record: RecordContract,
    pub completeness: Completeness,
    pub method: RecoveryMethod,
    pub was_modified: bool,
    pub applied_ops: Vec<GovernanceOp>,
    pub stage: GovernanceStage,
    /// Postcondition violations; empty unless there is a defect.
    pub violations: Vec<String>,
}

impl PipelineOutcome {
    fn new(parsed: ParseOutcome, governed: GovernOutcome, violations: Vec<String>) -> Self {
        Self {
            record: governed.record,
            completeness: parsed.completeness,
            method: parsed.method,
            was_modified: governed.was_modified,
            applied_ops: governed.applied_ops,
            stage: governed.stage,
            violations,
        }
    }

    /// Failure class of the governance side, if any.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        if !self.violations.is_empty() {
            Some(FailureKind::InternalInconsistency)
        } else {
            self.was_modified.then_some(FailureKind::OversizedOutput)
        }
    }
}

pub struct Pipeline {
    parser: RecoveryParser,
    governor: SizeGovernor,
}

impl Pipeline {
    /// Build from validated configuration.
    pub fn new(
        config: &RecoveryConfig,
        stats: Arc<dyn StatsCollector>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let parser = RecoveryParser::new(config.parser, stats, Arc::clone(&clock));
        let governor = SizeGovernor::new(config.budget)?.with_clock(clock);
        Ok(Self { parser, governor })
    }

    /// Default configuration, no stats, system clock.
    pub fn with_defaults() -> Result<Self> {
        Self::new(
            &RecoveryConfig::default(),
            Arc::new(NoopStats),
            Arc::new(SystemClock),
        )
    }

    pub fn parser(&self) -> &RecoveryParser {
        &self.parser
    }

    pub fn governor(&self) -> &SizeGovernor {
        &self.governor
    }

    #[instrument(skip_all, fields(raw_len = raw.len()))]
    pub fn run(&self, raw: &str, task_id: Option<&str>) -> PipelineOutcome {
        let parsed = self.parser.parse(raw, task_id);
        self.finish(parsed)
    }

    pub fn run_bytes(&self, raw: &[u8], task_id: Option<&str>) -> PipelineOutcome {
        let parsed = self.parser.parse_bytes(raw, task_id);
        self.finish(parsed)
    }

    fn finish(&self, parsed: ParseOutcome) -> PipelineOutcome {
        let governed = self.governor.govern(&parsed.record);
        let violations = validate_governed(&governed.record, self.governor.budget());
        if !violations.is_empty() {
            error!(
                kind = FailureKind::InternalInconsistency.as_str(),
                task_id = %governed.record.task_id,
                violations = ?violations,
                "record postconditions violated"
            );
        }
        debug_assert!(violations.is_empty(), "violations: {violations:?}");
        PipelineOutcome::new(parsed, governed, violations)
    }
}
