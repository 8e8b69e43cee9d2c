//! Recovery configuration stored as TOML.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::core::budget::SizeBudget;
use crate::core::fallback::ParserConfig;

/// Recovery configuration (TOML).
///
/// Intended to be edited by humans. Missing tables and fields default to the
/// production values.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RecoveryConfig {
    pub parser: ParserConfig,
    pub budget: SizeBudget,
}

impl RecoveryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.parser.fallback_summary_max_chars == 0 {
            bail!("parser.fallback_summary_max_chars must be > 0");
        }
        if self.parser.fallback_summary_max_chars > self.budget.summary_max_chars {
            bail!("parser.fallback_summary_max_chars must be <= budget.summary_max_chars");
        }
        self.budget.validate().context("budget")
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `RecoveryConfig::default()`.
pub fn load_config(path: &Path) -> Result<RecoveryConfig> {
    if !path.exists() {
        let cfg = RecoveryConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: RecoveryConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &RecoveryConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
