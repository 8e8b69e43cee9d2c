//! JSON report output for the diagnostic binary.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

/// Pretty-printed JSON with trailing newline.
pub fn render_json<T: Serialize>(value: &T) -> Result<String> {
    let mut payload = serde_json::to_string_pretty(value).context("serialize json")?;
    payload.push('\n');
    Ok(payload)
}

/// Serialize `value` to pretty-printed JSON at `path`, creating parent directories.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let payload = render_json(value)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    fs::write(path, payload).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn written_report_reads_back() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("reports/out.json");
        write_json(&path, &json!({"ok": true})).expect("write");
        let text = fs::read_to_string(&path).expect("read");
        assert!(text.ends_with('\n'));
        let value: Value = serde_json::from_str(&text).expect("json");
        assert_eq!(value["ok"], true);
    }
}
