//! Wire-shape validation for persisted records (JSON Schema Draft 2020-12).

use anyhow::{Context, Result, anyhow};
use jsonschema::Draft;
use serde_json::Value;

use crate::core::types::RecordContract;

/// Schema for the serialized [`RecordContract`].
pub const RECORD_SCHEMA: &str = include_str!("../../schemas/record_contract.schema.json");

/// Validate a JSON instance against the record schema.
pub fn validate_record_value(instance: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(RECORD_SCHEMA).context("parse record schema")?;
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .context("compile record schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        return Err(anyhow!(
            "record schema validation failed:\n- {}",
            messages.join("\n- ")
        ));
    }
    Ok(())
}

/// Validate a record's serialized form.
pub fn validate_record(record: &RecordContract) -> Result<()> {
    let value = serde_json::to_value(record).context("serialize record")?;
    validate_record_value(&value)
}

/// Parse JSON text as a record, checking the schema first.
pub fn parse_record(text: &str) -> Result<RecordContract> {
    let value: Value = serde_json::from_str(text).context("parse record json")?;
    validate_record_value(&value)?;
    serde_json::from_value(value).context("deserialize record")
}
