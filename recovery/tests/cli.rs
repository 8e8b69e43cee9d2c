//! CLI tests for the `recovery` binary.
//!
//! Spawns the binary on captured output files and checks the JSON report and
//! exit codes.

use std::process::Command;

use serde_json::Value;

use recovery::exit_codes;
use recovery::io::config::load_config;
use recovery::test_support::{Captures, full_record};

fn run(args: &[&str]) -> (Option<i32>, Value) {
    let output = Command::new(env!("CARGO_BIN_EXE_recovery"))
        .args(args)
        .output()
        .expect("run recovery");
    let report = serde_json::from_slice(&output.stdout).unwrap_or(Value::Null);
    (output.status.code(), report)
}

#[test]
fn parse_complete_output_exits_ok() {
    let captures = Captures::new().expect("captures");
    let path = captures
        .write("clean.txt", r#"{"task_id":"t1","status":"completed","summary":"ok"}"#)
        .expect("write");

    let (code, report) = run(&["parse", path.to_str().expect("path")]);
    assert_eq!(code, Some(exit_codes::OK));
    assert_eq!(report["completeness"], "complete");
    assert_eq!(report["method"], "direct_parse");
    assert_eq!(report["record"]["task_id"], "t1");
}

#[test]
fn parse_truncated_output_exits_recovered() {
    let captures = Captures::new().expect("captures");
    let path = captures
        .write("cut.txt", r#"{"task_id":"t1","status":"failed","summary":"cut he"#)
        .expect("write");

    let (code, report) = run(&["parse", path.to_str().expect("path")]);
    assert_eq!(code, Some(exit_codes::RECOVERED));
    assert_eq!(report["method"], "truncation_repair");
}

#[test]
fn process_prose_uses_task_id_and_exits_partial() {
    let captures = Captures::new().expect("captures");
    let path = captures
        .write("prose.txt", "The agent gave up without producing JSON.")
        .expect("write");

    let (code, report) = run(&["process", path.to_str().expect("path"), "--task-id", "t9"]);
    assert_eq!(code, Some(exit_codes::PARTIAL));
    assert_eq!(report["record"]["task_id"], "t9");
    assert_eq!(report["record"]["status"], "failed");
    assert_eq!(report["stage"], "globally_bounded");
    assert_eq!(report["violations"], Value::Array(Vec::new()));
}

#[test]
fn govern_applies_configured_budget_and_writes_report() {
    let captures = Captures::new().expect("captures");
    let mut record = full_record("t3");
    record.next_steps = Some((0..20).map(|i| format!("step {i}")).collect());
    let record_path = captures
        .write("record.json", serde_json::to_vec(&record).expect("json"))
        .expect("write");
    let config_path = captures
        .write("recovery.toml", "[budget]\narray_max_items = 5\n")
        .expect("write");
    let report_path = captures.path().join("out/report.json");

    let (code, _) = run(&[
        "govern",
        record_path.to_str().expect("path"),
        "--config",
        config_path.to_str().expect("path"),
        "--output",
        report_path.to_str().expect("path"),
    ]);
    assert_eq!(code, Some(exit_codes::OK));

    let report: Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).expect("report"))
            .expect("json");
    assert_eq!(report["was_modified"], true);
    assert_eq!(report["applied_ops"][0], "next_steps_sampled");
    assert_eq!(report["record"]["next_steps"].as_array().expect("steps").len(), 5);
}

#[test]
fn govern_rejects_records_outside_the_schema() {
    let captures = Captures::new().expect("captures");
    let path = captures
        .write("bad.json", r#"{"task_id":"t1","status":"done"}"#)
        .expect("write");

    let (code, _) = run(&["govern", path.to_str().expect("path")]);
    assert_eq!(code, Some(exit_codes::INVALID));
}

#[test]
fn invalid_config_exits_invalid() {
    let captures = Captures::new().expect("captures");
    let raw = captures.write("raw.txt", "{}").expect("write");
    let config = captures
        .write("recovery.toml", "[budget]\nglobal_max_chars = 1\n")
        .expect("write");

    let (code, _) = run(&[
        "parse",
        raw.to_str().expect("path"),
        "--config",
        config.to_str().expect("path"),
    ]);
    assert_eq!(code, Some(exit_codes::INVALID));
}

#[test]
fn init_config_writes_loadable_defaults_and_keeps_existing_files() {
    let captures = Captures::new().expect("captures");
    let source = captures
        .write("source.toml", "[budget]\narray_max_items = 7\n")
        .expect("write");
    let target = captures.path().join("conf/recovery.toml");
    let target_arg = target.to_str().expect("path");

    let (code, _) = run(&[
        "init-config",
        target_arg,
        "--config",
        source.to_str().expect("path"),
    ]);
    assert_eq!(code, Some(exit_codes::OK));
    assert_eq!(load_config(&target).expect("load").budget.array_max_items, 7);

    let (code, _) = run(&["init-config", target_arg]);
    assert_eq!(code, Some(exit_codes::INVALID));
    assert_eq!(load_config(&target).expect("load").budget.array_max_items, 7);

    let (code, _) = run(&["init-config", target_arg, "--force"]);
    assert_eq!(code, Some(exit_codes::OK));
    assert_eq!(load_config(&target).expect("load").budget.array_max_items, 100);
}
