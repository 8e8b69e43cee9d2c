//! Totality and governance properties over hand-built input families.

use serde_json::{Value, json};

use recovery::core::budget::SizeBudget;
use recovery::core::cascade::RecoveryParser;
use recovery::core::governor::SizeGovernor;
use recovery::core::invariants::{validate_governed, validate_record};
use recovery::core::text::char_len;
use recovery::core::tree_bound::is_omitted_marker;
use recovery::core::types::{Completeness, RecordContract, TaskStatus};
use recovery::test_support::{full_record, governor, record};

fn budgets() -> Vec<SizeBudget> {
    vec![
        SizeBudget::default(),
        SizeBudget {
            summary_max_chars: 300,
            detailed_results_max_chars: 2_000,
            array_max_items: 5,
            string_leaf_max_chars: 200,
            global_max_chars: 4_000,
            emergency_summary_chars: 200,
            emergency_details_chars: 800,
        },
    ]
}

fn records() -> Vec<RecordContract> {
    let mut oversized_everything = full_record("t-big");
    oversized_everything.summary = "Sentence one. ".repeat(400);
    oversized_everything.detailed_results_json = Some(
        json!({
            "main_results": (0..400).map(|i| format!("result {i}")).collect::<Vec<_>>(),
            "raw_log": "log line\n".repeat(5_000),
            "key_findings": {"nested": ["x".repeat(8_000)]},
        })
        .to_string(),
    );
    oversized_everything.next_steps = Some((0..250).map(|i| format!("step {i}")).collect());
    oversized_everything.resources_consumed_json =
        Some(json!((0..300).map(|i| json!({"call": i})).collect::<Vec<_>>()).to_string());

    let mut invalid_details = record("t-invalid", "ok");
    invalid_details.detailed_results_json = Some("{not: json, ".repeat(5_000));

    let mut huge_role = record("t-role", "ok");
    huge_role.suggested_handoff_target_role = Some("architect ".repeat(8_000));

    let mut quoted_content = record("t-quotes", "ok");
    quoted_content.detailed_results_json = Some("\"\\".repeat(20_000));

    let mut tiny_resources = record("t", "s");
    tiny_resources.resources_consumed_json = Some(json!(vec![0; 101]).to_string());

    let mut tiny_steps = record("t-steps", "ok");
    tiny_steps.next_steps = Some(vec!["ab".to_string(); 101]);

    vec![
        record("t-small", "ok"),
        full_record("t-full"),
        oversized_everything,
        invalid_details,
        huge_role,
        quoted_content,
        tiny_resources,
        tiny_steps,
    ]
}

/// Upper bound on what the omission markers left in `governed` can add.
///
/// Each marker replaces at least one item; the bound covers the marker text
/// escaped inside an encoded JSON field.
fn marker_allowance(governed: &RecordContract) -> usize {
    let steps: Vec<String> = governed.next_steps.clone().unwrap_or_default();
    let resources: Vec<String> = governed
        .resources_consumed_json
        .as_deref()
        .and_then(|text| serde_json::from_str::<Vec<Value>>(text).ok())
        .unwrap_or_default()
        .iter()
        .filter_map(|item| item.as_str().map(str::to_string))
        .collect();
    steps
        .iter()
        .chain(&resources)
        .filter(|item| is_omitted_marker(item))
        .map(|marker| char_len(marker) + 4)
        .sum()
}

fn raw_inputs() -> Vec<String> {
    vec![
        String::new(),
        " \n\t ".to_string(),
        "{".to_string(),
        "}".to_string(),
        "```json\n```".to_string(),
        r#"{"task_id": "#.to_string(),
        r#"{"summary": "unterminated \u12"#.to_string(),
        "\u{feff}{\u{200b}'task_id': 'quoted', status: 'failed',}".to_string(),
        "{{{{[[[[".repeat(500),
        "x".repeat(200_000),
        format!("{{\"summary\": \"{}\"", "y".repeat(80_000)),
        String::from_utf8_lossy(&[0xff, 0xfe, b'{', 0x80, b'"']).into_owned(),
    ]
}

#[test]
fn parsing_is_total() {
    let parser = RecoveryParser::default();
    for raw in raw_inputs() {
        let outcome = parser.parse(&raw, None);
        assert!(
            validate_record(&outcome.record).is_empty(),
            "input {:?}",
            raw.chars().take(40).collect::<String>()
        );
    }
}

#[test]
fn governance_is_idempotent() {
    for budget in budgets() {
        let gov = governor(budget);
        for input in records() {
            let once = gov.govern(&input);
            let twice = gov.govern(&once.record);
            assert_eq!(twice.record, once.record, "{}", input.task_id);
            assert!(!twice.was_modified, "{}: {:?}", input.task_id, twice.applied_ops);
        }
    }
}

#[test]
fn governance_never_grows_a_record() {
    for budget in budgets() {
        let gov = governor(budget);
        for input in records() {
            let governed = gov.govern(&input);
            let allowance = marker_allowance(&governed.record);
            assert!(
                governed.record.serialized_len() <= input.serialized_len() + allowance,
                "{}",
                input.task_id
            );
            if allowance == 0 {
                assert!(governed.record.serialized_len() <= input.serialized_len());
            }
        }
    }
}

#[test]
fn governed_records_satisfy_every_ceiling() {
    for budget in budgets() {
        let gov = governor(budget);
        for input in records() {
            let governed = gov.govern(&input);
            let violations = validate_governed(&governed.record, &budget);
            assert!(violations.is_empty(), "{}: {violations:?}", input.task_id);
            assert!(governed.record.serialized_len() <= budget.global_max_chars);
        }
    }
}

#[test]
fn valid_records_round_trip() {
    let parser = RecoveryParser::default();
    let mut handoff = full_record("t-handoff");
    handoff.status = TaskStatus::RequiresHandoff;
    let mut blank_role = full_record("t-blank-role");
    blank_role.suggested_handoff_target_role = Some(String::new());
    let mut spaces_role = full_record("t-spaces-role");
    spaces_role.suggested_handoff_target_role = Some("   ".to_string());
    for input in [
        record("t-min", "done"),
        full_record("t-full"),
        handoff,
        blank_role,
        spaces_role,
    ] {
        let raw = serde_json::to_string(&input).expect("serialize");
        let outcome = parser.parse(&raw, None);
        assert_eq!(outcome.completeness, Completeness::Complete);
        assert_eq!(outcome.record, input);
    }
}

/// Every cut past the summary keeps identity and a non-empty summary.
#[test]
fn truncated_prefixes_are_repaired() {
    let parser = RecoveryParser::default();
    let mut input = full_record("t-prefix");
    input.summary = "Refactored the parser.".to_string();
    let raw = serde_json::to_string(&input).expect("serialize");
    let summary_end = raw
        .find(r#""summary":"Refactored the parser.""#)
        .expect("summary")
        + r#""summary":"Refactored the parser.""#.len();

    for cut in raw.len() / 2..raw.len() {
        let prefix = &raw[..cut];
        let outcome = parser.parse(prefix, None);
        assert_ne!(outcome.completeness, Completeness::Complete, "cut at {cut}");
        if cut >= summary_end {
            assert_eq!(outcome.record.task_id, "t-prefix", "cut at {cut}");
            assert!(!outcome.record.summary.trim().is_empty(), "cut at {cut}");
        }
    }
}

#[test]
fn array_sampling_counts_add_up() {
    let budget = SizeBudget::default();
    let cap = budget.array_max_items;
    let gov: SizeGovernor = governor(budget);

    for n in [cap + 1, cap + 7, 3 * cap] {
        let mut input = record("t-arrays", "ok");
        input.next_steps = Some((0..n).map(|i| format!("next step number {i:04}")).collect());
        input.resources_consumed_json = Some(
            json!((0..n).map(|i| format!("resource entry {i:04}")).collect::<Vec<_>>())
                .to_string(),
        );
        let governed = gov.govern(&input);

        let steps = governed.record.next_steps.expect("steps");
        assert_eq!(steps.len(), cap);
        assert_eq!(steps[cap - 2], format!("next step number {:04}", cap - 2));
        assert_eq!(
            steps[cap - 1],
            format!("[{} additional items omitted]", n - (cap - 1))
        );

        let resources: Vec<Value> = serde_json::from_str(
            governed
                .record
                .resources_consumed_json
                .as_deref()
                .expect("resources"),
        )
        .expect("json");
        let half = cap / 2;
        assert_eq!(resources.len(), 2 * half + 1);
        assert_eq!(
            resources[half],
            format!("[{} additional items omitted]", n - 2 * half)
        );
        assert_eq!(
            resources[2 * half],
            format!("resource entry {:04}", n - 1)
        );
        assert!(char_len(&governed.record.summary) > 0);
    }
}
