//! Structural repair of JSON cut off mid-document.
//!
//! Repair runs in three steps: locate the most probable object start, trim
//! the tail back to a structurally safe boundary, then balance the open string
//! and containers. A string value cut mid-way is kept and closed with
//! [`RECOVERY_MARKER`]; anything else left dangling (a key, a partial literal,
//! a bare `:`) is cut back to the previous comma.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::core::normalize::normalize;
use crate::core::strategy::{RecoveryStrategy, parse_object};
use crate::core::types::{ParseAttemptResult, RecordContract, RecoveryMethod};

/// Appended to a string value that was cut by truncation.
pub const RECOVERY_MARKER: &str = " [truncated]";

static START_ANCHORS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r#"\{\s*"task_id""#).unwrap(),
        Regex::new(r#"\{\s*"status""#).unwrap(),
        Regex::new(r#"\{\s*"summary""#).unwrap(),
    ]
});
static PARTIAL_UNICODE_ESCAPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\u[0-9A-Fa-f]{0,3}$").unwrap());
static COMPLETE_LITERAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:true|false|null|-?(?:0|[1-9][0-9]*)(?:\.[0-9]+)?(?:[eE][+-]?[0-9]+)?)$")
        .unwrap()
});

/// Byte offset of the most probable JSON object start.
///
/// Anchors are tried in order (`{"task_id"`, `{"status"`, `{"summary"`), then
/// the first `{`. Best effort: field reordering defeats the anchors.
pub fn find_json_start(text: &str) -> Option<usize> {
    START_ANCHORS
        .iter()
        .find_map(|re| re.find(text).map(|m| m.start()))
        .or_else(|| text.find('{'))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Key,
    Colon,
    Value,
    CommaOrClose,
}

/// Parser state at the end of a (possibly truncated) document.
#[derive(Debug, Default)]
struct TailState {
    stack: Vec<char>,
    in_string: bool,
    string_is_key: bool,
    escaped: bool,
    expect: Option<Expect>,
    last_comma: Option<usize>,
    last_string_end: Option<usize>,
    literal_start: Option<usize>,
}

fn scan_tail(text: &str) -> TailState {
    let mut state = TailState::default();
    for (idx, c) in text.char_indices() {
        if state.in_string {
            if state.escaped {
                state.escaped = false;
            } else if c == '\\' {
                state.escaped = true;
            } else if c == '"' {
                state.in_string = false;
                state.last_string_end = Some(idx + 1);
                state.expect = Some(if state.string_is_key {
                    Expect::Colon
                } else {
                    Expect::CommaOrClose
                });
            }
            continue;
        }
        if c.is_whitespace() {
            state.literal_start = None;
            continue;
        }
        match c {
            '{' | '[' => {
                state.stack.push(c);
                state.expect = Some(if c == '{' { Expect::Key } else { Expect::Value });
                state.literal_start = None;
            }
            '}' | ']' => {
                state.stack.pop();
                state.expect = Some(Expect::CommaOrClose);
                state.literal_start = None;
            }
            ',' => {
                state.last_comma = Some(idx);
                state.expect = Some(if state.stack.last() == Some(&'{') {
                    Expect::Key
                } else {
                    Expect::Value
                });
                state.literal_start = None;
            }
            ':' => {
                state.expect = Some(Expect::Value);
                state.literal_start = None;
            }
            '"' => {
                state.in_string = true;
                state.string_is_key =
                    state.expect == Some(Expect::Key) && state.stack.last() == Some(&'{');
                state.literal_start = None;
            }
            _ => {
                if state.literal_start.is_none() {
                    state.literal_start = Some(idx);
                }
                state.expect = Some(Expect::CommaOrClose);
            }
        }
    }
    state
}

fn cut_point(text: &str, state: &TailState) -> Option<usize> {
    state
        .last_comma
        .or(state.last_string_end)
        .filter(|&idx| idx < text.len())
}

/// Trim `text` back to a safe boundary and close everything left open.
///
/// Returns `None` when no safe boundary exists.
pub fn repair(text: &str) -> Option<String> {
    let mut body = text.trim_end().to_string();
    let mut cuts = 0;

    loop {
        let state = scan_tail(&body);
        let dangling = if state.in_string {
            state.string_is_key
        } else {
            match state.expect {
                Some(Expect::Colon) => true,
                Some(Expect::Value) => state.stack.last() == Some(&'{'),
                Some(Expect::CommaOrClose) => state
                    .literal_start
                    .is_some_and(|start| !COMPLETE_LITERAL_RE.is_match(&body[start..])),
                _ => false,
            }
        };

        if dangling {
            // Each cut strictly shortens the body; bound the loop anyway.
            cuts += 1;
            if cuts > 8 {
                return None;
            }
            let cut = cut_point(&body, &state)?;
            body.truncate(cut);
            body = body.trim_end().to_string();
            continue;
        }

        if state.stack.is_empty() && !state.in_string {
            return None;
        }

        if state.in_string {
            if state.escaped {
                body.pop();
            }
            if let Some(m) = PARTIAL_UNICODE_ESCAPE_RE.find(&body) {
                body.truncate(m.start());
            }
            body.push_str(RECOVERY_MARKER);
            body.push('"');
        } else {
            while body.ends_with(',') {
                body.pop();
                body = body.trim_end().to_string();
            }
        }

        for open in state.stack.iter().rev() {
            body.push(if *open == '{' { '}' } else { ']' });
        }
        return Some(body);
    }
}

fn has_contract_field(map: &Map<String, Value>) -> bool {
    RecordContract::FIELD_NAMES
        .iter()
        .any(|name| map.contains_key(*name))
}

/// Drop everything after the last newline; `None` if no complete line remains.
fn drop_incomplete_line(text: &str) -> Option<&str> {
    let trimmed = text.trim_end_matches([' ', '\t']);
    if trimmed.ends_with('\n') {
        return Some(trimmed);
    }
    trimmed.rfind('\n').map(|idx| &trimmed[..idx])
}

/// Repairs a document that was cut off before it closed.
///
/// Always reports [`Completeness::Recovered`](crate::core::types::Completeness),
/// even when the repaired text parses cleanly.
#[derive(Debug, Clone, Copy, Default)]
pub struct TruncationRepair;

impl TruncationRepair {
    fn repair_and_parse(text: &str) -> Option<Map<String, Value>> {
        let repaired = repair(text)?;
        parse_object(&repaired).filter(has_contract_field)
    }
}

impl RecoveryStrategy for TruncationRepair {
    fn method(&self) -> RecoveryMethod {
        RecoveryMethod::TruncationRepair
    }

    fn attempt(&self, raw: &str) -> Option<ParseAttemptResult> {
        let normalized = normalize(raw);
        let standard = find_json_start(&normalized)
            .and_then(|start| Self::repair_and_parse(&normalized[start..]));
        if let Some(map) = standard {
            debug!(variant = "standard", "truncation repair succeeded");
            return Some(ParseAttemptResult::new(map, self.method()));
        }

        let start = find_json_start(raw)?;
        let complete_lines = drop_incomplete_line(&raw[start..])?;
        let map = Self::repair_and_parse(&normalize(complete_lines))?;
        debug!(variant = "aggressive", "truncation repair succeeded");
        Some(ParseAttemptResult::new(map, self.method()))
    }
}
