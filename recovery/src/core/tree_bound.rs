//! Side-effect-free rewriting of JSON value trees.
//!
//! [`rewrite`] walks a borrowed tree bottom-up and builds a new one, asking a
//! [`Rewrite`] implementation what to do with each string leaf and each list.
//! The input is never mutated.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::core::text::{char_len, truncate_chars};

/// Appended to string leaves cut by [`TreeBound`].
pub const LEAF_MARKER: &str = "... [truncated]";

static OMITTED_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[\d+ additional items omitted\]$").unwrap());

/// Marker item standing in for `omitted` dropped list entries.
pub fn omitted_marker(omitted: usize) -> String {
    format!("[{omitted} additional items omitted]")
}

/// True for marker items produced by [`omitted_marker`].
pub fn is_omitted_marker(item: &str) -> bool {
    OMITTED_MARKER_RE.is_match(item)
}

/// Number of list entries that are not omission markers.
pub fn original_item_count(items: &[Value]) -> usize {
    items
        .iter()
        .filter(|item| !item.as_str().is_some_and(is_omitted_marker))
        .count()
}

/// Per-node decisions for [`rewrite`].
pub trait Rewrite {
    fn string_leaf(&self, text: &str) -> Value;

    /// Called with children already rewritten.
    fn list(&self, items: Vec<Value>) -> Vec<Value>;
}

/// Rebuild `value`, applying `rules` to every string leaf and list.
pub fn rewrite<R: Rewrite>(value: &Value, rules: &R) -> Value {
    match value {
        Value::String(text) => rules.string_leaf(text),
        Value::Array(items) => {
            let items = items.iter().map(|item| rewrite(item, rules)).collect();
            Value::Array(rules.list(items))
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, child)| (key.clone(), rewrite(child, rules)))
                .collect::<Map<String, Value>>(),
        ),
        other => other.clone(),
    }
}

/// Caps list lengths and string leaf lengths throughout a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeBound {
    pub max_items: usize,
    pub max_leaf_chars: usize,
}

impl Rewrite for TreeBound {
    /// Leaves end within `max_leaf_chars`, marker included.
    fn string_leaf(&self, text: &str) -> Value {
        if char_len(text) <= self.max_leaf_chars {
            return Value::String(text.to_string());
        }
        let keep = self.max_leaf_chars.saturating_sub(char_len(LEAF_MARKER));
        Value::String(format!("{}{LEAF_MARKER}", truncate_chars(text, keep)))
    }

    /// Keeps the first `max_items` entries and one marker for the rest.
    /// Existing markers do not count toward the cap.
    fn list(&self, mut items: Vec<Value>) -> Vec<Value> {
        if original_item_count(&items) <= self.max_items {
            return items;
        }
        let omitted = items.len() - self.max_items;
        items.truncate(self.max_items);
        items.push(Value::String(omitted_marker(omitted)));
        items
    }
}
