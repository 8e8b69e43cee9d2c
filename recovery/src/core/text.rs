//! Character-safe string helpers.
//!
//! Every size ceiling in this crate counts `char`s, never bytes, so truncation
//! can never split a UTF-8 sequence.

/// Number of characters in `s`.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Prefix of `s` holding at most `max_chars` characters.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Truncate to `max_chars` and append `marker` when anything was cut.
///
/// The marker is only appended when the text actually exceeded the limit.
pub fn truncate_with_marker(s: &str, max_chars: usize, marker: &str) -> String {
    if char_len(s) <= max_chars {
        return s.to_string();
    }
    let mut out = truncate_chars(s, max_chars).to_string();
    out.push_str(marker);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn marker_only_added_when_cut() {
        assert_eq!(truncate_with_marker("abc", 3, "…"), "abc");
        assert_eq!(truncate_with_marker("abcd", 3, " [cut]"), "abc [cut]");
    }
}
