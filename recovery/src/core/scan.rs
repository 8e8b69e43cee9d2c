//! Brace-depth scanning over free-form text.
//!
//! Quotes only start string literals once inside an object (depth > 0), so a
//! stray quote or apostrophe in surrounding prose cannot hide an object.

/// Byte ranges of every top-level `{...}` span whose braces balance.
///
/// Braces inside string literals are ignored. A span that never closes is
/// not reported.
pub fn balanced_object_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, c) in text.char_indices() {
        if depth == 0 {
            if c == '{' {
                depth = 1;
                start = idx;
                in_string = false;
                escaped = false;
            }
            continue;
        }
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    spans.push((start, idx + 1));
                }
            }
            _ => {}
        }
    }

    spans
}

/// The widest balanced top-level object; the earliest wins ties.
pub fn widest_balanced_object(text: &str) -> Option<&str> {
    let mut best: Option<(usize, usize)> = None;
    for (start, end) in balanced_object_spans(text) {
        match best {
            Some((s, e)) if e - s >= end - start => {}
            _ => best = Some((start, end)),
        }
    }
    best.map(|(start, end)| &text[start..end])
}

/// The balanced object opening at byte `start`, if `text[start..]` begins with
/// `{` and the object closes.
pub fn balanced_object_at(text: &str, start: usize) -> Option<&str> {
    let tail = text.get(start..)?;
    if !tail.starts_with('{') {
        return None;
    }
    balanced_object_spans(tail)
        .first()
        .filter(|(s, _)| *s == 0)
        .map(|&(_, end)| &tail[..end])
}

/// True when some `{` opened in `text` is never closed.
pub fn has_unclosed_object(text: &str) -> bool {
    let closed_end = balanced_object_spans(text)
        .last()
        .map(|&(_, end)| end)
        .unwrap_or(0);
    text[closed_end..].contains('{')
}
