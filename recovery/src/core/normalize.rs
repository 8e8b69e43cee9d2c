//! Syntactic clean-up of model output before a JSON parse attempt.
//!
//! [`normalize`] is total and never inspects meaning. It applies, in order:
//! - removal of control and invisible characters ([`strip_invisible`])
//! - single-quoted literals rewritten to double quotes where unambiguous
//! - a structural pass outside string literals: trailing commas before `}`/`]`
//!   removed, bare object keys quoted, whitespace runs collapsed
//! - inside string literals: raw newlines/tabs escaped and interior quotes that
//!   cannot close the literal escaped

/// Normalize raw model text into something `serde_json` is more likely to accept.
pub fn normalize(raw: &str) -> String {
    let cleaned = strip_invisible(raw);
    let requoted = requote_single_quoted(&cleaned);
    repair_structure(&requoted)
}

/// Drop C0/C1 controls (keeping `\n`, `\r`, `\t`), byte-order marks and
/// zero-width characters; map non-breaking spaces to plain spaces.
pub fn strip_invisible(raw: &str) -> String {
    raw.chars()
        .filter_map(|c| match c {
            '\u{FEFF}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' => None,
            '\u{00A0}' | '\u{2007}' | '\u{202F}' => Some(' '),
            '\n' | '\r' | '\t' => Some(c),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect()
}

/// Rewrite `'...'` literals that sit in a value or key position.
///
/// A single quote only opens a literal when the previous significant character
/// is `{`, `[`, `,` or `:`, the literal closes on the same line, and the next
/// significant character after it is a JSON delimiter. Apostrophes in prose
/// never satisfy all three.
fn requote_single_quoted(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_double = false;
    let mut escaped = false;
    let mut last_sig: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_double {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_double = false;
                last_sig = Some('"');
            }
            i += 1;
            continue;
        }

        match c {
            '"' => {
                in_double = true;
                out.push(c);
            }
            '\'' if matches!(last_sig, Some('{' | '[' | ',' | ':')) => {
                if let Some(end) = single_quote_end(&chars, i + 1)
                    .filter(|&end| closes_literal(&chars, end + 1))
                {
                    out.push('"');
                    push_requoted(&mut out, &chars[i + 1..end]);
                    out.push('"');
                    last_sig = Some('"');
                    i = end + 1;
                    continue;
                }
                out.push(c);
                last_sig = Some(c);
            }
            c if c.is_whitespace() => out.push(c),
            c => {
                out.push(c);
                last_sig = Some(c);
            }
        }
        i += 1;
    }

    out
}

/// Index of the quote closing a single-quoted literal opened before `from`.
fn single_quote_end(chars: &[char], from: usize) -> Option<usize> {
    let mut escaped = false;
    for (offset, &c) in chars[from..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '\n' => return None,
            '\'' => return Some(from + offset),
            _ => {}
        }
    }
    None
}

fn push_requoted(out: &mut String, inner: &[char]) {
    let mut i = 0;
    while i < inner.len() {
        match inner[i] {
            '\\' if inner.get(i + 1) == Some(&'\'') => {
                out.push('\'');
                i += 2;
                continue;
            }
            '\\' => {
                out.push('\\');
                if let Some(&next) = inner.get(i + 1) {
                    out.push(next);
                }
                i += 2;
                continue;
            }
            '"' => out.push_str("\\\""),
            c => out.push(c),
        }
        i += 1;
    }
}

/// True when the next significant character (from `from`) can follow a closed
/// string literal: a JSON delimiter or end of text.
fn closes_literal(chars: &[char], from: usize) -> bool {
    matches!(
        next_significant(chars, from),
        None | Some(',' | '}' | ']' | ':')
    )
}

fn next_significant(chars: &[char], from: usize) -> Option<char> {
    chars
        .get(from..)?
        .iter()
        .copied()
        .find(|c| !c.is_whitespace())
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '-')
}

fn repair_structure(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut last_sig: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            if escaped {
                out.push(c);
                escaped = false;
            } else {
                match c {
                    '\\' => {
                        out.push(c);
                        escaped = true;
                    }
                    '"' if closes_literal(&chars, i + 1) => {
                        out.push('"');
                        in_string = false;
                        last_sig = Some('"');
                    }
                    '"' => out.push_str("\\\""),
                    '\n' => out.push_str("\\n"),
                    '\r' => out.push_str("\\r"),
                    '\t' => out.push_str("\\t"),
                    c => out.push(c),
                }
            }
            i += 1;
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' if matches!(next_significant(&chars, i + 1), Some('}' | ']')) => {}
            c if c.is_whitespace() => {
                while i + 1 < chars.len() && chars[i + 1].is_whitespace() {
                    i += 1;
                }
                if !out.is_empty() && i + 1 < chars.len() {
                    out.push(' ');
                }
            }
            c if is_ident_start(c) && matches!(last_sig, Some('{' | ',')) => {
                let start = i;
                let mut end = i + 1;
                while end < chars.len() && is_ident_continue(chars[end]) {
                    end += 1;
                }
                let ident: String = chars[start..end].iter().collect();
                if next_significant(&chars, end) == Some(':') {
                    out.push('"');
                    out.push_str(&ident);
                    out.push('"');
                    last_sig = Some('"');
                } else {
                    out.push_str(&ident);
                    last_sig = chars.get(end - 1).copied();
                }
                i = end;
                continue;
            }
            c => {
                out.push(c);
                last_sig = Some(c);
            }
        }
        i += 1;
    }

    out
}
