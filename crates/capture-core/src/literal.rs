//! Decoding of string-quoted sensor payloads.
//!
//! Older capture exports stored payloads as the textual repr of a record,
//! e.g. `"{'celsius': 31.5}"`, `"{'reboot': True, 'flags': 129}"` or
//! `"(('dac_on', 1), ('gain', 2))"`. These are close enough to JSON that a
//! quote-aware rewrite turns them into something `serde_json` accepts.

use serde_json::Value;

use crate::error::Result;

/// Parse a pseudo-JSON payload string into a JSON value.
///
/// Plain JSON is accepted unchanged, so callers do not need to know which of
/// the two encodings a given file used.
pub fn parse_pseudo_json(src: &str) -> Result<Value> {
    let trimmed = src.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }
    Ok(serde_json::from_str(&to_json(trimmed))?)
}

/// Rewrite a pseudo-JSON literal into strict JSON text.
///
/// * single-quoted strings become double-quoted,
/// * `(` / `)` become `[` / `]`,
/// * `True`, `False` and `None` become `true`, `false` and `null`,
/// * trailing commas before a closing bracket are dropped (`(1,)`).
///
/// Characters inside string literals are never rewritten.
pub fn to_json(src: &str) -> String {
    let chars: Vec<char> = src.chars().collect();
    let mut out = String::with_capacity(src.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' => {
                i = copy_string(&chars, i, &mut out);
                continue;
            }
            '(' => out.push('['),
            ')' => out.push(']'),
            ',' if next_is_closing(&chars, i + 1) => {}
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                out.push_str(match word.as_str() {
                    "True" => "true",
                    "False" => "false",
                    "None" => "null",
                    _ => word.as_str(),
                });
                continue;
            }
            c => out.push(c),
        }
        i += 1;
    }

    out
}

/// Copy the string literal opening at `start`, re-quoted with `"`.
/// Returns the index just past the closing quote.
fn copy_string(chars: &[char], start: usize, out: &mut String) -> usize {
    let quote = chars[start];
    let mut i = start + 1;
    out.push('"');

    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && i + 1 < chars.len() {
            // \' is not a JSON escape
            if chars[i + 1] == '\'' {
                out.push('\'');
            } else {
                out.push(c);
                out.push(chars[i + 1]);
            }
            i += 2;
            continue;
        }
        if c == quote {
            out.push('"');
            return i + 1;
        }
        if c == '"' {
            out.push_str("\\\"");
        } else {
            out.push(c);
        }
        i += 1;
    }

    // Unterminated literal: leave it for serde_json to reject.
    i
}

fn next_is_closing(chars: &[char], from: usize) -> bool {
    chars[from..]
        .iter()
        .find(|c| !c.is_whitespace())
        .map(|c| matches!(c, ')' | ']' | '}'))
        .unwrap_or(false)
}
