//! Best-effort completion of truncated JSON documents.
//!
//! Streamed tool arguments arrive as arbitrary prefixes of a JSON object
//! (`{"command": "vi`, `{"thought": "hel`). [`complete_json`] closes open
//! strings, containers and half-written literals so the prefix can be parsed
//! and inspected before the final fragment arrives.

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Key,
    Colon,
    Value,
    Comma,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    object: bool,
    expect: Expect,
}

/// Close every construct left open in `partial` and return a document that
/// parses when `partial` is a prefix of valid JSON.
///
/// Incomplete escapes are dropped, half-written `true`/`false`/`null` are
/// completed, dangling numbers lose trailing sign or exponent characters,
/// a key without a value receives `null`, and a trailing comma is removed.
#[must_use]
pub fn complete_json(partial: &str) -> String {
    let mut out = String::with_capacity(partial.len() + 8);
    let mut stack: Vec<Frame> = Vec::new();
    let mut in_string = false;
    let mut string_is_key = false;
    let mut escape_at: Option<usize> = None;
    let mut unicode_left = 0u8;
    let mut scalar_start: Option<usize> = None;

    for ch in partial.chars() {
        if in_string {
            let idx = out.len();
            out.push(ch);
            if unicode_left > 0 {
                unicode_left -= 1;
                if unicode_left == 0 {
                    escape_at = None;
                }
            } else if escape_at.is_some() {
                if ch == 'u' {
                    unicode_left = 4;
                } else {
                    escape_at = None;
                }
            } else if ch == '\\' {
                escape_at = Some(idx);
            } else if ch == '"' {
                in_string = false;
                if string_is_key {
                    set_expect(&mut stack, Expect::Colon);
                }
            }
            continue;
        }

        if scalar_start.is_some() {
            if is_scalar_char(ch) {
                out.push(ch);
                continue;
            }
            scalar_start = None;
        }

        match ch {
            '{' => {
                begin_value(&mut stack);
                stack.push(Frame {
                    object: true,
                    expect: Expect::Key,
                });
            }
            '[' => {
                begin_value(&mut stack);
                stack.push(Frame {
                    object: false,
                    expect: Expect::Value,
                });
            }
            '}' | ']' => {
                stack.pop();
            }
            ':' => set_expect(&mut stack, Expect::Value),
            ',' => {
                if let Some(top) = stack.last_mut() {
                    top.expect = if top.object {
                        Expect::Key
                    } else {
                        Expect::Value
                    };
                }
            }
            '"' => {
                string_is_key = matches!(
                    stack.last(),
                    Some(Frame {
                        object: true,
                        expect: Expect::Key
                    })
                );
                if !string_is_key {
                    begin_value(&mut stack);
                }
                in_string = true;
            }
            c if c.is_whitespace() => {}
            _ => {
                begin_value(&mut stack);
                scalar_start = Some(out.len());
            }
        }
        out.push(ch);
    }

    if in_string {
        if let Some(at) = escape_at {
            out.truncate(at);
        }
        out.push('"');
        if string_is_key {
            set_expect(&mut stack, Expect::Colon);
        }
    } else if let Some(start) = scalar_start {
        let completed = complete_scalar(&out[start..]);
        out.truncate(start);
        match completed {
            Some(literal) => out.push_str(&literal),
            None => set_expect(&mut stack, Expect::Value),
        }
    }

    while let Some(frame) = stack.pop() {
        match (frame.object, frame.expect) {
            (true, Expect::Colon) => out.push_str(":null"),
            (true, Expect::Value) => out.push_str("null"),
            (_, Expect::Key | Expect::Value) => strip_trailing_comma(&mut out),
            (_, Expect::Comma | Expect::Colon) => {}
        }
        out.push(if frame.object { '}' } else { ']' });
    }

    out
}

/// Parse a possibly truncated JSON document; `None` when even the completed
/// form is not valid JSON.
#[must_use]
pub fn parse_partial(partial: &str) -> Option<Value> {
    if partial.trim().is_empty() {
        return None;
    }
    serde_json::from_str(&complete_json(partial)).ok()
}

fn begin_value(stack: &mut [Frame]) {
    if let Some(top) = stack.last_mut() {
        top.expect = Expect::Comma;
    }
}

fn set_expect(stack: &mut [Frame], expect: Expect) {
    if let Some(top) = stack.last_mut() {
        top.expect = expect;
    }
}

fn is_scalar_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '+')
}

fn complete_scalar(scalar: &str) -> Option<String> {
    for literal in ["true", "false", "null"] {
        if literal.starts_with(scalar) {
            return Some(literal.to_owned());
        }
    }
    let trimmed = scalar.trim_end_matches(['.', 'e', 'E', '+', '-']);
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

fn strip_trailing_comma(out: &mut String) {
    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);
    if out.ends_with(',') {
        out.pop();
    }
}
