//! Tolerant decoding of planner output.
//!
//! Models wrap JSON in code fences, prepend reasoning blocks, and get cut off
//! mid-object. [`parse_action_payload`] tries a strict parse first and falls
//! back to [`repair_json`], a pure structural repair over the raw text.

use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("response contains no JSON object")]
    NoJson,

    #[error("response is not a JSON object: {0}")]
    NotAnObject(String),

    #[error("unrepairable JSON: {0}")]
    Unrepairable(String),
}

/// Remove `<think>` / `<thinking>` blocks. An unterminated block swallows
/// the rest of the text.
pub fn strip_think_tags(input: &str) -> String {
    let mut output = input.to_string();
    for (start, end) in [("<think>", "</think>"), ("<thinking>", "</thinking>")] {
        while let Some(start_idx) = output.find(start) {
            let Some(relative_end) = output[start_idx + start.len()..].find(end) else {
                output.truncate(start_idx);
                break;
            };
            let end_idx = start_idx + start.len() + relative_end + end.len();
            output.replace_range(start_idx..end_idx, "");
        }
    }
    output
}

/// Strip a surrounding markdown code fence, including a truncated one with
/// no closing line.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (```json)
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

// ── Structural repair ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Key,
    Colon,
    Value,
    Comma,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    close: char,
    slot: Slot,
}

impl Frame {
    fn open(c: char) -> Self {
        if c == '{' {
            Frame { close: '}', slot: Slot::Key }
        } else {
            Frame { close: ']', slot: Slot::Value }
        }
    }

    /// Slot expected right after a comma.
    fn after_comma(&self) -> Slot {
        if self.close == '}' {
            Slot::Key
        } else {
            Slot::Value
        }
    }
}

struct Repairer {
    out: String,
    stack: Vec<Frame>,
    /// `out` length and stack at the last point where closing every open
    /// frame yields valid JSON.
    safe_len: usize,
    safe_stack: Vec<Frame>,
    in_string: bool,
    string_is_key: bool,
    escape: bool,
    token: String,
}

const LITERALS: [&str; 3] = ["true", "false", "null"];

impl Repairer {
    fn new() -> Self {
        Self {
            out: String::new(),
            stack: Vec::new(),
            safe_len: 0,
            safe_stack: Vec::new(),
            in_string: false,
            string_is_key: false,
            escape: false,
            token: String::new(),
        }
    }

    fn mark_safe(&mut self) {
        self.safe_len = self.out.len();
        self.safe_stack.clone_from(&self.stack);
    }

    fn value_done(&mut self) {
        if let Some(top) = self.stack.last_mut() {
            top.slot = Slot::Comma;
        }
        self.mark_safe();
    }

    fn expecting_value(&self) -> bool {
        self.stack.last().is_some_and(|f| f.slot == Slot::Value)
    }

    /// Flush a pending bare token (number or literal). `partial` allows
    /// completing a literal prefix or trimming a dangling number suffix.
    fn flush_token(&mut self, partial: bool) -> Result<(), ParseError> {
        if self.token.is_empty() {
            return Ok(());
        }
        let token = std::mem::take(&mut self.token);
        let fixed = if is_number(&token) || LITERALS.contains(&token.as_str()) {
            Some(token.clone())
        } else if partial {
            LITERALS
                .iter()
                .find(|lit| lit.starts_with(token.as_str()))
                .map(|lit| lit.to_string())
                .or_else(|| {
                    let trimmed = token.trim_end_matches(['.', 'e', 'E', '+', '-']);
                    is_number(trimmed).then(|| trimmed.to_string())
                })
        } else {
            None
        };

        match fixed {
            Some(value) => {
                self.out.push_str(&value);
                self.value_done();
                Ok(())
            }
            None if partial => Ok(()),
            None => Err(ParseError::Unrepairable(format!("bare token `{token}`"))),
        }
    }

    fn feed(&mut self, c: char) -> Result<bool, ParseError> {
        if self.in_string {
            self.feed_string(c);
            return Ok(false);
        }

        if is_token_char(c) {
            if !self.expecting_value() {
                return Err(ParseError::Unrepairable(format!("unexpected `{c}`")));
            }
            self.token.push(c);
            return Ok(false);
        }
        self.flush_token(false)?;

        match c {
            c if c.is_whitespace() => {}
            '{' | '[' => {
                if !self.expecting_value() {
                    return Err(ParseError::Unrepairable(format!("unexpected `{c}`")));
                }
                self.stack.push(Frame::open(c));
                self.out.push(c);
                self.mark_safe();
            }
            '}' | ']' => return self.close(c),
            ':' => match self.stack.last_mut() {
                Some(top) if top.slot == Slot::Colon => {
                    top.slot = Slot::Value;
                    self.out.push(':');
                }
                _ => return Err(ParseError::Unrepairable("unexpected `:`".into())),
            },
            ',' => match self.stack.last_mut() {
                Some(top) if top.slot == Slot::Comma => {
                    top.slot = top.after_comma();
                    self.out.push(',');
                }
                // Doubled commas
                Some(top) if top.slot == top.after_comma() && self.out.ends_with(',') => {}
                _ => return Err(ParseError::Unrepairable("unexpected `,`".into())),
            },
            '"' => {
                let slot = self.stack.last().map(|f| f.slot);
                if !matches!(slot, Some(Slot::Key | Slot::Value)) {
                    return Err(ParseError::Unrepairable("unexpected string".into()));
                }
                self.string_is_key = slot == Some(Slot::Key);
                self.in_string = true;
                self.out.push('"');
            }
            other => {
                return Err(ParseError::Unrepairable(format!("unexpected `{other}`")));
            }
        }
        Ok(false)
    }

    fn feed_string(&mut self, c: char) {
        if self.escape {
            self.escape = false;
            self.out.push(c);
            return;
        }
        match c {
            '\\' => {
                self.escape = true;
                self.out.push(c);
            }
            '"' => {
                self.in_string = false;
                self.out.push('"');
                if self.string_is_key {
                    if let Some(top) = self.stack.last_mut() {
                        top.slot = Slot::Colon;
                    }
                } else {
                    self.value_done();
                }
            }
            // Raw control characters are invalid inside JSON strings
            '\n' => self.out.push_str("\\n"),
            '\r' => self.out.push_str("\\r"),
            '\t' => self.out.push_str("\\t"),
            c => self.out.push(c),
        }
    }

    /// Returns `true` when the root container closed.
    fn close(&mut self, c: char) -> Result<bool, ParseError> {
        let Some(top) = self.stack.last().copied() else {
            return Err(ParseError::Unrepairable(format!("unexpected `{c}`")));
        };
        if top.close != c {
            return Err(ParseError::Unrepairable(format!(
                "expected `{}`, found `{c}`",
                top.close
            )));
        }
        match top.slot {
            Slot::Comma => {}
            // `{"a":}` reads as a null value
            Slot::Value if top.close == '}' => self.out.push_str("null"),
            Slot::Colon => {
                return Err(ParseError::Unrepairable("object key without value".into()));
            }
            // Empty container or trailing comma
            Slot::Key | Slot::Value => {
                if self.out.ends_with(',') {
                    self.out.pop();
                }
            }
        }
        self.stack.pop();
        self.out.push(c);
        self.value_done();
        Ok(self.stack.is_empty())
    }

    fn finish_truncated(mut self) -> Result<String, ParseError> {
        if self.in_string {
            if self.string_is_key {
                self.rollback();
            } else {
                if self.escape {
                    self.out.pop();
                }
                self.out.push('"');
                self.value_done();
            }
        } else {
            self.flush_token(true)?;
        }

        if self.stack.last().is_some_and(|f| f.slot != Slot::Comma) {
            // Dangling key, colon, or comma
            let opened_empty = self.out.ends_with(['{', '[']);
            if !opened_empty {
                self.rollback();
            }
        }

        while let Some(frame) = self.stack.pop() {
            self.out.push(frame.close);
        }
        Ok(self.out)
    }

    fn rollback(&mut self) {
        self.out.truncate(self.safe_len);
        self.stack.clone_from(&self.safe_stack);
    }
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '.')
}

fn is_number(s: &str) -> bool {
    s.starts_with(|c: char| c == '-' || c.is_ascii_digit())
        && s.chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'))
        && !s.ends_with('.')
        && s.parse::<f64>().is_ok()
}

/// Best-effort repair of malformed or truncated JSON.
///
/// Leading prose before the first `{` or `[` and anything after the root
/// closes are dropped. Trailing commas are removed, raw newlines inside
/// strings are escaped, and a truncated document is closed at the last
/// complete value (an open string value is kept and terminated).
pub fn repair_json(input: &str) -> Result<String, ParseError> {
    let start = input.find(['{', '[']).ok_or(ParseError::NoJson)?;
    let mut repairer = Repairer::new();

    let mut chars = input[start..].chars();
    let Some(open) = chars.next() else {
        return Err(ParseError::NoJson);
    };
    repairer.stack.push(Frame::open(open));
    repairer.out.push(open);
    repairer.mark_safe();

    for c in chars {
        if repairer.feed(c)? {
            return Ok(repairer.out);
        }
    }
    repairer.finish_truncated()
}

/// Decode planner text into a flat action object.
///
/// A nested `parameters` object is merged into the top level, with outer
/// fields taking precedence.
pub fn parse_action_payload(raw: &str) -> Result<Value, ParseError> {
    let without_think = strip_think_tags(raw);
    let text = strip_code_fence(&without_think);

    let value = match serde_json::from_str::<Value>(text) {
        Ok(value) => value,
        // Single quotes, bare keys, comments.
        Err(_) => match json5::from_str::<Value>(text) {
            Ok(value) => value,
            Err(_) => {
                let repaired = repair_json(text)?;
                serde_json::from_str(&repaired)
                    .map_err(|e| ParseError::Unrepairable(format!("{e} in `{repaired}`")))?
            }
        },
    };

    match value {
        Value::Object(map) => Ok(Value::Object(flatten_parameters(map))),
        other => Err(ParseError::NotAnObject(truncate_for_log(&other.to_string()))),
    }
}

fn flatten_parameters(mut map: Map<String, Value>) -> Map<String, Value> {
    let Some(Value::Object(params)) = map.remove("parameters") else {
        return map;
    };
    for (key, value) in params {
        map.entry(key).or_insert(value);
    }
    map
}

fn truncate_for_log(s: &str) -> String {
    match s.char_indices().nth(80) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}
