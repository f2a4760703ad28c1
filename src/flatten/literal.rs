//! Typed parsing of list-valued cells.
//!
//! A list cell is either an already-materialized JSON array or text holding a
//! literal list, e.g. `['a', 'b']` or `[{'id': 1, 'title': "x"}]`. Both
//! Python-style (`'single quotes'`, `True`, `None`, tuples) and JSON-style
//! literals are accepted. The parser only builds data; nothing is evaluated.
//!
//! What happens on malformed input is the caller's decision, expressed as a
//! [`ListPolicy`].

use crate::error::{EtlError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Number, Value};
use thiserror::Error;
use tracing::warn;

static NUMBER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?").unwrap()
});

/// Deepest bracket nesting accepted before a literal is rejected
pub const MAX_DEPTH: usize = 128;

/// What to do with a list cell that cannot be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListPolicy {
    /// Treat the cell as an empty list and keep going
    Recover,
    /// Abort the table transform
    Strict,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at offset {offset}")]
pub struct LiteralError {
    pub offset: usize,
    pub message: String,
}

/// Read a cell as a list.
///
/// Null and non-list values are errors; the caller applies its policy.
pub fn read_list(cell: &Value) -> std::result::Result<Vec<Value>, LiteralError> {
    match cell {
        Value::Array(items) => Ok(items.clone()),
        Value::String(text) => match parse_literal(text)? {
            Value::Array(items) => Ok(items),
            other => Err(LiteralError {
                offset: 0,
                message: format!("expected a list, found {}", kind(&other)),
            }),
        },
        other => Err(LiteralError {
            offset: 0,
            message: format!("expected a list, found {}", kind(other)),
        }),
    }
}

/// Read a list cell of `field` at `row` under `policy`
pub(crate) fn list_cell(
    cell: &Value,
    policy: ListPolicy,
    field: &str,
    row: usize,
) -> Result<Vec<Value>> {
    match read_list(cell) {
        Ok(items) => Ok(items),
        Err(err) => match policy {
            ListPolicy::Recover => {
                warn!(field, row, error = %err, "malformed list treated as empty");
                Ok(Vec::new())
            }
            ListPolicy::Strict => Err(EtlError::MalformedList {
                field: field.to_string(),
                row,
                reason: err.to_string(),
            }),
        },
    }
}

/// Parse a literal data structure from text
pub fn parse_literal(text: &str) -> std::result::Result<Value, LiteralError> {
    let mut parser = Parser {
        src: text,
        pos: 0,
        depth: 0,
    };
    let value = parser.value()?;
    parser.skip_ws();
    if parser.pos < text.len() {
        return Err(parser.error("trailing characters"));
    }
    Ok(value)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, message: impl Into<String>) -> LiteralError {
        LiteralError {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn expect(&mut self, want: char) -> std::result::Result<(), LiteralError> {
        self.skip_ws();
        match self.bump() {
            Some(c) if c == want => Ok(()),
            Some(c) => Err(self.error(format!("expected `{}`, found `{}`", want, c))),
            None => Err(self.error(format!("expected `{}`, found end of input", want))),
        }
    }

    fn value(&mut self) -> std::result::Result<Value, LiteralError> {
        self.skip_ws();
        match self.peek() {
            None => Err(self.error("unexpected end of input")),
            Some('[') => self.nested(|p| Ok(Value::Array(p.sequence(']')?.0))),
            Some('(') => self.nested(|p| {
                let (mut items, trailing_comma) = p.sequence(')')?;
                // `(x)` is grouping, `(x,)` is a one-element tuple
                if items.len() == 1 && !trailing_comma {
                    Ok(items.remove(0))
                } else {
                    Ok(Value::Array(items))
                }
            }),
            Some('{') => self.nested(Self::mapping),
            Some(q @ ('\'' | '"')) => {
                self.bump();
                Ok(Value::String(self.string(q)?))
            }
            Some(c) if c.is_ascii_digit() || matches!(c, '-' | '+' | '.') => self.number(),
            Some(c) if c.is_alphabetic() => self.keyword(),
            Some(c) => Err(self.error(format!("unexpected character `{}`", c))),
        }
    }

    /// Consume an opening bracket and parse its contents one level deeper
    fn nested(
        &mut self,
        inner: impl FnOnce(&mut Self) -> std::result::Result<Value, LiteralError>,
    ) -> std::result::Result<Value, LiteralError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error(format!("nesting deeper than {}", MAX_DEPTH)));
        }
        self.bump();
        self.depth += 1;
        let value = inner(self);
        self.depth -= 1;
        value
    }

    /// Comma-separated values up to `close`; reports whether a trailing comma was seen
    fn sequence(&mut self, close: char) -> std::result::Result<(Vec<Value>, bool), LiteralError> {
        let mut items = Vec::new();
        let mut trailing_comma = false;
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.bump();
                return Ok((items, trailing_comma));
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => trailing_comma = true,
                Some(c) if c == close => return Ok((items, false)),
                Some(c) => return Err(self.error(format!("expected `,` or `{}`, found `{}`", close, c))),
                None => return Err(self.error(format!("unclosed `{}`", close))),
            }
        }
    }

    fn mapping(&mut self) -> std::result::Result<Value, LiteralError> {
        let mut map = Map::new();
        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.bump();
                return Ok(Value::Object(map));
            }

            let key = match self.value()? {
                Value::String(s) => s,
                key @ (Value::Number(_) | Value::Bool(_)) => key.to_string(),
                Value::Null => String::from("None"),
                other => return Err(self.error(format!("{} cannot be a mapping key", kind(&other)))),
            };
            self.expect(':')?;
            let value = self.value()?;
            map.insert(key, value);

            self.skip_ws();
            match self.bump() {
                Some(',') => {}
                Some('}') => return Ok(Value::Object(map)),
                Some(c) => return Err(self.error(format!("expected `,` or `}}`, found `{}`", c))),
                None => return Err(self.error("unclosed `{`")),
            }
        }
    }

    fn string(&mut self, quote: char) -> std::result::Result<String, LiteralError> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => match self.bump() {
                    None => return Err(self.error("unterminated escape")),
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('0') => out.push('\0'),
                    Some('/') => out.push('/'),
                    Some(c @ ('\\' | '\'' | '"')) => out.push(c),
                    Some('x') => out.push(self.code_point(2)?),
                    Some('u') => out.push(self.code_point(4)?),
                    Some(c) => {
                        out.push('\\');
                        out.push(c);
                    }
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn code_point(&mut self, digits: usize) -> std::result::Result<char, LiteralError> {
        let hex = self
            .rest()
            .get(..digits)
            .ok_or_else(|| self.error("truncated escape"))?;
        let code = u32::from_str_radix(hex, 16).map_err(|_| self.error("invalid escape"))?;
        self.pos += digits;
        char::from_u32(code).ok_or_else(|| self.error("invalid code point"))
    }

    fn number(&mut self) -> std::result::Result<Value, LiteralError> {
        let text = NUMBER_REGEX
            .find(self.rest())
            .map(|m| m.as_str())
            .ok_or_else(|| self.error("invalid number"))?;

        let is_float = text.contains(['.', 'e', 'E']);
        let number = if is_float {
            text.parse::<f64>().ok().and_then(Number::from_f64)
        } else if let Ok(i) = text.parse::<i64>() {
            Some(Number::from(i))
        } else if let Ok(u) = text.trim_start_matches('+').parse::<u64>() {
            Some(Number::from(u))
        } else {
            text.parse::<f64>().ok().and_then(Number::from_f64)
        };

        let number = number.ok_or_else(|| self.error(format!("invalid number `{}`", text)))?;
        self.pos += text.len();
        Ok(Value::Number(number))
    }

    fn keyword(&mut self) -> std::result::Result<Value, LiteralError> {
        let word: String = self.rest().chars().take_while(|c| c.is_alphanumeric() || *c == '_').collect();
        let value = match word.as_str() {
            "True" | "true" => Value::Bool(true),
            "False" | "false" => Value::Bool(false),
            "None" | "null" => Value::Null,
            _ => return Err(self.error(format!("unknown name `{}`", word))),
        };
        self.pos += word.len();
        Ok(value)
    }
}
