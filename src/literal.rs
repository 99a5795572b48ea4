//! Literal inference for value tokens and the matching formatter.
//!
//! A value token is tried, in order, as an integer, a float, a structured
//! literal and finally a raw string; the first stage that accepts wins.
//!
//! The structured-literal grammar is closed:
//!
//! ```text
//! literal := string | number | bool | null | list | tuple | dict
//! string  := '"' chars '"' | "'" chars "'"
//!            escapes: \\ \' \" \n \r \t \0 \xNN \uXXXX \u{X..}
//! number  := integer (i64) | float
//! bool    := true | false | True | False
//! null    := null | None
//! list    := '[' [literal (',' literal)* [',']] ']'
//! tuple   := '(' [literal (',' literal)* [',']] ')'    "(x)" is just x
//! dict    := '{' [key ':' literal (',' key ':' literal)* [',']] '}'
//! key     := string | non-negative integer (stored as list<n>)
//! ```

use crate::error::{ConfigError, ConfigResult};
use crate::key::index_key;
use crate::value::ConfigValue;

/// One stage of the inference chain.
type Stage = fn(&str) -> Option<ConfigValue>;

const STAGES: &[Stage] = &[parse_integer, parse_float, parse_structured, parse_raw];

/// Infers the value of a trimmed token.
pub fn infer(token: &str) -> ConfigResult<ConfigValue> {
    STAGES
        .iter()
        .find_map(|stage| stage(token))
        .ok_or_else(|| ConfigError::value_decode(format!("Unknown type: {token}")))
}

fn parse_integer(token: &str) -> Option<ConfigValue> {
    token.parse::<i64>().ok().map(ConfigValue::Integer)
}

/// Digit-only tokens that overflow `i64` are not floats; they stay raw text.
fn parse_float(token: &str) -> Option<ConfigValue> {
    if is_integer_shaped(token) {
        return None;
    }
    token.parse::<f64>().ok().map(ConfigValue::Float)
}

fn is_integer_shaped(token: &str) -> bool {
    let digits = token.strip_prefix(['+', '-']).unwrap_or(token);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn parse_structured(token: &str) -> Option<ConfigValue> {
    parse_literal(token).ok()
}

fn parse_raw(token: &str) -> Option<ConfigValue> {
    Some(ConfigValue::String(token.to_string()))
}

/// Parses a complete structured literal.
pub fn parse_literal(src: &str) -> ConfigResult<ConfigValue> {
    let mut parser = LiteralParser {
        src,
        pos: 0,
        depth: 0,
    };
    let value = parser.value()?;
    parser.skip_ws();
    if parser.pos != src.len() {
        return Err(parser.error("trailing characters"));
    }
    Ok(value)
}

/// Deepest container nesting accepted in a structured literal.
pub const MAX_NESTING: usize = 64;

struct LiteralParser<'s> {
    src: &'s str,
    pos: usize,
    depth: usize,
}

impl LiteralParser<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn error(&self, message: &str) -> ConfigError {
        ConfigError::value_decode(format!("{message} at offset {} in {:?}", self.pos, self.src))
    }

    fn value(&mut self) -> ConfigResult<ConfigValue> {
        self.skip_ws();
        match self.peek() {
            Some(q @ ('"' | '\'')) => {
                self.bump();
                self.string(q).map(ConfigValue::String)
            }
            Some(open @ ('[' | '(' | '{')) => {
                if self.depth == MAX_NESTING {
                    return Err(self.error("nesting too deep"));
                }
                self.bump();
                self.depth += 1;
                let value = match open {
                    '[' => self.items(']').map(ConfigValue::Array),
                    '(' => self.tuple(),
                    _ => self.dict(),
                };
                self.depth -= 1;
                value
            }
            Some(c) if c.is_ascii_digit() || matches!(c, '-' | '+' | '.') => self.number(),
            Some(c) if c.is_ascii_alphabetic() => self.word(),
            _ => Err(self.error("expected a literal")),
        }
    }

    fn items(&mut self, close: char) -> ConfigResult<Vec<ConfigValue>> {
        let mut items = Vec::new();
        loop {
            if self.eat(close) {
                return Ok(items);
            }
            items.push(self.value()?);
            if self.eat(close) {
                return Ok(items);
            }
            if !self.eat(',') {
                return Err(self.error("expected ','"));
            }
        }
    }

    fn tuple(&mut self) -> ConfigResult<ConfigValue> {
        if self.eat(')') {
            return Ok(ConfigValue::Array(Vec::new()));
        }
        let first = self.value()?;
        if self.eat(')') {
            return Ok(first);
        }
        if !self.eat(',') {
            return Err(self.error("expected ','"));
        }
        let mut items = vec![first];
        items.extend(self.items(')')?);
        Ok(ConfigValue::Array(items))
    }

    fn dict(&mut self) -> ConfigResult<ConfigValue> {
        let mut entries = Vec::new();
        loop {
            if self.eat('}') {
                return Ok(ConfigValue::Object(entries));
            }
            let key = match self.value()? {
                ConfigValue::String(s) => s,
                ConfigValue::Integer(i) if i >= 0 => index_key(i as usize),
                other => {
                    return Err(self.error(&format!(
                        "unsupported dict key of type {}",
                        other.type_name()
                    )))
                }
            };
            if !self.eat(':') {
                return Err(self.error("expected ':'"));
            }
            entries.push((key, self.value()?));
            if self.eat('}') {
                return Ok(ConfigValue::Object(entries));
            }
            if !self.eat(',') {
                return Err(self.error("expected ','"));
            }
        }
    }

    fn number(&mut self) -> ConfigResult<ConfigValue> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        {
            self.bump();
        }
        let token = &self.src[start..self.pos];
        parse_integer(token)
            .or_else(|| parse_float(token))
            .ok_or_else(|| self.error("invalid number"))
    }

    fn word(&mut self) -> ConfigResult<ConfigValue> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
            self.bump();
        }
        match &self.src[start..self.pos] {
            "true" | "True" => Ok(ConfigValue::Boolean(true)),
            "false" | "False" => Ok(ConfigValue::Boolean(false)),
            "null" | "None" => Ok(ConfigValue::Null),
            _ => Err(self.error("unknown word")),
        }
    }

    fn string(&mut self, quote: char) -> ConfigResult<String> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => out.push(self.escape()?),
                Some(c) => out.push(c),
            }
        }
    }

    fn escape(&mut self) -> ConfigResult<char> {
        match self.bump() {
            Some('\\') => Ok('\\'),
            Some('\'') => Ok('\''),
            Some('"') => Ok('"'),
            Some('n') => Ok('\n'),
            Some('r') => Ok('\r'),
            Some('t') => Ok('\t'),
            Some('0') => Ok('\0'),
            Some('x') => self.hex_char(2),
            Some('u') if self.peek() == Some('{') => {
                self.bump();
                let start = self.pos;
                while self.peek().is_some_and(|c| c != '}') {
                    self.bump();
                }
                let digits = &self.src[start..self.pos];
                if self.bump() != Some('}') {
                    return Err(self.error("unterminated unicode escape"));
                }
                u32::from_str_radix(digits, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| self.error("invalid unicode escape"))
            }
            Some('u') => self.hex_char(4),
            _ => Err(self.error("invalid escape")),
        }
    }

    fn hex_char(&mut self, len: usize) -> ConfigResult<char> {
        let start = self.pos;
        for _ in 0..len {
            if self.bump().is_none() {
                return Err(self.error("truncated escape"));
            }
        }
        u32::from_str_radix(&self.src[start..self.pos], 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.error("invalid escape"))
    }
}

/// Formats a value as the token written after `=`.
///
/// Strings are written raw unless their raw text would infer back to
/// something else, in which case they are quoted.
pub fn format_value(value: &ConfigValue) -> String {
    match value {
        ConfigValue::String(s) if needs_quoting(s) => quote(s),
        ConfigValue::String(s) => s.clone(),
        other => format_literal(other),
    }
}

/// Formats a value in the structured-literal grammar.
pub fn format_literal(value: &ConfigValue) -> String {
    match value {
        ConfigValue::String(s) => quote(s),
        ConfigValue::Integer(i) => i.to_string(),
        ConfigValue::Float(f) => format!("{f:?}"),
        ConfigValue::Boolean(b) => b.to_string(),
        ConfigValue::Null => "null".to_string(),
        ConfigValue::Callable(c) => quote(&c.path()),
        ConfigValue::Array(items) => {
            let inner: Vec<String> = items.iter().map(format_literal).collect();
            format!("[{}]", inner.join(", "))
        }
        ConfigValue::Object(entries) => {
            let inner: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{}: {}", quote(k), format_literal(v)))
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
    }
}

fn needs_quoting(s: &str) -> bool {
    s.is_empty()
        || s.trim() != s
        || s.contains(['\n', '\r'])
        || !matches!(infer(s), Ok(ConfigValue::String(ref inferred)) if inferred == s)
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c if c.is_control() => out.push_str(&format!("\\u{{{:x}}}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
