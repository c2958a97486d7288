//! Parser for PHP associative-array config files.
//!
//! Handles the format ownCloud (and `var_export`) writes:
//! ```text
//! <?php
//! $CONFIG = array (
//!   'instanceid' => 'oc8f3c2a1b9d',
//!   'trusted_domains' =>
//!   array (
//!     0 => 'localhost',
//!   ),
//!   'installed' => true,
//! );
//! ```
//! Short array syntax (`[ ... ]`), double-quoted strings and `//`, `#` and
//! `/* */` comments are accepted. Anything else is a parse error; nothing
//! is silently dropped.

use crate::error::{Error, Result};
use crate::value::Value;

/// Result of parsing: variable name and top-level entries in order
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    pub variable: Option<String>,
    pub entries: Vec<(String, Value)>,
}

/// Parse config file content.
pub fn parse_string(content: &str) -> Result<Parsed> {
    let tokens = tokenize(content)?;
    Parser { tokens, pos: 0 }.document()
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    OpenTag,
    CloseTag,
    Variable(String),
    Assign,
    Array,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Arrow,
    Comma,
    Semicolon,
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl Tok {
    fn describe(&self) -> String {
        match self {
            Self::OpenTag => "'<?php'".into(),
            Self::CloseTag => "'?>'".into(),
            Self::Variable(name) => format!("${name}"),
            Self::Assign => "'='".into(),
            Self::Array => "'array'".into(),
            Self::LParen => "'('".into(),
            Self::RParen => "')'".into(),
            Self::LBracket => "'['".into(),
            Self::RBracket => "']'".into(),
            Self::Arrow => "'=>'".into(),
            Self::Comma => "','".into(),
            Self::Semicolon => "';'".into(),
            Self::Str(s) => format!("string '{s}'"),
            Self::Int(i) => format!("integer {i}"),
            Self::Float(f) => format!("float {f}"),
            Self::Bool(b) => b.to_string(),
            Self::Null => "NULL".into(),
        }
    }
}

fn parse_error(line: usize, message: impl Into<String>) -> Error {
    Error::Parse {
        path: None,
        line,
        message: message.into(),
    }
}

fn tokenize(content: &str) -> Result<Vec<(Tok, usize)>> {
    let chars: Vec<char> = content.chars().collect();
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\n' => {
                line += 1;
                i += 1;
            }
            c if c.is_whitespace() => i += 1,
            '<' if starts_with(&chars, i, "<?php") => {
                tokens.push((Tok::OpenTag, line));
                i += 5;
            }
            '?' if starts_with(&chars, i, "?>") => {
                tokens.push((Tok::CloseTag, line));
                i += 2;
            }
            '/' if starts_with(&chars, i, "//") => i = skip_line(&chars, i),
            '#' => i = skip_line(&chars, i),
            '/' if starts_with(&chars, i, "/*") => {
                let start_line = line;
                i += 2;
                loop {
                    if i >= chars.len() {
                        return Err(parse_error(start_line, "unterminated comment"));
                    }
                    if starts_with(&chars, i, "*/") {
                        i += 2;
                        break;
                    }
                    if chars[i] == '\n' {
                        line += 1;
                    }
                    i += 1;
                }
            }
            '$' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && (chars[end].is_alphanumeric() || chars[end] == '_') {
                    end += 1;
                }
                if end == start {
                    return Err(parse_error(line, "expected variable name after '$'"));
                }
                tokens.push((Tok::Variable(chars[start..end].iter().collect()), line));
                i = end;
            }
            '=' if starts_with(&chars, i, "=>") => {
                tokens.push((Tok::Arrow, line));
                i += 2;
            }
            '=' => {
                tokens.push((Tok::Assign, line));
                i += 1;
            }
            '(' => {
                tokens.push((Tok::LParen, line));
                i += 1;
            }
            ')' => {
                tokens.push((Tok::RParen, line));
                i += 1;
            }
            '[' => {
                tokens.push((Tok::LBracket, line));
                i += 1;
            }
            ']' => {
                tokens.push((Tok::RBracket, line));
                i += 1;
            }
            ',' => {
                tokens.push((Tok::Comma, line));
                i += 1;
            }
            ';' => {
                tokens.push((Tok::Semicolon, line));
                i += 1;
            }
            '\'' | '"' => {
                let start_line = line;
                let (s, next, newlines) = read_string(&chars, i)
                    .ok_or_else(|| parse_error(start_line, "unclosed quote"))?;
                tokens.push((Tok::Str(s), start_line));
                line += newlines;
                i = next;
            }
            c if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => {
                let start = i;
                i += 1;
                while i < chars.len()
                    && (chars[i].is_ascii_digit() || matches!(chars[i], '.' | 'e' | 'E' | '_'))
                {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().filter(|c| **c != '_').collect();
                tokens.push((number(&literal, line)?, line));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let tok = match word.to_ascii_lowercase().as_str() {
                    "array" => Tok::Array,
                    "true" => Tok::Bool(true),
                    "false" => Tok::Bool(false),
                    "null" => Tok::Null,
                    _ => return Err(parse_error(line, format!("unexpected identifier '{word}'"))),
                };
                tokens.push((tok, line));
            }
            other => {
                return Err(parse_error(line, format!("unexpected character '{other}'")));
            }
        }
    }

    Ok(tokens)
}

fn starts_with(chars: &[char], at: usize, pattern: &str) -> bool {
    pattern
        .chars()
        .enumerate()
        .all(|(offset, p)| chars.get(at + offset) == Some(&p))
}

/// Skip to the newline ending a `//` or `#` comment (newline not consumed)
fn skip_line(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i] != '\n' {
        // a close tag ends a one-line comment in PHP
        if starts_with(chars, i, "?>") {
            return i;
        }
        i += 1;
    }
    i
}

/// Read a quoted string starting at `start`.
/// Returns (contents, index after closing quote, newlines consumed).
fn read_string(chars: &[char], start: usize) -> Option<(String, usize, usize)> {
    let quote = chars[start];
    let mut out = String::new();
    let mut newlines = 0;
    let mut i = start + 1;

    while i < chars.len() {
        let c = chars[i];
        if c == quote {
            return Some((out, i + 1, newlines));
        }
        if c == '\n' {
            newlines += 1;
        }
        if c == '\\' && i + 1 < chars.len() {
            let next = chars[i + 1];
            let escaped = match (quote, next) {
                (_, '\\') => Some('\\'),
                ('\'', '\'') | ('"', '"') => Some(next),
                ('"', 'n') => Some('\n'),
                ('"', 't') => Some('\t'),
                ('"', 'r') => Some('\r'),
                ('"', '$') => Some('$'),
                _ => None,
            };
            if let Some(e) = escaped {
                out.push(e);
                i += 2;
                continue;
            }
        }
        out.push(c);
        i += 1;
    }

    None
}

fn number(literal: &str, line: usize) -> Result<Tok> {
    if let Ok(i) = literal.parse::<i64>() {
        return Ok(Tok::Int(i));
    }
    literal
        .parse::<f64>()
        .map(Tok::Float)
        .map_err(|_| parse_error(line, format!("invalid number '{literal}'")))
}

struct Parser {
    tokens: Vec<(Tok, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |(_, l)| *l)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, expected: &Tok) -> Result<()> {
        let line = self.line();
        match self.next() {
            Some(ref tok) if tok == expected => Ok(()),
            Some(tok) => Err(parse_error(
                line,
                format!("expected {}, found {}", expected.describe(), tok.describe()),
            )),
            None => Err(parse_error(
                line,
                format!("expected {}, found end of file", expected.describe()),
            )),
        }
    }

    fn document(mut self) -> Result<Parsed> {
        if self.peek() == Some(&Tok::OpenTag) {
            self.pos += 1;
        }

        if matches!(self.peek(), None | Some(Tok::CloseTag)) {
            return Ok(Parsed {
                variable: None,
                entries: Vec::new(),
            });
        }

        let line = self.line();
        let variable = match self.next() {
            Some(Tok::Variable(name)) => name,
            Some(tok) => {
                return Err(parse_error(
                    line,
                    format!("expected config variable, found {}", tok.describe()),
                ));
            }
            None => unreachable!("checked above"),
        };
        self.expect(&Tok::Assign)?;

        let line = self.line();
        let entries = match self.array()? {
            Value::Map(entries) => entries,
            Value::List(items) if items.is_empty() => Vec::new(),
            Value::List(_) => {
                return Err(parse_error(line, "top-level config array must use string keys"));
            }
            _ => unreachable!("array() only returns arrays"),
        };

        self.expect(&Tok::Semicolon)?;
        if self.peek() == Some(&Tok::CloseTag) {
            self.pos += 1;
        }
        if let Some(tok) = self.peek() {
            return Err(parse_error(
                self.line(),
                format!("unexpected {} after config array", tok.describe()),
            ));
        }

        Ok(Parsed {
            variable: Some(variable),
            entries,
        })
    }

    fn array(&mut self) -> Result<Value> {
        let line = self.line();
        let close = match self.next() {
            Some(Tok::Array) => {
                self.expect(&Tok::LParen)?;
                Tok::RParen
            }
            Some(Tok::LBracket) => Tok::RBracket,
            Some(tok) => {
                return Err(parse_error(
                    line,
                    format!("expected array, found {}", tok.describe()),
                ));
            }
            None => return Err(parse_error(line, "expected array, found end of file")),
        };

        let mut entries = Vec::new();
        loop {
            if self.peek() == Some(&close) {
                self.pos += 1;
                break;
            }

            let first = self.value()?;
            let entry = if self.peek() == Some(&Tok::Arrow) {
                self.pos += 1;
                let key = match first {
                    Value::Str(s) => s,
                    Value::Int(i) => i.to_string(),
                    Value::Bool(b) => i64::from(b).to_string(),
                    other => {
                        return Err(parse_error(
                            self.line(),
                            format!("invalid array key {other}"),
                        ));
                    }
                };
                (Some(key), self.value()?)
            } else {
                (None, first)
            };
            entries.push(entry);

            let line = self.line();
            match self.next() {
                Some(Tok::Comma) => {}
                Some(ref tok) if *tok == close => break,
                Some(tok) => {
                    return Err(parse_error(
                        line,
                        format!(
                            "expected ',' or {}, found {}",
                            close.describe(),
                            tok.describe()
                        ),
                    ));
                }
                None => return Err(parse_error(line, "unterminated array")),
            }
        }

        Ok(Value::from_entries(entries))
    }

    fn value(&mut self) -> Result<Value> {
        let line = self.line();
        match self.peek() {
            Some(Tok::Array | Tok::LBracket) => return self.array(),
            None => return Err(parse_error(line, "expected value, found end of file")),
            _ => {}
        }
        match self.next() {
            Some(Tok::Str(s)) => Ok(Value::Str(s)),
            Some(Tok::Int(i)) => Ok(Value::Int(i)),
            Some(Tok::Float(f)) => Ok(Value::Float(f)),
            Some(Tok::Bool(b)) => Ok(Value::Bool(b)),
            Some(Tok::Null) => Ok(Value::Null),
            Some(tok) => Err(parse_error(
                line,
                format!("expected value, found {}", tok.describe()),
            )),
            None => Err(parse_error(line, "expected value, found end of file")),
        }
    }
}
