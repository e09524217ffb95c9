//! Splits a document into classified declarations.

use std::borrow::Cow;

use memchr::{memchr, memchr3};

use crate::constants::{COMMENT, KEY_VALUE_SEPARATOR};
use crate::error::ErrorKind;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclarationKind<'a> {
    TableHeader(&'a str),
    KeyValue { key: &'a str, value: Cow<'a, str> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration<'a> {
    /// 1-based line the declaration starts on.
    pub line: usize,
    pub content: &'a str,
    pub kind: DeclarationKind<'a>,
}

pub fn scan_declarations(input: &str) -> Result<Vec<Declaration<'_>>> {
    let mut declarations = Vec::new();
    let mut lines = input
        .split('\n')
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.strip_suffix('\r').unwrap_or(line)));

    while let Some((line_no, raw)) = lines.next() {
        let content = strip_comment(raw).trim();
        if content.is_empty() {
            continue;
        }
        if content.starts_with('[') {
            declarations.push(Declaration {
                line: line_no,
                content,
                kind: DeclarationKind::TableHeader(content),
            });
            continue;
        }

        let eq = find_unquoted(content, KEY_VALUE_SEPARATOR).ok_or_else(|| {
            Error::at(
                ErrorKind::MissingEquals,
                line_no,
                format!("expected `key = value`, found `{content}`"),
            )
        })?;
        let key = content[..eq].trim();
        let first = content[eq + 1..].trim();
        if first.is_empty() {
            return Err(Error::at(
                ErrorKind::EmptyValue,
                line_no,
                format!("key `{key}` has no value"),
            ));
        }

        let mut balance = bracket_balance(first);
        let value = if balance > 0 {
            let mut joined = first.to_string();
            while balance > 0 {
                let (_, next) = lines.next().ok_or_else(|| {
                    Error::at(
                        ErrorKind::UnterminatedArray,
                        line_no,
                        format!("array for `{key}` is never closed"),
                    )
                })?;
                let next = strip_comment(next).trim();
                if next.is_empty() {
                    continue;
                }
                balance += bracket_balance(next);
                joined.push(' ');
                joined.push_str(next);
            }
            Cow::Owned(joined)
        } else {
            Cow::Borrowed(first)
        };

        declarations.push(Declaration {
            line: line_no,
            content,
            kind: DeclarationKind::KeyValue { key, value },
        });
    }
    Ok(declarations)
}

/// Drop a trailing `#` comment that sits outside quotes.
fn strip_comment(line: &str) -> &str {
    if memchr(COMMENT, line.as_bytes()).is_none() {
        return line;
    }
    match find_unquoted(line, COMMENT) {
        Some(idx) => &line[..idx],
        None => line,
    }
}

/// Byte offset of the first `needle` outside single or double quotes.
fn find_unquoted(line: &str, needle: u8) -> Option<usize> {
    let bytes = line.as_bytes();
    if memchr3(needle, b'"', b'\'', bytes).is_none() {
        return None;
    }
    let mut quote: Option<u8> = None;
    let mut escaped = false;
    for (idx, &byte) in bytes.iter().enumerate() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if byte == b'\\' && open == b'"' {
                escaped = true;
            } else if byte == open {
                quote = None;
            }
            continue;
        }
        match byte {
            b'"' | b'\'' => quote = Some(byte),
            _ if byte == needle => return Some(idx),
            _ => {}
        }
    }
    None
}

/// Opened minus closed brackets outside quotes.
fn bracket_balance(text: &str) -> isize {
    let mut balance = 0isize;
    let mut quote: Option<u8> = None;
    let mut escaped = false;
    for &byte in text.as_bytes() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if byte == b'\\' && open == b'"' {
                escaped = true;
            } else if byte == open {
                quote = None;
            }
            continue;
        }
        match byte {
            b'"' | b'\'' => quote = Some(byte),
            b'[' => balance += 1,
            b']' => balance -= 1,
            _ => {}
        }
    }
    balance
}
