use memchr::memchr2;

use super::Value;
use crate::constants::is_null_literal;
use crate::{Error, Result};

pub fn parse_primitive_value(text: &str, line: usize) -> Result<Value> {
    let token = text.trim();
    if token.is_empty() {
        return Err(Error::invalid_value(line, "missing value"));
    }
    match token.as_bytes()[0] {
        b'"' => return parse_basic_string(token, line).map(Value::String),
        b'\'' => return parse_literal_string(token, line).map(Value::String),
        b'[' => return parse_array_value(token, line).map(Value::Array),
        b'{' => {
            return Err(Error::unsupported(
                line,
                format!("inline tables are not supported: `{token}`"),
            ))
        }
        _ => {}
    }
    match token {
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        _ => {}
    }
    if is_null_literal(token) {
        return Ok(Value::Null);
    }
    if looks_like_datetime(token) {
        return Ok(Value::DateTime(token.to_string()));
    }
    if let Some(value) = parse_integer(token) {
        return Ok(Value::Integer(value));
    }
    if let Some(value) = parse_float(token) {
        return Ok(Value::Float(value));
    }
    Err(Error::invalid_value(
        line,
        format!("cannot parse value `{token}`"),
    ))
}

/// Parse a bracketed array literal into its items, nesting allowed.
pub fn parse_array_value(text: &str, line: usize) -> Result<Vec<Value>> {
    let token = text.trim();
    let body = token
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| Error::invalid_value(line, format!("malformed array `{token}`")))?;

    let mut items = Vec::new();
    for piece in split_array_items(body, line)? {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        items.push(parse_primitive_value(piece, line)?);
    }
    Ok(items)
}

/// Split on top-level commas, respecting quotes and nested brackets.
/// An empty piece is only allowed as the trailing one.
fn split_array_items(body: &str, line: usize) -> Result<Vec<&str>> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut escaped = false;
    let mut start = 0;
    let bytes = body.as_bytes();

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
            b'[' => depth += 1,
            b']' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| Error::invalid_value(line, "unbalanced `]` in array"))?;
            }
            b',' if depth == 0 => {
                pieces.push(&body[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    if quote.is_some() || depth != 0 {
        return Err(Error::invalid_value(line, "unterminated array literal"));
    }
    pieces.push(&body[start..]);

    let last = pieces.len() - 1;
    if pieces[..last].iter().any(|piece| piece.trim().is_empty()) {
        return Err(Error::invalid_value(line, "empty array element"));
    }
    Ok(pieces)
}

fn parse_basic_string(token: &str, line: usize) -> Result<String> {
    let body = token
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .filter(|_| token.len() >= 2)
        .ok_or_else(|| Error::invalid_value(line, format!("unterminated string {token}")))?;
    unescape_basic(body, line)
}

fn parse_literal_string(token: &str, line: usize) -> Result<String> {
    let body = token
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
        .filter(|_| token.len() >= 2)
        .ok_or_else(|| Error::invalid_value(line, format!("unterminated string {token}")))?;
    if body.contains('\'') {
        return Err(Error::invalid_value(
            line,
            "literal strings cannot contain `'`",
        ));
    }
    Ok(body.to_string())
}

/// Resolve backslash escapes of a double-quoted body.
pub fn unescape_basic(body: &str, line: usize) -> Result<String> {
    if memchr2(b'\\', b'"', body.as_bytes()).is_none() {
        return Ok(body.to_string());
    }
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '"' => return Err(Error::invalid_value(line, "unescaped `\"` in string")),
            '\\' => {}
            _ => {
                out.push(ch);
                continue;
            }
        }
        let escaped = chars
            .next()
            .ok_or_else(|| Error::invalid_value(line, "dangling escape at end of string"))?;
        match escaped {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{0008}'),
            'f' => out.push('\u{000C}'),
            '"' => out.push('"'),
            '\\' => out.push('\\'),
            'u' | 'U' => {
                let width = if escaped == 'u' { 4 } else { 8 };
                let hex: String = chars.by_ref().take(width).collect();
                let code = u32::from_str_radix(&hex, 16)
                    .ok()
                    .filter(|_| hex.len() == width)
                    .and_then(char::from_u32)
                    .ok_or_else(|| {
                        Error::invalid_value(line, format!("invalid unicode escape `\\{escaped}{hex}`"))
                    })?;
                out.push(code);
            }
            other => {
                return Err(Error::invalid_value(
                    line,
                    format!("invalid escape `\\{other}`"),
                ))
            }
        }
    }
    Ok(out)
}

fn parse_integer(token: &str) -> Option<i64> {
    let (negative, unsigned) = match token.as_bytes().first()? {
        b'-' => (true, &token[1..]),
        b'+' => (false, &token[1..]),
        _ => (false, token),
    };
    let (radix, digits) = match unsigned.get(..2) {
        Some("0x") => (16, &unsigned[2..]),
        Some("0o") => (8, &unsigned[2..]),
        Some("0b") => (2, &unsigned[2..]),
        _ => (10, unsigned),
    };
    if radix != 10 && token.len() != unsigned.len() {
        return None;
    }
    if radix == 10 && digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    let cleaned = strip_underscores(digits)?;
    if cleaned.is_empty() || !cleaned.chars().all(|ch| ch.is_digit(radix)) {
        return None;
    }
    let magnitude = i128::from_str_radix(&cleaned, radix).ok()?;
    let value = if negative { -magnitude } else { magnitude };
    i64::try_from(value).ok()
}

fn parse_float(token: &str) -> Option<f64> {
    let unsigned = token.trim_start_matches(['+', '-']);
    if token.len() - unsigned.len() > 1 {
        return None;
    }
    let negative = token.starts_with('-');
    match unsigned {
        "inf" => return Some(if negative { f64::NEG_INFINITY } else { f64::INFINITY }),
        "nan" => return Some(f64::NAN),
        _ => {}
    }
    if !unsigned.contains(['.', 'e', 'E']) {
        return None;
    }
    if unsigned.starts_with('.') || unsigned.ends_with('.') || unsigned.contains(".e") {
        return None;
    }
    let cleaned = strip_underscores(token)?;
    if !cleaned
        .chars()
        .all(|ch| ch.is_ascii_digit() || matches!(ch, '.' | 'e' | 'E' | '+' | '-'))
    {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

/// Remove `_` separators, which must sit between two digits.
fn strip_underscores(digits: &str) -> Option<String> {
    let bytes = digits.as_bytes();
    let mut out = String::with_capacity(digits.len());
    for (idx, &byte) in bytes.iter().enumerate() {
        if byte == b'_' {
            let before = idx.checked_sub(1).map(|i| bytes[i]);
            let after = bytes.get(idx + 1).copied();
            let ok = before.is_some_and(|b| b.is_ascii_hexdigit())
                && after.is_some_and(|b| b.is_ascii_hexdigit());
            if !ok {
                return None;
            }
            continue;
        }
        out.push(byte as char);
    }
    Some(out)
}

fn looks_like_datetime(token: &str) -> bool {
    let bytes = token.as_bytes();
    let is_date = bytes.len() >= 10
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[5..7].iter().all(u8::is_ascii_digit)
        && bytes[7] == b'-'
        && bytes[8..10].iter().all(u8::is_ascii_digit);
    let is_time = bytes.len() >= 8
        && bytes[..2].iter().all(u8::is_ascii_digit)
        && bytes[2] == b':'
        && bytes[3..5].iter().all(u8::is_ascii_digit)
        && bytes[5] == b':';
    is_date || is_time
}
