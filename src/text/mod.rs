//! Quote-aware splitting of keys and table headers into name segments.

pub mod key;
pub mod table;

use smallvec::SmallVec;
use smol_str::SmolStr;

use crate::constants::{is_bare_key_char, is_quote, SEGMENT_SEPARATOR};
use crate::value::unescape_basic;
use crate::{Error, Result};

pub use key::{parse_key, Key};
pub use table::{parse_table_header, TableIdentity};

pub type Segments = SmallVec<[Segment; 4]>;

/// One `.`-separated piece of a key or header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// The segment as written, surrounding whitespace trimmed, quotes kept.
    pub text: SmolStr,
    /// The segment with quotes removed and escapes resolved.
    pub name: SmolStr,
    pub quoted: bool,
}

impl Segment {
    pub fn bare(name: &str) -> Self {
        Self {
            text: SmolStr::new(name),
            name: SmolStr::new(name),
            quoted: false,
        }
    }
}

pub fn join_segments(segments: &[Segment]) -> String {
    let mut out = String::new();
    for (idx, segment) in segments.iter().enumerate() {
        if idx > 0 {
            out.push(SEGMENT_SEPARATOR);
        }
        out.push_str(&segment.text);
    }
    out
}

/// Split on every `.` that sits outside a quoted segment.
pub fn split_segments(raw: &str, line: usize) -> Result<Segments> {
    let mut segments = Segments::new();
    let mut start = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (idx, ch) in raw.char_indices() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' && open == '"' {
                escaped = true;
            } else if ch == open {
                quote = None;
            }
            continue;
        }
        if is_quote(ch) {
            quote = Some(ch);
        } else if ch == SEGMENT_SEPARATOR {
            segments.push(build_segment(&raw[start..idx], line)?);
            start = idx + ch.len_utf8();
        }
    }

    if quote.is_some() {
        return Err(Error::malformed_key(
            line,
            format!("unbalanced quote in `{raw}`"),
        ));
    }
    segments.push(build_segment(&raw[start..], line)?);
    Ok(segments)
}

fn build_segment(piece: &str, line: usize) -> Result<Segment> {
    let text = piece.trim();
    if text.is_empty() {
        return Err(Error::malformed_key(line, "empty key segment"));
    }

    let first = text.chars().next().unwrap_or_default();
    if is_quote(first) {
        let body = text
            .strip_prefix(first)
            .and_then(|rest| rest.strip_suffix(first))
            .filter(|_| text.len() >= 2)
            .ok_or_else(|| {
                Error::malformed_key(
                    line,
                    format!("quotes must wrap the entire segment `{text}`"),
                )
            })?;
        if closes_early(body, first) {
            return Err(Error::malformed_key(
                line,
                format!("quotes must wrap the entire segment `{text}`"),
            ));
        }
        let name = if first == '"' {
            unescape_basic(body, line).map_err(|err| Error::malformed_key(line, err.message))?
        } else {
            body.to_string()
        };
        return Ok(Segment {
            text: SmolStr::new(text),
            name: SmolStr::new(name),
            quoted: true,
        });
    }

    if let Some(bad) = text.chars().find(|ch| !is_bare_key_char(*ch)) {
        return Err(Error::malformed_key(
            line,
            format!("unexpected character `{bad}` in bare key `{text}`"),
        ));
    }
    Ok(Segment::bare(text))
}

/// True when the quote character reappears unescaped inside the body.
fn closes_early(body: &str, quote: char) -> bool {
    let mut escaped = false;
    for ch in body.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        if ch == '\\' && quote == '"' {
            escaped = true;
        } else if ch == quote {
            return true;
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn names(raw: &str) -> Vec<String> {
        split_segments(raw, 1)
            .unwrap()
            .iter()
            .map(|segment| segment.name.to_string())
            .collect()
    }

    #[rstest::rstest]
    #[case("a", &["a"])]
    #[case("a.b.c", &["a", "b", "c"])]
    #[case(" a . b ", &["a", "b"])]
    #[case("\"a.b\".c", &["a.b", "c"])]
    #[case("'x.y'", &["x.y"])]
    #[case("a.\"  b  \".c", &["a", "  b  ", "c"])]
    #[case("\"esc\\\"aped\"", &["esc\"aped"])]
    fn splits_outside_quotes(#[case] raw: &str, #[case] expected: &[&str]) {
        assert_eq!(names(raw), expected);
    }

    #[rstest::rstest]
    #[case("a..b")]
    #[case("\"open")]
    #[case("a\"b\"")]
    #[case("\"a\"b")]
    #[case("a b")]
    #[case("")]
    fn rejects_malformed(#[case] raw: &str) {
        let err = split_segments(raw, 4).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedKey);
        assert_eq!(err.line, Some(4));
    }

    #[rstest::rstest]
    fn join_keeps_quotes() {
        let segments = split_segments("a.\"b.c\"", 1).unwrap();
        assert_eq!(join_segments(&segments), "a.\"b.c\"");
    }
}
