use smol_str::SmolStr;

use super::{join_segments, split_segments, Segment, Segments};
use crate::Result;

/// A parsed key. `content` is the unquoted name for a single segment and the
/// trimmed segments joined with `.` for a dotted key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    pub raw: SmolStr,
    pub content: SmolStr,
    pub segments: Segments,
    pub is_dotted: bool,
    pub line: usize,
}

impl Key {
    fn from_segments(raw: &str, segments: Segments, line: usize) -> Self {
        let is_dotted = segments.len() > 1;
        let content = if is_dotted {
            SmolStr::new(join_segments(&segments))
        } else {
            segments[0].name.clone()
        };
        Self {
            raw: SmolStr::new(raw),
            content,
            segments,
            is_dotted,
            line,
        }
    }

    /// The unquoted final segment.
    pub fn name(&self) -> &str {
        self.segments
            .last()
            .map(|segment| segment.name.as_str())
            .unwrap_or_default()
    }

    /// Every segment but the last: the implicit table path of a dotted key.
    pub fn table_path(&self) -> &[Segment] {
        &self.segments[..self.segments.len().saturating_sub(1)]
    }

    /// The key reduced to its final segment.
    pub fn leaf(&self) -> Key {
        let last = self.segments.last().cloned();
        let segments: Segments = last.into_iter().collect();
        let raw = join_segments(&segments);
        Key::from_segments(&raw, segments, self.line)
    }
}

pub fn parse_key(raw: &str, line: usize) -> Result<Key> {
    let trimmed = raw.trim();
    let segments = split_segments(trimmed, line)?;
    Ok(Key::from_segments(trimmed, segments, line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[rstest::rstest]
    #[case("plain", false)]
    #[case("a.b", true)]
    #[case("a.b.c.d", true)]
    #[case("with-dash_and_1", false)]
    fn dotted_iff_unquoted_dot(#[case] raw: &str, #[case] dotted: bool) {
        assert_eq!(parse_key(raw, 1).unwrap().is_dotted, dotted);
    }

    #[rstest::rstest]
    fn quoted_dots_are_not_separators() {
        let key = parse_key("\"a.b.c\"", 1).unwrap();
        assert_eq!(key.content, "a.b.c");
        assert!(!key.is_dotted);
    }

    #[rstest::rstest]
    fn dotted_key_keeps_verbatim_content() {
        let key = parse_key("a.\"  b  \".c", 1).unwrap();
        assert_eq!(key.content, "a.\"  b  \".c");
        assert!(key.is_dotted);
        assert_eq!(key.segments[1].name, "  b  ");
    }

    #[rstest::rstest]
    #[case("a . b", "a.b")]
    #[case(" a .\"x y\". c ", "a.\"x y\".c")]
    fn dotted_content_normalizes_separators(#[case] raw: &str, #[case] content: &str) {
        let key = parse_key(raw, 1).unwrap();
        assert!(key.is_dotted);
        assert_eq!(key.content, content);
    }

    #[rstest::rstest]
    fn quoted_prefix_then_bare() {
        let key = parse_key("\"a.b\".c", 1).unwrap();
        assert!(key.is_dotted);
        assert_eq!(key.content, "\"a.b\".c");
        assert_eq!(key.table_path().len(), 1);
        assert_eq!(key.table_path()[0].name, "a.b");
        assert_eq!(key.name(), "c");
    }

    #[rstest::rstest]
    fn leaf_drops_table_path() {
        let key = parse_key("google.com", 3).unwrap();
        let leaf = key.leaf();
        assert_eq!(leaf.content, "com");
        assert!(!leaf.is_dotted);
        assert_eq!(leaf.line, 3);
    }

    #[rstest::rstest]
    fn unbalanced_quote_reports_line() {
        let err = parse_key("\"a.b", 12).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedKey);
        assert_eq!(err.line, Some(12));
    }
}
