pub const MAX_DEPTH: usize = 256;

pub const COMMENT: u8 = b'#';

pub const KEY_VALUE_SEPARATOR: u8 = b'=';

pub const SEGMENT_SEPARATOR: char = '.';

/// Name reported for the document root when it is matched against a field list.
pub const ROOT_NAME: &str = "rootNode";

/// Content carried by the placeholder child of a table with no key-values.
pub const EMPTY_TABLE_MARKER: &str = "empty_technical_node";

#[inline]
pub fn is_null_literal(s: &str) -> bool {
    s.eq_ignore_ascii_case("null")
}

#[inline]
pub fn is_quote(ch: char) -> bool {
    matches!(ch, '"' | '\'')
}

#[inline]
pub fn is_bare_key_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '-'
}
