use smol_str::SmolStr;

use super::{join_segments, split_segments, Segment, Segments};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableIdentity {
    pub full_table_name: String,
    /// Every prefix of the full name, shortest first.
    pub tables_list: Vec<String>,
    pub level: usize,
    pub name: SmolStr,
    pub name_with_quotes: SmolStr,
    pub segments: Segments,
}

impl TableIdentity {
    pub fn from_segments(segments: &[Segment]) -> Self {
        debug_assert!(!segments.is_empty());
        let tables_list = (1..=segments.len())
            .map(|end| join_segments(&segments[..end]))
            .collect::<Vec<_>>();
        let last = segments.last().cloned().unwrap_or_else(|| Segment::bare(""));
        Self {
            full_table_name: tables_list.last().cloned().unwrap_or_default(),
            tables_list,
            level: segments.len() - 1,
            name: last.name,
            name_with_quotes: last.text,
            segments: segments.iter().cloned().collect(),
        }
    }

    /// Whether this table sits at `path`, comparing unquoted names so that
    /// `a` and `"a"` are the same table.
    pub fn is_at(&self, path: &[Segment]) -> bool {
        self.segments.len() == path.len()
            && self
                .segments
                .iter()
                .zip(path)
                .all(|(own, other)| own.name == other.name)
    }

    /// Identity of the table at `prefix` segments deep (1-based).
    pub fn prefix(&self, len: usize) -> TableIdentity {
        TableIdentity::from_segments(&self.segments[..len])
    }
}

pub fn parse_table_header(raw: &str, line: usize) -> Result<TableIdentity> {
    let trimmed = raw.trim();
    if trimmed.starts_with("[[") {
        return Err(Error::unsupported(
            line,
            format!("arrays of tables are not supported: `{trimmed}`"),
        ));
    }
    let body = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| {
            Error::malformed_key(
                line,
                format!("table header must be enclosed in brackets: `{trimmed}`"),
            )
        })?
        .trim();
    if body.is_empty() {
        return Err(Error::empty_table_name(line));
    }
    let segments = split_segments(body, line)?;
    Ok(TableIdentity::from_segments(&segments))
}
