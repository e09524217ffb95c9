use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedKey,
    EmptyTableName,
    AmbiguousTable,
    DuplicateTable,
    DuplicateKey,
    MissingEquals,
    EmptyValue,
    InvalidValue,
    UnterminatedArray,
    Unsupported,
    UnknownField,
    InternalDecoding,
    DepthLimit,
    Deserialize,
    Io,
}

impl ErrorKind {
    /// Internal-consistency failures: the tree broke one of its own invariants.
    pub fn is_internal(self) -> bool {
        matches!(self, ErrorKind::AmbiguousTable | ErrorKind::InternalDecoding)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{}", render(.line, .message))]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
    pub line: Option<usize>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: None,
        }
    }

    pub fn at(kind: ErrorKind, line: usize, message: impl Into<String>) -> Self {
        Self::new(kind, message).with_line(line)
    }

    pub fn malformed_key(line: usize, message: impl Into<String>) -> Self {
        Self::at(ErrorKind::MalformedKey, line, message)
    }

    pub fn empty_table_name(line: usize) -> Self {
        Self::at(
            ErrorKind::EmptyTableName,
            line,
            "table header has an empty name",
        )
    }

    pub fn invalid_value(line: usize, message: impl Into<String>) -> Self {
        Self::at(ErrorKind::InvalidValue, line, message)
    }

    pub fn unsupported(line: usize, message: impl Into<String>) -> Self {
        Self::at(ErrorKind::Unsupported, line, message)
    }

    pub fn internal_decoding(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalDecoding, message)
    }

    pub fn deserialize(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Deserialize, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    /// Attach a line only if the error does not already carry one.
    pub fn or_line(mut self, line: usize) -> Self {
        if self.line.is_none() {
            self.line = Some(line);
        }
        self
    }
}

fn render(line: &Option<usize>, message: &str) -> String {
    match line {
        Some(line) => format!("line {line}: {message}"),
        None => message.to_string(),
    }
}

impl serde::de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::deserialize(msg.to_string())
    }

    fn unknown_field(field: &str, expected: &'static [&'static str]) -> Self {
        Error::new(
            ErrorKind::UnknownField,
            format!("unknown field `{field}`, expected one of {expected:?}"),
        )
    }
}
