use crate::constants::MAX_DEPTH;

/// What the decoder does with a declared key the target type has no field for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownFields {
    #[default]
    Ignore,
    Deny,
}

#[derive(Debug, Clone)]
pub struct DecodeOptions {
    pub unknown_fields: UnknownFields,
    pub max_depth: usize,
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unknown_fields(mut self, unknown_fields: UnknownFields) -> Self {
        self.unknown_fields = unknown_fields;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            unknown_fields: UnknownFields::default(),
            max_depth: MAX_DEPTH,
        }
    }
}
