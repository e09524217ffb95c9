pub mod constants;
pub mod decode;
pub mod error;
pub mod options;
pub mod text;
pub mod tree;
pub mod value;

use std::io::Read;

use serde::de::{Deserialize, DeserializeOwned};
use serde_json::Value as JsonValue;

pub use crate::error::{Error, ErrorKind};
pub use crate::options::{DecodeOptions, UnknownFields};
pub use crate::text::{parse_key, parse_table_header, Key, TableIdentity};
pub use crate::tree::{Node, NodeId, NodeKind, Tree};
pub use crate::value::{parse_array_value, parse_primitive_value, Value};

pub type Result<T> = std::result::Result<T, Error>;

pub fn parse_tree(input: &str) -> Result<Tree> {
    decode::parser::parse_document(input)
}

pub fn from_str<T: DeserializeOwned>(input: &str) -> Result<T> {
    from_str_with_options(input, &DecodeOptions::default())
}

pub fn from_str_with_options<T: DeserializeOwned>(
    input: &str,
    options: &DecodeOptions,
) -> Result<T> {
    decode::from_str(input, options)
}

pub fn from_tree<'de, T: Deserialize<'de>>(
    tree: &'de Tree,
    options: &'de DecodeOptions,
) -> Result<T> {
    decode::from_tree(tree, options)
}

pub fn from_slice<T: DeserializeOwned>(input: &[u8]) -> Result<T> {
    from_slice_with_options(input, &DecodeOptions::default())
}

pub fn from_slice_with_options<T: DeserializeOwned>(
    input: &[u8],
    options: &DecodeOptions,
) -> Result<T> {
    decode::from_slice(input, options)
}

pub fn from_reader<T: DeserializeOwned, R: Read>(reader: R) -> Result<T> {
    from_reader_with_options(reader, &DecodeOptions::default())
}

pub fn from_reader_with_options<T: DeserializeOwned, R: Read>(
    reader: R,
    options: &DecodeOptions,
) -> Result<T> {
    decode::from_reader(reader, options)
}

/// Decode without a target type; tables become objects in declaration order.
pub fn decode_to_value(input: &str) -> Result<JsonValue> {
    from_str(input)
}

pub fn validate_str(input: &str) -> Result<()> {
    decode::validate_str(input)
}
