pub mod parser;
pub mod scan;
pub mod serde;

use std::io::Read;

use ::serde::de::{Deserialize, DeserializeOwned};

use crate::tree::Tree;
use crate::{DecodeOptions, Error, Result};

pub use self::serde::{TreeDeserializer, ValueDeserializer};

pub fn from_str<T: DeserializeOwned>(input: &str, options: &DecodeOptions) -> Result<T> {
    let tree = parser::parse_document(input)?;
    from_tree(&tree, options)
}

pub fn from_tree<'de, T: Deserialize<'de>>(tree: &'de Tree, options: &'de DecodeOptions) -> Result<T> {
    T::deserialize(TreeDeserializer::new(tree, tree.root(), options))
}

pub fn from_slice<T: DeserializeOwned>(input: &[u8], options: &DecodeOptions) -> Result<T> {
    let text =
        std::str::from_utf8(input).map_err(|err| Error::io(format!("invalid utf-8: {err}")))?;
    from_str(text, options)
}

pub fn from_reader<T: DeserializeOwned, R: Read>(
    mut reader: R,
    options: &DecodeOptions,
) -> Result<T> {
    let mut buf = String::new();
    reader
        .read_to_string(&mut buf)
        .map_err(|err| Error::io(format!("read failed: {err}")))?;
    from_str(&buf, options)
}

pub fn validate_str(input: &str) -> Result<()> {
    parser::parse_document(input).map(|_| ())
}
