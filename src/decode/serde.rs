use serde::de::{self, Deserializer, Error as _, IntoDeserializer, MapAccess, SeqAccess, Visitor};
use tracing::trace;

use crate::error::ErrorKind;
use crate::options::{DecodeOptions, UnknownFields};
use crate::tree::{Node, NodeId, NodeKind, Tree};
use crate::value::Value;
use crate::Error;

/// Deserializer positioned on one tree node.
#[derive(Clone, Copy)]
pub struct TreeDeserializer<'de> {
    tree: &'de Tree,
    node: NodeId,
    options: &'de DecodeOptions,
    depth: usize,
}

enum Shape<'de> {
    Table,
    Value(&'de Value),
}

impl<'de> TreeDeserializer<'de> {
    pub fn new(tree: &'de Tree, node: NodeId, options: &'de DecodeOptions) -> Self {
        Self {
            tree,
            node,
            options,
            depth: 0,
        }
    }

    fn node(&self) -> Result<&'de Node, Error> {
        self.tree.checked(self.node)
    }

    fn shape(&self) -> Result<Shape<'de>, Error> {
        match &self.node()?.kind {
            NodeKind::File | NodeKind::Table(_) => Ok(Shape::Table),
            NodeKind::KeyValueScalar(kv) | NodeKind::KeyValueArray(kv) => Ok(Shape::Value(&kv.value)),
            NodeKind::EmptyTableStub => Err(Error::internal_decoding(
                "placeholder node reached as a value",
            )),
        }
    }

    /// Enter the node's children as a nested structure.
    fn begin_structure(&self, fields: &'static [&'static str]) -> Result<TableAccess<'de>, Error> {
        if self.depth > self.options.max_depth {
            return Err(Error::at(
                ErrorKind::DepthLimit,
                self.node()?.line,
                format!("nesting deeper than {} tables", self.options.max_depth),
            ));
        }
        Ok(TableAccess {
            tree: self.tree,
            neighbours: self.tree.children(self.node),
            element_index: 0,
            fields,
            options: self.options,
            depth: self.depth,
            pending: None,
        })
    }

    fn value(&self) -> Result<ValueDeserializer<'de>, Error> {
        match self.shape()? {
            Shape::Value(value) => Ok(ValueDeserializer::new(value)),
            Shape::Table => Err(Error::deserialize(format!(
                "expected a value, found table `{}`",
                self.node()?.declared_name().unwrap_or_default()
            ))),
        }
    }
}

impl<'de> de::Deserializer<'de> for TreeDeserializer<'de> {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.shape()? {
            Shape::Table => visitor.visit_map(self.begin_structure(&[])?),
            Shape::Value(value) => ValueDeserializer::new(value).deserialize_any(visitor),
        }
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.shape()? {
            Shape::Value(Value::Null) => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_map<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.shape()? {
            Shape::Table => visitor.visit_map(self.begin_structure(&[])?),
            Shape::Value(value) => ValueDeserializer::new(value).deserialize_map(visitor),
        }
    }

    fn deserialize_struct<V>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.shape()? {
            Shape::Table => visitor.visit_map(self.begin_structure(fields)?),
            Shape::Value(value) => {
                ValueDeserializer::new(value).deserialize_struct(name, fields, visitor)
            }
        }
    }

    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.value()?.deserialize_seq(visitor)
    }

    fn deserialize_tuple<V>(self, len: usize, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.value()?.deserialize_tuple(len, visitor)
    }

    fn deserialize_tuple_struct<V>(
        self,
        _name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_tuple(len, visitor)
    }

    fn deserialize_enum<V>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.value()?.deserialize_enum(name, variants, visitor)
    }

    fn deserialize_newtype_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct identifier
    }
}

/// One nesting level of the walk: the ordered children of a table and a
/// cursor into them.
pub struct TableAccess<'de> {
    tree: &'de Tree,
    neighbours: &'de [NodeId],
    element_index: usize,
    fields: &'static [&'static str],
    options: &'de DecodeOptions,
    depth: usize,
    pending: Option<NodeId>,
}

impl<'de> TableAccess<'de> {
    /// Advance to the next named sibling. `None` once every sibling is
    /// consumed.
    fn decode_element_index(&mut self) -> Result<Option<(NodeId, &'de str)>, Error> {
        while let Some(&id) = self.neighbours.get(self.element_index) {
            self.element_index += 1;
            let node = self.tree.node(id);
            let name = match &node.kind {
                NodeKind::EmptyTableStub => continue,
                NodeKind::File => {
                    return Err(Error::internal_decoding("document root found below a table"))
                }
                _ => node
                    .declared_name()
                    .ok_or_else(|| Error::internal_decoding("node without a name"))?,
            };
            if !self.fields.is_empty() && !self.fields.iter().any(|field| *field == name) {
                match self.options.unknown_fields {
                    // The target still sees the key and decides, so its own
                    // `deny_unknown_fields` keeps working.
                    UnknownFields::Ignore => {
                        trace!(field = name, line = node.line, "passing unknown field to target");
                    }
                    UnknownFields::Deny => {
                        return Err(Error::unknown_field(name, self.fields).with_line(node.line));
                    }
                }
            }
            return Ok(Some((id, name)));
        }
        Ok(None)
    }
}

impl<'de> MapAccess<'de> for TableAccess<'de> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, Self::Error>
    where
        K: de::DeserializeSeed<'de>,
    {
        let Some((id, name)) = self.decode_element_index()? else {
            return Ok(None);
        };
        self.pending = Some(id);
        seed.deserialize(de::value::BorrowedStrDeserializer::new(name))
            .map(Some)
            .map_err(|err: Error| err.or_line(self.tree.node(id).line))
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, Self::Error>
    where
        V: de::DeserializeSeed<'de>,
    {
        let id = self
            .pending
            .take()
            .ok_or_else(|| Error::internal_decoding("value requested before key"))?;
        let de = TreeDeserializer {
            tree: self.tree,
            node: id,
            options: self.options,
            depth: self.depth + 1,
        };
        seed.deserialize(de)
            .map_err(|err| err.or_line(self.tree.node(id).line))
    }
}

/// Deserializer over a literal value held by a key-value node.
#[derive(Clone, Copy)]
pub struct ValueDeserializer<'de> {
    value: &'de Value,
}

impl<'de> ValueDeserializer<'de> {
    pub fn new(value: &'de Value) -> Self {
        Self { value }
    }

    fn mismatch(&self, expected: &str) -> Error {
        Error::deserialize(format!(
            "expected {expected}, found {} `{}`",
            self.value.kind_name(),
            self.value
        ))
    }
}

impl<'de> de::Deserializer<'de> for ValueDeserializer<'de> {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.value {
            Value::Null => visitor.visit_unit(),
            Value::Bool(b) => visitor.visit_bool(*b),
            Value::Integer(i) => visitor.visit_i64(*i),
            Value::Float(f) => visitor.visit_f64(*f),
            Value::String(s) | Value::DateTime(s) => visitor.visit_borrowed_str(s),
            Value::Array(items) => visitor.visit_seq(ArrayAccess::new(items)),
        }
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        if self.value.is_null() {
            return visitor.visit_none();
        }
        visitor.visit_some(self)
    }

    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.value {
            Value::Array(items) => visitor.visit_seq(ArrayAccess::new(items)),
            _ => Err(self.mismatch("array")),
        }
    }

    fn deserialize_tuple<V>(self, len: usize, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.value {
            Value::Array(items) if items.len() == len => visitor.visit_seq(ArrayAccess::new(items)),
            Value::Array(items) => Err(Error::invalid_length(items.len(), &visitor)),
            _ => Err(self.mismatch("array")),
        }
    }

    fn deserialize_tuple_struct<V>(
        self,
        _name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_tuple(len, visitor)
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.value {
            Value::String(s) => visitor.visit_enum(s.as_str().into_deserializer()),
            _ => Err(self.mismatch("string enum variant")),
        }
    }

    fn deserialize_newtype_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct map struct identifier
    }
}

struct ArrayAccess<'de> {
    items: &'de [Value],
    index: usize,
}

impl<'de> ArrayAccess<'de> {
    fn new(items: &'de [Value]) -> Self {
        Self { items, index: 0 }
    }
}

impl<'de> SeqAccess<'de> for ArrayAccess<'de> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, Self::Error>
    where
        T: de::DeserializeSeed<'de>,
    {
        let Some(item) = self.items.get(self.index) else {
            return Ok(None);
        };
        self.index += 1;
        seed.deserialize(ValueDeserializer::new(item)).map(Some)
    }

    /// The remaining element count, used by targets to pre-size collections.
    fn size_hint(&self) -> Option<usize> {
        Some(self.items.len() - self.index)
    }
}
