//! Arena-backed node tree. Nodes refer to each other by [`NodeId`]; the
//! root owns everything reachable from it.

mod assembly;

use smallvec::SmallVec;

use crate::constants::{EMPTY_TABLE_MARKER, ROOT_NAME};
use crate::text::{Key, TableIdentity};
use crate::value::Value;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableNode {
    pub identity: TableIdentity,
    /// Created to stand in for an undeclared intermediate table.
    pub is_synthetic: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyValueNode {
    pub key: Key,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    File,
    Table(TableNode),
    KeyValueScalar(KeyValueNode),
    KeyValueArray(KeyValueNode),
    EmptyTableStub,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub line: usize,
    pub content: String,
}

impl Node {
    fn detached(kind: NodeKind, line: usize, content: impl Into<String>) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            line,
            content: content.into(),
        }
    }

    pub fn table(&self) -> Option<&TableNode> {
        match &self.kind {
            NodeKind::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn key_value(&self) -> Option<&KeyValueNode> {
        match &self.kind {
            NodeKind::KeyValueScalar(kv) | NodeKind::KeyValueArray(kv) => Some(kv),
            _ => None,
        }
    }

    pub fn is_key_value(&self) -> bool {
        self.key_value().is_some()
    }

    /// The name a field list is matched against.
    pub fn declared_name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::File => Some(ROOT_NAME),
            NodeKind::Table(table) => Some(&table.identity.name),
            NodeKind::KeyValueScalar(kv) | NodeKind::KeyValueArray(kv) => Some(&kv.key.content),
            NodeKind::EmptyTableStub => None,
        }
    }

    /// The name used for collision checks between siblings.
    fn sibling_name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Table(table) => Some(&table.identity.name),
            NodeKind::KeyValueScalar(kv) | NodeKind::KeyValueArray(kv) => Some(kv.key.name()),
            NodeKind::File | NodeKind::EmptyTableStub => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::detached(NodeKind::File, 0, ROOT_NAME)],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Only for ids this tree handed out; public callers go through `get`.
    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub(crate) fn checked(&self, id: NodeId) -> Result<&Node> {
        self.get(id).ok_or_else(|| {
            Error::internal_decoding(format!("node {} does not belong to this tree", id.0))
        })
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|node| node.children.as_slice()).unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|node| node.parent)
    }

    pub fn table(&self, id: NodeId) -> Option<&TableNode> {
        self.get(id).and_then(Node::table)
    }

    pub fn key_value(&self, id: NodeId) -> Option<&KeyValueNode> {
        self.get(id).and_then(Node::key_value)
    }

    /// A detached, explicitly declared table.
    pub fn new_table(
        &mut self,
        identity: TableIdentity,
        line: usize,
        content: impl Into<String>,
    ) -> NodeId {
        let kind = NodeKind::Table(TableNode {
            identity,
            is_synthetic: false,
        });
        self.push(Node::detached(kind, line, content))
    }

    fn new_synthetic_table(&mut self, identity: TableIdentity, line: usize) -> NodeId {
        let content = identity.full_table_name.clone();
        let kind = NodeKind::Table(TableNode {
            identity,
            is_synthetic: true,
        });
        self.push(Node::detached(kind, line, content))
    }

    /// A detached key-value node; array values get the array variant.
    pub fn new_key_value(
        &mut self,
        key: Key,
        value: Value,
        line: usize,
        content: impl Into<String>,
    ) -> NodeId {
        let kv = KeyValueNode { key, value };
        let kind = match kv.value {
            Value::Array(_) => NodeKind::KeyValueArray(kv),
            _ => NodeKind::KeyValueScalar(kv),
        };
        self.push(Node::detached(kind, line, content))
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Number of table ancestors between `id` and the root.
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut cursor = self.parent(id);
        while let Some(parent) = cursor {
            if self.table(parent).is_some() {
                depth += 1;
            }
            cursor = self.parent(parent);
        }
        depth
    }

    /// Every node reachable from the root, in document order.
    pub fn descendants(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: SmallVec<[NodeId; 16]> = SmallVec::new();
        stack.extend(self.children(from).iter().rev().copied());
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Reachable tables in document order.
    pub fn tables(&self) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|id| self.table(*id).is_some())
            .collect()
    }

    /// Insert a placeholder under every reachable table that holds no key-values.
    pub fn finish(&mut self) {
        for id in self.tables() {
            let children = self.children(id);
            let has_values = children.iter().any(|child| {
                let node = self.node(*child);
                node.is_key_value() || matches!(node.kind, NodeKind::EmptyTableStub)
            });
            if has_values {
                continue;
            }
            let line = self.node(id).line;
            let stub = self.push(Node::detached(
                NodeKind::EmptyTableStub,
                line,
                EMPTY_TABLE_MARKER,
            ));
            self.nodes[stub.0].parent = Some(id);
            self.nodes[id.0].children.insert(0, stub);
        }
    }
}
