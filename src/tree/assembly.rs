//! Placing declared tables and dotted key-values into the tree, creating
//! missing intermediate tables on the way.

use smallvec::SmallVec;
use tracing::{debug, trace};

use super::{NodeId, NodeKind, Tree};
use crate::error::ErrorKind;
use crate::text::{join_segments, Segment, TableIdentity};
use crate::{Error, Result};

impl Tree {
    /// Tables anywhere under `root` that sit `depth` tables below it and
    /// satisfy `matches`.
    pub fn find_tables(
        &self,
        root: NodeId,
        depth: usize,
        matches: impl Fn(&TableIdentity) -> bool,
    ) -> SmallVec<[NodeId; 2]> {
        let mut found = SmallVec::new();
        let mut stack: Vec<(NodeId, usize)> =
            self.children(root).iter().map(|id| (*id, 1)).collect();
        while let Some((id, level)) = stack.pop() {
            let Some(table) = self.table(id) else {
                continue;
            };
            if level == depth {
                if matches(&table.identity) {
                    found.push(id);
                }
                continue;
            }
            stack.extend(self.children(id).iter().map(|child| (*child, level + 1)));
        }
        found
    }

    fn find_table(&self, root: NodeId, path: &[Segment], depth: usize) -> Result<Option<NodeId>> {
        let found = self.find_tables(root, depth, |identity| identity.is_at(path));
        match found.as_slice() {
            [] => Ok(None),
            [id] => Ok(Some(*id)),
            _ => Err(Error::new(
                ErrorKind::AmbiguousTable,
                format!(
                    "found {} tables named `{}` at depth {depth}",
                    found.len(),
                    join_segments(path)
                ),
            )),
        }
    }

    /// Reuse the table already materialized at this path and depth, or
    /// create a synthetic one under `parent`.
    pub fn get_or_create_ancestor(
        &mut self,
        root: NodeId,
        parent: NodeId,
        identity: TableIdentity,
        depth: usize,
        line: usize,
    ) -> Result<NodeId> {
        if let Some(existing) = self.find_table(root, &identity.segments, depth)? {
            return Ok(existing);
        }
        trace!(table = %identity.full_table_name, line, "synthesizing intermediate table");
        let table = self.new_synthetic_table(identity, line);
        self.attach(parent, table)?;
        Ok(table)
    }

    /// Place a detached table node, returning it once it sits under the
    /// full chain of its ancestors.
    pub fn insert_table(&mut self, root: NodeId, table: NodeId) -> Result<NodeId> {
        self.checked(root)?;
        let node = self.checked(table)?;
        let line = node.line;
        let identity = node
            .table()
            .map(|node| node.identity.clone())
            .ok_or_else(|| Error::internal_decoding("insert_table called with a non-table node"))?;
        let levels = identity.tables_list.len();

        let mut parent = root;
        for depth in 1..levels {
            parent = self.get_or_create_ancestor(root, parent, identity.prefix(depth), depth, line)?;
        }

        match self.find_table(root, &identity.segments, levels)? {
            Some(existing) => self.claim_declared(existing, table),
            None => {
                self.attach(parent, table)?;
                Ok(table)
            }
        }
    }

    /// A declared table landed on a path that is already materialized.
    fn claim_declared(&mut self, existing: NodeId, table: NodeId) -> Result<NodeId> {
        if existing == table {
            return Ok(table);
        }
        let synthetic = self
            .table(existing)
            .map(|node| node.is_synthetic)
            .unwrap_or_default();
        if !synthetic {
            let name = self
                .table(table)
                .map(|node| node.identity.full_table_name.clone())
                .unwrap_or_default();
            debug!(table = %name, "table declared twice");
            return Err(Error::at(
                ErrorKind::DuplicateTable,
                self.node(table).line,
                format!(
                    "table `{name}` is already defined on line {}",
                    self.node(existing).line
                ),
            ));
        }
        self.replace_node(existing, table)?;
        Ok(table)
    }

    /// Put `replacement` in `existing`'s slot, adopting its children.
    fn replace_node(&mut self, existing: NodeId, replacement: NodeId) -> Result<()> {
        let parent = self
            .parent(existing)
            .ok_or_else(|| Error::internal_decoding("synthetic table has no parent"))?;
        let slot = self.nodes[parent.0]
            .children
            .iter()
            .position(|id| *id == existing)
            .ok_or_else(|| Error::internal_decoding("synthetic table missing from its parent"))?;
        trace!(
            line = self.node(replacement).line,
            "declared table replaces synthetic placeholder"
        );

        let children = std::mem::take(&mut self.nodes[existing.0].children);
        for child in &children {
            self.nodes[child.0].parent = Some(replacement);
        }
        self.nodes[replacement.0].children.extend(children);
        self.nodes[replacement.0].parent = Some(parent);
        self.nodes[parent.0].children[slot] = replacement;
        self.nodes[existing.0].parent = None;
        Ok(())
    }

    /// Place a key-value under `root`, expanding a dotted key into the
    /// tables it implies. Returns the table the value ends up in.
    pub fn resolve_dotted_key_value(&mut self, key_value: NodeId, root: NodeId) -> Result<NodeId> {
        self.checked(root)?;
        let key = self
            .checked(key_value)?
            .key_value()
            .map(|kv| kv.key.clone())
            .ok_or_else(|| {
                Error::internal_decoding("resolve_dotted_key_value called with a non key-value node")
            })?;
        let line = key.line;

        let mut path: Vec<Segment> = self
            .table(root)
            .map(|table| table.identity.segments.to_vec())
            .unwrap_or_default();
        let mut parent = root;
        for (idx, segment) in key.table_path().iter().enumerate() {
            path.push(segment.clone());
            let identity = TableIdentity::from_segments(&path);
            parent = self.get_or_create_ancestor(root, parent, identity, idx + 1, line)?;
        }

        match &mut self.nodes[key_value.0].kind {
            NodeKind::KeyValueScalar(kv) | NodeKind::KeyValueArray(kv) => kv.key = key.leaf(),
            _ => {}
        }
        self.attach(parent, key_value)?;
        Ok(parent)
    }

    /// Link a detached node under `parent`, refusing name collisions.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.checked(parent)?;
        let child_node = self.checked(child)?;
        if child_node.parent.is_some() {
            return Err(Error::internal_decoding("node is already attached"));
        }
        if let Some(name) = child_node.sibling_name() {
            let clash = self
                .children(parent)
                .iter()
                .copied()
                .find(|sibling| self.node(*sibling).sibling_name() == Some(name));
            if let Some(existing) = clash {
                let both_tables =
                    !child_node.is_key_value() && !self.node(existing).is_key_value();
                let kind = if both_tables {
                    ErrorKind::DuplicateTable
                } else {
                    ErrorKind::DuplicateKey
                };
                return Err(Error::at(
                    kind,
                    child_node.line,
                    format!(
                        "`{name}` is already defined on line {}",
                        self.node(existing).line
                    ),
                ));
            }
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::{parse_key, parse_table_header};
    use crate::value::Value;

    fn declare(tree: &mut Tree, header: &str) -> Result<NodeId> {
        let identity = parse_table_header(header, 1)?;
        let table = tree.new_table(identity, 1, header);
        let root = tree.root();
        tree.insert_table(root, table)
    }

    fn key_value(tree: &mut Tree, key: &str, value: i64) -> NodeId {
        let key = parse_key(key, 1).unwrap();
        tree.new_key_value(key, Value::Integer(value), 1, "")
    }

    #[rstest::rstest]
    fn deep_header_builds_single_chain() {
        let mut tree = Tree::new();
        let identity = parse_table_header("[a.b.c.d]", 1).unwrap();
        let table = tree.new_table(identity, 1, "[a.b.c.d]");
        let root = tree.root();
        let placed = tree.insert_table(root, table).unwrap();
        assert_eq!(placed, table);

        let tables = tree.tables();
        assert_eq!(tables.len(), 4);
        for (level, id) in tables.iter().enumerate() {
            let node = tree.table(*id).unwrap();
            assert_eq!(node.identity.level, level);
            assert_eq!(tree.depth(*id), level);
            assert_eq!(node.is_synthetic, level < 3);
        }
        assert_eq!(tables[3], table);
        assert_eq!(tree.children(tables[2]), &[table]);
    }

    #[rstest::rstest]
    fn dotted_key_value_at_top_level() {
        let mut tree = Tree::new();
        let kv = key_value(&mut tree, "a.b.c", 5);
        let root = tree.root();
        let table = tree.resolve_dotted_key_value(kv, root).unwrap();

        let node = tree.table(table).unwrap();
        assert_eq!(node.identity.full_table_name, "a.b");
        assert_eq!(node.identity.level, 1);
        assert_eq!(tree.key_value(kv).unwrap().key.content, "c");
        assert_eq!(tree.parent(kv), Some(table));
    }

    #[rstest::rstest]
    fn dotted_key_value_names_parent_table() {
        let mut tree = Tree::new();
        let kv = key_value(&mut tree, "google.com", 5);
        let root = tree.root();
        let table = tree.resolve_dotted_key_value(kv, root).unwrap();
        assert_eq!(tree.table(table).unwrap().identity.full_table_name, "google");
        assert_eq!(tree.key_value(kv).unwrap().key.content, "com");
    }

    #[rstest::rstest]
    fn dotted_key_value_inside_table_extends_its_path() {
        let mut tree = Tree::new();
        let server = declare(&mut tree, "[server]").unwrap();
        let kv = key_value(&mut tree, "tls.cert.path", 1);
        let table = tree.resolve_dotted_key_value(kv, server).unwrap();

        let node = tree.table(table).unwrap();
        assert_eq!(node.identity.full_table_name, "server.tls.cert");
        assert_eq!(node.identity.level, 2);
        assert_eq!(tree.depth(table), 2);
    }

    #[rstest::rstest]
    fn shared_prefixes_reuse_existing_tables() {
        let mut tree = Tree::new();
        let root = tree.root();
        let first = key_value(&mut tree, "a.b.x", 1);
        let second = key_value(&mut tree, "a.b.y", 2);
        let t1 = tree.resolve_dotted_key_value(first, root).unwrap();
        let t2 = tree.resolve_dotted_key_value(second, root).unwrap();
        assert_eq!(t1, t2);
        assert_eq!(tree.tables().len(), 2);
        assert_eq!(tree.children(t1), &[first, second]);
    }

    #[rstest::rstest]
    fn reinserting_same_node_is_idempotent() {
        let mut tree = Tree::new();
        let identity = parse_table_header("[a.b]", 1).unwrap();
        let table = tree.new_table(identity, 1, "[a.b]");
        let root = tree.root();
        tree.insert_table(root, table).unwrap();
        assert_eq!(tree.insert_table(root, table).unwrap(), table);
        assert_eq!(tree.tables().len(), 2);
    }

    #[rstest::rstest]
    fn explicit_declaration_replaces_synthetic() {
        let mut tree = Tree::new();
        let child = declare(&mut tree, "[a.b]").unwrap();
        let synthetic = tree.parent(child).unwrap();
        assert!(tree.table(synthetic).unwrap().is_synthetic);

        let explicit = declare(&mut tree, "[a]").unwrap();
        assert_ne!(explicit, synthetic);
        assert_eq!(tree.parent(child), Some(explicit));
        assert_eq!(tree.children(tree.root()), &[explicit]);
        assert!(!tree.table(explicit).unwrap().is_synthetic);
        assert!(tree.parent(synthetic).is_none());
        assert_eq!(tree.tables().len(), 2);
    }

    #[rstest::rstest]
    fn explicit_redeclaration_is_rejected() {
        let mut tree = Tree::new();
        declare(&mut tree, "[a]").unwrap();
        let err = declare(&mut tree, "[a]").unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateTable);
    }

    #[rstest::rstest]
    #[case("[\"a\"]")]
    #[case("['a']")]
    fn quoted_and_bare_names_are_one_table(#[case] header: &str) {
        let mut tree = Tree::new();
        declare(&mut tree, "[a]").unwrap();
        let err = declare(&mut tree, header).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateTable);
        assert_eq!(tree.children(tree.root()).len(), 1);
    }

    #[rstest::rstest]
    fn quoted_dotted_prefix_reuses_bare_table() {
        let mut tree = Tree::new();
        let root = tree.root();
        let first = key_value(&mut tree, "\"a\".b", 1);
        let second = key_value(&mut tree, "a.c", 2);
        let t1 = tree.resolve_dotted_key_value(first, root).unwrap();
        let t2 = tree.resolve_dotted_key_value(second, root).unwrap();
        assert_eq!(t1, t2);
        assert_eq!(tree.children(root), &[t1]);
        assert_eq!(tree.children(t1), &[first, second]);
    }

    #[rstest::rstest]
    fn sibling_tables_with_same_name_collide() {
        let mut tree = Tree::new();
        let root = tree.root();
        let first = declare(&mut tree, "[a]").unwrap();
        let identity = parse_table_header("[\"a\"]", 2).unwrap();
        let second = tree.new_table(identity, 2, "[\"a\"]");
        let err = tree.attach(root, second).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateTable);
        assert_eq!(err.line, Some(2));
        assert_eq!(tree.children(root), &[first]);
    }

    #[rstest::rstest]
    fn foreign_node_ids_are_rejected() {
        let mut big = Tree::new();
        let mut foreign = None;
        for idx in 0..4 {
            foreign = Some(key_value(&mut big, &format!("k{idx}"), 1));
        }
        let foreign = foreign.unwrap();

        let mut tree = Tree::new();
        let root = tree.root();
        let err = tree.attach(root, foreign).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InternalDecoding);
        let err = tree.insert_table(root, foreign).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InternalDecoding);
        let err = tree.resolve_dotted_key_value(foreign, root).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InternalDecoding);
        assert!(tree.get(foreign).is_none());
    }

    #[rstest::rstest]
    fn same_leaf_name_under_different_parents_is_fine() {
        let mut tree = Tree::new();
        declare(&mut tree, "[a.c]").unwrap();
        declare(&mut tree, "[b.c]").unwrap();
        assert_eq!(tree.tables().len(), 4);
    }

    #[rstest::rstest]
    fn duplicate_keys_collide() {
        let mut tree = Tree::new();
        let root = tree.root();
        let first = key_value(&mut tree, "port", 1);
        let second = key_value(&mut tree, "port", 2);
        tree.attach(root, first).unwrap();
        let err = tree.attach(root, second).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateKey);
    }

    #[rstest::rstest]
    fn key_and_table_with_same_name_collide() {
        let mut tree = Tree::new();
        let root = tree.root();
        let kv = key_value(&mut tree, "a", 1);
        tree.attach(root, kv).unwrap();
        let err = declare(&mut tree, "[a]").unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateKey);
    }

    #[rstest::rstest]
    fn ambiguous_tables_are_reported() {
        let mut tree = Tree::new();
        let root = tree.root();
        for _ in 0..2 {
            let identity = parse_table_header("[twin]", 1).unwrap();
            let table = tree.new_table(identity, 1, "[twin]");
            tree.nodes[table.0].parent = Some(root);
            tree.nodes[root.0].children.push(table);
        }
        let identity = parse_table_header("[twin.x]", 2).unwrap();
        let table = tree.new_table(identity, 2, "[twin.x]");
        let err = tree.insert_table(root, table).unwrap_err();
        assert_eq!(err.kind, ErrorKind::AmbiguousTable);
        assert!(err.kind.is_internal());
    }

    #[rstest::rstest]
    fn find_tables_filters_by_depth() {
        let mut tree = Tree::new();
        declare(&mut tree, "[a.a]").unwrap();
        let root = tree.root();
        assert_eq!(tree.find_tables(root, 1, |t| t.name == "a").len(), 1);
        assert_eq!(tree.find_tables(root, 2, |t| t.name == "a").len(), 1);
        assert_eq!(tree.find_tables(root, 3, |t| t.name == "a").len(), 0);
    }
}
