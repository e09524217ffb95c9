use tracing::debug;

use super::scan::{scan_declarations, DeclarationKind};
use crate::text::{parse_key, parse_table_header};
use crate::tree::Tree;
use crate::value::parse_primitive_value;
use crate::Result;

/// Build the tree for a whole document.
pub fn parse_document(input: &str) -> Result<Tree> {
    let declarations = scan_declarations(input)?;
    let mut tree = Tree::new();
    let root = tree.root();
    let mut current = root;

    for declaration in declarations {
        let line = declaration.line;
        match declaration.kind {
            DeclarationKind::TableHeader(header) => {
                let identity = parse_table_header(header, line)?;
                let table = tree.new_table(identity, line, declaration.content);
                current = tree.insert_table(root, table)?;
            }
            DeclarationKind::KeyValue { key, value } => {
                let key = parse_key(key, line)?;
                let value = parse_primitive_value(&value, line)?;
                let dotted = key.is_dotted;
                let node = tree.new_key_value(key, value, line, declaration.content);
                if dotted {
                    tree.resolve_dotted_key_value(node, current)?;
                } else {
                    tree.attach(current, node)?;
                }
            }
        }
    }

    tree.finish();
    debug!(nodes = tree.descendants(root).len(), "document assembled");
    Ok(tree)
}
