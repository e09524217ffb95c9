use indoc::indoc;
use rstest::rstest;
use toml_tree::{parse_tree, ErrorKind, NodeKind, Tree};

fn table_names(tree: &Tree) -> Vec<String> {
    tree.tables()
        .into_iter()
        .map(|id| tree.table(id).unwrap().identity.full_table_name.clone())
        .collect()
}

#[rstest]
fn every_table_lists_its_prefixes() {
    let tree = parse_tree(indoc! {"
        [a]
        [a.b]
        [a.b.c]
        [x.\"y.z\"]
        [q]
    "})
    .unwrap();
    for id in tree.tables() {
        let table = tree.table(id).unwrap();
        let identity = &table.identity;
        assert_eq!(identity.tables_list.len(), identity.level + 1);
        assert_eq!(identity.tables_list.last().unwrap(), &identity.full_table_name);
        assert_eq!(tree.depth(id), identity.level);
    }
}

#[rstest]
fn dotted_keys_and_headers_share_tables() {
    let tree = parse_tree(indoc! {"
        site.name = \"home\"
        site.owner.email = \"a@b\"
        [site.owner]
        phone = \"1\"
    "})
    .unwrap();
    assert_eq!(table_names(&tree), vec!["site", "site.owner"]);
    let owner = tree.tables()[1];
    assert!(!tree.table(owner).unwrap().is_synthetic);
    let names: Vec<_> = tree
        .children(owner)
        .iter()
        .filter_map(|id| tree.get(*id).and_then(|node| node.declared_name()))
        .collect();
    assert_eq!(names, vec!["email", "phone"]);
}

#[rstest]
fn quoted_dots_do_not_nest() {
    let tree = parse_tree("\"a.b\" = 1\n[\"c.d\"]\n").unwrap();
    assert_eq!(table_names(&tree), vec!["\"c.d\""]);
    let first = tree.children(tree.root())[0];
    assert_eq!(tree.get(first).unwrap().declared_name(), Some("a.b"));
}

#[rstest]
fn parents_are_linked_both_ways() {
    let tree = parse_tree("[a.b]\nk = 1\n").unwrap();
    for id in tree.descendants(tree.root()) {
        let parent = tree.parent(id).unwrap();
        assert!(tree.children(parent).contains(&id));
    }
}

#[rstest]
fn stubs_only_under_tables_without_values() {
    let tree = parse_tree("[a]\n[b]\nk = 1\n[c.d]\n").unwrap();
    let stubbed: Vec<_> = tree
        .tables()
        .into_iter()
        .filter(|id| {
            tree.children(*id)
                .iter()
                .any(|child| matches!(tree.get(*child).unwrap().kind, NodeKind::EmptyTableStub))
        })
        .map(|id| tree.table(id).unwrap().identity.full_table_name.clone())
        .collect();
    assert_eq!(stubbed, vec!["a", "c", "c.d"]);
}

#[rstest]
#[case("[[products]]\nname = 1", ErrorKind::Unsupported)]
#[case("inline = { a = 1 }", ErrorKind::Unsupported)]
#[case("[a]\nb = 1\n[a.b]", ErrorKind::DuplicateKey)]
#[case("[ok]\n[ok]", ErrorKind::DuplicateTable)]
#[case("a = 'unterminated", ErrorKind::InvalidValue)]
fn rejects_invalid_documents(#[case] input: &str, #[case] kind: ErrorKind) {
    assert_eq!(parse_tree(input).unwrap_err().kind, kind);
    assert!(toml_tree::validate_str(input).is_err());
}
