//! Scenario tests for generations, deltas and chains
//!
//! Most scenarios run twice: with the lookup caches on and off.
//!
//! Author: Moroya Sakamoto

use watson::{
    find_oldest, has_changes, AcceptAll, ComparisonKind, DefaultElementComparator, DeltaIterator,
    ElementDelta, ElementPath, ElementTree, NodeComparison, TreeConfig, TreeError, K_NO_CHANGE,
};

// ── Fixture ────────────────────────────────────────────────────────────

const SOLUTION: &str = "/solution";
const PROJECT1: &str = "/solution/project1";
const PROJECT2: &str = "/solution/project2";
const FILE1: &str = "/solution/project2/file1";
const FOLDER1: &str = "/solution/project2/folder1";
const FILE2: &str = "/solution/project2/folder1/file2";
const FOLDER3: &str = "/solution/project2/folder1/folder3";
const FILE3: &str = "/solution/project2/folder1/folder3/file3";
const FOLDER4: &str = "/solution/project2/folder1/folder4";
const FOLDER2: &str = "/solution/project2/folder2";

const TREE_PATHS: [&str; 10] = [
    SOLUTION, PROJECT1, PROJECT2, FILE1, FOLDER1, FILE2, FOLDER3, FILE3, FOLDER4, FOLDER2,
];

const PROJECT3: &str = "/solution/project3";
const FILE4: &str = "/solution/project2/file4";
const FILE5: &str = "/solution/project2/folder1/file5";

fn p(s: &str) -> ElementPath {
    ElementPath::parse(s)
}

fn s(v: &str) -> Option<String> {
    Some(v.to_string())
}

fn configs() -> [TreeConfig; 2] {
    [TreeConfig::default(), TreeConfig { lookup_cache: false, ..TreeConfig::default() }]
}

/// Every element's payload is its own name.
fn fixture(config: TreeConfig) -> ElementTree<String> {
    let tree = ElementTree::with_config(config);
    for path in TREE_PATHS {
        let path = p(path);
        tree.create_element(&path, path.last_segment().map(str::to_string)).unwrap();
    }
    tree
}

fn assert_tree_structure(tree: &ElementTree<String>) {
    for path in TREE_PATHS {
        let path = p(path);
        assert!(tree.includes(&path), "missing {path}");
        assert_eq!(tree.get_element_data(&path).unwrap().as_deref(), path.last_segment());
    }
    assert_eq!(tree.get_child_count(Some(&p(SOLUTION))).unwrap(), 2);
    assert_eq!(tree.get_child_count(Some(&p(PROJECT2))).unwrap(), 3);
    assert_eq!(tree.get_child_count(Some(&p(FOLDER1))).unwrap(), 3);
    assert_eq!(tree.get_child_count(Some(&p(FOLDER3))).unwrap(), 1);
}

fn assert_no_paths(tree: &ElementTree<String>, paths: &[&str]) {
    for path in paths {
        assert!(!tree.includes(&p(path)), "unexpected {path}");
    }
}

// ── Mutation ───────────────────────────────────────────────────────────

#[test]
fn test_child_creation() {
    for config in configs() {
        let tree = fixture(config.clone());
        assert_tree_structure(&tree);

        let empty = ElementTree::<String>::with_config(config);
        let only = p("/only");
        assert!(!empty.includes(&only));
        empty.create_element(&only, s("4")).unwrap();
        assert!(empty.includes(&only));

        let orphan = p("/bogus/figment");
        assert!(matches!(empty.create_element(&orphan, None), Err(TreeError::ElementNotFound(_))));
        assert!(!empty.includes(&orphan));

        tree.immutable();
        assert!(matches!(tree.create_element(&only, s("4")), Err(TreeError::IllegalState(_))));
        assert!(!tree.includes(&only));

        let delta = tree.new_empty_delta();
        assert!(!delta.includes(&only));
        delta.create_element(&only, s("4")).unwrap();
        assert!(delta.includes(&only));
        assert!(!tree.includes(&only));
    }
}

#[test]
fn test_child_deletion() {
    for config in configs() {
        let tree = fixture(config.clone());
        for path in TREE_PATHS.iter().rev() {
            let path = p(path);
            assert!(tree.includes(&path));
            tree.delete_element(&path).unwrap();
            assert!(!tree.includes(&path));
        }

        let tree = fixture(config.clone());
        tree.delete_element(&p(SOLUTION)).unwrap();
        assert_no_paths(&tree, &TREE_PATHS);

        let tree = fixture(config);
        tree.delete_element(&p(FOLDER1)).unwrap();
        assert_no_paths(&tree, &[FOLDER1, FOLDER3, FILE3]);
    }
}

#[test]
fn test_delete_drops_exactly_one_child() {
    for config in configs() {
        let base = fixture(config);
        let tree = base.new_empty_delta();
        let before = tree.get_child_count(Some(&p(FOLDER1))).unwrap();
        tree.delete_element(&p(FOLDER3)).unwrap();
        assert_eq!(tree.get_child_count(Some(&p(FOLDER1))).unwrap(), before - 1);
        assert!(!tree.includes(&p(FILE3)));
        assert!(base.includes(&p(FILE3)));
    }
}

#[test]
fn test_child_replacement() {
    for config in configs() {
        let tree = fixture(config);
        for info in [s("New Info"), None, s("New Info")] {
            tree.create_element(&p(FOLDER1), info.clone()).unwrap();
            assert_eq!(tree.get_child_count(Some(&p(PROJECT2))).unwrap(), 3);
            assert_eq!(tree.get_element_data(&p(FOLDER1)).unwrap(), info);
            assert_no_paths(&tree, &[FILE2, FOLDER3, FOLDER4]);
        }
    }
}

#[test]
fn test_bottom_up_creation() {
    use watson::ElementSubtree;

    let tree = ElementTree::new();
    tree.create_element(&p("/sol1"), s("ROOTS")).unwrap();
    let project = ElementSubtree::new("TestProject", s("INFO 3")).with_children(vec![
        ElementSubtree::new("TestFile1", s("INFO 1")),
        ElementSubtree::new("TestFile2", s("INFO 2")),
    ]);
    let subtree = ElementTree::from_element_subtree(project);
    tree.create_subtree(&p("/sol1/TestProject"), &subtree).unwrap();

    let created = [
        "/sol1/TestProject",
        "/sol1/TestProject/TestFile1",
        "/sol1/TestProject/TestFile2",
    ];
    for path in created {
        assert!(tree.includes(&p(path)));
    }
    assert_eq!(tree.get_element_data(&p("/sol1/TestProject/TestFile2")).unwrap(), s("INFO 2"));
}

/// Set, clear, then set again.
fn info_values() -> [(Option<String>, Option<String>); 3] {
    [
        (s("New Info"), s("class")),
        (None, None),
        (s("New Info"), s("class")),
    ]
}

#[test]
fn test_set_info() {
    for config in configs() {
        let tree = fixture(config);
        for (solution, file2) in info_values() {
            tree.set_element_data(&p(SOLUTION), solution.clone()).unwrap();
            tree.set_element_data(&p(FILE2), file2.clone()).unwrap();
            assert_eq!(tree.get_element_data(&p(SOLUTION)).unwrap(), solution);
            assert_eq!(tree.get_element_data(&p(FILE2)).unwrap(), file2);
        }
    }
}

#[test]
fn test_set_info_in_delta() {
    for config in configs() {
        let tree = fixture(config);
        tree.immutable();
        let delta = tree.new_empty_delta();
        for (solution, file2) in info_values() {
            delta.set_element_data(&p(SOLUTION), solution.clone()).unwrap();
            delta.set_element_data(&p(FILE2), file2.clone()).unwrap();
            assert_eq!(delta.get_element_data(&p(SOLUTION)).unwrap(), solution);
            assert_eq!(delta.get_element_data(&p(FILE2)).unwrap(), file2);
        }
        assert_tree_structure(&tree);
    }
}

#[test]
fn test_set_info_in_delta_leaves_parent_alone() {
    for config in configs() {
        let tree = fixture(config);
        tree.set_element_data(&p(SOLUTION), s("New Info")).unwrap();
        tree.set_element_data(&p(FILE2), s("class")).unwrap();

        let delta = tree.new_empty_delta();
        delta.set_element_data(&p(SOLUTION), None).unwrap();
        delta.set_element_data(&p(FILE2), None).unwrap();
        assert_eq!(delta.get_element_data(&p(SOLUTION)).unwrap(), None);
        assert_eq!(delta.get_element_data(&p(FILE2)).unwrap(), None);
        assert_eq!(tree.get_element_data(&p(SOLUTION)).unwrap(), s("New Info"));
        assert_eq!(tree.get_element_data(&p(FILE2)).unwrap(), s("class"));
    }
}

// ── Freezing and branching ─────────────────────────────────────────────

#[test]
fn test_frozen_generation_rejects_mutation_and_keeps_content() {
    for config in configs() {
        let tree = fixture(config);
        let before = tree.to_debug_string();
        tree.immutable();

        let file2 = p(FILE2);
        assert!(matches!(tree.create_element(&p("/x"), None), Err(TreeError::IllegalState(_))));
        assert!(matches!(tree.delete_element(&file2), Err(TreeError::IllegalState(_))));
        assert!(matches!(tree.set_element_data(&file2, None), Err(TreeError::IllegalState(_))));
        assert!(matches!(
            tree.open_element_data(&file2, |data| data.push('!')),
            Err(TreeError::IllegalState(_))
        ));
        assert_eq!(tree.to_debug_string(), before);

        // Branching reroots the chain; the frozen content must not move.
        let next = tree.new_empty_delta();
        next.delete_element(&p(PROJECT2)).unwrap();
        next.immutable();
        assert_eq!(tree.to_debug_string(), before);
    }
}

#[test]
fn test_branch_reads_through_to_parent() {
    for config in configs() {
        let tree = fixture(config);
        let next = tree.new_empty_delta();
        for path in TREE_PATHS {
            let path = p(path);
            let expected = tree.get_element_data(&path).unwrap();
            assert_eq!(next.get_element_data(&path).unwrap(), expected);
        }
    }
}

#[test]
fn test_open_element_data_copies_on_write() {
    for config in configs() {
        let tree = fixture(config);
        let next = tree.new_empty_delta();
        let len = next.open_element_data(&p(FILE2), |data| {
            data.push_str("-edited");
            data.len()
        });
        assert_eq!(len.unwrap(), Some("file2-edited".len()));
        assert_eq!(next.get_element_data(&p(FILE2)).unwrap(), s("file2-edited"));
        assert_eq!(tree.get_element_data(&p(FILE2)).unwrap(), s("file2"));
    }
}

#[test]
fn test_added_then_deleted_scenario() {
    let t0 = ElementTree::<String>::new();
    t0.immutable();
    let t1 = t0.new_empty_delta();
    t1.create_element(&p("/a"), s("X")).unwrap();
    t1.immutable();

    let delta = t1.compute_delta_with(&t0, DefaultElementComparator).unwrap();
    let added = delta.element_delta(&p("/a")).unwrap();
    assert_eq!(added.kind(), ComparisonKind::Added);
    assert_eq!(added.new_data().map(String::as_str), Some("X"));

    let t2 = t1.new_empty_delta();
    t2.create_element(&p("/a/b"), s("Y")).unwrap();
    t2.delete_element(&p("/a")).unwrap();
    assert_eq!(t2.get_child_count(None).unwrap(), 1);
    assert_eq!(t2.get_child_count(Some(&ElementPath::root())).unwrap(), 0);
    assert!(!t2.includes(&p("/a/b")));
}

// ── Deltas ─────────────────────────────────────────────────────────────

/// Add project3, delete file1, change folder2, add file4 and file5,
/// delete file3.
fn changed(base: &ElementTree<String>) -> ElementTree<String> {
    let tree = base.new_empty_delta();
    tree.create_element(&p(PROJECT3), s("project3")).unwrap();
    tree.delete_element(&p(FILE1)).unwrap();
    tree.create_element(&p(FOLDER2), s("ChangedData")).unwrap();
    tree.create_element(&p(FILE4), s("file4")).unwrap();
    tree.create_element(&p(FILE5), s("file5")).unwrap();
    tree.delete_element(&p(FILE3)).unwrap();

    let expected = [
        SOLUTION, PROJECT1, PROJECT2, PROJECT3, FILE2, FILE4, FILE5, FOLDER1, FOLDER2, FOLDER3,
        FOLDER4,
    ];
    for path in expected {
        assert!(tree.includes(&p(path)), "missing {path}");
    }
    assert_no_paths(&tree, &[FILE1, FILE3]);
    tree
}

fn children(delta: &ElementDelta<String>) -> Vec<ElementDelta<String>> {
    delta.affected_children(&AcceptAll)
}

fn assert_entry(delta: &ElementDelta<String>, path: &str, kind: ComparisonKind) {
    assert_eq!(delta.path(), &p(path));
    assert_eq!(delta.kind(), kind, "kind of {path}");
}

fn assert_leaf(delta: &ElementDelta<String>, path: &str, kind: ComparisonKind) {
    assert_entry(delta, path, kind);
    assert!(children(delta).is_empty(), "{path} has affected children");
}

fn assert_no_change(delta: &ElementDelta<String>, path: &str) {
    assert_entry(delta, path, ComparisonKind::Changed);
    assert_eq!(delta.comparison(), K_NO_CHANGE);
}

/// `created` is the kind reported for elements the edit added.
fn check_project2(project2: &ElementDelta<String>, created: ComparisonKind) {
    let deleted = match created {
        ComparisonKind::Added => ComparisonKind::Removed,
        _ => ComparisonKind::Added,
    };
    let kids = children(project2);
    assert_eq!(kids.len(), 4);
    assert_leaf(&kids[0], FILE1, deleted);
    assert_leaf(&kids[1], FILE4, created);
    assert_no_change(&kids[2], FOLDER1);
    assert_leaf(&kids[3], FOLDER2, ComparisonKind::Changed);
    assert_ne!(kids[3].comparison(), K_NO_CHANGE);

    let folder1 = children(&kids[2]);
    assert_eq!(folder1.len(), 2);
    assert_leaf(&folder1[0], FILE5, created);
    assert_no_change(&folder1[1], FOLDER3);

    let folder3 = children(&folder1[1]);
    assert_eq!(folder3.len(), 1);
    assert_leaf(&folder3[0], FILE3, deleted);
}

fn check_solution(solution: &ElementDelta<String>, created: ComparisonKind) {
    assert_no_change(solution, SOLUTION);
    let kids = children(solution);
    assert_eq!(kids.len(), 2);
    assert_no_change(&kids[0], PROJECT2);
    assert_leaf(&kids[1], PROJECT3, created);
    check_project2(&kids[0], created);
}

fn check_root(delta: &watson::ElementTreeDelta<String>, created: ComparisonKind) {
    assert!(delta.element_delta(&p("/bogosity")).is_none());
    assert!(delta.element_delta(&p(PROJECT2).append("bogosity")).is_none());
    let root = delta.element_delta(&ElementPath::root()).unwrap();
    let kids = children(&root);
    assert_eq!(kids.len(), 1);
    check_solution(&kids[0], created);
}

#[test]
fn test_compute_delta_with_older_edit() {
    for config in configs() {
        let base = fixture(config);
        let edited = changed(&base);
        // Going from the edited tree back to the base undoes every edit.
        let delta = base.compute_delta_with(&edited, DefaultElementComparator).unwrap();
        check_root(&delta, ComparisonKind::Removed);
    }
}

#[test]
fn test_compute_delta_with_newer_edit() {
    for config in configs() {
        let base = fixture(config);
        let edited = changed(&base);
        let delta = edited.compute_delta_with(&base, DefaultElementComparator).unwrap();
        check_root(&delta, ComparisonKind::Added);
    }
}

#[test]
fn test_compute_delta_with_unrelated_tree() {
    for config in configs() {
        let base = fixture(config.clone());
        let edited = changed(&base);
        let copy = fixture(config);
        let delta = edited.compute_delta_with(&copy, DefaultElementComparator).unwrap();
        check_root(&delta, ComparisonKind::Added);
    }
}

#[test]
fn test_compute_leaf_delta() {
    let base = fixture(TreeConfig::default());
    let edited = changed(&base);
    let delta = base
        .compute_delta_with_path(&edited, DefaultElementComparator, &p(FILE3))
        .unwrap();
    assert!(delta.element_delta(&p("/bogosity")).is_none());
    let root = delta.element_delta(&ElementPath::root()).unwrap();
    assert_leaf(&root, FILE3, ComparisonKind::Added);
}

#[test]
fn test_compute_project_delta() {
    let base = fixture(TreeConfig::default());
    let edited = changed(&base);
    let delta = base
        .compute_delta_with_path(&edited, DefaultElementComparator, &p(PROJECT2))
        .unwrap();
    assert!(delta.element_delta(&p("/bogosity")).is_none());
    let root = delta.element_delta(&ElementPath::root()).unwrap();
    assert_no_change(&root, PROJECT2);
    check_project2(&root, ComparisonKind::Removed);
}

#[test]
fn test_compute_solution_delta() {
    let base = fixture(TreeConfig::default());
    let edited = changed(&base);
    let delta = base
        .compute_delta_with_path(&edited, DefaultElementComparator, &p(SOLUTION))
        .unwrap();
    let root = delta.element_delta(&ElementPath::root()).unwrap();
    check_solution(&root, ComparisonKind::Removed);
}

#[test]
fn test_removed_subtree_iterates_as_removed() {
    for config in configs() {
        let base = fixture(config);
        let next = base.new_empty_delta();
        next.delete_element(&p(PROJECT2)).unwrap();
        let delta = next.compute_delta_with(&base, DefaultElementComparator).unwrap();

        let mut pre = Vec::new();
        let mut record_pre = |path: &ElementPath, c: &NodeComparison<String>| {
            pre.push((path.clone(), c.kind));
            true
        };
        DeltaIterator::pre_order().iterate(&delta, &mut record_pre);
        let mut post = Vec::new();
        let mut record_post = |path: &ElementPath, _: &NodeComparison<String>| {
            post.push(path.clone());
            true
        };
        DeltaIterator::post_order().iterate(&delta, &mut record_post);

        let project2 = p(PROJECT2);
        let removed: Vec<_> = pre.iter().filter(|(path, _)| project2.is_prefix_of(path)).collect();
        // project2 plus its seven descendants
        assert_eq!(removed.len(), 8);
        assert!(removed.iter().all(|(_, kind)| *kind == ComparisonKind::Removed));

        let position = |list: &[ElementPath], path: &ElementPath| {
            list.iter().position(|q| q == path).unwrap()
        };
        let pre_paths: Vec<ElementPath> = pre.iter().map(|(path, _)| path.clone()).collect();
        for path in &pre_paths {
            if let Some(parent) = path.parent() {
                assert!(position(&pre_paths, &parent) < position(&pre_paths, path));
                assert!(position(&post, &parent) > position(&post, path));
            }
        }
    }
}

// ── Subtrees ───────────────────────────────────────────────────────────

fn copy_subtree(old: &ElementTree<String>, new: &ElementTree<String>, key: &ElementPath) {
    match new.create_subtree(key, &old.get_subtree(key).unwrap()) {
        Ok(()) => {}
        Err(TreeError::IllegalArgument(_)) => assert!(key.is_root()),
        Err(err) => panic!("unexpected error copying {key}: {err}"),
    }
    for child in old.get_children(Some(key)).unwrap() {
        copy_subtree(old, new, &child);
    }
}

#[test]
fn test_copy_subtrees() {
    for config in configs() {
        let tree = fixture(config.clone());
        let copy = ElementTree::with_config(config);
        copy_subtree(&tree, &copy, &ElementPath::root());
        assert_tree_structure(&copy);
        assert_tree_structure(&tree);
    }
}

#[test]
fn test_copy_subtrees_in_delta() {
    for config in configs() {
        let tree = fixture(config);
        let copy = tree.new_empty_delta();
        copy_subtree(&tree, &copy, &ElementPath::root());
        assert!(copy.has_ancestor(&tree));
        assert_tree_structure(&copy);
        assert_tree_structure(&tree);
    }
}

#[test]
fn test_get_subtree() {
    let tree = fixture(TreeConfig::default());
    assert_tree_structure(&tree.get_subtree(&ElementPath::root()).unwrap());
}

// ── Chains ─────────────────────────────────────────────────────────────

/// A chain of edits that ends with the same content as `base`.
fn build_delta_chain(base: &ElementTree<String>) -> ElementTree<String> {
    let project3 = p(PROJECT3);
    let tree1 = base.new_empty_delta();
    tree1.create_element(&project3, None).unwrap();
    tree1.immutable();
    assert!(tree1.has_ancestor(base));

    let tree2 = tree1.new_empty_delta();
    tree2.set_element_data(&project3, s("Hello")).unwrap();
    tree2.immutable();

    let tree3 = tree2.new_empty_delta();
    tree3.set_element_data(&project3, None).unwrap();
    tree3.immutable();

    let tree4 = tree3.new_empty_delta();
    tree4.delete_element(&project3).unwrap();
    assert_tree_structure(&tree4);

    let file33 = p(FOLDER2).append("file33");
    tree4.create_element(&file33, None).unwrap();
    tree4.immutable();

    let tree5 = tree4.new_empty_delta();
    tree5.set_element_data(&file33, s("Hello")).unwrap();
    tree5.immutable();

    let tree6 = tree5.new_empty_delta();
    tree6.set_element_data(&file33, None).unwrap();
    tree6.immutable();

    let tree7 = tree6.new_empty_delta();
    tree7.delete_element(&file33).unwrap();
    tree7.immutable();
    assert!(tree7.has_ancestor(base));
    assert_eq!(tree7.delta_depth(), 7);
    assert_tree_structure(&tree7);
    tree7
}

fn chain_config(lookup_cache: bool) -> TreeConfig {
    TreeConfig { lookup_cache, reroot_on_freeze: false }
}

#[test]
fn test_make_complete() {
    for lookup_cache in [true, false] {
        let base = fixture(chain_config(lookup_cache));
        let deep = build_delta_chain(&base);
        deep.make_complete();
        assert_eq!(deep.delta_depth(), 0);
        assert!(deep.get_parent().is_none());
        assert!(!base.has_ancestor(&deep));
        assert_tree_structure(&deep);
    }
}

#[test]
fn test_collapse_preserves_content() {
    for lookup_cache in [true, false] {
        let base = fixture(chain_config(lookup_cache));
        let deep = build_delta_chain(&base);
        let snapshot = deep.get_subtree(&ElementPath::root()).unwrap();

        deep.collapse_to(&base).unwrap();
        assert!(deep.get_parent().is_some_and(|parent| parent.ptr_eq(&base)));
        assert_eq!(deep.delta_depth(), 1);
        assert_tree_structure(&deep);

        let delta = deep.compute_delta_with(&snapshot, DefaultElementComparator).unwrap();
        let root = delta.element_delta(&ElementPath::root()).unwrap();
        assert!(children(&root).is_empty());
    }
}

#[test]
fn test_collapse_toward_rerooted_tip() {
    for config in configs() {
        let t0 = fixture(config);
        let t1 = t0.new_empty_delta();
        t1.create_element(&p(PROJECT3), s("project3")).unwrap();
        let t2 = t1.new_empty_delta();
        t2.set_element_data(&p(PROJECT3), s("Hello")).unwrap();
        t2.immutable();

        // Rerooting left the newest generation complete at the bottom.
        assert_eq!(t0.delta_depth(), 2);
        let before = t0.to_debug_string();

        t0.collapse_to(&t2).unwrap();
        assert!(t0.get_parent().is_some_and(|parent| parent.ptr_eq(&t2)));
        assert_eq!(t0.delta_depth(), 1);
        assert_eq!(t0.to_debug_string(), before);
        assert_tree_structure(&t0);
        assert!(!t0.includes(&p(PROJECT3)));
        assert_eq!(t2.get_element_data(&p(PROJECT3)).unwrap(), s("Hello"));

        assert!(matches!(t2.collapse_to(&t0), Err(TreeError::IllegalArgument(_))));
    }
}

#[test]
fn test_collapse_requires_frozen() {
    let base = fixture(TreeConfig::default());
    let open = base.new_empty_delta();
    assert!(matches!(open.collapse_to(&base), Err(TreeError::IllegalState(_))));
}

#[test]
fn test_find_oldest_reaches_all_others() {
    for reroot_on_freeze in [true, false] {
        let config = TreeConfig { reroot_on_freeze, ..TreeConfig::default() };
        let t0 = fixture(config);
        let t1 = t0.new_empty_delta();
        t1.create_element(&p(PROJECT3), None).unwrap();
        let t2 = t1.new_empty_delta();
        t2.delete_element(&p(PROJECT1)).unwrap();
        t2.immutable();

        let trees = vec![t1.clone(), t2.clone(), t0.clone()];
        let oldest = &trees[find_oldest(&trees).unwrap()];
        for other in &trees {
            assert!(other.ptr_eq(oldest) || oldest.has_ancestor(other));
        }
    }
}

#[test]
fn test_has_changes_across_chain() {
    let base = fixture(TreeConfig::default());
    let same = base.new_empty_delta();
    same.immutable();
    assert!(!has_changes(Some(&same), Some(&base), &DefaultElementComparator, true));

    let edited = same.new_empty_delta();
    edited.delete_element(&p(FILE2)).unwrap();
    edited.immutable();
    assert!(has_changes(Some(&edited), Some(&base), &DefaultElementComparator, true));
}

#[test]
fn test_merge_delta_chain_replays_project() {
    let source = fixture(TreeConfig::default());
    let s1 = source.new_empty_delta();
    s1.create_element(&p(FILE4), s("file4")).unwrap();
    let s2 = s1.new_empty_delta();
    s2.delete_element(&p(FILE1)).unwrap();
    s2.immutable();

    let target = fixture(TreeConfig::default());
    let tip = target.merge_delta_chain(&p(PROJECT2), &[s2, s1]).unwrap();
    assert!(!tip.is_immutable());
    assert!(tip.includes(&p(FILE4)));
    assert!(!tip.includes(&p(FILE1)));
    assert!(tip.includes(&p(PROJECT1)));
    assert!(target.is_immutable());
}

// ── Regressions ────────────────────────────────────────────────────────

#[test]
fn test_deleted_elements_are_not_listed() {
    for config in configs() {
        let (a, ax, b) = (p("/A"), p("/A/AX"), p("/B"));
        let t1 = ElementTree::<()>::with_config(config);
        t1.create_element(&a, Some(())).unwrap();
        t1.create_element(&ax, Some(())).unwrap();
        t1.create_element(&b, Some(())).unwrap();
        t1.immutable();

        let root = ElementPath::root();
        assert_eq!(t1.get_children(Some(&root)).unwrap().len(), 2);

        let t2 = t1.new_empty_delta();
        t2.delete_element(&b).unwrap();
        let roots = t2.get_children(Some(&root)).unwrap();
        t2.delete_element(&ax).unwrap();
        let kids = t2.get_children(Some(&a)).unwrap();

        assert!(t2.includes(&a));
        assert!(!t2.includes(&ax));
        assert!(!t2.includes(&b));
        assert!(kids.is_empty());
        assert_eq!(roots, vec![a.clone()]);
    }
}

#[test]
fn test_subtree_of_branch_has_named_root() {
    let t0 = ElementTree::<()>::new();
    let project = p("/ZZProject");
    t0.create_element(&project, Some(())).unwrap();
    t0.immutable();

    let t2 = t0.new_empty_delta();
    t2.create_element(&project.append("posterchild"), Some(())).unwrap();
    let sub = t2.get_subtree(&project).unwrap();
    let roots = sub.get_children(Some(&ElementPath::root())).unwrap();
    assert_eq!(roots[0].last_segment(), Some("ZZProject"));
}

#[test]
fn test_recreated_child_keeps_older_generations_intact() {
    let (a, b) = (p("/A"), p("/A/B"));
    let t1 = ElementTree::new();
    t1.create_element(&a, s("Element A")).unwrap();
    t1.immutable();

    let t2 = t1.new_empty_delta();
    t2.create_element(&b, s("Element B")).unwrap();
    t2.immutable();
    let t3 = t2.new_empty_delta();
    t3.delete_element(&b).unwrap();
    t3.create_element(&b, s("New Content")).unwrap();
    t3.immutable();

    let dump = t1.to_debug_string();
    assert!(dump.contains("/A"));
    assert!(!t1.includes(&b));
    assert_eq!(t2.get_element_data(&b).unwrap(), s("Element B"));
    assert_eq!(t3.get_element_data(&b).unwrap(), s("New Content"));
}
