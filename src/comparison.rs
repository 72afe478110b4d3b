//! Structural diff records
//!
//! Comparing two assembled trees yields a [`DiffNode`] tree. Each entry
//! pairs a structural [`ComparisonKind`] with the comparator's opaque
//! user code, as two separate fields.
//!
//! Author: Moroya Sakamoto

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::comparator::{ElementComparator, K_NO_CHANGE};
use crate::node::DataNode;
use crate::path::{ElementPath, Name};

/// Structural classification of a diff entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonKind {
    /// Present on both sides.
    Changed,
    /// Present only in the new generation.
    Added,
    /// Present only in the old generation.
    Removed,
}

/// Per-node record produced by a structural diff.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeComparison<T> {
    pub old_data: Option<T>,
    pub new_data: Option<T>,
    pub kind: ComparisonKind,
    /// Comparator code; [`K_NO_CHANGE`] for pure carrier nodes.
    pub user_comparison: i32,
}

impl<T> NodeComparison<T> {
    pub fn new(
        old_data: Option<T>,
        new_data: Option<T>,
        kind: ComparisonKind,
        user_comparison: i32,
    ) -> Self {
        Self {
            old_data,
            new_data,
            kind,
            user_comparison,
        }
    }

    pub fn is_added(&self) -> bool {
        self.kind == ComparisonKind::Added
    }

    pub fn is_removed(&self) -> bool {
        self.kind == ComparisonKind::Removed
    }

    pub fn is_changed(&self) -> bool {
        self.kind == ComparisonKind::Changed
    }
}

/// One node of a diff tree.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffNode<T> {
    pub comparison: NodeComparison<T>,
    pub children: BTreeMap<Name, Arc<DiffNode<T>>>,
}

impl<T> DiffNode<T> {
    /// Entry at `relative`, walking down from this node.
    pub fn find(&self, relative: &ElementPath) -> Option<&DiffNode<T>> {
        let mut current = self;
        for segment in relative.segments() {
            current = current.children.get(segment)?;
        }
        Some(current)
    }

    pub fn find_arc(self: &Arc<Self>, relative: &ElementPath) -> Option<Arc<DiffNode<T>>> {
        let mut current = Arc::clone(self);
        for segment in relative.segments() {
            let next = Arc::clone(current.children.get(segment)?);
            current = next;
        }
        Some(current)
    }
}

// ── Comparison ─────────────────────────────────────────────

/// Diff two complete nodes. The returned root is always present; below
/// it, nodes on both sides appear only if their code is non-zero or a
/// descendant differs.
pub(crate) fn compare_nodes<T: Clone>(
    old: &Arc<DataNode<T>>,
    new: &Arc<DataNode<T>>,
    comparator: &dyn ElementComparator<T>,
) -> DiffNode<T> {
    let user = comparator.compare(old.data(), new.data());
    DiffNode {
        comparison: NodeComparison::new(
            old.data().cloned(),
            new.data().cloned(),
            ComparisonKind::Changed,
            user,
        ),
        children: compare_children(old, new, comparator),
    }
}

fn compare_children<T: Clone>(
    old: &Arc<DataNode<T>>,
    new: &Arc<DataNode<T>>,
    comparator: &dyn ElementComparator<T>,
) -> BTreeMap<Name, Arc<DiffNode<T>>> {
    let mut out = BTreeMap::new();
    if Arc::ptr_eq(old, new) {
        return out;
    }
    let empty = BTreeMap::new();
    let old_children = old.children().unwrap_or(&empty);
    let new_children = new.children().unwrap_or(&empty);

    for (name, old_child) in old_children {
        let entry = match new_children.get(name) {
            Some(new_child) => {
                let diff = compare_nodes(old_child, new_child, comparator);
                if diff.comparison.user_comparison == K_NO_CHANGE && diff.children.is_empty() {
                    continue;
                }
                diff
            }
            None => leaf(old_child.data().cloned(), None, ComparisonKind::Removed, comparator),
        };
        out.insert(Name::clone(name), Arc::new(entry));
    }
    for (name, new_child) in new_children {
        if !old_children.contains_key(name) {
            let entry = leaf(None, new_child.data().cloned(), ComparisonKind::Added, comparator);
            out.insert(Name::clone(name), Arc::new(entry));
        }
    }
    out
}

fn leaf<T>(
    old_data: Option<T>,
    new_data: Option<T>,
    kind: ComparisonKind,
    comparator: &dyn ElementComparator<T>,
) -> DiffNode<T> {
    let user = comparator.compare(old_data.as_ref(), new_data.as_ref());
    DiffNode {
        comparison: NodeComparison::new(old_data, new_data, kind, user),
        children: BTreeMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::DefaultElementComparator;

    fn tree(kids: &[(&str, Option<&str>)]) -> Arc<DataNode<String>> {
        Arc::new(DataNode::Complete {
            data: None,
            children: kids
                .iter()
                .map(|(n, d)| (Name::from(*n), Arc::new(DataNode::complete(d.map(String::from)))))
                .collect(),
        })
    }

    #[test]
    fn test_kinds() {
        let old = tree(&[("keep", Some("k")), ("gone", Some("g")), ("edit", Some("1"))]);
        let new = tree(&[("keep", Some("k")), ("born", Some("b")), ("edit", Some("2"))]);
        let diff = compare_nodes(&old, &new, &DefaultElementComparator);

        assert_eq!(diff.comparison.user_comparison, K_NO_CHANGE);
        assert!(diff.children.get("keep").is_none());
        assert!(diff.children["gone"].comparison.is_removed());
        assert!(diff.children["born"].comparison.is_added());
        let edit = &diff.children["edit"].comparison;
        assert!(edit.is_changed());
        assert_eq!(edit.user_comparison, DefaultElementComparator::CHANGED);
        assert_eq!(edit.new_data.as_deref(), Some("2"));
    }

    #[test]
    fn test_identical_trees_give_bare_root() {
        let t = tree(&[("a", Some("x"))]);
        let diff = compare_nodes(&t, &t, &DefaultElementComparator);
        assert!(diff.children.is_empty());
        assert!(diff.comparison.is_changed());
    }

    #[test]
    fn test_find() {
        let old = tree(&[]);
        let new = tree(&[("a", None)]);
        let diff = Arc::new(compare_nodes(&old, &new, &DefaultElementComparator));
        assert!(diff.find(&ElementPath::parse("/a")).is_some());
        assert!(diff.find_arc(&ElementPath::parse("/a/b")).is_none());
        assert!(diff.find(&ElementPath::root()).is_some());
    }
}
