//! Pre/post-order traversal of a delta view
//!
//! Nodes recorded in the diff tree are visited with their recorded
//! comparison. Below an added or removed node the iterator walks the
//! single live tree on that side, classifying descendants through the
//! delta's [`SubtreeClassification`](crate::SubtreeClassification).
//!
//! Author: Moroya Sakamoto

use std::sync::Arc;

use crate::comparator::ElementData;
use crate::comparison::{ComparisonKind, DiffNode, NodeComparison};
use crate::delta::ElementTreeDelta;
use crate::node::DataNode;
use crate::path::ElementPath;

/// Visit order.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TraversalOrder {
    /// Parent before children; the visitor's return value controls descent.
    #[default]
    PreOrder,
    /// Children before parent; every node is visited.
    PostOrder,
}

/// Callback invoked for every element of a delta.
pub trait DeltaVisitor<T> {
    /// Return `false` to skip the children (pre-order only).
    fn visit_element(&mut self, path: &ElementPath, comparison: &NodeComparison<T>) -> bool;
}

impl<T, F> DeltaVisitor<T> for F
where
    F: FnMut(&ElementPath, &NodeComparison<T>) -> bool,
{
    fn visit_element(&mut self, path: &ElementPath, comparison: &NodeComparison<T>) -> bool {
        self(path, comparison)
    }
}

/// Walks an [`ElementTreeDelta`] in a fixed order.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeltaIterator {
    order: TraversalOrder,
}

impl DeltaIterator {
    pub fn new(order: TraversalOrder) -> Self {
        Self { order }
    }

    pub fn pre_order() -> Self {
        Self::new(TraversalOrder::PreOrder)
    }

    pub fn post_order() -> Self {
        Self::new(TraversalOrder::PostOrder)
    }

    pub fn order(&self) -> TraversalOrder {
        self.order
    }

    /// Visit the whole delta, starting at its root path.
    pub fn iterate<T, V>(&self, delta: &ElementTreeDelta<T>, visitor: &mut V)
    where
        T: ElementData,
        V: DeltaVisitor<T> + ?Sized,
    {
        self.iterate_from(delta, delta.root_path(), visitor);
    }

    /// Visit the part of the delta at and below the absolute `path`.
    ///
    /// A path outside the delta's root, or present in neither generation,
    /// visits nothing.
    pub fn iterate_from<T, V>(
        &self,
        delta: &ElementTreeDelta<T>,
        path: &ElementPath,
        visitor: &mut V,
    ) where
        T: ElementData,
        V: DeltaVisitor<T> + ?Sized,
    {
        let root_path = delta.root_path();
        if !root_path.is_prefix_of(path) {
            return;
        }
        let relative = path.remove_first_segments(root_path.segment_count());
        let walk = Walk { delta, order: self.order };

        if let Some(node) = delta.diff().find_arc(&relative) {
            walk.diff(&node, path, visitor);
            return;
        }
        let old = delta.old_tree().assemble(path);
        let new = delta.new_tree().assemble(path);
        let (node, kind) = match (old, new) {
            (None, Some(n)) => (n, ComparisonKind::Added),
            (Some(o), None) => (o, ComparisonKind::Removed),
            _ => return,
        };
        let (old_data, new_data) = sides(&node, kind);
        let code = delta.comparator().compare(old_data.as_ref(), new_data.as_ref());
        walk.single(&node, path, NodeComparison::new(old_data, new_data, kind, code), visitor);
    }
}

fn sides<T: Clone>(node: &DataNode<T>, kind: ComparisonKind) -> (Option<T>, Option<T>) {
    let data = node.data().cloned();
    match kind {
        ComparisonKind::Removed => (data, None),
        _ => (None, data),
    }
}

struct Walk<'a, T: ElementData> {
    delta: &'a ElementTreeDelta<T>,
    order: TraversalOrder,
}

impl<T: ElementData> Walk<'_, T> {
    fn diff<V>(&self, node: &Arc<DiffNode<T>>, path: &ElementPath, visitor: &mut V)
    where
        V: DeltaVisitor<T> + ?Sized,
    {
        if self.order == TraversalOrder::PreOrder
            && !visitor.visit_element(path, &node.comparison)
        {
            return;
        }
        match node.comparison.kind {
            ComparisonKind::Changed => {
                for (name, child) in &node.children {
                    self.diff(child, &path.append_name(name.clone()), visitor);
                }
            }
            kind => {
                let side = match kind {
                    ComparisonKind::Added => self.delta.new_tree(),
                    _ => self.delta.old_tree(),
                };
                if let Some(live) = side.assemble(path) {
                    self.single_children(&live, path, &node.comparison, visitor);
                }
            }
        }
        if self.order == TraversalOrder::PostOrder {
            visitor.visit_element(path, &node.comparison);
        }
    }

    fn single<V>(
        &self,
        node: &DataNode<T>,
        path: &ElementPath,
        comparison: NodeComparison<T>,
        visitor: &mut V,
    ) where
        V: DeltaVisitor<T> + ?Sized,
    {
        if self.order == TraversalOrder::PreOrder
            && !visitor.visit_element(path, &comparison)
        {
            return;
        }
        self.single_children(node, path, &comparison, visitor);
        if self.order == TraversalOrder::PostOrder {
            visitor.visit_element(path, &comparison);
        }
    }

    fn single_children<V>(
        &self,
        node: &DataNode<T>,
        path: &ElementPath,
        parent: &NodeComparison<T>,
        visitor: &mut V,
    ) where
        V: DeltaVisitor<T> + ?Sized,
    {
        let Some(children) = node.children() else {
            return;
        };
        for (name, child) in children {
            let (old_data, new_data) = sides(child, parent.kind);
            let code = self.delta.classification().classify(
                parent.user_comparison,
                old_data.as_ref(),
                new_data.as_ref(),
                self.delta.comparator(),
            );
            let comparison = NodeComparison::new(old_data, new_data, parent.kind, code);
            self.single(child, &path.append_name(name.clone()), comparison, visitor);
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
