//! Persistent delta nodes
//!
//! A generation layer is a tree of [`DataNode`]s. Complete nodes carry
//! their full subtree; delta nodes only carry what changed relative to
//! the layer below. Children are `Arc`-shared so unchanged subtrees are
//! shared between layers and cloned lazily on write (`Arc::make_mut`).
//!
//! Author: Moroya Sakamoto

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::comparator::{ElementComparator, K_NO_CHANGE};
use crate::path::Name;

/// Child table, ordered by name.
pub type Children<T> = BTreeMap<Name, Arc<DataNode<T>>>;

/// One node of a layer.
#[derive(Debug, Clone, PartialEq)]
pub enum DataNode<T> {
    /// Self-contained node: data and complete children.
    Complete { data: Option<T>, children: Children<T> },
    /// Data replaced in this layer; children are deltas.
    DataDelta { data: Option<T>, children: Children<T> },
    /// Data unchanged; children are deltas.
    NoDataDelta { children: Children<T> },
    /// Removed in this layer.
    Deleted,
}

impl<T> DataNode<T> {
    pub fn complete(data: Option<T>) -> Self {
        DataNode::Complete { data, children: BTreeMap::new() }
    }

    pub fn empty_delta() -> Self {
        DataNode::NoDataDelta { children: BTreeMap::new() }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, DataNode::Complete { .. })
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, DataNode::Deleted)
    }

    /// True for a no-data delta with no child deltas.
    pub fn is_empty_delta(&self) -> bool {
        matches!(self, DataNode::NoDataDelta { children } if children.is_empty())
    }

    /// Data carried by this node, if it carries any.
    pub fn data(&self) -> Option<&T> {
        match self {
            DataNode::Complete { data, .. } | DataNode::DataDelta { data, .. } => data.as_ref(),
            _ => None,
        }
    }

    pub fn carries_data(&self) -> bool {
        matches!(self, DataNode::Complete { .. } | DataNode::DataDelta { .. })
    }

    pub fn children(&self) -> Option<&Children<T>> {
        match self {
            DataNode::Complete { children, .. }
            | DataNode::DataDelta { children, .. }
            | DataNode::NoDataDelta { children } => Some(children),
            DataNode::Deleted => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Children<T>> {
        match self {
            DataNode::Complete { children, .. }
            | DataNode::DataDelta { children, .. }
            | DataNode::NoDataDelta { children } => Some(children),
            DataNode::Deleted => None,
        }
    }

    pub fn child(&self, name: &str) -> Option<&Arc<DataNode<T>>> {
        self.children().and_then(|c| c.get(name))
    }
}

/// Apply `delta` on top of the complete node `base`.
///
/// Returns `None` when the delta deletes the node.
pub(crate) fn overlay<T: Clone>(
    base: &Arc<DataNode<T>>,
    delta: &Arc<DataNode<T>>,
) -> Option<Arc<DataNode<T>>> {
    let (data, delta_children) = match delta.as_ref() {
        DataNode::Complete { .. } => return Some(Arc::clone(delta)),
        DataNode::Deleted => return None,
        DataNode::NoDataDelta { children } if children.is_empty() => return Some(Arc::clone(base)),
        DataNode::DataDelta { data, children } => (Some(data), children),
        DataNode::NoDataDelta { children } => (None, children),
    };
    let (base_data, base_children) = match base.as_ref() {
        DataNode::Complete { data, children } => (data, children),
        _ => return Some(Arc::clone(delta)),
    };

    let mut children = base_children.clone();
    for (name, child) in delta_children {
        match child.as_ref() {
            DataNode::Deleted => {
                children.remove(name);
            }
            DataNode::Complete { .. } => {
                children.insert(Name::clone(name), Arc::clone(child));
            }
            _ => match base_children.get(name) {
                Some(base_child) => match overlay(base_child, child) {
                    Some(merged) => {
                        children.insert(Name::clone(name), merged);
                    }
                    None => {
                        children.remove(name);
                    }
                },
                None => {
                    tracing::warn!(name = %name, "delta node without a base node, skipped");
                }
            },
        }
    }

    Some(Arc::new(DataNode::Complete {
        data: data.cloned().unwrap_or_else(|| base_data.clone()),
        children,
    }))
}

/// Delta turning the complete node `from` into the complete node `to`.
///
/// Data is considered unchanged when `comparator` reports no change.
/// Returns `None` when nothing differs.
pub(crate) fn delta_between<T: Clone>(
    from: &Arc<DataNode<T>>,
    to: &Arc<DataNode<T>>,
    comparator: &dyn ElementComparator<T>,
) -> Option<DataNode<T>> {
    if Arc::ptr_eq(from, to) {
        return None;
    }
    let empty = Children::new();
    let from_children = from.children().unwrap_or(&empty);
    let to_children = to.children().unwrap_or(&empty);

    let mut children = Children::new();
    for (name, from_child) in from_children {
        match to_children.get(name) {
            Some(to_child) => {
                if let Some(d) = delta_between(from_child, to_child, comparator) {
                    children.insert(Name::clone(name), Arc::new(d));
                }
            }
            None => {
                children.insert(Name::clone(name), Arc::new(DataNode::Deleted));
            }
        }
    }
    for (name, to_child) in to_children {
        if !from_children.contains_key(name) {
            children.insert(Name::clone(name), Arc::clone(to_child));
        }
    }

    let data_changed = comparator.compare(from.data(), to.data()) != K_NO_CHANGE;
    if data_changed {
        Some(DataNode::DataDelta { data: to.data().cloned(), children })
    } else if children.is_empty() {
        None
    } else {
        Some(DataNode::NoDataDelta { children })
    }
}

/// Invert `delta` against `base`, the complete node it was applied to.
///
/// The result, applied on top of `overlay(base, delta)`, yields `base`
/// again. Used when rerooting reverses a parent/child pair.
pub(crate) fn backward_delta<T: Clone>(
    delta: &Arc<DataNode<T>>,
    base: Option<&Arc<DataNode<T>>>,
) -> Arc<DataNode<T>> {
    match delta.as_ref() {
        DataNode::Complete { .. } | DataNode::Deleted => match base {
            Some(b) => Arc::clone(b),
            None => Arc::new(DataNode::Deleted),
        },
        DataNode::DataDelta { children, .. } | DataNode::NoDataDelta { children } => {
            let Some(base) = base else {
                return Arc::new(DataNode::Deleted);
            };
            let inverted: Children<T> = children
                .iter()
                .map(|(name, child)| {
                    (Name::clone(name), backward_delta(child, base.child(name)))
                })
                .collect();
            if delta.carries_data() {
                Arc::new(DataNode::DataDelta {
                    data: base.data().cloned(),
                    children: inverted,
                })
            } else {
                Arc::new(DataNode::NoDataDelta { children: inverted })
            }
        }
    }
}

/// Walk `root` down `segments`, creating no-data delta entries where a
/// delta layer defers to the layer below. Returns `None` if the path
/// runs into a deleted marker or leaves a complete subtree.
pub(crate) fn materialize<'a, T: Clone>(
    root: &'a mut Arc<DataNode<T>>,
    segments: &[Name],
) -> Option<&'a mut DataNode<T>> {
    let mut current = root;
    for segment in segments {
        let node = current;
        current = match Arc::make_mut(node) {
            DataNode::Complete { children, .. } => children.get_mut(segment)?,
            DataNode::DataDelta { children, .. } | DataNode::NoDataDelta { children } => children
                .entry(Name::clone(segment))
                .or_insert_with(|| Arc::new(DataNode::empty_delta())),
            DataNode::Deleted => return None,
        };
    }
    Some(Arc::make_mut(current))
}

/// Copy of `node` limited to `depth` levels of children (`None` = all).
pub(crate) fn truncate<T: Clone>(
    node: &Arc<DataNode<T>>,
    depth: Option<usize>,
) -> Arc<DataNode<T>> {
    let Some(depth) = depth else {
        return Arc::clone(node);
    };
    let mut copy = node.as_ref().clone();
    if let Some(children) = copy.children_mut() {
        if depth == 0 {
            children.clear();
        } else {
            for child in children.values_mut() {
                *child = truncate(child, Some(depth - 1));
            }
        }
    }
    Arc::new(copy)
}
