//! Detached element snapshots
//!
//! An [`ElementSubtree`] is a plain owned copy of one element and its
//! descendants, independent of any generation. It seeds new trees without
//! replaying individual creates.
//!
//! Author: Moroya Sakamoto

use std::sync::Arc;

use crate::node::{Children, DataNode};
use crate::path::Name;

/// Owned copy of one element and its descendants.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementSubtree<T> {
    pub name: String,
    pub data: Option<T>,
    pub children: Vec<ElementSubtree<T>>,
}

impl<T> ElementSubtree<T> {
    pub fn new(name: impl Into<String>, data: Option<T>) -> Self {
        Self { name: name.into(), data, children: Vec::new() }
    }

    /// Builder: set the children.
    pub fn with_children(mut self, children: Vec<ElementSubtree<T>>) -> Self {
        self.children = children;
        self
    }

    /// Number of elements in the snapshot, this one included.
    pub fn element_count(&self) -> usize {
        1 + self.children.iter().map(ElementSubtree::element_count).sum::<usize>()
    }

    pub(crate) fn into_node(self) -> (Name, Arc<DataNode<T>>) {
        let children: Children<T> = self
            .children
            .into_iter()
            .map(ElementSubtree::into_node)
            .collect();
        (
            Name::from(self.name),
            Arc::new(DataNode::Complete { data: self.data, children }),
        )
    }
}

impl<T: Clone> ElementSubtree<T> {
    pub(crate) fn from_node(name: &str, node: &DataNode<T>) -> Self {
        let children = node
            .children()
            .map(|c| c.iter().map(|(n, child)| Self::from_node(n, child)).collect())
            .unwrap_or_default();
        Self { name: name.to_string(), data: node.data().cloned(), children }
    }
}
