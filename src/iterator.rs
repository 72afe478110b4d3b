//! Whole-generation traversal
//!
//! [`ElementTreeIterator`] copies the target subtree out of a generation
//! under its lock, then walks the copy unlocked. The walk keeps a stack of
//! name segments; paths are only built when a visitor asks for one.
//!
//! Author: Moroya Sakamoto

use std::sync::Arc;

use crate::comparator::ElementData;
use crate::element_tree::ElementTree;
use crate::node::DataNode;
use crate::path::{ElementPath, Name};

// ── Path requestor ─────────────────────────────────────────────────────

/// Lazily materializes the path of the element being visited.
#[derive(Debug, Default)]
pub struct PathRequestor {
    segments: Vec<Name>,
}

impl PathRequestor {
    /// Path of the current element.
    pub fn request_path(&self) -> ElementPath {
        ElementPath::from_names(self.segments.clone())
    }

    /// Name of the current element; `None` at the root.
    pub fn request_name(&self) -> Option<&str> {
        self.segments.last().map(|s| s.as_ref())
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }
}

// ── Visitors ───────────────────────────────────────────────────────────

/// Visitor that sees every element.
pub trait ElementContentVisitor<T> {
    fn visit_element(&mut self, requestor: &PathRequestor, data: Option<&T>);
}

impl<T, F> ElementContentVisitor<T> for F
where
    F: FnMut(&PathRequestor, Option<&T>),
{
    fn visit_element(&mut self, requestor: &PathRequestor, data: Option<&T>) {
        self(requestor, data)
    }
}

/// Visitor that decides whether to descend.
pub trait ElementPathVisitor<T> {
    /// Return `false` to skip the element's children.
    fn visit_element(&mut self, requestor: &PathRequestor, data: Option<&T>) -> bool;
}

impl<T, F> ElementPathVisitor<T> for F
where
    F: FnMut(&PathRequestor, Option<&T>) -> bool,
{
    fn visit_element(&mut self, requestor: &PathRequestor, data: Option<&T>) -> bool {
        self(requestor, data)
    }
}

// ── Iterator ───────────────────────────────────────────────────────────

/// Pre-order walk over one generation's content.
pub struct ElementTreeIterator<T> {
    start: ElementPath,
    node: Option<Arc<DataNode<T>>>,
    tree_data: Option<T>,
}

impl<T: ElementData> ElementTreeIterator<T> {
    /// Snapshot the subtree at `path`. A missing path iterates nothing.
    pub fn new(tree: &ElementTree<T>, path: &ElementPath) -> Self {
        let (node, tree_data) = tree.snapshot(path);
        Self { start: path.clone(), node, tree_data }
    }

    /// Visit every element, parents before children.
    pub fn iterate<V: ElementContentVisitor<T>>(&self, mut visitor: V) {
        self.iterate_with_descent(|requestor: &PathRequestor, data: Option<&T>| {
            visitor.visit_element(requestor, data);
            true
        });
    }

    /// Visit elements, skipping the children of any element the visitor
    /// returns `false` for.
    pub fn iterate_with_descent<V: ElementPathVisitor<T>>(&self, mut visitor: V) {
        let Some(node) = &self.node else {
            return;
        };
        let mut requestor = PathRequestor { segments: self.start.segments().to_vec() };
        // The root has no payload of its own; it reports the tree data.
        let data = if self.start.is_root() { self.tree_data.as_ref() } else { node.data() };
        if !visitor.visit_element(&requestor, data) {
            return;
        }
        walk(node, &mut requestor, &mut visitor);
    }
}

fn walk<T, V: ElementPathVisitor<T>>(
    node: &DataNode<T>,
    requestor: &mut PathRequestor,
    visitor: &mut V,
) {
    let Some(children) = node.children() else {
        return;
    };
    for (name, child) in children {
        requestor.segments.push(Name::clone(name));
        if visitor.visit_element(requestor, child.data()) {
            walk(child, requestor, visitor);
        }
        requestor.segments.pop();
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
