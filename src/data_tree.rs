//! Layered delta tree engine
//!
//! A [`DataTree`] is one layer in a chain. The bottom layer holds a
//! complete node tree; every layer above holds a delta against its
//! parent. Reads walk the chain top-down until a layer answers.
//!
//! Layers are shared handles (`Arc<Layer>`). Rerooting and collapsing
//! rewrite a layer's representation in place without changing what it
//! means, so every handle to a generation keeps seeing the same content.
//!
//! Author: Moroya Sakamoto

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::comparator::ElementComparator;
use crate::error::{Result, TreeError};
use crate::node::{self, Children, DataNode};
use crate::path::{ElementPath, Name};

// ── Lookup ─────────────────────────────────────────────────

/// Result of resolving a path through the chain.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NodeLookup<T> {
    pub present: bool,
    pub data: Option<T>,
    /// Data came from the topmost layer itself.
    pub found_in_top_delta: bool,
}

impl<T> NodeLookup<T> {
    pub fn absent() -> Self {
        Self { present: false, data: None, found_in_top_delta: false }
    }
}

enum Step<'a, T> {
    Found(&'a Arc<DataNode<T>>),
    Defer,
    Absent,
}

/// Resolve `segments` inside a single layer.
fn step<'a, T>(root: &'a Arc<DataNode<T>>, segments: &[Name]) -> Step<'a, T> {
    let mut current = root;
    for segment in segments {
        match current.child(segment) {
            Some(child) if child.is_deleted() => return Step::Absent,
            Some(child) => current = child,
            None if current.is_complete() => return Step::Absent,
            None => return Step::Defer,
        }
    }
    if current.is_deleted() {
        Step::Absent
    } else {
        Step::Found(current)
    }
}

// ── Layer ──────────────────────────────────────────────────

struct Repr<T, A> {
    root: Arc<DataNode<T>>,
    parent: Option<DataTree<T, A>>,
}

struct Layer<T, A> {
    repr: RwLock<Repr<T, A>>,
    immutable: AtomicBool,
    attachment: A,
}

/// Shared handle to one layer of a delta chain.
pub(crate) struct DataTree<T, A = ()> {
    layer: Arc<Layer<T, A>>,
}

impl<T, A> Clone for DataTree<T, A> {
    fn clone(&self) -> Self {
        Self { layer: Arc::clone(&self.layer) }
    }
}

impl<T: Clone, A> DataTree<T, A> {
    /// A complete, mutable tree with an empty root.
    pub fn new(attachment: A) -> Self {
        Self::from_parts(Arc::new(DataNode::complete(None)), None, attachment)
    }

    pub fn from_parts(
        root: Arc<DataNode<T>>,
        parent: Option<DataTree<T, A>>,
        attachment: A,
    ) -> Self {
        Self {
            layer: Arc::new(Layer {
                repr: RwLock::new(Repr { root, parent }),
                immutable: AtomicBool::new(false),
                attachment,
            }),
        }
    }

    /// Empty delta layer on top of `self`.
    pub fn new_delta_layer(&self, attachment: A) -> Self {
        Self::from_parts(Arc::new(DataNode::empty_delta()), Some(self.clone()), attachment)
    }

    pub fn attachment(&self) -> &A {
        &self.layer.attachment
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.layer, &other.layer)
    }

    pub fn is_immutable(&self) -> bool {
        self.layer.immutable.load(Ordering::Acquire)
    }

    pub fn set_immutable(&self) {
        self.layer.immutable.store(true, Ordering::Release);
    }

    pub fn parent(&self) -> Option<Self> {
        self.layer.repr.read().parent.clone()
    }

    pub fn root_node(&self) -> Arc<DataNode<T>> {
        Arc::clone(&self.layer.repr.read().root)
    }

    fn snapshot(&self) -> (Arc<DataNode<T>>, Option<Self>) {
        let repr = self.layer.repr.read();
        (Arc::clone(&repr.root), repr.parent.clone())
    }

    fn replace(&self, root: Arc<DataNode<T>>, parent: Option<Self>) {
        let mut repr = self.layer.repr.write();
        repr.root = root;
        repr.parent = parent;
    }

    /// Number of parent links down to the complete layer.
    pub fn delta_depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.parent();
        while let Some(tree) = current {
            depth += 1;
            current = tree.parent();
        }
        depth
    }

    /// A delta layer that changes nothing.
    pub fn is_empty_delta(&self) -> bool {
        let repr = self.layer.repr.read();
        repr.parent.is_some() && repr.root.is_empty_delta()
    }

    /// True if `other` is reachable from `self` through parent links.
    pub fn has_ancestor(&self, other: &Self) -> bool {
        let mut current = self.parent();
        while let Some(tree) = current {
            if tree.ptr_eq(other) {
                return true;
            }
            current = tree.parent();
        }
        false
    }

    // ── Reads ──────────────────────────────────────────────

    pub fn lookup(&self, path: &ElementPath) -> NodeLookup<T> {
        let segments = path.segments();
        let mut present = false;
        let mut top = true;
        let mut current = Some(self.clone());
        while let Some(tree) = current {
            let (root, parent) = tree.snapshot();
            match step(&root, segments) {
                Step::Absent if !present => return NodeLookup::absent(),
                Step::Found(node) if node.carries_data() => {
                    return NodeLookup {
                        present: true,
                        data: node.data().cloned(),
                        found_in_top_delta: top,
                    };
                }
                Step::Found(_) => present = true,
                _ => {}
            }
            top = false;
            current = parent;
        }
        NodeLookup { present, data: None, found_in_top_delta: false }
    }

    pub fn includes(&self, path: &ElementPath) -> bool {
        self.lookup(path).present
    }

    /// Complete node at `path`, assembled from the chain.
    pub fn assemble(&self, path: &ElementPath) -> Option<Arc<DataNode<T>>> {
        let (root, parent) = self.snapshot();
        match step(&root, path.segments()) {
            Step::Absent => None,
            Step::Found(found) if found.is_complete() => Some(Arc::clone(found)),
            Step::Found(found) => {
                let base = parent?.assemble(path)?;
                node::overlay(&base, found)
            }
            Step::Defer => parent?.assemble(path),
        }
    }

    pub fn assembled_root(&self) -> Arc<DataNode<T>> {
        self.assemble(&ElementPath::root())
            .unwrap_or_else(|| Arc::new(DataNode::complete(None)))
    }

    /// Child names at `path`, sorted; `None` if the element is absent.
    pub fn names_of_children(&self, path: &ElementPath) -> Option<Vec<Name>> {
        self.assemble(path)
            .map(|n| n.children().map(|c| c.keys().cloned().collect()).unwrap_or_default())
    }

    /// Resolve each segment case-insensitively, preferring exact matches.
    pub fn resolve_ignore_case(&self, path: &ElementPath) -> Option<ElementPath> {
        let mut resolved = ElementPath::root();
        for segment in path.segments() {
            let names = self.names_of_children(&resolved)?;
            let name = names
                .iter()
                .find(|n| n == &segment)
                .or_else(|| names.iter().find(|n| n.to_lowercase() == segment.to_lowercase()))?;
            resolved = resolved.append_name(Name::clone(name));
        }
        Some(resolved)
    }

    // ── Mutations ──────────────────────────────────────────

    fn check_mutable(&self) -> Result<()> {
        if self.is_immutable() {
            return Err(TreeError::IllegalState("tree is immutable"));
        }
        Ok(())
    }

    fn with_node<R>(&self, path: &ElementPath, f: impl FnOnce(&mut DataNode<T>) -> R) -> Result<R> {
        let mut repr = self.layer.repr.write();
        let node = node::materialize(&mut repr.root, path.segments())
            .ok_or_else(|| TreeError::ElementNotFound(path.clone()))?;
        Ok(f(node))
    }

    /// Insert `subtree` as child `name` of `parent_path`, replacing any
    /// existing child of that name.
    pub fn create_subtree(
        &self,
        parent_path: &ElementPath,
        name: Name,
        subtree: Arc<DataNode<T>>,
    ) -> Result<()> {
        self.check_mutable()?;
        if !self.includes(parent_path) {
            return Err(TreeError::ElementNotFound(parent_path.clone()));
        }
        self.with_node(parent_path, |node| {
            if let Some(children) = node.children_mut() {
                children.insert(name, subtree);
            }
        })
    }

    pub fn create_child(
        &self,
        parent_path: &ElementPath,
        name: Name,
        data: Option<T>,
    ) -> Result<()> {
        self.create_subtree(parent_path, name, Arc::new(DataNode::complete(data)))
    }

    pub fn delete_child(&self, parent_path: &ElementPath, name: &Name) -> Result<()> {
        self.check_mutable()?;
        let child_path = parent_path.append_name(Name::clone(name));
        if !self.includes(&child_path) {
            return Err(TreeError::ElementNotFound(child_path));
        }
        let below = self.parent().is_some_and(|p| p.includes(&child_path));
        self.with_node(parent_path, |node| {
            let complete = node.is_complete();
            if let Some(children) = node.children_mut() {
                if below && !complete {
                    children.insert(Name::clone(name), Arc::new(DataNode::Deleted));
                } else {
                    children.remove(name);
                }
            }
        })
    }

    pub fn set_data(&self, path: &ElementPath, data: Option<T>) -> Result<()> {
        self.check_mutable()?;
        if !self.includes(path) {
            return Err(TreeError::ElementNotFound(path.clone()));
        }
        self.with_node(path, |node| match node {
            DataNode::Complete { data: slot, .. } | DataNode::DataDelta { data: slot, .. } => {
                *slot = data
            }
            DataNode::NoDataDelta { children } => {
                let children = std::mem::take(children);
                *node = DataNode::DataDelta { data, children };
            }
            DataNode::Deleted => {}
        })
    }

    /// Mutate the payload at `path` in place, copying it into this layer
    /// first if it lives further down the chain.
    pub fn update_data<R>(
        &self,
        path: &ElementPath,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<Option<R>> {
        self.check_mutable()?;
        let found = self.lookup(path);
        if !found.present {
            return Err(TreeError::ElementNotFound(path.clone()));
        }
        let Some(data) = found.data else {
            return Ok(None);
        };
        if !found.found_in_top_delta {
            self.set_data(path, Some(data))?;
        }
        self.with_node(path, |node| match node {
            DataNode::Complete { data: Some(d), .. }
            | DataNode::DataDelta { data: Some(d), .. } => Some(f(d)),
            _ => None,
        })
    }

    /// Replace the whole content of this layer with a complete tree.
    pub fn set_root(&self, root: Arc<DataNode<T>>) -> Result<()> {
        self.check_mutable()?;
        self.layer.repr.write().root = root;
        Ok(())
    }

    // ── Chain restructuring ────────────────────────────────

    /// Delta turning `self` into `other`, relative to `self`'s content.
    pub fn forward_delta_with(
        &self,
        other: &Self,
        comparator: &dyn ElementComparator<T>,
    ) -> Arc<DataNode<T>> {
        let from = self.assembled_root();
        let to = other.assembled_root();
        node::delta_between(&from, &to, comparator)
            .map(Arc::new)
            .unwrap_or_else(|| Arc::new(DataNode::empty_delta()))
    }

    /// Make `self` the complete layer and turn every former ancestor into
    /// a backward delta pointing toward it.
    pub fn reroot(&self) {
        let mut chain = vec![self.clone()];
        while let Some(parent) = chain.last().and_then(|t| t.parent()) {
            chain.push(parent);
        }
        if chain.len() < 2 {
            return;
        }
        tracing::trace!(depth = chain.len() - 1, "rerooting delta chain");
        for pair in chain.windows(2).rev() {
            let (child, parent) = (&pair[0], &pair[1]);
            let parent_root = parent.root_node();
            let child_root = child.root_node();
            let complete = node::overlay(&parent_root, &child_root)
                .unwrap_or_else(|| Arc::new(DataNode::complete(None)));
            let backward = node::backward_delta(&child_root, Some(&parent_root));
            child.replace(complete, None);
            parent.replace(backward, Some(child.clone()));
        }
    }

    /// Re-express `self` as a single delta on top of `ancestor`.
    pub fn collapse_to(
        &self,
        ancestor: &Self,
        comparator: &dyn ElementComparator<T>,
    ) -> Result<()> {
        if self.ptr_eq(ancestor) || self.parent().is_some_and(|p| p.ptr_eq(ancestor)) {
            return Ok(());
        }
        if ancestor.ptr_eq(self) || ancestor.has_ancestor(self) {
            return Err(TreeError::argument("collapse target descends from this tree"));
        }
        let delta = ancestor.forward_delta_with(self, comparator);
        self.replace(delta, Some(ancestor.clone()));
        Ok(())
    }

    /// Drop the parent link by assembling the full content into this layer.
    pub fn make_complete(&self) {
        if self.parent().is_none() {
            return;
        }
        let root = self.assembled_root();
        self.replace(root, None);
    }
}

/// Complete node owning `children`.
pub(crate) fn complete_node<T>(data: Option<T>, children: Children<T>) -> Arc<DataNode<T>> {
    Arc::new(DataNode::Complete { data, children })
}
