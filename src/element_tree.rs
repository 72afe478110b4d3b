//! Versioned element namespace
//!
//! An [`ElementTree`] is one generation of a delta chain. It is mutable
//! ("open") until [`ElementTree::immutable`] freezes it; branching with
//! [`ElementTree::new_empty_delta`] freezes the parent first.
//!
//! The implicit root always exists. Creating, deleting or setting data
//! on the root path is a no-op; reading root data yields `None`.
//!
//! Author: Moroya Sakamoto

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::comparator::{DefaultElementComparator, ElementComparator, ElementData};
use crate::config::TreeConfig;
use crate::data_tree::{complete_node, DataTree, NodeLookup};
use crate::delta::ElementTreeDelta;
use crate::error::{Result, TreeError};
use crate::iterator::{ElementTreeIterator, PathRequestor};
use crate::lineage;
use crate::node::{Children, DataNode};
use crate::path::{ElementPath, Name};
use crate::subtree::ElementSubtree;

static NEXT_STAMP: AtomicU64 = AtomicU64::new(0);

// ── Generation state ───────────────────────────────────────────────────

struct GenerationState<T> {
    tree_data: Option<T>,
    lookup: Option<(ElementPath, NodeLookup<T>)>,
    lookup_ignore_case: Option<(ElementPath, NodeLookup<T>)>,
    children: Option<(ElementPath, Vec<Name>)>,
}

impl<T> GenerationState<T> {
    fn new(tree_data: Option<T>) -> Self {
        Self { tree_data, lookup: None, lookup_ignore_case: None, children: None }
    }

    fn invalidate(&mut self) {
        self.lookup = None;
        self.lookup_ignore_case = None;
        self.children = None;
    }
}

/// Per-generation attachment on the engine layer.
pub(crate) struct Generation<T> {
    stamp: u64,
    config: TreeConfig,
    state: Mutex<GenerationState<T>>,
}

impl<T> Generation<T> {
    fn new(config: TreeConfig, tree_data: Option<T>) -> Self {
        Self {
            stamp: NEXT_STAMP.fetch_add(1, Ordering::Relaxed),
            config,
            state: Mutex::new(GenerationState::new(tree_data)),
        }
    }
}

// ── ElementTree ────────────────────────────────────────────────────────

/// One generation of a versioned element namespace. Cloning the handle
/// does not copy the generation.
pub struct ElementTree<T: ElementData> {
    pub(crate) tree: DataTree<T, Generation<T>>,
}

impl<T: ElementData> Clone for ElementTree<T> {
    fn clone(&self) -> Self {
        Self { tree: self.tree.clone() }
    }
}

impl<T: ElementData> Default for ElementTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ElementData> fmt::Debug for ElementTree<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementTree")
            .field("stamp", &self.stamp())
            .field("immutable", &self.is_immutable())
            .field("delta_depth", &self.delta_depth())
            .finish()
    }
}

impl<T: ElementData> ElementTree<T> {
    /// Empty, open tree with the default configuration.
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    pub fn with_config(config: TreeConfig) -> Self {
        Self { tree: DataTree::new(Generation::new(config, None)) }
    }

    /// Tree with a single root child built bottom-up from `subtree`.
    pub fn from_element_subtree(subtree: ElementSubtree<T>) -> Self {
        let (name, node) = subtree.into_node();
        let mut children = Children::new();
        children.insert(name, node);
        Self::from_parts(complete_node(None, children), None, TreeConfig::default(), None)
    }

    pub(crate) fn from_parts(
        root: Arc<DataNode<T>>,
        parent: Option<&ElementTree<T>>,
        config: TreeConfig,
        tree_data: Option<T>,
    ) -> Self {
        let generation = Generation::new(config, tree_data);
        Self { tree: DataTree::from_parts(root, parent.map(|p| p.tree.clone()), generation) }
    }

    fn generation(&self) -> &Generation<T> {
        self.tree.attachment()
    }

    fn state(&self) -> MutexGuard<'_, GenerationState<T>> {
        self.generation().state.lock()
    }

    fn caching(&self) -> bool {
        self.generation().config.lookup_cache
    }

    /// Monotonic creation-order stamp of this generation.
    pub fn stamp(&self) -> u64 {
        self.generation().stamp
    }

    pub fn config(&self) -> &TreeConfig {
        &self.generation().config
    }

    /// True if both handles denote the same generation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.tree.ptr_eq(&other.tree)
    }

    pub(crate) fn id(&self) -> usize {
        self.generation() as *const Generation<T> as usize
    }

    // ── Lookups ────────────────────────────────────────────────────────

    fn lookup_locked(&self, state: &mut GenerationState<T>, path: &ElementPath) -> NodeLookup<T> {
        if let Some((cached, found)) = &state.lookup {
            if cached == path {
                return found.clone();
            }
        }
        let found = self.tree.lookup(path);
        if self.caching() {
            state.lookup = Some((path.clone(), found.clone()));
        }
        found
    }

    fn lookup_ignore_case_locked(
        &self,
        state: &mut GenerationState<T>,
        path: &ElementPath,
    ) -> NodeLookup<T> {
        if let Some((cached, found)) = &state.lookup_ignore_case {
            if cached == path {
                return found.clone();
            }
        }
        let found = match self.tree.resolve_ignore_case(path) {
            Some(resolved) => self.tree.lookup(&resolved),
            None => NodeLookup::absent(),
        };
        if self.caching() {
            state.lookup_ignore_case = Some((path.clone(), found.clone()));
        }
        found
    }

    fn names_locked(
        &self,
        state: &mut GenerationState<T>,
        path: &ElementPath,
    ) -> Result<Vec<Name>> {
        if let Some((cached, names)) = &state.children {
            if cached == path {
                return Ok(names.clone());
            }
        }
        let names = self
            .tree
            .names_of_children(path)
            .ok_or_else(|| TreeError::ElementNotFound(path.clone()))?;
        if self.caching() {
            state.children = Some((path.clone(), names.clone()));
        }
        Ok(names)
    }

    pub fn includes(&self, path: &ElementPath) -> bool {
        path.is_root() || self.lookup_locked(&mut self.state(), path).present
    }

    pub fn includes_ignore_case(&self, path: &ElementPath) -> bool {
        path.is_root() || self.lookup_ignore_case_locked(&mut self.state(), path).present
    }

    /// Payload at `path`; `None` for the root or an element without data.
    pub fn get_element_data(&self, path: &ElementPath) -> Result<Option<T>> {
        if path.is_root() {
            return Ok(None);
        }
        let found = self.lookup_locked(&mut self.state(), path);
        if !found.present {
            return Err(TreeError::ElementNotFound(path.clone()));
        }
        Ok(found.data)
    }

    pub fn get_element_data_ignore_case(&self, path: &ElementPath) -> Result<Option<T>> {
        if path.is_root() {
            return Ok(None);
        }
        let found = self.lookup_ignore_case_locked(&mut self.state(), path);
        if !found.present {
            return Err(TreeError::ElementNotFound(path.clone()));
        }
        Ok(found.data)
    }

    /// Child paths of `path`. `None` denotes the single root-path entry.
    pub fn get_children(&self, path: Option<&ElementPath>) -> Result<Vec<ElementPath>> {
        let Some(path) = path else {
            return Ok(vec![ElementPath::root()]);
        };
        let names = self.names_locked(&mut self.state(), path)?;
        Ok(names.into_iter().map(|n| path.append_name(n)).collect())
    }

    pub fn get_child_count(&self, path: Option<&ElementPath>) -> Result<usize> {
        match path {
            None => Ok(1),
            Some(path) => Ok(self.names_locked(&mut self.state(), path)?.len()),
        }
    }

    /// Child names of `path`, sorted. `None` yields the root's empty name.
    pub fn get_names_of_children(&self, path: Option<&ElementPath>) -> Result<Vec<Name>> {
        match path {
            None => Ok(vec![Name::from("")]),
            Some(path) => self.names_locked(&mut self.state(), path),
        }
    }

    // ── Mutations ──────────────────────────────────────────────────────

    /// Create or replace the element at `path`, dropping any previous children.
    pub fn create_element(&self, path: &ElementPath, data: Option<T>) -> Result<()> {
        let (Some(parent), Some(name)) = (path.parent(), path.last_name()) else {
            tracing::debug!("ignoring create on the root path");
            return Ok(());
        };
        let mut state = self.state();
        state.invalidate();
        self.tree.create_child(&parent, Name::clone(name), data.clone())?;
        if self.caching() {
            state.lookup = Some((
                path.clone(),
                NodeLookup { present: true, data, found_in_top_delta: true },
            ));
        }
        Ok(())
    }

    /// Remove `path` and its whole subtree.
    pub fn delete_element(&self, path: &ElementPath) -> Result<()> {
        let (Some(parent), Some(name)) = (path.parent(), path.last_name()) else {
            tracing::debug!("ignoring delete on the root path");
            return Ok(());
        };
        let mut state = self.state();
        state.invalidate();
        self.tree.delete_child(&parent, name)
    }

    pub fn set_element_data(&self, path: &ElementPath, data: Option<T>) -> Result<()> {
        if path.is_root() {
            tracing::debug!("ignoring set-data on the root path");
            return Ok(());
        }
        let mut state = self.state();
        state.invalidate();
        self.tree.set_data(path, data)
    }

    /// Mutate the payload at `path` in place.
    ///
    /// A payload inherited from an older generation is cloned into this one
    /// first, so ancestors never observe the change. Returns `Ok(None)` for
    /// the root and for elements without data.
    pub fn open_element_data<R>(
        &self,
        path: &ElementPath,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<Option<R>> {
        if self.is_immutable() {
            return Err(TreeError::IllegalState("tree is immutable"));
        }
        if path.is_root() {
            return Ok(None);
        }
        let mut state = self.state();
        state.invalidate();
        self.tree.update_data(path, f)
    }

    // ── Lifecycle ──────────────────────────────────────────────────────

    pub fn is_immutable(&self) -> bool {
        self.tree.is_immutable()
    }

    /// Freeze this generation. Idempotent.
    pub fn immutable(&self) {
        if self.tree.is_immutable() {
            return;
        }
        self.tree.set_immutable();
        self.state().invalidate();
        tracing::debug!(generation = self.stamp(), "froze generation");
        if self.config().reroot_on_freeze {
            self.tree.reroot();
        }
    }

    /// Freeze `self` and return a new open generation on top of it.
    pub fn new_empty_delta(&self) -> ElementTree<T> {
        self.immutable();
        let tree_data = self.state().tree_data.clone();
        let generation = Generation::new(self.config().clone(), tree_data);
        let child = ElementTree { tree: self.tree.new_delta_layer(generation) };
        tracing::debug!(generation = child.stamp(), parent = self.stamp(), "branched generation");
        child
    }

    /// Rewrite the chain so `ancestor` becomes this generation's parent.
    pub fn collapse_to(&self, ancestor: &ElementTree<T>) -> Result<()> {
        if !self.is_immutable() {
            return Err(TreeError::IllegalState("only frozen generations can be collapsed"));
        }
        self.tree.collapse_to(&ancestor.tree, DefaultElementComparator::instance())?;
        self.state().invalidate();
        tracing::debug!(
            generation = self.stamp(),
            parent = ancestor.stamp(),
            "collapsed generation"
        );
        Ok(())
    }

    /// Drop the parent link, keeping content.
    pub fn make_complete(&self) {
        self.tree.make_complete();
        self.state().invalidate();
    }

    pub fn get_parent(&self) -> Option<ElementTree<T>> {
        self.tree.parent().map(|tree| ElementTree { tree })
    }

    /// True if `other` is `self` or reachable through parent links.
    pub fn has_ancestor(&self, other: &ElementTree<T>) -> bool {
        self.ptr_eq(other) || self.tree.has_ancestor(&other.tree)
    }

    pub fn delta_depth(&self) -> usize {
        self.tree.delta_depth()
    }

    pub(crate) fn is_empty_delta(&self) -> bool {
        self.tree.is_empty_delta()
    }

    pub fn get_tree_data(&self) -> Option<T> {
        self.state().tree_data.clone()
    }

    pub fn set_tree_data(&self, data: Option<T>) {
        self.state().tree_data = data;
    }

    // ── Subtrees ───────────────────────────────────────────────────────

    /// Detached copy of the element at `path` as a single-rooted tree;
    /// the root path copies the whole tree.
    pub fn get_subtree(&self, path: &ElementPath) -> Result<ElementTree<T>> {
        let node = self
            .tree
            .assemble(path)
            .ok_or_else(|| TreeError::ElementNotFound(path.clone()))?;
        let root = match path.last_name() {
            None => node,
            Some(name) => {
                let mut children = Children::new();
                children.insert(Name::clone(name), node);
                complete_node(None, children)
            }
        };
        Ok(Self::from_parts(root, None, self.config().clone(), None))
    }

    /// Graft the single root child of `subtree` at `path`.
    pub fn create_subtree(&self, path: &ElementPath, subtree: &ElementTree<T>) -> Result<()> {
        let (Some(parent), Some(name)) = (path.parent(), path.last_name()) else {
            return Err(TreeError::argument("cannot graft a subtree at the root path"));
        };
        let source = subtree.tree.assembled_root();
        let node = match source.children() {
            Some(children) if children.len() == 1 => children.values().next().cloned(),
            _ => None,
        }
        .ok_or_else(|| TreeError::argument("subtree must have exactly one root child"))?;
        let mut state = self.state();
        state.invalidate();
        self.tree.create_subtree(&parent, Name::clone(name), node)
    }

    /// Detached snapshot of the element at `path` and its descendants.
    pub fn element_subtree(&self, path: &ElementPath) -> Result<ElementSubtree<T>> {
        let node = self
            .tree
            .assemble(path)
            .ok_or_else(|| TreeError::ElementNotFound(path.clone()))?;
        let name = path.last_segment().unwrap_or("");
        Ok(ElementSubtree::from_node(name, &node))
    }

    /// Apply the subtree at `path` of every tree in `trees` to this one, in
    /// chronological order, freezing after each step. Returns the open tip.
    pub fn merge_delta_chain(
        &self,
        path: &ElementPath,
        trees: &[ElementTree<T>],
    ) -> Result<ElementTree<T>> {
        if self.is_immutable() {
            return Err(TreeError::argument("deltas can only be merged into an open tree"));
        }
        if trees.is_empty() {
            return Ok(self.clone());
        }
        if !self.includes(path) {
            return Err(TreeError::ElementNotFound(path.clone()));
        }
        let (sorted, _) = lineage::sort_trees(trees)?;
        let mut ordered: Vec<&ElementTree<T>> = Vec::with_capacity(sorted.len());
        for tree in sorted.iter().rev() {
            if ordered.last().map_or(true, |last| !last.ptr_eq(tree)) {
                ordered.push(tree);
            }
        }
        tracing::debug!(generation = self.stamp(), trees = ordered.len(), "merging delta chain");

        let mut current = self.clone();
        for next in ordered {
            current.replace_subtree(path, next)?;
            current = current.new_empty_delta();
        }
        Ok(current)
    }

    fn replace_subtree(&self, path: &ElementPath, source: &ElementTree<T>) -> Result<()> {
        let mut state = self.state();
        state.invalidate();
        let (Some(parent), Some(name)) = (path.parent(), path.last_name()) else {
            return self.tree.set_root(source.tree.assembled_root());
        };
        match source.tree.assemble(path) {
            Some(node) => self.tree.create_subtree(&parent, Name::clone(name), node),
            None if self.tree.includes(path) => self.tree.delete_child(&parent, name),
            None => Ok(()),
        }
    }

    // ── Diffs ──────────────────────────────────────────────────────────

    /// Delta describing how to get from `older` to `self`.
    pub fn compute_delta_with<C>(
        &self,
        older: &ElementTree<T>,
        comparator: C,
    ) -> Result<ElementTreeDelta<T>>
    where
        C: ElementComparator<T> + 'static,
    {
        self.compute_delta_with_path(older, comparator, &ElementPath::root())
    }

    /// Like [`compute_delta_with`](Self::compute_delta_with), scoped to `path`.
    pub fn compute_delta_with_path<C>(
        &self,
        older: &ElementTree<T>,
        comparator: C,
        path: &ElementPath,
    ) -> Result<ElementTreeDelta<T>>
    where
        C: ElementComparator<T> + 'static,
    {
        ElementTreeDelta::new(older, self, Arc::new(comparator), path)
    }

    /// Index of the generation whose parent chain reaches every other one.
    pub fn find_oldest(trees: &[ElementTree<T>]) -> Option<usize> {
        lineage::find_oldest(trees)
    }

    /// Cheap check for any change between two related generations.
    pub fn has_changes(
        newer: Option<&ElementTree<T>>,
        older: Option<&ElementTree<T>>,
        comparator: &dyn ElementComparator<T>,
        inclusive: bool,
    ) -> bool {
        lineage::has_changes(newer, older, comparator, inclusive)
    }

    pub(crate) fn assemble(&self, path: &ElementPath) -> Option<Arc<DataNode<T>>> {
        self.tree.assemble(path)
    }

    /// Complete copy of `path` plus the tree data, taken under the lock.
    pub(crate) fn snapshot(&self, path: &ElementPath) -> (Option<Arc<DataNode<T>>>, Option<T>) {
        let state = self.state();
        (self.tree.assemble(path), state.tree_data.clone())
    }

    /// Freeze without rerooting; used for trees rebuilt from a stream.
    pub(crate) fn freeze_in_place(&self) {
        self.tree.set_immutable();
        self.state().invalidate();
    }

    /// One `path: data` line per element, in pre-order.
    pub fn to_debug_string(&self) -> String
    where
        T: fmt::Debug,
    {
        let mut out = String::new();
        ElementTreeIterator::new(self, &ElementPath::root()).iterate(
            |requestor: &PathRequestor, data: Option<&T>| {
                out.push_str(&format!("{}: {:?}\n", requestor.request_path(), data));
            },
        );
        out
    }
}
