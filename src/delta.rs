//! Delta views between two generations
//!
//! [`ElementTreeDelta`] pairs an old and a new generation with the diff
//! tree computed between them. [`ElementDelta`] is a cursor at one path
//! of that view.
//!
//! Below an added or removed node there is no per-node diff. Child deltas
//! are synthesized from the live tree on that side and classified by a
//! [`SubtreeClassification`] policy.
//!
//! Author: Moroya Sakamoto

use std::fmt;
use std::sync::Arc;

use crate::comparator::{DeltaFilter, ElementComparator, ElementData};
use crate::comparison::{compare_nodes, ComparisonKind, DiffNode, NodeComparison};
use crate::element_tree::ElementTree;
use crate::error::{Result, TreeError};
use crate::path::ElementPath;

// ── Classification policy ──────────────────────────────────────────────

/// How descendants of an added or removed node are classified.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SubtreeClassification {
    /// Every descendant carries its parent's comparator code.
    #[default]
    InheritFromParent,
    /// Each descendant is run through the comparator on its own.
    CompareEach,
}

impl SubtreeClassification {
    pub fn classify<T>(
        &self,
        inherited: i32,
        old: Option<&T>,
        new: Option<&T>,
        comparator: &dyn ElementComparator<T>,
    ) -> i32 {
        match self {
            SubtreeClassification::InheritFromParent => inherited,
            SubtreeClassification::CompareEach => comparator.compare(old, new),
        }
    }
}

// ── ElementTreeDelta ───────────────────────────────────────────────────

pub(crate) struct DeltaState<T: ElementData> {
    pub old: ElementTree<T>,
    pub new: ElementTree<T>,
    pub comparator: Arc<dyn ElementComparator<T>>,
    pub root_path: ElementPath,
    pub diff: Arc<DiffNode<T>>,
}

/// Diff view from an old to a new generation, rooted at a path.
pub struct ElementTreeDelta<T: ElementData> {
    pub(crate) state: Arc<DeltaState<T>>,
    pub(crate) classification: SubtreeClassification,
}

impl<T: ElementData> Clone for ElementTreeDelta<T> {
    fn clone(&self) -> Self {
        Self { state: Arc::clone(&self.state), classification: self.classification }
    }
}

impl<T: ElementData> fmt::Debug for ElementTreeDelta<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementTreeDelta")
            .field("old", &self.state.old.stamp())
            .field("new", &self.state.new.stamp())
            .field("root_path", &self.state.root_path)
            .finish()
    }
}

impl<T: ElementData> ElementTreeDelta<T> {
    /// Freeze both generations and diff them at `path`.
    pub fn new(
        old: &ElementTree<T>,
        new: &ElementTree<T>,
        comparator: Arc<dyn ElementComparator<T>>,
        path: &ElementPath,
    ) -> Result<Self> {
        old.immutable();
        new.immutable();

        let diff = match (old.assemble(path), new.assemble(path)) {
            (Some(o), Some(n)) => compare_nodes(&o, &n, comparator.as_ref()),
            (None, Some(n)) => {
                side_only(None, n.data().cloned(), ComparisonKind::Added, comparator.as_ref())
            }
            (Some(o), None) => {
                side_only(o.data().cloned(), None, ComparisonKind::Removed, comparator.as_ref())
            }
            (None, None) => return Err(TreeError::ElementNotFound(path.clone())),
        };
        tracing::trace!(old = old.stamp(), new = new.stamp(), path = %path, "computed tree delta");

        Ok(Self {
            state: Arc::new(DeltaState {
                old: old.clone(),
                new: new.clone(),
                comparator,
                root_path: path.clone(),
                diff: Arc::new(diff),
            }),
            classification: SubtreeClassification::default(),
        })
    }

    /// Builder: set the policy for descendants of added/removed nodes.
    pub fn with_classification(mut self, classification: SubtreeClassification) -> Self {
        self.classification = classification;
        self
    }

    pub fn classification(&self) -> SubtreeClassification {
        self.classification
    }

    pub fn old_tree(&self) -> &ElementTree<T> {
        &self.state.old
    }

    pub fn new_tree(&self) -> &ElementTree<T> {
        &self.state.new
    }

    pub fn root_path(&self) -> &ElementPath {
        &self.state.root_path
    }

    pub fn comparator(&self) -> &dyn ElementComparator<T> {
        self.state.comparator.as_ref()
    }

    pub(crate) fn diff(&self) -> &Arc<DiffNode<T>> {
        &self.state.diff
    }

    /// Cursor at `relative` (relative to [`root_path`](Self::root_path)),
    /// or `None` if nothing changed there.
    pub fn element_delta(&self, relative: &ElementPath) -> Option<ElementDelta<T>> {
        let node = self.state.diff.find_arc(relative)?;
        Some(ElementDelta {
            delta: self.clone(),
            path: self.state.root_path.join(relative),
            comparison: node.comparison.clone(),
            node: Some(node),
        })
    }

    /// Release both generations and the diff tree.
    pub fn destroy(self) {
        tracing::trace!(root_path = %self.state.root_path, "destroying tree delta");
    }
}

fn side_only<T>(
    old_data: Option<T>,
    new_data: Option<T>,
    kind: ComparisonKind,
    comparator: &dyn ElementComparator<T>,
) -> DiffNode<T> {
    let user = comparator.compare(old_data.as_ref(), new_data.as_ref());
    DiffNode {
        comparison: NodeComparison::new(old_data, new_data, kind, user),
        children: Default::default(),
    }
}

// ── ElementDelta ───────────────────────────────────────────────────────

/// The change recorded for one element of an [`ElementTreeDelta`].
pub struct ElementDelta<T: ElementData> {
    delta: ElementTreeDelta<T>,
    path: ElementPath,
    comparison: NodeComparison<T>,
    node: Option<Arc<DiffNode<T>>>,
}

impl<T: ElementData> Clone for ElementDelta<T> {
    fn clone(&self) -> Self {
        Self {
            delta: self.delta.clone(),
            path: self.path.clone(),
            comparison: self.comparison.clone(),
            node: self.node.clone(),
        }
    }
}

impl<T: ElementData> fmt::Debug for ElementDelta<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementDelta")
            .field("path", &self.path)
            .field("kind", &self.comparison.kind)
            .field("comparison", &self.comparison.user_comparison)
            .finish()
    }
}

impl<T: ElementData> ElementDelta<T> {
    /// Absolute path of the element.
    pub fn path(&self) -> &ElementPath {
        &self.path
    }

    /// Comparator code; `0` means no semantic change.
    pub fn comparison(&self) -> i32 {
        self.comparison.user_comparison
    }

    pub fn kind(&self) -> ComparisonKind {
        self.comparison.kind
    }

    pub fn node_comparison(&self) -> &NodeComparison<T> {
        &self.comparison
    }

    pub fn old_data(&self) -> Option<&T> {
        self.comparison.old_data.as_ref()
    }

    pub fn new_data(&self) -> Option<&T> {
        self.comparison.new_data.as_ref()
    }

    /// Child deltas selected by `filter`, sorted by name.
    pub fn affected_children<F: DeltaFilter + ?Sized>(&self, filter: &F) -> Vec<ElementDelta<T>> {
        match self.comparison.kind {
            ComparisonKind::Changed => self.changed_children(filter),
            ComparisonKind::Added | ComparisonKind::Removed => self.synthesized_children(filter),
        }
    }

    pub fn has_affected_children<F: DeltaFilter + ?Sized>(&self, filter: &F) -> bool {
        match self.comparison.kind {
            ComparisonKind::Changed => self.node.as_ref().is_some_and(|node| {
                node.children.values().any(|c| carries(c, filter))
            }),
            ComparisonKind::Added | ComparisonKind::Removed => {
                !self.synthesized_children(filter).is_empty()
            }
        }
    }

    fn changed_children<F: DeltaFilter + ?Sized>(&self, filter: &F) -> Vec<ElementDelta<T>> {
        let Some(node) = &self.node else {
            return Vec::new();
        };
        node.children
            .iter()
            .filter(|(_, child)| carries(child, filter))
            .map(|(name, child)| ElementDelta {
                delta: self.delta.clone(),
                path: self.path.append_name(name.clone()),
                comparison: child.comparison.clone(),
                node: Some(Arc::clone(child)),
            })
            .collect()
    }

    fn synthesized_children<F: DeltaFilter + ?Sized>(&self, filter: &F) -> Vec<ElementDelta<T>> {
        if !filter.include_element(self.comparison.user_comparison) {
            return Vec::new();
        }
        let kind = self.comparison.kind;
        let source = match kind {
            ComparisonKind::Added => self.delta.new_tree(),
            _ => self.delta.old_tree(),
        };
        let Some(node) = source.assemble(&self.path) else {
            return Vec::new();
        };
        let Some(children) = node.children() else {
            return Vec::new();
        };
        let comparator = self.delta.comparator();
        children
            .iter()
            .filter_map(|(name, child)| {
                let data = child.data().cloned();
                let (old_data, new_data) = match kind {
                    ComparisonKind::Added => (None, data),
                    _ => (data, None),
                };
                let code = self.delta.classification.classify(
                    self.comparison.user_comparison,
                    old_data.as_ref(),
                    new_data.as_ref(),
                    comparator,
                );
                filter.include_element(code).then(|| ElementDelta {
                    delta: self.delta.clone(),
                    path: self.path.append_name(name.clone()),
                    comparison: NodeComparison::new(old_data, new_data, kind, code),
                    node: None,
                })
            })
            .collect()
    }
}

/// A diff child is reported if the filter accepts it or it leads to
/// deeper changes.
fn carries<T, F: DeltaFilter + ?Sized>(child: &DiffNode<T>, filter: &F) -> bool {
    filter.include_element(child.comparison.user_comparison)
        || (child.comparison.is_changed() && !child.children.is_empty())
}

// ── Tests ──────────────────────────────────────────────────────────────
