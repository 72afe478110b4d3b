//! watson — Versioned Element Trees
//!
//! Copy-on-write trees of named elements, organized as chains of
//! generations. Each generation records only what changed relative to the
//! one below it; frozen generations are shared freely between readers.
//!
//! - Path-addressed create / delete / replace with structural sharing
//! - Freeze, branch, collapse and flatten generation chains
//! - Structural diffs with a user comparator and lazy subtree expansion
//! - Compact, versioned binary format for single trees and whole chains
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`path`] | Element paths and interned names |
//! | [`element_tree`] | Generations: lookups, mutation, freezing, subtrees |
//! | [`lineage`] | Ordering and change detection across a chain |
//! | [`comparator`] | Payload comparators and delta filters |
//! | [`comparison`] | Per-element comparison records and diff trees |
//! | [`delta`] | Diffs between two generations |
//! | [`delta_iterator`] | Pre/post-order traversal of a diff |
//! | [`iterator`] | Pre-order traversal of one generation |
//! | [`subtree`] | Bottom-up construction of detached subtrees |
//! | [`codec`] | Varints, name pool, payload flatteners, node bodies |
//! | [`writer`] | Writing trees, deltas and chains |
//! | [`reader`] | Versioned codec registry for reading them back |
//! | [`config`] | TOML-loadable generation settings |
//! | [`error`] | Error type |
//!
//! # Quick Start
//!
//! ```
//! use watson::{AcceptAll, ComparisonKind, DefaultElementComparator, ElementPath, ElementTree};
//!
//! let base: ElementTree<String> = ElementTree::new();
//! let project = ElementPath::parse("/project");
//! base.create_element(&project, Some("v1".into())).unwrap();
//!
//! // Branching freezes `base`; edits land in the new generation only.
//! let next = base.new_empty_delta();
//! next.set_element_data(&project, Some("v2".into())).unwrap();
//! next.create_element(&project.append("file"), None).unwrap();
//! assert_eq!(base.get_element_data(&project).unwrap().as_deref(), Some("v1"));
//!
//! let delta = next.compute_delta_with(&base, DefaultElementComparator).unwrap();
//! let changed = delta.element_delta(&project).unwrap();
//! assert_eq!(changed.kind(), ComparisonKind::Changed);
//! assert_eq!(changed.affected_children(&AcceptAll).len(), 1);
//! ```
//!
//! Author: Moroya Sakamoto

pub mod codec;
pub mod comparator;
pub mod comparison;
pub mod config;
pub(crate) mod data_tree;
pub mod delta;
pub mod delta_iterator;
pub mod element_tree;
pub mod error;
pub mod iterator;
pub mod lineage;
pub(crate) mod node;
pub mod path;
pub mod reader;
pub mod subtree;
pub mod writer;

pub use codec::{ElementFlattener, NamePool, StringFlattener};
pub use comparator::{
    AcceptAll, DefaultElementComparator, DeltaFilter, ElementComparator, ElementData, K_NO_CHANGE,
};
pub use comparison::{ComparisonKind, DiffNode, NodeComparison};
pub use config::TreeConfig;
pub use delta::{ElementDelta, ElementTreeDelta, SubtreeClassification};
pub use delta_iterator::{DeltaIterator, DeltaVisitor, TraversalOrder};
pub use element_tree::ElementTree;
pub use error::{Result, TreeError};
pub use iterator::{ElementContentVisitor, ElementPathVisitor, ElementTreeIterator, PathRequestor};
pub use lineage::{find_oldest, has_changes, sort_trees};
pub use path::{ElementPath, Name};
pub use reader::{CodecV1, ElementTreeReader, ReadContext, TreeCodec};
pub use subtree::ElementSubtree;
pub use writer::{ElementTreeWriter, CURRENT_FORMAT};
