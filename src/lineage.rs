//! Chain walks over generation lineages
//!
//! Helpers that reason about how a set of generations relate through
//! their parent links: finding the one whose chain covers all others,
//! ordering a set for chain serialization, and cheap change detection.
//!
//! All walks are mark-and-sweep over parent chains, O(n * depth), with no
//! ancestry matrix.
//!
//! Author: Moroya Sakamoto

use std::collections::{HashMap, HashSet};

use crate::comparator::{ElementComparator, ElementData, K_NO_CHANGE};
use crate::element_tree::ElementTree;
use crate::error::{Result, TreeError};

// ── Oldest ─────────────────────────────────────────────────────────────

/// Index of the generation whose parent chain reaches every other one.
///
/// Candidates are swept in turn; each sweep removes every ancestor of the
/// current candidate, so the last candidate standing covers the set.
/// Returns `None` for an empty slice.
pub fn find_oldest<T: ElementData>(trees: &[ElementTree<T>]) -> Option<usize> {
    let mut candidates: Vec<&ElementTree<T>> = Vec::with_capacity(trees.len());
    let mut seen = HashSet::new();
    for tree in trees {
        if seen.insert(tree.id()) {
            candidates.push(tree);
        }
    }

    let mut oldest: Option<ElementTree<T>> = None;
    while let Some(current) = candidates.pop() {
        // Sweep ancestors until the root or the previous survivor.
        let mut parent = current.get_parent();
        while let Some(tree) = parent {
            if oldest.as_ref().is_some_and(|o| o.ptr_eq(&tree)) {
                break;
            }
            candidates.retain(|c| !c.ptr_eq(&tree));
            parent = tree.get_parent();
        }
        oldest = Some(current.clone());
    }

    let oldest = oldest?;
    trees.iter().position(|t| t.ptr_eq(&oldest))
}

// ── Sort ───────────────────────────────────────────────────────────────

/// Order `trees` so that every tree's parent-chain ancestor in the set has
/// a lower index. Duplicates stay adjacent.
///
/// Returns the sorted trees and, for each sorted slot, the index the tree
/// had in `trees`. Fails if the trees are not one lineage.
pub fn sort_trees<T: ElementData>(
    trees: &[ElementTree<T>],
) -> Result<(Vec<ElementTree<T>>, Vec<usize>)> {
    let n = trees.len();
    let Some(start) = find_oldest(trees) else {
        return Ok((Vec::new(), Vec::new()));
    };

    let mut table: HashMap<usize, Vec<usize>> = HashMap::with_capacity(n);
    for (i, tree) in trees.iter().enumerate() {
        table.entry(tree.id()).or_default().push(i);
    }

    let mut sorted: Vec<Option<ElementTree<T>>> = vec![None; n];
    let mut order = vec![0usize; n];
    let mut slot = n;
    let mut current = trees[start].clone();
    loop {
        let indices = table
            .remove(&current.id())
            .ok_or_else(|| TreeError::argument("trees do not form a single lineage"))?;
        for index in indices {
            slot -= 1;
            sorted[slot] = Some(current.clone());
            order[slot] = index;
        }
        if slot == 0 {
            break;
        }
        let mut parent = current.get_parent();
        loop {
            match parent {
                Some(tree) if table.contains_key(&tree.id()) => {
                    current = tree;
                    break;
                }
                Some(tree) => parent = tree.get_parent(),
                None => return Err(TreeError::argument("trees do not form a single lineage")),
            }
        }
    }

    let sorted = sorted
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| TreeError::argument("trees do not form a single lineage"))?;
    Ok((sorted, order))
}

// ── Change detection ───────────────────────────────────────────────────

/// True if anything may differ between `newer` and `older`.
///
/// Tree data is compared first; then every delta layer between the two is
/// checked for emptiness without materializing a diff. When `newer` is
/// built on `older` only its own layers are checked and `inclusive` has no
/// effect. Absent inputs are reported as changed.
pub fn has_changes<T: ElementData>(
    newer: Option<&ElementTree<T>>,
    older: Option<&ElementTree<T>>,
    comparator: &dyn ElementComparator<T>,
    inclusive: bool,
) -> bool {
    let (Some(newer), Some(older)) = (newer, older) else {
        return true;
    };
    if newer.ptr_eq(older) {
        return false;
    }
    let (new_data, old_data) = (newer.get_tree_data(), older.get_tree_data());
    if comparator.compare(new_data.as_ref(), old_data.as_ref()) != K_NO_CHANGE {
        return true;
    }

    // Without a reroot between them `newer` is a stack of deltas on `older`,
    // and those layers are exactly the changes.
    if newer.has_ancestor(older) {
        let mut layer = Some(newer.clone());
        while let Some(tree) = layer {
            if tree.ptr_eq(older) {
                break;
            }
            if !tree.is_empty_delta() {
                return true;
            }
            layer = tree.get_parent();
        }
        return false;
    }

    // A frozen newer layer sits at the top of the rerooted chain, so walks
    // from the old side stop below it. An open one points down to the
    // complete layer and is checked on its own.
    let stop = if newer.is_immutable() {
        newer.get_parent()
    } else {
        let mut layer = Some(newer.clone());
        while let Some(tree) = layer {
            let Some(parent) = tree.get_parent() else { break };
            if !tree.is_empty_delta() {
                return true;
            }
            layer = Some(parent);
        }
        None
    };

    let mut layer = if inclusive { Some(older.clone()) } else { older.get_parent() };
    while let Some(tree) = layer {
        let parent = tree.get_parent();
        let at_stop = match (&parent, &stop) {
            (None, None) => true,
            (Some(p), Some(s)) => p.ptr_eq(s),
            _ => false,
        };
        if at_stop {
            break;
        }
        if !tree.is_empty_delta() {
            return true;
        }
        layer = parent;
    }
    false
}

// ── Tests ──────────────────────────────────────────────────────────────
