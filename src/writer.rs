//! Serializing generations and chains
//!
//! Every stream opens with the format version. A single tree is written
//! as one complete body; a chain is written as its engine-root generation
//! followed by one forward delta per remaining generation.
//!
//! Author: Moroya Sakamoto

use std::sync::Arc;

use crate::codec::{encode_body, encode_varint, ElementFlattener};
use crate::comparator::{ElementComparator, ElementData};
use crate::element_tree::ElementTree;
use crate::error::{Result, TreeError};
use crate::lineage;
use crate::node::{self, DataNode};
use crate::path::ElementPath;

/// Format version written by [`ElementTreeWriter`].
pub const CURRENT_FORMAT: u32 = 1;

/// Writes generations through a payload flattener.
pub struct ElementTreeWriter<'a, T> {
    flattener: &'a dyn ElementFlattener<T>,
}

impl<'a, T: ElementData> ElementTreeWriter<'a, T> {
    pub fn new(flattener: &'a dyn ElementFlattener<T>) -> Self {
        Self { flattener }
    }

    /// Write the subtree of `tree` at `path`, limited to `depth` levels of
    /// children (`None` = everything).
    pub fn write_tree(
        &self,
        tree: &ElementTree<T>,
        path: &ElementPath,
        depth: Option<usize>,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        encode_varint(CURRENT_FORMAT, out);
        self.tree_body(tree, path, depth, out)?;
        tracing::debug!(generation = tree.stamp(), path = %path, bytes = out.len(), "wrote tree");
        Ok(())
    }

    /// Write the changes that turn `parent` into `tree` at `path`.
    pub fn write_delta(
        &self,
        tree: &ElementTree<T>,
        parent: &ElementTree<T>,
        path: &ElementPath,
        depth: Option<usize>,
        out: &mut Vec<u8>,
        comparator: &dyn ElementComparator<T>,
    ) -> Result<()> {
        encode_varint(CURRENT_FORMAT, out);
        self.delta_body(tree, parent, path, depth, comparator, out)
    }

    /// Write `trees` so that [`read_delta_chain`](crate::ElementTreeReader::read_delta_chain)
    /// can rebuild them in the same slots.
    ///
    /// Layout: version, count, one original index per sorted slot, the
    /// first sorted tree, then a delta from each sorted tree to the next.
    pub fn write_delta_chain(
        &self,
        trees: &[ElementTree<T>],
        path: &ElementPath,
        depth: Option<usize>,
        out: &mut Vec<u8>,
        comparator: &dyn ElementComparator<T>,
    ) -> Result<()> {
        let (sorted, order) = lineage::sort_trees(trees)?;
        encode_varint(CURRENT_FORMAT, out);
        encode_varint(count(sorted.len())?, out);
        for index in &order {
            encode_varint(count(*index)?, out);
        }
        let Some(first) = sorted.first() else {
            return Ok(());
        };
        self.tree_body(first, path, depth, out)?;
        for pair in sorted.windows(2) {
            self.delta_body(&pair[1], &pair[0], path, depth, comparator, out)?;
        }
        tracing::debug!(trees = sorted.len(), path = %path, bytes = out.len(), "wrote delta chain");
        Ok(())
    }

    fn tree_body(
        &self,
        tree: &ElementTree<T>,
        path: &ElementPath,
        depth: Option<usize>,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        let node = tree
            .assemble(path)
            .ok_or_else(|| TreeError::ElementNotFound(path.clone()))?;
        encode_body(path, &node::truncate(&node, depth), self.flattener, out)
    }

    fn delta_body(
        &self,
        tree: &ElementTree<T>,
        parent: &ElementTree<T>,
        path: &ElementPath,
        depth: Option<usize>,
        comparator: &dyn ElementComparator<T>,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        let delta = match (parent.assemble(path), tree.assemble(path)) {
            (Some(from), Some(to)) => node::delta_between(&from, &to, comparator)
                .map(Arc::new)
                .unwrap_or_else(|| Arc::new(DataNode::empty_delta())),
            (None, Some(to)) => to,
            (Some(_), None) => Arc::new(DataNode::Deleted),
            (None, None) => return Err(TreeError::ElementNotFound(path.clone())),
        };
        encode_body(path, &node::truncate(&delta, depth), self.flattener, out)
    }
}

fn count(value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| TreeError::argument("too many trees"))
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_varint, StringFlattener};
    use crate::comparator::DefaultElementComparator;

    fn p(s: &str) -> ElementPath {
        ElementPath::parse(s)
    }

    #[test]
    fn test_stream_starts_with_version() {
        let tree = ElementTree::<String>::new();
        let mut out = Vec::new();
        ElementTreeWriter::<String>::new(&StringFlattener)
            .write_tree(&tree, &ElementPath::root(), None, &mut out)
            .unwrap();
        assert_eq!(decode_varint(&mut &out[..]).unwrap(), CURRENT_FORMAT);
    }

    #[test]
    fn test_missing_path() {
        let tree = ElementTree::<String>::new();
        let mut out = Vec::new();
        let err = ElementTreeWriter::<String>::new(&StringFlattener)
            .write_tree(&tree, &p("/nope"), None, &mut out)
            .unwrap_err();
        assert!(matches!(err, TreeError::ElementNotFound(_)));
    }

    #[test]
    fn test_depth_limit_shrinks_output() {
        let tree = ElementTree::new();
        tree.create_element(&p("/a"), Some("a".to_string())).unwrap();
        tree.create_element(&p("/a/b"), Some("b".to_string())).unwrap();
        let writer = ElementTreeWriter::<String>::new(&StringFlattener);
        let (mut full, mut shallow) = (Vec::new(), Vec::new());
        writer.write_tree(&tree, &ElementPath::root(), None, &mut full).unwrap();
        writer.write_tree(&tree, &ElementPath::root(), Some(1), &mut shallow).unwrap();
        assert!(shallow.len() < full.len());
    }

    #[test]
    fn test_chain_header() {
        let t0 = ElementTree::<String>::new();
        let t1 = t0.new_empty_delta();
        t1.immutable();
        let mut out = Vec::new();
        ElementTreeWriter::<String>::new(&StringFlattener)
            .write_delta_chain(
                &[t0, t1],
                &ElementPath::root(),
                None,
                &mut out,
                &DefaultElementComparator,
            )
            .unwrap();
        let mut input = &out[..];
        assert_eq!(decode_varint(&mut input).unwrap(), CURRENT_FORMAT);
        assert_eq!(decode_varint(&mut input).unwrap(), 2);
        let first = decode_varint(&mut input).unwrap();
        let second = decode_varint(&mut input).unwrap();
        let mut slots = vec![first, second];
        slots.sort();
        assert_eq!(slots, vec![0, 1]);
    }
}
