//! Rebuilding generations from a stream
//!
//! Streams start with a format version; [`ElementTreeReader`] looks the
//! version up in its codec registry and hands the rest of the stream to
//! that [`TreeCodec`]. Version 1 is [`CodecV1`], the mirror of
//! [`ElementTreeWriter`](crate::ElementTreeWriter).
//!
//! Trees rebuilt from a stream are frozen and keep the chain shape they
//! were written in. Tree data is not part of the format.
//!
//! Author: Moroya Sakamoto

use std::collections::{HashMap, HashSet};

use crate::codec::{decode_varint, embed, BodyReader, ElementFlattener, NamePool};
use crate::comparator::ElementData;
use crate::config::TreeConfig;
use crate::element_tree::ElementTree;
use crate::error::{Result, TreeError};
use crate::node::DataNode;
use crate::path::Name;

// ── Read Context ───────────────────────────────────────────────────────

/// Everything a codec needs while decoding one stream.
pub struct ReadContext<'a, T> {
    body: BodyReader<'a, T>,
    config: &'a TreeConfig,
}

impl<T> ReadContext<'_, T> {
    /// Configuration given to every rebuilt generation.
    pub fn config(&self) -> &TreeConfig {
        self.config
    }

    /// Name pool shared by all bodies of the stream.
    pub fn pool(&self) -> &NamePool {
        &*self.body.pool
    }

    /// Top-level rename in effect, if any.
    pub fn rename(&self) -> Option<&str> {
        self.body.rename.as_deref()
    }
}

// ── Codecs ─────────────────────────────────────────────────────────────

/// Decoder for one format version. The version varint has already been
/// consumed when these methods run.
pub trait TreeCodec<T: ElementData>: Send + Sync {
    fn read_tree(&self, input: &mut &[u8], ctx: &mut ReadContext<'_, T>) -> Result<ElementTree<T>>;

    fn read_delta(
        &self,
        input: &mut &[u8],
        parent: &ElementTree<T>,
        ctx: &mut ReadContext<'_, T>,
    ) -> Result<ElementTree<T>>;

    fn read_delta_chain(
        &self,
        input: &mut &[u8],
        ctx: &mut ReadContext<'_, T>,
    ) -> Result<Vec<ElementTree<T>>>;
}

/// Version 1: path-headed node bodies, chains as one tree plus deltas.
#[derive(Debug, Default, Clone, Copy)]
pub struct CodecV1;

impl<T: ElementData> TreeCodec<T> for CodecV1 {
    fn read_tree(&self, input: &mut &[u8], ctx: &mut ReadContext<'_, T>) -> Result<ElementTree<T>> {
        let (path, node) = ctx.body.read_body(input)?;
        if !node.is_complete() {
            return Err(TreeError::malformed("tree body is not complete"));
        }
        let root = embed(&path, node, |children| DataNode::Complete { data: None, children });
        let tree = ElementTree::from_parts(root, None, ctx.config.clone(), None);
        tree.freeze_in_place();
        Ok(tree)
    }

    fn read_delta(
        &self,
        input: &mut &[u8],
        parent: &ElementTree<T>,
        ctx: &mut ReadContext<'_, T>,
    ) -> Result<ElementTree<T>> {
        let (path, node) = ctx.body.read_body(input)?;
        if node.is_empty_delta() {
            // No changes: the parent stands in for this generation.
            return Ok(parent.clone());
        }
        if path.is_root() && node.is_deleted() {
            return Err(TreeError::malformed("root cannot be deleted"));
        }
        let root = embed(&path, node, |children| DataNode::NoDataDelta { children });
        let tree_data = parent.get_tree_data();
        let tree = ElementTree::from_parts(root, Some(parent), ctx.config.clone(), tree_data);
        tree.freeze_in_place();
        Ok(tree)
    }

    fn read_delta_chain(
        &self,
        input: &mut &[u8],
        ctx: &mut ReadContext<'_, T>,
    ) -> Result<Vec<ElementTree<T>>> {
        let count = decode_varint(input)? as usize;
        let mut order = Vec::with_capacity(count.min(1024));
        let mut seen = HashSet::new();
        for _ in 0..count {
            let slot = decode_varint(input)? as usize;
            if slot >= count || !seen.insert(slot) {
                return Err(TreeError::malformed(format!("invalid chain slot {slot}")));
            }
            order.push(slot);
        }
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut sorted = Vec::with_capacity(order.len());
        sorted.push(TreeCodec::<T>::read_tree(self, input, ctx)?);
        for _ in 1..count {
            let previous = &sorted[sorted.len() - 1];
            let next = TreeCodec::<T>::read_delta(self, input, previous, ctx)?;
            sorted.push(next);
        }

        let mut slots: Vec<Option<ElementTree<T>>> = vec![None; count];
        for (tree, slot) in sorted.into_iter().zip(order) {
            slots[slot] = Some(tree);
        }
        slots
            .into_iter()
            .map(|tree| tree.ok_or_else(|| TreeError::malformed("missing chain slot")))
            .collect()
    }
}

// ── Reader ─────────────────────────────────────────────────────────────

/// Reads generations through a payload flattener and a codec registry.
pub struct ElementTreeReader<'a, T: ElementData> {
    flattener: &'a dyn ElementFlattener<T>,
    codecs: HashMap<u32, Box<dyn TreeCodec<T>>>,
    config: TreeConfig,
}

impl<'a, T: ElementData> ElementTreeReader<'a, T> {
    /// Reader that understands version 1.
    pub fn new(flattener: &'a dyn ElementFlattener<T>) -> Self {
        let mut codecs: HashMap<u32, Box<dyn TreeCodec<T>>> = HashMap::new();
        codecs.insert(1, Box::new(CodecV1));
        Self { flattener, codecs, config: TreeConfig::default() }
    }

    /// Configuration for every generation this reader builds.
    pub fn with_config(mut self, config: TreeConfig) -> Self {
        self.config = config;
        self
    }

    /// Register (or replace) the codec for `version`.
    pub fn register(&mut self, version: u32, codec: Box<dyn TreeCodec<T>>) {
        self.codecs.insert(version, codec);
    }

    pub fn read_tree(&self, input: &mut &[u8]) -> Result<ElementTree<T>> {
        let codec = self.codec(input)?;
        let mut pool = NamePool::new();
        let tree = codec.read_tree(input, &mut self.context(&mut pool, None))?;
        tracing::debug!(generation = tree.stamp(), names = pool.len(), "read tree");
        Ok(tree)
    }

    /// Read a delta and layer it over `parent`.
    pub fn read_delta(&self, input: &mut &[u8], parent: &ElementTree<T>) -> Result<ElementTree<T>> {
        let codec = self.codec(input)?;
        let mut pool = NamePool::new();
        codec.read_delta(input, parent, &mut self.context(&mut pool, None))
    }

    /// Read a chain; trees land in the slots they were written from.
    pub fn read_delta_chain(&self, input: &mut &[u8]) -> Result<Vec<ElementTree<T>>> {
        self.read_chain(input, None)
    }

    /// Read a chain, renaming its single top-level element to `name`.
    pub fn read_delta_chain_renamed(
        &self,
        input: &mut &[u8],
        name: &str,
    ) -> Result<Vec<ElementTree<T>>> {
        self.read_chain(input, Some(Name::from(name)))
    }

    fn read_chain(&self, input: &mut &[u8], rename: Option<Name>) -> Result<Vec<ElementTree<T>>> {
        let codec = self.codec(input)?;
        let mut pool = NamePool::new();
        let trees = codec.read_delta_chain(input, &mut self.context(&mut pool, rename))?;
        tracing::debug!(trees = trees.len(), names = pool.len(), "read delta chain");
        Ok(trees)
    }

    fn codec(&self, input: &mut &[u8]) -> Result<&dyn TreeCodec<T>> {
        let version = decode_varint(input)?;
        self.codecs
            .get(&version)
            .map(|codec| codec.as_ref())
            .ok_or_else(|| TreeError::malformed(format!("unsupported format version {version}")))
    }

    fn context<'b>(&'b self, pool: &'b mut NamePool, rename: Option<Name>) -> ReadContext<'b, T> {
        ReadContext {
            body: BodyReader { flattener: self.flattener, pool, rename },
            config: &self.config,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
