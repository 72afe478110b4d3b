//! Binary codec for element trees and deltas
//!
//! Counts and version tags use a 1-or-5 byte varint: values `0..=254`
//! take one byte, anything larger is `0xFF` followed by a big-endian u32.
//!
//! A body is a path header (`count name*`) followed by the node at that
//! path: `kind [data] [count (name node)*]`. Deleted nodes have no child
//! list, and the implicit root never carries data. Payloads go through an
//! [`ElementFlattener`].
//!
//! Author: Moroya Sakamoto

use std::collections::HashSet;
use std::sync::Arc;

use bytes::{Buf, BufMut};

use crate::error::{Result, TreeError};
use crate::node::{Children, DataNode};
use crate::path::{ElementPath, Name};

// ── Node Kind Discriminants ────────────────────────────────────────────

const KIND_COMPLETE: u8 = 0;
const KIND_DATA_DELTA: u8 = 1;
const KIND_DELETED: u8 = 2;
const KIND_NO_DATA_DELTA: u8 = 3;

const VARINT_ESCAPE: u8 = 0xFF;

/// Deepest element nesting a body may carry below its header path.
pub const MAX_NESTING: usize = 512;

// ── Varint ─────────────────────────────────────────────────────────────

/// Encode a u32 as a 1-or-5 byte varint.
#[inline]
pub fn encode_varint(value: u32, buf: &mut impl BufMut) {
    if value < VARINT_ESCAPE as u32 {
        buf.put_u8(value as u8);
    } else {
        buf.put_u8(VARINT_ESCAPE);
        buf.put_u32(value);
    }
}

/// Decode a 1-or-5 byte varint.
#[inline]
pub fn decode_varint(input: &mut &[u8]) -> Result<u32> {
    if !input.has_remaining() {
        return Err(TreeError::malformed("unexpected end of stream"));
    }
    let first = input.get_u8();
    if first != VARINT_ESCAPE {
        return Ok(first as u32);
    }
    if input.remaining() < 4 {
        return Err(TreeError::malformed("truncated varint"));
    }
    Ok(input.get_u32())
}

#[inline]
fn encode_count(value: usize, buf: &mut impl BufMut) -> Result<()> {
    let value = u32::try_from(value).map_err(|_| TreeError::argument("count exceeds u32"))?;
    encode_varint(value, buf);
    Ok(())
}

#[inline]
fn decode_count(input: &mut &[u8]) -> Result<usize> {
    decode_varint(input).map(|v| v as usize)
}

// ── String Codec ───────────────────────────────────────────────────────

pub fn encode_string(s: &str, buf: &mut impl BufMut) -> Result<()> {
    encode_count(s.len(), buf)?;
    buf.put_slice(s.as_bytes());
    Ok(())
}

pub fn decode_string(input: &mut &[u8]) -> Result<String> {
    let len = decode_count(input)?;
    if input.remaining() < len {
        return Err(TreeError::malformed("truncated string"));
    }
    let s = std::str::from_utf8(&input[..len])
        .map_err(|e| TreeError::malformed(format!("invalid utf-8 in name: {e}")))?
        .to_string();
    input.advance(len);
    Ok(s)
}

// ── Name Interning ─────────────────────────────────────────────────────

/// Deduplicates element names while reading, so equal names in a chain
/// share one allocation.
#[derive(Debug, Default)]
pub struct NamePool {
    names: HashSet<Name>,
}

impl NamePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, name: &str) -> Name {
        if let Some(existing) = self.names.get(name) {
            return Name::clone(existing);
        }
        let name = Name::from(name);
        self.names.insert(Name::clone(&name));
        name
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

// ── Payload Flattening ─────────────────────────────────────────────────

/// Reads and writes element payloads. The codec never looks inside them.
pub trait ElementFlattener<T>: Send + Sync {
    fn write_element(&self, path: &ElementPath, data: Option<&T>, out: &mut Vec<u8>) -> Result<()>;
    fn read_element(&self, path: &ElementPath, input: &mut &[u8]) -> Result<Option<T>>;
}

/// Flattener for `String` payloads: a presence byte, then the string.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringFlattener;

impl ElementFlattener<String> for StringFlattener {
    fn write_element(
        &self,
        _path: &ElementPath,
        data: Option<&String>,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        match data {
            None => out.put_u8(0),
            Some(s) => {
                out.put_u8(1);
                encode_string(s, out)?;
            }
        }
        Ok(())
    }

    fn read_element(&self, _path: &ElementPath, input: &mut &[u8]) -> Result<Option<String>> {
        if !input.has_remaining() {
            return Err(TreeError::malformed("missing payload"));
        }
        match input.get_u8() {
            0 => Ok(None),
            1 => decode_string(input).map(Some),
            other => Err(TreeError::malformed(format!("bad payload marker {other}"))),
        }
    }
}

// ── Node Body Encoding ─────────────────────────────────────────────────

/// Encode `node`, which lives at `path`, preceded by its path header.
pub(crate) fn encode_body<T>(
    path: &ElementPath,
    node: &DataNode<T>,
    flattener: &dyn ElementFlattener<T>,
    buf: &mut Vec<u8>,
) -> Result<()> {
    encode_count(path.segment_count(), buf)?;
    for segment in path.segments() {
        encode_string(segment, buf)?;
    }
    let mut current = path.segments().to_vec();
    encode_node(node, &mut current, flattener, buf)
}

fn encode_node<T>(
    node: &DataNode<T>,
    path: &mut Vec<Name>,
    flattener: &dyn ElementFlattener<T>,
    buf: &mut Vec<u8>,
) -> Result<()> {
    let kind = match node {
        DataNode::Complete { .. } => KIND_COMPLETE,
        DataNode::DataDelta { .. } => KIND_DATA_DELTA,
        DataNode::NoDataDelta { .. } => KIND_NO_DATA_DELTA,
        DataNode::Deleted => KIND_DELETED,
    };
    buf.put_u8(kind);
    if node.carries_data() && !path.is_empty() {
        let element = ElementPath::from_names(path.clone());
        flattener.write_element(&element, node.data(), buf)?;
    }
    let Some(children) = node.children() else {
        return Ok(());
    };
    encode_count(children.len(), buf)?;
    for (name, child) in children {
        encode_string(name, buf)?;
        path.push(Name::clone(name));
        encode_node(child, path, flattener, buf)?;
        path.pop();
    }
    Ok(())
}

// ── Node Body Decoding ─────────────────────────────────────────────────

/// State shared by every body decoded from one stream.
pub(crate) struct BodyReader<'a, T> {
    pub flattener: &'a dyn ElementFlattener<T>,
    pub pool: &'a mut NamePool,
    /// Replacement for the top-level element name.
    pub rename: Option<Name>,
}

impl<T> BodyReader<'_, T> {
    /// Decode a path header and the node at that path.
    pub fn read_body(&mut self, input: &mut &[u8]) -> Result<(ElementPath, DataNode<T>)> {
        let count = decode_count(input)?;
        let mut segments = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            let name = decode_string(input)?;
            segments.push(self.pool.intern(&name));
        }
        let mut header = ElementPath::from_names(segments);
        if let Some(rename) = &self.rename {
            header = header.with_first_segment(Name::clone(rename));
        }
        let mut path = header.segments().to_vec();
        let node = self.read_node(input, &mut path, false, 0)?;
        if header.is_root() {
            return Ok((header, self.rename_top_level(node)?));
        }
        Ok((header, node))
    }

    fn read_node(
        &mut self,
        input: &mut &[u8],
        path: &mut Vec<Name>,
        in_complete: bool,
        depth: usize,
    ) -> Result<DataNode<T>> {
        if depth > MAX_NESTING {
            return Err(TreeError::malformed("nesting too deep"));
        }
        if !input.has_remaining() {
            return Err(TreeError::malformed("unexpected end of stream"));
        }
        let kind = input.get_u8();
        if in_complete && kind != KIND_COMPLETE {
            return Err(TreeError::malformed("complete node with a delta child"));
        }
        if kind == KIND_DELETED {
            return Ok(DataNode::Deleted);
        }
        let data = match kind {
            KIND_COMPLETE | KIND_DATA_DELTA if !path.is_empty() => {
                let element = ElementPath::from_names(path.clone());
                self.flattener.read_element(&element, input)?
            }
            KIND_COMPLETE | KIND_DATA_DELTA | KIND_NO_DATA_DELTA => None,
            other => return Err(TreeError::malformed(format!("unknown node kind {other}"))),
        };

        let count = decode_count(input)?;
        let mut children = Children::new();
        for _ in 0..count {
            let name = decode_string(input)?;
            let name = self.pool.intern(&name);
            path.push(Name::clone(&name));
            let child = self.read_node(input, path, kind == KIND_COMPLETE, depth + 1)?;
            path.pop();
            children.insert(name, Arc::new(child));
        }

        Ok(match kind {
            KIND_COMPLETE => DataNode::Complete { data, children },
            KIND_DATA_DELTA => DataNode::DataDelta { data, children },
            _ => DataNode::NoDataDelta { children },
        })
    }

    /// Apply the rename to the single top-level child of a root body.
    fn rename_top_level(&self, mut node: DataNode<T>) -> Result<DataNode<T>> {
        let Some(rename) = &self.rename else {
            return Ok(node);
        };
        let Some(children) = node.children_mut() else {
            return Ok(node);
        };
        if children.len() > 1 {
            return Err(TreeError::argument("renaming requires a single top-level element"));
        }
        if let Some((_, child)) = children.pop_first() {
            children.insert(Name::clone(rename), child);
        }
        Ok(node)
    }
}

/// Nest `node` under the segments of `path`, using `wrap` for every
/// enclosing node.
pub(crate) fn embed<T>(
    path: &ElementPath,
    node: DataNode<T>,
    wrap: impl Fn(Children<T>) -> DataNode<T>,
) -> Arc<DataNode<T>> {
    let mut current = Arc::new(node);
    for segment in path.segments().iter().rev() {
        let mut children = Children::new();
        children.insert(Name::clone(segment), current);
        current = Arc::new(wrap(children));
    }
    current
}

// ── Tests ──────────────────────────────────────────────────────────────
