//! Hierarchical element paths
//!
//! A path is an ordered list of name segments relative to the implicit
//! root. The empty path *is* the root. Segments are shared `Arc<str>` so
//! that interned names (see the chain reader) cost one pointer per node.
//!
//! Author: Moroya Sakamoto

use std::fmt;
use std::sync::Arc;

/// Interned element name.
pub type Name = Arc<str>;

/// Root-relative path of an element.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementPath {
    segments: Vec<Name>,
}

impl ElementPath {
    /// The implicit root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from segments.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            segments: segments
                .into_iter()
                .filter(|s| !s.as_ref().is_empty())
                .map(|s| Name::from(s.as_ref()))
                .collect(),
        }
    }

    pub(crate) fn from_names(segments: Vec<Name>) -> Self {
        Self { segments }
    }

    /// Parse `"/a/b"` style strings. Empty segments are ignored.
    pub fn parse(s: &str) -> Self {
        Self::new(s.split('/'))
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> &[Name] {
        &self.segments
    }

    pub fn segment(&self, index: usize) -> Option<&str> {
        self.segments.get(index).map(|s| s.as_ref())
    }

    pub fn last_segment(&self) -> Option<&str> {
        self.segments.last().map(|s| s.as_ref())
    }

    pub(crate) fn last_name(&self) -> Option<&Name> {
        self.segments.last()
    }

    /// Child path `self/name`.
    pub fn append(&self, name: &str) -> Self {
        self.append_name(Name::from(name))
    }

    pub fn append_name(&self, name: Name) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend(self.segments.iter().cloned());
        segments.push(name);
        Self { segments }
    }

    /// Concatenate a relative path onto this one.
    pub fn join(&self, relative: &ElementPath) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(relative.segments.iter().cloned());
        Self { segments }
    }

    /// Parent path, `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn remove_first_segments(&self, count: usize) -> Self {
        Self {
            segments: self.segments.iter().skip(count).cloned().collect(),
        }
    }

    /// True if `self` equals `other` or is one of its ancestors.
    pub fn is_prefix_of(&self, other: &ElementPath) -> bool {
        other.segments.len() >= self.segments.len()
            && self.segments.iter().zip(&other.segments).all(|(a, b)| a == b)
    }

    /// Replace the top-level segment, used when loading a snapshot under a new name.
    pub fn with_first_segment(&self, name: Name) -> Self {
        let mut segments = self.segments.clone();
        if let Some(first) = segments.first_mut() {
            *first = name;
        }
        Self { segments }
    }
}

impl fmt::Display for ElementPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ElementPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElementPath({self})")
    }
}

impl From<&str> for ElementPath {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}
