//! Comparator and filter contracts
//!
//! A comparator classifies the semantic difference between two payloads.
//! `0` means "no detectable change"; any other value is an opaque client
//! code carried untouched through [`NodeComparison`](crate::NodeComparison),
//! [`ElementDelta`](crate::ElementDelta) and every filter predicate.
//!
//! Author: Moroya Sakamoto

/// Comparator code for "no detectable change".
pub const K_NO_CHANGE: i32 = 0;

/// Capability required of element payloads.
///
/// `Clone` is what makes copy-on-write possible (see
/// [`ElementTree::open_element_data`](crate::ElementTree::open_element_data));
/// `PartialEq` backs the default comparator used for collapsing and
/// serialization.
pub trait ElementData: Clone + PartialEq + Send + Sync + 'static {}

impl<T> ElementData for T where T: Clone + PartialEq + Send + Sync + 'static {}

/// Classifies the change between an old and a new payload.
pub trait ElementComparator<T>: Send + Sync {
    fn compare(&self, old: Option<&T>, new: Option<&T>) -> i32;
}

impl<T, F> ElementComparator<T> for F
where
    F: Fn(Option<&T>, Option<&T>) -> i32 + Send + Sync,
{
    fn compare(&self, old: Option<&T>, new: Option<&T>) -> i32 {
        self(old, new)
    }
}

/// Equality comparator: `0` when equal (or both absent), `1` otherwise.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DefaultElementComparator;

static DEFAULT_COMPARATOR: DefaultElementComparator = DefaultElementComparator;

impl DefaultElementComparator {
    /// Code reported for any difference.
    pub const CHANGED: i32 = 1;

    /// Process-wide instance.
    pub fn instance() -> &'static DefaultElementComparator {
        &DEFAULT_COMPARATOR
    }
}

impl<T: PartialEq> ElementComparator<T> for DefaultElementComparator {
    fn compare(&self, old: Option<&T>, new: Option<&T>) -> i32 {
        match (old, new) {
            (None, None) => K_NO_CHANGE,
            (Some(a), Some(b)) if a == b => K_NO_CHANGE,
            _ => Self::CHANGED,
        }
    }
}

/// Predicate over comparator codes used to select affected children.
pub trait DeltaFilter {
    fn include_element(&self, comparison: i32) -> bool;
}

impl<F> DeltaFilter for F
where
    F: Fn(i32) -> bool,
{
    fn include_element(&self, comparison: i32) -> bool {
        self(comparison)
    }
}

/// Filter that accepts every code.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl DeltaFilter for AcceptAll {
    fn include_element(&self, _comparison: i32) -> bool {
        true
    }
}
