//! Generation configuration.
//!
//! # Example
//!
//! ```
//! use watson::TreeConfig;
//!
//! let config = TreeConfig::default();
//! assert!(config.lookup_cache);
//!
//! let config = TreeConfig::from_toml_str("lookup_cache = false").unwrap();
//! assert!(!config.lookup_cache);
//! assert!(config.reroot_on_freeze);
//! ```
//!
//! Author: Moroya Sakamoto

use serde::Deserialize;

use crate::error::Result;

/// Knobs shared by every generation branched from a tree.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TreeConfig {
    /// Keep the single-slot lookup and child-name caches (default: true).
    /// Results are identical either way; only speed changes.
    #[serde(default = "default_lookup_cache")]
    pub lookup_cache: bool,

    /// Reroot the delta chain at a generation when it is frozen (default: true).
    #[serde(default = "default_reroot_on_freeze")]
    pub reroot_on_freeze: bool,
}

fn default_lookup_cache() -> bool {
    true
}

fn default_reroot_on_freeze() -> bool {
    true
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            lookup_cache: default_lookup_cache(),
            reroot_on_freeze: default_reroot_on_freeze(),
        }
    }
}

impl TreeConfig {
    /// Parse a TOML document; missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}
