//! Error taxonomy
//!
//! Every failure is fail-fast: nothing is retried internally and the
//! caller decides how to recover.
//!
//! Author: Moroya Sakamoto

use thiserror::Error;

use crate::path::ElementPath;

/// Errors raised by element trees, deltas, and the chain codec.
#[derive(Debug, Error)]
pub enum TreeError {
    /// The path does not resolve to an existing element.
    #[error("element not found: {0}")]
    ElementNotFound(ElementPath),

    /// The generation is in the wrong lifecycle state (e.g. mutating a frozen tree).
    #[error("illegal state: {0}")]
    IllegalState(&'static str),

    /// An argument violates an operation's precondition.
    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    /// The byte stream could not be decoded.
    #[error("malformed stream: {0}")]
    MalformedStream(String),

    /// A configuration document could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

impl TreeError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        TreeError::MalformedStream(msg.into())
    }

    pub(crate) fn argument(msg: impl Into<String>) -> Self {
        TreeError::IllegalArgument(msg.into())
    }
}

/// Crate-wide result alias.
pub type Result<T, E = TreeError> = std::result::Result<T, E>;
