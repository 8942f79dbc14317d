//! Error types for the binding engine.
//!
//! Nothing in the core recovers from these. An error raised while a watcher
//! evaluates (at construction or during a notification pass) propagates
//! straight back to whoever triggered the evaluation.

use thiserror::Error;

/// Errors raised by the reactive core and the view layer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TetherError {
    /// A dot-path stepped through a missing intermediate value.
    #[error("cannot read property '{segment}' of {base} (resolving '{path}')")]
    PropertyOfUndefined {
        path: String,
        segment: String,
        base: &'static str,
    },

    /// A dot-path assignment targeted a scalar.
    #[error("cannot set property '{segment}' on {kind} (assigning '{path}')")]
    NotAContainer {
        path: String,
        segment: String,
        kind: &'static str,
    },

    /// An indexed write past the largest index a sequence accepts.
    #[error("array index {index} is out of range")]
    IndexOutOfRange { index: usize },

    #[error("dot-path expression is empty")]
    EmptyPath,

    /// The root data handed to a binding context was not an object.
    #[error("binding context data must be an object, got {kind}")]
    InvalidData { kind: &'static str },

    /// Write through an alias that was never installed.
    #[error("'{key}' is not a top-level data property")]
    UnknownProperty { key: String },

    /// Failure reported by a user callback or event handler.
    #[error("callback failed: {0}")]
    Callback(String),
}

impl TetherError {
    /// Convenience constructor for callback failures.
    pub fn callback(message: impl Into<String>) -> Self {
        Self::Callback(message.into())
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = TetherError> = std::result::Result<T, E>;
