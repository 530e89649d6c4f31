//! Typed errors for tree construction, binding and invocation.

use thiserror::Error;

/// Errors raised while building a [`CreatorTree`](crate::core::tree::CreatorTree)
/// or parsing a layout file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// Keys must be non-empty; an empty key would produce a dangling separator.
    #[error("empty key under `{parent}`")]
    EmptyKey { parent: String },

    /// The same key was inserted twice into one mapping.
    #[error("duplicate key `{key}` under `{parent}`")]
    DuplicateKey { key: String, parent: String },

    /// A layout line could not be turned into a creator.
    #[error("layout line {line}: {reason}")]
    Layout { line: usize, reason: String },
}

/// Errors raised by [`bind`](crate::core::binder::bind).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// The tree recorded a construction error that was never checked.
    #[error("invalid creator tree: {0}")]
    InvalidTree(#[from] TreeError),

    /// A namespace is nested deeper than the configured limit.
    #[error("malformed tree: `{path}` is nested deeper than {max_depth} levels")]
    TooDeep { path: String, max_depth: usize },
}

/// Errors raised when a bound action is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// The creator returned a value that cannot carry a `type` field.
    #[error("creator for `{action_type}` returned {found}, expected an object")]
    NonObjectPayload {
        action_type: String,
        found: &'static str,
    },

    /// A path lookup did not name a bound action.
    #[error("no bound action at `{path}`")]
    UnknownAction { path: String },
}
