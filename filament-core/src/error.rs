//! Error taxonomy for the engine.
//!
//! Every fallible operation carries [`EngineError`]. Errors surface
//! synchronously to the immediate caller; the engine performs no retries and
//! swallows nothing. A propagation error aborts the remainder of that cascade
//! without rolling back locations that were already patched.

use std::fmt;

use thiserror::Error;

/// Coarse classification of a [`crate::value::Value`], used in error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    Str,
    List,
    Object,
    Node,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Str => "string",
            ValueKind::List => "list",
            ValueKind::Object => "object",
            ValueKind::Node => "node",
        };
        f.write_str(name)
    }
}

/// Errors produced by the reactive engine and the patching layer.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Store construction or whole-store replacement was given a leaf value.
    /// Raised before any graph mutation.
    #[error("store value must be an object or a list, got {kind}")]
    NotAContainer { kind: ValueKind },

    /// Value-to-node conversion was given a value with no document rendering.
    /// Objects fail here rather than silently stringifying.
    #[error("cannot render a {kind} value into the document")]
    Unrenderable { kind: ValueKind },

    /// A list-reconciler hook was fed a non-list value.
    #[error("list binding source must hold a list, got {kind}")]
    NotAnArray { kind: ValueKind },

    /// A store read addressed a key the backing container does not hold.
    #[error("store has no value under key `{key}`")]
    MissingKey { key: String },

    /// A key of the wrong kind for the store: an index into a keyed store,
    /// or a property name into an ordered store.
    #[error("key `{key}` cannot address this store")]
    InvalidKey { key: String },

    /// A child or attribute binding targeted a non-element node.
    #[error("binding target must be an element")]
    NotAnElement,
}
