//! Document Layer
//!
//! This module implements the rendered side of the engine: the in-memory
//! node tree, the value-to-node reconciler, binding registration, and the
//! positional list reconciler.
//!
//! The tree is host-agnostic. A host environment mirrors it to a real
//! display surface and, in return, owes the engine exactly one courtesy:
//! calling [`bind::release_subtree`] with every subtree it removes, so
//! bindings inside it are detached and their cells can be reclaimed.

pub mod attributes;
pub mod bind;
pub mod list;
pub mod node;
pub mod reconcile;

pub use bind::{bind_attribute, bind_child, release_subtree};
pub use list::bind_list;
pub use node::{AttrRef, NodeRef};
pub use reconcile::{patch, to_node, Location, Rendered};
