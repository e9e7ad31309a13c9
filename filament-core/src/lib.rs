//! Filament Core
//!
//! This crate provides the core runtime for the Filament reactive UI
//! engine. It implements:
//!
//! - Reactive primitives (signals, derived cells, deep stores)
//! - An in-memory document tree with attribute and property reflection
//! - An incremental node reconciler and a positional list reconciler
//! - Eager lifecycle management tied to removal observation
//!
//! # Architecture
//!
//! The crate is organized into two layers:
//!
//! - `reactive`: cells, automatic dependency tracking, stores, and the
//!   global cell registry
//! - `dom`: the node tree, value-to-node reconciliation, binding
//!   registration, and list diffing
//!
//! Propagation is synchronous: a `set` patches every bound document
//! location and runs every listener before it returns.
//!
//! # Example
//!
//! ```rust
//! use filament_core::dom::{bind_child, NodeRef};
//! use filament_core::reactive::Signal;
//! use filament_core::value::Value;
//!
//! let root = NodeRef::element("div");
//! let count = Signal::new(0);
//! let count_for_label = count.clone();
//! let label = Signal::computed(move || {
//!     Value::Str(format!("count: {}", count_for_label.get().as_i64().unwrap_or(0)))
//! });
//!
//! bind_child(&root, &label).unwrap();
//! assert_eq!(root.text_content(), "count: 0");
//!
//! count.set(5).unwrap();
//! assert_eq!(root.text_content(), "count: 5");
//! ```

pub mod dom;
pub mod error;
pub mod ident;
pub mod reactive;
pub mod value;

pub use error::EngineError;
pub use value::Value;
