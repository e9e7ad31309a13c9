//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, derived cells,
//! and deep stores. These primitives form the foundation of Filament's
//! fine-grained reactivity.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within an evaluation frame (the body of a derived cell), the signal
//! automatically registers itself as a dependency of that frame. When the
//! signal's value changes, its document bindings are patched and its
//! listeners are notified, synchronously.
//!
//! ## Derived cells
//!
//! A derived cell wraps an expression over other cells. Its dependency set
//! is rebuilt from scratch on every run, so conditional reads rewire
//! correctly as the expression's branches change.
//!
//! ## Stores
//!
//! A Store wraps a container value and hands out per-key reactive children
//! on demand, with stable identity and two-way value flow between parent
//! and child.
//!
//! # Implementation Notes
//!
//! Dependency detection uses a thread-local frame stack. When a signal is
//! read, we check for an active frame and, if present, record the read.
//! This approach (sometimes called "automatic dependency tracking" or
//! "transparent reactivity") is used by SolidJS, Vue 3, and Leptos.
//!
//! Cell lifetime is managed eagerly: the global registry holds strong
//! references, and a cell is destroyed the moment its last binding or
//! listener goes away.

mod computed;
mod context;
pub(crate) mod registry;
mod signal;
mod store;

pub use context::EvalScope;
pub use registry::live_cells;
pub use signal::{SetPolicy, Signal};
pub use store::{Child, Key, Store, StoreKind};
