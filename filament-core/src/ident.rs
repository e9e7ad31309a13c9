//! Identity allocation.
//!
//! One process-global monotonic counter backs every identifier in the engine:
//! reactive cells, document nodes, attribute nodes, and externally registered
//! listeners all draw from the same sequence. Identifiers are never reused,
//! so an id seen in a side table or a placeholder marker is unambiguous for
//! the lifetime of the process.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_raw() -> u64 {
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Unique identifier for a reactive cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellId(u64);

impl CellId {
    /// Allocate a fresh cell id.
    pub fn new() -> Self {
        Self(next_raw())
    }

    /// Get the raw id value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for CellId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell-{}", self.0)
    }
}

/// Unique identifier for a document node or attribute node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Allocate a fresh node id.
    pub fn new() -> Self {
        Self(next_raw())
    }

    /// Get the raw id value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// Key addressing one listener registration on a cell.
///
/// Registration is idempotent per key: adding a listener under a key that is
/// already present is a no-op. This is what makes dependency re-subscription
/// during recomputation safe to run unconditionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKey {
    /// The updater of a derived cell; at most one per dependent cell.
    Cell(CellId),
    /// An externally registered callback (plain listeners, write-backs,
    /// list-reconciler hooks).
    External(u64),
}

impl ListenerKey {
    pub(crate) fn external() -> Self {
        Self::External(next_raw())
    }
}
