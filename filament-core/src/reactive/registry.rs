//! Global cell registry.
//!
//! The registry holds a strong handle to every live cell, keyed by id. It is
//! what keeps document-bound cells alive when user code drops its handles,
//! and it is the structure eager destruction removes cells from: a cell with
//! no bindings and no listeners is unregistered immediately after the last
//! removal, not at some later collection point.
//!
//! The removal-observation boundary also uses the registry to resolve a cell
//! id recorded in the node side table back into a live cell.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use crate::ident::CellId;

use super::signal::Signal;

static CELLS: OnceLock<RwLock<HashMap<CellId, Signal>>> = OnceLock::new();

fn cells() -> &'static RwLock<HashMap<CellId, Signal>> {
    CELLS.get_or_init(|| RwLock::new(HashMap::new()))
}

pub(crate) fn register(cell: &Signal) {
    cells()
        .write()
        .expect("registry lock poisoned")
        .insert(cell.id(), cell.clone());
}

pub(crate) fn unregister(id: CellId) {
    cells().write().expect("registry lock poisoned").remove(&id);
}

pub(crate) fn lookup(id: CellId) -> Option<Signal> {
    cells()
        .read()
        .expect("registry lock poisoned")
        .get(&id)
        .cloned()
}

pub(crate) fn contains(id: CellId) -> bool {
    cells().read().expect("registry lock poisoned").contains_key(&id)
}

/// Number of currently registered cells. Diagnostics only.
pub fn live_cells() -> usize {
    cells().read().expect("registry lock poisoned").len()
}
