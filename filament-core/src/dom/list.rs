//! Positional list reconciliation.
//!
//! A list binding renders every element of an array-valued cell as one
//! child of an anchor element, through a caller-supplied render function.
//! On change, positions are diffed against the previous array:
//!
//! - positions whose value changed are patched in place;
//! - surplus trailing positions are released and removed;
//! - missing trailing positions are rendered and appended.
//!
//! The diff is positional, not keyed: shrinking `[0, 1, 2]` to `[1, 2]`
//! patches positions 0 and 1 and drops position 2, it does not recognize
//! the shift.

use std::sync::{Arc, Mutex};

use tracing::trace;

use crate::error::EngineError;
use crate::ident::ListenerKey;
use crate::reactive::Signal;
use crate::value::Value;

use super::bind::release_subtree;
use super::node::NodeRef;
use super::reconcile::{self, Location, Rendered};

/// A render function: element value and position in, renderable value out.
pub type RenderFn = dyn Fn(&Value, usize) -> Value + Send + Sync;

struct ListState {
    /// Snapshot of the array as of the last reconciliation.
    previous: Vec<Value>,
    /// One rendered location per position, parallel to `previous`. A
    /// position whose rendered value is itself a list occupies a group.
    rendered: Vec<Location>,
}

/// Bind an array-valued cell under `anchor`, one child per element.
///
/// Fails with [`EngineError::NotAnArray`] if the cell does not currently
/// hold a list; a later non-list write fails the same way at propagation
/// time. Returns the listener key, which unbinds the list when removed.
pub fn bind_list<F>(
    anchor: &NodeRef,
    cell: &Signal,
    render: F,
) -> Result<ListenerKey, EngineError>
where
    F: Fn(&Value, usize) -> Value + Send + Sync + 'static,
{
    let render: Arc<RenderFn> = Arc::new(render);
    let initial = match cell.get_untracked() {
        Value::List(items) => items,
        other => return Err(EngineError::NotAnArray { kind: other.kind() }),
    };

    let mut rendered = Vec::with_capacity(initial.len());
    for (index, item) in initial.iter().enumerate() {
        rendered.push(append_rendered(anchor, &render(item, index))?);
    }

    let state = Mutex::new(ListState {
        previous: initial,
        rendered,
    });
    let anchor = anchor.clone();
    let render_hook = Arc::clone(&render);
    let key = cell.on_change(move |value| {
        let items = match value {
            Value::List(items) => items.as_slice(),
            other => return Err(EngineError::NotAnArray { kind: other.kind() }),
        };
        let mut state = state.lock().expect("list state lock poisoned");
        reconcile_list(&anchor, &mut state, items, &render_hook)
    });
    Ok(key)
}

/// Render a value and append its node(s) at the anchor's tail.
fn append_rendered(anchor: &NodeRef, value: &Value) -> Result<Location, EngineError> {
    match reconcile::to_node(value)? {
        Rendered::One(node) => {
            anchor.append_child(&node)?;
            Ok(Location::Node(node))
        }
        Rendered::Many(members) => {
            for member in &members {
                anchor.append_child(member)?;
            }
            Ok(Location::Group(members))
        }
    }
}

fn reconcile_list(
    anchor: &NodeRef,
    state: &mut ListState,
    next: &[Value],
    render: &Arc<RenderFn>,
) -> Result<(), EngineError> {
    let shared = state.previous.len().min(next.len());

    for index in 0..shared {
        if state.previous[index] == next[index] {
            continue;
        }
        let patched =
            reconcile::patch(&state.rendered[index], &render(&next[index], index))?;
        state.rendered[index] = patched;
    }

    for location in state.rendered.drain(shared..) {
        for node in location.nodes() {
            release_subtree(&node);
            node.remove();
        }
    }

    for (index, item) in next.iter().enumerate().skip(shared) {
        let location = append_rendered(anchor, &render(item, index))?;
        state.rendered.push(location);
    }

    trace!(
        previous = state.previous.len(),
        next = next.len(),
        "list reconciled"
    );
    state.previous = next.to_vec();
    Ok(())
}
