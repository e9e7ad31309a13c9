//! Derived cells.
//!
//! A derived cell wraps an expression. The expression runs inside an
//! evaluation frame so every tracked read it performs is captured, and the
//! captured set becomes the cell's dependencies: the cell subscribes to each
//! one under its own key. When a dependency fires, the expression re-runs,
//! the dependency set is rebuilt from what the new run actually read, and
//! the result propagates through the cell like any other write.
//!
//! Rebuilding the set each run means conditional reads rewire correctly: a
//! branch not taken this time is unsubscribed, and firing it later will not
//! trigger a recomputation.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::EngineError;
use crate::ident::ListenerKey;
use crate::value::Value;

use super::context::EvalScope;
use super::registry;
use super::signal::{Expression, Signal};

impl Signal {
    /// Create a derived cell.
    ///
    /// The expression runs once immediately to seed the value and discover
    /// the initial dependencies.
    pub fn computed<F>(expression: F) -> Signal
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        let expression: Expression = Arc::new(expression);
        let cell = Signal::new_derived(Arc::clone(&expression));

        let (value, dependencies) = evaluate(&cell, &expression);
        cell.store_value(value);
        cell.swap_dependencies(dependencies.clone());
        for dependency in &dependencies {
            subscribe(dependency, &cell);
        }

        // Register only after the seed run has succeeded, so a panicking
        // expression leaves no half-wired cell behind.
        registry::register(&cell);
        debug!(cell = %cell.id(), deps = dependencies.len(), "created derived cell");
        cell
    }
}

/// Run the expression inside an evaluation frame and return the result
/// together with the cells it read.
fn evaluate(cell: &Signal, expression: &Expression) -> (Value, Vec<Signal>) {
    let scope = EvalScope::enter(cell.id());
    let value = expression();
    let dependencies = scope.captured();
    (value, dependencies)
}

/// Subscribe `target` to changes of `dependency`, keyed by the target's
/// cell id so re-subscription is a no-op. The hook holds a weak reference
/// to the target; a destroyed target turns the hook inert rather than
/// keeping the cell alive through its own dependencies.
fn subscribe(dependency: &Signal, target: &Signal) {
    let weak = Arc::downgrade(&target.0);
    dependency.add_keyed_listener(
        ListenerKey::Cell(target.id()),
        Arc::new(move |_| match weak.upgrade() {
            Some(raw) => refresh(&Signal(raw)),
            None => Ok(()),
        }),
    );
}

/// Recompute a derived cell after one of its dependencies changed.
fn refresh(cell: &Signal) -> Result<(), EngineError> {
    let expression = cell.expression().expect("refresh on a non-derived cell");
    let (value, next) = evaluate(cell, &expression);
    trace!(cell = %cell.id(), deps = next.len(), "recomputed");

    let previous = cell.swap_dependencies(next.clone());
    for dependency in &next {
        if !previous.iter().any(|p| p.id() == dependency.id()) {
            subscribe(dependency, cell);
        }
    }
    for dependency in &previous {
        if !next.iter().any(|n| n.id() == dependency.id()) {
            dependency.remove_listener(ListenerKey::Cell(cell.id()));
        }
    }

    cell.set(value)?;
    Ok(())
}
