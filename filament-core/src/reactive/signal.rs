//! Signal implementation.
//!
//! A signal is the fundamental reactive primitive: a value plus the parties
//! interested in it. Document bindings sit on one side, change listeners
//! (derived-cell updaters, write-backs, list hooks, plain callbacks) on the
//! other.
//!
//! # How signals work
//!
//! 1. Reading a signal inside an active evaluation frame records the signal
//!    into the frame, which is how derived cells infer their dependencies.
//!
//! 2. Writing a signal propagates synchronously before `set` returns:
//!    bindings are patched first, listeners run second. The order matters
//!    because a derived cell's updater is a listener and must observe the
//!    already updated source value.
//!
//! 3. Removing the last binding or listener destroys the signal eagerly:
//!    it leaves the global registry and, for derived cells, unsubscribes
//!    from every dependency, which may cascade.
//!
//! # Reentrancy
//!
//! Both collections are snapshotted before iteration, so a listener that
//! mutates the listener list (or a patch that rebinds a location) cannot
//! skip or duplicate entries mid-cascade.

use std::fmt;
use std::sync::{Arc, RwLock};

use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::dom::bind;
use crate::dom::node::NodeRef;
use crate::dom::reconcile::{self, Location};
use crate::error::EngineError;
use crate::ident::{CellId, ListenerKey};
use crate::value::Value;

use super::context::EvalScope;
use super::registry;

/// How a cell decides whether a write should propagate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetPolicy {
    /// Every write propagates, changed or not.
    #[default]
    AlwaysEmit,
    /// Writes that leave the value equal to the previous one do not
    /// propagate and report no change.
    SkipEqual,
}

pub(crate) type Expression = Arc<dyn Fn() -> Value + Send + Sync>;
pub(crate) type Listener = Arc<dyn Fn(&Value) -> Result<(), EngineError> + Send + Sync>;

pub(crate) struct RawCell {
    id: CellId,
    policy: SetPolicy,
    /// Recomputation closure; present on derived cells only.
    expression: Option<Expression>,
    value: RwLock<Value>,
    /// Document locations currently rendering this cell's value.
    bindings: RwLock<SmallVec<[Location; 2]>>,
    /// Keyed change callbacks, invoked in registration order.
    listeners: RwLock<SmallVec<[(ListenerKey, Listener); 2]>>,
    /// Cells read during the last evaluation; derived cells only. Never
    /// read by user code; exists for teardown and notification wiring.
    dependencies: RwLock<Vec<Signal>>,
}

/// A reactive cell. Clones share the same cell.
#[derive(Clone)]
pub struct Signal(pub(crate) Arc<RawCell>);

impl Signal {
    /// Create a signal with the default propagation policy.
    pub fn new(init: impl Into<Value>) -> Self {
        Self::with_policy(init, SetPolicy::default())
    }

    /// Create a signal with an explicit propagation policy.
    pub fn with_policy(init: impl Into<Value>, policy: SetPolicy) -> Self {
        let cell = Self::build(init.into(), policy, None);
        registry::register(&cell);
        debug!(cell = %cell.id(), "created signal");
        cell
    }

    /// Build a derived cell shell. The caller seeds the value, wires the
    /// dependencies, and registers the cell once evaluation has succeeded.
    pub(crate) fn new_derived(expression: Expression) -> Self {
        Self::build(Value::Null, SetPolicy::default(), Some(expression))
    }

    fn build(value: Value, policy: SetPolicy, expression: Option<Expression>) -> Self {
        Self(Arc::new(RawCell {
            id: CellId::new(),
            policy,
            expression,
            value: RwLock::new(value),
            bindings: RwLock::new(SmallVec::new()),
            listeners: RwLock::new(SmallVec::new()),
            dependencies: RwLock::new(Vec::new()),
        }))
    }

    pub fn id(&self) -> CellId {
        self.0.id
    }

    /// Is this a derived cell?
    pub fn is_derived(&self) -> bool {
        self.0.expression.is_some()
    }

    pub(crate) fn expression(&self) -> Option<Expression> {
        self.0.expression.clone()
    }

    /// Read the current value.
    ///
    /// If an evaluation frame is active, the read registers this cell as a
    /// dependency of the frame's subscriber (idempotently).
    pub fn get(&self) -> Value {
        if EvalScope::is_active() {
            EvalScope::track_read(self);
        }
        self.0.value.read().expect("value lock poisoned").clone()
    }

    /// Read the current value without registering a dependency.
    pub fn get_untracked(&self) -> Value {
        self.0.value.read().expect("value lock poisoned").clone()
    }

    /// Replace the value and propagate.
    ///
    /// Returns whether the value changed. Under [`SetPolicy::SkipEqual`] an
    /// unchanged write returns `Ok(false)` without propagating; the default
    /// policy always propagates.
    pub fn set(&self, value: impl Into<Value>) -> Result<bool, EngineError> {
        let value = value.into();
        let changed = {
            let mut slot = self.0.value.write().expect("value lock poisoned");
            let changed = *slot != value;
            *slot = value;
            changed
        };
        if self.0.policy == SetPolicy::SkipEqual && !changed {
            trace!(cell = %self.id(), "unchanged write skipped");
            return Ok(false);
        }
        self.emit()?;
        Ok(changed)
    }

    /// Replace the value through an updater resolved against the current
    /// value, then propagate as [`Signal::set`] does.
    pub fn update(&self, f: impl FnOnce(&Value) -> Value) -> Result<bool, EngineError> {
        let next = f(&self.get_untracked());
        self.set(next)
    }

    /// Register a plain change listener. Returns the key for later removal.
    pub fn on_change<F>(&self, listener: F) -> ListenerKey
    where
        F: Fn(&Value) -> Result<(), EngineError> + Send + Sync + 'static,
    {
        let key = ListenerKey::external();
        self.0
            .listeners
            .write()
            .expect("listeners lock poisoned")
            .push((key, Arc::new(listener)));
        key
    }

    /// Register a listener under an explicit key. Idempotent per key.
    pub(crate) fn add_keyed_listener(&self, key: ListenerKey, listener: Listener) {
        let mut listeners = self.0.listeners.write().expect("listeners lock poisoned");
        if listeners.iter().any(|(existing, _)| *existing == key) {
            return;
        }
        listeners.push((key, listener));
    }

    /// Remove one listener and run the lifetime check.
    pub fn remove_listener(&self, key: ListenerKey) {
        {
            let mut listeners = self.0.listeners.write().expect("listeners lock poisoned");
            listeners.retain(|(existing, _)| *existing != key);
        }
        self.enforce_lifetime();
    }

    /// Attach a document location rendering this cell's value.
    pub(crate) fn attach_location(&self, location: Location) {
        self.0
            .bindings
            .write()
            .expect("bindings lock poisoned")
            .push(location);
    }

    /// Detach one document location and run the lifetime check.
    pub(crate) fn detach_location(&self, location: &Location) {
        {
            let mut bindings = self.0.bindings.write().expect("bindings lock poisoned");
            if let Some(index) = bindings.iter().position(|b| b.same(location)) {
                bindings.remove(index);
            }
        }
        self.enforce_lifetime();
    }

    /// Detach whichever binding renders into the given node and run the
    /// lifetime check. For a group binding any member node matches; the
    /// removed location is returned so the caller can clean up after its
    /// other members.
    pub(crate) fn detach_node_binding(&self, node: &NodeRef) -> Option<Location> {
        let removed = {
            let mut bindings = self.0.bindings.write().expect("bindings lock poisoned");
            bindings
                .iter()
                .position(|b| b.includes(node))
                .map(|index| bindings.remove(index))
        };
        self.enforce_lifetime();
        removed
    }

    pub fn binding_count(&self) -> usize {
        self.0.bindings.read().expect("bindings lock poisoned").len()
    }

    pub fn listener_count(&self) -> usize {
        self.0.listeners.read().expect("listeners lock poisoned").len()
    }

    /// Is this cell still present in the global registry?
    pub fn is_registered(&self) -> bool {
        registry::contains(self.id())
    }

    /// Propagate the current value: patch every binding through the node
    /// reconciler, then invoke every listener with the new value.
    pub(crate) fn emit(&self) -> Result<(), EngineError> {
        let value = self.get_untracked();
        trace!(cell = %self.id(), kind = %value.kind(), "propagating");

        let bound: Vec<Location> = self
            .0
            .bindings
            .read()
            .expect("bindings lock poisoned")
            .iter()
            .cloned()
            .collect();
        for location in bound {
            let next = reconcile::patch(&location, &value)?;
            if !next.same(&location) {
                let mut bindings = self.0.bindings.write().expect("bindings lock poisoned");
                if let Some(slot) = bindings.iter_mut().find(|b| b.same(&location)) {
                    *slot = next.clone();
                }
                drop(bindings);
                bind::relocate(&location, &next, self.id());
            }
        }

        let hooks: Vec<Listener> = self
            .0
            .listeners
            .read()
            .expect("listeners lock poisoned")
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for hook in hooks {
            hook(&value)?;
        }
        Ok(())
    }

    /// Store a value without propagating. Returns whether it changed.
    pub(crate) fn store_value(&self, value: Value) -> bool {
        let mut slot = self.0.value.write().expect("value lock poisoned");
        let changed = *slot != value;
        *slot = value;
        changed
    }

    /// Mutate the value in place without propagating. Used by store
    /// write-backs to mirror a child change into the backing container.
    pub(crate) fn mutate_value(&self, f: impl FnOnce(&mut Value)) {
        let mut slot = self.0.value.write().expect("value lock poisoned");
        f(&mut slot);
    }

    /// Swap the dependency set, returning the previous one.
    pub(crate) fn swap_dependencies(&self, next: Vec<Signal>) -> Vec<Signal> {
        let mut dependencies = self.0.dependencies.write().expect("dependencies lock poisoned");
        std::mem::replace(&mut *dependencies, next)
    }

    /// Eager destruction check, run after every removal operation.
    ///
    /// A cell with no bindings and no listeners leaves the registry at once
    /// and unsubscribes from every dependency, which re-runs the check on
    /// each dependency in turn.
    pub(crate) fn enforce_lifetime(&self) {
        {
            let bindings = self.0.bindings.read().expect("bindings lock poisoned");
            if !bindings.is_empty() {
                return;
            }
        }
        {
            let listeners = self.0.listeners.read().expect("listeners lock poisoned");
            if !listeners.is_empty() {
                return;
            }
        }
        if !registry::contains(self.id()) {
            return;
        }
        debug!(cell = %self.id(), "destroying cell");
        registry::unregister(self.id());
        let dependencies = self.swap_dependencies(Vec::new());
        for dependency in dependencies {
            dependency.remove_listener(ListenerKey::Cell(self.id()));
        }
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id())
            .field("value", &self.get_untracked())
            .field("bindings", &self.binding_count())
            .field("listeners", &self.listener_count())
            .field("derived", &self.is_derived())
            .finish()
    }
}
