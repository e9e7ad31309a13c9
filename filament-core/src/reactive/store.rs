//! Deep reactive containers.
//!
//! A store wraps a container value (an object or a list) in a cell and
//! hands out per-key children on demand: a leaf key yields a [`Signal`], a
//! container key yields a nested [`Store`]. Children are created lazily and
//! cached, so asking for the same key twice returns the same handle.
//!
//! Writes flow both ways. Writing the store (or one of its keys) through
//! the store API updates the backing container and refreshes the affected
//! children in place, preserving their identity. Writing a child directly
//! mirrors the new value back through every ancestor's backing container up
//! to the root, without re-emitting the ancestors. The mirror chain gives
//! value-typed containers the visibility that shared-reference containers
//! get for free.

use std::fmt;
use std::sync::{Arc, RwLock, Weak};

use indexmap::IndexMap;
use tracing::debug;

use crate::error::EngineError;
use crate::ident::ListenerKey;
use crate::value::Value;

use super::signal::{RawCell, Signal};

/// The shape of a store's backing container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Backed by an object; keys are property names.
    Keyed,
    /// Backed by a list; keys are positions.
    Ordered,
}

/// A key into a store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Prop(String),
    Index(usize),
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Prop(name.to_owned())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Prop(name)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Prop(name) => write!(f, "{name}"),
            Key::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// A child handle: a cell for leaf values, a nested store for containers.
#[derive(Clone)]
pub enum Child {
    Cell(Signal),
    Store(Store),
}

impl Child {
    pub fn as_cell(&self) -> Option<&Signal> {
        match self {
            Child::Cell(cell) => Some(cell),
            Child::Store(_) => None,
        }
    }

    pub fn as_store(&self) -> Option<&Store> {
        match self {
            Child::Store(store) => Some(store),
            Child::Cell(_) => None,
        }
    }

    /// Read the child's current value, tracking if a frame is active.
    pub fn get(&self) -> Value {
        match self {
            Child::Cell(cell) => cell.get(),
            Child::Store(store) => store.get(),
        }
    }
}

impl fmt::Debug for Child {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Child::Cell(cell) => f.debug_tuple("Cell").field(cell).finish(),
            Child::Store(store) => f.debug_tuple("Store").field(store).finish(),
        }
    }
}

#[derive(Clone)]
struct ChildEntry {
    child: Child,
    /// Key of the write-back listener on the child's cell, removed when
    /// the child is torn down.
    writeback: ListenerKey,
}

/// Writes a child's new value into its parent container and recurses
/// toward the root.
type MirrorFn = dyn Fn(Value) + Send + Sync;

/// A deep reactive container.
#[derive(Clone)]
pub struct Store {
    cell: Signal,
    children: Arc<RwLock<IndexMap<Key, ChildEntry>>>,
    /// Upward mirror for nested stores; `None` at the root.
    mirror: Option<Arc<MirrorFn>>,
}

impl Store {
    /// Create a store over a container value.
    ///
    /// Fails with [`EngineError::NotAContainer`] for scalar or null input.
    pub fn new(init: impl Into<Value>) -> Result<Self, EngineError> {
        let value = init.into();
        if !value.is_container() {
            return Err(EngineError::NotAContainer { kind: value.kind() });
        }
        let cell = Signal::new(value);
        debug!(cell = %cell.id(), "created store");
        Ok(Self {
            cell,
            children: Arc::new(RwLock::new(IndexMap::new())),
            mirror: None,
        })
    }

    fn nested(cell: Signal, mirror: Arc<MirrorFn>) -> Self {
        Self {
            cell,
            children: Arc::new(RwLock::new(IndexMap::new())),
            mirror: Some(mirror),
        }
    }

    /// Whether this store is backed by an object or a list.
    pub fn kind(&self) -> StoreKind {
        match self.cell.get_untracked() {
            Value::List(_) => StoreKind::Ordered,
            _ => StoreKind::Keyed,
        }
    }

    /// The backing cell. Reading it tracks the whole container.
    pub fn cell(&self) -> &Signal {
        &self.cell
    }

    /// Read the whole container, tracking if a frame is active.
    pub fn get(&self) -> Value {
        self.cell.get()
    }

    /// Get the child for a key, creating and caching it on first access.
    pub fn get_key(&self, key: impl Into<Key>) -> Result<Child, EngineError> {
        let key = key.into();
        {
            let children = self.children.read().expect("children lock poisoned");
            if let Some(entry) = children.get(&key) {
                return Ok(entry.child.clone());
            }
        }
        let backing = self.cell.get_untracked();
        check_key(&backing, &key)?;
        let value = read_key(&backing, &key)?;
        let entry = self.make_child(key.clone(), value);
        let child = entry.child.clone();
        self.children
            .write()
            .expect("children lock poisoned")
            .insert(key, entry);
        Ok(child)
    }

    /// Build a child for a value and attach its write-back listener.
    ///
    /// The write-back mirrors the child's new value into this store's
    /// backing container and then on up the mirror chain, so the root
    /// container always reflects deep writes.
    fn make_child(&self, key: Key, value: Value) -> ChildEntry {
        let parent: Weak<RawCell> = Arc::downgrade(&self.cell.0);
        let parent_mirror = self.mirror.clone();
        let mirror_key = key.clone();
        let mirror: Arc<MirrorFn> = Arc::new(move |next| {
            let Some(raw) = parent.upgrade() else {
                return;
            };
            let parent_cell = Signal(raw);
            let key = mirror_key.clone();
            parent_cell.mutate_value(|container| set_key_in(container, &key, next));
            if let Some(up) = &parent_mirror {
                up(parent_cell.get_untracked());
            }
        });

        let child_cell = Signal::new(value.clone());
        let hook = Arc::clone(&mirror);
        let writeback = child_cell.on_change(move |next| {
            hook(next.clone());
            Ok(())
        });
        let child = if value.is_container() {
            Child::Store(Store::nested(child_cell, mirror))
        } else {
            Child::Cell(child_cell)
        };
        ChildEntry { child, writeback }
    }

    /// Write one key: update the backing container and route the new value
    /// into the child, preserving the identity of an already cached one and
    /// materializing the child otherwise. Emits the store's own cell
    /// afterwards.
    pub fn set_key(
        &self,
        key: impl Into<Key>,
        value: impl Into<Value>,
    ) -> Result<bool, EngineError> {
        let key = key.into();
        let value = value.into();
        let backing = self.cell.get_untracked();
        check_key(&backing, &key)?;

        let cached = {
            let children = self.children.read().expect("children lock poisoned");
            children.get(&key).map(|entry| entry.child.clone())
        };
        let changed = match cached {
            Some(Child::Cell(cell)) => {
                // The write-back listener mirrors the value into the
                // backing container.
                cell.set(value)?
            }
            Some(Child::Store(store)) => {
                if value.is_container() {
                    store.replace_value(value)?
                } else {
                    // Kind change: tear the nested store down and start a
                    // fresh leaf child.
                    self.evict(&key);
                    self.cell
                        .mutate_value(|container| set_key_in(container, &key, value.clone()));
                    let entry = self.make_child(key.clone(), value);
                    self.children
                        .write()
                        .expect("children lock poisoned")
                        .insert(key, entry);
                    true
                }
            }
            None => {
                let previous = read_key(&backing, &key).ok();
                self.cell
                    .mutate_value(|container| set_key_in(container, &key, value.clone()));
                let changed = previous.as_ref() != Some(&value);
                // A past-the-end index lands at the list's tail, not at the
                // requested key; that slot stays lazy.
                if read_key(&self.cell.get_untracked(), &key).ok().as_ref() == Some(&value) {
                    let entry = self.make_child(key.clone(), value);
                    self.children
                        .write()
                        .expect("children lock poisoned")
                        .insert(key, entry);
                }
                changed
            }
        };

        self.cell.emit()?;
        Ok(changed)
    }

    /// Replace the whole container.
    pub fn set(&self, value: impl Into<Value>) -> Result<bool, EngineError> {
        let changed = self.replace_value(value.into())?;
        Ok(changed)
    }

    /// Replace the whole container through an updater.
    pub fn update(
        &self,
        f: impl FnOnce(&Value) -> Value,
    ) -> Result<bool, EngineError> {
        let next = f(&self.cell.get_untracked());
        self.replace_value(next)
    }

    /// Core replacement: diff the new container against the cached
    /// children, refresh survivors in place, tear down the rest.
    fn replace_value(&self, next: Value) -> Result<bool, EngineError> {
        if !next.is_container() {
            return Err(EngineError::NotAContainer { kind: next.kind() });
        }
        let previous = self.cell.get_untracked();
        let mut changed = container_keys(&previous) != container_keys(&next);

        let cached: Vec<(Key, ChildEntry)> = {
            let children = self.children.read().expect("children lock poisoned");
            children
                .iter()
                .map(|(k, e)| (k.clone(), e.clone()))
                .collect()
        };

        let mut evicted = Vec::new();
        for (key, entry) in &cached {
            match read_key(&next, key) {
                Ok(value) => match (&entry.child, value.is_container()) {
                    (Child::Cell(cell), false) => {
                        if cell.set(value)? {
                            changed = true;
                        }
                    }
                    (Child::Store(store), true) => {
                        if store.replace_value(value)? {
                            changed = true;
                        }
                    }
                    // Kind changed under the child; it cannot keep its
                    // identity.
                    _ => {
                        evicted.push(key.clone());
                        changed = true;
                    }
                },
                Err(_) => {
                    evicted.push(key.clone());
                    changed = true;
                }
            }
        }
        for key in &evicted {
            self.evict(key);
        }

        // Keys never materialized as children still count for change
        // detection.
        if !changed {
            for key in container_keys(&next) {
                if cached.iter().any(|(k, _)| k == &key) {
                    continue;
                }
                if read_key(&previous, &key).ok() != read_key(&next, &key).ok() {
                    changed = true;
                    break;
                }
            }
        }

        self.cell.store_value(next);
        if changed {
            self.cell.emit()?;
        }
        Ok(changed)
    }

    /// Tear down one cached child: remove its listeners bottom-up so the
    /// eager destruction check can cascade.
    fn evict(&self, key: &Key) {
        let entry = {
            let mut children = self.children.write().expect("children lock poisoned");
            children.shift_remove(key)
        };
        if let Some(entry) = entry {
            teardown(entry);
        }
    }

    /// Number of elements. Fails for keyed stores. Tracks the container.
    pub fn len(&self) -> Result<usize, EngineError> {
        match self.cell.get() {
            Value::List(items) => Ok(items.len()),
            other => Err(EngineError::NotAnArray { kind: other.kind() }),
        }
    }

    pub fn is_empty(&self) -> Result<bool, EngineError> {
        Ok(self.len()? == 0)
    }

    /// Append an element to an ordered store and emit.
    pub fn push(&self, value: impl Into<Value>) -> Result<(), EngineError> {
        let value = value.into();
        {
            let backing = self.cell.get_untracked();
            if !matches!(backing, Value::List(_)) {
                return Err(EngineError::NotAnArray { kind: backing.kind() });
            }
        }
        self.cell.mutate_value(|container| {
            if let Value::List(items) = container {
                items.push(value);
            }
        });
        self.cell.emit()
    }

    /// Number of live cached children, nested stores included.
    pub fn cached_children(&self) -> usize {
        self.children.read().expect("children lock poisoned").len()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("cell", &self.cell)
            .field("children", &self.cached_children())
            .finish()
    }
}

/// Recursive teardown: grandchildren first, then the child's own
/// write-back, so parents never observe a half-dismantled subtree.
fn teardown(entry: ChildEntry) {
    let cell = match &entry.child {
        Child::Cell(cell) => cell.clone(),
        Child::Store(store) => {
            let grandchildren: Vec<ChildEntry> = {
                let mut children = store.children.write().expect("children lock poisoned");
                children.drain(..).map(|(_, e)| e).collect()
            };
            for grandchild in grandchildren {
                teardown(grandchild);
            }
            store.cell.clone()
        }
    };
    cell.remove_listener(entry.writeback);
}

/// Validate that a key matches the container's shape.
fn check_key(container: &Value, key: &Key) -> Result<(), EngineError> {
    match (container, key) {
        (Value::Object(_), Key::Prop(_)) | (Value::List(_), Key::Index(_)) => Ok(()),
        (Value::Object(_) | Value::List(_), key) => Err(EngineError::InvalidKey {
            key: key.to_string(),
        }),
        (other, _) => Err(EngineError::NotAContainer { kind: other.kind() }),
    }
}

/// Read one key out of a container.
fn read_key(container: &Value, key: &Key) -> Result<Value, EngineError> {
    match (container, key) {
        (Value::Object(map), Key::Prop(name)) => map.get(name).cloned().ok_or_else(|| {
            EngineError::MissingKey { key: name.clone() }
        }),
        (Value::List(items), Key::Index(index)) => {
            items.get(*index).cloned().ok_or_else(|| EngineError::MissingKey {
                key: key.to_string(),
            })
        }
        (_, key) => Err(EngineError::InvalidKey {
            key: key.to_string(),
        }),
    }
}

/// Write one key into a container in place. Out-of-bounds list writes
/// append at the end.
fn set_key_in(container: &mut Value, key: &Key, value: Value) {
    match (container, key) {
        (Value::Object(map), Key::Prop(name)) => {
            map.insert(name.clone(), value);
        }
        (Value::List(items), Key::Index(index)) => {
            if *index < items.len() {
                items[*index] = value;
            } else {
                items.push(value);
            }
        }
        _ => {}
    }
}

/// Every key a container currently holds.
fn container_keys(container: &Value) -> Vec<Key> {
    match container {
        Value::Object(map) => map.keys().cloned().map(Key::Prop).collect(),
        Value::List(items) => (0..items.len()).map(Key::Index).collect(),
        _ => Vec::new(),
    }
}
