//! The in-memory document tree.
//!
//! The engine renders into a lightweight node tree that a host environment
//! mirrors to a real display surface. Three node kinds exist:
//!
//! - elements, which carry a tag, attribute nodes, reflected properties, and
//!   children;
//! - text nodes, whose character data can be rewritten in place;
//! - placeholders, comment-like markers that render as nothing but keep a
//!   position occupied so a later patch has something to locate and replace.
//!
//! Handles are cheap clones sharing one node; identity is pointer identity.
//! Parent links are weak, so a detached subtree is owned by whoever holds
//! the handle to its root.

use std::fmt;
use std::sync::{Arc, RwLock, Weak};

use indexmap::IndexMap;

use crate::error::EngineError;
use crate::ident::NodeId;

/// A shared handle to a document node.
#[derive(Clone)]
pub struct NodeRef(Arc<NodeData>);

struct NodeData {
    id: NodeId,
    parent: RwLock<Weak<NodeData>>,
    kind: NodeKind,
}

enum NodeKind {
    Element {
        tag: String,
        attributes: RwLock<Vec<AttrRef>>,
        children: RwLock<Vec<NodeRef>>,
        /// Live reflected properties (`className`, `value`, ...), mirrored
        /// from attribute patches.
        properties: RwLock<IndexMap<String, String>>,
    },
    Text(RwLock<String>),
    Placeholder,
}

impl NodeRef {
    /// Create an element node with the given tag.
    pub fn element(tag: &str) -> Self {
        Self(Arc::new(NodeData {
            id: NodeId::new(),
            parent: RwLock::new(Weak::new()),
            kind: NodeKind::Element {
                tag: tag.to_owned(),
                attributes: RwLock::new(Vec::new()),
                children: RwLock::new(Vec::new()),
                properties: RwLock::new(IndexMap::new()),
            },
        }))
    }

    /// Create a text node.
    pub fn text(data: &str) -> Self {
        Self(Arc::new(NodeData {
            id: NodeId::new(),
            parent: RwLock::new(Weak::new()),
            kind: NodeKind::Text(RwLock::new(data.to_owned())),
        }))
    }

    /// Create a placeholder marker.
    pub fn placeholder() -> Self {
        Self(Arc::new(NodeData {
            id: NodeId::new(),
            parent: RwLock::new(Weak::new()),
            kind: NodeKind::Placeholder,
        }))
    }

    pub fn id(&self) -> NodeId {
        self.0.id
    }

    /// Identity comparison: do both handles refer to the same node?
    pub fn same(&self, other: &NodeRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_element(&self) -> bool {
        matches!(self.0.kind, NodeKind::Element { .. })
    }

    pub fn is_text(&self) -> bool {
        matches!(self.0.kind, NodeKind::Text(_))
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.0.kind, NodeKind::Placeholder)
    }

    /// The element tag, if this is an element.
    pub fn tag(&self) -> Option<&str> {
        match &self.0.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn parent(&self) -> Option<NodeRef> {
        self.0
            .parent
            .read()
            .expect("parent lock poisoned")
            .upgrade()
            .map(NodeRef)
    }

    /// Append `child` to this element, detaching it from any previous parent.
    pub fn append_child(&self, child: &NodeRef) -> Result<(), EngineError> {
        let NodeKind::Element { children, .. } = &self.0.kind else {
            return Err(EngineError::NotAnElement);
        };
        child.detach_from_parent();
        children
            .write()
            .expect("children lock poisoned")
            .push(child.clone());
        *child.0.parent.write().expect("parent lock poisoned") = Arc::downgrade(&self.0);
        Ok(())
    }

    /// Remove this node from its parent, if it has one.
    pub fn remove(&self) {
        self.detach_from_parent();
    }

    /// Swap this node for `new` at its position in the document.
    ///
    /// A detached node has no position; the call is then a no-op on the tree,
    /// mirroring a replace against a node that was never mounted.
    pub fn replace_with(&self, new: &NodeRef) {
        if self.same(new) {
            return;
        }
        let Some(parent) = self.parent() else {
            return;
        };
        let NodeKind::Element { children, .. } = &parent.0.kind else {
            return;
        };
        new.detach_from_parent();
        {
            let mut children = children.write().expect("children lock poisoned");
            if let Some(slot) = children.iter_mut().find(|c| c.same(self)) {
                *slot = new.clone();
            }
        }
        *new.0.parent.write().expect("parent lock poisoned") = Arc::downgrade(&parent.0);
        *self.0.parent.write().expect("parent lock poisoned") = Weak::new();
    }

    /// Insert `new` as the sibling immediately after this node.
    ///
    /// A detached node has no siblings; the call is then a no-op.
    pub fn insert_after(&self, new: &NodeRef) {
        let Some(parent) = self.parent() else {
            return;
        };
        let NodeKind::Element { children, .. } = &parent.0.kind else {
            return;
        };
        new.detach_from_parent();
        {
            let mut children = children.write().expect("children lock poisoned");
            let index = children
                .iter()
                .position(|c| c.same(self))
                .map_or(children.len(), |i| i + 1);
            children.insert(index, new.clone());
        }
        *new.0.parent.write().expect("parent lock poisoned") = Arc::downgrade(&parent.0);
    }

    fn detach_from_parent(&self) {
        let Some(parent) = self.parent() else {
            return;
        };
        if let NodeKind::Element { children, .. } = &parent.0.kind {
            children
                .write()
                .expect("children lock poisoned")
                .retain(|c| !c.same(self));
        }
        *self.0.parent.write().expect("parent lock poisoned") = Weak::new();
    }

    /// Snapshot of this element's children (empty for other kinds).
    pub fn children(&self) -> Vec<NodeRef> {
        match &self.0.kind {
            NodeKind::Element { children, .. } => {
                children.read().expect("children lock poisoned").clone()
            }
            _ => Vec::new(),
        }
    }

    pub fn child_count(&self) -> usize {
        match &self.0.kind {
            NodeKind::Element { children, .. } => {
                children.read().expect("children lock poisoned").len()
            }
            _ => 0,
        }
    }

    /// Character data of a text node.
    pub fn text_data(&self) -> Option<String> {
        match &self.0.kind {
            NodeKind::Text(data) => Some(data.read().expect("text lock poisoned").clone()),
            _ => None,
        }
    }

    /// Rewrite a text node's character data in place. Returns false for
    /// non-text nodes.
    pub(crate) fn set_text(&self, data: &str) -> bool {
        match &self.0.kind {
            NodeKind::Text(slot) => {
                *slot.write().expect("text lock poisoned") = data.to_owned();
                true
            }
            _ => false,
        }
    }

    /// Concatenated text of this subtree. Placeholders render as nothing.
    pub fn text_content(&self) -> String {
        match &self.0.kind {
            NodeKind::Text(data) => data.read().expect("text lock poisoned").clone(),
            NodeKind::Placeholder => String::new(),
            NodeKind::Element { children, .. } => children
                .read()
                .expect("children lock poisoned")
                .iter()
                .map(|c| c.text_content())
                .collect(),
        }
    }

    /// Set an attribute on this element, creating the attribute node on first
    /// use and rewriting it afterwards. Returns the attribute node.
    pub fn set_attribute(&self, name: &str, value: &str) -> Result<AttrRef, EngineError> {
        let NodeKind::Element { attributes, .. } = &self.0.kind else {
            return Err(EngineError::NotAnElement);
        };
        {
            let attributes = attributes.read().expect("attributes lock poisoned");
            if let Some(attr) = attributes.iter().find(|a| a.name() == name) {
                attr.set_value(value);
                return Ok(attr.clone());
            }
        }
        let attr = AttrRef(Arc::new(AttrData {
            id: NodeId::new(),
            name: name.to_owned(),
            value: RwLock::new(value.to_owned()),
            owner: RwLock::new(Arc::downgrade(&self.0)),
        }));
        attributes
            .write()
            .expect("attributes lock poisoned")
            .push(attr.clone());
        Ok(attr)
    }

    pub fn get_attribute(&self, name: &str) -> Option<String> {
        match &self.0.kind {
            NodeKind::Element { attributes, .. } => attributes
                .read()
                .expect("attributes lock poisoned")
                .iter()
                .find(|a| a.name() == name)
                .map(|a| a.value()),
            _ => None,
        }
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.get_attribute(name).is_some()
    }

    /// Snapshot of this element's attribute nodes (empty for other kinds).
    pub fn attributes(&self) -> Vec<AttrRef> {
        match &self.0.kind {
            NodeKind::Element { attributes, .. } => {
                attributes.read().expect("attributes lock poisoned").clone()
            }
            _ => Vec::new(),
        }
    }

    /// Set a reflected property on this element.
    pub fn set_property(&self, name: &str, value: &str) -> Result<(), EngineError> {
        let NodeKind::Element { properties, .. } = &self.0.kind else {
            return Err(EngineError::NotAnElement);
        };
        properties
            .write()
            .expect("properties lock poisoned")
            .insert(name.to_owned(), value.to_owned());
        Ok(())
    }

    pub fn property(&self, name: &str) -> Option<String> {
        match &self.0.kind {
            NodeKind::Element { properties, .. } => properties
                .read()
                .expect("properties lock poisoned")
                .get(name)
                .cloned(),
            _ => None,
        }
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            NodeKind::Element { tag, .. } => f
                .debug_struct("Element")
                .field("id", &self.0.id)
                .field("tag", tag)
                .field("children", &self.child_count())
                .finish(),
            NodeKind::Text(data) => f
                .debug_struct("Text")
                .field("id", &self.0.id)
                .field("data", &*data.read().expect("text lock poisoned"))
                .finish(),
            NodeKind::Placeholder => f
                .debug_struct("Placeholder")
                .field("id", &self.0.id)
                .finish(),
        }
    }
}

/// A shared handle to an attribute node.
#[derive(Clone)]
pub struct AttrRef(Arc<AttrData>);

struct AttrData {
    id: NodeId,
    name: String,
    value: RwLock<String>,
    owner: RwLock<Weak<NodeData>>,
}

impl AttrRef {
    pub fn id(&self) -> NodeId {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn value(&self) -> String {
        self.0.value.read().expect("attr value lock poisoned").clone()
    }

    pub fn set_value(&self, value: &str) {
        *self.0.value.write().expect("attr value lock poisoned") = value.to_owned();
    }

    /// The element this attribute belongs to, if it is still alive.
    pub fn owner(&self) -> Option<NodeRef> {
        self.0
            .owner
            .read()
            .expect("attr owner lock poisoned")
            .upgrade()
            .map(NodeRef)
    }

    pub fn same(&self, other: &AttrRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for AttrRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attr")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .field("value", &self.value())
            .finish()
    }
}
