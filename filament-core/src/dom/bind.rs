//! Binding registration and removal observation.
//!
//! Binding a cell into the document renders its current value at a location
//! and attaches that location to the cell, so later writes patch it in
//! place. A global side table maps location ids back to cell ids; it is how
//! removal observation finds the cells affected by a torn-out subtree. A
//! group location occupies several sibling nodes and owns one table entry
//! per member.
//!
//! The host owns removal: whenever it discards a subtree it must call
//! [`release_subtree`] with the root, which detaches every binding inside
//! (attributes included) and lets eager destruction reclaim cells that lost
//! their last binding.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use tracing::{debug, trace};

use crate::error::EngineError;
use crate::ident::{CellId, NodeId};
use crate::reactive::registry;
use crate::reactive::Signal;

use super::node::{AttrRef, NodeRef};
use super::reconcile::{self, Location, Rendered};

static BOUND: OnceLock<RwLock<HashMap<NodeId, CellId>>> = OnceLock::new();

fn table() -> &'static RwLock<HashMap<NodeId, CellId>> {
    BOUND.get_or_init(|| RwLock::new(HashMap::new()))
}

fn location_ids(location: &Location) -> Vec<NodeId> {
    match location {
        Location::Node(node) => vec![node.id()],
        Location::Group(members) => members.iter().map(|m| m.id()).collect(),
        Location::Attribute(attribute) => vec![attribute.id()],
    }
}

fn record(location: &Location, cell: CellId) {
    let mut table = table().write().expect("binding table lock poisoned");
    for id in location_ids(location) {
        table.insert(id, cell);
    }
}

/// Render a cell's value as new children of `parent` and bind it there.
///
/// Returns the rendered location: one node for most values, a run of
/// siblings for a list. Writes to the cell patch the location from now on,
/// possibly replacing or regrowing it.
pub fn bind_child(parent: &NodeRef, cell: &Signal) -> Result<Location, EngineError> {
    let location = match reconcile::to_node(&cell.get_untracked())? {
        Rendered::One(node) => {
            parent.append_child(&node)?;
            Location::Node(node)
        }
        Rendered::Many(members) => {
            for member in &members {
                parent.append_child(member)?;
            }
            Location::Group(members)
        }
    };
    record(&location, cell.id());
    cell.attach_location(location.clone());
    debug!(cell = %cell.id(), location = ?location, "bound child");
    Ok(location)
}

/// Bind a cell to an attribute of `element`, rendering its current value.
///
/// Returns the attribute node. Writes to the cell rewrite the attribute and
/// mirror onto the reflected property.
pub fn bind_attribute(
    element: &NodeRef,
    name: &str,
    cell: &Signal,
) -> Result<AttrRef, EngineError> {
    let text = reconcile::attribute_text(&cell.get_untracked())?;
    let attribute = element.set_attribute(name, &text)?;
    let location = Location::Attribute(attribute.clone());
    record(&location, cell.id());
    cell.attach_location(location);
    debug!(cell = %cell.id(), attribute = name, "bound attribute");
    Ok(attribute)
}

/// Move the side-table entries after a patch replaced a bound location.
pub(crate) fn relocate(old: &Location, new: &Location, cell: CellId) {
    let mut table = table().write().expect("binding table lock poisoned");
    for id in location_ids(old) {
        table.remove(&id);
    }
    for id in location_ids(new) {
        table.insert(id, cell);
    }
}

/// Removal observation: the host calls this with every subtree it removes.
///
/// Walks the subtree, attribute nodes included, detaches every binding
/// found in it, and lets eager destruction run on the affected cells.
pub fn release_subtree(root: &NodeRef) {
    release_node(root);
    for attribute in root.attributes() {
        release_attribute(&attribute);
    }
    for child in root.children() {
        release_subtree(&child);
    }
}

fn release_node(node: &NodeRef) {
    let Some(cell_id) = take_entry(node.id()) else {
        return;
    };
    trace!(cell = %cell_id, node = %node.id(), "released binding");
    if let Some(cell) = registry::lookup(cell_id) {
        if let Some(binding) = cell.detach_node_binding(node) {
            // A group binding owns entries for its other members too.
            let mut table = table().write().expect("binding table lock poisoned");
            for id in location_ids(&binding) {
                table.remove(&id);
            }
        }
    }
}

fn release_attribute(attribute: &AttrRef) {
    let Some(cell_id) = take_entry(attribute.id()) else {
        return;
    };
    trace!(cell = %cell_id, attribute = attribute.name(), "released binding");
    if let Some(cell) = registry::lookup(cell_id) {
        cell.detach_location(&Location::Attribute(attribute.clone()));
    }
}

fn take_entry(id: NodeId) -> Option<CellId> {
    table()
        .write()
        .expect("binding table lock poisoned")
        .remove(&id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn bound_child_follows_writes() {
        let root = NodeRef::element("div");
        let cell = Signal::new(0);
        let location = bind_child(&root, &cell).unwrap();
        let node = location.as_node().unwrap().clone();
        assert_eq!(node.text_data(), Some("0".to_owned()));

        cell.set(1).unwrap();
        assert_eq!(node.text_data(), Some("1".to_owned()));
        assert_eq!(root.text_content(), "1");
    }

    #[test]
    fn null_binding_renders_a_placeholder_and_recovers() {
        let root = NodeRef::element("div");
        let cell = Signal::new(Value::Null);
        let location = bind_child(&root, &cell).unwrap();
        assert!(location.as_node().unwrap().is_placeholder());

        // A later scalar replaces the placeholder in position.
        cell.set("hello").unwrap();
        assert_eq!(root.text_content(), "hello");
        assert_eq!(root.child_count(), 1);
    }

    #[test]
    fn empty_list_binding_stays_a_placeholder() {
        let root = NodeRef::element("div");
        let cell = Signal::new(Value::Null);
        let location = bind_child(&root, &cell).unwrap();
        let placeholder = location.as_node().unwrap().clone();

        // An empty list renders as nothing, so the placeholder stays put.
        cell.set(Value::List(Vec::new())).unwrap();
        assert_eq!(root.child_count(), 1);
        assert!(root.children()[0].same(&placeholder));
        assert!(placeholder.is_placeholder());
    }

    #[test]
    fn list_binding_renders_sibling_runs() {
        let root = NodeRef::element("ul");
        let item = NodeRef::element("li");
        item.append_child(&NodeRef::text("one")).unwrap();
        let cell = Signal::new(Value::List(vec![
            Value::Node(item.clone()),
            Value::Str("two".into()),
        ]));

        let location = bind_child(&root, &cell).unwrap();
        assert_eq!(location.nodes().len(), 2);
        assert_eq!(root.child_count(), 2);
        assert!(root.children()[0].same(&item));
        assert_eq!(root.text_content(), "onetwo");

        // A longer list regrows the run in place.
        cell.set(Value::List(vec![
            Value::Node(item.clone()),
            Value::Str("2".into()),
            Value::Str("three".into()),
        ]))
        .unwrap();
        assert_eq!(root.child_count(), 3);
        assert_eq!(root.text_content(), "one2three");
        assert_eq!(cell.binding_count(), 1);
    }

    #[test]
    fn replacement_keeps_the_binding_alive() {
        let root = NodeRef::element("div");
        let cell = Signal::new(Value::Null);
        bind_child(&root, &cell).unwrap();

        // Placeholder -> text -> text: the second write must patch the
        // relocated node, not the original placeholder.
        cell.set("a").unwrap();
        cell.set("b").unwrap();
        assert_eq!(root.text_content(), "b");
        assert_eq!(cell.binding_count(), 1);
    }

    #[test]
    fn bound_attribute_follows_writes() {
        let element = NodeRef::element("input");
        let cell = Signal::new("start");
        let attribute = bind_attribute(&element, "value", &cell).unwrap();
        assert_eq!(attribute.value(), "start");

        cell.set("next").unwrap();
        assert_eq!(attribute.value(), "next");
        assert_eq!(element.property("value"), Some("next".to_owned()));
    }

    #[test]
    fn release_detaches_and_destroys() {
        let root = NodeRef::element("div");
        let cell = Signal::new(1);
        let node = bind_child(&root, &cell).unwrap().as_node().unwrap().clone();
        assert!(cell.is_registered());
        assert_eq!(cell.binding_count(), 1);

        node.remove();
        release_subtree(&node);

        assert_eq!(cell.binding_count(), 0);
        assert!(!cell.is_registered());
    }

    #[test]
    fn releasing_one_run_member_detaches_the_whole_binding() {
        let root = NodeRef::element("div");
        let cell = Signal::new(Value::List(vec![
            Value::Str("a".into()),
            Value::Str("b".into()),
        ]));
        bind_child(&root, &cell).unwrap();
        assert_eq!(cell.binding_count(), 1);

        let member = root.children()[1].clone();
        member.remove();
        release_subtree(&member);

        assert_eq!(cell.binding_count(), 0);
        assert!(!cell.is_registered());
    }

    #[test]
    fn release_walks_attributes_and_descendants() {
        let root = NodeRef::element("div");
        let row = NodeRef::element("span");
        root.append_child(&row).unwrap();

        let text_cell = Signal::new("x");
        bind_child(&row, &text_cell).unwrap();
        let attr_cell = Signal::new("y");
        bind_attribute(&row, "title", &attr_cell).unwrap();

        row.remove();
        release_subtree(&row);

        assert!(!text_cell.is_registered());
        assert!(!attr_cell.is_registered());
    }

    #[test]
    fn releasing_an_unbound_subtree_is_harmless() {
        let free = NodeRef::element("div");
        release_subtree(&free);
    }
}
