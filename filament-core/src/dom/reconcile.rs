//! Node reconciliation.
//!
//! The reconciler turns values into document nodes and patches an existing
//! location to show a new value with the cheapest edit it can prove safe:
//! identity no-ops first, in-place text rewrites next, node replacement
//! last. Lists render as a run of sibling nodes and are patched
//! positionally against that run. The location a patch returns is where the
//! value lives now; it may differ from the input when a replacement
//! happened, and the caller is responsible for recording the move.

use tracing::trace;

use crate::error::EngineError;
use crate::value::Value;

use super::attributes::reflected_property;
use super::node::{AttrRef, NodeRef};

/// A place in the document a cell's value is rendered into.
#[derive(Clone)]
pub enum Location {
    Node(NodeRef),
    /// A run of sibling nodes rendered from a list. Never empty; an empty
    /// list renders as a single placeholder node instead.
    Group(Vec<NodeRef>),
    Attribute(AttrRef),
}

impl Location {
    /// Identity comparison; two clones of the same location are the same.
    pub fn same(&self, other: &Location) -> bool {
        match (self, other) {
            (Location::Node(a), Location::Node(b)) => a.same(b),
            (Location::Group(a), Location::Group(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same(y))
            }
            (Location::Attribute(a), Location::Attribute(b)) => a.same(b),
            _ => false,
        }
    }

    /// Does this location render into the given node?
    pub(crate) fn includes(&self, node: &NodeRef) -> bool {
        match self {
            Location::Node(own) => own.same(node),
            Location::Group(members) => members.iter().any(|m| m.same(node)),
            Location::Attribute(_) => false,
        }
    }

    pub fn as_node(&self) -> Option<&NodeRef> {
        match self {
            Location::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_attribute(&self) -> Option<&AttrRef> {
        match self {
            Location::Attribute(attribute) => Some(attribute),
            _ => None,
        }
    }

    /// Every document node this location occupies, in order. Empty for
    /// attribute locations.
    pub fn nodes(&self) -> Vec<NodeRef> {
        match self {
            Location::Node(node) => vec![node.clone()],
            Location::Group(members) => members.clone(),
            Location::Attribute(_) => Vec::new(),
        }
    }
}

impl std::fmt::Debug for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::Node(node) => f.debug_tuple("Node").field(&node.id()).finish(),
            Location::Group(members) => {
                let ids: Vec<_> = members.iter().map(|m| m.id()).collect();
                f.debug_tuple("Group").field(&ids).finish()
            }
            Location::Attribute(attribute) => {
                f.debug_tuple("Attribute").field(&attribute.name()).finish()
            }
        }
    }
}

/// What a value renders as: one node, or a run of siblings for a list.
#[derive(Debug)]
pub enum Rendered {
    One(NodeRef),
    Many(Vec<NodeRef>),
}

impl Rendered {
    /// Every node produced, in document order.
    pub fn nodes(&self) -> Vec<NodeRef> {
        match self {
            Rendered::One(node) => vec![node.clone()],
            Rendered::Many(members) => members.clone(),
        }
    }
}

/// The text rendering of a scalar, if the value is one.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Bool(b) => Some(b.to_string()),
        Value::Int(n) => Some(n.to_string()),
        Value::Float(x) => Some(x.to_string()),
        Value::Str(s) => Some(s.clone()),
        _ => None,
    }
}

/// Flatten a list into text. Nulls vanish, nested lists flatten, nodes and
/// objects cannot be rendered as text.
fn list_text(items: &[Value]) -> Result<String, EngineError> {
    let mut out = String::new();
    for item in items {
        match item {
            Value::Null => {}
            Value::List(nested) => out.push_str(&list_text(nested)?),
            other => match scalar_text(other) {
                Some(text) => out.push_str(&text),
                None => {
                    return Err(EngineError::Unrenderable { kind: other.kind() });
                }
            },
        }
    }
    Ok(out)
}

/// The text rendering of a value destined for an attribute.
pub(crate) fn attribute_text(value: &Value) -> Result<String, EngineError> {
    match value {
        Value::Null => Ok(String::new()),
        Value::List(items) => list_text(items),
        other => scalar_text(other)
            .ok_or(EngineError::Unrenderable { kind: other.kind() }),
    }
}

/// Turn a value into document nodes.
///
/// Nodes pass through, null becomes a placeholder, scalars become text.
/// Lists flatten into a run of sibling nodes, one per element; an empty
/// list yields a lone placeholder. Objects have no node rendering.
pub fn to_node(value: &Value) -> Result<Rendered, EngineError> {
    match value {
        Value::List(items) => {
            let mut nodes = Vec::new();
            flatten_list(items, &mut nodes)?;
            if nodes.is_empty() {
                Ok(Rendered::One(NodeRef::placeholder()))
            } else {
                Ok(Rendered::Many(nodes))
            }
        }
        other => leaf_node(other).map(Rendered::One),
    }
}

fn flatten_list(items: &[Value], out: &mut Vec<NodeRef>) -> Result<(), EngineError> {
    for item in items {
        match item {
            Value::List(nested) => flatten_list(nested, out)?,
            other => out.push(leaf_node(other)?),
        }
    }
    Ok(())
}

/// The single-node rendering of a non-list value.
fn leaf_node(value: &Value) -> Result<NodeRef, EngineError> {
    match value {
        Value::Node(node) => Ok(node.clone()),
        Value::Null => Ok(NodeRef::placeholder()),
        Value::Object(_) | Value::List(_) => {
            Err(EngineError::Unrenderable { kind: value.kind() })
        }
        scalar => Ok(NodeRef::text(&scalar_text(scalar).ok_or(
            EngineError::Unrenderable { kind: scalar.kind() },
        )?)),
    }
}

/// Flatten nested lists into their leaf values, preserving order.
fn flatten_items<'a>(items: &'a [Value], out: &mut Vec<&'a Value>) {
    for item in items {
        match item {
            Value::List(nested) => flatten_items(nested, out),
            other => out.push(other),
        }
    }
}

/// Patch a location to show a value, choosing the cheapest safe edit.
///
/// Returns the location the value occupies afterwards. For attribute
/// locations and in-place text edits that is the input location; when
/// nodes are replaced it is the replacement, which may grow into a group
/// when the value is a list or collapse back to one node when it is not.
pub fn patch(location: &Location, value: &Value) -> Result<Location, EngineError> {
    match location {
        Location::Attribute(attribute) => {
            let text = attribute_text(value)?;
            attribute.set_value(&text);
            mirror_property(attribute, &text);
            Ok(location.clone())
        }
        Location::Node(node) => patch_node(node, value),
        Location::Group(members) => patch_group(members, value),
    }
}

fn patch_node(node: &NodeRef, value: &Value) -> Result<Location, EngineError> {
    if let Value::List(items) = value {
        return replace_with_group(node, items);
    }
    patch_leaf(node, value).map(Location::Node)
}

/// Patch one node against one non-list value.
fn patch_leaf(node: &NodeRef, value: &Value) -> Result<NodeRef, EngineError> {
    // The value already is this node.
    if let Value::Node(target) = value {
        if target.same(node) {
            return Ok(node.clone());
        }
    }
    // Scalar into an existing text node: rewrite the data in place.
    if node.is_text() {
        if let Some(text) = scalar_text(value) {
            node.set_text(&text);
            return Ok(node.clone());
        }
    }
    // Null on a placeholder: nothing to show, nothing to do.
    if node.is_placeholder() && value.is_null() {
        return Ok(node.clone());
    }
    let replacement = leaf_node(value)?;
    node.replace_with(&replacement);
    trace!(old = %node.id(), new = %replacement.id(), "node replaced");
    Ok(replacement)
}

/// Replace a single node with the sibling run a list renders as.
fn replace_with_group(node: &NodeRef, items: &[Value]) -> Result<Location, EngineError> {
    let mut flat = Vec::new();
    flatten_items(items, &mut flat);
    if flat.is_empty() {
        // An empty list renders as nothing, exactly like null.
        if node.is_placeholder() {
            return Ok(Location::Node(node.clone()));
        }
        let placeholder = NodeRef::placeholder();
        node.replace_with(&placeholder);
        return Ok(Location::Node(placeholder));
    }
    // Build every node before touching the tree so a bad element leaves
    // the document untouched.
    let mut members = Vec::with_capacity(flat.len());
    for &item in &flat {
        members.push(leaf_node(item)?);
    }
    node.replace_with(&members[0]);
    for window in members.windows(2) {
        window[0].insert_after(&window[1]);
    }
    trace!(old = %node.id(), members = members.len(), "node replaced by a group");
    Ok(Location::Group(members))
}

/// Patch a sibling run against a new value.
///
/// A list patches positionally: shared positions update in place, surplus
/// members leave the tree, missing members are inserted after the run's
/// tail. Any other value collapses the run to its first member.
fn patch_group(members: &[NodeRef], value: &Value) -> Result<Location, EngineError> {
    let Value::List(items) = value else {
        for member in &members[1..] {
            member.remove();
        }
        return patch_node(&members[0], value);
    };
    let mut flat = Vec::new();
    flatten_items(items, &mut flat);
    if flat.is_empty() {
        let placeholder = NodeRef::placeholder();
        members[0].replace_with(&placeholder);
        for member in &members[1..] {
            member.remove();
        }
        return Ok(Location::Node(placeholder));
    }
    let shared = members.len().min(flat.len());
    let mut next = Vec::with_capacity(flat.len());
    for (member, &item) in members.iter().zip(&flat).take(shared) {
        next.push(patch_leaf(member, item)?);
    }
    for member in &members[shared..] {
        member.remove();
    }
    for &item in &flat[shared..] {
        let node = leaf_node(item)?;
        if let Some(tail) = next.last() {
            tail.insert_after(&node);
        }
        next.push(node);
    }
    Ok(Location::Group(next))
}

/// Mirror an attribute write onto the owning element's reflected property.
/// Skipped when the owner is gone or no longer carries the attribute.
fn mirror_property(attribute: &AttrRef, text: &str) {
    if let Some(owner) = attribute.owner() {
        if owner.has_attribute(attribute.name()) {
            // Owners are always elements; the write cannot fail.
            owner
                .set_property(reflected_property(attribute.name()), text)
                .ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    #[test]
    fn nodes_pass_through() {
        let element = NodeRef::element("div");
        let out = to_node(&Value::Node(element.clone())).unwrap();
        assert!(out.nodes()[0].same(&element));
    }

    #[test]
    fn null_becomes_a_placeholder() {
        let out = to_node(&Value::Null).unwrap();
        assert!(out.nodes()[0].is_placeholder());
    }

    #[test]
    fn scalars_become_text() {
        let out = to_node(&Value::Int(42)).unwrap();
        assert_eq!(out.nodes()[0].text_data(), Some("42".to_owned()));

        let out = to_node(&Value::Bool(true)).unwrap();
        assert_eq!(out.nodes()[0].text_data(), Some("true".to_owned()));
    }

    #[test]
    fn lists_render_as_sibling_runs() {
        let items = Value::List(vec![
            Value::Str("a".into()),
            Value::Null,
            Value::Int(1),
            Value::List(vec![Value::Str("b".into())]),
        ]);
        let nodes = to_node(&items).unwrap().nodes();
        assert_eq!(nodes.len(), 4);
        assert_eq!(nodes[0].text_data(), Some("a".to_owned()));
        assert!(nodes[1].is_placeholder());
        assert_eq!(nodes[2].text_data(), Some("1".to_owned()));
        assert_eq!(nodes[3].text_data(), Some("b".to_owned()));
    }

    #[test]
    fn lists_carry_nodes_through() {
        let item = NodeRef::element("li");
        let list = Value::List(vec![Value::Node(item.clone()), Value::Str("x".into())]);
        let nodes = to_node(&list).unwrap().nodes();
        assert_eq!(nodes.len(), 2);
        assert!(nodes[0].same(&item));
        assert_eq!(nodes[1].text_data(), Some("x".to_owned()));
    }

    #[test]
    fn empty_list_becomes_a_placeholder() {
        let out = to_node(&Value::List(Vec::new())).unwrap();
        assert!(out.nodes()[0].is_placeholder());
    }

    #[test]
    fn objects_are_unrenderable() {
        let object = Value::Object(IndexMap::new());
        assert!(matches!(
            to_node(&object),
            Err(EngineError::Unrenderable { .. })
        ));

        // Inside a list too.
        let list = Value::List(vec![Value::Object(IndexMap::new())]);
        assert!(matches!(
            to_node(&list),
            Err(EngineError::Unrenderable { .. })
        ));
    }

    #[test]
    fn scalar_patch_rewrites_text_in_place() {
        let text = NodeRef::text("1");
        let location = Location::Node(text.clone());
        let out = patch(&location, &Value::Int(2)).unwrap();
        assert!(out.same(&location));
        assert_eq!(text.text_data(), Some("2".to_owned()));
    }

    #[test]
    fn list_onto_a_node_grows_a_sibling_run() {
        let parent = NodeRef::element("div");
        let text = NodeRef::text("old");
        parent.append_child(&text).unwrap();

        let location = Location::Node(text.clone());
        let items = Value::List(vec![Value::Str("a".into()), Value::Str("b".into())]);
        let out = patch(&location, &items).unwrap();
        assert!(!out.same(&location));
        assert_eq!(out.nodes().len(), 2);
        assert_eq!(parent.child_count(), 2);
        assert_eq!(parent.text_content(), "ab");
        assert!(text.parent().is_none());
    }

    #[test]
    fn group_patch_is_positional() {
        let parent = NodeRef::element("div");
        let seed = NodeRef::placeholder();
        parent.append_child(&seed).unwrap();

        let three = Value::List(vec![
            Value::Str("a".into()),
            Value::Str("b".into()),
            Value::Str("c".into()),
        ]);
        let location = patch(&Location::Node(seed), &three).unwrap();
        assert_eq!(parent.text_content(), "abc");

        // Shared positions rewrite in place; the surplus tail leaves.
        let first = location.nodes()[0].clone();
        let two = Value::List(vec![Value::Str("x".into()), Value::Str("y".into())]);
        let shrunk = patch(&location, &two).unwrap();
        assert_eq!(parent.text_content(), "xy");
        assert_eq!(parent.child_count(), 2);
        assert!(shrunk.nodes()[0].same(&first));

        // Growth inserts after the run's tail, before later siblings.
        let after = NodeRef::text("!");
        parent.append_child(&after).unwrap();
        let four = Value::List(vec![
            Value::Str("1".into()),
            Value::Str("2".into()),
            Value::Str("3".into()),
            Value::Str("4".into()),
        ]);
        patch(&shrunk, &four).unwrap();
        assert_eq!(parent.text_content(), "1234!");
    }

    #[test]
    fn scalar_collapses_a_group() {
        let parent = NodeRef::element("div");
        let seed = NodeRef::placeholder();
        parent.append_child(&seed).unwrap();

        let list = Value::List(vec![Value::Str("a".into()), Value::Str("b".into())]);
        let group = patch(&Location::Node(seed), &list).unwrap();
        assert_eq!(parent.child_count(), 2);

        let out = patch(&group, &Value::Str("solo".into())).unwrap();
        assert_eq!(parent.child_count(), 1);
        assert_eq!(parent.text_content(), "solo");
        assert!(out.as_node().is_some());
    }

    #[test]
    fn emptied_list_collapses_to_a_placeholder() {
        let parent = NodeRef::element("div");
        let seed = NodeRef::placeholder();
        parent.append_child(&seed).unwrap();

        let list = Value::List(vec![Value::Int(1), Value::Int(2)]);
        let group = patch(&Location::Node(seed), &list).unwrap();

        let out = patch(&group, &Value::List(Vec::new())).unwrap();
        assert_eq!(parent.child_count(), 1);
        assert!(out.as_node().unwrap().is_placeholder());
    }

    #[test]
    fn placeholder_absorbs_null() {
        let placeholder = NodeRef::placeholder();
        let location = Location::Node(placeholder.clone());
        let out = patch(&location, &Value::Null).unwrap();
        assert!(out.same(&location));
        assert!(placeholder.is_placeholder());
    }

    #[test]
    fn placeholder_absorbs_an_empty_list() {
        let placeholder = NodeRef::placeholder();
        let location = Location::Node(placeholder.clone());
        let out = patch(&location, &Value::List(Vec::new())).unwrap();
        assert!(out.same(&location));
        assert!(placeholder.is_placeholder());
    }

    #[test]
    fn identity_patch_is_a_no_op() {
        let parent = NodeRef::element("div");
        let child = NodeRef::element("span");
        parent.append_child(&child).unwrap();

        let location = Location::Node(child.clone());
        let out = patch(&location, &Value::Node(child.clone())).unwrap();
        assert!(out.same(&location));
        assert_eq!(parent.child_count(), 1);
    }

    #[test]
    fn attribute_patch_sets_value_and_mirrors_the_property() {
        let element = NodeRef::element("input");
        let attribute = element.set_attribute("class", "old").unwrap();

        let location = Location::Attribute(attribute.clone());
        patch(&location, &Value::Str("new".into())).unwrap();

        assert_eq!(attribute.value(), "new");
        assert_eq!(element.property("className"), Some("new".to_owned()));
    }

    #[test]
    fn attribute_patch_survives_a_dropped_owner() {
        let attribute = {
            let element = NodeRef::element("div");
            element.set_attribute("title", "1").unwrap()
        };

        patch(&Location::Attribute(attribute.clone()), &Value::Int(2)).unwrap();
        assert_eq!(attribute.value(), "2");
    }

    #[test]
    fn null_attribute_clears_the_value() {
        let element = NodeRef::element("div");
        let attribute = element.set_attribute("title", "x").unwrap();

        patch(&Location::Attribute(attribute.clone()), &Value::Null).unwrap();
        assert_eq!(attribute.value(), "");
    }
}
