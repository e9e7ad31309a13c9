//! Integration Tests for the Reactive Engine
//!
//! These tests exercise the full pipeline: cells, derived cells, and stores
//! driving document bindings through the reconcilers, with eager lifecycle
//! management along the way.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use filament_core::dom::{
    bind_attribute, bind_child, bind_list, release_subtree, NodeRef,
};
use filament_core::reactive::{SetPolicy, Signal, Store};
use filament_core::value::Value;

/// A counter cell bound into a document updates its text synchronously.
#[test]
fn counter_renders_and_updates() {
    let root = NodeRef::element("div");
    let count = Signal::new(0);

    bind_child(&root, &count).unwrap();
    assert_eq!(root.text_content(), "0");

    count.set(1).unwrap();
    count.set(2).unwrap();
    assert_eq!(root.text_content(), "2");
    assert_eq!(root.child_count(), 1);
}

/// A derived chain propagates source writes all the way into the document.
#[test]
fn derived_chain_drives_the_document() {
    let root = NodeRef::element("p");
    let first = Signal::new("Ada");
    let last = Signal::new("Lovelace");

    let (f, l) = (first.clone(), last.clone());
    let full = Signal::computed(move || {
        Value::Str(format!(
            "{} {}",
            f.get().as_str().unwrap_or_default(),
            l.get().as_str().unwrap_or_default()
        ))
    });
    bind_child(&root, &full).unwrap();
    assert_eq!(root.text_content(), "Ada Lovelace");

    last.set("Byron").unwrap();
    assert_eq!(root.text_content(), "Ada Byron");
}

/// Attribute bindings rewrite the attribute and the reflected property.
#[test]
fn attribute_binding_reflects_onto_the_element() {
    let input = NodeRef::element("input");
    let css = Signal::new("idle");

    bind_attribute(&input, "class", &css).unwrap();
    assert_eq!(input.get_attribute("class").unwrap(), "idle");

    css.set("busy").unwrap();
    assert_eq!(input.get_attribute("class").unwrap(), "busy");
    assert_eq!(input.property("className").unwrap(), "busy");
}

/// One cell can drive several locations at once.
#[test]
fn one_cell_many_locations() {
    let left = NodeRef::element("span");
    let right = NodeRef::element("span");
    let badge = NodeRef::element("span");
    let cell = Signal::new(3);

    bind_child(&left, &cell).unwrap();
    bind_child(&right, &cell).unwrap();
    bind_attribute(&badge, "data-count", &cell).unwrap();

    cell.set(4).unwrap();
    assert_eq!(left.text_content(), "4");
    assert_eq!(right.text_content(), "4");
    assert_eq!(badge.get_attribute("data-count").unwrap(), "4");
}

/// A store child cell feeds a document binding; writes through the store
/// API and through the child both land in the document.
#[test]
fn store_child_drives_a_binding() {
    let root = NodeRef::element("div");
    let store = Store::new(Value::Object({
        let mut map = indexmap::IndexMap::new();
        map.insert("count".to_owned(), Value::Int(0));
        map
    }))
    .unwrap();

    let count = store.get_key("count").unwrap();
    let count = count.as_cell().unwrap().clone();
    bind_child(&root, &count).unwrap();
    assert_eq!(root.text_content(), "0");

    store.set_key("count", 1).unwrap();
    assert_eq!(root.text_content(), "1");

    count.set(2).unwrap();
    assert_eq!(root.text_content(), "2");
    assert_eq!(
        store.get().as_object().unwrap().get("count"),
        Some(&Value::Int(2))
    );
}

/// Deep store reactivity: a derived cell over a grandchild leaf observes
/// writes made through the child handle.
#[test]
fn derived_observes_a_deep_store_child() {
    let store = Store::new(Value::Object({
        let mut counter = indexmap::IndexMap::new();
        counter.insert("value".to_owned(), Value::Int(0));
        let mut map = indexmap::IndexMap::new();
        map.insert("counter".to_owned(), Value::Object(counter));
        map
    }))
    .unwrap();

    let counter = store.get_key("counter").unwrap();
    let counter = counter.as_store().unwrap().clone();
    let value = counter.get_key("value").unwrap();
    let value = value.as_cell().unwrap().clone();

    let value_clone = value.clone();
    let doubled = Signal::computed(move || {
        Value::Int(value_clone.get().as_i64().unwrap_or(0) * 2)
    });
    assert_eq!(doubled.get(), Value::Int(0));

    value.set(5).unwrap();
    assert_eq!(doubled.get(), Value::Int(10));

    // The deep write surfaced in the root container as well.
    let root = store.get();
    let counter_value = root.as_object().unwrap().get("counter").unwrap();
    assert_eq!(
        counter_value.as_object().unwrap().get("value"),
        Some(&Value::Int(5))
    );
}

/// A store-backed list re-renders positionally when the store is replaced.
#[test]
fn store_driven_list_reconciles_positionally() {
    let anchor = NodeRef::element("ul");
    let todos = Store::new(vec![
        Value::Str("write".into()),
        Value::Str("review".into()),
        Value::Str("ship".into()),
    ])
    .unwrap();

    bind_list(&anchor, todos.cell(), |value, _| value.clone()).unwrap();
    assert_eq!(anchor.text_content(), "writereviewship");
    assert_eq!(anchor.child_count(), 3);

    todos
        .set(vec![Value::Str("review".into()), Value::Str("ship".into())])
        .unwrap();
    assert_eq!(anchor.child_count(), 2);
    assert_eq!(anchor.text_content(), "reviewship");

    todos.push("celebrate").unwrap();
    assert_eq!(anchor.child_count(), 3);
    assert_eq!(anchor.text_content(), "reviewshipcelebrate");
}

/// A list-valued cell bound as a child renders a run of siblings, element
/// nodes passing through untouched, and an emptied list parks a
/// placeholder in the run's position.
#[test]
fn list_valued_binding_renders_sibling_runs() {
    let root = NodeRef::element("nav");
    let home = NodeRef::element("a");
    home.append_child(&NodeRef::text("home")).unwrap();

    let crumbs = Signal::new(Value::List(vec![
        Value::Node(home.clone()),
        Value::Str(" / ".into()),
        Value::Str("settings".into()),
    ]));
    bind_child(&root, &crumbs).unwrap();
    assert_eq!(root.child_count(), 3);
    assert!(root.children()[0].same(&home));
    assert_eq!(root.text_content(), "home / settings");

    crumbs
        .set(Value::List(vec![
            Value::Node(home.clone()),
            Value::Str(" / ".into()),
            Value::Str("profile".into()),
            Value::Str(" / ".into()),
            Value::Str("avatar".into()),
        ]))
        .unwrap();
    assert_eq!(root.child_count(), 5);
    assert_eq!(root.text_content(), "home / profile / avatar");

    crumbs.set(Value::List(Vec::new())).unwrap();
    assert_eq!(root.child_count(), 1);
    assert!(root.children()[0].is_placeholder());

    crumbs.set(Value::Str("back".into())).unwrap();
    assert_eq!(root.text_content(), "back");
}

/// Removal observation reclaims every cell bound inside the subtree,
/// including a derived cell's own dependency listeners.
#[test]
fn subtree_removal_reclaims_the_graph() {
    let root = NodeRef::element("div");
    let section = NodeRef::element("section");
    root.append_child(&section).unwrap();

    let source = Signal::new(10);
    let source_clone = source.clone();
    let doubled = Signal::computed(move || {
        Value::Int(source_clone.get().as_i64().unwrap_or(0) * 2)
    });
    bind_child(&section, &doubled).unwrap();
    assert_eq!(section.text_content(), "20");
    assert_eq!(source.listener_count(), 1);
    assert!(doubled.is_registered());

    section.remove();
    release_subtree(&section);

    // The derived cell lost its only binding and was destroyed, taking its
    // subscription on the source with it.
    assert!(!doubled.is_registered());
    assert_eq!(source.listener_count(), 0);

    // The source is inert now; writing it is still safe.
    source.set(99).unwrap();
    assert_eq!(section.text_content(), "20");
}

/// Null-valued bindings hold their position with a placeholder and can
/// come back later.
#[test]
fn placeholder_round_trip() {
    let root = NodeRef::element("div");
    let maybe = Signal::new(Value::Null);
    bind_child(&root, &maybe).unwrap();
    assert_eq!(root.text_content(), "");
    assert_eq!(root.child_count(), 1);

    maybe.set("visible").unwrap();
    assert_eq!(root.text_content(), "visible");

    maybe.set(Value::Null).unwrap();
    assert_eq!(root.text_content(), "");
    assert_eq!(root.child_count(), 1);
}

/// Equality-skip cells drop redundant writes before they reach listeners
/// or the document.
#[test]
fn skip_equal_suppresses_redundant_propagation() {
    let root = NodeRef::element("div");
    let cell = Signal::with_policy(1, SetPolicy::SkipEqual);
    bind_child(&root, &cell).unwrap();

    let fired = Arc::new(AtomicI64::new(0));
    let fired_clone = fired.clone();
    cell.on_change(move |_| {
        fired_clone.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    assert!(!cell.set(1).unwrap());
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    assert!(cell.set(2).unwrap());
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(root.text_content(), "2");
}

/// A derived cell over a store's whole container re-renders when any key
/// changes.
#[test]
fn derived_over_a_store_container() {
    let store = Store::new(Value::Object({
        let mut map = indexmap::IndexMap::new();
        map.insert("a".to_owned(), Value::Int(1));
        map.insert("b".to_owned(), Value::Int(2));
        map
    }))
    .unwrap();

    let backing = store.cell().clone();
    let sum = Signal::computed(move || {
        let total = backing
            .get()
            .as_object()
            .map(|map| map.values().filter_map(Value::as_i64).sum::<i64>())
            .unwrap_or(0);
        Value::Int(total)
    });
    assert_eq!(sum.get(), Value::Int(3));

    store.set_key("b", 10).unwrap();
    assert_eq!(sum.get(), Value::Int(11));
}
