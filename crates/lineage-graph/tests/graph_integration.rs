//! Integration tests for the node graph
//!
//! Element identity must survive arbitrary structural edits, and references
//! must re-resolve as identities come and go.

use lineage_core::{Item, ItemId, Key, NodePath, ObjectValue, UnloadableValue, Value};
use lineage_graph::{
    GraphError, GraphListener, NodeChange, NodeGraph, NodeId, Reference, ReferenceTarget,
};
use lineage_test_utils::{character, fixture_registry, init_tracing, object_id};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;

fn graph_with(root: ObjectValue) -> NodeGraph {
    init_tracing();
    NodeGraph::new(fixture_registry(), root).unwrap()
}

fn resolve(graph: &NodeGraph, path: &str) -> NodeId {
    graph.resolve(&path.parse::<NodePath>().unwrap()).unwrap()
}

#[derive(Debug, Clone)]
enum Edit {
    Insert(usize),
    Remove(usize),
    Move(usize, usize),
}

fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        (0usize..16).prop_map(Edit::Insert),
        (0usize..16).prop_map(Edit::Remove),
        (0usize..16, 0usize..16).prop_map(|(a, b)| Edit::Move(a, b)),
    ]
}

proptest! {
    /// An element's id keeps resolving to its current index through
    /// unrelated inserts, removals and moves.
    #[test]
    fn item_lookup_is_stable(edits in prop::collection::vec(edit(), 0..40)) {
        let mut graph = graph_with(character("c").with_member("Inventory", Value::list(["x", "y"])));
        let inventory = resolve(&graph, "Inventory");
        let tracked = graph.insert_item(inventory, 1, Item::new("tracked")).unwrap();

        for (n, e) in edits.into_iter().enumerate() {
            let ids = graph.item_ids(inventory).unwrap().ids().to_vec();
            let others: Vec<_> = ids.iter().copied().filter(|id| *id != tracked).collect();
            match e {
                Edit::Insert(at) => {
                    let at = at % (ids.len() + 1);
                    graph.insert_item(inventory, at, Item::new(format!("v{n}"))).unwrap();
                }
                Edit::Remove(pick) if !others.is_empty() => {
                    graph.remove_item(inventory, others[pick % others.len()]).unwrap();
                }
                Edit::Move(pick, to) if !others.is_empty() => {
                    graph.move_item(inventory, others[pick % others.len()], to % ids.len()).unwrap();
                }
                _ => {}
            }

            let index = graph.item_ids(inventory).unwrap().lookup(tracked).unwrap();
            let value = graph.get(inventory).unwrap();
            let items = value.as_list().unwrap();
            prop_assert_eq!(items[index].id, Some(tracked));
            prop_assert_eq!(&items[index].value, &Value::from("tracked"));
        }
    }
}

#[test]
fn reference_resolves_when_target_appears() {
    let target_id = object_id(77);
    let mut graph = graph_with(
        character("hero").with_member("Target", Value::Reference(target_id)),
    );
    let target = resolve(&graph, "Target");
    assert!(matches!(
        graph.reference(target),
        Some(Reference::Object(r)) if r.target() == Some(ReferenceTarget::Unresolved(target_id))
    ));

    let allies = resolve(&graph, "Allies");
    graph
        .insert_item(
            allies,
            0,
            Item::new(character("sidekick").with_id(target_id)),
        )
        .unwrap();

    let holder = graph.find_object(target_id).unwrap();
    assert!(matches!(
        graph.reference(target),
        Some(Reference::Object(r)) if r.target() == Some(ReferenceTarget::Resolved(holder))
    ));

    let ally = graph.item_ids(allies).unwrap().ids()[0];
    graph.remove_item(allies, ally).unwrap();
    assert!(matches!(
        graph.reference(target),
        Some(Reference::Object(r)) if r.target() == Some(ReferenceTarget::Unresolved(target_id))
    ));
}

#[test]
fn enumerable_targets_follow_item_ids() {
    let mut graph = graph_with(character("hero").with_member(
        "Allies",
        Value::list([character("a"), character("b")]),
    ));
    let allies = resolve(&graph, "Allies");
    let ids = graph.item_ids(allies).unwrap().ids().to_vec();
    let before = match graph.reference(allies) {
        Some(Reference::Enumerable(e)) => e.target(ids[1]),
        _ => None,
    };

    graph.insert_item(allies, 0, Item::new(character("c"))).unwrap();
    let after = match graph.reference(allies) {
        Some(Reference::Enumerable(e)) => e.target(ids[1]),
        _ => None,
    };
    assert!(before.is_some());
    assert_eq!(before, after);
    assert!(!graph.refresh_references(allies).unwrap());
}

#[derive(Default)]
struct Recorder(Mutex<Vec<NodeChange>>);

impl GraphListener for Recorder {
    fn on_change(&self, change: &NodeChange) {
        self.0.lock().push(change.clone());
    }
}

#[test]
fn listeners_observe_changes() {
    let mut graph = graph_with(character("hero"));
    let recorder = Arc::new(Recorder::default());
    graph.subscribe(recorder.clone());

    let health = resolve(&graph, "Health");
    graph.set(health, Value::Int(5)).unwrap();
    let inventory = resolve(&graph, "Inventory");
    let id = graph.insert_item(inventory, 0, Item::new("rope")).unwrap();

    let changes = recorder.0.lock();
    assert_eq!(
        *changes,
        vec![
            NodeChange::ValueChanged { node: health },
            NodeChange::ItemInserted {
                container: inventory,
                id,
                index: 0
            },
        ]
    );
}

#[test]
fn non_identifiable_collection_still_tracks_internal_ids() {
    let graph = graph_with(character("hero").with_member("Notes", Value::list(["n1", "n2"])));
    let notes = resolve(&graph, "Notes");
    assert!(!graph.node(notes).unwrap().flags().identifiable_items);
    assert_eq!(graph.item_ids(notes).unwrap().len(), 2);
}

#[test]
fn deleted_id_cannot_be_reinserted() {
    let mut graph = graph_with(character("hero").with_member("Inventory", Value::list(["a", "b"])));
    let inventory = resolve(&graph, "Inventory");
    let first = graph.item_ids(inventory).unwrap().ids()[0];
    graph.remove_item(inventory, first).unwrap();
    graph.mark_deleted(inventory, first).unwrap();

    let err = graph
        .insert_item(inventory, 0, Item::with_id(first, "zzz"))
        .unwrap_err();
    assert!(matches!(err, GraphError::DuplicateItemId(id) if id == first));
    assert_eq!(graph.item_ids(inventory).unwrap().len(), 1);

    graph.unmark_deleted(inventory, first).unwrap();
    graph.insert_item(inventory, 0, Item::with_id(first, "zzz")).unwrap();
    assert_eq!(graph.item_ids(inventory).unwrap().lookup(first).unwrap(), 0);
    assert!(!graph.item_ids(inventory).unwrap().is_deleted(first));
}

#[test]
fn undeclared_member_is_kept_across_sets() {
    let mana = Value::Unloadable(UnloadableValue {
        type_name: None,
        raw: "3\n".into(),
        error: "'Character' has no member 'Mana'".into(),
    });
    let mut graph = graph_with(character("hero").with_member("Mana*", mana.clone()));
    let root = graph.root();
    let node = resolve(&graph, "Mana*");
    assert!(!graph.node(node).unwrap().flags().overridable);

    let Value::Object(mut object) = graph.get(root).unwrap() else {
        panic!("root should be an object")
    };
    assert_eq!(object.members.get("Mana*"), Some(&mana));
    object.members.insert("Name".into(), Value::from("villain"));
    graph.set(root, Value::Object(object)).unwrap();
    assert_eq!(resolve(&graph, "Mana*"), node);
    assert_eq!(graph.get(node).unwrap(), mana);
}

#[test]
fn renaming_to_the_current_key_is_silent() {
    let mut graph = graph_with(character("hero"));
    let stats = resolve(&graph, "Stats");
    let id = graph
        .insert_entry(stats, 0, Key::from("luck"), Item::new(3))
        .unwrap();
    let recorder = Arc::new(Recorder::default());
    graph.subscribe(recorder.clone());

    let previous = graph.rename_key(stats, id, Key::from("luck")).unwrap();
    assert_eq!(previous, Key::from("luck"));
    assert!(recorder.0.lock().is_empty());

    assert!(matches!(
        graph.rename_key(stats, ItemId::from_u128(0xdead), Key::from("luck")),
        Err(GraphError::ItemNotFound { .. })
    ));
}
