//! Base → derived propagation through a session

use lineage_assets::{AssetError, AssetSession, SessionConfig};
use lineage_core::{DocumentId, Item, NodePath, OverrideState, Value};
use lineage_test_utils::{archetype, fixture_registry, init_tracing, item_id, list_with_ids};
use pretty_assertions::assert_eq;

const BASE: DocumentId = DocumentId::from_u128(1);
const DERIVED: DocumentId = DocumentId::from_u128(2);

fn session() -> AssetSession {
    init_tracing();
    let mut session = AssetSession::new(fixture_registry(), SessionConfig::default());
    session.create_document(BASE, archetype(), None).unwrap();
    session.create_document(DERIVED, archetype(), Some(BASE)).unwrap();
    session
}

fn inventory() -> NodePath {
    NodePath::root().member("Inventory")
}

fn item_override(session: &AssetSession, n: u128) -> OverrideState {
    session
        .document(DERIVED)
        .unwrap()
        .item_override(&inventory(), item_id(n))
        .unwrap()
}

#[test]
fn sealed_item_ignores_base_edit_and_new_sibling_is_adopted() {
    let mut session = session();
    session
        .set_value(DERIVED, &inventory().item(item_id(2)), Value::from("B2"))
        .unwrap();
    session
        .set_item_override(DERIVED, &inventory(), item_id(2), OverrideState::SEALED)
        .unwrap();

    session
        .set_value(BASE, &inventory().item(item_id(2)), Value::from("b-new"))
        .unwrap();
    session
        .insert_item(BASE, &inventory(), 2, Item::with_id(item_id(3), "c"))
        .unwrap();

    assert_eq!(
        session.value(DERIVED, &inventory()).unwrap(),
        list_with_ids(&[(1, "a"), (2, "B2"), (3, "c")])
    );
    assert_eq!(item_override(&session, 1), OverrideState::BASE);
    assert_eq!(item_override(&session, 2), OverrideState::SEALED);
    assert_eq!(item_override(&session, 3), OverrideState::BASE);
}

#[test]
fn sealed_item_survives_base_deletion() {
    let mut session = session();
    session
        .set_item_override(DERIVED, &inventory(), item_id(2), OverrideState::SEALED)
        .unwrap();
    session.remove_item(BASE, &inventory(), item_id(2)).unwrap();

    assert_eq!(
        session.value(DERIVED, &inventory()).unwrap(),
        list_with_ids(&[(1, "a"), (2, "b")])
    );
}

#[test]
fn base_only_document_sync_is_noop() {
    let mut session = session();
    let report = session.synchronize(BASE).unwrap();
    assert!(report.is_noop());
    assert!(report.warnings.is_empty());
    assert!(!session.can_undo());
}

#[test]
fn base_edit_and_propagation_undo_together() {
    let mut session = session();
    let health = NodePath::root().member("Health");
    session.set_value(BASE, &health, Value::Int(80)).unwrap();
    assert_eq!(session.value(DERIVED, &health).unwrap(), Value::Int(80));
    assert_eq!(session.history().undo_len(), 1);

    session.undo().unwrap();
    assert_eq!(session.value(BASE, &health).unwrap(), Value::Int(100));
    assert_eq!(session.value(DERIVED, &health).unwrap(), Value::Int(100));

    session.redo().unwrap();
    assert_eq!(session.value(DERIVED, &health).unwrap(), Value::Int(80));
}

#[test]
fn propagation_cascades_down_base_chains() {
    let mut session = session();
    let third = DocumentId::from_u128(3);
    session.create_document(third, archetype(), Some(DERIVED)).unwrap();

    let name = NodePath::root().member("Name");
    session.set_value(BASE, &name, Value::from("Renamed")).unwrap();
    assert_eq!(session.value(third, &name).unwrap(), Value::from("Renamed"));
}

#[test]
fn local_deletion_is_not_undone_by_base_edits() {
    let mut session = session();
    session.remove_item(DERIVED, &inventory(), item_id(1)).unwrap();
    session
        .set_value(BASE, &inventory().item(item_id(1)), Value::from("a2"))
        .unwrap();

    assert_eq!(session.value(DERIVED, &inventory()).unwrap(), list_with_ids(&[(2, "b")]));

    let restored = session
        .restore_deleted_item(DERIVED, &inventory(), item_id(1))
        .unwrap();
    assert!(!restored.is_noop());
    assert_eq!(
        session.value(DERIVED, &inventory()).unwrap(),
        list_with_ids(&[(1, "a2"), (2, "b")])
    );
}

#[test]
fn reset_override_takes_base_values_back() {
    let mut session = session();
    let health = NodePath::root().member("Health");
    session.set_value(DERIVED, &health, Value::Int(1)).unwrap();
    session
        .insert_item(DERIVED, &inventory(), 0, Item::new("local"))
        .unwrap();

    session.reset_override(DERIVED, &NodePath::root()).unwrap();
    assert_eq!(session.value(DERIVED, &health).unwrap(), Value::Int(100));
    assert_eq!(
        session.value(DERIVED, &inventory()).unwrap(),
        list_with_ids(&[(1, "a"), (2, "b")])
    );
    assert!(session.document(DERIVED).unwrap().overrides().is_empty());

    session.undo().unwrap();
    assert_eq!(session.value(DERIVED, &health).unwrap(), Value::Int(1));
}

#[test]
fn non_overridable_member_rejects_derived_edit() {
    let mut session = session();
    let locked = NodePath::root().member("Locked");
    let err = session.set_value(DERIVED, &locked, Value::Bool(true)).unwrap_err();
    assert!(matches!(err, AssetError::NotOverridable { .. }));

    session.set_value(BASE, &locked, Value::Bool(true)).unwrap();
    assert_eq!(session.value(DERIVED, &locked).unwrap(), Value::Bool(true));
}

#[test]
fn new_container_still_receives_new_base_items() {
    let mut session = session();
    session
        .insert_item(DERIVED, &inventory(), 2, Item::new("mine"))
        .unwrap();
    session
        .set_override(DERIVED, &inventory(), OverrideState::NEW)
        .unwrap();
    session
        .insert_item(BASE, &inventory(), 0, Item::with_id(item_id(7), "first"))
        .unwrap();

    let ids = session.value(DERIVED, &inventory()).unwrap().item_ids();
    assert_eq!(ids.len(), 4);
    assert_eq!(ids[0], item_id(7));
}

#[test]
fn missing_base_keeps_values() {
    let mut session = session();
    let health = NodePath::root().member("Health");
    session.set_value(BASE, &health, Value::Int(50)).unwrap();
    session.remove_document(BASE).unwrap();

    let report = session.synchronize(DERIVED).unwrap();
    assert!(report.is_noop());
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(session.value(DERIVED, &health).unwrap(), Value::Int(50));
}
