//! Testing utilities for the lineage workspace
//!
//! Shared schema, registry and document fixtures.

#![allow(missing_docs)]

use lineage_core::{Item, ItemId, Key, ObjectId, ObjectValue, TypeRegistry, Value};
use std::sync::{Arc, Once};

/// Schema used across the workspace tests
pub const SCHEMA_YAML: &str = r#"
types:
  - name: Entity
    members:
      - { name: Name, type: string }
  - name: Weapon
    members:
      - { name: Damage, type: int, default: 10 }
      - { name: Tags, type: "List<string>" }
  - name: Character
    base: Entity
    members:
      - { name: Health, type: int, default: 100 }
      - { name: Inventory, type: "List<string>" }
      - { name: Stats, type: "Dict<string,int>" }
      - { name: Position, type: "Array<float;3>" }
      - { name: Weapon, type: "Weapon?" }
      - { name: Locked, type: bool, overridable: false }
      - { name: Notes, type: "List<string>", identifiable_items: false }
      - { name: Allies, type: "List<Character>" }
      - { name: Target, type: "Character?" }
"#;

/// Registry built from [`SCHEMA_YAML`]
#[must_use]
pub fn fixture_registry() -> Arc<TypeRegistry> {
    Arc::new(TypeRegistry::from_yaml_str(SCHEMA_YAML).expect("fixture schema is valid"))
}

/// Deterministic item id
#[must_use]
pub fn item_id(n: u128) -> ItemId {
    ItemId::from_u128(n)
}

/// Deterministic object id
#[must_use]
pub fn object_id(n: u128) -> ObjectId {
    ObjectId::from_u128(n)
}

/// List value whose items carry the given ids
#[must_use]
pub fn list_with_ids(items: &[(u128, &str)]) -> Value {
    Value::List(
        items
            .iter()
            .map(|(id, value)| Item::with_id(item_id(*id), *value))
            .collect(),
    )
}

/// Character with a name and nothing else set
#[must_use]
pub fn character(name: &str) -> ObjectValue {
    ObjectValue::new("Character").with_member("Name", name)
}

/// Character with an inventory of `[1:"a", 2:"b"]`
#[must_use]
pub fn archetype() -> ObjectValue {
    character("Archetype")
        .with_member("Inventory", list_with_ids(&[(1, "a"), (2, "b")]))
        .with_member(
            "Stats",
            Value::Map(
                [
                    (Key::from("str"), Item::with_id(item_id(11), 5)),
                    (Key::from("dex"), Item::with_id(item_id(12), 3)),
                ]
                .into_iter()
                .collect(),
            ),
        )
}

static TRACING: Once = Once::new();

/// Route `tracing` output to the test harness (honours `RUST_LOG`)
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
