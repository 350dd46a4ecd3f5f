//! Asset operations
//!
//! [`AssetOperation`] is the reversible record of one change to one
//! document. Operations are plain data addressed by document and
//! [`NodePath`], so they stay valid after the nodes they touched have been
//! rebuilt, and they serialize with serde.

use crate::overrides::OverrideCapture;
use lineage_core::{DocumentId, ItemId, Key, NodePath, OverrideState, Value};
use lineage_transactions::{DirtiableId, Operation};
use serde::{Deserialize, Serialize};

/// Value and override entries of a subtree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtreeState {
    /// Value, with element ids
    pub value: Value,
    /// Overrides and deletion records below the subtree root
    pub overrides: OverrideCapture,
}

/// Reversible change to one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum AssetOperation {
    /// Replace the value at a node
    SetValue {
        document: DocumentId,
        path: NodePath,
        old: SubtreeState,
        new: SubtreeState,
    },
    /// Insert an element
    InsertItem {
        document: DocumentId,
        container: NodePath,
        index: usize,
        key: Option<Key>,
        id: ItemId,
        state: SubtreeState,
        item_override: OverrideState,
        key_override: OverrideState,
    },
    /// Remove an element, optionally leaving a deletion record
    RemoveItem {
        document: DocumentId,
        container: NodePath,
        index: usize,
        key: Option<Key>,
        id: ItemId,
        state: SubtreeState,
        item_override: OverrideState,
        key_override: OverrideState,
        deleted: bool,
    },
    /// Move an element
    MoveItem {
        document: DocumentId,
        container: NodePath,
        id: ItemId,
        from: usize,
        to: usize,
    },
    /// Change a dictionary entry's key
    RenameKey {
        document: DocumentId,
        container: NodePath,
        id: ItemId,
        old: Key,
        new: Key,
    },
    /// Give an element the id of its base counterpart
    RemapItem {
        document: DocumentId,
        container: NodePath,
        old: ItemId,
        new: ItemId,
    },
    /// Change a member override
    SetOverride {
        document: DocumentId,
        path: NodePath,
        old: OverrideState,
        new: OverrideState,
    },
    /// Change an item override
    SetItemOverride {
        document: DocumentId,
        container: NodePath,
        id: ItemId,
        old: OverrideState,
        new: OverrideState,
    },
    /// Change a dictionary key override
    SetKeyOverride {
        document: DocumentId,
        container: NodePath,
        id: ItemId,
        old: OverrideState,
        new: OverrideState,
    },
    /// Add or drop a deletion record
    SetDeleted {
        document: DocumentId,
        container: NodePath,
        id: ItemId,
        deleted: bool,
    },
}

impl AssetOperation {
    /// Document the operation applies to
    #[must_use]
    pub fn document(&self) -> DocumentId {
        match self {
            Self::SetValue { document, .. }
            | Self::InsertItem { document, .. }
            | Self::RemoveItem { document, .. }
            | Self::MoveItem { document, .. }
            | Self::RenameKey { document, .. }
            | Self::RemapItem { document, .. }
            | Self::SetOverride { document, .. }
            | Self::SetItemOverride { document, .. }
            | Self::SetKeyOverride { document, .. }
            | Self::SetDeleted { document, .. } => *document,
        }
    }

    /// Short name, for logs
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetValue { .. } => "set_value",
            Self::InsertItem { .. } => "insert_item",
            Self::RemoveItem { .. } => "remove_item",
            Self::MoveItem { .. } => "move_item",
            Self::RenameKey { .. } => "rename_key",
            Self::RemapItem { .. } => "remap_item",
            Self::SetOverride { .. } => "set_override",
            Self::SetItemOverride { .. } => "set_item_override",
            Self::SetKeyOverride { .. } => "set_key_override",
            Self::SetDeleted { .. } => "set_deleted",
        }
    }

    /// True for operations that only touch override bookkeeping
    #[must_use]
    pub fn is_override_change(&self) -> bool {
        matches!(
            self,
            Self::SetOverride { .. }
                | Self::SetItemOverride { .. }
                | Self::SetKeyOverride { .. }
                | Self::SetDeleted { .. }
        )
    }
}

/// Dirtiable id of a document
#[inline]
#[must_use]
pub fn document_dirtiable(document: DocumentId) -> DirtiableId {
    DirtiableId::new(document.as_uuid().as_u128())
}

impl Operation for AssetOperation {
    fn dirtiables(&self) -> Vec<DirtiableId> {
        vec![document_dirtiable(self.document())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineage_test_utils::item_id;

    #[test]
    fn dirtiable_follows_document() {
        let document = DocumentId::from_u128(42);
        let op = AssetOperation::SetDeleted {
            document,
            container: "Inventory".parse().unwrap(),
            id: item_id(1),
            deleted: true,
        };
        assert_eq!(op.dirtiables(), vec![DirtiableId::new(42)]);
        assert!(op.is_override_change());
        assert_eq!(op.name(), "set_deleted");
    }

    #[test]
    fn operations_serialize_as_tagged_data() {
        let op = AssetOperation::MoveItem {
            document: DocumentId::from_u128(1),
            container: "Inventory".parse().unwrap(),
            id: item_id(2),
            from: 1,
            to: 0,
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["op"], "move_item");
        let back: AssetOperation = serde_json::from_value(json).unwrap();
        assert_eq!(back, op);
    }
}
