//! Nodes and node identities
//!
//! A node is one addressable location: the document root, an object member,
//! or an element of a collection or dictionary. Nodes live in the
//! [`NodeGraph`](crate::NodeGraph) arena and are addressed by [`NodeId`].

use indexmap::IndexMap;
use lineage_core::{ItemId, ObjectId, Value};
use std::fmt::{self, Display, Formatter};

/// Generational arena handle
///
/// A handle to a destroyed node never aliases a newer node in the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl NodeId {
    /// Slot index
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Slot generation
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Closed set of node kinds
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Document root
    Object,
    /// Named member of an object
    Member { name: String },
    /// Element of an array or collection
    CollectionItem { id: ItemId },
    /// Entry of a dictionary
    DictionaryEntry { id: ItemId },
}

impl NodeKind {
    /// Item id for element kinds
    #[inline]
    #[must_use]
    pub fn item_id(&self) -> Option<ItemId> {
        match self {
            Self::CollectionItem { id } | Self::DictionaryEntry { id } => Some(*id),
            _ => None,
        }
    }
}

/// What a node currently holds
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// Primitive, null, reference, unloadable or custom value
    Leaf(Value),
    /// Object with member nodes in declaration order
    Object {
        type_name: String,
        id: Option<ObjectId>,
        members: IndexMap<String, NodeId>,
    },
    /// Array or collection elements in order
    Sequence(Vec<NodeId>),
    /// Dictionary entries in order (keys live in the item identifiers)
    Map(Vec<NodeId>),
}

/// Attributes inherited from the declaring member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeFlags {
    /// Member may be overridden in derived documents
    pub overridable: bool,
    /// Collection elements below carry persistent ids
    pub identifiable_items: bool,
}

impl Default for NodeFlags {
    fn default() -> Self {
        Self {
            overridable: true,
            identifiable_items: true,
        }
    }
}

/// One location in the graph
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) type_name: String,
    pub(crate) flags: NodeFlags,
    pub(crate) content: Content,
}

impl Node {
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Parent node; lookup only, the parent owns this node
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Declared type expression
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    #[inline]
    #[must_use]
    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    #[inline]
    #[must_use]
    pub fn content(&self) -> &Content {
        &self.content
    }

    /// Sequence or map node
    #[inline]
    #[must_use]
    pub fn is_container(&self) -> bool {
        matches!(self.content, Content::Sequence(_) | Content::Map(_))
    }

    /// Dictionary node
    #[inline]
    #[must_use]
    pub fn is_dictionary(&self) -> bool {
        matches!(self.content, Content::Map(_))
    }

    /// Runtime type and identity of an object node
    #[must_use]
    pub fn object(&self) -> Option<(&str, Option<ObjectId>)> {
        match &self.content {
            Content::Object { type_name, id, .. } => Some((type_name, *id)),
            _ => None,
        }
    }

    /// Child nodes in order
    #[must_use]
    pub fn child_ids(&self) -> Vec<NodeId> {
        match &self.content {
            Content::Leaf(_) => Vec::new(),
            Content::Object { members, .. } => members.values().copied().collect(),
            Content::Sequence(items) | Content::Map(items) => items.clone(),
        }
    }
}

/// Change notification
#[derive(Debug, Clone, PartialEq)]
pub enum NodeChange {
    /// Node value replaced or updated in place
    ValueChanged { node: NodeId },
    /// Element inserted
    ItemInserted {
        container: NodeId,
        id: ItemId,
        index: usize,
    },
    /// Element removed
    ItemRemoved {
        container: NodeId,
        id: ItemId,
        index: usize,
    },
    /// Element moved
    ItemMoved {
        container: NodeId,
        id: ItemId,
        from: usize,
        to: usize,
    },
    /// Dictionary key renamed or element id remapped
    ItemRenamed { container: NodeId, id: ItemId },
    /// Node freed; `item` is set for elements
    Destroyed {
        node: NodeId,
        parent: Option<NodeId>,
        item: Option<ItemId>,
    },
}

/// Subscriber to graph changes
pub trait GraphListener: Send + Sync {
    /// Called after each change
    fn on_change(&self, change: &NodeChange);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_display() {
        let id = NodeId {
            index: 3,
            generation: 1,
        };
        assert_eq!(id.to_string(), "#3v1");
    }

    #[test]
    fn kind_item_id() {
        let id = ItemId::new();
        assert_eq!(NodeKind::CollectionItem { id }.item_id(), Some(id));
        assert_eq!(NodeKind::Member { name: "a".into() }.item_id(), None);
    }
}
