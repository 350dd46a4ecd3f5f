//! Lineage Graph
//!
//! Typed node graph with stable element identities.
//!
//! # Overview
//!
//! - **NodeGraph**: arena owning every node of one document, with a
//!   reconciling `set` and structural edits
//! - **ItemIdMap**: O(1) id ↔ position mapping per container
//! - **ReferenceTracker**: object and enumerable references, resolved by identity
//! - **Visitor protocol**: cycle-safe depth-first traversal
//!
//! The graph has a single writer. Readers that must not block the writer
//! take a [`NodeGraph::snapshot`].
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use lineage_core::{Item, MemberDescriptor, ObjectValue, TypeDescriptor, TypeRegistry, Value};
//! use lineage_graph::NodeGraph;
//!
//! let mut registry = TypeRegistry::new();
//! registry
//!     .register(TypeDescriptor::object("Bag").member(MemberDescriptor::new("Items", "List<string>")))
//!     .unwrap();
//!
//! let mut graph = NodeGraph::new(Arc::new(registry), ObjectValue::new("Bag")).unwrap();
//! let items = graph.resolve(&"Items".parse().unwrap()).unwrap();
//! let id = graph.insert_item(items, 0, Item::new("apple")).unwrap();
//! assert_eq!(graph.item_ids(items).unwrap().lookup(id).unwrap(), 0);
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod graph;
pub mod item_ids;
pub mod node;
pub mod reference;
pub mod visitor;

// Re-exports
pub use error::GraphError;
pub use graph::{NodeGraph, RemovedItem};
pub use item_ids::{ItemIdMap, ItemIdentifiers};
pub use node::{Content, GraphListener, Node, NodeChange, NodeFlags, NodeId, NodeKind};
pub use reference::{
    EnumerableReference, ObjectReference, Reference, ReferenceTarget, ReferenceTracker,
};
pub use visitor::{reachable_targets, walk, GraphVisitor, VisitFlow, WalkOptions};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for graph operations
    pub use crate::{
        GraphError, GraphVisitor, NodeChange, NodeGraph, NodeId, NodeKind, Reference,
        ReferenceTarget, VisitFlow, WalkOptions,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
