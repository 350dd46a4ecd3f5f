//! Lineage Core
//!
//! Pure data layer of the lineage object graph.
//!
//! # Overview
//!
//! - **Identifiers**: [`ItemId`], [`ObjectId`], [`DocumentId`]
//! - **Values**: [`Value`], the detached plain-data form of graph content
//! - **Descriptors**: [`TypeRegistry`] classifying every type into a closed [`DescriptorKind`]
//! - **Paths**: [`NodePath`], identity-based addresses inside a document
//! - **Overrides**: [`OverrideState`] flags and their persisted markers
//!
//! # Example
//!
//! ```rust
//! use lineage_core::{MemberDescriptor, ObjectValue, TypeDescriptor, TypeRegistry, Value};
//!
//! let mut registry = TypeRegistry::new();
//! registry
//!     .register(
//!         TypeDescriptor::object("Item")
//!             .member(MemberDescriptor::new("Name", "string"))
//!             .member(MemberDescriptor::new("Tags", "List<string>")),
//!     )
//!     .unwrap();
//!
//! let value = Value::Object(ObjectValue::new("Item").with_member("Name", "sword"));
//! assert!(registry.check("Item", &value).is_ok());
//! ```

#![warn(missing_docs)]

pub mod descriptor;
pub mod ids;
pub mod override_state;
pub mod path;
pub mod schema;
pub mod value;

// Re-exports
pub use descriptor::{
    DescriptorCategory, DescriptorError, DescriptorKind, MemberDescriptor, PrimitiveKind,
    TypeDescriptor, TypeRegistry,
};
pub use ids::{DocumentId, IdError, ItemId, ObjectId};
pub use override_state::OverrideState;
pub use path::{NodePath, PathError, Segment};
pub use value::{Item, Key, ObjectValue, UnloadableValue, Value};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with values and descriptors
    pub use crate::{
        DescriptorKind, DocumentId, Item, ItemId, Key, MemberDescriptor, NodePath, ObjectId,
        ObjectValue, OverrideState, Segment, TypeDescriptor, TypeRegistry, Value,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
