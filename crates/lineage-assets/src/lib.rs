//! Lineage Assets
//!
//! Inheritance-aware asset documents.
//!
//! # Overview
//!
//! - **AssetPropertyGraph**: one document's node graph plus the override
//!   state of every member, element and dictionary key
//! - **Propagation**: base → derived synchronization that respects `NEW`
//!   and `SEALED` overrides and deletion records
//! - **AssetOperation**: reversible, serializable edit records
//! - **AssetSession**: documents, base relations, transactions, undo/redo
//!   and dirty tracking behind one owner
//!
//! # Example
//!
//! ```rust,ignore
//! use lineage_assets::{AssetSession, SessionConfig};
//!
//! let mut session = AssetSession::new(registry, SessionConfig::default());
//! session.create_document(base_id, base_root, None)?;
//! session.create_document(derived_id, derived_root, Some(base_id))?;
//!
//! // Base edits reach the derived document on commit
//! session.set_value(base_id, &"Health".parse()?, Value::Int(80))?;
//! session.undo()?;
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod operation;
pub mod overrides;
pub mod propagation;
pub mod property_graph;
pub mod registry;
pub mod session;

// Re-exports
pub use config::SessionConfig;
pub use error::AssetError;
pub use operation::{document_dirtiable, AssetOperation, SubtreeState};
pub use overrides::{OverrideCapture, OverrideTracker};
pub use propagation::SyncReport;
pub use property_graph::AssetPropertyGraph;
pub use registry::DocumentRegistry;
pub use session::AssetSession;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for asset editing
    pub use crate::{
        AssetError, AssetOperation, AssetPropertyGraph, AssetSession, SessionConfig, SyncReport,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
