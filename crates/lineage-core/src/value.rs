//! Detached values
//!
//! [`Value`] is the plain-data form of anything stored in the graph. Values
//! go in through `set`/insert and come out of `get`. Container items carry
//! their [`ItemId`] when materialized from a graph, so a value read from one
//! place and written to another keeps its element identities.

use crate::ids::{ItemId, ObjectId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// A dictionary key
///
/// Dictionary keys are restricted to primitive kinds so they can be
/// hashed, ordered and written as text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Key {
    /// Boolean key
    Bool(bool),
    /// Integer key
    Int(i64),
    /// String key
    String(String),
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// Element of a list or dictionary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Identity of the element, if known
    pub id: Option<ItemId>,
    /// Element value
    pub value: Value,
}

impl Item {
    /// Element with no identity yet (one is assigned on insertion)
    #[inline]
    #[must_use]
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            id: None,
            value: value.into(),
        }
    }

    /// Element with an explicit identity
    #[inline]
    #[must_use]
    pub fn with_id(id: ItemId, value: impl Into<Value>) -> Self {
        Self {
            id: Some(id),
            value: value.into(),
        }
    }
}

/// Object instance: a type name, an optional identity and ordered members
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectValue {
    /// Runtime type name (must be registered)
    pub type_name: String,
    /// Identity, for objects other nodes may reference
    pub id: Option<ObjectId>,
    /// Member values in declaration order
    pub members: IndexMap<String, Value>,
}

impl ObjectValue {
    /// Empty object of the given type
    #[inline]
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id: None,
            members: IndexMap::new(),
        }
    }

    /// Set the identity
    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: ObjectId) -> Self {
        self.id = Some(id);
        self
    }

    /// Add or replace a member
    #[inline]
    #[must_use]
    pub fn with_member(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.members.insert(name.into(), value.into());
        self
    }

    /// Member value by name
    #[inline]
    #[must_use]
    pub fn member(&self, name: &str) -> Option<&Value> {
        self.members.get(name)
    }
}

/// Region of a document that could not be loaded
///
/// Kept verbatim so that re-saving reproduces the original text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnloadableValue {
    /// Type name found in the source, if any
    pub type_name: Option<String>,
    /// Original source text of the region
    pub raw: String,
    /// Why loading failed
    pub error: String,
}

/// Plain-data value
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    /// Absent value (nullable members, unset references)
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// String
    String(String),
    /// Object with members
    Object(ObjectValue),
    /// Ordered list (arrays and collections)
    List(Vec<Item>),
    /// Ordered dictionary
    Map(IndexMap<Key, Item>),
    /// Reference to an identifiable object, possibly in another document
    Reference(ObjectId),
    /// Placeholder for content that failed to load
    Unloadable(UnloadableValue),
}

impl Value {
    /// List from plain values (ids assigned on insertion)
    #[must_use]
    pub fn list<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::List(values.into_iter().map(Item::new).collect())
    }

    /// Dictionary from key/value pairs (ids assigned on insertion)
    #[must_use]
    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Key>,
        V: Into<Value>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), Item::new(v)))
                .collect(),
        )
    }

    /// Short name of the value's shape, for diagnostics
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Object(_) => "object",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Reference(_) => "reference",
            Self::Unloadable(_) => "unloadable",
        }
    }

    /// True for leaves with no addressable children
    #[inline]
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        !matches!(self, Self::Object(_) | Self::List(_) | Self::Map(_))
    }

    #[inline]
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectValue> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Items of a list, in order
    #[inline]
    #[must_use]
    pub fn as_list(&self) -> Option<&[Item]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Copy of this value with every item id cleared, recursively
    ///
    /// Useful to compare values regardless of element identity.
    #[must_use]
    pub fn without_ids(&self) -> Self {
        match self {
            Self::Object(o) => Self::Object(ObjectValue {
                type_name: o.type_name.clone(),
                id: o.id,
                members: o
                    .members
                    .iter()
                    .map(|(k, v)| (k.clone(), v.without_ids()))
                    .collect(),
            }),
            Self::List(items) => Self::List(
                items
                    .iter()
                    .map(|item| Item::new(item.value.without_ids()))
                    .collect(),
            ),
            Self::Map(entries) => Self::Map(
                entries
                    .iter()
                    .map(|(k, item)| (k.clone(), Item::new(item.value.without_ids())))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Item ids of a list or dictionary, in order (`None` entries skipped)
    #[must_use]
    pub fn item_ids(&self) -> Vec<ItemId> {
        match self {
            Self::List(items) => items.iter().filter_map(|i| i.id).collect(),
            Self::Map(entries) => entries.values().filter_map(|i| i.id).collect(),
            _ => Vec::new(),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<ObjectValue> for Value {
    fn from(value: ObjectValue) -> Self {
        Self::Object(value)
    }
}

impl From<UnloadableValue> for Value {
    fn from(value: UnloadableValue) -> Self {
        Self::Unloadable(value)
    }
}
