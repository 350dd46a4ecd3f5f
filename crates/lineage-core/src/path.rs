//! Node paths for addressing within a document
//!
//! Provides [`NodePath`], a root-relative address of a node. Collection
//! elements are addressed by [`ItemId`] rather than position, so a path
//! recorded before a reorder still names the same element afterwards.
//!
//! Text form:
//! - `Name` member
//! - `[<32 hex>]` item by id
//! - `[#3]` element by position (arrays, non-identifiable collections)
//! - `{"key"}`, `{5}`, `{true}` dictionary entry by key
//!
//! e.g. `Inventory[0000000000000000000000000000002a].Name`

use crate::ids::ItemId;
use crate::value::Key;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// One step of a [`NodePath`]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Segment {
    /// Object member by name
    Member(String),
    /// Collection or dictionary element by identity
    Item(ItemId),
    /// Element by position
    Index(usize),
    /// Dictionary entry by key
    Key(Key),
}

impl Display for Segment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Member(name) => write!(f, "{name}"),
            Self::Item(id) => write!(f, "[{id}]"),
            Self::Index(i) => write!(f, "[#{i}]"),
            Self::Key(Key::String(s)) => write!(f, "{{\"{s}\"}}"),
            Self::Key(key) => write!(f, "{{{key}}}"),
        }
    }
}

/// Path within a document tree
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodePath(SmallVec<[Segment; 4]>);

impl NodePath {
    /// Empty path (root)
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(SmallVec::new())
    }

    /// Path from segments
    #[inline]
    #[must_use]
    pub fn new(segments: impl IntoIterator<Item = Segment>) -> Self {
        Self(segments.into_iter().collect())
    }

    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if path is empty (root)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parent path (if not root)
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].iter().cloned().collect()))
        }
    }

    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&Segment> {
        self.0.last()
    }

    /// Append a segment, returning new path
    #[must_use]
    pub fn child(&self, segment: Segment) -> Self {
        let mut new = self.clone();
        new.0.push(segment);
        new
    }

    /// Append a member segment
    #[inline]
    #[must_use]
    pub fn member(&self, name: impl Into<String>) -> Self {
        self.child(Segment::Member(name.into()))
    }

    /// Append an item segment
    #[inline]
    #[must_use]
    pub fn item(&self, id: ItemId) -> Self {
        self.child(Segment::Item(id))
    }

    /// Append an index segment
    #[inline]
    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        self.child(Segment::Index(index))
    }

    /// Append a key segment
    #[inline]
    #[must_use]
    pub fn key(&self, key: impl Into<Key>) -> Self {
        self.child(Segment::Key(key.into()))
    }

    /// Check if this path is a prefix of another
    #[inline]
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.0.len() <= other.0.len() && self.0[..] == other.0[..self.0.len()]
    }

    /// Strict prefix
    #[inline]
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        self.0.len() < other.0.len() && self.is_prefix_of(other)
    }

    /// Path relative to an ancestor
    ///
    /// # Errors
    /// Returns error if `self` is not a descendant of `ancestor`
    pub fn relative_to(&self, ancestor: &Self) -> Result<Self, PathError> {
        if !ancestor.is_prefix_of(self) {
            return Err(PathError::NotDescendant {
                path: self.to_string(),
                ancestor: ancestor.to_string(),
            });
        }
        Ok(Self(self.0[ancestor.0.len()..].iter().cloned().collect()))
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.0.iter()
    }
}

impl Display for NodePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 && matches!(segment, Segment::Member(_)) {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for NodePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut segments = SmallVec::new();
        let mut rest = s;
        let mut expect_member = true;

        while !rest.is_empty() {
            if let Some(tail) = rest.strip_prefix('[') {
                let end = tail.find(']').ok_or(PathError::Unterminated('['))?;
                let inner = &tail[..end];
                let segment = if let Some(index) = inner.strip_prefix('#') {
                    Segment::Index(
                        index
                            .parse()
                            .map_err(|_| PathError::InvalidSegment(inner.to_string()))?,
                    )
                } else {
                    Segment::Item(
                        inner
                            .parse()
                            .map_err(|_| PathError::InvalidSegment(inner.to_string()))?,
                    )
                };
                segments.push(segment);
                rest = &tail[end + 1..];
                expect_member = false;
            } else if let Some(tail) = rest.strip_prefix('{') {
                let end = tail.find('}').ok_or(PathError::Unterminated('{'))?;
                segments.push(Segment::Key(parse_key(&tail[..end])?));
                rest = &tail[end + 1..];
                expect_member = false;
            } else {
                let body = if expect_member {
                    rest
                } else {
                    rest.strip_prefix('.')
                        .ok_or_else(|| PathError::InvalidSegment(rest.to_string()))?
                };
                let end = body.find(|c: char| matches!(c, '.' | '[' | '{')).unwrap_or(body.len());
                let name = &body[..end];
                if name.is_empty() {
                    return Err(PathError::EmptySegment);
                }
                if name.contains(|c: char| !c.is_alphanumeric() && c != '_') {
                    return Err(PathError::InvalidSegment(name.to_string()));
                }
                segments.push(Segment::Member(name.to_string()));
                rest = &body[end..];
                expect_member = false;
            }
        }

        Ok(Self(segments))
    }
}

fn parse_key(text: &str) -> Result<Key, PathError> {
    if let Some(quoted) = text.strip_prefix('"') {
        return quoted
            .strip_suffix('"')
            .map(|s| Key::String(s.to_string()))
            .ok_or(PathError::Unterminated('"'));
    }
    match text {
        "true" => Ok(Key::Bool(true)),
        "false" => Ok(Key::Bool(false)),
        _ => text
            .parse()
            .map(Key::Int)
            .map_err(|_| PathError::InvalidSegment(text.to_string())),
    }
}

impl From<Vec<Segment>> for NodePath {
    fn from(segments: Vec<Segment>) -> Self {
        Self(SmallVec::from_vec(segments))
    }
}

impl Serialize for NodePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

impl<'de> Deserialize<'de> for NodePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<Segment>::deserialize(deserializer).map(Self::from)
    }
}

/// Errors related to node paths
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Empty segment in path
    #[error("path contains empty segment")]
    EmptySegment,

    /// Invalid segment text
    #[error("invalid segment: {0}")]
    InvalidSegment(String),

    /// Missing closing delimiter
    #[error("unterminated '{0}' in path")]
    Unterminated(char),

    /// Not a descendant path
    #[error("path '{path}' is not a descendant of '{ancestor}'")]
    NotDescendant { path: String, ancestor: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_root() {
        let path = NodePath::root();
        assert!(path.is_empty());
        assert!(path.parent().is_none());
        assert_eq!(path.to_string(), "");
    }

    #[test]
    fn path_builders_and_display() {
        let id = ItemId::from_u128(0x2a);
        let path = NodePath::root()
            .member("Inventory")
            .item(id)
            .member("Name");
        assert_eq!(
            path.to_string(),
            "Inventory[0000000000000000000000000000002a].Name"
        );
        assert_eq!(path.len(), 3);
    }

    #[test]
    fn path_parent() {
        let path = NodePath::root().member("a").index(2);
        assert_eq!(path.parent().unwrap(), NodePath::root().member("a"));
        assert_eq!(path.last(), Some(&Segment::Index(2)));
    }

    #[test]
    fn path_parse_all_segment_kinds() {
        let id = ItemId::from_u128(7);
        let text = format!("Stats{{\"str\"}}.Bonus[{id}][#1]{{-4}}{{true}}");
        let path: NodePath = text.parse().unwrap();
        assert_eq!(
            path.segments(),
            &[
                Segment::Member("Stats".into()),
                Segment::Key(Key::from("str")),
                Segment::Member("Bonus".into()),
                Segment::Item(id),
                Segment::Index(1),
                Segment::Key(Key::Int(-4)),
                Segment::Key(Key::Bool(true)),
            ]
        );
        assert_eq!(path.to_string(), text);
    }

    #[test]
    fn path_parse_empty() {
        let path: NodePath = "".parse().unwrap();
        assert!(path.is_empty());
    }

    #[test]
    fn path_parse_rejects_bad_input() {
        assert!(matches!("a..b".parse::<NodePath>(), Err(PathError::EmptySegment)));
        assert!(matches!(
            "a.b-c".parse::<NodePath>(),
            Err(PathError::InvalidSegment(_))
        ));
        assert!(matches!(
            "a[#1".parse::<NodePath>(),
            Err(PathError::Unterminated('['))
        ));
        assert!(matches!(
            "a[zz]".parse::<NodePath>(),
            Err(PathError::InvalidSegment(_))
        ));
    }

    #[test]
    fn path_prefix_and_relative() {
        let a: NodePath = "a.b".parse().unwrap();
        let b: NodePath = "a.b.c[#0]".parse().unwrap();
        assert!(a.is_prefix_of(&b));
        assert!(a.is_ancestor_of(&b));
        assert!(!a.is_ancestor_of(&a));
        assert_eq!(b.relative_to(&a).unwrap().to_string(), "c[#0]");
        assert!(matches!(
            a.relative_to(&b),
            Err(PathError::NotDescendant { .. })
        ));
    }
}
