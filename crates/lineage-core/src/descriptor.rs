//! Type descriptors and the type registry
//!
//! Every stored type is classified once into a closed [`DescriptorKind`] and
//! cached in a [`TypeRegistry`] as an `Arc<TypeDescriptor>`. The registry is
//! an explicit value handed to graph builders: there is no process-wide
//! registration.
//!
//! Member type names are type expressions:
//!
//! | Expression | Kind |
//! |---|---|
//! | `bool`, `int`, `float`, `string` | primitive |
//! | `any` | custom (opaque leaf) |
//! | `Name` | registered object type |
//! | `T?` | nullable |
//! | `List<T>` | collection |
//! | `Array<T;N>` | fixed-size array |
//! | `Dict<K,V>` | dictionary (`K` must be primitive) |
//!
//! Composite expressions are registered on first use.

use crate::value::{Key, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Primitive value kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    Bool,
    Int,
    Float,
    String,
}

impl PrimitiveKind {
    /// Type expression name
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "bool" => Some(Self::Bool),
            "int" => Some(Self::Int),
            "float" => Some(Self::Float),
            "string" => Some(Self::String),
            _ => None,
        }
    }

    /// Zero value for this kind
    #[must_use]
    pub fn zero(self) -> Value {
        match self {
            Self::Bool => Value::Bool(false),
            Self::Int => Value::Int(0),
            Self::Float => Value::Float(0.0),
            Self::String => Value::String(String::new()),
        }
    }

    /// Whether `value` has this kind
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Self::Bool, Value::Bool(_))
                | (Self::Int, Value::Int(_))
                | (Self::Float, Value::Float(_))
                | (Self::String, Value::String(_))
        )
    }

    /// Whether `key` has this kind
    #[must_use]
    pub fn accepts_key(self, key: &Key) -> bool {
        matches!(
            (self, key),
            (Self::Bool, Key::Bool(_)) | (Self::Int, Key::Int(_)) | (Self::String, Key::String(_))
        )
    }

    /// Parse key text according to this kind
    #[must_use]
    pub fn parse_key(self, text: &str) -> Option<Key> {
        match self {
            Self::Bool => text.parse().ok().map(Key::Bool),
            Self::Int => text.parse().ok().map(Key::Int),
            Self::String => Some(Key::String(text.to_string())),
            Self::Float => None,
        }
    }
}

/// Coarse classification, without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorCategory {
    Primitive,
    Array,
    Collection,
    Dictionary,
    Object,
    Nullable,
    Custom,
}

/// Declared member of an object type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberDescriptor {
    /// Member name (alphanumeric or underscore)
    pub name: String,
    /// Type expression
    #[serde(rename = "type")]
    pub type_name: String,
    /// Whether a derived document may override this member
    #[serde(default = "default_true")]
    pub overridable: bool,
    /// Whether collection items under this member carry persistent ids
    #[serde(default = "default_true")]
    pub identifiable_items: bool,
    /// Value used when the member is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

const fn default_true() -> bool {
    true
}

impl MemberDescriptor {
    /// New overridable member with identifiable items
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            overridable: true,
            identifiable_items: true,
            default: None,
        }
    }

    /// Mark as not overridable
    #[inline]
    #[must_use]
    pub fn non_overridable(mut self) -> Self {
        self.overridable = false;
        self
    }

    /// Mark collection items as non-identifiable
    #[inline]
    #[must_use]
    pub fn non_identifiable_items(mut self) -> Self {
        self.identifiable_items = false;
        self
    }

    /// Set the default value
    #[inline]
    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// Closed classification of a type
#[derive(Debug, Clone, PartialEq)]
pub enum DescriptorKind {
    /// Scalar leaf
    Primitive(PrimitiveKind),
    /// Fixed-length sequence
    Array { element: String, len: usize },
    /// Growable sequence
    Collection { element: String },
    /// Keyed, ordered entries
    Dictionary { key: PrimitiveKind, value: String },
    /// Named members; `members` includes inherited ones, base first
    Object {
        base: Option<String>,
        members: Vec<MemberDescriptor>,
    },
    /// Inner type or null
    Nullable { inner: String },
    /// Opaque leaf accepting any value
    Custom,
}

/// Descriptor of one registered type
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    name: String,
    kind: DescriptorKind,
}

impl TypeDescriptor {
    /// Descriptor with an explicit kind
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, kind: DescriptorKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Object type with no members yet
    #[inline]
    #[must_use]
    pub fn object(name: impl Into<String>) -> Self {
        Self::new(
            name,
            DescriptorKind::Object {
                base: None,
                members: Vec::new(),
            },
        )
    }

    /// Set the base type (object types only)
    #[must_use]
    pub fn extends(mut self, base_type: impl Into<String>) -> Self {
        if let DescriptorKind::Object { base, .. } = &mut self.kind {
            *base = Some(base_type.into());
        }
        self
    }

    /// Add a member (object types only)
    #[must_use]
    pub fn member(mut self, member: MemberDescriptor) -> Self {
        if let DescriptorKind::Object { members, .. } = &mut self.kind {
            members.push(member);
        }
        self
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> &DescriptorKind {
        &self.kind
    }

    /// Coarse category
    #[must_use]
    pub fn category(&self) -> DescriptorCategory {
        match self.kind {
            DescriptorKind::Primitive(_) => DescriptorCategory::Primitive,
            DescriptorKind::Array { .. } => DescriptorCategory::Array,
            DescriptorKind::Collection { .. } => DescriptorCategory::Collection,
            DescriptorKind::Dictionary { .. } => DescriptorCategory::Dictionary,
            DescriptorKind::Object { .. } => DescriptorCategory::Object,
            DescriptorKind::Nullable { .. } => DescriptorCategory::Nullable,
            DescriptorKind::Custom => DescriptorCategory::Custom,
        }
    }

    /// True for arrays, collections and dictionaries
    #[inline]
    #[must_use]
    pub fn is_container(&self) -> bool {
        matches!(
            self.kind,
            DescriptorKind::Array { .. }
                | DescriptorKind::Collection { .. }
                | DescriptorKind::Dictionary { .. }
        )
    }

    /// Element type of a container
    #[must_use]
    pub fn element_type(&self) -> Option<&str> {
        match &self.kind {
            DescriptorKind::Array { element, .. } | DescriptorKind::Collection { element } => {
                Some(element)
            }
            DescriptorKind::Dictionary { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Ordered members of an object type (empty otherwise)
    #[must_use]
    pub fn members(&self) -> &[MemberDescriptor] {
        match &self.kind {
            DescriptorKind::Object { members, .. } => members,
            _ => &[],
        }
    }

    /// Member by name
    #[must_use]
    pub fn find_member(&self, name: &str) -> Option<&MemberDescriptor> {
        self.members().iter().find(|m| m.name == name)
    }
}

/// Errors from the descriptor layer
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DescriptorError {
    /// Type name not registered
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// Type registered twice
    #[error("type already registered: {0}")]
    DuplicateType(String),

    /// Malformed type expression
    #[error("invalid type expression: '{0}'")]
    InvalidExpression(String),

    /// Base type missing or not an object
    #[error("invalid base '{base}' for type '{name}'")]
    InvalidBase { name: String, base: String },

    /// Schema text could not be parsed
    #[error("invalid schema: {0}")]
    Schema(String),

    /// Value does not fit the declared type
    #[error("type mismatch at '{at}': expected {expected}, found {found}")]
    TypeMismatch {
        expected: String,
        found: String,
        at: String,
    },
}

impl DescriptorError {
    fn mismatch(expected: impl Into<String>, found: impl Into<String>, at: &str) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
            at: if at.is_empty() { "<root>".into() } else { at.to_string() },
        }
    }
}

/// Explicit registry of type descriptors
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: HashMap<String, Arc<TypeDescriptor>>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Opaque type accepting any value
    pub const ANY: &'static str = "any";

    /// Registry holding the primitive types and `any`
    #[must_use]
    pub fn new() -> Self {
        let mut types = HashMap::new();
        for kind in [
            PrimitiveKind::Bool,
            PrimitiveKind::Int,
            PrimitiveKind::Float,
            PrimitiveKind::String,
        ] {
            types.insert(
                kind.name().to_string(),
                Arc::new(TypeDescriptor::new(kind.name(), DescriptorKind::Primitive(kind))),
            );
        }
        types.insert(
            Self::ANY.to_string(),
            Arc::new(TypeDescriptor::new(Self::ANY, DescriptorKind::Custom)),
        );
        Self { types }
    }

    /// Register a type
    ///
    /// Object types get their base members prepended (the base must already
    /// be registered) and every composite member type expression registered.
    ///
    /// # Errors
    /// - `DuplicateType` if the name is taken
    /// - `InvalidBase` if the base is missing or not an object
    /// - `InvalidExpression` for malformed member types
    pub fn register(
        &mut self,
        descriptor: TypeDescriptor,
    ) -> Result<Arc<TypeDescriptor>, DescriptorError> {
        if self.types.contains_key(&descriptor.name) {
            return Err(DescriptorError::DuplicateType(descriptor.name));
        }

        let TypeDescriptor { name, kind } = descriptor;
        let kind = match kind {
            DescriptorKind::Object { base, members } => {
                let mut all = match &base {
                    Some(base_name) => match self.types.get(base_name).map(|d| d.kind()) {
                        Some(DescriptorKind::Object { members, .. }) => members.clone(),
                        _ => {
                            return Err(DescriptorError::InvalidBase {
                                name,
                                base: base_name.clone(),
                            })
                        }
                    },
                    None => Vec::new(),
                };
                for member in members {
                    self.ensure(&member.type_name)?;
                    all.retain(|m| m.name != member.name);
                    all.push(member);
                }
                DescriptorKind::Object { base, members: all }
            }
            other => other,
        };

        let descriptor = Arc::new(TypeDescriptor { name: name.clone(), kind });
        self.types.insert(name, Arc::clone(&descriptor));
        Ok(descriptor)
    }

    /// Make sure a type expression is registered, returning its canonical name
    ///
    /// Named object types are not checked here, so types may refer to each
    /// other before both are registered.
    ///
    /// # Errors
    /// Returns `InvalidExpression` if the expression is malformed
    pub fn ensure(&mut self, expression: &str) -> Result<String, DescriptorError> {
        let expr = TypeExpr::parse(expression)?;
        Ok(self.ensure_expr(&expr))
    }

    fn ensure_expr(&mut self, expr: &TypeExpr) -> String {
        let name = expr.to_string();
        if self.types.contains_key(&name) {
            return name;
        }
        let kind = match expr {
            TypeExpr::Named(_) => return name,
            TypeExpr::Nullable(inner) => DescriptorKind::Nullable {
                inner: self.ensure_expr(inner),
            },
            TypeExpr::List(element) => DescriptorKind::Collection {
                element: self.ensure_expr(element),
            },
            TypeExpr::Array(element, len) => DescriptorKind::Array {
                element: self.ensure_expr(element),
                len: *len,
            },
            TypeExpr::Dict(key, value) => DescriptorKind::Dictionary {
                key: *key,
                value: self.ensure_expr(value),
            },
        };
        self.types
            .insert(name.clone(), Arc::new(TypeDescriptor::new(name.clone(), kind)));
        name
    }

    /// Look up a type by canonical name or expression
    ///
    /// # Errors
    /// Returns `UnknownType` if not registered
    pub fn get(&self, name: &str) -> Result<Arc<TypeDescriptor>, DescriptorError> {
        if let Some(d) = self.types.get(name) {
            return Ok(Arc::clone(d));
        }
        // Accept non-canonical spellings such as "List< string >"
        let canonical = TypeExpr::parse(name)?.to_string();
        self.types
            .get(&canonical)
            .cloned()
            .ok_or_else(|| DescriptorError::UnknownType(name.to_string()))
    }

    /// Whether a type is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_ok()
    }

    /// Number of registered types (primitives included)
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Whether an object of type `actual` may be stored where `declared` is expected
    #[must_use]
    pub fn is_assignable(&self, declared: &str, actual: &str) -> bool {
        let mut current = Some(actual.to_string());
        while let Some(name) = current {
            if name == declared {
                return true;
            }
            current = match self.types.get(&name).map(|d| d.kind()) {
                Some(DescriptorKind::Object { base, .. }) => base.clone(),
                _ => None,
            };
        }
        false
    }

    /// Value used for an absent member or a freshly created element
    ///
    /// Unregistered type expressions such as `Array<int;2>` are resolved
    /// structurally.
    #[must_use]
    pub fn default_value(&self, type_name: &str) -> Value {
        let Ok(descriptor) = self.get(type_name) else {
            return TypeExpr::parse(type_name).map_or(Value::Null, |expr| self.default_for_expr(&expr));
        };
        match descriptor.kind() {
            DescriptorKind::Primitive(kind) => kind.zero(),
            DescriptorKind::Array { element, len } => {
                Value::list((0..*len).map(|_| self.default_value(element)))
            }
            DescriptorKind::Collection { .. } => Value::List(Vec::new()),
            DescriptorKind::Dictionary { .. } => Value::Map(indexmap::IndexMap::new()),
            DescriptorKind::Object { .. }
            | DescriptorKind::Nullable { .. }
            | DescriptorKind::Custom => Value::Null,
        }
    }

    fn default_for_expr(&self, expr: &TypeExpr) -> Value {
        match expr {
            TypeExpr::Named(name) => PrimitiveKind::from_name(name).map_or(Value::Null, PrimitiveKind::zero),
            TypeExpr::Nullable(_) => Value::Null,
            TypeExpr::List(_) => Value::List(Vec::new()),
            TypeExpr::Array(element, len) => {
                let element = element.to_string();
                Value::list((0..*len).map(|_| self.default_value(&element)))
            }
            TypeExpr::Dict(..) => Value::Map(indexmap::IndexMap::new()),
        }
    }

    /// Check that `value` fits `type_name`, recursively
    ///
    /// Unloadable placeholders are accepted anywhere, including as members
    /// the object's type does not declare. References and null are accepted
    /// where an object is expected.
    ///
    /// # Errors
    /// Returns `TypeMismatch` naming the offending location, or
    /// `UnknownType` for unregistered types
    pub fn check(&self, type_name: &str, value: &Value) -> Result<(), DescriptorError> {
        self.check_at(type_name, value, "")
    }

    fn check_at(&self, type_name: &str, value: &Value, at: &str) -> Result<(), DescriptorError> {
        if matches!(value, Value::Unloadable(_)) {
            return Ok(());
        }
        let descriptor = self.get(type_name)?;
        match (descriptor.kind(), value) {
            (DescriptorKind::Custom, _) => Ok(()),
            (DescriptorKind::Primitive(kind), v) if kind.accepts(v) => Ok(()),
            (DescriptorKind::Nullable { .. }, Value::Null) => Ok(()),
            (DescriptorKind::Nullable { inner }, v) => self.check_at(inner, v, at),
            (DescriptorKind::Object { .. }, Value::Null | Value::Reference(_)) => Ok(()),
            (DescriptorKind::Object { .. }, Value::Object(object)) => {
                if !self.is_assignable(type_name, &object.type_name) {
                    return Err(DescriptorError::mismatch(
                        type_name,
                        object.type_name.as_str(),
                        at,
                    ));
                }
                let actual = self.get(&object.type_name)?;
                for (name, member_value) in &object.members {
                    let Some(member) = actual.find_member(name) else {
                        // Undeclared members survive only as placeholders
                        if matches!(member_value, Value::Unloadable(_)) {
                            continue;
                        }
                        return Err(DescriptorError::mismatch(
                            format!("member of {}", object.type_name),
                            format!("unknown member '{name}'"),
                            at,
                        ));
                    };
                    self.check_at(&member.type_name, member_value, &join(at, name))?;
                }
                Ok(())
            }
            (DescriptorKind::Array { element, len }, Value::List(items)) => {
                if items.len() != *len {
                    return Err(DescriptorError::mismatch(
                        format!("{len} items"),
                        format!("{} items", items.len()),
                        at,
                    ));
                }
                for (i, item) in items.iter().enumerate() {
                    self.check_at(element, &item.value, &format!("{at}[{i}]"))?;
                }
                Ok(())
            }
            (DescriptorKind::Collection { element }, Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    self.check_at(element, &item.value, &format!("{at}[{i}]"))?;
                }
                Ok(())
            }
            (DescriptorKind::Dictionary { key, value: value_type }, Value::Map(entries)) => {
                for (k, item) in entries {
                    if !key.accepts_key(k) {
                        return Err(DescriptorError::mismatch(
                            format!("{} key", key.name()),
                            format!("key '{k}'"),
                            at,
                        ));
                    }
                    self.check_at(value_type, &item.value, &format!("{at}[{k}]"))?;
                }
                Ok(())
            }
            (_, v) => Err(DescriptorError::mismatch(type_name, v.kind_name(), at)),
        }
    }
}

fn join(at: &str, name: &str) -> String {
    if at.is_empty() {
        name.to_string()
    } else {
        format!("{at}.{name}")
    }
}

/// Parsed type expression
#[derive(Debug, Clone, PartialEq, Eq)]
enum TypeExpr {
    Named(String),
    Nullable(Box<TypeExpr>),
    List(Box<TypeExpr>),
    Array(Box<TypeExpr>, usize),
    Dict(PrimitiveKind, Box<TypeExpr>),
}

impl TypeExpr {
    fn parse(text: &str) -> Result<Self, DescriptorError> {
        let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        let mut parser = ExprParser {
            input: compact.as_bytes(),
            pos: 0,
        };
        let expr = parser
            .expr()
            .ok_or_else(|| DescriptorError::InvalidExpression(text.to_string()))?;
        if parser.pos != parser.input.len() {
            return Err(DescriptorError::InvalidExpression(text.to_string()));
        }
        Ok(expr)
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => write!(f, "{name}"),
            Self::Nullable(inner) => write!(f, "{inner}?"),
            Self::List(element) => write!(f, "List<{element}>"),
            Self::Array(element, len) => write!(f, "Array<{element};{len}>"),
            Self::Dict(key, value) => write!(f, "Dict<{},{value}>", key.name()),
        }
    }
}

struct ExprParser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl ExprParser<'_> {
    fn expr(&mut self) -> Option<TypeExpr> {
        let ident = self.ident()?;
        let mut expr = if self.eat(b'<') {
            match ident.as_str() {
                "List" => {
                    let element = self.expr()?;
                    TypeExpr::List(Box::new(element))
                }
                "Array" => {
                    let element = self.expr()?;
                    if !self.eat(b';') {
                        return None;
                    }
                    let len = self.number()?;
                    TypeExpr::Array(Box::new(element), len)
                }
                "Dict" => {
                    let key = PrimitiveKind::from_name(&self.ident()?)?;
                    if key == PrimitiveKind::Float || !self.eat(b',') {
                        return None;
                    }
                    let value = self.expr()?;
                    TypeExpr::Dict(key, Box::new(value))
                }
                _ => return None,
            }
        } else {
            TypeExpr::Named(ident)
        };
        if matches!(expr, TypeExpr::List(_) | TypeExpr::Array(..) | TypeExpr::Dict(..))
            && !self.eat(b'>')
        {
            return None;
        }
        while self.eat(b'?') {
            expr = TypeExpr::Nullable(Box::new(expr));
        }
        Some(expr)
    }

    fn ident(&mut self) -> Option<String> {
        let start = self.pos;
        while self
            .input
            .get(self.pos)
            .is_some_and(|c| c.is_ascii_alphanumeric() || *c == b'_' || *c == b'.')
        {
            self.pos += 1;
        }
        if start == self.pos {
            None
        } else {
            Some(String::from_utf8_lossy(&self.input[start..self.pos]).into_owned())
        }
    }

    fn number(&mut self) -> Option<usize> {
        let start = self.pos;
        while self.input.get(self.pos).is_some_and(u8::is_ascii_digit) {
            self.pos += 1;
        }
        std::str::from_utf8(&self.input[start..self.pos])
            .ok()?
            .parse()
            .ok()
    }

    fn eat(&mut self, c: u8) -> bool {
        if self.input.get(self.pos) == Some(&c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ObjectValue;

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry
            .register(
                TypeDescriptor::object("Entity")
                    .member(MemberDescriptor::new("Name", "string"))
                    .member(MemberDescriptor::new("Tags", "List<string>")),
            )
            .unwrap();
        registry
            .register(
                TypeDescriptor::object("Character")
                    .extends("Entity")
                    .member(MemberDescriptor::new("Health", "int").with_default(100))
                    .member(MemberDescriptor::new("Stats", "Dict<string, int>"))
                    .member(MemberDescriptor::new("Position", "Array<float;3>"))
                    .member(MemberDescriptor::new("Target", "Entity?")),
            )
            .unwrap();
        registry
    }

    #[test]
    fn primitives_are_preregistered() {
        let registry = TypeRegistry::new();
        assert_eq!(
            registry.get("int").unwrap().category(),
            DescriptorCategory::Primitive
        );
        assert_eq!(registry.get("any").unwrap().category(), DescriptorCategory::Custom);
    }

    #[test]
    fn composite_expressions_are_registered_on_use() {
        let registry = registry();
        let list = registry.get("List<string>").unwrap();
        assert_eq!(list.category(), DescriptorCategory::Collection);
        assert_eq!(list.element_type(), Some("string"));

        let dict = registry.get("Dict<string,int>").unwrap();
        assert!(matches!(
            dict.kind(),
            DescriptorKind::Dictionary { key: PrimitiveKind::String, .. }
        ));

        let array = registry.get("Array< float ; 3 >").unwrap();
        assert!(matches!(array.kind(), DescriptorKind::Array { len: 3, .. }));

        assert_eq!(
            registry.get("Entity?").unwrap().category(),
            DescriptorCategory::Nullable
        );
    }

    #[test]
    fn derived_types_inherit_members_base_first() {
        let registry = registry();
        let character = registry.get("Character").unwrap();
        let names: Vec<_> = character.members().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Name", "Tags", "Health", "Stats", "Position", "Target"]);
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = registry();
        let result = registry.register(TypeDescriptor::object("Entity"));
        assert!(matches!(result, Err(DescriptorError::DuplicateType(_))));
    }

    #[test]
    fn missing_base_fails() {
        let mut registry = TypeRegistry::new();
        let result = registry.register(TypeDescriptor::object("Orphan").extends("Nope"));
        assert!(matches!(result, Err(DescriptorError::InvalidBase { .. })));
    }

    #[test]
    fn invalid_expressions_are_rejected() {
        let mut registry = TypeRegistry::new();
        assert!(registry.ensure("List<string").is_err());
        assert!(registry.ensure("Dict<float,int>").is_err());
        assert!(registry.ensure("Array<int>").is_err());
        assert!(registry.ensure("").is_err());
    }

    #[test]
    fn assignability_follows_base_chain() {
        let registry = registry();
        assert!(registry.is_assignable("Entity", "Character"));
        assert!(registry.is_assignable("Character", "Character"));
        assert!(!registry.is_assignable("Character", "Entity"));
    }

    #[test]
    fn check_accepts_well_typed_object() {
        let registry = registry();
        let value = Value::Object(
            ObjectValue::new("Character")
                .with_member("Name", "hero")
                .with_member("Tags", Value::list(["a", "b"]))
                .with_member("Stats", Value::map([("str", 3)]))
                .with_member("Position", Value::list([0.0, 1.0, 2.0])),
        );
        assert!(registry.check("Entity", &value).is_ok());
    }

    #[test]
    fn check_reports_location_of_mismatch() {
        let registry = registry();
        let value = Value::Object(
            ObjectValue::new("Character").with_member("Tags", Value::list([Value::Int(1)])),
        );
        let err = registry.check("Character", &value).unwrap_err();
        match err {
            DescriptorError::TypeMismatch { at, .. } => assert_eq!(at, "Tags[0]"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn check_rejects_wrong_array_length() {
        let registry = registry();
        let value = Value::list([1.0]);
        assert!(registry.check("Array<float;3>", &value).is_err());
    }

    #[test]
    fn check_accepts_unloadable_anywhere() {
        let registry = registry();
        let value = Value::Unloadable(crate::value::UnloadableValue {
            type_name: None,
            raw: "???".into(),
            error: "bad".into(),
        });
        assert!(registry.check("int", &value).is_ok());

        let placeholder = ObjectValue::new("Entity").with_member("Mana", value);
        assert!(registry.check("Entity", &Value::Object(placeholder)).is_ok());
        let plain = ObjectValue::new("Entity").with_member("Mana", 3);
        assert!(registry.check("Entity", &Value::Object(plain)).is_err());
    }

    #[test]
    fn default_values() {
        let registry = registry();
        assert_eq!(registry.default_value("int"), Value::Int(0));
        assert_eq!(registry.default_value("Entity?"), Value::Null);
        assert_eq!(registry.default_value("Array<int;2>"), Value::list([0, 0]));
        assert_eq!(registry.default_value("Array<float;3>"), Value::list([0.0, 0.0, 0.0]));
        assert_eq!(registry.default_value("List<bool>"), Value::List(Vec::new()));
        assert_eq!(registry.default_value("Nope"), Value::Null);
        assert!(!registry.contains("Array<int;2>"));
    }
}
