//! YAML type schemas
//!
//! Loads a [`TypeRegistry`] from text such as:
//!
//! ```yaml
//! types:
//!   - name: Entity
//!     members:
//!       - { name: Name, type: string }
//!       - { name: Tags, type: "List<string>" }
//!   - name: Character
//!     base: Entity
//!     members:
//!       - { name: Health, type: int, default: 100 }
//!       - { name: Id, type: string, overridable: false }
//! ```
//!
//! Types may be listed in any order; bases are registered first.

use crate::descriptor::{DescriptorError, MemberDescriptor, TypeDescriptor, TypeRegistry};
use crate::value::Value;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct SchemaFile {
    #[serde(default)]
    types: Vec<SchemaType>,
}

#[derive(Debug, Deserialize)]
struct SchemaType {
    name: String,
    #[serde(default)]
    base: Option<String>,
    #[serde(default)]
    members: Vec<SchemaMember>,
}

#[derive(Debug, Deserialize)]
struct SchemaMember {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default = "default_true")]
    overridable: bool,
    #[serde(default = "default_true")]
    identifiable_items: bool,
    #[serde(default)]
    default: Option<serde_yaml::Value>,
}

const fn default_true() -> bool {
    true
}

fn scalar(value: &serde_yaml::Value) -> Result<Value, DescriptorError> {
    match value {
        serde_yaml::Value::Null => Ok(Value::Null),
        serde_yaml::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_yaml::Value::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .or_else(|| n.as_f64().map(Value::Float))
            .ok_or_else(|| DescriptorError::Schema(format!("unsupported number {n}"))),
        serde_yaml::Value::String(s) => Ok(Value::String(s.clone())),
        other => Err(DescriptorError::Schema(format!(
            "member defaults must be scalars, found {other:?}"
        ))),
    }
}

impl TypeRegistry {
    /// Build a registry from a YAML schema
    ///
    /// # Errors
    /// - `Schema` for malformed YAML, scalar-less defaults or unresolvable bases
    /// - any registration error
    pub fn from_yaml_str(text: &str) -> Result<Self, DescriptorError> {
        let file: SchemaFile =
            serde_yaml::from_str(text).map_err(|e| DescriptorError::Schema(e.to_string()))?;

        let mut registry = Self::new();
        let mut pending = file.types;

        while !pending.is_empty() {
            let before = pending.len();
            let mut deferred = Vec::new();

            for ty in pending {
                let ready = ty
                    .base
                    .as_deref()
                    .map_or(true, |base| registry.contains(base));
                if !ready {
                    deferred.push(ty);
                    continue;
                }

                let mut descriptor = TypeDescriptor::object(&ty.name);
                if let Some(base) = &ty.base {
                    descriptor = descriptor.extends(base);
                }
                for m in &ty.members {
                    let mut member = MemberDescriptor::new(&m.name, &m.type_name);
                    member.overridable = m.overridable;
                    member.identifiable_items = m.identifiable_items;
                    member.default = m.default.as_ref().map(scalar).transpose()?;
                    descriptor = descriptor.member(member);
                }
                registry.register(descriptor)?;
            }

            if deferred.len() == before {
                let names: Vec<_> = deferred.iter().map(|t| t.name.as_str()).collect();
                return Err(DescriptorError::Schema(format!(
                    "unresolvable base types for: {}",
                    names.join(", ")
                )));
            }
            pending = deferred;
        }

        Ok(registry)
    }
}
