use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ids::{ClassId, LocalHandle, RecordId};

/// Whether a resource's identity is unique only within its scannable
/// (`scoped`) or across the whole fleet (`global`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdKind {
    Scoped,
    Global,
}

/// Declared type of a resource attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeType {
    Integer,
    String,
    Bytes,
    Uuid,
    PosixPath,
    ResourceReference,
    Serialized,
}

/// A plugin-reported attribute value, as it arrives over the wire before
/// local references have been resolved to global record ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Integer(i64),
    StringV(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    PosixPath(PathBuf),
    /// Reference to another resource within the same plugin session,
    /// carried by local handle until `_persist_new_resources` resolves it.
    ReferenceLocal(LocalHandle),
    /// Reference already resolved to a persisted record id (used for
    /// cross-session/global references, and internally once resolved).
    Reference(RecordId),
    Serialized(serde_json::Value),
}

impl AttributeValue {
    pub fn attribute_type(&self) -> AttributeType {
        match self {
            AttributeValue::Integer(_) => AttributeType::Integer,
            AttributeValue::StringV(_) => AttributeType::String,
            AttributeValue::Bytes(_) => AttributeType::Bytes,
            AttributeValue::Uuid(_) => AttributeType::Uuid,
            AttributeValue::PosixPath(_) => AttributeType::PosixPath,
            AttributeValue::ReferenceLocal(_) | AttributeValue::Reference(_) => {
                AttributeType::ResourceReference
            }
            AttributeValue::Serialized(_) => AttributeType::Serialized,
        }
    }

    /// Renders this value for embedding in a canonical id-tuple JSON string.
    /// References must already be resolved (`Reference`, not `ReferenceLocal`)
    /// by the time this is called.
    pub fn to_json_value(&self) -> serde_json::Value {
        match self {
            AttributeValue::Integer(i) => serde_json::json!(i),
            AttributeValue::StringV(s) => serde_json::json!(s),
            AttributeValue::Bytes(b) => serde_json::json!(b),
            AttributeValue::Uuid(u) => serde_json::json!(u.to_string()),
            AttributeValue::PosixPath(p) => serde_json::json!(p.to_string_lossy()),
            AttributeValue::Reference(id) => serde_json::json!(id.0),
            AttributeValue::ReferenceLocal(h) => serde_json::json!(h.0),
            AttributeValue::Serialized(v) => v.clone(),
        }
    }

    pub fn as_record_id(&self) -> Option<RecordId> {
        match self {
            AttributeValue::Reference(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_local_handle(&self) -> Option<&LocalHandle> {
        match self {
            AttributeValue::ReferenceLocal(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::StringV(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&std::path::Path> {
        match self {
            AttributeValue::PosixPath(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

/// The wire shape a plugin reports for one resource instance (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginResource {
    pub class_id: ClassId,
    pub handle: LocalHandle,
    pub id_tuple: Vec<AttributeValue>,
    pub attributes: HashMap<String, AttributeValue>,
    pub parents: Vec<LocalHandle>,
    /// True if this resource was reported as already belonging to a
    /// *different* session (a cross-session global reference) — such
    /// resources are skipped by identity/creation (§4.6 step 1).
    pub handle_global: bool,
}

impl PluginResource {
    pub fn new(class_id: ClassId, handle: LocalHandle, id_tuple: Vec<AttributeValue>) -> Self {
        Self {
            class_id,
            handle,
            id_tuple,
            attributes: HashMap::new(),
            parents: Vec::new(),
            handle_global: false,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_parent(mut self, parent: LocalHandle) -> Self {
        self.parents.push(parent);
        self
    }
}

/// One sample forwarded to `session_get_stats` (§4.5). Timestamping is the
/// caller's responsibility (`stratum-manager` stamps with `chrono::Utc::now()`
/// on ingestion); this crate stays time-library agnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatSample {
    pub name: String,
    pub sample_period: u32,
    pub value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_type_matches_variant() {
        assert_eq!(
            AttributeValue::Integer(3).attribute_type(),
            AttributeType::Integer
        );
        assert_eq!(
            AttributeValue::Reference(RecordId(1)).attribute_type(),
            AttributeType::ResourceReference
        );
        assert_eq!(
            AttributeValue::ReferenceLocal(LocalHandle::new("h1")).attribute_type(),
            AttributeType::ResourceReference
        );
    }

    #[test]
    fn json_rendering_of_reference_uses_resolved_id() {
        let v = AttributeValue::Reference(RecordId(42));
        assert_eq!(v.to_json_value(), serde_json::json!(42));
    }

    #[test]
    fn plugin_resource_builder() {
        let r = PluginResource::new(ClassId(1), LocalHandle::new("h"), vec![])
            .with_attribute("size", AttributeValue::Integer(100))
            .with_parent(LocalHandle::new("p"));
        assert_eq!(r.attributes.len(), 1);
        assert_eq!(r.parents.len(), 1);
    }
}
