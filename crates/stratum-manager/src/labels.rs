use std::collections::HashMap;

use stratum_domain::{AttributeType, AttributeValue, ClassRegistry, LocalHandle, PluginResource, RecordId};
use stratum_store::{ResourceAttribute, StateStore};

use crate::error::ManagerError;
use crate::manager::Inner;

/// Decode one stored attribute value back into the `AttributeValue` variant
/// its class declares for `key`, rather than the catch-all `Serialized`
/// the raw JSON arrived as. Falls back to `Serialized` when the class has
/// no declaration for `key` or declares it `AttributeType::Serialized`, so
/// attributes outside the descriptor schema still round-trip.
fn decode_attribute(
    registry: &ClassRegistry,
    class_id: stratum_domain::ClassId,
    key: &str,
    value: serde_json::Value,
) -> AttributeValue {
    let declared = registry
        .descriptor(class_id)
        .and_then(|d| d.attributes.iter().find(|(name, _)| *name == key).map(|(_, ty)| *ty));

    match declared {
        Some(AttributeType::Integer) => value
            .as_i64()
            .map(AttributeValue::Integer)
            .unwrap_or(AttributeValue::Serialized(value)),
        Some(AttributeType::String) => value
            .as_str()
            .map(|s| AttributeValue::StringV(s.to_string()))
            .unwrap_or(AttributeValue::Serialized(value)),
        Some(AttributeType::Bytes) => serde_json::from_value::<Vec<u8>>(value.clone())
            .map(AttributeValue::Bytes)
            .unwrap_or(AttributeValue::Serialized(value)),
        Some(AttributeType::Uuid) => value
            .as_str()
            .and_then(|s| s.parse().ok())
            .map(AttributeValue::Uuid)
            .unwrap_or(AttributeValue::Serialized(value)),
        Some(AttributeType::PosixPath) => value
            .as_str()
            .map(|s| AttributeValue::PosixPath(std::path::PathBuf::from(s)))
            .unwrap_or(AttributeValue::Serialized(value)),
        Some(AttributeType::ResourceReference) | Some(AttributeType::Serialized) | None => {
            AttributeValue::Serialized(value)
        }
    }
}

/// Rebuild a `PluginResource` view of a persisted record from its stored
/// attributes — used when no in-memory copy of the plugin's original
/// report survives (label fallback, startup index rebuild). Attribute
/// values are decoded back into their class-declared `AttributeType` so
/// `label_fn`/`value_fn` implementations reading via `.as_str()`/`.as_path()`/
/// `.as_integer()` see the same variant shape they would from a live report.
pub fn reconstruct_resource(
    registry: &ClassRegistry,
    store: &dyn StateStore,
    record: &stratum_store::StorageResourceRecord,
) -> Result<PluginResource, ManagerError> {
    let mut attributes = HashMap::new();
    for attr in store.attributes_of(record.id)? {
        match attr {
            ResourceAttribute::Serialized { key, value, .. } => {
                let decoded = decode_attribute(registry, record.resource_class_id, &key, value);
                attributes.insert(key, decoded);
            }
            ResourceAttribute::Reference { key, value_id, .. } => {
                attributes.insert(key, AttributeValue::Reference(value_id));
            }
        }
    }

    Ok(PluginResource {
        class_id: record.resource_class_id,
        handle: LocalHandle::new(record.storage_id_str.clone()),
        id_tuple: Vec::new(),
        attributes,
        parents: Vec::new(),
        handle_global: false,
    })
}

/// Look up a resource's display label, preferring `label_cache` and
/// falling back to reconstructing the resource from its stored attributes
/// and invoking its class's `label_fn` — rather than erroring, matching
/// the original `get_label()`'s fallback behaviour.
pub fn get_label(inner: &mut Inner, record_id: RecordId) -> Result<String, ManagerError> {
    if let Some(label) = inner.label_cache.get(&record_id) {
        return Ok(label.clone());
    }

    let record = inner
        .store
        .get_record(record_id)?
        .ok_or(ManagerError::UnknownResource(record_id))?;
    let descriptor = inner
        .registry
        .descriptor(record.resource_class_id)
        .ok_or(ManagerError::UnknownResource(record_id))?;

    let resource = reconstruct_resource(inner.registry.as_ref(), inner.store.as_ref(), &record)?;
    let label = (descriptor.label_fn)(&resource);
    inner.label_cache.insert(record_id, label.clone());
    Ok(label)
}
