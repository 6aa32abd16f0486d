use std::collections::{HashMap, HashSet};

use stratum_domain::{ClassRegistry, PluginResource, RecordId};

/// Provider/subscriber multimap keyed by `(subscription_key, value)` (§4.3).
///
/// Mirrors the source's dependency-injection mechanism: a class declares
/// `Subscribe(key, other_class, value_fn)`; at populate time every resource
/// of `other_class` becomes a *provider* of `(key, value_fn(resource))`,
/// and every resource whose own `value_fn` on that key matches becomes a
/// *subscriber* to the same key/value pair.
#[derive(Debug, Default)]
pub struct SubscriberIndex {
    providers: HashMap<(String, String), HashSet<RecordId>>,
    subscribers: HashMap<(String, String), HashSet<RecordId>>,
}

impl SubscriberIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn what_provides(&self, key: &str, value: &str) -> Vec<RecordId> {
        self.providers
            .get(&(key.to_string(), value.to_string()))
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn what_subscribes(&self, key: &str, value: &str) -> Vec<RecordId> {
        self.subscribers
            .get(&(key.to_string(), value.to_string()))
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Index `resource` as both a potential provider (if its class is the
    /// `subscribe_to` target of some relation) and a subscriber (using its
    /// own declared subscriptions) against `registry`.
    pub fn add_resource(&mut self, registry: &ClassRegistry, record_id: RecordId, resource: &PluginResource) {
        for (_, descriptor) in registry.iter() {
            for sub in descriptor.subscriptions() {
                if sub.subscribe_to == resource.class_id {
                    let value = (sub.value_fn)(resource);
                    self.providers
                        .entry((sub.key.to_string(), value))
                        .or_default()
                        .insert(record_id);
                }
            }
        }
        if let Some(descriptor) = registry.descriptor(resource.class_id) {
            for sub in descriptor.subscriptions() {
                let value = (sub.value_fn)(resource);
                self.subscribers
                    .entry((sub.key.to_string(), value))
                    .or_default()
                    .insert(record_id);
            }
        }
    }

    pub fn remove_resource(&mut self, record_id: RecordId) {
        for set in self.providers.values_mut() {
            set.remove(&record_id);
        }
        for set in self.subscribers.values_mut() {
            set.remove(&record_id);
        }
    }

    pub fn populate<'a, I>(&mut self, registry: &ClassRegistry, records: I)
    where
        I: IntoIterator<Item = (RecordId, &'a PluginResource)>,
    {
        for (record_id, resource) in records {
            self.add_resource(registry, record_id, resource);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_domain::{AttributeType, ClassId, IdKind, LocalHandle, ResourceClassDescriptor, ResourceMarkers, Subscription};

    fn serial_of(r: &PluginResource) -> String {
        r.handle.0.clone()
    }

    fn build_registry() -> ClassRegistry {
        let mut reg = ClassRegistry::new();
        reg.register(ResourceClassDescriptor {
            class_id: ClassId(1),
            name: "Controller",
            id_kind: IdKind::Global,
            id_fields: vec![],
            attributes: vec![],
            relations: vec![],
            label_fn: |_| "ctrl".into(),
            markers: ResourceMarkers::default(),
        });
        reg.register(ResourceClassDescriptor {
            class_id: ClassId(2),
            name: "Lun",
            id_kind: IdKind::Scoped,
            id_fields: vec![],
            attributes: vec![("serial", AttributeType::String)],
            relations: vec![Subscription {
                key: "serial",
                subscribe_to: ClassId(1),
                value_fn: serial_of,
            }],
            label_fn: |_| "lun".into(),
            markers: ResourceMarkers::default(),
        });
        reg
    }

    #[test]
    fn provider_and_subscriber_match_on_shared_value() {
        let reg = build_registry();
        let mut idx = SubscriberIndex::new();

        let controller = PluginResource::new(ClassId(1), LocalHandle::new("abc"), vec![]);
        idx.add_resource(&reg, RecordId(10), &controller);

        let lun = PluginResource::new(ClassId(2), LocalHandle::new("abc"), vec![]);
        idx.add_resource(&reg, RecordId(20), &lun);

        assert_eq!(idx.what_provides("serial", "abc"), vec![RecordId(10)]);
        assert_eq!(idx.what_subscribes("serial", "abc"), vec![RecordId(20)]);
    }

    #[test]
    fn remove_resource_clears_both_sides() {
        let reg = build_registry();
        let mut idx = SubscriberIndex::new();
        let controller = PluginResource::new(ClassId(1), LocalHandle::new("abc"), vec![]);
        idx.add_resource(&reg, RecordId(10), &controller);
        idx.remove_resource(RecordId(10));
        assert!(idx.what_provides("serial", "abc").is_empty());
    }
}
