use std::collections::HashMap;

use crate::ids::ClassId;
use crate::types::{AttributeType, IdKind, PluginResource};

/// One `Subscribe(key, subscribe_to, value_fn)` relation (§6).
///
/// `value_fn` is a plain function pointer rather than a trait object:
/// descriptors are compiled-in constants (§9 "dynamic plugin classes...
/// replace with a plugin registry populated at startup"), so there is no
/// need to erase the function behind dynamic dispatch.
#[derive(Clone, Copy)]
pub struct Subscription {
    pub key: &'static str,
    pub subscribe_to: ClassId,
    pub value_fn: fn(&PluginResource) -> String,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("subscribe_to", &self.subscribe_to)
            .finish()
    }
}

/// Tag bits replacing polymorphic `isinstance`/downcast checks on records
/// (§9): a resource's behaviour is looked up by class id through the
/// registry instead of walking an inheritance chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceMarkers {
    pub is_device_node: bool,
    pub is_logical_drive: bool,
    pub is_logical_drive_occupier: bool,
    pub is_path_weight: bool,
    pub is_virtual_machine: bool,
    /// `BaseScannableResource` — a top-level scanned unit (host agent or
    /// controller) that owns scoped descendants.
    pub is_scannable: bool,
    /// `HostsideResource` — observed through a host agent; carries `host_id`.
    pub is_hostside: bool,
}

/// Static descriptor for one resource class, known at startup (§6).
#[derive(Debug, Clone)]
pub struct ResourceClassDescriptor {
    pub class_id: ClassId,
    pub name: &'static str,
    pub id_kind: IdKind,
    pub id_fields: Vec<&'static str>,
    pub attributes: Vec<(&'static str, AttributeType)>,
    pub relations: Vec<Subscription>,
    pub label_fn: fn(&PluginResource) -> String,
    pub markers: ResourceMarkers,
}

impl ResourceClassDescriptor {
    /// Subscriptions this class itself declares (the "subscriber" side).
    pub fn subscriptions(&self) -> &[Subscription] {
        &self.relations
    }
}

/// The plugin registry: every known resource class, indexed by id.
///
/// Populated once at startup from the compiled-in set of plugin classes;
/// never mutated afterwards (runtime schema evolution is an explicit
/// Non-goal).
#[derive(Debug, Clone, Default)]
pub struct ClassRegistry {
    classes: HashMap<ClassId, ResourceClassDescriptor>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: ResourceClassDescriptor) {
        self.classes.insert(descriptor.class_id, descriptor);
    }

    pub fn descriptor(&self, class_id: ClassId) -> Option<&ResourceClassDescriptor> {
        self.classes.get(&class_id)
    }

    pub fn markers(&self, class_id: ClassId) -> ResourceMarkers {
        self.classes
            .get(&class_id)
            .map(|d| d.markers)
            .unwrap_or_default()
    }

    /// All subscriptions declared by *any* registered class — used by
    /// `SubscriberIndex::populate` to build the provider side (§4.3).
    pub fn all_subscriptions(&self) -> Vec<Subscription> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for descriptor in self.classes.values() {
            for sub in &descriptor.relations {
                if seen.insert(sub.key) {
                    out.push(*sub);
                }
            }
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ClassId, &ResourceClassDescriptor)> {
        self.classes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label_fn(_r: &PluginResource) -> String {
        "x".into()
    }

    #[test]
    fn registry_roundtrip() {
        let mut reg = ClassRegistry::new();
        reg.register(ResourceClassDescriptor {
            class_id: ClassId(1),
            name: "Thing",
            id_kind: IdKind::Global,
            id_fields: vec!["serial"],
            attributes: vec![("serial", AttributeType::String)],
            relations: vec![],
            label_fn,
            markers: ResourceMarkers {
                is_device_node: true,
                ..Default::default()
            },
        });
        assert!(reg.descriptor(ClassId(1)).is_some());
        assert!(reg.markers(ClassId(1)).is_device_node);
        assert!(!reg.markers(ClassId(1)).is_logical_drive);
        assert!(reg.markers(ClassId(99)).is_device_node == false);
    }

    #[test]
    fn all_subscriptions_dedupes_by_key() {
        let mut reg = ClassRegistry::new();
        let sub = Subscription {
            key: "scsi_serial",
            subscribe_to: ClassId(1),
            value_fn: |r| r.handle.0.clone(),
        };
        reg.register(ResourceClassDescriptor {
            class_id: ClassId(2),
            name: "A",
            id_kind: IdKind::Scoped,
            id_fields: vec![],
            attributes: vec![],
            relations: vec![sub],
            label_fn,
            markers: ResourceMarkers::default(),
        });
        reg.register(ResourceClassDescriptor {
            class_id: ClassId(3),
            name: "B",
            id_kind: IdKind::Scoped,
            id_fields: vec![],
            attributes: vec![],
            relations: vec![sub],
            label_fn,
            markers: ResourceMarkers::default(),
        });
        assert_eq!(reg.all_subscriptions().len(), 1);
    }
}
