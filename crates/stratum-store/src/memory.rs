use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use uuid::Uuid;

use stratum_domain::{ClassId, RecordId, ScannableId};

use crate::error::StoreError;
use crate::state::{
    HaCluster, HaClusterId, LearnEvent, ManagedHost, ManagedHostId, ManagedTarget,
    ManagedTargetId, ManagedTargetMount, ResourceAttribute, StorageAlertPropagated,
    StorageResourceAlert, StorageResourceRecord, StorageResourceStatistic, Volume, VolumeId,
    VolumeNode, VolumeNodeId,
};
use crate::store::StateStore;

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<RecordId, StorageResourceRecord>,
    records_by_key: HashMap<(ClassId, String, Option<ScannableId>), RecordId>,
    attributes: HashMap<(RecordId, String), ResourceAttribute>,
    statistics: HashMap<(RecordId, String), StorageResourceStatistic>,
    alerts: HashMap<(RecordId, String, Option<String>), StorageResourceAlert>,
    alerts_by_id: HashMap<Uuid, (RecordId, String, Option<String>)>,
    propagated: HashMap<Uuid, Vec<StorageAlertPropagated>>,
    learn_events: Vec<LearnEvent>,
    volumes: HashMap<VolumeId, Volume>,
    volumes_by_drive: HashMap<RecordId, VolumeId>,
    volume_nodes: HashMap<VolumeNodeId, VolumeNode>,
    managed_target_mounts: Vec<ManagedTargetMount>,
    managed_targets: HashMap<ManagedTargetId, ManagedTarget>,
    managed_hosts: HashMap<ManagedHostId, ManagedHost>,
    ha_clusters: HashMap<HaClusterId, HaCluster>,
}

/// In-memory [`StateStore`] — `std::sync::RwLock`-guarded, not
/// `tokio::sync::RwLock` (see the concurrency note in the crate root
/// docs). Suitable for tests and ephemeral local use.
#[derive(Debug)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
    next_record_id: AtomicU64,
    next_volume_id: AtomicU64,
    next_volume_node_id: AtomicU64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            next_record_id: AtomicU64::new(1),
            next_volume_id: AtomicU64::new(1),
            next_volume_node_id: AtomicU64::new(1),
        }
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_volume_id(&self) -> VolumeId {
        VolumeId(self.next_volume_id.fetch_add(1, Ordering::SeqCst))
    }

    pub fn next_volume_node_id(&self) -> VolumeNodeId {
        VolumeNodeId(self.next_volume_node_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Seed a managed host (test/fixture helper — production rows arrive
    /// from the job scheduler / external callers, not through this crate).
    pub fn put_managed_host(&self, host: ManagedHost) {
        self.inner.write().unwrap().managed_hosts.insert(host.id, host);
    }

    pub fn put_ha_cluster(&self, cluster: HaCluster) {
        self.inner.write().unwrap().ha_clusters.insert(cluster.id, cluster);
    }

    pub fn put_managed_target(&self, target: ManagedTarget) {
        self.inner.write().unwrap().managed_targets.insert(target.id, target);
    }

    pub fn put_managed_target_mount(&self, mount: ManagedTargetMount) {
        self.inner.write().unwrap().managed_target_mounts.push(mount);
    }
}

impl StateStore for InMemoryStore {
    fn get_record(&self, id: RecordId) -> Result<Option<StorageResourceRecord>, StoreError> {
        Ok(self.inner.read().unwrap().records.get(&id).cloned())
    }

    fn all_records(&self) -> Result<Vec<StorageResourceRecord>, StoreError> {
        Ok(self.inner.read().unwrap().records.values().cloned().collect())
    }

    fn get_or_create_record(
        &self,
        class_id: ClassId,
        storage_id_str: &str,
        scope_id: Option<ScannableId>,
    ) -> Result<(RecordId, bool), StoreError> {
        let key = (class_id, storage_id_str.to_string(), scope_id);
        let mut guard = self.inner.write().unwrap();
        if let Some(id) = guard.records_by_key.get(&key) {
            return Ok((*id, false));
        }
        let id = RecordId(self.next_record_id.fetch_add(1, Ordering::SeqCst));
        let record = StorageResourceRecord {
            id,
            resource_class_id: class_id,
            storage_id_str: storage_id_str.to_string(),
            storage_id_scope_id: scope_id,
            reported_by: Default::default(),
            parents: Default::default(),
        };
        guard.records.insert(id, record);
        guard.records_by_key.insert(key, id);
        Ok((id, true))
    }

    fn upsert_record(&self, record: &StorageResourceRecord) -> Result<(), StoreError> {
        let mut guard = self.inner.write().unwrap();
        let key = (
            record.resource_class_id,
            record.storage_id_str.clone(),
            record.storage_id_scope_id,
        );
        guard.records_by_key.insert(key, record.id);
        guard.records.insert(record.id, record.clone());
        Ok(())
    }

    fn delete_record(&self, id: RecordId) -> Result<(), StoreError> {
        let mut guard = self.inner.write().unwrap();
        if let Some(record) = guard.records.remove(&id) {
            let key = (
                record.resource_class_id,
                record.storage_id_str.clone(),
                record.storage_id_scope_id,
            );
            guard.records_by_key.remove(&key);
        }
        Ok(())
    }

    fn records_scoped_to(&self, scope_id: ScannableId) -> Result<Vec<StorageResourceRecord>, StoreError> {
        let guard = self.inner.read().unwrap();
        Ok(guard
            .records
            .values()
            .filter(|r| r.storage_id_scope_id == Some(scope_id))
            .cloned()
            .collect())
    }

    fn class_of(&self, id: RecordId) -> Result<Option<ClassId>, StoreError> {
        Ok(self.inner.read().unwrap().records.get(&id).map(|r| r.resource_class_id))
    }

    fn attribute(&self, record_id: RecordId, key: &str) -> Result<Option<ResourceAttribute>, StoreError> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .attributes
            .get(&(record_id, key.to_string()))
            .cloned())
    }

    fn attributes_of(&self, record_id: RecordId) -> Result<Vec<ResourceAttribute>, StoreError> {
        let guard = self.inner.read().unwrap();
        Ok(guard
            .attributes
            .values()
            .filter(|a| a.record_id() == record_id)
            .cloned()
            .collect())
    }

    fn upsert_attribute(&self, attribute: &ResourceAttribute) -> Result<(), StoreError> {
        let key = (attribute.record_id(), attribute.key().to_string());
        self.inner.write().unwrap().attributes.insert(key, attribute.clone());
        Ok(())
    }

    fn delete_attributes_of(&self, record_id: RecordId) -> Result<(), StoreError> {
        self.inner
            .write()
            .unwrap()
            .attributes
            .retain(|_, v| v.record_id() != record_id);
        Ok(())
    }

    fn statistic(&self, record_id: RecordId, name: &str) -> Result<Option<StorageResourceStatistic>, StoreError> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .statistics
            .get(&(record_id, name.to_string()))
            .cloned())
    }

    fn statistics_of(&self, record_id: RecordId) -> Result<Vec<StorageResourceStatistic>, StoreError> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .statistics
            .values()
            .filter(|s| s.record_id == record_id)
            .cloned()
            .collect())
    }

    fn upsert_statistic(&self, statistic: &StorageResourceStatistic) -> Result<(), StoreError> {
        let key = (statistic.record_id, statistic.name.clone());
        self.inner.write().unwrap().statistics.insert(key, statistic.clone());
        Ok(())
    }

    fn delete_statistic(&self, record_id: RecordId, name: &str) -> Result<(), StoreError> {
        self.inner.write().unwrap().statistics.remove(&(record_id, name.to_string()));
        Ok(())
    }

    fn active_alert(
        &self,
        record_id: RecordId,
        alert_class: &str,
        attribute: Option<&str>,
    ) -> Result<Option<StorageResourceAlert>, StoreError> {
        let key = (record_id, alert_class.to_string(), attribute.map(str::to_string));
        Ok(self.inner.read().unwrap().alerts.get(&key).filter(|a| a.active).cloned())
    }

    fn upsert_alert(&self, alert: &StorageResourceAlert) -> Result<(), StoreError> {
        let key = (alert.record_id, alert.alert_class.clone(), alert.attribute.clone());
        let mut guard = self.inner.write().unwrap();
        guard.alerts_by_id.insert(alert.alert_state_id, key.clone());
        guard.alerts.insert(key, alert.clone());
        Ok(())
    }

    fn clear_alert(&self, alert_state_id: Uuid) -> Result<(), StoreError> {
        let mut guard = self.inner.write().unwrap();
        if let Some(key) = guard.alerts_by_id.get(&alert_state_id).cloned() {
            if let Some(alert) = guard.alerts.get_mut(&key) {
                alert.active = false;
            }
        }
        Ok(())
    }

    fn propagated_alerts_of(&self, alert_state_id: Uuid) -> Result<Vec<StorageAlertPropagated>, StoreError> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .propagated
            .get(&alert_state_id)
            .cloned()
            .unwrap_or_default())
    }

    fn append_propagated_alert(&self, propagated: &StorageAlertPropagated) -> Result<(), StoreError> {
        self.inner
            .write()
            .unwrap()
            .propagated
            .entry(propagated.alert_state_id)
            .or_default()
            .push(propagated.clone());
        Ok(())
    }

    fn delete_propagated_alerts_of(&self, alert_state_id: Uuid) -> Result<(), StoreError> {
        self.inner.write().unwrap().propagated.remove(&alert_state_id);
        Ok(())
    }

    fn append_learn_event(&self, event: &LearnEvent) -> Result<(), StoreError> {
        self.inner.write().unwrap().learn_events.push(event.clone());
        Ok(())
    }

    fn volume_for_drive(&self, storage_resource_id: RecordId) -> Result<Option<Volume>, StoreError> {
        let guard = self.inner.read().unwrap();
        Ok(guard
            .volumes_by_drive
            .get(&storage_resource_id)
            .and_then(|id| guard.volumes.get(id))
            .cloned())
    }

    fn get_volume(&self, id: VolumeId) -> Result<Option<Volume>, StoreError> {
        Ok(self.inner.read().unwrap().volumes.get(&id).cloned())
    }

    fn allocate_volume_id(&self) -> Result<VolumeId, StoreError> {
        Ok(self.next_volume_id())
    }

    fn upsert_volume(&self, volume: &Volume) -> Result<(), StoreError> {
        let mut guard = self.inner.write().unwrap();
        guard.volumes_by_drive.insert(volume.storage_resource_id, volume.id);
        guard.volumes.insert(volume.id, volume.clone());
        Ok(())
    }

    fn delete_volume(&self, id: VolumeId) -> Result<(), StoreError> {
        let mut guard = self.inner.write().unwrap();
        if let Some(volume) = guard.volumes.remove(&id) {
            guard.volumes_by_drive.remove(&volume.storage_resource_id);
        }
        Ok(())
    }

    fn volume_node_for_resource(&self, storage_resource_id: RecordId) -> Result<Option<VolumeNode>, StoreError> {
        let guard = self.inner.read().unwrap();
        Ok(guard
            .volume_nodes
            .values()
            .find(|n| n.storage_resource_id == Some(storage_resource_id))
            .cloned())
    }

    fn volume_node_at(
        &self,
        volume_id: VolumeId,
        host_id: ScannableId,
        path: &Path,
    ) -> Result<Option<VolumeNode>, StoreError> {
        let guard = self.inner.read().unwrap();
        Ok(guard
            .volume_nodes
            .values()
            .find(|n| n.volume_id == volume_id && n.host_id == host_id && n.path == path)
            .cloned())
    }

    fn volume_nodes_of_volume(&self, volume_id: VolumeId) -> Result<Vec<VolumeNode>, StoreError> {
        let guard = self.inner.read().unwrap();
        Ok(guard.volume_nodes.values().filter(|n| n.volume_id == volume_id).cloned().collect())
    }

    fn allocate_volume_node_id(&self) -> Result<VolumeNodeId, StoreError> {
        Ok(self.next_volume_node_id())
    }

    fn upsert_volume_node(&self, node: &VolumeNode) -> Result<(), StoreError> {
        self.inner.write().unwrap().volume_nodes.insert(node.id, node.clone());
        Ok(())
    }

    fn delete_volume_node(&self, id: VolumeNodeId) -> Result<(), StoreError> {
        self.inner.write().unwrap().volume_nodes.remove(&id);
        Ok(())
    }

    fn managed_target_mount_for(
        &self,
        managed_target_id: ManagedTargetId,
        host_id: ManagedHostId,
    ) -> Result<Option<ManagedTargetMount>, StoreError> {
        let guard = self.inner.read().unwrap();
        Ok(guard
            .managed_target_mounts
            .iter()
            .find(|m| m.managed_target_id == managed_target_id && m.host_id == host_id)
            .cloned())
    }

    fn managed_target_for_volume(&self, volume_id: VolumeId) -> Result<Option<ManagedTarget>, StoreError> {
        let guard = self.inner.read().unwrap();
        Ok(guard.managed_targets.values().find(|t| t.volume_id == volume_id).cloned())
    }

    fn ha_clusters(&self) -> Result<Vec<HaCluster>, StoreError> {
        Ok(self.inner.read().unwrap().ha_clusters.values().cloned().collect())
    }

    fn managed_hosts(&self) -> Result<Vec<ManagedHost>, StoreError> {
        Ok(self.inner.read().unwrap().managed_hosts.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_is_idempotent() {
        let store = InMemoryStore::new();
        let (id1, created1) = store.get_or_create_record(ClassId(1), "abc", None).unwrap();
        let (id2, created2) = store.get_or_create_record(ClassId(1), "abc", None).unwrap();
        assert_eq!(id1, id2);
        assert!(created1);
        assert!(!created2);
    }

    #[test]
    fn scoped_and_global_keys_are_distinct() {
        let store = InMemoryStore::new();
        let (id1, _) = store.get_or_create_record(ClassId(1), "abc", Some(ScannableId(1))).unwrap();
        let (id2, _) = store.get_or_create_record(ClassId(1), "abc", Some(ScannableId(2))).unwrap();
        assert_ne!(id1, id2);
    }

    #[test]
    fn delete_record_clears_lookup_key() {
        let store = InMemoryStore::new();
        let (id, _) = store.get_or_create_record(ClassId(1), "abc", None).unwrap();
        store.delete_record(id).unwrap();
        let (id2, created) = store.get_or_create_record(ClassId(1), "abc", None).unwrap();
        assert!(created);
        assert_ne!(id, id2);
    }

    #[test]
    fn alert_lifecycle() {
        let store = InMemoryStore::new();
        let alert = StorageResourceAlert {
            record_id: RecordId(1),
            alert_class: "Degraded".into(),
            attribute: None,
            active: true,
            alert_state_id: Uuid::new_v4(),
        };
        store.upsert_alert(&alert).unwrap();
        assert!(store.active_alert(RecordId(1), "Degraded", None).unwrap().is_some());
        store.clear_alert(alert.alert_state_id).unwrap();
        assert!(store.active_alert(RecordId(1), "Degraded", None).unwrap().is_none());
    }
}
