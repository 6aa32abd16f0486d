use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};
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

const RECORDS: TableDefinition<u64, &[u8]> = TableDefinition::new("records");
const RECORD_KEYS: TableDefinition<&str, u64> = TableDefinition::new("record_keys");
const ATTRIBUTES: TableDefinition<&str, &[u8]> = TableDefinition::new("attributes");
const STATISTICS: TableDefinition<&str, &[u8]> = TableDefinition::new("statistics");
const ALERTS: TableDefinition<&str, &[u8]> = TableDefinition::new("alerts");
const ALERTS_BY_ID: TableDefinition<&str, &str> = TableDefinition::new("alerts_by_id");
const PROPAGATED: TableDefinition<&str, &[u8]> = TableDefinition::new("propagated");
const LEARN_EVENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("learn_events");
const VOLUMES: TableDefinition<u64, &[u8]> = TableDefinition::new("volumes");
const VOLUMES_BY_DRIVE: TableDefinition<u64, u64> = TableDefinition::new("volumes_by_drive");
const VOLUME_NODES: TableDefinition<u64, &[u8]> = TableDefinition::new("volume_nodes");
const MANAGED_TARGET_MOUNTS: TableDefinition<&str, &[u8]> = TableDefinition::new("managed_target_mounts");
const MANAGED_TARGETS: TableDefinition<u64, &[u8]> = TableDefinition::new("managed_targets");
const MANAGED_HOSTS: TableDefinition<u64, &[u8]> = TableDefinition::new("managed_hosts");
const HA_CLUSTERS: TableDefinition<u64, &[u8]> = TableDefinition::new("ha_clusters");
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

fn internal(e: impl std::fmt::Display) -> StoreError {
    StoreError::Internal(e.to_string())
}

fn record_key(class_id: ClassId, storage_id_str: &str, scope_id: Option<ScannableId>) -> String {
    format!("{}|{}|{}", class_id.0, storage_id_str, scope_id.map(|s| s.0).unwrap_or(0))
}

fn attr_key(record_id: RecordId, key: &str) -> String {
    format!("{}|{}", record_id.0, key)
}

fn alert_key(record_id: RecordId, alert_class: &str, attribute: Option<&str>) -> String {
    format!("{}|{}|{}", record_id.0, alert_class, attribute.unwrap_or(""))
}

/// Persistent [`StateStore`] backed by a redb database file (synchronous —
/// see the concurrency note in the crate root docs). All state survives
/// process restarts.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
    next_record_id: Arc<AtomicU64>,
    next_volume_id: Arc<AtomicU64>,
    next_volume_node_id: Arc<AtomicU64>,
}

impl RedbStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(internal)?;
        }
        let db = Database::create(path).map_err(internal)?;
        {
            let wtxn = db.begin_write().map_err(internal)?;
            wtxn.open_table(RECORDS).map_err(internal)?;
            wtxn.open_table(RECORD_KEYS).map_err(internal)?;
            wtxn.open_table(ATTRIBUTES).map_err(internal)?;
            wtxn.open_table(STATISTICS).map_err(internal)?;
            wtxn.open_table(ALERTS).map_err(internal)?;
            wtxn.open_table(ALERTS_BY_ID).map_err(internal)?;
            wtxn.open_table(PROPAGATED).map_err(internal)?;
            wtxn.open_table(LEARN_EVENTS).map_err(internal)?;
            wtxn.open_table(VOLUMES).map_err(internal)?;
            wtxn.open_table(VOLUMES_BY_DRIVE).map_err(internal)?;
            wtxn.open_table(VOLUME_NODES).map_err(internal)?;
            wtxn.open_table(MANAGED_TARGET_MOUNTS).map_err(internal)?;
            wtxn.open_table(MANAGED_TARGETS).map_err(internal)?;
            wtxn.open_table(MANAGED_HOSTS).map_err(internal)?;
            wtxn.open_table(HA_CLUSTERS).map_err(internal)?;
            wtxn.open_table(META).map_err(internal)?;
            wtxn.commit().map_err(internal)?;
        }

        let (next_record_id, next_volume_id, next_volume_node_id) = {
            let rtxn = db.begin_read().map_err(internal)?;
            let meta = rtxn.open_table(META).map_err(internal)?;
            let read = |k: &str| meta.get(k).map_err(internal).map(|g| g.map(|v| v.value()).unwrap_or(0));
            (read("next_record_id")?.max(1), read("next_volume_id")?.max(1), read("next_volume_node_id")?.max(1))
        };

        Ok(Self {
            db: Arc::new(db),
            next_record_id: Arc::new(AtomicU64::new(next_record_id)),
            next_volume_id: Arc::new(AtomicU64::new(next_volume_id)),
            next_volume_node_id: Arc::new(AtomicU64::new(next_volume_node_id)),
        })
    }

    fn bump_meta(&self, key: &'static str, counter: &AtomicU64) -> Result<u64, StoreError> {
        let value = counter.fetch_add(1, Ordering::SeqCst);
        let wtxn = self.db.begin_write().map_err(internal)?;
        {
            let mut table = wtxn.open_table(META).map_err(internal)?;
            table.insert(key, value + 1).map_err(internal)?;
        }
        wtxn.commit().map_err(internal)?;
        Ok(value)
    }
}

impl StateStore for RedbStore {
    fn get_record(&self, id: RecordId) -> Result<Option<StorageResourceRecord>, StoreError> {
        let rtxn = self.db.begin_read().map_err(internal)?;
        let table = rtxn.open_table(RECORDS).map_err(internal)?;
        match table.get(id.0).map_err(internal)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    fn all_records(&self) -> Result<Vec<StorageResourceRecord>, StoreError> {
        let rtxn = self.db.begin_read().map_err(internal)?;
        let table = rtxn.open_table(RECORDS).map_err(internal)?;
        let mut out = Vec::new();
        for entry in table.iter().map_err(internal)? {
            let (_k, v) = entry.map_err(internal)?;
            out.push(serde_json::from_slice(v.value())?);
        }
        Ok(out)
    }

    fn get_or_create_record(
        &self,
        class_id: ClassId,
        storage_id_str: &str,
        scope_id: Option<ScannableId>,
    ) -> Result<(RecordId, bool), StoreError> {
        let key = record_key(class_id, storage_id_str, scope_id);
        {
            let rtxn = self.db.begin_read().map_err(internal)?;
            let keys = rtxn.open_table(RECORD_KEYS).map_err(internal)?;
            if let Some(existing) = keys.get(key.as_str()).map_err(internal)? {
                return Ok((RecordId(existing.value()), false));
            }
        }
        let id = RecordId(self.bump_meta("next_record_id", &self.next_record_id)?);
        let record = StorageResourceRecord {
            id,
            resource_class_id: class_id,
            storage_id_str: storage_id_str.to_string(),
            storage_id_scope_id: scope_id,
            reported_by: Default::default(),
            parents: Default::default(),
        };
        self.upsert_record(&record)?;
        Ok((id, true))
    }

    fn upsert_record(&self, record: &StorageResourceRecord) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(record)?;
        let key = record_key(record.resource_class_id, &record.storage_id_str, record.storage_id_scope_id);
        let wtxn = self.db.begin_write().map_err(internal)?;
        {
            let mut table = wtxn.open_table(RECORDS).map_err(internal)?;
            table.insert(record.id.0, bytes.as_slice()).map_err(internal)?;
            let mut keys = wtxn.open_table(RECORD_KEYS).map_err(internal)?;
            keys.insert(key.as_str(), record.id.0).map_err(internal)?;
        }
        wtxn.commit().map_err(internal)?;
        Ok(())
    }

    fn delete_record(&self, id: RecordId) -> Result<(), StoreError> {
        if let Some(record) = self.get_record(id)? {
            let key = record_key(record.resource_class_id, &record.storage_id_str, record.storage_id_scope_id);
            let wtxn = self.db.begin_write().map_err(internal)?;
            {
                let mut table = wtxn.open_table(RECORDS).map_err(internal)?;
                table.remove(id.0).map_err(internal)?;
                let mut keys = wtxn.open_table(RECORD_KEYS).map_err(internal)?;
                keys.remove(key.as_str()).map_err(internal)?;
            }
            wtxn.commit().map_err(internal)?;
        }
        Ok(())
    }

    fn records_scoped_to(&self, scope_id: ScannableId) -> Result<Vec<StorageResourceRecord>, StoreError> {
        let rtxn = self.db.begin_read().map_err(internal)?;
        let table = rtxn.open_table(RECORDS).map_err(internal)?;
        let mut out = Vec::new();
        for entry in table.iter().map_err(internal)? {
            let (_k, v) = entry.map_err(internal)?;
            let record: StorageResourceRecord = serde_json::from_slice(v.value())?;
            if record.storage_id_scope_id == Some(scope_id) {
                out.push(record);
            }
        }
        Ok(out)
    }

    fn class_of(&self, id: RecordId) -> Result<Option<ClassId>, StoreError> {
        Ok(self.get_record(id)?.map(|r| r.resource_class_id))
    }

    fn attribute(&self, record_id: RecordId, key: &str) -> Result<Option<ResourceAttribute>, StoreError> {
        let rtxn = self.db.begin_read().map_err(internal)?;
        let table = rtxn.open_table(ATTRIBUTES).map_err(internal)?;
        match table.get(attr_key(record_id, key).as_str()).map_err(internal)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    fn attributes_of(&self, record_id: RecordId) -> Result<Vec<ResourceAttribute>, StoreError> {
        let rtxn = self.db.begin_read().map_err(internal)?;
        let table = rtxn.open_table(ATTRIBUTES).map_err(internal)?;
        let prefix = format!("{}|", record_id.0);
        let mut out = Vec::new();
        for entry in table.iter().map_err(internal)? {
            let (k, v) = entry.map_err(internal)?;
            if k.value().starts_with(&prefix) {
                out.push(serde_json::from_slice(v.value())?);
            }
        }
        Ok(out)
    }

    fn upsert_attribute(&self, attribute: &ResourceAttribute) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(attribute)?;
        let key = attr_key(attribute.record_id(), attribute.key());
        let wtxn = self.db.begin_write().map_err(internal)?;
        {
            let mut table = wtxn.open_table(ATTRIBUTES).map_err(internal)?;
            table.insert(key.as_str(), bytes.as_slice()).map_err(internal)?;
        }
        wtxn.commit().map_err(internal)?;
        Ok(())
    }

    fn delete_attributes_of(&self, record_id: RecordId) -> Result<(), StoreError> {
        let prefix = format!("{}|", record_id.0);
        let keys: Vec<String> = {
            let rtxn = self.db.begin_read().map_err(internal)?;
            let table = rtxn.open_table(ATTRIBUTES).map_err(internal)?;
            table
                .iter()
                .map_err(internal)?
                .filter_map(|e| e.ok())
                .map(|(k, _)| k.value().to_string())
                .filter(|k| k.starts_with(&prefix))
                .collect()
        };
        let wtxn = self.db.begin_write().map_err(internal)?;
        {
            let mut table = wtxn.open_table(ATTRIBUTES).map_err(internal)?;
            for key in keys {
                table.remove(key.as_str()).map_err(internal)?;
            }
        }
        wtxn.commit().map_err(internal)?;
        Ok(())
    }

    fn statistic(&self, record_id: RecordId, name: &str) -> Result<Option<StorageResourceStatistic>, StoreError> {
        let rtxn = self.db.begin_read().map_err(internal)?;
        let table = rtxn.open_table(STATISTICS).map_err(internal)?;
        match table.get(attr_key(record_id, name).as_str()).map_err(internal)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    fn statistics_of(&self, record_id: RecordId) -> Result<Vec<StorageResourceStatistic>, StoreError> {
        let rtxn = self.db.begin_read().map_err(internal)?;
        let table = rtxn.open_table(STATISTICS).map_err(internal)?;
        let mut out = Vec::new();
        for entry in table.iter().map_err(internal)? {
            let (_k, v) = entry.map_err(internal)?;
            let stat: StorageResourceStatistic = serde_json::from_slice(v.value())?;
            if stat.record_id == record_id {
                out.push(stat);
            }
        }
        Ok(out)
    }

    fn upsert_statistic(&self, statistic: &StorageResourceStatistic) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(statistic)?;
        let key = attr_key(statistic.record_id, &statistic.name);
        let wtxn = self.db.begin_write().map_err(internal)?;
        {
            let mut table = wtxn.open_table(STATISTICS).map_err(internal)?;
            table.insert(key.as_str(), bytes.as_slice()).map_err(internal)?;
        }
        wtxn.commit().map_err(internal)?;
        Ok(())
    }

    fn delete_statistic(&self, record_id: RecordId, name: &str) -> Result<(), StoreError> {
        let wtxn = self.db.begin_write().map_err(internal)?;
        {
            let mut table = wtxn.open_table(STATISTICS).map_err(internal)?;
            table.remove(attr_key(record_id, name).as_str()).map_err(internal)?;
        }
        wtxn.commit().map_err(internal)?;
        Ok(())
    }

    fn active_alert(
        &self,
        record_id: RecordId,
        alert_class: &str,
        attribute: Option<&str>,
    ) -> Result<Option<StorageResourceAlert>, StoreError> {
        let rtxn = self.db.begin_read().map_err(internal)?;
        let table = rtxn.open_table(ALERTS).map_err(internal)?;
        let key = alert_key(record_id, alert_class, attribute);
        match table.get(key.as_str()).map_err(internal)? {
            Some(guard) => {
                let alert: StorageResourceAlert = serde_json::from_slice(guard.value())?;
                Ok(if alert.active { Some(alert) } else { None })
            }
            None => Ok(None),
        }
    }

    fn upsert_alert(&self, alert: &StorageResourceAlert) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(alert)?;
        let key = alert_key(alert.record_id, &alert.alert_class, alert.attribute.as_deref());
        let wtxn = self.db.begin_write().map_err(internal)?;
        {
            let mut table = wtxn.open_table(ALERTS).map_err(internal)?;
            table.insert(key.as_str(), bytes.as_slice()).map_err(internal)?;
            let mut by_id = wtxn.open_table(ALERTS_BY_ID).map_err(internal)?;
            by_id.insert(alert.alert_state_id.to_string().as_str(), key.as_str()).map_err(internal)?;
        }
        wtxn.commit().map_err(internal)?;
        Ok(())
    }

    fn clear_alert(&self, alert_state_id: Uuid) -> Result<(), StoreError> {
        let key = {
            let rtxn = self.db.begin_read().map_err(internal)?;
            let by_id = rtxn.open_table(ALERTS_BY_ID).map_err(internal)?;
            by_id.get(alert_state_id.to_string().as_str()).map_err(internal)?.map(|g| g.value().to_string())
        };
        if let Some(key) = key {
            let wtxn = self.db.begin_write().map_err(internal)?;
            {
                let mut table = wtxn.open_table(ALERTS).map_err(internal)?;
                if let Some(guard) = table.get(key.as_str()).map_err(internal)? {
                    let mut alert: StorageResourceAlert = serde_json::from_slice(guard.value())?;
                    alert.active = false;
                    drop(guard);
                    let bytes = serde_json::to_vec(&alert)?;
                    table.insert(key.as_str(), bytes.as_slice()).map_err(internal)?;
                }
            }
            wtxn.commit().map_err(internal)?;
        }
        Ok(())
    }

    fn propagated_alerts_of(&self, alert_state_id: Uuid) -> Result<Vec<StorageAlertPropagated>, StoreError> {
        let rtxn = self.db.begin_read().map_err(internal)?;
        let table = rtxn.open_table(PROPAGATED).map_err(internal)?;
        match table.get(alert_state_id.to_string().as_str()).map_err(internal)? {
            Some(guard) => Ok(serde_json::from_slice(guard.value())?),
            None => Ok(Vec::new()),
        }
    }

    fn append_propagated_alert(&self, propagated: &StorageAlertPropagated) -> Result<(), StoreError> {
        let key = propagated.alert_state_id.to_string();
        let wtxn = self.db.begin_write().map_err(internal)?;
        {
            let mut table = wtxn.open_table(PROPAGATED).map_err(internal)?;
            let mut list: Vec<StorageAlertPropagated> = match table.get(key.as_str()).map_err(internal)? {
                Some(guard) => serde_json::from_slice(guard.value())?,
                None => Vec::new(),
            };
            list.push(propagated.clone());
            let bytes = serde_json::to_vec(&list)?;
            table.insert(key.as_str(), bytes.as_slice()).map_err(internal)?;
        }
        wtxn.commit().map_err(internal)?;
        Ok(())
    }

    fn delete_propagated_alerts_of(&self, alert_state_id: Uuid) -> Result<(), StoreError> {
        let wtxn = self.db.begin_write().map_err(internal)?;
        {
            let mut table = wtxn.open_table(PROPAGATED).map_err(internal)?;
            table.remove(alert_state_id.to_string().as_str()).map_err(internal)?;
        }
        wtxn.commit().map_err(internal)?;
        Ok(())
    }

    fn append_learn_event(&self, event: &LearnEvent) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(event)?;
        let wtxn = self.db.begin_write().map_err(internal)?;
        {
            let mut meta = wtxn.open_table(META).map_err(internal)?;
            let seq = meta
                .get("learn_event_seq")
                .map_err(internal)?
                .map(|g| g.value())
                .unwrap_or(0)
                + 1;
            meta.insert("learn_event_seq", seq).map_err(internal)?;
            let mut table = wtxn.open_table(LEARN_EVENTS).map_err(internal)?;
            table.insert(seq, bytes.as_slice()).map_err(internal)?;
        }
        wtxn.commit().map_err(internal)?;
        Ok(())
    }

    fn volume_for_drive(&self, storage_resource_id: RecordId) -> Result<Option<Volume>, StoreError> {
        let rtxn = self.db.begin_read().map_err(internal)?;
        let by_drive = rtxn.open_table(VOLUMES_BY_DRIVE).map_err(internal)?;
        let Some(id) = by_drive.get(storage_resource_id.0).map_err(internal)? else {
            return Ok(None);
        };
        let volumes = rtxn.open_table(VOLUMES).map_err(internal)?;
        match volumes.get(id.value()).map_err(internal)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    fn get_volume(&self, id: VolumeId) -> Result<Option<Volume>, StoreError> {
        let rtxn = self.db.begin_read().map_err(internal)?;
        let table = rtxn.open_table(VOLUMES).map_err(internal)?;
        match table.get(id.0).map_err(internal)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    fn allocate_volume_id(&self) -> Result<VolumeId, StoreError> {
        Ok(VolumeId(self.bump_meta("next_volume_id", &self.next_volume_id)?))
    }

    fn upsert_volume(&self, volume: &Volume) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(volume)?;
        let wtxn = self.db.begin_write().map_err(internal)?;
        {
            let mut table = wtxn.open_table(VOLUMES).map_err(internal)?;
            table.insert(volume.id.0, bytes.as_slice()).map_err(internal)?;
            let mut by_drive = wtxn.open_table(VOLUMES_BY_DRIVE).map_err(internal)?;
            by_drive.insert(volume.storage_resource_id.0, volume.id.0).map_err(internal)?;
        }
        wtxn.commit().map_err(internal)?;
        Ok(())
    }

    fn delete_volume(&self, id: VolumeId) -> Result<(), StoreError> {
        let existing = {
            let rtxn = self.db.begin_read().map_err(internal)?;
            let table = rtxn.open_table(VOLUMES).map_err(internal)?;
            match table.get(id.0).map_err(internal)? {
                Some(guard) => Some(serde_json::from_slice::<Volume>(guard.value())?),
                None => None,
            }
        };
        let wtxn = self.db.begin_write().map_err(internal)?;
        {
            let mut table = wtxn.open_table(VOLUMES).map_err(internal)?;
            table.remove(id.0).map_err(internal)?;
            if let Some(volume) = existing {
                let mut by_drive = wtxn.open_table(VOLUMES_BY_DRIVE).map_err(internal)?;
                by_drive.remove(volume.storage_resource_id.0).map_err(internal)?;
            }
        }
        wtxn.commit().map_err(internal)?;
        Ok(())
    }

    fn volume_node_for_resource(&self, storage_resource_id: RecordId) -> Result<Option<VolumeNode>, StoreError> {
        let rtxn = self.db.begin_read().map_err(internal)?;
        let table = rtxn.open_table(VOLUME_NODES).map_err(internal)?;
        for entry in table.iter().map_err(internal)? {
            let (_k, v) = entry.map_err(internal)?;
            let node: VolumeNode = serde_json::from_slice(v.value())?;
            if node.storage_resource_id == Some(storage_resource_id) {
                return Ok(Some(node));
            }
        }
        Ok(None)
    }

    fn volume_node_at(
        &self,
        volume_id: VolumeId,
        host_id: ScannableId,
        path: &Path,
    ) -> Result<Option<VolumeNode>, StoreError> {
        Ok(self
            .volume_nodes_of_volume(volume_id)?
            .into_iter()
            .find(|n| n.host_id == host_id && n.path == path))
    }

    fn volume_nodes_of_volume(&self, volume_id: VolumeId) -> Result<Vec<VolumeNode>, StoreError> {
        let rtxn = self.db.begin_read().map_err(internal)?;
        let table = rtxn.open_table(VOLUME_NODES).map_err(internal)?;
        let mut out = Vec::new();
        for entry in table.iter().map_err(internal)? {
            let (_k, v) = entry.map_err(internal)?;
            let node: VolumeNode = serde_json::from_slice(v.value())?;
            if node.volume_id == volume_id {
                out.push(node);
            }
        }
        Ok(out)
    }

    fn allocate_volume_node_id(&self) -> Result<VolumeNodeId, StoreError> {
        Ok(VolumeNodeId(self.bump_meta("next_volume_node_id", &self.next_volume_node_id)?))
    }

    fn upsert_volume_node(&self, node: &VolumeNode) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(node)?;
        let wtxn = self.db.begin_write().map_err(internal)?;
        {
            let mut table = wtxn.open_table(VOLUME_NODES).map_err(internal)?;
            table.insert(node.id.0, bytes.as_slice()).map_err(internal)?;
        }
        wtxn.commit().map_err(internal)?;
        Ok(())
    }

    fn delete_volume_node(&self, id: VolumeNodeId) -> Result<(), StoreError> {
        let wtxn = self.db.begin_write().map_err(internal)?;
        {
            let mut table = wtxn.open_table(VOLUME_NODES).map_err(internal)?;
            table.remove(id.0).map_err(internal)?;
        }
        wtxn.commit().map_err(internal)?;
        Ok(())
    }

    fn managed_target_mount_for(
        &self,
        managed_target_id: ManagedTargetId,
        host_id: ManagedHostId,
    ) -> Result<Option<ManagedTargetMount>, StoreError> {
        let rtxn = self.db.begin_read().map_err(internal)?;
        let table = rtxn.open_table(MANAGED_TARGET_MOUNTS).map_err(internal)?;
        for entry in table.iter().map_err(internal)? {
            let (_k, v) = entry.map_err(internal)?;
            let mount: ManagedTargetMount = serde_json::from_slice(v.value())?;
            if mount.managed_target_id == managed_target_id && mount.host_id == host_id {
                return Ok(Some(mount));
            }
        }
        Ok(None)
    }

    fn managed_target_for_volume(&self, volume_id: VolumeId) -> Result<Option<ManagedTarget>, StoreError> {
        let rtxn = self.db.begin_read().map_err(internal)?;
        let table = rtxn.open_table(MANAGED_TARGETS).map_err(internal)?;
        for entry in table.iter().map_err(internal)? {
            let (_k, v) = entry.map_err(internal)?;
            let target: ManagedTarget = serde_json::from_slice(v.value())?;
            if target.volume_id == volume_id {
                return Ok(Some(target));
            }
        }
        Ok(None)
    }

    fn ha_clusters(&self) -> Result<Vec<HaCluster>, StoreError> {
        let rtxn = self.db.begin_read().map_err(internal)?;
        let table = rtxn.open_table(HA_CLUSTERS).map_err(internal)?;
        let mut out = Vec::new();
        for entry in table.iter().map_err(internal)? {
            let (_k, v) = entry.map_err(internal)?;
            out.push(serde_json::from_slice(v.value())?);
        }
        Ok(out)
    }

    fn managed_hosts(&self) -> Result<Vec<ManagedHost>, StoreError> {
        let rtxn = self.db.begin_read().map_err(internal)?;
        let table = rtxn.open_table(MANAGED_HOSTS).map_err(internal)?;
        let mut out = Vec::new();
        for entry in table.iter().map_err(internal)? {
            let (_k, v) = entry.map_err(internal)?;
            out.push(serde_json::from_slice(v.value())?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> RedbStore {
        RedbStore::open(&dir.path().join("state.redb")).unwrap()
    }

    #[test]
    fn get_or_create_record_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let (id, created) = store.get_or_create_record(ClassId(1), "abc", None).unwrap();
        assert!(created);
        let (id2, created2) = store.get_or_create_record(ClassId(1), "abc", None).unwrap();
        assert_eq!(id, id2);
        assert!(!created2);
    }

    #[test]
    fn persistence_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.redb");
        let id = {
            let store = RedbStore::open(&path).unwrap();
            let (id, _) = store.get_or_create_record(ClassId(1), "persistent", None).unwrap();
            id
        };
        let store = RedbStore::open(&path).unwrap();
        let record = store.get_record(id).unwrap();
        assert!(record.is_some());
        assert_eq!(record.unwrap().storage_id_str, "persistent");
    }

    #[test]
    fn alert_lifecycle() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
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
