use stratum_domain::{ClassId, RecordId, ScannableId};

use crate::error::StoreError;
use crate::state::{
    HaCluster, LearnEvent, ManagedHost, ManagedTarget, ManagedTargetMount, ResourceAttribute,
    StorageResourceAlert, StorageResourceRecord, StorageResourceStatistic, StorageAlertPropagated,
    Volume, VolumeId, VolumeNode, VolumeNodeId,
};

/// A transaction handle: every [`StateStore`] method is also available
/// through this trait, so a closure passed to [`transaction`] can perform
/// several writes that either all land or (on an `Err` return) leave no
/// partial effect visible to the next entry point.
///
/// Blanket-implemented for any `StateStore` — this models the "one outer
/// transaction or commit-on-success helpers, never a mix" rule (§5) as an
/// explicit closure scope.
pub trait StateStoreTxn: StateStore {}

impl<T: StateStore + ?Sized> StateStoreTxn for T {}

/// Run `f` against `store`. Kept as a free function, not a `StateStore`
/// method, so `StateStore` stays object-safe for `Arc<dyn StateStore>`
/// wiring in `stratum-manager`. Every write below already commits
/// atomically on its own; nesting them inside one closure scope is enough
/// to satisfy "one outer transaction, never a mix" as long as callers
/// never hold two overlapping `transaction` calls (enforced by the
/// manager's single mutex, not by this function).
pub fn transaction<T>(
    store: &dyn StateStore,
    f: impl FnOnce(&dyn StateStoreTxn) -> Result<T, StoreError>,
) -> Result<T, StoreError> {
    f(store)
}

/// Synchronous persistence boundary (§5's blocking-mutex model — see
/// the concurrency note in the crate root docs). Every method is plain
/// `&self`; implementations use interior locking/redb transactions to
/// stay `Send + Sync`.
pub trait StateStore: Send + Sync + 'static {
    fn get_record(&self, id: RecordId) -> Result<Option<StorageResourceRecord>, StoreError>;

    /// All persisted records — used to rebuild `EdgeIndex`/`ClassIndex`/
    /// `SubscriberIndex` at startup, loaded in full before any diffing
    /// against the live graph begins.
    fn all_records(&self) -> Result<Vec<StorageResourceRecord>, StoreError>;

    fn get_or_create_record(
        &self,
        class_id: ClassId,
        storage_id_str: &str,
        scope_id: Option<ScannableId>,
    ) -> Result<(RecordId, bool), StoreError>;

    fn upsert_record(&self, record: &StorageResourceRecord) -> Result<(), StoreError>;

    fn delete_record(&self, id: RecordId) -> Result<(), StoreError>;

    fn records_scoped_to(&self, scope_id: ScannableId) -> Result<Vec<StorageResourceRecord>, StoreError>;

    fn class_of(&self, id: RecordId) -> Result<Option<ClassId>, StoreError>;

    fn attribute(&self, record_id: RecordId, key: &str) -> Result<Option<ResourceAttribute>, StoreError>;

    fn attributes_of(&self, record_id: RecordId) -> Result<Vec<ResourceAttribute>, StoreError>;

    fn upsert_attribute(&self, attribute: &ResourceAttribute) -> Result<(), StoreError>;

    fn delete_attributes_of(&self, record_id: RecordId) -> Result<(), StoreError>;

    fn statistic(&self, record_id: RecordId, name: &str) -> Result<Option<StorageResourceStatistic>, StoreError>;

    /// Every `StorageResourceStatistic` row for `record_id` — used by
    /// cascading delete's teardown step 5 to clear each one's metrics
    /// sink entry before deleting the row.
    fn statistics_of(&self, record_id: RecordId) -> Result<Vec<StorageResourceStatistic>, StoreError>;

    fn upsert_statistic(&self, statistic: &StorageResourceStatistic) -> Result<(), StoreError>;

    fn delete_statistic(&self, record_id: RecordId, name: &str) -> Result<(), StoreError>;

    fn active_alert(
        &self,
        record_id: RecordId,
        alert_class: &str,
        attribute: Option<&str>,
    ) -> Result<Option<StorageResourceAlert>, StoreError>;

    fn upsert_alert(&self, alert: &StorageResourceAlert) -> Result<(), StoreError>;

    fn clear_alert(&self, alert_state_id: uuid::Uuid) -> Result<(), StoreError>;

    fn propagated_alerts_of(&self, alert_state_id: uuid::Uuid) -> Result<Vec<StorageAlertPropagated>, StoreError>;

    fn append_propagated_alert(&self, propagated: &StorageAlertPropagated) -> Result<(), StoreError>;

    fn delete_propagated_alerts_of(&self, alert_state_id: uuid::Uuid) -> Result<(), StoreError>;

    fn append_learn_event(&self, event: &LearnEvent) -> Result<(), StoreError>;

    fn volume_for_drive(&self, storage_resource_id: RecordId) -> Result<Option<Volume>, StoreError>;

    fn get_volume(&self, id: VolumeId) -> Result<Option<Volume>, StoreError>;

    /// Mint a fresh, never-reused `VolumeId` for a `Volume` about to be
    /// inserted by volume derivation (§4.7 step 5).
    fn allocate_volume_id(&self) -> Result<VolumeId, StoreError>;

    fn upsert_volume(&self, volume: &Volume) -> Result<(), StoreError>;

    fn delete_volume(&self, id: VolumeId) -> Result<(), StoreError>;

    /// The live `VolumeNode` (if any) backed by `storage_resource_id` —
    /// used both to partition "unassigned" device nodes (§4.7 step 2) and
    /// by the sweep step to find a node whose backing resource stopped
    /// being a usable leaf (§4.7 step 9).
    fn volume_node_for_resource(&self, storage_resource_id: RecordId) -> Result<Option<VolumeNode>, StoreError>;

    fn volume_node_at(
        &self,
        volume_id: VolumeId,
        host_id: ScannableId,
        path: &std::path::Path,
    ) -> Result<Option<VolumeNode>, StoreError>;

    fn volume_nodes_of_volume(&self, volume_id: VolumeId) -> Result<Vec<VolumeNode>, StoreError>;

    /// Mint a fresh `VolumeNodeId` for a `VolumeNode` about to be inserted
    /// (§4.7 step 6).
    fn allocate_volume_node_id(&self) -> Result<VolumeNodeId, StoreError>;

    fn upsert_volume_node(&self, node: &VolumeNode) -> Result<(), StoreError>;

    fn delete_volume_node(&self, id: VolumeNodeId) -> Result<(), StoreError>;

    fn managed_target_mount_for(
        &self,
        managed_target_id: crate::state::ManagedTargetId,
        host_id: crate::state::ManagedHostId,
    ) -> Result<Option<ManagedTargetMount>, StoreError>;

    fn managed_target_for_volume(&self, volume_id: VolumeId) -> Result<Option<ManagedTarget>, StoreError>;

    fn ha_clusters(&self) -> Result<Vec<HaCluster>, StoreError>;

    fn managed_hosts(&self) -> Result<Vec<ManagedHost>, StoreError>;
}
