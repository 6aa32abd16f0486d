mod class_lookup;
pub mod error;
pub mod memory;
pub mod redb_store;
pub mod state;
pub mod store;

pub use error::StoreError;
pub use memory::InMemoryStore;
pub use redb_store::RedbStore;
pub use state::{
    HaCluster, HaClusterId, LearnEvent, ManagedHost, ManagedHostId, ManagedTarget,
    ManagedTargetId, ManagedTargetMount, MemoryMetricsSink, MetricsSink, ResourceAttribute,
    StorageAlertPropagated, StorageResourceAlert, StorageResourceRecord, StorageResourceStatistic,
    Volume, VolumeId, VolumeNode, VolumeNodeId,
};
pub use store::{transaction, StateStore, StateStoreTxn};
