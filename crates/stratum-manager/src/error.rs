use thiserror::Error;

use stratum_domain::{DomainError, RecordId, ScannableId};
use stratum_graph::GraphError;
use stratum_scheduler::SchedulerError;
use stratum_store::StoreError;

/// Every §7 error kind, plus `#[from]` wiring for the crates underneath.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("plugin protocol error: {0}")]
    PluginProtocolError(String),

    #[error("unknown resource: {0}")]
    UnknownResource(RecordId),

    #[error("session for scannable {0} is not open")]
    DeletedSession(ScannableId),

    #[error("resource {child} references missing ancestor {parent}")]
    MissingAncestor { child: RecordId, parent: RecordId },

    #[error("ha cluster membership inconsistent for volume {volume_id:?}")]
    InconsistentHaClusterMembership { volume_id: stratum_store::VolumeId },

    #[error("statistic '{name}' sample period changed for resource {record_id}")]
    StatisticPeriodChanged { record_id: RecordId, name: String },

    #[error("persistence error: {0}")]
    PersistenceError(#[from] StoreError),

    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}
