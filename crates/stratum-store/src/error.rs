use thiserror::Error;

use stratum_domain::RecordId;

use crate::state::{VolumeId, VolumeNodeId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    RecordNotFound(RecordId),

    #[error("volume not found: {0:?}")]
    VolumeNotFound(VolumeId),

    #[error("volume node not found: {0:?}")]
    VolumeNodeNotFound(VolumeNodeId),

    #[error("record already exists: {0}")]
    AlreadyExists(RecordId),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal store error: {0}")]
    Internal(String),
}
