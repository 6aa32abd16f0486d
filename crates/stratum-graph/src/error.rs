use thiserror::Error;

use stratum_domain::RecordId;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("adding parent edge {child} -> {parent} would close a cycle in the parent graph")]
    ParentCycle { child: RecordId, parent: RecordId },
}
