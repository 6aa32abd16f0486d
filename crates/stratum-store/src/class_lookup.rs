use stratum_domain::{ClassId, RecordId};
use stratum_graph::ClassLookup;

use crate::error::StoreError;
use crate::store::StateStore;

/// Blanket [`ClassLookup`] for any store — the persistence fallback
/// `stratum-graph::ClassIndex` reaches for on a cache miss.
impl<T: StateStore + ?Sized> ClassLookup for T {
    type Error = StoreError;

    fn class_of(&self, id: RecordId) -> Result<Option<ClassId>, Self::Error> {
        StateStore::class_of(self, id)
    }
}
