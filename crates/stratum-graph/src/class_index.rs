use std::collections::HashMap;

use stratum_domain::{ClassId, RecordId};

/// Fallback lookup for a record's class when it is not (yet) cached in the
/// in-memory `ClassIndex` — backed by `stratum-store` in the real wiring,
/// so this crate stays free of a dependency on it.
pub trait ClassLookup {
    type Error;

    fn class_of(&self, id: RecordId) -> Result<Option<ClassId>, Self::Error>;
}

/// Cache of `record_id -> class_id`, populated at startup and kept current
/// as resources are created/deleted (§4.2).
#[derive(Debug, Default)]
pub struct ClassIndex {
    by_record: HashMap<RecordId, ClassId>,
}

impl ClassIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, record_id: RecordId) -> Option<ClassId> {
        self.by_record.get(&record_id).copied()
    }

    /// Looks up the cache first, falling back to `lookup` (and caching the
    /// result) on a miss.
    pub fn get_or_lookup<L: ClassLookup>(
        &mut self,
        record_id: RecordId,
        lookup: &L,
    ) -> Result<Option<ClassId>, L::Error> {
        if let Some(class_id) = self.get(record_id) {
            return Ok(Some(class_id));
        }
        let found = lookup.class_of(record_id)?;
        if let Some(class_id) = found {
            self.add_record(record_id, class_id);
        }
        Ok(found)
    }

    pub fn add_record(&mut self, record_id: RecordId, class_id: ClassId) {
        self.by_record.insert(record_id, class_id);
    }

    pub fn remove_record(&mut self, record_id: RecordId) {
        self.by_record.remove(&record_id);
    }

    pub fn populate<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = (RecordId, ClassId)>,
    {
        for (record_id, class_id) in records {
            self.add_record(record_id, class_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLookup(Option<ClassId>);

    impl ClassLookup for FixedLookup {
        type Error = std::convert::Infallible;

        fn class_of(&self, _id: RecordId) -> Result<Option<ClassId>, Self::Error> {
            Ok(self.0)
        }
    }

    #[test]
    fn cache_hit_skips_lookup() {
        let mut idx = ClassIndex::new();
        idx.add_record(RecordId(1), ClassId(5));
        let lookup = FixedLookup(None);
        assert_eq!(
            idx.get_or_lookup(RecordId(1), &lookup).unwrap(),
            Some(ClassId(5))
        );
    }

    #[test]
    fn cache_miss_falls_back_and_caches() {
        let mut idx = ClassIndex::new();
        let lookup = FixedLookup(Some(ClassId(7)));
        assert_eq!(
            idx.get_or_lookup(RecordId(2), &lookup).unwrap(),
            Some(ClassId(7))
        );
        assert_eq!(idx.get(RecordId(2)), Some(ClassId(7)));
    }

    #[test]
    fn remove_record_clears_entry() {
        let mut idx = ClassIndex::new();
        idx.add_record(RecordId(1), ClassId(5));
        idx.remove_record(RecordId(1));
        assert_eq!(idx.get(RecordId(1)), None);
    }
}
