use std::collections::HashMap;
use std::time::Duration;

use stratum_domain::{LocalHandle, RecordId, ScannableId};

/// Per-scannable bookkeeping while a plugin session is open (C4).
///
/// `local_to_global`/`global_to_local` mirror each other and are kept in
/// lockstep by every mutation in `identity.rs` and `delete.rs`.
#[derive(Debug, Clone)]
pub struct PluginSession {
    pub scannable_id: ScannableId,
    pub update_period: Duration,
    pub local_to_global: HashMap<LocalHandle, RecordId>,
    pub global_to_local: HashMap<RecordId, LocalHandle>,
}

impl PluginSession {
    pub fn new(scannable_id: ScannableId, update_period: Duration) -> Self {
        Self {
            scannable_id,
            update_period,
            local_to_global: HashMap::new(),
            global_to_local: HashMap::new(),
        }
    }

    pub fn bind(&mut self, local: LocalHandle, global: RecordId) {
        self.local_to_global.insert(local.clone(), global);
        self.global_to_local.insert(global, local);
    }

    pub fn forget(&mut self, global: RecordId) {
        if let Some(local) = self.global_to_local.remove(&global) {
            self.local_to_global.remove(&local);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_and_forget_are_symmetric() {
        let mut session = PluginSession::new(ScannableId(1), Duration::from_secs(5));
        session.bind(LocalHandle::new("h"), RecordId(10));
        assert_eq!(session.local_to_global.get(&LocalHandle::new("h")), Some(&RecordId(10)));
        session.forget(RecordId(10));
        assert!(session.local_to_global.is_empty());
        assert!(session.global_to_local.is_empty());
    }
}
