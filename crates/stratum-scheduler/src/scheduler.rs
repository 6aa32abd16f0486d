use std::sync::atomic::{AtomicU64, Ordering};

use stratum_store::ManagedHostId;

use crate::error::SchedulerError;

/// A unit of work accepted by the job scheduler — opaque to the core,
/// which only needs to know one was assigned (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(pub u64);

/// The single external operation the core depends on (§6): asking the job
/// scheduler to register a freshly-discovered host over SSH.
pub trait JobSchedulerClient: Send + Sync {
    fn create_host_ssh(&self, address: &str) -> Result<(ManagedHostId, CommandId), SchedulerError>;
}

/// Stub scheduler that performs no actual I/O and hands back synthetic,
/// deterministically-incrementing ids, filling the "no external system
/// available" role for tests and local use.
#[derive(Debug, Default)]
pub struct NoopScheduler {
    next_host_id: AtomicU64,
    next_command_id: AtomicU64,
}

impl NoopScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobSchedulerClient for NoopScheduler {
    fn create_host_ssh(&self, _address: &str) -> Result<(ManagedHostId, CommandId), SchedulerError> {
        let host_id = ManagedHostId(self.next_host_id.fetch_add(1, Ordering::SeqCst) + 1);
        let command_id = CommandId(self.next_command_id.fetch_add(1, Ordering::SeqCst) + 1);
        Ok((host_id, command_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_scheduler_assigns_increasing_ids() {
        let scheduler = NoopScheduler::new();
        let (host1, cmd1) = scheduler.create_host_ssh("10.0.0.1").unwrap();
        let (host2, cmd2) = scheduler.create_host_ssh("10.0.0.2").unwrap();
        assert_ne!(host1, host2);
        assert_ne!(cmd1, cmd2);
    }
}
