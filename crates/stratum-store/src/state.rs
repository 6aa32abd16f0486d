use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stratum_domain::{ClassId, RecordId, ScannableId};

// ── StorageResourceRecord ─────────────────────────────────────────────────

/// The durable row behind every resource, keyed by [`RecordId`] (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageResourceRecord {
    pub id: RecordId,
    pub resource_class_id: ClassId,
    /// Canonical id-tuple JSON string, unique within `storage_id_scope_id`.
    pub storage_id_str: String,
    /// `Some` for scoped resources, `None` for globally-unique ones.
    pub storage_id_scope_id: Option<ScannableId>,
    /// Every scannable that has reported this resource.
    pub reported_by: HashSet<ScannableId>,
    pub parents: HashSet<RecordId>,
}

// ── ResourceAttribute ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResourceAttribute {
    Serialized {
        record_id: RecordId,
        key: String,
        value: serde_json::Value,
    },
    Reference {
        record_id: RecordId,
        key: String,
        value_id: RecordId,
    },
}

impl ResourceAttribute {
    pub fn record_id(&self) -> RecordId {
        match self {
            ResourceAttribute::Serialized { record_id, .. } => *record_id,
            ResourceAttribute::Reference { record_id, .. } => *record_id,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            ResourceAttribute::Serialized { key, .. } => key,
            ResourceAttribute::Reference { key, .. } => key,
        }
    }
}

// ── StorageResourceStatistic + MetricsSink ────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageResourceStatistic {
    pub record_id: RecordId,
    pub name: String,
    pub sample_period: u32,
}

/// Time-series sink for statistic samples — the "opaque to the core;
/// addressed by metrics" boundary of §3. The core only ever pushes
/// samples through this trait; it never reads them back.
pub trait MetricsSink: Send + Sync {
    fn record_sample(&self, record_id: RecordId, name: &str, value: f64, at: DateTime<Utc>);
    fn clear(&self, record_id: RecordId, name: &str);
}

/// Bounded in-memory ring buffer per `(record_id, name)`, default sink for
/// tests and local use. Not meant as a production metrics backend.
#[derive(Debug)]
pub struct MemoryMetricsSink {
    capacity: usize,
    samples: std::sync::Mutex<std::collections::HashMap<(RecordId, String), Vec<(DateTime<Utc>, f64)>>>,
}

impl MemoryMetricsSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            samples: std::sync::Mutex::new(std::collections::HashMap::new()),
        }
    }

    pub fn samples_for(&self, record_id: RecordId, name: &str) -> Vec<(DateTime<Utc>, f64)> {
        self.samples
            .lock()
            .unwrap()
            .get(&(record_id, name.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for MemoryMetricsSink {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl MetricsSink for MemoryMetricsSink {
    fn record_sample(&self, record_id: RecordId, name: &str, value: f64, at: DateTime<Utc>) {
        let mut guard = self.samples.lock().unwrap();
        let entry = guard.entry((record_id, name.to_string())).or_default();
        entry.push((at, value));
        if entry.len() > self.capacity {
            let overflow = entry.len() - self.capacity;
            entry.drain(0..overflow);
        }
    }

    fn clear(&self, record_id: RecordId, name: &str) {
        self.samples.lock().unwrap().remove(&(record_id, name.to_string()));
    }
}

// ── Alerts ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageResourceAlert {
    pub record_id: RecordId,
    pub alert_class: String,
    pub attribute: Option<String>,
    pub active: bool,
    pub alert_state_id: Uuid,
}

/// Records that an alert on some upstream resource was propagated down to
/// `record_id`, so the propagation can be unwound when the source clears
/// (§4.9).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageAlertPropagated {
    pub alert_state_id: Uuid,
    pub record_id: RecordId,
}

// ── LearnEvent ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnEvent {
    pub record_id: RecordId,
    pub resource_class_id: ClassId,
    pub storage_id_str: String,
    pub created_at: DateTime<Utc>,
}

// ── Volume / VolumeNode ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VolumeId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VolumeNodeId(pub u64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    pub id: VolumeId,
    pub storage_resource_id: RecordId,
    pub size: Option<u64>,
    pub filesystem_type: Option<String>,
    pub label: String,
    pub not_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeNode {
    pub id: VolumeNodeId,
    pub volume_id: VolumeId,
    pub host_id: ScannableId,
    pub path: PathBuf,
    pub storage_resource_id: Option<RecordId>,
    pub primary: bool,
    #[serde(rename = "use")]
    pub use_: bool,
    pub not_deleted: bool,
}

// ── External-signal rows (§3) ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ManagedHostId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ManagedTargetId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HaClusterId(pub u64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedHost {
    pub id: ManagedHostId,
    pub scannable_id: Option<ScannableId>,
    pub fqdn: String,
    pub address: String,
    pub ha_cluster_id: Option<HaClusterId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HaCluster {
    pub id: HaClusterId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedTarget {
    pub id: ManagedTargetId,
    pub volume_id: VolumeId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedTargetMount {
    pub managed_target_id: ManagedTargetId,
    pub host_id: ManagedHostId,
    pub mount_point: Option<PathBuf>,
    pub primary: bool,
}
