use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use uuid::Uuid;

use stratum_domain::{ClassRegistry, LocalHandle, PluginResource, RecordId, ScannableId, StatSample};
use stratum_graph::{ClassIndex, EdgeIndex, SubscriberIndex};
use stratum_scheduler::JobSchedulerClient;
use stratum_store::{MetricsSink, StateStore};

use crate::error::ManagerError;
use crate::session::PluginSession;

/// Everything guarded by the single manager mutex (§5 "Shared state").
pub(crate) struct Inner {
    pub(crate) sessions: HashMap<ScannableId, PluginSession>,
    pub(crate) active_alerts: HashMap<(RecordId, String), Uuid>,
    pub(crate) edges: EdgeIndex,
    pub(crate) classes: ClassIndex,
    pub(crate) subscribers: SubscriberIndex,
    pub(crate) label_cache: HashMap<RecordId, String>,
    pub(crate) registry: Arc<ClassRegistry>,
    pub(crate) store: Arc<dyn StateStore>,
    pub(crate) scheduler: Arc<dyn JobSchedulerClient>,
    pub(crate) metrics: Arc<dyn MetricsSink>,
}

/// The process-wide service object (§9 "global module-level singleton" ->
/// an explicit object created at startup and passed by reference).
///
/// Every public method takes the mutex for its entire body: the graph
/// operations (subscription matching, cascading delete) are interdependent
/// enough that finer-grained locking would need a different design (§5).
pub struct ResourceManager {
    inner: Mutex<Inner>,
}

impl ResourceManager {
    /// Rebuilds `edges`, `classes`, `subscribers`, and `active_alerts` from
    /// `store` before returning, so the service never accepts a session
    /// against a stale in-memory view (§5 "Startup").
    pub fn new(
        registry: Arc<ClassRegistry>,
        store: Arc<dyn StateStore>,
        scheduler: Arc<dyn JobSchedulerClient>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self, ManagerError> {
        let mut edges = EdgeIndex::new();
        let mut classes = ClassIndex::new();
        let mut subscribers = SubscriberIndex::new();
        let active_alerts = HashMap::new();

        let records = store.all_records()?;
        for record in &records {
            classes.add_record(record.id, record.resource_class_id);
            edges.populate(std::iter::once((
                record.id,
                record.parents.iter().copied().collect(),
            )));
            let resource = crate::labels::reconstruct_resource(registry.as_ref(), store.as_ref(), record)?;
            subscribers.add_resource(&registry, record.id, &resource);
        }

        Ok(Self {
            inner: Mutex::new(Inner {
                sessions: HashMap::new(),
                active_alerts,
                edges,
                classes,
                subscribers,
                label_cache: HashMap::new(),
                registry,
                store,
                scheduler,
                metrics,
            }),
        })
    }

    pub fn session_open(
        &self,
        scannable_id: ScannableId,
        initial_resources: Vec<PluginResource>,
        update_period: Duration,
    ) -> Result<(), ManagerError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.sessions.remove(&scannable_id).is_some() {
            tracing::warn!(%scannable_id, "discarding existing session on session_open");
        }
        let mut session = PluginSession::new(scannable_id, update_period);
        crate::identity::persist_new_resources(&mut inner, &mut session, &initial_resources)?;
        crate::identity::persist_created_hosts(&mut inner, &session, &initial_resources)?;
        let reported: std::collections::HashSet<RecordId> =
            session.local_to_global.values().copied().collect();
        crate::identity::cull_lost_resources(&mut inner, &session, &reported)?;
        crate::volumes::persist_lun_updates(&mut inner, scannable_id)?;
        inner.sessions.insert(scannable_id, session);
        Ok(())
    }

    pub fn session_close(&self, scannable_id: ScannableId) -> Result<(), ManagerError> {
        let mut inner = self.inner.lock().unwrap();
        inner.sessions.remove(&scannable_id);
        Ok(())
    }

    pub fn session_add_resources(
        &self,
        scannable_id: ScannableId,
        resources: Vec<PluginResource>,
    ) -> Result<(), ManagerError> {
        let mut inner = self.inner.lock().unwrap();
        let mut session = inner
            .sessions
            .remove(&scannable_id)
            .ok_or(ManagerError::DeletedSession(scannable_id))?;
        let result = (|| {
            crate::identity::persist_new_resources(&mut inner, &mut session, &resources)?;
            crate::identity::persist_created_hosts(&mut inner, &session, &resources)?;
            crate::volumes::persist_lun_updates(&mut inner, scannable_id)
        })();
        inner.sessions.insert(scannable_id, session);
        result
    }

    pub fn session_remove_resources(
        &self,
        scannable_id: ScannableId,
        locals: Vec<LocalHandle>,
    ) -> Result<(), ManagerError> {
        let mut inner = self.inner.lock().unwrap();
        let mut session = inner
            .sessions
            .remove(&scannable_id)
            .ok_or(ManagerError::DeletedSession(scannable_id))?;
        let result = (|| {
            for local in &locals {
                if let Some(global) = session.local_to_global.get(local).copied() {
                    crate::delete::delete_resource(&mut inner, global)?;
                    session.forget(global);
                }
            }
            crate::volumes::persist_lun_updates(&mut inner, scannable_id)
        })();
        inner.sessions.insert(scannable_id, session);
        result
    }

    pub fn session_resource_add_parent(
        &self,
        scannable_id: ScannableId,
        local: LocalHandle,
        local_parent: LocalHandle,
    ) -> Result<(), ManagerError> {
        let mut inner = self.inner.lock().unwrap();
        let session = inner
            .sessions
            .get(&scannable_id)
            .ok_or(ManagerError::DeletedSession(scannable_id))?
            .clone();
        let child = resolve_local(&session, &local)?;
        let parent = resolve_local(&session, &local_parent)?;
        inner.edges.add_parent(child, parent)?;
        if let Some(mut record) = inner.store.get_record(child)? {
            record.parents.insert(parent);
            inner.store.upsert_record(&record)?;
        }
        Ok(())
    }

    pub fn session_resource_remove_parent(
        &self,
        scannable_id: ScannableId,
        local: LocalHandle,
        local_parent: LocalHandle,
    ) -> Result<(), ManagerError> {
        let mut inner = self.inner.lock().unwrap();
        let session = inner
            .sessions
            .get(&scannable_id)
            .ok_or(ManagerError::DeletedSession(scannable_id))?
            .clone();
        let child = resolve_local(&session, &local)?;
        let parent = resolve_local(&session, &local_parent)?;
        inner.edges.remove_parent(child, parent);
        if let Some(mut record) = inner.store.get_record(child)? {
            record.parents.remove(&parent);
            inner.store.upsert_record(&record)?;
        }
        Ok(())
    }

    /// Present but a no-op in the source; resolved here (DESIGN.md) in
    /// favour of applying the update through the same upsert path as
    /// creation, since a silent no-op would drop plugin-reported attribute
    /// changes with no diagnostic.
    pub fn session_update_resource(
        &self,
        scannable_id: ScannableId,
        local: LocalHandle,
        attrs: HashMap<String, stratum_domain::AttributeValue>,
    ) -> Result<(), ManagerError> {
        let mut inner = self.inner.lock().unwrap();
        let session = inner
            .sessions
            .get(&scannable_id)
            .ok_or(ManagerError::DeletedSession(scannable_id))?
            .clone();
        let record_id = resolve_local(&session, &local)?;
        crate::identity::upsert_attributes(&mut inner, &session, record_id, &attrs)
    }

    pub fn session_get_stats(
        &self,
        scannable_id: ScannableId,
        local: LocalHandle,
        samples: Vec<StatSample>,
    ) -> Result<(), ManagerError> {
        let mut inner = self.inner.lock().unwrap();
        let session = inner
            .sessions
            .get(&scannable_id)
            .ok_or(ManagerError::DeletedSession(scannable_id))?
            .clone();
        let record_id = resolve_local(&session, &local)?;
        crate::stats::session_get_stats(&mut inner, record_id, &samples)
    }

    pub fn session_notify_alert(
        &self,
        scannable_id: ScannableId,
        local: LocalHandle,
        active: bool,
        alert_class: String,
        attribute: Option<String>,
    ) -> Result<(), ManagerError> {
        let mut inner = self.inner.lock().unwrap();
        let session = inner
            .sessions
            .get(&scannable_id)
            .ok_or(ManagerError::DeletedSession(scannable_id))?
            .clone();
        let record_id = resolve_local(&session, &local)?;
        crate::alerts::notify_alert(&mut inner, record_id, active, &alert_class, attribute.as_deref())
    }

    /// Out-of-session delete; §7 policy: logged and `Ok(())` on a missing id.
    pub fn global_remove_resource(&self, resource_id: RecordId) -> Result<(), ManagerError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.store.get_record(resource_id)?.is_none() {
            tracing::warn!(%resource_id, "global_remove_resource: unknown resource");
            return Ok(());
        }
        crate::delete::delete_resource(&mut inner, resource_id)
    }
}

fn resolve_local(session: &PluginSession, local: &LocalHandle) -> Result<RecordId, ManagerError> {
    session
        .local_to_global
        .get(local)
        .copied()
        .ok_or_else(|| ManagerError::PluginProtocolError(format!("unmapped local handle {local}")))
}
