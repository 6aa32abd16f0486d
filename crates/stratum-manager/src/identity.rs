use std::collections::{HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graph::DiGraph;

use stratum_domain::{AttributeValue, IdKind, LocalHandle, PluginResource, RecordId};
use stratum_store::{LearnEvent, ResourceAttribute};

use crate::error::ManagerError;
use crate::manager::Inner;
use crate::session::PluginSession;

/// Order `resources` so a resource referenced by a `ReferenceLocal`
/// attribute sorts before anything that references it (§4.6 step 1).
fn order_resources(resources: &[PluginResource]) -> Result<Vec<usize>, ManagerError> {
    let mut graph = DiGraph::<usize, ()>::new();
    let mut index_of: HashMap<LocalHandle, _> = HashMap::new();
    for (i, r) in resources.iter().enumerate() {
        index_of.insert(r.handle.clone(), graph.add_node(i));
    }
    for r in resources {
        let this_idx = index_of[&r.handle];
        for value in r.attributes.values() {
            if let Some(referenced) = value.as_local_handle() {
                if let Some(&dep_idx) = index_of.get(referenced) {
                    graph.add_edge(dep_idx, this_idx, ());
                }
            }
        }
    }
    let order = toposort(&graph, None).map_err(|_| {
        ManagerError::PluginProtocolError("reference cycle among reported resources".into())
    })?;
    Ok(order.into_iter().map(|idx| graph[idx]).collect())
}

fn id_str_for(session: &PluginSession, resource: &PluginResource) -> Result<String, ManagerError> {
    let mut values = Vec::with_capacity(resource.id_tuple.len());
    for value in &resource.id_tuple {
        let resolved = match value {
            AttributeValue::ReferenceLocal(handle) => {
                let target = session.local_to_global.get(handle).copied().ok_or_else(|| {
                    ManagerError::PluginProtocolError(format!("unresolved id-tuple reference {handle}"))
                })?;
                serde_json::json!(target.0)
            }
            other => other.to_json_value(),
        };
        values.push(resolved);
    }
    serde_json::to_string(&values).map_err(|e| ManagerError::PluginProtocolError(e.to_string()))
}

pub(crate) fn upsert_attributes(
    inner: &mut Inner,
    session: &PluginSession,
    record_id: RecordId,
    attributes: &HashMap<String, AttributeValue>,
) -> Result<(), ManagerError> {
    for (key, value) in attributes {
        let attribute = match value {
            AttributeValue::ReferenceLocal(handle) => {
                let target = session.local_to_global.get(handle).copied().ok_or_else(|| {
                    ManagerError::PluginProtocolError(format!(
                        "unresolved reference attribute {key} -> {handle}"
                    ))
                })?;
                ResourceAttribute::Reference { record_id, key: key.clone(), value_id: target }
            }
            AttributeValue::Reference(target) => {
                ResourceAttribute::Reference { record_id, key: key.clone(), value_id: *target }
            }
            other => ResourceAttribute::Serialized {
                record_id,
                key: key.clone(),
                value: other.to_json_value(),
            },
        };
        inner.store.upsert_attribute(&attribute)?;
    }
    Ok(())
}

/// Adds `child -> parent`, tolerating (and logging) a rejected cycle rather
/// than failing the whole entry point — graph-traversal problems are
/// best-effort (§7).
fn add_edge(inner: &mut Inner, child: RecordId, parent: RecordId) -> Result<(), ManagerError> {
    if child == parent {
        return Ok(());
    }
    if inner.edges.add_parent(child, parent).is_err() {
        tracing::warn!(%child, %parent, "skipping parent edge that would close a cycle");
        return Ok(());
    }
    if let Some(mut record) = inner.store.get_record(child)? {
        record.parents.insert(parent);
        inner.store.upsert_record(&record)?;
    }
    Ok(())
}

/// §4.6 step 4: a newly persisted record both picks up parents it
/// subscribes to (`what_provides`) and becomes a parent of records that
/// subscribe to it (`what_subscribes`).
fn wire_subscriptions(inner: &mut Inner, record_id: RecordId, resource: &PluginResource) -> Result<(), ManagerError> {
    let registry = inner.registry.clone();

    if let Some(descriptor) = registry.descriptor(resource.class_id) {
        for sub in descriptor.subscriptions() {
            let value = (sub.value_fn)(resource);
            for provider in inner.subscribers.what_provides(sub.key, &value) {
                add_edge(inner, record_id, provider)?;
            }
        }
    }

    for (_, descriptor) in registry.iter() {
        for sub in descriptor.subscriptions() {
            if sub.subscribe_to == resource.class_id {
                let value = (sub.value_fn)(resource);
                for subscriber in inner.subscribers.what_subscribes(sub.key, &value) {
                    add_edge(inner, subscriber, record_id)?;
                }
            }
        }
    }

    Ok(())
}

/// §4.6 step 6: if `record_id` (a `LogicalDrive`) ends up with exactly one
/// `LogicalDrive` ancestor, its label flows to that ancestor's downstream
/// Volume.
fn recompute_logical_drive_label(inner: &mut Inner, record_id: RecordId) -> Result<(), ManagerError> {
    let Some(class_id) = inner.classes.get(record_id) else {
        return Ok(());
    };
    if !inner.registry.markers(class_id).is_logical_drive {
        return Ok(());
    }

    let logical_drive_parents: Vec<RecordId> = inner
        .edges
        .get_parents(record_id)
        .into_iter()
        .filter(|p| {
            inner
                .classes
                .get(*p)
                .map(|c| inner.registry.markers(c).is_logical_drive)
                .unwrap_or(false)
        })
        .collect();

    if logical_drive_parents.len() == 1 {
        let label = crate::labels::get_label(inner, logical_drive_parents[0])?;
        inner.label_cache.insert(record_id, label.clone());
        if let Some(mut volume) = inner.store.volume_for_drive(record_id)? {
            volume.label = label;
            inner.store.upsert_volume(&volume)?;
        }
    }

    Ok(())
}

/// `_persist_new_resources` — §4.6 steps 1-6.
pub(crate) fn persist_new_resources(
    inner: &mut Inner,
    session: &mut PluginSession,
    resources: &[PluginResource],
) -> Result<Vec<RecordId>, ManagerError> {
    let order = order_resources(resources)?;
    let mut created = Vec::new();

    for idx in order {
        let resource = &resources[idx];
        if resource.handle_global || session.local_to_global.contains_key(&resource.handle) {
            continue;
        }

        let descriptor = inner.registry.descriptor(resource.class_id).ok_or_else(|| {
            ManagerError::PluginProtocolError(format!("unknown class {}", resource.class_id))
        })?;

        let id_str = id_str_for(session, resource)?;
        let scope_id = match descriptor.id_kind {
            IdKind::Scoped => Some(session.scannable_id),
            IdKind::Global => None,
        };

        let (record_id, was_created) =
            inner.store.get_or_create_record(resource.class_id, &id_str, scope_id)?;
        session.bind(resource.handle.clone(), record_id);
        inner.classes.add_record(record_id, resource.class_id);
        inner.label_cache.remove(&record_id);

        if let Some(mut record) = inner.store.get_record(record_id)? {
            record.reported_by.insert(session.scannable_id);
            inner.store.upsert_record(&record)?;
        }

        if was_created {
            inner.store.append_learn_event(&LearnEvent {
                record_id,
                resource_class_id: resource.class_id,
                storage_id_str: id_str.clone(),
                created_at: chrono::Utc::now(),
            })?;
            created.push(record_id);
        }

        upsert_attributes(inner, session, record_id, &resource.attributes)?;
        inner.subscribers.add_resource(&inner.registry.clone(), record_id, resource);
        wire_subscriptions(inner, record_id, resource)?;

        for parent_handle in &resource.parents {
            match session.local_to_global.get(parent_handle).copied() {
                Some(parent_id) => add_edge(inner, record_id, parent_id)?,
                None => {
                    return Err(ManagerError::PluginProtocolError(format!(
                        "unresolved parent handle {parent_handle}"
                    )))
                }
            }
        }

        if was_created {
            recompute_logical_drive_label(inner, record_id)?;
        }
    }

    Ok(created)
}

/// `_persist_created_hosts`.
pub(crate) fn persist_created_hosts(
    inner: &mut Inner,
    session: &PluginSession,
    resources: &[PluginResource],
) -> Result<(), ManagerError> {
    for resource in resources {
        if !inner.registry.markers(resource.class_id).is_virtual_machine {
            continue;
        }
        let Some(record_id) = session.local_to_global.get(&resource.handle).copied() else {
            continue;
        };
        if inner.store.attribute(record_id, "host_id")?.is_some() {
            continue;
        }

        let address = resource
            .attributes
            .get("address")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let existing = inner.store.managed_hosts()?.into_iter().find(|h| h.address == address);
        let host_id = match existing {
            Some(host) => host.id,
            None => inner.scheduler.create_host_ssh(&address)?.0,
        };

        inner.store.upsert_attribute(&ResourceAttribute::Serialized {
            record_id,
            key: "host_id".into(),
            value: serde_json::json!(host_id.0),
        })?;
    }
    Ok(())
}

/// `_cull_lost_resources` — both branches of §4.6's cull rule.
pub(crate) fn cull_lost_resources(
    inner: &mut Inner,
    session: &PluginSession,
    reported: &HashSet<RecordId>,
) -> Result<(), ManagerError> {
    for record in inner.store.records_scoped_to(session.scannable_id)? {
        if !reported.contains(&record.id) {
            crate::delete::delete_resource(inner, record.id)?;
        }
    }

    for mut record in inner.store.all_records()? {
        if record.storage_id_scope_id.is_some() {
            continue;
        }
        if record.reported_by.contains(&session.scannable_id) && !reported.contains(&record.id) {
            record.reported_by.remove(&session.scannable_id);
            if record.reported_by.is_empty() {
                crate::delete::delete_resource(inner, record.id)?;
            } else {
                inner.store.upsert_record(&record)?;
            }
        }
    }

    Ok(())
}
