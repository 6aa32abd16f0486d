use std::collections::HashSet;

use stratum_domain::RecordId;
use stratum_store::ResourceAttribute;

use crate::error::ManagerError;
use crate::manager::Inner;

/// Phase 1 (§4.10): scoped dependents of a scannable/hostside target, plus
/// global records orphaned by removing the target's `reported_by` entry,
/// with the target itself last.
fn phase1_ordered_dependencies(inner: &mut Inner, target: RecordId) -> Result<Vec<RecordId>, ManagerError> {
    let mut ordered = Vec::new();

    let markers = inner
        .classes
        .get(target)
        .map(|c| inner.registry.markers(c))
        .unwrap_or_default();

    if markers.is_scannable || markers.is_hostside {
        let scannable_id = stratum_domain::ScannableId::from(target);
        for record in inner.store.records_scoped_to(scannable_id)? {
            ordered.push(record.id);
        }

        for mut record in inner.store.all_records()? {
            if record.storage_id_scope_id.is_some() {
                continue;
            }
            if !record.reported_by.remove(&scannable_id) {
                continue;
            }
            inner.store.upsert_record(&record)?;
            let still_scannable = inner
                .classes
                .get(record.id)
                .map(|c| inner.registry.markers(c))
                .map(|m| m.is_scannable || m.is_hostside)
                .unwrap_or(false);
            if record.reported_by.is_empty() && !still_scannable {
                ordered.push(record.id);
            }
        }
    }

    if markers.is_scannable {
        clear_offline_alerts(inner, target)?;
    }

    ordered.push(target);
    Ok(ordered)
}

fn clear_offline_alerts(inner: &mut Inner, target: RecordId) -> Result<(), ManagerError> {
    if let Some(alert) = inner.store.active_alert(target, "StorageResourceOffline", None)? {
        inner.store.clear_alert(alert.alert_state_id)?;
        inner.store.delete_propagated_alerts_of(alert.alert_state_id)?;
        inner.active_alerts.remove(&(target, "StorageResourceOffline".to_string()));
    }
    Ok(())
}

/// Phase 2: transitively follow `ResourceReference` attributes into
/// `phase1` records, tolerating cycles via a visited set.
fn extend_with_referrers(inner: &Inner, phase1: Vec<RecordId>) -> Result<Vec<RecordId>, ManagerError> {
    let mut ordered = phase1.clone();
    let mut visited: HashSet<RecordId> = phase1.iter().copied().collect();
    let mut frontier = phase1;

    while let Some(target) = frontier.pop() {
        for record in inner.store.all_records()? {
            if visited.contains(&record.id) {
                continue;
            }
            let references_target = inner
                .store
                .attributes_of(record.id)?
                .into_iter()
                .any(|attr| matches!(attr, ResourceAttribute::Reference { value_id, .. } if value_id == target));
            if references_target {
                visited.insert(record.id);
                ordered.push(record.id);
                frontier.push(record.id);
            }
        }
    }

    Ok(ordered)
}

/// `delete_resource` — §4.10 phases 1-2 plus the seven-step teardown.
pub(crate) fn delete_resource(inner: &mut Inner, target: RecordId) -> Result<(), ManagerError> {
    let phase1 = phase1_ordered_dependencies(inner, target)?;
    let ordered = extend_with_referrers(inner, phase1)?;
    let doomed: HashSet<RecordId> = ordered.iter().copied().collect();

    // Step 1: drop persisted parent edges whose reverse side is doomed.
    for &id in &ordered {
        inner.edges.remove_node(id);
        if let Some(mut record) = inner.store.get_record(id)? {
            record.parents.retain(|p| !doomed.contains(p));
            inner.store.upsert_record(&record)?;
        }
    }

    // Step 2-3: VolumeNode/Volume teardown for every doomed record.
    for &id in &ordered {
        if let Some(node) = inner.store.volume_node_for_resource(id)? {
            teardown_volume_node(inner, node)?;
        }
    }

    // Step 4: alerts, durable and propagated.
    for &id in &ordered {
        clear_all_alerts(inner, id)?;
    }

    // Step 5: statistics.
    for &id in &ordered {
        clear_statistics(inner, id)?;
    }

    // Step 6: in-memory indices and session bookkeeping.
    for &id in &ordered {
        inner.subscribers.remove_resource(id);
        inner.classes.remove_record(id);
        inner.label_cache.remove(&id);
        for session in inner.sessions.values_mut() {
            session.forget(id);
        }
    }

    // Step 7: learn events, attributes, records.
    for &id in &ordered {
        inner.store.delete_attributes_of(id)?;
        inner.store.delete_record(id)?;
    }

    Ok(())
}

fn teardown_volume_node(inner: &mut Inner, mut node: stratum_store::VolumeNode) -> Result<(), ManagerError> {
    let pinned = inner
        .store
        .managed_target_for_volume(node.volume_id)?
        .map(|target| {
            inner
                .store
                .managed_hosts()
                .ok()
                .and_then(|hosts| hosts.into_iter().find(|h| h.scannable_id == Some(node.host_id)))
                .and_then(|host| inner.store.managed_target_mount_for(target.id, host.id).ok().flatten())
        })
        .unwrap_or(None)
        .is_some();

    if pinned {
        tracing::info!(node = ?node.id, "leaving VolumeNode pinned by a ManagedTargetMount in place");
    } else {
        node.not_deleted = false;
        inner.store.upsert_volume_node(&node)?;
    }

    let remaining_live = inner
        .store
        .volume_nodes_of_volume(node.volume_id)?
        .into_iter()
        .any(|n| n.not_deleted && n.id != node.id);
    let has_target = inner.store.managed_target_for_volume(node.volume_id)?.is_some();

    if let Some(mut volume) = inner.store.get_volume(node.volume_id)? {
        if !has_target && !remaining_live {
            volume.not_deleted = false;
            inner.store.upsert_volume(&volume)?;
        }
    }

    Ok(())
}

fn clear_all_alerts(inner: &mut Inner, record_id: RecordId) -> Result<(), ManagerError> {
    let mut keys: Vec<String> = inner
        .active_alerts
        .keys()
        .filter(|(r, _)| *r == record_id)
        .map(|(_, k)| k.clone())
        .collect();
    keys.sort();
    keys.dedup();
    for alert_class in keys {
        if let Some(alert) = inner.store.active_alert(record_id, &alert_class, None)? {
            inner.store.delete_propagated_alerts_of(alert.alert_state_id)?;
            inner.store.clear_alert(alert.alert_state_id)?;
        }
        inner.active_alerts.remove(&(record_id, alert_class));
    }
    Ok(())
}

fn clear_statistics(inner: &mut Inner, record_id: RecordId) -> Result<(), ManagerError> {
    for stat in inner.store.statistics_of(record_id)? {
        inner.metrics.clear(record_id, &stat.name);
        inner.store.delete_statistic(record_id, &stat.name)?;
    }
    Ok(())
}
