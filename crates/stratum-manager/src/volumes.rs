use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use stratum_domain::{RecordId, ScannableId};
use stratum_store::{HaClusterId, ResourceAttribute, Volume, VolumeNode};

use crate::affinity::{self, Candidate, HostCounters};
use crate::error::ManagerError;
use crate::manager::Inner;

fn attr_as_u64(attr: ResourceAttribute) -> Option<u64> {
    match attr {
        ResourceAttribute::Serialized { value, .. } => value.as_u64(),
        ResourceAttribute::Reference { .. } => None,
    }
}

fn attr_as_string(attr: ResourceAttribute) -> Option<String> {
    match attr {
        ResourceAttribute::Serialized { value, .. } => value.as_str().map(|s| s.to_string()),
        ResourceAttribute::Reference { .. } => None,
    }
}

fn attr_as_path(attr: ResourceAttribute) -> Option<PathBuf> {
    attr_as_string(attr).map(PathBuf::from)
}

fn nearest_logical_drive_ancestor(inner: &Inner, node: RecordId) -> Option<RecordId> {
    let mut stack = inner.edges.get_parents(node);
    let mut seen = HashSet::new();
    while let Some(candidate) = stack.pop() {
        if !seen.insert(candidate) {
            continue;
        }
        if inner
            .classes
            .get(candidate)
            .map(|c| inner.registry.markers(c).is_logical_drive)
            .unwrap_or(false)
        {
            return Some(candidate);
        }
        stack.extend(inner.edges.get_parents(candidate));
    }
    None
}

/// §4.7 step 5 occupancy check: walk descendants, not recursing past
/// another `LogicalDrive` boundary.
fn is_occupied(inner: &Inner, drive_id: RecordId) -> bool {
    let mut stack = inner.edges.get_children(drive_id);
    let mut seen = HashSet::new();
    while let Some(child) = stack.pop() {
        if !seen.insert(child) {
            continue;
        }
        let markers = inner
            .classes
            .get(child)
            .map(|c| inner.registry.markers(c))
            .unwrap_or_default();
        if markers.is_logical_drive_occupier {
            return true;
        }
        if markers.is_logical_drive {
            continue;
        }
        stack.extend(inner.edges.get_children(child));
    }
    false
}

/// §4.7 label rule.
fn label_for_drive(inner: &mut Inner, drive_id: RecordId) -> Result<String, ManagerError> {
    let ancestors: Vec<RecordId> = inner
        .edges
        .get_parents(drive_id)
        .into_iter()
        .filter(|p| {
            inner
                .classes
                .get(*p)
                .map(|c| inner.registry.markers(c).is_logical_drive)
                .unwrap_or(false)
        })
        .collect();
    if ancestors.len() == 1 {
        crate::labels::get_label(inner, ancestors[0])
    } else {
        crate::labels::get_label(inner, drive_id)
    }
}

/// Sum of nearest `PathWeight` ancestors' declared `weight` attribute, or
/// `None` if the node has no such ancestor at all (§4.8 weighted path).
fn path_weight_of(inner: &Inner, node: RecordId) -> Option<i64> {
    let mut total = 0i64;
    let mut found = false;
    let mut stack = inner.edges.get_parents(node);
    let mut seen = HashSet::new();
    while let Some(candidate) = stack.pop() {
        if !seen.insert(candidate) {
            continue;
        }
        if inner
            .classes
            .get(candidate)
            .map(|c| inner.registry.markers(c).is_path_weight)
            .unwrap_or(false)
        {
            if let Ok(Some(attr)) = inner.store.attribute(candidate, "weight") {
                if let Some(w) = attr_as_u64(attr) {
                    total += w as i64;
                    found = true;
                }
            }
            continue;
        }
        stack.extend(inner.edges.get_parents(candidate));
    }
    if found {
        Some(total)
    } else {
        None
    }
}

fn host_info(inner: &Inner, host: ScannableId) -> (String, Option<HaClusterId>) {
    inner
        .store
        .managed_hosts()
        .ok()
        .and_then(|hosts| hosts.into_iter().find(|h| h.scannable_id == Some(host)))
        .map(|h| (h.fqdn, h.ha_cluster_id))
        .unwrap_or_else(|| (host.to_string(), None))
}

/// `_persist_lun_updates` — §4.7 steps 1-9 plus §4.8 affinity, only run
/// when the scannable carries `ResourceMarkers::is_hostside`.
pub(crate) fn persist_lun_updates(inner: &mut Inner, scannable_id: ScannableId) -> Result<(), ManagerError> {
    let record_id = RecordId::from(scannable_id);
    let Some(class_id) = inner.classes.get(record_id) else {
        return Ok(());
    };
    if !inner.registry.markers(class_id).is_hostside {
        return Ok(());
    }

    let scoped = inner.store.records_scoped_to(scannable_id)?;
    let device_nodes: Vec<RecordId> = scoped
        .iter()
        .map(|r| r.id)
        .filter(|id| {
            inner
                .classes
                .get(*id)
                .map(|c| inner.registry.markers(c).is_device_node)
                .unwrap_or(false)
                && inner.edges.get_children(*id).is_empty()
        })
        .collect();

    let mut candidates_by_drive: HashMap<RecordId, Vec<RecordId>> = HashMap::new();
    for node in &device_nodes {
        match nearest_logical_drive_ancestor(inner, *node) {
            Some(drive_id) => candidates_by_drive.entry(drive_id).or_default().push(*node),
            None => tracing::debug!(node = %node, "device node has no LogicalDrive ancestor yet"),
        }
    }

    let mut counters = HostCounters::new();

    // HashMap order is unspecified; sort drives lexicographically by label
    // before balancing so which host wins primary on a tie is deterministic
    // (§4.8 tie-break rule) rather than dependent on hash iteration order.
    let mut drives: Vec<(RecordId, Vec<RecordId>, String)> = Vec::with_capacity(candidates_by_drive.len());
    for (drive_id, nodes) in candidates_by_drive {
        let label = label_for_drive(inner, drive_id)?;
        drives.push((drive_id, nodes, label));
    }
    drives.sort_by(|a, b| a.2.cmp(&b.2));

    for (drive_id, nodes, label) in drives {
        let mut volume = inner.store.volume_for_drive(drive_id)?;

        if volume.is_none() {
            if is_occupied(inner, drive_id) {
                continue;
            }
            let size = inner.store.attribute(drive_id, "size")?.and_then(attr_as_u64);
            let filesystem_type = inner.store.attribute(drive_id, "filesystem_type")?.and_then(attr_as_string);
            let new_volume = Volume {
                id: inner.store.allocate_volume_id()?,
                storage_resource_id: drive_id,
                size,
                filesystem_type,
                label,
                not_deleted: true,
            };
            inner.store.upsert_volume(&new_volume)?;
            volume = Some(new_volume);
        }
        let volume = volume.unwrap();

        create_missing_nodes(inner, &volume, scannable_id, &nodes)?;
        run_affinity(inner, &volume, &mut counters)?;
    }

    sweep_orphaned_nodes(inner, scannable_id, &device_nodes)?;

    Ok(())
}

/// §4.7 steps 6-7: create a `VolumeNode` per candidate path unless one
/// already exists at `(host, path)`, preferring a single `/dev/mapper/`
/// path over any sibling candidates for the same drive.
fn create_missing_nodes(
    inner: &mut Inner,
    volume: &Volume,
    scannable_id: ScannableId,
    nodes: &[RecordId],
) -> Result<(), ManagerError> {
    let mut paths: Vec<(RecordId, PathBuf)> = Vec::new();
    for node in nodes {
        if let Some(attr) = inner.store.attribute(*node, "path")? {
            if let Some(path) = attr_as_path(attr) {
                paths.push((*node, path));
            }
        }
    }

    let mapper_indices: Vec<usize> = paths
        .iter()
        .enumerate()
        .filter(|(_, (_, p))| p.starts_with("/dev/mapper/"))
        .map(|(i, _)| i)
        .collect();
    let preferred = if mapper_indices.len() == 1 { Some(mapper_indices[0]) } else { None };

    for (i, (node, path)) in paths.iter().enumerate() {
        if paths.len() > 1 {
            if let Some(pref) = preferred {
                if i != pref {
                    if let Some(existing) = inner.store.volume_node_for_resource(*node)? {
                        if record_is_pinned(inner, &existing)? {
                            let mut disconnected = existing.clone();
                            disconnected.storage_resource_id = None;
                            inner.store.upsert_volume_node(&disconnected)?;
                        } else {
                            inner.store.delete_volume_node(existing.id)?;
                        }
                    }
                    continue;
                }
            }
        }

        if inner.store.volume_node_at(volume.id, scannable_id, path)?.is_some() {
            continue;
        }

        let new_node = VolumeNode {
            id: inner.store.allocate_volume_node_id()?,
            volume_id: volume.id,
            host_id: scannable_id,
            path: path.clone(),
            storage_resource_id: Some(*node),
            primary: false,
            use_: false,
            not_deleted: true,
        };
        inner.store.upsert_volume_node(&new_node)?;
    }

    Ok(())
}

/// §4.8: rebalance every live `VolumeNode` of `volume`, across whichever
/// hosts have reported one.
fn run_affinity(inner: &mut Inner, volume: &Volume, counters: &mut HostCounters) -> Result<(), ManagerError> {
    let live_nodes = inner.store.volume_nodes_of_volume(volume.id)?;
    if live_nodes.is_empty() {
        return Ok(());
    }

    let candidates: Vec<Candidate> = live_nodes
        .iter()
        .map(|n| {
            let weight = n.storage_resource_id.and_then(|r| path_weight_of(inner, r));
            let (fqdn, ha_cluster) = host_info(inner, n.host_id);
            Candidate { host: n.host_id, fqdn, ha_cluster, weight }
        })
        .collect();

    let placements = affinity::balance(&candidates, counters);
    for (node, placement) in live_nodes.iter().zip(placements.iter()) {
        if node.primary != placement.primary || node.use_ != placement.use_ {
            let mut updated = node.clone();
            updated.primary = placement.primary;
            updated.use_ = placement.use_;
            inner.store.upsert_volume_node(&updated)?;
        }
    }

    Ok(())
}

/// §4.7 step 9: a previously-usable `VolumeNode` whose backing resource is
/// no longer a leaf (or no longer exists) either gets deleted, or, if
/// pinned by a `ManagedTargetMount`, disconnected instead.
fn sweep_orphaned_nodes(
    inner: &mut Inner,
    scannable_id: ScannableId,
    usable_leaves: &[RecordId],
) -> Result<(), ManagerError> {
    let usable: HashSet<RecordId> = usable_leaves.iter().copied().collect();
    for record in inner.store.records_scoped_to(scannable_id)? {
        if usable.contains(&record.id) {
            continue;
        }
        let is_device_node = inner
            .classes
            .get(record.id)
            .map(|c| inner.registry.markers(c).is_device_node)
            .unwrap_or(false);
        if !is_device_node {
            continue;
        }
        if let Some(mut node) = inner.store.volume_node_for_resource(record.id)? {
            if record_is_pinned(inner, &node)? {
                node.storage_resource_id = None;
                inner.store.upsert_volume_node(&node)?;
            } else {
                inner.store.delete_volume_node(node.id)?;
            }
        }
    }
    Ok(())
}

fn record_is_pinned(inner: &Inner, node: &VolumeNode) -> Result<bool, ManagerError> {
    if let Some(target) = inner.store.managed_target_for_volume(node.volume_id)? {
        let hosts = inner.store.managed_hosts()?;
        if let Some(host) = hosts.into_iter().find(|h| h.scannable_id == Some(node.host_id)) {
            return Ok(inner.store.managed_target_mount_for(target.id, host.id)?.is_some());
        }
    }
    Ok(false)
}
