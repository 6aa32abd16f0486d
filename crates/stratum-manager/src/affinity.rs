use std::collections::HashMap;

use stratum_domain::ScannableId;
use stratum_store::HaClusterId;

/// One live `VolumeNode` of the volume currently being balanced (§4.8).
/// Deliberately free of any `ResourceManager`/store dependency so it is
/// unit-testable as a pure function.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub host: ScannableId,
    pub fqdn: String,
    pub ha_cluster: Option<HaClusterId>,
    /// Sum of nearest `PathWeight` ancestor weights; `None` if this
    /// candidate has no such ancestor at all.
    pub weight: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Placement {
    pub primary: bool,
    pub use_: bool,
}

/// Per-host running counters threaded across every Volume balanced in one
/// `persist_lun_updates` pass, so later placements see earlier ones
/// (§4.8 "Running counters ... updated as each Volume is placed").
#[derive(Debug, Default)]
pub struct HostCounters {
    primary_count: HashMap<ScannableId, u32>,
    used_count: HashMap<ScannableId, u32>,
}

impl HostCounters {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, host: ScannableId, placement: Placement) {
        if placement.primary {
            *self.primary_count.entry(host).or_insert(0) += 1;
        }
        if placement.use_ {
            *self.used_count.entry(host).or_insert(0) += 1;
        }
    }
}

/// Decide primary/use flags for every candidate of one Volume, returned in
/// the same order as `candidates`.
pub fn balance(candidates: &[Candidate], counters: &mut HostCounters) -> Vec<Placement> {
    if candidates.is_empty() {
        return Vec::new();
    }
    if candidates.iter().all(|c| c.weight.is_some()) {
        balance_weighted(candidates, counters)
    } else {
        balance_unweighted(candidates, counters)
    }
}

/// Weighted path: highest-weighted candidate is primary, second-highest is
/// a non-primary "use" node, the rest unused. Ties broken by input order
/// (stable sort).
fn balance_weighted(candidates: &[Candidate], counters: &mut HostCounters) -> Vec<Placement> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| candidates[b].weight.unwrap().cmp(&candidates[a].weight.unwrap()));

    let mut placements = vec![Placement::default(); candidates.len()];
    if let Some(&first) = order.first() {
        placements[first] = Placement { primary: true, use_: true };
        counters.record(candidates[first].host, placements[first]);
    }
    if let Some(&second) = order.get(1) {
        placements[second] = Placement { primary: false, use_: true };
        counters.record(candidates[second].host, placements[second]);
    }
    placements
}

/// Unweighted fallback balancing (§4.8): primary by fewest existing
/// primary mounts (tie-break: lexicographically smallest FQDN), secondary
/// restricted to the primary's HA cluster by fewest used nodes.
fn balance_unweighted(candidates: &[Candidate], counters: &mut HostCounters) -> Vec<Placement> {
    let mut placements = vec![Placement::default(); candidates.len()];

    let Some(primary_idx) = (0..candidates.len()).min_by(|&a, &b| {
        let pa = counters.primary_count.get(&candidates[a].host).copied().unwrap_or(0);
        let pb = counters.primary_count.get(&candidates[b].host).copied().unwrap_or(0);
        pa.cmp(&pb).then_with(|| candidates[a].fqdn.cmp(&candidates[b].fqdn))
    }) else {
        return placements;
    };

    placements[primary_idx] = Placement { primary: true, use_: true };
    counters.record(candidates[primary_idx].host, placements[primary_idx]);

    if let Some(cluster) = candidates[primary_idx].ha_cluster {
        let secondary_idx = (0..candidates.len())
            .filter(|&i| i != primary_idx && candidates[i].ha_cluster == Some(cluster))
            .min_by(|&a, &b| {
                let ua = counters.used_count.get(&candidates[a].host).copied().unwrap_or(0);
                let ub = counters.used_count.get(&candidates[b].host).copied().unwrap_or(0);
                ua.cmp(&ub)
            });
        if let Some(secondary_idx) = secondary_idx {
            placements[secondary_idx] = Placement { primary: false, use_: true };
            counters.record(candidates[secondary_idx].host, placements[secondary_idx]);
        }
    }

    placements
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(host: u64, fqdn: &str, cluster: Option<u64>, weight: Option<i64>) -> Candidate {
        Candidate {
            host: ScannableId(host),
            fqdn: fqdn.to_string(),
            ha_cluster: cluster.map(HaClusterId),
            weight,
        }
    }

    #[test]
    fn weighted_path_picks_primary_and_secondary_by_weight() {
        let candidates = vec![
            candidate(1, "a", None, Some(5)),
            candidate(2, "b", None, Some(9)),
            candidate(3, "c", None, Some(1)),
        ];
        let mut counters = HostCounters::new();
        let placements = balance(&candidates, &mut counters);
        assert_eq!(placements[1], Placement { primary: true, use_: true });
        assert_eq!(placements[0], Placement { primary: false, use_: true });
        assert_eq!(placements[2], Placement { primary: false, use_: false });
    }

    #[test]
    fn unweighted_fallback_picks_least_loaded_primary() {
        let candidates = vec![candidate(1, "b-host", None, None), candidate(2, "a-host", None, None)];
        let mut counters = HostCounters::new();
        let placements = balance(&candidates, &mut counters);
        // tie on primary count (0 each) -> lexicographically smallest FQDN wins
        assert_eq!(placements[1], Placement { primary: true, use_: true });
        assert_eq!(placements[0], Placement { primary: false, use_: false });
    }

    #[test]
    fn secondary_restricted_to_primarys_ha_cluster() {
        let candidates = vec![
            candidate(1, "a", Some(100), None),
            candidate(2, "b", Some(100), None),
            candidate(3, "c", Some(200), None),
        ];
        let mut counters = HostCounters::new();
        let placements = balance(&candidates, &mut counters);
        assert_eq!(placements[0], Placement { primary: true, use_: true });
        assert_eq!(placements[1], Placement { primary: false, use_: true });
        assert_eq!(placements[2], Placement { primary: false, use_: false });
    }

    #[test]
    fn no_secondary_when_primary_has_no_ha_cluster() {
        let candidates = vec![candidate(1, "a", None, None), candidate(2, "b", Some(1), None)];
        let mut counters = HostCounters::new();
        let placements = balance(&candidates, &mut counters);
        assert_eq!(placements[0], Placement { primary: true, use_: true });
        assert_eq!(placements[1], Placement { primary: false, use_: false });
    }

    #[test]
    fn counters_carry_across_volumes() {
        let mut counters = HostCounters::new();
        let first = vec![candidate(1, "a", None, None), candidate(2, "b", None, None)];
        let placements1 = balance(&first, &mut counters);
        assert!(placements1[0].primary);

        let second = vec![candidate(1, "a", None, None), candidate(2, "b", None, None)];
        let placements2 = balance(&second, &mut counters);
        // host 1 already has one primary mount; host 2 should win this time.
        assert!(placements2[1].primary);
    }
}
