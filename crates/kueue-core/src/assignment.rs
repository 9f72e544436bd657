//! Flavor assignment engine — `spec.md` §4.4: decide, for a pending
//! workload's PodSets, which ResourceFlavor covers each requested resource
//! and whether admission needs only the queue's own nominal quota
//! (`Fit`), borrowing from the cohort (`BorrowFit`), or preempting other
//! workloads (`Preempt`).

use std::collections::BTreeMap;

use kueue_api::queue::{ClusterQueueSpec, WhenCanBorrow, WhenCanPreempt};
use kueue_api::resource::{FlavorName, FlavorResourceKey, Quantity, ResourceName};
use kueue_api::{PodSet, PodSetAssignment};

use crate::resources;
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Mode {
    Fit,
    BorrowFit,
    Preempt,
}

#[derive(Debug, Clone)]
pub struct Assignment {
    pub pod_sets: Vec<PodSetAssignment>,
    pub mode: Mode,
}

/// Ordered most-to-least informative, matching `spec.md` §4.4's
/// "missing-flavor > insufficient-quota > needs-preemption-disallowed".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoFitReason {
    FlavorNotFound { flavor: FlavorName },
    InsufficientQuota { flavor: FlavorName, resource: ResourceName },
    PreemptionNotAllowed { flavor: FlavorName },
}

impl NoFitReason {
    fn precedence(&self) -> u8 {
        match self {
            NoFitReason::FlavorNotFound { .. } => 0,
            NoFitReason::InsufficientQuota { .. } => 1,
            NoFitReason::PreemptionNotAllowed { .. } => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NoFit {
    pub pod_set: String,
    pub reasons: Vec<NoFitReason>,
}

impl NoFit {
    /// The single most informative reason, per `spec.md` §4.4's ordering.
    pub fn primary_reason(&self) -> Option<&NoFitReason> {
        self.reasons.iter().min_by_key(|r| r.precedence())
    }
}

/// Attempts to assign every PodSet of a pending workload against one
/// ClusterQueue's current Snapshot state. Declaration order (both of
/// resource groups and of flavors within a group) governs tie-breaking,
/// per `spec.md` §4.4 step 3.
pub fn assign(
    queue_spec: &ClusterQueueSpec,
    cluster_queue: &str,
    pod_sets: &[PodSet],
    snapshot: &Snapshot,
    partial_admission_enabled: bool,
) -> Result<Assignment, NoFit> {
    let mut assignments = Vec::with_capacity(pod_sets.len());
    let mut overall_mode = Mode::Fit;

    for pod_set in pod_sets {
        let (flavors, mode, count) =
            assign_pod_set(queue_spec, cluster_queue, pod_set, snapshot, partial_admission_enabled)?;
        overall_mode = overall_mode.max(mode);
        assignments.push(PodSetAssignment { name: pod_set.name.clone(), flavors, count });
    }

    Ok(Assignment { pod_sets: assignments, mode: overall_mode })
}

fn assign_pod_set(
    queue_spec: &ClusterQueueSpec,
    cluster_queue: &str,
    pod_set: &PodSet,
    snapshot: &Snapshot,
    partial_admission_enabled: bool,
) -> Result<(BTreeMap<ResourceName, FlavorName>, Mode, u32), NoFit> {
    let full_count = pod_set.count;
    let min_count = pod_set.effective_min_count();

    let mut last_err = None;
    let floor = if partial_admission_enabled { min_count } else { full_count };
    let mut count = full_count;
    loop {
        match assign_pod_set_at_count(queue_spec, cluster_queue, pod_set, count, snapshot) {
            Ok((flavors, mode)) => return Ok((flavors, mode, count)),
            Err(err) => {
                let keep_trying = count > floor
                    && err.reasons.iter().all(|r| matches!(r, NoFitReason::InsufficientQuota { .. }));
                last_err = Some(err);
                if !keep_trying {
                    break;
                }
                count -= 1;
            }
        }
    }
    Err(last_err.unwrap_or(NoFit { pod_set: pod_set.name.clone(), reasons: vec![] }))
}

fn assign_pod_set_at_count(
    queue_spec: &ClusterQueueSpec,
    cluster_queue: &str,
    pod_set: &PodSet,
    count: u32,
    snapshot: &Snapshot,
) -> Result<(BTreeMap<ResourceName, FlavorName>, Mode), NoFit> {
    let mut flavors = BTreeMap::new();
    let mut mode = Mode::Fit;
    let mut reasons = Vec::new();

    for group in &queue_spec.resource_groups {
        let requested: Vec<&ResourceName> = group
            .covered_resources
            .iter()
            .filter(|r| pod_set.request.contains_key(*r))
            .collect();
        if requested.is_empty() {
            continue;
        }

        match assign_group(group, &requested, pod_set, count, cluster_queue, snapshot, &queue_spec.flavor_fungibility.when_can_borrow, &queue_spec.flavor_fungibility.when_can_preempt) {
            Ok((flavor, group_mode)) => {
                for resource in requested {
                    flavors.insert(resource.clone(), flavor.clone());
                }
                mode = mode.max(group_mode);
            }
            Err(mut group_reasons) => reasons.append(&mut group_reasons),
        }
    }

    if reasons.is_empty() {
        Ok((flavors, mode))
    } else {
        Err(NoFit { pod_set: pod_set.name.clone(), reasons })
    }
}

fn assign_group(
    group: &kueue_api::ResourceGroup,
    requested: &[&ResourceName],
    pod_set: &PodSet,
    count: u32,
    cluster_queue: &str,
    snapshot: &Snapshot,
    when_can_borrow: &WhenCanBorrow,
    when_can_preempt: &WhenCanPreempt,
) -> Result<(FlavorName, Mode), Vec<NoFitReason>> {
    let Some(cq) = snapshot.cluster_queue(cluster_queue) else {
        return Err(vec![]);
    };

    let mut reasons = Vec::new();
    let mut deferred_preempt: Option<FlavorName> = None;

    for flavor in &group.flavors {
        if !snapshot.flavors.contains_key(&flavor.name) {
            reasons.push(NoFitReason::FlavorNotFound { flavor: flavor.name.clone() });
            continue;
        }

        let mut fits_nominal = true;
        let mut fits_borrow = true;
        let mut insufficient_resource = None;

        for resource in requested {
            let key: FlavorResourceKey = (flavor.name.clone(), (*resource).clone());
            let demand = pod_set.demand_at(resource, count);

            let (nominal_ok, borrow_ok) = resource_fit(cq, snapshot, cluster_queue, &key, demand);
            if !nominal_ok {
                fits_nominal = false;
                if !borrow_ok {
                    fits_borrow = false;
                    insufficient_resource = Some((*resource).clone());
                }
            }
        }

        if fits_nominal {
            return Ok((flavor.name.clone(), Mode::Fit));
        }
        if fits_borrow && matches!(when_can_borrow, WhenCanBorrow::Borrow) {
            return Ok((flavor.name.clone(), Mode::BorrowFit));
        }

        match when_can_preempt {
            WhenCanPreempt::Preempt => return Ok((flavor.name.clone(), Mode::Preempt)),
            WhenCanPreempt::TryNextFlavor => {
                if deferred_preempt.is_none() {
                    deferred_preempt = Some(flavor.name.clone());
                }
            }
        }

        if let Some(resource) = insufficient_resource {
            reasons.push(NoFitReason::InsufficientQuota { flavor: flavor.name.clone(), resource });
        }
    }

    if let Some(flavor) = deferred_preempt {
        return Ok((flavor, Mode::Preempt));
    }

    if reasons.is_empty() {
        reasons.push(NoFitReason::PreemptionNotAllowed {
            flavor: group.flavors.first().map(|f| f.name.clone()).unwrap_or_default(),
        });
    }
    Err(reasons)
}

/// Whether `demand` at `key` fits the requesting queue's own nominal quota
/// (first element), and, failing that, whether it fits once borrowing from
/// the cohort is considered (second element). Shared by flavor assignment
/// and by the preemption engine's "would this eviction be enough" check.
pub(crate) fn resource_fit(
    cq: &crate::snapshot::SnapshotClusterQueue,
    snapshot: &Snapshot,
    cluster_queue: &str,
    key: &FlavorResourceKey,
    demand: Quantity,
) -> (bool, bool) {
    let unused_nominal = cq.node.unused_nominal(key);

    // A queue's unused nominal only counts toward a Fit (no borrowing
    // needed) if the cohort as a whole hasn't already oversubscribed that
    // capacity — a sibling borrowing into this queue's nominal must show up
    // here, or the cohort admits past its total quota (`spec.md` §4.2).
    let available_without_borrow = match snapshot.hierarchy().queue_cohort(&cluster_queue.to_string()) {
        Some(_) => unused_nominal.min(cq.node.guaranteed(key) + cohort_wide_remaining(snapshot, cluster_queue, key)),
        None => unused_nominal,
    };

    if demand <= available_without_borrow {
        return (true, true);
    }
    let local_cap_remaining = match cq.node.local_cap(key) {
        Some(cap) => cap.saturating_sub(cq.node.usage_of(key)),
        None => Quantity::from_millis(i64::MAX),
    };
    let extra_needed = demand.saturating_sub(available_without_borrow);
    let cohort_remaining = cohort_wide_lendable(snapshot, cluster_queue, key);
    (false, extra_needed <= local_cap_remaining && extra_needed <= cohort_remaining)
}

/// Total remaining capacity across the whole cohort tree for one (flavor,
/// resource): the root cohort's subtree nominal minus its subtree usage.
/// Unlike [`cohort_wide_lendable`], this includes the requesting queue's own
/// nominal and usage — it answers "how much of the cohort's total quota is
/// still unspent", not "what could a sibling lend me".
fn cohort_wide_remaining(snapshot: &Snapshot, cluster_queue: &str, key: &FlavorResourceKey) -> Quantity {
    let Some(cohort) = snapshot.hierarchy().queue_cohort(&cluster_queue.to_string()) else {
        return Quantity::ZERO;
    };
    let root = snapshot.hierarchy().root_cohort(cohort);
    let Some(entry) = snapshot.cohort(&root) else { return Quantity::ZERO };
    resources::get(&entry.node.subtree_nominal, key).saturating_sub(resources::get(&entry.node.subtree_usage, key))
}

/// Sums lendable capacity across every other ClusterQueue and every Cohort
/// node in the requesting queue's whole cohort tree (`spec.md` §4.2:
/// borrowing draws against the cohort as a whole, not just the immediate
/// parent).
pub(crate) fn cohort_wide_lendable(snapshot: &Snapshot, cluster_queue: &str, key: &FlavorResourceKey) -> Quantity {
    let Some(cohort) = snapshot.hierarchy().queue_cohort(&cluster_queue.to_string()) else {
        return Quantity::ZERO;
    };
    let root = snapshot.hierarchy().root_cohort(cohort);

    let mut total = Quantity::ZERO;
    for queue in snapshot.hierarchy().subtree_queues(&root) {
        if queue == cluster_queue {
            continue;
        }
        if let Some(sibling) = snapshot.cluster_queue(&queue) {
            total += sibling.node.lendable_amount(key);
        }
    }
    for cohort_name in snapshot.hierarchy().subtree_cohorts(&root) {
        if let Some(entry) = snapshot.cohort(&cohort_name) {
            total += entry.node.lendable_amount(key);
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Cache;
    use kueue_api::quota::{FlavorQuotas, ResourceGroup, ResourceQuota};
    use kueue_api::{ClusterQueueSpec, FlavorFungibility, ResourceFlavorSpec};

    fn spec_with_quota(nominal: i64) -> ClusterQueueSpec {
        ClusterQueueSpec {
            resource_groups: vec![ResourceGroup {
                covered_resources: vec!["cpu".to_string()],
                flavors: vec![FlavorQuotas {
                    name: "default".to_string(),
                    resources: vec![("cpu".to_string(), ResourceQuota::new(Quantity::from_millis(nominal)))],
                }],
            }],
            cohort: None,
            preemption: Default::default(),
            flavor_fungibility: FlavorFungibility::default(),
            fair_sharing: Default::default(),
            admission_checks: vec![],
            queueing_strategy: Default::default(),
            stopped: false,
        }
    }

    fn one_pod_set(cpu_millis: i64, count: u32) -> PodSet {
        let mut request = BTreeMap::new();
        request.insert("cpu".to_string(), Quantity::from_millis(cpu_millis));
        PodSet { name: "main".to_string(), count, request, min_count: None, topology_request: None }
    }

    #[test]
    fn demand_equal_to_nominal_fits() {
        let cache = Cache::default();
        cache.add_or_update_flavor("default".to_string(), ResourceFlavorSpec::default());
        let spec = spec_with_quota(4000);
        cache.add_or_update_cluster_queue("cq1".to_string(), spec.clone()).unwrap();
        let snapshot = cache.snapshot();

        let pod_sets = vec![one_pod_set(4000, 1)];
        let assignment = assign(&spec, "cq1", &pod_sets, &snapshot, false).unwrap();
        assert_eq!(assignment.mode, Mode::Fit);
    }

    #[test]
    fn demand_over_nominal_with_no_cohort_falls_back_to_preempt_candidate() {
        let cache = Cache::default();
        cache.add_or_update_flavor("default".to_string(), ResourceFlavorSpec::default());
        let spec = spec_with_quota(4000);
        cache.add_or_update_cluster_queue("cq1".to_string(), spec.clone()).unwrap();
        let snapshot = cache.snapshot();

        // No cohort to borrow from, so the only way past the nominal ceiling
        // is a Preempt candidate for the caller's preemption engine to try.
        let pod_sets = vec![one_pod_set(4001, 1)];
        let assignment = assign(&spec, "cq1", &pod_sets, &snapshot, false).unwrap();
        assert_eq!(assignment.mode, Mode::Preempt);
    }

    #[test]
    fn unregistered_flavor_is_no_fit() {
        let cache = Cache::default();
        let spec = spec_with_quota(4000);
        cache.add_or_update_cluster_queue("cq1".to_string(), spec.clone()).unwrap();
        let snapshot = cache.snapshot();

        let pod_sets = vec![one_pod_set(1000, 1)];
        let err = assign(&spec, "cq1", &pod_sets, &snapshot, false).unwrap_err();
        assert!(matches!(err.primary_reason(), Some(NoFitReason::FlavorNotFound { .. })));
    }
}
