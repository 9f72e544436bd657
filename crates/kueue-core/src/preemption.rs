//! Preemption engine — `spec.md` §4.5: when flavor assignment reports
//! `Preempt`, find the smallest set of already-admitted workloads whose
//! eviction lets the candidate workload Fit.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use kueue_api::queue::{ClusterQueuePreemption, FairSharingPreemptionStrategy, PreemptionPolicy};
use kueue_api::resource::{ClusterQueueName, Quantity, ResourceQuantities};

use crate::assignment::resource_fit;
use crate::fairsharing::dominant_resource_share;
use crate::snapshot::Snapshot;

pub type WorkloadKey = (String, String);

/// An already-admitted workload, eligible for preemption consideration.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub key: WorkloadKey,
    pub cluster_queue: ClusterQueueName,
    pub priority: i32,
    pub admitted_at: DateTime<Utc>,
    pub usage: ResourceQuantities,
}

/// The workload being considered for admission via preemption.
#[derive(Debug, Clone)]
pub struct Requesting {
    pub cluster_queue: ClusterQueueName,
    pub priority: i32,
    pub eligible_at: DateTime<Utc>,
    pub demand: ResourceQuantities,
    pub fair_sharing_weight: u32,
}

#[derive(Debug, Clone)]
pub struct FairSharingGuard {
    pub strategy: FairSharingPreemptionStrategy,
    /// `FairWeight` per ClusterQueue, needed to project DRS for both sides.
    pub weights: BTreeMap<ClusterQueueName, u32>,
}

/// Whether a sibling queue counts as "borrowing" — usage above its own
/// nominal quota for at least one (flavor, resource) it holds.
fn is_borrowing(snapshot: &Snapshot, cluster_queue: &str) -> bool {
    let Some(cq) = snapshot.cluster_queue(cluster_queue) else { return false };
    cq.node.quotas.keys().any(|key| cq.node.usage_of(key) > cq.node.nominal(key))
}

fn within_queue_eligible(
    policy: PreemptionPolicy,
    candidate: &Requesting,
    victim: &Candidate,
) -> bool {
    match policy {
        PreemptionPolicy::Never => false,
        PreemptionPolicy::Any => true,
        PreemptionPolicy::LowerPriority => victim.priority < candidate.priority,
        PreemptionPolicy::LowerOrNewerEqualPriority => {
            victim.priority < candidate.priority
                || (victim.priority == candidate.priority && victim.admitted_at > candidate.eligible_at)
        }
    }
}

fn reclaim_eligible(policy: PreemptionPolicy, candidate: &Requesting, victim: &Candidate) -> bool {
    match policy {
        PreemptionPolicy::Never => false,
        PreemptionPolicy::Any => true,
        PreemptionPolicy::LowerPriority | PreemptionPolicy::LowerOrNewerEqualPriority => {
            victim.priority < candidate.priority
        }
    }
}

/// Whether both queues hang off the same cohort tree — reclaiming quota
/// from a borrowing queue only makes sense against a queue it could
/// actually have borrowed from.
fn same_cohort_tree(snapshot: &Snapshot, a: &str, b: &str) -> bool {
    let hierarchy = snapshot.hierarchy();
    match (
        hierarchy.queue_cohort(&a.to_string()),
        hierarchy.queue_cohort(&b.to_string()),
    ) {
        (Some(ca), Some(cb)) => hierarchy.root_cohort(ca) == hierarchy.root_cohort(cb),
        _ => false,
    }
}

fn would_fit(snapshot: &Snapshot, requesting: &Requesting) -> bool {
    let Some(cq) = snapshot.cluster_queue(&requesting.cluster_queue) else { return false };
    requesting.demand.iter().all(|(key, demand)| {
        let (nominal_ok, borrow_ok) =
            resource_fit(cq, snapshot, &requesting.cluster_queue, key, *demand);
        nominal_ok || borrow_ok
    })
}

/// Projected DRS of `cluster_queue` if `delta` (positive = add, applied via
/// sign on `demand`) were applied, without mutating the real snapshot.
fn projected_share(
    snapshot: &Snapshot,
    cluster_queue: &str,
    weight: u32,
    delta: &ResourceQuantities,
    subtract: bool,
) -> f64 {
    let mut probe = snapshot.clone();
    if subtract {
        probe.remove_workload(cluster_queue, delta);
    } else {
        probe.add_workload(cluster_queue, delta);
    }
    dominant_resource_share(&probe, cluster_queue, weight)
}

fn fair_sharing_guard_allows(
    guard: &FairSharingGuard,
    snapshot: &Snapshot,
    requesting: &Requesting,
    victim: &Candidate,
) -> bool {
    let victim_weight = guard.weights.get(&victim.cluster_queue).copied().unwrap_or(1);
    let requesting_after =
        projected_share(snapshot, &requesting.cluster_queue, requesting.fair_sharing_weight, &requesting.demand, false);

    match guard.strategy {
        FairSharingPreemptionStrategy::LessThanOrEqualToFinalShare => {
            let victim_after = projected_share(snapshot, &victim.cluster_queue, victim_weight, &victim.usage, true);
            requesting_after <= victim_after
        }
        FairSharingPreemptionStrategy::LessThanInitialShare => {
            let victim_now = dominant_resource_share(snapshot, &victim.cluster_queue, victim_weight);
            requesting_after < victim_now
        }
    }
}

/// Builds the eligible victim pool (`spec.md` §4.5), sorted
/// `(is-borrower desc, priority asc, admittedAt desc)` — the order the
/// greedy selection in [`select_victims`] consumes it in.
fn candidate_pool(
    snapshot: &Snapshot,
    policy: &ClusterQueuePreemption,
    requesting: &Requesting,
    admitted: &[Candidate],
) -> Vec<Candidate> {
    let mut pool: Vec<Candidate> = admitted
        .iter()
        .filter(|victim| {
            if victim.cluster_queue == requesting.cluster_queue {
                within_queue_eligible(policy.within_cluster_queue, requesting, victim)
            } else {
                same_cohort_tree(snapshot, &requesting.cluster_queue, &victim.cluster_queue)
                    && is_borrowing(snapshot, &victim.cluster_queue)
                    && reclaim_eligible(policy.reclaim_within_cohort, requesting, victim)
            }
        })
        .cloned()
        .collect();

    pool.sort_by(|a, b| {
        let a_borrower = is_borrowing(snapshot, &a.cluster_queue);
        let b_borrower = is_borrowing(snapshot, &b.cluster_queue);
        b_borrower
            .cmp(&a_borrower)
            .then_with(|| a.priority.cmp(&b.priority))
            .then_with(|| b.admitted_at.cmp(&a.admitted_at))
    });
    pool
}

/// Greedily selects the minimum victim set that lets `requesting` Fit,
/// applying the fair-sharing guard (if configured) to every candidate
/// before accepting it. Returns `None` if the pool is exhausted without
/// producing a fit — `spec.md` §8: "Preemption with empty victim pool:
/// fails; candidate not admitted; no side effects."
pub fn select_victims(
    snapshot: &Snapshot,
    policy: &ClusterQueuePreemption,
    requesting: &Requesting,
    admitted: &[Candidate],
    fair_sharing: Option<&FairSharingGuard>,
) -> Option<Vec<WorkloadKey>> {
    let mut working = snapshot.clone();
    let mut victims = Vec::new();

    for candidate in candidate_pool(snapshot, policy, requesting, admitted) {
        if would_fit(&working, requesting) {
            break;
        }
        if let Some(guard) = fair_sharing {
            if !fair_sharing_guard_allows(guard, &working, requesting, &candidate) {
                continue;
            }
        }
        working.remove_workload(&candidate.cluster_queue, &candidate.usage);
        victims.push(candidate.key);
    }

    if would_fit(&working, requesting) {
        Some(victims)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Cache;
    use kueue_api::quota::{FlavorQuotas, ResourceGroup, ResourceQuota};
    use kueue_api::ResourceFlavorSpec;

    fn cohort_setup() -> Cache {
        let cache = Cache::default();
        cache.add_or_update_flavor("default".to_string(), ResourceFlavorSpec::default());

        let spec = |cohort: &str| kueue_api::ClusterQueueSpec {
            resource_groups: vec![ResourceGroup {
                covered_resources: vec!["cpu".to_string()],
                flavors: vec![FlavorQuotas {
                    name: "default".to_string(),
                    resources: vec![("cpu".to_string(), ResourceQuota::new(Quantity::from_millis(4000)))],
                }],
            }],
            cohort: Some(cohort.to_string()),
            preemption: ClusterQueuePreemption {
                within_cluster_queue: PreemptionPolicy::Never,
                reclaim_within_cohort: PreemptionPolicy::Any,
            },
            flavor_fungibility: Default::default(),
            fair_sharing: Default::default(),
            admission_checks: vec![],
            queueing_strategy: Default::default(),
            stopped: false,
        };
        cache.add_or_update_cluster_queue("a".to_string(), spec("C")).unwrap();
        cache.add_or_update_cluster_queue("b".to_string(), spec("C")).unwrap();
        cache
    }

    fn usage_of(millis: i64) -> ResourceQuantities {
        let mut map = ResourceQuantities::default();
        map.insert(("default".to_string(), "cpu".to_string()), Quantity::from_millis(millis));
        map
    }

    #[test]
    fn reclaims_from_a_borrowing_sibling() {
        let cache = cohort_setup();
        let mut snapshot = cache.snapshot();
        // a borrows up to 7 (nominal 4 + 3 borrowed from b's unused nominal).
        snapshot.add_workload("a", &usage_of(7000));

        let requesting = Requesting {
            cluster_queue: "b".to_string(),
            priority: 10,
            eligible_at: Utc::now(),
            demand: usage_of(4000),
            fair_sharing_weight: 1,
        };
        let admitted = vec![Candidate {
            key: ("ns".to_string(), "x".to_string()),
            cluster_queue: "a".to_string(),
            priority: 1,
            admitted_at: Utc::now(),
            usage: usage_of(7000),
        }];

        let policy = ClusterQueuePreemption {
            within_cluster_queue: PreemptionPolicy::Never,
            reclaim_within_cohort: PreemptionPolicy::Any,
        };
        let victims = select_victims(&snapshot, &policy, &requesting, &admitted, None).unwrap();
        assert_eq!(victims, vec![("ns".to_string(), "x".to_string())]);
    }

    #[test]
    fn empty_pool_fails_preemption() {
        let cache = cohort_setup();
        let snapshot = cache.snapshot();

        let requesting = Requesting {
            cluster_queue: "b".to_string(),
            priority: 10,
            eligible_at: Utc::now(),
            demand: usage_of(9000),
            fair_sharing_weight: 1,
        };
        let policy = ClusterQueuePreemption {
            within_cluster_queue: PreemptionPolicy::Never,
            reclaim_within_cohort: PreemptionPolicy::Any,
        };
        assert!(select_victims(&snapshot, &policy, &requesting, &[], None).is_none());
    }
}
