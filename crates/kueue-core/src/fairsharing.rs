//! Dominant Resource Share (DRS) — `spec.md` §4.6: the fairness metric
//! used to order admission across ClusterQueues in a cohort and to guard
//! preemption decisions.

use kueue_api::resource::FlavorResourceKey;

use crate::snapshot::Snapshot;

/// `share_{q,r} = usage_{q,r} / (weight_q * lendable_{cohort,r})`;
/// `DRS(q) = max_r share_{q,r}`. A queue with no cohort (nothing to share
/// against) always has DRS 0 — fairness only has meaning relative to
/// siblings.
pub fn dominant_resource_share(snapshot: &Snapshot, cluster_queue: &str, weight: u32) -> f64 {
    let Some(cq) = snapshot.cluster_queue(cluster_queue) else { return 0.0 };
    if snapshot.hierarchy().queue_cohort(&cluster_queue.to_string()).is_none() {
        return 0.0;
    }
    let weight = weight.max(1) as f64;

    cq.node
        .quotas
        .keys()
        .map(|key| {
            let usage = cq.node.usage_of(key).as_millis() as f64;
            let pool = cohort_lendable_pool(snapshot, cluster_queue, key).as_millis() as f64;
            if pool <= 0.0 {
                0.0
            } else {
                usage / (weight * pool)
            }
        })
        .fold(0.0, f64::max)
}

/// The cohort-wide lendable pool for one (flavor, resource): the sum, over
/// every ClusterQueue and Cohort node in the whole cohort tree, of
/// `nominal - guaranteed` (`spec.md` §4.6: "lendable capacity excludes a
/// queue's guaranteed-quota floor"). Unlike
/// [`crate::assignment::cohort_wide_lendable`], this includes the queue's
/// own contribution — it is the size of the shared pool, not what others
/// could lend *to* it.
fn cohort_lendable_pool(
    snapshot: &Snapshot,
    cluster_queue: &str,
    key: &FlavorResourceKey,
) -> kueue_api::resource::Quantity {
    use kueue_api::resource::Quantity;

    let Some(cohort) = snapshot.hierarchy().queue_cohort(&cluster_queue.to_string()) else {
        return Quantity::ZERO;
    };
    let root = snapshot.hierarchy().root_cohort(cohort);

    let mut pool = Quantity::ZERO;
    for queue in snapshot.hierarchy().subtree_queues(&root) {
        if let Some(entry) = snapshot.cluster_queue(&queue) {
            pool += entry.node.nominal(key).saturating_sub(entry.node.guaranteed(key));
        }
    }
    for cohort_name in snapshot.hierarchy().subtree_cohorts(&root) {
        if let Some(entry) = snapshot.cohort(&cohort_name) {
            pool += entry.node.nominal(key).saturating_sub(entry.node.guaranteed(key));
        }
    }
    pool
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Cache;
    use kueue_api::quota::{FlavorQuotas, ResourceGroup, ResourceQuota};
    use kueue_api::resource::Quantity;
    use kueue_api::{ClusterQueueSpec, ResourceFlavorSpec};

    fn spec(cohort: &str, nominal: i64) -> ClusterQueueSpec {
        ClusterQueueSpec {
            resource_groups: vec![ResourceGroup {
                covered_resources: vec!["cpu".to_string()],
                flavors: vec![FlavorQuotas {
                    name: "default".to_string(),
                    resources: vec![("cpu".to_string(), ResourceQuota::new(Quantity::from_millis(nominal)))],
                }],
            }],
            cohort: Some(cohort.to_string()),
            preemption: Default::default(),
            flavor_fungibility: Default::default(),
            fair_sharing: Default::default(),
            admission_checks: vec![],
            queueing_strategy: Default::default(),
            stopped: false,
        }
    }

    #[test]
    fn scenario_5_fair_share_ordering() {
        let cache = Cache::default();
        cache.add_or_update_flavor("default".to_string(), ResourceFlavorSpec::default());
        cache.add_or_update_cluster_queue("a".to_string(), spec("C", 10_000)).unwrap();
        cache.add_or_update_cluster_queue("b".to_string(), spec("C", 10_000)).unwrap();

        let mut snapshot = cache.snapshot();
        let mut usage_a = kueue_api::resource::ResourceQuantities::default();
        usage_a.insert(("default".to_string(), "cpu".to_string()), Quantity::from_millis(5_000));
        snapshot.add_workload("a", &usage_a);

        let mut usage_b = kueue_api::resource::ResourceQuantities::default();
        usage_b.insert(("default".to_string(), "cpu".to_string()), Quantity::from_millis(3_000));
        snapshot.add_workload("b", &usage_b);

        let drs_a = dominant_resource_share(&snapshot, "a", 1);
        let drs_b = dominant_resource_share(&snapshot, "b", 3);

        assert!((drs_a - 0.25).abs() < 1e-9);
        assert!((drs_b - 0.05).abs() < 1e-9);
        assert!(drs_b < drs_a, "b's head should be admitted before a's");
    }
}
