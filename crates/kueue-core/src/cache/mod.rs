//! The Cache: `spec.md` §4's single in-memory source of truth for quota
//! configuration, cohort hierarchy, and workload usage. [`Cache`] is the
//! lock-holding façade; [`state::CacheState`] is the data it protects.

mod error;
mod readiness;
pub(crate) mod state;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use kueue_api::{
    queue::{ClusterQueuePhase, QueueReadinessReason},
    resource::{CheckName, ClusterQueueName, CohortName, FlavorName, LocalQueueName},
    AdmissionCheckSpec, CohortSpec, ClusterQueueSpec, FeatureGates, ResourceFlavorSpec,
    TopologySpec, WorkloadSpec, WorkloadStatus,
};
use parking_lot::RwLock;
use tracing::instrument;

pub use error::{CacheError, CacheResult, WorkloadKey};

use state::CacheState;

/// `spec.md` §5: "single reader-writer lock... readers never block other
/// readers." `parking_lot::RwLock` is the same choice made for
/// similarly-shaped in-memory stores elsewhere in this crate family (see
/// `DESIGN.md`).
pub struct Cache {
    state: RwLock<CacheState>,
}

impl Default for Cache {
    fn default() -> Self {
        Cache { state: RwLock::new(CacheState::default()) }
    }
}

impl Cache {
    pub fn new(feature_gates: FeatureGates) -> Self {
        let mut state = CacheState::default();
        state.feature_gates = feature_gates;
        Cache { state: RwLock::new(state) }
    }

    #[instrument(skip_all, fields(flavor = %name))]
    pub fn add_or_update_flavor(&self, name: FlavorName, spec: ResourceFlavorSpec) {
        self.state.write().add_or_update_flavor(name, spec);
    }

    #[instrument(skip_all)]
    pub fn delete_flavor(&self, name: &str) {
        self.state.write().delete_flavor(name);
    }

    #[instrument(skip_all, fields(topology = %name))]
    pub fn add_or_update_topology(&self, name: String, spec: TopologySpec) {
        self.state.write().add_or_update_topology(name, spec);
    }

    /// Unblocks any workload deferred pending this topology becoming usable
    /// (`spec.md`'s topology-aware-scheduling readiness gate).
    #[instrument(skip_all)]
    pub fn mark_topology_ready(&self, flavor: &str) {
        self.state.write().mark_topology_ready(flavor);
    }

    #[instrument(skip_all, fields(check = %name))]
    pub fn add_or_update_check(&self, name: CheckName, spec: AdmissionCheckSpec) {
        self.state.write().add_or_update_check(name, spec);
    }

    #[instrument(skip_all)]
    pub fn delete_check(&self, name: &str) {
        self.state.write().delete_check(name);
    }

    /// `spec.md` §4.1: `AddOrUpdateClusterQueue`.
    #[instrument(skip_all, fields(cluster_queue = %name))]
    pub fn add_or_update_cluster_queue(
        &self,
        name: ClusterQueueName,
        spec: ClusterQueueSpec,
    ) -> CacheResult<()> {
        self.state.write().add_or_update_cluster_queue(name, spec)
    }

    #[instrument(skip_all)]
    pub fn mark_cluster_queue_terminating(&self, name: &str) {
        self.state.write().mark_cluster_queue_terminating(name);
    }

    /// Returns `true` once the ClusterQueue has been fully removed (it had
    /// no outstanding workloads); `false` means the caller must wait.
    #[instrument(skip_all)]
    pub fn remove_cluster_queue_if_empty(&self, name: &str) -> bool {
        self.state.write().remove_cluster_queue_if_empty(name)
    }

    /// `spec.md` §4.1: `AddOrUpdateCohort`.
    #[instrument(skip_all, fields(cohort = %name))]
    pub fn add_or_update_cohort(&self, name: CohortName, spec: CohortSpec) -> CacheResult<()> {
        self.state.write().add_or_update_cohort(name, spec)
    }

    #[instrument(skip_all)]
    pub fn delete_cohort(&self, name: &str) {
        self.state.write().delete_cohort(name);
    }

    #[instrument(skip_all)]
    pub fn add_local_queue(&self, namespace: String, name: LocalQueueName, cluster_queue: ClusterQueueName) {
        self.state.write().add_local_queue(namespace, name, cluster_queue);
    }

    /// `spec.md` §4.1: `AddOrUpdateWorkload`.
    #[instrument(skip_all, fields(namespace = %key.0, name = %key.1))]
    pub fn add_or_update_workload(
        &self,
        key: WorkloadKey,
        namespace: String,
        spec: WorkloadSpec,
        status: WorkloadStatus,
        created_at: DateTime<Utc>,
    ) -> CacheResult<()> {
        self.state.write().add_or_update_workload(key, namespace, spec, status, created_at)
    }

    /// `spec.md` §4.1: `DeleteWorkload`.
    #[instrument(skip_all)]
    pub fn delete_workload(&self, key: &WorkloadKey) {
        self.state.write().delete_workload(key);
    }

    /// `spec.md` §4.1: `ClusterQueueReadiness`.
    pub fn cluster_queue_readiness(
        &self,
        name: &str,
    ) -> Option<(ClusterQueuePhase, QueueReadinessReason, String)> {
        self.state.read().cluster_queue_readiness(name)
    }

    /// `spec.md` §4.7 step 2: the full set of workloads still waiting on
    /// admission, across every ClusterQueue.
    pub fn pending_workloads(&self) -> Vec<crate::pending::PendingWorkload> {
        self.state.read().pending_workloads()
    }

    /// Every currently-admitted workload, as preemption candidates.
    pub fn admitted_candidates(&self) -> Vec<crate::preemption::Candidate> {
        self.state.read().admitted_candidates()
    }

    /// Reads back one workload's spec, status, and creation time, for a
    /// caller that needs to build a status patch on top of what the cache
    /// last committed.
    pub fn workload(&self, key: &WorkloadKey) -> Option<(WorkloadSpec, WorkloadStatus, DateTime<Utc>)> {
        self.state.read().workload(key)
    }

    /// `spec.md` §7's self-healing rebuild, exposed so an operator (or a
    /// periodic resync) can force it outside the normal delete-triggered
    /// path.
    #[instrument(skip_all)]
    pub fn rebuild_cluster_queue_usage(&self, cluster_queue: &str) {
        self.state.write().rebuild_cluster_queue_usage(cluster_queue);
    }

    pub fn known_cluster_queues(&self) -> BTreeSet<ClusterQueueName> {
        self.state.read().queues.keys().cloned().collect()
    }

    /// `spec.md` §4.1: `Snapshot` — a point-in-time, independently mutable
    /// copy for a scheduling cycle to run flavor assignment and preemption
    /// against without holding the cache lock.
    #[instrument(skip_all)]
    pub fn snapshot(&self) -> crate::snapshot::Snapshot {
        crate::snapshot::Snapshot::capture(&self.state.read())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kueue_api::quota::{FlavorQuotas, ResourceGroup};
    use kueue_api::resource::Quantity;

    fn quota_spec(flavor: &str, resource: &str, nominal: i64) -> ClusterQueueSpec {
        ClusterQueueSpec {
            resource_groups: vec![ResourceGroup {
                covered_resources: vec![resource.to_string()],
                flavors: vec![FlavorQuotas {
                    name: flavor.to_string(),
                    resources: vec![(
                        resource.to_string(),
                        kueue_api::quota::ResourceQuota::new(Quantity::from_millis(nominal)),
                    )],
                }],
            }],
            cohort: None,
            preemption: Default::default(),
            flavor_fungibility: Default::default(),
            fair_sharing: Default::default(),
            admission_checks: vec![],
            queueing_strategy: Default::default(),
            stopped: false,
        }
    }

    #[test]
    fn queue_with_missing_flavor_is_pending() {
        let cache = Cache::default();
        cache
            .add_or_update_cluster_queue("cq1".to_string(), quota_spec("default", "cpu", 4000))
            .unwrap();
        let (phase, reason, _) = cache.cluster_queue_readiness("cq1").unwrap();
        assert_eq!(phase, ClusterQueuePhase::Pending);
        assert_eq!(reason, QueueReadinessReason::FlavorNotFound);
    }

    #[test]
    fn queue_becomes_active_once_flavor_exists() {
        let cache = Cache::default();
        cache.add_or_update_flavor("default".to_string(), ResourceFlavorSpec::default());
        cache
            .add_or_update_cluster_queue("cq1".to_string(), quota_spec("default", "cpu", 4000))
            .unwrap();
        let (phase, reason, _) = cache.cluster_queue_readiness("cq1").unwrap();
        assert_eq!(phase, ClusterQueuePhase::Active);
        assert_eq!(reason, QueueReadinessReason::Ready);
    }

    #[test]
    fn cohort_cycle_propagates_to_attached_queue() {
        let cache = Cache::default();
        cache.add_or_update_flavor("default".to_string(), ResourceFlavorSpec::default());
        let mut spec = quota_spec("default", "cpu", 4000);
        spec.cohort = Some("a".to_string());
        cache.add_or_update_cluster_queue("cq1".to_string(), spec).unwrap();

        cache
            .add_or_update_cohort("a".to_string(), CohortSpec { parent: Some("b".to_string()), resource_groups: vec![] })
            .unwrap();
        cache
            .add_or_update_cohort("b".to_string(), CohortSpec { parent: Some("a".to_string()), resource_groups: vec![] })
            .unwrap_err();
    }
}
