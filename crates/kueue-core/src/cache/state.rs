//! [`CacheState`]: the cache's mutable, lock-protected interior. Every
//! method here assumes the caller already holds the write lock; the public,
//! lock-acquiring API lives in [`super::Cache`].

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use kueue_api::{
    cohort::CohortPhase,
    queue::{ClusterQueuePhase, QueueReadinessReason},
    resource::{
        CheckName, ClusterQueueName, CohortName, FlavorName, FlavorResourceKey, LocalQueueName,
        ResourceQuantities,
    },
    AdmissionCheckSpec, CohortSpec, ClusterQueueSpec, FeatureGates, ResourceFlavorSpec,
    TopologySpec, WorkloadSpec, WorkloadStatus,
};
use tracing::warn;

use crate::{
    generation::Generation,
    hierarchy::Hierarchy,
    resource_node::ResourceNode,
    resources,
};

use super::{
    error::{CacheError, CacheResult, WorkloadKey},
    readiness::compute_readiness,
};

pub(crate) struct ClusterQueueEntry {
    pub spec: ClusterQueueSpec,
    pub node: ResourceNode,
    pub phase: ClusterQueuePhase,
    pub reason: QueueReadinessReason,
    pub message: String,
    pub reserving: BTreeSet<WorkloadKey>,
    pub admitted: BTreeSet<WorkloadKey>,
    pub terminating: bool,
}

pub(crate) struct CohortEntry {
    pub spec: CohortSpec,
    pub node: ResourceNode,
    pub phase: CohortPhase,
}

pub(crate) struct WorkloadEntry {
    pub spec: WorkloadSpec,
    pub status: WorkloadStatus,
    pub cluster_queue: ClusterQueueName,
    pub usage: ResourceQuantities,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
pub(crate) struct CacheState {
    pub flavors: BTreeMap<FlavorName, ResourceFlavorSpec>,
    pub topologies: BTreeMap<String, TopologySpec>,
    pub checks: BTreeMap<CheckName, AdmissionCheckSpec>,
    pub cohorts: BTreeMap<CohortName, CohortEntry>,
    pub queues: BTreeMap<ClusterQueueName, ClusterQueueEntry>,
    pub local_queues: BTreeMap<(String, LocalQueueName), ClusterQueueName>,
    pub workloads: BTreeMap<WorkloadKey, WorkloadEntry>,
    pub hierarchy: Hierarchy,
    pub generation: Generation,
    pub feature_gates: FeatureGates,
    pub tas_ready_flavors: BTreeSet<FlavorName>,
    pub tas_deferred: BTreeSet<WorkloadKey>,
}

fn node_from_resource_groups(spec: &ClusterQueueSpec) -> ResourceNode {
    let mut node = ResourceNode::default();
    for group in &spec.resource_groups {
        for flavor in &group.flavors {
            for (resource, quota) in &flavor.resources {
                let key: FlavorResourceKey = (flavor.name.clone(), resource.clone());
                node.set_quota(key, *quota);
            }
        }
    }
    node
}

impl CacheState {
    pub fn add_or_update_flavor(&mut self, name: FlavorName, spec: ResourceFlavorSpec) {
        self.flavors.insert(name, spec);
        self.recompute_all();
    }

    pub fn delete_flavor(&mut self, name: &str) {
        self.flavors.remove(name);
        self.recompute_all();
    }

    pub fn add_or_update_topology(&mut self, name: String, spec: TopologySpec) {
        self.topologies.insert(name, spec);
        self.recompute_all();
    }

    pub fn add_or_update_check(&mut self, name: CheckName, spec: AdmissionCheckSpec) {
        self.checks.insert(name, spec);
        self.recompute_all();
    }

    pub fn delete_check(&mut self, name: &str) {
        self.checks.remove(name);
        self.recompute_all();
    }

    /// `spec.md` §4.1: `AddOrUpdateClusterQueue`.
    pub fn add_or_update_cluster_queue(
        &mut self,
        name: ClusterQueueName,
        spec: ClusterQueueSpec,
    ) -> CacheResult<()> {
        let shape_changed = self
            .queues
            .get(&name)
            .map(|existing| resource_shape(&existing.spec) != resource_shape(&spec))
            .unwrap_or(true);

        let node = node_from_resource_groups(&spec);

        match self.queues.get_mut(&name) {
            Some(entry) => {
                entry.spec = spec.clone();
                entry.node.quotas = node.quotas;
            }
            None => {
                self.queues.insert(
                    name.clone(),
                    ClusterQueueEntry {
                        spec: spec.clone(),
                        node,
                        phase: ClusterQueuePhase::Pending,
                        reason: QueueReadinessReason::Unknown,
                        message: String::new(),
                        reserving: BTreeSet::new(),
                        admitted: BTreeSet::new(),
                        terminating: false,
                    },
                );
            }
        }

        if let Some(cohort) = &spec.cohort {
            self.hierarchy.attach_queue(&name, cohort);
            self.hierarchy.ensure_cohort_known(cohort);
            self.cohorts.entry(cohort.clone()).or_insert_with(|| CohortEntry {
                spec: CohortSpec { parent: None, resource_groups: vec![] },
                node: ResourceNode::default(),
                phase: CohortPhase::Ready,
            });
        } else {
            self.hierarchy.detach_queue(&name);
        }

        if shape_changed {
            self.generation.bump();
        }
        self.recompute_all();
        Ok(())
    }

    pub fn mark_cluster_queue_terminating(&mut self, name: &str) {
        if let Some(entry) = self.queues.get_mut(name) {
            entry.terminating = true;
        }
        self.recompute_all();
    }

    /// Physically removes a ClusterQueue, only valid once it has no
    /// remaining workloads (`spec.md` §3 lifecycle note).
    pub fn remove_cluster_queue_if_empty(&mut self, name: &str) -> bool {
        let Some(entry) = self.queues.get(name) else { return true };
        if !entry.reserving.is_empty() {
            return false;
        }
        self.queues.remove(name);
        self.hierarchy.detach_queue(&name.to_string());
        self.recompute_all();
        true
    }

    /// `spec.md` §4.1: `AddOrUpdateCohort`. This is the call site where
    /// `spec.md` §9's cycle check actually applies: a Cohort is the only
    /// entity whose reparenting can introduce a cycle (a ClusterQueue is
    /// always a forest leaf).
    pub fn add_or_update_cohort(&mut self, name: CohortName, spec: CohortSpec) -> CacheResult<()> {
        self.hierarchy.set_cohort_parent(&name, spec.parent.clone())?;
        let mut node = ResourceNode::default();
        for group in &spec.resource_groups {
            for flavor in &group.flavors {
                for (resource, quota) in &flavor.resources {
                    node.set_quota((flavor.name.clone(), resource.clone()), *quota);
                }
            }
        }
        match self.cohorts.get_mut(&name) {
            Some(entry) => {
                entry.spec = spec;
                entry.node.quotas = node.quotas;
            }
            None => {
                self.cohorts.insert(name, CohortEntry { spec, node, phase: CohortPhase::Ready });
            }
        }
        self.generation.bump();
        self.recompute_all();
        Ok(())
    }

    pub fn delete_cohort(&mut self, name: &str) {
        self.cohorts.remove(name);
        self.hierarchy.remove_cohort(&name.to_string());
        self.recompute_all();
    }

    pub fn add_local_queue(&mut self, namespace: String, name: LocalQueueName, cluster_queue: ClusterQueueName) {
        self.local_queues.insert((namespace, name), cluster_queue);
    }

    /// `spec.md` §4.1: `AddOrUpdateWorkload`.
    pub fn add_or_update_workload(
        &mut self,
        key: WorkloadKey,
        namespace: String,
        spec: WorkloadSpec,
        status: WorkloadStatus,
        created_at: DateTime<Utc>,
    ) -> CacheResult<()> {
        let target = self
            .local_queues
            .get(&(namespace, spec.queue_name.clone()))
            .cloned()
            .ok_or_else(|| CacheError::UnknownLocalQueue(key.clone(), spec.queue_name.clone()))?;

        if !self.queues.contains_key(&target) {
            return Err(CacheError::UnknownClusterQueue(target));
        }

        let new_usage = status
            .admission
            .as_ref()
            .map(|admission| admission.flavor_resource_usage(&spec.pod_sets))
            .unwrap_or_default();

        if let Some(existing) = self.workloads.get(&key) {
            if existing.cluster_queue != target {
                return Err(CacheError::WorkloadAlreadyExists {
                    key,
                    existing_queue: existing.cluster_queue.clone(),
                    requested_queue: target,
                });
            }
        }

        let tas_blocked = self.feature_gates.topology_aware_scheduling
            && status
                .admission
                .as_ref()
                .map(|a| a.pod_set_assignments.iter().any(|pa| {
                    pa.flavors.values().any(|flavor| {
                        self.flavors
                            .get(flavor)
                            .and_then(|f| f.topology_name.as_ref())
                            .is_some()
                            && !self.tas_ready_flavors.contains(flavor)
                    })
                }))
                .unwrap_or(false);

        let applied_usage = if tas_blocked {
            self.tas_deferred.insert(key.clone());
            ResourceQuantities::default()
        } else {
            self.tas_deferred.remove(&key);
            new_usage.clone()
        };

        let old_usage = self.workloads.get(&key).map(|w| w.usage.clone()).unwrap_or_default();

        if let Some(entry) = self.queues.get_mut(&target) {
            resources::merge_sub_clamped(&mut entry.node.usage, &old_usage);
            resources::merge_sum(&mut entry.node.usage, &applied_usage);
            entry.reserving.insert(key.clone());
            if status.admission.is_some() {
                entry.admitted.insert(key.clone());
            } else {
                entry.admitted.remove(&key);
            }
        }

        self.workloads.insert(
            key,
            WorkloadEntry { spec, status, cluster_queue: target, usage: applied_usage, created_at },
        );

        self.recompute_all();
        Ok(())
    }

    /// `spec.md` §4.1: `DeleteWorkload`.
    pub fn delete_workload(&mut self, key: &WorkloadKey) {
        let Some(entry) = self.workloads.remove(key) else { return };
        if let Some(cq) = self.queues.get_mut(&entry.cluster_queue) {
            let went_negative = resources::merge_sub_clamped(&mut cq.node.usage, &entry.usage);
            cq.reserving.remove(key);
            cq.admitted.remove(key);
            if went_negative {
                warn!(
                    cluster_queue = entry.cluster_queue.as_str(),
                    workload = ?key,
                    "usage went negative after workload deletion; rebuilding from workload set"
                );
                self.rebuild_cluster_queue_usage(&entry.cluster_queue);
            }
        }
        self.tas_deferred.remove(key);
        self.generation.bump();
        self.recompute_all();
    }

    /// `SPEC_FULL.md`'s self-healing rebuild (`spec.md` §7): discards a
    /// queue's accumulated usage map and recomputes it from scratch by
    /// summing the current workload set's `FlavorResourceUsage`.
    pub fn rebuild_cluster_queue_usage(&mut self, cluster_queue: &str) {
        let mut usage = ResourceQuantities::default();
        for entry in self.workloads.values() {
            if entry.cluster_queue == cluster_queue {
                resources::merge_sum(&mut usage, &entry.usage);
            }
        }
        if let Some(cq) = self.queues.get_mut(cluster_queue) {
            cq.node.usage = usage;
        }
    }

    /// The scheduler's view of everything still waiting on admission
    /// (`spec.md` §4.7 step 2).
    pub fn pending_workloads(&self) -> Vec<crate::pending::PendingWorkload> {
        self.workloads
            .iter()
            .filter(|(_, entry)| entry.status.admission.is_none())
            .map(|(key, entry)| crate::pending::PendingWorkload {
                key: key.clone(),
                cluster_queue: entry.cluster_queue.clone(),
                pod_sets: entry.spec.pod_sets.clone(),
                priority: entry.spec.priority,
                created_at: entry.created_at,
                last_eviction_time: entry.status.last_eviction_time,
            })
            .collect()
    }

    /// Every currently-admitted workload, shaped as preemption candidates.
    pub fn admitted_candidates(&self) -> Vec<crate::preemption::Candidate> {
        self.workloads
            .iter()
            .filter(|(_, entry)| entry.status.admission.is_some())
            .map(|(key, entry)| crate::preemption::Candidate {
                key: key.clone(),
                cluster_queue: entry.cluster_queue.clone(),
                priority: entry.spec.priority,
                admitted_at: entry.status.admitted_at().unwrap_or(entry.created_at),
                usage: entry.usage.clone(),
            })
            .collect()
    }

    /// Spec, status, and creation time for one tracked workload, as last
    /// committed to the cache.
    pub fn workload(
        &self,
        key: &WorkloadKey,
    ) -> Option<(WorkloadSpec, WorkloadStatus, DateTime<Utc>)> {
        self.workloads
            .get(key)
            .map(|entry| (entry.spec.clone(), entry.status.clone(), entry.created_at))
    }

    /// `spec.md` §4.1: `ClusterQueueReadiness`.
    pub fn cluster_queue_readiness(
        &self,
        name: &str,
    ) -> Option<(ClusterQueuePhase, QueueReadinessReason, String)> {
        let entry = self.queues.get(name)?;
        let stale_cohorts = self.hierarchy.stale_cohorts();
        let cohort_stale = self
            .hierarchy
            .queue_cohort(&name.to_string())
            .is_some_and(|c| stale_cohorts.contains(c));
        Some(compute_readiness(
            &entry.spec,
            &self.flavors,
            &self.topologies,
            &self.checks,
            entry.terminating,
            cohort_stale,
        ))
    }

    pub fn mark_topology_ready(&mut self, flavor: &str) {
        self.tas_ready_flavors.insert(flavor.to_string());
        let deferred: Vec<_> = self.tas_deferred.iter().cloned().collect();
        for key in deferred {
            if let Some(entry) = self.workloads.get(&key) {
                let spec = entry.spec.clone();
                let status = entry.status.clone();
                let created_at = entry.created_at;
                let namespace = key.0.clone();
                let _ = self.add_or_update_workload(key, namespace, spec, status, created_at);
            }
        }
    }

    /// Bottom-up recomputation of every Cohort's subtree aggregates and
    /// every ClusterQueue's readiness (`spec.md` §4.2). Cycle-affected
    /// cohorts are skipped and flipped to [`CohortPhase::Stale`]; queues
    /// attached beneath them flip to `Pending`/`CohortCycle`
    /// (`spec.md` §8: "within one handler call").
    ///
    /// This recomputes the whole forest rather than only the cohorts on the
    /// changed path — simpler to keep correct, and cheap enough at the
    /// scale this engine targets (see `DESIGN.md`).
    pub(crate) fn recompute_all(&mut self) {
        for queue in self.queues.values_mut() {
            queue.node.refresh_leaf_subtree();
        }

        let stale = self.hierarchy.stale_cohorts();
        let mut processed: BTreeSet<CohortName> = BTreeSet::new();
        let all: Vec<CohortName> = self.hierarchy.all_cohorts().cloned().collect();

        loop {
            let mut progressed = false;
            for cohort in &all {
                if processed.contains(cohort) || stale.contains(cohort) {
                    continue;
                }
                let ready = self
                    .hierarchy
                    .child_cohorts(cohort)
                    .all(|c| processed.contains(c) || stale.contains(c));
                if !ready {
                    continue;
                }
                self.aggregate_cohort(cohort);
                processed.insert(cohort.clone());
                progressed = true;
            }
            if !progressed {
                break;
            }
        }

        for cohort in &stale {
            if let Some(entry) = self.cohorts.get_mut(cohort) {
                entry.phase = CohortPhase::Stale;
                entry.node.subtree_nominal.clear();
                entry.node.subtree_usage.clear();
                entry.node.subtree_guaranteed.clear();
            }
        }

        let names: Vec<ClusterQueueName> = self.queues.keys().cloned().collect();
        for name in names {
            if let Some((phase, reason, message)) = self.cluster_queue_readiness(&name) {
                if let Some(entry) = self.queues.get_mut(&name) {
                    entry.phase = phase;
                    entry.reason = reason;
                    entry.message = message;
                }
            }
        }
    }

    fn aggregate_cohort(&mut self, cohort: &CohortName) {
        let mut nominal = ResourceQuantities::default();
        let mut usage = ResourceQuantities::default();
        let mut guaranteed = ResourceQuantities::default();

        if let Some(entry) = self.cohorts.get(cohort) {
            for (key, quota) in &entry.node.quotas {
                resources::add(&mut nominal, key.clone(), quota.nominal);
                resources::add(&mut guaranteed, key.clone(), quota.guaranteed());
            }
        }

        let child_queues: Vec<_> = self.hierarchy.child_queues(cohort).cloned().collect();
        for q in child_queues {
            if let Some(entry) = self.queues.get(&q) {
                resources::merge_sum(&mut nominal, &entry.node.subtree_nominal);
                resources::merge_sum(&mut usage, &entry.node.subtree_usage);
                resources::merge_sum(&mut guaranteed, &entry.node.subtree_guaranteed);
            }
        }

        let child_cohorts: Vec<_> = self.hierarchy.child_cohorts(cohort).cloned().collect();
        for c in child_cohorts {
            if let Some(entry) = self.cohorts.get(&c) {
                resources::merge_sum(&mut nominal, &entry.node.subtree_nominal);
                resources::merge_sum(&mut usage, &entry.node.subtree_usage);
                resources::merge_sum(&mut guaranteed, &entry.node.subtree_guaranteed);
            }
        }

        if let Some(entry) = self.cohorts.get_mut(cohort) {
            entry.node.subtree_nominal = nominal;
            entry.node.subtree_usage = usage;
            entry.node.subtree_guaranteed = guaranteed;
            entry.phase = CohortPhase::Ready;
        }
    }
}

/// The parts of a ClusterQueueSpec that, if changed, bump
/// `AllocatableResourceGeneration` per `spec.md` §4.1 ("if the resource
/// shape changed").
fn resource_shape(spec: &ClusterQueueSpec) -> Vec<(FlavorName, Vec<(String, kueue_api::Quantity)>)> {
    spec.resource_groups
        .iter()
        .flat_map(|group| group.flavors.iter())
        .map(|flavor| {
            let mut resources: Vec<_> = flavor
                .resources
                .iter()
                .map(|(name, quota)| (name.clone(), quota.nominal))
                .collect();
            resources.sort_by(|a, b| a.0.cmp(&b.0));
            (flavor.name.clone(), resources)
        })
        .collect()
}
