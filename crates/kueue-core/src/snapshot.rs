//! [`Snapshot`]: `spec.md` §4.1's `Snapshot` operation — an owned,
//! lock-free copy of the cache's quota/usage state that one scheduling
//! cycle can mutate locally (tentatively assigning and un-assigning
//! workloads while it searches for a fit) without touching the live cache
//! or blocking other readers/writers.
//!
//! A `Snapshot` is not `Sync`; it is built fresh per cycle and discarded
//! once the cycle commits its decisions back through [`super::Cache`].

use std::collections::BTreeMap;

use kueue_api::resource::{
    CheckName, ClusterQueueName, CohortName, FlavorName, FlavorResourceKey, ResourceQuantities,
};
use kueue_api::{AdmissionCheckSpec, ClusterQueueSpec, FeatureGates, ResourceFlavorSpec, TopologySpec};

use crate::cache::state::CacheState;
use crate::generation::GenerationStamp;
use crate::hierarchy::Hierarchy;
use crate::resource_node::ResourceNode;
use crate::resources;

#[derive(Debug, Clone)]
pub struct SnapshotClusterQueue {
    pub spec: ClusterQueueSpec,
    pub node: ResourceNode,
}

#[derive(Debug, Clone)]
pub struct SnapshotCohort {
    pub node: ResourceNode,
}

/// A self-contained scheduling view: quota shapes, current usage, the
/// cohort forest, and the generation it was captured at.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub stamp: GenerationStamp,
    pub(crate) queues: BTreeMap<ClusterQueueName, SnapshotClusterQueue>,
    pub(crate) cohorts: BTreeMap<CohortName, SnapshotCohort>,
    pub(crate) hierarchy: Hierarchy,
    pub(crate) flavors: BTreeMap<FlavorName, ResourceFlavorSpec>,
    pub(crate) topologies: BTreeMap<String, TopologySpec>,
    pub(crate) checks: BTreeMap<CheckName, AdmissionCheckSpec>,
    pub(crate) feature_gates: FeatureGates,
}

impl Snapshot {
    pub(crate) fn capture(state: &CacheState) -> Self {
        let queues = state
            .queues
            .iter()
            .map(|(name, entry)| {
                (name.clone(), SnapshotClusterQueue { spec: entry.spec.clone(), node: entry.node.clone() })
            })
            .collect();
        let cohorts = state
            .cohorts
            .iter()
            .map(|(name, entry)| (name.clone(), SnapshotCohort { node: entry.node.clone() }))
            .collect();
        Snapshot {
            stamp: GenerationStamp::capture(&state.generation),
            queues,
            cohorts,
            hierarchy: state.hierarchy.clone(),
            flavors: state.flavors.clone(),
            topologies: state.topologies.clone(),
            checks: state.checks.clone(),
            feature_gates: state.feature_gates.clone(),
        }
    }

    pub fn cluster_queue(&self, name: &str) -> Option<&SnapshotClusterQueue> {
        self.queues.get(name)
    }

    pub fn cohort(&self, name: &str) -> Option<&SnapshotCohort> {
        self.cohorts.get(name)
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    pub fn feature_gates(&self) -> &FeatureGates {
        &self.feature_gates
    }

    /// Ancestor cohort chain for a ClusterQueue, nearest first — the order
    /// `spec.md` §4.4's flavor assignment walks when a flavor's local
    /// quota is exhausted and it looks for lendable capacity up the tree.
    pub fn borrowing_path(&self, cluster_queue: &str) -> Vec<CohortName> {
        match self.hierarchy.queue_cohort(&cluster_queue.to_string()) {
            Some(cohort) => {
                let mut path = vec![cohort.clone()];
                path.extend(self.hierarchy.ancestors(cohort));
                path
            }
            None => Vec::new(),
        }
    }

    /// Tentatively applies `usage` to `cluster_queue` and every cohort on
    /// its borrowing path, so the next fit search sees reduced slack.
    /// `spec.md` §4.1: `AddWorkload`.
    pub fn add_workload(&mut self, cluster_queue: &str, usage: &ResourceQuantities) {
        if let Some(entry) = self.queues.get_mut(cluster_queue) {
            resources::merge_sum(&mut entry.node.usage, usage);
            resources::merge_sum(&mut entry.node.subtree_usage, usage);
        }
        for cohort in self.borrowing_path(cluster_queue) {
            if let Some(entry) = self.cohorts.get_mut(&cohort) {
                resources::merge_sum(&mut entry.node.subtree_usage, usage);
            }
        }
    }

    /// Reverses a prior [`Self::add_workload`] call. Idempotent: removing a
    /// workload that was never added (or already removed) floors usage at
    /// zero instead of going negative, matching `spec.md` §4.1's
    /// "`RemoveWorkload` is idempotent" note.
    pub fn remove_workload(&mut self, cluster_queue: &str, usage: &ResourceQuantities) {
        if let Some(entry) = self.queues.get_mut(cluster_queue) {
            resources::merge_sub_clamped(&mut entry.node.usage, usage);
            resources::merge_sub_clamped(&mut entry.node.subtree_usage, usage);
        }
        for cohort in self.borrowing_path(cluster_queue) {
            if let Some(entry) = self.cohorts.get_mut(&cohort) {
                resources::merge_sub_clamped(&mut entry.node.subtree_usage, usage);
            }
        }
    }

    /// Usage a resource's key currently shows for a given ClusterQueue.
    pub fn usage(&self, cluster_queue: &str, key: &FlavorResourceKey) -> kueue_api::resource::Quantity {
        self.queues.get(cluster_queue).map(|e| e.node.usage_of(key)).unwrap_or_default()
    }
}
