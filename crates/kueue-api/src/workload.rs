//! [`Workload`]: the generic admission object tracked by the cache
//! (`spec.md` §3). One per tracked job, independent of job kind — concrete
//! job kinds are translated into this shape by a framework adapter
//! (`spec.md` §6), which lives outside this crate.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    admission_check::WorkloadCheckState,
    resource::{
        ClusterQueueName, FlavorName, LocalQueueName, Quantity, ResourceName, ResourceQuantities,
    },
};

/// A homogeneous group of pods inside a workload: `count` identical pods,
/// each demanding `request` (GLOSSARY, `spec.md` §3).
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct PodSet {
    pub name: String,
    pub count: u32,

    /// Per-pod resource request, e.g. `{"cpu": 500m, "memory": ...}`.
    pub request: BTreeMap<ResourceName, Quantity>,

    /// Smallest `count` the workload can usefully run with, used by partial
    /// admission (`SPEC_FULL.md`, feature flag `PartialAdmission`). Defaults
    /// to `count` (no partial admission) when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_count: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology_request: Option<PodSetTopologyRequest>,
}

impl PodSet {
    pub fn effective_min_count(&self) -> u32 {
        self.min_count.unwrap_or(self.count).min(self.count)
    }

    /// Total demand for `resource` at the given pod count.
    pub fn demand_at(&self, resource: &str, count: u32) -> Quantity {
        let per_pod = self
            .request
            .get(resource)
            .copied()
            .unwrap_or(Quantity::ZERO);
        Quantity::from_millis(per_pod.as_millis().saturating_mul(i64::from(count)))
    }
}

/// Opaque hint consumed only by the pluggable TAS module (`spec.md` §1).
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct PodSetTopologyRequest {
    pub required_level: Option<String>,
    pub preferred_level: Option<String>,
}

#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "kueue.x-k8s.io",
    version = "v1beta1",
    kind = "Workload",
    root = "WorkloadCrd",
    status = "WorkloadStatus",
    namespaced
)]
pub struct WorkloadSpec {
    pub pod_sets: Vec<PodSet>,
    pub queue_name: LocalQueueName,

    /// Higher admits first (`spec.md` §2, §4.7).
    pub priority: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_class_name: Option<String>,
}

/// The decision record binding a workload to a ClusterQueue and a flavor
/// assignment (GLOSSARY, `spec.md` §3).
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Admission {
    pub cluster_queue: ClusterQueueName,
    pub pod_set_assignments: Vec<PodSetAssignment>,
}

impl Admission {
    /// `spec.md` §3's "Computed fields: FlavorResourceUsage" — total demand
    /// per (flavor, resource) pair implied by this admission.
    pub fn flavor_resource_usage(&self, pod_sets: &[PodSet]) -> ResourceQuantities {
        let mut usage = ResourceQuantities::new();
        for assignment in &self.pod_set_assignments {
            let Some(pod_set) = pod_sets.iter().find(|ps| ps.name == assignment.name) else {
                continue;
            };
            for (resource, flavor) in &assignment.flavors {
                let demand = pod_set.demand_at(resource, assignment.count);
                *usage
                    .entry((flavor.clone(), resource.clone()))
                    .or_insert(Quantity::ZERO) += demand;
            }
        }
        usage
    }
}

/// Per-PodSet outcome of flavor assignment: which flavor was chosen for each
/// covered resource, and the effective (possibly reduced, under partial
/// admission) pod count.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct PodSetAssignment {
    pub name: String,
    pub flavors: BTreeMap<ResourceName, FlavorName>,
    pub count: u32,
}

/// Wire-visible condition type strings (`spec.md` §6).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum WorkloadConditionType {
    QuotaReserved,
    Admitted,
    PodsReady,
    Evicted,
    Requeued,
    Finished,
}

impl std::fmt::Display for WorkloadConditionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkloadConditionType::QuotaReserved => "QuotaReserved",
            WorkloadConditionType::Admitted => "Admitted",
            WorkloadConditionType::PodsReady => "PodsReady",
            WorkloadConditionType::Evicted => "Evicted",
            WorkloadConditionType::Requeued => "Requeued",
            WorkloadConditionType::Finished => "Finished",
        };
        f.write_str(s)
    }
}

/// Reason codes from `spec.md` §6, plus a free-form fallback for reasons
/// contributed by external collaborators (adapters, check controllers) that
/// this crate has no closed enumeration for.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionReason {
    Preempted,
    InactiveWorkload,
    ClusterQueueStopped,
    AdmissionCheckRejected,
    CohortCycle,
    Other(String),
}

impl std::fmt::Display for ConditionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConditionReason::Preempted => f.write_str("Preempted"),
            ConditionReason::InactiveWorkload => f.write_str("InactiveWorkload"),
            ConditionReason::ClusterQueueStopped => f.write_str("ClusterQueueStopped"),
            ConditionReason::AdmissionCheckRejected => f.write_str("AdmissionCheckRejected"),
            ConditionReason::CohortCycle => f.write_str("CohortCycle"),
            ConditionReason::Other(reason) => f.write_str(reason),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct WorkloadCondition {
    #[serde(rename = "type")]
    pub type_: WorkloadConditionType,
    pub status: bool,
    pub reason: ConditionReason,
    pub message: String,
    pub last_transition_time: DateTime<Utc>,
}

/// High-level phase a workload occupies in the state machine described by
/// `spec.md` §4.7 ("State machine per workload"). Derived from the
/// condition list rather than stored redundantly, but surfaced here since
/// the scheduler and cache both need to branch on it frequently.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum WorkloadPhase {
    #[default]
    Pending,
    QuotaReserved,
    Admitted,
    Evicted,
    Finished,
}

/// Why a requeued workload's eligibility timestamp resets, controlling the
/// ambiguity flagged as Open Question #1 in `spec.md` §9.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum RequeuingTimestampStrategy {
    /// Eligibility timestamp stays pinned to workload creation time; fair
    /// ordering never forgets how long a workload has waited overall.
    #[default]
    CreationTimestamp,
    /// Eligibility timestamp resets to the most recent eviction; a workload
    /// bounced repeatedly does not perpetually jump the fair-share queue.
    EvictionTimestamp,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct WorkloadStatus {
    pub phase: WorkloadPhase,

    #[serde(default)]
    pub conditions: Vec<WorkloadCondition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admission: Option<Admission>,

    #[serde(default)]
    pub admission_checks: BTreeMap<String, WorkloadCheckState>,

    /// `spec.md` §3: "eligibility timestamp (creation time, or last eviction
    /// time depending on configured requeuing strategy)".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_eviction_time: Option<DateTime<Utc>>,

    pub requeue_count: u32,
}

impl WorkloadStatus {
    pub fn eligibility_timestamp(
        &self,
        created_at: DateTime<Utc>,
        strategy: RequeuingTimestampStrategy,
    ) -> DateTime<Utc> {
        match strategy {
            RequeuingTimestampStrategy::CreationTimestamp => created_at,
            RequeuingTimestampStrategy::EvictionTimestamp => {
                self.last_eviction_time.unwrap_or(created_at)
            }
        }
    }

    pub fn all_checks_ready(&self) -> bool {
        !self.admission_checks.is_empty()
            && self
                .admission_checks
                .values()
                .all(|state| state.is_terminal_success())
    }

    pub fn any_check_rejected(&self) -> bool {
        self.admission_checks
            .values()
            .any(|state| state.is_terminal_failure())
    }

    /// When this workload last transitioned into `Admitted`, if it ever has.
    pub fn admitted_at(&self) -> Option<DateTime<Utc>> {
        self.conditions
            .iter()
            .find(|c| c.type_ == WorkloadConditionType::Admitted && c.status)
            .map(|c| c.last_transition_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pod_set(count: u32, cpu_millis: i64) -> PodSet {
        PodSet {
            name: "main".to_string(),
            count,
            request: BTreeMap::from([("cpu".to_string(), Quantity::from_millis(cpu_millis))]),
            min_count: None,
            topology_request: None,
        }
    }

    #[test]
    fn flavor_resource_usage_multiplies_by_count() {
        let pod_sets = vec![pod_set(3, 500)];
        let admission = Admission {
            cluster_queue: "cq".to_string(),
            pod_set_assignments: vec![PodSetAssignment {
                name: "main".to_string(),
                flavors: BTreeMap::from([("cpu".to_string(), "default".to_string())]),
                count: 3,
            }],
        };
        let usage = admission.flavor_resource_usage(&pod_sets);
        assert_eq!(
            usage.get(&("default".to_string(), "cpu".to_string())),
            Some(&Quantity::from_millis(1500))
        );
    }

    #[test]
    fn effective_min_count_defaults_to_count() {
        let ps = pod_set(5, 100);
        assert_eq!(ps.effective_min_count(), 5);
    }
}
