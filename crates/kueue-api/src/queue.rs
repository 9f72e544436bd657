//! [`ClusterQueue`]: the admission unit and scheduling decision boundary
//! (`spec.md` §3, GLOSSARY).

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    admission_check::AdmissionCheckStrategyRule,
    quota::ResourceGroup,
    resource::CohortName,
};

/// Threshold used both by [`ClusterQueuePreemption`]'s two axes
/// (`spec.md` §3: "{withinQueue, reclaimWithinCohort} x {Never, Any,
/// LowerPriority, LowerOrNewerEqualPriority}").
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum PreemptionPolicy {
    #[default]
    Never,
    Any,
    LowerPriority,
    LowerOrNewerEqualPriority,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ClusterQueuePreemption {
    pub within_cluster_queue: PreemptionPolicy,
    pub reclaim_within_cohort: PreemptionPolicy,
}

/// `spec.md` §4.4 step 2: governs whether a flavor that only fits by
/// borrowing, or only by preempting, is accepted or whether the engine
/// should try the next flavor in the group instead.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum WhenCanBorrow {
    #[default]
    Borrow,
    Preempt,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum WhenCanPreempt {
    Preempt,
    #[default]
    TryNextFlavor,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct FlavorFungibility {
    pub when_can_borrow: WhenCanBorrow,
    pub when_can_preempt: WhenCanPreempt,
}

/// `spec.md` §4.5's fair-share preemption guard.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum FairSharingPreemptionStrategy {
    #[default]
    LessThanOrEqualToFinalShare,
    LessThanInitialShare,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct FairSharingSpec {
    /// Weight used in the DRS denominator (`spec.md` §4.6). Must be
    /// positive; a queue with weight zero would have an undefined (infinite)
    /// share and is rejected by [`crate::validate_fair_sharing_weight`].
    pub weight: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preemption_strategy: Option<FairSharingPreemptionStrategy>,
}

/// `spec.md` §4.7: queues configured StrictFIFO block later workloads behind
/// an unschedulable head; all other queues let the scheduler skip ahead.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum QueueingStrategy {
    #[default]
    BestEffortFifo,
    StrictFifo,
}

#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "kueue.x-k8s.io",
    version = "v1beta1",
    kind = "ClusterQueue",
    root = "ClusterQueueCrd",
    status = "ClusterQueueStatus"
)]
pub struct ClusterQueueSpec {
    pub resource_groups: Vec<ResourceGroup>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cohort: Option<CohortName>,

    #[serde(default)]
    pub preemption: ClusterQueuePreemption,

    #[serde(default)]
    pub flavor_fungibility: FlavorFungibility,

    #[serde(default)]
    pub fair_sharing: FairSharingSpec,

    #[serde(default)]
    pub admission_checks: Vec<AdmissionCheckStrategyRule>,

    #[serde(default)]
    pub queueing_strategy: QueueingStrategy,

    /// Operator-requested stop; a stopped queue is never `Active`
    /// (`spec.md` §3).
    #[serde(default)]
    pub stopped: bool,
}

/// `spec.md` §3: "derived status {Active, Pending, Terminating}".
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum ClusterQueuePhase {
    #[default]
    Pending,
    Active,
    Terminating,
}

/// Wire-visible reason codes for the `Active` condition, `spec.md` §6,
/// emitted verbatim. Order here is also the deterministic precedence order
/// `ClusterQueueReadiness` (`spec.md` §4.1) uses when more than one cause
/// applies: earlier variants win.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord)]
pub enum QueueReadinessReason {
    Stopped,
    FlavorNotFound,
    AdmissionCheckNotFound,
    AdmissionCheckInactive,
    MultipleMultiKueueAdmissionChecks,
    MultiKueueAdmissionCheckAppliedPerFlavor,
    MultipleSingleInstanceControllerAdmissionChecks,
    FlavorIndependentAdmissionCheckAppliedPerFlavor,
    NotSupportedWithTopologyAwareScheduling,
    TopologyNotFound,
    /// Not part of the upstream reason enumeration in `spec.md` §6, but
    /// required by §4.2/§9 to report cohort-hierarchy cycles distinctly
    /// from a plain configuration error.
    CohortCycle,
    Terminating,
    Ready,
    Unknown,
}

impl std::fmt::Display for QueueReadinessReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            QueueReadinessReason::Stopped => "Stopped",
            QueueReadinessReason::FlavorNotFound => "FlavorNotFound",
            QueueReadinessReason::AdmissionCheckNotFound => "AdmissionCheckNotFound",
            QueueReadinessReason::AdmissionCheckInactive => "AdmissionCheckInactive",
            QueueReadinessReason::MultipleMultiKueueAdmissionChecks => {
                "MultipleMultiKueueAdmissionChecks"
            }
            QueueReadinessReason::MultiKueueAdmissionCheckAppliedPerFlavor => {
                "MultiKueueAdmissionCheckAppliedPerFlavor"
            }
            QueueReadinessReason::MultipleSingleInstanceControllerAdmissionChecks => {
                "MultipleSingleInstanceControllerAdmissionChecks"
            }
            QueueReadinessReason::FlavorIndependentAdmissionCheckAppliedPerFlavor => {
                "FlavorIndependentAdmissionCheckAppliedPerFlavor"
            }
            QueueReadinessReason::NotSupportedWithTopologyAwareScheduling => {
                "NotSupportedWithTopologyAwareScheduling"
            }
            QueueReadinessReason::TopologyNotFound => "TopologyNotFound",
            QueueReadinessReason::CohortCycle => "CohortCycle",
            QueueReadinessReason::Terminating => "Terminating",
            QueueReadinessReason::Ready => "Ready",
            QueueReadinessReason::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ClusterQueueStatus {
    pub phase: ClusterQueuePhase,
    pub reason: Option<QueueReadinessReason>,
    pub message: String,

    /// Bumped on quota or workload-deletion events (`spec.md` §3); stale
    /// scheduling attempts are detected by comparing against this value.
    pub allocatable_resource_generation: u64,
}

impl Default for QueueReadinessReason {
    fn default() -> Self {
        QueueReadinessReason::Unknown
    }
}
