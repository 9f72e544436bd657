//! Data model for the Kueue admission controller core.
//!
//! Every type here is either a Kubernetes custom resource (derives
//! [`kube::CustomResource`]) or a plain value type embedded in one. This
//! crate has no mutation logic and no locking; [`kueue_core`] consumes these
//! types read-only and owns all engine state.

pub mod admission_check;
pub mod cohort;
pub mod error;
pub mod features;
pub mod flavor;
pub mod local_queue;
pub mod quota;
pub mod queue;
pub mod resource;
pub mod workload;

pub use admission_check::{
    AdmissionCheckCrd, AdmissionCheckFlags, AdmissionCheckSpec, AdmissionCheckStatus,
    AdmissionCheckStrategyRule, WorkloadCheckState,
};
pub use cohort::{CohortCrd, CohortPhase, CohortSpec, CohortStatus};
pub use error::ApiError;
pub use features::FeatureGates;
pub use flavor::{ResourceFlavorCrd, ResourceFlavorSpec, TopologyCrd, TopologySpec};
pub use local_queue::{LocalQueueCrd, LocalQueueSpec, LocalQueueStatus};
pub use quota::{FlavorQuotas, QuotaError, ResourceGroup, ResourceQuota};
pub use queue::{
    ClusterQueueCrd, ClusterQueuePreemption, ClusterQueueSpec, ClusterQueueStatus,
    FairSharingPreemptionStrategy, FairSharingSpec, FlavorFungibility, PreemptionPolicy,
    QueueReadinessReason, QueueingStrategy, WhenCanBorrow, WhenCanPreempt,
};
pub use resource::{
    ClusterQueueName, CohortName, FlavorName, FlavorResourceKey, LocalQueueName, Quantity,
    ResourceName, ResourceQuantities,
};
pub use workload::{
    Admission, ConditionReason, PodSet, PodSetAssignment, PodSetTopologyRequest,
    RequeuingTimestampStrategy, WorkloadCondition, WorkloadConditionType, WorkloadCrd,
    WorkloadPhase, WorkloadSpec, WorkloadStatus,
};
