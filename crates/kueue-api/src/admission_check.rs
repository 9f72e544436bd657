//! [`AdmissionCheck`] resources and the per-workload state machine the core
//! tracks for each one (`spec.md` §3, §6). The checks themselves run as
//! external controllers (provisioning request, multi-cluster dispatch); the
//! core only ever reads and writes [`WorkloadCheckState`].

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::resource::FlavorName;

/// Well-known controller identifiers the readiness logic (`spec.md` §4.1)
/// singles out by name: MultiKueue checks are capped at one per
/// ClusterQueue and may not be applied per-flavor; any other controller is
/// capped at one "single instance" check per ClusterQueue.
pub const MULTIKUEUE_CONTROLLER_NAME: &str = "kueue.x-k8s.io/multikueue";

#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[kube(
    group = "kueue.x-k8s.io",
    version = "v1beta1",
    kind = "AdmissionCheck",
    root = "AdmissionCheckCrd",
    status = "AdmissionCheckStatus"
)]
pub struct AdmissionCheckSpec {
    /// Identifier of the controller that will reconcile this check, e.g.
    /// [`MULTIKUEUE_CONTROLLER_NAME`] or a provisioning-request controller
    /// name.
    pub controller_name: String,

    #[serde(default)]
    pub flags: AdmissionCheckFlags,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct AdmissionCheckFlags {
    /// Checks that are not active are treated the same as missing checks by
    /// `ClusterQueueReadiness` (`spec.md` §4.1).
    pub active: bool,

    /// At most one check with this flag may be referenced by a single
    /// ClusterQueue.
    pub single_instance_in_cluster_queue: bool,

    /// A check with this flag may not be scoped to a subset of flavors; it
    /// always applies cluster-queue-wide.
    pub flavor_independent: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct AdmissionCheckStatus {
    pub active: bool,
}

/// A ClusterQueue's reference to an [`AdmissionCheck`], with optional
/// per-flavor applicability (`spec.md` §3: "admission-check references with
/// per-flavor applicability").
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct AdmissionCheckStrategyRule {
    pub check_name: String,

    /// `None` means the check applies regardless of the chosen flavor.
    /// `Some(flavors)` scopes it to those flavors only; this is rejected at
    /// readiness-computation time for checks flagged `flavor_independent`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_flavors: Option<Vec<FlavorName>>,
}

/// Result reported by an external AdmissionCheck controller for one
/// workload (`spec.md` §6).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum WorkloadCheckState {
    Pending,
    Ready,
    Retry,
    Rejected,
}

impl WorkloadCheckState {
    pub fn is_terminal_success(self) -> bool {
        matches!(self, WorkloadCheckState::Ready)
    }

    pub fn is_terminal_failure(self) -> bool {
        matches!(self, WorkloadCheckState::Rejected)
    }
}
