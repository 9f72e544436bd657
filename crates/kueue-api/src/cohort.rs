//! [`Cohort`]: a (possibly nested) grouping of ClusterQueues that may
//! borrow/lend capacity among each other (`spec.md` §3, GLOSSARY).

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{quota::ResourceGroup, resource::CohortName};

#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "kueue.x-k8s.io",
    version = "v1beta1",
    kind = "Cohort",
    root = "CohortCrd",
    status = "CohortStatus"
)]
pub struct CohortSpec {
    /// Enclosing cohort, if this cohort is itself nested. `spec.md` §3:
    /// "Cohorts themselves may nest."
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<CohortName>,

    /// The cohort's own quota, if any — `spec.md` §3's "virtual sibling"
    /// that participates in borrowing/lending like any ClusterQueue would.
    #[serde(default)]
    pub resource_groups: Vec<ResourceGroup>,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum CohortPhase {
    #[default]
    Ready,
    /// Set on the subtree rooted at a detected cycle, per `spec.md` §4.2/§9.
    Stale,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct CohortStatus {
    pub phase: CohortPhase,
}
