//! [`LocalQueue`]: a namespace-scoped handle onto a [`crate::queue::ClusterQueue`]
//! (`spec.md` §3). Carries counters only; all policy lives on the
//! ClusterQueue it points at.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::resource::ClusterQueueName;

#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "kueue.x-k8s.io",
    version = "v1beta1",
    kind = "LocalQueue",
    root = "LocalQueueCrd",
    status = "LocalQueueStatus",
    namespaced
)]
pub struct LocalQueueSpec {
    pub cluster_queue: ClusterQueueName,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct LocalQueueStatus {
    pub reserving_workloads: u32,
    pub admitted_workloads: u32,
    pub pending_workloads: u32,
}
