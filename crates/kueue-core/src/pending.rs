//! The scheduler-facing view of workloads the cache is tracking:
//! [`PendingWorkload`] for ones still waiting on admission (`spec.md`
//! §4.7 step 2), and the [`crate::preemption::Candidate`] conversion for
//! ones already admitted, which a scheduling pass may need to evict.

use chrono::{DateTime, Utc};
use kueue_api::resource::ClusterQueueName;
use kueue_api::PodSet;

use crate::cache::WorkloadKey;

/// One tracked workload with no `Admission` yet recorded against it.
#[derive(Debug, Clone)]
pub struct PendingWorkload {
    pub key: WorkloadKey,
    pub cluster_queue: ClusterQueueName,
    pub pod_sets: Vec<PodSet>,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub last_eviction_time: Option<DateTime<Utc>>,
}
