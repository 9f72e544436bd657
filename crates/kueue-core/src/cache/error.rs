//! [`CacheError`]: the structured error taxonomy for cache mutation
//! handlers (`spec.md` §4.1, §7). None of these ever panic the cache; the
//! caller (an observer reconciling one object) records them as a
//! reconciliation failure and retries on the next event.

use kueue_api::resource::{ClusterQueueName, CohortName};

pub type WorkloadKey = (String, String);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("cohort hierarchy update rejected: {0}")]
    CycleDetected(#[from] crate::hierarchy::CycleDetected),

    #[error("workload {key:?} already tracked under cluster queue {existing_queue:?}, refusing implicit move to {requested_queue:?}")]
    WorkloadAlreadyExists {
        key: WorkloadKey,
        existing_queue: ClusterQueueName,
        requested_queue: ClusterQueueName,
    },

    #[error("unknown cluster queue {0:?}")]
    UnknownClusterQueue(ClusterQueueName),

    #[error("unknown cohort {0:?}")]
    UnknownCohort(CohortName),

    #[error("unknown workload {0:?}")]
    UnknownWorkload(WorkloadKey),

    #[error("workload {0:?} names local queue {1:?}, which is not registered")]
    UnknownLocalQueue(WorkloadKey, String),

    #[error("invariant violation on cluster queue {queue:?}: {detail}")]
    InvariantViolation { queue: ClusterQueueName, detail: String },
}

pub type CacheResult<T> = Result<T, CacheError>;
