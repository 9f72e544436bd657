//! Validation errors raised while interpreting deserialized API objects.
//! These never represent a crash: a structured error here becomes a
//! [`crate::queue::QueueReadinessReason`] on the owning ClusterQueue
//! (`spec.md` §7 — "Configuration errors ... surface as queue Inactive").

use crate::resource::{ClusterQueueName, FlavorName};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("cluster queue {0:?} references unknown flavor {1:?}")]
    UnknownFlavor(ClusterQueueName, FlavorName),

    #[error("cluster queue {0:?} references unknown admission check {1:?}")]
    UnknownAdmissionCheck(ClusterQueueName, String),

    #[error(transparent)]
    Quota(#[from] crate::quota::QuotaError),

    #[error("fair sharing weight must be positive, got {0}")]
    NonPositiveFairShareWeight(u32),
}

/// `spec.md` §4.6: DRS is undefined for a zero-weight queue, so weight must
/// be positive whenever fair sharing is enabled.
pub fn validate_fair_sharing_weight(weight: u32) -> Result<(), ApiError> {
    if weight == 0 {
        Err(ApiError::NonPositiveFairShareWeight(weight))
    } else {
        Ok(())
    }
}
