//! Idempotent intent emission — `spec.md` §4.7 step 6 and §7: once a pass
//! decides to reserve, evict, or give up on a workload, the decision is
//! packaged as an [`Intent`] and written out through the collaborator with
//! retry-with-backoff on transient failure. Re-emitting the same intent
//! after a retry is always safe: each one is a full status replacement, not
//! a delta.

use std::time::Duration;

use kueue_api::WorkloadStatus;
use kueue_core::WorkloadKey;
use tracing::{instrument, warn};

use crate::adapters::ObjectStoreCollaborator;
use crate::error::SchedulerError;

#[derive(Debug, Clone)]
pub enum Intent {
    /// The workload now carries a committed [`kueue_api::Admission`];
    /// `status` is the full replacement status, conditions included.
    Reserve { key: WorkloadKey, status: WorkloadStatus },
    /// The workload's admission was revoked to make room for a
    /// higher-priority one.
    Evict { key: WorkloadKey, status: WorkloadStatus },
}

impl Intent {
    fn key(&self) -> &WorkloadKey {
        match self {
            Intent::Reserve { key, .. } => key,
            Intent::Evict { key, .. } => key,
        }
    }
}

/// Emits every intent from one pass, retrying transient store failures with
/// exponential backoff (`spec.md` §7) up to `attempts` tries. Returns the
/// keys whose write never succeeded, so the caller can log and pick them up
/// again next pass rather than treat the whole pass as failed.
#[instrument(skip_all, fields(count = intents.len()))]
pub async fn emit(
    store: &dyn ObjectStoreCollaborator,
    intents: Vec<Intent>,
    attempts: u32,
    initial_backoff: Duration,
) -> Vec<WorkloadKey> {
    let mut failed = Vec::new();
    for intent in intents {
        let key = intent.key().clone();
        let status = match &intent {
            Intent::Reserve { status, .. } | Intent::Evict { status, .. } => status.clone(),
        };

        let mut backoff = initial_backoff;
        let mut last_error: Option<SchedulerError> = None;
        let mut succeeded = false;
        for attempt in 0..attempts.max(1) {
            match store.write_workload_status(key.clone(), status.clone()).await {
                Ok(()) => {
                    succeeded = true;
                    break;
                }
                Err(err) => {
                    warn!(
                        namespace = key.0.as_str(),
                        name = key.1.as_str(),
                        attempt,
                        error = %err,
                        "workload status write failed, retrying"
                    );
                    last_error = Some(err);
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }

        if !succeeded {
            warn!(
                namespace = key.0.as_str(),
                name = key.1.as_str(),
                error = ?last_error,
                "workload status write exhausted retries, deferring to next pass"
            );
            failed.push(key);
        }
    }
    failed
}
