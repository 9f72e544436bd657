//! In-memory fakes for the `spec.md` §6 trait seams, used by this crate's
//! own tests and available to downstream integration tests instead of a
//! real cluster (`SPEC_FULL.md`: "tests the loop against an in-memory fake
//! object-store collaborator and fake framework adapter").

use std::sync::Mutex;

use futures::future::BoxFuture;
use futures::stream::{self, BoxStream};

use kueue_api::resource::ClusterQueueName;
use kueue_api::{ClusterQueueStatus, WorkloadSpec, WorkloadStatus};
use kueue_core::WorkloadKey;

use crate::adapters::{
    AdmissionCheckWatchEvent, ClusterQueueWatchEvent, CohortWatchEvent, FrameworkAdapter,
    LocalQueueWatchEvent, ObjectStoreCollaborator, ResourceFlavorWatchEvent, TopologyWatchEvent,
    WorkloadWatchEvent,
};
use crate::error::SchedulerError;

/// A collaborator with no real backing store: watches never produce
/// events, and writes either succeed and get recorded, or always fail,
/// depending on how it was constructed.
#[derive(Default)]
pub struct FakeObjectStore {
    written_statuses: Mutex<Vec<(WorkloadKey, WorkloadStatus)>>,
    written_queue_statuses: Mutex<Vec<(ClusterQueueName, ClusterQueueStatus)>>,
    fail_writes: bool,
}

impl FakeObjectStore {
    pub fn always_fails() -> Self {
        FakeObjectStore { fail_writes: true, ..Default::default() }
    }

    pub fn written_statuses(&self) -> Vec<(WorkloadKey, WorkloadStatus)> {
        self.written_statuses.lock().unwrap().clone()
    }

    pub fn written_queue_statuses(&self) -> Vec<(ClusterQueueName, ClusterQueueStatus)> {
        self.written_queue_statuses.lock().unwrap().clone()
    }
}

impl ObjectStoreCollaborator for FakeObjectStore {
    fn watch_workloads(&self) -> BoxStream<'_, WorkloadWatchEvent> {
        Box::pin(stream::empty())
    }

    fn watch_cluster_queues(&self) -> BoxStream<'_, ClusterQueueWatchEvent> {
        Box::pin(stream::empty())
    }

    fn watch_cohorts(&self) -> BoxStream<'_, CohortWatchEvent> {
        Box::pin(stream::empty())
    }

    fn watch_resource_flavors(&self) -> BoxStream<'_, ResourceFlavorWatchEvent> {
        Box::pin(stream::empty())
    }

    fn watch_topologies(&self) -> BoxStream<'_, TopologyWatchEvent> {
        Box::pin(stream::empty())
    }

    fn watch_local_queues(&self) -> BoxStream<'_, LocalQueueWatchEvent> {
        Box::pin(stream::empty())
    }

    fn watch_admission_checks(&self) -> BoxStream<'_, AdmissionCheckWatchEvent> {
        Box::pin(stream::empty())
    }

    fn write_workload_status(
        &self,
        key: WorkloadKey,
        status: WorkloadStatus,
    ) -> BoxFuture<'_, Result<(), SchedulerError>> {
        Box::pin(async move {
            if self.fail_writes {
                return Err(SchedulerError::Store("fake store configured to fail".to_string()));
            }
            self.written_statuses.lock().unwrap().push((key, status));
            Ok(())
        })
    }

    fn write_cluster_queue_status(
        &self,
        name: ClusterQueueName,
        status: ClusterQueueStatus,
    ) -> BoxFuture<'_, Result<(), SchedulerError>> {
        Box::pin(async move {
            if self.fail_writes {
                return Err(SchedulerError::Store("fake store configured to fail".to_string()));
            }
            self.written_queue_statuses.lock().unwrap().push((name, status));
            Ok(())
        })
    }
}

/// A framework adapter for a made-up `"Demo"` kind, useful for exercising
/// the registry and the CLI wiring without pulling in a real job kind.
pub struct FakeFrameworkAdapter;

impl FrameworkAdapter for FakeFrameworkAdapter {
    fn kind(&self) -> &'static str {
        "Demo"
    }

    fn to_workload(&self, object: &serde_json::Value) -> Option<WorkloadSpec> {
        serde_json::from_value(object.get("spec")?.clone()).ok()
    }

    fn suspend_gate(&self, _object: &serde_json::Value, admit: bool) -> serde_json::Value {
        serde_json::json!({ "spec": { "suspend": !admit } })
    }

    fn finalize_on_deletion(&self, _object: &serde_json::Value) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_is_recorded_on_a_healthy_fake_store() {
        let store = FakeObjectStore::default();
        store
            .write_workload_status(("ns".to_string(), "wl".to_string()), WorkloadStatus::default())
            .await
            .unwrap();
        assert_eq!(store.written_statuses().len(), 1);
    }

    #[tokio::test]
    async fn write_always_errors_on_a_failing_fake_store() {
        let store = FakeObjectStore::always_fails();
        let result = store
            .write_workload_status(("ns".to_string(), "wl".to_string()), WorkloadStatus::default())
            .await;
        assert!(result.is_err());
    }
}
