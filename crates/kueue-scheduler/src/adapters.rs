//! External interface seams — `spec.md` §6. These traits are this crate's
//! only points of contact with the outside world: a real cluster, a test
//! fixture, or a demo in-memory store all plug in here without the
//! scheduling loop itself changing.
//!
//! `ObjectStoreCollaborator` needs genuine `dyn`-dispatch (one collaborator
//! instance, picked at startup) and does I/O, so its methods return boxed
//! futures rather than using `async fn` in the trait — the same shape
//! `futures::future::BoxFuture` exists for. `FrameworkAdapter` is a pure,
//! synchronous data transform (`spec.md` §6: `ToWorkload`, `SuspendGate`,
//! `FinalizeOnDeletion` never touch the network themselves — only the
//! collaborator that applies their output does), and several of them are
//! held at once in a registry keyed by object kind (`spec.md` §9), so it
//! stays plain `dyn`-safe trait objects too.

use futures::future::BoxFuture;
use futures::stream::BoxStream;

use kueue_api::resource::{CheckName, ClusterQueueName, CohortName, FlavorName, LocalQueueName};
use kueue_api::{
    AdmissionCheckSpec, ClusterQueueSpec, ClusterQueueStatus, CohortSpec, ResourceFlavorSpec,
    TopologySpec, WorkloadSpec, WorkloadStatus,
};
use kueue_core::WorkloadKey;

use crate::error::SchedulerError;

/// One observed change to a watched external object. `Deleted` carries only
/// the key — the object's last known shape no longer matters once it is
/// gone from the store (`spec.md` §4.1: `DeleteWorkload` takes just a key).
#[derive(Debug, Clone)]
pub enum WatchEvent<K, T> {
    Added(K, T),
    Modified(K, T),
    Deleted(K),
}

pub type WorkloadWatchEvent = WatchEvent<WorkloadKey, (WorkloadSpec, WorkloadStatus)>;
pub type ClusterQueueWatchEvent = WatchEvent<ClusterQueueName, ClusterQueueSpec>;
pub type CohortWatchEvent = WatchEvent<CohortName, CohortSpec>;
pub type ResourceFlavorWatchEvent = WatchEvent<FlavorName, ResourceFlavorSpec>;
pub type TopologyWatchEvent = WatchEvent<String, TopologySpec>;
pub type LocalQueueWatchEvent = WatchEvent<(String, LocalQueueName), ClusterQueueName>;
pub type AdmissionCheckWatchEvent = WatchEvent<CheckName, AdmissionCheckSpec>;

/// The object store the scheduler watches for inbound changes and writes
/// decisions back to (`spec.md` §6). One kind, one watch method; every
/// kind `spec.md` §3 enumerates gets a stream here, matching the "each
/// external entity kind is observed by its own long-running task" design
/// note (`spec.md` §9).
pub trait ObjectStoreCollaborator: Send + Sync {
    fn watch_workloads(&self) -> BoxStream<'_, WorkloadWatchEvent>;
    fn watch_cluster_queues(&self) -> BoxStream<'_, ClusterQueueWatchEvent>;
    fn watch_cohorts(&self) -> BoxStream<'_, CohortWatchEvent>;
    fn watch_resource_flavors(&self) -> BoxStream<'_, ResourceFlavorWatchEvent>;
    fn watch_topologies(&self) -> BoxStream<'_, TopologyWatchEvent>;
    fn watch_local_queues(&self) -> BoxStream<'_, LocalQueueWatchEvent>;
    fn watch_admission_checks(&self) -> BoxStream<'_, AdmissionCheckWatchEvent>;

    /// Writes a workload's status. Idempotent from the caller's
    /// perspective: writing the same status twice has the same observable
    /// effect as writing it once (`spec.md` §7: intents must be safe to
    /// retry after a transient failure).
    fn write_workload_status(
        &self,
        key: WorkloadKey,
        status: WorkloadStatus,
    ) -> BoxFuture<'_, Result<(), SchedulerError>>;

    fn write_cluster_queue_status(
        &self,
        name: ClusterQueueName,
        status: ClusterQueueStatus,
    ) -> BoxFuture<'_, Result<(), SchedulerError>>;
}

/// Translates one concrete job kind (a Deployment, a batch Job, whatever a
/// cluster actually runs) into the generic [`WorkloadSpec`] shape the
/// engine reasons about, and back out again as admission decisions land
/// (`spec.md` §6). Registered at startup in a map keyed by object kind
/// (`spec.md` §9), so this needs to be `dyn`-safe — every method is a pure
/// function over a caller-supplied object value, with no async step of its
/// own.
pub trait FrameworkAdapter: Send + Sync {
    /// The Kubernetes `kind` string this adapter handles, e.g. `"Job"`.
    fn kind(&self) -> &'static str;

    /// Projects a watched object into the generic workload shape, or
    /// `None` if this particular instance is not one the scheduler should
    /// track (`spec.md` §7: "unrecognized job kind: ignored at the
    /// adapter level, not an error").
    fn to_workload(&self, object: &serde_json::Value) -> Option<WorkloadSpec>;

    /// Builds the patch that gates (or ungates) the underlying object's
    /// pods once admission is decided.
    fn suspend_gate(&self, object: &serde_json::Value, admit: bool) -> serde_json::Value;

    /// Called when the underlying object is deleted, so an adapter that
    /// tracks adapter-private state (none of the ones shipped here do) can
    /// release it.
    fn finalize_on_deletion(&self, object: &serde_json::Value);
}
