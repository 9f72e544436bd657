//! The in-memory scheduling engine: cache, cohort hierarchy, resource
//! algebra, flavor assignment, preemption, and fair sharing. No I/O, no
//! async — `kueue_scheduler` drives this engine and talks to the cluster.

pub mod assignment;
pub mod cache;
pub mod fairsharing;
pub mod generation;
pub mod hierarchy;
pub mod ordering;
pub mod pending;
pub mod preemption;
pub mod resource_node;
pub mod resources;
pub mod snapshot;

pub use cache::{Cache, CacheError, CacheResult, WorkloadKey};
pub use generation::{Generation, GenerationStamp};
pub use hierarchy::{CycleDetected, Hierarchy};
pub use pending::PendingWorkload;
pub use snapshot::Snapshot;
