//! The scheduler loop, CLI entrypoint, and external-collaborator trait
//! seams for Kueue (`spec.md` §4.7, §6). This is the only crate with a
//! `main.rs` and an async runtime; [`kueue_core`] stays synchronous and I/O
//! free underneath it.

pub mod adapters;
pub mod config;
pub mod error;
pub mod intents;
pub mod metrics;
pub mod scheduler_loop;

pub mod testing;

pub use adapters::{FrameworkAdapter, ObjectStoreCollaborator};
pub use config::SchedulerConfig;
pub use error::{SchedulerError, SchedulerResult};
pub use metrics::Metrics;
pub use scheduler_loop::{run, run_pass, PassOutcome};
