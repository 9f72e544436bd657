//! Errors surfaced by the scheduler binary. Config and collaborator
//! failures are distinct from [`kueue_core::CacheError`]: the cache only
//! ever rejects a single mutation, while these represent failures of the
//! ambient machinery around it (`spec.md` §7).

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("failed to read scheduler config from {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse scheduler config: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error("invalid scheduler config: {0}")]
    ConfigInvalid(String),

    #[error("object-store collaborator rejected a write: {0}")]
    Store(String),

    #[error("cache rejected a mutation: {0}")]
    Cache(#[from] kueue_core::CacheError),

    #[error("scheduling pass cancelled")]
    Cancelled,
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
