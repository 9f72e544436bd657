//! Scheduler runtime configuration: tick interval, feature gates, and the
//! `spec.md` §9 Open Question decisions that have to be picked once at
//! startup rather than discovered per-pass. Loaded from a YAML file with
//! `serde_yaml` and layered with environment-variable overrides, the way
//! plain (non-derive-macro) config structs in this codebase are loaded.

use std::path::Path;
use std::time::Duration;

use kueue_api::{FeatureGates, RequeuingTimestampStrategy};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{SchedulerError, SchedulerResult};

fn default_tick_interval_ms() -> u64 {
    1_000
}

fn default_store_retry_attempts() -> u32 {
    5
}

fn default_store_retry_backoff_ms() -> u64 {
    100
}

/// `spec.md` §9 Open Question #2: which strategy governs the fair-sharing
/// preemption guard when a ClusterQueue leaves `preemption_strategy` unset.
/// Decided here rather than per-queue so the whole cluster has one
/// predictable default (`DESIGN.md`).
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum DefaultFairSharingStrategy {
    #[default]
    LessThanOrEqualToFinalShare,
    LessThanInitialShare,
}

impl From<DefaultFairSharingStrategy> for kueue_api::FairSharingPreemptionStrategy {
    fn from(value: DefaultFairSharingStrategy) -> Self {
        match value {
            DefaultFairSharingStrategy::LessThanOrEqualToFinalShare => {
                kueue_api::FairSharingPreemptionStrategy::LessThanOrEqualToFinalShare
            }
            DefaultFairSharingStrategy::LessThanInitialShare => {
                kueue_api::FairSharingPreemptionStrategy::LessThanInitialShare
            }
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SchedulerConfig {
    /// How often `run_pass` is driven by the main loop.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    #[serde(default)]
    pub feature_gates: FeatureGates,

    /// `spec.md` §9 Open Question #1, resolved cluster-wide.
    #[serde(default)]
    pub requeuing_timestamp_strategy: RequeuingTimestampStrategy,

    #[serde(default)]
    pub default_fair_sharing_strategy: DefaultFairSharingStrategy,

    /// Transient store-write retries, per `spec.md` §7.
    #[serde(default = "default_store_retry_attempts")]
    pub store_retry_attempts: u32,

    #[serde(default = "default_store_retry_backoff_ms")]
    pub store_retry_backoff_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            tick_interval_ms: default_tick_interval_ms(),
            feature_gates: FeatureGates::default(),
            requeuing_timestamp_strategy: RequeuingTimestampStrategy::default(),
            default_fair_sharing_strategy: DefaultFairSharingStrategy::default(),
            store_retry_attempts: default_store_retry_attempts(),
            store_retry_backoff_ms: default_store_retry_backoff_ms(),
        }
    }
}

impl SchedulerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn store_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.store_retry_backoff_ms)
    }

    pub fn from_file(path: &Path) -> SchedulerResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| SchedulerError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: SchedulerConfig = serde_yaml::from_str(&raw)?;
        Ok(config.apply_env_overrides())
    }

    /// Overlays a handful of `KUEUE_SCHEDULER_*` environment variables on
    /// top of the file-loaded config — the same override shape the
    /// `clap(env)` attribute gives the CLI flags, reimplemented here because
    /// these fields live inside a YAML-loaded struct rather than on
    /// [`crate::Cli`] directly.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(value) = std::env::var("KUEUE_SCHEDULER_TICK_INTERVAL_MS") {
            if let Ok(parsed) = value.parse() {
                self.tick_interval_ms = parsed;
            }
        }
        if let Ok(value) = std::env::var("KUEUE_SCHEDULER_FAIR_SHARING") {
            self.feature_gates.fair_sharing = value == "true" || value == "1";
        }
        if let Ok(value) = std::env::var("KUEUE_SCHEDULER_PARTIAL_ADMISSION") {
            self.feature_gates.partial_admission = value == "true" || value == "1";
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(DefaultFairSharingStrategy::LessThanOrEqualToFinalShare, kueue_api::FairSharingPreemptionStrategy::LessThanOrEqualToFinalShare)]
    #[case(DefaultFairSharingStrategy::LessThanInitialShare, kueue_api::FairSharingPreemptionStrategy::LessThanInitialShare)]
    fn default_fair_sharing_strategy_maps_onto_the_api_enum(
        #[case] default: DefaultFairSharingStrategy,
        #[case] expected: kueue_api::FairSharingPreemptionStrategy,
    ) {
        assert_eq!(kueue_api::FairSharingPreemptionStrategy::from(default), expected);
    }

    #[test]
    fn defaults_round_trip_through_yaml() {
        let config = SchedulerConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: SchedulerConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let parsed: SchedulerConfig = serde_yaml::from_str("tick_interval_ms: 500").unwrap();
        assert_eq!(parsed.tick_interval_ms, 500);
        assert_eq!(parsed.store_retry_attempts, default_store_retry_attempts());
    }

    #[test]
    fn from_file_reads_and_parses_a_real_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scheduler.yaml");
        std::fs::write(&path, "tick_interval_ms: 2500\nstore_retry_attempts: 1\n").unwrap();

        let config = SchedulerConfig::from_file(&path).unwrap();
        assert_eq!(config.tick_interval_ms, 2500);
        assert_eq!(config.store_retry_attempts, 1);
    }

    #[test]
    fn from_file_reports_the_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist.yaml");
        let err = SchedulerConfig::from_file(&missing).unwrap_err();
        assert!(matches!(err, SchedulerError::ConfigRead { .. }));
    }
}
