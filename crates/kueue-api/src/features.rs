//! Runtime feature flags (`spec.md` §6).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct FeatureGates {
    pub topology_aware_scheduling: bool,
    pub lending_limit: bool,
    pub local_queue_metrics: bool,
    pub admission_check_validation_rules: bool,
    pub fair_sharing: bool,
    pub partial_admission: bool,
}

impl Default for FeatureGates {
    fn default() -> Self {
        FeatureGates {
            topology_aware_scheduling: false,
            lending_limit: true,
            local_queue_metrics: false,
            admission_check_validation_rules: true,
            fair_sharing: false,
            partial_admission: false,
        }
    }
}
