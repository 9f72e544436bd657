//! [`ResourceGroup`] and [`ResourceQuota`]: the per-ClusterQueue and
//! per-Cohort quota declarations from `spec.md` §3.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::resource::{FlavorName, Quantity, ResourceName};

/// Per (flavor, resource) quota triple.
///
/// Invariants (enforced by [`ResourceQuota::validate`], not by construction,
/// since these values arrive deserialized from the object store and must be
/// rejected with a structured error rather than panic):
/// - `nominal >= 0`
/// - if `lending_limit` is set, `lending_limit <= nominal`
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ResourceQuota {
    pub nominal: Quantity,

    /// Maximum this queue may draw from cohort siblings, on top of
    /// `nominal`. `None` means unlimited within the cohort.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub borrowing_limit: Option<Quantity>,

    /// Maximum this queue permits to be drawn from its own `nominal` by
    /// siblings. `None` means unlimited (all of `nominal` may be lent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lending_limit: Option<Quantity>,
}

impl ResourceQuota {
    pub fn new(nominal: Quantity) -> Self {
        ResourceQuota {
            nominal,
            borrowing_limit: None,
            lending_limit: None,
        }
    }

    pub fn with_borrowing_limit(mut self, limit: Quantity) -> Self {
        self.borrowing_limit = Some(limit);
        self
    }

    pub fn with_lending_limit(mut self, limit: Quantity) -> Self {
        self.lending_limit = Some(limit);
        self
    }

    /// `guaranteed = nominal - lending`, per `spec.md` §3. This is the floor
    /// that fair sharing (§4.6) excludes from "lendable" capacity.
    pub fn guaranteed(&self) -> Quantity {
        match self.lending_limit {
            Some(lending) => self.nominal.saturating_sub(lending),
            None => Quantity::ZERO,
        }
    }

    pub fn validate(&self) -> Result<(), QuotaError> {
        if self.nominal.as_millis() < 0 {
            return Err(QuotaError::NegativeNominal);
        }
        if let Some(lending) = self.lending_limit {
            if lending.as_millis() < 0 {
                return Err(QuotaError::NegativeLendingLimit);
            }
            if lending > self.nominal {
                return Err(QuotaError::LendingExceedsNominal);
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QuotaError {
    #[error("nominal quota must not be negative")]
    NegativeNominal,
    #[error("lending limit must not be negative")]
    NegativeLendingLimit,
    #[error("lending limit must not exceed nominal quota")]
    LendingExceedsNominal,
}

/// A set of covered resources satisfiable from a single flavor chosen out of
/// an ordered flavor list. Different resource groups within the same
/// ClusterQueue are independent (`spec.md` §3).
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ResourceGroup {
    /// Resources covered by this group, e.g. `["cpu", "memory"]`.
    pub covered_resources: Vec<ResourceName>,

    /// Flavors tried in this declaration order during flavor assignment
    /// (`spec.md` §4.4).
    pub flavors: Vec<FlavorQuotas>,
}

/// One flavor entry within a [`ResourceGroup`]: the flavor's name plus its
/// per-resource quota for every resource the group covers.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct FlavorQuotas {
    pub name: FlavorName,
    pub resources: Vec<(ResourceName, ResourceQuota)>,
}

impl FlavorQuotas {
    pub fn quota_for(&self, resource: &str) -> Option<&ResourceQuota> {
        self.resources
            .iter()
            .find(|(name, _)| name == resource)
            .map(|(_, quota)| quota)
    }
}

impl ResourceGroup {
    pub fn covers(&self, resource: &str) -> bool {
        self.covered_resources.iter().any(|r| r == resource)
    }
}
