//! Primitive resource quantities and the keys used to index them.
//!
//! Quantities are always carried as integer milli-units (the same convention
//! Kubernetes itself uses for `cpu`) so that the engine never has to reason
//! about floating point rounding when comparing demand against quota.

use std::{
    collections::BTreeMap,
    fmt,
    iter::Sum,
    ops::{Add, AddAssign, Sub, SubAssign},
};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Name of a [`crate::flavor::ResourceFlavor`]. Flavors within a resource
/// group are tried in declaration order, so identity is all that matters
/// here; a plain `String` key keeps the lookup maps trivially serializable.
pub type FlavorName = String;

/// Name of a quantifiable resource, e.g. `cpu`, `memory`, `nvidia.com/gpu`.
pub type ResourceName = String;

/// Name of a [`crate::queue::ClusterQueue`].
pub type ClusterQueueName = String;

/// Name of a [`crate::cohort::Cohort`].
pub type CohortName = String;

/// Name of a [`crate::local_queue::LocalQueue`], scoped to its namespace.
pub type LocalQueueName = String;

/// Name of an [`crate::admission_check::AdmissionCheck`].
pub type CheckName = String;

/// Key identifying a single (flavor, resource) quota/usage slot.
pub type FlavorResourceKey = (FlavorName, ResourceName);

/// A map from (flavor, resource) to a [`Quantity`]. `BTreeMap` is used
/// throughout the engine (rather than a hash map) so that iteration order is
/// deterministic, which `spec.md` §4.1 requires for readiness messages and
/// which makes snapshot equality checks (§4.3, §8) meaningful.
pub type ResourceQuantities = BTreeMap<FlavorResourceKey, Quantity>;

/// An integer quantity of a resource, expressed in milli-units.
///
/// One whole CPU is `Quantity::from_millis(1000)`. Memory and other
/// resources that Kubernetes expresses in whole units are still carried in
/// milli-units here for uniformity; callers scale at the boundary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct Quantity(i64);

impl Quantity {
    pub const ZERO: Quantity = Quantity(0);

    pub const fn from_millis(millis: i64) -> Self {
        Quantity(millis)
    }

    pub const fn as_millis(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Addition with no upper bound; quantities are never capped on the
    /// accumulating side, only remaining-capacity computations saturate.
    pub fn saturating_add(self, other: Quantity) -> Quantity {
        Quantity(self.0.saturating_add(other.0))
    }

    /// Subtraction floored at zero, per `spec.md` §2's "arithmetic with
    /// saturation at zero". Used for "remaining capacity" style quantities
    /// that are never meaningfully negative.
    pub fn saturating_sub(self, other: Quantity) -> Quantity {
        Quantity(self.0.saturating_sub(other.0).max(0))
    }

    /// True subtraction, allowed to go negative. Used when the sign itself
    /// is the answer (e.g. "is cohort-wide remaining capacity non-negative").
    pub fn checked_sub_signed(self, other: Quantity) -> Quantity {
        Quantity(self.0.saturating_sub(other.0))
    }
}

impl Add for Quantity {
    type Output = Quantity;
    fn add(self, rhs: Quantity) -> Quantity {
        self.saturating_add(rhs)
    }
}

impl AddAssign for Quantity {
    fn add_assign(&mut self, rhs: Quantity) {
        *self = *self + rhs;
    }
}

impl Sub for Quantity {
    type Output = Quantity;
    fn sub(self, rhs: Quantity) -> Quantity {
        self.checked_sub_signed(rhs)
    }
}

impl SubAssign for Quantity {
    fn sub_assign(&mut self, rhs: Quantity) {
        *self = *self - rhs;
    }
}

impl Sum for Quantity {
    fn sum<I: Iterator<Item = Quantity>>(iter: I) -> Self {
        iter.fold(Quantity::ZERO, Quantity::saturating_add)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.0)
    }
}

impl From<i64> for Quantity {
    fn from(millis: i64) -> Self {
        Quantity(millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturating_sub_floors_at_zero() {
        let a = Quantity::from_millis(3);
        let b = Quantity::from_millis(10);
        assert_eq!(a.saturating_sub(b), Quantity::ZERO);
    }

    #[test]
    fn checked_sub_signed_can_go_negative() {
        let a = Quantity::from_millis(3);
        let b = Quantity::from_millis(10);
        assert_eq!(a.checked_sub_signed(b).as_millis(), -7);
    }

    #[test]
    fn sum_saturates_rather_than_overflows() {
        let values = vec![Quantity::from_millis(i64::MAX), Quantity::from_millis(1)];
        assert_eq!(values.into_iter().sum::<Quantity>().as_millis(), i64::MAX);
    }
}
