//! [`ResourceNode`]: the per-ClusterQueue / per-Cohort quota and usage
//! record from `spec.md` §4.2.

use kueue_api::resource::{FlavorResourceKey, Quantity, ResourceQuantities};
use kueue_api::quota::ResourceQuota;

use crate::resources;

/// Holds one node's declared quota, its own usage (zero for a Cohort node,
/// which never admits workloads directly — only its "virtual sibling"
/// quota participates in borrowing), and the bottom-up aggregates over its
/// subtree.
#[derive(Debug, Clone, Default)]
pub struct ResourceNode {
    pub quotas: std::collections::BTreeMap<FlavorResourceKey, ResourceQuota>,
    pub usage: ResourceQuantities,

    pub subtree_nominal: ResourceQuantities,
    pub subtree_usage: ResourceQuantities,
    pub subtree_guaranteed: ResourceQuantities,
}

impl ResourceNode {
    pub fn nominal(&self, key: &FlavorResourceKey) -> Quantity {
        self.quotas.get(key).map(|q| q.nominal).unwrap_or(Quantity::ZERO)
    }

    pub fn borrowing_limit(&self, key: &FlavorResourceKey) -> Option<Quantity> {
        self.quotas.get(key).and_then(|q| q.borrowing_limit)
    }

    pub fn lending_limit(&self, key: &FlavorResourceKey) -> Option<Quantity> {
        self.quotas.get(key).and_then(|q| q.lending_limit)
    }

    pub fn guaranteed(&self, key: &FlavorResourceKey) -> Quantity {
        self.quotas.get(key).map(|q| q.guaranteed()).unwrap_or(Quantity::ZERO)
    }

    pub fn usage_of(&self, key: &FlavorResourceKey) -> Quantity {
        resources::get(&self.usage, key)
    }

    /// Unused portion of this node's own nominal quota, never negative.
    pub fn unused_nominal(&self, key: &FlavorResourceKey) -> Quantity {
        self.nominal(key).saturating_sub(self.usage_of(key))
    }

    /// `nominal + borrowing_limit`, the ceiling this node alone may consume
    /// regardless of cohort-wide slack. `None` means unbounded locally
    /// (`spec.md` §3's "no borrow limit set ⇒ unlimited within cohort").
    pub fn local_cap(&self, key: &FlavorResourceKey) -> Option<Quantity> {
        self.borrowing_limit(key).map(|limit| self.nominal(key) + limit)
    }

    /// How much of this node's unused nominal it permits a sibling to draw,
    /// per `spec.md` §4.2's borrowing semantics: capped by `lending_limit`
    /// when set, unlimited (full unused nominal) otherwise.
    pub fn lendable_amount(&self, key: &FlavorResourceKey) -> Quantity {
        let cap = self.lending_limit(key).unwrap_or(self.nominal(key));
        self.unused_nominal(key).min(cap)
    }

    pub fn set_quota(&mut self, key: FlavorResourceKey, quota: ResourceQuota) {
        self.quotas.insert(key, quota);
    }

    /// Recomputes this node's own subtree aggregates from its direct quota
    /// and usage, for leaf nodes (ClusterQueues) whose subtree is always
    /// just themselves.
    pub fn refresh_leaf_subtree(&mut self) {
        self.subtree_nominal = self.quotas.iter().map(|(k, q)| (k.clone(), q.nominal)).collect();
        self.subtree_usage = self.usage.clone();
        self.subtree_guaranteed = self
            .quotas
            .iter()
            .map(|(k, q)| (k.clone(), q.guaranteed()))
            .collect();
    }
}
