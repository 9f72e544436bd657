//! [`ResourceFlavor`] and [`Topology`]: the named capacity buckets that
//! `spec.md` §3 describes. Both are modeled as Kubernetes custom resources
//! so a real object-store watcher can be wired against these types without
//! changes to this crate.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Ordered list of topology levels (e.g. `["rack", "block"]`), coarsest
/// first. Consumed only by the pluggable TAS module (`spec.md` §1); the core
/// tracks a flavor's optional topology reference purely to detect the
/// unsupported TAS/AdmissionCheck combination in `spec.md` §4.1.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[kube(group = "kueue.x-k8s.io", version = "v1beta1", kind = "Topology", root = "TopologyCrd")]
pub struct TopologySpec {
    pub levels: Vec<String>,
}

/// Named bucket of fungible capacity. `ClusterQueue` resource groups
/// reference flavors by name; a missing flavor renders the owning queue
/// `Inactive` (`spec.md` §3).
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[kube(
    group = "kueue.x-k8s.io",
    version = "v1beta1",
    kind = "ResourceFlavor",
    root = "ResourceFlavorCrd"
)]
pub struct ResourceFlavorSpec {
    /// Node-label selectors used downstream for placement. The core never
    /// interprets these; they are carried through untouched.
    #[serde(default)]
    pub node_labels: BTreeMap<String, String>,

    /// Name of the [`Topology`] this flavor places pods against, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology_name: Option<String>,
}

impl Default for ResourceFlavorSpec {
    fn default() -> Self {
        ResourceFlavorSpec {
            node_labels: BTreeMap::new(),
            topology_name: None,
        }
    }
}
