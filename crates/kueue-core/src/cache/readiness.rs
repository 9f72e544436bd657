//! [`compute_readiness`]: `spec.md` §4.1's `ClusterQueueReadiness`, factored
//! out as a pure function of the cache's configuration state so its
//! deterministic ordering can be unit-tested without going through the
//! locking `Cache` wrapper.

use std::collections::BTreeMap;

use kueue_api::{
    admission_check::MULTIKUEUE_CONTROLLER_NAME,
    queue::{ClusterQueuePhase, ClusterQueueSpec, QueueReadinessReason},
    resource::{CheckName, FlavorName},
    AdmissionCheckSpec, ResourceFlavorSpec, TopologySpec,
};

/// Computes `(phase, reason, message)` for one ClusterQueue. Checks run in
/// the exact precedence order `spec.md` §4.1 enumerates, plus the
/// cohort-cycle check this workspace's `SPEC_FULL.md` slots in right after
/// `stopped` (a cyclic cohort makes every other computation meaningless, so
/// it is checked before anything that depends on resolving flavors/checks).
pub(crate) fn compute_readiness(
    spec: &ClusterQueueSpec,
    flavors: &BTreeMap<FlavorName, ResourceFlavorSpec>,
    topologies: &BTreeMap<String, TopologySpec>,
    checks: &BTreeMap<CheckName, AdmissionCheckSpec>,
    is_terminating: bool,
    cohort_stale: bool,
) -> (ClusterQueuePhase, QueueReadinessReason, String) {
    if is_terminating {
        return (
            ClusterQueuePhase::Terminating,
            QueueReadinessReason::Terminating,
            "cluster queue is being deleted".to_string(),
        );
    }

    if spec.stopped {
        return (
            ClusterQueuePhase::Pending,
            QueueReadinessReason::Stopped,
            "cluster queue is stopped".to_string(),
        );
    }

    if cohort_stale {
        return (
            ClusterQueuePhase::Pending,
            QueueReadinessReason::CohortCycle,
            "cluster queue's cohort is part of a cycle in the cohort hierarchy".to_string(),
        );
    }

    for group in &spec.resource_groups {
        for flavor in &group.flavors {
            if !flavors.contains_key(&flavor.name) {
                return (
                    ClusterQueuePhase::Pending,
                    QueueReadinessReason::FlavorNotFound,
                    format!("resource flavor {:?} not found", flavor.name),
                );
            }
        }
    }

    for rule in &spec.admission_checks {
        if !checks.contains_key(&rule.check_name) {
            return (
                ClusterQueuePhase::Pending,
                QueueReadinessReason::AdmissionCheckNotFound,
                format!("admission check {:?} not found", rule.check_name),
            );
        }
    }

    for rule in &spec.admission_checks {
        if let Some(check) = checks.get(&rule.check_name) {
            if !check.flags.active {
                return (
                    ClusterQueuePhase::Pending,
                    QueueReadinessReason::AdmissionCheckInactive,
                    format!("admission check {:?} is not active", rule.check_name),
                );
            }
        }
    }

    let multikueue_rules: Vec<_> = spec
        .admission_checks
        .iter()
        .filter(|rule| {
            checks
                .get(&rule.check_name)
                .is_some_and(|c| c.controller_name == MULTIKUEUE_CONTROLLER_NAME)
        })
        .collect();

    if multikueue_rules.len() > 1 {
        return (
            ClusterQueuePhase::Pending,
            QueueReadinessReason::MultipleMultiKueueAdmissionChecks,
            "at most one MultiKueue admission check may be referenced".to_string(),
        );
    }

    if multikueue_rules.iter().any(|rule| rule.on_flavors.is_some()) {
        return (
            ClusterQueuePhase::Pending,
            QueueReadinessReason::MultiKueueAdmissionCheckAppliedPerFlavor,
            "MultiKueue admission check may not be scoped to specific flavors".to_string(),
        );
    }

    let mut single_instance_controllers: BTreeMap<&str, u32> = BTreeMap::new();
    for rule in &spec.admission_checks {
        if let Some(check) = checks.get(&rule.check_name) {
            if check.flags.single_instance_in_cluster_queue {
                *single_instance_controllers.entry(check.controller_name.as_str()).or_insert(0) += 1;
            }
        }
    }
    if single_instance_controllers.values().any(|count| *count > 1) {
        return (
            ClusterQueuePhase::Pending,
            QueueReadinessReason::MultipleSingleInstanceControllerAdmissionChecks,
            "at most one admission check per single-instance controller may be referenced"
                .to_string(),
        );
    }

    for rule in &spec.admission_checks {
        if let Some(check) = checks.get(&rule.check_name) {
            if check.flags.flavor_independent && rule.on_flavors.is_some() {
                return (
                    ClusterQueuePhase::Pending,
                    QueueReadinessReason::FlavorIndependentAdmissionCheckAppliedPerFlavor,
                    format!("admission check {:?} may not be scoped to specific flavors", rule.check_name),
                );
            }
        }
    }

    for group in &spec.resource_groups {
        for flavor in &group.flavors {
            let Some(flavor_spec) = flavors.get(&flavor.name) else {
                continue;
            };
            if let Some(topology_name) = &flavor_spec.topology_name {
                if !topologies.contains_key(topology_name) {
                    return (
                        ClusterQueuePhase::Pending,
                        QueueReadinessReason::TopologyNotFound,
                        format!("topology {:?} not found", topology_name),
                    );
                }
                if !multikueue_rules.is_empty() {
                    return (
                        ClusterQueuePhase::Pending,
                        QueueReadinessReason::NotSupportedWithTopologyAwareScheduling,
                        "topology-aware scheduling is not supported together with MultiKueue"
                            .to_string(),
                    );
                }
            }
        }
    }

    (
        ClusterQueuePhase::Active,
        QueueReadinessReason::Ready,
        "cluster queue is ready".to_string(),
    )
}
