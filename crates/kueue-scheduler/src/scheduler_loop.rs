//! The scheduling pass — `spec.md` §4.7 steps 1–6. One call to [`run_pass`]
//! is one cycle: snapshot the cache, order pending work, try to admit it
//! against the snapshot, and emit the resulting intents. The cache itself
//! is touched only through its read-only accessors (`snapshot`,
//! `pending_workloads`, `admitted_candidates`) — every mutation this
//! function decides on reaches the cache only indirectly, through a watch
//! loop reacting to the collaborator write this pass makes (`spec.md` §5).

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use kueue_api::queue::QueueingStrategy;
use kueue_api::resource::ClusterQueueName;
use kueue_api::{
    ConditionReason, RequeuingTimestampStrategy, WorkloadCondition, WorkloadConditionType,
    WorkloadPhase,
};
use kueue_core::ordering::{order_heads, WorkloadHead};
use kueue_core::preemption::{Candidate, FairSharingGuard, Requesting};
use kueue_core::{assignment, fairsharing, preemption, Cache, WorkloadKey};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::adapters::ObjectStoreCollaborator;
use crate::config::SchedulerConfig;
use crate::error::SchedulerResult;
use crate::intents::{self, Intent};
use crate::metrics::Metrics;

#[derive(Debug, Clone, Default)]
pub struct PassOutcome {
    pub admitted: Vec<WorkloadKey>,
    pub evicted: Vec<WorkloadKey>,
    pub unschedulable: Vec<(WorkloadKey, String)>,
}

fn eligible_at(created_at: DateTime<Utc>, last_eviction_time: Option<DateTime<Utc>>, strategy: RequeuingTimestampStrategy) -> DateTime<Utc> {
    match strategy {
        RequeuingTimestampStrategy::CreationTimestamp => created_at,
        RequeuingTimestampStrategy::EvictionTimestamp => last_eviction_time.unwrap_or(created_at),
    }
}

fn admitted_condition(reason: ConditionReason, message: impl Into<String>, status: bool) -> WorkloadCondition {
    WorkloadCondition {
        type_: WorkloadConditionType::Admitted,
        status,
        reason,
        message: message.into(),
        last_transition_time: Utc::now(),
    }
}

/// Runs one scheduling pass to completion (or until `cancel` fires) and
/// returns what it decided. Does not retry; the caller's loop calls this
/// again on the next tick.
#[instrument(skip_all)]
pub async fn run_pass(
    cache: &Cache,
    config: &SchedulerConfig,
    store: &dyn ObjectStoreCollaborator,
    metrics: &Metrics,
    cancel: &CancellationToken,
) -> SchedulerResult<PassOutcome> {
    let started = Instant::now();
    let snapshot = cache.snapshot();
    let mut working = snapshot.clone();

    let pending = cache.pending_workloads();
    let admitted_candidates = cache.admitted_candidates();
    let candidates_by_key: BTreeMap<WorkloadKey, Candidate> =
        admitted_candidates.iter().cloned().map(|c| (c.key.clone(), c)).collect();

    let mut pending_by_queue: BTreeMap<ClusterQueueName, Vec<kueue_core::PendingWorkload>> = BTreeMap::new();
    for workload in pending {
        pending_by_queue.entry(workload.cluster_queue.clone()).or_default().push(workload);
    }
    for group in pending_by_queue.values_mut() {
        group.sort_by(|a, b| {
            let head_a = WorkloadHead {
                namespace: a.key.0.clone(),
                name: a.key.1.clone(),
                cluster_queue: a.cluster_queue.clone(),
                priority: a.priority,
                eligible_at: eligible_at(a.created_at, a.last_eviction_time, config.requeuing_timestamp_strategy),
                dominant_resource_share: 0.0,
            };
            let head_b = WorkloadHead {
                namespace: b.key.0.clone(),
                name: b.key.1.clone(),
                cluster_queue: b.cluster_queue.clone(),
                priority: b.priority,
                eligible_at: eligible_at(b.created_at, b.last_eviction_time, config.requeuing_timestamp_strategy),
                dominant_resource_share: 0.0,
            };
            head_a.cmp_within_queue(&head_b)
        });
    }

    let heads: Vec<WorkloadHead> = pending_by_queue
        .iter()
        .filter_map(|(queue, group)| {
            let first = group.first()?;
            let queue_spec = &working.cluster_queue(queue)?.spec;
            let drs = fairsharing::dominant_resource_share(&working, queue, queue_spec.fair_sharing.weight);
            Some(WorkloadHead {
                namespace: first.key.0.clone(),
                name: first.key.1.clone(),
                cluster_queue: queue.clone(),
                priority: first.priority,
                eligible_at: eligible_at(first.created_at, first.last_eviction_time, config.requeuing_timestamp_strategy),
                dominant_resource_share: drs,
            })
        })
        .collect();
    let ordered_queues: Vec<ClusterQueueName> = order_heads(heads).into_iter().map(|h| h.cluster_queue).collect();

    let mut outcome = PassOutcome::default();
    let mut intents = Vec::new();
    let weights: BTreeMap<ClusterQueueName, u32> = working
        .hierarchy()
        .all_cohorts()
        .flat_map(|cohort| working.hierarchy().subtree_queues(&working.hierarchy().root_cohort(cohort)))
        .filter_map(|queue| working.cluster_queue(&queue).map(|cq| (queue, cq.spec.fair_sharing.weight)))
        .collect();

    'queues: for queue in &ordered_queues {
        if cancel.is_cancelled() {
            warn!("scheduling pass cancelled mid-sweep");
            break;
        }
        let Some(queue_spec) = working.cluster_queue(queue).map(|cq| cq.spec.clone()) else { continue };
        let strict = matches!(queue_spec.queueing_strategy, QueueingStrategy::StrictFifo);
        let Some(workloads) = pending_by_queue.get(queue) else { continue };

        for workload in workloads {
            if cancel.is_cancelled() {
                break 'queues;
            }

            match assignment::assign(&queue_spec, queue, &workload.pod_sets, &working, config.feature_gates.partial_admission) {
                Ok(assigned) => {
                    let admission = kueue_api::Admission {
                        cluster_queue: queue.clone(),
                        pod_set_assignments: assigned.pod_sets.clone(),
                    };
                    let demand = admission.flavor_resource_usage(&workload.pod_sets);

                    match assigned.mode {
                        assignment::Mode::Fit | assignment::Mode::BorrowFit => {
                            working.add_workload(queue, &demand);
                            outcome.admitted.push(workload.key.clone());
                            intents.push(Intent::Reserve {
                                key: workload.key.clone(),
                                status: build_admitted_status(cache, &workload.key, admission),
                            });
                            continue 'queues;
                        }
                        assignment::Mode::Preempt => {
                            let guard = config.feature_gates.fair_sharing.then(|| FairSharingGuard {
                                strategy: queue_spec.fair_sharing.preemption_strategy.unwrap_or_else(|| config.default_fair_sharing_strategy.into()),
                                weights: weights.clone(),
                            });
                            let requesting = Requesting {
                                cluster_queue: queue.clone(),
                                priority: workload.priority,
                                eligible_at: eligible_at(workload.created_at, workload.last_eviction_time, config.requeuing_timestamp_strategy),
                                demand: demand.clone(),
                                fair_sharing_weight: queue_spec.fair_sharing.weight,
                            };
                            match preemption::select_victims(&working, &queue_spec.preemption, &requesting, &admitted_candidates, guard.as_ref()) {
                                Some(victims) => {
                                    for victim_key in &victims {
                                        if let Some(candidate) = candidates_by_key.get(victim_key) {
                                            working.remove_workload(&candidate.cluster_queue, &candidate.usage);
                                        }
                                        outcome.evicted.push(victim_key.clone());
                                        intents.push(Intent::Evict {
                                            key: victim_key.clone(),
                                            status: build_evicted_status(cache, victim_key),
                                        });
                                    }
                                    working.add_workload(queue, &demand);
                                    outcome.admitted.push(workload.key.clone());
                                    intents.push(Intent::Reserve {
                                        key: workload.key.clone(),
                                        status: build_admitted_status(cache, &workload.key, admission),
                                    });
                                    continue 'queues;
                                }
                                None => {
                                    outcome.unschedulable.push((workload.key.clone(), "no eligible preemption victims".to_string()));
                                    if strict {
                                        continue 'queues;
                                    }
                                }
                            }
                        }
                    }
                }
                Err(no_fit) => {
                    let reason = no_fit
                        .primary_reason()
                        .map(|r| format!("{r:?}"))
                        .unwrap_or_else(|| "no fit".to_string());
                    outcome.unschedulable.push((workload.key.clone(), reason));
                    if strict {
                        continue 'queues;
                    }
                }
            }
        }
    }

    let failed = intents::emit(store, intents, config.store_retry_attempts, config.store_retry_backoff()).await;
    if !failed.is_empty() {
        warn!(count = failed.len(), "some intents were not durably written this pass");
    }

    let pending_count = pending_by_queue.values().map(|v| v.len()).sum::<usize>();
    metrics.observe_pass(&outcome, pending_count, admitted_candidates.len(), snapshot.stamp.value(), started.elapsed());
    info!(
        admitted = outcome.admitted.len(),
        evicted = outcome.evicted.len(),
        unschedulable = outcome.unschedulable.len(),
        "scheduling pass complete"
    );

    Ok(outcome)
}

fn build_admitted_status(cache: &Cache, key: &WorkloadKey, admission: kueue_api::Admission) -> kueue_api::WorkloadStatus {
    let mut status = cache.workload(key).map(|(_, status, _)| status).unwrap_or_default();
    status.phase = WorkloadPhase::Admitted;
    status.admission = Some(admission);
    status.conditions.push(admitted_condition(ConditionReason::Other("Admitted".to_string()), "assigned by scheduling pass", true));
    status
}

fn build_evicted_status(cache: &Cache, key: &WorkloadKey) -> kueue_api::WorkloadStatus {
    let mut status = cache.workload(key).map(|(_, status, _)| status).unwrap_or_default();
    status.phase = WorkloadPhase::Evicted;
    status.admission = None;
    status.last_eviction_time = Some(Utc::now());
    status.requeue_count += 1;
    status.conditions.push(admitted_condition(ConditionReason::Preempted, "evicted to admit a higher-priority workload", false));
    status
}

/// Drives [`run_pass`] on `config.tick_interval_ms` until `cancel` fires —
/// the long-running task `main.rs` spawns (`spec.md` §9: "a coroutine-like
/// loop driven by a timer or a watch wakeup").
pub async fn run(
    cache: &Cache,
    config: &SchedulerConfig,
    store: &dyn ObjectStoreCollaborator,
    metrics: &Metrics,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(config.tick_interval());
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = run_pass(cache, config, store, metrics, &cancel).await {
                    warn!(error = %err, "scheduling pass failed");
                }
            }
            _ = cancel.cancelled() => {
                info!("scheduler loop cancelled");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeObjectStore;
    use kueue_api::quota::{FlavorQuotas, ResourceGroup, ResourceQuota};
    use kueue_api::resource::Quantity;
    use kueue_api::{ClusterQueueSpec, PodSet, ResourceFlavorSpec, WorkloadSpec, WorkloadStatus};
    use std::collections::BTreeMap as Map;

    fn simple_queue(nominal: i64) -> ClusterQueueSpec {
        ClusterQueueSpec {
            resource_groups: vec![ResourceGroup {
                covered_resources: vec!["cpu".to_string()],
                flavors: vec![FlavorQuotas {
                    name: "default".to_string(),
                    resources: vec![("cpu".to_string(), ResourceQuota::new(Quantity::from_millis(nominal)))],
                }],
            }],
            cohort: None,
            preemption: Default::default(),
            flavor_fungibility: Default::default(),
            fair_sharing: Default::default(),
            admission_checks: vec![],
            queueing_strategy: Default::default(),
            stopped: false,
        }
    }

    fn pod_set(cpu_millis: i64) -> PodSet {
        let mut request = Map::new();
        request.insert("cpu".to_string(), Quantity::from_millis(cpu_millis));
        PodSet { name: "main".to_string(), count: 1, request, min_count: None, topology_request: None }
    }

    #[tokio::test]
    async fn a_fitting_workload_is_admitted_and_reserved_through_the_store() {
        let cache = Cache::default();
        cache.add_or_update_flavor("default".to_string(), ResourceFlavorSpec::default());
        cache.add_or_update_cluster_queue("cq".to_string(), simple_queue(4000)).unwrap();
        cache.add_local_queue("ns".to_string(), "lq".to_string(), "cq".to_string());
        cache
            .add_or_update_workload(
                ("ns".to_string(), "wl".to_string()),
                "ns".to_string(),
                WorkloadSpec { pod_sets: vec![pod_set(1000)], queue_name: "lq".to_string(), priority: 1, priority_class_name: None },
                WorkloadStatus::default(),
                Utc::now(),
            )
            .unwrap();

        let config = SchedulerConfig::default();
        let store = FakeObjectStore::default();
        let metrics = Metrics::new().unwrap();
        let cancel = CancellationToken::new();

        let outcome = run_pass(&cache, &config, &store, &metrics, &cancel).await.unwrap();
        assert_eq!(outcome.admitted, vec![("ns".to_string(), "wl".to_string())]);
        assert_eq!(store.written_statuses().len(), 1);
    }

    #[tokio::test]
    async fn an_oversized_workload_with_no_preemption_policy_stays_unschedulable() {
        let cache = Cache::default();
        cache.add_or_update_flavor("default".to_string(), ResourceFlavorSpec::default());
        cache.add_or_update_cluster_queue("cq".to_string(), simple_queue(1000)).unwrap();
        cache.add_local_queue("ns".to_string(), "lq".to_string(), "cq".to_string());
        cache
            .add_or_update_workload(
                ("ns".to_string(), "wl".to_string()),
                "ns".to_string(),
                WorkloadSpec { pod_sets: vec![pod_set(4000)], queue_name: "lq".to_string(), priority: 1, priority_class_name: None },
                WorkloadStatus::default(),
                Utc::now(),
            )
            .unwrap();

        let config = SchedulerConfig::default();
        let store = FakeObjectStore::default();
        let metrics = Metrics::new().unwrap();
        let cancel = CancellationToken::new();

        let outcome = run_pass(&cache, &config, &store, &metrics, &cancel).await.unwrap();
        assert!(outcome.admitted.is_empty());
        assert_eq!(outcome.unschedulable.len(), 1);
    }
}
