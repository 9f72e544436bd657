//! End-to-end passes through `run_pass`, wired against the in-memory
//! `Cache` and the fake collaborator from `kueue_scheduler::testing`. These
//! exercise scenarios that span more than one module inside `kueue-core`:
//! a cohort lending quota across two queues, and a higher-priority
//! workload preempting a lower-priority one already admitted.

use std::collections::BTreeMap;

use chrono::Utc;
use kueue_api::quota::{FlavorQuotas, ResourceGroup, ResourceQuota};
use kueue_api::queue::{ClusterQueuePreemption, PreemptionPolicy};
use kueue_api::resource::Quantity;
use kueue_api::{ClusterQueueSpec, CohortSpec, PodSet, ResourceFlavorSpec, WorkloadSpec, WorkloadStatus};
use kueue_core::Cache;
use kueue_scheduler::testing::FakeObjectStore;
use kueue_scheduler::{run_pass, Metrics, SchedulerConfig};
use tokio_util::sync::CancellationToken;

fn pod_set(cpu_millis: i64) -> PodSet {
    let mut request = BTreeMap::new();
    request.insert("cpu".to_string(), Quantity::from_millis(cpu_millis));
    PodSet { name: "main".to_string(), count: 1, request, min_count: None, topology_request: None }
}

fn flavor_quotas(nominal: i64) -> Vec<ResourceGroup> {
    vec![ResourceGroup {
        covered_resources: vec!["cpu".to_string()],
        flavors: vec![FlavorQuotas {
            name: "default".to_string(),
            resources: vec![("cpu".to_string(), ResourceQuota::new(Quantity::from_millis(nominal)))],
        }],
    }]
}

fn borrowing_queue(nominal: i64, cohort: &str) -> ClusterQueueSpec {
    ClusterQueueSpec {
        resource_groups: flavor_quotas(nominal),
        cohort: Some(cohort.to_string()),
        preemption: Default::default(),
        flavor_fungibility: Default::default(),
        fair_sharing: Default::default(),
        admission_checks: vec![],
        queueing_strategy: Default::default(),
        stopped: false,
    }
}

#[tokio::test]
async fn a_workload_borrows_idle_quota_from_a_cohort_sibling() {
    let cache = Cache::default();
    cache.add_or_update_flavor("default".to_string(), ResourceFlavorSpec::default());
    cache
        .add_or_update_cohort("team".to_string(), CohortSpec { parent: None, resource_groups: vec![] })
        .unwrap();
    cache.add_or_update_cluster_queue("borrower".to_string(), borrowing_queue(1000, "team")).unwrap();
    cache.add_or_update_cluster_queue("lender".to_string(), borrowing_queue(4000, "team")).unwrap();
    cache.add_local_queue("ns".to_string(), "lq".to_string(), "borrower".to_string());
    cache
        .add_or_update_workload(
            ("ns".to_string(), "big".to_string()),
            "ns".to_string(),
            WorkloadSpec { pod_sets: vec![pod_set(3000)], queue_name: "lq".to_string(), priority: 1, priority_class_name: None },
            WorkloadStatus::default(),
            Utc::now(),
        )
        .unwrap();

    let config = SchedulerConfig::default();
    let store = FakeObjectStore::default();
    let metrics = Metrics::new().unwrap();
    let cancel = CancellationToken::new();

    let outcome = run_pass(&cache, &config, &store, &metrics, &cancel).await.unwrap();
    assert_eq!(outcome.admitted, vec![("ns".to_string(), "big".to_string())]);
    assert!(outcome.unschedulable.is_empty());
}

#[tokio::test]
async fn a_higher_priority_workload_preempts_a_lower_priority_occupant() {
    let cache = Cache::default();
    cache.add_or_update_flavor("default".to_string(), ResourceFlavorSpec::default());

    let mut queue_spec = borrowing_queue(4000, "none");
    queue_spec.cohort = None;
    queue_spec.preemption = ClusterQueuePreemption {
        within_cluster_queue: PreemptionPolicy::LowerPriority,
        reclaim_within_cohort: PreemptionPolicy::Never,
    };
    cache.add_or_update_cluster_queue("cq".to_string(), queue_spec).unwrap();
    cache.add_local_queue("ns".to_string(), "lq".to_string(), "cq".to_string());

    cache
        .add_or_update_workload(
            ("ns".to_string(), "low".to_string()),
            "ns".to_string(),
            WorkloadSpec { pod_sets: vec![pod_set(3000)], queue_name: "lq".to_string(), priority: 1, priority_class_name: None },
            WorkloadStatus::default(),
            Utc::now(),
        )
        .unwrap();

    let config = SchedulerConfig::default();
    let store = FakeObjectStore::default();
    let metrics = Metrics::new().unwrap();
    let cancel = CancellationToken::new();
    let first_pass = run_pass(&cache, &config, &store, &metrics, &cancel).await.unwrap();
    assert_eq!(first_pass.admitted, vec![("ns".to_string(), "low".to_string())]);

    // The cache only learns about the admission once an outside watch loop
    // reacts to the collaborator write; this test reproduces that by
    // applying the written status back onto the cache directly.
    let (_, status) = store.written_statuses().into_iter().next().unwrap();
    cache
        .add_or_update_workload(
            ("ns".to_string(), "low".to_string()),
            "ns".to_string(),
            WorkloadSpec { pod_sets: vec![pod_set(3000)], queue_name: "lq".to_string(), priority: 1, priority_class_name: None },
            status,
            Utc::now(),
        )
        .unwrap();

    cache
        .add_or_update_workload(
            ("ns".to_string(), "urgent".to_string()),
            "ns".to_string(),
            WorkloadSpec { pod_sets: vec![pod_set(3000)], queue_name: "lq".to_string(), priority: 10, priority_class_name: None },
            WorkloadStatus::default(),
            Utc::now(),
        )
        .unwrap();

    let second_pass = run_pass(&cache, &config, &store, &metrics, &cancel).await.unwrap();
    assert_eq!(second_pass.admitted, vec![("ns".to_string(), "urgent".to_string())]);
    assert_eq!(second_pass.evicted, vec![("ns".to_string(), "low".to_string())]);
}

#[tokio::test]
async fn an_unschedulable_workload_is_reported_without_a_store_write() {
    let cache = Cache::default();
    cache.add_or_update_flavor("default".to_string(), ResourceFlavorSpec::default());
    cache.add_or_update_cluster_queue("cq".to_string(), borrowing_queue(1000, "none")).unwrap();
    cache.add_local_queue("ns".to_string(), "lq".to_string(), "cq".to_string());
    cache
        .add_or_update_workload(
            ("ns".to_string(), "whale".to_string()),
            "ns".to_string(),
            WorkloadSpec { pod_sets: vec![pod_set(9000)], queue_name: "lq".to_string(), priority: 1, priority_class_name: None },
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
    assert!(store.written_statuses().is_empty());
}
