//! Head ordering — `spec.md` §4.7 steps 3–4: which pending workload each
//! ClusterQueue offers to flavor assignment this pass, and the order those
//! heads are attempted in across queues.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use kueue_api::resource::ClusterQueueName;

/// One ClusterQueue's candidate for this scheduling pass.
#[derive(Debug, Clone)]
pub struct WorkloadHead {
    pub namespace: String,
    pub name: String,
    pub cluster_queue: ClusterQueueName,
    pub priority: i32,
    pub eligible_at: DateTime<Utc>,
    pub dominant_resource_share: f64,
}

impl WorkloadHead {
    /// Within one ClusterQueue: highest priority first, then earliest
    /// eligibility timestamp, then name — a total order (`spec.md` §4.7
    /// step 3).
    pub fn cmp_within_queue(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| self.eligible_at.cmp(&other.eligible_at))
            .then_with(|| self.name.cmp(&other.name))
    }

    /// Across ClusterQueues: lowest DRS first, then earliest eligibility
    /// (`spec.md` §4.7 step 4, §4.6).
    pub fn cmp_across_queues(&self, other: &Self) -> Ordering {
        self.dominant_resource_share
            .partial_cmp(&other.dominant_resource_share)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.eligible_at.cmp(&other.eligible_at))
    }
}

/// Reduces a flat list of pending candidates (already filtered to one
/// per-queue ordering relation) to one head per ClusterQueue — the
/// best-ordered candidate in each group.
pub fn queue_heads(mut candidates: Vec<WorkloadHead>) -> Vec<WorkloadHead> {
    candidates.sort_by(|a, b| a.cluster_queue.cmp(&b.cluster_queue).then_with(|| a.cmp_within_queue(b)));

    let mut heads = Vec::new();
    let mut last_queue: Option<ClusterQueueName> = None;
    for candidate in candidates {
        if last_queue.as_ref() != Some(&candidate.cluster_queue) {
            last_queue = Some(candidate.cluster_queue.clone());
            heads.push(candidate);
        }
    }
    heads
}

/// Orders a set of per-queue heads for admission attempts this pass.
pub fn order_heads(mut heads: Vec<WorkloadHead>) -> Vec<WorkloadHead> {
    heads.sort_by(|a, b| a.cmp_across_queues(b));
    heads
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head(queue: &str, priority: i32, minute: i64, drs: f64) -> WorkloadHead {
        WorkloadHead {
            namespace: "ns".to_string(),
            name: format!("{queue}-{priority}-{minute}"),
            cluster_queue: queue.to_string(),
            priority,
            eligible_at: DateTime::from_timestamp(minute * 60, 0).unwrap(),
            dominant_resource_share: drs,
        }
    }

    #[test]
    fn queue_heads_picks_highest_priority_then_earliest() {
        let candidates = vec![head("a", 1, 5, 0.0), head("a", 5, 10, 0.0), head("a", 5, 3, 0.0)];
        let heads = queue_heads(candidates);
        assert_eq!(heads.len(), 1);
        assert_eq!(heads[0].priority, 5);
        assert_eq!(heads[0].eligible_at, DateTime::from_timestamp(3 * 60, 0).unwrap());
    }

    #[test]
    fn order_heads_favors_lower_drs() {
        let heads = vec![head("a", 1, 0, 0.25), head("b", 1, 0, 0.05)];
        let ordered = order_heads(heads);
        assert_eq!(ordered[0].cluster_queue, "b");
    }
}
