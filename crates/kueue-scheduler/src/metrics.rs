//! Pass-level instrumentation — a small set of `prometheus` gauges and
//! counters (pending workload count, admitted workload count, cache
//! generation, scheduling pass duration). No scrape endpoint is stood up
//! here; wiring the registry to an HTTP handler is left to the deployment,
//! per `SPEC_FULL.md`'s ambient-stack description.

use prometheus::{Histogram, HistogramOpts, IntGauge, Opts, Registry};

use crate::scheduler_loop::PassOutcome;

pub struct Metrics {
    pub registry: Registry,
    pending_workloads: IntGauge,
    admitted_workloads: IntGauge,
    cache_generation: IntGauge,
    pass_duration_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let pending_workloads = IntGauge::with_opts(Opts::new(
            "kueue_scheduler_pending_workloads",
            "Number of workloads currently waiting on admission.",
        ))?;
        let admitted_workloads = IntGauge::with_opts(Opts::new(
            "kueue_scheduler_admitted_workloads",
            "Number of workloads currently admitted.",
        ))?;
        let cache_generation = IntGauge::with_opts(Opts::new(
            "kueue_scheduler_cache_generation",
            "Cache generation as of the last completed scheduling pass.",
        ))?;
        let pass_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "kueue_scheduler_pass_duration_seconds",
            "Wall-clock duration of one scheduling pass.",
        ))?;

        registry.register(Box::new(pending_workloads.clone()))?;
        registry.register(Box::new(admitted_workloads.clone()))?;
        registry.register(Box::new(cache_generation.clone()))?;
        registry.register(Box::new(pass_duration_seconds.clone()))?;

        Ok(Metrics { registry, pending_workloads, admitted_workloads, cache_generation, pass_duration_seconds })
    }

    pub fn observe_pass(
        &self,
        outcome: &PassOutcome,
        pending_count: usize,
        admitted_count: usize,
        generation: u64,
        duration: std::time::Duration,
    ) {
        let _ = outcome;
        self.pending_workloads.set(pending_count as i64);
        self.admitted_workloads.set(admitted_count as i64);
        self.cache_generation.set(generation as i64);
        self.pass_duration_seconds.observe(duration.as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler_loop::PassOutcome;

    #[test]
    fn registers_all_four_metrics_without_name_collisions() {
        let metrics = Metrics::new().unwrap();
        let families = metrics.registry.gather();
        assert_eq!(families.len(), 4);
        metrics.observe_pass(&PassOutcome::default(), 3, 2, 7, std::time::Duration::from_millis(5));
        assert_eq!(metrics.pending_workloads.get(), 3);
        assert_eq!(metrics.admitted_workloads.get(), 2);
        assert_eq!(metrics.cache_generation.get(), 7);
    }
}
