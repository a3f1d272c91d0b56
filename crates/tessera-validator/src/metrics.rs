use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Prometheus metrics for the validator, on a registry it owns
#[derive(Clone)]
pub struct ValidatorMetrics {
    registry: Arc<Registry>,

    // Cycle
    pub cycles_total: IntCounter,
    pub cycles_aborted: IntCounterVec,
    pub cycle_duration: Histogram,

    // Sampling
    pub samples_total: Arc<IntCounter>,
    pub backfilled_total: Arc<IntCounter>,
    pub eligible_peers: Arc<IntGauge>,

    // Dispatch
    pub dispatch_calls_total: Arc<IntCounter>,
    pub dispatch_absent_total: Arc<IntCounter>,
    pub dispatch_call_duration: Arc<Histogram>,

    // Probes and scored task
    pub probes_sent: IntCounter,
    pub probes_accepted: IntCounter,
    pub probes_absent: IntCounter,
    pub scored_absent: IntCounter,

    // Frontier
    pub frontier_queue_len: IntGauge,
    pub frontier_seen: IntGauge,

    // Submissions
    pub submissions_total: IntCounter,
    pub submission_failures: IntCounter,
}

impl ValidatorMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let cycles_total = IntCounter::new(
            "tessera_cycles_total",
            "Total forward cycles completed",
        )?;
        let cycles_aborted = IntCounterVec::new(
            Opts::new("tessera_cycles_aborted_total", "Total forward cycles aborted"),
            &["reason"],
        )?;
        let cycle_duration = Histogram::with_opts(
            HistogramOpts::new(
                "tessera_cycle_duration_seconds",
                "Duration of a completed forward cycle",
            )
            .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 40.0, 80.0]),
        )?;

        let samples_total = IntCounter::new(
            "tessera_samples_total",
            "Total peer samples drawn",
        )?;
        let backfilled_total = IntCounter::new(
            "tessera_backfilled_peers_total",
            "Total excluded peers drawn to fill a sample",
        )?;
        let eligible_peers = IntGauge::new(
            "tessera_eligible_peers",
            "Eligible peers in the latest registry snapshot",
        )?;

        let dispatch_calls_total = IntCounter::new(
            "tessera_dispatch_calls_total",
            "Total peer calls dispatched",
        )?;
        let dispatch_absent_total = IntCounter::new(
            "tessera_dispatch_absent_total",
            "Total peer calls that timed out or failed",
        )?;
        let dispatch_call_duration = Histogram::with_opts(
            HistogramOpts::new(
                "tessera_dispatch_call_duration_seconds",
                "Duration of a single peer call",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 12.0, 20.0]),
        )?;

        let probes_sent = IntCounter::new("tessera_probes_sent_total", "Total probes sent")?;
        let probes_accepted = IntCounter::new(
            "tessera_probes_accepted_total",
            "Total probe completions accepted",
        )?;
        let probes_absent = IntCounter::new(
            "tessera_probes_absent_total",
            "Total probes without a complete answer",
        )?;
        let scored_absent = IntCounter::new(
            "tessera_scored_absent_total",
            "Total scored-task calls without an answer",
        )?;

        let frontier_queue_len = IntGauge::new(
            "tessera_frontier_queue_len",
            "URLs waiting in the crawl frontier",
        )?;
        let frontier_seen = IntGauge::new(
            "tessera_frontier_seen",
            "URLs ever seen by the crawl frontier",
        )?;

        let submissions_total = IntCounter::new(
            "tessera_submissions_total",
            "Total probe submissions published",
        )?;
        let submission_failures = IntCounter::new(
            "tessera_submission_failures_total",
            "Total probe submissions that failed",
        )?;

        registry.register(Box::new(cycles_total.clone()))?;
        registry.register(Box::new(cycles_aborted.clone()))?;
        registry.register(Box::new(cycle_duration.clone()))?;
        registry.register(Box::new(samples_total.clone()))?;
        registry.register(Box::new(backfilled_total.clone()))?;
        registry.register(Box::new(eligible_peers.clone()))?;
        registry.register(Box::new(dispatch_calls_total.clone()))?;
        registry.register(Box::new(dispatch_absent_total.clone()))?;
        registry.register(Box::new(dispatch_call_duration.clone()))?;
        registry.register(Box::new(probes_sent.clone()))?;
        registry.register(Box::new(probes_accepted.clone()))?;
        registry.register(Box::new(probes_absent.clone()))?;
        registry.register(Box::new(scored_absent.clone()))?;
        registry.register(Box::new(frontier_queue_len.clone()))?;
        registry.register(Box::new(frontier_seen.clone()))?;
        registry.register(Box::new(submissions_total.clone()))?;
        registry.register(Box::new(submission_failures.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            cycles_total,
            cycles_aborted,
            cycle_duration,
            samples_total: Arc::new(samples_total),
            backfilled_total: Arc::new(backfilled_total),
            eligible_peers: Arc::new(eligible_peers),
            dispatch_calls_total: Arc::new(dispatch_calls_total),
            dispatch_absent_total: Arc::new(dispatch_absent_total),
            dispatch_call_duration: Arc::new(dispatch_call_duration),
            probes_sent,
            probes_accepted,
            probes_absent,
            scored_absent,
            frontier_queue_len,
            frontier_seen,
            submissions_total,
            submission_failures,
        })
    }

    pub fn gather(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }
}
