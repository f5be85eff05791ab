//! Prometheus metrics for the intake service

use prometheus::{Histogram, HistogramOpts, IntCounterVec, Opts, Registry};

/// Intake metrics, registered on a private registry
pub struct Metrics {
    /// Submissions by outcome (accepted, invalid, rejected_upstream, ...)
    pub submissions_total: IntCounterVec,
    /// Wall time of the outbound record-creation call
    pub upstream_latency_seconds: Histogram,
    pub registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let submissions_total = IntCounterVec::new(
            Opts::new(
                "intake_submissions_total",
                "Total number of form submissions by outcome",
            ),
            &["outcome"],
        )
        .expect("constant metric name is valid");

        let upstream_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "intake_upstream_latency_seconds",
                "Latency of the outbound record-creation call",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 12.0, 30.0]),
        )
        .expect("constant metric name is valid");

        // Names are unique constants and registration runs once per registry
        registry
            .register(Box::new(submissions_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(upstream_latency_seconds.clone()))
            .expect("metric registration must not be called twice");

        Self {
            submissions_total,
            upstream_latency_seconds,
            registry,
        }
    }

    pub fn record_outcome(&self, outcome: &str) {
        self.submissions_total.with_label_values(&[outcome]).inc();
    }

    pub fn outcome_count(&self, outcome: &str) -> u64 {
        self.submissions_total.with_label_values(&[outcome]).get()
    }
}
