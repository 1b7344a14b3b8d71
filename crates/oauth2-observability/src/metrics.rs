use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};
use std::time::Duration;

/// Prometheus metrics for record store traffic.
#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,
    pub storage_operations_total: IntCounterVec,
    pub storage_operation_duration_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let storage_operations_total = IntCounterVec::new(
            Opts::new(
                "oauth2_storage_operations_total",
                "Record store operations by outcome",
            ),
            &["operation", "outcome"],
        )?;
        let storage_operation_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "oauth2_storage_operation_duration_seconds",
                "Record store operation latency",
            ),
            &["operation"],
        )?;

        registry.register(Box::new(storage_operations_total.clone()))?;
        registry.register(Box::new(storage_operation_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            storage_operations_total,
            storage_operation_duration_seconds,
        })
    }

    pub fn record_storage_operation(&self, operation: &str, ok: bool, elapsed: Duration) {
        let outcome = if ok { "ok" } else { "error" };
        self.storage_operations_total
            .with_label_values(&[operation, outcome])
            .inc();
        self.storage_operation_duration_seconds
            .with_label_values(&[operation])
            .observe(elapsed.as_secs_f64());
    }
}
