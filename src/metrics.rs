use prometheus::{Counter, CounterVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use tracing::error;

lazy_static::lazy_static! {
    // Backend request metrics, labelled by client operation
    pub static ref API_REQUESTS: CounterVec = CounterVec::new(
        Opts::new("insights_api_requests_total", "Total number of backend requests issued"),
        &["operation"]
    ).unwrap();

    pub static ref API_FAILURES: CounterVec = CounterVec::new(
        Opts::new("insights_api_failures_total", "Total number of backend requests that failed"),
        &["operation"]
    ).unwrap();

    pub static ref API_REQUEST_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("insights_api_request_duration_seconds", "Time spent waiting on the backend"),
        &["operation"]
    ).unwrap();

    // User-facing notices
    pub static ref NOTIFICATIONS_SENT: Counter = Counter::with_opts(
        Opts::new("insights_notifications_total", "Total number of error notifications shown")
    ).unwrap();
}

pub struct MetricsRegistry {
    registry: Registry,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        let registry = Registry::new();

        registry.register(Box::new(API_REQUESTS.clone())).unwrap();
        registry.register(Box::new(API_FAILURES.clone())).unwrap();
        registry.register(Box::new(API_REQUEST_DURATION.clone())).unwrap();
        registry.register(Box::new(NOTIFICATIONS_SENT.clone())).unwrap();

        Self { registry }
    }

    pub fn gather_metrics(&self) -> String {
        let metric_families = self.registry.gather();
        let encoder = TextEncoder::new();
        encoder.encode_to_string(&metric_families).unwrap_or_else(|e| {
            error!("Failed to encode metrics: {}", e);
            String::new()
        })
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
