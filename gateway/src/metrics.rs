//! Prometheus metrics for viesti

use crate::error::{GatewayError, Result};
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, Histogram, HistogramVec, TextEncoder, register_counter,
    register_counter_vec, register_gauge, register_histogram, register_histogram_vec,
};
use std::sync::OnceLock;
use std::time::Duration;

/// Global metrics instance
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// All viesti metrics
pub struct Metrics {
    // ─────────────────────────────────────────────────────────────────────────
    // Ingress
    // ─────────────────────────────────────────────────────────────────────────
    /// Requests that passed validation (by content type)
    pub requests_received: CounterVec,

    /// Requests rejected before submission (by reason)
    pub requests_rejected: CounterVec,

    /// Request bodies that could not be read
    pub body_read_errors: Counter,

    /// Accepted payload sizes in bytes
    pub payload_size_bytes: Histogram,

    // ─────────────────────────────────────────────────────────────────────────
    // Admission control
    // ─────────────────────────────────────────────────────────────────────────
    /// Requests handed to a worker
    pub messages_enqueued: Counter,

    /// Requests refused by admission control (by reason)
    pub messages_dropped: CounterVec,

    /// Time spent waiting for a worker (by result)
    pub admission_wait_seconds: HistogramVec,

    /// Workers currently running a job
    pub busy_workers: Gauge,

    // ─────────────────────────────────────────────────────────────────────────
    // Delivery
    // ─────────────────────────────────────────────────────────────────────────
    /// Per-listener delivery attempts (by outcome)
    pub deliveries: CounterVec,

    /// Wall time for a full fanout of one request
    pub delivery_duration_seconds: Histogram,
}

impl Metrics {
    /// Initialize metrics (call once at startup)
    ///
    /// Returns error if metric registration fails.
    pub fn init() -> Result<&'static Metrics> {
        if let Some(metrics) = METRICS.get() {
            return Ok(metrics);
        }

        let metrics = Metrics {
            requests_received: register_counter_vec!(
                "viesti_requests_received_total",
                "Total requests that passed validation",
                &["content_type"]
            )
            .map_err(|e| GatewayError::Metrics(format!("requests_received: {e}")))?,

            requests_rejected: register_counter_vec!(
                "viesti_requests_rejected_total",
                "Total requests rejected before submission",
                &["reason"]
            )
            .map_err(|e| GatewayError::Metrics(format!("requests_rejected: {e}")))?,

            body_read_errors: register_counter!(
                "viesti_body_read_errors_total",
                "Total request bodies that could not be read"
            )
            .map_err(|e| GatewayError::Metrics(format!("body_read_errors: {e}")))?,

            payload_size_bytes: register_histogram!(
                "viesti_payload_size_bytes",
                "Size of accepted payloads",
                // Buckets: 100B to 10MiB
                vec![100.0, 1_000.0, 10_000.0, 100_000.0, 1_000_000.0, 10_485_760.0]
            )
            .map_err(|e| GatewayError::Metrics(format!("payload_size_bytes: {e}")))?,

            messages_enqueued: register_counter!(
                "viesti_messages_enqueued_total",
                "Total requests handed to a worker"
            )
            .map_err(|e| GatewayError::Metrics(format!("messages_enqueued: {e}")))?,

            messages_dropped: register_counter_vec!(
                "viesti_messages_dropped_total",
                "Total requests refused by admission control",
                &["reason"]
            )
            .map_err(|e| GatewayError::Metrics(format!("messages_dropped: {e}")))?,

            admission_wait_seconds: register_histogram_vec!(
                "viesti_admission_wait_seconds",
                "Time spent waiting for an idle worker",
                &["result"],
                // Buckets: 10us to 5s
                vec![0.00001, 0.0001, 0.001, 0.01, 0.1, 0.5, 1.0, 5.0]
            )
            .map_err(|e| GatewayError::Metrics(format!("admission_wait_seconds: {e}")))?,

            busy_workers: register_gauge!(
                "viesti_busy_workers",
                "Number of workers currently running a job"
            )
            .map_err(|e| GatewayError::Metrics(format!("busy_workers: {e}")))?,

            deliveries: register_counter_vec!(
                "viesti_deliveries_total",
                "Per-listener delivery attempts",
                &["outcome"]
            )
            .map_err(|e| GatewayError::Metrics(format!("deliveries: {e}")))?,

            delivery_duration_seconds: register_histogram!(
                "viesti_delivery_duration_seconds",
                "Time to fan one request out to every listener",
                vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]
            )
            .map_err(|e| GatewayError::Metrics(format!("delivery_duration_seconds: {e}")))?,
        };

        // Set the metrics (only succeeds once)
        let _ = METRICS.set(metrics);

        METRICS
            .get()
            .ok_or_else(|| GatewayError::Metrics("Failed to initialize metrics".to_string()))
    }

    /// Get the global metrics instance
    ///
    /// Returns None if metrics haven't been initialized yet.
    pub fn get() -> Option<&'static Metrics> {
        METRICS.get()
    }

    /// Record a request that passed validation
    pub fn record_received(&self, content_type: &str, payload_size: usize) {
        self.requests_received
            .with_label_values(&[content_type])
            .inc();
        self.payload_size_bytes.observe(payload_size as f64);
    }

    /// Record a request rejected before submission
    pub fn record_rejected(&self, reason: &str) {
        self.requests_rejected.with_label_values(&[reason]).inc();
    }

    /// Record an unreadable body
    pub fn record_body_error(&self) {
        self.body_read_errors.inc();
    }

    /// Record a successful hand-off to a worker
    pub fn record_enqueued(&self) {
        self.messages_enqueued.inc();
    }

    /// Record a request refused by admission control
    pub fn record_dropped(&self, reason: &str) {
        self.messages_dropped.with_label_values(&[reason]).inc();
    }

    /// Record how long a submission waited for a worker
    pub fn record_admission_wait(&self, result: &str, waited: Duration) {
        self.admission_wait_seconds
            .with_label_values(&[result])
            .observe(waited.as_secs_f64());
    }

    /// Update the busy worker gauge
    pub fn set_busy_workers(&self, busy: usize) {
        self.busy_workers.set(busy as f64);
    }

    /// Record one per-listener delivery attempt
    pub fn record_delivery(&self, outcome: &str) {
        self.deliveries.with_label_values(&[outcome]).inc();
    }

    /// Record the duration of a full fanout
    pub fn record_delivery_duration(&self, duration: Duration) {
        self.delivery_duration_seconds
            .observe(duration.as_secs_f64());
    }
}

/// Gather all metrics and encode as Prometheus text format
///
/// Returns the metrics as a String, ready to be served via HTTP.
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_ok() {
        String::from_utf8(buffer).unwrap_or_default()
    } else {
        String::new()
    }
}

/// Helper to record metrics if initialized, otherwise skip
pub fn try_record_received(content_type: &str, payload_size: usize) {
    if let Some(m) = Metrics::get() {
        m.record_received(content_type, payload_size);
    }
}

/// Helper to record metrics if initialized, otherwise skip
pub fn try_record_rejected(reason: &str) {
    if let Some(m) = Metrics::get() {
        m.record_rejected(reason);
    }
}

/// Helper to record metrics if initialized, otherwise skip
pub fn try_record_body_error() {
    if let Some(m) = Metrics::get() {
        m.record_body_error();
    }
}

/// Helper to record metrics if initialized, otherwise skip
pub fn try_record_enqueued() {
    if let Some(m) = Metrics::get() {
        m.record_enqueued();
    }
}

/// Helper to record metrics if initialized, otherwise skip
pub fn try_record_dropped(reason: &str) {
    if let Some(m) = Metrics::get() {
        m.record_dropped(reason);
    }
}

/// Helper to record metrics if initialized, otherwise skip
pub fn try_record_admission_wait(result: &str, waited: Duration) {
    if let Some(m) = Metrics::get() {
        m.record_admission_wait(result, waited);
    }
}

/// Helper to record metrics if initialized, otherwise skip
pub fn try_set_busy_workers(busy: usize) {
    if let Some(m) = Metrics::get() {
        m.set_busy_workers(busy);
    }
}

/// Helper to record metrics if initialized, otherwise skip
pub fn try_record_delivery(outcome: &str) {
    if let Some(m) = Metrics::get() {
        m.record_delivery(outcome);
    }
}

/// Helper to record metrics if initialized, otherwise skip
pub fn try_record_delivery_duration(duration: Duration) {
    if let Some(m) = Metrics::get() {
        m.record_delivery_duration(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_init_is_idempotent() {
        let first = Metrics::init().map(|m| m as *const Metrics);
        let second = Metrics::init().map(|m| m as *const Metrics);
        if let (Ok(a), Ok(b)) = (first, second) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_ingress_counters() {
        let _ = Metrics::init();
        if let Some(metrics) = Metrics::get() {
            let before = metrics.messages_enqueued.get();
            metrics.record_received("application/json", 8);
            metrics.record_enqueued();
            metrics.record_rejected("missing_content_type");
            metrics.record_dropped("admission_timeout");
            metrics.record_body_error();

            // Other tests share the global registry, so only check growth
            assert!(metrics.messages_enqueued.get() >= before + 1.0);
        }
    }

    #[test]
    fn test_gather_contains_registered_metrics() {
        let _ = Metrics::init();
        if let Some(metrics) = Metrics::get() {
            metrics.record_enqueued();
            metrics.set_busy_workers(2);
            let text = gather();
            assert!(text.contains("viesti_messages_enqueued_total"));
            assert!(text.contains("viesti_busy_workers"));
        }
    }

    #[test]
    fn test_try_helpers_do_not_panic() {
        try_record_received("application/msgpack", 1024);
        try_record_admission_wait("acquired", Duration::from_micros(50));
        try_record_delivery("delivered");
        try_record_delivery_duration(Duration::ZERO);
    }
}
