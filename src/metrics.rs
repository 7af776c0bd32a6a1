//! Prometheus metrics for request tracking and monitoring.
//!
//! This module provides metrics for:
//! - HTTP request counts and latency
//! - External call latency
//! - Processing pipeline latency

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::debug;

// === Metric Name Constants ===

/// HTTP requests counter metric name.
pub const METRIC_HTTP_REQUESTS: &str = "http_requests_total";
/// HTTP request latency metric name.
pub const METRIC_HTTP_REQUEST_LATENCY: &str = "http_request_duration_ms";
/// External call latency metric name.
pub const METRIC_EXTERNAL_CALL_LATENCY: &str = "external_call_latency_ms";
/// External call failures counter metric name.
pub const METRIC_EXTERNAL_CALL_FAILURES: &str = "external_call_failures_total";
/// Processing pipeline latency metric name.
pub const METRIC_PROCESSING_LATENCY: &str = "processing_latency_ms";

/// Install the global Prometheus recorder and register metric descriptions.
///
/// Call this once at startup. Fails if a recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_metrics();
    Ok(handle)
}

/// Handle backed by a recorder that is not installed globally.
///
/// Renders an empty exposition; used when the process-wide recorder is owned
/// elsewhere, such as in tests that build several routers.
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

fn describe_metrics() {
    describe_counter!(METRIC_HTTP_REQUESTS, "Total number of HTTP requests served");
    describe_histogram!(
        METRIC_HTTP_REQUEST_LATENCY,
        "HTTP request latency in milliseconds"
    );
    describe_histogram!(
        METRIC_EXTERNAL_CALL_LATENCY,
        "Latency of the external-call demo in milliseconds"
    );
    describe_counter!(
        METRIC_EXTERNAL_CALL_FAILURES,
        "Total number of failed external calls"
    );
    describe_histogram!(
        METRIC_PROCESSING_LATENCY,
        "Processing pipeline latency in milliseconds"
    );

    debug!("Metrics initialized");
}

/// Record one served HTTP request.
pub fn record_http_request(start: Instant, method: &str, status: u16) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    let status = status.to_string();
    counter!(METRIC_HTTP_REQUESTS, "method" => method.to_string(), "status" => status.clone())
        .increment(1);
    histogram!(METRIC_HTTP_REQUEST_LATENCY, "method" => method.to_string(), "status" => status)
        .record(latency_ms);
}

/// Record external call latency.
pub fn record_external_call_latency(start: Instant) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_EXTERNAL_CALL_LATENCY).record(latency_ms);
}

/// Increment external call failures counter.
pub fn inc_external_call_failures() {
    counter!(METRIC_EXTERNAL_CALL_FAILURES).increment(1);
}

/// RAII guard for timing operations.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    metric_name: &'static str,
}

impl LatencyTimer {
    /// Create a new latency timer for the given metric.
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        histogram!(self.metric_name).record(self.elapsed_ms());
    }
}

/// Create a latency timer for the processing pipeline.
pub fn timer_processing() -> LatencyTimer {
    LatencyTimer::new(METRIC_PROCESSING_LATENCY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn latency_timer_measures_time() {
        let timer = timer_processing();
        sleep(Duration::from_millis(10));
        assert!(timer.elapsed_ms() >= 9.0);
    }

    #[test]
    fn recorded_metrics_show_up_in_rendered_output() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            record_http_request(Instant::now(), "GET", 200);
            inc_external_call_failures();
        });

        let rendered = handle.render();
        assert!(rendered.contains(METRIC_HTTP_REQUESTS));
        assert!(rendered.contains(r#"method="GET""#));
        assert!(rendered.contains(METRIC_EXTERNAL_CALL_FAILURES));
    }

    #[test]
    fn detached_handle_renders_without_global_recorder() {
        let handle = detached_handle();
        assert!(!handle.render().contains(METRIC_HTTP_REQUESTS));
    }
}
