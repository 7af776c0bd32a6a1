//! Request-level middleware.
//!
//! Which of these a router gets depends on the telemetry plan:
//! - export on: [`trace_layer`] opens a span per request for the exporter;
//! - export off: [`log_requests`] writes one line on entry and one on exit.
//!
//! [`track_metrics`] runs in both modes.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{Request, State},
    http,
    middleware::Next,
    response::Response,
};
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, info_span, Span};

use crate::config::Config;
use crate::metrics;

/// Log incoming and completed requests. Excluded paths log at debug.
pub async fn log_requests(
    State(config): State<Arc<Config>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let excluded = config.is_excluded(&path);

    if excluded {
        debug!("Incoming request: {method} {path}");
    } else {
        info!("Incoming request: {method} {path}");
    }

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();
    if excluded {
        debug!("Completed request: {method} {path} | Status: {status} | Duration: {duration:.3}s");
    } else {
        info!("Completed request: {method} {path} | Status: {status} | Duration: {duration:.3}s");
    }

    response
}

/// Count every request and record its latency.
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();

    let response = next.run(request).await;

    metrics::record_http_request(start, &method, response.status().as_u16());
    response
}

/// Span factory for [`trace_layer`]: excluded paths get no span.
#[derive(Clone)]
pub struct RequestSpan {
    config: Arc<Config>,
}

impl tower_http::trace::MakeSpan<Body> for RequestSpan {
    fn make_span(&mut self, request: &http::Request<Body>) -> Span {
        let path = request.uri().path();
        if self.config.is_excluded(path) {
            return Span::none();
        }
        info_span!(
            "request",
            method = %request.method(),
            path = %path,
            version = ?request.version(),
        )
    }
}

/// `TraceLayer` that opens one span per non-excluded request.
pub fn trace_layer(
    config: Arc<Config>,
) -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>, RequestSpan> {
    TraceLayer::new_for_http().make_span_with(RequestSpan { config })
}
