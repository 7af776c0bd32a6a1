//! HTTP API handlers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{extract::State, response::Html, Json};
use metrics_exporter_prometheus::PrometheusHandle;
use reqwest::header::HeaderMap;
use serde::Serialize;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};
use utoipa::ToSchema;

use super::home::render_home_page;
use crate::config::Config;
use crate::error::{ApiError, ErrorResponse};
use crate::{metrics, telemetry};

/// Input fed to the processing demo.
const SAMPLE_INPUT: &str = "sample data";

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    /// Immutable configuration.
    pub config: Arc<Config>,
    /// Outbound HTTP client.
    pub http: reqwest::Client,
    /// Prometheus exposition handle.
    pub metrics: PrometheusHandle,
}

impl AppState {
    /// Create new app state with an HTTP client bound to the configured timeout.
    pub fn new(config: Arc<Config>, metrics: PrometheusHandle) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.external_call_timeout())
            .connect_timeout(config.external_call_timeout())
            .build()?;

        Ok(Self {
            config,
            http,
            metrics,
        })
    }
}

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: String,
    /// Service name.
    pub service: String,
}

/// Log demo response.
#[derive(Debug, Serialize, ToSchema)]
pub struct LogsTestResponse {
    /// Status: "ok".
    pub status: String,
    /// Human readable outcome.
    pub message: String,
    /// Levels that were emitted.
    pub logs_sent: Vec<String>,
}

/// External call demo response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ExternalCallResponse {
    /// Status: "ok".
    pub status: String,
    /// Human readable outcome.
    pub message: String,
    /// Status code returned by the external service.
    pub external_status: u16,
}

/// Processing demo response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProcessingResponse {
    /// Status: "ok".
    pub status: String,
    /// Human readable outcome.
    pub message: String,
    /// Output of the library call.
    pub result: String,
}

/// Telemetry debug response.
#[derive(Debug, Serialize, ToSchema)]
pub struct TelemetryDebugResponse {
    /// Human readable outcome.
    pub message: String,
    /// Hex trace id of the request span.
    pub trace_id: String,
    /// Spans opened by the handler.
    pub spans_created: u32,
}

/// Service health check.
#[utoipa::path(
    get,
    path = "/test/healthcheck",
    tag = "test",
    responses((status = 200, description = "Service is running", body = HealthResponse))
)]
#[instrument]
pub async fn healthcheck() -> Json<HealthResponse> {
    info!("Health check called");
    Json(HealthResponse {
        status: "ok".to_string(),
        service: crate::API_NAME.to_string(),
    })
}

/// Error handling demonstration.
///
/// Always fails with a division by zero to show the error response format.
#[utoipa::path(
    get,
    path = "/test/error",
    tag = "test",
    responses((status = 500, description = "Intentional failure", body = ErrorResponse))
)]
#[instrument]
pub async fn error_example() -> Result<Json<i64>, ApiError> {
    let numerator: i64 = 100;
    let denominator: i64 = 0;

    match numerator.checked_div(denominator) {
        Some(result) => Ok(Json(result)),
        None => {
            let cause = format!("DivisionByZero: attempt to divide {numerator} by zero");
            error!(%cause, "Demonstrating error handling");
            Err(ApiError::Internal(format!(
                "Intentional error for testing: {cause}"
            )))
        }
    }
}

/// Emit one event per log level.
#[utoipa::path(
    get,
    path = "/test/logs-test",
    tag = "test",
    responses((status = 200, description = "Log events emitted", body = LogsTestResponse))
)]
#[instrument]
pub async fn logs_test() -> Json<LogsTestResponse> {
    debug!("Debug message - detailed debugging info");
    info!("Info message - general information");
    warn!("Warning message - something might be wrong");

    info!("Processing test data...");
    tokio::time::sleep(Duration::from_millis(100)).await;
    info!("Test data processed successfully");

    Json(LogsTestResponse {
        status: "ok".to_string(),
        message: "Log test completed - check the collector for trace correlation".to_string(),
        logs_sent: vec!["debug".into(), "info".into(), "warning".into()],
    })
}

/// External HTTP call with trace propagation.
#[utoipa::path(
    get,
    path = "/test/external-call",
    tag = "test",
    responses(
        (status = 200, description = "External service answered", body = ExternalCallResponse),
        (status = 503, description = "External service unreachable", body = ErrorResponse)
    )
)]
#[instrument(skip_all)]
pub async fn external_call(
    State(state): State<AppState>,
) -> Result<Json<ExternalCallResponse>, ApiError> {
    info!(url = %state.config.external_call_url, "Making external HTTP call");

    let mut headers = HeaderMap::new();
    telemetry::inject_trace_context(&mut headers);

    let start = Instant::now();
    let result = state
        .http
        .get(&state.config.external_call_url)
        .headers(headers)
        .send()
        .await;
    metrics::record_external_call_latency(start);

    match result {
        Ok(response) => {
            let external_status = response.status().as_u16();
            info!(external_status, "External call successful");
            Ok(Json(ExternalCallResponse {
                status: "ok".to_string(),
                message: "External API call successful".to_string(),
                external_status,
            }))
        }
        Err(e) => {
            metrics::inc_external_call_failures();
            error!(error = %e, "External API call failed");
            Err(ApiError::ExternalService(format!(
                "External API call failed: {e}"
            )))
        }
    }
}

/// Nested operations with a library function call.
#[utoipa::path(
    get,
    path = "/test/processing",
    tag = "test",
    responses((status = 200, description = "Processing finished", body = ProcessingResponse))
)]
#[instrument]
pub async fn processing() -> Json<ProcessingResponse> {
    let _timer = metrics::timer_processing();
    info!("Starting processing workflow");

    info_span!("data_validation").in_scope(|| {
        debug!(input = SAMPLE_INPUT, "Validating input data");
    });

    let summary = info_span!("data_processing").in_scope(|| {
        info!("Processing data with library function");
        let summary = template_lib::summarize(SAMPLE_INPUT);
        debug!(result = %summary.result, items = summary.items, "Processing complete");
        summary
    });

    info_span!("save_results").in_scope(|| {
        debug!("Saving results");
    });

    info!("Processing workflow completed successfully");
    Json(ProcessingResponse {
        status: "ok".to_string(),
        message: "Processing completed".to_string(),
        result: summary.result,
    })
}

/// Emit a parent span with three children to verify trace export.
#[utoipa::path(
    get,
    path = "/test/telemetry-debug",
    tag = "test",
    responses((status = 200, description = "Spans emitted", body = TelemetryDebugResponse))
)]
pub async fn telemetry_debug() -> Json<TelemetryDebugResponse> {
    let span = info_span!("telemetry_debug", debug_type = "telemetry_verification");

    async {
        info!("debug_start");

        for index in 0..3 {
            async move {
                info!(index, "debug_event_{index}");
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            .instrument(info_span!("debug_span", span_index = index))
            .await;
        }

        info!("debug_end");

        let trace_id = telemetry::current_trace_id();
        info!(%trace_id, "Telemetry debug completed");

        Json(TelemetryDebugResponse {
            message: "Telemetry debug completed".to_string(),
            trace_id,
            spans_created: 4,
        })
    }
    .instrument(span)
    .await
}

/// Root endpoint with general API information.
pub async fn home(State(state): State<AppState>) -> Html<String> {
    Html(render_home_page(&state.config))
}

/// Prometheus metrics endpoint.
pub async fn prometheus_metrics(State(state): State<AppState>) -> String {
    state.metrics.render()
}

/// Fallback for unknown routes.
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
