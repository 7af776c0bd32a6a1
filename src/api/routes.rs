//! HTTP API route definitions.

use axum::{middleware, routing::get, Router};
use tower_http::cors::CorsLayer;
use utoipa_swagger_ui::{Config as SwaggerConfig, SwaggerUi};

use super::docs;
use super::handlers::{
    error_example, external_call, healthcheck, home, logs_test, not_found, processing,
    prometheus_metrics, telemetry_debug, AppState,
};
use super::middleware::{log_requests, trace_layer, track_metrics};
use crate::telemetry::TelemetryPlan;

/// Demo routes, mounted under `{prefix}/test`.
fn demo_router() -> Router<AppState> {
    Router::new()
        .route("/healthcheck", get(healthcheck))
        .route("/error", get(error_example))
        .route("/logs-test", get(logs_test))
        .route("/external-call", get(external_call))
        .route("/processing", get(processing))
        .route("/telemetry-debug", get(telemetry_debug))
}

/// Create the API router.
///
/// Exporting plans get a `TraceLayer`; the logging fallback gets the
/// request-logging middleware instead. Responses are the same either way.
pub fn create_router(state: AppState, plan: &TelemetryPlan) -> Router {
    let config = state.config.clone();
    let prefix = config.api_prefix();
    let root_path = config.root_path();

    // The browser loads the document through the proxy mount, the router serves it unmounted.
    let swagger = SwaggerUi::new("/docs")
        .url("/openapi.json", docs::openapi(&prefix, &root_path))
        .config(SwaggerConfig::new([format!("{root_path}/openapi.json")]));

    let router = Router::new()
        .route("/", get(home))
        .route("/metrics", get(prometheus_metrics))
        .nest(&config.route("/test"), demo_router())
        .merge(swagger)
        .fallback(not_found)
        .with_state(state);

    let router = if plan.exports() {
        router.layer(trace_layer(config))
    } else {
        router.layer(middleware::from_fn_with_state(config, log_requests))
    };

    router
        .layer(middleware::from_fn(track_metrics))
        .layer(CorsLayer::permissive())
}
