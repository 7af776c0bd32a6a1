//! End-to-end tests for the template API.
//!
//! Each test builds the full router from an explicit set of environment
//! variables and drives it with `tower::ServiceExt::oneshot`, so no port is
//! bound and no global subscriber or recorder is installed.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use template_api::api::{create_router, AppState};
use template_api::config::Config;
use template_api::metrics::detached_handle;
use template_api::telemetry::TelemetryPlan;

fn app(vars: &[(&str, &str)]) -> Router {
    let config = Arc::new(Config::from_vars(vars.iter().copied()).expect("config"));
    config.validate().expect("valid config");
    let plan = TelemetryPlan::from_config(&config);
    let state = AppState::new(config, detached_handle()).expect("state");
    create_router(state, &plan)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn healthcheck_returns_fixed_payload() {
    let (status, body) = get(app(&[("API_PREFIX", "/v1/public")]), "/v1/public/test/healthcheck").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok", "service": "template-api"}));
}

#[tokio::test]
async fn error_endpoint_returns_detail() {
    let (status, body) = get(app(&[]), "/test/error").await;

    assert!(status.is_server_error());
    let detail = body["detail"].as_str().expect("detail string");
    assert!(detail.contains("Intentional error for testing"));
}

#[tokio::test]
async fn processing_returns_library_output() {
    let (status, body) = get(app(&[]), "/test/processing").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "status": "ok",
            "message": "Processing completed",
            "result": "SAMPLE DATA"
        })
    );
}

#[tokio::test]
async fn logs_test_reports_levels() {
    let (status, body) = get(app(&[]), "/test/logs-test").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["logs_sent"], json!(["debug", "info", "warning"]));
}

#[tokio::test]
async fn telemetry_debug_reports_trace_id() {
    let (status, body) = get(app(&[]), "/test/telemetry-debug").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["spans_created"], 4);
    assert_eq!(body["trace_id"].as_str().map(str::len), Some(32));
}

#[tokio::test]
async fn external_call_reports_upstream_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"slideshow": {}})))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/json", server.uri());
    let (status, body) = get(app(&[("EXTERNAL_CALL_URL", url.as_str())]), "/test/external-call").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "status": "ok",
            "message": "External API call successful",
            "external_status": 200
        })
    );
}

#[tokio::test]
async fn external_call_passes_through_upstream_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let (status, body) = get(app(&[("EXTERNAL_CALL_URL", server.uri().as_str())]), "/test/external-call").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["external_status"], 502);
}

#[tokio::test]
async fn unreachable_external_service_returns_503() {
    // Port 9 (discard) on localhost refuses connections on test machines.
    let (status, body) = get(
        app(&[
            ("EXTERNAL_CALL_URL", "http://127.0.0.1:9/json"),
            ("EXTERNAL_CALL_TIMEOUT_SECS", "1"),
        ]),
        "/test/external-call",
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .starts_with("External API call failed"));
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let (status, body) = get(app(&[]), "/test/nope").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"detail": "Not Found"}));
}

#[tokio::test]
async fn export_toggle_does_not_change_responses() {
    // The exporting plan only changes which middleware wraps the routes, so
    // the router is built with that plan directly instead of a live collector.
    let config = Arc::new(
        Config::from_vars([("OTEL_EXPORTER_OTLP_ENDPOINT", "http://127.0.0.1:4318")]).unwrap(),
    );
    let plan = TelemetryPlan::from_config(&config);
    assert!(plan.exports());
    let exporting = create_router(AppState::new(config, detached_handle()).unwrap(), &plan);

    let logging = app(&[("EXPORT_TRACES", "no")]);

    for uri in ["/test/healthcheck", "/test/error", "/test/processing"] {
        assert_eq!(get(exporting.clone(), uri).await, get(logging.clone(), uri).await, "{uri}");
    }
}

#[tokio::test]
async fn openapi_paths_carry_prefix() {
    let (status, body) = get(app(&[("API_PREFIX", "/v2")]), "/openapi.json").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"].get("/v2/test/healthcheck").is_some());
}

#[tokio::test]
async fn excluded_paths_are_still_served() {
    let (status, _) = get(
        app(&[
            ("EXPORT_TRACES", "false"),
            ("OTEL_EXCLUDED_URLS", "/test/healthcheck"),
        ]),
        "/test/healthcheck",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
}
