//! OpenAPI document for the demo routes.

use utoipa::openapi::server::Server;
use utoipa::OpenApi;

use super::handlers;
use crate::error::ErrorResponse;

/// OpenAPI description of the demo routes, declared relative to the prefix.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::healthcheck,
        handlers::error_example,
        handlers::logs_test,
        handlers::external_call,
        handlers::processing,
        handlers::telemetry_debug,
    ),
    components(schemas(
        handlers::HealthResponse,
        handlers::LogsTestResponse,
        handlers::ExternalCallResponse,
        handlers::ProcessingResponse,
        handlers::TelemetryDebugResponse,
        ErrorResponse,
    )),
    tags((name = "test", description = "Demonstration endpoints"))
)]
pub struct ApiDoc;

/// OpenAPI document with every path moved under `prefix`.
///
/// A non-empty `root_path` becomes the single server entry, so "try it out"
/// requests go through the proxy mount.
pub fn openapi(prefix: &str, root_path: &str) -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    if !root_path.is_empty() {
        doc.servers = Some(vec![Server::new(root_path)]);
    }
    if !prefix.is_empty() {
        let paths = std::mem::take(&mut doc.paths.paths);
        doc.paths.paths = paths
            .into_iter()
            .map(|(path, item)| (format!("{prefix}{path}"), item))
            .collect();
    }
    doc
}
