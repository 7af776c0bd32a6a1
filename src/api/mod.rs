//! HTTP API: demo routes, home page, docs and metrics.

pub mod docs;
pub mod handlers;
pub mod home;
pub mod middleware;
pub mod routes;

pub use handlers::AppState;
pub use routes::create_router;
