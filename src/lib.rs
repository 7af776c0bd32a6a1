//! Web API service template.
//!
//! Boots an axum application from environment configuration, wires tracing
//! with optional OpenTelemetry export and serves a handful of demo endpoints
//! that call into the `template_lib` processing library.
//!
//! ```text
//! process start → Config::load → TelemetryPlan → init_telemetry
//!               → create_router → serve
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Startup and HTTP error types
//! - [`telemetry`]: Logging and trace export setup
//! - [`metrics`]: Prometheus metrics
//! - [`api`]: HTTP routes, handlers and middleware
//! - [`utils`]: Utility functions

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;
pub mod utils;

pub use config::Config;
pub use error::{ApiError, AppError, Result};

/// Package name, used as the default service name.
pub const API_NAME: &str = env!("CARGO_PKG_NAME");

/// Package version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package description.
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
