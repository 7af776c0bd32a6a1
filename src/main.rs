//! Template API entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{info, info_span};

use template_api::api::{create_router, AppState};
use template_api::config::Config;
use template_api::error::AppError;
use template_api::metrics;
use template_api::telemetry::{init_telemetry, TelemetryPlan};
use template_api::utils::shutdown_signal;
use template_api::{API_NAME, VERSION};

/// Time in-flight HTTPS connections get to finish after a shutdown signal.
const TLS_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Web API service template.
#[derive(Parser, Debug)]
#[command(name = "template-api")]
#[command(about = "Web API service with environment configuration and tracing")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// HTTP server port (overrides PORT).
    #[arg(short, long, global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API (default).
    Serve,

    /// Check configuration validity.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command {
        Some(Command::CheckConfig) => cmd_check_config(args.port),
        Some(Command::Serve) | None => cmd_serve(args.port, args.verbose).await,
    }
}

/// Load configuration and apply the `--port` override.
fn load_config(port_override: Option<u16>) -> Result<Config, AppError> {
    let mut config = Config::load()?;
    if let Some(port) = port_override {
        config.port = port;
    }
    Ok(config)
}

/// Load, validate and summarize the configuration.
fn cmd_check_config(port_override: Option<u16>) -> anyhow::Result<()> {
    println!("======================================================================");
    println!("{} - CONFIGURATION CHECK", API_NAME.to_uppercase());
    println!("======================================================================");

    print!("Loading configuration... ");
    let config = match load_config(port_override) {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    let plan = TelemetryPlan::from_config(&config);

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Environment: {}", config.app_environment);
    println!("  Listen Address: {}", config.socket_addr());
    match config.tls_files() {
        Some((cert, key)) => {
            println!("  TLS Certificate: {}", cert.display());
            println!("  TLS Key: {}", key.display());
        }
        None => println!("  TLS: disabled (plain HTTP)"),
    }
    println!(
        "  Route Prefix: {}",
        match config.api_prefix().as_str() {
            "" => "(none)".to_string(),
            prefix => prefix.to_string(),
        }
    );
    println!("  Root Path: {}", config.root_path());
    println!("  Temp Directory: {}", config.tmp_dir.display());
    println!("  Export Traces: {}", config.export_traces);
    match &plan {
        TelemetryPlan::Export(settings) => {
            println!("  OTLP Endpoint: {}", settings.traces_endpoint());
            println!("  OTLP Protocol: {}", settings.protocol);
        }
        TelemetryPlan::RequestLogging => println!("  Telemetry: request logging only"),
    }
    if !config.otel_excluded_urls.is_empty() {
        println!("  Excluded URLs: {}", config.otel_excluded_urls.join(", "));
    }
    println!("  External Call URL: {}", config.external_call_url);
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Run the HTTP server until a shutdown signal arrives.
async fn cmd_serve(port_override: Option<u16>, verbose: bool) -> anyhow::Result<()> {
    let config = load_config(port_override)?;
    config.validate().map_err(AppError::InvalidConfig)?;

    let plan = TelemetryPlan::from_config(&config);
    let telemetry = init_telemetry(&config, &plan, verbose)?;

    let result = serve(Arc::new(config), &plan).await;

    info_span!("app_shutdown").in_scope(|| {
        info!("Shutting down application...");
        if let Err(e) = &result {
            tracing::error!(error = %e, "Server stopped with an error");
        }
        info!("Application shutdown completed");
    });
    telemetry.shutdown();

    result
}

async fn serve(config: Arc<Config>, plan: &TelemetryPlan) -> anyhow::Result<()> {
    let router = info_span!("app_startup").in_scope(|| -> anyhow::Result<_> {
        info!("Starting {} v{}", API_NAME, VERSION);
        info!(environment = %config.app_environment, "Environment validation...");

        config.ensure_tmp_dir().map_err(AppError::from)?;
        let metrics = metrics::install_recorder().map_err(AppError::from)?;
        let state = AppState::new(config.clone(), metrics).map_err(AppError::from)?;

        Ok(create_router(state, plan))
    })?;

    let addr = config.socket_addr();
    match config.tls_files() {
        Some((cert, key)) => {
            // rustls needs a process-wide crypto provider before building the server config.
            let _ = rustls::crypto::ring::default_provider().install_default();
            let tls = RustlsConfig::from_pem_file(cert, key).await?;
            serve_https(addr, tls, router).await
        }
        None => serve_http(addr, router).await,
    }
}

async fn serve_http(addr: SocketAddr, router: Router) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    info!("Application startup completed");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn serve_https(addr: SocketAddr, tls: RustlsConfig, router: Router) -> anyhow::Result<()> {
    let handle = axum_server::Handle::new();
    let shutdown = handle.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.graceful_shutdown(Some(TLS_SHUTDOWN_GRACE));
    });

    info!("HTTPS server listening on {}", addr);
    info!("Application startup completed");

    axum_server::bind_rustls(addr, tls)
        .handle(handle)
        .serve(router.into_make_service())
        .await?;

    Ok(())
}
