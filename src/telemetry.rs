//! Tracing setup with optional OpenTelemetry export.
//!
//! Logging always goes through `tracing`. Whether spans are additionally
//! exported to an OTLP collector is decided once from the [`Config`] as a
//! [`TelemetryPlan`]:
//!
//! - [`TelemetryPlan::Export`]: batch span and log exporters are installed;
//!   `tracing-opentelemetry` bridges spans and `opentelemetry-appender-tracing`
//!   bridges events into them.
//! - [`TelemetryPlan::RequestLogging`]: no exporter, the HTTP stack logs each
//!   request instead (see [`crate::api::middleware`]).

use std::time::Duration;

use opentelemetry::propagation::Injector;
use opentelemetry::trace::{TraceContextExt, TracerProvider as _};
use opentelemetry::KeyValue;
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{LogExporter, Protocol, SpanExporter, WithExportConfig};
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, info, warn};
use tracing_opentelemetry::OpenTelemetrySpanExt;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

use crate::config::{AppEnvironment, Config, OtlpProtocol};
use crate::error::Result;

/// Timeout of a single export batch.
const EXPORT_TIMEOUT: Duration = Duration::from_secs(5);

/// Dependencies whose debug output drowns the service's own logs.
const QUIET_TARGETS: &[&str] = &[
    "hyper=info",
    "h2=info",
    "tower=info",
    "reqwest=info",
    "opentelemetry=warn",
    "opentelemetry_sdk=warn",
];

/// Crates whose events must not reach the log exporter, since exporting
/// them produces more of them.
const LOG_EXPORT_SILENCED: &[&str] = &[
    "hyper",
    "hyper_util",
    "h2",
    "tonic",
    "tower",
    "reqwest",
    "opentelemetry",
    "opentelemetry_sdk",
    "opentelemetry_otlp",
];

/// Where the OTLP exporters send spans and logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSettings {
    /// Base collector endpoint.
    pub endpoint: String,
    /// Exporter transport.
    pub protocol: OtlpProtocol,
    /// `service.name` resource attribute.
    pub service_name: String,
    /// `deployment.environment` resource attribute.
    pub environment: AppEnvironment,
}

impl ExportSettings {
    /// Endpoint the span exporter is built with.
    ///
    /// HTTP exporters post to `{base}/traces`; gRPC uses the base endpoint.
    pub fn traces_endpoint(&self) -> String {
        self.signal_endpoint("traces")
    }

    /// Endpoint the log exporter is built with: `{base}/logs` over HTTP.
    pub fn logs_endpoint(&self) -> String {
        self.signal_endpoint("logs")
    }

    fn signal_endpoint(&self, signal: &str) -> String {
        match self.protocol {
            OtlpProtocol::Grpc => self.endpoint.clone(),
            OtlpProtocol::HttpProtobuf => {
                format!("{}/{signal}", self.endpoint.trim_end_matches('/'))
            }
        }
    }
}

/// Telemetry mode selected from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryPlan {
    /// Export spans to an OTLP collector.
    Export(ExportSettings),
    /// Log every request through the request-logging middleware.
    RequestLogging,
}

impl TelemetryPlan {
    /// Decide the telemetry mode.
    ///
    /// Export needs both `EXPORT_TRACES` and an OTLP endpoint.
    pub fn from_config(config: &Config) -> Self {
        match (&config.otel_exporter_otlp_endpoint, config.export_traces) {
            (Some(endpoint), true) if !endpoint.trim().is_empty() => Self::Export(ExportSettings {
                endpoint: endpoint.trim().to_string(),
                protocol: config.otel_exporter_otlp_protocol,
                service_name: config.otel_service_name.clone(),
                environment: config.app_environment,
            }),
            _ => Self::RequestLogging,
        }
    }

    /// Whether spans are exported.
    pub fn exports(&self) -> bool {
        matches!(self, Self::Export(_))
    }
}

/// Active telemetry handles that need graceful shutdown.
pub struct TelemetryGuard {
    providers: Option<(SdkTracerProvider, SdkLoggerProvider)>,
}

impl TelemetryGuard {
    /// Flush pending spans and logs, then shut the exporters down.
    pub fn shutdown(self) {
        let Some((tracer_provider, logger_provider)) = self.providers else {
            return;
        };
        if let Err(e) = tracer_provider.shutdown() {
            warn!(error = %e, "Failed to shutdown OpenTelemetry tracer provider");
        }
        if let Err(e) = logger_provider.shutdown() {
            warn!(error = %e, "Failed to shutdown OpenTelemetry logger provider");
        }
    }
}

/// Build the log filter from `RUST_LOG`, or a debug filter for `--verbose`.
pub fn build_filter(rust_log: &str, verbose: bool) -> Result<EnvFilter> {
    let base = if verbose {
        "template_api=debug,template_lib=debug,info"
    } else {
        rust_log
    };

    let mut filter = EnvFilter::try_new(base)?;
    for directive in QUIET_TARGETS {
        filter = filter.add_directive(directive.parse()?);
    }
    Ok(filter)
}

fn build_resource(settings: &ExportSettings) -> Resource {
    Resource::builder()
        .with_service_name(settings.service_name.clone())
        .with_attributes([
            KeyValue::new("service.version", crate::VERSION),
            KeyValue::new("deployment.environment", settings.environment.to_string()),
            KeyValue::new("service.instance.id", uuid::Uuid::new_v4().to_string()),
        ])
        .build()
}

/// Filter keeping exporter and transport internals out of the log exporter.
fn log_export_filter() -> Targets {
    LOG_EXPORT_SILENCED
        .iter()
        .fold(Targets::new().with_default(LevelFilter::TRACE), |targets, target| {
            targets.with_target(*target, LevelFilter::OFF)
        })
}

fn build_tracer_provider(settings: &ExportSettings, resource: Resource) -> Result<SdkTracerProvider> {
    let exporter = match settings.protocol {
        OtlpProtocol::Grpc => SpanExporter::builder()
            .with_tonic()
            .with_endpoint(settings.traces_endpoint())
            .with_timeout(EXPORT_TIMEOUT)
            .build()?,
        OtlpProtocol::HttpProtobuf => SpanExporter::builder()
            .with_http()
            .with_protocol(Protocol::HttpBinary)
            .with_endpoint(settings.traces_endpoint())
            .with_timeout(EXPORT_TIMEOUT)
            .build()?,
    };

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build();

    opentelemetry::global::set_tracer_provider(provider.clone());
    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    Ok(provider)
}

fn build_logger_provider(settings: &ExportSettings, resource: Resource) -> Result<SdkLoggerProvider> {
    let exporter = match settings.protocol {
        OtlpProtocol::Grpc => LogExporter::builder()
            .with_tonic()
            .with_endpoint(settings.logs_endpoint())
            .with_timeout(EXPORT_TIMEOUT)
            .build()?,
        OtlpProtocol::HttpProtobuf => LogExporter::builder()
            .with_http()
            .with_protocol(Protocol::HttpBinary)
            .with_endpoint(settings.logs_endpoint())
            .with_timeout(EXPORT_TIMEOUT)
            .build()?,
    };

    Ok(SdkLoggerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build())
}

/// Install the global subscriber and, for [`TelemetryPlan::Export`], the span and log exporters.
///
/// Must run inside a Tokio runtime when the gRPC exporter is selected.
pub fn init_telemetry(config: &Config, plan: &TelemetryPlan, verbose: bool) -> Result<TelemetryGuard> {
    let filter = build_filter(&config.rust_log, verbose)?;

    let providers = match plan {
        TelemetryPlan::Export(settings) => {
            let resource = build_resource(settings);
            Some((
                build_tracer_provider(settings, resource.clone())?,
                build_logger_provider(settings, resource)?,
            ))
        }
        TelemetryPlan::RequestLogging => None,
    };

    let fmt_layer = if config.log_json {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer().with_target(true).compact().boxed()
    };

    let otel_layer = providers.as_ref().map(|(tracer_provider, _)| {
        let tracer = tracer_provider.tracer(config.otel_service_name.clone());
        tracing_opentelemetry::layer().with_tracer(tracer)
    });

    let log_layer = providers.as_ref().map(|(_, logger_provider)| {
        OpenTelemetryTracingBridge::new(logger_provider).with_filter(log_export_filter())
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(otel_layer)
        .with(log_layer)
        .try_init()?;

    match plan {
        TelemetryPlan::Export(settings) => {
            info!("OpenTelemetry setup completed");
            debug!(service_name = %settings.service_name, "Service name");
            debug!(version = crate::VERSION, "Service version");
            debug!(
                endpoint = %settings.traces_endpoint(),
                protocol = %settings.protocol,
                "OTLP traces endpoint"
            );
            debug!(endpoint = %settings.logs_endpoint(), "OTLP logs endpoint");
        }
        TelemetryPlan::RequestLogging if config.export_traces => {
            warn!("No OTLP endpoint configured. Skipping OpenTelemetry setup");
        }
        TelemetryPlan::RequestLogging => {
            warn!("Trace export disabled by configuration");
        }
    }

    Ok(TelemetryGuard { providers })
}

/// Hex trace id of the current span, all zeros when nothing is exported.
pub fn current_trace_id() -> String {
    let context = tracing::Span::current().context();
    format!("{:032x}", context.span().span_context().trace_id())
}

struct HeaderInjector<'a>(&'a mut HeaderMap);

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            self.0.insert(name, value);
        }
    }
}

/// Write the current trace context into outgoing request headers.
///
/// No-op until a propagator is installed by [`TelemetryPlan::Export`].
pub fn inject_trace_context(headers: &mut HeaderMap) {
    let context = tracing::Span::current().context();
    opentelemetry::global::get_text_map_propagator(|propagator| {
        propagator.inject_context(&context, &mut HeaderInjector(headers));
    });
}
