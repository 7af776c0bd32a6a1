//! Application configuration loaded from environment variables.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use strum::Display;

/// Deployment environment the service runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AppEnvironment {
    /// Developer machine.
    #[default]
    Local,
    /// Shared development deployment.
    Development,
    /// Production deployment.
    Production,
}

/// Transport used by the OTLP span exporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Display)]
pub enum OtlpProtocol {
    /// OTLP over gRPC.
    #[serde(rename = "grpc")]
    #[strum(serialize = "grpc")]
    Grpc,
    /// OTLP over HTTP with protobuf payloads.
    #[default]
    #[serde(rename = "http/protobuf")]
    #[strum(serialize = "http/protobuf")]
    HttpProtobuf,
}

/// Application configuration loaded from environment variables.
///
/// Built once at startup and shared read-only behind an `Arc`.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Application ===
    /// Deployment environment.
    #[serde(default)]
    pub app_environment: AppEnvironment,

    /// Path a reverse proxy mounts the service under.
    #[serde(default)]
    pub api_root_path: String,

    /// Prefix prepended to every demo route (raw, see [`Config::api_prefix`]).
    #[serde(default)]
    pub api_prefix: String,

    /// Scratch directory, created at startup.
    #[serde(default = "default_tmp_dir")]
    pub tmp_dir: PathBuf,

    // === Telemetry ===
    /// Export traces to the OTLP collector. Falls back to request logging when off.
    #[serde(default = "default_true", deserialize_with = "deserialize_flag")]
    pub export_traces: bool,

    /// Request paths (relative to the prefix) kept out of tracing and info logs.
    #[serde(default, deserialize_with = "deserialize_comma_list")]
    pub otel_excluded_urls: Vec<String>,

    /// Base OTLP collector endpoint.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// OTLP transport.
    #[serde(default)]
    pub otel_exporter_otlp_protocol: OtlpProtocol,

    /// Service name reported on exported traces.
    #[serde(default = "default_service_name")]
    pub otel_service_name: String,

    // === Demo endpoints ===
    /// Target of the external-call demo.
    #[serde(default = "default_external_call_url")]
    pub external_call_url: String,

    /// Timeout of the external-call demo.
    #[serde(default = "default_external_call_timeout")]
    pub external_call_timeout_secs: u64,

    // === Server Configuration ===
    /// Listen address.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// PEM certificate chain. HTTPS is served when this and the key are both set.
    #[serde(default, deserialize_with = "deserialize_optional_path")]
    pub tls_cert_path: Option<PathBuf>,

    /// PEM private key matching `tls_cert_path`.
    #[serde(default, deserialize_with = "deserialize_optional_path")]
    pub tls_key_path: Option<PathBuf>,

    /// Log filter (trace, debug, info, warn, error or full directives).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Emit JSON log lines.
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub log_json: bool,
}

fn default_tmp_dir() -> PathBuf {
    PathBuf::from("./tmp")
}

fn default_true() -> bool {
    true
}

fn default_service_name() -> String {
    crate::API_NAME.to_string()
}

fn default_external_call_url() -> String {
    "https://httpbin.org/json".to_string()
}

fn default_external_call_timeout() -> u64 {
    5
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `0`, `false`, `no` and `off` switch a flag off; any other value switches it on.
fn parse_flag(raw: &str) -> bool {
    !matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(parse_flag(&raw))
}

fn deserialize_comma_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect())
}

/// An empty value counts as unset.
fn deserialize_optional_path<'de, D>(deserializer: D) -> Result<Option<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let raw = raw.trim();
    Ok((!raw.is_empty()).then(|| PathBuf::from(raw)))
}

/// Normalize a route prefix to `/segment[/segment]` with no trailing slash.
/// An empty or `/` prefix normalizes to the empty string.
fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Build configuration from explicit key/value pairs instead of the process environment.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        envy::from_iter(vars.into_iter().map(|(k, v)| (k.into(), v.into())))
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("API_PREFIX", &self.api_prefix),
            ("API_ROOT_PATH", &self.api_root_path),
        ] {
            if value.contains(|c: char| c.is_whitespace() || matches!(c, '?' | '#' | '*' | ':')) {
                return Err(format!("{name} must be a plain URL path, got {value:?}"));
            }
        }

        match (&self.tls_cert_path, &self.tls_key_path) {
            (Some(_), None) => return Err("TLS_CERT_PATH is set without TLS_KEY_PATH".to_string()),
            (None, Some(_)) => return Err("TLS_KEY_PATH is set without TLS_CERT_PATH".to_string()),
            (Some(cert), Some(key)) => {
                for (name, path) in [("TLS_CERT_PATH", cert), ("TLS_KEY_PATH", key)] {
                    if !path.is_file() {
                        return Err(format!("{name} does not point to a file: {}", path.display()));
                    }
                }
            }
            (None, None) => {}
        }

        match url::Url::parse(&self.external_call_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(format!(
                    "EXTERNAL_CALL_URL must use http or https, got {}",
                    url.scheme()
                ))
            }
            Err(e) => return Err(format!("EXTERNAL_CALL_URL is invalid: {e}")),
        }

        if self.external_call_timeout_secs == 0 {
            return Err("EXTERNAL_CALL_TIMEOUT_SECS must be greater than 0".to_string());
        }

        if let Some(endpoint) = &self.otel_exporter_otlp_endpoint {
            if let Err(e) = url::Url::parse(endpoint) {
                return Err(format!("OTEL_EXPORTER_OTLP_ENDPOINT is invalid: {e}"));
            }
        }

        Ok(())
    }

    /// Normalized route prefix, empty when routes are served at the root.
    pub fn api_prefix(&self) -> String {
        normalize_prefix(&self.api_prefix)
    }

    /// Normalized root path used for links rendered by the service.
    pub fn root_path(&self) -> String {
        normalize_prefix(&self.api_root_path)
    }

    /// Full route of an endpoint declared relative to the prefix.
    pub fn route(&self, path: &str) -> String {
        format!("{}{}", self.api_prefix(), path)
    }

    /// Whether a request path is listed in `OTEL_EXCLUDED_URLS`.
    pub fn is_excluded(&self, path: &str) -> bool {
        if self.otel_excluded_urls.is_empty() {
            return false;
        }
        let prefix = self.api_prefix();
        let relative = path.strip_prefix(prefix.as_str()).unwrap_or(path);
        self.otel_excluded_urls.iter().any(|url| url == relative)
    }

    /// Create the scratch directory and its parents.
    pub fn ensure_tmp_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.tmp_dir)
    }

    /// Address the HTTP server binds to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Certificate and key paths when HTTPS is configured.
    pub fn tls_files(&self) -> Option<(&Path, &Path)> {
        match (&self.tls_cert_path, &self.tls_key_path) {
            (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
            _ => None,
        }
    }

    /// Timeout applied to the external-call demo.
    pub fn external_call_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.external_call_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config(vars: &[(&str, &str)]) -> Config {
        Config::from_vars(vars.iter().copied()).expect("config should load")
    }

    #[test]
    fn default_values_are_sensible() {
        let config = config(&[]);

        assert_eq!(config.app_environment, AppEnvironment::Local);
        assert_eq!(config.api_prefix(), "");
        assert_eq!(config.tmp_dir, PathBuf::from("./tmp"));
        assert!(config.export_traces);
        assert!(config.otel_excluded_urls.is_empty());
        assert_eq!(config.otel_exporter_otlp_endpoint, None);
        assert_eq!(config.otel_exporter_otlp_protocol, OtlpProtocol::HttpProtobuf);
        assert_eq!(config.otel_service_name, "template-api");
        assert_eq!(config.external_call_url, "https://httpbin.org/json");
        assert_eq!(config.port, 8080);
        assert_eq!(config.rust_log, "info");
        assert!(!config.log_json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_vars_round_trip_into_config() {
        let config = config(&[
            ("APP_ENVIRONMENT", "production"),
            ("API_ROOT_PATH", "/proxy"),
            ("API_PREFIX", "/v1/public"),
            ("TMP_DIR", "/var/tmp/template"),
            ("EXPORT_TRACES", "false"),
            ("OTEL_EXCLUDED_URLS", "/test/healthcheck, /metrics"),
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://collector:4318/v1"),
            ("OTEL_EXPORTER_OTLP_PROTOCOL", "grpc"),
            ("OTEL_SERVICE_NAME", "my-api"),
            ("HOST", "127.0.0.1"),
            ("PORT", "9000"),
            ("LOG_JSON", "true"),
        ]);

        assert_eq!(config.app_environment, AppEnvironment::Production);
        assert_eq!(config.root_path(), "/proxy");
        assert_eq!(config.api_prefix(), "/v1/public");
        assert_eq!(config.tmp_dir, PathBuf::from("/var/tmp/template"));
        assert!(!config.export_traces);
        assert_eq!(
            config.otel_excluded_urls,
            vec!["/test/healthcheck".to_string(), "/metrics".to_string()]
        );
        assert_eq!(
            config.otel_exporter_otlp_endpoint.as_deref(),
            Some("http://collector:4318/v1")
        );
        assert_eq!(config.otel_exporter_otlp_protocol, OtlpProtocol::Grpc);
        assert_eq!(config.otel_service_name, "my-api");
        assert_eq!(config.socket_addr(), "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert!(config.log_json);
    }

    #[test]
    fn rejects_unknown_environment() {
        let result = Config::from_vars([("APP_ENVIRONMENT", "staging")]);
        assert!(result.is_err());
    }

    #[test]
    fn export_traces_accepts_common_false_spellings() {
        for raw in ["0", "false", "FALSE", "no", "Off"] {
            assert!(!config(&[("EXPORT_TRACES", raw)]).export_traces, "{raw}");
        }
        for raw in ["1", "true", "yes", "anything"] {
            assert!(config(&[("EXPORT_TRACES", raw)]).export_traces, "{raw}");
        }
    }

    #[test]
    fn prefix_is_normalized() {
        assert_eq!(config(&[("API_PREFIX", "v1/public/")]).api_prefix(), "/v1/public");
        assert_eq!(config(&[("API_PREFIX", "/")]).api_prefix(), "");
        assert_eq!(config(&[("API_PREFIX", "/api")]).route("/test/error"), "/api/test/error");
        assert_eq!(config(&[]).route("/test/error"), "/test/error");
    }

    #[test]
    fn excluded_paths_match_after_stripping_prefix() {
        let config = config(&[
            ("API_PREFIX", "/v1"),
            ("OTEL_EXCLUDED_URLS", "/test/healthcheck"),
        ]);

        assert!(config.is_excluded("/v1/test/healthcheck"));
        assert!(!config.is_excluded("/v1/test/error"));
        assert!(!config.is_excluded("/v1/test/healthcheck/extra"));
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert!(config(&[("API_PREFIX", "/v1?x=1")]).validate().is_err());
        assert!(config(&[("API_PREFIX", "/*rest")]).validate().is_err());
        assert!(config(&[("API_PREFIX", "/v1/:version")]).validate().is_err());
        assert!(config(&[("API_ROOT_PATH", "/proxy/*")]).validate().is_err());
        assert!(config(&[("EXTERNAL_CALL_URL", "ftp://example.com")]).validate().is_err());
        assert!(config(&[("EXTERNAL_CALL_URL", "not a url")]).validate().is_err());
        assert!(config(&[("EXTERNAL_CALL_TIMEOUT_SECS", "0")]).validate().is_err());
        assert!(config(&[("OTEL_EXPORTER_OTLP_ENDPOINT", "::bad")]).validate().is_err());
    }

    #[test]
    fn tls_needs_both_files() {
        let dir = std::env::temp_dir().join(format!("template-api-tls-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let cert = dir.join("cert.pem");
        let key = dir.join("key.pem");
        std::fs::write(&cert, "cert").unwrap();
        std::fs::write(&key, "key").unwrap();
        let cert = cert.to_str().unwrap();
        let key = key.to_str().unwrap();

        assert!(config(&[]).tls_files().is_none());
        let blank = config(&[("TLS_CERT_PATH", ""), ("TLS_KEY_PATH", " ")]);
        assert!(blank.tls_files().is_none());
        assert!(blank.validate().is_ok());

        let both = config(&[("TLS_CERT_PATH", cert), ("TLS_KEY_PATH", key)]);
        assert!(both.validate().is_ok());
        assert!(both.tls_files().is_some());

        assert!(config(&[("TLS_CERT_PATH", cert)]).validate().is_err());
        assert!(config(&[("TLS_KEY_PATH", key)]).validate().is_err());
        assert!(config(&[("TLS_CERT_PATH", cert), ("TLS_KEY_PATH", "/nonexistent/key.pem")])
            .validate()
            .is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn ensure_tmp_dir_creates_nested_directories() {
        let dir = std::env::temp_dir()
            .join(format!("template-api-{}", std::process::id()))
            .join("nested");
        let config = config(&[("TMP_DIR", dir.to_str().unwrap())]);

        config.ensure_tmp_dir().unwrap();
        assert!(dir.is_dir());

        // Already existing is fine.
        config.ensure_tmp_dir().unwrap();
        std::fs::remove_dir_all(dir.parent().unwrap()).unwrap();
    }

    #[test]
    fn environment_displays_lowercase() {
        assert_eq!(AppEnvironment::Development.to_string(), "development");
        assert_eq!(OtlpProtocol::HttpProtobuf.to_string(), "http/protobuf");
    }
}
