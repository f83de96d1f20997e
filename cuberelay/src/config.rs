//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `CUBERELAY_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `CUBERELAY_` override YAML values
//! 3. **SOLVER_BACKEND_URL** - Special case: overrides `backend.url` if set
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `CUBERELAY_BACKEND__TIMEOUT=10s` sets the `backend.timeout` field.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use cuberelay::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//!
//! println!("Relay will bind to {}:{}", config.host, config.port);
//! # Ok(())
//! # }
//! ```
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Override server port
//! CUBERELAY_PORT=8080
//!
//! # Point at the solving backend
//! SOLVER_BACKEND_URL="http://solver.internal:8000/api/analyze-cube"
//!
//! # Override nested values
//! CUBERELAY_UPLOADS__SPILL_TO_DISK=true
//! CUBERELAY_ENABLE_METRICS=false
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use url::Url;

use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "CUBERELAY_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// All fields have defaults defined in the `Default` implementation, so an empty (or missing)
/// config file yields a relay on port 3000 forwarding to a solver on localhost:8000.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// External solving backend
    pub backend: BackendConfig,
    /// Limits and temporary storage for uploaded faces
    pub uploads: UploadConfig,
    /// CORS settings for browsers calling the relay from another origin
    pub cors: CorsConfig,
    /// Enable Prometheus metrics endpoint at `/internal/metrics`
    pub enable_metrics: bool,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
}

/// Where and how to reach the solving backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendConfig {
    /// Full URL of the backend's solve endpoint
    pub url: Url,
    /// Upper bound on a single forwarding attempt, including reading the response
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: Url::parse("http://127.0.0.1:8000/api/analyze-cube").expect("default backend URL is valid"),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Per-request upload handling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    /// Maximum size of a single face image in bytes (default: 5 MiB)
    pub max_file_size: u64,
    /// Stream each face to a temporary file instead of holding it in memory
    pub spill_to_disk: bool,
    /// Parent directory for per-request temporary directories (default: OS temp dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: 5 * 1024 * 1024,
            spill_to_disk: false,
            temp_dir: None,
        }
    }
}

impl UploadConfig {
    /// Limit for a whole request: six faces plus room for multipart framing.
    pub fn request_body_limit(&self) -> usize {
        (self.max_file_size as usize).saturating_mul(6).saturating_add(1024 * 1024)
    }
}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests
    pub allowed_origins: Vec<CorsOrigin>,
    /// Allow credentials (cookies) in CORS requests
    pub allow_credentials: bool,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![CorsOrigin::Wildcard],
            allow_credentials: false,
            max_age: None,
        }
    }
}

/// CORS origin specification.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard", serialize_with = "serialize_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://cube.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn serialize_wildcard<S>(serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str("*")
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            backend: BackendConfig::default(),
            uploads: UploadConfig::default(),
            cors: CorsConfig::default(),
            enable_metrics: true,
            enable_otel_export: false,
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.uploads.max_file_size == 0 {
            return Err(Error::Internal {
                operation: "Config validation: uploads.max_file_size must be greater than 0".to_string(),
            });
        }

        if self.backend.timeout.is_zero() {
            return Err(Error::Internal {
                operation: "Config validation: backend.timeout must be greater than 0".to_string(),
            });
        }

        if !matches!(self.backend.url.scheme(), "http" | "https") {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: backend.url must use http or https, got '{}'",
                    self.backend.url.scheme()
                ),
            });
        }

        // Validate that wildcard is not used with credentials
        let has_wildcard = self.cors.allowed_origins.iter().any(|origin| matches!(origin, CorsOrigin::Wildcard));
        if has_wildcard && self.cors.allow_credentials {
            return Err(Error::Internal {
                operation: "Config validation: CORS cannot use wildcard origin '*' with allow_credentials=true. Specify explicit origins."
                    .to_string(),
            });
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("CUBERELAY_").ignore(&["config"]).split("__"))
            // Deployment tooling usually sets the backend location directly
            .merge(Env::raw().only(&["SOLVER_BACKEND_URL"]).map(|_| "backend.url".into()))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
