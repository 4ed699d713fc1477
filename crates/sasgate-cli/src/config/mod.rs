//! CLI configuration management.
//!
//! This module defines the complete CLI configuration hierarchy:
//!
//! ```text
//! Cli
//! ├── server: ServerConfig         # Host, port, TLS, shutdown
//! ├── middleware: MiddlewareConfig # CORS, OpenAPI, recovery/timeouts
//! └── service: ServiceConfig       # Stores, IP restriction, capability windows
//! ```
//!
//! All configuration can be provided via CLI arguments or environment variables.
//! Use `--help` to see all available options.
//!
//! # Example
//!
//! ```bash
//! sasgate --external-storage-connection-string "AccountName=...;AccountKey=..." --port 8080
//!
//! # Or via environment variables
//! EXTERNAL_STORAGE_CONNECTION_STRING="AccountName=...;AccountKey=..." PORT=8080 sasgate
//! ```

mod middleware;
mod server;

use std::process;

use anyhow::Context;
use clap::{Parser, ValueEnum};
pub use middleware::MiddlewareConfig;
use sasgate_server::service::ServiceConfig;
use serde::{Deserialize, Serialize};
pub use server::ServerConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_SERVER_STARTUP};

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, colored when attached to a terminal.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Complete CLI configuration.
///
/// Combines all configuration groups for the sasgate server:
/// - [`ServerConfig`]: Network binding and TLS
/// - [`MiddlewareConfig`]: HTTP middleware (CORS, OpenAPI, recovery)
/// - [`ServiceConfig`]: Store connections and capability settings
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(name = "sasgate")]
#[command(about = "Relay that hands out read-only capability URIs for stored files")]
#[command(version)]
pub struct Cli {
    /// Server network and lifecycle configuration.
    #[clap(flatten)]
    pub server: ServerConfig,

    /// HTTP middleware configuration (CORS, OpenAPI, timeouts).
    #[clap(flatten)]
    pub middleware: MiddlewareConfig,

    /// Store connections and capability settings.
    #[clap(flatten)]
    pub service: ServiceConfig,

    /// Log output format.
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    ///
    /// The .env file is loaded before clap parses arguments, so its values
    /// act as environment defaults.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Initializes tracing with `RUST_LOG` filtering, defaulting to `info`.
    pub fn init_tracing(&self) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let registry = tracing_subscriber::registry().with(filter);

        match self.log_format {
            LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
            LogFormat::Json => registry
                .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
                .init(),
        }
    }

    /// Logs build information at debug level.
    fn log_build_info() {
        tracing::debug!(
            target: TRACING_TARGET_SERVER_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            features = ?Self::enabled_features(),
            "Build information"
        );
    }

    /// Validates all configuration values.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.server
            .validate()
            .context("invalid server configuration")?;
        self.service
            .validate()
            .context("invalid service configuration")?;
        Ok(())
    }

    /// Logs configuration (connection strings are never logged).
    pub fn log(&self) {
        Self::log_build_info();
        self.server.log();
        self.middleware.log();

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            ip_restriction = %self.service.sas_ip_restriction,
            write_ttl_secs = self.service.sas_write_ttl_secs,
            read_ttl_secs = self.service.sas_read_ttl_secs,
            policy_backdate_secs = self.service.sas_policy_backdate_secs,
            policy_ttl_secs = self.service.sas_policy_ttl_secs,
            container_prefix = %self.service.sas_container_prefix,
            storage_request_timeout_secs = self.service.storage_request_timeout_secs,
            "Capability configuration"
        );
    }

    /// Returns a list of enabled compile-time features.
    fn enabled_features() -> Vec<&'static str> {
        [
            cfg!(feature = "tls").then_some("tls"),
            cfg!(feature = "dotenv").then_some("dotenv"),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_defaults() {
        let cli = Cli::try_parse_from(["sasgate"]).unwrap();

        assert_eq!(cli.server.port, 3000);
        assert_eq!(cli.middleware.recovery.request_timeout, 60);
        assert_eq!(cli.service.sas_read_ttl_secs, 86_400);
        assert_eq!(cli.service.sas_ip_restriction.to_string(), "1.0.0.0");
        assert_eq!(cli.log_format, LogFormat::Text);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn parses_overrides() {
        let cli = Cli::try_parse_from([
            "sasgate",
            "--port",
            "8080",
            "--sas-ip-restriction",
            "203.0.113.10",
            "--sas-read-ttl-secs",
            "3600",
            "--log-format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.server.port, 8080);
        assert_eq!(cli.service.sas_ip_restriction.to_string(), "203.0.113.10");
        assert_eq!(cli.service.sas_read_ttl_secs, 3600);
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn rejects_invalid_service_values() {
        let cli = Cli::try_parse_from(["sasgate", "--sas-write-ttl-secs", "5"]).unwrap();
        assert!(cli.validate().is_err());
    }
}
