//! Service configuration management
//!
//! Values come from the struct defaults, then an optional TOML file, then
//! `ARENA_*` environment variables. Nested keys use a double underscore, so
//! `ARENA_ENGINE__WALLET__MIN_DEPOSIT=2500` sets `engine.wallet.min_deposit`.

use anyhow::{Context, Result};
use contest_engine::EngineConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use wallet_ledger::LedgerConfig;

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub ledger: LedgerConfig,
    /// Wallet limits and the default ruleset
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: SocketAddr,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_secs: u64,
}

/// Postgres settings; without a url the service runs on in-memory storage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: u32,
    pub run_migrations: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,

    /// Prometheus scrape port
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { bind: SocketAddr::from(([127, 0, 0, 1], 8080)), shutdown_timeout_secs: 10 }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self { url: None, max_connections: 10, run_migrations: true }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true, port: 9090 }
    }
}

/// Load configuration from an optional file and the environment
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        tracing::debug!("Loading configuration from file: {:?}", path);
        builder = builder.add_source(config::File::from(path).required(true));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("ARENA")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config: GatewayConfig = builder
        .build()
        .context("Failed to read configuration sources")?
        .try_deserialize()
        .context("Failed to parse configuration")?;

    validate_config(&config)?;
    Ok(config)
}

/// Validate configuration
pub fn validate_config(config: &GatewayConfig) -> Result<()> {
    match config.logging.level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow::anyhow!("Invalid log level: {}", config.logging.level)),
    }

    match config.logging.format.as_str() {
        "json" | "pretty" | "compact" => {}
        _ => return Err(anyhow::anyhow!("Invalid log format: {}", config.logging.format)),
    }

    if config.metrics.enabled && config.metrics.port == 0 {
        return Err(anyhow::anyhow!("Invalid metrics port: {}", config.metrics.port));
    }

    if config.database.max_connections == 0 {
        return Err(anyhow::anyhow!("database.max_connections must be positive"));
    }

    if config.ledger.max_cas_retries == 0 {
        return Err(anyhow::anyhow!("ledger.max_cas_retries must be positive"));
    }

    config.engine.validate().context("Invalid engine configuration")?;

    Ok(())
}
