//! Service configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use account_service::DatabaseConfig;
use api_gateway::GatewayConfig;
use market_feed::FeedConfig;

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Price simulator configuration
    pub feed: FeedConfig,

    /// REST/WebSocket gateway configuration
    pub gateway: GatewayConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Service-level configuration
    pub service: ServiceSettings,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Insert default plans and a tournament into an empty store
    pub seed_reference_data: bool,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty)
    pub format: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self { seed_reference_data: true, shutdown_timeout_secs: 10 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

/// Load configuration from defaults, an optional TOML file and the environment
pub fn load_config(config_file: Option<&Path>) -> Result<ServiceConfig> {
    dotenv::dotenv().ok();

    let mut config = match config_file {
        Some(path) => {
            tracing::debug!("Loading configuration from file: {:?}", path);
            load_from_file(path)?
        }
        None => ServiceConfig::default(),
    };

    // Override with environment variables
    apply_env(&mut config, |key| std::env::var(key).ok())?;

    // Validate configuration
    validate_config(&config)?;

    Ok(config)
}

/// Load configuration from a TOML file
pub fn load_from_file(path: &Path) -> Result<ServiceConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| anyhow::anyhow!("Invalid {}={}: {}", key, value, e))
}

/// Override settings from environment variables looked up through `var`
pub fn apply_env<F>(config: &mut ServiceConfig, var: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = var("DATABASE_URL") {
        config.database.url = Some(url);
    }

    if let Some(max) = var("DATABASE_MAX_CONNECTIONS") {
        config.database.max_connections = parse_var("DATABASE_MAX_CONNECTIONS", &max)?;
    }

    if let Some(secret) = var("JWT_SECRET") {
        config.gateway.auth.jwt_secret = secret;
    }

    if let Some(audience) = var("JWT_AUDIENCE") {
        config.gateway.auth.audience = Some(audience);
    }

    if let Some(host) = var("ARENA_HOST") {
        config.gateway.server.host = host;
    }

    if let Some(port) = var("ARENA_PORT") {
        config.gateway.server.port = parse_var("ARENA_PORT", &port)?;
    }

    if let Some(interval) = var("ARENA_TICK_INTERVAL_MS") {
        config.feed.tick_interval_ms = parse_var("ARENA_TICK_INTERVAL_MS", &interval)?;
    }

    if let Some(level) = var("ARENA_LOG_LEVEL") {
        config.logging.level = level;
    }

    if let Some(format) = var("ARENA_LOG_FORMAT") {
        config.logging.format = format;
    }

    Ok(())
}

/// Validate configuration
pub fn validate_config(config: &ServiceConfig) -> Result<()> {
    // Validate log level
    match config.logging.level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow::anyhow!("Invalid log level: {}", config.logging.level)),
    }

    // Validate log format
    match config.logging.format.as_str() {
        "json" | "pretty" => {}
        _ => return Err(anyhow::anyhow!("Invalid log format: {}", config.logging.format)),
    }

    config.feed.validate().context("Invalid feed configuration")?;
    config.gateway.validate().context("Invalid gateway configuration")?;

    if config.database.min_connections > config.database.max_connections {
        return Err(anyhow::anyhow!("database min_connections exceeds max_connections"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    fn valid() -> ServiceConfig {
        let mut config = ServiceConfig::default();
        config.gateway.auth.jwt_secret = "secret".to_string();
        config
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ServiceConfig::default();
        apply_env(
            &mut config,
            env(&[
                ("DATABASE_URL", "postgres://localhost/arena"),
                ("JWT_SECRET", "s3cret"),
                ("JWT_AUDIENCE", "forex-arena"),
                ("ARENA_PORT", "8088"),
                ("ARENA_TICK_INTERVAL_MS", "250"),
                ("ARENA_LOG_FORMAT", "json"),
            ]),
        )
        .unwrap();

        assert_eq!(config.database.url.as_deref(), Some("postgres://localhost/arena"));
        assert_eq!(config.gateway.auth.jwt_secret, "s3cret");
        assert_eq!(config.gateway.auth.audience.as_deref(), Some("forex-arena"));
        assert_eq!(config.gateway.server.port, 8088);
        assert_eq!(config.feed.tick_interval_ms, 250);
        assert_eq!(config.logging.format, "json");
        assert_ok!(validate_config(&config));
    }

    #[test]
    fn test_bad_env_value_is_an_error() {
        let mut config = ServiceConfig::default();
        let err = apply_env(&mut config, env(&[("ARENA_PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("ARENA_PORT"));
    }

    #[test]
    fn test_validation() {
        assert_ok!(validate_config(&valid()));

        let mut config = valid();
        config.logging.level = "loud".to_string();
        assert_err!(validate_config(&config));

        let mut config = valid();
        config.logging.format = "xml".to_string();
        assert_err!(validate_config(&config));

        let mut config = valid();
        config.feed.tick_interval_ms = 0;
        assert_err!(validate_config(&config));

        assert_err!(validate_config(&ServiceConfig::default()));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [feed]
            tick_interval_ms = 1000

            [gateway.server]
            port = 7000

            [gateway.auth]
            jwt_secret = "from-file"

            [logging]
            level = "debug"
            "#
        )
        .unwrap();

        let config = load_from_file(file.path()).unwrap();
        assert_eq!(config.feed.tick_interval_ms, 1000);
        assert_eq!(config.gateway.server.port, 7000);
        assert_eq!(config.gateway.auth.jwt_secret, "from-file");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "pretty");
        assert!(config.service.seed_reference_data);
    }
}
