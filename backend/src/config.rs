//! Configuration management for the commerce workflow server
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with SCM_ prefix

use config::builder::{ConfigBuilder, DefaultState};
use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// External inventory ledger
    pub inventory: InventoryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InventoryConfig {
    /// Base URL of the inventory service
    pub base_url: String,

    /// Bearer token presented to the inventory service
    pub api_key: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("SCM_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = Self::defaults(&environment)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (SCM_ prefix)
            .add_source(
                Environment::with_prefix("SCM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Code defaults; no inventory ledger URL means the in-memory ledger is used
    fn defaults(environment: &str) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        config::Config::builder()
            .set_default("environment", environment)?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("inventory.base_url", "")?
            .set_default("inventory.api_key", "")?
            .set_default("inventory.timeout_secs", 10)
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl InventoryConfig {
    /// Whether an external inventory ledger URL is set
    pub fn is_configured(&self) -> bool {
        !self.base_url.trim().is_empty()
    }
}
