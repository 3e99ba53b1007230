//! Configuration for the warehouse inventory engine
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with WIL_ prefix

use std::time::Duration;

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main engine configuration
#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// Current environment (development, production)
    pub environment: String,

    /// Database configuration for the Postgres store
    pub database: DatabaseConfig,

    /// Ledger posting configuration
    pub posting: PostingConfig,

    /// Document workflow configuration
    pub workflow: WorkflowConfig,

    /// Stock policy configuration
    pub stock: StockConfig,
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
pub struct PostingConfig {
    /// Bounded wait for a balance lock, in milliseconds
    pub lock_wait_ms: u64,

    /// Internal retries of an approval on lock contention
    pub retry_attempts: u32,

    /// Base backoff between contention retries, in milliseconds
    pub retry_backoff_ms: u64,
}

impl PostingConfig {
    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkflowConfig {
    /// Whether a PENDING document's lines may still be edited before
    /// approval. Defaults to false: documents freeze once submitted.
    pub pending_lines_mutable: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StockConfig {
    /// Whether outbound movements may drive a balance negative
    pub allow_negative_stock: bool,
}

impl EngineConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("WIL_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("posting.lock_wait_ms", 5_000)?
            .set_default("posting.retry_attempts", 3)?
            .set_default("posting.retry_backoff_ms", 100)?
            .set_default("workflow.pending_lines_mutable", false)?
            .set_default("stock.allow_negative_stock", false)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (WIL_ prefix)
            .add_source(
                Environment::with_prefix("WIL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for PostingConfig {
    fn default() -> Self {
        Self {
            lock_wait_ms: 5_000,
            retry_attempts: 3,
            retry_backoff_ms: 100,
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            pending_lines_mutable: false,
        }
    }
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            allow_negative_stock: false,
        }
    }
}
