//! Configuration for AccountService

use serde::{Deserialize, Serialize};

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Postgres connection URL; the in-memory store is used when unset
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Apply the embedded migrations on connect
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: None, max_connections: 10, min_connections: 1, run_migrations: true }
    }
}
