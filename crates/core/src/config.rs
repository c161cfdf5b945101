//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Enable request tracing spans for every HTTP request.
    #[serde(default)]
    pub enable_tracing: bool,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    /// SECURITY: When enabled, ensure this endpoint is network-restricted
    /// to authorized Prometheus scraper IPs only at the infrastructure level.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            enable_tracing: false,
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

/// Mutation sync tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Maximum number of mutations accepted in one push. Oversized pushes
    /// are rejected before any transaction is opened.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Minimum gap between adjacent position keys; a move that would split
    /// a smaller gap renumbers the whole list first.
    #[serde(default = "default_position_epsilon")]
    pub position_epsilon: f64,
}

fn default_max_batch_size() -> usize {
    crate::DEFAULT_MAX_BATCH_SIZE
}

fn default_position_epsilon() -> f64 {
    crate::DEFAULT_POSITION_EPSILON
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            position_epsilon: default_position_epsilon(),
        }
    }
}

impl SyncConfig {
    /// Validate sync configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_batch_size == 0 {
            return Err("sync.max_batch_size must be at least 1".to_string());
        }
        if !(self.position_epsilon.is_finite() && self.position_epsilon >= 0.0) {
            return Err("sync.position_epsilon must be a non-negative finite number".to_string());
        }
        Ok(())
    }
}

/// Admin token configuration.
///
/// The admin token is required for server operation. It authenticates as the
/// bootstrap organization's owner and provides initial access to the API. If
/// the token hash changes between restarts, the previous admin token is
/// automatically revoked and a new one is created.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Pre-computed hash of the admin token (SHA256 hex, 64 characters).
    /// Generate with: `echo -n "your-secret-token" | sha256sum`
    pub token_hash: String,
    /// Description for the admin token.
    pub token_description: Option<String>,
}

impl AdminConfig {
    /// Create a test configuration with a dummy token hash.
    ///
    /// **For testing only.** The hash is deterministic but not a real token.
    pub fn for_testing() -> Self {
        Self {
            // SHA256 of "test-admin-token"
            token_hash: "17d6bfe05d1b1fb7bc499f8e3f639c7b3eda4c40f321eef8887a0c04c89a99c5"
                .to_string(),
            token_description: Some("Test admin token".to_string()),
        }
    }
}

/// PostgreSQL SSL mode configuration.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PgSslMode {
    /// Disable SSL/TLS entirely.
    Disable,
    /// Prefer SSL/TLS but allow unencrypted connections (default).
    #[default]
    Prefer,
    /// Require SSL/TLS for all connections.
    Require,
}

/// Relational store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    /// SQLite database (recommended for testing and small deployments only).
    /// SQLite cannot express row-level locks; the store serializes writers
    /// on a single pooled connection instead.
    Sqlite {
        /// Database file path.
        path: PathBuf,
    },
    /// PostgreSQL database.
    Postgres {
        /// Connection URL (optional if using individual fields).
        /// Takes precedence over individual fields if both are provided.
        url: Option<String>,
        /// Database host (e.g., "localhost" or "db.example.com").
        host: Option<String>,
        /// Database port (default: 5432).
        #[serde(default = "default_pg_port")]
        port: Option<u16>,
        /// Database username.
        username: Option<String>,
        /// Database password.
        /// WARNING: Prefer TACK_STORE__PASSWORD env var over storing in config.
        password: Option<String>,
        /// Database name.
        database: Option<String>,
        /// SSL mode for connections.
        ssl_mode: Option<PgSslMode>,
        /// Maximum connections in the pool.
        #[serde(default = "default_max_connections")]
        max_connections: u32,
        /// Statement timeout in milliseconds (prevents hung queries).
        #[serde(default = "default_statement_timeout_ms")]
        statement_timeout_ms: Option<u64>,
    },
}

fn default_max_connections() -> u32 {
    10
}

fn default_pg_port() -> Option<u16> {
    Some(5432)
}

fn default_statement_timeout_ms() -> Option<u64> {
    Some(30_000)
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/tack.db"),
        }
    }
}

impl StoreConfig {
    /// Validate store configuration invariants.
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StoreConfig::Sqlite { .. } => Ok(()),
            StoreConfig::Postgres {
                url,
                host,
                database,
                ..
            } => {
                // Must have either url OR (host + database)
                match (url.as_ref(), host.as_ref(), database.as_ref()) {
                    (Some(_), _, _) => Ok(()),
                    (None, Some(_), Some(_)) => Ok(()),
                    (None, None, _) => Err(
                        "postgres config requires either 'url' or 'host' + 'database'".to_string(),
                    ),
                    (None, Some(_), None) => Err(
                        "postgres config requires 'database' when using individual fields"
                            .to_string(),
                    ),
                }
            }
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Relational store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Mutation sync tuning.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Admin token configuration (required).
    pub admin: AdminConfig,
}

impl AppConfig {
    /// Validate the whole configuration tree.
    pub fn validate(&self) -> Result<(), String> {
        self.store.validate()?;
        self.sync.validate()?;
        Ok(())
    }

    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses SQLite and a dummy admin token.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            sync: SyncConfig::default(),
            admin: AdminConfig::for_testing(),
        }
    }
}
