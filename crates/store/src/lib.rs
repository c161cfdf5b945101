//! Relational store abstraction and implementations for Tack.
//!
//! This crate provides the durable data model behind mutation sync:
//! - Organizations, users, and memberships
//! - Boards, columns, tasks, and notes
//! - Per-board permission grants
//! - Replica client bookkeeping and tenant version counters
//! - API tokens and bootstrap state
//!
//! All sync-path writes go through [`StoreTx`], a transaction handle that
//! supports savepoints and the tenant version-row lock.

pub mod error;
pub mod models;
pub mod postgres;
pub mod sqlite;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;
pub use store::{Store, StoreTx};

use std::sync::Arc;
use tack_core::config::StoreConfig;

/// Create a store from configuration.
pub async fn from_config(config: &StoreConfig) -> StoreResult<Arc<dyn Store>> {
    match config {
        StoreConfig::Sqlite { path } => {
            let store = SqliteStore::new(path).await?;
            Ok(Arc::new(store) as Arc<dyn Store>)
        }
        StoreConfig::Postgres {
            url,
            host,
            port,
            username,
            password,
            database,
            ssl_mode,
            max_connections,
            statement_timeout_ms,
        } => {
            let store = if let Some(url) = url {
                // URL takes precedence when both forms are present
                tracing::info!("Connecting to PostgreSQL using connection URL");
                PostgresStore::from_url(url, *max_connections, *statement_timeout_ms).await?
            } else if let (Some(host), Some(database)) = (host.as_ref(), database.as_ref()) {
                PostgresStore::from_params(
                    host,
                    port.unwrap_or(5432),
                    username.as_deref(),
                    password.as_deref(),
                    database,
                    *ssl_mode,
                    *max_connections,
                    *statement_timeout_ms,
                )
                .await?
            } else {
                return Err(StoreError::Config(
                    "postgres config requires either 'url' or 'host' + 'database'".to_string(),
                ));
            };
            Ok(Arc::new(store) as Arc<dyn Store>)
        }
    }
}
