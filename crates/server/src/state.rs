//! Application state shared across handlers.

use std::sync::Arc;
use tack_core::config::AppConfig;
use tack_store::Store;
use tack_sync::{SyncEngine, SyncOptions};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Relational store.
    pub store: Arc<dyn Store>,
    /// Mutation batch coordinator.
    pub engine: Arc<SyncEngine>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Panics
    ///
    /// Panics if the configuration fails validation; `main` validates before
    /// building state, so this only fires on a programming error.
    pub fn new(config: AppConfig, store: Arc<dyn Store>) -> Self {
        if let Err(error) = config.validate() {
            panic!("invalid configuration: {error}");
        }

        let engine = SyncEngine::new(store.clone(), SyncOptions::from(&config.sync));

        Self {
            config: Arc::new(config),
            store,
            engine: Arc::new(engine),
        }
    }
}
