//! Tack server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::net::SocketAddr;
use tack_core::config::AppConfig;
use tack_server::bootstrap::ensure_bootstrap;
use tack_server::{AppState, create_router};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Tack - A collaborative kanban and notes sync server
#[derive(Parser, Debug)]
#[command(name = "tackd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "TACK_CONFIG", default_value = "config/server.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Startup banner
    tracing::info!("Tack v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration (file is optional, env vars can provide/override everything)
    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    let has_config_file = config_path.exists();

    if has_config_file {
        tracing::info!(config_path = %args.config, "Loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("No config file found at {}", args.config);
    }

    // Check for TACK_ environment variables (excluding TACK_CONFIG which is just the path)
    let has_env_config =
        std::env::vars().any(|(key, _)| key.starts_with("TACK_") && key != "TACK_CONFIG");

    if !has_config_file && !has_env_config {
        anyhow::bail!(
            "No configuration provided.\n\n\
             Provide configuration via one of:\n  \
             1. Config file: tackd --config /path/to/config.toml\n  \
             2. Environment variables: TACK_SERVER__BIND=0.0.0.0:8080 \
             TACK_ADMIN__TOKEN_HASH=sha256:YOUR_TOKEN_HASH_HERE tackd\n\n\
             See config/server.example.toml for example configuration.\n\
             Set TACK_CONFIG env var to specify a default config file path."
        );
    }

    if !has_config_file {
        tracing::info!("Using environment variables for configuration");
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("TACK_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    // Register Prometheus metrics
    tack_server::metrics::register_metrics();
    tracing::info!("Prometheus metrics registered");

    // Initialize the relational store
    let store = tack_store::from_config(&config.store)
        .await
        .context("failed to initialize store")?;
    tracing::info!("Store initialized");

    // Verify store connectivity before accepting requests.
    // This catches configuration errors and connectivity issues early,
    // preventing the server from reporting healthy when the store is unreachable.
    store
        .health_check()
        .await
        .context("store health check failed")?;
    tracing::info!("Store connectivity verified");

    // Initialize admin token
    ensure_bootstrap(store.as_ref(), &config.admin).await?;

    // Create application state
    let state = AppState::new(config.clone(), store);

    // Create router
    let app = create_router(state);

    // Parse bind address
    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;

    tracing::info!("Listening on {}", addr);

    // Start server with ConnectInfo for client IP extraction
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
