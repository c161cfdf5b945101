//! HTTP API server for tack.
//!
//! This crate provides the HTTP control plane:
//! - Batched mutation push (`/sync/push`)
//! - Incremental change pull (`/sync/pull`)
//! - Read-only REST surface for boards and notes
//! - Bearer token authentication and tenant resolution
//! - Prometheus metrics and health checks

pub mod auth;
pub mod bootstrap;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;

pub use auth::TraceId;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
