//! Route configuration.

use crate::auth::auth_middleware;
use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        // Sync protocol
        .route("/sync/push", post(handlers::push))
        .route("/sync/pull", get(handlers::pull))
        // Read-only REST surface for poll-based clients
        .route("/api/boards", get(handlers::list_boards))
        .route("/api/boards/{board_id}", get(handlers::get_board))
        .route("/api/notes", get(handlers::list_notes))
        .route("/api/whoami", get(handlers::whoami))
        // Health check (intentionally unauthenticated for load balancers/k8s probes)
        .route("/healthz", get(handlers::health_check));

    // Conditionally add metrics endpoint based on config.
    // SECURITY: When enabled, this endpoint MUST be network-restricted
    // to authorized Prometheus scraper IPs only.
    // See crate::metrics module documentation for details.
    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    // Middleware layers are applied in reverse order (outermost first).
    // Order of execution: TraceLayer -> Auth -> Handler
    let mut router = router
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state.clone());

    if state.config.server.enable_tracing {
        router = router.layer(TraceLayer::new_for_http());
    }

    router
}
