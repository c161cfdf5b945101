//! Identity and health endpoints.

use crate::auth::require_auth;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Request, State};
use serde::Serialize;
use uuid::Uuid;

/// Response for the authenticated caller.
#[derive(Debug, Serialize)]
pub struct WhoamiResponse {
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    #[serde(rename = "organizationId")]
    pub organization_id: Uuid,
    pub role: String,
}

/// GET /api/whoami - Return the caller's resolved principal.
pub async fn whoami(req: Request) -> ApiResult<Json<WhoamiResponse>> {
    let auth = require_auth(&req)?;
    Ok(Json(WhoamiResponse {
        user_id: auth.principal.user_id,
        organization_id: auth.principal.org_id,
        role: auth.principal.role.as_str().to_string(),
    }))
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// GET /healthz - Health check.
///
/// This endpoint is intentionally unauthenticated to support:
/// - Kubernetes liveness/readiness probes
/// - Load balancer health checks
///
/// Returns only non-sensitive information (status and version).
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    state.store.health_check().await?;

    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    }))
}
