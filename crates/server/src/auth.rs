//! Authentication middleware: bearer tokens to principals.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};
use tack_core::{OrgRole, Principal};
use tracing::Instrument;
use uuid::Uuid;

/// Maximum length for trace IDs.
/// Longer trace IDs are truncated to prevent log bloat and potential log injection.
const MAX_TRACE_ID_LEN: usize = 128;

/// Trace ID for request correlation.
#[derive(Clone, Debug)]
pub struct TraceId(pub String);

impl TraceId {
    /// Generate a new random trace ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a trace ID from a client-provided value.
    /// The value is sanitized: truncated to MAX_TRACE_ID_LEN characters and non-printable characters removed.
    pub fn from_client(value: &str) -> Self {
        // Truncate by character count, not byte count, to safely handle
        // multi-byte UTF-8, then filter to ASCII-only for log safety.
        let sanitized: String = value
            .chars()
            .take(MAX_TRACE_ID_LEN)
            .filter(|c| c.is_ascii_graphic() || *c == ' ')
            .collect();

        if sanitized.is_empty() {
            Self::new()
        } else {
            Self(sanitized)
        }
    }

    /// Get the trace ID as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authenticated request extension.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    /// The caller resolved to a user, organization, and role.
    pub principal: Principal,
    /// Id of the token that authenticated the request.
    pub token_id: Uuid,
}

/// Extract bearer token from Authorization header.
/// Per RFC 6750, the "Bearer" scheme is case-insensitive.
fn extract_bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            if v.len() >= 7 && v[..7].eq_ignore_ascii_case("bearer ") {
                Some(&v[7..])
            } else {
                None
            }
        })
}

/// Extract trace ID from X-Trace-Id header or generate a new one.
fn extract_or_generate_trace_id(req: &Request) -> TraceId {
    req.headers()
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .map(TraceId::from_client)
        .unwrap_or_else(TraceId::new)
}

/// Hash a token for storage lookup.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let result = hasher.finalize();
    hex::encode(result)
}

/// Authentication middleware that resolves tokens to principals and sets up
/// trace context.
///
/// A request without a token passes through unauthenticated; handlers that
/// need a principal reject it via [`require_auth`]. A token that is present
/// but invalid is rejected here.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let trace_id = extract_or_generate_trace_id(&req);
    let trace_id_str = trace_id.0.clone();
    req.extensions_mut().insert(trace_id);

    if let Some(token_str) = extract_bearer_token(&req) {
        let token_hash = hash_token(token_str);

        if let Some(token) = state.store.find_token_by_hash(&token_hash).await? {
            if !token.is_valid() {
                return Err(ApiError::Unauthorized(
                    "token expired or revoked".to_string(),
                ));
            }

            let role = state
                .store
                .membership_role(token.org_id, token.user_id)
                .await?
                .ok_or_else(|| {
                    tracing::warn!(
                        token_id = %token.token_id,
                        user_id = %token.user_id,
                        org_id = %token.org_id,
                        "token user is not a member of its organization"
                    );
                    ApiError::Unauthorized("token is no longer usable".to_string())
                })?;
            let role = OrgRole::parse(&role)
                .map_err(|e| ApiError::Internal(format!("invalid stored role: {e}")))?;

            req.extensions_mut().insert(AuthenticatedUser {
                principal: Principal {
                    user_id: token.user_id,
                    org_id: token.org_id,
                    role,
                },
                token_id: token.token_id,
            });
        }
    }

    // Run the request within a tracing span that includes the trace ID
    let response = next
        .run(req)
        .instrument(tracing::info_span!("request", trace_id = %trace_id_str))
        .await;

    Ok(response)
}

/// Require authentication (token must be present).
pub fn require_auth(req: &Request) -> ApiResult<&AuthenticatedUser> {
    req.extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::Unauthorized("authentication required".to_string()))
}

/// Get optional authentication.
pub fn get_auth(req: &Request) -> Option<&AuthenticatedUser> {
    req.extensions().get::<AuthenticatedUser>()
}

// Note: hex is a simple utility, we'll inline it
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }
}
