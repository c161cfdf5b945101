//! Test fixtures for provisioning organizations, users, and tokens.

use sha2::{Digest, Sha256};
use std::sync::Arc;
use tack_core::access::{OrgRole, PermissionLevel};
use tack_store::Store;
use tack_store::models::{PermissionRow, TokenRow};
use time::OffsetDateTime;
use uuid::Uuid;

/// Compute SHA-256 hash of data as hex string.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub fn sha256_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    // Format as hex without external dependency
    result.iter().map(|b| format!("{:02x}", b)).collect()
}

/// A provisioned organization with one member and a usable bearer token.
#[allow(dead_code)]
pub struct Tenant {
    pub org_id: Uuid,
    pub user_id: Uuid,
    pub token: String,
}

/// Create an organization with one member of `role` and an API token for
/// that member.
#[allow(dead_code)]
pub async fn provision_tenant(store: &Arc<dyn Store>, org_name: &str, role: OrgRole) -> Tenant {
    let now = OffsetDateTime::now_utc();
    let org_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();

    store
        .create_org(org_id, org_name, now)
        .await
        .expect("Failed to create org");
    store
        .create_user(user_id, &format!("{org_name}@example.com"), "Test User", now)
        .await
        .expect("Failed to create user");
    store
        .upsert_membership(org_id, user_id, role.as_str())
        .await
        .expect("Failed to create membership");

    let token = issue_token(store, org_id, user_id).await;
    Tenant {
        org_id,
        user_id,
        token,
    }
}

/// Add another member to an existing organization and issue them a token.
#[allow(dead_code)]
pub async fn add_member(store: &Arc<dyn Store>, org_id: Uuid, role: OrgRole) -> (Uuid, String) {
    let now = OffsetDateTime::now_utc();
    let user_id = Uuid::new_v4();

    store
        .create_user(
            user_id,
            &format!("user-{user_id}@example.com"),
            "Test User",
            now,
        )
        .await
        .expect("Failed to create user");
    store
        .upsert_membership(org_id, user_id, role.as_str())
        .await
        .expect("Failed to create membership");

    let token = issue_token(store, org_id, user_id).await;
    (user_id, token)
}

/// Create an API token for the user and return the raw token value.
#[allow(dead_code)]
pub async fn issue_token(store: &Arc<dyn Store>, org_id: Uuid, user_id: Uuid) -> String {
    let raw_token = format!("test-token-{}", Uuid::new_v4());

    let token = TokenRow {
        token_id: Uuid::new_v4(),
        user_id,
        org_id,
        token_hash: sha256_hash(raw_token.as_bytes()),
        description: Some("Test Token".to_string()),
        created_at: OffsetDateTime::now_utc(),
        expires_at: None,
        revoked_at: None,
    };

    store
        .create_token(&token)
        .await
        .expect("Failed to create token");

    raw_token
}

/// Grant the user a permission level on a board.
#[allow(dead_code)]
pub async fn grant_permission(
    store: &Arc<dyn Store>,
    org_id: Uuid,
    board_id: Uuid,
    user_id: Uuid,
    level: PermissionLevel,
) {
    store
        .grant_board_permission(&PermissionRow {
            board_id,
            user_id,
            org_id,
            level: level.ordinal(),
        })
        .await
        .expect("Failed to grant permission");
}
