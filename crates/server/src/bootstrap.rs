//! Admin token and bootstrap tenant initialization.

use anyhow::{Result, bail};
use tack_core::OrgRole;
use tack_core::config::AdminConfig;
use tack_store::Store;
use tack_store::models::{BootstrapStateRow, TokenRow};
use time::OffsetDateTime;
use uuid::Uuid;

/// Ensure the bootstrap tenant and the configured admin token exist, rotating
/// the previous token if the hash changed.
///
/// First startup creates a bootstrap organization and an admin user holding
/// the owner role; the admin token authenticates as that user. If the token
/// hash changes between restarts, the previous admin token is automatically
/// revoked and a new one is created against the same organization and user.
pub async fn ensure_bootstrap(store: &dyn Store, config: &AdminConfig) -> Result<()> {
    // Normalize to lowercase to match auth.rs hash_token() which uses lowercase hex encoding.
    // Without this, uppercase hashes in config would never match during authentication.
    let hash = config
        .token_hash
        .strip_prefix("sha256:")
        .unwrap_or(&config.token_hash)
        .trim()
        .to_lowercase();
    let hash = hash.as_str();
    if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("invalid admin token_hash: expected 64 hex chars");
    }

    if let Some(existing) = store.find_token_by_hash(hash).await? {
        // Reject if the token was previously revoked
        if existing.revoked_at.is_some() {
            bail!(
                "admin token hash matches a revoked token (id={}); \
                 use a new token hash or clear the revoked token",
                existing.token_id
            );
        }
        // Reject if the token is expired
        let now = OffsetDateTime::now_utc();
        if let Some(expires_at) = existing.expires_at
            && expires_at <= now
        {
            bail!(
                "admin token hash matches an expired token (id={}, expired={}); \
                 use a new token hash",
                existing.token_id,
                expires_at
            );
        }
        store
            .set_bootstrap_state(&BootstrapStateRow {
                bootstrap_token_id: Some(existing.token_id),
                bootstrap_org_id: Some(existing.org_id),
                bootstrap_user_id: Some(existing.user_id),
            })
            .await?;
        tracing::debug!("Admin token already exists");
        return Ok(());
    }

    let now = OffsetDateTime::now_utc();
    let previous = store.get_bootstrap_state().await?;

    if let Some(prev_id) = previous.as_ref().and_then(|s| s.bootstrap_token_id) {
        store.revoke_token(prev_id, now).await?;
        tracing::info!(token_id = %prev_id, "Previous admin token revoked");
    }

    // Rotation keeps the original bootstrap organization and user.
    let ids = previous
        .as_ref()
        .and_then(|s| s.bootstrap_org_id.zip(s.bootstrap_user_id));
    let (org_id, user_id) = match ids {
        Some(ids) => ids,
        None => {
            let org_id = Uuid::new_v4();
            let user_id = Uuid::new_v4();
            store.create_org(org_id, "bootstrap", now).await?;
            store
                .create_user(user_id, "admin@tack.invalid", "Administrator", now)
                .await?;
            tracing::info!(org_id = %org_id, user_id = %user_id, "Bootstrap organization created");
            (org_id, user_id)
        }
    };
    store
        .upsert_membership(org_id, user_id, OrgRole::Owner.as_str())
        .await?;

    let token = TokenRow {
        token_id: Uuid::new_v4(),
        user_id,
        org_id,
        token_hash: hash.to_string(),
        description: config.token_description.clone(),
        created_at: now,
        expires_at: None,
        revoked_at: None,
    };

    store.create_token(&token).await?;
    store
        .set_bootstrap_state(&BootstrapStateRow {
            bootstrap_token_id: Some(token.token_id),
            bootstrap_org_id: Some(org_id),
            bootstrap_user_id: Some(user_id),
        })
        .await?;
    tracing::info!(token_id = %token.token_id, "Admin token created");

    Ok(())
}
