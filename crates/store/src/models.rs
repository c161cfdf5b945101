//! Database models mapping to the relational schema.

use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Kanban entities
// =============================================================================

/// Board record. Soft-deleted via `deleted_at`; name uniqueness is scoped to
/// live rows within the organization.
#[derive(Debug, Clone, FromRow)]
pub struct BoardRow {
    pub board_id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub color: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>,
    /// Server version at which the row last changed; drives incremental pull.
    pub row_version: i64,
}

/// Column record. Ordered within its board by the fractional `position` key.
#[derive(Debug, Clone, FromRow)]
pub struct ColumnRow {
    pub column_id: Uuid,
    pub board_id: Uuid,
    pub name: String,
    pub position: f64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub row_version: i64,
}

/// Task record. Ordered within its column by the fractional `position` key.
#[derive(Debug, Clone, FromRow)]
pub struct TaskRow {
    pub task_id: Uuid,
    pub column_id: Uuid,
    pub name: String,
    pub body: Option<String>,
    pub position: f64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub row_version: i64,
}

/// Freestanding per-tenant note. Soft-deleted via `deleted_at`.
#[derive(Debug, Clone, FromRow)]
pub struct NoteRow {
    pub note_id: Uuid,
    pub org_id: Uuid,
    pub title: String,
    pub body: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>,
    pub row_version: i64,
}

/// Per-board permission row. Columns and tasks inherit the owning board's
/// row; there are no per-column or per-task permission rows.
#[derive(Debug, Clone, FromRow)]
pub struct PermissionRow {
    pub board_id: Uuid,
    pub user_id: Uuid,
    pub org_id: Uuid,
    /// Permission level ordinal: viewer=0, editor=1, admin=2, owner=3.
    pub level: i64,
}

// =============================================================================
// Sync bookkeeping
// =============================================================================

/// Per-client mutation bookkeeping for idempotent application.
#[derive(Debug, Clone, FromRow)]
pub struct ReplicaClientRow {
    pub org_id: Uuid,
    pub client_id: String,
    pub client_group_id: String,
    /// Id of the last mutation consumed from this client; the next accepted
    /// id is exactly `last_mutation_id + 1`.
    pub last_mutation_id: i64,
    /// Server version at which this client's bookkeeping last changed.
    pub version: i64,
    pub updated_at: OffsetDateTime,
}

// =============================================================================
// Authentication
// =============================================================================

/// API token record. The raw token is never stored; lookups go through its
/// SHA256 hash.
#[derive(Debug, Clone, FromRow)]
pub struct TokenRow {
    pub token_id: Uuid,
    pub user_id: Uuid,
    pub org_id: Uuid,
    pub token_hash: String,
    pub description: Option<String>,
    pub created_at: OffsetDateTime,
    pub expires_at: Option<OffsetDateTime>,
    pub revoked_at: Option<OffsetDateTime>,
}

impl TokenRow {
    /// Check if the token is valid (not expired or revoked).
    pub fn is_valid(&self) -> bool {
        let now = OffsetDateTime::now_utc();

        if self.revoked_at.is_some() {
            return false;
        }

        if let Some(expires_at) = self.expires_at
            && now > expires_at
        {
            return false;
        }

        true
    }
}

/// Bootstrap bookkeeping: ids of the admin-token resources created at first
/// startup, so a rotated admin token can revoke its predecessor.
#[derive(Debug, Clone, FromRow)]
pub struct BootstrapStateRow {
    pub bootstrap_token_id: Option<Uuid>,
    pub bootstrap_org_id: Option<Uuid>,
    pub bootstrap_user_id: Option<Uuid>,
}

/// Rows changed since a pull cursor, per entity type.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub boards: Vec<BoardRow>,
    pub columns: Vec<ColumnRow>,
    pub tasks: Vec<TaskRow>,
    pub notes: Vec<NoteRow>,
}
