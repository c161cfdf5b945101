//! Store traits: the transactional relational collaborator the sync core
//! runs against.
//!
//! [`Store`] is the long-lived handle held in application state. Mutation
//! application opens a [`StoreTx`] per mutation; everything the handlers
//! touch — version lock, replica bookkeeping, permission resolution, entity
//! writes — goes through that transaction so a rollback undoes the mutation
//! completely and permission checks cannot race the writes they guard.

use crate::error::StoreResult;
use crate::models::{
    BoardRow, BootstrapStateRow, ChangeSet, ColumnRow, NoteRow, PermissionRow, ReplicaClientRow,
    TaskRow, TokenRow,
};
use async_trait::async_trait;
use tack_core::ResourceKind;
use time::OffsetDateTime;
use uuid::Uuid;

/// Long-lived store handle.
///
/// Non-transactional methods serve the read side (auth, pull, REST) and
/// provisioning (bootstrap, test fixtures); all mutation-path writes go
/// through [`Store::begin`].
#[async_trait]
pub trait Store: Send + Sync {
    /// Apply the embedded schema.
    async fn migrate(&self) -> StoreResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> StoreResult<()>;

    /// Open a transaction for applying one mutation.
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>>;

    // --- authentication -----------------------------------------------------

    /// Look up an API token by the SHA256 hex hash of its raw value.
    async fn find_token_by_hash(&self, token_hash: &str) -> StoreResult<Option<TokenRow>>;

    /// Create an API token.
    async fn create_token(&self, token: &TokenRow) -> StoreResult<()>;

    /// Revoke an API token. Idempotent; revoking an unknown token is a no-op.
    async fn revoke_token(&self, token_id: Uuid, revoked_at: OffsetDateTime) -> StoreResult<()>;

    /// Role of a user within an organization, if they are a member.
    async fn membership_role(&self, org_id: Uuid, user_id: Uuid) -> StoreResult<Option<String>>;

    // --- provisioning -------------------------------------------------------

    /// Create an organization.
    async fn create_org(&self, org_id: Uuid, name: &str, created_at: OffsetDateTime)
    -> StoreResult<()>;

    /// Create a user.
    async fn create_user(
        &self,
        user_id: Uuid,
        email: &str,
        display_name: &str,
        created_at: OffsetDateTime,
    ) -> StoreResult<()>;

    /// Add a user to an organization or update their role.
    async fn upsert_membership(&self, org_id: Uuid, user_id: Uuid, role: &str) -> StoreResult<()>;

    /// Grant or update a user's permission level on a board.
    async fn grant_board_permission(&self, permission: &PermissionRow) -> StoreResult<()>;

    /// Read the bootstrap bookkeeping row, if first startup has happened.
    async fn get_bootstrap_state(&self) -> StoreResult<Option<BootstrapStateRow>>;

    /// Record the bootstrap token/org/user ids.
    async fn set_bootstrap_state(&self, state: &BootstrapStateRow) -> StoreResult<()>;

    // --- read side (pull + REST) -------------------------------------------

    /// Current server version for a tenant (0 if no mutation was ever
    /// applied).
    async fn current_version(&self, org_id: Uuid) -> StoreResult<i64>;

    /// Rows with `row_version > since` visible to the user: boards with a
    /// permission row for them (soft-deleted included, so deletions are
    /// observable), columns and tasks of those boards, and the tenant's
    /// notes.
    async fn changes_since(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        since: i64,
    ) -> StoreResult<ChangeSet>;

    /// Live boards the user holds any permission on, ordered by name.
    async fn list_boards_for_user(&self, org_id: Uuid, user_id: Uuid)
    -> StoreResult<Vec<BoardRow>>;

    /// The user's permission level ordinal on a live board, if any.
    async fn board_permission_level(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        board_id: Uuid,
    ) -> StoreResult<Option<i64>>;

    /// A live board with its columns and tasks, ordered by position.
    async fn board_detail(
        &self,
        org_id: Uuid,
        board_id: Uuid,
    ) -> StoreResult<Option<(BoardRow, Vec<ColumnRow>, Vec<TaskRow>)>>;

    /// Live notes of a tenant, newest first.
    async fn list_notes(&self, org_id: Uuid) -> StoreResult<Vec<NoteRow>>;
}

/// One open transaction on the store.
///
/// Methods take `&mut self`; the transaction is single-threaded by
/// construction. Dropping without [`StoreTx::commit`] rolls back.
#[async_trait]
pub trait StoreTx: Send {
    /// Commit the transaction.
    async fn commit(self: Box<Self>) -> StoreResult<()>;

    /// Roll the transaction back explicitly.
    async fn rollback(self: Box<Self>) -> StoreResult<()>;

    /// Create a savepoint. `name` must be a bare SQL identifier.
    async fn savepoint(&mut self, name: &str) -> StoreResult<()>;

    /// Roll back to a savepoint, keeping the transaction open.
    async fn rollback_to_savepoint(&mut self, name: &str) -> StoreResult<()>;

    /// Release a savepoint, folding its writes into the transaction.
    async fn release_savepoint(&mut self, name: &str) -> StoreResult<()>;

    // --- version + replica bookkeeping -------------------------------------

    /// Read the tenant's server version with a write-intent lock, creating
    /// the counter row at 0 on first contact. Concurrent pushes against the
    /// same tenant serialize here until commit or rollback.
    async fn lock_org_version(&mut self, org_id: Uuid) -> StoreResult<i64>;

    /// Advance the tenant's server version.
    async fn set_org_version(&mut self, org_id: Uuid, version: i64) -> StoreResult<()>;

    /// Read a client's mutation bookkeeping row.
    async fn get_replica_client(
        &mut self,
        org_id: Uuid,
        client_id: &str,
    ) -> StoreResult<Option<ReplicaClientRow>>;

    /// Insert or update a client's mutation bookkeeping row.
    async fn upsert_replica_client(&mut self, row: &ReplicaClientRow) -> StoreResult<()>;

    // --- permission resolution ---------------------------------------------

    /// Resolve resource ids to their owning live boards within the tenant.
    /// Returns `(requested_id, board_id)` pairs; a requested id that does
    /// not resolve (missing, soft-deleted board, or out of tenant) is simply
    /// absent from the result.
    async fn resolve_boards(
        &mut self,
        org_id: Uuid,
        kind: ResourceKind,
        ids: &[Uuid],
    ) -> StoreResult<Vec<(Uuid, Uuid)>>;

    /// Permission rows held by a user on the given boards.
    async fn permission_levels(
        &mut self,
        org_id: Uuid,
        user_id: Uuid,
        board_ids: &[Uuid],
    ) -> StoreResult<Vec<PermissionRow>>;

    /// Insert a permission row (board creation grants the creator owner).
    async fn insert_permission(&mut self, permission: &PermissionRow) -> StoreResult<()>;

    // --- entity reads -------------------------------------------------------

    /// Whether a live board with this name exists in the tenant, excluding
    /// one board id (for renames).
    async fn board_name_exists(
        &mut self,
        org_id: Uuid,
        name: &str,
        exclude_board_id: Option<Uuid>,
    ) -> StoreResult<bool>;

    /// Read a board (live or soft-deleted) within the tenant.
    async fn get_board(&mut self, org_id: Uuid, board_id: Uuid) -> StoreResult<Option<BoardRow>>;

    /// Read a column.
    async fn get_column(&mut self, column_id: Uuid) -> StoreResult<Option<ColumnRow>>;

    /// Read a task.
    async fn get_task(&mut self, task_id: Uuid) -> StoreResult<Option<TaskRow>>;

    /// Columns of a board ordered by position.
    async fn list_columns(&mut self, board_id: Uuid) -> StoreResult<Vec<ColumnRow>>;

    /// Tasks of a column ordered by position.
    async fn list_tasks_in_column(&mut self, column_id: Uuid) -> StoreResult<Vec<TaskRow>>;

    /// Read a note (live or soft-deleted) within the tenant.
    async fn get_note(&mut self, org_id: Uuid, note_id: Uuid) -> StoreResult<Option<NoteRow>>;

    // --- entity writes ------------------------------------------------------

    /// Insert a board.
    async fn insert_board(&mut self, board: &BoardRow) -> StoreResult<()>;

    /// Update a board's name, color, `updated_at`, and `row_version`.
    async fn update_board(&mut self, board: &BoardRow) -> StoreResult<()>;

    /// Soft-delete a board, stamping `row_version` so the deletion is
    /// pullable.
    async fn soft_delete_board(
        &mut self,
        board_id: Uuid,
        deleted_at: OffsetDateTime,
        row_version: i64,
    ) -> StoreResult<()>;

    /// Insert a column.
    async fn insert_column(&mut self, column: &ColumnRow) -> StoreResult<()>;

    /// Update a column's name, position, `updated_at`, and `row_version`.
    async fn update_column(&mut self, column: &ColumnRow) -> StoreResult<()>;

    /// Hard-delete a column; its tasks cascade.
    async fn delete_column(&mut self, column_id: Uuid) -> StoreResult<()>;

    /// Insert a task.
    async fn insert_task(&mut self, task: &TaskRow) -> StoreResult<()>;

    /// Update a task's name, body, column, position, `updated_at`, and
    /// `row_version`.
    async fn update_task(&mut self, task: &TaskRow) -> StoreResult<()>;

    /// Hard-delete a task.
    async fn delete_task(&mut self, task_id: Uuid) -> StoreResult<()>;

    /// Insert a note.
    async fn insert_note(&mut self, note: &NoteRow) -> StoreResult<()>;

    /// Update a note's title, body, `updated_at`, and `row_version`.
    async fn update_note(&mut self, note: &NoteRow) -> StoreResult<()>;

    /// Soft-delete a note, stamping `row_version`.
    async fn soft_delete_note(
        &mut self,
        note_id: Uuid,
        deleted_at: OffsetDateTime,
        row_version: i64,
    ) -> StoreResult<()>;
}
