//! SQLite store implementation.
//!
//! Recommended for testing and small single-instance deployments. SQLite has
//! no row-level `FOR UPDATE` lock, so the pool is capped at one connection;
//! concurrent pushes serialize on connection checkout instead of on the
//! tenant's version row. Multi-instance deployments must use PostgreSQL.

use crate::error::{StoreError, StoreResult};
use crate::models::{
    BoardRow, BootstrapStateRow, ChangeSet, ColumnRow, NoteRow, PermissionRow, ReplicaClientRow,
    TaskRow, TokenRow,
};
use crate::store::{Store, StoreTx};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite, Transaction};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tack_core::ResourceKind;
use time::OffsetDateTime;
use uuid::Uuid;

/// SQLite-based store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Create a new SQLite store and apply the schema.
    pub async fn new(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Config(format!("creating {}: {e}", parent.display())))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // A single connection serializes writers, which is what the
            // version-row lock would otherwise provide. SQLite is not safe
            // for multi-instance deployments regardless.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn migrate(&self) -> StoreResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteTx { tx }))
    }

    async fn find_token_by_hash(&self, token_hash: &str) -> StoreResult<Option<TokenRow>> {
        let row = sqlx::query_as::<_, TokenRow>("SELECT * FROM api_tokens WHERE token_hash = ?")
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn create_token(&self, token: &TokenRow) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO api_tokens \
             (token_id, user_id, org_id, token_hash, description, created_at, expires_at, revoked_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(token.token_id)
        .bind(token.user_id)
        .bind(token.org_id)
        .bind(&token.token_hash)
        .bind(&token.description)
        .bind(token.created_at)
        .bind(token.expires_at)
        .bind(token.revoked_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn revoke_token(&self, token_id: Uuid, revoked_at: OffsetDateTime) -> StoreResult<()> {
        sqlx::query("UPDATE api_tokens SET revoked_at = ? WHERE token_id = ? AND revoked_at IS NULL")
            .bind(revoked_at)
            .bind(token_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn membership_role(&self, org_id: Uuid, user_id: Uuid) -> StoreResult<Option<String>> {
        let role = sqlx::query_scalar::<_, String>(
            "SELECT role FROM org_members WHERE org_id = ? AND user_id = ?",
        )
        .bind(org_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(role)
    }

    async fn create_org(
        &self,
        org_id: Uuid,
        name: &str,
        created_at: OffsetDateTime,
    ) -> StoreResult<()> {
        sqlx::query("INSERT INTO organizations (org_id, name, created_at) VALUES (?, ?, ?)")
            .bind(org_id)
            .bind(name)
            .bind(created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_user(
        &self,
        user_id: Uuid,
        email: &str,
        display_name: &str,
        created_at: OffsetDateTime,
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO users (user_id, email, display_name, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(email)
        .bind(display_name)
        .bind(created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_membership(&self, org_id: Uuid, user_id: Uuid, role: &str) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO org_members (org_id, user_id, role) VALUES (?, ?, ?) \
             ON CONFLICT(org_id, user_id) DO UPDATE SET role = excluded.role",
        )
        .bind(org_id)
        .bind(user_id)
        .bind(role)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn grant_board_permission(&self, permission: &PermissionRow) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO board_permissions (board_id, user_id, org_id, level) VALUES (?, ?, ?, ?) \
             ON CONFLICT(board_id, user_id) DO UPDATE SET level = excluded.level",
        )
        .bind(permission.board_id)
        .bind(permission.user_id)
        .bind(permission.org_id)
        .bind(permission.level)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_bootstrap_state(&self) -> StoreResult<Option<BootstrapStateRow>> {
        let row = sqlx::query_as::<_, BootstrapStateRow>(
            "SELECT bootstrap_token_id, bootstrap_org_id, bootstrap_user_id \
             FROM bootstrap_state WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn set_bootstrap_state(&self, state: &BootstrapStateRow) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO bootstrap_state (id, bootstrap_token_id, bootstrap_org_id, bootstrap_user_id) \
             VALUES (1, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
                 bootstrap_token_id = excluded.bootstrap_token_id, \
                 bootstrap_org_id = excluded.bootstrap_org_id, \
                 bootstrap_user_id = excluded.bootstrap_user_id",
        )
        .bind(state.bootstrap_token_id)
        .bind(state.bootstrap_org_id)
        .bind(state.bootstrap_user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn current_version(&self, org_id: Uuid) -> StoreResult<i64> {
        let version =
            sqlx::query_scalar::<_, i64>("SELECT version FROM org_versions WHERE org_id = ?")
                .bind(org_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(version.unwrap_or(0))
    }

    async fn changes_since(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        since: i64,
    ) -> StoreResult<ChangeSet> {
        // Soft-deleted boards stay visible so clients can evict them.
        let boards = sqlx::query_as::<_, BoardRow>(
            "SELECT b.* FROM boards b \
             JOIN board_permissions p ON p.board_id = b.board_id \
             WHERE b.org_id = ? AND p.user_id = ? AND b.row_version > ? \
             ORDER BY b.row_version",
        )
        .bind(org_id)
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        let columns = sqlx::query_as::<_, ColumnRow>(
            "SELECT c.* FROM board_columns c \
             JOIN boards b ON b.board_id = c.board_id \
             JOIN board_permissions p ON p.board_id = b.board_id \
             WHERE b.org_id = ? AND p.user_id = ? AND b.deleted_at IS NULL \
               AND c.row_version > ? \
             ORDER BY c.row_version",
        )
        .bind(org_id)
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        let tasks = sqlx::query_as::<_, TaskRow>(
            "SELECT t.* FROM tasks t \
             JOIN board_columns c ON c.column_id = t.column_id \
             JOIN boards b ON b.board_id = c.board_id \
             JOIN board_permissions p ON p.board_id = b.board_id \
             WHERE b.org_id = ? AND p.user_id = ? AND b.deleted_at IS NULL \
               AND t.row_version > ? \
             ORDER BY t.row_version",
        )
        .bind(org_id)
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        let notes = sqlx::query_as::<_, NoteRow>(
            "SELECT * FROM notes WHERE org_id = ? AND row_version > ? ORDER BY row_version",
        )
        .bind(org_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(ChangeSet {
            boards,
            columns,
            tasks,
            notes,
        })
    }

    async fn list_boards_for_user(
        &self,
        org_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Vec<BoardRow>> {
        let boards = sqlx::query_as::<_, BoardRow>(
            "SELECT b.* FROM boards b \
             JOIN board_permissions p ON p.board_id = b.board_id \
             WHERE b.org_id = ? AND p.user_id = ? AND b.deleted_at IS NULL \
             ORDER BY b.name",
        )
        .bind(org_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(boards)
    }

    async fn board_permission_level(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        board_id: Uuid,
    ) -> StoreResult<Option<i64>> {
        let level = sqlx::query_scalar::<_, i64>(
            "SELECT p.level FROM board_permissions p \
             JOIN boards b ON b.board_id = p.board_id \
             WHERE b.org_id = ? AND p.user_id = ? AND p.board_id = ? AND b.deleted_at IS NULL",
        )
        .bind(org_id)
        .bind(user_id)
        .bind(board_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(level)
    }

    async fn board_detail(
        &self,
        org_id: Uuid,
        board_id: Uuid,
    ) -> StoreResult<Option<(BoardRow, Vec<ColumnRow>, Vec<TaskRow>)>> {
        let board = sqlx::query_as::<_, BoardRow>(
            "SELECT * FROM boards WHERE org_id = ? AND board_id = ? AND deleted_at IS NULL",
        )
        .bind(org_id)
        .bind(board_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(board) = board else {
            return Ok(None);
        };

        let columns = sqlx::query_as::<_, ColumnRow>(
            "SELECT * FROM board_columns WHERE board_id = ? ORDER BY position",
        )
        .bind(board_id)
        .fetch_all(&self.pool)
        .await?;

        let tasks = sqlx::query_as::<_, TaskRow>(
            "SELECT t.* FROM tasks t \
             JOIN board_columns c ON c.column_id = t.column_id \
             WHERE c.board_id = ? \
             ORDER BY c.position, t.position",
        )
        .bind(board_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some((board, columns, tasks)))
    }

    async fn list_notes(&self, org_id: Uuid) -> StoreResult<Vec<NoteRow>> {
        let notes = sqlx::query_as::<_, NoteRow>(
            "SELECT * FROM notes WHERE org_id = ? AND deleted_at IS NULL ORDER BY updated_at DESC",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(notes)
    }
}

/// One open SQLite transaction.
pub struct SqliteTx {
    tx: Transaction<'static, Sqlite>,
}

/// Reject savepoint names that are not bare identifiers before splicing
/// them into SQL (savepoint names cannot be bound as parameters).
pub(crate) fn check_savepoint_name(name: &str) -> StoreResult<()> {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(StoreError::Internal(format!(
            "invalid savepoint name: {name:?}"
        )))
    }
}

#[async_trait]
impl StoreTx for SqliteTx {
    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }

    async fn savepoint(&mut self, name: &str) -> StoreResult<()> {
        check_savepoint_name(name)?;
        sqlx::query(&format!("SAVEPOINT {name}"))
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn rollback_to_savepoint(&mut self, name: &str) -> StoreResult<()> {
        check_savepoint_name(name)?;
        sqlx::query(&format!("ROLLBACK TO SAVEPOINT {name}"))
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn release_savepoint(&mut self, name: &str) -> StoreResult<()> {
        check_savepoint_name(name)?;
        sqlx::query(&format!("RELEASE SAVEPOINT {name}"))
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn lock_org_version(&mut self, org_id: Uuid) -> StoreResult<i64> {
        // SQLite has no FOR UPDATE; the single-connection pool already
        // serializes writers, so a plain read inside the transaction is
        // equivalent.
        sqlx::query("INSERT INTO org_versions (org_id, version) VALUES (?, 0) ON CONFLICT(org_id) DO NOTHING")
            .bind(org_id)
            .execute(&mut *self.tx)
            .await?;

        let version =
            sqlx::query_scalar::<_, i64>("SELECT version FROM org_versions WHERE org_id = ?")
                .bind(org_id)
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(version)
    }

    async fn set_org_version(&mut self, org_id: Uuid, version: i64) -> StoreResult<()> {
        sqlx::query("UPDATE org_versions SET version = ? WHERE org_id = ?")
            .bind(version)
            .bind(org_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn get_replica_client(
        &mut self,
        org_id: Uuid,
        client_id: &str,
    ) -> StoreResult<Option<ReplicaClientRow>> {
        let row = sqlx::query_as::<_, ReplicaClientRow>(
            "SELECT * FROM replica_clients WHERE org_id = ? AND client_id = ?",
        )
        .bind(org_id)
        .bind(client_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn upsert_replica_client(&mut self, row: &ReplicaClientRow) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO replica_clients \
             (org_id, client_id, client_group_id, last_mutation_id, version, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(org_id, client_id) DO UPDATE SET \
                 client_group_id = excluded.client_group_id, \
                 last_mutation_id = excluded.last_mutation_id, \
                 version = excluded.version, \
                 updated_at = excluded.updated_at",
        )
        .bind(row.org_id)
        .bind(&row.client_id)
        .bind(&row.client_group_id)
        .bind(row.last_mutation_id)
        .bind(row.version)
        .bind(row.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn resolve_boards(
        &mut self,
        org_id: Uuid,
        kind: ResourceKind,
        ids: &[Uuid],
    ) -> StoreResult<Vec<(Uuid, Uuid)>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = match kind {
            ResourceKind::Board => format!(
                "SELECT board_id, board_id AS resolved_board_id FROM boards \
                 WHERE org_id = ? AND deleted_at IS NULL AND board_id IN ({placeholders})"
            ),
            ResourceKind::Column => format!(
                "SELECT c.column_id, c.board_id FROM board_columns c \
                 JOIN boards b ON b.board_id = c.board_id \
                 WHERE b.org_id = ? AND b.deleted_at IS NULL AND c.column_id IN ({placeholders})"
            ),
            ResourceKind::Task => format!(
                "SELECT t.task_id, c.board_id FROM tasks t \
                 JOIN board_columns c ON c.column_id = t.column_id \
                 JOIN boards b ON b.board_id = c.board_id \
                 WHERE b.org_id = ? AND b.deleted_at IS NULL AND t.task_id IN ({placeholders})"
            ),
        };

        let mut query = sqlx::query_as::<_, (Uuid, Uuid)>(&sql).bind(org_id);
        for id in ids {
            query = query.bind(id);
        }
        Ok(query.fetch_all(&mut *self.tx).await?)
    }

    async fn permission_levels(
        &mut self,
        org_id: Uuid,
        user_id: Uuid,
        board_ids: &[Uuid],
    ) -> StoreResult<Vec<PermissionRow>> {
        if board_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; board_ids.len()].join(", ");
        let sql = format!(
            "SELECT * FROM board_permissions \
             WHERE org_id = ? AND user_id = ? AND board_id IN ({placeholders})"
        );

        let mut query = sqlx::query_as::<_, PermissionRow>(&sql)
            .bind(org_id)
            .bind(user_id);
        for id in board_ids {
            query = query.bind(id);
        }
        Ok(query.fetch_all(&mut *self.tx).await?)
    }

    async fn insert_permission(&mut self, permission: &PermissionRow) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO board_permissions (board_id, user_id, org_id, level) VALUES (?, ?, ?, ?)",
        )
        .bind(permission.board_id)
        .bind(permission.user_id)
        .bind(permission.org_id)
        .bind(permission.level)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn board_name_exists(
        &mut self,
        org_id: Uuid,
        name: &str,
        exclude_board_id: Option<Uuid>,
    ) -> StoreResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM boards \
             WHERE org_id = ? AND name = ? AND deleted_at IS NULL \
               AND (? IS NULL OR board_id <> ?))",
        )
        .bind(org_id)
        .bind(name)
        .bind(exclude_board_id)
        .bind(exclude_board_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn get_board(&mut self, org_id: Uuid, board_id: Uuid) -> StoreResult<Option<BoardRow>> {
        let row =
            sqlx::query_as::<_, BoardRow>("SELECT * FROM boards WHERE org_id = ? AND board_id = ?")
                .bind(org_id)
                .bind(board_id)
                .fetch_optional(&mut *self.tx)
                .await?;
        Ok(row)
    }

    async fn get_column(&mut self, column_id: Uuid) -> StoreResult<Option<ColumnRow>> {
        let row =
            sqlx::query_as::<_, ColumnRow>("SELECT * FROM board_columns WHERE column_id = ?")
                .bind(column_id)
                .fetch_optional(&mut *self.tx)
                .await?;
        Ok(row)
    }

    async fn get_task(&mut self, task_id: Uuid) -> StoreResult<Option<TaskRow>> {
        let row = sqlx::query_as::<_, TaskRow>("SELECT * FROM tasks WHERE task_id = ?")
            .bind(task_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn list_columns(&mut self, board_id: Uuid) -> StoreResult<Vec<ColumnRow>> {
        let rows = sqlx::query_as::<_, ColumnRow>(
            "SELECT * FROM board_columns WHERE board_id = ? ORDER BY position",
        )
        .bind(board_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn list_tasks_in_column(&mut self, column_id: Uuid) -> StoreResult<Vec<TaskRow>> {
        let rows = sqlx::query_as::<_, TaskRow>(
            "SELECT * FROM tasks WHERE column_id = ? ORDER BY position",
        )
        .bind(column_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn get_note(&mut self, org_id: Uuid, note_id: Uuid) -> StoreResult<Option<NoteRow>> {
        let row =
            sqlx::query_as::<_, NoteRow>("SELECT * FROM notes WHERE org_id = ? AND note_id = ?")
                .bind(org_id)
                .bind(note_id)
                .fetch_optional(&mut *self.tx)
                .await?;
        Ok(row)
    }

    async fn insert_board(&mut self, board: &BoardRow) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO boards \
             (board_id, org_id, name, color, created_at, updated_at, deleted_at, row_version) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(board.board_id)
        .bind(board.org_id)
        .bind(&board.name)
        .bind(&board.color)
        .bind(board.created_at)
        .bind(board.updated_at)
        .bind(board.deleted_at)
        .bind(board.row_version)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_board(&mut self, board: &BoardRow) -> StoreResult<()> {
        sqlx::query(
            "UPDATE boards SET name = ?, color = ?, updated_at = ?, row_version = ? \
             WHERE board_id = ?",
        )
        .bind(&board.name)
        .bind(&board.color)
        .bind(board.updated_at)
        .bind(board.row_version)
        .bind(board.board_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn soft_delete_board(
        &mut self,
        board_id: Uuid,
        deleted_at: OffsetDateTime,
        row_version: i64,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE boards SET deleted_at = ?, updated_at = ?, row_version = ? \
             WHERE board_id = ?",
        )
        .bind(deleted_at)
        .bind(deleted_at)
        .bind(row_version)
        .bind(board_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_column(&mut self, column: &ColumnRow) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO board_columns \
             (column_id, board_id, name, position, created_at, updated_at, row_version) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(column.column_id)
        .bind(column.board_id)
        .bind(&column.name)
        .bind(column.position)
        .bind(column.created_at)
        .bind(column.updated_at)
        .bind(column.row_version)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_column(&mut self, column: &ColumnRow) -> StoreResult<()> {
        sqlx::query(
            "UPDATE board_columns SET name = ?, position = ?, updated_at = ?, row_version = ? \
             WHERE column_id = ?",
        )
        .bind(&column.name)
        .bind(column.position)
        .bind(column.updated_at)
        .bind(column.row_version)
        .bind(column.column_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete_column(&mut self, column_id: Uuid) -> StoreResult<()> {
        // Tasks cascade via the FK.
        sqlx::query("DELETE FROM board_columns WHERE column_id = ?")
            .bind(column_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_task(&mut self, task: &TaskRow) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO tasks \
             (task_id, column_id, name, body, position, created_at, updated_at, row_version) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(task.task_id)
        .bind(task.column_id)
        .bind(&task.name)
        .bind(&task.body)
        .bind(task.position)
        .bind(task.created_at)
        .bind(task.updated_at)
        .bind(task.row_version)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_task(&mut self, task: &TaskRow) -> StoreResult<()> {
        sqlx::query(
            "UPDATE tasks SET column_id = ?, name = ?, body = ?, position = ?, updated_at = ?, \
             row_version = ? WHERE task_id = ?",
        )
        .bind(task.column_id)
        .bind(&task.name)
        .bind(&task.body)
        .bind(task.position)
        .bind(task.updated_at)
        .bind(task.row_version)
        .bind(task.task_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete_task(&mut self, task_id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM tasks WHERE task_id = ?")
            .bind(task_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_note(&mut self, note: &NoteRow) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO notes \
             (note_id, org_id, title, body, created_at, updated_at, deleted_at, row_version) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(note.note_id)
        .bind(note.org_id)
        .bind(&note.title)
        .bind(&note.body)
        .bind(note.created_at)
        .bind(note.updated_at)
        .bind(note.deleted_at)
        .bind(note.row_version)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_note(&mut self, note: &NoteRow) -> StoreResult<()> {
        sqlx::query(
            "UPDATE notes SET title = ?, body = ?, updated_at = ?, row_version = ? \
             WHERE note_id = ?",
        )
        .bind(&note.title)
        .bind(&note.body)
        .bind(note.updated_at)
        .bind(note.row_version)
        .bind(note.note_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn soft_delete_note(
        &mut self,
        note_id: Uuid,
        deleted_at: OffsetDateTime,
        row_version: i64,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE notes SET deleted_at = ?, updated_at = ?, row_version = ? WHERE note_id = ?",
        )
        .bind(deleted_at)
        .bind(deleted_at)
        .bind(row_version)
        .bind(note_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }
}

/// SQL schema for SQLite.
const SCHEMA_SQL: &str = r#"
-- Tenancy
CREATE TABLE IF NOT EXISTS organizations (
    org_id BLOB PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    user_id BLOB PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    display_name TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS org_members (
    org_id BLOB NOT NULL REFERENCES organizations(org_id) ON DELETE CASCADE,
    user_id BLOB NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    role TEXT NOT NULL,
    PRIMARY KEY (org_id, user_id)
);

-- Kanban entities
CREATE TABLE IF NOT EXISTS boards (
    board_id BLOB PRIMARY KEY,
    org_id BLOB NOT NULL REFERENCES organizations(org_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    color TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT,
    row_version INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_boards_org_version ON boards(org_id, row_version);
-- Name uniqueness applies to live boards only
CREATE UNIQUE INDEX IF NOT EXISTS idx_boards_org_name_live
    ON boards(org_id, name) WHERE deleted_at IS NULL;

CREATE TABLE IF NOT EXISTS board_columns (
    column_id BLOB PRIMARY KEY,
    board_id BLOB NOT NULL REFERENCES boards(board_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    position REAL NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    row_version INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_columns_board ON board_columns(board_id, position);

CREATE TABLE IF NOT EXISTS tasks (
    task_id BLOB PRIMARY KEY,
    column_id BLOB NOT NULL REFERENCES board_columns(column_id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    body TEXT,
    position REAL NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    row_version INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tasks_column ON tasks(column_id, position);

CREATE TABLE IF NOT EXISTS notes (
    note_id BLOB PRIMARY KEY,
    org_id BLOB NOT NULL REFERENCES organizations(org_id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    body TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT,
    row_version INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_notes_org_version ON notes(org_id, row_version);

CREATE TABLE IF NOT EXISTS board_permissions (
    board_id BLOB NOT NULL REFERENCES boards(board_id) ON DELETE CASCADE,
    user_id BLOB NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    org_id BLOB NOT NULL,
    level INTEGER NOT NULL,
    PRIMARY KEY (board_id, user_id)
);
CREATE INDEX IF NOT EXISTS idx_permissions_user ON board_permissions(org_id, user_id);

-- Sync bookkeeping
CREATE TABLE IF NOT EXISTS replica_clients (
    org_id BLOB NOT NULL,
    client_id TEXT NOT NULL,
    client_group_id TEXT NOT NULL,
    last_mutation_id INTEGER NOT NULL,
    version INTEGER NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (org_id, client_id)
);

CREATE TABLE IF NOT EXISTS org_versions (
    org_id BLOB PRIMARY KEY,
    version INTEGER NOT NULL
);

-- Authentication
CREATE TABLE IF NOT EXISTS api_tokens (
    token_id BLOB PRIMARY KEY,
    user_id BLOB NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    org_id BLOB NOT NULL REFERENCES organizations(org_id) ON DELETE CASCADE,
    token_hash TEXT NOT NULL UNIQUE,
    description TEXT,
    created_at TEXT NOT NULL,
    expires_at TEXT,
    revoked_at TEXT
);

CREATE TABLE IF NOT EXISTS bootstrap_state (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    bootstrap_token_id BLOB,
    bootstrap_org_id BLOB,
    bootstrap_user_id BLOB
);
"#;
