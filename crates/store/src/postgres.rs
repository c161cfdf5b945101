//! PostgreSQL store implementation.
//!
//! Uses a real `SELECT ... FOR UPDATE` on the tenant version row, so any
//! number of server instances can push concurrently against the same
//! database.

use crate::error::StoreResult;
use crate::models::{
    BoardRow, BootstrapStateRow, ChangeSet, ColumnRow, NoteRow, PermissionRow, ReplicaClientRow,
    TaskRow, TokenRow,
};
use crate::store::{Store, StoreTx};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode as SqlxPgSslMode};
use sqlx::{Pool, Postgres, Transaction};
use std::str::FromStr;
use tack_core::config::PgSslMode;
use tack_core::ResourceKind;
use time::OffsetDateTime;
use uuid::Uuid;

/// PostgreSQL schema (embedded).
const POSTGRES_SCHEMA: &str = include_str!("postgres_schema.sql");

fn postgres_schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                return None;
            }
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}

/// PostgreSQL-based store.
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Create a new PostgreSQL store from a connection URL.
    pub async fn from_url(
        url: &str,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> StoreResult<Self> {
        let opts = PgConnectOptions::from_str(url)?;
        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    /// Create a new PostgreSQL store from individual connection parameters.
    ///
    /// This allows credentials to be passed separately, enabling better
    /// secret management (e.g., passwords via environment variables).
    pub async fn from_params(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        database: &str,
        ssl_mode: Option<PgSslMode>,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> StoreResult<Self> {
        let mut opts = PgConnectOptions::new()
            .host(host)
            .port(port)
            .database(database);

        if let Some(user) = username {
            opts = opts.username(user);
        }

        if let Some(pass) = password {
            opts = opts.password(pass);
        }

        if let Some(mode) = ssl_mode {
            let sqlx_mode = match mode {
                PgSslMode::Disable => SqlxPgSslMode::Disable,
                PgSslMode::Prefer => SqlxPgSslMode::Prefer,
                PgSslMode::Require => SqlxPgSslMode::Require,
            };
            opts = opts.ssl_mode(sqlx_mode);
        }

        // Log connection info without password
        tracing::info!(
            host = host,
            port = port,
            database = database,
            username = username.unwrap_or("<none>"),
            ssl_mode = ?ssl_mode,
            "Connecting to PostgreSQL"
        );

        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    async fn connect(
        mut opts: PgConnectOptions,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> StoreResult<Self> {
        // Bound every statement so a stuck query cannot wedge a push worker.
        if let Some(timeout_ms) = statement_timeout_ms {
            opts = opts.options([("statement_timeout", format!("{timeout_ms}ms"))]);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn migrate(&self) -> StoreResult<()> {
        // PostgreSQL doesn't allow multiple statements in a single prepared
        // statement, so we split the schema and execute each one separately.
        for statement in postgres_schema_statements(POSTGRES_SCHEMA) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTx { tx }))
    }

    async fn find_token_by_hash(&self, token_hash: &str) -> StoreResult<Option<TokenRow>> {
        let row = sqlx::query_as::<_, TokenRow>("SELECT * FROM api_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn create_token(&self, token: &TokenRow) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO api_tokens
                (token_id, user_id, org_id, token_hash, description, created_at, expires_at, revoked_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
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
        sqlx::query(
            "UPDATE api_tokens SET revoked_at = $1 WHERE token_id = $2 AND revoked_at IS NULL",
        )
        .bind(revoked_at)
        .bind(token_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn membership_role(&self, org_id: Uuid, user_id: Uuid) -> StoreResult<Option<String>> {
        let role = sqlx::query_scalar::<_, String>(
            "SELECT role FROM org_members WHERE org_id = $1 AND user_id = $2",
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
        sqlx::query("INSERT INTO organizations (org_id, name, created_at) VALUES ($1, $2, $3)")
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
            "INSERT INTO users (user_id, email, display_name, created_at) VALUES ($1, $2, $3, $4)",
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
            r#"
            INSERT INTO org_members (org_id, user_id, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (org_id, user_id) DO UPDATE SET role = EXCLUDED.role
            "#,
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
            r#"
            INSERT INTO board_permissions (board_id, user_id, org_id, level)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (board_id, user_id) DO UPDATE SET level = EXCLUDED.level
            "#,
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
            r#"
            INSERT INTO bootstrap_state (id, bootstrap_token_id, bootstrap_org_id, bootstrap_user_id)
            VALUES (1, $1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET
                bootstrap_token_id = EXCLUDED.bootstrap_token_id,
                bootstrap_org_id = EXCLUDED.bootstrap_org_id,
                bootstrap_user_id = EXCLUDED.bootstrap_user_id
            "#,
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
            sqlx::query_scalar::<_, i64>("SELECT version FROM org_versions WHERE org_id = $1")
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
            r#"
            SELECT b.* FROM boards b
            JOIN board_permissions p ON p.board_id = b.board_id
            WHERE b.org_id = $1 AND p.user_id = $2 AND b.row_version > $3
            ORDER BY b.row_version
            "#,
        )
        .bind(org_id)
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        let columns = sqlx::query_as::<_, ColumnRow>(
            r#"
            SELECT c.* FROM board_columns c
            JOIN boards b ON b.board_id = c.board_id
            JOIN board_permissions p ON p.board_id = b.board_id
            WHERE b.org_id = $1 AND p.user_id = $2 AND b.deleted_at IS NULL
              AND c.row_version > $3
            ORDER BY c.row_version
            "#,
        )
        .bind(org_id)
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        let tasks = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT t.* FROM tasks t
            JOIN board_columns c ON c.column_id = t.column_id
            JOIN boards b ON b.board_id = c.board_id
            JOIN board_permissions p ON p.board_id = b.board_id
            WHERE b.org_id = $1 AND p.user_id = $2 AND b.deleted_at IS NULL
              AND t.row_version > $3
            ORDER BY t.row_version
            "#,
        )
        .bind(org_id)
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        let notes = sqlx::query_as::<_, NoteRow>(
            "SELECT * FROM notes WHERE org_id = $1 AND row_version > $2 ORDER BY row_version",
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
            r#"
            SELECT b.* FROM boards b
            JOIN board_permissions p ON p.board_id = b.board_id
            WHERE b.org_id = $1 AND p.user_id = $2 AND b.deleted_at IS NULL
            ORDER BY b.name
            "#,
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
            r#"
            SELECT p.level FROM board_permissions p
            JOIN boards b ON b.board_id = p.board_id
            WHERE b.org_id = $1 AND p.user_id = $2 AND p.board_id = $3
              AND b.deleted_at IS NULL
            "#,
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
            "SELECT * FROM boards WHERE org_id = $1 AND board_id = $2 AND deleted_at IS NULL",
        )
        .bind(org_id)
        .bind(board_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(board) = board else {
            return Ok(None);
        };

        let columns = sqlx::query_as::<_, ColumnRow>(
            "SELECT * FROM board_columns WHERE board_id = $1 ORDER BY position",
        )
        .bind(board_id)
        .fetch_all(&self.pool)
        .await?;

        let tasks = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT t.* FROM tasks t
            JOIN board_columns c ON c.column_id = t.column_id
            WHERE c.board_id = $1
            ORDER BY c.position, t.position
            "#,
        )
        .bind(board_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some((board, columns, tasks)))
    }

    async fn list_notes(&self, org_id: Uuid) -> StoreResult<Vec<NoteRow>> {
        let notes = sqlx::query_as::<_, NoteRow>(
            "SELECT * FROM notes WHERE org_id = $1 AND deleted_at IS NULL ORDER BY updated_at DESC",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(notes)
    }
}

/// One open PostgreSQL transaction.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PostgresTx {
    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }

    async fn savepoint(&mut self, name: &str) -> StoreResult<()> {
        crate::sqlite::check_savepoint_name(name)?;
        sqlx::query(&format!("SAVEPOINT {name}"))
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn rollback_to_savepoint(&mut self, name: &str) -> StoreResult<()> {
        crate::sqlite::check_savepoint_name(name)?;
        sqlx::query(&format!("ROLLBACK TO SAVEPOINT {name}"))
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn release_savepoint(&mut self, name: &str) -> StoreResult<()> {
        crate::sqlite::check_savepoint_name(name)?;
        sqlx::query(&format!("RELEASE SAVEPOINT {name}"))
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn lock_org_version(&mut self, org_id: Uuid) -> StoreResult<i64> {
        sqlx::query(
            "INSERT INTO org_versions (org_id, version) VALUES ($1, 0) \
             ON CONFLICT (org_id) DO NOTHING",
        )
        .bind(org_id)
        .execute(&mut *self.tx)
        .await?;

        // Serializes concurrent pushes for the tenant until commit/rollback.
        let version = sqlx::query_scalar::<_, i64>(
            "SELECT version FROM org_versions WHERE org_id = $1 FOR UPDATE",
        )
        .bind(org_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(version)
    }

    async fn set_org_version(&mut self, org_id: Uuid, version: i64) -> StoreResult<()> {
        sqlx::query("UPDATE org_versions SET version = $1 WHERE org_id = $2")
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
            "SELECT * FROM replica_clients WHERE org_id = $1 AND client_id = $2",
        )
        .bind(org_id)
        .bind(client_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn upsert_replica_client(&mut self, row: &ReplicaClientRow) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO replica_clients
                (org_id, client_id, client_group_id, last_mutation_id, version, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (org_id, client_id) DO UPDATE SET
                client_group_id = EXCLUDED.client_group_id,
                last_mutation_id = EXCLUDED.last_mutation_id,
                version = EXCLUDED.version,
                updated_at = EXCLUDED.updated_at
            "#,
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
        let sql = match kind {
            ResourceKind::Board => {
                r#"
                SELECT board_id, board_id AS resolved_board_id FROM boards
                WHERE org_id = $1 AND deleted_at IS NULL AND board_id = ANY($2)
                "#
            }
            ResourceKind::Column => {
                r#"
                SELECT c.column_id, c.board_id FROM board_columns c
                JOIN boards b ON b.board_id = c.board_id
                WHERE b.org_id = $1 AND b.deleted_at IS NULL AND c.column_id = ANY($2)
                "#
            }
            ResourceKind::Task => {
                r#"
                SELECT t.task_id, c.board_id FROM tasks t
                JOIN board_columns c ON c.column_id = t.column_id
                JOIN boards b ON b.board_id = c.board_id
                WHERE b.org_id = $1 AND b.deleted_at IS NULL AND t.task_id = ANY($2)
                "#
            }
        };

        let rows = sqlx::query_as::<_, (Uuid, Uuid)>(sql)
            .bind(org_id)
            .bind(ids)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows)
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
        let rows = sqlx::query_as::<_, PermissionRow>(
            "SELECT * FROM board_permissions \
             WHERE org_id = $1 AND user_id = $2 AND board_id = ANY($3)",
        )
        .bind(org_id)
        .bind(user_id)
        .bind(board_ids)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn insert_permission(&mut self, permission: &PermissionRow) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO board_permissions (board_id, user_id, org_id, level) \
             VALUES ($1, $2, $3, $4)",
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
            r#"
            SELECT EXISTS(
                SELECT 1 FROM boards
                WHERE org_id = $1 AND name = $2 AND deleted_at IS NULL
                  AND ($3::UUID IS NULL OR board_id <> $3)
            )
            "#,
        )
        .bind(org_id)
        .bind(name)
        .bind(exclude_board_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn get_board(&mut self, org_id: Uuid, board_id: Uuid) -> StoreResult<Option<BoardRow>> {
        let row = sqlx::query_as::<_, BoardRow>(
            "SELECT * FROM boards WHERE org_id = $1 AND board_id = $2",
        )
        .bind(org_id)
        .bind(board_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn get_column(&mut self, column_id: Uuid) -> StoreResult<Option<ColumnRow>> {
        let row =
            sqlx::query_as::<_, ColumnRow>("SELECT * FROM board_columns WHERE column_id = $1")
                .bind(column_id)
                .fetch_optional(&mut *self.tx)
                .await?;
        Ok(row)
    }

    async fn get_task(&mut self, task_id: Uuid) -> StoreResult<Option<TaskRow>> {
        let row = sqlx::query_as::<_, TaskRow>("SELECT * FROM tasks WHERE task_id = $1")
            .bind(task_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn list_columns(&mut self, board_id: Uuid) -> StoreResult<Vec<ColumnRow>> {
        let rows = sqlx::query_as::<_, ColumnRow>(
            "SELECT * FROM board_columns WHERE board_id = $1 ORDER BY position",
        )
        .bind(board_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn list_tasks_in_column(&mut self, column_id: Uuid) -> StoreResult<Vec<TaskRow>> {
        let rows = sqlx::query_as::<_, TaskRow>(
            "SELECT * FROM tasks WHERE column_id = $1 ORDER BY position",
        )
        .bind(column_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn get_note(&mut self, org_id: Uuid, note_id: Uuid) -> StoreResult<Option<NoteRow>> {
        let row = sqlx::query_as::<_, NoteRow>(
            "SELECT * FROM notes WHERE org_id = $1 AND note_id = $2",
        )
        .bind(org_id)
        .bind(note_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn insert_board(&mut self, board: &BoardRow) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO boards
                (board_id, org_id, name, color, created_at, updated_at, deleted_at, row_version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
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
            "UPDATE boards SET name = $1, color = $2, updated_at = $3, row_version = $4 \
             WHERE board_id = $5",
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
            "UPDATE boards SET deleted_at = $1, updated_at = $1, row_version = $2 \
             WHERE board_id = $3",
        )
        .bind(deleted_at)
        .bind(row_version)
        .bind(board_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_column(&mut self, column: &ColumnRow) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO board_columns
                (column_id, board_id, name, position, created_at, updated_at, row_version)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
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
            "UPDATE board_columns SET name = $1, position = $2, updated_at = $3, \
             row_version = $4 WHERE column_id = $5",
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
        sqlx::query("DELETE FROM board_columns WHERE column_id = $1")
            .bind(column_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_task(&mut self, task: &TaskRow) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tasks
                (task_id, column_id, name, body, position, created_at, updated_at, row_version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
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
            "UPDATE tasks SET column_id = $1, name = $2, body = $3, position = $4, \
             updated_at = $5, row_version = $6 WHERE task_id = $7",
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
        sqlx::query("DELETE FROM tasks WHERE task_id = $1")
            .bind(task_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_note(&mut self, note: &NoteRow) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notes
                (note_id, org_id, title, body, created_at, updated_at, deleted_at, row_version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
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
            "UPDATE notes SET title = $1, body = $2, updated_at = $3, row_version = $4 \
             WHERE note_id = $5",
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
            "UPDATE notes SET deleted_at = $1, updated_at = $1, row_version = $2 \
             WHERE note_id = $3",
        )
        .bind(deleted_at)
        .bind(row_version)
        .bind(note_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }
}
