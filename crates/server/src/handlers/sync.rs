//! Sync protocol handlers: mutation push and incremental pull.

use crate::auth::require_auth;
use crate::error::{ApiError, ApiResult};
use crate::metrics::{
    PULLS_TOTAL, PUSH_BATCH_SIZE, PUSH_DURATION, PUSHES_TOTAL, record_mutation_outcome,
};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Query, Request, State};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tack_core::{PushRequest, PushResponse};
use tack_store::models::{BoardRow, ColumnRow, NoteRow, TaskRow};
use time::OffsetDateTime;
use uuid::Uuid;

/// Maximum request body size for push requests (4 MiB).
///
/// A full batch of 256 mutations with generous argument payloads fits well
/// under this. If running behind a reverse proxy, ensure the proxy's body
/// size limit is >= this value to avoid inconsistent 413 responses.
const MAX_PUSH_BODY_SIZE: usize = 4 * 1024 * 1024;

/// POST /sync/push - Apply a batch of mutations.
pub async fn push(State(state): State<AppState>, req: Request) -> ApiResult<Json<PushResponse>> {
    let auth = require_auth(&req)?.clone();

    let body: PushRequest = {
        let bytes = axum::body::to_bytes(req.into_body(), MAX_PUSH_BODY_SIZE)
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read body: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::BadRequest(format!("invalid JSON: {e}")))?
    };

    PUSHES_TOTAL.inc();
    PUSH_BATCH_SIZE.observe(body.mutations.len() as f64);

    let start = Instant::now();
    let response = state.engine.apply_batch(&auth.principal, &body).await?;
    PUSH_DURATION.observe(start.elapsed().as_secs_f64());

    for outcome in &response.outcomes {
        record_mutation_outcome(outcome.outcome);
    }

    // profileID is opaque: logged for correlation, never interpreted.
    tracing::debug!(
        client_group_id = %body.client_group_id,
        profile_id = ?body.profile_id,
        mutations = body.mutations.len(),
        server_version = response.server_version,
        "push processed"
    );

    Ok(Json(response))
}

/// Query parameters for pull.
#[derive(Debug, Deserialize)]
pub struct PullParams {
    /// Server version cursor; rows stamped after it are returned.
    #[serde(default)]
    pub since: i64,
}

/// Incremental pull response.
#[derive(Debug, Serialize)]
pub struct PullResponse {
    #[serde(rename = "serverVersion")]
    pub server_version: i64,
    pub boards: Vec<BoardChange>,
    pub columns: Vec<ColumnChange>,
    pub tasks: Vec<TaskChange>,
    pub notes: Vec<NoteChange>,
}

/// A board row in a pull response. Soft-deleted boards appear with
/// `deleted: true` so clients can evict them.
#[derive(Debug, Serialize)]
pub struct BoardChange {
    pub id: Uuid,
    pub name: String,
    pub color: Option<String>,
    #[serde(rename = "updatedAt", with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub deleted: bool,
    #[serde(rename = "rowVersion")]
    pub row_version: i64,
}

impl From<BoardRow> for BoardChange {
    fn from(row: BoardRow) -> Self {
        Self {
            id: row.board_id,
            name: row.name,
            color: row.color,
            updated_at: row.updated_at,
            deleted: row.deleted_at.is_some(),
            row_version: row.row_version,
        }
    }
}

/// A column row in a pull response. Columns are hard-deleted; a deleted
/// column simply stops appearing.
#[derive(Debug, Serialize)]
pub struct ColumnChange {
    pub id: Uuid,
    #[serde(rename = "boardID")]
    pub board_id: Uuid,
    pub name: String,
    pub position: f64,
    #[serde(rename = "updatedAt", with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(rename = "rowVersion")]
    pub row_version: i64,
}

impl From<ColumnRow> for ColumnChange {
    fn from(row: ColumnRow) -> Self {
        Self {
            id: row.column_id,
            board_id: row.board_id,
            name: row.name,
            position: row.position,
            updated_at: row.updated_at,
            row_version: row.row_version,
        }
    }
}

/// A task row in a pull response.
#[derive(Debug, Serialize)]
pub struct TaskChange {
    pub id: Uuid,
    #[serde(rename = "columnID")]
    pub column_id: Uuid,
    pub name: String,
    pub body: Option<String>,
    pub position: f64,
    #[serde(rename = "updatedAt", with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(rename = "rowVersion")]
    pub row_version: i64,
}

impl From<TaskRow> for TaskChange {
    fn from(row: TaskRow) -> Self {
        Self {
            id: row.task_id,
            column_id: row.column_id,
            name: row.name,
            body: row.body,
            position: row.position,
            updated_at: row.updated_at,
            row_version: row.row_version,
        }
    }
}

/// A note row in a pull response.
#[derive(Debug, Serialize)]
pub struct NoteChange {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    #[serde(rename = "updatedAt", with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub deleted: bool,
    #[serde(rename = "rowVersion")]
    pub row_version: i64,
}

impl From<NoteRow> for NoteChange {
    fn from(row: NoteRow) -> Self {
        Self {
            id: row.note_id,
            title: row.title,
            body: row.body,
            updated_at: row.updated_at,
            deleted: row.deleted_at.is_some(),
            row_version: row.row_version,
        }
    }
}

/// GET /sync/pull?since=<version> - Changes visible to the caller since a
/// version cursor.
pub async fn pull(
    State(state): State<AppState>,
    Query(params): Query<PullParams>,
    req: Request,
) -> ApiResult<Json<PullResponse>> {
    let auth = require_auth(&req)?;
    let principal = &auth.principal;

    PULLS_TOTAL.inc();

    // Read the version before the rows. A push committing between the two
    // reads yields rows stamped past the reported version; the client's next
    // pull re-fetches them instead of skipping them.
    let server_version = state.store.current_version(principal.org_id).await?;
    let changes = state
        .store
        .changes_since(principal.org_id, principal.user_id, params.since)
        .await?;

    Ok(Json(PullResponse {
        server_version,
        boards: changes.boards.into_iter().map(BoardChange::from).collect(),
        columns: changes.columns.into_iter().map(ColumnChange::from).collect(),
        tasks: changes.tasks.into_iter().map(TaskChange::from).collect(),
        notes: changes.notes.into_iter().map(NoteChange::from).collect(),
    }))
}
