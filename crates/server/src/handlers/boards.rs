//! Read-only board endpoints for poll-based clients.

use crate::auth::require_auth;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Request, State};
use serde::Serialize;
use tack_store::models::BoardRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Board list entry.
#[derive(Debug, Serialize)]
pub struct BoardSummary {
    pub id: Uuid,
    pub name: String,
    pub color: Option<String>,
    #[serde(rename = "updatedAt", with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<BoardRow> for BoardSummary {
    fn from(row: BoardRow) -> Self {
        Self {
            id: row.board_id,
            name: row.name,
            color: row.color,
            updated_at: row.updated_at,
        }
    }
}

/// GET /api/boards - Live boards the caller holds a permission on.
pub async fn list_boards(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<Vec<BoardSummary>>> {
    let auth = require_auth(&req)?;
    let boards = state
        .store
        .list_boards_for_user(auth.principal.org_id, auth.principal.user_id)
        .await?;
    Ok(Json(boards.into_iter().map(BoardSummary::from).collect()))
}

/// Board detail with columns and their tasks, both ordered by position.
#[derive(Debug, Serialize)]
pub struct BoardDetailResponse {
    pub id: Uuid,
    pub name: String,
    pub color: Option<String>,
    #[serde(rename = "updatedAt", with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub columns: Vec<ColumnDetail>,
}

#[derive(Debug, Serialize)]
pub struct ColumnDetail {
    pub id: Uuid,
    pub name: String,
    pub position: f64,
    pub tasks: Vec<TaskDetail>,
}

#[derive(Debug, Serialize)]
pub struct TaskDetail {
    pub id: Uuid,
    pub name: String,
    pub body: Option<String>,
    pub position: f64,
}

/// GET /api/boards/{board_id} - Board with columns and tasks.
///
/// A missing board and a board the caller holds no permission on are
/// indistinguishable: both return 404.
pub async fn get_board(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
    req: Request,
) -> ApiResult<Json<BoardDetailResponse>> {
    let auth = require_auth(&req)?;
    let principal = &auth.principal;

    let level = state
        .store
        .board_permission_level(principal.org_id, principal.user_id, board_id)
        .await?;
    if level.is_none() {
        return Err(ApiError::NotFound("board not found".to_string()));
    }

    let (board, columns, tasks) = state
        .store
        .board_detail(principal.org_id, board_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("board not found".to_string()))?;

    let mut columns_out: Vec<ColumnDetail> = columns
        .into_iter()
        .map(|column| ColumnDetail {
            id: column.column_id,
            name: column.name,
            position: column.position,
            tasks: Vec::new(),
        })
        .collect();
    for task in tasks {
        if let Some(column) = columns_out.iter_mut().find(|c| c.id == task.column_id) {
            column.tasks.push(TaskDetail {
                id: task.task_id,
                name: task.name,
                body: task.body,
                position: task.position,
            });
        }
    }

    Ok(Json(BoardDetailResponse {
        id: board.board_id,
        name: board.name,
        color: board.color,
        updated_at: board.updated_at,
        columns: columns_out,
    }))
}
