//! Read-only note endpoints.

use crate::auth::require_auth;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Request, State};
use serde::Serialize;
use tack_store::models::NoteRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Note list entry.
#[derive(Debug, Serialize)]
pub struct NoteResponse {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    #[serde(rename = "updatedAt", with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<NoteRow> for NoteResponse {
    fn from(row: NoteRow) -> Self {
        Self {
            id: row.note_id,
            title: row.title,
            body: row.body,
            updated_at: row.updated_at,
        }
    }
}

/// GET /api/notes - Live notes in the caller's organization, newest first.
pub async fn list_notes(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<Vec<NoteResponse>>> {
    let auth = require_auth(&req)?;
    let notes = state.store.list_notes(auth.principal.org_id).await?;
    Ok(Json(notes.into_iter().map(NoteResponse::from).collect()))
}
