//! Named mutation handlers.
//!
//! `dispatch` maps a mutation name to its handler. Every handler runs inside
//! the caller's transaction: it checks access first, then performs its
//! writes, stamping `updated_at` and `row_version` so incremental pull can
//! pick the rows up. An unknown name is a protocol violation, not a business
//! error.

use crate::access::{check_access, require_role};
use crate::error::{SyncError, validation};
use serde::Deserialize;
use serde_json::Value;
use tack_core::position::{allocate, needs_rebalance, renumbered_position};
use tack_core::{OrgRole, PermissionLevel, Principal, ResourceKind};
use tack_store::models::{BoardRow, ColumnRow, NoteRow, PermissionRow, TaskRow};
use tack_store::{StoreError, StoreTx};
use time::OffsetDateTime;
use uuid::Uuid;

/// Per-mutation context handed to handlers by the batch coordinator.
#[derive(Clone, Debug)]
pub struct MutationCtx {
    /// The authenticated actor.
    pub principal: Principal,
    /// The version this mutation will advance the tenant to if applied;
    /// stamped into `row_version` on every written row.
    pub next_version: i64,
    /// Timestamp for `created_at`/`updated_at` stamps.
    pub now: OffsetDateTime,
    /// Fractional-index gap below which a sibling list is renumbered.
    pub position_epsilon: f64,
}

/// Apply one named mutation.
pub async fn dispatch(
    tx: &mut dyn StoreTx,
    ctx: &MutationCtx,
    name: &str,
    args: &Value,
) -> Result<(), SyncError> {
    match name {
        "createBoard" => create_board(tx, ctx, parse_args(args)?).await,
        "updateBoard" => update_board(tx, ctx, parse_args(args)?).await,
        "deleteBoard" => delete_board(tx, ctx, parse_args(args)?).await,
        "createColumn" => create_column(tx, ctx, parse_args(args)?).await,
        "updateColumn" => update_column(tx, ctx, parse_args(args)?).await,
        "moveColumn" => move_column(tx, ctx, parse_args(args)?).await,
        "deleteColumn" => delete_column(tx, ctx, parse_args(args)?).await,
        "createTask" => create_task(tx, ctx, parse_args(args)?).await,
        "updateTaskName" => update_task_name(tx, ctx, parse_args(args)?).await,
        "moveTask" => move_task(tx, ctx, parse_args(args)?).await,
        "deleteTask" => delete_task(tx, ctx, parse_args(args)?).await,
        "createNote" => create_note(tx, ctx, parse_args(args)?).await,
        "updateNote" => update_note(tx, ctx, parse_args(args)?).await,
        "deleteNote" => delete_note(tx, ctx, parse_args(args)?).await,
        _ => Err(SyncError::UnknownMutationName {
            name: name.to_string(),
        }),
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(args: &Value) -> Result<T, SyncError> {
    serde_json::from_value(args.clone())
        .map_err(|err| validation(format!("malformed arguments: {err}")))
}

fn non_empty(value: &str, what: &str) -> Result<String, SyncError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(validation(format!("{what} must not be empty")));
    }
    Ok(trimmed.to_string())
}

/// Map a primary-key collision (client resent a create with a fresh mutation
/// id, or picked a colliding id) to a business rejection instead of an
/// infrastructure error.
fn reject_duplicate_id(result: Result<(), StoreError>, what: &str) -> Result<(), SyncError> {
    match result {
        Err(err) if err.is_unique_violation() => Err(validation(format!("duplicate {what}"))),
        other => Ok(other?),
    }
}

// --- boards ---

#[derive(Debug, Deserialize)]
struct CreateBoardArgs {
    id: Uuid,
    name: String,
    #[serde(default)]
    color: Option<String>,
}

async fn create_board(
    tx: &mut dyn StoreTx,
    ctx: &MutationCtx,
    args: CreateBoardArgs,
) -> Result<(), SyncError> {
    require_role(&ctx.principal, OrgRole::Member)?;
    let name = non_empty(&args.name, "board name")?;
    if tx
        .board_name_exists(ctx.principal.org_id, &name, None)
        .await?
    {
        return Err(validation(format!("a board named {name:?} already exists")));
    }

    reject_duplicate_id(
        tx.insert_board(&BoardRow {
            board_id: args.id,
            org_id: ctx.principal.org_id,
            name,
            color: args.color,
            created_at: ctx.now,
            updated_at: ctx.now,
            deleted_at: None,
            row_version: ctx.next_version,
        })
        .await,
        "board id",
    )?;

    // The creator owns the board.
    tx.insert_permission(&PermissionRow {
        board_id: args.id,
        user_id: ctx.principal.user_id,
        org_id: ctx.principal.org_id,
        level: PermissionLevel::Owner.ordinal(),
    })
    .await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct UpdateBoardArgs {
    id: Uuid,
    name: String,
    #[serde(default)]
    color: Option<String>,
}

async fn update_board(
    tx: &mut dyn StoreTx,
    ctx: &MutationCtx,
    args: UpdateBoardArgs,
) -> Result<(), SyncError> {
    check_access(
        tx,
        &ctx.principal,
        ResourceKind::Board,
        &[args.id],
        PermissionLevel::Editor,
    )
    .await?;
    let name = non_empty(&args.name, "board name")?;
    if tx
        .board_name_exists(ctx.principal.org_id, &name, Some(args.id))
        .await?
    {
        return Err(validation(format!("a board named {name:?} already exists")));
    }

    let Some(mut board) = tx.get_board(ctx.principal.org_id, args.id).await? else {
        return Err(SyncError::PermissionDenied);
    };
    board.name = name;
    board.color = args.color;
    board.updated_at = ctx.now;
    board.row_version = ctx.next_version;
    tx.update_board(&board).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct IdArgs {
    id: Uuid,
}

async fn delete_board(
    tx: &mut dyn StoreTx,
    ctx: &MutationCtx,
    args: IdArgs,
) -> Result<(), SyncError> {
    check_access(
        tx,
        &ctx.principal,
        ResourceKind::Board,
        &[args.id],
        PermissionLevel::Admin,
    )
    .await?;
    tx.soft_delete_board(args.id, ctx.now, ctx.next_version)
        .await?;
    Ok(())
}

// --- columns ---

#[derive(Debug, Deserialize)]
struct CreateColumnArgs {
    id: Uuid,
    #[serde(rename = "boardID")]
    board_id: Uuid,
    name: String,
    #[serde(rename = "beforeColumnID", default)]
    before_column_id: Option<Uuid>,
    #[serde(rename = "afterColumnID", default)]
    after_column_id: Option<Uuid>,
}

async fn create_column(
    tx: &mut dyn StoreTx,
    ctx: &MutationCtx,
    args: CreateColumnArgs,
) -> Result<(), SyncError> {
    check_access(
        tx,
        &ctx.principal,
        ResourceKind::Board,
        &[args.board_id],
        PermissionLevel::Editor,
    )
    .await?;
    let name = non_empty(&args.name, "column name")?;
    let position = allocate_column_position(
        tx,
        ctx,
        args.board_id,
        None,
        args.before_column_id,
        args.after_column_id,
    )
    .await?;

    reject_duplicate_id(
        tx.insert_column(&ColumnRow {
            column_id: args.id,
            board_id: args.board_id,
            name,
            position,
            created_at: ctx.now,
            updated_at: ctx.now,
            row_version: ctx.next_version,
        })
        .await,
        "column id",
    )
}

#[derive(Debug, Deserialize)]
struct UpdateColumnArgs {
    id: Uuid,
    name: String,
}

async fn update_column(
    tx: &mut dyn StoreTx,
    ctx: &MutationCtx,
    args: UpdateColumnArgs,
) -> Result<(), SyncError> {
    check_access(
        tx,
        &ctx.principal,
        ResourceKind::Column,
        &[args.id],
        PermissionLevel::Editor,
    )
    .await?;
    let name = non_empty(&args.name, "column name")?;

    let Some(mut column) = tx.get_column(args.id).await? else {
        return Err(SyncError::PermissionDenied);
    };
    column.name = name;
    column.updated_at = ctx.now;
    column.row_version = ctx.next_version;
    tx.update_column(&column).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct MoveColumnArgs {
    id: Uuid,
    #[serde(rename = "beforeColumnID", default)]
    before_column_id: Option<Uuid>,
    #[serde(rename = "afterColumnID", default)]
    after_column_id: Option<Uuid>,
}

async fn move_column(
    tx: &mut dyn StoreTx,
    ctx: &MutationCtx,
    args: MoveColumnArgs,
) -> Result<(), SyncError> {
    if args.before_column_id == Some(args.id) || args.after_column_id == Some(args.id) {
        return Err(validation("a column cannot neighbor itself"));
    }
    let mut ids = vec![args.id];
    ids.extend(args.before_column_id);
    ids.extend(args.after_column_id);
    check_access(
        tx,
        &ctx.principal,
        ResourceKind::Column,
        &ids,
        PermissionLevel::Editor,
    )
    .await?;

    let Some(mut column) = tx.get_column(args.id).await? else {
        return Err(SyncError::PermissionDenied);
    };
    column.position = allocate_column_position(
        tx,
        ctx,
        column.board_id,
        Some(args.id),
        args.before_column_id,
        args.after_column_id,
    )
    .await?;
    column.updated_at = ctx.now;
    column.row_version = ctx.next_version;
    tx.update_column(&column).await?;
    Ok(())
}

async fn delete_column(
    tx: &mut dyn StoreTx,
    ctx: &MutationCtx,
    args: IdArgs,
) -> Result<(), SyncError> {
    check_access(
        tx,
        &ctx.principal,
        ResourceKind::Column,
        &[args.id],
        PermissionLevel::Editor,
    )
    .await?;
    tx.delete_column(args.id).await?;
    Ok(())
}

// --- tasks ---

#[derive(Debug, Deserialize)]
struct CreateTaskArgs {
    id: Uuid,
    #[serde(rename = "columnID")]
    column_id: Uuid,
    name: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(rename = "beforeTaskID", default)]
    before_task_id: Option<Uuid>,
    #[serde(rename = "afterTaskID", default)]
    after_task_id: Option<Uuid>,
}

async fn create_task(
    tx: &mut dyn StoreTx,
    ctx: &MutationCtx,
    args: CreateTaskArgs,
) -> Result<(), SyncError> {
    check_access(
        tx,
        &ctx.principal,
        ResourceKind::Column,
        &[args.column_id],
        PermissionLevel::Editor,
    )
    .await?;
    let name = non_empty(&args.name, "task name")?;
    let position = allocate_task_position(
        tx,
        ctx,
        args.column_id,
        None,
        args.before_task_id,
        args.after_task_id,
    )
    .await?;

    reject_duplicate_id(
        tx.insert_task(&TaskRow {
            task_id: args.id,
            column_id: args.column_id,
            name,
            body: args.body,
            position,
            created_at: ctx.now,
            updated_at: ctx.now,
            row_version: ctx.next_version,
        })
        .await,
        "task id",
    )
}

#[derive(Debug, Deserialize)]
struct UpdateTaskNameArgs {
    id: Uuid,
    name: String,
}

async fn update_task_name(
    tx: &mut dyn StoreTx,
    ctx: &MutationCtx,
    args: UpdateTaskNameArgs,
) -> Result<(), SyncError> {
    check_access(
        tx,
        &ctx.principal,
        ResourceKind::Task,
        &[args.id],
        PermissionLevel::Editor,
    )
    .await?;
    let name = non_empty(&args.name, "task name")?;

    let Some(mut task) = tx.get_task(args.id).await? else {
        return Err(SyncError::PermissionDenied);
    };
    task.name = name;
    task.updated_at = ctx.now;
    task.row_version = ctx.next_version;
    tx.update_task(&task).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct MoveTaskArgs {
    id: Uuid,
    #[serde(rename = "columnID")]
    column_id: Uuid,
    #[serde(rename = "beforeTaskID", default)]
    before_task_id: Option<Uuid>,
    #[serde(rename = "afterTaskID", default)]
    after_task_id: Option<Uuid>,
}

async fn move_task(
    tx: &mut dyn StoreTx,
    ctx: &MutationCtx,
    args: MoveTaskArgs,
) -> Result<(), SyncError> {
    if args.before_task_id == Some(args.id) || args.after_task_id == Some(args.id) {
        return Err(validation("a task cannot neighbor itself"));
    }
    let mut task_ids = vec![args.id];
    task_ids.extend(args.before_task_id);
    task_ids.extend(args.after_task_id);
    check_access(
        tx,
        &ctx.principal,
        ResourceKind::Task,
        &task_ids,
        PermissionLevel::Editor,
    )
    .await?;
    // Cross-column moves also need edit access on the destination.
    check_access(
        tx,
        &ctx.principal,
        ResourceKind::Column,
        &[args.column_id],
        PermissionLevel::Editor,
    )
    .await?;

    let Some(mut task) = tx.get_task(args.id).await? else {
        return Err(SyncError::PermissionDenied);
    };
    task.position = allocate_task_position(
        tx,
        ctx,
        args.column_id,
        Some(args.id),
        args.before_task_id,
        args.after_task_id,
    )
    .await?;
    task.column_id = args.column_id;
    task.updated_at = ctx.now;
    task.row_version = ctx.next_version;
    tx.update_task(&task).await?;
    Ok(())
}

async fn delete_task(
    tx: &mut dyn StoreTx,
    ctx: &MutationCtx,
    args: IdArgs,
) -> Result<(), SyncError> {
    check_access(
        tx,
        &ctx.principal,
        ResourceKind::Task,
        &[args.id],
        PermissionLevel::Editor,
    )
    .await?;
    tx.delete_task(args.id).await?;
    Ok(())
}

// --- notes ---

#[derive(Debug, Deserialize)]
struct CreateNoteArgs {
    id: Uuid,
    title: String,
    #[serde(default)]
    body: Option<String>,
}

async fn create_note(
    tx: &mut dyn StoreTx,
    ctx: &MutationCtx,
    args: CreateNoteArgs,
) -> Result<(), SyncError> {
    require_role(&ctx.principal, OrgRole::Member)?;
    let title = non_empty(&args.title, "note title")?;

    reject_duplicate_id(
        tx.insert_note(&NoteRow {
            note_id: args.id,
            org_id: ctx.principal.org_id,
            title,
            body: args.body.unwrap_or_default(),
            created_at: ctx.now,
            updated_at: ctx.now,
            deleted_at: None,
            row_version: ctx.next_version,
        })
        .await,
        "note id",
    )
}

#[derive(Debug, Deserialize)]
struct UpdateNoteArgs {
    id: Uuid,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    body: Option<String>,
}

async fn update_note(
    tx: &mut dyn StoreTx,
    ctx: &MutationCtx,
    args: UpdateNoteArgs,
) -> Result<(), SyncError> {
    require_role(&ctx.principal, OrgRole::Member)?;
    let note = tx.get_note(ctx.principal.org_id, args.id).await?;
    let Some(mut note) = note.filter(|n| n.deleted_at.is_none()) else {
        return Err(validation("note not found"));
    };

    if let Some(title) = args.title {
        note.title = non_empty(&title, "note title")?;
    }
    if let Some(body) = args.body {
        note.body = body;
    }
    note.updated_at = ctx.now;
    note.row_version = ctx.next_version;
    tx.update_note(&note).await?;
    Ok(())
}

async fn delete_note(
    tx: &mut dyn StoreTx,
    ctx: &MutationCtx,
    args: IdArgs,
) -> Result<(), SyncError> {
    require_role(&ctx.principal, OrgRole::Admin)?;
    let note = tx.get_note(ctx.principal.org_id, args.id).await?;
    if note.filter(|n| n.deleted_at.is_none()).is_none() {
        return Err(validation("note not found"));
    }
    tx.soft_delete_note(args.id, ctx.now, ctx.next_version)
        .await?;
    Ok(())
}

// --- fractional positioning ---

/// Compute the position for a column placed on `board_id`. `moving` excludes
/// the repositioned column from its own neighbor computation. With no
/// neighbor args the column is appended at the tail. When the gap between
/// the neighbors has underflowed, the whole sibling list is renumbered first.
async fn allocate_column_position(
    tx: &mut dyn StoreTx,
    ctx: &MutationCtx,
    board_id: Uuid,
    moving: Option<Uuid>,
    before_id: Option<Uuid>,
    after_id: Option<Uuid>,
) -> Result<f64, SyncError> {
    let mut siblings = tx.list_columns(board_id).await?;
    if let Some(moving) = moving {
        siblings.retain(|c| c.column_id != moving);
    }

    let neighbors = |siblings: &[ColumnRow]| -> Result<(Option<f64>, Option<f64>), SyncError> {
        if before_id.is_none() && after_id.is_none() {
            return Ok((siblings.last().map(|c| c.position), None));
        }
        let find = |id: Uuid| {
            siblings
                .iter()
                .find(|c| c.column_id == id)
                .map(|c| c.position)
                .ok_or_else(|| validation("neighbor is not a column of the target board"))
        };
        Ok((
            before_id.map(find).transpose()?,
            after_id.map(find).transpose()?,
        ))
    };

    let (before, after) = neighbors(&siblings)?;
    if needs_rebalance(before, after, ctx.position_epsilon) {
        for (index, column) in siblings.iter_mut().enumerate() {
            column.position = renumbered_position(index);
            column.updated_at = ctx.now;
            column.row_version = ctx.next_version;
            tx.update_column(column).await?;
        }
        tracing::info!(
            board_id = %board_id,
            columns = siblings.len(),
            "renumbered column positions after fractional-index underflow"
        );
        let (before, after) = neighbors(&siblings)?;
        return Ok(allocate(before, after));
    }
    Ok(allocate(before, after))
}

/// Task analogue of [`allocate_column_position`], over the destination
/// column's task list.
async fn allocate_task_position(
    tx: &mut dyn StoreTx,
    ctx: &MutationCtx,
    column_id: Uuid,
    moving: Option<Uuid>,
    before_id: Option<Uuid>,
    after_id: Option<Uuid>,
) -> Result<f64, SyncError> {
    let mut siblings = tx.list_tasks_in_column(column_id).await?;
    if let Some(moving) = moving {
        siblings.retain(|t| t.task_id != moving);
    }

    let neighbors = |siblings: &[TaskRow]| -> Result<(Option<f64>, Option<f64>), SyncError> {
        if before_id.is_none() && after_id.is_none() {
            return Ok((siblings.last().map(|t| t.position), None));
        }
        let find = |id: Uuid| {
            siblings
                .iter()
                .find(|t| t.task_id == id)
                .map(|t| t.position)
                .ok_or_else(|| validation("neighbor is not a task of the target column"))
        };
        Ok((
            before_id.map(find).transpose()?,
            after_id.map(find).transpose()?,
        ))
    };

    let (before, after) = neighbors(&siblings)?;
    if needs_rebalance(before, after, ctx.position_epsilon) {
        for (index, task) in siblings.iter_mut().enumerate() {
            task.position = renumbered_position(index);
            task.updated_at = ctx.now;
            task.row_version = ctx.next_version;
            tx.update_task(task).await?;
        }
        tracing::info!(
            column_id = %column_id,
            tasks = siblings.len(),
            "renumbered task positions after fractional-index underflow"
        );
        let (before, after) = neighbors(&siblings)?;
        return Ok(allocate(before, after));
    }
    Ok(allocate(before, after))
}
