//! Resource access control.
//!
//! Permission rows exist per (board, user) only; column and task checks
//! resolve up to the owning board first. The batch form verifies that every
//! requested id resolves within the principal's tenant and that every owning
//! board carries a sufficient permission row. Any violation is reported as
//! the same `PermissionDenied`, so callers cannot probe for the existence of
//! resources they cannot see.
//!
//! Pure reads. Callers must run the check inside the same transaction as the
//! write it gates, otherwise a revocation can slip between check and write.

use crate::error::SyncError;
use std::collections::{BTreeSet, HashMap};
use tack_core::{OrgRole, PermissionLevel, Principal, ResourceKind};
use tack_store::StoreTx;
use uuid::Uuid;

/// Check that `principal` holds at least `required` on every resource in
/// `ids`. Duplicated ids are checked once.
pub async fn check_access(
    tx: &mut dyn StoreTx,
    principal: &Principal,
    kind: ResourceKind,
    ids: &[Uuid],
    required: PermissionLevel,
) -> Result<(), SyncError> {
    if ids.is_empty() {
        return Ok(());
    }

    let distinct: Vec<Uuid> = ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();

    // Resolution is tenant-scoped and skips soft-deleted boards, so a foreign
    // or deleted resource simply fails to resolve.
    let resolved = tx.resolve_boards(principal.org_id, kind, &distinct).await?;
    if resolved.len() != distinct.len() {
        return Err(SyncError::PermissionDenied);
    }

    let board_ids: Vec<Uuid> = resolved
        .iter()
        .map(|(_, board_id)| *board_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let rows = tx
        .permission_levels(principal.org_id, principal.user_id, &board_ids)
        .await?;
    let held: HashMap<Uuid, i64> = rows.into_iter().map(|row| (row.board_id, row.level)).collect();

    for board_id in &board_ids {
        match held.get(board_id) {
            Some(level) if *level >= required.ordinal() => {}
            _ => return Err(SyncError::PermissionDenied),
        }
    }

    Ok(())
}

/// Check an org-scoped operation against the principal's membership role.
pub fn require_role(principal: &Principal, required: OrgRole) -> Result<(), SyncError> {
    if principal.has_role(required) {
        Ok(())
    } else {
        Err(SyncError::PermissionDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tack_store::models::{BoardRow, ColumnRow, PermissionRow, TaskRow};
    use tack_store::{SqliteStore, Store};
    use time::OffsetDateTime;

    struct Fixture {
        store: SqliteStore,
        _dir: tempfile::TempDir,
        org_a: Uuid,
        org_b: Uuid,
        alice: Uuid,
        bob: Uuid,
        mallory: Uuid,
        board: Uuid,
        column: Uuid,
        task: Uuid,
    }

    fn principal(org_id: Uuid, user_id: Uuid) -> Principal {
        Principal {
            user_id,
            org_id,
            role: OrgRole::Member,
        }
    }

    async fn seed() -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteStore::new(dir.path().join("tack.db"))
            .await
            .expect("store");
        let now = OffsetDateTime::now_utc();

        let org_a = Uuid::new_v4();
        let org_b = Uuid::new_v4();
        store.create_org(org_a, "org-a", now).await.expect("org a");
        store.create_org(org_b, "org-b", now).await.expect("org b");

        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let mallory = Uuid::new_v4();
        for (id, email) in [(alice, "alice@a"), (bob, "bob@a"), (mallory, "mallory@b")] {
            store.create_user(id, email, email, now).await.expect("user");
        }

        let board = Uuid::new_v4();
        let column = Uuid::new_v4();
        let task = Uuid::new_v4();
        let mut tx = store.begin().await.expect("begin");
        tx.insert_board(&BoardRow {
            board_id: board,
            org_id: org_a,
            name: "Sprint".to_string(),
            color: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            row_version: 1,
        })
        .await
        .expect("board");
        tx.insert_column(&ColumnRow {
            column_id: column,
            board_id: board,
            name: "Todo".to_string(),
            position: 1000.0,
            created_at: now,
            updated_at: now,
            row_version: 1,
        })
        .await
        .expect("column");
        tx.insert_task(&TaskRow {
            task_id: task,
            column_id: column,
            name: "Write tests".to_string(),
            body: None,
            position: 1000.0,
            created_at: now,
            updated_at: now,
            row_version: 1,
        })
        .await
        .expect("task");
        tx.commit().await.expect("commit");

        // alice edits, bob only views. mallory holds a well-formed row for the
        // same board but scoped to her own org.
        for (user_id, org_id, level) in [
            (alice, org_a, PermissionLevel::Editor),
            (bob, org_a, PermissionLevel::Viewer),
            (mallory, org_b, PermissionLevel::Owner),
        ] {
            store
                .grant_board_permission(&PermissionRow {
                    board_id: board,
                    user_id,
                    org_id,
                    level: level.ordinal(),
                })
                .await
                .expect("grant");
        }

        Fixture {
            store,
            _dir: dir,
            org_a,
            org_b,
            alice,
            bob,
            mallory,
            board,
            column,
            task,
        }
    }

    #[tokio::test]
    async fn test_sufficient_level_passes() {
        let f = seed().await;
        let alice = principal(f.org_a, f.alice);
        let mut tx = f.store.begin().await.expect("begin");
        check_access(
            tx.as_mut(),
            &alice,
            ResourceKind::Board,
            &[f.board],
            PermissionLevel::Editor,
        )
        .await
        .expect("editor on board");
        tx.rollback().await.expect("rollback");
    }

    #[tokio::test]
    async fn test_insufficient_level_denied() {
        let f = seed().await;
        let bob = principal(f.org_a, f.bob);
        let mut tx = f.store.begin().await.expect("begin");
        let err = check_access(
            tx.as_mut(),
            &bob,
            ResourceKind::Board,
            &[f.board],
            PermissionLevel::Editor,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SyncError::PermissionDenied));
        tx.rollback().await.expect("rollback");
    }

    #[tokio::test]
    async fn test_column_and_task_resolve_to_board_permission() {
        let f = seed().await;
        let alice = principal(f.org_a, f.alice);
        let mut tx = f.store.begin().await.expect("begin");
        check_access(
            tx.as_mut(),
            &alice,
            ResourceKind::Column,
            &[f.column],
            PermissionLevel::Editor,
        )
        .await
        .expect("column resolves");
        check_access(
            tx.as_mut(),
            &alice,
            ResourceKind::Task,
            &[f.task, f.task],
            PermissionLevel::Editor,
        )
        .await
        .expect("duplicate task ids are checked once");
        tx.rollback().await.expect("rollback");
    }

    #[tokio::test]
    async fn test_batch_fails_as_a_whole() {
        let f = seed().await;
        let alice = principal(f.org_a, f.alice);
        let mut tx = f.store.begin().await.expect("begin");
        let err = check_access(
            tx.as_mut(),
            &alice,
            ResourceKind::Board,
            &[f.board, Uuid::new_v4()],
            PermissionLevel::Viewer,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SyncError::PermissionDenied));
        tx.rollback().await.expect("rollback");
    }

    #[tokio::test]
    async fn test_tenant_isolation() {
        let f = seed().await;
        // mallory has an owner-level row for the board, but her active org
        // differs from the board's org.
        let mallory = principal(f.org_b, f.mallory);
        let mut tx = f.store.begin().await.expect("begin");
        let err = check_access(
            tx.as_mut(),
            &mallory,
            ResourceKind::Board,
            &[f.board],
            PermissionLevel::Viewer,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SyncError::PermissionDenied));
        tx.rollback().await.expect("rollback");
    }

    #[tokio::test]
    async fn test_soft_deleted_board_stops_resolving() {
        let f = seed().await;
        let alice = principal(f.org_a, f.alice);
        let now = OffsetDateTime::now_utc();

        let mut tx = f.store.begin().await.expect("begin");
        tx.soft_delete_board(f.board, now, 2).await.expect("delete");
        let err = check_access(
            tx.as_mut(),
            &alice,
            ResourceKind::Board,
            &[f.board],
            PermissionLevel::Viewer,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SyncError::PermissionDenied));
        // Children stop resolving with it.
        let err = check_access(
            tx.as_mut(),
            &alice,
            ResourceKind::Task,
            &[f.task],
            PermissionLevel::Viewer,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SyncError::PermissionDenied));
        tx.rollback().await.expect("rollback");
    }

    #[test]
    fn test_require_role() {
        let admin = Principal {
            user_id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            role: OrgRole::Admin,
        };
        assert!(require_role(&admin, OrgRole::Member).is_ok());
        assert!(require_role(&admin, OrgRole::Admin).is_ok());
        assert!(require_role(&admin, OrgRole::Owner).is_err());
    }
}
