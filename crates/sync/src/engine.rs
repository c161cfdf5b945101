//! Batch coordinator and mutation log applier.
//!
//! A push is an ordered batch of mutations from one client group. Each
//! mutation runs in its own transaction: the tenant's version row is locked,
//! the client's sequence position is classified (duplicate, in-order, or
//! from the future), and in-order mutations are dispatched under a savepoint
//! so a business rejection rolls back the handler's writes while the
//! sequencing bookkeeping still commits.
//!
//! Sequencing rules, per client:
//! - `id < last + 1`: redelivery of an already-applied mutation; skipped
//!   without side effects.
//! - `id > last + 1`: the client is ahead of the server's bookkeeping;
//!   fatal, processing stops, the client must fully resync.
//! - `id == last + 1`: applied. On success `last_mutation_id` and the tenant
//!   version advance together. On a business rejection the mutation id is
//!   still consumed (the client must not replay it) but the version does not
//!   move, since no state changed.

use crate::dispatch::{MutationCtx, dispatch};
use crate::error::{SyncError, validation};
use std::sync::Arc;
use tack_core::config::SyncConfig;
use tack_core::{
    DEFAULT_MAX_BATCH_SIZE, DEFAULT_POSITION_EPSILON, MutationEnvelope, MutationOutcome,
    Principal, PushRequest, PushResponse,
};
use tack_store::models::ReplicaClientRow;
use tack_store::{Store, StoreTx};
use time::OffsetDateTime;

const MUTATION_SAVEPOINT: &str = "mutation_body";

/// Tunables for the batch coordinator.
#[derive(Clone, Copy, Debug)]
pub struct SyncOptions {
    /// Pushes with more mutations than this are refused outright.
    pub max_batch_size: usize,
    /// Fractional-index gap below which sibling lists are renumbered.
    pub position_epsilon: f64,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            position_epsilon: DEFAULT_POSITION_EPSILON,
        }
    }
}

impl From<&SyncConfig> for SyncOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            max_batch_size: config.max_batch_size,
            position_epsilon: config.position_epsilon,
        }
    }
}

/// How one mutation's transaction should be concluded.
enum Disposition {
    /// Handler succeeded; commit everything.
    Applied,
    /// Already applied by an earlier push; nothing to commit.
    Duplicate,
    /// Business rejection; handler writes were rolled back to the savepoint,
    /// only the sequencing bookkeeping commits.
    Rejected(SyncError),
    /// Protocol violation; roll back and stop the batch.
    Fatal(SyncError),
}

/// Applies pushed mutation batches against the store.
pub struct SyncEngine {
    store: Arc<dyn Store>,
    opts: SyncOptions,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn Store>, opts: SyncOptions) -> Self {
        Self { store, opts }
    }

    /// Apply a push. Returns per-mutation outcomes in submission order, up to
    /// and including the first fatal outcome, plus the tenant version after
    /// the batch.
    ///
    /// A store failure fails the push as a whole; mutations already committed
    /// stay committed, and the client's retry of the batch is absorbed as
    /// duplicates.
    pub async fn apply_batch(
        &self,
        principal: &Principal,
        request: &PushRequest,
    ) -> Result<PushResponse, SyncError> {
        if request.mutations.len() > self.opts.max_batch_size {
            return Err(SyncError::BatchTooLarge {
                limit: self.opts.max_batch_size,
                got: request.mutations.len(),
            });
        }
        request
            .validate_ids()
            .map_err(|err| validation(err.to_string()))?;

        let mut outcomes = Vec::with_capacity(request.mutations.len());
        for mutation in &request.mutations {
            let (outcome, stop) = self
                .apply_one(principal, &request.client_group_id, mutation)
                .await?;
            outcomes.push(outcome);
            if stop {
                break;
            }
        }

        let server_version = self.store.current_version(principal.org_id).await?;
        Ok(PushResponse {
            server_version,
            outcomes,
        })
    }

    async fn apply_one(
        &self,
        principal: &Principal,
        client_group_id: &str,
        mutation: &MutationEnvelope,
    ) -> Result<(MutationOutcome, bool), SyncError> {
        let mut tx = self.store.begin().await?;
        let disposition = match self
            .run_mutation(tx.as_mut(), principal, client_group_id, mutation)
            .await
        {
            Ok(disposition) => disposition,
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback after store failure also failed");
                }
                return Err(err);
            }
        };

        match disposition {
            Disposition::Applied => {
                tx.commit().await?;
                Ok((
                    MutationOutcome::applied(mutation.id, &mutation.client_id),
                    false,
                ))
            }
            Disposition::Duplicate => {
                tx.rollback().await?;
                tracing::debug!(
                    client_id = %mutation.client_id,
                    mutation_id = mutation.id,
                    "skipping redelivered mutation"
                );
                Ok((
                    MutationOutcome::skipped(mutation.id, &mutation.client_id),
                    false,
                ))
            }
            Disposition::Rejected(err) => {
                tx.commit().await?;
                tracing::debug!(
                    client_id = %mutation.client_id,
                    mutation_id = mutation.id,
                    name = %mutation.name,
                    error = %err,
                    "mutation rejected"
                );
                Ok((
                    MutationOutcome::rejected(
                        mutation.id,
                        &mutation.client_id,
                        err.code(),
                        err.to_string(),
                    ),
                    false,
                ))
            }
            Disposition::Fatal(err) => {
                tx.rollback().await?;
                tracing::warn!(
                    client_id = %mutation.client_id,
                    mutation_id = mutation.id,
                    name = %mutation.name,
                    error = %err,
                    "fatal mutation stops the batch"
                );
                Ok((
                    MutationOutcome::fatal(
                        mutation.id,
                        &mutation.client_id,
                        err.code(),
                        err.to_string(),
                    ),
                    true,
                ))
            }
        }
    }

    async fn run_mutation(
        &self,
        tx: &mut dyn StoreTx,
        principal: &Principal,
        client_group_id: &str,
        mutation: &MutationEnvelope,
    ) -> Result<Disposition, SyncError> {
        // Serializes pushes for this tenant until the transaction concludes.
        let current = tx.lock_org_version(principal.org_id).await?;
        let next = current + 1;

        let stored = tx
            .get_replica_client(principal.org_id, &mutation.client_id)
            .await?;
        let last = stored.as_ref().map(|row| row.last_mutation_id).unwrap_or(0);
        let expected = last + 1;

        if mutation.id < expected {
            return Ok(Disposition::Duplicate);
        }
        if mutation.id > expected {
            return Ok(Disposition::Fatal(SyncError::MutationFromFuture {
                client_id: mutation.client_id.clone(),
                expected,
                got: mutation.id,
            }));
        }

        // A client id stays bound to the group that first registered it.
        let group = stored
            .as_ref()
            .map(|row| row.client_group_id.clone())
            .unwrap_or_else(|| client_group_id.to_string());
        let now = OffsetDateTime::now_utc();

        if let Some(row) = &stored
            && row.client_group_id != client_group_id
        {
            let err = validation(format!(
                "client {} belongs to group {}, not {}",
                mutation.client_id, row.client_group_id, client_group_id
            ));
            consume_rejected(tx, principal, &group, mutation, current, now).await?;
            return Ok(Disposition::Rejected(err));
        }

        let ctx = MutationCtx {
            principal: principal.clone(),
            next_version: next,
            now,
            position_epsilon: self.opts.position_epsilon,
        };

        tx.savepoint(MUTATION_SAVEPOINT).await?;
        match dispatch(tx, &ctx, &mutation.name, &mutation.args).await {
            Ok(()) => {
                tx.release_savepoint(MUTATION_SAVEPOINT).await?;
                tx.upsert_replica_client(&ReplicaClientRow {
                    org_id: principal.org_id,
                    client_id: mutation.client_id.clone(),
                    client_group_id: group,
                    last_mutation_id: mutation.id,
                    version: next,
                    updated_at: now,
                })
                .await?;
                tx.set_org_version(principal.org_id, next).await?;
                Ok(Disposition::Applied)
            }
            Err(err) if err.is_business() => {
                tx.rollback_to_savepoint(MUTATION_SAVEPOINT).await?;
                tx.release_savepoint(MUTATION_SAVEPOINT).await?;
                consume_rejected(tx, principal, &group, mutation, current, now).await?;
                Ok(Disposition::Rejected(err))
            }
            Err(err) if err.is_fatal() => Ok(Disposition::Fatal(err)),
            Err(err) => Err(err),
        }
    }
}

/// Record a business-rejected mutation as consumed: `last_mutation_id`
/// advances so the client will not replay it, while the tenant version stays
/// where it was because no state changed.
async fn consume_rejected(
    tx: &mut dyn StoreTx,
    principal: &Principal,
    client_group_id: &str,
    mutation: &MutationEnvelope,
    version: i64,
    now: OffsetDateTime,
) -> Result<(), SyncError> {
    tx.upsert_replica_client(&ReplicaClientRow {
        org_id: principal.org_id,
        client_id: mutation.client_id.clone(),
        client_group_id: client_group_id.to_string(),
        last_mutation_id: mutation.id,
        version,
        updated_at: now,
    })
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use tack_core::{OrgRole, OutcomeStatus};
    use tack_store::SqliteStore;
    use uuid::Uuid;

    struct Fixture {
        engine: SyncEngine,
        store: Arc<dyn Store>,
        principal: Principal,
        _dir: tempfile::TempDir,
    }

    async fn seed() -> Fixture {
        seed_with(SyncOptions::default()).await
    }

    async fn seed_with(opts: SyncOptions) -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::new(dir.path().join("tack.db"))
                .await
                .expect("store"),
        );
        let now = OffsetDateTime::now_utc();

        let org_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        store.create_org(org_id, "acme", now).await.expect("org");
        store
            .create_user(user_id, "dev@acme", "Dev", now)
            .await
            .expect("user");
        store
            .upsert_membership(org_id, user_id, OrgRole::Member.as_str())
            .await
            .expect("membership");

        Fixture {
            engine: SyncEngine::new(store.clone(), opts),
            store,
            principal: Principal {
                user_id,
                org_id,
                role: OrgRole::Member,
            },
            _dir: dir,
        }
    }

    fn mutation(id: i64, client_id: &str, name: &str, args: Value) -> MutationEnvelope {
        MutationEnvelope {
            id,
            client_id: client_id.to_string(),
            name: name.to_string(),
            args,
        }
    }

    fn push(group: &str, mutations: Vec<MutationEnvelope>) -> PushRequest {
        PushRequest {
            client_group_id: group.to_string(),
            mutations,
            profile_id: None,
        }
    }

    async fn last_mutation_id(f: &Fixture, client_id: &str) -> Option<i64> {
        let mut tx = f.store.begin().await.expect("begin");
        let row = tx
            .get_replica_client(f.principal.org_id, client_id)
            .await
            .expect("replica");
        tx.rollback().await.expect("rollback");
        row.map(|r| r.last_mutation_id)
    }

    #[tokio::test]
    async fn test_fresh_batch_applies_and_redelivery_skips() {
        let f = seed().await;
        let (board, column) = (Uuid::new_v4(), Uuid::new_v4());
        let request = push(
            "group-1",
            vec![
                mutation(1, "tab-a", "createBoard", json!({"id": board, "name": "Sprint"})),
                mutation(
                    2,
                    "tab-a",
                    "createColumn",
                    json!({"id": column, "boardID": board, "name": "Todo"}),
                ),
            ],
        );

        let response = f
            .engine
            .apply_batch(&f.principal, &request)
            .await
            .expect("first push");
        assert_eq!(response.server_version, 2);
        assert_eq!(response.outcomes.len(), 2);
        assert!(
            response
                .outcomes
                .iter()
                .all(|o| o.outcome == OutcomeStatus::Applied)
        );
        assert_eq!(last_mutation_id(&f, "tab-a").await, Some(2));

        // Identical redelivery: absorbed without side effects.
        let response = f
            .engine
            .apply_batch(&f.principal, &request)
            .await
            .expect("redelivery");
        assert_eq!(response.server_version, 2);
        assert!(
            response
                .outcomes
                .iter()
                .all(|o| o.outcome == OutcomeStatus::SkippedDuplicate)
        );

        let boards = f
            .store
            .list_boards_for_user(f.principal.org_id, f.principal.user_id)
            .await
            .expect("boards");
        assert_eq!(boards.len(), 1);
    }

    #[tokio::test]
    async fn test_mutation_from_future_is_fatal() {
        let f = seed().await;
        let board = Uuid::new_v4();
        f.engine
            .apply_batch(
                &f.principal,
                &push(
                    "group-1",
                    vec![mutation(1, "tab-a", "createBoard", json!({"id": board, "name": "Sprint"}))],
                ),
            )
            .await
            .expect("seed push");

        // Jump to id 3 with id 2 never seen.
        let response = f
            .engine
            .apply_batch(
                &f.principal,
                &push(
                    "group-1",
                    vec![
                        mutation(3, "tab-a", "createNote", json!({"id": Uuid::new_v4(), "title": "x"})),
                        mutation(4, "tab-a", "createNote", json!({"id": Uuid::new_v4(), "title": "y"})),
                    ],
                ),
            )
            .await
            .expect("push with gap");

        assert_eq!(response.outcomes.len(), 1, "batch stops at the fatal outcome");
        assert_eq!(response.outcomes[0].outcome, OutcomeStatus::Fatal);
        assert_eq!(
            response.outcomes[0].code.as_deref(),
            Some("mutation_from_future")
        );
        assert_eq!(response.server_version, 1, "version did not move");
        assert_eq!(last_mutation_id(&f, "tab-a").await, Some(1));
    }

    #[tokio::test]
    async fn test_rejection_consumes_id_without_advancing_version() {
        let f = seed().await;
        let board = Uuid::new_v4();
        f.engine
            .apply_batch(
                &f.principal,
                &push(
                    "group-1",
                    vec![mutation(1, "tab-a", "createBoard", json!({"id": board, "name": "Sprint"}))],
                ),
            )
            .await
            .expect("seed push");

        // Duplicate name: business rejection.
        let response = f
            .engine
            .apply_batch(
                &f.principal,
                &push(
                    "group-1",
                    vec![mutation(
                        2,
                        "tab-a",
                        "createBoard",
                        json!({"id": Uuid::new_v4(), "name": "Sprint"}),
                    )],
                ),
            )
            .await
            .expect("rejected push");
        assert_eq!(response.outcomes[0].outcome, OutcomeStatus::Rejected);
        assert_eq!(
            response.outcomes[0].code.as_deref(),
            Some("validation_failed")
        );
        assert_eq!(response.server_version, 1, "no state change, no version bump");
        assert_eq!(
            last_mutation_id(&f, "tab-a").await,
            Some(2),
            "rejected mutation is consumed"
        );

        // The client proceeds with the next id as normal.
        let response = f
            .engine
            .apply_batch(
                &f.principal,
                &push(
                    "group-1",
                    vec![mutation(
                        3,
                        "tab-a",
                        "createBoard",
                        json!({"id": Uuid::new_v4(), "name": "Backlog"}),
                    )],
                ),
            )
            .await
            .expect("next push");
        assert_eq!(response.outcomes[0].outcome, OutcomeStatus::Applied);
        assert_eq!(response.server_version, 2);
    }

    #[tokio::test]
    async fn test_unknown_mutation_stops_batch_and_consumes_nothing() {
        let f = seed().await;
        let board = Uuid::new_v4();
        let response = f
            .engine
            .apply_batch(
                &f.principal,
                &push(
                    "group-1",
                    vec![
                        mutation(1, "tab-a", "frobnicate", json!({})),
                        mutation(2, "tab-a", "createBoard", json!({"id": board, "name": "Sprint"})),
                    ],
                ),
            )
            .await
            .expect("push");

        assert_eq!(response.outcomes.len(), 1);
        assert_eq!(response.outcomes[0].outcome, OutcomeStatus::Fatal);
        assert_eq!(response.outcomes[0].code.as_deref(), Some("unknown_mutation"));
        assert_eq!(response.server_version, 0);
        assert_eq!(
            last_mutation_id(&f, "tab-a").await,
            None,
            "fatal mutation leaves no bookkeeping"
        );
    }

    #[tokio::test]
    async fn test_client_group_binding_is_permanent() {
        let f = seed().await;
        f.engine
            .apply_batch(
                &f.principal,
                &push(
                    "group-1",
                    vec![mutation(
                        1,
                        "tab-a",
                        "createNote",
                        json!({"id": Uuid::new_v4(), "title": "first"}),
                    )],
                ),
            )
            .await
            .expect("bind group");

        let response = f
            .engine
            .apply_batch(
                &f.principal,
                &push(
                    "group-2",
                    vec![mutation(
                        2,
                        "tab-a",
                        "createNote",
                        json!({"id": Uuid::new_v4(), "title": "second"}),
                    )],
                ),
            )
            .await
            .expect("mismatched group push");
        assert_eq!(response.outcomes[0].outcome, OutcomeStatus::Rejected);
        assert_eq!(response.server_version, 1);
        assert_eq!(last_mutation_id(&f, "tab-a").await, Some(2));

        let mut tx = f.store.begin().await.expect("begin");
        let row = tx
            .get_replica_client(f.principal.org_id, "tab-a")
            .await
            .expect("replica")
            .expect("row");
        tx.rollback().await.expect("rollback");
        assert_eq!(row.client_group_id, "group-1", "binding not re-homed");
    }

    #[tokio::test]
    async fn test_version_advances_across_clients() {
        let f = seed().await;
        for (id, client) in [(1, "tab-a"), (1, "tab-b"), (2, "tab-a")] {
            let response = f
                .engine
                .apply_batch(
                    &f.principal,
                    &push(
                        "group-1",
                        vec![mutation(
                            id,
                            client,
                            "createNote",
                            json!({"id": Uuid::new_v4(), "title": format!("{client}-{id}")}),
                        )],
                    ),
                )
                .await
                .expect("push");
            assert_eq!(response.outcomes[0].outcome, OutcomeStatus::Applied);
        }
        assert_eq!(
            f.store.current_version(f.principal.org_id).await.expect("version"),
            3,
            "one increment per applied mutation, regardless of client"
        );
    }

    #[tokio::test]
    async fn test_oversized_batch_refused() {
        let f = seed_with(SyncOptions {
            max_batch_size: 2,
            ..SyncOptions::default()
        })
        .await;
        let mutations = (1..=3)
            .map(|id| {
                mutation(
                    id,
                    "tab-a",
                    "createNote",
                    json!({"id": Uuid::new_v4(), "title": "n"}),
                )
            })
            .collect();
        let err = f
            .engine
            .apply_batch(&f.principal, &push("group-1", mutations))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::BatchTooLarge { limit: 2, got: 3 }));
        assert_eq!(
            f.store.current_version(f.principal.org_id).await.expect("version"),
            0
        );
    }

    #[tokio::test]
    async fn test_empty_push_is_a_noop() {
        let f = seed().await;
        let response = f
            .engine
            .apply_batch(&f.principal, &push("group-1", Vec::new()))
            .await
            .expect("empty push");
        assert!(response.outcomes.is_empty());
        assert_eq!(response.server_version, 0);
    }

    #[tokio::test]
    async fn test_invalid_client_id_refused() {
        let f = seed().await;
        let err = f
            .engine
            .apply_batch(
                &f.principal,
                &push(
                    "group-1",
                    vec![mutation(1, "tab a", "createNote", json!({"title": "x"}))],
                ),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ValidationFailed { .. }));
    }
}
