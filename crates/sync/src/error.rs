//! Error taxonomy for mutation synchronization.
//!
//! Three tiers, handled differently by the batch coordinator:
//! - business errors (`PermissionDenied`, `ValidationFailed`) reject one
//!   mutation; the batch continues,
//! - protocol errors (`MutationFromFuture`, `UnknownMutationName`) are fatal;
//!   the remainder of the batch is not processed,
//! - infrastructure errors (`Store`) fail the push as a whole; the client
//!   retries and idempotency absorbs the redelivery.

use tack_store::StoreError;
use thiserror::Error;

/// Errors produced while applying a push.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The principal's permission level is insufficient, or a referenced
    /// resource does not resolve within the principal's tenant. The two are
    /// deliberately indistinguishable.
    #[error("permission denied")]
    PermissionDenied,

    /// A business rule rejected the mutation (bad arguments, duplicate
    /// name, missing referent).
    #[error("validation failed: {reason}")]
    ValidationFailed { reason: String },

    /// The mutation id is ahead of the next expected id for its client.
    /// Server-side bookkeeping no longer matches the client; only a full
    /// resync recovers.
    #[error("mutation {got} from client {client_id} is ahead of expected {expected}")]
    MutationFromFuture {
        client_id: String,
        expected: i64,
        got: i64,
    },

    /// The mutation names no known handler.
    #[error("unknown mutation name: {name}")]
    UnknownMutationName { name: String },

    /// The push exceeds the configured batch size cap.
    #[error("batch of {got} mutations exceeds limit of {limit}")]
    BatchTooLarge { limit: usize, got: usize },

    /// The store failed; nothing about the failing mutation was committed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SyncError {
    /// Stable machine-readable code for wire outcomes.
    pub fn code(&self) -> &'static str {
        match self {
            SyncError::PermissionDenied => "permission_denied",
            SyncError::ValidationFailed { .. } => "validation_failed",
            SyncError::MutationFromFuture { .. } => "mutation_from_future",
            SyncError::UnknownMutationName { .. } => "unknown_mutation",
            SyncError::BatchTooLarge { .. } => "batch_too_large",
            SyncError::Store(_) => "store_unavailable",
        }
    }

    /// Business errors reject one mutation without stopping the batch.
    pub fn is_business(&self) -> bool {
        matches!(
            self,
            SyncError::PermissionDenied | SyncError::ValidationFailed { .. }
        )
    }

    /// Protocol errors stop the remainder of the batch.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::MutationFromFuture { .. } | SyncError::UnknownMutationName { .. }
        )
    }
}

/// Convenience constructor for validation rejections.
pub(crate) fn validation(reason: impl Into<String>) -> SyncError {
    SyncError::ValidationFailed {
        reason: reason.into(),
    }
}
