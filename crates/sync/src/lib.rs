//! Mutation synchronization for tack.
//!
//! Clients work against a local replica and push batches of named mutations;
//! this crate applies them server-side with exactly-once semantics:
//!
//! - [`engine::SyncEngine`] coordinates a pushed batch, sequencing each
//!   client's mutations and classifying every one as applied, skipped,
//!   rejected, or fatal.
//! - [`dispatch`] maps mutation names to handlers that rewrite board, column,
//!   task, and note state.
//! - [`access`] is the shared permission gate handlers call before touching
//!   board-scoped resources.
//!
//! Everything runs against the [`tack_store`] traits, so the engine is
//! agnostic to which database backs it.

pub mod access;
pub mod dispatch;
pub mod engine;
pub mod error;

pub use access::{check_access, require_role};
pub use dispatch::{MutationCtx, dispatch};
pub use engine::{SyncEngine, SyncOptions};
pub use error::SyncError;
