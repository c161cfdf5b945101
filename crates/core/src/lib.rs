//! Core domain types and shared logic for the tack sync server.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Permission levels, organization roles, and the authenticated principal
//! - The mutation push protocol envelope and per-mutation outcomes
//! - Fractional position keys for ordered lists (columns, tasks)
//! - Application configuration

pub mod access;
pub mod config;
pub mod error;
pub mod mutation;
pub mod position;

pub use access::{OrgRole, PermissionLevel, Principal, ResourceKind};
pub use error::{Error, Result};
pub use mutation::{MutationEnvelope, MutationOutcome, OutcomeStatus, PushRequest, PushResponse};
pub use position::{
    POSITION_SEED, POSITION_SPACING, allocate, needs_rebalance, renumbered_position,
};

/// Default cap on the number of mutations accepted in one push.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 256;

/// Default minimum gap between adjacent position keys before a list is
/// renumbered.
pub const DEFAULT_POSITION_EPSILON: f64 = 1e-9;

/// Maximum accepted length of a client or client group identifier.
pub const MAX_CLIENT_ID_LEN: usize = 64;
