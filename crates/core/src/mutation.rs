//! Mutation push protocol types.
//!
//! A push carries an ordered batch of client-originated mutations. Each
//! mutation has a client-assigned id that is strictly sequential per client;
//! the server applies each exactly once and reports a per-mutation outcome.

use crate::MAX_CLIENT_ID_LEN;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single client-originated mutation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MutationEnvelope {
    /// Client-assigned mutation id, strictly sequential per client starting
    /// at 1.
    pub id: i64,
    /// The logical sync endpoint (e.g. one browser tab) that produced the
    /// mutation.
    #[serde(rename = "clientID")]
    pub client_id: String,
    /// Mutation name, e.g. `createBoard` or `moveTask`.
    pub name: String,
    /// Handler-specific arguments.
    #[serde(default)]
    pub args: Value,
}

/// A batched push of mutations from one client group.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PushRequest {
    /// The group of clients sharing offline state (e.g. one browser
    /// profile).
    #[serde(rename = "clientGroupID")]
    pub client_group_id: String,
    /// Mutations in client order; applied strictly sequentially.
    pub mutations: Vec<MutationEnvelope>,
    /// Opaque client profile identifier; logged, never interpreted.
    #[serde(rename = "profileID", default, skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<String>,
}

impl PushRequest {
    /// Validate client and group identifiers (non-empty, bounded length).
    pub fn validate_ids(&self) -> crate::Result<()> {
        validate_client_id("client group id", &self.client_group_id)?;
        for m in &self.mutations {
            validate_client_id("client id", &m.client_id)?;
        }
        Ok(())
    }
}

fn validate_client_id(what: &str, id: &str) -> crate::Result<()> {
    if id.is_empty() {
        return Err(crate::Error::InvalidClientId(format!("empty {what}")));
    }
    if id.len() > MAX_CLIENT_ID_LEN {
        return Err(crate::Error::InvalidClientId(format!(
            "{what} exceeds {MAX_CLIENT_ID_LEN} bytes"
        )));
    }
    if !id.chars().all(|c| c.is_ascii_graphic()) {
        return Err(crate::Error::InvalidClientId(format!(
            "{what} contains non-printable characters"
        )));
    }
    Ok(())
}

/// How a single mutation fared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeStatus {
    /// Applied exactly once; the server version advanced.
    Applied,
    /// Already applied by an earlier push (retried delivery); no effect.
    SkippedDuplicate,
    /// Rejected by a business rule (permission, validation); the mutation id
    /// was consumed but state did not change.
    Rejected,
    /// Protocol violation; processing of the batch stopped here.
    Fatal,
}

/// Per-mutation result reported back to the client.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MutationOutcome {
    /// The mutation id this outcome refers to.
    pub id: i64,
    /// The client that submitted the mutation.
    #[serde(rename = "clientID")]
    pub client_id: String,
    /// Outcome classification.
    pub outcome: OutcomeStatus,
    /// Machine-readable error code for rejected/fatal outcomes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Human-readable detail for rejected/fatal outcomes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl MutationOutcome {
    /// An `applied` outcome.
    pub fn applied(id: i64, client_id: &str) -> Self {
        Self {
            id,
            client_id: client_id.to_string(),
            outcome: OutcomeStatus::Applied,
            code: None,
            message: None,
        }
    }

    /// A `skipped-duplicate` outcome.
    pub fn skipped(id: i64, client_id: &str) -> Self {
        Self {
            id,
            client_id: client_id.to_string(),
            outcome: OutcomeStatus::SkippedDuplicate,
            code: None,
            message: None,
        }
    }

    /// A `rejected` outcome carrying the business error.
    pub fn rejected(id: i64, client_id: &str, code: &str, message: String) -> Self {
        Self {
            id,
            client_id: client_id.to_string(),
            outcome: OutcomeStatus::Rejected,
            code: Some(code.to_string()),
            message: Some(message),
        }
    }

    /// A `fatal` outcome carrying the protocol error.
    pub fn fatal(id: i64, client_id: &str, code: &str, message: String) -> Self {
        Self {
            id,
            client_id: client_id.to_string(),
            outcome: OutcomeStatus::Fatal,
            code: Some(code.to_string()),
            message: Some(message),
        }
    }
}

/// Response to a push: outcomes in submission order, up to and including the
/// first fatal outcome, plus the tenant's server version after the batch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PushResponse {
    /// The tenant's server version after processing the batch.
    #[serde(rename = "serverVersion")]
    pub server_version: i64,
    /// Per-mutation outcomes in submission order.
    pub outcomes: Vec<MutationOutcome>,
}
