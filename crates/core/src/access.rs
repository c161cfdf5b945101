//! Permission levels, organization roles, and the authenticated principal.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Per-board permission level, ordered weakest to strongest.
///
/// Columns and tasks carry no permission rows of their own; a check against
/// either resolves up to the owning board's level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    /// Read-only access.
    Viewer,
    /// May create, move, and edit columns and tasks.
    Editor,
    /// May additionally delete the board.
    Admin,
    /// Full control; assigned to the board creator.
    Owner,
}

impl PermissionLevel {
    /// Parse from string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "viewer" => Ok(Self::Viewer),
            "editor" => Ok(Self::Editor),
            "admin" => Ok(Self::Admin),
            "owner" => Ok(Self::Owner),
            _ => Err(crate::Error::InvalidLevel(s.to_string())),
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Editor => "editor",
            Self::Admin => "admin",
            Self::Owner => "owner",
        }
    }

    /// Ordinal used in permission rows (viewer=0 .. owner=3).
    pub fn ordinal(&self) -> i64 {
        match self {
            Self::Viewer => 0,
            Self::Editor => 1,
            Self::Admin => 2,
            Self::Owner => 3,
        }
    }

    /// Parse from the stored ordinal.
    pub fn from_ordinal(n: i64) -> crate::Result<Self> {
        match n {
            0 => Ok(Self::Viewer),
            1 => Ok(Self::Editor),
            2 => Ok(Self::Admin),
            3 => Ok(Self::Owner),
            _ => Err(crate::Error::InvalidLevel(n.to_string())),
        }
    }

    /// Check whether this level satisfies a required level.
    pub fn satisfies(&self, required: Self) -> bool {
        self.ordinal() >= required.ordinal()
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Role of a user within an organization, ordered weakest to strongest.
///
/// Gates the org-scoped mutations (board creation, notes); board-scoped
/// mutations are gated by [`PermissionLevel`] rows instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrgRole {
    /// Regular member.
    Member,
    /// Organization administrator.
    Admin,
    /// Organization owner.
    Owner,
}

impl OrgRole {
    /// Parse from string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "member" => Ok(Self::Member),
            "admin" => Ok(Self::Admin),
            "owner" => Ok(Self::Owner),
            _ => Err(crate::Error::InvalidRole(s.to_string())),
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Admin => "admin",
            Self::Owner => "owner",
        }
    }

    /// Check whether this role satisfies a required role.
    pub fn satisfies(&self, required: Self) -> bool {
        *self >= required
    }
}

impl fmt::Display for OrgRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The kind of resource named by a mutation, used to resolve permission
/// checks up to the owning board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Board,
    Column,
    Task,
}

impl ResourceKind {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Board => "board",
            Self::Column => "column",
            Self::Task => "task",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The authenticated actor: a user operating within one active organization.
///
/// Produced by the authentication layer; everything downstream trusts it
/// without re-verifying credentials.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// The acting user.
    pub user_id: Uuid,
    /// The active organization; all reads and writes are scoped to it.
    pub org_id: Uuid,
    /// The user's role within the active organization.
    pub role: OrgRole,
}

impl Principal {
    /// Check whether the principal's org role satisfies a required role.
    pub fn has_role(&self, required: OrgRole) -> bool {
        self.role.satisfies(required)
    }
}
