//! Resolved caller identity and the role order enforced by management routes.

use crate::domain::error::GateError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Account identifier as stored by the account layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account role. Declaration order is the privilege order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    CommonUser,
    AdminUser,
    RootUser,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::CommonUser => "common",
            Role::AdminUser => "admin",
            Role::RootUser => "root",
        };
        f.write_str(name)
    }
}

/// Account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Enabled,
    Disabled,
}

/// A resolved identity. Rebuilt for every request, never persisted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
    pub status: Status,
}

/// Where a principal came from.
///
/// Both sources converge on the same [`Principal`]; only session
/// invalidation cares which one produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// Cookie-backed session, keyed by its session id
    Session { session_id: String, principal: Principal },
    /// Access credential from the `Authorization` header
    Credential(Principal),
}

impl Identity {
    pub fn principal(&self) -> &Principal {
        match self {
            Identity::Session { principal, .. } | Identity::Credential(principal) => principal,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            Identity::Session { session_id, .. } => Some(session_id),
            Identity::Credential(_) => None,
        }
    }
}

/// Reason string for banned or disabled accounts, shared by both gates.
pub const ACCOUNT_BANNED: &str = "account banned";

/// Reason string for principals below the required role.
pub const INSUFFICIENT_PRIVILEGE: &str = "insufficient privilege";

/// Decide whether `principal` may pass a gate requiring `min_role`.
///
/// A disabled or banned account is rejected before the role is looked at.
pub fn authorize(principal: &Principal, min_role: Role, banned: bool) -> Result<(), GateError> {
    if principal.status == Status::Disabled || banned {
        return Err(GateError::Forbidden(ACCOUNT_BANNED.to_string()));
    }
    if principal.role < min_role {
        return Err(GateError::Forbidden(INSUFFICIENT_PRIVILEGE.to_string()));
    }
    Ok(())
}
