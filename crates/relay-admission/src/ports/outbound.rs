//! Outbound (Driven) ports for the admission gate.
//!
//! Everything the gates consult but do not own: account and session
//! storage, the token store, subnet matching, the enabled/ban/admin
//! lookups, model extraction and the usage log.

use crate::domain::{
    AuditRecord, CapabilityToken, Principal, StoreError, TokenId, TokenLookupError, UserId,
};
use async_trait::async_trait;
use axum::http::{HeaderMap, Method};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::net::IpAddr;
use std::sync::Arc;

/// Session state backing cookie logins.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Principal stored under `session_id`, if the session exists.
    async fn load(&self, session_id: &str) -> Result<Option<Principal>, StoreError>;

    /// Clear the session and persist the cleared state.
    async fn invalidate(&self, session_id: &str) -> Result<(), StoreError>;
}

/// Account layer lookups for access credentials.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Principal owning `access_token`, or `None` if it is not a valid
    /// credential.
    async fn resolve_access_token(&self, access_token: &str)
        -> Result<Option<Principal>, StoreError>;
}

/// Result of a conditional fingerprint write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindOutcome {
    /// The token was unbound and is now bound to the requested value
    Bound,
    /// Another writer got there first; carries the value it bound
    AlreadyBound(String),
}

/// Capability token persistence.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Resolve a bearer key to its token.
    async fn find_by_key(&self, key: &str) -> Result<CapabilityToken, TokenLookupError>;

    /// Bind `fingerprint` to the token only if it has none yet.
    ///
    /// Must be atomic at the storage boundary: of any number of concurrent
    /// callers at most one sees [`BindOutcome::Bound`].
    async fn bind_fingerprint(
        &self,
        token_id: TokenId,
        fingerprint: &str,
    ) -> Result<BindOutcome, StoreError>;
}

/// Client address vs. subnet restriction.
#[async_trait]
pub trait SubnetMatcher: Send + Sync {
    /// Whether `ip` falls inside any subnet of the comma-separated `subnets`.
    async fn contains(&self, ip: IpAddr, subnets: &str) -> bool;
}

/// Cached per-user enabled flag.
#[async_trait]
pub trait UserStatusCache: Send + Sync {
    async fn is_enabled(&self, user_id: UserId) -> Result<bool, StoreError>;
}

/// Global banned-user registry.
#[async_trait]
pub trait BanRegistry: Send + Sync {
    async fn is_banned(&self, user_id: UserId) -> bool;
}

/// Admin role lookup for token owners.
#[async_trait]
pub trait AdminDirectory: Send + Sync {
    async fn is_admin(&self, user_id: UserId) -> bool;
}

/// Request fields handed to the model extractor.
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Model name could not be read from the request
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to read model from request: {0}")]
pub struct ExtractError(pub String);

/// Pulls the requested model name out of a relay request.
#[async_trait]
pub trait ModelExtractor: Send + Sync {
    async fn extract(&self, request: &RequestSnapshot) -> Result<String, ExtractError>;
}

/// Usage/audit log writer.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record(&self, record: AuditRecord) -> Result<(), StoreError>;
}

/// Time source for audit timestamps
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Account-level checks passed into the gates instead of being looked up
/// from process-wide state.
#[derive(Clone)]
pub struct AccountPolicy {
    pub bans: Arc<dyn BanRegistry>,
    pub status: Arc<dyn UserStatusCache>,
    pub admins: Arc<dyn AdminDirectory>,
}

impl AccountPolicy {
    pub fn new(
        bans: Arc<dyn BanRegistry>,
        status: Arc<dyn UserStatusCache>,
        admins: Arc<dyn AdminDirectory>,
    ) -> Self {
        Self {
            bans,
            status,
            admins,
        }
    }

    pub async fn is_banned(&self, user_id: UserId) -> bool {
        self.bans.is_banned(user_id).await
    }

    pub async fn is_enabled(&self, user_id: UserId) -> Result<bool, StoreError> {
        self.status.is_enabled(user_id).await
    }

    pub async fn is_admin(&self, user_id: UserId) -> bool {
        self.admins.is_admin(user_id).await
    }
}

/// Every collaborator the gates need, bundled for wiring.
#[derive(Clone)]
pub struct Collaborators {
    pub sessions: Arc<dyn SessionStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub tokens: Arc<dyn TokenStore>,
    pub subnets: Arc<dyn SubnetMatcher>,
    pub policy: AccountPolicy,
    pub models: Arc<dyn ModelExtractor>,
    pub audit: Arc<dyn AuditLog>,
    pub clock: Arc<dyn Clock>,
}
