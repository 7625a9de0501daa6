//! In-memory account, session and token stores.
//!
//! Used by tests and single-process deployments. The token store's
//! fingerprint write holds the shard lock for the whole check-and-set, so
//! it gives the same guarantee a conditional `UPDATE ... WHERE
//! fingerprint IS NULL` gives a shared database.

use crate::domain::{
    CapabilityToken, Principal, Role, Status, StoreError, TokenId, TokenLookupError, UserId,
};
use crate::ports::{
    AccountStore, AdminDirectory, BanRegistry, BindOutcome, SessionStore, TokenStore,
    UserStatusCache,
};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

/// Users, access credentials, sessions and the ban list.
#[derive(Default)]
pub struct MemoryAccounts {
    users: DashMap<UserId, Principal>,
    access_tokens: DashMap<String, UserId>,
    sessions: DashMap<String, UserId>,
    banned: DashSet<UserId>,
    status_cache_down: AtomicBool,
}

impl MemoryAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, principal: Principal) {
        self.users.insert(principal.user_id, principal);
    }

    /// Register a management access credential for `user_id`
    pub fn issue_access_token(&self, user_id: UserId, access_token: impl Into<String>) {
        self.access_tokens.insert(access_token.into(), user_id);
    }

    pub fn open_session(&self, session_id: impl Into<String>, user_id: UserId) {
        self.sessions.insert(session_id.into(), user_id);
    }

    pub fn has_session(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn ban(&self, user_id: UserId) {
        self.banned.insert(user_id);
    }

    pub fn unban(&self, user_id: UserId) {
        self.banned.remove(&user_id);
    }

    pub fn set_status(&self, user_id: UserId, status: Status) {
        if let Some(mut user) = self.users.get_mut(&user_id) {
            user.status = status;
        }
    }

    /// Make the enabled-cache report failures
    pub fn set_status_cache_down(&self, down: bool) {
        self.status_cache_down.store(down, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionStore for MemoryAccounts {
    async fn load(&self, session_id: &str) -> Result<Option<Principal>, StoreError> {
        let Some(user_id) = self.sessions.get(session_id).map(|e| *e.value()) else {
            return Ok(None);
        };
        Ok(self.users.get(&user_id).map(|u| u.value().clone()))
    }

    async fn invalidate(&self, session_id: &str) -> Result<(), StoreError> {
        self.sessions.remove(session_id);
        debug!(session_id = session_id, "Session cleared");
        Ok(())
    }
}

#[async_trait]
impl AccountStore for MemoryAccounts {
    async fn resolve_access_token(
        &self,
        access_token: &str,
    ) -> Result<Option<Principal>, StoreError> {
        let Some(user_id) = self.access_tokens.get(access_token).map(|e| *e.value()) else {
            return Ok(None);
        };
        Ok(self
            .users
            .get(&user_id)
            .map(|u| u.value().clone())
            .filter(|p| !p.username.is_empty()))
    }
}

#[async_trait]
impl UserStatusCache for MemoryAccounts {
    async fn is_enabled(&self, user_id: UserId) -> Result<bool, StoreError> {
        if self.status_cache_down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("user status cache".into()));
        }
        self.users
            .get(&user_id)
            .map(|u| u.status == Status::Enabled)
            .ok_or_else(|| StoreError::NotFound(format!("user {user_id}")))
    }
}

#[async_trait]
impl BanRegistry for MemoryAccounts {
    async fn is_banned(&self, user_id: UserId) -> bool {
        self.banned.contains(&user_id)
    }
}

#[async_trait]
impl AdminDirectory for MemoryAccounts {
    async fn is_admin(&self, user_id: UserId) -> bool {
        self.users
            .get(&user_id)
            .map(|u| u.role >= Role::AdminUser)
            .unwrap_or(false)
    }
}

/// Lifecycle state kept by the token store next to each token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenState {
    #[default]
    Active,
    Disabled,
    Expired,
    Exhausted,
}

struct StoredToken {
    token: CapabilityToken,
    state: TokenState,
}

/// Token store with an atomic fingerprint compare-and-set.
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: DashMap<TokenId, StoredToken>,
    keys: DashMap<String, TokenId>,
    fail_writes: AtomicBool,
    bind_writes: AtomicU64,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, token: CapabilityToken) {
        self.insert_with_state(token, TokenState::Active);
    }

    pub fn insert_with_state(&self, token: CapabilityToken, state: TokenState) {
        self.keys.insert(token.key.clone(), token.id);
        self.tokens.insert(token.id, StoredToken { token, state });
    }

    pub fn set_state(&self, token_id: TokenId, state: TokenState) {
        if let Some(mut stored) = self.tokens.get_mut(&token_id) {
            stored.state = state;
        }
    }

    /// Current stored copy of a token
    pub fn get(&self, token_id: TokenId) -> Option<CapabilityToken> {
        self.tokens.get(&token_id).map(|s| s.token.clone())
    }

    /// Make fingerprint writes fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful first-time bindings
    pub fn bind_writes(&self) -> u64 {
        self.bind_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn find_by_key(&self, key: &str) -> Result<CapabilityToken, TokenLookupError> {
        let token_id = self
            .keys
            .get(key)
            .map(|e| *e.value())
            .ok_or(TokenLookupError::NotFound)?;
        let stored = self.tokens.get(&token_id).ok_or(TokenLookupError::NotFound)?;
        match stored.state {
            TokenState::Active => Ok(stored.token.clone()),
            TokenState::Disabled => Err(TokenLookupError::Disabled),
            TokenState::Expired => Err(TokenLookupError::Expired),
            TokenState::Exhausted => Err(TokenLookupError::Exhausted),
        }
    }

    async fn bind_fingerprint(
        &self,
        token_id: TokenId,
        fingerprint: &str,
    ) -> Result<BindOutcome, StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("token store write".into()));
        }
        let mut stored = self
            .tokens
            .get_mut(&token_id)
            .ok_or_else(|| StoreError::NotFound(format!("token {token_id}")))?;

        if let Some(existing) = &stored.token.device_fingerprint {
            return Ok(BindOutcome::AlreadyBound(existing.clone()));
        }
        stored.token.device_fingerprint = Some(fingerprint.to_string());
        self.bind_writes.fetch_add(1, Ordering::SeqCst);
        Ok(BindOutcome::Bound)
    }
}
