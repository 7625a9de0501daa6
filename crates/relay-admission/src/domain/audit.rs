//! Audit/usage records written for every fingerprint decision.

use crate::domain::principal::UserId;
use crate::domain::token::{ChannelId, TokenId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Reason recorded when a token is bound to its first fingerprint
pub const FIRST_REGISTRATION: &str = "first registration";

/// Reason recorded for a request whose fingerprint matched
pub const ROUTINE_REQUEST: &str = "routine request";

/// Reason recorded when a first binding could not be persisted
pub const UNPERSISTED_REGISTRATION: &str = "first registration not persisted";

/// Reason recorded when no fingerprint header was presented
pub const MISSING_FINGERPRINT: &str = "missing device fingerprint";

/// One usage-log entry. Admission never charges, so token counts and
/// cost are always zero here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    pub request_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub user_id: UserId,
    pub channel_id: ChannelId,
    pub token_id: TokenId,
    pub token_name: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub cost: i64,
    pub reason: String,
}

/// Reason recorded when the presented fingerprint differs from the bound one.
pub fn mismatch_reason(bound: &str, presented: &str) -> String {
    format!("fingerprint mismatch: bound {bound}, presented {presented}")
}
