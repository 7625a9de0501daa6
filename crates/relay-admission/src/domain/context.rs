//! Per-request values published by the gates for downstream handlers.
//!
//! Gates never write into a request piecemeal. Each one stages its values
//! and publishes them with a single [`RequestContext::publish`] right before
//! handing the request on, so a gate that is dropped mid-flight leaves
//! nothing behind.

use crate::domain::principal::{Role, UserId};
use crate::domain::token::{CapabilityToken, ChannelId, ModelAllowlist, TokenId};
use axum::http::Extensions;
use serde::Serialize;
use std::fmt;
use std::net::IpAddr;
use uuid::Uuid;

/// Client address after trusted-proxy resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

/// Token resolved by the token gate, handed to the fingerprint binder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedToken(pub CapabilityToken);

/// How the fingerprint binder let a request through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FingerprintOutcome {
    /// This request bound the token to its fingerprint
    FirstRegistration,
    /// Fingerprint matched the bound value
    Routine,
    /// Binding write failed and the fail-open policy let the request through
    Unpersisted,
}

impl fmt::Display for FingerprintOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            FingerprintOutcome::FirstRegistration => "first-registration",
            FingerprintOutcome::Routine => "routine",
            FingerprintOutcome::Unpersisted => "unpersisted",
        };
        f.write_str(tag)
    }
}

/// Values resolved during admission. Lives for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub user_id: Option<UserId>,
    pub username: Option<String>,
    pub role: Option<Role>,
    pub token_id: Option<TokenId>,
    pub token_name: Option<String>,
    /// Empty when the route does not require a model and none was found
    pub requested_model: Option<String>,
    pub available_models: Option<ModelAllowlist>,
    pub channel_override: Option<ChannelId>,
    pub device_fingerprint: Option<String>,
    pub fingerprint_outcome: Option<FingerprintOutcome>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            request_id: Uuid::now_v7(),
            user_id: None,
            username: None,
            role: None,
            token_id: None,
            token_name: None,
            requested_model: None,
            available_models: None,
            channel_override: None,
            device_fingerprint: None,
            fingerprint_outcome: None,
        }
    }
}

impl RequestContext {
    /// Apply a staged update to the request's context, creating it if absent.
    pub fn publish(extensions: &mut Extensions, update: impl FnOnce(&mut RequestContext)) {
        match extensions.get_mut::<RequestContext>() {
            Some(ctx) => update(ctx),
            None => {
                let mut ctx = RequestContext::default();
                update(&mut ctx);
                extensions.insert(ctx);
            }
        }
    }

    /// Channel used in audit records; 0 when no channel has been chosen
    pub fn audit_channel(&self) -> ChannelId {
        self.channel_override.unwrap_or(ChannelId(0))
    }
}
