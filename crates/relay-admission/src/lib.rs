//! Relay Admission - request gates in front of an AI relay.
//!
//! Decides whether an HTTP request may reach a handler and publishes what
//! it resolved (user, token, model, channel override, device binding) into
//! the request's [`RequestContext`].
//!
//! # Architecture
//!
//! ```text
//!   management routes                    relay routes
//!   ─────────────────                    ────────────
//!   ClientIp                             ClientIp
//!      │                                    │
//!   RoleGate (session | access token)    TokenGate (key, subnet, owner,
//!      │   common / admin / root            │       model, channel pin)
//!      │                                 Fingerprint (optional)
//!      ▼                                    ▼
//!   handler                              handler
//!
//!   collaborators (ports/outbound.rs): session + account stores, token
//!   store (fingerprint compare-and-set), subnet matcher, enabled cache,
//!   ban registry, admin directory, model extractor, audit log, clock
//! ```
//!
//! # Status codes
//!
//! - Relay routes: 401 / 403 / 400 / 500 by error class.
//! - Management routes: the legacy `200` with `{"success": false}`, except
//!   a request carrying no credential (401) and collaborator failures (500).
//!
//! # Usage
//!
//! ```ignore
//! use relay_admission::{adapters, AdmissionConfig, AdmissionService};
//!
//! let collaborators = adapters::in_memory(accounts, tokens, audit);
//! let service = AdmissionService::new(AdmissionConfig::default(), collaborators)?;
//! let relay = service.protect_relay(relay_routes, true);
//! let admin = service.protect_management(admin_routes, Role::AdminUser);
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod domain;
pub mod middleware;
pub mod ports;
pub mod service;
pub mod telemetry;

// Re-exports
pub use domain::{
    AdmissionConfig, BearerCredential, CapabilityToken, ChannelId, FingerprintOutcome, GateError,
    GatewayError, Identity, Principal, Rejection, RequestContext, ResolvedToken, Role, Status,
    TokenId, UserId,
};
pub use middleware::AdmissionMetrics;
pub use service::AdmissionService;
pub use telemetry::init_tracing;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
