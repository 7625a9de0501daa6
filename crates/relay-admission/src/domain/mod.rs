//! Domain types for the admission gate.
//!
//! Identity, tokens, the credential micro-format, per-request context,
//! configuration and the error taxonomy. Nothing here performs I/O.

pub mod audit;
pub mod config;
pub mod context;
pub mod credential;
pub mod error;
pub mod principal;
pub mod routes;
pub mod token;

// Re-exports for convenience
pub use audit::AuditRecord;
pub use config::{AdmissionConfig, BindFailurePolicy, ConfigError};
pub use context::{ClientIp, FingerprintOutcome, RequestContext, ResolvedToken};
pub use credential::{BearerCredential, CredentialError};
pub use error::{GateError, GatewayError, Rejection, StoreError, TokenLookupError};
pub use principal::{authorize, Identity, Principal, Role, Status, UserId};
pub use token::{CapabilityToken, ChannelId, ModelAllowlist, TokenId};
