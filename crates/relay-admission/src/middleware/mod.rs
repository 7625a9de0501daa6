//! Admission middleware.
//!
//! Management routes: ClientIp → RoleGate → Handler
//! Relay routes:      ClientIp → TokenGate → Fingerprint (optional) → Handler
//!
//! Each gate short-circuits on its first failed check and publishes its
//! context values only once every check has passed.

pub mod client_ip;
pub mod fingerprint;
pub mod metrics;
pub mod role_gate;
pub mod token_gate;

pub use client_ip::ClientIpLayer;
pub use fingerprint::FingerprintLayer;
pub use metrics::AdmissionMetrics;
pub use role_gate::{PrincipalResolver, RoleGateLayer};
pub use token_gate::TokenGateLayer;

use crate::domain::StoreError;
use std::future::Future;
use std::time::Duration;

type BoxFuture<T> = std::pin::Pin<Box<dyn Future<Output = T> + Send>>;

/// Await a collaborator call, giving up after `limit`.
async fn with_deadline<T>(
    limit: Duration,
    collaborator: &'static str,
    call: impl Future<Output = T>,
) -> Result<T, StoreError> {
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| StoreError::Timeout(collaborator))
}
