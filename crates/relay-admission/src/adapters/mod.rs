//! Adapters for the admission gate.
//!
//! In-process implementations of the outbound ports.

pub mod audit;
pub mod memory;
pub mod model;
pub mod subnet;

pub use audit::{MemoryAuditLog, TracingAuditLog};
pub use memory::{MemoryAccounts, MemoryTokenStore, TokenState};
pub use model::JsonModelExtractor;
pub use subnet::{Cidr, CidrMatcher};

use crate::ports::{AccountPolicy, AuditLog, Collaborators, SystemClock};
use std::sync::Arc;

/// Wire every port to the in-memory stores, the CIDR matcher and the JSON
/// model extractor.
pub fn in_memory(
    accounts: Arc<MemoryAccounts>,
    tokens: Arc<MemoryTokenStore>,
    audit: Arc<dyn AuditLog>,
) -> Collaborators {
    Collaborators {
        sessions: accounts.clone(),
        accounts: accounts.clone(),
        tokens,
        subnets: Arc::new(CidrMatcher),
        policy: AccountPolicy::new(accounts.clone(), accounts.clone(), accounts),
        models: Arc::new(JsonModelExtractor),
        audit,
        clock: Arc::new(SystemClock),
    }
}
