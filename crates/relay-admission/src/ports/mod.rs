//! Ports for the admission gate.

pub mod outbound;

pub use outbound::{
    AccountPolicy, AccountStore, AdminDirectory, AuditLog, BanRegistry, BindOutcome, Clock,
    Collaborators, ExtractError, ModelExtractor, RequestSnapshot, SessionStore, SubnetMatcher,
    SystemClock, TokenStore, UserStatusCache,
};
