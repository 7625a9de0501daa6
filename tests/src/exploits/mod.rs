//! # Attack Simulations
//!
//! - `device_cloning`: racing and replaying fingerprints against one token
//! - `header_forgery`: spoofed forwarding headers, crafted credentials,
//!   privilege escalation on management routes

pub mod device_cloning;
pub mod header_forgery;
