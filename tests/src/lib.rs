//! # Relay Admission Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── harness.rs        # Wired service, routers and request builders
//! ├── integration/      # End-to-end flows through axum routers
//! └── exploits/         # Forged headers, spoofed addresses, races
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p relay-tests
//! cargo test -p relay-tests integration::
//! cargo test -p relay-tests exploits::
//! ```

#![allow(dead_code)]

pub mod exploits;
pub mod integration;
