//! End-to-end admission flows through axum routers.

pub mod flows;
