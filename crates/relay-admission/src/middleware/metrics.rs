//! Admission counters.

use crate::domain::GateError;
use std::sync::atomic::{AtomicU64, Ordering};

/// Admission metrics
#[derive(Debug, Default)]
pub struct AdmissionMetrics {
    pub admitted_total: AtomicU64,

    // Rejections by class
    pub rejected_unauthenticated: AtomicU64,
    pub rejected_forbidden: AtomicU64,
    pub rejected_bad_request: AtomicU64,
    pub rejected_internal: AtomicU64,

    // Device binding
    pub fingerprints_bound: AtomicU64,
    pub fingerprint_mismatches: AtomicU64,
    pub bind_failures: AtomicU64,
    pub audit_write_failures: AtomicU64,
}

impl AdmissionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_admitted(&self) {
        self.admitted_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejection(&self, error: &GateError) {
        let counter = match error {
            GateError::Unauthenticated(_) => &self.rejected_unauthenticated,
            GateError::Forbidden(_) => &self.rejected_forbidden,
            GateError::BadRequest(_) => &self.rejected_bad_request,
            GateError::Internal(_) => &self.rejected_internal,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bound(&self) {
        self.fingerprints_bound.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_mismatch(&self) {
        self.fingerprint_mismatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bind_failure(&self) {
        self.bind_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_audit_failure(&self) {
        self.audit_write_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Total rejections across all classes
    pub fn rejected_total(&self) -> u64 {
        self.rejected_unauthenticated.load(Ordering::Relaxed)
            + self.rejected_forbidden.load(Ordering::Relaxed)
            + self.rejected_bad_request.load(Ordering::Relaxed)
            + self.rejected_internal.load(Ordering::Relaxed)
    }

    /// Export metrics as JSON
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "admitted_total": self.admitted_total.load(Ordering::Relaxed),
            "rejected": {
                "total": self.rejected_total(),
                "unauthenticated": self.rejected_unauthenticated.load(Ordering::Relaxed),
                "forbidden": self.rejected_forbidden.load(Ordering::Relaxed),
                "bad_request": self.rejected_bad_request.load(Ordering::Relaxed),
                "internal": self.rejected_internal.load(Ordering::Relaxed),
            },
            "fingerprint": {
                "bound": self.fingerprints_bound.load(Ordering::Relaxed),
                "mismatches": self.fingerprint_mismatches.load(Ordering::Relaxed),
                "bind_failures": self.bind_failures.load(Ordering::Relaxed),
            },
            "audit_write_failures": self.audit_write_failures.load(Ordering::Relaxed),
        })
    }
}
