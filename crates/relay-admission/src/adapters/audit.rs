//! Audit log writers.

use crate::domain::{AuditRecord, StoreError};
use crate::ports::AuditLog;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Emits each record as an event on the `audit` tracing target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditLog;

#[async_trait]
impl AuditLog for TracingAuditLog {
    async fn record(&self, record: AuditRecord) -> Result<(), StoreError> {
        info!(
            target: "audit",
            request_id = %record.request_id,
            user_id = %record.user_id,
            channel_id = %record.channel_id,
            token_id = %record.token_id,
            token_name = %record.token_name,
            model = %record.model,
            prompt_tokens = record.prompt_tokens,
            completion_tokens = record.completion_tokens,
            cost = record.cost,
            reason = %record.reason,
            "usage record"
        );
        Ok(())
    }
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    records: Mutex<Vec<AuditRecord>>,
    fail_writes: AtomicBool,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    pub fn reasons(&self) -> Vec<String> {
        self.records.lock().iter().map(|r| r.reason.clone()).collect()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn record(&self, record: AuditRecord) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("audit log".into()));
        }
        self.records.lock().push(record);
        Ok(())
    }
}
