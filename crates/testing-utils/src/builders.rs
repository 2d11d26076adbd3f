//! Test data builders

use ledger_core::models::{LedgerNodeRecord, WorkSessionLease};

/// Builder for creating test LedgerNodeRecord entities
pub struct LedgerNodeRecordBuilder {
    record: LedgerNodeRecord,
}

impl LedgerNodeRecordBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            record: LedgerNodeRecord::new(id, "noop", 0),
        }
    }

    pub fn with_consensus_method(mut self, consensus_method: &str) -> Self {
        self.record.consensus_method = consensus_method.to_string();
        self
    }

    pub fn with_updated(mut self, updated: i64) -> Self {
        self.record.updated = updated;
        self
    }

    pub fn deleted_at(mut self, deleted: i64) -> Self {
        self.record.deleted = Some(deleted);
        self
    }

    pub fn with_lease(mut self, lease: WorkSessionLease) -> Self {
        self.record.work_session = lease;
        self
    }

    pub fn build(self) -> LedgerNodeRecord {
        self.record
    }
}
