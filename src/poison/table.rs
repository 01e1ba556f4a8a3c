//! PoisonTable - the persistence boundary of the poison store.

use super::{AuditRecord, PoisonError, PoisonRecord, Versioned};

/// Key-value table holding live poison records and their audit trail.
///
/// Live rows are addressed by (partition scope, consumer partition). Writes
/// to an existing row carry the version it was read at so a worker that lost
/// partition ownership cannot clobber the new owner's state.
pub trait PoisonTable: Send + Sync {
    /// Get the live record. Returns None if not found.
    fn get(
        &self,
        scope: &str,
        partition: &str,
    ) -> Result<Option<Versioned<PoisonRecord>>, PoisonError>;

    /// Insert a new live record. Fails if one already exists.
    fn insert(&self, record: &PoisonRecord) -> Result<Versioned<PoisonRecord>, PoisonError>;

    /// Replace a live record with optimistic concurrency control.
    fn update(
        &self,
        record: &PoisonRecord,
        expected_version: u64,
    ) -> Result<Versioned<PoisonRecord>, PoisonError>;

    /// Delete a live record if it is still at `expected_version`.
    /// Returns false if it did not exist.
    fn delete(
        &self,
        scope: &str,
        partition: &str,
        expected_version: u64,
    ) -> Result<bool, PoisonError>;

    /// Append an audit row. Fails on a duplicate row key.
    fn insert_audit(&self, audit: &AuditRecord) -> Result<(), PoisonError>;

    /// Audit rows for one consumer partition, oldest first.
    fn audits(&self, scope: &str, partition: &str) -> Result<Vec<AuditRecord>, PoisonError>;
}
