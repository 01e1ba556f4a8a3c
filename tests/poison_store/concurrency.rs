//! Store operations racing another worker on the same partition.
//!
//! `ContendedTable` lets a rival worker write to the live row right before
//! the store's own conditional write, so that write hits a stale version.

use std::sync::{Arc, Mutex};

use resilient_events::{
    AuditRecord, InMemoryPoisonTable, PoisonError, PoisonRecord, PoisonState, PoisonStore,
    PoisonTable, Versioned, STATUS_POISON_MISMATCH, STATUS_POISON_SKIPPED,
};

use crate::support::{delivery, partition};

#[derive(Clone, Copy)]
enum Rival {
    /// Rewrite the row, bumping its version.
    Touch,
    /// Remove the row.
    Remove,
}

#[derive(Clone, Default)]
struct ContendedTable {
    inner: InMemoryPoisonTable,
    before_update: Arc<Mutex<Option<Rival>>>,
    before_delete: Arc<Mutex<Option<Rival>>>,
}

impl ContendedTable {
    fn rival_before_update(&self, rival: Rival) {
        *self.before_update.lock().unwrap() = Some(rival);
    }

    fn rival_before_delete(&self, rival: Rival) {
        *self.before_delete.lock().unwrap() = Some(rival);
    }

    fn interleave(&self, slot: &Mutex<Option<Rival>>, scope: &str, partition: &str) {
        let Some(rival) = slot.lock().unwrap().take() else {
            return;
        };
        let Some(current) = self.inner.get(scope, partition).unwrap() else {
            return;
        };
        match rival {
            Rival::Touch => {
                let mut record = current.data;
                record.reason = "touched by another worker".into();
                self.inner.update(&record, current.version).unwrap();
            }
            Rival::Remove => {
                assert!(self.inner.delete(scope, partition, current.version).unwrap());
            }
        }
    }
}

impl PoisonTable for ContendedTable {
    fn get(
        &self,
        scope: &str,
        partition: &str,
    ) -> Result<Option<Versioned<PoisonRecord>>, PoisonError> {
        self.inner.get(scope, partition)
    }

    fn insert(&self, record: &PoisonRecord) -> Result<Versioned<PoisonRecord>, PoisonError> {
        self.inner.insert(record)
    }

    fn update(
        &self,
        record: &PoisonRecord,
        expected_version: u64,
    ) -> Result<Versioned<PoisonRecord>, PoisonError> {
        self.interleave(
            &self.before_update,
            &record.partition_scope,
            &record.consumer_partition,
        );
        self.inner.update(record, expected_version)
    }

    fn delete(
        &self,
        scope: &str,
        partition: &str,
        expected_version: u64,
    ) -> Result<bool, PoisonError> {
        self.interleave(&self.before_delete, scope, partition);
        self.inner.delete(scope, partition, expected_version)
    }

    fn insert_audit(&self, audit: &AuditRecord) -> Result<(), PoisonError> {
        self.inner.insert_audit(audit)
    }

    fn audits(&self, scope: &str, partition: &str) -> Result<Vec<AuditRecord>, PoisonError> {
        self.inner.audits(scope, partition)
    }
}

fn contended() -> (ContendedTable, PoisonStore<ContendedTable>) {
    let table = ContendedTable::default();
    (table.clone(), PoisonStore::new(table))
}

#[test]
fn conflicting_mark_leaves_retries_unchanged() {
    let (table, store) = contended();
    let d = delivery("100", 1);
    store.mark_as_poisoned(&d, "HandlerError", "boom").unwrap();

    table.rival_before_update(Rival::Touch);
    let err = store
        .mark_as_poisoned(&d, "HandlerError", "boom again")
        .unwrap_err();

    assert!(matches!(
        err,
        PoisonError::ConcurrencyConflict {
            expected: 1,
            actual: 2,
            ..
        }
    ));
    let record = store.get_poisoned(&d).unwrap().unwrap();
    assert_eq!(record.retries, 0);
    assert_eq!(record.reason, "touched by another worker");

    // The redelivered attempt reads the rival's version and applies.
    let record = store.mark_as_poisoned(&d, "HandlerError", "boom again").unwrap();
    assert_eq!(record.retries, 1);
}

#[test]
fn conflicting_skip_does_not_flag() {
    let (table, store) = contended();
    let d = delivery("100", 1);
    store.mark_as_poisoned(&d, "HandlerError", "boom").unwrap();

    table.rival_before_update(Rival::Touch);
    assert!(store.skip_poisoned(&d).is_err());
    assert!(!store.get_poisoned(&d).unwrap().unwrap().skip_processing);

    assert!(store.skip_poisoned(&d).unwrap());
    assert!(store.get_poisoned(&d).unwrap().unwrap().skip_processing);
}

#[test]
fn skip_finalization_retried_after_lost_delete_audits_once() {
    let (table, store) = contended();
    let d = delivery("100", 1);
    store.mark_as_poisoned(&d, "HandlerError", "boom").unwrap();
    assert!(store.skip_poisoned(&d).unwrap());

    table.rival_before_delete(Rival::Touch);
    let err = store.check_poisoned(&d).unwrap_err();
    assert!(matches!(
        err,
        PoisonError::ConcurrencyConflict {
            expected: 2,
            actual: 3,
            ..
        }
    ));
    assert!(store.get_poisoned(&d).unwrap().unwrap().skip_processing);

    assert_eq!(store.check_poisoned(&d).unwrap(), PoisonState::PoisonSkip);
    assert_eq!(store.check_poisoned(&d).unwrap(), PoisonState::NotPoison);

    let audits = store.audit_history(&partition()).unwrap();
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].status, STATUS_POISON_SKIPPED);
    assert!(table.inner.is_empty());
}

#[test]
fn skip_finalized_elsewhere_audits_once() {
    let (table, store) = contended();
    let d = delivery("100", 1);
    store.mark_as_poisoned(&d, "HandlerError", "boom").unwrap();
    assert!(store.skip_poisoned(&d).unwrap());

    table.rival_before_delete(Rival::Remove);
    assert_eq!(store.check_poisoned(&d).unwrap(), PoisonState::PoisonSkip);
    assert_eq!(store.check_poisoned(&d).unwrap(), PoisonState::NotPoison);

    assert_eq!(store.audit_history(&partition()).unwrap().len(), 1);
    assert!(table.inner.is_empty());
}

#[test]
fn mismatch_reset_retried_after_lost_delete_audits_once() {
    let (table, store) = contended();
    store
        .mark_as_poisoned(&delivery("100", 1), "HandlerError", "boom")
        .unwrap();
    let current = delivery("200", 2);

    table.rival_before_delete(Rival::Touch);
    assert!(store.check_poisoned(&current).is_err());
    assert_eq!(
        store.get_poisoned(&current).unwrap().unwrap().sequence_number,
        1
    );

    assert_eq!(store.check_poisoned(&current).unwrap(), PoisonState::NotPoison);

    let audits = store.audit_history(&partition()).unwrap();
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].status, STATUS_POISON_MISMATCH);
    assert_eq!(audits[0].sequence_number, 1);
    assert!(table.inner.is_empty());
}

#[test]
fn mark_after_lost_mismatch_reset_starts_fresh_once() {
    let (table, store) = contended();
    store
        .mark_as_poisoned(&delivery("100", 1), "HandlerError", "boom")
        .unwrap();
    let current = delivery("200", 2);

    table.rival_before_delete(Rival::Touch);
    assert!(store.mark_as_poisoned(&current, "Rejected", "nope").is_err());

    let record = store.mark_as_poisoned(&current, "Rejected", "nope").unwrap();
    assert_eq!(record.sequence_number, 2);
    assert_eq!(record.retries, 0);

    let audits = store.audit_history(&partition()).unwrap();
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].status, STATUS_POISON_MISMATCH);
}

#[test]
fn audit_row_key_is_stable_per_record_and_status() {
    let (_, store) = contended();
    let d = delivery("100", 1);
    let record = store.mark_as_poisoned(&d, "HandlerError", "boom").unwrap();
    let originating = (record.status.clone(), record.reason.clone());

    let first = AuditRecord::from_record(
        &record,
        STATUS_POISON_SKIPPED,
        "skipped",
        originating.clone(),
        chrono::Utc::now(),
    );
    let later = AuditRecord::from_record(
        &record,
        STATUS_POISON_SKIPPED,
        "skipped",
        originating.clone(),
        first.audited_at + chrono::Duration::seconds(5),
    );
    let mismatch = AuditRecord::from_record(
        &record,
        STATUS_POISON_MISMATCH,
        "reset",
        originating,
        chrono::Utc::now(),
    );

    assert_eq!(first.row_key, later.row_key);
    assert_ne!(first.row_key, mismatch.row_key);
}
