//! PoisonStore - the poison state machine over a [`PoisonTable`].

use chrono::Utc;
use tracing::{debug, info, warn};

use super::{
    AuditRecord, PoisonError, PoisonRecord, PoisonState, PoisonTable, Versioned,
    STATUS_POISON_MISMATCH, STATUS_POISON_SKIPPED,
};
use crate::envelope::{Delivery, PartitionContext};

/// Tracks poisoned positions per consumer partition.
///
/// Every operation is safe to repeat for the same delivery; the stream is
/// at-least-once and the same position can arrive any number of times.
pub struct PoisonStore<T> {
    table: T,
}

impl<T: PoisonTable> PoisonStore<T> {
    pub fn new(table: T) -> Self {
        Self { table }
    }

    /// Get a reference to the underlying table.
    pub fn table(&self) -> &T {
        &self.table
    }

    /// Poison state for `delivery`'s position.
    ///
    /// Non-mutating except in two cases:
    /// - the record is at this position and marked to skip: the skip is
    ///   audited, the record deleted, and `PoisonSkip` returned once;
    /// - the record is at a different position: it is audited as a mismatch,
    ///   deleted, and `NotPoison` returned. The newest position is trusted.
    pub fn check_poisoned(&self, delivery: &Delivery) -> Result<PoisonState, PoisonError> {
        let Some(existing) = self.load(delivery)? else {
            return Ok(PoisonState::NotPoison);
        };

        if !existing.data.is_at(&delivery.position) {
            self.reset_mismatch(existing, delivery)?;
            return Ok(PoisonState::NotPoison);
        }

        if !existing.data.skip_processing {
            return Ok(PoisonState::PoisonRetry);
        }

        self.finalize_skip(existing)?;
        Ok(PoisonState::PoisonSkip)
    }

    /// Record a failed processing attempt of `delivery`.
    ///
    /// Creates the record on first failure (`retries = 0`); later failures of
    /// the same position bump `retries` and overwrite status and reason. A
    /// record for another position is reset first, as in `check_poisoned`.
    pub fn mark_as_poisoned(
        &self,
        delivery: &Delivery,
        status: &str,
        reason: &str,
    ) -> Result<PoisonRecord, PoisonError> {
        let now = Utc::now();

        let versioned = match self.load(delivery)? {
            Some(existing) if existing.data.is_at(&delivery.position) => {
                let mut record = existing.data;
                record.retries += 1;
                record.status = status.to_string();
                record.reason = reason.to_string();
                self.table.update(&record, existing.version)?
            }
            Some(existing) => {
                self.reset_mismatch(existing, delivery)?;
                self.table
                    .insert(&PoisonRecord::new(delivery, status, reason, now)?)?
            }
            None => self
                .table
                .insert(&PoisonRecord::new(delivery, status, reason, now)?)?,
        };

        debug!(
            scope = %versioned.data.partition_scope,
            partition = %versioned.data.consumer_partition,
            offset = %versioned.data.offset,
            sequence_number = versioned.data.sequence_number,
            retries = versioned.data.retries,
            status,
            "marked as poisoned"
        );

        Ok(versioned.data)
    }

    /// Flag the poisoned position of `delivery` to be skipped on its next check.
    ///
    /// Returns false, changing nothing, when no record exists for this
    /// position.
    pub fn skip_poisoned(&self, delivery: &Delivery) -> Result<bool, PoisonError> {
        let Some(existing) = self.load(delivery)? else {
            return Ok(false);
        };
        if !existing.data.is_at(&delivery.position) {
            return Ok(false);
        }

        let mut record = existing.data;
        record.skip_processing = true;
        record.skipped_at = Some(Utc::now());
        self.table.update(&record, existing.version)?;

        info!(
            scope = %record.partition_scope,
            partition = %record.consumer_partition,
            offset = %record.offset,
            sequence_number = record.sequence_number,
            "poisoned message flagged for skip"
        );
        Ok(true)
    }

    /// Clear the poison record for `delivery`'s position after it succeeded.
    ///
    /// Never removes a record tracking a different position. Returns whether
    /// a record was deleted.
    pub fn remove_poisoned(&self, delivery: &Delivery) -> Result<bool, PoisonError> {
        let Some(existing) = self.load(delivery)? else {
            return Ok(false);
        };
        if !existing.data.is_at(&delivery.position) {
            return Ok(false);
        }

        let removed = self.table.delete(
            &existing.data.partition_scope,
            &existing.data.consumer_partition,
            existing.version,
        )?;
        if removed {
            info!(
                scope = %existing.data.partition_scope,
                partition = %existing.data.consumer_partition,
                offset = %existing.data.offset,
                sequence_number = existing.data.sequence_number,
                retries = existing.data.retries,
                "poisoned message recovered"
            );
        }
        Ok(removed)
    }

    /// The live record for `delivery`'s partition, whatever position it tracks.
    pub fn get_poisoned(&self, delivery: &Delivery) -> Result<Option<PoisonRecord>, PoisonError> {
        Ok(self.load(delivery)?.map(|v| v.data))
    }

    /// Audit trail of a consumer partition, oldest first.
    pub fn audit_history(
        &self,
        partition: &PartitionContext,
    ) -> Result<Vec<AuditRecord>, PoisonError> {
        self.table
            .audits(&partition.scope.table_key(), &partition.consumer.table_key())
    }

    fn load(&self, delivery: &Delivery) -> Result<Option<Versioned<PoisonRecord>>, PoisonError> {
        self.table
            .get(&delivery.scope_key(), &delivery.partition_key())
    }

    // The audit row key is derived from the record, so a finalization
    // retried after a lost conditional delete never writes a second row.
    fn finalize_skip(&self, existing: Versioned<PoisonRecord>) -> Result<(), PoisonError> {
        let record = &existing.data;
        let audit = AuditRecord::from_record(
            record,
            STATUS_POISON_SKIPPED,
            "Message was skipped after being marked as poisoned.",
            (record.status.clone(), record.reason.clone()),
            Utc::now(),
        );
        self.write_audit(&audit)?;

        if !self.table.delete(
            &record.partition_scope,
            &record.consumer_partition,
            existing.version,
        )? {
            debug!(
                scope = %record.partition_scope,
                partition = %record.consumer_partition,
                sequence_number = record.sequence_number,
                "skip already finalized elsewhere"
            );
            return Ok(());
        }

        warn!(
            scope = %record.partition_scope,
            partition = %record.consumer_partition,
            offset = %record.offset,
            sequence_number = record.sequence_number,
            retries = record.retries,
            status = %record.status,
            "poisoned message skipped"
        );
        Ok(())
    }

    fn reset_mismatch(
        &self,
        existing: Versioned<PoisonRecord>,
        delivery: &Delivery,
    ) -> Result<(), PoisonError> {
        let record = &existing.data;
        let reason = format!(
            "Current offset/sequence number {}/{} does not match poisoned offset/sequence number {}/{}; poison state reset.",
            delivery.position.offset,
            delivery.position.sequence_number,
            record.offset,
            record.sequence_number
        );

        let audit = AuditRecord::from_record(
            record,
            STATUS_POISON_MISMATCH,
            reason,
            (record.status.clone(), record.reason.clone()),
            Utc::now(),
        );

        self.write_audit(&audit)?;

        if !self.table.delete(
            &record.partition_scope,
            &record.consumer_partition,
            existing.version,
        )? {
            debug!(
                scope = %record.partition_scope,
                partition = %record.consumer_partition,
                sequence_number = record.sequence_number,
                "mismatch already reset elsewhere"
            );
            return Ok(());
        }

        warn!(
            scope = %record.partition_scope,
            partition = %record.consumer_partition,
            poisoned_offset = %record.offset,
            poisoned_sequence_number = record.sequence_number,
            current_offset = %delivery.position.offset,
            current_sequence_number = delivery.position.sequence_number,
            retries = record.retries,
            "poison position mismatch; resetting"
        );
        Ok(())
    }

    /// Insert an audit row. An existing row with the same key was written by
    /// an earlier attempt at the same finalization and counts as written.
    fn write_audit(&self, audit: &AuditRecord) -> Result<(), PoisonError> {
        match self.table.insert_audit(audit) {
            Ok(()) => Ok(()),
            Err(PoisonError::DuplicateKey { scope, key }) => {
                debug!(scope = %scope, row_key = %key, "audit row already written");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}
