use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PoisonError;
use crate::envelope::{Delivery, EventEnvelope, PartitionPosition};

/// Live poison state for one (scope, consumer partition).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoisonRecord {
    /// Storage partition key (hub endpoint + hub name).
    pub partition_scope: String,
    /// Storage row key (consumer group + partition id).
    pub consumer_partition: String,
    /// JSON snapshot of the failing envelope.
    pub body: String,
    pub status: String,
    pub reason: String,
    /// Set only when a skip is finalized; the first failure classification.
    pub originating_status: Option<String>,
    pub originating_reason: Option<String>,
    pub offset: String,
    pub sequence_number: i64,
    pub retries: u32,
    pub skip_processing: bool,
    pub poisoned_at: DateTime<Utc>,
    pub skipped_at: Option<DateTime<Utc>>,
}

impl PoisonRecord {
    /// First failure of `delivery`'s position.
    pub fn new(
        delivery: &Delivery,
        status: impl Into<String>,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, PoisonError> {
        Ok(Self {
            partition_scope: delivery.scope_key(),
            consumer_partition: delivery.partition_key(),
            body: serde_json::to_string(&delivery.envelope)?,
            status: status.into(),
            reason: reason.into(),
            originating_status: None,
            originating_reason: None,
            offset: delivery.position.offset.clone(),
            sequence_number: delivery.position.sequence_number,
            retries: 0,
            skip_processing: false,
            poisoned_at: now,
            skipped_at: None,
        })
    }

    pub fn position(&self) -> PartitionPosition {
        PartitionPosition::new(self.offset.clone(), self.sequence_number)
    }

    /// Whether this record tracks `position`.
    pub fn is_at(&self, position: &PartitionPosition) -> bool {
        self.offset == position.offset && self.sequence_number == position.sequence_number
    }

    /// Replay the snapshot of the failing envelope.
    pub fn envelope(&self) -> Result<EventEnvelope, PoisonError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Historical copy of a resolved [`PoisonRecord`]. Never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub partition_scope: String,
    /// `{consumer partition}-{poisoned at}-{offset}-{sequence number}-{status}`.
    /// Auditing the same record under the same status twice yields the same key.
    pub row_key: String,
    pub consumer_partition: String,
    pub body: String,
    pub status: String,
    pub reason: String,
    pub originating_status: Option<String>,
    pub originating_reason: Option<String>,
    pub offset: String,
    pub sequence_number: i64,
    pub retries: u32,
    pub skip_processing: bool,
    pub poisoned_at: DateTime<Utc>,
    pub skipped_at: Option<DateTime<Utc>>,
    pub audited_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Audit `record` under a new status. Originating fields come from the
    /// record when already set, otherwise from `originating`.
    pub fn from_record(
        record: &PoisonRecord,
        status: impl Into<String>,
        reason: impl Into<String>,
        originating: (String, String),
        now: DateTime<Utc>,
    ) -> Self {
        let (originating_status, originating_reason) = originating;
        let status = status.into();
        Self {
            partition_scope: record.partition_scope.clone(),
            row_key: audit_row_key(record, &status),
            consumer_partition: record.consumer_partition.clone(),
            body: record.body.clone(),
            status,
            reason: reason.into(),
            originating_status: record
                .originating_status
                .clone()
                .or(Some(originating_status)),
            originating_reason: record
                .originating_reason
                .clone()
                .or(Some(originating_reason)),
            offset: record.offset.clone(),
            sequence_number: record.sequence_number,
            retries: record.retries,
            skip_processing: record.skip_processing,
            poisoned_at: record.poisoned_at,
            skipped_at: record.skipped_at,
            audited_at: now,
        }
    }

    pub fn position(&self) -> PartitionPosition {
        PartitionPosition::new(self.offset.clone(), self.sequence_number)
    }

    /// Replay the snapshot of the audited envelope.
    pub fn envelope(&self) -> Result<EventEnvelope, PoisonError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

fn audit_row_key(record: &PoisonRecord, status: &str) -> String {
    format!(
        "{}-{}-{}-{}-{}",
        record.consumer_partition,
        record.poisoned_at.format("%Y%m%d%H%M%S%6f"),
        record.offset,
        record.sequence_number,
        status
    )
}
