//! InMemoryPoisonTable - HashMap-backed poison table for testing and development.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use super::{AuditRecord, PoisonError, PoisonRecord, PoisonTable, Versioned};

/// Internal stored representation of a live row.
struct StoredRow {
    bytes: Vec<u8>,
    version: u64,
}

type RowKey = (String, String);

/// In-memory poison table. Rows are bitcode-encoded. Clone-friendly via Arc.
#[derive(Clone, Default)]
pub struct InMemoryPoisonTable {
    live: Arc<RwLock<HashMap<RowKey, StoredRow>>>,
    audit: Arc<RwLock<BTreeMap<RowKey, Vec<u8>>>>,
}

impl InMemoryPoisonTable {
    /// Create a new empty table.
    pub fn new() -> Self {
        Self::default()
    }

    fn key(scope: &str, partition: &str) -> RowKey {
        (scope.to_string(), partition.to_string())
    }

    /// Number of live poison records.
    pub fn len(&self) -> usize {
        self.live.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of audit rows across all partitions.
    pub fn audit_len(&self) -> usize {
        self.audit.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl PoisonTable for InMemoryPoisonTable {
    fn get(
        &self,
        scope: &str,
        partition: &str,
    ) -> Result<Option<Versioned<PoisonRecord>>, PoisonError> {
        let live = self
            .live
            .read()
            .map_err(|_| PoisonError::Storage("lock poisoned".into()))?;

        match live.get(&Self::key(scope, partition)) {
            Some(stored) => Ok(Some(Versioned {
                data: bitcode::deserialize(&stored.bytes)?,
                version: stored.version,
            })),
            None => Ok(None),
        }
    }

    fn insert(&self, record: &PoisonRecord) -> Result<Versioned<PoisonRecord>, PoisonError> {
        let key = Self::key(&record.partition_scope, &record.consumer_partition);
        let bytes = bitcode::serialize(record)?;

        let mut live = self
            .live
            .write()
            .map_err(|_| PoisonError::Storage("lock poisoned".into()))?;

        if let Some(existing) = live.get(&key) {
            return Err(PoisonError::ConcurrencyConflict {
                scope: record.partition_scope.clone(),
                partition: record.consumer_partition.clone(),
                expected: 0,
                actual: existing.version,
            });
        }

        live.insert(key, StoredRow { bytes, version: 1 });

        Ok(Versioned {
            data: record.clone(),
            version: 1,
        })
    }

    fn update(
        &self,
        record: &PoisonRecord,
        expected_version: u64,
    ) -> Result<Versioned<PoisonRecord>, PoisonError> {
        let key = Self::key(&record.partition_scope, &record.consumer_partition);
        let bytes = bitcode::serialize(record)?;

        let mut live = self
            .live
            .write()
            .map_err(|_| PoisonError::Storage("lock poisoned".into()))?;

        let actual_version = live.get(&key).map(|s| s.version).unwrap_or(0);
        if actual_version != expected_version {
            return Err(PoisonError::ConcurrencyConflict {
                scope: record.partition_scope.clone(),
                partition: record.consumer_partition.clone(),
                expected: expected_version,
                actual: actual_version,
            });
        }

        let new_version = actual_version + 1;
        live.insert(
            key,
            StoredRow {
                bytes,
                version: new_version,
            },
        );

        Ok(Versioned {
            data: record.clone(),
            version: new_version,
        })
    }

    fn delete(
        &self,
        scope: &str,
        partition: &str,
        expected_version: u64,
    ) -> Result<bool, PoisonError> {
        let key = Self::key(scope, partition);
        let mut live = self
            .live
            .write()
            .map_err(|_| PoisonError::Storage("lock poisoned".into()))?;

        let Some(stored) = live.get(&key) else {
            return Ok(false);
        };
        if stored.version != expected_version {
            return Err(PoisonError::ConcurrencyConflict {
                scope: scope.to_string(),
                partition: partition.to_string(),
                expected: expected_version,
                actual: stored.version,
            });
        }

        live.remove(&key);
        Ok(true)
    }

    fn insert_audit(&self, audit: &AuditRecord) -> Result<(), PoisonError> {
        let key = Self::key(&audit.partition_scope, &audit.row_key);
        let bytes = bitcode::serialize(audit)?;

        let mut rows = self
            .audit
            .write()
            .map_err(|_| PoisonError::Storage("lock poisoned".into()))?;

        if rows.contains_key(&key) {
            return Err(PoisonError::DuplicateKey {
                scope: audit.partition_scope.clone(),
                key: audit.row_key.clone(),
            });
        }

        rows.insert(key, bytes);
        Ok(())
    }

    fn audits(&self, scope: &str, partition: &str) -> Result<Vec<AuditRecord>, PoisonError> {
        let rows = self
            .audit
            .read()
            .map_err(|_| PoisonError::Storage("lock poisoned".into()))?;

        let mut audits = Vec::new();
        for ((row_scope, _), bytes) in rows.iter() {
            if row_scope != scope {
                continue;
            }
            let audit: AuditRecord = bitcode::deserialize(bytes)?;
            if audit.consumer_partition == partition {
                audits.push(audit);
            }
        }
        audits.sort_by_key(|audit| audit.audited_at);
        Ok(audits)
    }
}
