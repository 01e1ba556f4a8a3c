//! Poison tracking: per-partition state for messages that keep failing.
//!
//! Each (partition scope, consumer partition) has at most one live
//! [`PoisonRecord`], describing the position at the head of the partition
//! that is currently failing. The state is derived from that record:
//!
//! ```text
//!                 mark_as_poisoned             skip_poisoned
//!   NotPoison ─────────────────────▶ PoisonRetry ───────────▶ PoisonSkip
//!       ▲                              │    ▲  mark (retries+1)    │
//!       │       remove_poisoned        │    └──────┘               │
//!       ├──────────────────────────────┘                           │
//!       │  check_poisoned (position mismatch → audit, reset)        │
//!       └──────────────────────────────────────────────────────────┘
//!                 check_poisoned (finalize skip → audit, delete)
//! ```
//!
//! Resolved records are copied to an append-only audit trail
//! ([`AuditRecord`]) before removal, so skips and resets stay visible.

mod in_memory;
mod record;
mod store;
mod table;

use std::fmt;

pub use in_memory::InMemoryPoisonTable;
pub use record::{AuditRecord, PoisonRecord};
pub use store::PoisonStore;
pub use table::PoisonTable;

/// Audit status written when a skip is finalized.
pub const STATUS_POISON_SKIPPED: &str = "PoisonSkipped";

/// Audit status written when the tracked position no longer matches the partition.
pub const STATUS_POISON_MISMATCH: &str = "PoisonMismatch";

/// Poison state of a delivery's partition, as seen from that delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoisonState {
    /// No failure is tracked for this position.
    NotPoison,
    /// This position has failed before and may be retried.
    PoisonRetry,
    /// This position was marked to be skipped; do not dispatch it.
    PoisonSkip,
}

/// A record with the storage version it was read or written at.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub data: T,
    pub version: u64,
}

/// Error type for poison store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoisonError {
    /// Optimistic concurrency conflict; another worker changed the row.
    ConcurrencyConflict {
        scope: String,
        partition: String,
        expected: u64,
        actual: u64,
    },
    /// Insert-only write hit an existing key.
    DuplicateKey { scope: String, key: String },
    /// Serialization/deserialization error.
    Serde(String),
    /// Storage-level error.
    Storage(String),
}

impl fmt::Display for PoisonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoisonError::ConcurrencyConflict {
                scope,
                partition,
                expected,
                actual,
            } => write!(
                f,
                "concurrency conflict on {}:{} (expected version {}, actual {})",
                scope, partition, expected, actual
            ),
            PoisonError::DuplicateKey { scope, key } => {
                write!(f, "row {}:{} already exists", scope, key)
            }
            PoisonError::Serde(msg) => write!(f, "poison record serialization error: {}", msg),
            PoisonError::Storage(msg) => write!(f, "poison storage error: {}", msg),
        }
    }
}

impl std::error::Error for PoisonError {}

impl From<bitcode::Error> for PoisonError {
    fn from(err: bitcode::Error) -> Self {
        PoisonError::Serde(err.to_string())
    }
}

impl From<serde_json::Error> for PoisonError {
    fn from(err: serde_json::Error) -> Self {
        PoisonError::Serde(err.to_string())
    }
}
