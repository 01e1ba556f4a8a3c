//! Resilient consumption of a partition.
//!
//! [`ResilientConsumer`] applies the poison-tracking caller contract around a
//! [`SubscriberHost`](crate::SubscriberHost):
//!
//! 1. `check_poisoned`: a finalized skip is not dispatched at all;
//! 2. dispatch the envelope;
//! 3. on a processing failure, `mark_as_poisoned` and report an error so the
//!    position is not checkpointed and gets redelivered;
//! 4. on success after earlier failures, `remove_poisoned`.
//!
//! [`consume`] runs that loop on a background thread over any
//! [`PartitionSource`], checkpointing only after success or a deliberate skip.
//!
//! ```text
//!  PartitionSource ──poll──▶ ResilientConsumer::process ──▶ SubscriberHost
//!        ▲                          │        │
//!        └──checkpoint / abandon────┘        ▼
//!                                       PoisonStore ──▶ PoisonTable
//! ```

mod error;
mod partition;
mod resilient;
mod transport;

pub use error::{ConsumerError, SourceError};
pub use partition::{InMemoryPartition, PartitionSource};
pub use resilient::{ProcessOutcome, ResilientConsumer};
pub use transport::{consume, ConsumerHandle, ConsumerStats};
