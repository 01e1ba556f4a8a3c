//! Partitioned event subscribers that survive poison messages.
//!
//! Envelopes read from an at-least-once partitioned stream are routed to
//! exactly one registered subscriber by subject pattern and action. Failures
//! are tracked per partition in a durable poison store so a failing message
//! is retried, skipped on request, and audited, without blocking the
//! partition forever or silently dropping data.
//!
//! ## Layers
//!
//! - [`matcher`]: wildcard subject matching.
//! - [`EventEnvelope`] / [`Delivery`]: the event and where it came from.
//! - [`Subscriber`] / [`TypedSubscriber`] / [`Subscription`]: business logic.
//! - [`SubscriberHost`]: routing, run-as identity, error policy.
//! - [`PoisonStore`] over a [`PoisonTable`]: per-partition poison state and audit trail.
//! - [`ResilientConsumer`] and [`consumer::consume`]: the caller contract tying
//!   it together over a [`consumer::PartitionSource`].

pub mod consumer;
mod envelope;
mod error;
mod host;
pub mod matcher;
mod poison;
mod policy;
mod subscriber;

pub use consumer::{ConsumerError, ProcessOutcome, ResilientConsumer};
pub use envelope::{
    ConsumerPartition, DecodeError, Delivery, EventEnvelope, EventKey, PartitionContext,
    PartitionPosition, PartitionScope,
};
pub use error::ConfigurationError;
pub use host::{DispatchError, DispatchResult, SubscriberHost};
pub use poison::{
    AuditRecord, InMemoryPoisonTable, PoisonError, PoisonRecord, PoisonState, PoisonStore,
    PoisonTable, Versioned, STATUS_POISON_MISMATCH, STATUS_POISON_SKIPPED,
};
pub use policy::{PartitionManagement, ResilientConsumerPolicy};
pub use subscriber::{
    ErrorPolicy, ExecutionContext, FnSubscriber, HandlerError, RunAs, Subscriber, Subscription,
    Typed, TypedSubscriber,
};

// Re-exported so callers can cancel dispatch without naming tokio-util.
pub use tokio_util::sync::CancellationToken;
