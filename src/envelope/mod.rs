//! Event envelopes and the partition coordinates they are delivered with.
//!
//! An [`EventEnvelope`] is the immutable unit of work routed to subscribers.
//! A [`Delivery`] pairs an envelope with the partition it was read from and
//! its position in that partition; it is what the poison store addresses.
//!
//! ## Wire format
//!
//! ```json
//! {
//!   "eventId": "3f0c…",
//!   "subject": "domain.entity.123",
//!   "action": "create",
//!   "key": 123,
//!   "timestamp": "2024-01-01T00:00:00Z",
//!   "username": "jane",
//!   "userid": "u-1",
//!   "value": { "name": "thing" }
//! }
//! ```

mod delivery;
mod event;

use std::fmt;

pub use delivery::{ConsumerPartition, Delivery, PartitionContext, PartitionPosition, PartitionScope};
pub use event::{EventEnvelope, EventKey};

/// Error materialising an envelope payload as a typed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The envelope carries no value.
    MissingValue { event_id: String },
    /// The value is present but does not deserialize as the requested type.
    Invalid(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::MissingValue { event_id } => {
                write!(f, "event {} has no value to decode", event_id)
            }
            DecodeError::Invalid(msg) => write!(f, "value decode failed: {}", msg),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Invalid(err.to_string())
    }
}
