//! SubscriberHost: routes envelopes to the single matching subscriber.
//!
//! For each envelope the host evaluates every registered subscriber: the
//! action must match case-insensitively and the subject must match one of the
//! subscriber's patterns. Exactly one subscriber may match; none is a silent
//! no-op and more than one is a [`ConfigurationError`](crate::ConfigurationError).
//!
//! ## Example
//!
//! ```ignore
//! use resilient_events::{ResilientConsumerPolicy, SubscriberHost, Subscription, RunAs};
//! use tokio_util::sync::CancellationToken;
//!
//! let host = SubscriberHost::new(&ResilientConsumerPolicy::default())
//!     .subscriber(
//!         Subscription::new(["Test.Blah.*"])
//!             .actions(["create", "update"])
//!             .run_as(RunAs::Originating)
//!             .handle(|ctx, envelope| { /* ... */ Ok(()) }),
//!     );
//!
//! let result = host.dispatch(&[envelope], &CancellationToken::new())?;
//! ```

mod error;
mod subscriber_host;

pub use error::DispatchError;
pub use subscriber_host::{DispatchResult, SubscriberHost};
