//! Subscribers: units of business logic that receive routed envelopes.
//!
//! A subscriber declares the subject patterns and actions it is interested in,
//! the identity it runs as, and what happens when it fails. Two shapes exist:
//!
//! - [`Subscriber`] receives the envelope only.
//! - [`TypedSubscriber`] also receives the payload decoded as `Self::Value`.
//!   It is adapted to [`Subscriber`] when registered, so decoding is resolved
//!   once per subscriber rather than looked up per event.
//!
//! Closure-based subscribers are built with [`Subscription`]:
//!
//! ```ignore
//! let host = SubscriberHost::new(policy).subscriber(
//!     Subscription::new(["Test.Blah.*"])
//!         .actions(["create", "update"])
//!         .handle(|ctx, envelope| {
//!             println!("{} as {}", envelope.subject, ctx.username());
//!             Ok(())
//!         }),
//! );
//! ```

mod context;
mod error;
mod subscription;

use serde::de::DeserializeOwned;

use crate::envelope::EventEnvelope;

pub use context::ExecutionContext;
pub use error::HandlerError;
pub use subscription::{FnSubscriber, Subscription};

/// Identity a subscriber executes as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunAs {
    /// The actor recorded on the envelope (`username`).
    #[default]
    Originating,
    /// The configured system username.
    System,
}

/// What the host does when `receive` fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Log and swallow; dispatch reports success.
    Continue,
    /// Propagate to the caller for poison tracking.
    #[default]
    Stop,
}

/// A value-less subscriber.
pub trait Subscriber: Send + Sync {
    /// Name used in logs and configuration errors.
    fn name(&self) -> &str;

    /// Subject patterns, matched with `*` wildcards on `.` segments.
    fn subject_patterns(&self) -> &[String];

    /// Actions handled, compared case-insensitively. Empty handles all actions.
    fn actions(&self) -> &[String];

    fn run_as(&self) -> RunAs {
        RunAs::Originating
    }

    fn on_error(&self) -> ErrorPolicy {
        ErrorPolicy::Stop
    }

    fn receive(&self, ctx: &ExecutionContext, envelope: &EventEnvelope)
        -> Result<(), HandlerError>;
}

/// A subscriber that receives the envelope payload decoded as `Self::Value`.
pub trait TypedSubscriber: Send + Sync {
    type Value: DeserializeOwned;

    fn name(&self) -> &str;

    fn subject_patterns(&self) -> &[String];

    fn actions(&self) -> &[String];

    fn run_as(&self) -> RunAs {
        RunAs::Originating
    }

    fn on_error(&self) -> ErrorPolicy {
        ErrorPolicy::Stop
    }

    fn receive(
        &self,
        ctx: &ExecutionContext,
        envelope: &EventEnvelope,
        value: Self::Value,
    ) -> Result<(), HandlerError>;
}

/// Adapts a [`TypedSubscriber`] to [`Subscriber`] by decoding before `receive`.
pub struct Typed<S> {
    inner: S,
}

impl<S: TypedSubscriber> Typed<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: TypedSubscriber> Subscriber for Typed<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn subject_patterns(&self) -> &[String] {
        self.inner.subject_patterns()
    }

    fn actions(&self) -> &[String] {
        self.inner.actions()
    }

    fn run_as(&self) -> RunAs {
        self.inner.run_as()
    }

    fn on_error(&self) -> ErrorPolicy {
        self.inner.on_error()
    }

    fn receive(
        &self,
        ctx: &ExecutionContext,
        envelope: &EventEnvelope,
    ) -> Result<(), HandlerError> {
        let value = envelope.value_as::<S::Value>()?;
        self.inner.receive(ctx, envelope, value)
    }
}
