//! Closure-backed subscribers.

use serde::de::DeserializeOwned;

use super::{ErrorPolicy, ExecutionContext, HandlerError, RunAs, Subscriber};
use crate::envelope::EventEnvelope;

type Handler = Box<dyn Fn(&ExecutionContext, &EventEnvelope) -> Result<(), HandlerError> + Send + Sync>;

/// Builder for a closure-backed subscriber.
#[derive(Debug, Clone, Default)]
pub struct Subscription {
    name: Option<String>,
    patterns: Vec<String>,
    actions: Vec<String>,
    run_as: RunAs,
    on_error: ErrorPolicy,
}

impl Subscription {
    /// Subscribe to the given subject patterns.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Name used in logs. Defaults to the joined patterns.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Restrict to these actions (case-insensitive).
    pub fn actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions = actions.into_iter().map(Into::into).collect();
        self
    }

    pub fn run_as(mut self, run_as: RunAs) -> Self {
        self.run_as = run_as;
        self
    }

    pub fn on_error(mut self, on_error: ErrorPolicy) -> Self {
        self.on_error = on_error;
        self
    }

    /// Finish with a value-less handler.
    pub fn handle<F>(self, handler: F) -> FnSubscriber
    where
        F: Fn(&ExecutionContext, &EventEnvelope) -> Result<(), HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.build(Box::new(handler))
    }

    /// Finish with a handler that receives the payload decoded as `T`.
    pub fn handle_typed<T, F>(self, handler: F) -> FnSubscriber
    where
        T: DeserializeOwned + 'static,
        F: Fn(&ExecutionContext, &EventEnvelope, T) -> Result<(), HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.build(Box::new(move |ctx: &ExecutionContext, envelope: &EventEnvelope| {
            let value = envelope.value_as::<T>()?;
            handler(ctx, envelope, value)
        }))
    }

    fn build(self, handler: Handler) -> FnSubscriber {
        let name = self.name.unwrap_or_else(|| self.patterns.join(","));
        FnSubscriber {
            name,
            patterns: self.patterns,
            actions: self.actions,
            run_as: self.run_as,
            on_error: self.on_error,
            handler,
        }
    }
}

/// A subscriber built from a [`Subscription`].
pub struct FnSubscriber {
    name: String,
    patterns: Vec<String>,
    actions: Vec<String>,
    run_as: RunAs,
    on_error: ErrorPolicy,
    handler: Handler,
}

impl Subscriber for FnSubscriber {
    fn name(&self) -> &str {
        &self.name
    }

    fn subject_patterns(&self) -> &[String] {
        &self.patterns
    }

    fn actions(&self) -> &[String] {
        &self.actions
    }

    fn run_as(&self) -> RunAs {
        self.run_as
    }

    fn on_error(&self) -> ErrorPolicy {
        self.on_error
    }

    fn receive(
        &self,
        ctx: &ExecutionContext,
        envelope: &EventEnvelope,
    ) -> Result<(), HandlerError> {
        (self.handler)(ctx, envelope)
    }
}
