use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::error::DispatchError;
use crate::envelope::EventEnvelope;
use crate::error::ConfigurationError;
use crate::matcher;
use crate::policy::ResilientConsumerPolicy;
use crate::subscriber::{
    ErrorPolicy, ExecutionContext, HandlerError, RunAs, Subscriber, Typed, TypedSubscriber,
};

/// Outcome counts of a successful dispatch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchResult {
    /// Envelopes received successfully by a subscriber.
    pub handled: usize,
    /// Envelopes no subscriber was interested in.
    pub unmatched: usize,
    /// Envelopes whose `Continue`-policy subscriber failed.
    pub swallowed: usize,
}

/// Routes envelopes to registered subscribers.
pub struct SubscriberHost {
    subscribers: Vec<Box<dyn Subscriber>>,
    system_username: String,
    allow_multiple: bool,
}

impl SubscriberHost {
    /// Create a host. `RunAs::System` subscribers use the policy's system username.
    pub fn new(policy: &ResilientConsumerPolicy) -> Self {
        Self {
            subscribers: Vec::new(),
            system_username: policy.system_username.clone(),
            allow_multiple: false,
        }
    }

    /// Register a subscriber.
    pub fn subscriber<S: Subscriber + 'static>(mut self, subscriber: S) -> Self {
        self.subscribers.push(Box::new(subscriber));
        self
    }

    /// Register a typed subscriber; its payload is decoded before `receive`.
    pub fn typed_subscriber<S: TypedSubscriber + 'static>(self, subscriber: S) -> Self {
        self.subscriber(Typed::new(subscriber))
    }

    /// Accept more than one envelope per `dispatch` call.
    pub fn allow_multiple_messages(mut self) -> Self {
        self.allow_multiple = true;
        self
    }

    pub fn allows_multiple_messages(&self) -> bool {
        self.allow_multiple
    }

    /// Names of the registered subscribers, in registration order.
    pub fn subscribers(&self) -> Vec<&str> {
        self.subscribers.iter().map(|s| s.name()).collect()
    }

    /// Find the single subscriber for `envelope`.
    pub fn resolve(
        &self,
        envelope: &EventEnvelope,
    ) -> Result<Option<&dyn Subscriber>, ConfigurationError> {
        let mut matched = self
            .subscribers
            .iter()
            .map(|s| &**s)
            .filter(|s| is_match(*s, envelope));

        let first = matched.next();
        let rest: Vec<&dyn Subscriber> = matched.collect();
        match first {
            Some(subscriber) if rest.is_empty() => Ok(Some(subscriber)),
            Some(subscriber) => {
                let subscribers = std::iter::once(subscriber)
                    .chain(rest)
                    .map(|s| s.name().to_string())
                    .collect::<Vec<_>>();
                error!(
                    subject = %envelope.subject,
                    action = %envelope.action,
                    subscribers = ?subscribers,
                    "ambiguous subscriber match"
                );
                Err(ConfigurationError::AmbiguousSubscribers {
                    subject: envelope.subject.clone(),
                    action: envelope.action.clone(),
                    subscribers,
                })
            }
            None => Ok(None),
        }
    }

    /// Dispatch one envelope.
    pub fn dispatch_one(
        &self,
        envelope: &EventEnvelope,
        cancel: &CancellationToken,
    ) -> Result<DispatchResult, DispatchError> {
        self.dispatch(std::slice::from_ref(envelope), cancel)
    }

    /// Dispatch envelopes to their subscribers, in order.
    ///
    /// Every envelope is routed before any subscriber runs, so an ambiguous
    /// match fails the whole call without side effects.
    pub fn dispatch(
        &self,
        envelopes: &[EventEnvelope],
        cancel: &CancellationToken,
    ) -> Result<DispatchResult, DispatchError> {
        if envelopes.len() > 1 && !self.allow_multiple {
            return Err(ConfigurationError::MultipleMessagesNotAllowed {
                count: envelopes.len(),
            }
            .into());
        }
        if self.subscribers.is_empty() {
            return Err(ConfigurationError::NoSubscribers.into());
        }

        let routes = envelopes
            .iter()
            .map(|envelope| -> Result<_, ConfigurationError> {
                Ok((envelope, self.resolve(envelope)?))
            })
            .collect::<Result<Vec<_>, ConfigurationError>>()?;

        let mut result = DispatchResult::default();

        for (envelope, subscriber) in routes {
            if cancel.is_cancelled() {
                return Err(DispatchError::Cancelled);
            }

            let Some(subscriber) = subscriber else {
                debug!(
                    event_id = %envelope.event_id,
                    subject = %envelope.subject,
                    action = %envelope.action,
                    "no subscriber for event"
                );
                result.unmatched += 1;
                continue;
            };

            let ctx = self.context_for(subscriber, envelope, cancel);
            match subscriber.receive(&ctx, envelope) {
                Ok(()) => result.handled += 1,
                Err(HandlerError::Cancelled) => return Err(DispatchError::Cancelled),
                Err(_) if cancel.is_cancelled() => return Err(DispatchError::Cancelled),
                Err(err) => match subscriber.on_error() {
                    ErrorPolicy::Continue => {
                        warn!(
                            event_id = %envelope.event_id,
                            subscriber = subscriber.name(),
                            error = %err,
                            "subscriber failed; continuing"
                        );
                        result.swallowed += 1;
                    }
                    ErrorPolicy::Stop => {
                        debug!(
                            event_id = %envelope.event_id,
                            subscriber = subscriber.name(),
                            error = %err,
                            "subscriber failed; stopping"
                        );
                        return Err(DispatchError::Handler {
                            subscriber: subscriber.name().to_string(),
                            event_id: envelope.event_id,
                            source: err,
                        });
                    }
                },
            }
        }

        Ok(result)
    }

    fn context_for(
        &self,
        subscriber: &dyn Subscriber,
        envelope: &EventEnvelope,
        cancel: &CancellationToken,
    ) -> ExecutionContext {
        let (username, user_id) = match subscriber.run_as() {
            RunAs::Originating => (envelope.username.clone(), envelope.user_id.clone()),
            RunAs::System => (Some(self.system_username.clone()), None),
        };
        ExecutionContext::new(
            username,
            user_id,
            envelope.tenant_id,
            envelope.correlation_id.clone(),
            subscriber.name().to_string(),
            cancel.clone(),
        )
    }
}

fn is_match(subscriber: &dyn Subscriber, envelope: &EventEnvelope) -> bool {
    let actions = subscriber.actions();
    let action_matches =
        actions.is_empty() || actions.iter().any(|a| a.eq_ignore_ascii_case(&envelope.action));

    action_matches
        && subscriber
            .subject_patterns()
            .iter()
            .any(|pattern| matcher::matches_default(pattern, &envelope.subject))
}
