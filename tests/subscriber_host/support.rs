//! Test subscribers that record what they receive.

use std::sync::{Arc, Mutex};

use resilient_events::{
    ErrorPolicy, EventEnvelope, ExecutionContext, FnSubscriber, HandlerError, ResilientConsumerPolicy,
    RunAs, Subscription,
};

/// One recorded `receive` call.
#[derive(Debug, Clone, PartialEq)]
pub struct Received {
    pub subscriber: String,
    pub subject: String,
    pub action: String,
    pub username: String,
}

pub type Log = Arc<Mutex<Vec<Received>>>;

pub fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn policy() -> ResilientConsumerPolicy {
    ResilientConsumerPolicy::default().with_system_username("svc-system")
}

/// A subscriber that records each call and succeeds.
pub fn recording(name: &str, patterns: &[&str], actions: &[&str], run_as: RunAs, log: &Log) -> FnSubscriber {
    let log = Arc::clone(log);
    Subscription::new(patterns.iter().copied())
        .named(name)
        .actions(actions.iter().copied())
        .run_as(run_as)
        .handle(move |ctx, envelope| {
            record(&log, ctx, envelope);
            Ok(())
        })
}

/// A subscriber that records each call and then fails.
pub fn failing(name: &str, pattern: &str, on_error: ErrorPolicy, log: &Log) -> FnSubscriber {
    let log = Arc::clone(log);
    Subscription::new([pattern])
        .named(name)
        .on_error(on_error)
        .handle(move |ctx, envelope| {
            record(&log, ctx, envelope);
            Err(HandlerError::Rejected(format!("cannot handle {}", envelope.subject)))
        })
}

pub fn record(log: &Log, ctx: &ExecutionContext, envelope: &EventEnvelope) {
    log.lock().unwrap().push(Received {
        subscriber: ctx.subscriber().to_string(),
        subject: envelope.subject.clone(),
        action: envelope.action.clone(),
        username: ctx.username().to_string(),
    });
}

pub fn received(log: &Log) -> Vec<Received> {
    log.lock().unwrap().clone()
}
