//! Execution identity.

use std::sync::{Arc, Mutex};

use resilient_events::{CancellationToken, EventEnvelope, RunAs, SubscriberHost, Subscription};
use uuid::Uuid;

use crate::support::{log, policy, received, recording};

#[test]
fn originating_uses_envelope_username() {
    let calls = log();
    let host = SubscriberHost::new(&policy()).subscriber(recording(
        "blah",
        &["Test.*"],
        &[],
        RunAs::Originating,
        &calls,
    ));

    host.dispatch_one(
        &EventEnvelope::new("Test.1", "create").with_username("TestUser"),
        &CancellationToken::new(),
    )
    .unwrap();

    assert_eq!(received(&calls)[0].username, "TestUser");
}

#[test]
fn system_uses_policy_username() {
    let calls = log();
    let host = SubscriberHost::new(&policy()).subscriber(recording(
        "blah",
        &["Test.*"],
        &[],
        RunAs::System,
        &calls,
    ));

    host.dispatch_one(
        &EventEnvelope::new("Test.1", "create").with_username("TestUser"),
        &CancellationToken::new(),
    )
    .unwrap();

    assert_eq!(received(&calls)[0].username, "svc-system");
}

#[test]
fn originating_without_actor_has_no_user() {
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    let host = SubscriberHost::new(&policy()).subscriber(
        Subscription::new(["Test.*"]).handle(move |ctx, _envelope| {
            *sink.lock().unwrap() = Some((ctx.has_user(), ctx.user_id().map(String::from)));
            Ok(())
        }),
    );

    host.dispatch_one(&EventEnvelope::new("Test.1", "create"), &CancellationToken::new())
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), Some((false, None)));
}

#[test]
fn context_carries_tenant_and_correlation() {
    let tenant = Uuid::from_u128(0x1234);
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    let host = SubscriberHost::new(&policy()).subscriber(
        Subscription::new(["Test.*"])
            .run_as(RunAs::System)
            .handle(move |ctx, _envelope| {
                *sink.lock().unwrap() = Some((
                    ctx.tenant_id(),
                    ctx.correlation_id().map(String::from),
                    ctx.user_id().map(String::from),
                ));
                Ok(())
            }),
    );

    host.dispatch_one(
        &EventEnvelope::new("Test.1", "create")
            .with_tenant_id(tenant)
            .with_correlation_id("corr-1")
            .with_user("jane", Some("u-1".into())),
        &CancellationToken::new(),
    )
    .unwrap();

    // Running as system drops the originating user id.
    assert_eq!(
        *seen.lock().unwrap(),
        Some((Some(tenant), Some("corr-1".to_string()), None))
    );
}

