//! OnError policy and cancellation.

use resilient_events::{
    CancellationToken, DispatchError, ErrorPolicy, EventEnvelope, HandlerError, RunAs,
    SubscriberHost, Subscription,
};

use crate::support::{failing, log, policy, received, recording};

#[test]
fn continue_swallows_errors() {
    let calls = log();
    let host = SubscriberHost::new(&policy()).subscriber(failing(
        "flaky",
        "Test.*",
        ErrorPolicy::Continue,
        &calls,
    ));

    let result = host
        .dispatch_one(&EventEnvelope::new("Test.1", "create"), &CancellationToken::new())
        .unwrap();

    assert_eq!(result.swallowed, 1);
    assert_eq!(result.handled, 0);
    assert_eq!(received(&calls).len(), 1);
}

#[test]
fn stop_propagates_handler_error() {
    let calls = log();
    let host = SubscriberHost::new(&policy()).subscriber(failing(
        "strict",
        "Test.*",
        ErrorPolicy::Stop,
        &calls,
    ));
    let envelope = EventEnvelope::new("Test.1", "create");

    let err = host
        .dispatch_one(&envelope, &CancellationToken::new())
        .unwrap_err();

    match &err {
        DispatchError::Handler {
            subscriber,
            event_id,
            source: HandlerError::Rejected(msg),
        } => {
            assert_eq!(subscriber, "strict");
            assert_eq!(*event_id, envelope.event_id);
            assert_eq!(msg, "cannot handle Test.1");
        }
        other => panic!("expected handler error, got {:?}", other),
    }
    assert!(err.is_processing_failure());
    assert_eq!(
        err.processing_failure().map(HandlerError::status),
        Some("Rejected")
    );
}

#[test]
fn stop_halts_the_rest_of_the_batch() {
    let calls = log();
    let host = SubscriberHost::new(&policy())
        .subscriber(failing("strict", "Bad.*", ErrorPolicy::Stop, &calls))
        .subscriber(recording("ok", &["Good.*"], &[], RunAs::Originating, &calls))
        .allow_multiple_messages();

    let batch = [
        EventEnvelope::new("Good.1", "create"),
        EventEnvelope::new("Bad.1", "create"),
        EventEnvelope::new("Good.2", "create"),
    ];
    assert!(host.dispatch(&batch, &CancellationToken::new()).is_err());

    let subjects: Vec<String> = received(&calls).into_iter().map(|r| r.subject).collect();
    assert_eq!(subjects, vec!["Good.1", "Bad.1"]);
}

#[test]
fn cancellation_is_not_swallowed_by_continue() {
    let host = SubscriberHost::new(&policy()).subscriber(
        Subscription::new(["Test.*"])
            .on_error(ErrorPolicy::Continue)
            .handle(|ctx, _envelope| {
                ctx.cancellation().cancel();
                ctx.check_cancelled()?;
                Ok(())
            }),
    );

    let err = host
        .dispatch_one(&EventEnvelope::new("Test.1", "create"), &CancellationToken::new())
        .unwrap_err();
    assert!(err.processing_failure().is_none());

    assert!(matches!(err, DispatchError::Cancelled));
    assert!(!err.is_processing_failure());
}

#[test]
fn error_after_cancel_reports_cancelled() {
    let cancel = CancellationToken::new();
    let host = SubscriberHost::new(&policy()).subscriber(
        Subscription::new(["Test.*"]).handle(|ctx, _envelope| {
            ctx.cancellation().cancel();
            Err(HandlerError::Rejected("interrupted".into()))
        }),
    );

    let err = host
        .dispatch_one(&EventEnvelope::new("Test.1", "create"), &cancel)
        .unwrap_err();

    assert!(matches!(err, DispatchError::Cancelled));
    assert!(cancel.is_cancelled());
}
