use courier::{
    BusError, Cascade, ErrorAction, EventType, FailureMatch, HandlerError, HandlerGraph,
    MessagingSettings,
};

use crate::support::*;

#[test]
fn invoke_runs_the_chain_on_the_calling_thread() {
    let caller = std::thread::current().id();
    let seen = Seen::new();
    let recorder = seen.clone();
    let (runtime, session) = tracked(MessagingSettings::new("orders"), |b| {
        b.handle(move |order: &OrderPlaced, _| {
            recorder.push((order.order_id, std::thread::current().id()));
            Ok(Cascade::none())
        })
    });

    runtime.invoke(OrderPlaced { order_id: 1 }).unwrap();

    assert_eq!(seen.all(), vec![(1, caller)]);
    assert!(runtime.local_queue("default").unwrap().is_empty());
    assert_eq!(session.records_of(EventType::MessageSucceeded).len(), 1);
}

#[test]
fn invoke_retries_inline_within_the_attempt_budget() {
    let attempts = Seen::new();
    let recorder = attempts.clone();
    let settings = MessagingSettings::new("shipping").with_default_maximum_attempts(3);
    let (runtime, session) = tracked(settings, |b| {
        b.handlers(
            HandlerGraph::new()
                .handle(move |_: &OrderShipped, ctx| {
                    recorder.push(ctx.attempts());
                    if ctx.attempts() < 3 {
                        return Err(ShippingError::CarrierUnavailable.into());
                    }
                    Ok(Cascade::none())
                })
                .on_failure(FailureMatch::any(), ErrorAction::RetryInline),
        )
    });

    runtime.invoke(OrderShipped { order_id: 2 }).unwrap();

    assert_eq!(attempts.all(), vec![1, 2, 3]);
    assert_eq!(session.records_of(EventType::MessageFailed).len(), 2);
    assert_eq!(session.records_of(EventType::MessageSucceeded).len(), 1);
}

#[test]
fn invoke_stops_retrying_when_attempts_run_out() {
    let attempts = Seen::new();
    let recorder = attempts.clone();
    let settings = MessagingSettings::new("shipping").with_default_maximum_attempts(2);
    let (runtime, session) = tracked(settings, |b| {
        b.handlers(
            HandlerGraph::new()
                .handle(move |_: &OrderShipped, ctx| {
                    recorder.push(ctx.attempts());
                    Err(ShippingError::CarrierUnavailable.into())
                })
                .on_failure(FailureMatch::any(), ErrorAction::RetryInline),
        )
    });

    let err = runtime.invoke(OrderShipped { order_id: 3 }).unwrap_err();

    assert_eq!(attempts.all(), vec![1, 2]);
    assert_eq!(err.to_string(), "carrier unavailable");
    assert_eq!(session.records_of(EventType::MessageFailed).len(), 2);
}

#[test]
fn invoke_returns_failures_that_are_not_inline_retries() {
    let settings = MessagingSettings::new("shipping").with_default_maximum_attempts(3);
    let (runtime, session) = tracked(settings, |b| {
        b.handle(|_: &OrderShipped, _| Err(ShippingError::CarrierUnavailable.into()))
    });

    let err = runtime.invoke(OrderShipped { order_id: 4 }).unwrap_err();

    match err {
        BusError::Handler(failure) => {
            assert!(failure.downcast_ref::<ShippingError>().is_some());
        }
        other => panic!("expected handler failure, got {other:?}"),
    }
    assert_eq!(session.records_of(EventType::MessageFailed).len(), 1);
    assert!(session.records_of(EventType::MovedToErrorQueue).is_empty());
}

#[test]
fn invoke_without_handler_is_an_error() {
    let (runtime, session) = tracked(MessagingSettings::new("orders"), |b| b);

    let err = runtime.invoke(Unhandled).unwrap_err();

    assert!(matches!(err, BusError::Handler(HandlerError::NoHandlers(ref t)) if t == "Unhandled"));
    assert_eq!(session.records_of(EventType::NoHandlerFor).len(), 1);
}

#[test]
fn invoke_publishes_cascaded_messages() {
    let shipped = Seen::new();
    let recorder = shipped.clone();
    let (runtime, _session) = tracked(MessagingSettings::new("orders"), |b| {
        b.handle(|order: &OrderPlaced, _| {
            Ok(Cascade::none().publish(OrderShipped {
                order_id: order.order_id,
            }))
        })
        .handle(move |order: &OrderShipped, ctx| {
            recorder.push((order.order_id, ctx.correlation_id()));
            Ok(Cascade::none())
        })
    });

    runtime.invoke(OrderPlaced { order_id: 5 }).unwrap();
    assert_eq!(shipped.len(), 0);

    runtime.drain_local_queues().unwrap();
    let seen = shipped.all();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, 5);
    assert!(seen[0].1.is_some());
}
