use std::sync::Arc;
use std::time::{Duration, SystemTime};

use courier::durability::{EnvelopeStore, ScheduledJobPoller};
use courier::transport::local_queue_uri;
use courier::{
    Cascade, Envelope, ErrorAction, EventType, FailureMatch, HandlerGraph, InMemoryEnvelopeStore,
    MessagingSettings,
};

use crate::support::*;

/// Fails the first attempt with a reschedule, succeeds afterwards.
fn flaky(seen: Seen<(uuid::Uuid, u32)>, delay: Duration) -> HandlerGraph {
    HandlerGraph::new()
        .handle(move |_: &OrderShipped, ctx| {
            seen.push((ctx.envelope_id(), ctx.attempts()));
            if ctx.attempts() == 1 {
                return Err(ShippingError::CarrierUnavailable.into());
            }
            Ok(Cascade::none())
        })
        .on_failure(FailureMatch::any(), ErrorAction::Reschedule(delay))
}

#[test]
fn due_envelope_is_resubmitted_with_same_id_and_attempts() {
    let store = Arc::new(InMemoryEnvelopeStore::new());
    let seen = Seen::new();
    let settings = MessagingSettings::new("shipping").with_default_maximum_attempts(3);
    let (runtime, session) = tracked(settings, |b| {
        b.handlers(flaky(seen.clone(), Duration::ZERO))
            .with_store(store.clone())
    });

    let sent = runtime.publish(OrderShipped { order_id: 1 }).unwrap();
    let id = sent[0].id;
    runtime.drain_local_queues().unwrap();
    assert_eq!(store.scheduled().len(), 1);

    let stats = runtime.run_scheduled_jobs();
    assert_eq!(stats.resubmitted, 1);
    assert_eq!(stats.failed, 0);
    assert!(store.scheduled().is_empty());

    let resubmitted = runtime.local_queue("default").unwrap().pending();
    assert_eq!(resubmitted.len(), 1);
    assert_eq!(resubmitted[0].id, id);
    assert_eq!(resubmitted[0].attempts, 1);
    assert!(resubmitted[0].scheduled_time.is_none());

    runtime.drain_local_queues().unwrap();
    assert_eq!(seen.all(), vec![(id, 1), (id, 2)]);
    assert!(session.is_complete(id));

    // Nothing left to resubmit, so nothing is handled twice.
    assert_eq!(runtime.run_scheduled_jobs().resubmitted, 0);
    runtime.drain_local_queues().unwrap();
    assert_eq!(seen.len(), 2);
}

#[test]
fn failure_during_redelivery_keeps_the_new_schedule() {
    let store = Arc::new(InMemoryEnvelopeStore::new());
    let settings = MessagingSettings::new("shipping").with_default_maximum_attempts(3);
    let (runtime, session) = tracked(settings, |b| {
        b.handlers(
            HandlerGraph::new()
                .handle(|_: &OrderShipped, _| Err(ShippingError::CarrierUnavailable.into()))
                .on_failure(FailureMatch::any(), ErrorAction::Reschedule(Duration::ZERO)),
        )
        .with_store(store.clone())
    });

    let sent = runtime.publish(OrderShipped { order_id: 5 }).unwrap();
    let id = sent[0].id;
    runtime.drain_local_queues().unwrap();
    assert_eq!(store.scheduled().len(), 1);

    // Redeliver and handle before the poller removes the fetched entry,
    // the way a running listener would.
    let pipeline = Arc::clone(runtime.pipeline());
    let queue = runtime.local_queue("default").unwrap().clone();
    let redeliver = move |envelope: Envelope| -> Result<(), courier::BusError> {
        pipeline.dispatch(envelope)?;
        queue.drain_into(pipeline.as_ref())?;
        Ok(())
    };
    let stats = ScheduledJobPoller::poll_once(store.as_ref(), &redeliver, SystemTime::now());
    assert_eq!(stats.resubmitted, 1);

    let scheduled = store.scheduled();
    assert_eq!(scheduled.len(), 1);
    assert_eq!(scheduled[0].id, id);
    assert_eq!(scheduled[0].attempts, 2);
    assert_eq!(session.records_of(EventType::MessageFailed).len(), 2);
    assert_eq!(session.records_of(EventType::MovedToErrorQueue).len(), 0);
}

#[test]
fn envelopes_not_yet_due_stay_scheduled() {
    let store = Arc::new(InMemoryEnvelopeStore::new());
    let seen = Seen::new();
    let settings = MessagingSettings::new("shipping").with_default_maximum_attempts(3);
    let (runtime, _session) = tracked(settings, |b| {
        b.handlers(flaky(seen.clone(), Duration::from_secs(60)))
            .with_store(store.clone())
    });

    runtime.publish(OrderShipped { order_id: 2 }).unwrap();
    runtime.drain_local_queues().unwrap();

    let stats = runtime.run_scheduled_jobs();
    assert_eq!(stats.resubmitted, 0);
    assert_eq!(store.scheduled().len(), 1);
}

#[test]
fn pre_serialized_scheduled_envelope_is_decoded_on_redelivery() {
    let store = Arc::new(InMemoryEnvelopeStore::new());
    let seen = Seen::new();
    let recorder = seen.clone();
    let (runtime, _session) = tracked(MessagingSettings::new("shipping"), |b| {
        b.serializers(courier::Serializers::new().json::<OrderShipped>())
            .handle(move |order: &OrderShipped, _| {
                recorder.push(order.clone());
                Ok(Cascade::none())
            })
            .with_store(store.clone())
    });

    let data = serde_json::to_vec(&OrderShipped { order_id: 3 }).unwrap();
    let envelope = Envelope::from_data("OrderShipped", courier::routing::JSON, data)
        .with_destination(local_queue_uri("default"));
    store
        .schedule_envelope(envelope, SystemTime::now() - Duration::from_secs(1))
        .unwrap();

    assert_eq!(runtime.run_scheduled_jobs().resubmitted, 1);
    runtime.drain_local_queues().unwrap();

    assert_eq!(seen.all(), vec![OrderShipped { order_id: 3 }]);
}

#[test]
fn background_poller_redelivers_while_running() {
    let store = Arc::new(InMemoryEnvelopeStore::new());
    let seen = Seen::new();
    let settings = MessagingSettings::new("shipping")
        .with_default_maximum_attempts(3)
        .with_scheduled_job_polling_time(Duration::from_millis(10))
        .with_listener_poll_interval(Duration::from_millis(10));
    let (runtime, session) = tracked(settings, |b| {
        b.handlers(flaky(seen.clone(), Duration::from_millis(20)))
            .with_store(store.clone())
    });

    runtime.start().unwrap();
    let sent = runtime.publish(OrderShipped { order_id: 4 }).unwrap();
    let id = sent[0].id;

    assert!(wait_until(Duration::from_secs(5), || session.is_complete(id)));
    let stats = runtime.shutdown();

    assert_eq!(seen.all(), vec![(id, 1), (id, 2)]);
    assert_eq!(stats.poller.resubmitted, 1);
    assert!(stats.poller.polls >= 1);
    assert_eq!(stats.received(), 2);
    assert!(store.scheduled().is_empty());
}
