use courier::routing::{RoutingError, JSON};
use courier::transport::{local_queue_uri, TransportError};
use courier::{BusError, Cascade, Envelope, EventType, MessagingSettings, Serializers};

use crate::support::*;

// ============================================================================
// Local routes
// ============================================================================

#[test]
fn local_handler_without_subscribers_routes_once_with_same_id() {
    let (runtime, _session) = tracked(MessagingSettings::new("orders"), |b| {
        b.handle(|_: &OrderPlaced, _| Ok(Cascade::none()))
    });

    let envelope = Envelope::new(OrderPlaced { order_id: 1 });
    let id = envelope.id;
    let routed = runtime.router().route(envelope).unwrap();

    assert_eq!(routed.len(), 1);
    assert_eq!(routed[0].id, id);
    assert_eq!(routed[0].destination, Some(local_queue_uri("default")));
    assert_eq!(routed[0].source.as_deref(), Some("orders"));
}

#[test]
fn published_message_is_handled_from_the_default_queue() {
    let seen = Seen::new();
    let recorder = seen.clone();
    let (runtime, session) = tracked(MessagingSettings::new("orders"), |b| {
        b.handle(move |order: &OrderPlaced, _| {
            recorder.push(order.order_id);
            Ok(Cascade::none())
        })
    });

    let sent = runtime.publish(OrderPlaced { order_id: 7 }).unwrap();
    assert_eq!(runtime.local_queue("default").unwrap().len(), 1);

    assert_eq!(runtime.drain_local_queues().unwrap(), 1);
    assert_eq!(seen.all(), vec![7]);
    assert_eq!(
        session.events_for(sent[0].id),
        vec![
            EventType::Sent,
            EventType::Received,
            EventType::ExecutionStarted,
            EventType::ExecutionFinished,
            EventType::MessageSucceeded,
        ]
    );
    assert!(session.is_complete(sent[0].id));
}

#[test]
fn local_subscription_wins_over_default_queue() {
    let (runtime, _session) = tracked(MessagingSettings::new("orders"), |b| {
        b.handle(|_: &OrderPlaced, _| Ok(Cascade::none()))
            .subscribe_locally("OrderPlaced", "orders")
    });

    runtime.publish(OrderPlaced { order_id: 2 }).unwrap();

    assert_eq!(runtime.local_queue("orders").unwrap().len(), 1);
    assert!(runtime.local_queue("default").unwrap().is_empty());
}

// ============================================================================
// Remote subscribers
// ============================================================================

#[test]
fn single_remote_subscriber_keeps_the_id() {
    let (memory, queues) = memory_transport(&["shipping"]);
    let (runtime, _session) = tracked(MessagingSettings::new("orders"), |b| {
        b.with_transport(memory)
            .publish_message::<OrderPlaced>(memory_uri("shipping"))
    });

    let envelope = Envelope::new(OrderPlaced { order_id: 3 });
    let id = envelope.id;
    let sent = runtime.publish_envelope(envelope).unwrap();

    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].id, id);
    assert_eq!(queues[0].pending()[0].id, id);
}

#[test]
fn fan_out_gives_every_copy_a_fresh_id() {
    let (memory, queues) = memory_transport(&["shipping", "billing"]);
    let (runtime, session) = tracked(MessagingSettings::new("orders"), |b| {
        b.with_transport(memory)
            .publish_message::<OrderPlaced>(memory_uri("shipping"))
            .publish_message::<OrderPlaced>(memory_uri("billing"))
    });

    let envelope = Envelope::new(OrderPlaced { order_id: 4 });
    let id = envelope.id;
    let sent = runtime.publish_envelope(envelope).unwrap();

    assert_eq!(sent.len(), 2);
    assert_ne!(sent[0].id, id);
    assert_ne!(sent[1].id, id);
    assert_ne!(sent[0].id, sent[1].id);
    assert!(queues.iter().all(|q| q.len() == 1));
    assert_eq!(session.records_of(EventType::Sent).len(), 2);
}

#[test]
fn remote_subscribers_replace_the_local_route() {
    let (memory, queues) = memory_transport(&["shipping"]);
    let (runtime, _session) = tracked(MessagingSettings::new("orders"), |b| {
        b.handle(|_: &OrderPlaced, _| Ok(Cascade::none()))
            .with_transport(memory)
            .publish_message::<OrderPlaced>(memory_uri("shipping"))
    });

    runtime.publish(OrderPlaced { order_id: 5 }).unwrap();

    assert_eq!(queues[0].len(), 1);
    assert!(runtime.local_queue("default").unwrap().is_empty());
}

#[test]
fn delivered_content_type_is_one_both_sides_support() {
    let (memory, queues) = memory_transport(&["json-only", "anything"]);
    let (runtime, _session) = tracked(MessagingSettings::new("orders"), |b| {
        b.serializers(Serializers::new().json::<OrderPlaced>())
            .with_transport(memory)
            .publish_accepting("OrderPlaced", memory_uri("json-only"), vec![JSON.to_string()])
            .publish_message::<OrderPlaced>(memory_uri("anything"))
    });

    runtime.publish(OrderPlaced { order_id: 6 }).unwrap();

    for queue in &queues {
        let delivered = queue.pending();
        assert_eq!(delivered[0].content_type.as_deref(), Some(JSON));
    }
}

#[cfg(feature = "bitcode")]
#[test]
fn binary_codec_is_preferred_where_accepted() {
    use courier::routing::BITCODE;

    let (memory, queues) = memory_transport(&["json-only", "anything"]);
    let (runtime, _session) = tracked(MessagingSettings::new("orders"), |b| {
        b.serializers(
            Serializers::new()
                .json::<OrderPlaced>()
                .bitcode::<OrderPlaced>(),
        )
        .with_transport(memory)
        .publish_accepting("OrderPlaced", memory_uri("json-only"), vec![JSON.to_string()])
        .publish_message::<OrderPlaced>(memory_uri("anything"))
    });

    let sent = runtime.publish(OrderPlaced { order_id: 8 }).unwrap();
    assert_eq!(sent.len(), 2);

    assert_eq!(queues[0].pending()[0].content_type.as_deref(), Some(JSON));
    assert_eq!(queues[1].pending()[0].content_type.as_deref(), Some(BITCODE));
}

#[test]
fn subscriber_accepting_nothing_we_write_is_a_mismatch() {
    let (memory, queues) = memory_transport(&["xml"]);
    let (runtime, session) = tracked(MessagingSettings::new("orders"), |b| {
        b.with_transport(memory).publish_accepting(
            "OrderPlaced",
            memory_uri("xml"),
            vec!["application/xml".to_string()],
        )
    });

    let sent = runtime.publish(OrderPlaced { order_id: 9 }).unwrap();

    assert!(sent.is_empty());
    assert!(queues[0].is_empty());
    let mismatches = session.records_of(EventType::SubscriptionMismatch);
    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0].envelope.destination, Some(memory_uri("xml")));
    assert_eq!(session.records_of(EventType::NoRoutesFor).len(), 1);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn unrouted_message_is_recorded_as_no_routes() {
    let (runtime, session) = tracked(MessagingSettings::new("orders"), |b| b);

    let sent = runtime.publish(Unhandled).unwrap();

    assert!(sent.is_empty());
    assert_eq!(session.records_of(EventType::NoRoutesFor).len(), 1);
}

#[test]
fn envelope_without_body_fails_without_tracking() {
    let (runtime, session) = tracked(MessagingSettings::new("orders"), |b| {
        b.handle(|_: &OrderPlaced, _| Ok(Cascade::none()))
    });

    let err = runtime.publish_envelope(Envelope::empty()).unwrap_err();

    assert!(matches!(err, BusError::Routing(RoutingError::MissingMessage)));
    assert!(session.is_empty());
}

#[test]
fn unknown_connection_is_reported_to_the_caller() {
    let (memory, _queues) = memory_transport(&["shipping"]);
    let (runtime, _session) = tracked(MessagingSettings::new("orders"), |b| {
        b.with_transport(memory)
    });

    let err = runtime
        .send(memory_uri("nowhere"), OrderPlaced { order_id: 10 })
        .unwrap_err();

    assert_eq!(err.to_string(), "unknown memory connection named 'nowhere'");
    assert!(matches!(
        err,
        BusError::Routing(RoutingError::Transport(TransportError::UnknownConnection { .. }))
    ));
}

#[test]
fn unknown_scheme_is_reported_to_the_caller() {
    let (runtime, _session) = tracked(MessagingSettings::new("orders"), |b| b);

    let err = runtime
        .send(memory_uri("shipping"), OrderPlaced { order_id: 11 })
        .unwrap_err();

    assert!(err.to_string().contains("unknown transport protocol 'memory'"));
}

#[test]
fn rejected_delivery_is_undeliverable() {
    let (runtime, session) = tracked(MessagingSettings::new("orders"), |b| {
        b.with_transport(rejecting_transport())
            .publish_message::<OrderPlaced>("reject://broker".parse().unwrap())
    });

    let sent = runtime.publish(OrderPlaced { order_id: 12 }).unwrap();

    assert_eq!(sent.len(), 1);
    let undeliverable = session.records_of(EventType::Undeliverable);
    assert_eq!(undeliverable.len(), 1);
    assert_eq!(
        undeliverable[0].error.as_deref(),
        Some("envelope rejected: queue is full")
    );
    assert_eq!(
        session.events_for(sent[0].id),
        vec![EventType::Sent, EventType::Undeliverable]
    );
}

// ============================================================================
// Explicit destinations and pre-serialized envelopes
// ============================================================================

#[test]
fn send_keeps_the_id_and_stamps_the_source() {
    let (memory, queues) = memory_transport(&["shipping"]);
    let (runtime, _session) = tracked(MessagingSettings::new("orders"), |b| {
        b.with_transport(memory)
    });

    let sent = runtime
        .send(memory_uri("shipping"), OrderPlaced { order_id: 13 })
        .unwrap();

    let delivered = queues[0].pending();
    assert_eq!(delivered[0].id, sent.id);
    assert_eq!(delivered[0].source.as_deref(), Some("orders"));
    assert_eq!(delivered[0].destination, Some(memory_uri("shipping")));
}

#[test]
fn pre_serialized_envelope_is_decoded_before_handling() {
    let seen = Seen::new();
    let recorder = seen.clone();
    let (runtime, _session) = tracked(MessagingSettings::new("orders"), |b| {
        b.serializers(Serializers::new().json::<OrderPlaced>())
            .handle(move |order: &OrderPlaced, _| {
                recorder.push(order.clone());
                Ok(Cascade::none())
            })
    });

    let data = serde_json::to_vec(&OrderPlaced { order_id: 14 }).unwrap();
    runtime
        .publish_envelope(Envelope::from_data("OrderPlaced", JSON, data))
        .unwrap();
    runtime.drain_local_queues().unwrap();

    assert_eq!(seen.all(), vec![OrderPlaced { order_id: 14 }]);
}

#[test]
fn undecodable_envelope_is_moved_to_the_error_queue() {
    let (runtime, session) = tracked(MessagingSettings::new("orders"), |b| {
        b.serializers(Serializers::new().json::<OrderPlaced>())
            .handle(|_: &OrderPlaced, _| Ok(Cascade::none()))
    });

    runtime
        .publish_envelope(Envelope::from_data("OrderPlaced", JSON, b"not json".to_vec()))
        .unwrap();
    runtime.drain_local_queues().unwrap();

    assert_eq!(session.records_of(EventType::MovedToErrorQueue).len(), 1);
    assert_eq!(
        runtime.local_queue("default").unwrap().dead_letters().len(),
        1
    );
}

#[test]
fn received_type_without_handler_is_discarded() {
    let (runtime, session) = tracked(MessagingSettings::new("orders"), |b| b);

    let sent = runtime
        .send(local_queue_uri("default"), Unhandled)
        .unwrap();
    runtime.drain_local_queues().unwrap();

    let events = session.events_for(sent.id);
    assert!(events.contains(&EventType::NoHandlerFor));
    assert!(events.contains(&EventType::DiscardedEnvelope));
    assert!(session.is_complete(sent.id));
}
