use std::time::Duration;

use courier::transport::{
    ExternalTransport, LoopbackBuilder, LoopbackQueue, LoopbackTransport, Transport,
    TransportSettings,
};
use courier::{BusError, Cascade, MessagingSettings, TransportUri};

use crate::support::*;

// ============================================================================
// Reply channels
// ============================================================================

#[test]
fn unresolvable_reply_uri_leaves_candidates_unchanged() {
    let transport = ExternalTransport::new(
        "memory",
        TransportSettings::new()
            .with_endpoint("replies", LoopbackQueue::new("replies"))
            .with_reply_uri(memory_uri("missing")),
        LoopbackBuilder,
    );
    let candidates = vec![memory_uri("a"), memory_uri("b")];

    assert_eq!(transport.validate_and_choose_reply_channel(&candidates), candidates);
    assert_eq!(transport.reply_uri(), None);
}

#[test]
fn resolvable_reply_uri_is_added_once() {
    let transport = LoopbackTransport::loopback()
        .with_queue("replies")
        .with_reply_queue("replies");
    let reply: TransportUri = "loopback://replies".parse().unwrap();

    let chosen = transport.validate_and_choose_reply_channel(&[reply.clone()]);
    assert_eq!(chosen, vec![reply.clone()]);

    let chosen = transport.validate_and_choose_reply_channel(&[]);
    assert_eq!(chosen, vec![reply]);
}

// ============================================================================
// External listeners
// ============================================================================

#[test]
fn runtime_listens_to_external_addresses() {
    let (memory, queues) = memory_transport(&["inbox"]);
    let seen = Seen::new();
    let recorder = seen.clone();
    let settings =
        MessagingSettings::new("shipping").with_listener_poll_interval(Duration::from_millis(10));
    let (runtime, _session) = tracked(settings, |b| {
        b.with_transport(memory)
            .handle(move |order: &OrderPlaced, ctx| {
                recorder.push((order.order_id, ctx.source().map(str::to_string)));
                Ok(Cascade::none())
            })
            .listen_to(memory_uri("inbox"))
    });

    runtime.start().unwrap();

    // Another service drops an envelope on the shared queue.
    let (other, _) = tracked(MessagingSettings::new("orders"), |b| {
        b.with_transport(ExternalTransport::new(
            "memory",
            TransportSettings::new().with_endpoint("inbox", queues[0].clone()),
            LoopbackBuilder,
        ))
        .publish_message::<OrderPlaced>(memory_uri("inbox"))
    });
    other.publish(OrderPlaced { order_id: 42 }).unwrap();

    assert!(wait_until(Duration::from_secs(5), || seen.len() == 1));
    let stats = runtime.shutdown();

    assert_eq!(seen.all(), vec![(42, Some("orders".to_string()))]);
    assert!(stats
        .listeners
        .iter()
        .any(|(uri, stats)| *uri == memory_uri("inbox") && stats.received == 1));
}

#[test]
fn failing_listener_aborts_start() {
    let (runtime, _session) = tracked(MessagingSettings::new("shipping"), |b| {
        b.with_transport(rejecting_transport())
            .listen_to("reject://broker".parse().unwrap())
    });

    let err = runtime.start().unwrap_err();

    assert!(matches!(err, BusError::Transport(_)));
    assert!(err.to_string().contains("does not support listening"));
}

#[test]
fn listening_to_unknown_connection_fails() {
    let (memory, _queues) = memory_transport(&["inbox"]);
    let (runtime, _session) = tracked(MessagingSettings::new("shipping"), |b| {
        b.with_transport(memory).listen_to(memory_uri("outbox"))
    });

    let err = runtime.start().unwrap_err();

    assert_eq!(err.to_string(), "unknown memory connection named 'outbox'");
}
