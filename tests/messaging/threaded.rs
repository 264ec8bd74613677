//! Listener threads started by the runtime.

use std::time::Duration;

use courier::{BusError, Cascade, EventType, MessagingSettings};

use crate::support::*;

fn fast() -> MessagingSettings {
    MessagingSettings::new("orders")
        .with_listener_poll_interval(Duration::from_millis(10))
        .with_scheduled_job_polling_time(Duration::from_millis(10))
}

// ============================================================================
// Test 1: Published messages are handled on listener threads
// ============================================================================

#[test]
fn listeners_handle_published_messages() {
    let seen = Seen::new();
    let recorder = seen.clone();
    let caller = std::thread::current().id();
    let (runtime, _session) = tracked(fast(), |b| {
        b.handle(move |order: &OrderPlaced, _| {
            recorder.push((order.order_id, std::thread::current().id()));
            Ok(Cascade::none())
        })
    });

    runtime.start().unwrap();
    for order_id in 0..5 {
        runtime.publish(OrderPlaced { order_id }).unwrap();
    }

    assert!(wait_until(Duration::from_secs(5), || seen.len() == 5));
    let stats = runtime.shutdown();

    let handled = seen.all();
    let ids: Vec<u32> = handled.iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    assert!(handled.iter().all(|(_, thread)| *thread != caller));
    assert_eq!(stats.received(), 5);
}

// ============================================================================
// Test 2: Cascades flow between queues
// ============================================================================

#[test]
fn cascades_are_delivered_to_their_own_queue() {
    let invoices = Seen::new();
    let recorder = invoices.clone();
    let (runtime, session) = tracked(fast(), |b| {
        b.handle(|order: &OrderPlaced, _| {
            Ok(Cascade::none().publish(InvoiceDue {
                amount: u64::from(order.order_id) * 100,
            }))
        })
        .handle(move |invoice: &InvoiceDue, ctx| {
            recorder.push((invoice.amount, ctx.header("priority").map(str::to_string)));
            Ok(Cascade::none())
        })
    });

    runtime.start().unwrap();
    let sent = runtime.publish(OrderPlaced { order_id: 3 }).unwrap();

    assert!(wait_until(Duration::from_secs(5), || invoices.len() == 1));
    let stats = runtime.shutdown();

    assert_eq!(invoices.all(), vec![(300, Some("high".to_string()))]);

    let per_queue: Vec<(String, usize)> = stats
        .listeners
        .iter()
        .map(|(uri, stats)| (uri.connection_name().to_string(), stats.received))
        .collect();
    assert!(per_queue.contains(&("default".to_string(), 1)));
    assert!(per_queue.contains(&("important".to_string(), 1)));

    let invoice_records = session
        .records_of(EventType::MessageSucceeded)
        .into_iter()
        .filter(|r| r.envelope.message_type() == Some("billing.invoice-due"))
        .collect::<Vec<_>>();
    assert_eq!(invoice_records.len(), 1);
    assert_eq!(invoice_records[0].envelope.correlation_id, Some(sent[0].id));
}

// ============================================================================
// Test 3: Sent is tracked before the listener sees the envelope
// ============================================================================

#[test]
fn each_envelope_is_tracked_in_causal_order() {
    let (runtime, session) = tracked(fast(), |b| b.handle(|_: &OrderPlaced, _| Ok(Cascade::none())));

    runtime.start().unwrap();
    let ids: Vec<uuid::Uuid> = (0..50)
        .map(|order_id| runtime.publish(OrderPlaced { order_id }).unwrap()[0].id)
        .collect();

    let all_complete = || ids.iter().all(|id| session.is_complete(*id));
    assert!(wait_until(Duration::from_secs(5), all_complete));
    runtime.shutdown();

    for id in ids {
        assert_eq!(
            session.events_for(id),
            vec![
                EventType::Sent,
                EventType::Received,
                EventType::ExecutionStarted,
                EventType::ExecutionFinished,
                EventType::MessageSucceeded,
            ],
            "envelope {id}"
        );
    }
}

// ============================================================================
// Test 4: Lifecycle
// ============================================================================

#[test]
fn start_twice_is_rejected() {
    let (runtime, _session) = tracked(fast(), |b| b);

    runtime.start().unwrap();
    assert!(matches!(runtime.start(), Err(BusError::AlreadyStarted)));
    runtime.shutdown();
}

#[test]
fn shutdown_without_start_reports_nothing() {
    let (runtime, _session) = tracked(fast(), |b| b);

    let stats = runtime.shutdown();

    assert!(stats.listeners.is_empty());
    assert_eq!(stats.received(), 0);
    assert_eq!(stats.poller.polls, 0);
}

#[test]
fn runtime_can_restart_after_shutdown() {
    let seen = Seen::new();
    let recorder = seen.clone();
    let (runtime, _session) = tracked(fast(), |b| {
        b.handle(move |order: &OrderPlaced, _| {
            recorder.push(order.order_id);
            Ok(Cascade::none())
        })
    });

    runtime.start().unwrap();
    runtime.shutdown();

    runtime.publish(OrderPlaced { order_id: 1 }).unwrap();
    runtime.start().unwrap();
    assert!(wait_until(Duration::from_secs(5), || seen.len() == 1));
    runtime.shutdown();
}
