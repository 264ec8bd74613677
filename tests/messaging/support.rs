//! Shared messages and fixtures.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use courier::runtime::MessagingRuntimeBuilder;
use courier::transport::{
    ExternalTransport, LoopbackBuilder, LoopbackQueue, Sender, TransportBuilder, TransportError,
    TransportSettings,
};
use courier::{Message, MessagingRuntime, MessagingSettings, TrackingSession, TransportUri};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Message)]
pub struct OrderPlaced {
    pub order_id: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Message)]
pub struct OrderShipped {
    pub order_id: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Message)]
#[message(
    name = "billing.invoice-due",
    local_queue = "important",
    header(key = "priority", value = "high")
)]
pub struct InvoiceDue {
    pub amount: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Message)]
pub struct Unhandled;

/// Failure raised by handlers under test.
#[derive(Debug, Error)]
pub enum ShippingError {
    #[error("carrier unavailable")]
    CarrierUnavailable,
    #[error("address rejected: {0}")]
    AddressRejected(String),
}

/// Collects values seen by handlers, across threads.
#[derive(Clone)]
pub struct Seen<T> {
    inner: Arc<Mutex<Vec<T>>>,
}

impl<T: Clone> Seen<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push(&self, value: T) {
        self.inner.lock().unwrap().push(value);
    }

    pub fn all(&self) -> Vec<T> {
        self.inner.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

/// Build a runtime with a [`TrackingSession`] attached.
pub fn tracked(
    settings: MessagingSettings,
    configure: impl FnOnce(MessagingRuntimeBuilder) -> MessagingRuntimeBuilder,
) -> (MessagingRuntime, Arc<TrackingSession>) {
    let session = Arc::new(TrackingSession::new(settings.service_name.clone()));
    let builder = MessagingRuntime::builder(settings).with_logger(session.clone());
    let runtime = configure(builder).build().unwrap();
    (runtime, session)
}

/// A second in-memory transport under the `memory://` scheme, standing in
/// for a broker. Each name becomes one queue.
pub fn memory_transport(names: &[&str]) -> (ExternalTransport<LoopbackBuilder>, Vec<LoopbackQueue>) {
    let queues: Vec<LoopbackQueue> = names.iter().map(|name| LoopbackQueue::new(*name)).collect();
    let settings = queues
        .iter()
        .fold(TransportSettings::new(), |settings, queue| {
            settings.with_endpoint(queue.name(), queue.clone())
        });
    (
        ExternalTransport::new("memory", settings, LoopbackBuilder),
        queues,
    )
}

pub fn memory_uri(name: &str) -> TransportUri {
    TransportUri::new("memory", name, "")
}

/// Destination that refuses every envelope.
pub struct RejectingSender {
    destination: TransportUri,
}

impl Sender for RejectingSender {
    fn destination(&self) -> &TransportUri {
        &self.destination
    }

    fn send(&self, _envelope: courier::Envelope) -> Result<(), TransportError> {
        Err(TransportError::Rejected("queue is full".to_string()))
    }
}

pub struct RejectingBuilder;

/// A `reject://` transport with a single `broker` connection.
pub fn rejecting_transport() -> ExternalTransport<RejectingBuilder> {
    ExternalTransport::new(
        "reject",
        TransportSettings::new().with_endpoint("broker", ()),
        RejectingBuilder,
    )
}

impl TransportBuilder for RejectingBuilder {
    type Endpoint = ();

    fn build_sender(
        &self,
        uri: &TransportUri,
        _endpoint: &(),
    ) -> Result<Arc<dyn Sender>, TransportError> {
        Ok(Arc::new(RejectingSender {
            destination: uri.clone(),
        }))
    }

    fn build_listening_agent(
        &self,
        uri: &TransportUri,
        _endpoint: &(),
        _options: &courier::transport::ListenerOptions,
    ) -> Result<Box<dyn courier::transport::ListeningAgent>, TransportError> {
        Err(TransportError::ConnectionFailed(format!(
            "{uri} does not support listening"
        )))
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
