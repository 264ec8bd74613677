//! Context passed to handlers, and the messages they cascade.

use std::sync::Arc;

use uuid::Uuid;

use crate::envelope::{Envelope, Message};
use crate::transport::TransportUri;

/// The context passed to every handler invocation.
///
/// Read-only view of the envelope being handled.
pub struct InvocationContext<'a> {
    envelope: &'a Envelope,
}

impl<'a> InvocationContext<'a> {
    pub(crate) fn new(envelope: &'a Envelope) -> Self {
        Self { envelope }
    }

    pub fn envelope(&self) -> &Envelope {
        self.envelope
    }

    pub fn envelope_id(&self) -> Uuid {
        self.envelope.id
    }

    /// Delivery attempt number, starting at 1.
    pub fn attempts(&self) -> u32 {
        self.envelope.attempts
    }

    pub fn correlation_id(&self) -> Option<Uuid> {
        self.envelope.correlation_id
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.envelope.header(key)
    }

    pub fn source(&self) -> Option<&str> {
        self.envelope.source.as_deref()
    }
}

/// One message cascaded out of a handler.
#[derive(Debug, Clone)]
pub struct Outgoing {
    pub message: Arc<dyn Message>,
    /// Explicit destination; `None` routes by message type.
    pub destination: Option<TransportUri>,
}

/// Messages a handler wants published once it succeeds.
///
/// ```
/// # use courier::handlers::Cascade;
/// assert!(Cascade::none().is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Cascade {
    outgoing: Vec<Outgoing>,
}

impl Cascade {
    pub fn none() -> Self {
        Self::default()
    }

    /// Publish a message routed by its type.
    pub fn publish(mut self, message: impl Message) -> Self {
        self.outgoing.push(Outgoing {
            message: Arc::new(message),
            destination: None,
        });
        self
    }

    /// Send a message to an explicit destination.
    pub fn send_to(mut self, destination: TransportUri, message: impl Message) -> Self {
        self.outgoing.push(Outgoing {
            message: Arc::new(message),
            destination: Some(destination),
        });
        self
    }

    pub fn extend(&mut self, other: Cascade) {
        self.outgoing.extend(other.outgoing);
    }

    pub fn len(&self) -> usize {
        self.outgoing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outgoing.is_empty()
    }

    pub fn outgoing(&self) -> &[Outgoing] {
        &self.outgoing
    }

    pub fn into_outgoing(self) -> Vec<Outgoing> {
        self.outgoing
    }
}
