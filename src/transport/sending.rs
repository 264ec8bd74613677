//! Sending side of a transport.

use std::sync::Arc;

use tracing::debug;

use super::{TransportError, TransportUri};
use crate::envelope::Envelope;
use crate::tracking::MessageLogger;

/// Protocol-specific delivery of envelopes to one destination.
///
/// Built by a transport for a resolved endpoint. Implementations own the
/// wire protocol; the rest of the runtime only sees this trait.
pub trait Sender: Send + Sync {
    fn destination(&self) -> &TransportUri;

    /// Deliver an envelope to the destination.
    fn send(&self, envelope: Envelope) -> Result<(), TransportError>;
}

/// A destination the router can hand outgoing envelopes to.
pub trait SendingAgent: Send + Sync {
    fn destination(&self) -> &TransportUri;

    /// Whether the receiving side accepts envelopes in this content type.
    fn accepts(&self, _content_type: &str) -> bool {
        true
    }

    /// Declared accepted content types; empty means any.
    fn accepted_content_types(&self) -> Vec<String> {
        Vec::new()
    }

    /// Queue an envelope for delivery.
    fn enqueue_outgoing(&self, envelope: Envelope) -> Result<(), TransportError>;
}

/// Default sending agent: records `Sent`, then delivers through a [`Sender`].
pub struct TransportAgent {
    sender: Arc<dyn Sender>,
    logger: Arc<dyn MessageLogger>,
}

impl TransportAgent {
    pub fn new(sender: Arc<dyn Sender>, logger: Arc<dyn MessageLogger>) -> Self {
        Self { sender, logger }
    }
}

impl SendingAgent for TransportAgent {
    fn destination(&self) -> &TransportUri {
        self.sender.destination()
    }

    fn enqueue_outgoing(&self, envelope: Envelope) -> Result<(), TransportError> {
        // A listener may pick the envelope up before `send` returns.
        self.logger.sent(&envelope);
        let id = envelope.id;
        self.sender.send(envelope)?;
        debug!(
            envelope_id = %id,
            destination = %self.destination(),
            "envelope sent"
        );
        Ok(())
    }
}

/// A statically configured subscriber restricted to some content types.
pub struct SubscriberAgent {
    inner: Arc<dyn SendingAgent>,
    accepted: Vec<String>,
}

impl SubscriberAgent {
    pub fn new(inner: Arc<dyn SendingAgent>, accepted: Vec<String>) -> Self {
        Self { inner, accepted }
    }
}

impl SendingAgent for SubscriberAgent {
    fn destination(&self) -> &TransportUri {
        self.inner.destination()
    }

    fn accepts(&self, content_type: &str) -> bool {
        self.accepted.is_empty() || self.accepted.iter().any(|t| t == content_type)
    }

    fn accepted_content_types(&self) -> Vec<String> {
        self.accepted.clone()
    }

    fn enqueue_outgoing(&self, envelope: Envelope) -> Result<(), TransportError> {
        self.inner.enqueue_outgoing(envelope)
    }
}
