use std::fmt;
use std::sync::Arc;

use crate::envelope::Envelope;
use crate::transport::{SendingAgent, TransportError, TransportUri};

/// Immutable binding of message type and content type to a sending agent.
#[derive(Clone)]
pub struct MessageRoute {
    message_type: String,
    content_type: String,
    destination: TransportUri,
    sender: Arc<dyn SendingAgent>,
}

impl MessageRoute {
    pub fn new(
        message_type: impl Into<String>,
        content_type: impl Into<String>,
        sender: Arc<dyn SendingAgent>,
    ) -> Self {
        Self {
            message_type: message_type.into(),
            content_type: content_type.into(),
            destination: sender.destination().clone(),
            sender,
        }
    }

    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn destination(&self) -> &TransportUri {
        &self.destination
    }

    pub fn sender(&self) -> &Arc<dyn SendingAgent> {
        &self.sender
    }

    /// Whether this route serves the envelope's explicit destination (and
    /// content type, when the envelope already set one).
    pub fn matches_envelope(&self, envelope: &Envelope) -> bool {
        envelope.destination.as_ref() == Some(&self.destination)
            && envelope
                .content_type
                .as_deref()
                .map_or(true, |content_type| content_type == self.content_type)
    }

    /// Copy of `envelope` addressed to this route. Keeps the envelope's id.
    ///
    /// Pre-serialized envelopes keep the content type their bytes are in.
    pub fn clone_for_sending(&self, envelope: &Envelope) -> Envelope {
        let mut outgoing = envelope.clone();
        outgoing.destination = Some(self.destination.clone());
        if outgoing.message.is_some() || outgoing.content_type.is_none() {
            outgoing.content_type = Some(self.content_type.clone());
        }
        if outgoing.message_type.is_none() {
            outgoing.message_type = Some(self.message_type.clone());
        }
        outgoing
    }

    /// Hand an envelope to this route's agent.
    pub fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        self.sender.enqueue_outgoing(envelope)
    }
}

impl fmt::Debug for MessageRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageRoute")
            .field("message_type", &self.message_type)
            .field("content_type", &self.content_type)
            .field("destination", &self.destination.to_string())
            .finish()
    }
}
