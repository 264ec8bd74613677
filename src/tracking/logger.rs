use std::error::Error;
use std::sync::Arc;

use tracing::{debug, error, info, trace, warn};

use crate::envelope::Envelope;
use crate::transport::TransportUri;

/// A subscriber that accepts none of a message type's content types.
#[derive(Debug, Clone)]
pub struct SubscriptionMismatch {
    pub message_type: String,
    pub destination: TransportUri,
    /// Content types the writer can produce.
    pub supported: Vec<String>,
    /// Content types the subscriber accepts.
    pub accepted: Vec<String>,
}

/// Sink for envelope lifecycle events.
///
/// Implementations must not panic or block for well-formed envelopes.
pub trait MessageLogger: Send + Sync {
    fn sent(&self, envelope: &Envelope);
    fn received(&self, envelope: &Envelope);
    fn execution_started(&self, envelope: &Envelope);
    fn execution_finished(&self, envelope: &Envelope);
    fn message_succeeded(&self, envelope: &Envelope);
    fn message_failed(&self, envelope: &Envelope, error: &dyn Error);
    fn no_handler_for(&self, envelope: &Envelope);
    fn no_routes_for(&self, envelope: &Envelope);
    fn subscription_mismatch(&self, mismatch: &SubscriptionMismatch);
    fn undeliverable(&self, envelope: &Envelope, error: &dyn Error);
    fn moved_to_error_queue(&self, envelope: &Envelope, error: &dyn Error);
    fn discarded_envelope(&self, envelope: &Envelope);
}

/// Emits one structured `tracing` event per lifecycle event.
#[derive(Debug, Clone)]
pub struct TracingLogger {
    service_name: String,
}

impl TracingLogger {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }
}

impl MessageLogger for TracingLogger {
    fn sent(&self, envelope: &Envelope) {
        debug!(
            service = %self.service_name,
            envelope_id = %envelope.id,
            message_type = envelope.message_type().unwrap_or_default(),
            destination = ?envelope.destination.as_ref().map(|d| d.to_string()),
            "sent"
        );
    }

    fn received(&self, envelope: &Envelope) {
        debug!(
            service = %self.service_name,
            envelope_id = %envelope.id,
            message_type = envelope.message_type().unwrap_or_default(),
            attempts = envelope.attempts,
            "received"
        );
    }

    fn execution_started(&self, envelope: &Envelope) {
        trace!(envelope_id = %envelope.id, attempts = envelope.attempts, "execution started");
    }

    fn execution_finished(&self, envelope: &Envelope) {
        trace!(envelope_id = %envelope.id, attempts = envelope.attempts, "execution finished");
    }

    fn message_succeeded(&self, envelope: &Envelope) {
        debug!(
            service = %self.service_name,
            envelope_id = %envelope.id,
            message_type = envelope.message_type().unwrap_or_default(),
            "message succeeded"
        );
    }

    fn message_failed(&self, envelope: &Envelope, err: &dyn Error) {
        warn!(
            service = %self.service_name,
            envelope_id = %envelope.id,
            message_type = envelope.message_type().unwrap_or_default(),
            attempts = envelope.attempts,
            error = %err,
            "message failed"
        );
    }

    fn no_handler_for(&self, envelope: &Envelope) {
        warn!(
            service = %self.service_name,
            envelope_id = %envelope.id,
            message_type = envelope.message_type().unwrap_or_default(),
            "no handler for message"
        );
    }

    fn no_routes_for(&self, envelope: &Envelope) {
        warn!(
            service = %self.service_name,
            envelope_id = %envelope.id,
            message_type = envelope.message_type().unwrap_or_default(),
            "no routes for message"
        );
    }

    fn subscription_mismatch(&self, mismatch: &SubscriptionMismatch) {
        warn!(
            service = %self.service_name,
            message_type = %mismatch.message_type,
            destination = %mismatch.destination,
            supported = ?mismatch.supported,
            accepted = ?mismatch.accepted,
            "subscriber accepts none of the supported content types"
        );
    }

    fn undeliverable(&self, envelope: &Envelope, err: &dyn Error) {
        error!(
            service = %self.service_name,
            envelope_id = %envelope.id,
            message_type = envelope.message_type().unwrap_or_default(),
            error = %err,
            "undeliverable"
        );
    }

    fn moved_to_error_queue(&self, envelope: &Envelope, err: &dyn Error) {
        error!(
            service = %self.service_name,
            envelope_id = %envelope.id,
            message_type = envelope.message_type().unwrap_or_default(),
            attempts = envelope.attempts,
            error = %err,
            "moved to error queue"
        );
    }

    fn discarded_envelope(&self, envelope: &Envelope) {
        info!(
            service = %self.service_name,
            envelope_id = %envelope.id,
            "discarded envelope"
        );
    }
}

/// Fans every event out to several sinks, in order.
#[derive(Default, Clone)]
pub struct CompositeLogger {
    sinks: Vec<Arc<dyn MessageLogger>>,
}

impl CompositeLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn MessageLogger>) -> Self {
        self.sinks.push(sink);
        self
    }

    fn each(&self, f: impl Fn(&dyn MessageLogger)) {
        for sink in &self.sinks {
            f(sink.as_ref());
        }
    }
}

impl MessageLogger for CompositeLogger {
    fn sent(&self, envelope: &Envelope) {
        self.each(|s| s.sent(envelope));
    }

    fn received(&self, envelope: &Envelope) {
        self.each(|s| s.received(envelope));
    }

    fn execution_started(&self, envelope: &Envelope) {
        self.each(|s| s.execution_started(envelope));
    }

    fn execution_finished(&self, envelope: &Envelope) {
        self.each(|s| s.execution_finished(envelope));
    }

    fn message_succeeded(&self, envelope: &Envelope) {
        self.each(|s| s.message_succeeded(envelope));
    }

    fn message_failed(&self, envelope: &Envelope, error: &dyn Error) {
        self.each(|s| s.message_failed(envelope, error));
    }

    fn no_handler_for(&self, envelope: &Envelope) {
        self.each(|s| s.no_handler_for(envelope));
    }

    fn no_routes_for(&self, envelope: &Envelope) {
        self.each(|s| s.no_routes_for(envelope));
    }

    fn subscription_mismatch(&self, mismatch: &SubscriptionMismatch) {
        self.each(|s| s.subscription_mismatch(mismatch));
    }

    fn undeliverable(&self, envelope: &Envelope, error: &dyn Error) {
        self.each(|s| s.undeliverable(envelope, error));
    }

    fn moved_to_error_queue(&self, envelope: &Envelope, error: &dyn Error) {
        self.each(|s| s.moved_to_error_queue(envelope, error));
    }

    fn discarded_envelope(&self, envelope: &Envelope) {
        self.each(|s| s.discarded_envelope(envelope));
    }
}
