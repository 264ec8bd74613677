use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use crate::envelope::Envelope;

/// Lifecycle events recorded against an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventType {
    Sent,
    Received,
    ExecutionStarted,
    ExecutionFinished,
    MessageSucceeded,
    MessageFailed,
    NoHandlerFor,
    NoRoutesFor,
    SubscriptionMismatch,
    Undeliverable,
    MovedToErrorQueue,
    DiscardedEnvelope,
}

impl EventType {
    /// Events after which the envelope will not be processed again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EventType::MessageSucceeded
                | EventType::MovedToErrorQueue
                | EventType::DiscardedEnvelope
                | EventType::NoHandlerFor
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One append-only audit entry.
#[derive(Debug)]
pub struct EnvelopeRecord {
    pub event_type: EventType,
    pub envelope: Envelope,
    /// Logical session clock value; strictly increasing within a session.
    pub session_time: u64,
    pub error: Option<String>,
    pub service_name: String,
    is_complete: AtomicBool,
}

impl EnvelopeRecord {
    pub(crate) fn new(
        event_type: EventType,
        envelope: Envelope,
        session_time: u64,
        error: Option<String>,
        service_name: String,
    ) -> Self {
        Self {
            event_type,
            envelope,
            session_time,
            error,
            service_name,
            is_complete: AtomicBool::new(false),
        }
    }

    /// Whether the envelope this record belongs to reached a terminal event.
    pub fn is_complete(&self) -> bool {
        self.is_complete.load(Ordering::Acquire)
    }

    pub(crate) fn mark_complete(&self) {
        self.is_complete.store(true, Ordering::Release);
    }
}
