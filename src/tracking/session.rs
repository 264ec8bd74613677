use std::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use super::{EnvelopeRecord, EventType, MessageLogger, SubscriptionMismatch};
use crate::envelope::Envelope;

/// In-memory tracking sink with a monotonic session clock.
///
/// Records are appended in clock order. When an envelope reaches a terminal
/// event every record for that envelope is marked complete.
///
/// ```
/// use courier::tracking::{EventType, MessageLogger, TrackingSession};
/// use courier::Envelope;
///
/// let session = TrackingSession::new("billing");
/// let envelope = Envelope::empty();
/// session.sent(&envelope);
/// session.message_succeeded(&envelope);
///
/// let records = session.records();
/// assert_eq!(records[0].event_type, EventType::Sent);
/// assert!(records[0].session_time < records[1].session_time);
/// assert!(session.is_complete(envelope.id));
/// ```
pub struct TrackingSession {
    service_name: String,
    clock: AtomicU64,
    records: Mutex<Vec<Arc<EnvelopeRecord>>>,
}

impl TrackingSession {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            clock: AtomicU64::new(0),
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// All records, in session-clock order.
    pub fn records(&self) -> Vec<Arc<EnvelopeRecord>> {
        self.lock().clone()
    }

    pub fn records_of(&self, event_type: EventType) -> Vec<Arc<EnvelopeRecord>> {
        self.lock()
            .iter()
            .filter(|r| r.event_type == event_type)
            .cloned()
            .collect()
    }

    /// Records for one envelope.
    pub fn records_for(&self, envelope_id: Uuid) -> Vec<Arc<EnvelopeRecord>> {
        self.lock()
            .iter()
            .filter(|r| r.envelope.id == envelope_id)
            .cloned()
            .collect()
    }

    /// Event types recorded for one envelope, in order.
    pub fn events_for(&self, envelope_id: Uuid) -> Vec<EventType> {
        self.records_for(envelope_id)
            .iter()
            .map(|r| r.event_type)
            .collect()
    }

    pub fn is_complete(&self, envelope_id: Uuid) -> bool {
        self.lock()
            .iter()
            .any(|r| r.envelope.id == envelope_id && r.is_complete())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn record(&self, event_type: EventType, envelope: &Envelope, error: Option<&dyn Error>) {
        let mut records = self.lock();
        let session_time = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
        let record = Arc::new(EnvelopeRecord::new(
            event_type,
            envelope.clone(),
            session_time,
            error.map(|e| e.to_string()),
            self.service_name.clone(),
        ));
        records.push(record);

        if event_type.is_terminal() {
            records
                .iter()
                .filter(|r| r.envelope.id == envelope.id)
                .for_each(|r| r.mark_complete());
        }
    }

    // Recording must never fail: a poisoned list is still append-only.
    fn lock(&self) -> MutexGuard<'_, Vec<Arc<EnvelopeRecord>>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl MessageLogger for TrackingSession {
    fn sent(&self, envelope: &Envelope) {
        self.record(EventType::Sent, envelope, None);
    }

    fn received(&self, envelope: &Envelope) {
        self.record(EventType::Received, envelope, None);
    }

    fn execution_started(&self, envelope: &Envelope) {
        self.record(EventType::ExecutionStarted, envelope, None);
    }

    fn execution_finished(&self, envelope: &Envelope) {
        self.record(EventType::ExecutionFinished, envelope, None);
    }

    fn message_succeeded(&self, envelope: &Envelope) {
        self.record(EventType::MessageSucceeded, envelope, None);
    }

    fn message_failed(&self, envelope: &Envelope, error: &dyn Error) {
        self.record(EventType::MessageFailed, envelope, Some(error));
    }

    fn no_handler_for(&self, envelope: &Envelope) {
        self.record(EventType::NoHandlerFor, envelope, None);
    }

    fn no_routes_for(&self, envelope: &Envelope) {
        self.record(EventType::NoRoutesFor, envelope, None);
    }

    fn subscription_mismatch(&self, mismatch: &SubscriptionMismatch) {
        let mut envelope = Envelope::empty().with_destination(mismatch.destination.clone());
        envelope.message_type = Some(mismatch.message_type.clone());
        self.record(EventType::SubscriptionMismatch, &envelope, None);
    }

    fn undeliverable(&self, envelope: &Envelope, error: &dyn Error) {
        self.record(EventType::Undeliverable, envelope, Some(error));
    }

    fn moved_to_error_queue(&self, envelope: &Envelope, error: &dyn Error) {
        self.record(EventType::MovedToErrorQueue, envelope, Some(error));
    }

    fn discarded_envelope(&self, envelope: &Envelope) {
        self.record(EventType::DiscardedEnvelope, envelope, None);
    }
}
