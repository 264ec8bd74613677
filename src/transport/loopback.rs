//! In-process loopback transport.
//!
//! Every connection name is a [`LoopbackQueue`]: a thread-safe FIFO that
//! implements [`Listener`] (competing consumers) and keeps its own
//! dead-letter list. Useful for local handler queues, testing, and
//! single-process deployments.
//!
//! ## Example
//!
//! ```
//! use courier::transport::{LoopbackTransport, Transport, TransportUri};
//!
//! let transport = LoopbackTransport::loopback().with_queue("cascading");
//! let uri = TransportUri::parse("loopback://cascading").unwrap();
//! let sender = transport.build_sender(&uri).unwrap();
//! assert_eq!(sender.destination(), &uri);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use tracing::warn;

use super::{
    ChannelCallback, ExternalTransport, Listener, ListenerOptions, ListeningAgent, PollingAgent,
    Receiver, Sender, TransportBuilder, TransportError, TransportSettings, TransportUri,
};
use crate::envelope::Envelope;

/// URI scheme of the loopback transport.
pub const LOOPBACK: &str = "loopback";

/// Connection name of the default local queue.
pub const DEFAULT_QUEUE: &str = "default";

/// An envelope that was moved to a queue's error list.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub envelope: Envelope,
    pub reason: String,
}

/// In-memory queue of envelopes.
///
/// Cloning shares the same queue.
#[derive(Clone)]
pub struct LoopbackQueue {
    name: String,
    pending: Arc<Mutex<VecDeque<Envelope>>>,
    ready: Arc<Condvar>,
    dead_letters: Arc<Mutex<Vec<DeadLetter>>>,
}

impl LoopbackQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pending: Arc::new(Mutex::new(VecDeque::new())),
            ready: Arc::new(Condvar::new()),
            dead_letters: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn enqueue(&self, envelope: Envelope) -> Result<(), TransportError> {
        self.pending
            .lock()
            .map_err(|_| TransportError::LockPoisoned("enqueue"))?
            .push_back(envelope);
        self.ready.notify_one();
        Ok(())
    }

    /// Take the next envelope without waiting.
    pub fn try_dequeue(&self) -> Result<Option<Envelope>, TransportError> {
        Ok(self
            .pending
            .lock()
            .map_err(|_| TransportError::LockPoisoned("dequeue"))?
            .pop_front())
    }

    /// Synchronously hand every envelope currently queued to `receiver`.
    ///
    /// Envelopes requeued while draining wait for the next drain. Returns the
    /// number of envelopes dispatched.
    pub fn drain_into(&self, receiver: &dyn Receiver) -> Result<usize, TransportError> {
        let count = self.len();
        let callback = LoopbackCallback::new(self.clone());
        let mut dispatched = 0;

        for _ in 0..count {
            match self.try_dequeue()? {
                Some(envelope) => {
                    receiver.received(envelope, &callback);
                    dispatched += 1;
                }
                None => break,
            }
        }

        Ok(dispatched)
    }

    /// Snapshot of the queued envelopes, in delivery order.
    pub fn pending(&self) -> Vec<Envelope> {
        match self.pending.lock() {
            Ok(pending) => pending.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self.pending.lock() {
            Ok(pending) => pending.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Envelopes moved to this queue's error list.
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        match self.dead_letters.lock() {
            Ok(dead) => dead.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn push_dead_letter(&self, envelope: Envelope, reason: &str) -> Result<(), TransportError> {
        self.dead_letters
            .lock()
            .map_err(|_| TransportError::LockPoisoned("move to errors"))?
            .push(DeadLetter {
                envelope,
                reason: reason.to_string(),
            });
        Ok(())
    }
}

impl Listener for LoopbackQueue {
    fn listen(&self, timeout: Duration) -> Result<Option<Envelope>, TransportError> {
        let deadline = Instant::now() + timeout;
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| TransportError::LockPoisoned("listen"))?;

        loop {
            if let Some(envelope) = pending.pop_front() {
                return Ok(Some(envelope));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            let (guard, _) = self
                .ready
                .wait_timeout(pending, deadline - now)
                .map_err(|_| TransportError::LockPoisoned("listen"))?;
            pending = guard;
        }
    }

    fn callback(&self) -> Arc<dyn ChannelCallback> {
        Arc::new(LoopbackCallback::new(self.clone()))
    }
}

/// Outcome handling for envelopes pulled from a [`LoopbackQueue`].
pub struct LoopbackCallback {
    queue: LoopbackQueue,
}

impl LoopbackCallback {
    pub fn new(queue: LoopbackQueue) -> Self {
        Self { queue }
    }
}

impl ChannelCallback for LoopbackCallback {
    fn complete(&self, _envelope: &Envelope) -> Result<(), TransportError> {
        Ok(())
    }

    fn requeue(&self, envelope: Envelope) -> Result<(), TransportError> {
        self.queue.enqueue(envelope)
    }

    fn defer(&self, envelope: Envelope) -> Result<(), TransportError> {
        self.queue.enqueue(envelope)
    }

    fn move_to_errors(&self, envelope: Envelope, reason: &str) -> Result<(), TransportError> {
        warn!(
            queue = %self.queue.name(),
            envelope_id = %envelope.id,
            reason,
            "envelope moved to error queue"
        );
        self.queue.push_dead_letter(envelope, reason)
    }
}

/// Sender that appends to a [`LoopbackQueue`].
pub struct LoopbackSender {
    destination: TransportUri,
    queue: LoopbackQueue,
}

impl Sender for LoopbackSender {
    fn destination(&self) -> &TransportUri {
        &self.destination
    }

    fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        self.queue.enqueue(envelope)
    }
}

/// Builds loopback senders and listeners for resolved queues.
pub struct LoopbackBuilder;

impl TransportBuilder for LoopbackBuilder {
    type Endpoint = LoopbackQueue;

    fn build_sender(
        &self,
        uri: &TransportUri,
        endpoint: &LoopbackQueue,
    ) -> Result<Arc<dyn Sender>, TransportError> {
        Ok(Arc::new(LoopbackSender {
            destination: uri.clone(),
            queue: endpoint.clone(),
        }))
    }

    fn build_listening_agent(
        &self,
        uri: &TransportUri,
        endpoint: &LoopbackQueue,
        options: &ListenerOptions,
    ) -> Result<Box<dyn ListeningAgent>, TransportError> {
        Ok(Box::new(PollingAgent::new(
            uri.clone(),
            Arc::new(endpoint.clone()),
            *options,
        )))
    }
}

/// The loopback transport: named in-memory queues under `loopback://`.
pub type LoopbackTransport = ExternalTransport<LoopbackBuilder>;

impl ExternalTransport<LoopbackBuilder> {
    /// A loopback transport with only the default queue.
    pub fn loopback() -> Self {
        let settings = TransportSettings::new()
            .with_endpoint(DEFAULT_QUEUE, LoopbackQueue::new(DEFAULT_QUEUE));
        ExternalTransport::new(LOOPBACK, settings, LoopbackBuilder)
    }

    /// Add a named queue (no-op if it already exists).
    pub fn with_queue(mut self, name: &str) -> Self {
        self.add_queue(name);
        self
    }

    pub fn add_queue(&mut self, name: &str) {
        if !self.settings().contains(name) {
            self.settings_mut()
                .add_endpoint(name, LoopbackQueue::new(name));
        }
    }

    /// Reply address for this transport; must name a configured queue to take effect.
    pub fn with_reply_queue(mut self, name: &str) -> Self {
        let settings = std::mem::take(self.settings_mut());
        *self.settings_mut() = settings.with_reply_uri(local_queue_uri(name));
        self
    }

    pub fn queue(&self, name: &str) -> Option<&LoopbackQueue> {
        self.settings().endpoint_for(&local_queue_uri(name))
    }
}

/// URI of a named local queue.
pub fn local_queue_uri(name: &str) -> TransportUri {
    TransportUri::new(LOOPBACK, name, "")
}
