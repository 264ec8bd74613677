//! Listening side of a transport.
//!
//! A transport that can pull envelopes implements [`Listener`]; wrapping it
//! in a [`PollingAgent`] gives a background listening thread that hands each
//! envelope to a [`Receiver`] (the handler pipeline) together with the
//! [`ChannelCallback`] used to acknowledge, requeue or dead-letter it.

use std::sync::mpsc::{channel, Sender as StopSender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{info, warn};

use super::{TransportError, TransportUri};
use crate::envelope::Envelope;

/// Transport-side outcome handling for one received envelope.
pub trait ChannelCallback: Send + Sync {
    /// The envelope was handled (or discarded) and can be forgotten.
    fn complete(&self, envelope: &Envelope) -> Result<(), TransportError>;

    /// Put the envelope back on its queue for natural redelivery.
    fn requeue(&self, envelope: Envelope) -> Result<(), TransportError>;

    /// Put the envelope aside for a later retrieval.
    fn defer(&self, envelope: Envelope) -> Result<(), TransportError>;

    /// Deliver the envelope to the dead-letter destination.
    fn move_to_errors(&self, envelope: Envelope, reason: &str) -> Result<(), TransportError>;
}

/// Consumer of received envelopes.
pub trait Receiver: Send + Sync {
    fn received(&self, envelope: Envelope, callback: &dyn ChannelCallback);
}

/// Pull-based access to one incoming queue (point-to-point).
pub trait Listener: Send + Sync + 'static {
    /// Wait up to `timeout` for the next envelope.
    fn listen(&self, timeout: Duration) -> Result<Option<Envelope>, TransportError>;

    /// Callback used for envelopes pulled from this listener.
    fn callback(&self) -> Arc<dyn ChannelCallback>;
}

/// Options handed to transports when they build listening agents.
#[derive(Debug, Clone, Copy)]
pub struct ListenerOptions {
    pub poll_interval: Duration,
}

impl Default for ListenerOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// Statistics from a listening agent.
#[derive(Debug, Default, Clone)]
pub struct ListenerStats {
    /// Number of envelopes handed to the receiver.
    pub received: usize,
    /// Number of poll cycles completed.
    pub polls: usize,
}

/// A started or stopped listener bound to one address.
pub trait ListeningAgent: Send {
    fn address(&self) -> &TransportUri;

    /// Start handing incoming envelopes to `receiver`.
    fn start(&mut self, receiver: Arc<dyn Receiver>) -> Result<(), TransportError>;

    /// Stop listening and wait for the in-progress dispatch to finish.
    fn stop(&mut self) -> ListenerStats;
}

/// Background thread polling a [`Listener`].
pub struct PollingAgent<L> {
    address: TransportUri,
    listener: Arc<L>,
    options: ListenerOptions,
    stop_tx: Option<StopSender<()>>,
    handle: Option<JoinHandle<ListenerStats>>,
}

impl<L: Listener> PollingAgent<L> {
    pub fn new(address: TransportUri, listener: Arc<L>, options: ListenerOptions) -> Self {
        Self {
            address,
            listener,
            options,
            stop_tx: None,
            handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl<L: Listener> ListeningAgent for PollingAgent<L> {
    fn address(&self) -> &TransportUri {
        &self.address
    }

    fn start(&mut self, receiver: Arc<dyn Receiver>) -> Result<(), TransportError> {
        if self.handle.is_some() {
            return Err(TransportError::AlreadyListening(self.address.to_string()));
        }

        let (stop_tx, stop_rx) = channel();
        let listener = Arc::clone(&self.listener);
        let poll_interval = self.options.poll_interval;
        let address = self.address.clone();

        info!(address = %address, "listener started");

        let handle = thread::spawn(move || {
            let mut stats = ListenerStats::default();
            let callback = listener.callback();

            loop {
                match stop_rx.try_recv() {
                    Ok(()) | Err(TryRecvError::Disconnected) => break,
                    Err(TryRecvError::Empty) => {}
                }

                stats.polls += 1;

                match listener.listen(poll_interval) {
                    Ok(Some(envelope)) => {
                        stats.received += 1;
                        receiver.received(envelope, callback.as_ref());
                    }
                    Ok(None) => {}
                    Err(err) => {
                        warn!(address = %address, error = %err, "listener poll failed");
                        thread::sleep(poll_interval);
                    }
                }
            }

            info!(address = %address, received = stats.received, "listener stopped");
            stats
        });

        self.stop_tx = Some(stop_tx);
        self.handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) -> ListenerStats {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_default(),
            None => ListenerStats::default(),
        }
    }
}

impl<L> Drop for PollingAgent<L> {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }
}
