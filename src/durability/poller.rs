//! Threaded poller for scheduled envelopes.

use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

use super::EnvelopeStore;
use crate::envelope::Envelope;
use crate::error::BusError;

/// Hands a due envelope back to the router.
pub trait Resubmit: Send + Sync + 'static {
    fn resubmit(&self, envelope: Envelope) -> Result<(), BusError>;
}

impl<F> Resubmit for F
where
    F: Fn(Envelope) -> Result<(), BusError> + Send + Sync + 'static,
{
    fn resubmit(&self, envelope: Envelope) -> Result<(), BusError> {
        self(envelope)
    }
}

/// Poller timing.
#[derive(Debug, Clone, Copy)]
pub struct PollerOptions {
    /// Delay before the first poll.
    pub first_execution: Duration,
    /// Delay between polls.
    pub polling_time: Duration,
}

impl Default for PollerOptions {
    fn default() -> Self {
        Self {
            first_execution: Duration::ZERO,
            polling_time: Duration::from_secs(5),
        }
    }
}

/// Statistics from the scheduled job poller.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PollerStats {
    pub polls: usize,
    pub resubmitted: usize,
    pub failed: usize,
}

/// A background thread that resubmits due scheduled envelopes.
///
/// Polls never overlap: one thread runs them back to back with the polling
/// time in between. [`stop`](Self::stop) takes effect before the next wake;
/// a poll in progress finishes first.
///
/// ## Example
///
/// ```ignore
/// let poller = ScheduledJobPoller::spawn(store.clone(), resubmit, PollerOptions::default());
///
/// // ... do work ...
///
/// let stats = poller.stop();
/// println!("Resubmitted {} envelopes", stats.resubmitted);
/// ```
pub struct ScheduledJobPoller {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<PollerStats>>,
}

impl ScheduledJobPoller {
    pub fn spawn<S, R>(store: Arc<S>, resubmit: R, options: PollerOptions) -> Self
    where
        S: EnvelopeStore + ?Sized + 'static,
        R: Resubmit,
    {
        let (stop_tx, stop_rx) = channel();

        let handle = thread::spawn(move || {
            let mut stats = PollerStats::default();
            let mut wait = options.first_execution;
            info!(
                first_execution_ms = options.first_execution.as_millis() as u64,
                polling_time_ms = options.polling_time.as_millis() as u64,
                "scheduled job poller started"
            );

            loop {
                match stop_rx.recv_timeout(wait) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                }

                let outcome = Self::poll_once(store.as_ref(), &resubmit, SystemTime::now());
                stats.polls += 1;
                stats.resubmitted += outcome.resubmitted;
                stats.failed += outcome.failed;
                wait = options.polling_time;
            }

            info!(
                polls = stats.polls,
                resubmitted = stats.resubmitted,
                "scheduled job poller stopped"
            );
            stats
        });

        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Resubmit every envelope due at `now`, removing each one that was
    /// resubmitted. Envelopes that fail stay stored for the next poll, and
    /// an envelope rescheduled while it was being resubmitted keeps its new
    /// schedule.
    pub fn poll_once<S>(store: &S, resubmit: &dyn Resubmit, now: SystemTime) -> PollerStats
    where
        S: EnvelopeStore + ?Sized,
    {
        let mut stats = PollerStats {
            polls: 1,
            ..PollerStats::default()
        };

        let due = match store.fetch_due(now) {
            Ok(due) => due,
            Err(err) => {
                warn!(error = %err, "failed to fetch scheduled envelopes");
                return stats;
            }
        };

        for mut envelope in due {
            let id = envelope.id;
            let fetched_time = envelope.scheduled_time.take();

            match resubmit.resubmit(envelope) {
                Ok(()) => {
                    if let Err(err) = store.remove_scheduled(id, fetched_time) {
                        warn!(envelope_id = %id, error = %err, "failed to remove resubmitted envelope");
                    }
                    debug!(envelope_id = %id, "scheduled envelope resubmitted");
                    stats.resubmitted += 1;
                }
                Err(err) => {
                    warn!(envelope_id = %id, error = %err, "failed to resubmit scheduled envelope");
                    stats.failed += 1;
                }
            }
        }

        stats
    }

    /// Stop the poller and wait for it to finish. Returns stats.
    pub fn stop(mut self) -> PollerStats {
        let _ = self.stop_tx.send(());
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_default(),
            None => PollerStats::default(),
        }
    }

    /// Signal stop without waiting.
    pub fn signal_stop(&self) {
        let _ = self.stop_tx.send(());
    }
}

impl Drop for ScheduledJobPoller {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
    }
}
