use std::fmt;
use std::time::Duration;

/// What to do with an envelope whose handler failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Invoke the chain again immediately, within the same delivery.
    RetryInline,
    /// Hand the envelope to durable storage for delivery no earlier than now + delay.
    Reschedule(Duration),
    /// Return the envelope to its originating queue.
    Requeue,
    /// Terminal: deliver to the dead-letter destination.
    MoveToErrorQueue,
}

impl fmt::Display for ErrorAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorAction::RetryInline => write!(f, "retry inline"),
            ErrorAction::Reschedule(delay) => write!(f, "reschedule in {}ms", delay.as_millis()),
            ErrorAction::Requeue => write!(f, "requeue"),
            ErrorAction::MoveToErrorQueue => write!(f, "move to error queue"),
        }
    }
}
