//! Error types for handler execution and registration.

use std::error::Error;
use std::time::Duration;

use thiserror::Error;

/// Failure of one chain invocation.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// A handler returned an error.
    #[error("{0}")]
    Failed(Box<dyn Error + Send + Sync>),
    /// The invocation exceeded the hard execution deadline.
    #[error("handler execution exceeded {}ms", .0.as_millis())]
    Timeout(Duration),
    /// No chain exists for the message type.
    #[error("no handlers registered for message type '{0}'")]
    NoHandlers(String),
    /// The envelope body is not the type the handler expects.
    #[error("envelope body is not a '{0}'")]
    UnreadableBody(String),
}

impl HandlerError {
    pub fn failed(err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        HandlerError::Failed(err.into())
    }

    /// The failure as a concrete error type: the handler's own error for
    /// `Failed`, otherwise this error itself.
    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        if let HandlerError::Failed(inner) = self {
            if let Some(err) = inner.downcast_ref::<E>() {
                return Some(err);
            }
        }
        (self as &(dyn Error + 'static)).downcast_ref::<E>()
    }
}

/// Invalid handler registration, detected when the graph is compiled.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("no handlers registered for message type '{0}'")]
    NoHandlers(String),
    #[error("maximum attempts for '{0}' must be at least 1")]
    InvalidMaximumAttempts(String),
}
