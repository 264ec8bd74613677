use std::error::Error;
use std::fmt;
use std::sync::Arc;

use super::{Cascade, HandlerError, InvocationContext};
use crate::envelope::Envelope;
use crate::retry::RetryPolicy;

/// What a handler returns: messages to cascade, or its failure.
pub type HandlerResult = Result<Cascade, Box<dyn Error + Send + Sync>>;

pub(crate) type HandlerFn =
    Arc<dyn Fn(&Envelope, &InvocationContext<'_>) -> Result<Cascade, HandlerError> + Send + Sync>;

/// The handlers for one message type, with the chain's retry rules.
///
/// Immutable once compiled.
pub struct HandlerChain {
    message_type: String,
    handlers: Vec<HandlerFn>,
    retries: RetryPolicy,
    maximum_attempts: u32,
}

impl HandlerChain {
    pub(crate) fn new(
        message_type: String,
        handlers: Vec<HandlerFn>,
        retries: RetryPolicy,
        maximum_attempts: u32,
    ) -> Self {
        Self {
            message_type,
            handlers,
            retries,
            maximum_attempts,
        }
    }

    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn retries(&self) -> &RetryPolicy {
        &self.retries
    }

    pub fn maximum_attempts(&self) -> u32 {
        self.maximum_attempts
    }

    /// Invoke every handler in registration order.
    ///
    /// Stops at the first failure; cascades are only returned when all
    /// handlers succeed.
    pub fn invoke(&self, envelope: &Envelope) -> Result<Cascade, HandlerError> {
        if self.handlers.is_empty() {
            return Err(HandlerError::NoHandlers(self.message_type.clone()));
        }

        let context = InvocationContext::new(envelope);
        let mut cascade = Cascade::none();
        for handler in &self.handlers {
            cascade.extend(handler(envelope, &context)?);
        }
        Ok(cascade)
    }
}

impl fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerChain")
            .field("message_type", &self.message_type)
            .field("handlers", &self.handlers.len())
            .field("retries", &self.retries)
            .field("maximum_attempts", &self.maximum_attempts)
            .finish()
    }
}
