//! Error types for routing and serialization.

use thiserror::Error;

use crate::transport::TransportError;

/// Error type for serializer operations.
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("no writer for message type '{message_type}' in '{content_type}'")]
    NoWriter {
        message_type: String,
        content_type: String,
    },
    #[error("no reader for message type '{message_type}' in '{content_type}'")]
    NoReader {
        message_type: String,
        content_type: String,
    },
    #[error("failed to encode '{message_type}': {reason}")]
    Encode {
        message_type: String,
        reason: String,
    },
    #[error("failed to decode '{message_type}': {reason}")]
    Decode {
        message_type: String,
        reason: String,
    },
}

/// Error type for router operations.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// The envelope has neither a typed message nor data.
    #[error("envelope has neither a message nor data")]
    MissingMessage,
    /// A data-only envelope does not name its message type.
    #[error("envelope does not declare a message type")]
    MissingMessageType,
    /// Routing to an explicit destination without one.
    #[error("envelope has no destination")]
    MissingDestination,
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Serialization(#[from] SerializationError),
}
