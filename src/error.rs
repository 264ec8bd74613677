//! Crate-level error type.

use thiserror::Error;

use crate::durability::StoreError;
use crate::handlers::{ConfigurationError, HandlerError};
use crate::routing::{RoutingError, SerializationError};
use crate::transport::TransportError;

/// Any error surfaced by the messaging runtime.
#[derive(Debug, Error)]
pub enum BusError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Routing(#[from] RoutingError),
    #[error(transparent)]
    Handler(#[from] HandlerError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Serialization(#[from] SerializationError),
    /// Settings could not be loaded or are invalid.
    #[error("invalid messaging settings: {0}")]
    Settings(String),
    #[error("messaging runtime is already started")]
    AlreadyStarted,
    #[error("runtime lock poisoned during {0}")]
    LockPoisoned(&'static str),
}

impl From<serde_json::Error> for BusError {
    fn from(err: serde_json::Error) -> Self {
        BusError::Settings(err.to_string())
    }
}
