//! Error types for transports.

use thiserror::Error;

/// Error type for transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The URI could not be parsed as `scheme://connection/path`.
    #[error("invalid transport uri '{0}'")]
    InvalidUri(String),
    /// No transport is registered for the URI's scheme.
    #[error("unknown transport protocol '{0}'")]
    UnknownProtocol(String),
    /// The connection name has no configured endpoint.
    #[error("unknown {protocol} connection named '{connection}'")]
    UnknownConnection { protocol: String, connection: String },
    /// Connection to the destination failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    /// The destination refused the envelope.
    #[error("envelope rejected: {0}")]
    Rejected(String),
    /// A shared lock was poisoned by a panicking thread.
    #[error("transport lock poisoned during {0}")]
    LockPoisoned(&'static str),
    /// The listening agent is already running.
    #[error("listener for '{0}' is already started")]
    AlreadyListening(String),
}
