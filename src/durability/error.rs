use thiserror::Error;

/// Error type for envelope store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A shared lock was poisoned by a panicking thread.
    #[error("envelope store lock poisoned during {0}")]
    LockPoisoned(&'static str),
    /// The storage backend failed.
    #[error("envelope storage failed: {0}")]
    Storage(String),
}
