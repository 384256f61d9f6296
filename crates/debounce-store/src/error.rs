use std::fmt::Display;

/// Errors from snapshot store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Encoding or decoding a snapshot failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A caller-supplied backend reported a failure.
    #[error("backend error: {0}")]
    Backend(String),

    /// An internal lock was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

impl StoreError {
    /// Wrap an arbitrary backend failure (cache client, database driver, ...).
    pub fn backend(err: impl Display) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Codec(e.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
