use thiserror::Error;

use debounce_store::StoreError;

/// Errors surfaced to callers of the debouncer.
///
/// Store failures during fetch and persist are logged and absorbed; only a
/// payload that cannot be brought into JSON form reaches the caller.
#[derive(Debug, Error)]
pub enum DebounceError {
    #[error("payload is not representable as JSON: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("payload failed the codec round trip: {0}")]
    Codec(#[from] StoreError),
}

pub type DebounceResult<T> = Result<T, DebounceError>;
