use async_trait::async_trait;

use crate::error::StoreResult;

/// Blocking key-value storage for encoded payload snapshots.
///
/// Implementations must satisfy these rules:
/// - A missing key is `Ok(None)`, never an error.
/// - `persist` replaces whatever was stored under the key, in full.
/// - Errors are reported, never panicked on; the debouncer decides whether
///   they are fatal.
/// - Retention and expiry are the backend's business.
pub trait SnapshotStore: Send + Sync {
    /// Read the encoded snapshot stored under `key`.
    fn fetch(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Store `snapshot` under `key`, replacing any previous value.
    fn persist(&self, key: &str, snapshot: &[u8]) -> StoreResult<()>;
}

/// Asynchronous counterpart of [`SnapshotStore`] for network caches and
/// other backends whose calls suspend.
#[async_trait]
pub trait AsyncSnapshotStore: Send + Sync {
    /// Read the encoded snapshot stored under `key`.
    async fn fetch(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Store `snapshot` under `key`, replacing any previous value.
    async fn persist(&self, key: &str, snapshot: &[u8]) -> StoreResult<()>;
}
