//! Snapshot encodings.
//!
//! A codec turns a JSON tree into stored bytes and back. `encode` and
//! `decode` must be inverses over JSON values; the debouncer also relies on
//! the round trip to strip fields a payload does not actually carry.

use serde_json::Value;

use crate::error::StoreResult;

/// Serialization format used for stored snapshots.
pub trait PayloadCodec: Send + Sync {
    /// Encode a value for storage.
    fn encode(&self, value: &Value) -> StoreResult<Vec<u8>>;

    /// Decode stored bytes back into a value.
    fn decode(&self, bytes: &[u8]) -> StoreResult<Value>;
}

/// UTF-8 JSON text, the default snapshot format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JsonCodec;

impl PayloadCodec for JsonCodec {
    fn encode(&self, value: &Value) -> StoreResult<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode(&self, bytes: &[u8]) -> StoreResult<Value> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
