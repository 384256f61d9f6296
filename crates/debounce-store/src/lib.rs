//! Snapshot storage for identify payload debouncing.
//!
//! The debouncer never owns storage. It is handed a store and calls exactly
//! two operations on it: fetch the previous snapshot for a key, and persist
//! the updated one. This crate defines those contracts and ships a few
//! backends.
//!
//! # Contracts
//!
//! - [`SnapshotStore`] -- blocking fetch/persist
//! - [`AsyncSnapshotStore`] -- the same, for backends that suspend
//! - [`PayloadCodec`] -- how snapshots become bytes ([`JsonCodec`] by default)
//!
//! # Backends
//!
//! - [`MemoryStore`] -- `HashMap`-based, optional TTL, both contracts
//! - [`FileStore`] -- one file per key, both contracts
//! - [`FnStore`] / [`AsyncFnStore`] -- caller-supplied closures
//!
//! # Design Rules
//!
//! 1. "Not found" is `Ok(None)`, not an error.
//! 2. Persist writes the whole snapshot or nothing.
//! 3. Expiry and retention belong to the backend.
//! 4. No locking across fetch and persist; callers needing per-key ordering
//!    serialize their calls.

pub mod adapter;
pub mod codec;
pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use adapter::{AsyncFnStore, FnStore};
pub use codec::{JsonCodec, PayloadCodec};
pub use error::{StoreError, StoreResult};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use traits::{AsyncSnapshotStore, SnapshotStore};
