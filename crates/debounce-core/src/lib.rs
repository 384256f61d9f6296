//! Identify payload debouncing.
//!
//! Analytics pipelines resend identify calls far more often than a user's
//! traits actually change. A [`Debouncer`] keeps a cumulative snapshot per
//! identity and, for each incoming payload, either suppresses it or trims
//! its traits down to what is new or changed.
//!
//! # Pipeline
//!
//! 1. Sanitize: serialize the payload to JSON and round-trip it through the
//!    snapshot codec.
//! 2. Key: [`payload_key`] picks `userId`, then `anonymousId`, else `no-id`.
//! 3. Fetch the previous snapshot from the caller's store.
//! 4. Decide with [`debounce_payloads`].
//! 5. On send, merge the payload into the snapshot and persist it.
//!
//! Store failures are logged through `tracing` and never fail the call.

pub mod config;
pub mod debouncer;
pub mod decision;
pub mod error;
pub mod key;
pub mod shape;

pub use config::DebounceConfig;
pub use debouncer::Debouncer;
pub use decision::{debounce_payloads, Decision, DecisionReason};
pub use error::{DebounceError, DebounceResult};
pub use key::{payload_key, payload_key_with_suffix, DEFAULT_KEY_SUFFIX, NO_ID};
pub use shape::{FieldAccessor, PayloadShape, ANONYMOUS_ID, TRAITS, USER_ID};

// Re-export the building blocks
pub use debounce_diff::{diff_values, values_equal, DiffOptions};
pub use debounce_merge::{combine_snapshots, merge_into};
pub use debounce_store::{
    AsyncFnStore, AsyncSnapshotStore, FileStore, FnStore, JsonCodec, MemoryStore, PayloadCodec,
    SnapshotStore, StoreError, StoreResult,
};
