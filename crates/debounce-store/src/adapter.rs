//! Closure-backed stores.
//!
//! Callers that already hold a cache client usually want to hand over two
//! functions, fetch and persist, rather than implement a trait. [`FnStore`]
//! and [`AsyncFnStore`] wrap such pairs.

use std::future::Future;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::traits::{AsyncSnapshotStore, SnapshotStore};

/// A [`SnapshotStore`] built from a blocking fetch and persist function.
pub struct FnStore<F, P> {
    fetch: F,
    persist: P,
}

impl<F, P> FnStore<F, P>
where
    F: Fn(&str) -> StoreResult<Option<Vec<u8>>> + Send + Sync,
    P: Fn(&str, &[u8]) -> StoreResult<()> + Send + Sync,
{
    pub fn new(fetch: F, persist: P) -> Self {
        Self { fetch, persist }
    }
}

impl<F, P> SnapshotStore for FnStore<F, P>
where
    F: Fn(&str) -> StoreResult<Option<Vec<u8>>> + Send + Sync,
    P: Fn(&str, &[u8]) -> StoreResult<()> + Send + Sync,
{
    fn fetch(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        (self.fetch)(key)
    }

    fn persist(&self, key: &str, snapshot: &[u8]) -> StoreResult<()> {
        (self.persist)(key, snapshot)
    }
}

/// An [`AsyncSnapshotStore`] built from a pair of future-returning functions.
///
/// The functions take owned arguments so the returned futures can be
/// `'static` and hold onto them across await points.
pub struct AsyncFnStore<F, P> {
    fetch: F,
    persist: P,
}

impl<F, FFut, P, PFut> AsyncFnStore<F, P>
where
    F: Fn(String) -> FFut + Send + Sync,
    FFut: Future<Output = StoreResult<Option<Vec<u8>>>> + Send,
    P: Fn(String, Vec<u8>) -> PFut + Send + Sync,
    PFut: Future<Output = StoreResult<()>> + Send,
{
    pub fn new(fetch: F, persist: P) -> Self {
        Self { fetch, persist }
    }
}

#[async_trait]
impl<F, FFut, P, PFut> AsyncSnapshotStore for AsyncFnStore<F, P>
where
    F: Fn(String) -> FFut + Send + Sync,
    FFut: Future<Output = StoreResult<Option<Vec<u8>>>> + Send,
    P: Fn(String, Vec<u8>) -> PFut + Send + Sync,
    PFut: Future<Output = StoreResult<()>> + Send,
{
    async fn fetch(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        (self.fetch)(key.to_string()).await
    }

    async fn persist(&self, key: &str, snapshot: &[u8]) -> StoreResult<()> {
        (self.persist)(key.to_string(), snapshot.to_vec()).await
    }
}
