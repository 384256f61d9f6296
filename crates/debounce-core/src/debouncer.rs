//! The debounce workflow: fetch, decide, merge, persist.
//!
//! [`Debouncer`] wires the pure pieces (key derivation, decision, combiner) to
//! a caller-supplied store. Store failures never reach the caller: a failed or
//! unreadable fetch is treated as "no previous snapshot", and a failed persist
//! still returns the payload that should be sent.
//!
//! The fetch -> decide -> persist sequence is not atomic. Two overlapping
//! calls for the same identity may both read the same snapshot, and the later
//! persist wins. Callers that need strict per-identity ordering must
//! serialize calls for a key themselves.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use debounce_merge::combine_snapshots;
use debounce_store::{AsyncSnapshotStore, JsonCodec, PayloadCodec, SnapshotStore, StoreResult};

use crate::config::DebounceConfig;
use crate::decision::{debounce_payloads, Decision};
use crate::error::DebounceResult;
use crate::key::payload_key_with_suffix;

/// What to send and what to store after a decision.
struct Plan {
    emitted: Value,
    snapshot: Option<Vec<u8>>,
}

/// Deduplicates identify payloads against per-identity snapshots.
#[derive(Clone, Debug, Default)]
pub struct Debouncer<C = JsonCodec> {
    config: DebounceConfig,
    codec: C,
}

impl Debouncer<JsonCodec> {
    /// A debouncer storing JSON snapshots.
    pub fn new(config: DebounceConfig) -> Self {
        Self::with_codec(config, JsonCodec)
    }

    /// A debouncer for flat server-side payloads.
    pub fn flat() -> Self {
        Self::new(DebounceConfig::default())
    }

    /// A debouncer for browser middleware payloads nested under `obj`.
    pub fn browser() -> Self {
        Self::new(DebounceConfig::browser())
    }
}

impl<C: PayloadCodec> Debouncer<C> {
    /// A debouncer with a custom snapshot codec.
    pub fn with_codec(config: DebounceConfig, codec: C) -> Self {
        Self { config, codec }
    }

    pub fn config(&self) -> &DebounceConfig {
        &self.config
    }

    /// The cache key `payload` would be stored under.
    pub fn key_for(&self, payload: &Value) -> String {
        payload_key_with_suffix(payload, &self.config.shape, &self.config.key_suffix)
    }

    /// Debounce `payload` against a blocking store.
    ///
    /// Returns the payload to send (traits trimmed to what changed), or
    /// `None` when nothing changed and the call should be skipped.
    pub fn debounce_sync<P, S>(&self, payload: &P, store: &S) -> DebounceResult<Option<Value>>
    where
        P: Serialize + ?Sized,
        S: SnapshotStore + ?Sized,
    {
        let sanitized = self.sanitize(payload)?;
        let key = self.key_for(&sanitized);

        let previous = self.previous_snapshot(&key, SnapshotStore::fetch(store, &key));
        let Some(plan) = self.plan(&key, previous, sanitized) else {
            return Ok(None);
        };

        if let Some(snapshot) = plan.snapshot {
            if let Err(e) = SnapshotStore::persist(store, &key, &snapshot) {
                warn!(key = %key, error = %e, "failed to store previous payload for debouncing");
            }
        }
        Ok(Some(plan.emitted))
    }

    /// Debounce `payload` against an asynchronous store.
    ///
    /// Identical to [`debounce_sync`](Self::debounce_sync) apart from the
    /// calling convention; the fetch completes before the persist starts.
    pub async fn debounce<P, S>(&self, payload: &P, store: &S) -> DebounceResult<Option<Value>>
    where
        P: Serialize + ?Sized,
        S: AsyncSnapshotStore + ?Sized,
    {
        let sanitized = self.sanitize(payload)?;
        let key = self.key_for(&sanitized);

        let fetched = AsyncSnapshotStore::fetch(store, &key).await;
        let previous = self.previous_snapshot(&key, fetched);
        let Some(plan) = self.plan(&key, previous, sanitized) else {
            return Ok(None);
        };

        if let Some(snapshot) = plan.snapshot {
            if let Err(e) = AsyncSnapshotStore::persist(store, &key, &snapshot).await {
                warn!(key = %key, error = %e, "failed to store previous payload for debouncing");
            }
        }
        Ok(Some(plan.emitted))
    }

    /// Bring `payload` into JSON form and round-trip it through the codec so
    /// that only fields it actually carries take part in the diff.
    fn sanitize<P: Serialize + ?Sized>(&self, payload: &P) -> DebounceResult<Value> {
        let value = serde_json::to_value(payload)?;
        let encoded = self.codec.encode(&value)?;
        Ok(self.codec.decode(&encoded)?)
    }

    fn previous_snapshot(&self, key: &str, fetched: StoreResult<Option<Vec<u8>>>) -> Value {
        let empty = || Value::Object(Map::new());
        match fetched {
            Ok(Some(bytes)) if !bytes.is_empty() => match self.codec.decode(&bytes) {
                Ok(Value::Null) => empty(),
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(key = %key, error = %e, "stored payload is unreadable; debouncing against an empty snapshot");
                    empty()
                }
            },
            Ok(_) => empty(),
            Err(e) => {
                warn!(key = %key, error = %e, "failed to fetch previous payload for debouncing");
                empty()
            }
        }
    }

    fn plan(&self, key: &str, previous: Value, sanitized: Value) -> Option<Plan> {
        let shape = &self.config.shape;
        let Decision {
            next_payload,
            new_or_updated_traits,
            reason,
        } = debounce_payloads(Some(&previous), Some(sanitized), shape);
        debug!(key = %key, ?reason, "debounce decision");

        let next = next_payload?;
        let combined = combine_snapshots([&previous, &next]);
        let snapshot = match self.codec.encode(&combined) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(key = %key, error = %e, "failed to encode previous payload for debouncing");
                None
            }
        };

        let emitted = Decision {
            next_payload: Some(next),
            new_or_updated_traits,
            reason,
        }
        .into_emitted(shape)?;
        Some(Plan { emitted, snapshot })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use debounce_store::{FnStore, MemoryStore, StoreError};
    use serde_json::json;
    use std::time::Duration;

    fn stored(store: &MemoryStore, key: &str) -> Value {
        let bytes = SnapshotStore::fetch(store, key).unwrap().expect("snapshot stored");
        serde_json::from_slice(&bytes).unwrap()
    }

    // -----------------------------------------------------------------------
    // Flat payloads, async store
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn repeated_payload_is_suppressed() {
        let store = MemoryStore::new();
        let debouncer = Debouncer::flat();
        let payload = json!({"userId": 1, "traits": {"firstName": "Test", "lastName": "User"}});

        let first = debouncer.debounce(&payload, &store).await.unwrap();
        let second = debouncer.debounce(&payload, &store).await.unwrap();

        assert_eq!(first, Some(payload.clone()));
        assert_eq!(second, None);
        assert_eq!(store.keys().unwrap(), vec!["1-previousSegmentPayload".to_string()]);
        assert_eq!(stored(&store, "1-previousSegmentPayload"), payload);
    }

    #[tokio::test]
    async fn anonymous_id_keys_the_snapshot() {
        let store = MemoryStore::new();
        let debouncer = Debouncer::flat();
        let payload = json!({"anonymousId": 1, "traits": {"firstName": "Test"}});

        assert_eq!(debouncer.debounce(&payload, &store).await.unwrap(), Some(payload.clone()));
        assert_eq!(debouncer.debounce(&payload, &store).await.unwrap(), None);
        assert_eq!(stored(&store, "1-previousSegmentPayload"), payload);
    }

    #[tokio::test]
    async fn payload_without_identity_uses_no_id_key() {
        let store = MemoryStore::new();
        let debouncer = Debouncer::flat();
        let payload = json!({"traits": {"firstName": "Test", "lastName": "User"}});

        assert_eq!(debouncer.debounce(&payload, &store).await.unwrap(), Some(payload.clone()));
        assert_eq!(debouncer.debounce(&payload, &store).await.unwrap(), None);
        assert_eq!(stored(&store, "no-id-previousSegmentPayload"), payload);
    }

    #[tokio::test]
    async fn new_anonymous_id_resends_everything() {
        let store = MemoryStore::new();
        let debouncer = Debouncer::flat();
        let first = json!({"userId": 1, "traits": {"firstName": "Test", "lastName": "User"}});
        let second = json!({
            "userId": 1,
            "anonymousId": 2,
            "traits": {"firstName": "Test", "lastName": "User"}
        });

        assert_eq!(debouncer.debounce(&first, &store).await.unwrap(), Some(first));
        assert_eq!(debouncer.debounce(&second, &store).await.unwrap(), Some(second.clone()));
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(stored(&store, "1-previousSegmentPayload"), second);
    }

    #[tokio::test]
    async fn new_traits_are_sent_and_history_is_kept() {
        let store = MemoryStore::new();
        let debouncer = Debouncer::flat();
        let first = json!({"userId": 1, "traits": {"firstName": "Test", "lastName": "User"}});
        let second = json!({"userId": 1, "traits": {"phoneNumber": "123-45678", "address": "1 Main St"}});

        debouncer.debounce(&first, &store).await.unwrap();
        let emitted = debouncer.debounce(&second, &store).await.unwrap();

        assert_eq!(emitted, Some(second));
        assert_eq!(
            stored(&store, "1-previousSegmentPayload"),
            json!({
                "userId": 1,
                "traits": {
                    "firstName": "Test",
                    "lastName": "User",
                    "phoneNumber": "123-45678",
                    "address": "1 Main St"
                }
            })
        );
    }

    #[tokio::test]
    async fn only_changed_traits_are_sent() {
        let store = MemoryStore::new();
        let debouncer = Debouncer::flat();
        let first = json!({"userId": 1, "traits": {"firstName": "Test", "lastName": "User"}});
        let second = json!({"userId": 1, "traits": {"firstName": "Test", "lastName": "Tester"}});

        debouncer.debounce(&first, &store).await.unwrap();
        let emitted = debouncer.debounce(&second, &store).await.unwrap();

        assert_eq!(emitted, Some(json!({"userId": 1, "traits": {"lastName": "Tester"}})));
        assert_eq!(stored(&store, "1-previousSegmentPayload"), second);
    }

    #[tokio::test]
    async fn changed_array_trait_is_sent_whole() {
        let store = MemoryStore::new();
        let debouncer = Debouncer::flat();
        let first = json!({"userId": 1, "traits": {"colors": ["blue", "orange", "red"]}});
        let second = json!({"userId": 1, "traits": {"colors": ["blue", "orange", "red", "green"]}});

        debouncer.debounce(&first, &store).await.unwrap();
        let emitted = debouncer.debounce(&second, &store).await.unwrap();

        assert_eq!(emitted, Some(second.clone()));
        assert_eq!(stored(&store, "1-previousSegmentPayload"), second);
    }

    #[tokio::test]
    async fn successive_calls_send_only_the_delta() {
        let store = MemoryStore::new();
        let debouncer = Debouncer::flat();

        let mut emitted = Vec::new();
        for i in 0..4 {
            let payload = json!({
                "userId": 1,
                "traits": {"firstName": "Test", "lastName": "Tester", "uniqueId": i}
            });
            emitted.push(debouncer.debounce(&payload, &store).await.unwrap());
        }

        assert_eq!(
            emitted[0],
            Some(json!({
                "userId": 1,
                "traits": {"firstName": "Test", "lastName": "Tester", "uniqueId": 0}
            }))
        );
        for (i, payload) in emitted.iter().enumerate().skip(1) {
            assert_eq!(
                *payload,
                Some(json!({"userId": 1, "traits": {"uniqueId": i}}))
            );
        }
        assert_eq!(
            stored(&store, "1-previousSegmentPayload"),
            json!({
                "userId": 1,
                "traits": {"firstName": "Test", "lastName": "Tester", "uniqueId": 3}
            })
        );
    }

    #[tokio::test]
    async fn flip_flopping_trait_is_always_sent() {
        let store = MemoryStore::new();
        let debouncer = Debouncer::flat();
        let blue = json!({"userId": 1, "traits": {"color": "blue"}});
        let orange = json!({"userId": 1, "traits": {"color": "orange"}});

        for payload in [&blue, &orange, &blue, &orange] {
            assert_eq!(
                debouncer.debounce(payload, &store).await.unwrap(),
                Some(payload.clone())
            );
        }
        assert_eq!(stored(&store, "1-previousSegmentPayload"), orange);
    }

    #[tokio::test]
    async fn expired_snapshot_resends_full_payload() {
        let store = MemoryStore::with_ttl(Duration::ZERO);
        let debouncer = Debouncer::flat();
        let payload = json!({"userId": 1, "traits": {"a": 1}});

        assert_eq!(debouncer.debounce(&payload, &store).await.unwrap(), Some(payload.clone()));
        assert_eq!(debouncer.debounce(&payload, &store).await.unwrap(), Some(payload));
    }

    // -----------------------------------------------------------------------
    // Enveloped payloads, sync store
    // -----------------------------------------------------------------------

    #[test]
    fn browser_payload_is_suppressed_on_repeat() {
        let store = MemoryStore::new();
        let debouncer = Debouncer::browser();
        let payload = json!({"obj": {"userId": 1, "traits": {"firstName": "Test", "lastName": "User"}}});

        assert_eq!(debouncer.debounce_sync(&payload, &store).unwrap(), Some(payload.clone()));
        assert_eq!(debouncer.debounce_sync(&payload, &store).unwrap(), None);
        assert_eq!(stored(&store, "1-previousSegmentPayload"), payload);
    }

    #[test]
    fn browser_payload_trims_inside_envelope() {
        let store = MemoryStore::new();
        let debouncer = Debouncer::browser();
        let first = json!({"type": "identify", "obj": {"userId": 1, "traits": {"firstName": "Test", "lastName": "User"}}});
        let second = json!({"type": "identify", "obj": {"userId": 1, "traits": {"firstName": "Test", "lastName": "Tester"}}});

        debouncer.debounce_sync(&first, &store).unwrap();
        let emitted = debouncer.debounce_sync(&second, &store).unwrap();

        assert_eq!(
            emitted,
            Some(json!({"type": "identify", "obj": {"userId": 1, "traits": {"lastName": "Tester"}}}))
        );
        assert_eq!(stored(&store, "1-previousSegmentPayload"), second);
    }

    #[test]
    fn browser_payload_without_identity() {
        let store = MemoryStore::new();
        let debouncer = Debouncer::browser();
        let payload = json!({"obj": {"traits": {"firstName": "Test"}}});

        assert_eq!(debouncer.debounce_sync(&payload, &store).unwrap(), Some(payload.clone()));
        assert_eq!(debouncer.debounce_sync(&payload, &store).unwrap(), None);
        assert_eq!(store.keys().unwrap(), vec!["no-id-previousSegmentPayload".to_string()]);
    }

    // -----------------------------------------------------------------------
    // Sanitization
    // -----------------------------------------------------------------------

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Identify {
        #[serde(skip_serializing_if = "Option::is_none")]
        user_id: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        anonymous_id: Option<String>,
        traits: Traits,
    }

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Traits {
        first_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        phone_number: Option<String>,
    }

    #[test]
    fn typed_payloads_drop_absent_fields() {
        let store = MemoryStore::new();
        let debouncer = Debouncer::flat();
        let payload = Identify {
            user_id: Some(7),
            anonymous_id: None,
            traits: Traits {
                first_name: "Test".into(),
                phone_number: None,
            },
        };

        let emitted = debouncer.debounce_sync(&payload, &store).unwrap();
        assert_eq!(emitted, Some(json!({"userId": 7, "traits": {"firstName": "Test"}})));

        let with_phone = Identify {
            traits: Traits {
                first_name: "Test".into(),
                phone_number: Some("555".into()),
            },
            ..payload
        };
        let emitted = debouncer.debounce_sync(&with_phone, &store).unwrap();
        assert_eq!(emitted, Some(json!({"userId": 7, "traits": {"phoneNumber": "555"}})));
    }

    #[test]
    fn null_payload_is_suppressed_and_not_stored() {
        let store = MemoryStore::new();
        let debouncer = Debouncer::flat();

        assert_eq!(debouncer.debounce_sync(&Value::Null, &store).unwrap(), None);
        assert_eq!(debouncer.debounce_sync(&Option::<u8>::None, &store).unwrap(), None);
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn unserializable_payload_is_an_error() {
        let store = MemoryStore::new();
        let mut payload = std::collections::HashMap::new();
        payload.insert(vec![1u8], "non-string key");

        let result = Debouncer::flat().debounce_sync(&payload, &store);
        assert!(matches!(result, Err(crate::DebounceError::Serialize(_))));
        assert!(store.is_empty().unwrap());
    }

    // -----------------------------------------------------------------------
    // Store failures
    // -----------------------------------------------------------------------

    #[test]
    fn failing_fetch_is_treated_as_empty() {
        let persisted = std::sync::Mutex::new(Vec::new());
        let store = FnStore::new(
            |_: &str| Err(StoreError::backend("cache unavailable")),
            |key: &str, snapshot: &[u8]| {
                persisted.lock().unwrap().push((key.to_string(), snapshot.to_vec()));
                Ok(())
            },
        );
        let payload = json!({"userId": 1, "traits": {"a": 1}});

        let emitted = Debouncer::flat().debounce_sync(&payload, &store).unwrap();
        assert_eq!(emitted, Some(payload));
        assert_eq!(persisted.lock().unwrap().len(), 1);
    }

    #[test]
    fn failing_persist_still_returns_payload() {
        let store = FnStore::new(
            |_: &str| Ok(None),
            |_: &str, _: &[u8]| Err(StoreError::backend("read-only replica")),
        );
        let payload = json!({"userId": 1, "traits": {"a": 1}});

        let emitted = Debouncer::flat().debounce_sync(&payload, &store).unwrap();
        assert_eq!(emitted, Some(payload));
    }

    #[test]
    fn corrupt_snapshot_is_treated_as_empty() {
        let store = MemoryStore::new();
        SnapshotStore::persist(&store, "1-previousSegmentPayload", b"{not json").unwrap();
        let payload = json!({"userId": 1, "traits": {"a": 1}});

        let emitted = Debouncer::flat().debounce_sync(&payload, &store).unwrap();
        assert_eq!(emitted, Some(payload.clone()));
        assert_eq!(stored(&store, "1-previousSegmentPayload"), payload);
    }

    #[test]
    fn null_snapshot_is_treated_as_empty() {
        let store = MemoryStore::new();
        SnapshotStore::persist(&store, "no-id-previousSegmentPayload", b"null").unwrap();
        let payload = json!({"traits": {"a": 1}});

        let emitted = Debouncer::flat().debounce_sync(&payload, &store).unwrap();
        assert_eq!(emitted, Some(payload));
    }

    struct FailingAsyncStore;

    #[async_trait]
    impl AsyncSnapshotStore for FailingAsyncStore {
        async fn fetch(&self, _key: &str) -> StoreResult<Option<Vec<u8>>> {
            Err(StoreError::backend("timeout"))
        }

        async fn persist(&self, _key: &str, _snapshot: &[u8]) -> StoreResult<()> {
            Err(StoreError::backend("timeout"))
        }
    }

    #[tokio::test]
    async fn async_store_failures_are_absorbed() {
        let payload = json!({"userId": 1, "traits": {"a": 1}});
        let emitted = Debouncer::flat().debounce(&payload, &FailingAsyncStore).await.unwrap();
        assert_eq!(emitted, Some(payload));
    }

    // -----------------------------------------------------------------------
    // Other backends
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn closure_backed_async_store() {
        use debounce_store::AsyncFnStore;
        use std::sync::Arc;

        let backing = Arc::new(MemoryStore::new());
        let reader = Arc::clone(&backing);
        let writer = Arc::clone(&backing);
        let store = AsyncFnStore::new(
            move |key: String| {
                let backing = Arc::clone(&reader);
                async move { SnapshotStore::fetch(backing.as_ref(), &key) }
            },
            move |key: String, snapshot: Vec<u8>| {
                let backing = Arc::clone(&writer);
                async move { SnapshotStore::persist(backing.as_ref(), &key, &snapshot) }
            },
        );
        let debouncer = Debouncer::flat();
        let payload = json!({"anonymousId": "a-1", "traits": {"plan": "pro"}});

        assert_eq!(debouncer.debounce(&payload, &store).await.unwrap(), Some(payload.clone()));
        assert_eq!(debouncer.debounce(&payload, &store).await.unwrap(), None);
        assert_eq!(stored(&backing, "a-1-previousSegmentPayload"), payload);
    }

    #[test]
    fn file_store_survives_reopen() {
        use debounce_store::FileStore;

        let dir = tempfile::tempdir().unwrap();
        let debouncer = Debouncer::flat();
        let payload = json!({"userId": 1, "traits": {"a": 1}});

        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(debouncer.debounce_sync(&payload, &store).unwrap(), Some(payload.clone()));
        drop(store);

        let reopened = FileStore::open(dir.path()).unwrap();
        assert_eq!(debouncer.debounce_sync(&payload, &reopened).unwrap(), None);
    }

    // -----------------------------------------------------------------------
    // Codec and config
    // -----------------------------------------------------------------------

    /// Stores snapshots as pretty-printed JSON with a version prefix.
    struct VersionedCodec;

    impl PayloadCodec for VersionedCodec {
        fn encode(&self, value: &Value) -> StoreResult<Vec<u8>> {
            let mut bytes = b"v1:".to_vec();
            bytes.extend(serde_json::to_vec_pretty(value)?);
            Ok(bytes)
        }

        fn decode(&self, bytes: &[u8]) -> StoreResult<Value> {
            let body = bytes
                .strip_prefix(b"v1:")
                .ok_or_else(|| StoreError::Codec("missing version prefix".into()))?;
            Ok(serde_json::from_slice(body)?)
        }
    }

    #[test]
    fn custom_codec_is_used_for_storage() {
        let store = MemoryStore::new();
        let debouncer = Debouncer::with_codec(DebounceConfig::default(), VersionedCodec);
        let payload = json!({"userId": 1, "traits": {"a": 1}});

        assert_eq!(debouncer.debounce_sync(&payload, &store).unwrap(), Some(payload.clone()));
        let raw = SnapshotStore::fetch(&store, "1-previousSegmentPayload").unwrap().unwrap();
        assert!(raw.starts_with(b"v1:"));
        assert_eq!(debouncer.debounce_sync(&payload, &store).unwrap(), None);
    }

    #[test]
    fn custom_key_suffix() {
        let store = MemoryStore::new();
        let debouncer = Debouncer::new(DebounceConfig {
            key_suffix: "braze".into(),
            ..Default::default()
        });
        let payload = json!({"userId": "u-1", "traits": {"a": 1}});

        assert_eq!(debouncer.key_for(&payload), "u-1-braze");
        debouncer.debounce_sync(&payload, &store).unwrap();
        assert_eq!(store.keys().unwrap(), vec!["u-1-braze".to_string()]);
    }
}
