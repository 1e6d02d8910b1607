use std::sync::Arc;

use flagsnap_lib::error::UpstreamError;
use flagsnap_lib::integrity;
use flagsnap_lib::snapshot::{safe_snapshot, SnapshotEnvelope, SnapshotSource};

use super::cache::CacheLayer;
use super::metrics::metrics;
use super::upstream::OriginFetch;

fn upstream_error_kind(e: &UpstreamError) -> &'static str {
    match e {
        UpstreamError::Status(_) => "status",
        UpstreamError::Malformed(_) => "malformed",
        UpstreamError::Transport(_) => "transport",
    }
}

/// The edge-side source decision: serve from cache, refresh from upstream,
/// or fall back to the empty sentinel.
///
/// `load_snapshot` never fails. Every failure path terminates in a produced
/// envelope, so a total upstream outage degrades flag evaluation to caller
/// defaults instead of breaking the page.
pub struct SnapshotResolver {
    cache: CacheLayer,
    origin: Arc<dyn OriginFetch>,
    ttl_seconds: u64,
}

impl SnapshotResolver {
    pub fn new(cache: CacheLayer, origin: Arc<dyn OriginFetch>, ttl_seconds: u64) -> Self {
        Self {
            cache,
            origin,
            ttl_seconds,
        }
    }

    pub async fn load_snapshot(&self, force_refresh: bool) -> SnapshotEnvelope {
        if !force_refresh {
            if let Some(record) = self.cache.read().await {
                if record.age_seconds() < self.ttl_seconds {
                    match record.decode() {
                        Ok(snapshot) => {
                            return SnapshotEnvelope::new(
                                snapshot,
                                SnapshotSource::Cache,
                                record.meta.hash,
                            );
                        }
                        Err(e) => {
                            // Hard integrity failure: the record cannot be
                            // trusted and is not re-read. Straight to the
                            // sentinel.
                            eprintln!("resolver: cache integrity failure: {}", e);
                            return safe_snapshot();
                        }
                    }
                }

                // Stale entry: try to refresh, but keep the entry around as
                // the last fallback tier if the upstream is down.
                match self.refresh().await {
                    Ok(envelope) => return envelope,
                    Err(e) => {
                        eprintln!("resolver: refresh of stale cache failed: {}", e);
                        return self.serve_stale_or_fallback().await;
                    }
                }
            }
            // Cache absent: same path as a forced refresh.
        }

        match self.refresh().await {
            Ok(envelope) => envelope,
            Err(e) => {
                // Second distinct failure mode: the forced/cold fetch path.
                eprintln!("resolver: origin fetch failed: {}", e);
                self.serve_stale_or_fallback().await
            }
        }
    }

    /// Raw cache record for health reporting. Nothing is verified here.
    pub async fn cache_record(&self) -> Option<super::cache::CacheRecord> {
        self.cache.read().await
    }

    /// Fetch from the upstream and persist. A persist failure is logged but
    /// does not discard a perfectly good origin snapshot.
    async fn refresh(&self) -> Result<SnapshotEnvelope, UpstreamError> {
        let snapshot = self.origin.fetch_origin().await.inspect_err(|e| {
            metrics()
                .upstream_errors
                .with_label_values(&[upstream_error_kind(e)])
                .inc();
        })?;
        let hash = match self.cache.write(&snapshot).await {
            Ok(hash) => hash,
            Err(e) => {
                eprintln!("resolver: cache write failed: {}, serving origin anyway", e);
                integrity::hash(&snapshot.canonical_json())
            }
        };
        Ok(SnapshotEnvelope::new(snapshot, SnapshotSource::Origin, hash))
    }

    /// Final tier: any integrity-valid cache record, however stale, beats
    /// serving nothing.
    async fn serve_stale_or_fallback(&self) -> SnapshotEnvelope {
        if let Some(record) = self.cache.read().await {
            match record.decode() {
                Ok(snapshot) => {
                    return SnapshotEnvelope::new(snapshot, SnapshotSource::Cache, record.meta.hash);
                }
                Err(e) => {
                    eprintln!("resolver: stale cache integrity failure: {}", e);
                }
            }
        }
        safe_snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{Duration, Utc};

    use flagsnap_lib::snapshot::{FeatureMap, Snapshot, SnapshotMetadata};

    use crate::server::store::memory::MemoryStore;
    use crate::server::store::{RecordMeta, SnapshotStore};

    const KEY: &str = "snapshot/global";
    const TTL: u64 = 900;

    fn snapshot_with(key: &str, value: serde_json::Value, age_seconds: i64) -> Snapshot {
        let mut features = FeatureMap::new();
        features.insert(key.to_string(), serde_json::json!({"defaultValue": value}));
        Snapshot {
            features,
            fetched_at: Utc::now() - Duration::seconds(age_seconds),
            metadata: SnapshotMetadata::default(),
        }
    }

    struct MockOrigin {
        calls: AtomicUsize,
        result: Result<Snapshot, UpstreamError>,
    }

    impl MockOrigin {
        fn ok(snapshot: Snapshot) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                result: Ok(snapshot),
            })
        }

        fn down() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                result: Err(UpstreamError::Transport("connection refused".into())),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl OriginFetch for MockOrigin {
        async fn fetch_origin(&self) -> Result<Snapshot, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn resolver(store: Arc<MemoryStore>, origin: Arc<MockOrigin>) -> SnapshotResolver {
        SnapshotResolver::new(CacheLayer::new(store, KEY, 86_400), origin, TTL)
    }

    async fn seed_cache(store: &Arc<MemoryStore>, snapshot: &Snapshot) {
        CacheLayer::new(Arc::clone(store) as Arc<dyn SnapshotStore>, KEY, 86_400)
            .write(snapshot)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_fail_open_default() {
        // Upstream down, cache empty: the sentinel, never an error.
        let origin = MockOrigin::down();
        let resolver = resolver(Arc::new(MemoryStore::new()), Arc::clone(&origin));

        let envelope = resolver.load_snapshot(false).await;
        assert_eq!(envelope.source, SnapshotSource::Fallback);
        assert!(envelope.snapshot.features.is_empty());
    }

    #[tokio::test]
    async fn test_fresh_cache_serves_without_network() {
        let store = Arc::new(MemoryStore::new());
        seed_cache(&store, &snapshot_with("x", 1.into(), 10)).await;

        let origin = MockOrigin::down();
        let resolver = resolver(store, Arc::clone(&origin));

        let envelope = resolver.load_snapshot(false).await;
        assert_eq!(envelope.source, SnapshotSource::Cache);
        assert_eq!(origin.calls(), 0);
    }

    #[tokio::test]
    async fn test_stale_cache_triggers_exactly_one_refetch() {
        let store = Arc::new(MemoryStore::new());
        seed_cache(&store, &snapshot_with("x", 1.into(), (TTL + 60) as i64)).await;

        let origin = MockOrigin::ok(snapshot_with("x", 2.into(), 0));
        let resolver = resolver(store, Arc::clone(&origin));

        let envelope = resolver.load_snapshot(false).await;
        assert_eq!(envelope.source, SnapshotSource::Origin);
        assert_eq!(origin.calls(), 1);
        assert_eq!(
            envelope.snapshot.features["x"]["defaultValue"],
            serde_json::json!(2)
        );
    }

    #[tokio::test]
    async fn test_stale_cache_survives_upstream_outage() {
        let store = Arc::new(MemoryStore::new());
        seed_cache(&store, &snapshot_with("x", 1.into(), (TTL + 60) as i64)).await;

        let origin = MockOrigin::down();
        let resolver = resolver(store, Arc::clone(&origin));

        // Stale data beats the empty sentinel.
        let envelope = resolver.load_snapshot(false).await;
        assert_eq!(envelope.source, SnapshotSource::Cache);
        assert_eq!(
            envelope.snapshot.features["x"]["defaultValue"],
            serde_json::json!(1)
        );
        assert_eq!(origin.calls(), 1);
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_fresh_cache() {
        let store = Arc::new(MemoryStore::new());
        seed_cache(&store, &snapshot_with("x", 1.into(), 10)).await;

        let origin = MockOrigin::ok(snapshot_with("x", 2.into(), 0));
        let resolver = resolver(store, Arc::clone(&origin));

        let envelope = resolver.load_snapshot(true).await;
        assert_eq!(envelope.source, SnapshotSource::Origin);
        assert_eq!(origin.calls(), 1);
    }

    #[tokio::test]
    async fn test_origin_snapshot_is_persisted() {
        let store = Arc::new(MemoryStore::new());
        let origin = MockOrigin::ok(snapshot_with("x", 2.into(), 0));
        let resolver = resolver(Arc::clone(&store), origin);

        let served = resolver.load_snapshot(false).await;

        // The next read must come from cache, carrying the same hash.
        let down = MockOrigin::down();
        let resolver = self::resolver(store, down);
        let cached = resolver.load_snapshot(false).await;
        assert_eq!(cached.source, SnapshotSource::Cache);
        assert_eq!(cached.integrity_hash, served.integrity_hash);
        assert_eq!(cached.snapshot, served.snapshot);
    }

    #[tokio::test]
    async fn test_corrupted_fresh_record_falls_back_hard() {
        let store = Arc::new(MemoryStore::new());
        let snapshot = snapshot_with("x", 1.into(), 10);
        let serialized = snapshot.canonical_json().replace('1', "9");
        let meta = RecordMeta {
            hash: flagsnap_lib::integrity::hash(&snapshot.canonical_json()),
            updated_at: snapshot.fetched_at,
        };
        store
            .put(KEY, serialized.as_bytes(), &meta, 86_400)
            .await
            .unwrap();

        let origin = MockOrigin::ok(snapshot_with("x", 2.into(), 0));
        let resolver = resolver(store, Arc::clone(&origin));

        // A tampered record is not retried and not replaced by an origin
        // fetch on the read path; only the sentinel remains.
        let envelope = resolver.load_snapshot(false).await;
        assert_eq!(envelope.source, SnapshotSource::Fallback);
        assert_eq!(origin.calls(), 0);
    }

    #[tokio::test]
    async fn test_corrupted_stale_record_yields_sentinel_when_upstream_down() {
        let store = Arc::new(MemoryStore::new());
        let snapshot = snapshot_with("x", 1.into(), (TTL + 60) as i64);
        let serialized = snapshot.canonical_json().replace('1', "9");
        let meta = RecordMeta {
            hash: flagsnap_lib::integrity::hash(&snapshot.canonical_json()),
            updated_at: snapshot.fetched_at,
        };
        store
            .put(KEY, serialized.as_bytes(), &meta, 86_400)
            .await
            .unwrap();

        let resolver = resolver(store, MockOrigin::down());
        let envelope = resolver.load_snapshot(false).await;
        assert_eq!(envelope.source, SnapshotSource::Fallback);
    }
}
