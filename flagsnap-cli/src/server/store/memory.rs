use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{RecordMeta, SnapshotStore, StoreError, StoredRecord};

/// In-memory snapshot storage backed by a `RwLock<HashMap>`. Eviction is
/// lazy: expired records are dropped on the read that finds them.
pub struct MemoryStore {
    data: RwLock<HashMap<String, StoredRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn get_with_metadata(&self, key: &str) -> Option<(Vec<u8>, RecordMeta)> {
        {
            let data = self.data.read().await;
            match data.get(key) {
                Some(record) if !record.expired() => {
                    return Some((record.value.clone(), record.meta.clone()));
                }
                Some(_) => {}
                None => return None,
            }
        }
        self.data.write().await.remove(key);
        None
    }

    async fn put(
        &self,
        key: &str,
        value: &[u8],
        meta: &RecordMeta,
        ttl_seconds: u64,
    ) -> Result<(), StoreError> {
        let mut data = self.data.write().await;
        data.insert(key.to_string(), StoredRecord::new(value, meta, ttl_seconds));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn meta() -> RecordMeta {
        RecordMeta {
            hash: "sha256:abc".to_string(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = MemoryStore::new();
        store.put("k", b"payload", &meta(), 60).await.unwrap();
        let (value, read_meta) = store.get_with_metadata("k").await.unwrap();
        assert_eq!(value, b"payload");
        assert_eq!(read_meta.hash, "sha256:abc");
    }

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let store = MemoryStore::new();
        assert!(store.get_with_metadata("nope").await.is_none());
    }

    #[tokio::test]
    async fn test_expired_record_reads_as_miss() {
        let store = MemoryStore::new();
        store.put("k", b"payload", &meta(), 0).await.unwrap();
        assert!(store.get_with_metadata("k").await.is_none());
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let store = MemoryStore::new();
        store.put("k", b"one", &meta(), 60).await.unwrap();
        store.put("k", b"two", &meta(), 60).await.unwrap();
        let (value, _) = store.get_with_metadata("k").await.unwrap();
        assert_eq!(value, b"two");
    }
}
