use async_trait::async_trait;

use super::{RecordMeta, SnapshotStore, StoreError, StoredRecord};

/// Persistent snapshot storage backed by sled. Records carry their own
/// expiry; an expired record is removed on the read that finds it.
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn new(db: sled::Db) -> Self {
        Self { db }
    }

    /// Open a sled database at the given directory path.
    pub fn open(data_dir: &str) -> Result<Self, StoreError> {
        let db = sled::open(data_dir)
            .map_err(|e| StoreError::Backend(format!("failed to open sled db: {}", e)))?;
        Ok(Self::new(db))
    }

    fn record_key(key: &str) -> String {
        format!("record:{}", key)
    }
}

#[async_trait]
impl SnapshotStore for SledStore {
    async fn get_with_metadata(&self, key: &str) -> Option<(Vec<u8>, RecordMeta)> {
        let db_key = Self::record_key(key);
        let ivec = self.db.get(&db_key).ok()??;
        // A record that no longer parses predates the current scheme and is
        // treated as a miss, same as an expired one.
        let record: StoredRecord = match serde_json::from_slice(&ivec) {
            Ok(record) => record,
            Err(_) => {
                let _ = self.db.remove(&db_key);
                return None;
            }
        };
        if record.expired() {
            let _ = self.db.remove(&db_key);
            return None;
        }
        Some((record.value, record.meta))
    }

    async fn put(
        &self,
        key: &str,
        value: &[u8],
        meta: &RecordMeta,
        ttl_seconds: u64,
    ) -> Result<(), StoreError> {
        let record = StoredRecord::new(value, meta, ttl_seconds);
        let bytes = serde_json::to_vec(&record)?;

        self.db
            .insert(Self::record_key(key), bytes)
            .map_err(|e| StoreError::Backend(format!("failed to store record: {}", e)))?;

        self.db
            .flush_async()
            .await
            .map_err(|e| StoreError::Backend(format!("failed to flush: {}", e)))?;

        Ok(())
    }
}
