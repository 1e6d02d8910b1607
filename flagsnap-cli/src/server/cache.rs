use std::sync::Arc;

use flagsnap_lib::error::IntegrityError;
use flagsnap_lib::integrity;
use flagsnap_lib::snapshot::Snapshot;

use super::store::{RecordMeta, SnapshotStore, StoreError};

/// One cache record as read back from the durable store, before anyone has
/// decided to trust it.
pub struct CacheRecord {
    pub serialized: String,
    pub meta: RecordMeta,
}

impl CacheRecord {
    /// Age of the record in whole seconds, clamped at zero.
    pub fn age_seconds(&self) -> u64 {
        (chrono::Utc::now() - self.meta.updated_at)
            .num_seconds()
            .max(0) as u64
    }

    /// Verify the payload against the recorded hash, then deserialize.
    /// A payload that passes verification but fails to parse was written by
    /// an incompatible scheme and is reported as an integrity failure too.
    pub fn decode(&self) -> Result<Snapshot, IntegrityError> {
        integrity::verify(&self.serialized, &self.meta.hash)?;
        serde_json::from_str(&self.serialized).map_err(|_| IntegrityError {
            recorded: self.meta.hash.clone(),
            computed: "unparsable-payload".to_string(),
        })
    }
}

/// Durable cache layer: one record per logical cache key. Writes compute the
/// integrity hash and serialize; reads hand back the raw record for the
/// resolver to verify.
pub struct CacheLayer {
    store: Arc<dyn SnapshotStore>,
    key: String,
    retention_seconds: u64,
}

impl CacheLayer {
    pub fn new(store: Arc<dyn SnapshotStore>, key: &str, retention_seconds: u64) -> Self {
        Self {
            store,
            key: key.to_string(),
            retention_seconds,
        }
    }

    /// Read the cache record. Missing records, expired records, and payloads
    /// that are not valid UTF-8 all come back as a miss; nothing here is
    /// trusted yet.
    pub async fn read(&self) -> Option<CacheRecord> {
        let (value, meta) = self.store.get_with_metadata(&self.key).await?;
        let serialized = String::from_utf8(value).ok()?;
        Some(CacheRecord { serialized, meta })
    }

    /// Serialize, hash, and persist a snapshot. Returns the integrity hash
    /// recorded with it.
    pub async fn write(&self, snapshot: &Snapshot) -> Result<String, StoreError> {
        let serialized = snapshot.canonical_json();
        let hash = integrity::hash(&serialized);
        let meta = RecordMeta {
            hash: hash.clone(),
            updated_at: snapshot.fetched_at,
        };
        self.store
            .put(
                &self.key,
                serialized.as_bytes(),
                &meta,
                self.retention_seconds,
            )
            .await?;
        Ok(hash)
    }
}
