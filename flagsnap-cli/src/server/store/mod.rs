pub mod memory;
pub mod sled_store;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Metadata persisted alongside a serialized snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordMeta {
    pub hash: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("record serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Durable key-value storage with per-record metadata and a TTL enforced at
/// the put boundary. Replication and persistence guarantees are the
/// backend's business; expired records simply read back as misses.
/// Implementations must be thread-safe.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Get a record with its metadata. `None` for missing or expired keys.
    async fn get_with_metadata(&self, key: &str) -> Option<(Vec<u8>, RecordMeta)>;

    /// Store a record with metadata, retained for `ttl_seconds`.
    async fn put(
        &self,
        key: &str,
        value: &[u8],
        meta: &RecordMeta,
        ttl_seconds: u64,
    ) -> Result<(), StoreError>;
}

/// On-disk/in-memory representation of one record.
#[derive(Serialize, Deserialize)]
pub(crate) struct StoredRecord {
    pub value: Vec<u8>,
    pub meta: RecordMeta,
    pub expires_at: DateTime<Utc>,
}

impl StoredRecord {
    pub(crate) fn new(value: &[u8], meta: &RecordMeta, ttl_seconds: u64) -> Self {
        Self {
            value: value.to_vec(),
            meta: meta.clone(),
            expires_at: Utc::now() + chrono::Duration::seconds(ttl_seconds as i64),
        }
    }

    pub(crate) fn expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}
