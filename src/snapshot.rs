use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque map from flag key to the upstream-defined targeting rule object.
/// Never interpreted here, only stored and serialized as-is. An ordered map
/// keeps the canonical serialization byte-stable for equal content.
pub type FeatureMap = BTreeMap<String, serde_json::Value>;

/// Where a served snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    Origin,
    Cache,
    Fallback,
}

/// Fetch metadata normalized from the upstream response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_updated: Option<DateTime<Utc>>,
}

/// An upstream-derived feature definition map plus fetch metadata.
/// Immutable once constructed; a refresh always builds a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub features: FeatureMap,
    pub fetched_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: SnapshotMetadata,
}

impl Snapshot {
    /// Canonical JSON serialization used for hashing and cache storage.
    /// Struct field order is fixed and `features` is ordered, so equal
    /// snapshots always serialize to byte-identical output.
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(self).expect("snapshot serialization cannot fail")
    }
}

/// What callers receive: a snapshot plus provenance and integrity hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEnvelope {
    #[serde(flatten)]
    pub snapshot: Snapshot,
    pub source: SnapshotSource,
    pub integrity_hash: String,
}

impl SnapshotEnvelope {
    pub fn new(snapshot: Snapshot, source: SnapshotSource, integrity_hash: String) -> Self {
        Self {
            snapshot,
            source,
            integrity_hash,
        }
    }
}

/// Integrity hash carried by the fallback sentinel. Not a real digest: the
/// sentinel is never persisted, so there is nothing to verify against.
pub const FALLBACK_HASH: &str = "sha256:fallback-empty";

/// The empty last-resort snapshot, served only when no trustworthy data
/// exists anywhere. Never written to the durable cache.
pub fn safe_snapshot() -> SnapshotEnvelope {
    SnapshotEnvelope {
        snapshot: Snapshot {
            features: FeatureMap::new(),
            fetched_at: DateTime::UNIX_EPOCH,
            metadata: SnapshotMetadata::default(),
        },
        source: SnapshotSource::Fallback,
        integrity_hash: FALLBACK_HASH.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Snapshot {
        let mut features = FeatureMap::new();
        features.insert(
            "homepage.hero.badge".to_string(),
            serde_json::json!({"defaultValue": "control"}),
        );
        Snapshot {
            features,
            fetched_at: "2024-10-10T00:00:00Z".parse().unwrap(),
            metadata: SnapshotMetadata {
                upstream_status: Some(200),
                date_updated: Some("2024-10-10T00:00:00Z".parse().unwrap()),
            },
        }
    }

    #[test]
    fn test_canonical_json_is_stable() {
        assert_eq!(sample().canonical_json(), sample().canonical_json());
    }

    #[test]
    fn test_canonical_json_roundtrip() {
        let snapshot = sample();
        let parsed: Snapshot = serde_json::from_str(&snapshot.canonical_json()).unwrap();
        assert_eq!(parsed, snapshot);
        // Re-serializing the parsed value must also be byte-identical.
        assert_eq!(parsed.canonical_json(), snapshot.canonical_json());
    }

    #[test]
    fn test_envelope_wire_shape() {
        let envelope = SnapshotEnvelope::new(
            sample(),
            SnapshotSource::Origin,
            "sha256:abc".to_string(),
        );
        let value: serde_json::Value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["source"], "origin");
        assert_eq!(value["integrityHash"], "sha256:abc");
        assert_eq!(
            value["features"]["homepage.hero.badge"]["defaultValue"],
            "control"
        );
        assert!(value["fetchedAt"].is_string());
        assert_eq!(value["metadata"]["upstreamStatus"], 200);
    }

    #[test]
    fn test_safe_snapshot_shape() {
        let fallback = safe_snapshot();
        assert!(fallback.snapshot.features.is_empty());
        assert_eq!(fallback.source, SnapshotSource::Fallback);
        assert_eq!(fallback.integrity_hash, FALLBACK_HASH);
        assert_eq!(fallback.snapshot.fetched_at.timestamp(), 0);
    }
}
