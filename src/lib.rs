//! Client SDK and shared data model for the flagsnap snapshot distribution
//! system.
//!
//! The edge server (`flagsnap-cli serve`) fetches feature definitions from
//! an upstream service, caches them durably with integrity verification, and
//! serves them with a layered fallback policy. This crate holds everything
//! both sides share (the snapshot model and hashing) plus the calling
//! side: a coalescing snapshot cache, the pluggable evaluation binding, and
//! a hook-style adapter for UI consumers.
//!
//! # Examples
//! ```no_run
//! use flagsnap_lib::{evaluate_flag, Attributes, DefaultValueFactory, SnapshotClient};
//!
//! # async fn demo() {
//! let client = SnapshotClient::connect("https://flags.example.com");
//! let result = evaluate_flag(
//!     &client,
//!     &DefaultValueFactory,
//!     "homepage.hero.badge",
//!     serde_json::Value::from("control"),
//!     &Attributes::new(),
//!     None,
//! )
//! .await;
//! println!("{}", result.value);
//! # }
//! ```

pub mod client;
pub mod engine;
pub mod error;
pub mod hook;
pub mod integrity;
pub mod snapshot;

pub use client::{HttpFetcher, SnapshotClient, SnapshotFetch};
pub use engine::{
    evaluate, Attributes, DefaultValueEngine, DefaultValueFactory, EngineFactory,
    EvaluationResult, FeatureEngine, FeatureValueSource,
};
pub use error::{IntegrityError, UpstreamError};
pub use hook::{FlagHook, HookState};
pub use snapshot::{
    safe_snapshot, FeatureMap, Snapshot, SnapshotEnvelope, SnapshotMetadata, SnapshotSource,
    FALLBACK_HASH,
};

/// Evaluate one flag, fetching a snapshot through the client cache when the
/// caller does not supply one. Never fails: at worst the caller's fallback
/// value comes back against the empty sentinel snapshot.
pub async fn evaluate_flag(
    client: &SnapshotClient,
    factory: &dyn EngineFactory,
    flag_key: &str,
    fallback_value: serde_json::Value,
    attributes: &Attributes,
    snapshot: Option<&SnapshotEnvelope>,
) -> EvaluationResult {
    match snapshot {
        Some(envelope) => engine::evaluate(factory, flag_key, fallback_value, attributes, envelope),
        None => {
            let envelope = client.get_snapshot(false).await;
            engine::evaluate(factory, flag_key, fallback_value, attributes, &envelope)
        }
    }
}
