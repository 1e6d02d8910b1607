use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::snapshot::{FeatureMap, SnapshotEnvelope, SnapshotSource};

/// Caller-supplied attributes a flag is evaluated against.
pub type Attributes = HashMap<String, Value>;

/// Pluggable targeting-rule evaluator. The core cache/integrity logic has no
/// compile-time coupling to any specific rule implementation.
pub trait FeatureEngine {
    /// Resolve a single flag against the attributes, or `None` when the
    /// engine has no defined value for that key.
    fn evaluate(&self, features: &FeatureMap, attributes: &Attributes, key: &str) -> Option<Value>;
}

/// Builds a short-lived engine instance per evaluation call. Instances are
/// never shared across callers, so attributes cannot leak between concurrent
/// requests in the same process.
pub trait EngineFactory: Send + Sync {
    fn create(&self) -> Box<dyn FeatureEngine>;
}

/// Minimal built-in engine: ignores attributes and returns the rule object's
/// `defaultValue` field. Targeting semantics (bucketing, rollout, matching)
/// belong to whichever real engine is plugged in.
pub struct DefaultValueEngine;

impl FeatureEngine for DefaultValueEngine {
    fn evaluate(
        &self,
        features: &FeatureMap,
        _attributes: &Attributes,
        key: &str,
    ) -> Option<Value> {
        features.get(key)?.get("defaultValue").cloned()
    }
}

pub struct DefaultValueFactory;

impl EngineFactory for DefaultValueFactory {
    fn create(&self) -> Box<dyn FeatureEngine> {
        Box::new(DefaultValueEngine)
    }
}

/// Whether the resolved value came from the engine or the caller's fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureValueSource {
    Engine,
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub value: Value,
    pub feature_source: FeatureValueSource,
    pub snapshot_source: SnapshotSource,
    pub integrity_hash: String,
}

/// Evaluate one flag from a snapshot. A fresh engine instance is created for
/// the call and dropped with it. When the engine reports no value for the
/// key the caller's fallback is returned untouched; evaluation never fails.
pub fn evaluate(
    factory: &dyn EngineFactory,
    flag_key: &str,
    fallback_value: Value,
    attributes: &Attributes,
    envelope: &SnapshotEnvelope,
) -> EvaluationResult {
    let engine = factory.create();
    let (value, feature_source) =
        match engine.evaluate(&envelope.snapshot.features, attributes, flag_key) {
            Some(value) => (value, FeatureValueSource::Engine),
            None => (fallback_value, FeatureValueSource::Fallback),
        };
    EvaluationResult {
        value,
        feature_source,
        snapshot_source: envelope.source,
        integrity_hash: envelope.integrity_hash.clone(),
    }
}
