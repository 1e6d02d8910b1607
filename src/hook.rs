use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::client::SnapshotClient;
use crate::engine::{evaluate, Attributes, EngineFactory};
use crate::snapshot::SnapshotSource;

/// Observable evaluation state exposed to an interactive UI layer.
#[derive(Debug, Clone, PartialEq)]
pub struct HookState {
    pub value: Value,
    pub loading: bool,
    pub error: Option<String>,
}

/// Thin glue between the client cache and a UI consumer: evaluates one flag
/// and refreshes it in the background.
///
/// Stale-completion guard: every refresh captures the current epoch and only
/// applies its result if the epoch is unchanged when it resolves. `detach`
/// bumps the epoch, so refreshes completing after teardown are discarded
/// rather than applied to dead state. Cancellation is this guard, not a true
/// abort of the underlying fetch.
pub struct FlagHook {
    client: SnapshotClient,
    factory: Arc<dyn EngineFactory>,
    flag_key: String,
    fallback: Value,
    attributes: Attributes,
    epoch: Arc<AtomicU64>,
    state: Arc<Mutex<HookState>>,
}

impl FlagHook {
    /// Attach a hook for one flag. Evaluates immediately against the
    /// client's last known snapshot; with `refetch_on_attach` a background
    /// forced refresh is started as well.
    pub fn attach(
        client: SnapshotClient,
        factory: Arc<dyn EngineFactory>,
        flag_key: &str,
        fallback: Value,
        attributes: Attributes,
        refetch_on_attach: bool,
    ) -> Self {
        let initial = match client.current() {
            Some(envelope) => {
                evaluate(factory.as_ref(), flag_key, fallback.clone(), &attributes, &envelope).value
            }
            None => fallback.clone(),
        };
        let hook = Self {
            client,
            factory,
            flag_key: flag_key.to_string(),
            fallback,
            attributes,
            epoch: Arc::new(AtomicU64::new(0)),
            state: Arc::new(Mutex::new(HookState {
                value: initial,
                loading: false,
                error: None,
            })),
        };
        if refetch_on_attach {
            hook.refresh();
        }
        hook
    }

    /// Current `{value, loading, error}` snapshot.
    pub fn state(&self) -> HookState {
        self.state.lock().unwrap().clone()
    }

    /// Start a background forced refresh. Must be called within a tokio
    /// runtime. The result is applied only if the hook has not been
    /// detached in the meantime.
    pub fn refresh(&self) {
        let captured = self.epoch.load(Ordering::SeqCst);
        self.state.lock().unwrap().loading = true;

        let client = self.client.clone();
        let factory = Arc::clone(&self.factory);
        let flag_key = self.flag_key.clone();
        let fallback = self.fallback.clone();
        let attributes = self.attributes.clone();
        let epoch = Arc::clone(&self.epoch);
        let state = Arc::clone(&self.state);

        tokio::spawn(async move {
            let envelope = client.get_snapshot(true).await;
            if epoch.load(Ordering::SeqCst) != captured {
                // Detached while in flight; drop the result.
                return;
            }
            let result = evaluate(factory.as_ref(), &flag_key, fallback, &attributes, &envelope);
            let mut state = state.lock().unwrap();
            state.value = result.value;
            state.loading = false;
            state.error = if envelope.source == SnapshotSource::Fallback {
                Some("no snapshot available, serving fallback value".to_string())
            } else {
                None
            };
        });
    }

    /// Tear the hook down. Any in-flight refresh completing afterwards is
    /// discarded.
    pub fn detach(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for FlagHook {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::client::SnapshotFetch;
    use crate::engine::DefaultValueFactory;
    use crate::error::UpstreamError;
    use crate::snapshot::{FeatureMap, Snapshot, SnapshotEnvelope, SnapshotMetadata};

    struct SlowFetch {
        calls: AtomicUsize,
        delay_ms: u64,
    }

    #[async_trait]
    impl SnapshotFetch for SlowFetch {
        async fn fetch(&self, _force: bool) -> Result<SnapshotEnvelope, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            let mut features = FeatureMap::new();
            features.insert(
                "banner".to_string(),
                serde_json::json!({"defaultValue": "fresh"}),
            );
            Ok(SnapshotEnvelope::new(
                Snapshot {
                    features,
                    fetched_at: chrono::Utc::now(),
                    metadata: SnapshotMetadata::default(),
                },
                SnapshotSource::Origin,
                "sha256:test".to_string(),
            ))
        }
    }

    fn hook_against(delay_ms: u64, refetch: bool) -> FlagHook {
        let client = SnapshotClient::new(Arc::new(SlowFetch {
            calls: AtomicUsize::new(0),
            delay_ms,
        }));
        FlagHook::attach(
            client,
            Arc::new(DefaultValueFactory),
            "banner",
            Value::from("default"),
            Attributes::new(),
            refetch,
        )
    }

    #[tokio::test]
    async fn test_refresh_applies_fresh_value() {
        let hook = hook_against(5, false);
        assert_eq!(hook.state().value, "default");

        hook.refresh();
        assert!(hook.state().loading);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let state = hook.state();
        assert_eq!(state.value, "fresh");
        assert!(!state.loading);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_detach_discards_stale_completion() {
        let hook = hook_against(20, false);
        hook.refresh();
        hook.detach();

        tokio::time::sleep(Duration::from_millis(80)).await;
        // The refresh resolved after teardown; its value must not land.
        assert_eq!(hook.state().value, "default");
    }

    #[tokio::test]
    async fn test_refetch_on_attach() {
        let hook = hook_against(5, true);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(hook.state().value, "fresh");
    }
}
