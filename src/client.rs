use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};

use crate::error::UpstreamError;
use crate::snapshot::{safe_snapshot, SnapshotEnvelope, SnapshotSource};

/// Transport used by the client cache to obtain a snapshot envelope.
/// Injected so the coalescing behavior is testable without a live server.
#[async_trait]
pub trait SnapshotFetch: Send + Sync + 'static {
    async fn fetch(&self, force: bool) -> Result<SnapshotEnvelope, UpstreamError>;
}

/// Fetches envelopes from a running edge server's read endpoint.
pub struct HttpFetcher {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpFetcher {
    /// `endpoint` is the server base URL, e.g. `https://flags.example.com`.
    pub fn new(endpoint: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SnapshotFetch for HttpFetcher {
    async fn fetch(&self, force: bool) -> Result<SnapshotEnvelope, UpstreamError> {
        let mut url = format!("{}/v1/features", self.endpoint);
        if force {
            url.push_str("?force=true");
        }
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }
        let envelope = response
            .json::<SnapshotEnvelope>()
            .await
            .map_err(|e| UpstreamError::Malformed(e.to_string()))?;
        Ok(envelope)
    }
}

type SharedFetch = Shared<BoxFuture<'static, Arc<SnapshotEnvelope>>>;

struct ClientState {
    snapshot: Option<Arc<SnapshotEnvelope>>,
    in_flight: Option<SharedFetch>,
}

struct ClientInner {
    fetcher: Arc<dyn SnapshotFetch>,
    state: Mutex<ClientState>,
}

/// Client-side snapshot cache and request coalescer.
///
/// Explicitly constructed and passed to call sites rather than living in
/// module-global state. Holds the last known envelope for its lifetime and
/// merges concurrent fetches: N callers racing on a cold cache produce
/// exactly one outbound call, and all receive the same `Arc`.
///
/// `get_snapshot` never fails: a fetch error resolves to the best
/// previously-known snapshot, or the empty fallback when there is none.
#[derive(Clone)]
pub struct SnapshotClient {
    inner: Arc<ClientInner>,
}

impl SnapshotClient {
    pub fn new(fetcher: Arc<dyn SnapshotFetch>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                fetcher,
                state: Mutex::new(ClientState {
                    snapshot: None,
                    in_flight: None,
                }),
            }),
        }
    }

    /// Convenience constructor against an edge server base URL.
    pub fn connect(endpoint: &str) -> Self {
        Self::new(Arc::new(HttpFetcher::new(endpoint)))
    }

    /// The last known envelope, if any, without touching the network.
    pub fn current(&self) -> Option<Arc<SnapshotEnvelope>> {
        self.inner.state.lock().unwrap().snapshot.clone()
    }

    pub async fn get_snapshot(&self, force: bool) -> Arc<SnapshotEnvelope> {
        let pending = {
            let mut state = self.inner.state.lock().unwrap();
            if !force {
                if let Some(snapshot) = &state.snapshot {
                    // A cached fallback is not worth keeping; anything else is.
                    if snapshot.source != SnapshotSource::Fallback {
                        return Arc::clone(snapshot);
                    }
                }
            }
            match &state.in_flight {
                Some(pending) => pending.clone(),
                None => {
                    let inner = Arc::clone(&self.inner);
                    let pending = ClientInner::fetch_and_store(inner, force)
                        .boxed()
                        .shared();
                    state.in_flight = Some(pending.clone());
                    pending
                }
            }
        };
        pending.await
    }
}

impl ClientInner {
    /// Runs at most once per in-flight slot: fetches, records the result,
    /// and clears the slot before resolving every coalesced caller.
    async fn fetch_and_store(inner: Arc<ClientInner>, force: bool) -> Arc<SnapshotEnvelope> {
        let result = inner.fetcher.fetch(force).await;
        let mut state = inner.state.lock().unwrap();
        state.in_flight = None;
        match result {
            Ok(envelope) => {
                let envelope = Arc::new(envelope);
                state.snapshot = Some(Arc::clone(&envelope));
                envelope
            }
            Err(e) => {
                eprintln!("flagsnap: snapshot fetch failed: {}, serving last known", e);
                state
                    .snapshot
                    .clone()
                    .unwrap_or_else(|| Arc::new(safe_snapshot()))
            }
        }
    }
}
