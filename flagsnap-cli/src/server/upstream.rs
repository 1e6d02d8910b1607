use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use flagsnap_lib::error::UpstreamError;
use flagsnap_lib::snapshot::{FeatureMap, Snapshot, SnapshotMetadata};

use super::config::UpstreamConfig;

/// Outbound call to the definition service, behind a trait so the resolver
/// can be exercised without a network.
#[async_trait]
pub trait OriginFetch: Send + Sync {
    async fn fetch_origin(&self) -> Result<Snapshot, UpstreamError>;
}

/// Raw upstream response. Only the documented envelope is interpreted; the
/// rule objects inside `features` pass through untouched.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OriginPayload {
    status: Option<u16>,
    features: Option<FeatureMap>,
    date_updated: Option<DateTime<Utc>>,
}

pub struct HttpOrigin {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl HttpOrigin {
    /// Build the fetcher from config. The request timeout bounds every call
    /// so the resolver can never block indefinitely on the upstream.
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| UpstreamError::Transport("no upstream endpoint configured".into()))?;
        let mut url = endpoint.trim_end_matches('/').to_string();
        if let Some(client_id) = &config.client_id {
            url.push('/');
            url.push_str(client_id);
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            url,
            token: config.token.clone(),
        })
    }
}

#[async_trait]
impl OriginFetch for HttpOrigin {
    async fn fetch_origin(&self) -> Result<Snapshot, UpstreamError> {
        let mut request = self.http.get(&self.url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let payload = response
            .json::<OriginPayload>()
            .await
            .map_err(|e| UpstreamError::Malformed(e.to_string()))?;

        // A successful response without a features field is an empty map,
        // not an error.
        Ok(Snapshot {
            features: payload.features.unwrap_or_default(),
            fetched_at: Utc::now(),
            metadata: SnapshotMetadata {
                upstream_status: payload.status,
                date_updated: payload.date_updated,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_normalization() {
        let payload: OriginPayload = serde_json::from_str(
            r#"{"status":200,"features":{"homepage.hero.badge":{"defaultValue":"control"}},"dateUpdated":"2024-10-10T00:00:00.000Z"}"#,
        )
        .unwrap();
        assert_eq!(payload.status, Some(200));
        let features = payload.features.unwrap();
        assert_eq!(
            features["homepage.hero.badge"]["defaultValue"],
            "control"
        );
        assert_eq!(
            payload.date_updated.unwrap(),
            "2024-10-10T00:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[test]
    fn test_missing_features_tolerated() {
        let payload: OriginPayload = serde_json::from_str(r#"{"status":200}"#).unwrap();
        assert!(payload.features.is_none());
        assert!(payload.features.unwrap_or_default().is_empty());
    }

    #[test]
    fn test_unconfigured_endpoint_is_an_error() {
        assert!(HttpOrigin::new(&UpstreamConfig::default()).is_err());
    }

    #[test]
    fn test_url_includes_client_id() {
        let origin = HttpOrigin::new(&UpstreamConfig {
            endpoint: Some("https://defs.example.com/api/features/".to_string()),
            client_id: Some("sdk-abc123".to_string()),
            token: None,
            timeout_ms: 1000,
        })
        .unwrap();
        assert_eq!(origin.url, "https://defs.example.com/api/features/sdk-abc123");
    }
}
