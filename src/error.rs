use thiserror::Error;

/// Upstream definition service failure. Always recovered locally by the
/// cache/fallback tiers, never surfaced to an end caller.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error("upstream returned status {0}")]
    Status(u16),
    #[error("upstream payload could not be parsed: {0}")]
    Malformed(String),
    #[error("upstream request failed: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            UpstreamError::Malformed(err.to_string())
        } else {
            UpstreamError::Transport(err.to_string())
        }
    }
}

/// A cache record failed hash verification. Hard "cannot trust this record"
/// signal, not a retryable condition.
#[derive(Debug, Clone, Error)]
#[error("integrity hash mismatch: recorded {recorded}, computed {computed}")]
pub struct IntegrityError {
    pub recorded: String,
    pub computed: String,
}
