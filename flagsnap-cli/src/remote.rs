use serde::Deserialize;

/// Configuration for remote operations (from fsnap.toml [remote] section)
#[derive(Debug, Deserialize, Default)]
pub struct RemoteConfig {
    pub url: Option<String>,
    pub tokens: Option<RemoteTokens>,
}

#[derive(Debug, Deserialize, Default)]
pub struct RemoteTokens {
    pub refresh: Option<String>,
}

/// Load remote config from fsnap.toml
pub fn load_remote_config(config_path: &str) -> RemoteConfig {
    std::fs::read_to_string(config_path)
        .ok()
        .and_then(|content| {
            #[derive(Deserialize)]
            struct FsnapToml {
                remote: Option<RemoteConfig>,
            }
            toml::from_str::<FsnapToml>(&content).ok()
        })
        .and_then(|c| c.remote)
        .unwrap_or_default()
}

/// Resolve the remote URL from: CLI arg > fsnap.toml config
pub fn resolve_remote_url(remote_arg: Option<&str>, config: &RemoteConfig) -> Option<String> {
    remote_arg.map(String::from).or_else(|| config.url.clone())
}

/// Resolve the refresh secret from: CLI arg > env var > fsnap.toml config
pub fn resolve_refresh_token(secret_arg: Option<&str>, config: &RemoteConfig) -> Option<String> {
    secret_arg
        .map(String::from)
        .or_else(|| std::env::var("FSNAP_REFRESH_TOKEN").ok())
        .or_else(|| config.tokens.as_ref().and_then(|t| t.refresh.clone()))
}
