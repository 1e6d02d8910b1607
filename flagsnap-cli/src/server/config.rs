use std::env;

use serde::Deserialize;

/// Top-level fsnap.toml configuration
#[derive(Debug, Deserialize, Default)]
pub struct FsnapConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_hostname")]
    pub hostname: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_storage")]
    pub storage: StorageBackend,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Sled,
    Memory,
}

/// Where feature definitions come from.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct UpstreamConfig {
    /// Base URL of the definition service, e.g. `https://defs.example.com/api/features`.
    pub endpoint: Option<String>,
    /// Client/tenant identifier appended to the endpoint path.
    pub client_id: Option<String>,
    /// Optional bearer credential for the upstream call.
    pub token: Option<String>,
    #[serde(default = "default_upstream_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Logical cache key; one record per key, single global key by default.
    #[serde(default = "default_cache_key")]
    pub key: String,
    /// Freshness window. Entries older than this trigger a refresh attempt.
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,
    /// Storage-layer retention, enforced at the put boundary. Longer than
    /// the freshness window so stale entries stay readable as a last resort
    /// while the upstream is down.
    #[serde(default = "default_cache_retention")]
    pub retention_seconds: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AdminConfig {
    /// Secret for `POST /v1/refresh`. Unset disables the endpoint (501)
    /// rather than leaving it silently permissive.
    pub refresh_secret: Option<String>,
}

// ── Default value functions ──────────────────────────

fn default_port() -> u16 {
    8080
}

fn default_hostname() -> String {
    "0.0.0.0".to_string()
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_storage() -> StorageBackend {
    StorageBackend::Sled
}

fn default_upstream_timeout_ms() -> u64 {
    3_000
}

fn default_cache_key() -> String {
    "snapshot/global".to_string()
}

fn default_cache_ttl() -> u64 {
    900
}

fn default_cache_retention() -> u64 {
    86_400
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            hostname: default_hostname(),
            data_dir: default_data_dir(),
            storage: default_storage(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key: default_cache_key(),
            ttl_seconds: default_cache_ttl(),
            retention_seconds: default_cache_retention(),
        }
    }
}

impl FsnapConfig {
    /// Load configuration from a TOML file, falling back to defaults if the file
    /// doesn't exist or cannot be parsed.
    pub fn load(path: &str) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: failed to parse {}: {}", path, e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        // FSNAP_STORAGE
        if let Ok(val) = env::var("FSNAP_STORAGE") {
            match val.to_lowercase().as_str() {
                "sled" => self.server.storage = StorageBackend::Sled,
                "memory" => self.server.storage = StorageBackend::Memory,
                other => eprintln!("Warning: unknown FSNAP_STORAGE value: {}", other),
            }
        }

        // FSNAP_UPSTREAM_*
        if let Ok(val) = env::var("FSNAP_UPSTREAM_ENDPOINT") {
            self.upstream.endpoint = Some(val);
        }
        if let Ok(val) = env::var("FSNAP_UPSTREAM_CLIENT_ID") {
            self.upstream.client_id = Some(val);
        }
        if let Ok(val) = env::var("FSNAP_UPSTREAM_TOKEN") {
            self.upstream.token = Some(val);
        }
        if let Ok(val) = env::var("FSNAP_UPSTREAM_TIMEOUT_MS") {
            if let Ok(ms) = val.parse::<u64>() {
                self.upstream.timeout_ms = ms;
            }
        }

        // FSNAP_CACHE_*
        if let Ok(val) = env::var("FSNAP_CACHE_KEY") {
            self.cache.key = val;
        }
        if let Ok(val) = env::var("FSNAP_CACHE_TTL") {
            if let Ok(secs) = val.parse::<u64>() {
                self.cache.ttl_seconds = secs;
            }
        }
        if let Ok(val) = env::var("FSNAP_CACHE_RETENTION") {
            if let Ok(secs) = val.parse::<u64>() {
                self.cache.retention_seconds = secs;
            }
        }

        // FSNAP_REFRESH_SECRET, empty value disables the endpoint
        if let Ok(val) = env::var("FSNAP_REFRESH_SECRET") {
            self.admin.refresh_secret = if val.is_empty() { None } else { Some(val) };
        }
    }
}
