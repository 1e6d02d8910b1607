pub mod auth;
pub mod cache;
pub mod config;
pub mod metrics;
pub mod resolver;
pub mod routes;
pub mod store;
pub mod upstream;

use std::process;
use std::sync::Arc;

use tower_http::compression::CompressionLayer;

use self::cache::CacheLayer;
use self::config::{FsnapConfig, StorageBackend};
use self::resolver::SnapshotResolver;
use self::routes::{build_router, AppState};
use self::store::memory::MemoryStore;
use self::store::sled_store::SledStore;
use self::store::SnapshotStore;
use self::upstream::HttpOrigin;

pub async fn run_serve(config_path: &str, port_arg: Option<u16>, hostname_arg: Option<String>) {
    let mut config = FsnapConfig::load(config_path);
    config.apply_env_overrides();

    // CLI args override config file values, which override defaults
    let port = port_arg.unwrap_or(config.server.port);
    let hostname = hostname_arg.unwrap_or_else(|| config.server.hostname.clone());

    let origin = match HttpOrigin::new(&config.upstream) {
        Ok(origin) => Arc::new(origin),
        Err(e) => {
            eprintln!("Upstream configuration error: {}", e);
            eprintln!("Set [upstream] endpoint in {} or FSNAP_UPSTREAM_ENDPOINT", config_path);
            process::exit(1);
        }
    };

    let store: Arc<dyn SnapshotStore> = match config.server.storage {
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::Sled => match SledStore::open(&config.server.data_dir) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                eprintln!("Failed to open storage at {}: {}", config.server.data_dir, e);
                process::exit(1);
            }
        },
    };

    let cache = CacheLayer::new(store, &config.cache.key, config.cache.retention_seconds);
    let resolver = SnapshotResolver::new(cache, origin, config.cache.ttl_seconds);

    if config.admin.refresh_secret.is_none() {
        println!("No refresh secret configured, POST /v1/refresh is disabled");
    }

    let state = Arc::new(AppState {
        resolver,
        refresh_secret: config.admin.refresh_secret.clone(),
    });

    let app = build_router(state).layer(CompressionLayer::new());

    let addr = format!("{}:{}", hostname, port);
    println!("Serving snapshots on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            eprintln!("Failed to bind to {}: {}", addr, e);
            process::exit(1);
        });

    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");

        #[cfg(unix)]
        tokio::select! {
            _ = ctrl_c => {},
            _ = sigterm.recv() => {},
        }

        #[cfg(not(unix))]
        ctrl_c.await.ok();

        println!("Shutdown signal received, finishing in-flight requests...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .unwrap_or_else(|e| {
            eprintln!("Server error: {}", e);
            process::exit(1);
        });

    println!("Server stopped");
}
