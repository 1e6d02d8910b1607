use std::process;

use crate::remote::{load_remote_config, resolve_refresh_token, resolve_remote_url};

pub async fn run_refresh(remote_arg: Option<&str>, secret_arg: Option<&str>, config_path: &str) {
    let config = load_remote_config(config_path);

    let remote = match resolve_remote_url(remote_arg, &config) {
        Some(url) => url,
        None => {
            eprintln!("No remote URL specified. Use --remote or configure [remote] in fsnap.toml");
            process::exit(1);
        }
    };

    let token = match resolve_refresh_token(secret_arg, &config) {
        Some(t) => t,
        None => {
            eprintln!("No refresh secret specified. Use --secret, set FSNAP_REFRESH_TOKEN, or configure [remote.tokens] in fsnap.toml");
            process::exit(1);
        }
    };

    let url = format!("{}/v1/refresh", remote.trim_end_matches('/'));

    let client = reqwest::Client::new();
    let response = match client.post(&url).bearer_auth(&token).send().await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Refresh request failed: {}", e);
            process::exit(1);
        }
    };

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        eprintln!("Refresh failed ({}): {}", status, body);
        process::exit(1);
    }

    let envelope: serde_json::Value = match response.json().await {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Failed to read response body: {}", e);
            process::exit(1);
        }
    };

    let count = envelope["features"]
        .as_object()
        .map(|m| m.len())
        .unwrap_or(0);
    println!(
        "Refreshed: {} flags, source {}, hash {}",
        count,
        envelope["source"].as_str().unwrap_or("?"),
        envelope["integrityHash"].as_str().unwrap_or("?"),
    );
}
