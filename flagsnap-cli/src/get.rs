use std::process;

use crate::remote::{load_remote_config, resolve_remote_url};

pub async fn run_get(remote_arg: Option<&str>, force: bool, config_path: &str) {
    let config = load_remote_config(config_path);

    let remote = match resolve_remote_url(remote_arg, &config) {
        Some(url) => url,
        None => {
            eprintln!("No remote URL specified. Use --remote or configure [remote] in fsnap.toml");
            process::exit(1);
        }
    };

    let mut url = format!("{}/v1/features", remote.trim_end_matches('/'));
    if force {
        url.push_str("?force=true");
    }

    let client = reqwest::Client::new();
    let response = match client.get(&url).send().await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Failed to fetch: {}", e);
            process::exit(1);
        }
    };

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        eprintln!("Fetch failed ({}): {}", status, body);
        process::exit(1);
    }

    let envelope: serde_json::Value = match response.json().await {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Failed to read response body: {}", e);
            process::exit(1);
        }
    };

    match serde_json::to_string_pretty(&envelope) {
        Ok(pretty) => println!("{}", pretty),
        Err(_) => println!("{}", envelope),
    }
}
