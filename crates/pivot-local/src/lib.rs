use pivot_core::{Error, Result};
use std::time::Duration;

pub mod cache;
pub mod claude;
pub mod digest;
pub mod extractor;
pub mod openai_compat;
pub mod perplexity;
pub mod pipeline;
pub mod search;
pub mod searcher;

/// Shared outbound client. Per-request timeouts still apply on top of these.
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("pivot-local/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10))
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| Error::Transport {
            provider: "http_client".to_string(),
            message: e.to_string(),
        })
}

/// Trimmed, non-empty env var.
pub(crate) fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// First non-empty of several env vars, in order.
pub(crate) fn env_any(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| env(k))
}

pub(crate) fn transport_error(provider: &str, timeout_ms: u64, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        return Error::Timeout {
            provider: provider.to_string(),
            timeout_ms,
        };
    }
    Error::Transport {
        provider: provider.to_string(),
        message: e.to_string(),
    }
}

/// Map a non-success response into `Error::Provider`, keeping a bounded slice of the body.
pub(crate) async fn provider_error(provider: &str, resp: reqwest::Response) -> Error {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Error::Provider {
        provider: provider.to_string(),
        status,
        message: pivot_core::json_text::truncate_chars(body.trim(), 500).to_string(),
    }
}
