//! Multi-source search: per-query provider cascade with early exit.

use futures_util::future::join_all;
use pivot_core::article::{is_excluded, ArticleCandidate};
use pivot_core::{Error, SearchHit, SearchProvider, SearchQuery};
use std::sync::Arc;
use std::time::Duration;

/// A query stops cascading once it has this many results.
pub const SUFFICIENT_RESULTS: usize = 3;
pub const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 8_000;
pub const DEFAULT_QUERY_DELAY_MS: u64 = 200;

/// A provider plus the relevance score given to its hits when it has no native score.
#[derive(Clone)]
pub struct WeightedProvider {
    pub provider: Arc<dyn SearchProvider>,
    pub weight: f64,
}

impl WeightedProvider {
    pub fn new(provider: Arc<dyn SearchProvider>, weight: f64) -> Self {
        Self { provider, weight }
    }
}

impl std::fmt::Debug for WeightedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeightedProvider")
            .field("provider", &self.provider.name())
            .field("weight", &self.weight)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryStrategy {
    /// One query after another, with a courtesy delay in between.
    #[default]
    Sequential,
    /// All executed queries in flight at once, joined before ranking.
    Joined,
}

#[derive(Debug, Clone)]
pub struct SearcherConfig {
    pub sufficient_results: usize,
    pub provider_timeout_ms: u64,
    pub query_delay_ms: u64,
    /// Passed to providers as their page size; `None` keeps each provider's default.
    pub max_results_per_provider: Option<usize>,
    pub strategy: QueryStrategy,
}

impl Default for SearcherConfig {
    fn default() -> Self {
        Self {
            sufficient_results: SUFFICIENT_RESULTS,
            provider_timeout_ms: DEFAULT_PROVIDER_TIMEOUT_MS,
            query_delay_ms: DEFAULT_QUERY_DELAY_MS,
            max_results_per_provider: None,
            strategy: QueryStrategy::Sequential,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MultiSourceSearcher {
    providers: Vec<WeightedProvider>,
    config: SearcherConfig,
}

fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

impl MultiSourceSearcher {
    /// `providers` are tried in the given order.
    pub fn new(providers: Vec<WeightedProvider>, config: SearcherConfig) -> Self {
        Self { providers, config }
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.provider.name()).collect()
    }

    /// One provider call. Never fails: errors and timeouts become zero hits.
    async fn call_provider(&self, wp: &WeightedProvider, query: &str, exclude_host: &str) -> Vec<SearchHit> {
        let name = wp.provider.name();
        let timeout_ms = self.config.provider_timeout_ms;
        let q = SearchQuery {
            query: query.to_string(),
            max_results: self.config.max_results_per_provider,
            exclude_domains: vec![exclude_host.to_string()],
            timeout_ms: Some(timeout_ms),
            ..Default::default()
        };

        let outcome = tokio::time::timeout(Duration::from_millis(timeout_ms), wp.provider.search(&q))
            .await
            .unwrap_or_else(|_| {
                Err(Error::Timeout {
                    provider: name.to_string(),
                    timeout_ms,
                })
            });
        match outcome {
            Ok(resp) => {
                tracing::debug!(
                    provider = name,
                    query,
                    hits = resp.hits.len(),
                    elapsed_ms = resp.timings_ms.get("search").copied().unwrap_or_default() as u64,
                    "provider responded"
                );
                resp.hits
            }
            Err(e) => {
                tracing::warn!(provider = name, query, error = %e, "search provider failed; continuing");
                Vec::new()
            }
        }
    }

    /// Provider cascade for one query.
    pub async fn search_query(&self, query: &str, exclude_host: &str) -> Vec<ArticleCandidate> {
        let mut out: Vec<ArticleCandidate> = Vec::new();
        for wp in &self.providers {
            if out.len() >= self.config.sufficient_results {
                break;
            }
            let name = wp.provider.name();
            let now = now_iso();
            let found: Vec<ArticleCandidate> = self
                .call_provider(wp, query, exclude_host)
                .await
                .into_iter()
                .filter(|h| !is_excluded(&h.url, exclude_host))
                .filter_map(|h| ArticleCandidate::from_hit(h, name, wp.weight, &now))
                .collect();
            tracing::debug!(provider = name, query, count = found.len(), "provider results");
            out.extend(found);
        }
        out
    }

    /// Run `queries` and concatenate their candidates in query order.
    pub async fn search_all(&self, queries: &[String], exclude_host: &str) -> Vec<ArticleCandidate> {
        match self.config.strategy {
            QueryStrategy::Sequential => {
                let mut out = Vec::new();
                for (i, q) in queries.iter().enumerate() {
                    if i > 0 && self.config.query_delay_ms > 0 {
                        // Flat courtesy delay for provider rate limits.
                        tokio::time::sleep(Duration::from_millis(self.config.query_delay_ms)).await;
                    }
                    out.extend(self.search_query(q, exclude_host).await);
                }
                out
            }
            QueryStrategy::Joined => join_all(queries.iter().map(|q| self.search_query(q, exclude_host)))
                .await
                .into_iter()
                .flatten()
                .collect(),
        }
    }
}
