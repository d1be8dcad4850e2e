use crate::{env, env_any, provider_error, transport_error};
use pivot_core::article::is_excluded;
use pivot_core::{Error, Result, SearchHit, SearchProvider, SearchQuery, SearchResponse};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

pub(crate) fn timeout_ms_from_query(q: &SearchQuery) -> u64 {
    // Provider requests can hang indefinitely without an explicit timeout.
    q.timeout_ms.unwrap_or(8_000).clamp(50, 60_000)
}

/// Drop hits on any excluded host (post-filter for providers without a native exclude list).
pub(crate) fn retain_allowed(hits: &mut Vec<SearchHit>, q: &SearchQuery) {
    hits.retain(|h| !q.exclude_domains.iter().any(|d| is_excluded(&h.url, d)));
}

pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: &str,
    rb: reqwest::RequestBuilder,
    timeout_ms: u64,
) -> Result<T> {
    let resp = rb
        .timeout(Duration::from_millis(timeout_ms))
        .send()
        .await
        .map_err(|e| transport_error(provider, timeout_ms, e))?;
    if !resp.status().is_success() {
        return Err(provider_error(provider, resp).await);
    }
    resp.json::<T>().await.map_err(|e| Error::MalformedResponse {
        provider: provider.to_string(),
        snippet: e.to_string(),
    })
}

/// A result without a URL is dropped on its own; the rest of the page is kept.
fn usable_url(url: Option<String>) -> Option<String> {
    url.filter(|u| !u.trim().is_empty())
}

fn finish(provider: &str, mut hits: Vec<SearchHit>, q: &SearchQuery, t0: Instant) -> SearchResponse {
    retain_allowed(&mut hits, q);
    if let Some(n) = q.max_results {
        hits.truncate(n);
    }
    let mut timings_ms = BTreeMap::new();
    timings_ms.insert("search".to_string(), t0.elapsed().as_millis());
    SearchResponse {
        hits,
        provider: provider.to_string(),
        timings_ms,
    }
}

fn brave_api_key_from_env() -> Option<String> {
    env_any(&["PIVOT_BRAVE_API_KEY", "BRAVE_API_KEY", "BRAVE_SEARCH_API_KEY"])
}

fn newsapi_key_from_env() -> Option<String> {
    env_any(&["PIVOT_NEWSAPI_KEY", "NEWSAPI_KEY"])
}

fn gnews_api_key_from_env() -> Option<String> {
    env_any(&["PIVOT_GNEWS_API_KEY", "GNEWS_API_KEY"])
}

fn tavily_api_key_from_env() -> Option<String> {
    env_any(&["PIVOT_TAVILY_API_KEY", "TAVILY_API_KEY"])
}

/// Brave News Search (past-week freshness).
#[derive(Debug, Clone)]
pub struct BraveNewsProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

/// NewsAPI `/v2/everything`.
#[derive(Debug, Clone)]
pub struct NewsApiProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

/// GNews `/api/v4/search`.
#[derive(Debug, Clone)]
pub struct GNewsProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

/// Tavily search in news mode; supports native domain exclusion and scores.
#[derive(Debug, Clone)]
pub struct TavilyProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl BraveNewsProvider {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            // Docs: https://api.search.brave.com/res/v1/news/search
            endpoint: env("PIVOT_BRAVE_ENDPOINT")
                .unwrap_or_else(|| "https://api.search.brave.com/res/v1/news/search".to_string()),
        }
    }

    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = brave_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured("missing BRAVE_API_KEY (or PIVOT_BRAVE_API_KEY)".to_string())
        })?;
        Ok(Self::new(client, api_key))
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl NewsApiProvider {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            endpoint: env("PIVOT_NEWSAPI_ENDPOINT")
                .unwrap_or_else(|| "https://newsapi.org/v2/everything".to_string()),
        }
    }

    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = newsapi_key_from_env().ok_or_else(|| {
            Error::NotConfigured("missing NEWSAPI_KEY (or PIVOT_NEWSAPI_KEY)".to_string())
        })?;
        Ok(Self::new(client, api_key))
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl GNewsProvider {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            endpoint: env("PIVOT_GNEWS_ENDPOINT")
                .unwrap_or_else(|| "https://gnews.io/api/v4/search".to_string()),
        }
    }

    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = gnews_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured("missing GNEWS_API_KEY (or PIVOT_GNEWS_API_KEY)".to_string())
        })?;
        Ok(Self::new(client, api_key))
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl TavilyProvider {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            endpoint: env("PIVOT_TAVILY_ENDPOINT")
                .unwrap_or_else(|| "https://api.tavily.com/search".to_string()),
        }
    }

    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = tavily_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured("missing TAVILY_API_KEY (or PIVOT_TAVILY_API_KEY)".to_string())
        })?;
        Ok(Self::new(client, api_key))
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct BraveNewsResponse {
    results: Option<Vec<BraveNewsResult>>,
}

#[derive(Debug, Deserialize)]
struct BraveNewsResult {
    url: Option<String>,
    title: Option<String>,
    description: Option<String>,
    /// Relative age ("2 days ago"); Brave's only date field on news results.
    age: Option<String>,
    thumbnail: Option<BraveThumbnail>,
}

#[derive(Debug, Deserialize)]
struct BraveThumbnail {
    src: Option<String>,
}

#[async_trait::async_trait]
impl SearchProvider for BraveNewsProvider {
    fn name(&self) -> &'static str {
        "brave"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        let t0 = Instant::now();
        let count = q.max_results.unwrap_or(10).min(20).to_string();
        let rb = self
            .client
            .get(&self.endpoint)
            .header("X-Subscription-Token", &self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&[
                ("q", q.query.as_str()),
                ("count", count.as_str()),
                ("freshness", "pw"),
                ("text_decorations", "false"),
            ]);
        let parsed: BraveNewsResponse =
            send_json(self.name(), rb, timeout_ms_from_query(q)).await?;

        let hits = parsed
            .results
            .unwrap_or_default()
            .into_iter()
            .filter_map(|r| {
                Some(SearchHit {
                    url: usable_url(r.url)?,
                    title: r.title,
                    description: r.description,
                    published: r.age,
                    image_url: r.thumbnail.and_then(|t| t.src),
                    ..Default::default()
                })
            })
            .collect();
        Ok(finish(self.name(), hits, q, t0))
    }
}

#[derive(Debug, Deserialize)]
struct ArticlesResponse<T> {
    articles: Option<Vec<T>>,
}

#[derive(Debug, Deserialize)]
struct NamedSource {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsApiArticle {
    url: Option<String>,
    title: Option<String>,
    description: Option<String>,
    url_to_image: Option<String>,
    published_at: Option<String>,
    author: Option<String>,
    source: Option<NamedSource>,
}

#[async_trait::async_trait]
impl SearchProvider for NewsApiProvider {
    fn name(&self) -> &'static str {
        "newsapi"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        let t0 = Instant::now();
        let page_size = q.max_results.unwrap_or(5).min(20).to_string();
        let rb = self.client.get(&self.endpoint).query(&[
            ("q", q.query.as_str()),
            ("sortBy", "relevancy"),
            ("language", "en"),
            ("pageSize", page_size.as_str()),
            ("apiKey", self.api_key.as_str()),
        ]);
        let parsed: ArticlesResponse<NewsApiArticle> =
            send_json(self.name(), rb, timeout_ms_from_query(q)).await?;

        let hits = parsed
            .articles
            .unwrap_or_default()
            .into_iter()
            .filter_map(|a| {
                Some(SearchHit {
                    url: usable_url(a.url)?,
                    title: a.title,
                    description: a.description,
                    published: a.published_at,
                    image_url: a.url_to_image,
                    author: a.author,
                    source_name: a.source.and_then(|s| s.name),
                    score: None,
                })
            })
            .collect();
        Ok(finish(self.name(), hits, q, t0))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GNewsArticle {
    url: Option<String>,
    title: Option<String>,
    description: Option<String>,
    image: Option<String>,
    published_at: Option<String>,
    source: Option<NamedSource>,
}

#[async_trait::async_trait]
impl SearchProvider for GNewsProvider {
    fn name(&self) -> &'static str {
        "gnews"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        let t0 = Instant::now();
        let max = q.max_results.unwrap_or(5).min(10).to_string();
        let rb = self.client.get(&self.endpoint).query(&[
            ("q", q.query.as_str()),
            ("lang", "en"),
            ("country", "us"),
            ("max", max.as_str()),
            ("apikey", self.api_key.as_str()),
        ]);
        let parsed: ArticlesResponse<GNewsArticle> =
            send_json(self.name(), rb, timeout_ms_from_query(q)).await?;

        let hits = parsed
            .articles
            .unwrap_or_default()
            .into_iter()
            .filter_map(|a| {
                Some(SearchHit {
                    url: usable_url(a.url)?,
                    title: a.title,
                    description: a.description,
                    published: a.published_at,
                    image_url: a.image,
                    source_name: a.source.and_then(|s| s.name),
                    ..Default::default()
                })
            })
            .collect();
        Ok(finish(self.name(), hits, q, t0))
    }
}

#[derive(Debug, Deserialize)]
struct TavilySearchResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    url: Option<String>,
    title: Option<String>,
    content: Option<String>,
    score: Option<f64>,
    published_date: Option<String>,
}

#[async_trait::async_trait]
impl SearchProvider for TavilyProvider {
    fn name(&self) -> &'static str {
        "tavily"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        let t0 = Instant::now();
        let body = serde_json::json!({
            "query": q.query,
            "max_results": q.max_results.unwrap_or(5).min(20),
            "topic": "news",
            "search_depth": "basic",
            "include_answer": false,
            "include_raw_content": false,
            "exclude_domains": q.exclude_domains,
        });
        let rb = self
            .client
            .post(&self.endpoint)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.api_key),
            )
            .json(&body);
        let parsed: TavilySearchResponse =
            send_json(self.name(), rb, timeout_ms_from_query(q)).await?;

        let hits = parsed
            .results
            .into_iter()
            .filter_map(|r| {
                Some(SearchHit {
                    url: usable_url(r.url)?,
                    title: r.title,
                    description: r.content,
                    published: r.published_date,
                    score: r.score,
                    ..Default::default()
                })
            })
            .collect();
        Ok(finish(self.name(), hits, q, t0))
    }
}
