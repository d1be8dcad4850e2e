use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod article;
pub mod hash;
pub mod json_text;
pub mod query;
pub mod rank;
pub mod topic;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Bad client input (missing/blank fields, unparseable body).
    #[error("{0}")]
    Validation(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    /// A required credential or backend is absent on the server.
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("{provider} request failed with status {status}: {message}")]
    Provider {
        provider: String,
        status: u16,
        message: String,
    },
    #[error("{provider} returned an unparseable response. Raw response: {snippet}")]
    MalformedResponse { provider: String, snippet: String },
    #[error("could not extract a main topic from the article analysis")]
    MissingTopic,
    #[error("{provider} timed out after {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },
    #[error("{provider} transport error: {message}")]
    Transport { provider: String, message: String },
}

impl Error {
    /// True for errors caused by the caller's input rather than the server or a provider.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::InvalidUrl(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub max_results: Option<usize>,
    /// Hosts (www.-stripped) that must not appear in results.
    pub exclude_domains: Vec<String>,
    pub timeout_ms: Option<u64>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }
}

/// One raw result from a single provider call, before normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub published: Option<String>,
    pub image_url: Option<String>,
    pub author: Option<String>,
    /// Publisher name as reported by the provider, if any.
    pub source_name: Option<String>,
    /// Provider-native relevance score, if the provider has one.
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    pub provider: String,
    pub timings_ms: BTreeMap<String, u128>,
}

#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Overrides the generator's default model.
    pub model: Option<String>,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f64,
    /// When set, ask the backend for output constrained to this JSON schema.
    pub json_schema: Option<serde_json::Value>,
    pub timeout_ms: Option<u64>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>, max_tokens: u32, temperature: f64) -> Self {
        Self {
            model: None,
            prompt: prompt.into(),
            max_tokens,
            temperature,
            json_schema: None,
            timeout_ms: None,
        }
    }
}

/// Prompt in, text out.
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &'static str;
    async fn generate(&self, req: &GenerateRequest) -> Result<String>;
}

/// Best-effort memo store for computed results. Implementations must tolerate
/// concurrent use; a miss is always a valid answer.
pub trait ResultCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
}

/// Cache that never stores anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl ResultCache for NoCache {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn set(&self, _key: &str, _value: String) {}
}
