//! Perplexity (sonar) used as a search provider: the model browses and answers with a
//! JSON array of articles, which we pull out of its free-text reply.

use crate::env_any;
use crate::search::{send_json, timeout_ms_from_query};
use pivot_core::json_text::{parse_array, truncate_chars};
use pivot_core::{Error, Result, SearchHit, SearchProvider, SearchQuery, SearchResponse};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

pub const DEFAULT_MODEL: &str = "sonar";

fn perplexity_api_key_from_env() -> Option<String> {
    env_any(&["PIVOT_PERPLEXITY_API_KEY", "PERPLEXITY_API_KEY"])
}

#[derive(Debug, Clone)]
pub struct PerplexitySearchProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl PerplexitySearchProvider {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            // Docs: https://docs.perplexity.ai/api-reference/chat-completions-post
            endpoint: crate::env("PIVOT_PERPLEXITY_ENDPOINT")
                .unwrap_or_else(|| "https://api.perplexity.ai/chat/completions".to_string()),
            model: crate::env("PIVOT_PERPLEXITY_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }

    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = perplexity_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured(
                "missing PERPLEXITY_API_KEY (or PIVOT_PERPLEXITY_API_KEY)".to_string(),
            )
        })?;
        Ok(Self::new(client, api_key))
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

fn search_prompt(query: &str, max_results: usize) -> String {
    format!(
        "Find up to {max_results} recent news or opinion articles for the search: \"{query}\".\n\
Answer with a JSON array only. Each element must be an object with the keys \
\"title\", \"url\", \"description\" (one sentence) and \"date\" (publication date if known). \
Use only real article URLs you found."
    )
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    /// Perplexity-specific: `-host` entries exclude a domain from browsing.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    search_domain_filter: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

fn str_field(v: &serde_json::Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| v.get(*k).and_then(|x| x.as_str()))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Articles from the model's reply. A reply with no JSON array is malformed, not empty.
fn hits_from_answer(answer: &str) -> Result<Vec<SearchHit>> {
    let items = parse_array(answer).ok_or_else(|| Error::MalformedResponse {
        provider: "perplexity".to_string(),
        snippet: truncate_chars(answer.trim(), 200).to_string(),
    })?;
    Ok(items
        .iter()
        .filter_map(|item| {
            let url = str_field(item, &["url", "link"])?;
            Some(SearchHit {
                url,
                title: str_field(item, &["title"]),
                description: str_field(item, &["description", "summary"]),
                published: str_field(item, &["date", "published_date", "publishedAt"]),
                image_url: str_field(item, &["image", "imageUrl"]),
                author: str_field(item, &["author"]),
                source_name: str_field(item, &["source"]),
                score: None,
            })
        })
        .collect())
}

#[async_trait::async_trait]
impl SearchProvider for PerplexitySearchProvider {
    fn name(&self) -> &'static str {
        "perplexity"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        let t0 = Instant::now();
        let max_results = q.max_results.unwrap_or(5).min(10);
        let req = ChatCompletionsRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: "You are a news search assistant. Reply with JSON only.".to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: search_prompt(&q.query, max_results),
                },
            ],
            max_tokens: Some(1200),
            temperature: Some(0.2),
            search_domain_filter: q.exclude_domains.iter().map(|d| format!("-{d}")).collect(),
        };
        let rb = self
            .client
            .post(&self.endpoint)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.api_key),
            )
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(&req);
        let parsed: ChatCompletionsResponse =
            send_json(self.name(), rb, timeout_ms_from_query(q)).await?;
        let answer = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        let mut hits = hits_from_answer(&answer)?;
        crate::search::retain_allowed(&mut hits, q);
        hits.truncate(max_results);

        let mut timings_ms = BTreeMap::new();
        timings_ms.insert("search".to_string(), t0.elapsed().as_millis());
        Ok(SearchResponse {
            hits,
            provider: self.name().to_string(),
            timings_ms,
        })
    }
}
