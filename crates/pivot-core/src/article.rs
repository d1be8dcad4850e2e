//! Normalized article records and the small URL heuristics they rely on.

use crate::SearchHit;
use serde::{Deserialize, Serialize};

pub const NO_TITLE: &str = "No title";
pub const DESCRIPTION_MAX_CHARS: usize = 200;
const PREVIEW_ENDPOINT: &str = "https://api.microlink.io/";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArticleCandidate {
    pub title: String,
    pub url: String,
    pub published_date: String,
    pub author: Option<String>,
    pub image_url: Option<String>,
    pub description: String,
    pub source_domain: String,
    pub source_name: String,
    pub relevance_score: f64,
    pub provider: String,
}

impl ArticleCandidate {
    /// Normalize a provider hit. Returns `None` when the URL has no usable host.
    ///
    /// `weight` is used as the relevance score unless the hit carries a native score.
    /// `now` is the fallback publication date.
    pub fn from_hit(hit: SearchHit, provider: &str, weight: f64, now: &str) -> Option<Self> {
        let domain = host_key(&hit.url)?;
        let source_name = hit
            .source_name
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| source_name_from_domain(&domain));
        let image_url = hit
            .image_url
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| preview_image_url(&hit.url));
        let score = hit.score.unwrap_or(weight);

        Some(Self {
            title: hit
                .title
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| NO_TITLE.to_string()),
            published_date: hit
                .published
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| now.to_string()),
            author: hit.author.filter(|s| !s.trim().is_empty()),
            image_url: Some(image_url),
            description: truncate_description(hit.description.as_deref().unwrap_or("")),
            source_domain: domain,
            source_name,
            relevance_score: if score.is_finite() { score } else { 0.0 },
            provider: provider.to_string(),
            url: hit.url,
        })
    }
}

/// Lower-cased host of `raw` with a leading `www.` removed.
pub fn host_key(raw: &str) -> Option<String> {
    let u = url::Url::parse(raw.trim()).ok()?;
    let host = u.host_str()?.to_ascii_lowercase();
    if host.is_empty() {
        return None;
    }
    Some(strip_www(&host).to_string())
}

/// Normalize a bare host (or domain filter) the same way `host_key` does.
pub fn normalize_host(host: &str) -> String {
    strip_www(&host.trim().to_ascii_lowercase()).to_string()
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// True when `url` belongs to `excluded_host` (both compared www.-stripped).
/// Unparseable URLs count as excluded.
pub fn is_excluded(url: &str, excluded_host: &str) -> bool {
    match host_key(url) {
        Some(h) => h == normalize_host(excluded_host),
        None => true,
    }
}

/// `nytimes.com` -> `Nytimes`. Crude on purpose: first label, first letter upper-cased.
pub fn source_name_from_domain(domain: &str) -> String {
    let label = domain.split('.').next().unwrap_or(domain);
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Link-preview image for articles whose provider supplied none.
pub fn preview_image_url(article_url: &str) -> String {
    match url::Url::parse_with_params(
        PREVIEW_ENDPOINT,
        &[
            ("url", article_url),
            ("meta", "false"),
            ("embed", "image.url"),
        ],
    ) {
        Ok(u) => u.to_string(),
        Err(_) => PREVIEW_ENDPOINT.to_string(),
    }
}

pub fn truncate_description(s: &str) -> String {
    let s = s.trim();
    if s.chars().count() <= DESCRIPTION_MAX_CHARS {
        return s.to_string();
    }
    let mut out: String = s.chars().take(DESCRIPTION_MAX_CHARS).collect();
    out.push_str("...");
    out
}
