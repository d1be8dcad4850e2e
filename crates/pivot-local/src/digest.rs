//! Summary and insights for a single article, memoized by content prefix.

use crate::cache::Memo;
use pivot_core::hash::cache_key;
use pivot_core::json_text::truncate_chars;
use pivot_core::{Error, GenerateRequest, Result, TextGenerator};
use std::sync::Arc;

pub const TRUNCATION_MARKER: &str = "...[truncated]";

const INSIGHTS_PROMPT: &str = "Analyze this article concisely. Structure your response exactly like this:

**Main Arguments**: What are the 2-3 central claims or points?

**Evidence Quality**: How well supported are the arguments? Mention key data/sources if present.

**Potential Bias**: What perspectives or limitations might be present?

**Key Questions**: What important aspects are left unaddressed?

Keep each section brief and focused.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestKind {
    Summary,
    Insights,
}

impl DigestKind {
    pub fn cache_prefix(self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Insights => "insights",
        }
    }

    pub fn default_title(self) -> &'static str {
        match self {
            Self::Summary => "Summary",
            Self::Insights => "Insights",
        }
    }

    pub fn max_input_chars(self) -> usize {
        match self {
            Self::Summary => 6000,
            Self::Insights => 7000,
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Self::Summary => "claude-3-haiku-20240307",
            Self::Insights => "claude-3-5-sonnet-20240620",
        }
    }

    pub fn max_tokens(self) -> u32 {
        match self {
            Self::Summary => 600,
            Self::Insights => 800,
        }
    }

    pub fn temperature(self) -> f64 {
        match self {
            Self::Summary => 0.2,
            Self::Insights => 0.3,
        }
    }

    pub fn prompt(self, content: &str) -> String {
        let body = clip_content(content, self.max_input_chars());
        match self {
            Self::Summary => format!(
                "Summarize this article in 3-4 concise bullet points. Focus on the most important facts and key takeaways:\n\n{body}"
            ),
            Self::Insights => format!("{INSIGHTS_PROMPT}\n\n---\n\n{body}"),
        }
    }
}

/// First `max_chars` of `content`, with the truncation marker when cut.
pub fn clip_content(content: &str, max_chars: usize) -> String {
    let head = truncate_chars(content, max_chars);
    if head.len() < content.len() {
        format!("{head}{TRUNCATION_MARKER}")
    } else {
        content.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Digest {
    pub text: String,
    pub cached: bool,
}

/// Model per digest kind; `None` leaves the choice to the generator.
#[derive(Debug, Clone, Default)]
pub struct DigestModels {
    pub summary: Option<String>,
    pub insights: Option<String>,
}

impl DigestModels {
    pub fn claude_defaults() -> Self {
        Self {
            summary: Some(DigestKind::Summary.default_model().to_string()),
            insights: Some(DigestKind::Insights.default_model().to_string()),
        }
    }
}

#[derive(Clone)]
pub struct DigestService {
    generator: Option<Arc<dyn TextGenerator>>,
    memo: Memo,
    models: DigestModels,
    timeout_ms: u64,
}

impl DigestService {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>, memo: Memo) -> Self {
        Self {
            generator,
            memo,
            models: DigestModels::default(),
            timeout_ms: 30_000,
        }
    }

    pub fn with_models(mut self, models: DigestModels) -> Self {
        self.models = models;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    fn model_for(&self, kind: DigestKind) -> Option<String> {
        match kind {
            DigestKind::Summary => self.models.summary.clone(),
            DigestKind::Insights => self.models.insights.clone(),
        }
    }

    /// A cache hit is served even when no generator is configured.
    pub async fn digest(&self, kind: DigestKind, content: &str) -> Result<Digest> {
        if content.trim().is_empty() {
            return Err(Error::Validation("Content is required".to_string()));
        }
        let key = cache_key(kind.cache_prefix(), content);
        let (text, cached) = self
            .memo
            .get_or_try_compute(&key, move || async move {
                let generator = self.generator.as_ref().ok_or_else(|| {
                    Error::NotConfigured("API key not configured".to_string())
                })?;
                let mut req = GenerateRequest::new(kind.prompt(content), kind.max_tokens(), kind.temperature());
                req.model = self.model_for(kind);
                req.timeout_ms = Some(self.timeout_ms);
                tracing::info!(kind = kind.cache_prefix(), chars = content.chars().count(), "generating digest");
                generator.generate(&req).await
            })
            .await?;
        if cached {
            tracing::debug!(kind = kind.cache_prefix(), key = %key, "digest cache hit");
        }
        Ok(Digest { text, cached })
    }
}
