//! The opposing-viewpoint ("pivot") pipeline: extract topic, search, rank.

use crate::extractor::{TopicExtractor, TopicExtractorConfig};
use crate::searcher::MultiSourceSearcher;
use pivot_core::article::{host_key, ArticleCandidate};
use pivot_core::query::{build_queries, executed};
use pivot_core::rank::{rank, DEFAULT_RESULT_CAP};
use pivot_core::{Error, Result, TextGenerator};
use serde::Serialize;
use std::sync::Arc;

pub const NO_RESULTS_MESSAGE: &str = "No opposing viewpoint articles found for this topic.";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotOutcome {
    pub result: Vec<ArticleCandidate>,
    pub search_query: String,
    pub main_topic: String,
    pub opposing_keywords: Vec<String>,
    /// Candidates found before dedup and truncation.
    pub total_articles_found: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Clone)]
pub struct PivotPipeline {
    generator: Option<Arc<dyn TextGenerator>>,
    extractor_config: TopicExtractorConfig,
    searcher: MultiSourceSearcher,
    result_cap: usize,
}

impl PivotPipeline {
    /// `generator` is `None` when no text-generation credential is configured; requests
    /// then fail with `NotConfigured` after input validation.
    pub fn new(
        generator: Option<Arc<dyn TextGenerator>>,
        extractor_config: TopicExtractorConfig,
        searcher: MultiSourceSearcher,
    ) -> Self {
        Self {
            generator,
            extractor_config,
            searcher,
            result_cap: DEFAULT_RESULT_CAP,
        }
    }

    pub fn with_result_cap(mut self, cap: usize) -> Self {
        self.result_cap = cap;
        self
    }

    pub async fn run(&self, content: &str, url: &str) -> Result<PivotOutcome> {
        if url.trim().is_empty() {
            return Err(Error::Validation("Original article URL is required".to_string()));
        }
        if content.trim().is_empty() {
            return Err(Error::Validation(
                "Original article content is required for analysis.".to_string(),
            ));
        }
        let source_host = host_key(url).ok_or_else(|| Error::InvalidUrl(url.trim().to_string()))?;
        let generator = self.generator.clone().ok_or_else(|| {
            Error::NotConfigured("Text generation API key is not configured on the server.".to_string())
        })?;

        let topic = TopicExtractor::new(generator, self.extractor_config.clone())
            .extract(content)
            .await?;

        let queries = build_queries(&topic.topic, &topic.opposing_terms);
        tracing::info!(queries = ?queries, source_host = %source_host, "searching for opposing viewpoints");
        let candidates = self.searcher.search_all(executed(&queries), &source_host).await;
        let total_articles_found = candidates.len();
        let result = rank(candidates, self.result_cap);
        tracing::info!(
            found = total_articles_found,
            kept = result.len(),
            with_images = result.iter().filter(|a| a.image_url.is_some()).count(),
            "opposing viewpoint search finished"
        );

        let message = result.is_empty().then(|| NO_RESULTS_MESSAGE.to_string());
        Ok(PivotOutcome {
            result,
            search_query: queries.join(" | "),
            main_topic: topic.topic,
            opposing_keywords: topic.opposing_terms,
            total_articles_found,
            message,
        })
    }
}
