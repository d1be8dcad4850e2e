//! Serve-time configuration (flags + env) and state assembly.

use crate::state::AppState;
use pivot_core::{SearchProvider, TextGenerator};
use pivot_local::cache::{BoundedCache, Memo};
use pivot_local::claude::ClaudeClient;
use pivot_local::digest::{DigestModels, DigestService};
use pivot_local::extractor::TopicExtractorConfig;
use pivot_local::openai_compat::OpenAiCompatClient;
use pivot_local::perplexity::PerplexitySearchProvider;
use pivot_local::pipeline::PivotPipeline;
use pivot_local::search::{BraveNewsProvider, GNewsProvider, NewsApiProvider, TavilyProvider};
use pivot_local::searcher::{MultiSourceSearcher, QueryStrategy, SearcherConfig, WeightedProvider};
use std::sync::Arc;
use std::time::Duration;

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    Brave,
    Newsapi,
    Gnews,
    Tavily,
    Perplexity,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 5] = [
        ProviderKind::Brave,
        ProviderKind::Newsapi,
        ProviderKind::Gnews,
        ProviderKind::Tavily,
        ProviderKind::Perplexity,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Brave => "brave",
            Self::Newsapi => "newsapi",
            Self::Gnews => "gnews",
            Self::Tavily => "tavily",
            Self::Perplexity => "perplexity",
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeneratorKind {
    Claude,
    OpenaiCompat,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrategyArg {
    Sequential,
    Joined,
}

impl From<StrategyArg> for QueryStrategy {
    fn from(s: StrategyArg) -> Self {
        match s {
            StrategyArg::Sequential => QueryStrategy::Sequential,
            StrategyArg::Joined => QueryStrategy::Joined,
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "PIVOT_BIND", default_value = "127.0.0.1:3000")]
    pub bind: String,

    /// Search providers in cascade order (comma-separated).
    #[arg(
        long,
        env = "PIVOT_PROVIDERS",
        value_enum,
        value_delimiter = ',',
        default_values = ["brave", "newsapi", "gnews"]
    )]
    pub providers: Vec<ProviderKind>,

    #[arg(long, env = "PIVOT_WEIGHT_BRAVE", default_value_t = 0.8)]
    pub weight_brave: f64,
    #[arg(long, env = "PIVOT_WEIGHT_NEWSAPI", default_value_t = 0.6)]
    pub weight_newsapi: f64,
    #[arg(long, env = "PIVOT_WEIGHT_GNEWS", default_value_t = 0.7)]
    pub weight_gnews: f64,
    #[arg(long, env = "PIVOT_WEIGHT_TAVILY", default_value_t = 0.75)]
    pub weight_tavily: f64,
    #[arg(long, env = "PIVOT_WEIGHT_PERPLEXITY", default_value_t = 0.65)]
    pub weight_perplexity: f64,

    /// Per provider call.
    #[arg(long, env = "PIVOT_PROVIDER_TIMEOUT_MS", default_value_t = 8_000)]
    pub provider_timeout_ms: u64,
    /// Pause between consecutive queries (sequential strategy only).
    #[arg(long, env = "PIVOT_QUERY_DELAY_MS", default_value_t = 200)]
    pub query_delay_ms: u64,
    /// Page size requested from each provider (provider default when unset).
    #[arg(long, env = "PIVOT_MAX_RESULTS_PER_PROVIDER")]
    pub max_results_per_provider: Option<usize>,
    #[arg(long, env = "PIVOT_RESULT_CAP", default_value_t = 4)]
    pub result_cap: usize,
    #[arg(long, env = "PIVOT_QUERY_STRATEGY", value_enum, default_value = "sequential")]
    pub strategy: StrategyArg,

    /// Text-generation backend.
    #[arg(long, env = "PIVOT_GENERATOR", value_enum, default_value = "claude")]
    pub generator: GeneratorKind,
    /// Request schema-constrained JSON for topic extraction.
    #[arg(long, env = "PIVOT_STRUCTURED_OUTPUT", action = clap::ArgAction::Set, default_value_t = true)]
    pub structured_output: bool,
    #[arg(long, env = "PIVOT_GENERATOR_TIMEOUT_MS", default_value_t = 30_000)]
    pub generator_timeout_ms: u64,
    #[arg(long, env = "PIVOT_TOPIC_MODEL")]
    pub topic_model: Option<String>,
    #[arg(long, env = "PIVOT_SUMMARY_MODEL")]
    pub summary_model: Option<String>,
    #[arg(long, env = "PIVOT_INSIGHTS_MODEL")]
    pub insights_model: Option<String>,

    /// Summary/insights cache entries (0 disables caching).
    #[arg(long, env = "PIVOT_CACHE_CAPACITY", default_value_t = 500)]
    pub cache_capacity: usize,
    #[arg(long, env = "PIVOT_CACHE_TTL_SECS", default_value_t = 86_400)]
    pub cache_ttl_secs: u64,
}

impl ServeArgs {
    pub fn weight(&self, kind: ProviderKind) -> f64 {
        match kind {
            ProviderKind::Brave => self.weight_brave,
            ProviderKind::Newsapi => self.weight_newsapi,
            ProviderKind::Gnews => self.weight_gnews,
            ProviderKind::Tavily => self.weight_tavily,
            ProviderKind::Perplexity => self.weight_perplexity,
        }
    }

    fn digest_models(&self) -> DigestModels {
        let base = match self.generator {
            GeneratorKind::Claude => DigestModels::claude_defaults(),
            GeneratorKind::OpenaiCompat => DigestModels::default(),
        };
        DigestModels {
            summary: self.summary_model.clone().or(base.summary),
            insights: self.insights_model.clone().or(base.insights),
        }
    }
}

pub fn provider_from_env(
    kind: ProviderKind,
    client: reqwest::Client,
) -> pivot_core::Result<Arc<dyn SearchProvider>> {
    let p: Arc<dyn SearchProvider> = match kind {
        ProviderKind::Brave => Arc::new(BraveNewsProvider::from_env(client)?),
        ProviderKind::Newsapi => Arc::new(NewsApiProvider::from_env(client)?),
        ProviderKind::Gnews => Arc::new(GNewsProvider::from_env(client)?),
        ProviderKind::Tavily => Arc::new(TavilyProvider::from_env(client)?),
        ProviderKind::Perplexity => Arc::new(PerplexitySearchProvider::from_env(client)?),
    };
    Ok(p)
}

pub fn generator_from_env(
    kind: GeneratorKind,
    client: reqwest::Client,
    model: Option<String>,
) -> pivot_core::Result<Arc<dyn TextGenerator>> {
    let g: Arc<dyn TextGenerator> = match kind {
        GeneratorKind::Claude => Arc::new(ClaudeClient::from_env(client)?),
        GeneratorKind::OpenaiCompat => Arc::new(OpenAiCompatClient::from_env(client, model)?),
    };
    Ok(g)
}

/// Build the shared state. Missing credentials never fail startup: an absent search key
/// drops that provider from the cascade, an absent generator key fails requests later.
pub fn build_state(args: &ServeArgs) -> anyhow::Result<AppState> {
    let client = pivot_local::http_client()?;

    let generator = match generator_from_env(args.generator, client.clone(), args.topic_model.clone()) {
        Ok(g) => Some(g),
        Err(e) => {
            tracing::warn!(error = %e, "text generation is not configured; requests that need it will fail");
            None
        }
    };

    let mut providers = Vec::new();
    for kind in &args.providers {
        match provider_from_env(*kind, client.clone()) {
            Ok(p) => providers.push(WeightedProvider::new(p, args.weight(*kind))),
            Err(e) => tracing::warn!(provider = kind.as_str(), error = %e, "search provider disabled"),
        }
    }
    if providers.is_empty() {
        tracing::warn!("no search providers configured; pivot requests will return no articles");
    }

    let searcher = MultiSourceSearcher::new(
        providers,
        SearcherConfig {
            provider_timeout_ms: args.provider_timeout_ms,
            query_delay_ms: args.query_delay_ms,
            max_results_per_provider: args.max_results_per_provider,
            strategy: args.strategy.into(),
            ..Default::default()
        },
    );
    tracing::info!(cascade = ?searcher.provider_names(), "search cascade ready");

    let extractor = TopicExtractorConfig {
        model: args.topic_model.clone(),
        structured_output: args.structured_output,
        timeout_ms: args.generator_timeout_ms,
        ..Default::default()
    };
    let pipeline = PivotPipeline::new(generator.clone(), extractor, searcher).with_result_cap(args.result_cap);

    let cache = BoundedCache::new(args.cache_capacity, Duration::from_secs(args.cache_ttl_secs));
    let digest = DigestService::new(generator, Memo::new(Arc::new(cache)))
        .with_models(args.digest_models())
        .with_timeout_ms(args.generator_timeout_ms);

    Ok(AppState::new(pipeline, digest))
}

/// Load `KEY=VALUE` lines from `PIVOT_ENV_FILE`, if set. Never overrides the process
/// environment and never logs values.
pub fn load_env_file() {
    let Ok(p) = std::env::var("PIVOT_ENV_FILE") else {
        return;
    };
    let p = p.trim();
    if p.is_empty() {
        return;
    }
    let Ok(txt) = std::fs::read_to_string(p) else {
        return;
    };
    for raw in txt.lines() {
        let s = raw.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let Some((k, v)) = s.split_once('=') else {
            continue;
        };
        let k = k.trim();
        let v = v.trim().trim_matches('"');
        if k.is_empty() {
            continue;
        }
        if std::env::var_os(k).is_none() {
            std::env::set_var(k, v);
        }
    }
}
