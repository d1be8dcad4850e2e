#![allow(dead_code)]

use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use pivot::state::AppState;
use pivot_core::TextGenerator;
use pivot_local::cache::{BoundedCache, Memo};
use pivot_local::claude::ClaudeClient;
use pivot_local::digest::{DigestModels, DigestService};
use pivot_local::extractor::TopicExtractorConfig;
use pivot_local::pipeline::PivotPipeline;
use pivot_local::search::{BraveNewsProvider, GNewsProvider, NewsApiProvider};
use pivot_local::searcher::{MultiSourceSearcher, SearcherConfig, WeightedProvider};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// How the fake Messages API answers.
#[derive(Clone)]
pub enum ClaudeMode {
    /// Tool-use answer for structured calls, `text` for plain ones.
    Answer { topic: serde_json::Value, text: String },
    Status(u16),
    /// No generator configured at all.
    Missing,
}

impl ClaudeMode {
    pub fn topic(subject: &str, terms: &[&str]) -> Self {
        ClaudeMode::Answer {
            topic: serde_json::json!({ "core_subject": subject, "opposing_terms": terms }),
            text: "- first point\n- second point".to_string(),
        }
    }
}

#[derive(Default, Clone)]
pub struct Recorder {
    pub hits: Arc<AtomicUsize>,
    pub bodies: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl Recorder {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    fn record(&self, v: serde_json::Value) {
        self.hits.fetch_add(1, Ordering::SeqCst);
        self.bodies.lock().unwrap().push(v);
    }

    /// Text of the single user message of every recorded Messages call.
    pub fn prompts(&self) -> Vec<String> {
        self.bodies
            .lock()
            .unwrap()
            .iter()
            .map(|b| b["messages"][0]["content"].as_str().unwrap_or("").to_string())
            .collect()
    }
}

fn claude_app(mode: ClaudeMode, rec: Recorder) -> Router {
    Router::new().route(
        "/v1/messages",
        post(move |Json(body): Json<serde_json::Value>| {
            let mode = mode.clone();
            let rec = rec.clone();
            async move {
                let structured = body.get("tools").is_some();
                rec.record(body);
                match mode {
                    ClaudeMode::Answer { topic, text } => {
                        let block = if structured {
                            serde_json::json!({"type": "tool_use", "id": "t1", "name": "emit_result", "input": topic})
                        } else {
                            serde_json::json!({"type": "text", "text": text})
                        };
                        (StatusCode::OK, Json(serde_json::json!({ "content": [block] })))
                    }
                    ClaudeMode::Status(s) => (
                        StatusCode::from_u16(s).unwrap(),
                        Json(serde_json::json!({"type": "error", "error": {"message": "overloaded"}})),
                    ),
                    ClaudeMode::Missing => unreachable!(),
                }
            }
        }),
    )
}

/// Search fixture behavior: URLs returned for every query, plus an optional delay.
#[derive(Clone, Default)]
pub struct SearchFixture {
    pub urls: Vec<String>,
    pub delay_ms: u64,
}

impl SearchFixture {
    pub fn urls(urls: &[&str]) -> Self {
        Self {
            urls: urls.iter().map(|s| s.to_string()).collect(),
            delay_ms: 0,
        }
    }

    pub fn slow(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

fn search_app(path: &'static str, fx: SearchFixture, rec: Recorder, shape: fn(&str, usize) -> serde_json::Value, wrap: &'static str) -> Router {
    Router::new().route(
        path,
        get(move |Query(q): Query<HashMap<String, String>>| {
            let fx = fx.clone();
            let rec = rec.clone();
            async move {
                rec.record(serde_json::json!(q));
                if fx.delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(fx.delay_ms)).await;
                }
                let items: Vec<serde_json::Value> =
                    fx.urls.iter().enumerate().map(|(i, u)| shape(u, i)).collect();
                let mut body = serde_json::Map::new();
                body.insert(wrap.to_string(), serde_json::Value::Array(items));
                Json(serde_json::Value::Object(body))
            }
        }),
    )
}

fn brave_item(url: &str, i: usize) -> serde_json::Value {
    serde_json::json!({
        "url": url,
        "title": format!("Brave story {i}"),
        "description": "A different take.",
        "age": "2 days ago",
        "thumbnail": {"src": format!("https://imgs.example.net/{i}.jpg")}
    })
}

fn newsapi_item(url: &str, i: usize) -> serde_json::Value {
    serde_json::json!({
        "url": url,
        "title": format!("NewsAPI story {i}"),
        "description": "Critics push back.",
        "publishedAt": "2024-05-01T10:00:00Z",
        "author": "Staff",
        "source": {"name": "Daily Wire Service"}
    })
}

fn gnews_item(url: &str, i: usize) -> serde_json::Value {
    serde_json::json!({
        "url": url,
        "title": format!("GNews story {i}"),
        "description": "Another view.",
        "publishedAt": "2024-05-02T10:00:00Z",
        "source": {"name": "Gazette"}
    })
}

pub struct Setup {
    pub claude: ClaudeMode,
    pub brave: SearchFixture,
    pub newsapi: SearchFixture,
    pub gnews: SearchFixture,
    pub provider_timeout_ms: u64,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            claude: ClaudeMode::topic("congestion pricing", &["commuter burden", "small business harm"]),
            brave: SearchFixture::default(),
            newsapi: SearchFixture::default(),
            gnews: SearchFixture::default(),
            provider_timeout_ms: 2_000,
        }
    }
}

pub struct Harness {
    pub base: String,
    pub claude: Recorder,
    pub brave: Recorder,
    pub newsapi: Recorder,
    pub gnews: Recorder,
    pub http: reqwest::Client,
}

impl Harness {
    pub async fn start(setup: Setup) -> Self {
        let client = reqwest::Client::new();
        let claude = Recorder::default();
        let brave = Recorder::default();
        let newsapi = Recorder::default();
        let gnews = Recorder::default();

        let generator: Option<Arc<dyn TextGenerator>> = match &setup.claude {
            ClaudeMode::Missing => None,
            mode => {
                let addr = serve(claude_app(mode.clone(), claude.clone())).await;
                let claude_client = ClaudeClient::new(client.clone(), "test-key")
                    .with_endpoint(format!("http://{addr}/v1/messages"));
                Some(Arc::new(claude_client) as Arc<dyn TextGenerator>)
            }
        };

        let brave_addr = serve(search_app("/res/v1/news/search", setup.brave, brave.clone(), brave_item, "results")).await;
        let newsapi_addr = serve(search_app("/v2/everything", setup.newsapi, newsapi.clone(), newsapi_item, "articles")).await;
        let gnews_addr = serve(search_app("/api/v4/search", setup.gnews, gnews.clone(), gnews_item, "articles")).await;

        let providers = vec![
            WeightedProvider::new(
                Arc::new(
                    BraveNewsProvider::new(client.clone(), "k")
                        .with_endpoint(format!("http://{brave_addr}/res/v1/news/search")),
                ),
                0.8,
            ),
            WeightedProvider::new(
                Arc::new(
                    NewsApiProvider::new(client.clone(), "k")
                        .with_endpoint(format!("http://{newsapi_addr}/v2/everything")),
                ),
                0.6,
            ),
            WeightedProvider::new(
                Arc::new(
                    GNewsProvider::new(client.clone(), "k")
                        .with_endpoint(format!("http://{gnews_addr}/api/v4/search")),
                ),
                0.7,
            ),
        ];
        let searcher = MultiSourceSearcher::new(
            providers,
            SearcherConfig {
                provider_timeout_ms: setup.provider_timeout_ms,
                query_delay_ms: 0,
                ..Default::default()
            },
        );
        let pipeline = PivotPipeline::new(generator.clone(), TopicExtractorConfig::default(), searcher);
        let digest = DigestService::new(generator, Memo::new(Arc::new(BoundedCache::default())))
            .with_models(DigestModels::claude_defaults());

        let app = pivot::routes::build_router(Arc::new(AppState::new(pipeline, digest)));
        let addr = serve(app).await;

        Self {
            base: format!("http://{addr}"),
            claude,
            brave,
            newsapi,
            gnews,
            http: client,
        }
    }

    pub async fn post(&self, path: &str, body: serde_json::Value) -> (u16, serde_json::Value) {
        self.post_raw(path, body.to_string()).await
    }

    pub async fn post_raw(&self, path: &str, body: String) -> (u16, serde_json::Value) {
        let resp = self
            .http
            .post(format!("{}{path}", self.base))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .expect("post");
        let status = resp.status().as_u16();
        let v: serde_json::Value = resp.json().await.expect("json body");
        (status, v)
    }

    pub fn search_hits(&self) -> usize {
        self.brave.hits() + self.newsapi.hits() + self.gnews.hits()
    }
}
