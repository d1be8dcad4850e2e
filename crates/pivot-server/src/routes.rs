//! HTTP routes: `/api/pivot`, `/api/summarize`, `/api/insights`.

use crate::envelope;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, Method};
use axum::response::Response;
use axum::routing::post;
use axum::Router;
use pivot_core::Error;
use pivot_local::digest::DigestKind;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(86_400));

    Router::new()
        .route("/api/pivot", post(pivot))
        .route("/api/summarize", post(summarize))
        .route("/api/insights", post(insights))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, Error> {
    serde_json::from_slice(body).map_err(|e| Error::Validation(format!("Invalid JSON body: {e}")))
}

#[derive(Debug, Deserialize)]
struct PivotBody {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

async fn pivot(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let t0 = Instant::now();
    let out = async {
        let req: PivotBody = parse_body(&body)?;
        let content = req.content.unwrap_or_default();
        let url = req.url.unwrap_or_default();
        tracing::info!(url = %url, content_chars = content.chars().count(), "pivot request");
        state.pipeline.run(&content, &url).await
    }
    .await;

    match out {
        Ok(outcome) => {
            tracing::info!(
                elapsed_ms = t0.elapsed().as_millis() as u64,
                results = outcome.result.len(),
                "pivot request finished"
            );
            envelope::success(&outcome, t0)
        }
        Err(e) => {
            log_failure("pivot", &e, t0);
            envelope::failure(&e, t0)
        }
    }
}

#[derive(Debug, Deserialize)]
struct DigestBody {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Serialize)]
struct DigestPayload {
    result: String,
    title: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    cached: bool,
}

async fn summarize(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    digest(&state, DigestKind::Summary, body).await
}

async fn insights(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    digest(&state, DigestKind::Insights, body).await
}

async fn digest(state: &AppState, kind: DigestKind, body: Bytes) -> Response {
    let t0 = Instant::now();
    let route = kind.cache_prefix();
    let out = async {
        let req: DigestBody = parse_body(&body)?;
        let content = req.content.unwrap_or_default();
        let d = state.digest.digest(kind, &content).await?;
        let title = req
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| kind.default_title().to_string());
        Ok::<_, Error>(DigestPayload {
            result: d.text,
            title,
            cached: d.cached,
        })
    }
    .await;

    match out {
        Ok(payload) => {
            tracing::info!(
                route,
                cached = payload.cached,
                elapsed_ms = t0.elapsed().as_millis() as u64,
                "digest request finished"
            );
            envelope::success(&payload, t0)
        }
        Err(e) => {
            log_failure(route, &e, t0);
            envelope::failure(&e, t0)
        }
    }
}

fn log_failure(route: &str, e: &Error, t0: Instant) {
    let elapsed_ms = t0.elapsed().as_millis() as u64;
    if e.is_client_error() {
        tracing::info!(route, elapsed_ms, error = %e, "request rejected");
    } else {
        tracing::error!(route, elapsed_ms, error = %e, "request failed");
    }
}
