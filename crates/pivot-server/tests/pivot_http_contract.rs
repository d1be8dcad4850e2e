mod common;

use common::{ClaudeMode, Harness, SearchFixture, Setup};

fn article(chars: usize) -> String {
    let head = "Cities are weighing congestion pricing to cut traffic. ".repeat(80);
    let mut s: String = head.chars().take(4000).collect();
    while s.chars().count() < chars {
        s.push_str(" TAILMARKER");
    }
    s.chars().take(chars).collect()
}

#[tokio::test]
async fn topic_search_returns_capped_results_without_source_domain() {
    let h = Harness::start(Setup {
        brave: SearchFixture::urls(&[
            "https://example.com/own-story",
            "https://www.example.com/another",
            "https://news.one/a",
            "https://news.two/b",
            "https://news.three/c",
            "https://news.four/d",
            "https://news.five/e",
        ]),
        ..Default::default()
    })
    .await;

    let (status, v) = h
        .post(
            "/api/pivot",
            serde_json::json!({ "content": article(5000), "url": "https://example.com/article" }),
        )
        .await;

    assert_eq!(status, 200, "{v}");
    assert_eq!(v["success"], true);
    let results = v["result"].as_array().expect("result array");
    assert!(!results.is_empty() && results.len() <= 4);
    for r in results {
        let url = r["url"].as_str().unwrap();
        assert!(!url.contains("example.com"), "{url}");
        assert_ne!(r["sourceDomain"], "example.com");
        assert!(r["relevanceScore"].as_f64().is_some());
        assert!(r["imageUrl"].as_str().is_some());
    }
    assert_eq!(v["mainTopic"], "congestion pricing");
    assert_eq!(v["opposingKeywords"].as_array().unwrap().len(), 2);
    assert!(v["searchQuery"].as_str().unwrap().contains(" | "));
    assert!(v["processingTime"].as_u64().is_some());
    assert!(v.get("message").is_none());

    // Only the first 4000 characters reach the topic extractor.
    let prompts = h.claude.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(!prompts[0].contains("TAILMARKER"));
    assert!(h.brave.hits() >= 1);
}

#[tokio::test]
async fn primary_provider_with_enough_results_skips_the_rest() {
    let h = Harness::start(Setup {
        brave: SearchFixture::urls(&["https://a.org/1", "https://b.org/2", "https://c.org/3"]),
        newsapi: SearchFixture::urls(&["https://n.org/1"]),
        gnews: SearchFixture::urls(&["https://g.org/1"]),
        ..Default::default()
    })
    .await;

    let (status, v) = h
        .post("/api/pivot", serde_json::json!({ "content": "Some article.", "url": "https://source.net/x" }))
        .await;

    assert_eq!(status, 200, "{v}");
    assert_eq!(h.brave.hits(), 2);
    assert_eq!(h.newsapi.hits(), 0);
    assert_eq!(h.gnews.hits(), 0);
}

#[tokio::test]
async fn cascade_falls_through_when_primary_is_short() {
    let h = Harness::start(Setup {
        brave: SearchFixture::urls(&["https://a.org/1"]),
        newsapi: SearchFixture::urls(&["https://n.org/1", "https://n.org/2"]),
        gnews: SearchFixture::urls(&["https://g.org/1"]),
        ..Default::default()
    })
    .await;

    let (status, v) = h
        .post("/api/pivot", serde_json::json!({ "content": "Some article.", "url": "https://source.net/x" }))
        .await;

    assert_eq!(status, 200, "{v}");
    assert_eq!(h.newsapi.hits(), 2);
    // brave (1) + newsapi (2) reaches 3 per query.
    assert_eq!(h.gnews.hits(), 0);
    let providers: Vec<&str> = v["result"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["provider"].as_str().unwrap())
        .collect();
    assert_eq!(providers, vec!["brave", "newsapi", "newsapi"]);
}

#[tokio::test]
async fn extractor_failure_is_500_and_no_search_runs() {
    let h = Harness::start(Setup {
        claude: ClaudeMode::Status(503),
        brave: SearchFixture::urls(&["https://a.org/1"]),
        ..Default::default()
    })
    .await;

    let (status, v) = h
        .post("/api/pivot", serde_json::json!({ "content": "Some article.", "url": "https://source.net/x" }))
        .await;

    assert_eq!(status, 500);
    assert_eq!(v["success"], false);
    assert!(v["error"].as_str().unwrap().contains("503"), "{v}");
    assert!(v["processingTime"].as_u64().is_some());
    assert_eq!(h.search_hits(), 0);
}

#[tokio::test]
async fn duplicate_urls_across_queries_appear_once() {
    let h = Harness::start(Setup {
        brave: SearchFixture::urls(&["https://a.org/1", "https://b.org/2", "https://c.org/3"]),
        ..Default::default()
    })
    .await;

    let (status, v) = h
        .post("/api/pivot", serde_json::json!({ "content": "Some article.", "url": "https://source.net/x" }))
        .await;

    assert_eq!(status, 200, "{v}");
    let urls: Vec<&str> = v["result"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["url"].as_str().unwrap())
        .collect();
    assert_eq!(urls, vec!["https://a.org/1", "https://b.org/2", "https://c.org/3"]);
    assert_eq!(v["totalArticlesFound"], 6);
}

#[tokio::test]
async fn blank_content_is_400_before_any_provider_call() {
    let h = Harness::start(Setup::default()).await;

    let (status, v) = h
        .post("/api/pivot", serde_json::json!({ "content": "   \n", "url": "https://source.net/x" }))
        .await;
    assert_eq!(status, 400);
    assert_eq!(v["success"], false);
    assert!(v["processingTime"].as_u64().is_some());

    let (status, _) = h.post("/api/pivot", serde_json::json!({ "content": "text" })).await;
    assert_eq!(status, 400);

    let (status, _) = h
        .post("/api/pivot", serde_json::json!({ "content": "text", "url": "not a url" }))
        .await;
    assert_eq!(status, 400);

    assert_eq!(h.claude.hits(), 0);
    assert_eq!(h.search_hits(), 0);
}

#[tokio::test]
async fn malformed_json_is_400_with_envelope() {
    let h = Harness::start(Setup::default()).await;
    let (status, v) = h.post_raw("/api/pivot", "{not json".to_string()).await;
    assert_eq!(status, 400);
    assert_eq!(v["success"], false);
    assert!(v["error"].as_str().unwrap().contains("Invalid JSON"));
}

#[tokio::test]
async fn missing_generator_is_500_not_configured() {
    let h = Harness::start(Setup {
        claude: ClaudeMode::Missing,
        ..Default::default()
    })
    .await;
    let (status, v) = h
        .post("/api/pivot", serde_json::json!({ "content": "text", "url": "https://source.net/x" }))
        .await;
    assert_eq!(status, 500);
    assert_eq!(v["code"], "not_configured");
}

#[tokio::test]
async fn no_results_is_success_with_message() {
    let h = Harness::start(Setup::default()).await;
    let (status, v) = h
        .post("/api/pivot", serde_json::json!({ "content": "text", "url": "https://source.net/x" }))
        .await;
    assert_eq!(status, 200);
    assert_eq!(v["success"], true);
    assert_eq!(v["result"].as_array().unwrap().len(), 0);
    assert_eq!(v["totalArticlesFound"], 0);
    assert!(v["message"].as_str().is_some());
}

#[tokio::test]
async fn slow_provider_is_skipped_after_timeout() {
    let h = Harness::start(Setup {
        brave: SearchFixture::urls(&["https://slow.org/1"]).slow(1_500),
        newsapi: SearchFixture::urls(&["https://n.org/1", "https://n.org/2", "https://n.org/3"]),
        provider_timeout_ms: 100,
        ..Default::default()
    })
    .await;

    let (status, v) = h
        .post("/api/pivot", serde_json::json!({ "content": "text", "url": "https://source.net/x" }))
        .await;
    assert_eq!(status, 200, "{v}");
    let results = v["result"].as_array().unwrap();
    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r["provider"] == "newsapi"));
}

#[tokio::test]
async fn preflight_returns_permissive_cors_headers() {
    let h = Harness::start(Setup::default()).await;
    for path in ["/api/pivot", "/api/summarize", "/api/insights"] {
        let resp = h
            .http
            .request(reqwest::Method::OPTIONS, format!("{}{path}", h.base))
            .header("origin", "chrome-extension://abc")
            .header("access-control-request-method", "POST")
            .header("access-control-request-headers", "content-type")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200, "{path}");
        let headers = resp.headers();
        assert_eq!(headers["access-control-allow-origin"], "*");
        let methods = headers["access-control-allow-methods"].to_str().unwrap();
        assert!(methods.contains("POST") && methods.contains("OPTIONS"), "{methods}");
        let allowed = headers["access-control-allow-headers"].to_str().unwrap();
        assert!(allowed.eq_ignore_ascii_case("content-type"), "{allowed}");
        assert_eq!(headers["access-control-max-age"], "86400");
    }
}

#[tokio::test]
async fn bare_options_is_answered_by_cors_layer() {
    let h = Harness::start(Setup::default()).await;
    let resp = h
        .http
        .request(reqwest::Method::OPTIONS, format!("{}/api/pivot", h.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");
    assert_eq!(h.search_hits(), 0);
}
