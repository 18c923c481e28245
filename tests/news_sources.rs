// tests/news_sources.rs
//
// Yahoo search and RSS sources against an in-process upstream bound to 127.0.0.1:0.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use shuttle_axum::axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use ticker_sentiment::config::{NewsConfig, NewsProvider};
use ticker_sentiment::error::Error;
use ticker_sentiment::news::{
    build_source, fetch_news, NewsSource, YahooRssSource, YahooSearchSource,
};

type SeenQuery = Arc<Mutex<HashMap<String, String>>>;

const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Yahoo! Finance: AAPL News</title>
    <item>
      <title>Apple &amp; suppliers rally</title>
      <link>https://finance.yahoo.com/news/a</link>
      <pubDate>Tue, 07 Jan 2025 14:30:00 +0000</pubDate>
    </item>
    <item>
      <title>Second headline</title>
      <link>https://finance.yahoo.com/news/b</link>
    </item>
  </channel>
</rss>"#;

async fn search(
    State(seen): State<SeenQuery>,
    Query(q): Query<HashMap<String, String>>,
) -> Json<Value> {
    *seen.lock().unwrap() = q;
    Json(json!({
        "quotes": [],
        "news": [
            {
                "content": {
                    "title": "Apple beats estimates",
                    "pubDate": "2025-01-02T03:04:05Z",
                    "canonicalUrl": { "url": "https://news.example/beat" },
                    "provider": { "displayName": "Reuters" }
                }
            },
            {
                "title": "Legacy headline",
                "link": "https://news.example/legacy",
                "publisher": "AP",
                "providerPublishTime": 1_700_000_000
            }
        ]
    }))
}

async fn rss(
    State(seen): State<SeenQuery>,
    Query(q): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    *seen.lock().unwrap() = q;
    ([(header::CONTENT_TYPE, "application/rss+xml")], FEED)
}

async fn broken() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded")
}

async fn spawn_upstream() -> (String, SeenQuery) {
    let seen: SeenQuery = Arc::new(Mutex::new(HashMap::new()));
    let app = Router::new()
        .route("/search", get(search))
        .route("/rss", get(rss))
        .route("/broken", get(broken))
        .with_state(seen.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = shuttle_axum::axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), seen)
}

fn config(base: &str, search_path: &str, rss_path: &str) -> NewsConfig {
    NewsConfig {
        search_url: format!("{base}{search_path}"),
        rss_url: format!("{base}{rss_path}"),
        fetch_count: 7,
        timeout_secs: 5,
        ..NewsConfig::default()
    }
}

#[tokio::test]
async fn search_source_sends_query_and_returns_news_array() {
    let (base, seen) = spawn_upstream().await;
    let src = YahooSearchSource::from_config(&config(&base, "/search", "/rss")).unwrap();

    let items = fetch_news(&src, " aapl ").await.unwrap();

    {
        let q = seen.lock().unwrap();
        assert_eq!(q.get("q").map(String::as_str), Some("AAPL"));
        assert_eq!(q.get("newsCount").map(String::as_str), Some("7"));
        assert_eq!(q.get("quotesCount").map(String::as_str), Some("0"));
    }

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].title, "Apple beats estimates");
    assert_eq!(items[0].link.as_deref(), Some("https://news.example/beat"));
    assert_eq!(items[0].publisher.as_deref(), Some("Reuters"));
    assert_eq!(items[0].published_unix(), Some(1_735_787_045));
    assert_eq!(items[1].title, "Legacy headline");
    assert_eq!(items[1].publisher.as_deref(), Some("AP"));
    assert_eq!(items[1].published_unix(), Some(1_700_000_000));
}

#[tokio::test]
async fn rss_source_fetches_feed_over_http() {
    let (base, seen) = spawn_upstream().await;
    let mut cfg = config(&base, "/search", "/rss");
    cfg.provider = NewsProvider::YahooRss;
    let src = build_source(&cfg).unwrap();
    assert_eq!(src.name(), "yahoo-rss");

    let items = fetch_news(src.as_ref(), "msft").await.unwrap();

    {
        let q = seen.lock().unwrap();
        assert_eq!(q.get("s").map(String::as_str), Some("MSFT"));
        assert_eq!(q.get("region").map(String::as_str), Some("US"));
        assert_eq!(q.get("lang").map(String::as_str), Some("en-US"));
    }

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].title, "Apple & suppliers rally");
    assert_eq!(items[0].publisher.as_deref(), Some("Yahoo Finance"));
    assert_eq!(items[0].published_unix(), Some(1_736_260_200));
    assert_eq!(items[1].published_unix(), None);
}

#[tokio::test]
async fn search_server_error_is_source_unavailable() {
    let (base, _) = spawn_upstream().await;
    let src = YahooSearchSource::from_config(&config(&base, "/broken", "/rss")).unwrap();

    match fetch_news(&src, "AAPL").await {
        Err(Error::SourceUnavailable(msg)) => assert!(msg.starts_with("yahoo:"), "{msg}"),
        other => panic!("expected SourceUnavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn rss_server_error_is_source_unavailable() {
    let (base, _) = spawn_upstream().await;
    let src = YahooRssSource::from_config(&config(&base, "/search", "/broken")).unwrap();

    match fetch_news(&src, "AAPL").await {
        Err(Error::SourceUnavailable(msg)) => assert!(msg.starts_with("yahoo-rss:"), "{msg}"),
        other => panic!("expected SourceUnavailable, got {other:?}"),
    }
}
