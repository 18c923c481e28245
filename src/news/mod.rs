// src/news/mod.rs
//! News source adapter: raw upstream records -> `NewsItem`.

pub mod rss;
pub mod yahoo;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{NewsConfig, NewsProvider};
use crate::error::{Error, Result};

pub use rss::YahooRssSource;
pub use yahoo::YahooSearchSource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub link: Option<String>,
    pub publisher: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

impl NewsItem {
    pub fn published_unix(&self) -> Option<i64> {
        self.published_at.map(|t| t.timestamp())
    }
}

/// Upstream collaborator returning opaque, heterogeneous records for a ticker.
#[async_trait]
pub trait NewsSource: Send + Sync {
    async fn fetch_raw(&self, ticker: &str) -> anyhow::Result<Vec<Value>>;
    fn name(&self) -> &'static str;
}

pub type DynNewsSource = Arc<dyn NewsSource>;

/// Build the configured source.
pub fn build_source(cfg: &NewsConfig) -> Result<DynNewsSource> {
    Ok(match cfg.provider {
        NewsProvider::Yahoo => Arc::new(YahooSearchSource::from_config(cfg)?),
        NewsProvider::YahooRss => Arc::new(YahooRssSource::from_config(cfg)?),
    })
}

/// Fetch and extract news for `ticker`, in upstream order.
///
/// Fails with `SourceUnavailable` when the upstream errors and `NoNews` when
/// it returns no records. Records without a usable title are dropped; if every record is
/// dropped the result is an empty `Ok`.
pub async fn fetch_news(source: &dyn NewsSource, ticker: &str) -> Result<Vec<NewsItem>> {
    let ticker = ticker.trim().to_ascii_uppercase();
    if ticker.is_empty() {
        return Err(Error::SourceUnavailable("empty ticker symbol".into()));
    }

    let raw = match source.fetch_raw(&ticker).await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(target: "news", error = ?e, source = source.name(), %ticker, "news fetch failed");
            return Err(Error::SourceUnavailable(format!("{}: {e:#}", source.name())));
        }
    };
    if raw.is_empty() {
        return Err(Error::NoNews(ticker));
    }

    let found = raw.len();
    let items: Vec<NewsItem> = raw.iter().filter_map(extract_news_item).collect();
    let dropped = found - items.len();

    counter!("news_items_fetched_total").increment(found as u64);
    counter!("news_items_dropped_total").increment(dropped as u64);
    tracing::info!(target: "news", source = source.name(), %ticker, found, dropped, "news fetched");

    Ok(items)
}

/// Extract one item from a raw record. `None` when no usable title exists.
///
/// Nested `content.*` fields (current Yahoo layout) win over the flat
/// top-level fields (legacy layout and RSS-derived records).
pub fn extract_news_item(raw: &Value) -> Option<NewsItem> {
    let title = non_blank(path_str(raw, &["content", "title"]))
        .or_else(|| non_blank(path_str(raw, &["title"])))
        .map(clean_title)
        .filter(|t| !t.is_empty())?;

    let link = non_blank(path_str(raw, &["content", "canonicalUrl", "url"]))
        .or_else(|| non_blank(path_str(raw, &["content", "clickThroughUrl", "url"])))
        .or_else(|| non_blank(path_str(raw, &["link"])))
        .map(str::to_string);

    let publisher = non_blank(path_str(raw, &["content", "provider", "displayName"]))
        .or_else(|| non_blank(path_str(raw, &["publisher"])))
        .map(str::to_string);

    let published_at = path_str(raw, &["content", "pubDate"])
        .and_then(parse_rfc3339)
        .or_else(|| path_str(raw, &["content", "displayTime"]).and_then(parse_rfc3339))
        .or_else(|| {
            raw.get("providerPublishTime")
                .and_then(Value::as_i64)
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        });

    Some(NewsItem {
        title,
        link,
        publisher,
        published_at,
    })
}

/// Decode HTML entities and collapse whitespace.
pub fn clean_title(s: &str) -> String {
    static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));
    let decoded = html_escape::decode_html_entities(s);
    RE_WS.replace_all(&decoded, " ").trim().to_string()
}

fn path_str<'a>(v: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut cur = v;
    for key in path {
        cur = cur.get(key)?;
    }
    cur.as_str()
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
