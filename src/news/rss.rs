// src/news/rss.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use quick_xml::de::from_str;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use time::{format_description::well_known::Rfc2822, OffsetDateTime, UtcOffset};

use crate::config::NewsConfig;
use crate::news::NewsSource;

const PUBLISHER: &str = "Yahoo Finance";

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

fn parse_rfc2822_to_unix(ts: &str) -> Option<i64> {
    OffsetDateTime::parse(ts.trim(), &Rfc2822)
        .ok()
        .map(|dt| dt.to_offset(UtcOffset::UTC).unix_timestamp())
}

/// Yahoo Finance headline RSS feed (`?s=<ticker>`).
///
/// Items are mapped to the flat record layout (`title`, `link`, `publisher`,
/// `providerPublishTime`) so `extract_news_item` handles them like any other
/// upstream record.
pub struct YahooRssSource {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl YahooRssSource {
    pub fn from_config(cfg: &NewsConfig) -> crate::error::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.as_str())
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .build()
            .map_err(|e| crate::error::Error::Config(format!("rss http client: {e}")))?;
        Ok(Self {
            mode: Mode::Http {
                url: cfg.rss_url.clone(),
                client,
            },
        })
    }

    /// Serve a fixed XML document regardless of ticker.
    pub fn from_fixture(xml: &str) -> Self {
        Self {
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    pub fn parse_items_from_str(xml: &str) -> Result<Vec<Value>> {
        let rss: Rss = from_str(xml).context("parsing yahoo rss xml")?;
        let out = rss
            .channel
            .item
            .into_iter()
            .map(|it| {
                let published = it.pub_date.as_deref().and_then(parse_rfc2822_to_unix);
                json!({
                    "title": it.title,
                    "link": it.link,
                    "publisher": PUBLISHER,
                    "providerPublishTime": published,
                })
            })
            .collect();
        Ok(out)
    }
}

#[async_trait]
impl NewsSource for YahooRssSource {
    async fn fetch_raw(&self, ticker: &str) -> Result<Vec<Value>> {
        match &self.mode {
            Mode::Fixture(s) => Self::parse_items_from_str(s),
            Mode::Http { url, client } => {
                let body = client
                    .get(url)
                    .query(&[("s", ticker), ("region", "US"), ("lang", "en-US")])
                    .send()
                    .await
                    .context("yahoo rss get()")?
                    .error_for_status()
                    .context("yahoo rss non-2xx")?
                    .text()
                    .await
                    .context("yahoo rss .text()")?;
                Self::parse_items_from_str(&body)
            }
        }
    }

    fn name(&self) -> &'static str {
        "yahoo-rss"
    }
}
