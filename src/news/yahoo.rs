// src/news/yahoo.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::config::NewsConfig;
use crate::news::NewsSource;

/// Yahoo Finance search endpoint; returns the `news` array untouched.
pub struct YahooSearchSource {
    client: reqwest::Client,
    search_url: String,
    count: u32,
}

#[derive(Debug, Deserialize)]
struct SearchResp {
    #[serde(default)]
    news: Vec<Value>,
}

impl YahooSearchSource {
    pub fn from_config(cfg: &NewsConfig) -> crate::error::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.as_str())
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .build()
            .map_err(|e| crate::error::Error::Config(format!("news http client: {e}")))?;
        Ok(Self {
            client,
            search_url: cfg.search_url.clone(),
            count: cfg.fetch_count,
        })
    }
}

#[async_trait]
impl NewsSource for YahooSearchSource {
    async fn fetch_raw(&self, ticker: &str) -> Result<Vec<Value>> {
        let count = self.count.to_string();
        let resp = self
            .client
            .get(&self.search_url)
            .query(&[
                ("q", ticker),
                ("newsCount", count.as_str()),
                ("quotesCount", "0"),
            ])
            .send()
            .await
            .context("yahoo search get()")?
            .error_for_status()
            .context("yahoo search non-2xx")?;

        let body: SearchResp = resp.json().await.context("yahoo search .json()")?;
        Ok(body.news)
    }

    fn name(&self) -> &'static str {
        "yahoo"
    }
}
