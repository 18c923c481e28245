// tests/common/mod.rs
//
// Shared test doubles: a scripted news source and a scripted classifier.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use ticker_sentiment::classify::{RawPrediction, SentimentClient};
use ticker_sentiment::error::{Error, Result};
use ticker_sentiment::news::NewsSource;

/// Returns the same records (or the same failure) for every ticker.
pub struct StaticNews {
    records: Vec<Value>,
    fail: bool,
}

impl StaticNews {
    pub fn with_titles(titles: &[&str]) -> Arc<Self> {
        let records = titles
            .iter()
            .enumerate()
            .map(|(i, t)| {
                json!({
                    "title": t,
                    "link": format!("https://news.example/{i}"),
                    "publisher": "Wire",
                    "providerPublishTime": 1_736_260_200 + i as i64,
                })
            })
            .collect();
        Arc::new(Self {
            records,
            fail: false,
        })
    }

    pub fn with_records(records: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            records,
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            records: Vec::new(),
            fail: true,
        })
    }
}

#[async_trait]
impl NewsSource for StaticNews {
    async fn fetch_raw(&self, _ticker: &str) -> anyhow::Result<Vec<Value>> {
        if self.fail {
            anyhow::bail!("connection refused");
        }
        Ok(self.records.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// Titles containing "down" are negative, everything else positive.
/// Titles listed in `fail_on` fail with `ClassificationFailure`.
#[derive(Default)]
pub struct ScriptedClient {
    fail_on: Vec<String>,
    /// Drop the last prediction of every batch.
    short_batch: bool,
    pub calls: AtomicUsize,
    pub batch_calls: AtomicUsize,
}

impl ScriptedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_on(titles: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            fail_on: titles.iter().map(|t| t.to_string()).collect(),
            ..Self::default()
        })
    }

    pub fn short_batches() -> Arc<Self> {
        Arc::new(Self {
            short_batch: true,
            ..Self::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    fn predict(&self, text: &str) -> Result<RawPrediction> {
        if self.fail_on.iter().any(|t| t == text) {
            return Err(Error::ClassificationFailure(format!("boom on {text}")));
        }
        let (pos, neg) = if text.to_lowercase().contains("down") {
            (0.1, 0.8)
        } else {
            (0.85, 0.05)
        };
        Ok(RawPrediction::from_json(json!([[
            { "label": "positive", "score": pos },
            { "label": "negative", "score": neg },
            { "label": "neutral", "score": 1.0 - pos - neg }
        ]])))
    }
}

#[async_trait]
impl SentimentClient for ScriptedClient {
    async fn classify(&self, text: &str) -> Result<RawPrediction> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.predict(text)
    }

    async fn classify_batch(&self, texts: &[String]) -> Result<Vec<RawPrediction>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        let mut out = Vec::with_capacity(texts.len());
        for (index, t) in texts.iter().enumerate() {
            let p = self.predict(t).map_err(|e| Error::BatchFailure {
                index,
                reason: e.to_string(),
            })?;
            out.push(p);
        }
        if self.short_batch {
            out.pop();
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
