// src/classify/remote.rs
//! Remote inference endpoint (Hugging Face style): `POST {"inputs": ...}` with a bearer token.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::classify::{ensure_batch_len, record_call, RawPrediction, SentimentClient};
use crate::config::ClassifierConfig;
use crate::error::{Error, Result};

pub struct RemoteClassifier {
    http: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

#[derive(Serialize)]
struct Req<'a, T: Serialize + ?Sized> {
    inputs: &'a T,
}

impl RemoteClassifier {
    pub fn from_config(cfg: &ClassifierConfig) -> Result<Self> {
        Self::new(
            &cfg.endpoint_url,
            cfg.hf_token.clone(),
            Duration::from_secs(cfg.connect_timeout_secs),
            Duration::from_secs(cfg.request_timeout_secs),
        )
    }

    pub fn new(
        endpoint: &str,
        token: Option<String>,
        connect_timeout: Duration,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("ticker-sentiment/0.1")
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("inference http client: {e}")))?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            token,
        })
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    async fn post<T: Serialize + ?Sized + Sync>(&self, inputs: &T) -> Result<Value> {
        let mut req = self.http.post(&self.endpoint).json(&Req { inputs });
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(Error::Unauthorized {
                status: status.as_u16(),
                credential_present: self.has_token(),
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::ClassificationFailure(format!(
                "{status}: {}",
                upstream_message(&body)
            )));
        }

        resp.json::<Value>()
            .await
            .map_err(|e| Error::ParseFailure(format!("endpoint returned non-JSON body: {e}")))
    }
}

/// Prefer the endpoint's own `error` text; fall back to a trimmed body.
fn upstream_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().chars().take(200).collect())
}

#[async_trait]
impl SentimentClient for RemoteClassifier {
    async fn classify(&self, text: &str) -> Result<RawPrediction> {
        let started = Instant::now();
        let out = self.post(text).await.map(RawPrediction::from_json);
        record_call(self.name(), started, &out);
        if let Err(e) = &out {
            tracing::warn!(target: "classify", kind = e.kind(), error = %e, "inference call failed");
        }
        out
    }

    async fn classify_batch(&self, texts: &[String]) -> Result<Vec<RawPrediction>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let started = Instant::now();
        let out = self.post(texts).await.and_then(|v| split_batch(texts.len(), v));
        record_call(self.name(), started, &out);
        out.map_err(|e| match e {
            Error::BatchFailure { .. } => e,
            other => Error::BatchFailure {
                index: 0,
                reason: other.to_string(),
            },
        })
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

/// One prediction per input, in input order; length must match.
fn split_batch(expected: usize, v: Value) -> Result<Vec<RawPrediction>> {
    match v {
        Value::Array(items) => {
            ensure_batch_len(expected, items.len())?;
            Ok(items.into_iter().map(RawPrediction::from_json).collect())
        }
        other => {
            let reason = match RawPrediction::from_json(other) {
                p @ RawPrediction::Failed(_) => p.error_message().unwrap_or_default(),
                _ => "batch response is not a sequence".to_string(),
            };
            Err(Error::BatchFailure { index: 0, reason })
        }
    }
}
