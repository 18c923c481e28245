// src/classify/mod.rs
//! Sentiment classification: client abstraction + raw prediction payloads.

pub mod lexicon;
pub mod remote;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};

pub use crate::config::ClassifierKind;
use crate::config::ClassifierConfig;
use crate::error::{Error, Result};

pub use lexicon::LexiconClassifier;
pub use remote::RemoteClassifier;

/// Payload returned by a classifier, tagged by shape.
///
/// Built from JSON with [`RawPrediction::from_json`]; serializes back to the
/// exact JSON it was built from.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPrediction {
    /// A mapping carrying an `error` field.
    Failed(Map<String, Value>),
    /// Sequence whose first element is a sequence: `[[{label, score}, ..], ..]`.
    Batched(Vec<Value>),
    /// Sequence whose first element is a mapping: `[{label, score}, ..]`.
    Candidates(Vec<Value>),
    /// A single best-label mapping: `{label, score}`.
    Single(Map<String, Value>),
    /// Anything else (scalars, null, empty or scalar sequences).
    Unrecognized(Value),
}

impl RawPrediction {
    pub fn from_json(v: Value) -> Self {
        match v {
            Value::Object(m) if m.contains_key("error") => RawPrediction::Failed(m),
            Value::Array(items) => match items.first() {
                Some(Value::Array(_)) => RawPrediction::Batched(items),
                Some(Value::Object(_)) => RawPrediction::Candidates(items),
                _ => RawPrediction::Unrecognized(Value::Array(items)),
            },
            Value::Object(m) => RawPrediction::Single(m),
            other => RawPrediction::Unrecognized(other),
        }
    }

    /// `{"error": message}`.
    pub fn error(message: impl Into<String>) -> Self {
        let mut m = Map::new();
        m.insert("error".into(), Value::String(message.into()));
        RawPrediction::Failed(m)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RawPrediction::Failed(_))
    }

    /// Message of an error payload; non-string `error` values are rendered as JSON.
    pub fn error_message(&self) -> Option<String> {
        match self {
            RawPrediction::Failed(m) => m.get("error").map(|e| match e {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            RawPrediction::Failed(m) | RawPrediction::Single(m) => Value::Object(m.clone()),
            RawPrediction::Batched(v) | RawPrediction::Candidates(v) => Value::Array(v.clone()),
            RawPrediction::Unrecognized(v) => v.clone(),
        }
    }
}

impl From<Value> for RawPrediction {
    fn from(v: Value) -> Self {
        RawPrediction::from_json(v)
    }
}

impl Serialize for RawPrediction {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Classifier collaborator (remote endpoint or in-process model).
#[async_trait]
pub trait SentimentClient: Send + Sync {
    /// Classify one text. Transport and auth problems are `Err`, never a payload.
    async fn classify(&self, text: &str) -> Result<RawPrediction>;

    /// Classify several texts; output order and length match `texts`.
    ///
    /// Fails as a whole with `BatchFailure` if any text fails.
    async fn classify_batch(&self, texts: &[String]) -> Result<Vec<RawPrediction>> {
        let mut out = Vec::with_capacity(texts.len());
        for (index, text) in texts.iter().enumerate() {
            match self.classify(text).await {
                Ok(p) => out.push(p),
                Err(e) => {
                    return Err(Error::BatchFailure {
                        index,
                        reason: e.to_string(),
                    })
                }
            }
        }
        Ok(out)
    }

    /// Client name for diagnostics/metrics.
    fn name(&self) -> &'static str;
}

pub type DynSentimentClient = Arc<dyn SentimentClient>;

/// Build the client selected by `cfg.kind`.
pub fn build_client(cfg: &ClassifierConfig) -> Result<DynSentimentClient> {
    Ok(match cfg.kind {
        ClassifierKind::Remote => Arc::new(RemoteClassifier::from_config(cfg)?),
        ClassifierKind::Local => Arc::new(
            LexiconClassifier::from_config(cfg).map_err(|e| Error::Config(format!("{e:#}")))?,
        ),
    })
}

/// A batch response must have exactly one prediction per input.
pub fn ensure_batch_len(expected: usize, got: usize) -> Result<()> {
    if expected == got {
        return Ok(());
    }
    Err(Error::BatchFailure {
        index: expected.min(got),
        reason: format!("expected {expected} predictions, got {got}"),
    })
}

/// Record one classifier call.
pub(crate) fn record_call(client: &'static str, started: Instant, outcome: &Result<impl Sized>) {
    let status = match outcome {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    counter!("classify_requests_total", "client" => client, "status" => status).increment(1);
    histogram!("classify_latency_ms", "client" => client)
        .record(started.elapsed().as_secs_f64() * 1_000.0);
}

/// Convenience for building label/score candidates.
pub fn candidate(label: &str, score: f64) -> Value {
    json!({ "label": label, "score": score })
}
