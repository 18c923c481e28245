// src/pipeline.rs
//! Fetch -> classify -> normalize, one item at a time, in submission order.
//!
//! Per-item classification failures become that item's `"Error"` record; only
//! a failed news fetch aborts a run.

use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::classify::{DynSentimentClient, RawPrediction};
use crate::config::DEFAULT_ANALYSIS_LIMIT;
use crate::error::Result;
use crate::news::{fetch_news, NewsItem, NewsSource};
use crate::normalize::{normalize, Normalized};
use crate::telemetry::text_id;

const TITLE_PREFIX_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedResult {
    pub title: String,
    pub link: Option<String>,
    pub publisher: Option<String>,
    /// Unix seconds.
    pub published: Option<i64>,
    pub sentiment: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AnalyzedResult {
    fn new(item: &NewsItem, n: Normalized) -> Self {
        Self {
            title: item.title.clone(),
            link: item.link.clone(),
            publisher: item.publisher.clone(),
            published: item.published_unix(),
            sentiment: n.label,
            score: n.score,
            details: n.details,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.details.is_some()
    }
}

/// Lifecycle of one run: Idle -> Fetching -> Classifying(i/total)* -> Done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Fetching,
    Classifying { index: usize, total: usize },
    Done,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    Fetching { ticker: String },
    Fetched { found: usize, selected: usize },
    /// `index` is 1-based over the submitted items (skipped items still count).
    Classifying { index: usize, total: usize, title: String },
    ClassifyingBatch { count: usize },
    Done { analyzed: usize },
}

impl Progress {
    pub fn state(&self) -> RunState {
        match self {
            Progress::Fetching { .. } | Progress::Fetched { .. } => RunState::Fetching,
            Progress::Classifying { index, total, .. } => RunState::Classifying {
                index: *index,
                total: *total,
            },
            Progress::ClassifyingBatch { count } => RunState::Classifying {
                index: *count,
                total: *count,
            },
            Progress::Done { .. } => RunState::Done,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Progress::Fetching { ticker } => format!("fetching latest news for {ticker}..."),
            Progress::Fetched { found, selected } => {
                format!("found {found} news items, selecting latest {selected} for analysis")
            }
            Progress::Classifying { index, total, title } => {
                format!("analyzing {index}/{total}: {title}")
            }
            Progress::ClassifyingBatch { count } => format!("analyzing {count} items in one batch"),
            Progress::Done { analyzed } => format!("analysis complete: {analyzed} results"),
        }
    }
}

/// Synchronous progress sink; runs on the pipeline task.
pub type ProgressFn<'a> = &'a mut (dyn FnMut(&Progress) + Send);

fn emit(progress: &mut Option<ProgressFn<'_>>, ev: Progress) {
    if let Some(f) = progress {
        f(&ev);
    }
}

pub fn title_prefix(title: &str) -> String {
    let mut chars = title.chars();
    let head: String = chars.by_ref().take(TITLE_PREFIX_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Stateless per call; cheap to clone into handlers.
#[derive(Clone)]
pub struct AnalysisPipeline {
    client: DynSentimentClient,
    limit: usize,
}

impl AnalysisPipeline {
    pub fn new(client: DynSentimentClient) -> Self {
        Self {
            client,
            limit: DEFAULT_ANALYSIS_LIMIT,
        }
    }

    /// How many fetched items `run_ticker` sends to analysis.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn client(&self) -> &DynSentimentClient {
        &self.client
    }

    /// Fetch news for `ticker`, keep the first `limit` items, analyze them.
    #[tracing::instrument(
        name = "run_ticker",
        skip_all,
        fields(ticker = %ticker.trim(), source = source.name(), limit = self.limit)
    )]
    pub async fn run_ticker(
        &self,
        source: &dyn NewsSource,
        ticker: &str,
        mut progress: Option<ProgressFn<'_>>,
    ) -> Result<Vec<AnalyzedResult>> {
        emit(
            &mut progress,
            Progress::Fetching {
                ticker: ticker.trim().to_ascii_uppercase(),
            },
        );
        let items = match fetch_news(source, ticker).await {
            Ok(items) => items,
            Err(e) => {
                emit(&mut progress, Progress::Done { analyzed: 0 });
                return Err(e);
            }
        };

        let found = items.len();
        let selected: Vec<NewsItem> = items.into_iter().take(self.limit).collect();
        emit(
            &mut progress,
            Progress::Fetched {
                found,
                selected: selected.len(),
            },
        );

        Ok(self.analyze(&selected, progress).await)
    }

    /// One classify call per titled item; output order follows `items`.
    pub async fn analyze(
        &self,
        items: &[NewsItem],
        mut progress: Option<ProgressFn<'_>>,
    ) -> Vec<AnalyzedResult> {
        let total = items.len();
        let mut out = Vec::with_capacity(total);

        for (i, item) in items.iter().enumerate() {
            if item.title.trim().is_empty() {
                continue;
            }
            emit(
                &mut progress,
                Progress::Classifying {
                    index: i + 1,
                    total,
                    title: title_prefix(&item.title),
                },
            );

            let normalized = match self.client.classify(&item.title).await {
                Ok(raw) => normalize(&raw),
                Err(e) => {
                    tracing::warn!(
                        target: "pipeline",
                        id = %text_id(&item.title),
                        kind = e.kind(),
                        error = %e,
                        "classification failed; recording error result"
                    );
                    Normalized::error(e.to_string())
                }
            };
            out.push(self.record(item, normalized));
        }

        emit(&mut progress, Progress::Done { analyzed: out.len() });
        out
    }

    /// Single `classify_batch` call over all titled items. Any batch error
    /// falls back to `analyze`, so the output invariants are the same.
    pub async fn analyze_batched(
        &self,
        items: &[NewsItem],
        mut progress: Option<ProgressFn<'_>>,
    ) -> Vec<AnalyzedResult> {
        let titled: Vec<&NewsItem> = items.iter().filter(|i| !i.title.trim().is_empty()).collect();
        if titled.is_empty() {
            emit(&mut progress, Progress::Done { analyzed: 0 });
            return Vec::new();
        }

        emit(
            &mut progress,
            Progress::ClassifyingBatch {
                count: titled.len(),
            },
        );
        let texts: Vec<String> = titled.iter().map(|i| i.title.clone()).collect();
        match self.client.classify_batch(&texts).await {
            Ok(preds) if preds.len() == titled.len() => {
                let out: Vec<AnalyzedResult> = titled
                    .iter()
                    .zip(preds.iter())
                    .map(|(item, raw)| self.record(item, normalize(raw)))
                    .collect();
                emit(&mut progress, Progress::Done { analyzed: out.len() });
                out
            }
            Ok(preds) => {
                tracing::warn!(
                    target: "pipeline",
                    expected = titled.len(),
                    got = preds.len(),
                    "batch length mismatch; falling back to per-item classification"
                );
                self.analyze(items, progress).await
            }
            Err(e) => {
                tracing::warn!(
                    target: "pipeline",
                    error = %e,
                    "batch classification failed; falling back to per-item classification"
                );
                self.analyze(items, progress).await
            }
        }
    }

    /// Raw predictions for the titled items, in order. A failing item gets
    /// an `{"error": ...}` payload instead of aborting the others.
    pub async fn raw_predictions<'a>(
        &self,
        items: &'a [NewsItem],
    ) -> Vec<(&'a NewsItem, RawPrediction)> {
        let titled: Vec<&NewsItem> = items.iter().filter(|i| !i.title.trim().is_empty()).collect();
        if titled.is_empty() {
            return Vec::new();
        }

        let texts: Vec<String> = titled.iter().map(|i| i.title.clone()).collect();
        match self.client.classify_batch(&texts).await {
            Ok(preds) if preds.len() == titled.len() => titled.into_iter().zip(preds).collect(),
            outcome => {
                if let Err(e) = &outcome {
                    tracing::warn!(target: "pipeline", error = %e, "batch failed; classifying items one by one");
                }
                let mut out = Vec::with_capacity(titled.len());
                for item in titled {
                    let raw = match self.client.classify(&item.title).await {
                        Ok(raw) => raw,
                        Err(e) => RawPrediction::error(e.to_string()),
                    };
                    out.push((item, raw));
                }
                out
            }
        }
    }

    fn record(&self, item: &NewsItem, normalized: Normalized) -> AnalyzedResult {
        let outcome = if normalized.is_failure() { "failed" } else { "labeled" };
        counter!("pipeline_items_total", "outcome" => outcome).increment(1);
        tracing::debug!(
            target: "pipeline",
            id = %text_id(&item.title),
            label = %normalized.label,
            score = normalized.score,
            "item analyzed"
        );
        AnalyzedResult::new(item, normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_prefix_truncates_long_titles() {
        assert_eq!(title_prefix("short"), "short");
        let long = "x".repeat(60);
        let p = title_prefix(&long);
        assert_eq!(p, format!("{}...", "x".repeat(50)));
        assert_eq!(title_prefix(&"y".repeat(50)), "y".repeat(50));
    }

    #[test]
    fn progress_messages_and_states() {
        let ev = Progress::Classifying {
            index: 2,
            total: 5,
            title: "Apple".into(),
        };
        assert_eq!(ev.message(), "analyzing 2/5: Apple");
        assert_eq!(ev.state(), RunState::Classifying { index: 2, total: 5 });
        assert_eq!(Progress::Done { analyzed: 3 }.state(), RunState::Done);
        assert_eq!(
            Progress::Fetching {
                ticker: "AAPL".into()
            }
            .state(),
            RunState::Fetching
        );
    }
}
