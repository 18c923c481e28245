// src/dashboard.rs
//! Terminal dashboard: rendering helpers and per-session state.
//! The `dashboard` binary owns the I/O; everything here is pure.

use chrono::{TimeZone, Utc};

use crate::classify::RawPrediction;
use crate::pipeline::{AnalyzedResult, Progress};

pub const PRESET_TICKERS: [&str; 11] = [
    "AAPL", "MSFT", "GOOGL", "AMZN", "TSLA", "NVDA", "META", "JPM", "BAC", "BTC-USD", "ETH-USD",
];

/// Color dot by label family.
pub fn sentiment_icon(label: &str) -> &'static str {
    let l = label.to_lowercase();
    if l.contains("bullish") || l.contains("positive") {
        "🟢"
    } else if l.contains("bearish") || l.contains("negative") {
        "🔴"
    } else if l.contains("neutral") {
        "🟡"
    } else {
        "⚪"
    }
}

pub fn render_result(r: &AnalyzedResult) -> String {
    let mut out = format!(
        "{} {} ({:.2}): {}\n",
        sentiment_icon(&r.sentiment),
        r.sentiment,
        r.score,
        r.title
    );
    out.push_str(&format!(
        "    Publisher: {}\n",
        r.publisher.as_deref().unwrap_or("Unknown")
    ));
    if let Some(ts) = r.published.and_then(|s| Utc.timestamp_opt(s, 0).single()) {
        out.push_str(&format!("    Published: {}\n", ts.format("%Y-%m-%d %H:%M UTC")));
    }
    if let Some(link) = &r.link {
        out.push_str(&format!("    Link: {link}\n"));
    }
    if let Some(details) = &r.details {
        out.push_str(&format!("    Error details: {details}\n"));
    }
    out
}

pub fn render_results(ticker: &str, results: &[AnalyzedResult]) -> String {
    let mut out = format!("Latest Analysis for {ticker}\n");
    if results.is_empty() {
        out.push_str("No results to display.\n");
        return out;
    }
    for r in results {
        out.push('\n');
        out.push_str(&render_result(r));
    }
    out
}

/// Pretty JSON of a raw prediction, or the error text for error payloads.
pub fn render_prediction(raw: &RawPrediction) -> String {
    if let Some(msg) = raw.error_message() {
        return format!("Error: {msg}");
    }
    serde_json::to_string_pretty(raw).unwrap_or_else(|_| raw.to_json().to_string())
}

/// One terminal log line per progress event.
pub fn progress_line(ev: &Progress) -> String {
    let icon = match ev {
        Progress::Fetching { .. } => "⏳",
        Progress::Fetched { .. } => "✅",
        Progress::Classifying { .. } | Progress::ClassifyingBatch { .. } => "🔍",
        Progress::Done { .. } => "🏁",
    };
    format!("{icon} {}", ev.message())
}

/// Last run per session; shown again when the same ticker is re-selected.
#[derive(Debug, Default)]
pub struct Session {
    last: Option<(String, Vec<AnalyzedResult>)>,
}

impl Session {
    pub fn store(&mut self, ticker: &str, results: Vec<AnalyzedResult>) {
        self.last = Some((ticker.to_ascii_uppercase(), results));
    }

    pub fn clear(&mut self) {
        self.last = None;
    }

    /// Results of the last run if it was for `ticker`.
    pub fn results_for(&self, ticker: &str) -> Option<&[AnalyzedResult]> {
        match &self.last {
            Some((t, r)) if t.eq_ignore_ascii_case(ticker) => Some(r.as_slice()),
            _ => None,
        }
    }

    pub fn current_ticker(&self) -> Option<&str> {
        self.last.as_ref().map(|(t, _)| t.as_str())
    }
}
