//! Crate-wide error type.
//!
//! Fetch errors abort a run; classification errors are folded into the
//! affected item's result by the pipeline and only escape through the
//! single-text surfaces (`/predict`, dashboard text mode).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// News fetch failed.
    #[error("news source unavailable: {0}")]
    SourceUnavailable(String),

    /// News fetch succeeded with zero records. Same kind tag as `SourceUnavailable`.
    #[error("no news found for {0}")]
    NoNews(String),

    /// Credential rejected (or missing) by the inference endpoint.
    #[error(
        "{}. Check that HF_TOKEN is valid and has access to this endpoint. Token loaded: {}",
        status_line(.status),
        yes_no(.credential_present)
    )]
    Unauthorized { status: u16, credential_present: bool },

    /// Network, timeout, or non-2xx from the classifier.
    #[error("classification failed: {0}")]
    ClassificationFailure(String),

    /// A batched call could not produce one prediction per input.
    #[error("batch classification failed at item {index}: {reason}")]
    BatchFailure { index: usize, reason: String },

    /// Classifier response could not be interpreted.
    #[error("parse failure: {0}")]
    ParseFailure(String),

    #[error("configuration error: {0}")]
    Config(String),
}

fn status_line(status: &u16) -> String {
    let reason = reqwest::StatusCode::from_u16(*status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unauthorized");
    format!("{status} {reason}")
}

fn yes_no(present: &bool) -> &'static str {
    if *present {
        "Yes"
    } else {
        "No"
    }
}

impl Error {
    /// Short stable tag used for metric labels and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::SourceUnavailable(_) | Error::NoNews(_) => "source_unavailable",
            Error::Unauthorized { .. } => "unauthorized",
            Error::ClassificationFailure(_) => "classification_failure",
            Error::BatchFailure { .. } => "batch_failure",
            Error::ParseFailure(_) => "parse_failure",
            Error::Config(_) => "config",
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::ClassificationFailure(format!("request timed out: {e}"))
        } else {
            Error::ClassificationFailure(e.to_string())
        }
    }
}
