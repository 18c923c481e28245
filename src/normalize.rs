// src/normalize.rs
//! Reduce any classifier payload to one winning `{label, score}`.
//!
//! Precedence (first match wins):
//! 1. error payload            -> "Error" with the upstream message
//! 2. `[[candidates], ..]`     -> best candidate of the first list
//! 3. `[candidates]`           -> best candidate of the list
//! 4. `{label, score}`         -> taken as is (`"Unknown"` / `0` defaults)
//! 5. anything else            -> "Unknown"
//!
//! Malformed candidates degrade to "Parse Error"; `normalize` never fails.

use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::classify::RawPrediction;
use crate::error::Error;

pub const LABEL_ERROR: &str = "Error";
pub const LABEL_PARSE_ERROR: &str = "Parse Error";
pub const LABEL_UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalized {
    pub label: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl Normalized {
    pub fn error(details: impl Into<String>) -> Self {
        Self {
            label: LABEL_ERROR.to_string(),
            score: 0.0,
            details: Some(details.into()),
        }
    }

    pub fn parse_error(details: impl Into<String>) -> Self {
        Self {
            label: LABEL_PARSE_ERROR.to_string(),
            score: 0.0,
            details: Some(details.into()),
        }
    }

    pub fn unknown() -> Self {
        Self {
            label: LABEL_UNKNOWN.to_string(),
            score: 0.0,
            details: None,
        }
    }

    /// True for "Error" and "Parse Error".
    pub fn is_failure(&self) -> bool {
        self.details.is_some()
    }
}

pub fn normalize(raw: &RawPrediction) -> Normalized {
    let (out, outcome) = match raw {
        RawPrediction::Failed(_) => (
            Normalized::error(raw.error_message().unwrap_or_default()),
            "error",
        ),
        other => match select(other) {
            Ok(Some(n)) => (n, "label"),
            Ok(None) => {
                tracing::debug!(target: "classify", "unrecognized prediction shape");
                (Normalized::unknown(), "unknown_shape")
            }
            Err(e) => {
                tracing::debug!(target: "classify", error = %e, "prediction parse failure");
                (Normalized::parse_error(parse_details(e)), "parse_error")
            }
        },
    };
    counter!("normalize_outcomes_total", "outcome" => outcome).increment(1);
    out
}

/// `Ok(None)` marks an unrecognized shape.
fn select(raw: &RawPrediction) -> Result<Option<Normalized>, Error> {
    match raw {
        RawPrediction::Batched(outer) => match outer.first() {
            Some(Value::Array(first)) => best_candidate(first).map(Some),
            _ => Ok(None),
        },
        RawPrediction::Candidates(items) => best_candidate(items).map(Some),
        RawPrediction::Single(m) => from_mapping(m).map(Some),
        RawPrediction::Failed(_) | RawPrediction::Unrecognized(_) => Ok(None),
    }
}

/// Highest `score` wins; on ties the first candidate is kept.
fn best_candidate(items: &[Value]) -> Result<Normalized, Error> {
    let mut best: Option<(&Map<String, Value>, f64)> = None;
    for (i, item) in items.iter().enumerate() {
        let m = item
            .as_object()
            .ok_or_else(|| Error::ParseFailure(format!("candidate {i} is not a mapping")))?;
        let score = match m.get("score") {
            Some(v) => v
                .as_f64()
                .ok_or_else(|| Error::ParseFailure(format!("candidate {i} has non-numeric 'score'")))?,
            None => return Err(Error::ParseFailure(format!("candidate {i} has no 'score'"))),
        };
        if best.map_or(true, |(_, b)| score > b) {
            best = Some((m, score));
        }
    }
    let (m, score) = best.ok_or_else(|| Error::ParseFailure("empty candidate list".into()))?;
    Ok(Normalized {
        label: label_of(m)?,
        score,
        details: None,
    })
}

fn from_mapping(m: &Map<String, Value>) -> Result<Normalized, Error> {
    let score = match m.get("score") {
        None | Some(Value::Null) => 0.0,
        Some(v) => v
            .as_f64()
            .ok_or_else(|| Error::ParseFailure("non-numeric 'score'".into()))?,
    };
    Ok(Normalized {
        label: label_of(m)?,
        score,
        details: None,
    })
}

fn label_of(m: &Map<String, Value>) -> Result<String, Error> {
    match m.get("label") {
        None | Some(Value::Null) => Ok(LABEL_UNKNOWN.to_string()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(Error::ParseFailure(format!("non-string 'label': {other}"))),
    }
}

fn parse_details(e: Error) -> String {
    match e {
        Error::ParseFailure(msg) => msg,
        other => other.to_string(),
    }
}
