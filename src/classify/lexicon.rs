// src/classify/lexicon.rs
//! In-process classifier: lexicon scoring with short-range negation, mapped to
//! label probabilities in the same all-scores shape a hosted model returns.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::classify::{candidate, record_call, RawPrediction, SentimentClient};
use crate::config::ClassifierConfig;

const EMBEDDED_LEXICON: &str = include_str!("../../sentiment_lexicon.json");

/// Logit scale per lexicon point.
const SCALE: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct LexiconClassifier {
    lexicon: HashMap<String, i32>,
    neutral_bias: f64,
}

impl LexiconClassifier {
    pub fn with_lexicon(lexicon: HashMap<String, i32>, neutral_bias: f64) -> Self {
        let lexicon = lexicon
            .into_iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v))
            .filter(|(k, _)| !k.is_empty())
            .collect();
        Self {
            lexicon,
            neutral_bias,
        }
    }

    pub fn embedded(neutral_bias: f64) -> Result<Self> {
        let map: HashMap<String, i32> =
            serde_json::from_str(EMBEDDED_LEXICON).context("parsing embedded lexicon")?;
        Ok(Self::with_lexicon(map, neutral_bias))
    }

    pub fn from_path<P: AsRef<Path>>(path: P, neutral_bias: f64) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading lexicon from {}", path.display()))?;
        let map: HashMap<String, i32> = serde_json::from_str(&data)
            .with_context(|| format!("parsing lexicon {}", path.display()))?;
        Ok(Self::with_lexicon(map, neutral_bias))
    }

    /// Configured lexicon file, else the embedded one.
    pub fn from_config(cfg: &ClassifierConfig) -> Result<Self> {
        match &cfg.lexicon_path {
            Some(p) => Self::from_path(p, cfg.neutral_bias),
            None => Self::embedded(cfg.neutral_bias),
        }
    }

    #[inline]
    fn word_score(&self, w: &str) -> i32 {
        *self.lexicon.get(w).unwrap_or(&0)
    }

    /// Returns (score, token count).
    /// A negator in the preceding 1..=3 tokens flips the sign of a word's weight.
    /// Sums in `i64` with saturation, so any lexicon weights are safe.
    pub fn score_text(&self, text: &str) -> (i64, usize) {
        let tokens: Vec<String> = tokenize(text).collect();
        let mut score: i64 = 0;

        for i in 0..tokens.len() {
            let base = i64::from(self.word_score(tokens[i].as_str()));
            if base == 0 {
                continue;
            }
            let negated = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
            score = score.saturating_add(if negated { base.saturating_neg() } else { base });
        }

        (score, tokens.len())
    }

    /// Per-label candidates, sorted positive, negative, neutral.
    fn candidates(&self, text: &str) -> Vec<Value> {
        let (score, _) = self.score_text(text);
        let s = score as f64 * SCALE;
        let [pos, neg, neu] = softmax([s, -s, self.neutral_bias]);
        vec![
            candidate("positive", pos),
            candidate("negative", neg),
            candidate("neutral", neu),
        ]
    }

    /// Single-text output: `[[{label, score} x3]]`.
    pub fn predict(&self, text: &str) -> RawPrediction {
        RawPrediction::Batched(vec![Value::Array(self.candidates(text))])
    }
}

fn softmax(logits: [f64; 3]) -> [f64; 3] {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps = logits.map(|l| (l - max).exp());
    let sum: f64 = exps.iter().sum();
    exps.map(|e| e / sum)
}

/// Alphanumeric tokens (apostrophes kept), lower-case.
fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|t| t.trim_matches('\''))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not"
            | "no"
            | "never"
            | "isn't"
            | "wasn't"
            | "aren't"
            | "won't"
            | "can't"
            | "cannot"
            | "without"
            | "fails"
            | "failed"
    )
}

#[async_trait]
impl SentimentClient for LexiconClassifier {
    async fn classify(&self, text: &str) -> crate::error::Result<RawPrediction> {
        let started = Instant::now();
        let out = Ok(self.predict(text));
        record_call(self.name(), started, &out);
        out
    }

    /// One candidate list per text.
    async fn classify_batch(&self, texts: &[String]) -> crate::error::Result<Vec<RawPrediction>> {
        let started = Instant::now();
        let out = Ok(texts
            .iter()
            .map(|t| RawPrediction::Candidates(self.candidates(t)))
            .collect::<Vec<_>>());
        record_call(self.name(), started, &out);
        out
    }

    fn name(&self) -> &'static str {
        "lexicon"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;

    fn clf() -> LexiconClassifier {
        LexiconClassifier::embedded(1.0).unwrap()
    }

    #[test]
    fn negation_flips_sign() {
        let c = clf();
        let (pos, n) = c.score_text("Shares surge after record profit");
        assert!(pos > 0);
        assert_eq!(n, 5);
        let (neg, _) = c.score_text("Shares did not surge");
        assert!(neg < 0);
    }

    #[test]
    fn predictions_sum_to_one_and_normalize_to_expected_label() {
        let c = clf();
        let p = c.predict("Stock plunges as lawsuit and losses mount");
        let candidates = match &p {
            RawPrediction::Batched(outer) => outer[0].as_array().unwrap().clone(),
            other => panic!("unexpected shape {other:?}"),
        };
        let total: f64 = candidates.iter().map(|c| c["score"].as_f64().unwrap()).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(normalize(&p).label, "negative");

        assert_eq!(normalize(&c.predict("Company schedules annual meeting")).label, "neutral");
    }

    #[test]
    fn custom_lexicon_file_is_lowercased() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("lex.json");
        fs::write(&p, r#"{"MOON": 4, " ": 9}"#).unwrap();
        let c = LexiconClassifier::from_path(&p, 0.0).unwrap();
        assert_eq!(c.score_text("to the moon").0, 4);
        assert!(LexiconClassifier::from_path(dir.path().join("missing.json"), 0.0).is_err());
    }

    #[tokio::test]
    async fn extreme_weights_do_not_overflow() {
        let lexicon = HashMap::from([
            ("moon".to_string(), 2_000_000_000),
            ("abyss".to_string(), i32::MIN),
        ]);
        let c = LexiconClassifier::with_lexicon(lexicon, 1.0);

        let (score, _) = c.score_text("moon moon");
        assert_eq!(score, 4_000_000_000);
        let raw = c.classify("moon moon").await.unwrap();
        assert_eq!(normalize(&raw).label, "positive");

        let (score, _) = c.score_text("not abyss");
        assert_eq!(score, -i64::from(i32::MIN));
        let raw = c.classify("abyss abyss abyss").await.unwrap();
        let n = normalize(&raw);
        assert_eq!(n.label, "negative");
        assert!(n.score.is_finite());
    }

    #[tokio::test]
    async fn batch_returns_one_candidate_list_per_text() {
        let c = clf();
        let texts = vec!["rally".to_string(), "crash".to_string(), "x".to_string()];
        let out = c.classify_batch(&texts).await.unwrap();
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|p| matches!(p, RawPrediction::Candidates(_))));
        assert_eq!(normalize(&out[0]).label, "positive");
        assert_eq!(normalize(&out[1]).label, "negative");
    }
}
