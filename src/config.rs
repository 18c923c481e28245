// src/config.rs
//! Application configuration: `config/app.toml` (optional) + env overrides.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/app.toml";
pub const ENV_CONFIG_PATH: &str = "TICKER_SENTIMENT_CONFIG";

pub const ENV_HF_TOKEN: &str = "HF_TOKEN";
pub const ENV_ENDPOINT_URL: &str = "HF_ENDPOINT_URL";
pub const ENV_NEWS_LIMIT: &str = "NEWS_LIMIT";
pub const ENV_STATIC_DIR: &str = "STATIC_DIR";
pub const ENV_CLASSIFIER: &str = "CLASSIFIER";

pub const DEFAULT_ENDPOINT_URL: &str =
    "https://z64b4h1haoq2ctat.eu-west-1.aws.endpoints.huggingface.cloud";
pub const DEFAULT_ANALYSIS_LIMIT: usize = 5;

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 4;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub classifier: ClassifierConfig,
    pub news: NewsConfig,
    pub server: ServerConfig,
}

/// Which classifier backs the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierKind {
    /// Hosted inference endpoint (`endpoint_url` + `HF_TOKEN`).
    Remote,
    /// In-process lexicon model.
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub kind: ClassifierKind,
    pub endpoint_url: String,
    /// Never read from the file; only from `HF_TOKEN`.
    #[serde(skip)]
    pub hf_token: Option<String>,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// JSON map `word -> weight` for the in-process classifier. Embedded lexicon when absent.
    pub lexicon_path: Option<PathBuf>,
    /// Logit of the neutral label in the in-process classifier.
    pub neutral_bias: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            kind: ClassifierKind::Local,
            endpoint_url: DEFAULT_ENDPOINT_URL.to_string(),
            hf_token: None,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            lexicon_path: None,
            neutral_bias: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NewsProvider {
    Yahoo,
    YahooRss,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    pub provider: NewsProvider,
    pub search_url: String,
    pub rss_url: String,
    /// How many records to ask the upstream for.
    pub fetch_count: u32,
    /// How many fetched items go to analysis.
    pub analysis_limit: usize,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            provider: NewsProvider::Yahoo,
            search_url: "https://query2.finance.yahoo.com/v1/finance/search".to_string(),
            rss_url: "https://feeds.finance.yahoo.com/rss/2.0/headline".to_string(),
            fetch_count: 10,
            analysis_limit: DEFAULT_ANALYSIS_LIMIT,
            user_agent: "Mozilla/5.0 (compatible; ticker-sentiment/0.1)".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            static_dir: PathBuf::from("static"),
        }
    }
}

impl AppConfig {
    /// Load from an explicit TOML file, then apply env overrides.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let cfg: AppConfig = toml::from_str(&data)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(cfg.with_env_overrides().sanitized())
    }

    /// Resolution order:
    /// 1) $TICKER_SENTIMENT_CONFIG (must exist)
    /// 2) config/app.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from_file(&pb);
        }
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from_file(&default_p);
        }
        Ok(Self::default().with_env_overrides().sanitized())
    }

    fn with_env_overrides(mut self) -> Self {
        self.classifier.hf_token = std::env::var(ENV_HF_TOKEN)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        if let Ok(url) = std::env::var(ENV_ENDPOINT_URL) {
            if !url.trim().is_empty() {
                self.classifier.endpoint_url = url.trim().to_string();
            }
        }
        if let Some(n) = std::env::var(ENV_NEWS_LIMIT)
            .ok()
            .and_then(|s| s.trim().parse::<usize>().ok())
        {
            self.news.analysis_limit = n;
        }
        match std::env::var(ENV_CLASSIFIER).ok().as_deref().map(str::trim) {
            Some(k) if k.eq_ignore_ascii_case("remote") => self.classifier.kind = ClassifierKind::Remote,
            Some(k) if k.eq_ignore_ascii_case("local") => self.classifier.kind = ClassifierKind::Local,
            _ => {}
        }
        if let Ok(dir) = std::env::var(ENV_STATIC_DIR) {
            if !dir.trim().is_empty() {
                self.server.static_dir = PathBuf::from(dir.trim());
            }
        }
        self
    }

    fn sanitized(mut self) -> Self {
        if self.news.analysis_limit == 0 {
            self.news.analysis_limit = DEFAULT_ANALYSIS_LIMIT;
        }
        if self.news.fetch_count == 0 {
            self.news.fetch_count = NewsConfig::default().fetch_count;
        }
        if self.classifier.connect_timeout_secs == 0 {
            self.classifier.connect_timeout_secs = DEFAULT_CONNECT_TIMEOUT_SECS;
        }
        if self.classifier.request_timeout_secs == 0 {
            self.classifier.request_timeout_secs = DEFAULT_REQUEST_TIMEOUT_SECS;
        }
        if !self.classifier.neutral_bias.is_finite() {
            self.classifier.neutral_bias = ClassifierConfig::default().neutral_bias;
        }
        self
    }

    pub fn has_credential(&self) -> bool {
        self.classifier.hf_token.is_some()
    }

    /// Startup warning when the remote classifier has no credential.
    /// The in-process classifier needs none.
    pub fn credential_warning(&self) -> Option<&'static str> {
        if self.classifier.kind == ClassifierKind::Remote && !self.has_credential() {
            Some("HF_TOKEN is missing in .env file!")
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn clear_env() {
        for k in [
            ENV_CONFIG_PATH,
            ENV_HF_TOKEN,
            ENV_ENDPOINT_URL,
            ENV_NEWS_LIMIT,
            ENV_STATIC_DIR,
            ENV_CLASSIFIER,
        ] {
            env::remove_var(k);
        }
    }

    #[serial_test::serial]
    #[test]
    fn partial_toml_keeps_defaults() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("app.toml");
        fs::write(
            &p,
            r#"
[news]
provider = "yahoo-rss"
analysis_limit = 3

[classifier]
kind = "remote"
request_timeout_secs = 0
"#,
        )
        .unwrap();

        let cfg = AppConfig::load_from_file(&p).unwrap();
        assert_eq!(cfg.news.provider, NewsProvider::YahooRss);
        assert_eq!(cfg.news.analysis_limit, 3);
        assert_eq!(cfg.news.fetch_count, 10);
        assert_eq!(cfg.classifier.kind, ClassifierKind::Remote);
        assert_eq!(cfg.classifier.endpoint_url, DEFAULT_ENDPOINT_URL);
        // zero timeout is sanitized back to the default
        assert_eq!(cfg.classifier.request_timeout_secs, 30);
        assert!(cfg.classifier.hf_token.is_none());
    }

    #[serial_test::serial]
    #[test]
    fn env_overrides_and_missing_token_warning() {
        clear_env();
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();

        let cfg = AppConfig::load_default().unwrap();
        assert!(!cfg.has_credential());
        assert_eq!(cfg.classifier.kind, ClassifierKind::Local);
        assert!(cfg.credential_warning().is_none(), "local classifier needs no token");

        env::set_var(ENV_CLASSIFIER, "Remote");
        let cfg = AppConfig::load_default().unwrap();
        assert_eq!(
            cfg.credential_warning(),
            Some("HF_TOKEN is missing in .env file!")
        );

        env::set_var(ENV_HF_TOKEN, "  hf_abc  ");
        env::set_var(ENV_NEWS_LIMIT, "7");
        env::set_var(ENV_ENDPOINT_URL, "http://127.0.0.1:9/x");
        let cfg = AppConfig::load_default().unwrap();
        assert_eq!(cfg.classifier.kind, ClassifierKind::Remote);
        assert_eq!(cfg.classifier.hf_token.as_deref(), Some("hf_abc"));
        assert_eq!(cfg.news.analysis_limit, 7);
        assert_eq!(cfg.classifier.endpoint_url, "http://127.0.0.1:9/x");
        assert!(cfg.credential_warning().is_none());

        env::set_var(ENV_CONFIG_PATH, tmp.path().join("nope.toml"));
        assert!(AppConfig::load_default().is_err());

        clear_env();
        env::set_current_dir(&old).unwrap();
    }
}
