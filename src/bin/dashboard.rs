//! Interactive terminal dashboard: stock-news and custom-text modes over the shared pipeline.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};

use ticker_sentiment::classify::{build_client, DynSentimentClient};
use ticker_sentiment::config::{AppConfig, ClassifierKind};
use ticker_sentiment::dashboard::{
    progress_line, render_prediction, render_results, Session, PRESET_TICKERS,
};
use ticker_sentiment::error::Error;
use ticker_sentiment::news::{build_source, DynNewsSource};
use ticker_sentiment::pipeline::{AnalysisPipeline, Progress};
use ticker_sentiment::telemetry::{ensure_metrics_described, init_tracing};

#[derive(Parser, Debug)]
#[command(name = "dashboard", version, about = "Financial sentiment analysis dashboard")]
struct Cli {
    /// Overrides `classifier.kind` from config.
    #[arg(long, value_enum, global = true)]
    classifier: Option<ClassifierArg>,
    /// Classify all headlines in one batch call (falls back per item on failure).
    #[arg(long, global = true, default_value_t = false)]
    batch: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch and analyze the latest news for a ticker.
    News { ticker: String },
    /// Classify free text and print the raw prediction.
    Text { text: Vec<String> },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ClassifierArg {
    Remote,
    Local,
}

impl From<ClassifierArg> for ClassifierKind {
    fn from(a: ClassifierArg) -> Self {
        match a {
            ClassifierArg::Remote => ClassifierKind::Remote,
            ClassifierArg::Local => ClassifierKind::Local,
        }
    }
}

struct Dashboard {
    pipeline: AnalysisPipeline,
    news: DynNewsSource,
    batch: bool,
    session: Session,
}

impl Dashboard {
    async fn run_ticker(&mut self, ticker: &str) {
        let ticker = ticker.trim().to_ascii_uppercase();
        self.session.clear();
        eprintln!("🚀 Starting analysis for {ticker}...");

        let mut log = |ev: &Progress| eprintln!("{}", progress_line(ev));
        let outcome = if self.batch {
            self.run_batched(&ticker, &mut log).await
        } else {
            self.pipeline
                .run_ticker(self.news.as_ref(), &ticker, Some(&mut log))
                .await
        };

        match outcome {
            Ok(results) => {
                println!("{}", render_results(&ticker, &results));
                self.session.store(&ticker, results);
            }
            Err(Error::NoNews(_)) => println!("⚠️ No news found."),
            Err(e) => println!("❌ Error fetching data: {e}"),
        }
    }

    async fn run_batched(
        &self,
        ticker: &str,
        log: &mut (dyn FnMut(&Progress) + Send),
    ) -> ticker_sentiment::error::Result<Vec<ticker_sentiment::pipeline::AnalyzedResult>> {
        log(&Progress::Fetching {
            ticker: ticker.to_string(),
        });
        let items = ticker_sentiment::news::fetch_news(self.news.as_ref(), ticker).await?;
        let found = items.len();
        let selected: Vec<_> = items.into_iter().take(self.pipeline.limit()).collect();
        log(&Progress::Fetched {
            found,
            selected: selected.len(),
        });
        Ok(self.pipeline.analyze_batched(&selected, Some(log)).await)
    }

    async fn run_text(&self, text: &str) {
        if text.trim().is_empty() {
            println!("Please enter some text to analyze.");
            return;
        }
        eprintln!("📡 Connecting to {} classifier...", self.pipeline.client().name());
        match self.pipeline.client().classify(text).await {
            Ok(raw) if raw.is_error() => println!("{}", render_prediction(&raw)),
            Ok(raw) => {
                println!("Analysis Complete!");
                println!("{}", render_prediction(&raw));
            }
            Err(e) => println!("Error: {e}"),
        }
    }

    async fn interactive(&mut self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let choice = prompt(&mut lines, "\nSelect mode: [1] Stock News  [2] Custom Text  [q] Quit\n> ").await?;
            match choice.as_deref().map(str::trim) {
                None | Some("q") | Some("Q") => return Ok(()),
                Some("1") => self.interactive_ticker(&mut lines).await?,
                Some("2") => {
                    if let Some(text) = prompt(&mut lines, "Input text:\n> ").await? {
                        self.run_text(&text).await;
                    }
                }
                Some(other) => println!("unknown option '{other}'"),
            }
        }
    }

    async fn interactive_ticker(&mut self, lines: &mut Lines<BufReader<Stdin>>) -> Result<()> {
        for (i, t) in PRESET_TICKERS.iter().enumerate() {
            println!("  [{:>2}] {t}", i + 1);
        }
        let Some(input) = prompt(lines, "Select ticker (number or symbol):\n> ").await? else {
            return Ok(());
        };
        let input = input.trim();
        let ticker = match input.parse::<usize>() {
            Ok(n) if (1..=PRESET_TICKERS.len()).contains(&n) => PRESET_TICKERS[n - 1].to_string(),
            _ => input.to_ascii_uppercase(),
        };
        if ticker.is_empty() {
            return Ok(());
        }

        if let Some(previous) = self.session.results_for(&ticker) {
            println!("{}", render_results(&ticker, previous));
            let again = prompt(lines, &format!("Get News & Analyze for {ticker} again? [y/N]\n> ")).await?;
            if !again.is_some_and(|a| a.trim().eq_ignore_ascii_case("y")) {
                return Ok(());
            }
        }
        self.run_ticker(&ticker).await;
        Ok(())
    }
}

async fn prompt(lines: &mut Lines<BufReader<Stdin>>, msg: &str) -> Result<Option<String>> {
    let mut out = tokio::io::stdout();
    out.write_all(msg.as_bytes()).await?;
    out.flush().await?;
    Ok(lines.next_line().await?)
}

fn build_client_for(cfg: &AppConfig) -> Result<DynSentimentClient> {
    build_client(&cfg.classifier).context("building classifier")
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();
    ensure_metrics_described();

    let cli = Cli::parse();
    let mut cfg = AppConfig::load_default()?;
    if let Some(kind) = cli.classifier {
        cfg.classifier.kind = kind.into();
    }

    println!("Financial Sentiment Analysis");
    if cfg.classifier.kind == ClassifierKind::Remote {
        match cfg.credential_warning() {
            Some(w) => println!("⚠️ {w}"),
            None => println!("✅ HF_TOKEN loaded."),
        }
    }

    let client = build_client_for(&cfg)?;
    let mut dash = Dashboard {
        pipeline: AnalysisPipeline::new(client).with_limit(cfg.news.analysis_limit),
        news: build_source(&cfg.news).context("building news source")?,
        batch: cli.batch,
        session: Session::default(),
    };

    match cli.command {
        Some(Command::News { ticker }) => dash.run_ticker(&ticker).await,
        Some(Command::Text { text }) => dash.run_text(&text.join(" ")).await,
        None => dash.interactive().await?,
    }
    Ok(())
}
