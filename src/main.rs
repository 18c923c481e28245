//! Ticker sentiment service: binary entrypoint.
//! Boots the Axum HTTP server with the classifier, news source, metrics, and static UI.

use anyhow::Context;
use shuttle_axum::ShuttleAxum;
use ticker_sentiment::api::{create_router, AppState};
use ticker_sentiment::config::AppConfig;
use ticker_sentiment::telemetry::{init_tracing, Metrics};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    init_tracing();
    let metrics = Metrics::init()?;

    let cfg = AppConfig::load_default().context("loading configuration")?;
    if let Some(warning) = cfg.credential_warning() {
        tracing::warn!(target: "api", "{warning}");
    }

    let state = AppState::from_config(&cfg).context("building app state")?;

    let router = create_router(state, &cfg.server.static_dir).merge(metrics.router());
    tracing::info!(
        target: "api",
        classifier = ?cfg.classifier.kind,
        news = ?cfg.news.provider,
        limit = cfg.news.analysis_limit,
        "router ready"
    );

    Ok(router.into())
}
