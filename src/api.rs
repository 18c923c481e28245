// src/api.rs
//! HTTP surface: `/predict`, `/analyze`, `/analyze_ticker`, `/health`, static UI.

use std::path::Path;
use std::sync::Arc;

use shuttle_axum::axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::{cors::CorsLayer, services::ServeDir};

use crate::classify::{build_client, DynSentimentClient, LexiconClassifier, RawPrediction};
use crate::config::{AppConfig, ClassifierKind};
use crate::error::Error;
use crate::news::{build_source, fetch_news, DynNewsSource};
use crate::normalize::{normalize, Normalized};
use crate::pipeline::AnalysisPipeline;

#[derive(Clone)]
pub struct AppState {
    /// `None` when the classifier failed to load; classify routes answer 503.
    pipeline: Option<AnalysisPipeline>,
    news: DynNewsSource,
}

impl AppState {
    pub fn new(
        classifier: Option<DynSentimentClient>,
        news: DynNewsSource,
        analysis_limit: usize,
    ) -> Self {
        Self {
            pipeline: classifier.map(|c| AnalysisPipeline::new(c).with_limit(analysis_limit)),
            news,
        }
    }

    /// Build classifier + news source from config. A classifier that fails to
    /// load is logged and left out; the news source must build.
    pub fn from_config(cfg: &AppConfig) -> crate::error::Result<Self> {
        let classifier = match cfg.classifier.kind {
            ClassifierKind::Local => match LexiconClassifier::from_config(&cfg.classifier) {
                Ok(c) => {
                    tracing::info!(target: "api", "in-process model loaded");
                    Some(Arc::new(c) as DynSentimentClient)
                }
                Err(e) => {
                    tracing::error!(target: "api", error = ?e, "error loading model");
                    None
                }
            },
            ClassifierKind::Remote => match build_client(&cfg.classifier) {
                Ok(c) => Some(c),
                Err(e) => {
                    tracing::error!(target: "api", error = %e, "error building inference client");
                    None
                }
            },
        };
        let news = build_source(&cfg.news)?;
        Ok(Self::new(classifier, news, cfg.news.analysis_limit))
    }

    fn pipeline(&self) -> Result<&AnalysisPipeline, ApiError> {
        self.pipeline.as_ref().ok_or(ApiError::ModelNotLoaded)
    }
}

/// Error body mirrors `{"detail": "..."}` so the bundled UI can show it.
#[derive(Debug)]
pub enum ApiError {
    ModelNotLoaded,
    Upstream(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::ModelNotLoaded => (StatusCode::SERVICE_UNAVAILABLE, "Model not loaded".to_string()),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Router without static files (tests, embedding).
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/predict", post(predict))
        .route("/analyze", post(analyze_text))
        .route("/analyze_ticker", post(analyze_ticker))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Full app router: API routes plus the static UI served at `/`.
pub fn create_router(state: AppState, static_dir: &Path) -> Router {
    let assets = ServeDir::new(static_dir).append_index_html_on_directories(true);
    router(state).fallback_service(assets)
}

#[derive(Deserialize)]
struct TextReq {
    text: String,
}

#[derive(Serialize)]
struct PredictResp {
    sentiment: RawPrediction,
}

async fn predict(
    State(state): State<AppState>,
    Json(body): Json<TextReq>,
) -> Result<Json<PredictResp>, ApiError> {
    let pipeline = state.pipeline()?;
    let sentiment = pipeline
        .client()
        .classify(&body.text)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(PredictResp { sentiment }))
}

async fn analyze_text(
    State(state): State<AppState>,
    Json(body): Json<TextReq>,
) -> Result<Json<Normalized>, ApiError> {
    let pipeline = state.pipeline()?;
    let out = match pipeline.client().classify(&body.text).await {
        Ok(raw) => normalize(&raw),
        Err(e) => Normalized::error(e.to_string()),
    };
    Ok(Json(out))
}

#[derive(Deserialize)]
struct TickerReq {
    symbol: String,
}

#[derive(Serialize)]
struct TickerItem {
    title: String,
    link: Option<String>,
    publisher: Option<String>,
    published: Option<i64>,
    sentiment: RawPrediction,
}

#[derive(Serialize)]
struct TickerResp {
    data: Vec<TickerItem>,
}

async fn analyze_ticker(
    State(state): State<AppState>,
    Json(body): Json<TickerReq>,
) -> Result<Json<TickerResp>, ApiError> {
    let pipeline = state.pipeline()?;
    // A blank symbol has no news.
    if body.symbol.trim().is_empty() {
        return Ok(Json(TickerResp { data: Vec::new() }));
    }

    let items = match fetch_news(state.news.as_ref(), &body.symbol).await {
        Ok(items) => items,
        Err(Error::NoNews(_)) => return Ok(Json(TickerResp { data: Vec::new() })),
        Err(e @ Error::SourceUnavailable(_)) => return Err(ApiError::Upstream(e.to_string())),
        Err(e) => return Err(ApiError::Internal(e.to_string())),
    };
    let selected: Vec<_> = items.into_iter().take(pipeline.limit()).collect();

    let data = pipeline
        .raw_predictions(&selected)
        .await
        .into_iter()
        .map(|(item, sentiment)| TickerItem {
            title: item.title.clone(),
            link: item.link.clone(),
            publisher: item.publisher.clone(),
            published: item.published_unix(),
            sentiment,
        })
        .collect();

    Ok(Json(TickerResp { data }))
}
