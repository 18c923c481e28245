// src/lib.rs
// Public library surface for the server, the dashboard binary and integration tests.

pub mod api;
pub mod classify;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod news;
pub mod normalize;
pub mod pipeline;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::error::{Error, Result};
pub use crate::normalize::normalize;
pub use crate::pipeline::{AnalysisPipeline, AnalyzedResult};
