//! mediarisk-fusion library interface
//!
//! Exposes the fusion core, detector collection, pipelines and the HTTP
//! router for the binary and for integration tests.

pub mod api;
pub mod db;
pub mod detectors;
pub mod error;
pub mod fusion;
pub mod liveness;
pub mod pipeline;

pub use crate::error::{ApiError, ApiResult};

use crate::db::DecisionSink;
use crate::fusion::{PipelineKind, WeightTables};
use crate::pipeline::{AnalysisPipeline, LivenessPipeline};
use axum::Router;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// One fused pipeline per media type
    pub pipelines: Arc<BTreeMap<PipelineKind, AnalysisPipeline>>,
    pub liveness: LivenessPipeline,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    /// Build one detector-less pipeline per weight table
    ///
    /// The HTTP surface accepts precomputed signals, so pipelines need no
    /// detectors of their own. Use [`AppState::with_pipeline`] to install one
    /// that runs detectors.
    pub fn new(
        weights: WeightTables,
        sink: Option<Arc<dyn DecisionSink>>,
        detector_timeout: Duration,
    ) -> Self {
        let pipelines = PipelineKind::ALL
            .into_iter()
            .map(|kind| {
                let mut pipeline = AnalysisPipeline::new(weights.get(kind).clone())
                    .with_detector_timeout(detector_timeout);
                if let Some(sink) = &sink {
                    pipeline = pipeline.with_sink(Arc::clone(sink));
                }
                (kind, pipeline)
            })
            .collect();

        let liveness = match &sink {
            Some(sink) => LivenessPipeline::new().with_sink(Arc::clone(sink)),
            None => LivenessPipeline::new(),
        };

        Self {
            pipelines: Arc::new(pipelines),
            liveness,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Replace the pipeline for its media type
    pub fn with_pipeline(mut self, pipeline: AnalysisPipeline) -> Self {
        let mut pipelines = (*self.pipelines).clone();
        pipelines.insert(pipeline.kind(), pipeline);
        self.pipelines = Arc::new(pipelines);
        self
    }

    pub fn pipeline(&self, kind: PipelineKind) -> Option<&AnalysisPipeline> {
        self.pipelines.get(&kind)
    }

    /// Remember an error for the health endpoint
    pub async fn record_error(&self, message: impl Into<String>) {
        *self.last_error.write().await = Some(message.into());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::weight_routes())
        .merge(api::analysis_routes())
        .merge(api::liveness_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
