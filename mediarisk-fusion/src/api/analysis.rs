//! Fused analysis endpoints
//!
//! POST /analyze/:pipeline, POST /analyze/:pipeline/frames

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Instant;

use crate::detectors::DetectorFailure;
use crate::error::{ApiError, ApiResult};
use crate::fusion::{calibration, temporal, FusionError, PipelineKind, RiskScore, Signal};
use crate::pipeline::{AnalysisPipeline, Decision};
use crate::AppState;

fn default_available() -> bool {
    true
}

/// One detector result supplied by the caller
///
/// Exactly one of `risk_score` (0-100), `fake_probability` (0-1) or
/// two-class `logits` (`[real, fake]`) is required.
#[derive(Debug, Clone, Deserialize)]
pub struct SignalInput {
    pub modality: String,
    #[serde(default)]
    pub risk_score: Option<RiskScore>,
    #[serde(default)]
    pub fake_probability: Option<f64>,
    #[serde(default)]
    pub logits: Option<[f64; 2]>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default = "default_available")]
    pub available: bool,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl SignalInput {
    pub fn into_signal(self) -> ApiResult<Signal> {
        let mut signal = match (self.risk_score, self.fake_probability, self.logits) {
            (Some(score), None, None) => Signal::new(&self.modality, score),
            (None, Some(probability), None) => Signal::from_probability(&self.modality, probability),
            (None, None, Some(logits)) => {
                if logits.iter().any(|l| !l.is_finite()) {
                    return Err(ApiError::BadRequest(format!(
                        "signal '{}' has non-finite logits",
                        self.modality
                    )));
                }
                Signal::from_probability(
                    &self.modality,
                    calibration::fake_probability_from_logits(logits),
                )
            }
            (None, None, None) if !self.available => Signal::unavailable(&self.modality),
            (None, None, None) => {
                return Err(ApiError::BadRequest(format!(
                    "signal '{}' needs risk_score, fake_probability or logits",
                    self.modality
                )))
            }
            _ => {
                return Err(ApiError::BadRequest(format!(
                    "signal '{}' must carry exactly one of risk_score, fake_probability, logits",
                    self.modality
                )))
            }
        };

        signal.available = self.available;
        signal.metadata = self.metadata;
        if let Some(weight) = self.weight {
            if !(weight.is_finite() && weight > 0.0 && weight <= 1.0) {
                return Err(ApiError::BadRequest(format!(
                    "signal '{}' weight {} outside (0, 1]",
                    self.modality, weight
                )));
            }
            signal = signal.with_weight(weight);
        }
        Ok(signal)
    }
}

/// A detector the caller tried and that failed
#[derive(Debug, Clone, Deserialize)]
pub struct FailureInput {
    pub modality: String,
    pub reason: String,
}

impl From<FailureInput> for DetectorFailure {
    fn from(input: FailureInput) -> Self {
        DetectorFailure::failed(input.modality, input.reason)
    }
}

/// POST /analyze/:pipeline request
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub signals: Vec<SignalInput>,
    #[serde(default)]
    pub failures: Vec<FailureInput>,
}

/// POST /analyze/:pipeline/frames request
#[derive(Debug, Deserialize)]
pub struct FramesRequest {
    /// Per-frame scores keyed by modality
    pub frames: BTreeMap<String, Vec<RiskScore>>,
    /// Signals that are already video-level
    #[serde(default)]
    pub signals: Vec<SignalInput>,
    #[serde(default)]
    pub failures: Vec<FailureInput>,
}

fn resolve_pipeline<'a>(state: &'a AppState, name: &str) -> ApiResult<&'a AnalysisPipeline> {
    let kind: PipelineKind = name.parse().map_err(|_| {
        ApiError::BadRequest(format!(
            "unknown pipeline '{}' (expected image, video or audio)",
            name
        ))
    })?;

    state
        .pipeline(kind)
        .ok_or_else(|| ApiError::NotFound(format!("pipeline '{}'", kind)))
}

fn convert_signals(inputs: Vec<SignalInput>) -> ApiResult<Vec<Signal>> {
    inputs.into_iter().map(SignalInput::into_signal).collect()
}

async fn decide(
    state: &AppState,
    pipeline: &AnalysisPipeline,
    signals: &[Signal],
    failures: Vec<FailureInput>,
    started: Instant,
) -> ApiResult<Json<Decision>> {
    let failures = failures.into_iter().map(DetectorFailure::from).collect();

    match pipeline.decide(signals, failures, started) {
        Ok(decision) => Ok(Json(decision)),
        Err(e) => {
            if e.is_configuration() || e == FusionError::NoSignals {
                state.record_error(e.to_string()).await;
            }
            Err(e.into())
        }
    }
}

/// POST /analyze/:pipeline
///
/// Fuse caller-supplied signals with the pipeline's weight table.
pub async fn analyze(
    State(state): State<AppState>,
    Path(pipeline): Path<String>,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<Json<Decision>> {
    let started = Instant::now();
    let pipeline = resolve_pipeline(&state, &pipeline)?;
    let signals = convert_signals(request.signals)?;

    tracing::debug!(pipeline = %pipeline.kind(), signals = signals.len(), "Analyze request");

    decide(&state, pipeline, &signals, request.failures, started).await
}

/// POST /analyze/:pipeline/frames
///
/// Each per-frame sequence is reduced by the temporal aggregator before fusion.
pub async fn analyze_frames(
    State(state): State<AppState>,
    Path(pipeline): Path<String>,
    Json(request): Json<FramesRequest>,
) -> ApiResult<Json<Decision>> {
    let started = Instant::now();
    let pipeline = resolve_pipeline(&state, &pipeline)?;

    let mut signals = Vec::with_capacity(request.frames.len() + request.signals.len());
    for (modality, scores) in &request.frames {
        signals.push(temporal::aggregate(modality, scores)?);
    }
    signals.extend(convert_signals(request.signals)?);

    tracing::debug!(
        pipeline = %pipeline.kind(),
        frame_sequences = request.frames.len(),
        signals = signals.len(),
        "Analyze frames request"
    );

    decide(&state, pipeline, &signals, request.failures, started).await
}

/// Build analysis routes
pub fn analysis_routes() -> Router<AppState> {
    Router::new()
        .route("/analyze/:pipeline", post(analyze))
        .route("/analyze/:pipeline/frames", post(analyze_frames))
}
