//! Liveness endpoint
//!
//! POST /liveness

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::liveness::heuristics::{ImageStatistics, DEFAULT_CASCADE_CONFIDENCE};
use crate::liveness::{FaceDetection, HeuristicScores, SecurityLevel};
use crate::pipeline::LivenessRecord;
use crate::AppState;

/// POST /liveness request
///
/// Sub-scores come either precomputed (`scores`) or as raw image statistics
/// (`statistics`), converted only when a face was detected.
#[derive(Debug, Deserialize)]
pub struct LivenessRequest {
    pub face_detected: bool,
    #[serde(default)]
    pub face_confidence: Option<f64>,
    #[serde(default)]
    pub scores: Option<HeuristicScores>,
    #[serde(default)]
    pub statistics: Option<ImageStatistics>,
    /// standard (default), high or banking_kyc
    #[serde(default)]
    pub security_level: Option<String>,
}

/// POST /liveness
pub async fn check_liveness(
    State(state): State<AppState>,
    Json(request): Json<LivenessRequest>,
) -> ApiResult<Json<LivenessRecord>> {
    let security_level = match request.security_level.as_deref() {
        Some(level) => level.parse::<SecurityLevel>()?,
        None => SecurityLevel::default(),
    };

    let face = if request.face_detected {
        FaceDetection::detected(request.face_confidence.unwrap_or(DEFAULT_CASCADE_CONFIDENCE))
    } else {
        FaceDetection::not_detected()
    };

    if face.detected && request.scores.is_none() && request.statistics.is_none() {
        return Err(ApiError::BadRequest(
            "face detected but neither scores nor statistics supplied".to_string(),
        ));
    }

    let scores = request.scores;
    let statistics = request.statistics;
    let record = state.liveness.assess(face, security_level, move || {
        scores
            .or_else(|| statistics.map(|s| s.scores()))
            .unwrap_or_default()
    });

    Ok(Json(record))
}

/// Build liveness routes
pub fn liveness_routes() -> Router<AppState> {
    Router::new().route("/liveness", post(check_liveness))
}
