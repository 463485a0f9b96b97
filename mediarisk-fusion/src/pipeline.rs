//! Analysis pipelines
//!
//! Orchestrates one request end to end:
//! - **Collection**: run detectors concurrently (failure isolated, time-bounded)
//! - **Fusion**: weighted fusion over the signals that arrived
//! - **Policy**: classification and confidence
//! - **Envelope**: wrap the result with id, timestamp, failures, timing
//! - **Persistence**: hand the envelope to the decision sink in a detached task
//!
//! Liveness runs through [`LivenessPipeline`], which shares the envelope and
//! persistence steps but not collection or weighted fusion.

use crate::db::DecisionSink;
use crate::detectors::{collect_signals, Detector, DetectorFailure, MediaSample};
use crate::fusion::{fuse, FusionError, FusionResult, PipelineKind, Signal, WeightTable};
use crate::liveness::{
    evaluate_liveness, AttackType, FaceDetection, HeuristicScores, LivenessOutcome,
    LivenessSubSignals, SecurityLevel,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

/// Default upper bound on one detector invocation
pub const DEFAULT_DETECTOR_TIMEOUT: Duration = Duration::from_secs(30);

/// Aggregate expressed as complementary probabilities
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub fake_probability: f64,
    pub real_probability: f64,
}

impl Prediction {
    pub fn from_result(result: &FusionResult) -> Self {
        let fake_probability = result.fake_probability();
        Self {
            fake_probability,
            real_probability: 1.0 - fake_probability,
        }
    }
}

/// Envelope returned for one fused analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub analysis_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub pipeline: PipelineKind,
    pub result: FusionResult,
    pub prediction: Prediction,
    /// Detectors that did not contribute
    pub failures: Vec<DetectorFailure>,
    pub processing_time_ms: u64,
}

/// Envelope returned for one liveness check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivenessRecord {
    pub analysis_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub is_live: bool,
    /// LIVE, SPOOF_DETECTED or NO_FACE_DETECTED
    pub decision: String,
    /// LOW..VERY_HIGH, or NONE without a face
    pub confidence_level: String,
    pub security_level: SecurityLevel,
    pub threshold: f64,
    pub face_detected: bool,
    pub fused_score: Option<f64>,
    pub attack_type: Option<AttackType>,
    pub subsignals: Option<LivenessSubSignals>,
    pub processing_time_ms: u64,
}

impl LivenessRecord {
    pub fn from_outcome(outcome: &LivenessOutcome, started: Instant) -> Self {
        let decision = outcome.decision();
        Self {
            analysis_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            is_live: outcome.is_live(),
            decision: outcome.decision_label().to_string(),
            confidence_level: outcome.confidence_label().to_string(),
            security_level: outcome.security_level(),
            threshold: outcome.security_level().threshold(),
            face_detected: decision.is_some(),
            fused_score: decision.map(|d| d.fused_score),
            attack_type: decision.and_then(|d| d.attack_type),
            subsignals: decision.map(|d| d.subsignals),
            processing_time_ms: elapsed_ms(started),
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().min(u64::MAX as u128) as u64
}

/// Fused analysis for one media type
#[derive(Clone)]
pub struct AnalysisPipeline {
    weights: WeightTable,
    detectors: Vec<Arc<dyn Detector>>,
    detector_timeout: Duration,
    sink: Option<Arc<dyn DecisionSink>>,
}

impl AnalysisPipeline {
    pub fn new(weights: WeightTable) -> Self {
        Self {
            weights,
            detectors: Vec::new(),
            detector_timeout: DEFAULT_DETECTOR_TIMEOUT,
            sink: None,
        }
    }

    pub fn with_detector(mut self, detector: Arc<dyn Detector>) -> Self {
        self.detectors.push(detector);
        self
    }

    pub fn with_detector_timeout(mut self, timeout: Duration) -> Self {
        self.detector_timeout = timeout;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn DecisionSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn kind(&self) -> PipelineKind {
        self.weights.pipeline()
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    pub fn detector_count(&self) -> usize {
        self.detectors.len()
    }

    /// Run every detector on `media` and fuse what comes back
    ///
    /// # Errors
    /// `NoSignals` when every detector failed, plus any configuration error
    /// from fusion (e.g. a detector whose modality is not in the table).
    pub async fn analyze(&self, media: &MediaSample) -> Result<Decision, FusionError> {
        let started = Instant::now();
        let collection = collect_signals(&self.detectors, media, self.detector_timeout).await;
        self.decide(&collection.signals, collection.failures, started)
    }

    /// Fuse already-collected signals into a decision
    pub fn decide(
        &self,
        signals: &[Signal],
        failures: Vec<DetectorFailure>,
        started: Instant,
    ) -> Result<Decision, FusionError> {
        let result = match fuse(signals, &self.weights) {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    pipeline = %self.kind(),
                    failures = failures.len(),
                    error = %e,
                    "Fusion failed"
                );
                return Err(e);
            }
        };

        let decision = Decision {
            analysis_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            pipeline: self.kind(),
            prediction: Prediction::from_result(&result),
            result,
            failures,
            processing_time_ms: elapsed_ms(started),
        };

        info!(
            analysis_id = %decision.analysis_id,
            pipeline = %decision.pipeline,
            score = decision.result.aggregate_score,
            classification = %decision.result.classification,
            confidence = %decision.result.confidence,
            signals = decision.result.num_signals(),
            failures = decision.failures.len(),
            "Analysis decided"
        );

        if let Some(sink) = &self.sink {
            let sink = Arc::clone(sink);
            let record = decision.clone();
            spawn_persist(decision.analysis_id, async move {
                sink.record_decision(&record).await
            });
        }

        Ok(decision)
    }
}

/// Liveness checks with optional persistence
#[derive(Clone, Default)]
pub struct LivenessPipeline {
    sink: Option<Arc<dyn DecisionSink>>,
}

impl LivenessPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn DecisionSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Evaluate liveness; `analyze` only runs when a face was detected
    pub fn assess<F>(&self, face: FaceDetection, security_level: SecurityLevel, analyze: F) -> LivenessRecord
    where
        F: FnOnce() -> HeuristicScores,
    {
        let started = Instant::now();
        let outcome = evaluate_liveness(face, security_level, analyze);
        let record = LivenessRecord::from_outcome(&outcome, started);

        info!(
            analysis_id = %record.analysis_id,
            security_level = %record.security_level,
            decision = %record.decision,
            confidence = %record.confidence_level,
            "Liveness decided"
        );

        if let Some(sink) = &self.sink {
            let sink = Arc::clone(sink);
            let persisted = record.clone();
            spawn_persist(record.analysis_id, async move {
                sink.record_liveness(&persisted).await
            });
        }

        record
    }
}

/// Persist in a detached task; failures are logged, never returned
fn spawn_persist<F>(analysis_id: Uuid, persist: F)
where
    F: std::future::Future<Output = mediarisk_common::Result<()>> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                if let Err(e) = persist.await {
                    warn!(analysis_id = %analysis_id, error = %e, "Failed to persist decision");
                }
            });
        }
        Err(_) => warn!(
            analysis_id = %analysis_id,
            "No async runtime, decision not persisted"
        ),
    }
}
