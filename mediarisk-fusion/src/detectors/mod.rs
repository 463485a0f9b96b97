//! Detector collection
//!
//! Every detector (remote API, transformer, local ensemble, temporal model,
//! audio model) implements [`Detector`]. [`collect_signals`] runs all of them
//! concurrently, each under its own timeout, and isolates failures: one
//! detector erroring or timing out removes only its signal.
//!
//! # Example
//! ```rust,ignore
//! let detectors: Vec<Arc<dyn Detector>> = vec![Arc::new(RemoteApi::new(key)), Arc::new(Transformer::load()?)];
//! let collection = collect_signals(&detectors, &media, Duration::from_secs(30)).await;
//! let result = fuse(&collection.signals, &weights)?;
//! ```

pub mod temporal_detector;

pub use temporal_detector::{Frame, FrameSampler, FrameScorer, StratifiedSampler, TemporalDetector};

use crate::fusion::Signal;
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Media handed to every detector of one request
#[derive(Debug, Clone)]
pub struct MediaSample {
    /// MIME type as reported by the uploader
    pub media_type: String,
    pub filename: Option<String>,
    /// Raw bytes, shared between concurrently running detectors
    pub data: Arc<[u8]>,
}

impl MediaSample {
    pub fn new(media_type: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            media_type: media_type.into(),
            filename: None,
            data: data.into(),
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Why a detector produced no signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Detector returned an error
    Failed,
    /// Detector exceeded its time budget
    TimedOut,
    /// Detector returned a NaN or infinite score
    InvalidScore,
    /// Capability check failed (model not loaded, API key missing)
    Unavailable,
}

/// A detector that did not contribute, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Detector '{modality}' {kind:?}: {reason}")]
pub struct DetectorFailure {
    pub modality: String,
    pub kind: FailureKind,
    pub reason: String,
}

impl DetectorFailure {
    pub fn failed(modality: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            modality: modality.into(),
            kind: FailureKind::Failed,
            reason: reason.into(),
        }
    }

    pub fn timed_out(modality: impl Into<String>, timeout: Duration) -> Self {
        Self {
            modality: modality.into(),
            kind: FailureKind::TimedOut,
            reason: format!("no result within {} ms", timeout.as_millis()),
        }
    }

    pub fn invalid_score(modality: impl Into<String>) -> Self {
        Self {
            modality: modality.into(),
            kind: FailureKind::InvalidScore,
            reason: "risk score is not a finite number".to_string(),
        }
    }

    pub fn unavailable(modality: impl Into<String>) -> Self {
        Self {
            modality: modality.into(),
            kind: FailureKind::Unavailable,
            reason: "detector is not available".to_string(),
        }
    }
}

/// One detector family
///
/// Implementations must be cheap to share: the pipeline holds them as
/// `Arc<dyn Detector>` and invokes them concurrently.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Modality key, matching an entry of the pipeline's weight table
    fn modality(&self) -> &str;

    /// Capability check, performed once per collection before invoking
    fn is_available(&self) -> bool {
        true
    }

    /// Judge the media and report a signal for this detector's modality
    async fn produce_signal(&self, media: &MediaSample) -> Result<Signal, DetectorFailure>;
}

/// Outcome of running every detector of a pipeline once
#[derive(Debug, Clone, Default)]
pub struct SignalCollection {
    pub signals: Vec<Signal>,
    pub failures: Vec<DetectorFailure>,
}

impl SignalCollection {
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

/// Run all detectors concurrently and gather their signals
///
/// Unavailable detectors are recorded as failures without being invoked. A
/// detector that errors, times out or reports a non-finite score is recorded
/// as a failure; the remaining signals are returned in detector order.
pub async fn collect_signals(
    detectors: &[Arc<dyn Detector>],
    media: &MediaSample,
    timeout: Duration,
) -> SignalCollection {
    let futures = detectors.iter().map(|detector| {
        let detector = Arc::clone(detector);
        async move { invoke(detector.as_ref(), media, timeout).await }
    });

    let mut collection = SignalCollection::default();
    for outcome in join_all(futures).await {
        match outcome {
            Ok(signal) => collection.signals.push(signal),
            Err(failure) => collection.failures.push(failure),
        }
    }

    debug!(
        signals = collection.signals.len(),
        failures = collection.failures.len(),
        "Signal collection complete"
    );

    collection
}

async fn invoke(
    detector: &dyn Detector,
    media: &MediaSample,
    timeout: Duration,
) -> Result<Signal, DetectorFailure> {
    let modality = detector.modality().to_string();

    if !detector.is_available() {
        debug!(modality = %modality, "Detector unavailable, skipping");
        return Err(DetectorFailure::unavailable(modality));
    }

    let outcome = match tokio::time::timeout(timeout, detector.produce_signal(media)).await {
        Ok(Ok(signal)) if !signal.risk_score.is_finite() => {
            Err(DetectorFailure::invalid_score(&modality))
        }
        Ok(Ok(mut signal)) => {
            // The handle's modality is authoritative
            signal.modality = modality.clone();
            Ok(signal)
        }
        Ok(Err(failure)) => Err(failure),
        Err(_) => Err(DetectorFailure::timed_out(&modality, timeout)),
    };

    match &outcome {
        Ok(signal) => debug!(
            modality = %modality,
            risk_score = signal.risk_score,
            available = signal.available,
            "Detector produced signal"
        ),
        Err(failure) => warn!(
            modality = %modality,
            kind = ?failure.kind,
            error = %failure.reason,
            "Detector failed, excluding from fusion"
        ),
    }

    outcome
}

// ============================================================================
// Mock Detector for Testing
// ============================================================================

pub mod mock {
    //! Scripted detector used by unit and integration tests

    use super::*;

    /// What a [`MockDetector`] does when invoked
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        Score(f64),
        Unavailable,
        Fail(String),
        Hang,
    }

    pub struct MockDetector {
        pub modality: String,
        pub behavior: MockBehavior,
        pub delay: Duration,
    }

    impl MockDetector {
        pub fn scoring(modality: &str, risk_score: f64) -> Self {
            Self::with_behavior(modality, MockBehavior::Score(risk_score))
        }

        pub fn failing(modality: &str, reason: &str) -> Self {
            Self::with_behavior(modality, MockBehavior::Fail(reason.to_string()))
        }

        pub fn unavailable(modality: &str) -> Self {
            Self::with_behavior(modality, MockBehavior::Unavailable)
        }

        pub fn hanging(modality: &str) -> Self {
            Self::with_behavior(modality, MockBehavior::Hang)
        }

        pub fn with_behavior(modality: &str, behavior: MockBehavior) -> Self {
            Self {
                modality: modality.to_string(),
                behavior,
                delay: Duration::ZERO,
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl Detector for MockDetector {
        fn modality(&self) -> &str {
            &self.modality
        }

        fn is_available(&self) -> bool {
            !matches!(self.behavior, MockBehavior::Unavailable)
        }

        async fn produce_signal(&self, _media: &MediaSample) -> Result<Signal, DetectorFailure> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match &self.behavior {
                MockBehavior::Score(score) => {
                    // Bypass clamping so non-finite scores reach the collector
                    let mut signal = Signal::new(&self.modality, 0.0);
                    signal.risk_score = if score.is_finite() {
                        score.clamp(0.0, 100.0)
                    } else {
                        *score
                    };
                    Ok(signal)
                }
                MockBehavior::Fail(reason) => Err(DetectorFailure::failed(&self.modality, reason)),
                MockBehavior::Hang => {
                    std::future::pending::<()>().await;
                    Err(DetectorFailure::failed(&self.modality, "unreachable"))
                }
                MockBehavior::Unavailable => Err(DetectorFailure::unavailable(&self.modality)),
            }
        }
    }
}
