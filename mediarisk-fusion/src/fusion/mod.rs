// Fusion Module - Weighted multi-detector risk fusion
//
// Signals (one per detector) → Weighted Fusion Engine → Classification & Confidence Policy.
// Video signals pass through the Temporal Aggregator before fusion.

pub mod calibration;
pub mod engine;
pub mod policy;
pub mod temporal;
pub mod weights;

pub use engine::fuse;
pub use policy::classify;
pub use weights::{PipelineKind, WeightTable, WeightTables};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Remote deepfake detection API
pub const MODALITY_REMOTE_API: &str = "remote_api";
/// Transformer-based image classifier
pub const MODALITY_TRANSFORMER: &str = "transformer";
/// Local visual + forensic ensemble
pub const MODALITY_LOCAL_ENSEMBLE: &str = "local_ensemble";
/// Local temporal (3D CNN) video model
pub const MODALITY_LOCAL_TEMPORAL: &str = "local_temporal";
/// Local synthetic-voice detector
pub const MODALITY_LOCAL_AUDIO: &str = "local_audio";

/// Risk score on the 0-100 scale (higher = more likely manipulated)
pub type RiskScore = f64;

/// Normalized output of one detector
///
/// Built by a detector and handed to the fusion engine as-is. `weight` is the
/// detector's self-declared trust and is informational only; fusion weights
/// come from the pipeline's `WeightTable`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Detector family that produced this signal
    pub modality: String,

    /// Risk score (0-100)
    pub risk_score: RiskScore,

    /// Self-declared trust (0-1]
    pub weight: f64,

    /// False when the detector answered but could not judge the media
    pub available: bool,

    /// Detector-specific details (frame statistics, sub-scores, ...)
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Signal {
    /// Create an available signal with the risk score clamped to 0-100
    pub fn new(modality: impl Into<String>, risk_score: RiskScore) -> Self {
        Self {
            modality: modality.into(),
            risk_score: risk_score.clamp(0.0, 100.0),
            weight: 1.0,
            available: true,
            metadata: BTreeMap::new(),
        }
    }

    /// Create a signal from a fake probability (0-1)
    pub fn from_probability(modality: impl Into<String>, fake_probability: f64) -> Self {
        Self::new(modality, calibration::risk_from_probability(fake_probability))
    }

    /// Placeholder for a detector that answered without a usable judgment
    pub fn unavailable(modality: impl Into<String>) -> Self {
        Self {
            available: false,
            ..Self::new(modality, 0.0)
        }
    }

    /// Set the self-declared weight, clamped into (0, 1]
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = if weight.is_finite() && weight > 0.0 {
            weight.min(1.0)
        } else {
            f64::MIN_POSITIVE
        };
        self
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Categorical risk label
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    Authentic,
    Suspicious,
    Manipulated,
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Classification::Authentic => write!(f, "AUTHENTIC"),
            Classification::Suspicious => write!(f, "SUSPICIOUS"),
            Classification::Manipulated => write!(f, "MANIPULATED"),
        }
    }
}

/// How well-corroborated a fused verdict is (driven by signal count)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfidenceTier::Low => write!(f, "LOW"),
            ConfidenceTier::Medium => write!(f, "MEDIUM"),
            ConfidenceTier::High => write!(f, "HIGH"),
        }
    }
}

/// Result of fusing one request's signal set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionResult {
    /// Weighted aggregate risk (0-100)
    pub aggregate_score: RiskScore,

    pub classification: Classification,

    pub confidence: ConfidenceTier,

    /// Exactly the modalities that took part, with their scores
    pub contributing_signals: BTreeMap<String, RiskScore>,
}

impl FusionResult {
    /// Number of signals that produced the aggregate
    pub fn num_signals(&self) -> usize {
        self.contributing_signals.len()
    }

    /// Aggregate expressed as a probability (0-1)
    pub fn fake_probability(&self) -> f64 {
        self.aggregate_score / 100.0
    }
}

/// Fusion-layer errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FusionError {
    /// Every detector failed or was unavailable
    #[error("No signals available for fusion")]
    NoSignals,

    /// Signal modality missing from the pipeline's weight table
    #[error("Unknown modality '{modality}' for the {pipeline} weight table")]
    UnknownModality {
        modality: String,
        pipeline: PipelineKind,
    },

    /// Same modality submitted twice in one signal set
    #[error("Modality '{0}' appears more than once in the signal set")]
    DuplicateModality(String),

    /// NaN or infinite risk score
    #[error("Signal from '{0}' has a non-finite risk score")]
    InvalidScore(String),

    /// Temporal aggregation called with no frames
    #[error("Frame score sequence is empty")]
    EmptyFrameSequence,

    /// Invalid weight table or other configuration problem
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl FusionError {
    /// True for errors caused by configuration drift rather than the request
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            FusionError::UnknownModality { .. } | FusionError::Configuration(_)
        )
    }
}
