//! Liveness (presentation attack) fusion
//!
//! A self-contained pipeline parallel to the per-detector fusion: four local
//! heuristic sub-scores (texture, blur, color, moiré) are combined with fixed
//! weights, blended with face-detection confidence, and compared against a
//! security-level threshold.
//!
//! Face detection is a precondition. Without a face the sub-analyses are never
//! run and the outcome is [`LivenessOutcome::NoFaceDetected`], a terminal state
//! distinct from a low liveness score.

pub mod heuristics;

use mediarisk_common::Error;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

pub const TEXTURE_WEIGHT: f64 = 0.30;
pub const BLUR_WEIGHT: f64 = 0.25;
pub const COLOR_WEIGHT: f64 = 0.25;
pub const MOIRE_WEIGHT: f64 = 0.20;

/// Share of the fused score taken from face-detection confidence
pub const FACE_CONFIDENCE_BLEND: f64 = 0.1;

/// Named accept/reject threshold profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLevel {
    #[default]
    Standard,
    High,
    BankingKyc,
}

impl SecurityLevel {
    /// Minimum fused score accepted as live
    pub fn threshold(&self) -> f64 {
        match self {
            SecurityLevel::Standard => 0.5,
            SecurityLevel::High => 0.65,
            SecurityLevel::BankingKyc => 0.8,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityLevel::Standard => "standard",
            SecurityLevel::High => "high",
            SecurityLevel::BankingKyc => "banking_kyc",
        }
    }
}

impl std::fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecurityLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(SecurityLevel::Standard),
            "high" => Ok(SecurityLevel::High),
            "banking_kyc" => Ok(SecurityLevel::BankingKyc),
            other => Err(Error::InvalidInput(format!(
                "Unknown security level '{}' (expected standard, high or banking_kyc)",
                other
            ))),
        }
    }
}

/// Liveness confidence, derived from the fused score's magnitude
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LivenessConfidence {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl LivenessConfidence {
    pub fn from_score(fused_score: f64) -> Self {
        if fused_score >= 0.8 {
            LivenessConfidence::VeryHigh
        } else if fused_score >= 0.65 {
            LivenessConfidence::High
        } else if fused_score >= 0.5 {
            LivenessConfidence::Medium
        } else {
            LivenessConfidence::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LivenessConfidence::Low => "LOW",
            LivenessConfidence::Medium => "MEDIUM",
            LivenessConfidence::High => "HIGH",
            LivenessConfidence::VeryHigh => "VERY_HIGH",
        }
    }
}

/// Spoofing technique best explaining a non-live verdict
///
/// Declaration order is the tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackType {
    Print,
    ScreenReplay,
    Photo,
}

impl AttackType {
    pub const ALL: [AttackType; 3] = [AttackType::Print, AttackType::ScreenReplay, AttackType::Photo];

    /// Evidence strength: how far the related sub-score deviates from live
    pub fn evidence(&self, subsignals: &LivenessSubSignals) -> f64 {
        match self {
            AttackType::Print => 1.0 - subsignals.texture,
            AttackType::ScreenReplay => 1.0 - subsignals.moire,
            AttackType::Photo => 1.0 - subsignals.blur,
        }
    }
}

/// Face detector output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    pub detected: bool,
    pub confidence: f64,
}

impl FaceDetection {
    pub fn detected(confidence: f64) -> Self {
        Self {
            detected: true,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn not_detected() -> Self {
        Self {
            detected: false,
            confidence: 0.0,
        }
    }
}

/// The four locally computed heuristic scores (each 0-1, higher = more live)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HeuristicScores {
    pub texture: f64,
    pub blur: f64,
    pub color: f64,
    pub moire: f64,
}

/// Inputs to liveness fusion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LivenessSubSignals {
    pub texture: f64,
    pub blur: f64,
    pub color: f64,
    pub moire: f64,
    pub face_confidence: f64,
}

impl LivenessSubSignals {
    /// Build sub-signals, clamping every value into [0, 1] (NaN becomes 0)
    pub fn new(texture: f64, blur: f64, color: f64, moire: f64, face_confidence: f64) -> Self {
        Self {
            texture: unit(texture),
            blur: unit(blur),
            color: unit(color),
            moire: unit(moire),
            face_confidence: unit(face_confidence),
        }
    }

    pub fn from_parts(scores: HeuristicScores, face_confidence: f64) -> Self {
        Self::new(
            scores.texture,
            scores.blur,
            scores.color,
            scores.moire,
            face_confidence,
        )
    }
}

fn unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Fused liveness verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivenessDecision {
    pub is_live: bool,
    pub fused_score: f64,
    pub confidence_level: LivenessConfidence,
    pub security_level: SecurityLevel,
    pub threshold: f64,
    /// Only set when `is_live` is false
    pub attack_type: Option<AttackType>,
    pub subsignals: LivenessSubSignals,
}

/// Result of a liveness check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LivenessOutcome {
    Decided(LivenessDecision),
    NoFaceDetected { security_level: SecurityLevel },
}

impl LivenessOutcome {
    pub fn is_live(&self) -> bool {
        matches!(self, LivenessOutcome::Decided(d) if d.is_live)
    }

    pub fn decision(&self) -> Option<&LivenessDecision> {
        match self {
            LivenessOutcome::Decided(d) => Some(d),
            LivenessOutcome::NoFaceDetected { .. } => None,
        }
    }

    pub fn security_level(&self) -> SecurityLevel {
        match self {
            LivenessOutcome::Decided(d) => d.security_level,
            LivenessOutcome::NoFaceDetected { security_level } => *security_level,
        }
    }

    /// Confidence label; "NONE" when no face was found
    pub fn confidence_label(&self) -> &'static str {
        match self {
            LivenessOutcome::Decided(d) => d.confidence_level.as_str(),
            LivenessOutcome::NoFaceDetected { .. } => "NONE",
        }
    }

    /// Decision label: LIVE, SPOOF_DETECTED or NO_FACE_DETECTED
    pub fn decision_label(&self) -> &'static str {
        match self {
            LivenessOutcome::Decided(d) if d.is_live => "LIVE",
            LivenessOutcome::Decided(_) => "SPOOF_DETECTED",
            LivenessOutcome::NoFaceDetected { .. } => "NO_FACE_DETECTED",
        }
    }
}

/// Weighted sub-score sum blended with face-detection confidence
///
/// Monotonically non-decreasing in every sub-score.
pub fn fused_score(subsignals: &LivenessSubSignals) -> f64 {
    let base = subsignals.texture * TEXTURE_WEIGHT
        + subsignals.blur * BLUR_WEIGHT
        + subsignals.color * COLOR_WEIGHT
        + subsignals.moire * MOIRE_WEIGHT;

    base * (1.0 - FACE_CONFIDENCE_BLEND) + subsignals.face_confidence * FACE_CONFIDENCE_BLEND
}

/// Attack type with the strongest evidence; ties resolve print > screen_replay > photo
pub fn attribute_attack(subsignals: &LivenessSubSignals) -> AttackType {
    let mut best = AttackType::Print;
    let mut best_evidence = best.evidence(subsignals);

    for candidate in AttackType::ALL.into_iter().skip(1) {
        let evidence = candidate.evidence(subsignals);
        if evidence > best_evidence {
            best = candidate;
            best_evidence = evidence;
        }
    }

    best
}

/// Fuse sub-signals into a liveness decision for a security level
pub fn fuse_liveness(subsignals: &LivenessSubSignals, security_level: SecurityLevel) -> LivenessDecision {
    let fused = fused_score(subsignals);
    let threshold = security_level.threshold();
    let is_live = fused >= threshold;

    let attack_type = if is_live {
        None
    } else {
        Some(attribute_attack(subsignals))
    };

    debug!(
        fused_score = fused,
        threshold,
        is_live,
        attack_type = ?attack_type,
        "Liveness fused"
    );

    LivenessDecision {
        is_live,
        fused_score: fused,
        confidence_level: LivenessConfidence::from_score(fused),
        security_level,
        threshold,
        attack_type,
        subsignals: *subsignals,
    }
}

/// Run a liveness check, short-circuiting when no face was detected
///
/// `analyze` computes the four heuristic scores and is only invoked when a
/// face is present.
pub fn evaluate_liveness<F>(face: FaceDetection, security_level: SecurityLevel, analyze: F) -> LivenessOutcome
where
    F: FnOnce() -> HeuristicScores,
{
    if !face.detected {
        debug!("No face detected, skipping liveness sub-analyses");
        return LivenessOutcome::NoFaceDetected { security_level };
    }

    let subsignals = LivenessSubSignals::from_parts(analyze(), face.confidence);
    LivenessOutcome::Decided(fuse_liveness(&subsignals, security_level))
}
