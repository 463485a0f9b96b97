// Classification & Confidence Policy
//
// Score drives classification; signal count drives confidence. The two axes
// are independent and never blended into one tier.

use super::{Classification, ConfidenceTier, RiskScore};

/// Lower bound (inclusive) of the MANIPULATED band
pub const MANIPULATED_THRESHOLD: RiskScore = 70.0;

/// Lower bound (inclusive) of the SUSPICIOUS band
pub const SUSPICIOUS_THRESHOLD: RiskScore = 40.0;

/// Map an aggregate score and signal count to (classification, confidence)
pub fn classify(aggregate_score: RiskScore, num_signals: usize) -> (Classification, ConfidenceTier) {
    (classify_score(aggregate_score), confidence_for(num_signals))
}

/// Score bands: `>= 70` manipulated, `>= 40` suspicious, otherwise authentic
pub fn classify_score(aggregate_score: RiskScore) -> Classification {
    if aggregate_score >= MANIPULATED_THRESHOLD {
        Classification::Manipulated
    } else if aggregate_score >= SUSPICIOUS_THRESHOLD {
        Classification::Suspicious
    } else {
        Classification::Authentic
    }
}

/// An ensemble of two or more detectors is HIGH, a single detector MEDIUM
pub fn confidence_for(num_signals: usize) -> ConfidenceTier {
    match num_signals {
        0 => ConfidenceTier::Low,
        1 => ConfidenceTier::Medium,
        _ => ConfidenceTier::High,
    }
}
