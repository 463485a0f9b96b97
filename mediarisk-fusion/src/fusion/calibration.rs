// Probability calibration helpers for detectors
//
// Detectors report classifier output in different shapes (logits, fake
// probabilities). These helpers bring them onto the 0-100 risk scale.

use super::RiskScore;

/// Numerically stable softmax
///
/// Returns an empty vector for empty input.
pub fn stable_softmax(logits: &[f64]) -> Vec<f64> {
    if logits.is_empty() {
        return Vec::new();
    }

    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Fake probability from two-class logits ordered `[real, fake]`
pub fn fake_probability_from_logits(logits: [f64; 2]) -> f64 {
    stable_softmax(&logits)[1]
}

/// Fake probability (0-1) → risk score (0-100)
///
/// Non-finite probabilities map to 0; out-of-range values are clamped.
pub fn risk_from_probability(fake_probability: f64) -> RiskScore {
    if !fake_probability.is_finite() {
        return 0.0;
    }
    fake_probability.clamp(0.0, 1.0) * 100.0
}
