// Liveness heuristics - image statistics → sub-scores
//
// Callers measure the raw statistics (local variance, Laplacian variance,
// HSV spreads, FFT peak ratio). These functions only map them onto 0-1
// liveness sub-scores so the calibration stays testable without pixels.

use super::HeuristicScores;
use serde::{Deserialize, Serialize};

/// Face confidence reported by cascade detectors that give no probability
pub const DEFAULT_CASCADE_CONFIDENCE: f64 = 0.8;

/// Local variance at which texture richness saturates
const TEXTURE_SATURATION: f64 = 500.0;

/// Laplacian variance below which the image is treated as blurry
const BLUR_LOW: f64 = 50.0;
/// Laplacian variance above which the image is treated as over-sharpened
const BLUR_HIGH: f64 = 2000.0;

/// Raw statistics of a face crop
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageStatistics {
    /// Mean of the per-window grayscale variance (local texture energy)
    pub mean_local_variance: f64,
    /// Variance of the Laplacian (focus measure)
    pub laplacian_variance: f64,
    /// Standard deviation of the HSV saturation channel
    pub saturation_std: f64,
    /// Standard deviation of the HSV hue channel
    pub hue_std: f64,
    /// Ratio of the strongest off-center FFT peak to the spectrum mean
    pub frequency_peak_ratio: f64,
}

impl ImageStatistics {
    pub fn scores(&self) -> HeuristicScores {
        HeuristicScores {
            texture: texture_score(self.mean_local_variance),
            blur: blur_score(self.laplacian_variance),
            color: color_score(self.saturation_std, self.hue_std),
            moire: moire_score(self.frequency_peak_ratio),
        }
    }
}

/// Printed faces lose micro-texture; richer texture scores higher
pub fn texture_score(mean_local_variance: f64) -> f64 {
    finite_or_zero(mean_local_variance / TEXTURE_SATURATION).clamp(0.0, 1.0)
}

/// Natural focus scores 0.9; very blurry 0.2; unnaturally sharp 0.6
pub fn blur_score(laplacian_variance: f64) -> f64 {
    if !laplacian_variance.is_finite() || laplacian_variance < BLUR_LOW {
        0.2
    } else if laplacian_variance > BLUR_HIGH {
        0.6
    } else {
        0.9
    }
}

/// Real skin shows natural saturation and hue spread
pub fn color_score(saturation_std: f64, hue_std: f64) -> f64 {
    let spread = (saturation_std / 50.0 + hue_std / 30.0) / 2.0;
    finite_or_zero(spread).clamp(0.0, 1.0)
}

/// Strong periodic frequency peaks indicate a screen; a flat spectrum scores 1
pub fn moire_score(frequency_peak_ratio: f64) -> f64 {
    finite_or_zero(1.0 - frequency_peak_ratio / 10.0).clamp(0.0, 1.0)
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
