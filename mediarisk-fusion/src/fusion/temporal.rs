// Temporal Aggregator - per-frame scores → one video-level signal
//
// Frames are sampled at stratified, uniform offsets across the clip. The
// signal's risk score is the MAX frame score: one strongly manipulated frame
// must not be diluted by many authentic ones. The mean is kept for reporting.

use super::{FusionError, RiskScore, Signal};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Summary of one frame score sequence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameStatistics {
    /// Highest frame score (fed into fusion)
    pub max: RiskScore,
    /// Mean frame score (observability only)
    pub mean: RiskScore,
    pub frame_count: usize,
}

impl FrameStatistics {
    /// Compute statistics over scores already clamped to 0-100
    ///
    /// Returns `None` for an empty sequence.
    pub fn from_scores(scores: &[RiskScore]) -> Option<Self> {
        if scores.is_empty() {
            return None;
        }

        let max = scores.iter().copied().fold(f64::MIN, f64::max);
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;

        Some(Self {
            max,
            mean,
            frame_count: scores.len(),
        })
    }
}

/// Reduce a frame score sequence to one signal for `modality`
///
/// Scores are clamped to 0-100 before aggregation. The mean, max and frame
/// count are recorded in the signal's metadata.
pub fn aggregate(modality: &str, frame_scores: &[RiskScore]) -> Result<Signal, FusionError> {
    if frame_scores.iter().any(|s| !s.is_finite()) {
        return Err(FusionError::InvalidScore(modality.to_string()));
    }

    let clamped: Vec<RiskScore> = frame_scores.iter().map(|s| s.clamp(0.0, 100.0)).collect();
    let stats = FrameStatistics::from_scores(&clamped).ok_or(FusionError::EmptyFrameSequence)?;

    debug!(
        modality,
        frames = stats.frame_count,
        max = stats.max,
        mean = stats.mean,
        "Aggregated frame scores"
    );

    Ok(Signal::new(modality, stats.max)
        .with_metadata("frame_count", stats.frame_count)
        .with_metadata("max_score", stats.max)
        .with_metadata("mean_score", stats.mean))
}

/// Frame positions for `n` stratified samples over `total_frames`
///
/// Sample `i` maps to `round(i × (total_frames - 1) / (n - 1))`, clamped to the
/// last frame. A single sample takes the first frame.
pub fn sample_positions(total_frames: usize, n: usize) -> Vec<usize> {
    if total_frames == 0 || n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![0];
    }

    let last = total_frames - 1;
    (0..n)
        .map(|i| {
            let position = (i as f64 * last as f64 / (n - 1) as f64).round() as usize;
            position.min(last)
        })
        .collect()
}

/// Read `n` stratified frames, padding with the last good frame
///
/// A failed read (`read` returning `None`) is replaced by a copy of the last
/// successfully read frame. If the result is still shorter than `n` (failures
/// before the first good frame), the last frame is repeated until it is.
/// Returns an empty vector when no frame could be read at all.
pub fn sample_with_padding<T, F>(total_frames: usize, n: usize, mut read: F) -> Vec<T>
where
    T: Clone,
    F: FnMut(usize) -> Option<T>,
{
    let mut frames: Vec<T> = Vec::with_capacity(n);

    for position in sample_positions(total_frames, n) {
        match read(position) {
            Some(frame) => frames.push(frame),
            None => {
                if let Some(last) = frames.last().cloned() {
                    frames.push(last);
                }
            }
        }
    }

    while let Some(last) = frames.last().cloned() {
        if frames.len() >= n {
            break;
        }
        frames.push(last);
    }

    frames
}
