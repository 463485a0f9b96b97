//! Temporal detector adapter
//!
//! Turns a per-frame scorer into a video-level [`Detector`]: frames are drawn
//! at stratified positions, scored one by one and reduced by the temporal
//! aggregator (max drives fusion, mean is reported).

use super::{Detector, DetectorFailure, MediaSample};
use crate::fusion::{temporal, RiskScore, Signal};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default number of frames drawn from one clip
pub const DEFAULT_FRAMES_PER_CLIP: usize = 16;

/// One decoded frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Index of the frame within the clip
    pub position: usize,
    pub data: Arc<[u8]>,
}

/// Produces `n` frames from a clip
pub trait FrameSampler: Send + Sync {
    fn sample_frames(&self, media: &MediaSample, n: usize) -> Result<Vec<Frame>>;
}

/// Random access to the frames of a clip (a decoder)
pub trait FrameReader: Send + Sync {
    /// Total frame count of the clip
    fn frame_count(&self, media: &MediaSample) -> Result<usize>;

    /// Decode one frame, `None` if it cannot be read
    fn read_frame(&self, media: &MediaSample, position: usize) -> Option<Vec<u8>>;
}

/// Uniform stratified sampling over a [`FrameReader`]
///
/// Unreadable frames are replaced by the last good frame so the scorer always
/// sees `n` frames once at least one could be decoded.
pub struct StratifiedSampler<R> {
    reader: R,
}

impl<R: FrameReader> StratifiedSampler<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: FrameReader> FrameSampler for StratifiedSampler<R> {
    fn sample_frames(&self, media: &MediaSample, n: usize) -> Result<Vec<Frame>> {
        let total = self.reader.frame_count(media)?;
        let frames = temporal::sample_with_padding(total, n, |position| {
            self.reader.read_frame(media, position).map(|data| Frame {
                position,
                data: data.into(),
            })
        });

        if frames.is_empty() {
            anyhow::bail!("no readable frames in {} total", total);
        }
        Ok(frames)
    }
}

/// Scores one frame on the 0-100 risk scale
#[async_trait]
pub trait FrameScorer: Send + Sync {
    async fn score_frame(&self, frame: &Frame) -> Result<RiskScore>;

    /// Capability check (model weights loaded)
    fn is_ready(&self) -> bool {
        true
    }
}

/// Video detector: stratified frames → per-frame scores → max
pub struct TemporalDetector {
    modality: String,
    sampler: Arc<dyn FrameSampler>,
    scorer: Arc<dyn FrameScorer>,
    frames_per_clip: usize,
}

impl TemporalDetector {
    pub fn new(
        modality: impl Into<String>,
        sampler: Arc<dyn FrameSampler>,
        scorer: Arc<dyn FrameScorer>,
    ) -> Self {
        Self {
            modality: modality.into(),
            sampler,
            scorer,
            frames_per_clip: DEFAULT_FRAMES_PER_CLIP,
        }
    }

    pub fn with_frames_per_clip(mut self, n: usize) -> Self {
        self.frames_per_clip = n.max(1);
        self
    }
}

#[async_trait]
impl Detector for TemporalDetector {
    fn modality(&self) -> &str {
        &self.modality
    }

    fn is_available(&self) -> bool {
        self.scorer.is_ready()
    }

    async fn produce_signal(&self, media: &MediaSample) -> Result<Signal, DetectorFailure> {
        let frames = self
            .sampler
            .sample_frames(media, self.frames_per_clip)
            .map_err(|e| DetectorFailure::failed(&self.modality, format!("frame sampling: {}", e)))?;

        let mut scores = Vec::with_capacity(frames.len());
        let mut dropped = 0usize;
        for frame in &frames {
            match self.scorer.score_frame(frame).await {
                Ok(score) if score.is_finite() => scores.push(score),
                Ok(_) => {
                    dropped += 1;
                    debug!(modality = %self.modality, position = frame.position, "Non-finite frame score dropped");
                }
                Err(e) => {
                    dropped += 1;
                    warn!(
                        modality = %self.modality,
                        position = frame.position,
                        error = %e,
                        "Frame scoring failed, dropping frame"
                    );
                }
            }
        }

        let signal = temporal::aggregate(&self.modality, &scores).map_err(|_| {
            DetectorFailure::failed(
                &self.modality,
                format!("none of {} sampled frames could be scored", frames.len()),
            )
        })?;

        Ok(signal.with_metadata("frames_dropped", dropped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// Clip of `total` frames whose byte is the frame index; `broken` are unreadable
    struct SyntheticClip {
        total: usize,
        broken: HashSet<usize>,
    }

    impl FrameReader for SyntheticClip {
        fn frame_count(&self, _media: &MediaSample) -> Result<usize> {
            Ok(self.total)
        }

        fn read_frame(&self, _media: &MediaSample, position: usize) -> Option<Vec<u8>> {
            if self.broken.contains(&position) {
                None
            } else {
                Some(vec![position as u8])
            }
        }
    }

    /// Scores a frame as its first byte; byte 13 fails
    struct ByteScorer;

    #[async_trait]
    impl FrameScorer for ByteScorer {
        async fn score_frame(&self, frame: &Frame) -> Result<RiskScore> {
            match frame.data.first() {
                Some(13) => anyhow::bail!("model error"),
                Some(b) => Ok(*b as f64),
                None => anyhow::bail!("empty frame"),
            }
        }
    }

    fn media() -> MediaSample {
        MediaSample::new("video/mp4", vec![0u8; 4])
    }

    fn detector(total: usize, broken: &[usize]) -> TemporalDetector {
        let clip = SyntheticClip {
            total,
            broken: broken.iter().copied().collect(),
        };
        TemporalDetector::new(
            "local_temporal",
            Arc::new(StratifiedSampler::new(clip)),
            Arc::new(ByteScorer),
        )
        .with_frames_per_clip(5)
    }

    #[test]
    fn test_sampler_pads_unreadable_frames() {
        let sampler = StratifiedSampler::new(SyntheticClip {
            total: 100,
            broken: [50].into_iter().collect(),
        });

        let frames = sampler.sample_frames(&media(), 5).unwrap();
        let positions: Vec<usize> = frames.iter().map(|f| f.position).collect();
        assert_eq!(positions, vec![0, 25, 25, 74, 99]);
    }

    #[test]
    fn test_sampler_fails_without_readable_frames() {
        let sampler = StratifiedSampler::new(SyntheticClip {
            total: 0,
            broken: HashSet::new(),
        });
        assert!(sampler.sample_frames(&media(), 5).is_err());
    }

    #[tokio::test]
    async fn test_signal_is_max_frame_score() {
        let signal = detector(100, &[]).produce_signal(&media()).await.unwrap();

        assert_eq!(signal.modality, "local_temporal");
        assert_eq!(signal.risk_score, 99.0);
        assert_eq!(signal.metadata["frame_count"], 5);
        assert_eq!(signal.metadata["frames_dropped"], 0);
    }

    #[tokio::test]
    async fn test_failed_frame_is_dropped() {
        // Positions for 53 frames, n=5: 0, 13, 26, 39, 52; frame 13 fails to score
        let signal = detector(53, &[]).produce_signal(&media()).await.unwrap();

        assert_eq!(signal.metadata["frame_count"], 4);
        assert_eq!(signal.metadata["frames_dropped"], 1);
        assert_eq!(signal.risk_score, 52.0);
    }

    #[tokio::test]
    async fn test_unreadable_clip_is_detector_failure() {
        let all_broken: Vec<usize> = (0..10).collect();
        let failure = detector(10, &all_broken)
            .produce_signal(&media())
            .await
            .unwrap_err();

        assert_eq!(failure.modality, "local_temporal");
        assert_eq!(failure.kind, super::super::FailureKind::Failed);
    }
}
