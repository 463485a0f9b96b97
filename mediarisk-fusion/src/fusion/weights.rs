// Weight Tables - per-pipeline detector trust configuration
//
// One shared table per media type. Tables are immutable once built and are
// injected into the fusion engine, never read from module constants.

use super::FusionError;
use mediarisk_common::config::WeightsConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Allowed drift of a table's weight sum from 1.0
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Media pipeline selecting which weight table applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineKind {
    Image,
    Video,
    Audio,
}

impl PipelineKind {
    pub const ALL: [PipelineKind; 3] = [PipelineKind::Image, PipelineKind::Video, PipelineKind::Audio];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineKind::Image => "image",
            PipelineKind::Video => "video",
            PipelineKind::Audio => "audio",
        }
    }
}

impl std::fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineKind {
    type Err = FusionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(PipelineKind::Image),
            "video" => Ok(PipelineKind::Video),
            "audio" => Ok(PipelineKind::Audio),
            other => Err(FusionError::Configuration(format!(
                "Unknown pipeline '{}' (expected image, video or audio)",
                other
            ))),
        }
    }
}

/// Modality → weight mapping for one pipeline
///
/// Invariants (checked by [`WeightTable::new`]):
/// - at least one modality, no empty modality names
/// - every weight finite and within [0, 1]
/// - weights sum to 1.0 (± [`WEIGHT_SUM_TOLERANCE`])
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightTable {
    pipeline: PipelineKind,
    weights: BTreeMap<String, f64>,
}

impl WeightTable {
    /// Build and validate a weight table
    pub fn new<I, K>(pipeline: PipelineKind, entries: I) -> Result<Self, FusionError>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        let mut weights = BTreeMap::new();
        for (modality, weight) in entries {
            let modality = modality.into();
            if modality.trim().is_empty() {
                return Err(FusionError::Configuration(format!(
                    "{} weight table has an empty modality name",
                    pipeline
                )));
            }
            if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
                return Err(FusionError::Configuration(format!(
                    "{} weight for '{}' must be within [0, 1], got {}",
                    pipeline, modality, weight
                )));
            }
            if weights.insert(modality.clone(), weight).is_some() {
                return Err(FusionError::Configuration(format!(
                    "{} weight table lists '{}' twice",
                    pipeline, modality
                )));
            }
        }

        if weights.is_empty() {
            return Err(FusionError::Configuration(format!(
                "{} weight table is empty",
                pipeline
            )));
        }

        let sum: f64 = weights.values().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(FusionError::Configuration(format!(
                "{} weights must sum to 1.0, got {:.6}",
                pipeline, sum
            )));
        }

        Ok(Self { pipeline, weights })
    }

    /// Built-in table for a pipeline (the compiled configuration defaults)
    pub fn defaults_for(pipeline: PipelineKind) -> Self {
        let config = WeightsConfig::default();
        let weights = match pipeline {
            PipelineKind::Image => config.image,
            PipelineKind::Video => config.video,
            PipelineKind::Audio => config.audio,
        };
        Self { pipeline, weights }
    }

    pub fn pipeline(&self) -> PipelineKind {
        self.pipeline
    }

    /// Configured weight for a modality, `None` if the modality is unknown
    pub fn weight(&self, modality: &str) -> Option<f64> {
        self.weights.get(modality).copied()
    }

    pub fn contains(&self, modality: &str) -> bool {
        self.weights.contains_key(modality)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Iterate (modality, weight) in modality order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.weights.iter().map(|(m, w)| (m.as_str(), *w))
    }

    /// Table with `modality` removed and the remaining weights rescaled to sum to 1.0
    ///
    /// Returns `None` if the modality is unknown or the remainder carries no weight.
    pub fn without(&self, modality: &str) -> Option<Self> {
        let removed = self.weights.get(modality)?;
        let remaining = 1.0 - removed;
        if remaining <= 0.0 || self.weights.len() < 2 {
            return None;
        }

        let weights = self
            .weights
            .iter()
            .filter(|(m, _)| m.as_str() != modality)
            .map(|(m, w)| (m.clone(), w / remaining))
            .collect();

        Some(Self {
            pipeline: self.pipeline,
            weights,
        })
    }
}

/// The full set of weight tables, one per pipeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightTables {
    pub image: WeightTable,
    pub video: WeightTable,
    pub audio: WeightTable,
}

impl WeightTables {
    /// Validate the configured tables
    pub fn from_config(config: &WeightsConfig) -> Result<Self, FusionError> {
        Ok(Self {
            image: WeightTable::new(PipelineKind::Image, config.image.clone())?,
            video: WeightTable::new(PipelineKind::Video, config.video.clone())?,
            audio: WeightTable::new(PipelineKind::Audio, config.audio.clone())?,
        })
    }

    pub fn get(&self, pipeline: PipelineKind) -> &WeightTable {
        match pipeline {
            PipelineKind::Image => &self.image,
            PipelineKind::Video => &self.video,
            PipelineKind::Audio => &self.audio,
        }
    }
}

impl Default for WeightTables {
    fn default() -> Self {
        Self {
            image: WeightTable::defaults_for(PipelineKind::Image),
            video: WeightTable::defaults_for(PipelineKind::Video),
            audio: WeightTable::defaults_for(PipelineKind::Audio),
        }
    }
}
