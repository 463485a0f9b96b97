// Weighted Fusion Engine - renormalized weighted averaging
//
// aggregate = Σ(score × w) / Σw over the modalities actually present.
// A missing detector is excluded and the remaining weights scale up
// proportionally, so the aggregate stays within [0, 100] for any subset.

use super::policy::classify;
use super::{FusionError, FusionResult, RiskScore, Signal, WeightTable};
use std::collections::BTreeMap;
use tracing::debug;

/// Fuse a signal set into one aggregate decision
///
/// # Arguments
/// * `signals` - At most one signal per modality; unavailable signals are ignored
/// * `weights` - Weight table of the pipeline the signals belong to
///
/// # Errors
/// * `NoSignals` - no available signal in the set
/// * `UnknownModality` - a signal's modality is not in `weights`
/// * `DuplicateModality` - two signals share a modality
/// * `InvalidScore` - a risk score is NaN or infinite
pub fn fuse(signals: &[Signal], weights: &WeightTable) -> Result<FusionResult, FusionError> {
    let present: Vec<&Signal> = signals.iter().filter(|s| s.available).collect();

    if present.is_empty() {
        return Err(FusionError::NoSignals);
    }

    let mut contributing: BTreeMap<String, RiskScore> = BTreeMap::new();
    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;

    for signal in present {
        if !signal.risk_score.is_finite() {
            return Err(FusionError::InvalidScore(signal.modality.clone()));
        }

        let weight = weights
            .weight(&signal.modality)
            .ok_or_else(|| FusionError::UnknownModality {
                modality: signal.modality.clone(),
                pipeline: weights.pipeline(),
            })?;

        if contributing
            .insert(signal.modality.clone(), signal.risk_score)
            .is_some()
        {
            return Err(FusionError::DuplicateModality(signal.modality.clone()));
        }

        weighted_sum += signal.risk_score * weight;
        total_weight += weight;
    }

    let aggregate = if total_weight > 0.0 {
        weighted_sum / total_weight
    } else {
        // No configured weight applies (all present modalities weigh 0)
        contributing.values().sum::<f64>() / contributing.len() as f64
    };
    let aggregate_score = aggregate.clamp(0.0, 100.0);

    let (classification, confidence) = classify(aggregate_score, contributing.len());

    debug!(
        pipeline = %weights.pipeline(),
        signals = contributing.len(),
        total_weight,
        aggregate_score,
        "Fused signal set"
    );

    Ok(FusionResult {
        aggregate_score,
        classification,
        confidence,
        contributing_signals: contributing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::{
        Classification, ConfidenceTier, PipelineKind, MODALITY_LOCAL_ENSEMBLE,
        MODALITY_REMOTE_API, MODALITY_TRANSFORMER,
    };

    fn image_table() -> WeightTable {
        WeightTable::defaults_for(PipelineKind::Image)
    }

    #[test]
    fn test_full_ensemble() {
        let signals = vec![
            Signal::new(MODALITY_REMOTE_API, 62.0),
            Signal::new(MODALITY_TRANSFORMER, 71.0),
            Signal::new(MODALITY_LOCAL_ENSEMBLE, 58.0),
        ];

        let result = fuse(&signals, &image_table()).unwrap();

        assert!((result.aggregate_score - 63.75).abs() < 1e-9);
        assert_eq!(result.classification, Classification::Suspicious);
        assert_eq!(result.confidence, ConfidenceTier::High);
        assert_eq!(result.num_signals(), 3);
    }

    #[test]
    fn test_single_signal_renormalizes_to_its_score() {
        let signals = vec![Signal::new(MODALITY_TRANSFORMER, 80.0)];

        let result = fuse(&signals, &image_table()).unwrap();

        assert!((result.aggregate_score - 80.0).abs() < 1e-9);
        assert_eq!(result.classification, Classification::Manipulated);
        assert_eq!(result.confidence, ConfidenceTier::Medium);
    }

    #[test]
    fn test_empty_set_is_no_signals() {
        assert_eq!(fuse(&[], &image_table()), Err(FusionError::NoSignals));
    }

    #[test]
    fn test_unavailable_signals_are_excluded() {
        let signals = vec![
            Signal::unavailable(MODALITY_REMOTE_API),
            Signal::new(MODALITY_LOCAL_ENSEMBLE, 20.0),
        ];

        let result = fuse(&signals, &image_table()).unwrap();
        assert!((result.aggregate_score - 20.0).abs() < 1e-9);
        assert!(!result.contributing_signals.contains_key(MODALITY_REMOTE_API));
        assert_eq!(result.confidence, ConfidenceTier::Medium);

        let only_unavailable = vec![Signal::unavailable(MODALITY_REMOTE_API)];
        assert_eq!(fuse(&only_unavailable, &image_table()), Err(FusionError::NoSignals));
    }

    #[test]
    fn test_unknown_modality_is_rejected() {
        let signals = vec![
            Signal::new(MODALITY_TRANSFORMER, 50.0),
            Signal::new("local_temporal", 90.0),
        ];

        match fuse(&signals, &image_table()) {
            Err(FusionError::UnknownModality { modality, pipeline }) => {
                assert_eq!(modality, "local_temporal");
                assert_eq!(pipeline, PipelineKind::Image);
            }
            other => panic!("expected UnknownModality, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_modality_is_rejected() {
        let signals = vec![
            Signal::new(MODALITY_TRANSFORMER, 50.0),
            Signal::new(MODALITY_TRANSFORMER, 10.0),
        ];
        assert_eq!(
            fuse(&signals, &image_table()),
            Err(FusionError::DuplicateModality(MODALITY_TRANSFORMER.to_string()))
        );
    }

    #[test]
    fn test_non_finite_score_is_rejected() {
        let mut signal = Signal::new(MODALITY_TRANSFORMER, 0.0);
        signal.risk_score = f64::NAN;
        assert_eq!(
            fuse(&[signal], &image_table()),
            Err(FusionError::InvalidScore(MODALITY_TRANSFORMER.to_string()))
        );
    }

    #[test]
    fn test_zero_weights_fall_back_to_mean() {
        let table =
            WeightTable::new(PipelineKind::Image, [("a", 0.0), ("b", 0.0), ("c", 1.0)]).unwrap();
        let signals = vec![Signal::new("a", 20.0), Signal::new("b", 40.0)];

        let result = fuse(&signals, &table).unwrap();
        assert!((result.aggregate_score - 30.0).abs() < 1e-9);
        assert_eq!(result.confidence, ConfidenceTier::High);
    }

    #[test]
    fn test_aggregate_within_member_bounds() {
        let table = image_table();
        let scores = [0.0, 7.5, 33.0, 50.0, 81.25, 100.0];

        for a in scores {
            for b in scores {
                for c in scores {
                    let signals = vec![
                        Signal::new(MODALITY_REMOTE_API, a),
                        Signal::new(MODALITY_TRANSFORMER, b),
                        Signal::new(MODALITY_LOCAL_ENSEMBLE, c),
                    ];
                    let result = fuse(&signals, &table).unwrap();
                    let lo = a.min(b).min(c);
                    let hi = a.max(b).max(c);
                    assert!(
                        result.aggregate_score >= lo - 1e-9 && result.aggregate_score <= hi + 1e-9,
                        "{} outside [{}, {}]",
                        result.aggregate_score,
                        lo,
                        hi
                    );
                }
            }
        }
    }

    #[test]
    fn test_missing_signal_matches_table_without_modality() {
        let table = image_table();
        let partial = vec![
            Signal::new(MODALITY_TRANSFORMER, 71.0),
            Signal::new(MODALITY_LOCAL_ENSEMBLE, 12.0),
        ];

        let with_gap = fuse(&partial, &table).unwrap();
        let reduced = table.without(MODALITY_REMOTE_API).unwrap();
        let never_configured = fuse(&partial, &reduced).unwrap();

        assert!((with_gap.aggregate_score - never_configured.aggregate_score).abs() < 1e-9);
        assert_eq!(with_gap.classification, never_configured.classification);
    }
}
