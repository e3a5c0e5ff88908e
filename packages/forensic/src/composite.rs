//! Composite risk scoring.

use enrol_signal_forensic_models::config::CompositeWeights;
use enrol_signal_forensic_models::{CompositeRisk, DetectorScores};

/// Blends the five detector scores into one risk value.
///
/// NaN sub-scores count as 0 so that one bad input cannot poison the sum.
#[must_use]
pub fn composite_risk(scores: &DetectorScores, weights: &CompositeWeights) -> CompositeRisk {
    let risk_score: f64 = scores
        .as_array()
        .iter()
        .zip(weights.as_array())
        .map(|(&score, weight)| if score.is_nan() { 0.0 } else { score * weight })
        .sum();

    CompositeRisk {
        risk_score,
        risk_score_norm: (risk_score * 100.0).clamp(0.0, 100.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_ones_scores_one_hundred() {
        let scores = DetectorScores {
            algo1_score: 1.0,
            algo2_score: 1.0,
            algo3_score: 1.0,
            algo4_score: 1.0,
            algo5_score: 1.0,
        };
        let risk = composite_risk(&scores, &CompositeWeights::default());
        assert!((risk.risk_score - 1.0).abs() < 1e-9);
        assert!((risk.risk_score_norm - 100.0).abs() < 1e-7);
    }

    #[test]
    fn weights_each_detector() {
        let scores = DetectorScores {
            algo4_score: 0.8,
            algo5_score: 1.0,
            ..DetectorScores::default()
        };
        let risk = composite_risk(&scores, &CompositeWeights::default());
        assert!((risk.risk_score - 0.36).abs() < 1e-12);
        assert!((risk.risk_score_norm - 36.0).abs() < 1e-9);
    }

    #[test]
    fn nan_counts_as_zero() {
        let scores = DetectorScores {
            algo1_score: f64::NAN,
            algo3_score: 1.0,
            ..DetectorScores::default()
        };
        let risk = composite_risk(&scores, &CompositeWeights::default());
        assert!((risk.risk_score - 0.15).abs() < 1e-12);
    }

    #[test]
    fn norm_is_clipped() {
        let weights = CompositeWeights {
            temporal: 2.0,
            ..CompositeWeights::default()
        };
        let scores = DetectorScores {
            algo1_score: 1.0,
            ..DetectorScores::default()
        };
        let risk = composite_risk(&scores, &weights);
        assert!((risk.risk_score_norm - 100.0).abs() < f64::EPSILON);
    }
}
