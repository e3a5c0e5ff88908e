//! Headline statistics over a set of scored rows.

use enrol_signal_forensic_models::{DetectorScores, RiskTier, RiskTierThresholds};
use serde::{Deserialize, Serialize};

use crate::RiskRow;

/// Number of rows per [`RiskTier`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierCounts {
    /// Rows below the elevated threshold.
    pub low: u64,
    /// Elevated rows.
    pub elevated: u64,
    /// High rows.
    pub high: u64,
    /// Critical rows.
    pub critical: u64,
}

impl TierCounts {
    const fn add(&mut self, tier: RiskTier) {
        match tier {
            RiskTier::Low => self.low += 1,
            RiskTier::Elevated => self.elevated += 1,
            RiskTier::High => self.high += 1,
            RiskTier::Critical => self.critical += 1,
        }
    }

    /// Count for one tier.
    #[must_use]
    pub const fn get(&self, tier: RiskTier) -> u64 {
        match tier {
            RiskTier::Low => self.low,
            RiskTier::Elevated => self.elevated,
            RiskTier::High => self.high,
            RiskTier::Critical => self.critical,
        }
    }
}

/// Average and peak risk over a view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalSummary {
    /// Rows summarized.
    pub row_count: u64,
    /// Distinct locations among them.
    pub location_count: u64,
    /// Mean `risk_score_norm`, 0 for an empty view.
    pub average_risk: f64,
    /// Maximum `risk_score_norm`, 0 for an empty view.
    pub max_risk: f64,
    /// Rows per tier.
    pub tiers: TierCounts,
    /// Mean of each detector score, i.e. how much each detector contributes
    /// across the view. All zero for an empty view.
    pub detector_means: DetectorScores,
}

/// Summarizes `rows`.
#[must_use]
pub fn summarize<R: RiskRow>(rows: &[R], thresholds: &RiskTierThresholds) -> SignalSummary {
    let mut tiers = TierCounts::default();
    let mut sum = 0.0;
    let mut max_risk: f64 = 0.0;
    let mut score_sums = [0.0; 5];

    for row in rows {
        let risk = row.risk_score_norm();
        sum += risk;
        max_risk = max_risk.max(risk);
        tiers.add(thresholds.classify(risk));
        for (acc, score) in score_sums.iter_mut().zip(row.scores().as_array()) {
            *acc += score;
        }
    }

    let mut locations: Vec<_> = rows.iter().map(RiskRow::location).collect();
    locations.sort_unstable();
    locations.dedup();

    let row_count = rows.len() as u64;
    #[allow(clippy::cast_precision_loss)]
    let mean = |total: f64| {
        if rows.is_empty() {
            0.0
        } else {
            total / row_count as f64
        }
    };
    let [algo1, algo2, algo3, algo4, algo5] = score_sums.map(mean);

    SignalSummary {
        row_count,
        location_count: locations.len() as u64,
        average_risk: mean(sum),
        max_risk,
        tiers,
        detector_means: DetectorScores {
            algo1_score: algo1,
            algo2_score: algo2,
            algo3_score: algo3,
            algo4_score: algo4,
            algo5_score: algo5,
        },
    }
}
