#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Forensic signal types: baselines, detector scores, composite risk and
//! the temporal rollup view.
//!
//! Scores flag statistical deviation for administrative review only. They
//! carry no inference about any individual.

pub mod config;

use chrono::NaiveDate;
use enrol_signal_records_models::{LocationKey, LocationPeriodRecord};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use config::{ConfigError, ForensicConfig, LagMode, RiskTierThresholds, RollupInterval};

/// Causal rolling statistics of `adult_enrollment` for one record.
///
/// Every field is computed from rows of the same location dated at or
/// before the record's own date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollingBaseline {
    /// Mean over the short window.
    pub adult_7d_mean: f64,
    /// Sample standard deviation over the short window (0 with < 2 points).
    pub adult_7d_std: f64,
    /// Mean over the medium window.
    pub adult_30d_mean: f64,
    /// Mean over the long window.
    pub adult_90d_mean: f64,
    /// Sample standard deviation over the long window.
    pub adult_90d_std: f64,
    /// Normal-approximation 75th percentile over the long window.
    pub adult_90d_p75: f64,
    /// Normal-approximation 90th percentile over the long window.
    pub adult_90d_p90: f64,
    /// Normal-approximation 99th percentile over the long window.
    pub adult_90d_p99: f64,
    /// Adult enrolment one short lag earlier, if any.
    pub prev_7d: Option<u64>,
    /// Adult enrolment one long lag earlier, if any.
    pub prev_30d: Option<u64>,
    /// Growth over the short lag; 0 when no lagged value exists.
    pub growth_7d_pct: f64,
    /// Growth over the long lag; 0 when no lagged value exists.
    pub growth_30d_pct: f64,
}

/// Same-day peer statistics of `adult_enrollment` for one record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpatialBaseline {
    /// Median across records sharing (date, state, district).
    pub district_median_adult: f64,
    /// Sample standard deviation across the same group.
    pub district_std_adult: f64,
    /// Median across records sharing (date, state).
    pub state_median_adult: f64,
    /// `(adult - district_median) / (district_std + epsilon)`.
    pub spatial_z_score: f64,
}

/// The five detectors of the forensic bank.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DetectorKind {
    /// Algorithm 1.
    TemporalDeviation,
    /// Algorithm 2.
    SpatialAnomaly,
    /// Algorithm 3.
    ForecastViolation,
    /// Algorithm 4.
    CrossSignalIntegrity,
    /// Algorithm 5.
    DemographicRatio,
}

impl DetectorKind {
    /// All detectors in composite order.
    pub const ALL: [Self; 5] = [
        Self::TemporalDeviation,
        Self::SpatialAnomaly,
        Self::ForecastViolation,
        Self::CrossSignalIntegrity,
        Self::DemographicRatio,
    ];

    /// Short human-readable name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::TemporalDeviation => "Temporal deviation",
            Self::SpatialAnomaly => "Spatial anomaly",
            Self::ForecastViolation => "Forecast band violation",
            Self::CrossSignalIntegrity => "Cross-signal integrity",
            Self::DemographicRatio => "Demographic ratio",
        }
    }
}

/// Per-record detector outputs, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorScores {
    /// Temporal deviation.
    pub algo1_score: f64,
    /// Spatial anomaly.
    pub algo2_score: f64,
    /// Forecast violation.
    pub algo3_score: f64,
    /// Cross-signal integrity.
    pub algo4_score: f64,
    /// Demographic ratio anomaly.
    pub algo5_score: f64,
}

impl DetectorScores {
    /// Scores in detector order.
    #[must_use]
    pub const fn as_array(&self) -> [f64; 5] {
        [
            self.algo1_score,
            self.algo2_score,
            self.algo3_score,
            self.algo4_score,
            self.algo5_score,
        ]
    }

    /// Score of a single detector.
    #[must_use]
    pub const fn get(&self, kind: DetectorKind) -> f64 {
        match kind {
            DetectorKind::TemporalDeviation => self.algo1_score,
            DetectorKind::SpatialAnomaly => self.algo2_score,
            DetectorKind::ForecastViolation => self.algo3_score,
            DetectorKind::CrossSignalIntegrity => self.algo4_score,
            DetectorKind::DemographicRatio => self.algo5_score,
        }
    }

    /// Component-wise maximum.
    #[must_use]
    pub fn max(&self, other: &Self) -> Self {
        Self {
            algo1_score: self.algo1_score.max(other.algo1_score),
            algo2_score: self.algo2_score.max(other.algo2_score),
            algo3_score: self.algo3_score.max(other.algo3_score),
            algo4_score: self.algo4_score.max(other.algo4_score),
            algo5_score: self.algo5_score.max(other.algo5_score),
        }
    }

    /// The detector with the highest score. Ties go to the earlier
    /// detector; `None` when every score is zero.
    #[must_use]
    pub fn dominant(&self) -> Option<(DetectorKind, f64)> {
        DetectorKind::ALL
            .iter()
            .map(|&kind| (kind, self.get(kind)))
            .filter(|(_, score)| *score > 0.0)
            .fold(None, |best, (kind, score)| match best {
                Some((_, s)) if s >= score => best,
                _ => Some((kind, score)),
            })
    }
}

/// Weighted blend of the detector scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeRisk {
    /// Weighted sum, nominally within `[0, 1]`.
    pub risk_score: f64,
    /// `clip(risk_score * 100, 0, 100)`.
    pub risk_score_norm: f64,
}

/// A fully scored location-period record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredRecord {
    /// Merged counts and derived ratios.
    pub record: LocationPeriodRecord,
    /// Causal rolling statistics.
    pub rolling: RollingBaseline,
    /// Same-day peer statistics.
    pub spatial: SpatialBaseline,
    /// Detector outputs.
    pub scores: DetectorScores,
    /// Composite risk.
    pub risk: CompositeRisk,
}

/// One bucket x location row of the temporal rollup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollupRow {
    /// First day of the bucket.
    pub period_start: NaiveDate,
    /// Location.
    pub location: LocationKey,
    /// Records that fell in this bucket.
    pub record_count: u64,
    /// Summed adult enrolment.
    pub adult_enrollment: u64,
    /// Summed total enrolment.
    pub total_enrollment: u64,
    /// Summed biometric updates.
    pub biometric_update_count: u64,
    /// Summed demographic updates.
    pub demographic_update_count: u64,
    /// Mean of `risk_score_norm` across the bucket.
    pub risk_score_norm: f64,
    /// Per-detector maximum across the bucket.
    pub scores: DetectorScores,
}

/// Coarse band of `risk_score_norm`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTier {
    /// Below the elevated threshold.
    Low,
    /// Worth a look.
    Elevated,
    /// Review recommended.
    High,
    /// Prioritize for review.
    Critical,
}

impl RiskTierThresholds {
    /// Classifies a 0-100 risk value.
    #[must_use]
    pub fn classify(&self, risk_score_norm: f64) -> RiskTier {
        if risk_score_norm >= self.critical {
            RiskTier::Critical
        } else if risk_score_norm >= self.high {
            RiskTier::High
        } else if risk_score_norm >= self.elevated {
            RiskTier::Elevated
        } else {
            RiskTier::Low
        }
    }
}
