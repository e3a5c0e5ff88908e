//! Tunable policy for the forensic signal engine.
//!
//! Every weight and threshold the detector bank uses lives here instead of
//! being scattered through the scoring code. [`ForensicConfig::default`]
//! reproduces the reference constants exactly; overriding any of them
//! changes the effective sensitivity of every downstream score, so
//! overrides should be re-validated against known cases before use.

use chrono::{Datelike as _, Duration, NaiveDate};
use enrol_signal_records_models::Granularity;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Tolerance for the composite weight-sum check.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Errors produced by [`ForensicConfig::validate`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Composite weights do not sum to 1.0.
    #[error("composite weights must sum to 1.0, got {sum}")]
    WeightSum {
        /// The actual sum.
        sum: f64,
    },

    /// A weight or score is negative or not finite.
    #[error("{field} must be a finite non-negative number, got {value}")]
    InvalidValue {
        /// Name of the offending field.
        field: &'static str,
        /// The offending value.
        value: f64,
    },

    /// Epsilon must be strictly positive.
    #[error("epsilon must be positive, got {0}")]
    Epsilon(f64),

    /// Rolling windows must be non-zero and ordered short < medium < long.
    #[error("rolling windows must satisfy 0 < short < medium < long, got {short}/{medium}/{long}")]
    Windows {
        /// Short window in days.
        short: u32,
        /// Medium window in days.
        medium: u32,
        /// Long window in days.
        long: u32,
    },

    /// Growth lags must be non-zero.
    #[error("growth lags must be non-zero")]
    Lags,

    /// Rollup bucket length must be non-zero.
    #[error("rollup interval length must be non-zero")]
    RollupInterval,

    /// Month buckets must tile the calendar year.
    #[error("rollup month length must divide 12 (1, 2, 3, 4, 6 or 12), got {0}")]
    RollupMonths(u32),

    /// Risk tier boundaries must be ascending within `[0, 100]`.
    #[error("risk tier thresholds must satisfy 0 <= elevated < high < critical <= 100")]
    Tiers,
}

/// Whether growth lags count rows or calendar days.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LagMode {
    /// N rows earlier within the same location group. This diverges from
    /// the calendar windows whenever a location has reporting gaps.
    #[default]
    Rows,
    /// The row dated exactly N days earlier, if the location reported then.
    Days,
}

/// Rolling baseline windows and percentile proxies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollingConfig {
    /// Short window (local volatility), in days.
    pub short_window_days: u32,
    /// Medium window (baseline mean), in days.
    pub medium_window_days: u32,
    /// Long window (percentile proxies), in days.
    pub long_window_days: u32,
    /// Normal quantile used for the p75 proxy.
    pub p75_z: f64,
    /// Normal quantile used for the p90 proxy.
    pub p90_z: f64,
    /// Normal quantile used for the p99 proxy.
    pub p99_z: f64,
    /// Lag for the short growth rate.
    pub short_lag: u32,
    /// Lag for the long growth rate.
    pub long_lag: u32,
    /// Lag semantics.
    pub lag_mode: LagMode,
}

impl Default for RollingConfig {
    fn default() -> Self {
        Self {
            short_window_days: 7,
            medium_window_days: 30,
            long_window_days: 90,
            p75_z: 0.675,
            p90_z: 1.282,
            p99_z: 2.326,
            short_lag: 7,
            long_lag: 30,
            lag_mode: LagMode::Rows,
        }
    }
}

/// Algorithm 1: temporal deviation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalConfig {
    /// Robust z-score scale factor.
    pub robust_z_scale: f64,
    /// The robust z-score is divided by this before clipping to 1.
    pub robust_z_divisor: f64,
    /// p95 is approximated as `p90 * p95_factor`.
    pub p95_factor: f64,
    /// Step score above p90.
    pub p90_score: f64,
    /// Step score above the p95 proxy.
    pub p95_score: f64,
    /// Step score above p99.
    pub p99_score: f64,
    /// Z threshold for the Grubbs-style outlier flag.
    pub grubbs_threshold: f64,
    /// Weight of the robust z component.
    pub robust_weight: f64,
    /// Weight of the percentile step component.
    pub percentile_weight: f64,
    /// Weight of the Grubbs flag.
    pub grubbs_weight: f64,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            robust_z_scale: 0.6745,
            robust_z_divisor: 4.0,
            p95_factor: 1.2,
            p90_score: 0.5,
            p95_score: 0.8,
            p99_score: 1.0,
            grubbs_threshold: 3.5,
            robust_weight: 0.4,
            percentile_weight: 0.4,
            grubbs_weight: 0.2,
        }
    }
}

/// Algorithm 2: spatial anomaly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    /// `|spatial_z|` is divided by this before clipping to 1.
    pub z_divisor: f64,
    /// District/state ratio is divided by this for the clustering factor.
    pub clustering_divisor: f64,
    /// Weight of the spatial z component.
    pub z_weight: f64,
    /// Weight of the district/state ratio deviation.
    pub ratio_weight: f64,
    /// Weight of the clustering factor.
    pub clustering_weight: f64,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            z_divisor: 3.0,
            clustering_divisor: 2.0,
            z_weight: 0.5,
            ratio_weight: 0.3,
            clustering_weight: 0.2,
        }
    }
}

/// Algorithm 3: forecast violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Half-width of the band in short-window standard deviations.
    pub band_z: f64,
    /// Overshoot is measured relative to `upper * overshoot_fraction`.
    pub overshoot_fraction: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            band_z: 1.96,
            overshoot_fraction: 0.5,
        }
    }
}

/// Algorithm 4: cross-signal integrity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossSignalConfig {
    /// Only evaluated when adult enrolment exceeds this.
    pub min_adult_enrollment: u64,
    /// Update/enrolment ratio below which the low-ratio score applies.
    pub low_ratio: f64,
    /// Score for ratios below `low_ratio`.
    pub low_ratio_score: f64,
    /// Update/enrolment ratio below which the medium-ratio score applies.
    pub medium_ratio: f64,
    /// Score for ratios in `[low_ratio, medium_ratio)`.
    pub medium_ratio_score: f64,
}

impl Default for CrossSignalConfig {
    fn default() -> Self {
        Self {
            min_adult_enrollment: 10,
            low_ratio: 0.1,
            low_ratio_score: 0.8,
            medium_ratio: 0.3,
            medium_ratio_score: 0.4,
        }
    }
}

/// Algorithm 5: demographic ratio anomaly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemographicConfig {
    /// Only evaluated when total enrolment exceeds this.
    pub min_total_enrollment: u64,
    /// Adult ratio above which `extreme_score` applies.
    pub extreme_ratio: f64,
    /// Score above `extreme_ratio`.
    pub extreme_score: f64,
    /// Adult ratio above which `high_score` applies.
    pub high_ratio: f64,
    /// Score above `high_ratio`.
    pub high_score: f64,
    /// Adult ratio above which `elevated_score` applies.
    pub elevated_ratio: f64,
    /// Score above `elevated_ratio`.
    pub elevated_score: f64,
}

impl Default for DemographicConfig {
    fn default() -> Self {
        Self {
            min_total_enrollment: 20,
            extreme_ratio: 0.95,
            extreme_score: 1.0,
            high_ratio: 0.8,
            high_score: 0.7,
            elevated_ratio: 0.6,
            elevated_score: 0.3,
        }
    }
}

/// Weights of the five detectors in the composite risk score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeWeights {
    /// Algorithm 1.
    pub temporal: f64,
    /// Algorithm 2.
    pub spatial: f64,
    /// Algorithm 3.
    pub forecast: f64,
    /// Algorithm 4.
    pub cross_signal: f64,
    /// Algorithm 5.
    pub demographic: f64,
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            temporal: 0.25,
            spatial: 0.20,
            forecast: 0.15,
            cross_signal: 0.20,
            demographic: 0.20,
        }
    }
}

impl CompositeWeights {
    /// Weights in detector order.
    #[must_use]
    pub const fn as_array(&self) -> [f64; 5] {
        [
            self.temporal,
            self.spatial,
            self.forecast,
            self.cross_signal,
            self.demographic,
        ]
    }

    /// Sum of all five weights.
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.as_array().iter().sum()
    }
}

/// Length of a reporting bucket for the temporal rollup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "unit", content = "length", rename_all = "snake_case")]
pub enum RollupInterval {
    /// Calendar-aligned blocks of N months counted from January. N must
    /// divide 12 so that every year starts a new block.
    Months(u32),
    /// Blocks of N days counted from 1970-01-01.
    Days(u32),
}

impl Default for RollupInterval {
    fn default() -> Self {
        Self::Months(2)
    }
}

impl RollupInterval {
    /// Returns the first day of the bucket containing `date`.
    #[must_use]
    pub fn bucket_start(self, date: NaiveDate) -> NaiveDate {
        match self {
            Self::Months(n) => {
                let n = i32::try_from(n.max(1)).unwrap_or(i32::MAX);
                #[allow(clippy::cast_possible_wrap)]
                let index = date.year() * 12 + date.month0() as i32;
                let start = index - index.rem_euclid(n);
                #[allow(clippy::cast_sign_loss)]
                let month = start.rem_euclid(12) as u32 + 1;
                NaiveDate::from_ymd_opt(start.div_euclid(12), month, 1).unwrap_or(date)
            }
            Self::Days(n) => {
                let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN);
                let offset = (date - epoch).num_days();
                let n = i64::from(n.max(1));
                epoch + Duration::days(offset - offset.rem_euclid(n))
            }
        }
    }

    const fn length(self) -> u32 {
        match self {
            Self::Months(n) | Self::Days(n) => n,
        }
    }
}

/// Boundaries between [`crate::RiskTier`]s on the 0-100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskTierThresholds {
    /// Lower bound of `Elevated`.
    pub elevated: f64,
    /// Lower bound of `High`.
    pub high: f64,
    /// Lower bound of `Critical`.
    pub critical: f64,
}

impl Default for RiskTierThresholds {
    fn default() -> Self {
        Self {
            elevated: 25.0,
            high: 50.0,
            critical: 75.0,
        }
    }
}

/// Complete policy for one forensic run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForensicConfig {
    /// Added to every denominator.
    pub epsilon: f64,
    /// Forces a grain instead of resolving it from the inputs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub granularity: Option<Granularity>,
    /// Rolling baselines.
    pub rolling: RollingConfig,
    /// Algorithm 1.
    pub temporal: TemporalConfig,
    /// Algorithm 2.
    pub spatial: SpatialConfig,
    /// Algorithm 3.
    pub forecast: ForecastConfig,
    /// Algorithm 4.
    pub cross_signal: CrossSignalConfig,
    /// Algorithm 5.
    pub demographic: DemographicConfig,
    /// Composite weights.
    pub weights: CompositeWeights,
    /// Rollup bucket length.
    pub rollup: RollupInterval,
    /// Risk tier boundaries.
    pub tiers: RiskTierThresholds,
}

impl Default for ForensicConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-6,
            granularity: None,
            rolling: RollingConfig::default(),
            temporal: TemporalConfig::default(),
            spatial: SpatialConfig::default(),
            forecast: ForecastConfig::default(),
            cross_signal: CrossSignalConfig::default(),
            demographic: DemographicConfig::default(),
            weights: CompositeWeights::default(),
            rollup: RollupInterval::default(),
            tiers: RiskTierThresholds::default(),
        }
    }
}

impl ForensicConfig {
    /// Checks the structural invariants of the policy.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(ConfigError::Epsilon(self.epsilon));
        }

        let r = &self.rolling;
        if r.short_window_days == 0
            || r.short_window_days >= r.medium_window_days
            || r.medium_window_days >= r.long_window_days
        {
            return Err(ConfigError::Windows {
                short: r.short_window_days,
                medium: r.medium_window_days,
                long: r.long_window_days,
            });
        }
        if r.short_lag == 0 || r.long_lag == 0 {
            return Err(ConfigError::Lags);
        }

        let named = [
            ("weights.temporal", self.weights.temporal),
            ("weights.spatial", self.weights.spatial),
            ("weights.forecast", self.weights.forecast),
            ("weights.cross_signal", self.weights.cross_signal),
            ("weights.demographic", self.weights.demographic),
            ("temporal.robust_weight", self.temporal.robust_weight),
            ("temporal.percentile_weight", self.temporal.percentile_weight),
            ("temporal.grubbs_weight", self.temporal.grubbs_weight),
            ("temporal.robust_z_divisor", self.temporal.robust_z_divisor),
            ("spatial.z_divisor", self.spatial.z_divisor),
            ("spatial.clustering_divisor", self.spatial.clustering_divisor),
            ("spatial.z_weight", self.spatial.z_weight),
            ("spatial.ratio_weight", self.spatial.ratio_weight),
            ("spatial.clustering_weight", self.spatial.clustering_weight),
            ("forecast.band_z", self.forecast.band_z),
            ("forecast.overshoot_fraction", self.forecast.overshoot_fraction),
        ];
        for (field, value) in named {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::InvalidValue { field, value });
            }
        }

        let sum = self.weights.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::WeightSum { sum });
        }

        if self.rollup.length() == 0 {
            return Err(ConfigError::RollupInterval);
        }
        if let RollupInterval::Months(n) = self.rollup
            && 12 % n != 0
        {
            return Err(ConfigError::RollupMonths(n));
        }

        let t = &self.tiers;
        if !(0.0 <= t.elevated && t.elevated < t.high && t.high < t.critical && t.critical <= 100.0)
        {
            return Err(ConfigError::Tiers);
        }

        Ok(())
    }
}
