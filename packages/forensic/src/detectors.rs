//! The five-algorithm detector bank.
//!
//! Every detector is a pure function of one record and the baselines
//! already attached to it, returns a score in `[0, 1]`, and defaults to 0
//! when its preconditions are not met. Records with no activity in any
//! count score 0 on every detector.

use enrol_signal_forensic_models::config::{
    CrossSignalConfig, DemographicConfig, ForecastConfig, SpatialConfig, TemporalConfig,
};
use enrol_signal_forensic_models::{DetectorScores, ForensicConfig, RollingBaseline, SpatialBaseline};
use enrol_signal_records_models::LocationPeriodRecord;

use crate::BaselinedRecord;

/// Clamps to `[0, 1]`, mapping NaN to 0.
fn unit(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Algorithm 1: deviation from the location's own recent history.
///
/// Blends a robust z-score against the medium-window mean (scaled by the
/// short-window volatility), a percentile step function over the
/// long-window normal proxies, and a Grubbs-style outlier flag.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn temporal_deviation(
    record: &LocationPeriodRecord,
    rolling: &RollingBaseline,
    config: &TemporalConfig,
    epsilon: f64,
) -> f64 {
    let x = record.adult_enrollment as f64;
    let deviation = x - rolling.adult_30d_mean;
    let volatility = rolling.adult_7d_std + epsilon;

    let robust_z = config.robust_z_scale * deviation / volatility;
    let robust = (robust_z.abs() / config.robust_z_divisor).min(1.0);

    let p90 = rolling.adult_90d_p90;
    let p95 = p90 * config.p95_factor;
    let p99 = rolling.adult_90d_p99;
    let mut percentile = 0.0;
    if x > p90 {
        percentile = config.p90_score;
    }
    if x > p95 {
        percentile = config.p95_score;
    }
    if x > p99 {
        percentile = config.p99_score;
    }

    let grubbs = if deviation.abs() / volatility > config.grubbs_threshold {
        1.0
    } else {
        0.0
    };

    unit(
        config.robust_weight * robust
            + config.percentile_weight * percentile
            + config.grubbs_weight * grubbs,
    )
}

/// Algorithm 2: deviation from same-day geographic peers.
///
/// The clustering factor uses the district/state median ratio as a proxy
/// for whether the whole district is elevated. It does not count elevated
/// neighbouring locations.
#[must_use]
pub fn spatial_anomaly(spatial: &SpatialBaseline, config: &SpatialConfig, epsilon: f64) -> f64 {
    let z = (spatial.spatial_z_score.abs() / config.z_divisor).min(1.0);
    let ratio = spatial.district_median_adult / (spatial.state_median_adult + epsilon);
    let ratio_deviation = (ratio - 1.0).abs().min(1.0);
    let clustering = (ratio / config.clustering_divisor).min(1.0);

    unit(
        config.z_weight * z
            + config.ratio_weight * ratio_deviation
            + config.clustering_weight * clustering,
    )
}

/// Algorithm 3: overshoot of a moving-average forecast band.
///
/// Only values above the upper band score; undershoot is not penalized.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn forecast_violation(
    record: &LocationPeriodRecord,
    rolling: &RollingBaseline,
    config: &ForecastConfig,
    epsilon: f64,
) -> f64 {
    let x = record.adult_enrollment as f64;
    let upper = config
        .band_z
        .mul_add(rolling.adult_7d_std, rolling.adult_30d_mean);

    if x > upper {
        unit((x - upper) / (upper * config.overshoot_fraction + epsilon))
    } else {
        0.0
    }
}

/// Algorithm 4: adult enrolment without companion update activity.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn cross_signal_integrity(
    record: &LocationPeriodRecord,
    config: &CrossSignalConfig,
    epsilon: f64,
) -> f64 {
    if record.adult_enrollment <= config.min_adult_enrollment {
        return 0.0;
    }

    let ratio = record.companion_updates() as f64 / (record.adult_enrollment as f64 + epsilon);
    if ratio < config.low_ratio {
        config.low_ratio_score
    } else if ratio < config.medium_ratio {
        config.medium_ratio_score
    } else {
        0.0
    }
}

/// Algorithm 5: enrolment mix implausibly skewed towards adults.
#[must_use]
pub fn demographic_ratio(record: &LocationPeriodRecord, config: &DemographicConfig) -> f64 {
    if record.total_enrollment <= config.min_total_enrollment {
        return 0.0;
    }

    let ratio = record.adult_ratio;
    if ratio > config.extreme_ratio {
        config.extreme_score
    } else if ratio > config.high_ratio {
        config.high_score
    } else if ratio > config.elevated_ratio {
        config.elevated_score
    } else {
        0.0
    }
}

/// Runs all five detectors on one record.
#[must_use]
pub fn score_record(row: &BaselinedRecord, config: &ForensicConfig) -> DetectorScores {
    if row.record.is_silent() {
        return DetectorScores::default();
    }

    let eps = config.epsilon;
    DetectorScores {
        algo1_score: temporal_deviation(&row.record, &row.rolling, &config.temporal, eps),
        algo2_score: spatial_anomaly(&row.spatial, &config.spatial, eps),
        algo3_score: forecast_violation(&row.record, &row.rolling, &config.forecast, eps),
        algo4_score: unit(cross_signal_integrity(&row.record, &config.cross_signal, eps)),
        algo5_score: unit(demographic_ratio(&row.record, &config.demographic)),
    }
}

/// Runs the detector bank over a whole table.
#[must_use]
pub fn score_all(rows: &[BaselinedRecord], config: &ForensicConfig) -> Vec<DetectorScores> {
    rows.iter().map(|row| score_record(row, config)).collect()
}
