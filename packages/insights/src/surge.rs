//! Volume surges in the merged signal table.
//!
//! Two kinds are reported:
//!
//! * **Historical** surges are reporting days whose nationwide volume
//!   reaches `mean + k * std` of the daily series.
//! * **Regional** surges are states whose total volume over the run reaches
//!   `mean + std` of the per-state totals. High activity is projected to
//!   continue, so each one is dated [`REGIONAL_HORIZON_DAYS`] after the last
//!   reporting day and carries a confidence of
//!   `min(0.8, 0.5 + 0.3 * magnitude)`.
//!
//! Magnitude is `(volume - mean) / mean` and intensity is
//! `(volume - median) / median` against the same series; both are 0 when
//! the denominator is 0. A series with fewer than two points or no spread
//! has no surges.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use enrol_signal_forensic::stats;
use enrol_signal_records_models::LocationPeriodRecord;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::Priority;

/// Standard deviations above the daily mean that mark a historical surge.
pub const DEFAULT_SURGE_MULTIPLIER: f64 = 1.5;

/// Regional surges below this confidence are dropped.
pub const MIN_SURGE_CONFIDENCE: f64 = 0.5;

/// Days past the last reporting day at which a regional surge is dated.
pub const REGIONAL_HORIZON_DAYS: i64 = 45;

const REGIONAL_CONFIDENCE_CAP: f64 = 0.8;

/// Where a surge was found.
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
pub enum SurgeKind {
    /// A past day above the daily threshold.
    Historical,
    /// A state whose activity stands above its peers.
    RegionalHighActivity,
}

/// Which count a surge is measured on.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
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
pub enum SurgeMetric {
    /// Total enrolments across all age bands.
    Enrolment,
    /// Biometric updates.
    #[default]
    Biometric,
    /// Demographic updates.
    Demographic,
}

impl SurgeMetric {
    /// The metric's count on one record.
    #[must_use]
    pub const fn value(self, record: &LocationPeriodRecord) -> u64 {
        match self {
            Self::Enrolment => record.total_enrollment,
            Self::Biometric => record.biometric_update_count,
            Self::Demographic => record.demographic_update_count,
        }
    }
}

/// Surge detection settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurgeConfig {
    /// Count to measure.
    pub metric: SurgeMetric,
    /// `k` in the historical threshold `mean + k * std`.
    pub multiplier: f64,
    /// Minimum confidence for a regional surge.
    pub min_confidence: f64,
}

impl Default for SurgeConfig {
    fn default() -> Self {
        Self {
            metric: SurgeMetric::default(),
            multiplier: DEFAULT_SURGE_MULTIPLIER,
            min_confidence: MIN_SURGE_CONFIDENCE,
        }
    }
}

/// One detected surge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Surge {
    /// Historical or regional.
    pub kind: SurgeKind,
    /// Count the surge was measured on.
    pub metric: SurgeMetric,
    /// State, for regional surges.
    pub state: Option<String>,
    /// The surge day for historical surges, the projected day for
    /// regional ones.
    pub date: NaiveDate,
    /// Days from the last reporting day to `date`. Never positive for
    /// historical surges.
    pub days_from_last_report: i64,
    /// Observed volume.
    pub volume: u64,
    /// Threshold the volume reached.
    pub threshold: f64,
    /// Relative excess over the series mean.
    pub magnitude: f64,
    /// Relative excess over the series median.
    pub intensity: f64,
    /// 1.0 for observed surges, the projection confidence for regional ones.
    pub confidence: f64,
    /// Review urgency.
    pub priority: Priority,
}

/// `High` for confident large surges, `Medium` for either moderately
/// confident or moderately large ones, `Low` otherwise.
#[must_use]
pub const fn surge_priority(confidence: f64, magnitude: f64) -> Priority {
    if confidence >= 0.7 && magnitude >= 0.3 {
        Priority::High
    } else if confidence >= 0.6 || magnitude >= 0.2 {
        Priority::Medium
    } else {
        Priority::Low
    }
}

#[derive(Debug, Clone, Copy)]
struct Baseline {
    mean: f64,
    median: f64,
    std: f64,
}

impl Baseline {
    fn of(values: impl Iterator<Item = u64>) -> Option<Self> {
        let mut values: Vec<u64> = values.collect();
        let summary = stats::summarize(&values);
        if summary.count < 2 || summary.std <= 0.0 {
            return None;
        }
        Some(Self {
            mean: summary.mean,
            median: stats::median(&mut values),
            std: summary.std,
        })
    }

    #[allow(clippy::cast_precision_loss)]
    fn magnitude(&self, volume: u64) -> f64 {
        relative_excess(volume as f64, self.mean)
    }

    #[allow(clippy::cast_precision_loss)]
    fn intensity(&self, volume: u64) -> f64 {
        relative_excess(volume as f64, self.median)
    }
}

const fn relative_excess(value: f64, reference: f64) -> f64 {
    if reference > 0.0 {
        (value - reference) / reference
    } else {
        0.0
    }
}

/// A metric summed per reporting day and per state.
#[derive(Debug, Clone, Default)]
pub struct SurgeSeries {
    metric: SurgeMetric,
    daily: BTreeMap<NaiveDate, u64>,
    by_state: BTreeMap<String, u64>,
    last_date: Option<NaiveDate>,
}

impl SurgeSeries {
    /// Sums `metric` over `records` in one pass.
    #[must_use]
    pub fn collect<'a>(
        records: impl IntoIterator<Item = &'a LocationPeriodRecord>,
        metric: SurgeMetric,
    ) -> Self {
        let mut series = Self {
            metric,
            ..Self::default()
        };
        for record in records {
            let value = metric.value(record);
            let day = series.daily.entry(record.date).or_default();
            *day = day.saturating_add(value);
            let state = series
                .by_state
                .entry(record.location.state.clone())
                .or_default();
            *state = state.saturating_add(value);
            series.last_date = series.last_date.max(Some(record.date));
        }
        series
    }

    /// Days at or above `mean + multiplier * std`, largest magnitude first.
    #[must_use]
    pub fn historical(&self, multiplier: f64) -> Vec<Surge> {
        let (Some(baseline), Some(last)) =
            (Baseline::of(self.daily.values().copied()), self.last_date)
        else {
            return Vec::new();
        };
        let threshold = multiplier.mul_add(baseline.std, baseline.mean);

        #[allow(clippy::cast_precision_loss)]
        let mut surges: Vec<Surge> = self
            .daily
            .iter()
            .filter(|(_, volume)| **volume as f64 >= threshold)
            .map(|(&date, &volume)| {
                let magnitude = baseline.magnitude(volume);
                Surge {
                    kind: SurgeKind::Historical,
                    metric: self.metric,
                    state: None,
                    date,
                    days_from_last_report: (date - last).num_days(),
                    volume,
                    threshold,
                    magnitude,
                    intensity: baseline.intensity(volume),
                    confidence: 1.0,
                    priority: surge_priority(1.0, magnitude),
                }
            })
            .collect();
        sort_by_magnitude(&mut surges);
        surges
    }

    /// States at or above `mean + std` of the per-state totals whose
    /// projection confidence reaches `min_confidence`, largest magnitude
    /// first.
    #[must_use]
    pub fn regional(&self, min_confidence: f64) -> Vec<Surge> {
        let (Some(baseline), Some(last)) =
            (Baseline::of(self.by_state.values().copied()), self.last_date)
        else {
            return Vec::new();
        };
        let threshold = baseline.mean + baseline.std;
        let date = last + Duration::days(REGIONAL_HORIZON_DAYS);

        #[allow(clippy::cast_precision_loss)]
        let mut surges: Vec<Surge> = self
            .by_state
            .iter()
            .filter(|(_, volume)| **volume as f64 >= threshold)
            .filter_map(|(state, &volume)| {
                let magnitude = baseline.magnitude(volume);
                let confidence = 0.3f64
                    .mul_add(magnitude, 0.5)
                    .min(REGIONAL_CONFIDENCE_CAP);
                (confidence >= min_confidence).then(|| Surge {
                    kind: SurgeKind::RegionalHighActivity,
                    metric: self.metric,
                    state: Some(state.clone()),
                    date,
                    days_from_last_report: REGIONAL_HORIZON_DAYS,
                    volume,
                    threshold,
                    magnitude,
                    intensity: baseline.intensity(volume),
                    confidence,
                    priority: surge_priority(confidence, magnitude),
                })
            })
            .collect();
        sort_by_magnitude(&mut surges);
        surges
    }
}

fn sort_by_magnitude(surges: &mut [Surge]) {
    surges.sort_by(|a, b| {
        b.magnitude
            .total_cmp(&a.magnitude)
            .then_with(|| a.date.cmp(&b.date))
            .then_with(|| a.state.cmp(&b.state))
    });
}

/// Historical surges followed by regional ones.
#[must_use]
pub fn detect_surges<'a>(
    records: impl IntoIterator<Item = &'a LocationPeriodRecord>,
    config: &SurgeConfig,
) -> Vec<Surge> {
    let series = SurgeSeries::collect(records, config.metric);
    let mut surges = series.historical(config.multiplier);
    surges.extend(series.regional(config.min_confidence));

    log::debug!(
        "Found {} {} surges over {} reporting days",
        surges.len(),
        config.metric,
        series.daily.len()
    );

    surges
}

#[cfg(test)]
mod tests {
    use enrol_signal_records_models::{LocationKey, SignalCounts};

    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, d).unwrap()
    }

    fn record(d: u32, state: &str, biometric: u64) -> LocationPeriodRecord {
        LocationPeriodRecord::from_counts(
            day(d),
            LocationKey::new(state, "Central", None),
            SignalCounts {
                age_18_plus: 5,
                biometric_updates: biometric,
                ..SignalCounts::default()
            },
            1e-6,
        )
    }

    #[test]
    fn flags_days_above_the_daily_threshold() {
        // Nine quiet days and one busy one, split across two states.
        let mut records: Vec<_> = (1..=9).map(|d| record(d, "Goa", 10)).collect();
        records.push(record(10, "Goa", 60));
        records.push(record(10, "Sikkim", 40));

        let surges = SurgeSeries::collect(&records, SurgeMetric::Biometric)
            .historical(DEFAULT_SURGE_MULTIPLIER);

        // Daily series 10 x 9, 100: mean 19, sample std sqrt(810).
        assert_eq!(surges.len(), 1);
        let surge = &surges[0];
        assert_eq!(surge.kind, SurgeKind::Historical);
        assert_eq!(surge.date, day(10));
        assert_eq!(surge.days_from_last_report, 0);
        assert_eq!(surge.volume, 100);
        assert!((surge.threshold - 1.5f64.mul_add(810f64.sqrt(), 19.0)).abs() < 1e-9);
        assert!((surge.magnitude - 81.0 / 19.0).abs() < 1e-12);
        assert!((surge.intensity - 9.0).abs() < 1e-12);
        assert_eq!(surge.priority, Priority::High);
    }

    #[test]
    fn flags_states_above_their_peers() {
        let records = vec![
            record(1, "Assam", 100),
            record(1, "Goa", 10),
            record(1, "Kerala", 10),
            record(1, "Punjab", 10),
            record(1, "Sikkim", 10),
        ];

        let surges = SurgeSeries::collect(&records, SurgeMetric::Biometric)
            .regional(MIN_SURGE_CONFIDENCE);

        // Totals 100, 10 x 4: mean 28, std sqrt(1620).
        assert_eq!(surges.len(), 1);
        let surge = &surges[0];
        assert_eq!(surge.kind, SurgeKind::RegionalHighActivity);
        assert_eq!(surge.state.as_deref(), Some("Assam"));
        assert_eq!(surge.date, day(1) + Duration::days(REGIONAL_HORIZON_DAYS));
        assert_eq!(surge.days_from_last_report, REGIONAL_HORIZON_DAYS);
        assert!((surge.threshold - (28.0 + 1620f64.sqrt())).abs() < 1e-9);
        assert!((surge.magnitude - 72.0 / 28.0).abs() < 1e-12);
        assert!((surge.confidence - 0.8).abs() < f64::EPSILON);
        assert_eq!(surge.priority, Priority::High);
    }

    #[test]
    fn regional_confidence_below_minimum_is_dropped() {
        let records = vec![
            record(1, "Assam", 100),
            record(1, "Goa", 10),
            record(1, "Kerala", 10),
            record(1, "Punjab", 10),
            record(1, "Sikkim", 10),
        ];

        let surges = SurgeSeries::collect(&records, SurgeMetric::Biometric).regional(0.81);

        assert!(surges.is_empty());
    }

    #[test]
    fn flat_or_short_series_has_no_surges() {
        let flat: Vec<_> = (1..=5).map(|d| record(d, "Goa", 20)).collect();
        assert!(detect_surges(&flat, &SurgeConfig::default()).is_empty());

        let single = vec![record(1, "Goa", 500)];
        assert!(detect_surges(&single, &SurgeConfig::default()).is_empty());

        assert!(detect_surges(std::iter::empty(), &SurgeConfig::default()).is_empty());
    }

    #[test]
    fn measures_the_configured_metric() {
        let mut records: Vec<_> = (1..=9).map(|d| record(d, "Goa", 10)).collect();
        records.push(record(10, "Goa", 100));

        // Enrolment is a flat 5 per day, so only biometric updates surge.
        let config = SurgeConfig {
            metric: SurgeMetric::Enrolment,
            ..SurgeConfig::default()
        };
        assert!(detect_surges(&records, &config).is_empty());
        assert_eq!(detect_surges(&records, &SurgeConfig::default()).len(), 1);
    }

    #[test]
    fn priority_follows_confidence_and_magnitude() {
        assert_eq!(surge_priority(0.8, 0.5), Priority::High);
        assert_eq!(surge_priority(0.65, 0.1), Priority::Medium);
        assert_eq!(surge_priority(0.5, 0.25), Priority::Medium);
        assert_eq!(surge_priority(0.5, 0.1), Priority::Low);
    }

    #[test]
    fn serializes_kind_in_snake_case() {
        let json = serde_json::to_value(SurgeKind::RegionalHighActivity).unwrap();
        assert_eq!(json, "regional_high_activity");
    }
}
