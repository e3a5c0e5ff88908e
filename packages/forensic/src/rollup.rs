//! Period-level reporting view.
//!
//! Volumes are summed and the composite risk is averaged, but each detector
//! sub-score keeps its maximum across the bucket. A period with one severe
//! day therefore reads as moderate on average while still showing which
//! detector fired.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use enrol_signal_forensic_models::{DetectorScores, RollupInterval, RollupRow, ScoredRecord};
use enrol_signal_records_models::LocationKey;

#[derive(Default)]
struct Bucket {
    record_count: u64,
    adult_enrollment: u64,
    total_enrollment: u64,
    biometric_update_count: u64,
    demographic_update_count: u64,
    risk_sum: f64,
    scores: DetectorScores,
}

/// Buckets scored records by period and location.
///
/// Output is sorted by (period start, state, district, postal code).
#[must_use]
pub fn temporal_rollup(records: &[ScoredRecord], interval: RollupInterval) -> Vec<RollupRow> {
    let mut buckets: BTreeMap<(NaiveDate, &LocationKey), Bucket> = BTreeMap::new();

    for scored in records {
        let r = &scored.record;
        let bucket = buckets
            .entry((interval.bucket_start(r.date), &r.location))
            .or_default();
        bucket.record_count += 1;
        bucket.adult_enrollment = bucket.adult_enrollment.saturating_add(r.adult_enrollment);
        bucket.total_enrollment = bucket.total_enrollment.saturating_add(r.total_enrollment);
        bucket.biometric_update_count = bucket
            .biometric_update_count
            .saturating_add(r.biometric_update_count);
        bucket.demographic_update_count = bucket
            .demographic_update_count
            .saturating_add(r.demographic_update_count);
        bucket.risk_sum += scored.risk.risk_score_norm;
        bucket.scores = bucket.scores.max(&scored.scores);
    }

    log::debug!(
        "Rolled {} records up into {} {interval:?} buckets",
        records.len(),
        buckets.len()
    );

    buckets
        .into_iter()
        .map(|((period_start, location), b)| {
            #[allow(clippy::cast_precision_loss)]
            let risk_score_norm = b.risk_sum / b.record_count as f64;
            RollupRow {
                period_start,
                location: location.clone(),
                record_count: b.record_count,
                adult_enrollment: b.adult_enrollment,
                total_enrollment: b.total_enrollment,
                biometric_update_count: b.biometric_update_count,
                demographic_update_count: b.demographic_update_count,
                risk_score_norm,
                scores: b.scores,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use enrol_signal_forensic_models::{CompositeRisk, RollingBaseline, SpatialBaseline};
    use enrol_signal_records_models::{LocationPeriodRecord, SignalCounts};

    use super::*;

    fn scored(pin: &str, date: NaiveDate, adult: u64, risk: f64, algo1: f64) -> ScoredRecord {
        ScoredRecord {
            record: LocationPeriodRecord::from_counts(
                date,
                LocationKey::new("Kerala", "Ernakulam", Some(pin.to_string())),
                SignalCounts {
                    age_18_plus: adult,
                    biometric_updates: 1,
                    ..SignalCounts::default()
                },
                1e-6,
            ),
            rolling: RollingBaseline::default(),
            spatial: SpatialBaseline::default(),
            scores: DetectorScores {
                algo1_score: algo1,
                ..DetectorScores::default()
            },
            risk: CompositeRisk {
                risk_score: risk / 100.0,
                risk_score_norm: risk,
            },
        }
    }

    fn ymd(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    #[test]
    fn mean_risk_but_max_detector() {
        let mut records: Vec<ScoredRecord> = (1..=9)
            .map(|d| scored("682001", ymd(1, d), 10, 5.0, 0.05))
            .collect();
        records.push(scored("682001", ymd(2, 3), 500, 90.0, 0.95));

        let rows = temporal_rollup(&records, RollupInterval::Months(2));
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.period_start, ymd(1, 1));
        assert_eq!(row.record_count, 10);
        assert_eq!(row.adult_enrollment, 590);
        assert_eq!(row.biometric_update_count, 10);
        assert!((row.risk_score_norm - 13.5).abs() < 1e-9);
        assert!((row.scores.algo1_score - 0.95).abs() < f64::EPSILON);
    }

    #[test]
    fn separates_periods_and_locations() {
        let records = vec![
            scored("682002", ymd(3, 1), 1, 10.0, 0.0),
            scored("682001", ymd(1, 5), 1, 10.0, 0.0),
            scored("682001", ymd(3, 9), 1, 30.0, 0.0),
            scored("682001", ymd(4, 2), 1, 50.0, 0.0),
        ];
        let rows = temporal_rollup(&records, RollupInterval::Months(2));

        let keys: Vec<(NaiveDate, Option<&str>)> = rows
            .iter()
            .map(|r| (r.period_start, r.location.postal_code.as_deref()))
            .collect();
        assert_eq!(
            keys,
            vec![
                (ymd(1, 1), Some("682001")),
                (ymd(3, 1), Some("682001")),
                (ymd(3, 1), Some("682002")),
            ]
        );
        assert!((rows[1].risk_score_norm - 40.0).abs() < 1e-9);
    }

    #[test]
    fn empty_input_gives_empty_rollup() {
        assert!(temporal_rollup(&[], RollupInterval::default()).is_empty());
    }
}
