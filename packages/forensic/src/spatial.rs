//! Same-day spatial baselines.
//!
//! Each record is compared with its geographic peers on the same date:
//! the other records of its district, and every record of its state. No
//! temporal history is involved, so a location with no past data still
//! gets a meaningful spatial comparison.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use enrol_signal_forensic_models::SpatialBaseline;
use enrol_signal_records_models::LocationPeriodRecord;

use crate::stats::{median, summarize};

/// Builds one [`SpatialBaseline`] per record, aligned by index.
///
/// A district with a single reporting location has a standard deviation of
/// 0; the epsilon-guarded z-score is then 0 because the location equals its
/// own median.
#[must_use]
pub fn build_spatial_baselines(
    records: &[LocationPeriodRecord],
    epsilon: f64,
) -> Vec<SpatialBaseline> {
    let mut districts: BTreeMap<(NaiveDate, &str, &str), Vec<u64>> = BTreeMap::new();
    let mut states: BTreeMap<(NaiveDate, &str), Vec<u64>> = BTreeMap::new();

    for r in records {
        districts
            .entry((
                r.date,
                r.location.state.as_str(),
                r.location.district.as_str(),
            ))
            .or_default()
            .push(r.adult_enrollment);
        states
            .entry((r.date, r.location.state.as_str()))
            .or_default()
            .push(r.adult_enrollment);
    }

    let district_stats: BTreeMap<(NaiveDate, &str, &str), (f64, f64)> = districts
        .into_iter()
        .map(|(key, mut values)| {
            let std = summarize(&values).std;
            (key, (median(&mut values), std))
        })
        .collect();

    let state_medians: BTreeMap<(NaiveDate, &str), f64> = states
        .into_iter()
        .map(|(key, mut values)| (key, median(&mut values)))
        .collect();

    log::debug!(
        "Built spatial baselines over {} district-days and {} state-days",
        district_stats.len(),
        state_medians.len()
    );

    records
        .iter()
        .map(|r| {
            let (district_median_adult, district_std_adult) = district_stats
                .get(&(r.date, r.location.state.as_str(), r.location.district.as_str()))
                .copied()
                .unwrap_or_default();
            let state_median_adult = state_medians
                .get(&(r.date, r.location.state.as_str()))
                .copied()
                .unwrap_or_default();

            #[allow(clippy::cast_precision_loss)]
            let spatial_z_score = (r.adult_enrollment as f64 - district_median_adult)
                / (district_std_adult + epsilon);

            SpatialBaseline {
                district_median_adult,
                district_std_adult,
                state_median_adult,
                spatial_z_score,
            }
        })
        .collect()
}
