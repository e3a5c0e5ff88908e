//! Geo-temporal aggregation of the three signal tables.
//!
//! Each table is group-summed to the (date, state, district[, postal
//! code]) grain and the three are outer-joined on that key. A location
//! present in one table but absent from another keeps its row with zero
//! counts for the missing signal: enrolment activity with no companion
//! updates is precisely what the cross-signal detector looks for, so those
//! rows must never be dropped.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use enrol_signal_records_models::{
    BiometricRow, DemographicRow, EnrolmentRow, Granularity, LocatedRow, LocationKey,
    LocationPeriodRecord, SignalCounts,
};

/// Merges the signal tables into one record per location-date.
///
/// The output is sorted by (state, district, postal code, date), which the
/// rolling baselines depend on.
#[must_use]
pub fn merge_signals(
    enrolment: &[EnrolmentRow],
    biometric: &[BiometricRow],
    demographic: &[DemographicRow],
    granularity: Granularity,
    epsilon: f64,
) -> Vec<LocationPeriodRecord> {
    let mut merged: BTreeMap<(LocationKey, NaiveDate), SignalCounts> = BTreeMap::new();

    for row in enrolment {
        let counts = merged
            .entry((row.location_key(granularity), row.date))
            .or_default();
        counts.age_0_5 = counts.age_0_5.saturating_add(row.age_0_5);
        counts.age_5_17 = counts.age_5_17.saturating_add(row.age_5_17);
        counts.age_18_plus = counts.age_18_plus.saturating_add(row.age_18_plus);
    }

    for row in biometric {
        let counts = merged
            .entry((row.location_key(granularity), row.date))
            .or_default();
        counts.biometric_updates = counts.biometric_updates.saturating_add(row.update_count());
    }

    for row in demographic {
        let counts = merged
            .entry((row.location_key(granularity), row.date))
            .or_default();
        counts.demographic_updates = counts
            .demographic_updates
            .saturating_add(row.update_count());
    }

    log::debug!(
        "Merged {} enrolment, {} biometric and {} demographic rows into {} {granularity} records",
        enrolment.len(),
        biometric.len(),
        demographic.len(),
        merged.len()
    );

    merged
        .into_iter()
        .map(|((location, date), counts)| {
            LocationPeriodRecord::from_counts(date, location, counts, epsilon)
        })
        .collect()
}
