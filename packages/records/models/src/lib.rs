#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Location-period record types for administrative update analytics.
//!
//! The three upstream signal tables (new enrolments by age band,
//! biometric updates, demographic updates) are described here as typed
//! rows, together with the merged [`LocationPeriodRecord`] that every
//! downstream stage of the forensic pipeline consumes.
//!
//! These types describe aggregate counts per reporting location only.
//! Nothing here identifies or tracks individuals.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// The finest location level at which rows are aggregated.
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
pub enum Granularity {
    /// One row per (date, state, district, postal code).
    Pincode,
    /// Postal codes are dropped; one row per (date, state, district).
    District,
}

impl Granularity {
    /// Resolves the grain for a set of input tables.
    ///
    /// Postal-code grain is only usable when every row of every table
    /// carries a postal code. A single row without one drops the whole
    /// run to district grain.
    #[must_use]
    pub fn resolve(
        enrolment: &[EnrolmentRow],
        biometric: &[BiometricRow],
        demographic: &[DemographicRow],
    ) -> Self {
        let all_have_postal = enrolment.iter().all(|r| r.postal_code().is_some())
            && biometric.iter().all(|r| r.postal_code().is_some())
            && demographic.iter().all(|r| r.postal_code().is_some());

        if all_have_postal {
            Self::Pincode
        } else {
            Self::District
        }
    }
}

/// Identifies a geographic reporting unit.
///
/// Field order matters: the derived [`Ord`] sorts by state, then
/// district, then postal code, which is the grouping order the rolling
/// baselines rely on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationKey {
    /// State name.
    pub state: String,
    /// District name.
    pub district: String,
    /// Postal code. `None` at district grain.
    pub postal_code: Option<String>,
}

impl LocationKey {
    /// Creates a location key.
    #[must_use]
    pub fn new(
        state: impl Into<String>,
        district: impl Into<String>,
        postal_code: Option<String>,
    ) -> Self {
        Self {
            state: state.into(),
            district: district.into(),
            postal_code,
        }
    }

    /// Human-readable label, e.g. `"Karnataka / Bengaluru Urban / 560001"`.
    #[must_use]
    pub fn label(&self) -> String {
        self.postal_code.as_ref().map_or_else(
            || format!("{} / {}", self.state, self.district),
            |pin| format!("{} / {} / {pin}", self.state, self.district),
        )
    }
}

/// Common accessors for the three upstream signal tables.
pub trait LocatedRow {
    /// Reporting date.
    fn date(&self) -> NaiveDate;
    /// State name.
    fn state(&self) -> &str;
    /// District name.
    fn district(&self) -> &str;
    /// Postal code, if the source table carries one.
    fn postal_code(&self) -> Option<&str>;

    /// Builds the location key for this row at the given grain.
    fn location_key(&self, granularity: Granularity) -> LocationKey {
        let postal_code = match granularity {
            Granularity::Pincode => self.postal_code().map(str::to_string),
            Granularity::District => None,
        };
        LocationKey::new(self.state(), self.district(), postal_code)
    }
}

macro_rules! impl_located_row {
    ($ty:ty) => {
        impl LocatedRow for $ty {
            fn date(&self) -> NaiveDate {
                self.date
            }

            fn state(&self) -> &str {
                &self.state
            }

            fn district(&self) -> &str {
                &self.district
            }

            fn postal_code(&self) -> Option<&str> {
                self.postal_code.as_deref()
            }
        }
    };
}

/// A row of the new-enrolment table, split by age band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrolmentRow {
    /// Reporting date.
    pub date: NaiveDate,
    /// State name.
    pub state: String,
    /// District name.
    pub district: String,
    /// Postal code.
    pub postal_code: Option<String>,
    /// Enrolments aged 0-5.
    pub age_0_5: u64,
    /// Enrolments aged 5-17.
    pub age_5_17: u64,
    /// Enrolments aged 18 and above.
    pub age_18_plus: u64,
}

/// A row of the biometric-update table.
///
/// Upstream publishes two age-band sub-signals; their sum is the
/// biometric update count used by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiometricRow {
    /// Reporting date.
    pub date: NaiveDate,
    /// State name.
    pub state: String,
    /// District name.
    pub district: String,
    /// Postal code.
    pub postal_code: Option<String>,
    /// Updates for ages 5-17.
    pub age_5_17: u64,
    /// Updates for ages 17 and above.
    pub age_17_plus: u64,
}

impl BiometricRow {
    /// Total biometric updates across both age bands.
    #[must_use]
    pub const fn update_count(&self) -> u64 {
        self.age_5_17.saturating_add(self.age_17_plus)
    }
}

/// A row of the demographic-update table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DemographicRow {
    /// Reporting date.
    pub date: NaiveDate,
    /// State name.
    pub state: String,
    /// District name.
    pub district: String,
    /// Postal code.
    pub postal_code: Option<String>,
    /// Updates for ages 5-17.
    pub age_5_17: u64,
    /// Updates for ages 17 and above.
    pub age_17_plus: u64,
}

impl DemographicRow {
    /// Total demographic updates across both age bands.
    #[must_use]
    pub const fn update_count(&self) -> u64 {
        self.age_5_17.saturating_add(self.age_17_plus)
    }
}

impl_located_row!(EnrolmentRow);
impl_located_row!(BiometricRow);
impl_located_row!(DemographicRow);

/// Raw counts for one location-date, summed across all contributing rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignalCounts {
    /// Enrolments aged 0-5.
    pub age_0_5: u64,
    /// Enrolments aged 5-17.
    pub age_5_17: u64,
    /// Enrolments aged 18 and above.
    pub age_18_plus: u64,
    /// Biometric updates.
    pub biometric_updates: u64,
    /// Demographic updates.
    pub demographic_updates: u64,
}

/// One merged row per (date, state, district[, postal code]).
///
/// Built only through [`LocationPeriodRecord::from_counts`] so that
/// `total_enrollment` always equals the sum of the three age bands
/// (saturating at `u64::MAX`) and
/// `adult_ratio` stays within `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationPeriodRecord {
    /// Reporting date.
    pub date: NaiveDate,
    /// Location this record describes.
    pub location: LocationKey,
    /// Enrolments aged 0-5.
    pub age_0_5_enrolments: u64,
    /// Enrolments aged 5-17.
    pub age_5_17_enrolments: u64,
    /// Enrolments aged 18 and above.
    pub age_18_plus_enrolments: u64,
    /// Alias of `age_18_plus_enrolments`, the signal the baselines track.
    pub adult_enrollment: u64,
    /// Sum of the three age bands.
    pub total_enrollment: u64,
    /// Biometric updates.
    pub biometric_update_count: u64,
    /// Demographic updates.
    pub demographic_update_count: u64,
    /// `adult_enrollment / max(total_enrollment, 1)`.
    pub adult_ratio: f64,
    /// Biometric updates per adult enrolment (epsilon-guarded).
    pub bio_per_adult: f64,
    /// Demographic updates per adult enrolment (epsilon-guarded).
    pub demo_per_adult: f64,
}

impl LocationPeriodRecord {
    /// Derives the volume and ratio features from summed counts.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_counts(
        date: NaiveDate,
        location: LocationKey,
        counts: SignalCounts,
        epsilon: f64,
    ) -> Self {
        let adult = counts.age_18_plus;
        let total = counts
            .age_0_5
            .saturating_add(counts.age_5_17)
            .saturating_add(counts.age_18_plus);

        Self {
            date,
            location,
            age_0_5_enrolments: counts.age_0_5,
            age_5_17_enrolments: counts.age_5_17,
            age_18_plus_enrolments: adult,
            adult_enrollment: adult,
            total_enrollment: total,
            biometric_update_count: counts.biometric_updates,
            demographic_update_count: counts.demographic_updates,
            adult_ratio: adult as f64 / total.max(1) as f64,
            bio_per_adult: counts.biometric_updates as f64 / (adult as f64 + epsilon),
            demo_per_adult: counts.demographic_updates as f64 / (adult as f64 + epsilon),
        }
    }

    /// Biometric plus demographic updates.
    #[must_use]
    pub const fn companion_updates(&self) -> u64 {
        self.biometric_update_count
            .saturating_add(self.demographic_update_count)
    }

    /// Whether every count on this record is zero.
    #[must_use]
    pub const fn is_silent(&self) -> bool {
        self.total_enrollment == 0
            && self.biometric_update_count == 0
            && self.demographic_update_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn enrolment(postal_code: Option<&str>) -> EnrolmentRow {
        EnrolmentRow {
            date: date(1),
            state: "Kerala".to_string(),
            district: "Ernakulam".to_string(),
            postal_code: postal_code.map(str::to_string),
            age_0_5: 1,
            age_5_17: 2,
            age_18_plus: 3,
        }
    }

    fn biometric(postal_code: Option<&str>) -> BiometricRow {
        BiometricRow {
            date: date(1),
            state: "Kerala".to_string(),
            district: "Ernakulam".to_string(),
            postal_code: postal_code.map(str::to_string),
            age_5_17: 4,
            age_17_plus: 5,
        }
    }

    #[test]
    fn total_is_sum_of_age_bands() {
        let counts = SignalCounts {
            age_0_5: 3,
            age_5_17: 7,
            age_18_plus: 11,
            ..SignalCounts::default()
        };
        let rec = LocationPeriodRecord::from_counts(
            date(1),
            LocationKey::new("Kerala", "Ernakulam", None),
            counts,
            1e-6,
        );
        assert_eq!(rec.total_enrollment, 21);
        assert_eq!(rec.adult_enrollment, 11);
        assert!((rec.adult_ratio - 11.0 / 21.0).abs() < 1e-12);
    }

    #[test]
    fn zero_volume_record_has_zero_ratio() {
        let rec = LocationPeriodRecord::from_counts(
            date(1),
            LocationKey::new("Kerala", "Ernakulam", None),
            SignalCounts::default(),
            1e-6,
        );
        assert!(rec.adult_ratio.abs() < f64::EPSILON);
        assert!(rec.bio_per_adult.abs() < f64::EPSILON);
        assert!(rec.is_silent());
    }

    #[test]
    fn update_count_sums_bands() {
        assert_eq!(biometric(None).update_count(), 9);
    }

    #[test]
    fn resolves_pincode_grain_when_all_rows_have_postal_codes() {
        let g = Granularity::resolve(
            &[enrolment(Some("682001"))],
            &[biometric(Some("682001"))],
            &[],
        );
        assert_eq!(g, Granularity::Pincode);
    }

    #[test]
    fn falls_back_to_district_grain() {
        let g = Granularity::resolve(&[enrolment(Some("682001"))], &[biometric(None)], &[]);
        assert_eq!(g, Granularity::District);
    }

    #[test]
    fn district_grain_drops_postal_code_from_key() {
        let key = enrolment(Some("682001")).location_key(Granularity::District);
        assert_eq!(key.postal_code, None);
        assert_eq!(key.label(), "Kerala / Ernakulam");
    }

    #[test]
    fn location_keys_sort_by_state_then_district_then_postal_code() {
        let mut keys = [
            LocationKey::new("B", "A", Some("2".to_string())),
            LocationKey::new("A", "Z", Some("1".to_string())),
            LocationKey::new("B", "A", Some("1".to_string())),
        ];
        keys.sort();
        assert_eq!(keys[0].state, "A");
        assert_eq!(keys[1].postal_code.as_deref(), Some("1"));
        assert_eq!(keys[2].postal_code.as_deref(), Some("2"));
    }

    #[test]
    fn granularity_round_trips_through_strum() {
        assert_eq!(Granularity::Pincode.to_string(), "pincode");
        assert_eq!("district".parse::<Granularity>().unwrap(), Granularity::District);
    }
}
