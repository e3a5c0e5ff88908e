//! Prioritized recommendations for administrative review.
//!
//! A recommendation is raised for every rollup row whose mean risk reaches
//! the elevated tier, or where any single detector peaked at or above
//! [`PEAK_SCORE_THRESHOLD`] during the period. Action items are phrased as
//! review steps. They never propose enforcement or say anything about
//! individual enrollees.

use chrono::NaiveDate;
use enrol_signal_forensic_models::{DetectorKind, RiskTier, RiskTierThresholds, RollupRow};
use enrol_signal_records_models::LocationKey;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A detector sub-score at or above this raises a recommendation on its own.
pub const PEAK_SCORE_THRESHOLD: f64 = 0.8;

/// Review urgency. Ordered most urgent first.
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
pub enum Priority {
    /// Review first.
    Critical,
    /// Review this cycle.
    High,
    /// Review when capacity allows.
    Medium,
    /// Keep under observation.
    Low,
}

impl From<RiskTier> for Priority {
    fn from(tier: RiskTier) -> Self {
        match tier {
            RiskTier::Critical => Self::Critical,
            RiskTier::High => Self::High,
            RiskTier::Elevated => Self::Medium,
            RiskTier::Low => Self::Low,
        }
    }
}

/// One administrative-review recommendation for a location-period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    /// Review urgency.
    pub priority: Priority,
    /// Tier of the period's mean risk.
    pub tier: RiskTier,
    /// First day of the period.
    pub period_start: NaiveDate,
    /// Location under review.
    pub location: LocationKey,
    /// Mean composite risk over the period.
    pub risk_score_norm: f64,
    /// Detector with the highest peak score.
    pub dominant_detector: DetectorKind,
    /// That detector's peak score.
    pub peak_score: f64,
    /// Why the location-period was raised.
    pub rationale: String,
    /// Suggested review steps.
    pub actions: Vec<String>,
}

fn rationale(row: &RollupRow, tier: RiskTier, detector: DetectorKind, peak: f64) -> String {
    let driver = match detector {
        DetectorKind::TemporalDeviation => {
            "adult enrolment deviated sharply from this location's own recent history"
        }
        DetectorKind::SpatialAnomaly => {
            "adult enrolment stood out against other locations in the same district on the same day"
        }
        DetectorKind::ForecastViolation => {
            "adult enrolment exceeded the upper band of its moving-average forecast"
        }
        DetectorKind::CrossSignalIntegrity => {
            "adult enrolment was not matched by companion biometric or demographic update activity"
        }
        DetectorKind::DemographicRatio => {
            "the enrolment mix was unusually concentrated in the adult age band"
        }
    };

    format!(
        "{} ({tier}, mean risk {:.1}): {driver}; {} peaked at {peak:.2} across {} reporting day(s).",
        row.location.label(),
        row.risk_score_norm,
        detector.label(),
        row.record_count,
    )
}

fn actions(detector: DetectorKind) -> Vec<String> {
    let steps: &[&str] = match detector {
        DetectorKind::TemporalDeviation => &[
            "Compare daily adult enrolment for the period against the preceding 90 days",
            "Check whether a scheduled camp or outreach drive explains the change",
        ],
        DetectorKind::SpatialAnomaly => &[
            "Compare with neighbouring postal codes in the district for the same dates",
            "Confirm the centre's reported location and catchment",
        ],
        DetectorKind::ForecastViolation => &[
            "Review the dates on which volume exceeded the forecast band",
            "Check for batch uploads or backlog clearance on those dates",
        ],
        DetectorKind::CrossSignalIntegrity => &[
            "Confirm that biometric and demographic update feeds are complete for the period",
            "Review the enrolment centre's operator activity records",
        ],
        DetectorKind::DemographicRatio => &[
            "Compare the age-band mix with the district's usual distribution",
            "Verify the age-band coding in the source enrolment records",
        ],
    };
    steps.iter().map(ToString::to_string).collect()
}

/// Builds recommendations from a rollup, most urgent first.
///
/// Within a priority, higher mean risk comes first; remaining ties keep
/// rollup order.
#[must_use]
pub fn recommend(rows: &[RollupRow], thresholds: &RiskTierThresholds) -> Vec<Recommendation> {
    let mut out: Vec<Recommendation> = rows
        .iter()
        .filter_map(|row| {
            let tier = thresholds.classify(row.risk_score_norm);
            let (detector, peak) = row.scores.dominant()?;
            if tier == RiskTier::Low && peak < PEAK_SCORE_THRESHOLD {
                return None;
            }

            Some(Recommendation {
                priority: tier.into(),
                tier,
                period_start: row.period_start,
                location: row.location.clone(),
                risk_score_norm: row.risk_score_norm,
                dominant_detector: detector,
                peak_score: peak,
                rationale: rationale(row, tier, detector, peak),
                actions: actions(detector),
            })
        })
        .collect();

    out.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| b.risk_score_norm.total_cmp(&a.risk_score_norm))
    });

    log::info!(
        "Raised {} review recommendations from {} rollup rows",
        out.len(),
        rows.len()
    );

    out
}

#[cfg(test)]
mod tests {
    use enrol_signal_forensic_models::DetectorScores;

    use super::*;

    fn rollup(pin: &str, risk: f64, scores: DetectorScores) -> RollupRow {
        RollupRow {
            period_start: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            location: LocationKey::new("Punjab", "Amritsar", Some(pin.to_string())),
            record_count: 10,
            adult_enrollment: 100,
            total_enrollment: 120,
            biometric_update_count: 4,
            demographic_update_count: 2,
            risk_score_norm: risk,
            scores,
        }
    }

    fn only(kind: DetectorKind, score: f64) -> DetectorScores {
        let mut s = DetectorScores::default();
        match kind {
            DetectorKind::TemporalDeviation => s.algo1_score = score,
            DetectorKind::SpatialAnomaly => s.algo2_score = score,
            DetectorKind::ForecastViolation => s.algo3_score = score,
            DetectorKind::CrossSignalIntegrity => s.algo4_score = score,
            DetectorKind::DemographicRatio => s.algo5_score = score,
        }
        s
    }

    #[test]
    fn quiet_rows_raise_nothing() {
        let rows = vec![rollup("143001", 10.0, only(DetectorKind::SpatialAnomaly, 0.3))];
        assert!(recommend(&rows, &RiskTierThresholds::default()).is_empty());
    }

    #[test]
    fn detector_peak_raises_low_priority() {
        let rows = vec![rollup(
            "143001",
            8.0,
            only(DetectorKind::CrossSignalIntegrity, 0.8),
        )];
        let recs = recommend(&rows, &RiskTierThresholds::default());
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].priority, Priority::Low);
        assert_eq!(recs[0].dominant_detector, DetectorKind::CrossSignalIntegrity);
        assert!(recs[0].rationale.contains("143001"));
        assert!(!recs[0].actions.is_empty());
    }

    #[test]
    fn sorted_by_priority_then_risk() {
        let rows = vec![
            rollup("143001", 30.0, only(DetectorKind::TemporalDeviation, 0.5)),
            rollup("143002", 80.0, only(DetectorKind::DemographicRatio, 1.0)),
            rollup("143003", 45.0, only(DetectorKind::ForecastViolation, 0.6)),
            rollup("143004", 60.0, only(DetectorKind::SpatialAnomaly, 0.9)),
        ];
        let recs = recommend(&rows, &RiskTierThresholds::default());
        let order: Vec<(Priority, &str)> = recs
            .iter()
            .map(|r| (r.priority, r.location.postal_code.as_deref().unwrap()))
            .collect();
        assert_eq!(
            order,
            vec![
                (Priority::Critical, "143002"),
                (Priority::High, "143004"),
                (Priority::Medium, "143003"),
                (Priority::Medium, "143001"),
            ]
        );
    }

    #[test]
    fn serializes_screaming_priority() {
        let rows = vec![rollup("143001", 90.0, only(DetectorKind::DemographicRatio, 1.0))];
        let recs = recommend(&rows, &RiskTierThresholds::default());
        let json = serde_json::to_value(&recs[0]).unwrap();
        assert_eq!(json["priority"], "CRITICAL");
        assert_eq!(json["dominantDetector"], "demographic_ratio");
    }
}
