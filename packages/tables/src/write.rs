//! Flat CSV and JSON writers for pipeline output.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::NaiveDate;
use enrol_signal_forensic_models::{RiskTier, RiskTierThresholds, RollupRow, ScoredRecord};
use serde::Serialize;

use crate::TableError;

/// One row of `forensic_scores.csv`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCsvRow<'a> {
    pub date: NaiveDate,
    pub state: &'a str,
    pub district: &'a str,
    pub postal_code: Option<&'a str>,
    pub age_0_5: u64,
    pub age_5_17: u64,
    pub age_18_plus: u64,
    pub adult_enrollment: u64,
    pub total_enrollment: u64,
    pub biometric_update_count: u64,
    pub demographic_update_count: u64,
    pub adult_ratio: f64,
    pub bio_per_adult: f64,
    pub demo_per_adult: f64,
    pub adult_7d_mean: f64,
    pub adult_7d_std: f64,
    pub adult_30d_mean: f64,
    pub adult_90d_p75: f64,
    pub adult_90d_p90: f64,
    pub adult_90d_p99: f64,
    pub prev_7d: Option<u64>,
    pub prev_30d: Option<u64>,
    pub growth_7d_pct: f64,
    pub growth_30d_pct: f64,
    pub district_median_adult: f64,
    pub district_std_adult: f64,
    pub state_median_adult: f64,
    pub spatial_z_score: f64,
    pub algo1_score: f64,
    pub algo2_score: f64,
    pub algo3_score: f64,
    pub algo4_score: f64,
    pub algo5_score: f64,
    pub risk_score: f64,
    pub risk_score_norm: f64,
}

impl<'a> From<&'a ScoredRecord> for ScoredCsvRow<'a> {
    fn from(s: &'a ScoredRecord) -> Self {
        let r = &s.record;
        Self {
            date: r.date,
            state: &r.location.state,
            district: &r.location.district,
            postal_code: r.location.postal_code.as_deref(),
            age_0_5: r.age_0_5_enrolments,
            age_5_17: r.age_5_17_enrolments,
            age_18_plus: r.age_18_plus_enrolments,
            adult_enrollment: r.adult_enrollment,
            total_enrollment: r.total_enrollment,
            biometric_update_count: r.biometric_update_count,
            demographic_update_count: r.demographic_update_count,
            adult_ratio: r.adult_ratio,
            bio_per_adult: r.bio_per_adult,
            demo_per_adult: r.demo_per_adult,
            adult_7d_mean: s.rolling.adult_7d_mean,
            adult_7d_std: s.rolling.adult_7d_std,
            adult_30d_mean: s.rolling.adult_30d_mean,
            adult_90d_p75: s.rolling.adult_90d_p75,
            adult_90d_p90: s.rolling.adult_90d_p90,
            adult_90d_p99: s.rolling.adult_90d_p99,
            prev_7d: s.rolling.prev_7d,
            prev_30d: s.rolling.prev_30d,
            growth_7d_pct: s.rolling.growth_7d_pct,
            growth_30d_pct: s.rolling.growth_30d_pct,
            district_median_adult: s.spatial.district_median_adult,
            district_std_adult: s.spatial.district_std_adult,
            state_median_adult: s.spatial.state_median_adult,
            spatial_z_score: s.spatial.spatial_z_score,
            algo1_score: s.scores.algo1_score,
            algo2_score: s.scores.algo2_score,
            algo3_score: s.scores.algo3_score,
            algo4_score: s.scores.algo4_score,
            algo5_score: s.scores.algo5_score,
            risk_score: s.risk.risk_score,
            risk_score_norm: s.risk.risk_score_norm,
        }
    }
}

/// One row of `forensic_rollup.csv`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollupCsvRow<'a> {
    pub period_start: NaiveDate,
    pub state: &'a str,
    pub district: &'a str,
    pub postal_code: Option<&'a str>,
    pub record_count: u64,
    pub adult_enrollment: u64,
    pub total_enrollment: u64,
    pub biometric_update_count: u64,
    pub demographic_update_count: u64,
    pub risk_score_norm: f64,
    pub risk_tier: RiskTier,
    pub algo1_score: f64,
    pub algo2_score: f64,
    pub algo3_score: f64,
    pub algo4_score: f64,
    pub algo5_score: f64,
}

impl<'a> RollupCsvRow<'a> {
    /// Flattens a rollup row, classifying its mean risk.
    #[must_use]
    pub fn new(row: &'a RollupRow, thresholds: &RiskTierThresholds) -> Self {
        Self {
            period_start: row.period_start,
            state: &row.location.state,
            district: &row.location.district,
            postal_code: row.location.postal_code.as_deref(),
            record_count: row.record_count,
            adult_enrollment: row.adult_enrollment,
            total_enrollment: row.total_enrollment,
            biometric_update_count: row.biometric_update_count,
            demographic_update_count: row.demographic_update_count,
            risk_score_norm: row.risk_score_norm,
            risk_tier: thresholds.classify(row.risk_score_norm),
            algo1_score: row.scores.algo1_score,
            algo2_score: row.scores.algo2_score,
            algo3_score: row.scores.algo3_score,
            algo4_score: row.scores.algo4_score,
            algo5_score: row.scores.algo5_score,
        }
    }
}

fn serialize_rows<W: Write, T: Serialize>(
    table: &'static str,
    sink: W,
    rows: impl IntoIterator<Item = T>,
) -> Result<(), TableError> {
    let mut writer = csv::Writer::from_writer(sink);
    for row in rows {
        writer
            .serialize(row)
            .map_err(|source| TableError::Csv { table, source })?;
    }
    writer.flush().map_err(|source| TableError::Csv {
        table,
        source: source.into(),
    })
}

/// Writes the per-record table as CSV.
///
/// # Errors
///
/// * If writing to `sink` fails
pub fn write_scored_csv(sink: impl Write, records: &[ScoredRecord]) -> Result<(), TableError> {
    serialize_rows("scored", sink, records.iter().map(ScoredCsvRow::from))
}

/// Writes the rollup table as CSV.
///
/// # Errors
///
/// * If writing to `sink` fails
pub fn write_rollup_csv(
    sink: impl Write,
    rows: &[RollupRow],
    thresholds: &RiskTierThresholds,
) -> Result<(), TableError> {
    serialize_rows(
        "rollup",
        sink,
        rows.iter().map(|row| RollupCsvRow::new(row, thresholds)),
    )
}

/// Creates `path` and returns a buffered writer to it.
///
/// # Errors
///
/// * If the file cannot be created
pub fn create(path: &Path) -> Result<BufWriter<File>, TableError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| TableError::Io {
            path: path.display().to_string(),
            source,
        })
}

/// Writes `value` to `path` as pretty-printed JSON.
///
/// # Errors
///
/// * If the file cannot be created or written
/// * If `value` fails to serialize
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), TableError> {
    let mut writer = create(path)?;
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush().map_err(|source| TableError::Io {
        path: path.display().to_string(),
        source,
    })?;
    log::debug!("Wrote {}", path.display());
    Ok(())
}
