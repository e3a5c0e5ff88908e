//! The explicit, immutable forensic pipeline.
//!
//! Each stage is a pure function of the previous stage's output:
//!
//! 1. [`merge_signals`] aggregates and joins the three input tables
//! 2. [`build_rolling_baselines`] and [`build_spatial_baselines`] attach
//!    causal and same-day peer statistics
//! 3. [`score_all`] runs the detector bank
//! 4. [`composite_risk`] blends the detectors into one headline score
//!
//! The pipeline holds only its validated configuration and a progress
//! sink, so running it twice on the same inputs yields the same report.

use std::sync::Arc;

use enrol_signal_forensic_models::{ForensicConfig, RollupInterval, RollupRow, ScoredRecord};
use enrol_signal_records_models::{
    BiometricRow, DemographicRow, EnrolmentRow, Granularity, LocatedRow,
};

use crate::aggregate::merge_signals;
use crate::composite::composite_risk;
use crate::detectors::score_all;
use crate::progress::{ProgressCallback, null_progress};
use crate::rollup::temporal_rollup;
use crate::rolling::build_rolling_baselines;
use crate::spatial::build_spatial_baselines;
use crate::{BaselinedRecord, ForensicError};

/// Borrowed views of the three input tables.
#[derive(Debug, Clone, Copy)]
pub struct ForensicInputs<'a> {
    /// New enrolments by age band.
    pub enrolment: &'a [EnrolmentRow],
    /// Biometric updates.
    pub biometric: &'a [BiometricRow],
    /// Demographic updates.
    pub demographic: &'a [DemographicRow],
}

/// Output of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct ForensicReport {
    /// Grain the run was aggregated at.
    pub granularity: Granularity,
    /// One scored record per location-date, sorted by location then date.
    pub records: Vec<ScoredRecord>,
}

impl ForensicReport {
    /// Period-level view of the scored records.
    #[must_use]
    pub fn rollup(&self, interval: RollupInterval) -> Vec<RollupRow> {
        temporal_rollup(&self.records, interval)
    }
}

/// Runs the forensic stages over a set of input tables.
pub struct ForensicPipeline {
    config: ForensicConfig,
    progress: Arc<dyn ProgressCallback>,
}

impl ForensicPipeline {
    /// Creates a pipeline with a validated configuration.
    ///
    /// # Errors
    ///
    /// * If the configuration fails [`ForensicConfig::validate`]
    pub fn new(config: ForensicConfig) -> Result<Self, ForensicError> {
        config.validate()?;
        Ok(Self {
            config,
            progress: null_progress(),
        })
    }

    /// Reports stage progress to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// The configuration this pipeline runs with.
    #[must_use]
    pub const fn config(&self) -> &ForensicConfig {
        &self.config
    }

    /// Chooses the aggregation grain for `inputs`.
    ///
    /// Without a forced grain, postal-code grain is used only when every
    /// row of every table carries a postal code.
    ///
    /// # Errors
    ///
    /// * If postal-code grain is forced but some row has no postal code
    pub fn resolve_granularity(
        &self,
        inputs: &ForensicInputs<'_>,
    ) -> Result<Granularity, ForensicError> {
        match self.config.granularity {
            Some(Granularity::Pincode) => {
                check_postal_codes("enrolment", inputs.enrolment)?;
                check_postal_codes("biometric", inputs.biometric)?;
                check_postal_codes("demographic", inputs.demographic)?;
                Ok(Granularity::Pincode)
            }
            Some(Granularity::District) => Ok(Granularity::District),
            None => {
                let resolved =
                    Granularity::resolve(inputs.enrolment, inputs.biometric, inputs.demographic);
                if resolved == Granularity::District {
                    log::warn!("Not every row carries a postal code; aggregating at district grain");
                }
                Ok(resolved)
            }
        }
    }

    /// Runs every stage and returns the scored records.
    ///
    /// # Errors
    ///
    /// * If the aggregation grain cannot be resolved
    pub fn run(&self, inputs: &ForensicInputs<'_>) -> Result<ForensicReport, ForensicError> {
        let granularity = self.resolve_granularity(inputs)?;
        let eps = self.config.epsilon;

        if inputs.enrolment.is_empty() {
            log::warn!("Enrolment table is empty");
        }

        self.progress.set_total(4);

        self.progress.set_message("Aggregating signals".to_string());
        let records = merge_signals(
            inputs.enrolment,
            inputs.biometric,
            inputs.demographic,
            granularity,
            eps,
        );
        log::info!("Aggregated {} location-period records at {granularity} grain", records.len());
        self.progress.inc(1);

        self.progress.set_message("Building baselines".to_string());
        let rolling = build_rolling_baselines(&records, &self.config.rolling, eps);
        let spatial = build_spatial_baselines(&records, eps);
        self.progress.inc(1);

        self.progress.set_message("Running detectors".to_string());
        let baselined: Vec<BaselinedRecord> = records
            .into_iter()
            .zip(rolling)
            .zip(spatial)
            .map(|((record, rolling), spatial)| BaselinedRecord {
                record,
                rolling,
                spatial,
            })
            .collect();
        let scores = score_all(&baselined, &self.config);
        self.progress.inc(1);

        self.progress.set_message("Scoring composite risk".to_string());
        let records: Vec<ScoredRecord> = baselined
            .into_iter()
            .zip(scores)
            .map(|(row, scores)| ScoredRecord {
                risk: composite_risk(&scores, &self.config.weights),
                record: row.record,
                rolling: row.rolling,
                spatial: row.spatial,
                scores,
            })
            .collect();
        self.progress.inc(1);

        let flagged = records
            .iter()
            .filter(|r| r.risk.risk_score_norm >= self.config.tiers.elevated)
            .count();
        log::info!(
            "Scored {} records, {flagged} at or above the elevated tier",
            records.len()
        );
        self.progress
            .finish(format!("Scored {} records", records.len()));

        Ok(ForensicReport {
            granularity,
            records,
        })
    }

    /// Runs the pipeline and rolls the result up with the configured
    /// interval.
    ///
    /// # Errors
    ///
    /// * If [`Self::run`] fails
    pub fn run_with_rollup(
        &self,
        inputs: &ForensicInputs<'_>,
    ) -> Result<(ForensicReport, Vec<RollupRow>), ForensicError> {
        let report = self.run(inputs)?;
        let rollup = report.rollup(self.config.rollup);
        log::info!("Rolled up into {} period rows", rollup.len());
        Ok((report, rollup))
    }
}

fn check_postal_codes<R: LocatedRow>(table: &'static str, rows: &[R]) -> Result<(), ForensicError> {
    match rows.iter().find(|r| r.postal_code().is_none()) {
        Some(row) => Err(ForensicError::MissingPostalCode {
            table,
            date: row.date(),
            state: row.state().to_string(),
            district: row.district().to_string(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use enrol_signal_forensic_models::ConfigError;

    use super::*;

    fn enrol(pin: Option<&str>, adult: u64) -> EnrolmentRow {
        EnrolmentRow {
            date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            state: "Goa".to_string(),
            district: "North Goa".to_string(),
            postal_code: pin.map(str::to_string),
            age_0_5: 0,
            age_5_17: 0,
            age_18_plus: adult,
        }
    }

    #[test]
    fn rejects_invalid_config() {
        let mut config = ForensicConfig::default();
        config.weights.spatial = 0.9;
        assert!(matches!(
            ForensicPipeline::new(config),
            Err(ForensicError::Config(ConfigError::WeightSum { .. }))
        ));
    }

    #[test]
    fn falls_back_to_district_grain() {
        let enrolment = vec![enrol(Some("403001"), 5), enrol(None, 5)];
        let inputs = ForensicInputs {
            enrolment: &enrolment,
            biometric: &[],
            demographic: &[],
        };
        let pipeline = ForensicPipeline::new(ForensicConfig::default()).unwrap();
        let report = pipeline.run(&inputs).unwrap();
        assert_eq!(report.granularity, Granularity::District);
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].record.adult_enrollment, 10);
    }

    #[test]
    fn forced_pincode_grain_requires_postal_codes() {
        let enrolment = vec![enrol(None, 5)];
        let inputs = ForensicInputs {
            enrolment: &enrolment,
            biometric: &[],
            demographic: &[],
        };
        let config = ForensicConfig {
            granularity: Some(Granularity::Pincode),
            ..ForensicConfig::default()
        };
        let pipeline = ForensicPipeline::new(config).unwrap();
        assert!(matches!(
            pipeline.run(&inputs),
            Err(ForensicError::MissingPostalCode {
                table: "enrolment",
                ..
            })
        ));
    }

    #[test]
    fn empty_inputs_give_empty_report() {
        let inputs = ForensicInputs {
            enrolment: &[],
            biometric: &[],
            demographic: &[],
        };
        let pipeline = ForensicPipeline::new(ForensicConfig::default()).unwrap();
        let (report, rollup) = pipeline.run_with_rollup(&inputs).unwrap();
        assert!(report.records.is_empty());
        assert!(rollup.is_empty());
    }
}
