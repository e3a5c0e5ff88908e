#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Forensic signal engine for administrative update analytics.
//!
//! Turns three raw count tables into per-location, per-period risk scores:
//! aggregation to a common grain, causal rolling baselines, same-day
//! spatial baselines, a five-detector bank and a weighted composite, plus
//! a period-level rollup for reporting.
//!
//! Scores indicate statistical deviation that may merit administrative
//! review. They are not evidence of wrongdoing and say nothing about any
//! individual.

pub mod aggregate;
pub mod composite;
pub mod detectors;
pub mod pipeline;
pub mod progress;
pub mod rolling;
pub mod rollup;
pub mod spatial;
pub mod stats;

use chrono::NaiveDate;
use enrol_signal_forensic_models::{ConfigError, RollingBaseline, SpatialBaseline};
use enrol_signal_records_models::LocationPeriodRecord;
use thiserror::Error;

pub use pipeline::{ForensicInputs, ForensicPipeline, ForensicReport};
pub use progress::{NullProgress, ProgressCallback, null_progress};

/// Errors that can occur while running the forensic pipeline.
#[derive(Debug, Error)]
pub enum ForensicError {
    /// The configuration failed validation.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Postal-code grain was forced but an input row has no postal code.
    #[error("{table} row for {state} / {district} on {date} has no postal code")]
    MissingPostalCode {
        /// Input table the row came from.
        table: &'static str,
        /// Date of the offending row.
        date: NaiveDate,
        /// State of the offending row.
        state: String,
        /// District of the offending row.
        district: String,
    },
}

/// A merged record with its rolling and spatial baselines attached, ready
/// for the detector bank.
#[derive(Debug, Clone, PartialEq)]
pub struct BaselinedRecord {
    /// Merged counts and ratios.
    pub record: LocationPeriodRecord,
    /// Causal rolling statistics.
    pub rolling: RollingBaseline,
    /// Same-day peer statistics.
    pub spatial: SpatialBaseline,
}
