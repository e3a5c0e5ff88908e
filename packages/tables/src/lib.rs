#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Table I/O for the forensic pipeline.
//!
//! Reads the three upstream count tables from CSV, writes the scored and
//! rolled-up tables back out as flat CSV, writes JSON reports, and loads
//! the TOML policy file. Input is assumed to be already cleaned upstream;
//! anything that does not parse is reported as an error rather than
//! skipped.

pub mod config;
pub mod read;
pub mod write;

use thiserror::Error;

pub use config::{default_config_toml, load_config, parse_config};
pub use read::{
    load_biometric, load_demographic, load_enrolment, read_biometric, read_demographic,
    read_enrolment,
};
pub use write::{
    RollupCsvRow, ScoredCsvRow, write_json, write_rollup_csv, write_scored_csv,
};

/// Errors from reading or writing tables.
#[derive(Debug, Error)]
pub enum TableError {
    /// I/O error on a file.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// CSV reading or writing error.
    #[error("CSV error in {table} table: {source}")]
    Csv {
        /// Table being read or written.
        table: &'static str,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// A required column is absent from the header row.
    #[error("{table} table has no column for {column} (accepted headers: {accepted})")]
    MissingColumn {
        /// Table being read.
        table: &'static str,
        /// Logical column name.
        column: &'static str,
        /// Header names that would have matched.
        accepted: String,
    },

    /// A date cell could not be parsed.
    #[error("{table} table line {line}: invalid date {value:?}")]
    InvalidDate {
        /// Table being read.
        table: &'static str,
        /// 1-based line number in the file.
        line: u64,
        /// The raw cell.
        value: String,
    },

    /// A count cell is not a non-negative whole number.
    #[error("{table} table line {line}: invalid {column} count {value:?}")]
    InvalidCount {
        /// Table being read.
        table: &'static str,
        /// 1-based line number in the file.
        line: u64,
        /// Logical column name.
        column: &'static str,
        /// The raw cell.
        value: String,
    },

    /// TOML parse error.
    #[error("Invalid TOML configuration: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("Failed to serialize configuration: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
