#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reporting views derived from forensic scores.
//!
//! Everything here is a total function of already-scored rows: signal
//! summaries, area rankings, volume surges and prioritized recommendations
//! for administrative review.

pub mod ranking;
pub mod recommendations;
pub mod summary;
pub mod surge;

use enrol_signal_forensic_models::{DetectorScores, RollupRow, ScoredRecord};
use enrol_signal_records_models::LocationKey;

pub use ranking::{AreaLevel, AreaRanking, DEFAULT_TOP_N, top_areas};
pub use recommendations::{PEAK_SCORE_THRESHOLD, Priority, Recommendation, recommend};
pub use summary::{SignalSummary, TierCounts, summarize};
pub use surge::{Surge, SurgeConfig, SurgeKind, SurgeMetric, detect_surges};

/// A row that carries a location, a 0-100 risk value and detector scores.
///
/// Implemented for both per-day [`ScoredRecord`]s and period-level
/// [`RollupRow`]s so the same summaries work on either view.
pub trait RiskRow {
    /// Location of the row.
    fn location(&self) -> &LocationKey;
    /// Normalized composite risk.
    fn risk_score_norm(&self) -> f64;
    /// Detector scores. Per-period maxima on rollup rows.
    fn scores(&self) -> DetectorScores;
}

impl RiskRow for ScoredRecord {
    fn location(&self) -> &LocationKey {
        &self.record.location
    }

    fn risk_score_norm(&self) -> f64 {
        self.risk.risk_score_norm
    }

    fn scores(&self) -> DetectorScores {
        self.scores
    }
}

impl RiskRow for RollupRow {
    fn location(&self) -> &LocationKey {
        &self.location
    }

    fn risk_score_norm(&self) -> f64 {
        self.risk_score_norm
    }

    fn scores(&self) -> DetectorScores {
        self.scores
    }
}
