//! Top-N area rankings by mean risk.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::RiskRow;

/// Number of areas reported per level unless asked otherwise.
pub const DEFAULT_TOP_N: usize = 5;

/// Administrative level to rank at.
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
pub enum AreaLevel {
    /// Whole states.
    State,
    /// Districts within a state.
    District,
    /// Individual postal codes.
    PostalCode,
}

/// One ranked area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaRanking {
    /// Level the area was grouped at.
    pub level: AreaLevel,
    /// Area label, e.g. `"Bihar / Patna"` at district level.
    pub area: String,
    /// Mean `risk_score_norm` across the area's rows.
    pub mean_risk: f64,
    /// Rows that contributed.
    pub row_count: u64,
}

fn area_label<R: RiskRow>(row: &R, level: AreaLevel) -> Option<String> {
    let loc = row.location();
    match level {
        AreaLevel::State => Some(loc.state.clone()),
        AreaLevel::District => Some(format!("{} / {}", loc.state, loc.district)),
        AreaLevel::PostalCode => loc.postal_code.as_ref().map(|_| loc.label()),
    }
}

/// Ranks areas at `level` by mean risk, highest first, returning at most
/// `n`. Ties are broken by area label.
///
/// Rows without a postal code are skipped at [`AreaLevel::PostalCode`].
#[must_use]
pub fn top_areas<R: RiskRow>(rows: &[R], level: AreaLevel, n: usize) -> Vec<AreaRanking> {
    let mut groups: BTreeMap<String, (f64, u64)> = BTreeMap::new();
    for row in rows {
        if let Some(area) = area_label(row, level) {
            let entry = groups.entry(area).or_default();
            entry.0 += row.risk_score_norm();
            entry.1 += 1;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let mut ranked: Vec<AreaRanking> = groups
        .into_iter()
        .map(|(area, (sum, count))| AreaRanking {
            level,
            area,
            mean_risk: sum / count as f64,
            row_count: count,
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.mean_risk
            .total_cmp(&a.mean_risk)
            .then_with(|| a.area.cmp(&b.area))
    });
    ranked.truncate(n);

    log::debug!("Ranked {} {level} areas", ranked.len());

    ranked
}
