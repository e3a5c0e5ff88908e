//! Causal rolling baselines per location.
//!
//! Windows are calendar windows over each location's own series, so a
//! row's baseline depends only on rows of the same location dated at or
//! before it. Appending later rows never changes an earlier baseline.
//!
//! The long-window percentiles are normal approximations
//! (`mean + z * std`), not empirical quantiles. They underestimate upper
//! tails of right-skewed series; every temporal threshold is calibrated
//! against this approximation, so switching to exact quantiles changes the
//! detector's sensitivity.

use chrono::{Duration, NaiveDate};
use enrol_signal_forensic_models::config::RollingConfig;
use enrol_signal_forensic_models::{LagMode, RollingBaseline};
use enrol_signal_records_models::LocationPeriodRecord;

use crate::stats::trailing_window_stats;

/// Builds one [`RollingBaseline`] per record, aligned by index.
///
/// `records` must be sorted by location, then date, as produced by
/// [`crate::aggregate::merge_signals`].
#[must_use]
pub fn build_rolling_baselines(
    records: &[LocationPeriodRecord],
    config: &RollingConfig,
    epsilon: f64,
) -> Vec<RollingBaseline> {
    debug_assert!(
        records
            .windows(2)
            .all(|w| (&w[0].location, w[0].date) < (&w[1].location, w[1].date)),
        "records must be sorted by location and date"
    );

    let mut baselines = Vec::with_capacity(records.len());

    for group in records.chunk_by(|a, b| a.location == b.location) {
        let dates: Vec<NaiveDate> = group.iter().map(|r| r.date).collect();
        let values: Vec<u64> = group.iter().map(|r| r.adult_enrollment).collect();

        let short = trailing_window_stats(&dates, &values, config.short_window_days);
        let medium = trailing_window_stats(&dates, &values, config.medium_window_days);
        let long = trailing_window_stats(&dates, &values, config.long_window_days);

        for i in 0..group.len() {
            let prev_7d = lagged(&dates, &values, i, config.short_lag, config.lag_mode);
            let prev_30d = lagged(&dates, &values, i, config.long_lag, config.lag_mode);

            baselines.push(RollingBaseline {
                adult_7d_mean: short[i].mean,
                adult_7d_std: short[i].std,
                adult_30d_mean: medium[i].mean,
                adult_90d_mean: long[i].mean,
                adult_90d_std: long[i].std,
                adult_90d_p75: config.p75_z.mul_add(long[i].std, long[i].mean),
                adult_90d_p90: config.p90_z.mul_add(long[i].std, long[i].mean),
                adult_90d_p99: config.p99_z.mul_add(long[i].std, long[i].mean),
                prev_7d,
                prev_30d,
                growth_7d_pct: growth(values[i], prev_7d, epsilon),
                growth_30d_pct: growth(values[i], prev_30d, epsilon),
            });
        }
    }

    log::debug!(
        "Built rolling baselines for {} records ({:?} lag)",
        baselines.len(),
        config.lag_mode
    );

    baselines
}

/// Value `lag` rows or `lag` days before row `i`, looking only backwards.
fn lagged(dates: &[NaiveDate], values: &[u64], i: usize, lag: u32, mode: LagMode) -> Option<u64> {
    match mode {
        LagMode::Rows => i
            .checked_sub(usize::try_from(lag).ok()?)
            .map(|j| values[j]),
        LagMode::Days => {
            let target = dates[i] - Duration::days(i64::from(lag));
            dates[..i]
                .binary_search(&target)
                .ok()
                .map(|j| values[j])
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn growth(current: u64, previous: Option<u64>, epsilon: f64) -> f64 {
    previous.map_or(0.0, |prev| {
        (current as f64 - prev as f64) / (prev as f64 + epsilon)
    })
}
