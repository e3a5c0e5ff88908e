//! Exact summary statistics over non-negative counts.
//!
//! Sums are kept as integers so that a window of identical counts has a
//! mean equal to that count and a standard deviation of exactly zero.
//! Running sums let the trailing windows slide in a single pass per
//! location instead of re-scanning each window.

use chrono::NaiveDate;

/// Mean and sample standard deviation of a set of counts.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindowStats {
    /// Number of observations.
    pub count: u64,
    /// Arithmetic mean (0 when empty).
    pub mean: f64,
    /// Sample (n - 1) standard deviation, 0 with fewer than two points.
    pub std: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct RunningSums {
    n: u64,
    sum: u128,
    sum_sq: u128,
}

impl RunningSums {
    fn push(&mut self, value: u64) {
        let v = u128::from(value);
        self.n += 1;
        self.sum += v;
        self.sum_sq = self.sum_sq.saturating_add(v * v);
    }

    fn pop(&mut self, value: u64) {
        let v = u128::from(value);
        self.n -= 1;
        self.sum -= v;
        self.sum_sq = self.sum_sq.saturating_sub(v * v);
    }

    #[allow(clippy::cast_precision_loss)]
    fn stats(&self) -> WindowStats {
        if self.n == 0 {
            return WindowStats::default();
        }

        let n = u128::from(self.n);
        let mean = self.sum as f64 / n as f64;
        let std = if self.n < 2 {
            0.0
        } else {
            // n * sum_sq - sum^2 is never negative; fall back to floats only
            // if the integer products overflow.
            let variance = n
                .checked_mul(self.sum_sq)
                .zip(self.sum.checked_mul(self.sum))
                .map_or_else(
                    || {
                        let s = self.sum as f64;
                        (self.sum_sq as f64 - s * s / n as f64) / (n - 1) as f64
                    },
                    |(a, b)| a.saturating_sub(b) as f64 / (n * (n - 1)) as f64,
                );
            variance.max(0.0).sqrt()
        };

        WindowStats {
            count: self.n,
            mean,
            std,
        }
    }
}

/// Summarizes a set of counts.
#[must_use]
pub fn summarize(values: &[u64]) -> WindowStats {
    let mut sums = RunningSums::default();
    for &v in values {
        sums.push(v);
    }
    sums.stats()
}

/// Median of a set of counts; the mean of the two middle values when the
/// count is even. Returns 0 for an empty set.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn median(values: &mut [u64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid] as f64
    } else {
        (values[mid - 1] as f64 + values[mid] as f64) / 2.0
    }
}

/// Trailing calendar-window statistics for one location's series.
///
/// `dates` must be strictly ascending and aligned with `values`. The
/// window for row `i` holds every row whose date lies in
/// `(dates[i] - window_days, dates[i]]`, so gaps in reporting shrink the
/// number of points rather than stretching the window back in time. Only
/// rows at or before `i` are ever read.
#[must_use]
pub fn trailing_window_stats(
    dates: &[NaiveDate],
    values: &[u64],
    window_days: u32,
) -> Vec<WindowStats> {
    debug_assert_eq!(dates.len(), values.len());

    let window = i64::from(window_days);
    let mut out = Vec::with_capacity(values.len());
    let mut sums = RunningSums::default();
    let mut left = 0;

    for (i, (&date, &value)) in dates.iter().zip(values).enumerate() {
        sums.push(value);
        while left < i && (date - dates[left]).num_days() >= window {
            sums.pop(values[left]);
            left += 1;
        }
        out.push(sums.stats());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    #[test]
    fn summarize_matches_sample_std() {
        let s = summarize(&[2, 4, 4, 4, 5, 5, 7, 9]);
        assert_eq!(s.count, 8);
        assert!((s.mean - 5.0).abs() < 1e-12);
        // Sample variance = 32 / 7.
        assert!((s.std - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn single_point_has_zero_std() {
        let s = summarize(&[42]);
        assert!((s.mean - 42.0).abs() < f64::EPSILON);
        assert!(s.std.abs() < f64::EPSILON);
    }

    #[test]
    fn constant_series_is_exact() {
        let s = summarize(&[10; 30]);
        assert!((s.mean - 10.0).abs() < f64::EPSILON);
        assert!(s.std.abs() < f64::EPSILON);
    }

    #[test]
    fn empty_summary_is_zero() {
        assert_eq!(summarize(&[]), WindowStats::default());
    }

    #[test]
    fn median_odd_and_even() {
        assert!((median(&mut [5, 1, 3]) - 3.0).abs() < f64::EPSILON);
        assert!((median(&mut [4, 1, 3, 2]) - 2.5).abs() < f64::EPSILON);
        assert!(median(&mut []).abs() < f64::EPSILON);
    }

    #[test]
    fn window_slides_by_calendar_days() {
        let dates = [day(1), day(2), day(3), day(9)];
        let values = [1, 2, 3, 100];
        let stats = trailing_window_stats(&dates, &values, 7);

        assert_eq!(stats[2].count, 3);
        assert!((stats[2].mean - 2.0).abs() < 1e-12);
        // Day 9 looks back to (day 2, day 9], so days 3 and 9 remain.
        assert_eq!(stats[3].count, 2);
        assert!((stats[3].mean - 51.5).abs() < 1e-12);
    }

    #[test]
    fn window_after_long_gap_holds_only_current_row() {
        let dates = [day(1), day(20)];
        let stats = trailing_window_stats(&dates, &[7, 9], 7);
        assert_eq!(stats[1].count, 1);
        assert!((stats[1].mean - 9.0).abs() < f64::EPSILON);
        assert!(stats[1].std.abs() < f64::EPSILON);
    }

    #[test]
    fn window_includes_exactly_n_days() {
        let dates: Vec<NaiveDate> = (1..=8).map(day).collect();
        let stats = trailing_window_stats(&dates, &[1; 8], 7);
        assert_eq!(stats[6].count, 7);
        assert_eq!(stats[7].count, 7);
    }
}
