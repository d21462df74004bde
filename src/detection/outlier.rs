//! Rule-based outlier tests: statistical (z-score, modified z-score, IQR)
//! and fuel-market domain rules.

use super::detector::DetectorConfig;
use crate::transform::{pct_change, rolling_std};
use crate::utils::stats::{mad, mean, median, population_std, quantile, std_dev};

/// Scale factor turning MAD into a consistent estimate of σ (0.75 quantile of N(0,1)).
const MAD_CONSISTENCY: f64 = 0.6745;

/// One flagged observation produced by a single detection method.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Flag {
    pub index: usize,
    pub score: f64,
    pub tag: String,
}

/// Absolute z-scores using the population standard deviation; all zero for a constant series.
pub fn z_scores(values: &[f64]) -> Vec<f64> {
    let m = mean(values);
    let sd = population_std(values);
    if values.is_empty() || sd < 1e-10 {
        return vec![0.0; values.len()];
    }
    values.iter().map(|x| ((x - m) / sd).abs()).collect()
}

/// Absolute modified z-scores `0.6745·(x − median)/MAD`, or `None` when MAD is zero.
pub fn modified_z_scores(values: &[f64]) -> Option<Vec<f64>> {
    if values.is_empty() {
        return None;
    }
    let med = median(values);
    let spread = mad(values);
    if spread <= 0.0 || !spread.is_finite() {
        return None;
    }
    Some(
        values
            .iter()
            .map(|x| (MAD_CONSISTENCY * (x - med) / spread).abs())
            .collect(),
    )
}

/// Tukey fences `[Q1 − k·IQR, Q3 + k·IQR]` with linearly interpolated quartiles.
pub fn iqr_bounds(values: &[f64], multiplier: f64) -> (f64, f64) {
    let q1 = quantile(values, 0.25);
    let q3 = quantile(values, 0.75);
    let iqr = q3 - q1;
    (q1 - multiplier * iqr, q3 + multiplier * iqr)
}

/// Union of the three statistical tests. Score is |z|; tags name the tests that fired.
pub(crate) fn statistical_flags(values: &[f64], config: &DetectorConfig) -> Vec<Flag> {
    let z = z_scores(values);
    let modified = modified_z_scores(values);
    let (lower, upper) = iqr_bounds(values, config.iqr_multiplier);

    let mut flags = Vec::new();
    for (i, &x) in values.iter().enumerate() {
        let mut tags = Vec::new();
        if z[i] > config.z_threshold {
            tags.push("zscore");
        }
        if modified.as_ref().map_or(false, |m| m[i] > config.modified_z_threshold) {
            tags.push("modified_zscore");
        }
        if x < lower || x > upper {
            tags.push("iqr");
        }
        if !tags.is_empty() {
            flags.push(Flag {
                index: i,
                score: z[i],
                tag: tags.join("|"),
            });
        }
    }
    flags
}

/// Domain rules for retail fuel prices.
///
/// - `price_spike`: single-day |change| above the daily limit
/// - `high_volatility`: rolling std above a fraction of the series std
/// - `supply_disruption`: a run of consecutive large moves, flagged at its peak
///
/// An index is reported once, under the first rule that caught it.
pub(crate) fn domain_flags(values: &[f64], config: &DetectorConfig) -> Vec<Flag> {
    let changes: Vec<f64> = pct_change(values).iter().map(|c| c.abs()).collect();
    let mut flags: Vec<Flag> = Vec::new();
    let mut seen = vec![false; values.len()];

    for (i, &c) in changes.iter().enumerate() {
        if c.is_finite() && c > config.daily_change_limit {
            seen[i] = true;
            flags.push(Flag {
                index: i,
                score: c,
                tag: "price_spike".to_string(),
            });
        }
    }

    let limit = config.volatility_limit * std_dev(values);
    for (i, &vol) in rolling_std(values, config.volatility_window).iter().enumerate() {
        if vol.is_finite() && vol > limit && !seen[i] {
            seen[i] = true;
            flags.push(Flag {
                index: i,
                score: vol,
                tag: "high_volatility".to_string(),
            });
        }
    }

    for (i, score) in consecutive_move_peaks(&changes, config.disruption_threshold, config.disruption_run) {
        if !seen[i] {
            seen[i] = true;
            flags.push(Flag {
                index: i,
                score,
                tag: "supply_disruption".to_string(),
            });
        }
    }

    flags.sort_by_key(|f| f.index);
    flags
}

/// Peaks of runs of at least `min_run` consecutive |changes| above `threshold`.
///
/// Undefined changes are skipped without breaking a run. Only runs closed by
/// a smaller change count; a run still open at the end of the series is not
/// reported.
fn consecutive_move_peaks(abs_changes: &[f64], threshold: f64, min_run: usize) -> Vec<(usize, f64)> {
    let mut peaks = Vec::new();
    let mut run: Vec<usize> = Vec::new();
    let close = |run: &mut Vec<usize>, peaks: &mut Vec<(usize, f64)>| {
        if run.len() >= min_run {
            let peak = run.iter().copied().fold(run[0], |best, i| {
                if abs_changes[i] > abs_changes[best] {
                    i
                } else {
                    best
                }
            });
            peaks.push((peak, abs_changes[peak]));
        }
        run.clear();
    };

    for (i, &c) in abs_changes.iter().enumerate() {
        if !c.is_finite() {
            continue;
        }
        if c > threshold {
            run.push(i);
        } else {
            close(&mut run, &mut peaks);
        }
    }
    peaks
}
