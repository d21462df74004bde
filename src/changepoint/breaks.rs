//! Structural break detection: level shifts, variance changes and trend changes.
//!
//! The three detectors run independently and their findings are merged by
//! date without deduplication, so one day may carry several break kinds.

use crate::core::TimeSeries;
use crate::transform::{diff, pct_change, rolling_mean, rolling_std};
use crate::utils::stats::{mean, population_std, quantile};
use chrono::NaiveDate;
use tracing::debug;

/// Kind of structural change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakKind {
    LevelShift,
    VarianceChange,
    TrendChange,
}

impl BreakKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakKind::LevelShift => "level_shift",
            BreakKind::VarianceChange => "variance_change",
            BreakKind::TrendChange => "trend_change",
        }
    }
}

/// A detected break.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuralBreak {
    pub date: NaiveDate,
    pub index: usize,
    pub kind: BreakKind,
    /// Detector statistic relative to its threshold (≥ 0).
    pub significance: f64,
}

/// Configuration for [`detect_structural_breaks`].
#[derive(Debug, Clone, PartialEq)]
pub struct BreakConfig {
    /// Minimum distance between reported level shifts, and minimum index of the first.
    pub min_segment_length: usize,
    /// CUSUM slack as a multiple of the series standard deviation.
    pub cusum_slack: f64,
    /// CUSUM decision threshold as a multiple of the series standard deviation.
    pub cusum_threshold: f64,
    /// Rolling windows are at least this long.
    pub min_window: usize,
    /// Percentile above which variance and trend changes are flagged.
    pub change_quantile: f64,
}

impl Default for BreakConfig {
    fn default() -> Self {
        Self {
            min_segment_length: 30,
            cusum_slack: 0.5,
            cusum_threshold: 4.0,
            min_window: 30,
            change_quantile: 0.95,
        }
    }
}

impl BreakConfig {
    pub fn with_min_segment_length(mut self, min_segment_length: usize) -> Self {
        self.min_segment_length = min_segment_length;
        self
    }

    fn window(&self) -> usize {
        self.min_window.max(self.min_segment_length)
    }
}

/// Run all three detectors and merge their results in date order.
pub fn detect_structural_breaks(series: &TimeSeries, config: &BreakConfig) -> Vec<StructuralBreak> {
    let values = series.values();
    let dates = series.dates();
    let tagged = |kind: BreakKind, found: Vec<(usize, f64)>| {
        found.into_iter().map(move |(index, significance)| StructuralBreak {
            date: dates[index],
            index,
            kind,
            significance,
        })
    };

    let mut breaks: Vec<StructuralBreak> = tagged(BreakKind::LevelShift, cusum_level_shifts(values, config))
        .chain(tagged(BreakKind::VarianceChange, variance_changes(values, config)))
        .chain(tagged(BreakKind::TrendChange, trend_changes(values, config)))
        .collect();
    breaks.sort_by_key(|b| b.index);

    debug!(
        series = series.name(),
        level = breaks.iter().filter(|b| b.kind == BreakKind::LevelShift).count(),
        variance = breaks.iter().filter(|b| b.kind == BreakKind::VarianceChange).count(),
        trend = breaks.iter().filter(|b| b.kind == BreakKind::TrendChange).count(),
        "structural breaks detected"
    );
    breaks
}

/// Two-sided CUSUM against the global mean.
///
/// A crossing of `h = cusum_threshold·σ` is reported only at
/// `i ≥ min_segment_length` and at least `min_segment_length` after the previous
/// report; reporting resets both accumulators.
pub fn cusum_level_shifts(values: &[f64], config: &BreakConfig) -> Vec<(usize, f64)> {
    let sigma = population_std(values);
    if values.len() < 2 || sigma <= 0.0 || !sigma.is_finite() {
        return Vec::new();
    }
    let mu = mean(values);
    let k = config.cusum_slack * sigma;
    let h = config.cusum_threshold * sigma;
    let min_seg = config.min_segment_length;

    let mut pos = 0.0_f64;
    let mut neg = 0.0_f64;
    let mut last: Option<usize> = None;
    let mut breaks = Vec::new();
    for (i, &x) in values.iter().enumerate().skip(1) {
        pos = (pos + x - mu - k).max(0.0);
        neg = (neg - x + mu - k).max(0.0);
        if (pos > h || neg > h)
            && i >= min_seg
            && last.map_or(true, |l| i - l >= min_seg)
        {
            breaks.push((i, pos.max(neg) / h));
            last = Some(i);
            pos = 0.0;
            neg = 0.0;
        }
    }
    breaks
}

/// Absolute percentage change of the rolling standard deviation above its upper percentile.
pub fn variance_changes(values: &[f64], config: &BreakConfig) -> Vec<(usize, f64)> {
    let std = rolling_std(values, config.window());
    let change: Vec<f64> = pct_change(&std).iter().map(|c| c.abs()).collect();
    flag_above_quantile(&change, config.change_quantile, tolerance(values))
}

/// Absolute second difference of the rolling mean above its upper percentile.
pub fn trend_changes(values: &[f64], config: &BreakConfig) -> Vec<(usize, f64)> {
    let slope = diff(&rolling_mean(values, config.window()));
    let change: Vec<f64> = diff(&slope).iter().map(|c| c.abs()).collect();
    flag_above_quantile(&change, config.change_quantile, tolerance(values))
}

fn tolerance(values: &[f64]) -> f64 {
    1e-9 * values.iter().fold(1.0_f64, |m, v| m.max(v.abs()))
}

/// Indices whose finite statistic exceeds the `q` quantile (and the rounding tolerance).
///
/// Significance is the statistic over the threshold; a degenerate threshold
/// (at rounding level) gives significance 1.
fn flag_above_quantile(stat: &[f64], q: f64, tol: f64) -> Vec<(usize, f64)> {
    let finite: Vec<f64> = stat.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return Vec::new();
    }
    let threshold = quantile(&finite, q);
    let cut = threshold.max(tol);
    stat.iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite() && **v > cut)
        .map(|(i, &v)| {
            let significance = if threshold > tol { v / threshold } else { 1.0 };
            (i, significance)
        })
        .collect()
}
