//! Series preparation: missing-value handling, daily gap filling, excluded
//! periods and winsorization.
//!
//! Winsorization is lossy: observations beyond the configured percentile
//! band are replaced by the band edge so that single-point anomalies have
//! bounded influence on downstream statistics. Callers that need the raw
//! values (for example to report an anomaly's magnitude) must keep the
//! unprepared series.

use crate::core::{fill_forward_backward, MissingValuePolicy, TimeSeries};
use crate::error::{ForecastError, Result};
use crate::utils::stats::{mean, population_std, population_variance};
use chrono::NaiveDate;
use tracing::{debug, warn};

/// Observations averaged on each side of an interpolated period.
const PERIOD_EDGE_WINDOW: usize = 30;

/// Treatment of observations inside an [`ExcludedPeriod`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodPolicy {
    /// Drop the observations; the prepared series has a calendar hole.
    Remove,
    /// Replace the observations by a straight line between the mean of the
    /// last 30 values before the period and the first 30 after it.
    Interpolate,
    /// Keep the observations as they are.
    Unchanged,
}

/// A date range whose prices are not representative of normal market
/// behaviour, such as the 2020-2022 pandemic disruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExcludedPeriod {
    /// First affected day, inclusive.
    pub start: NaiveDate,
    /// Last affected day, inclusive.
    pub end: NaiveDate,
    pub policy: PeriodPolicy,
}

impl ExcludedPeriod {
    pub fn new(start: NaiveDate, end: NaiveDate, policy: PeriodPolicy) -> Self {
        Self { start, end, policy }
    }

    /// 2020-01-01 to 2022-06-30.
    pub fn pandemic(policy: PeriodPolicy) -> Self {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or(NaiveDate::MIN);
        let end = NaiveDate::from_ymd_opt(2022, 6, 30).unwrap_or(NaiveDate::MIN);
        Self { start, end, policy }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// What an excluded period did to a prepared series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodSummary {
    /// Policy actually applied; `Unchanged` when interpolation lacked context.
    pub applied: PeriodPolicy,
    /// Observations inside the period.
    pub affected: usize,
}

/// A prepared series with the metadata gathered while preparing it.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSeries {
    pub series: TimeSeries,
    /// [`quality_score`] of the prepared series.
    pub quality_score: f64,
    /// Calendar days added by gap filling.
    pub filled: usize,
    /// Values moved to the winsorization band.
    pub clipped: usize,
    pub period: Option<PeriodSummary>,
}

/// Configuration for [`SeriesPreparer`].
#[derive(Debug, Clone, PartialEq)]
pub struct PrepareConfig {
    /// Minimum number of non-missing observations.
    pub min_length: usize,
    /// Lower winsorization percentile.
    pub lower_quantile: f64,
    /// Upper winsorization percentile.
    pub upper_quantile: f64,
    /// Reindex onto a gap-free daily calendar.
    pub fill_gaps: bool,
    /// Clip values to the percentile band.
    pub clip: bool,
    /// Period handled after gap filling and before clipping.
    pub excluded_period: Option<ExcludedPeriod>,
}

impl Default for PrepareConfig {
    fn default() -> Self {
        Self {
            min_length: 100,
            lower_quantile: 0.01,
            upper_quantile: 0.99,
            fill_gaps: true,
            clip: true,
            excluded_period: None,
        }
    }
}

impl PrepareConfig {
    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = min_length;
        self
    }

    pub fn with_quantiles(mut self, lower: f64, upper: f64) -> Self {
        self.lower_quantile = lower;
        self.upper_quantile = upper;
        self
    }

    pub fn with_fill_gaps(mut self, fill_gaps: bool) -> Self {
        self.fill_gaps = fill_gaps;
        self
    }

    pub fn with_clip(mut self, clip: bool) -> Self {
        self.clip = clip;
        self
    }

    pub fn with_excluded_period(mut self, period: ExcludedPeriod) -> Self {
        self.excluded_period = Some(period);
        self
    }
}

/// Cleans raw daily series before decomposition and fitting.
#[derive(Debug, Clone, Default)]
pub struct SeriesPreparer {
    config: PrepareConfig,
}

impl SeriesPreparer {
    pub fn new(config: PrepareConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PrepareConfig {
        &self.config
    }

    /// Drop missing values, fill calendar gaps, handle the excluded period
    /// and winsorize.
    ///
    /// Fails with [`ForecastError::InsufficientData`] when fewer than
    /// `min_length` clean observations remain. Without an interpolated
    /// period, applying `prepare` to its own output returns an equal series.
    pub fn prepare(&self, series: &TimeSeries) -> Result<TimeSeries> {
        Ok(self.prepare_with_report(series)?.series)
    }

    /// Like [`prepare`](Self::prepare), also reporting what was changed and a
    /// quality score for the result.
    pub fn prepare_with_report(&self, series: &TimeSeries) -> Result<PreparedSeries> {
        let clean = series.sanitized(MissingValuePolicy::Drop)?;
        self.check_length(clean.len())?;

        let (filled, added) = if self.config.fill_gaps && !clean.is_daily_contiguous() {
            let gaps = clean.reindexed_daily();
            let added = gaps.len() - clean.len();
            debug!(series = series.name(), added, "filled calendar gaps");
            (gaps.sanitized(MissingValuePolicy::ForwardFill)?, added)
        } else {
            (clean, 0)
        };

        let (handled, period) = match &self.config.excluded_period {
            Some(excluded) => {
                let (handled, summary) = apply_excluded_period(&filled, excluded)?;
                self.check_length(handled.len())?;
                (handled, Some(summary))
            }
            None => (filled, None),
        };

        let (prepared, clipped) = if self.config.clip {
            self.winsorize(&handled)?
        } else {
            (handled, 0)
        };

        let score = quality_score(&prepared);
        debug!(series = series.name(), quality = score, "prepared series");
        Ok(PreparedSeries {
            series: prepared,
            quality_score: score,
            filled: added,
            clipped,
            period,
        })
    }

    fn check_length(&self, got: usize) -> Result<()> {
        if got < self.config.min_length {
            return Err(ForecastError::InsufficientData {
                needed: self.config.min_length,
                got,
            });
        }
        Ok(())
    }

    fn winsorize(&self, series: &TimeSeries) -> Result<(TimeSeries, usize)> {
        let (low, high) = winsorize_bounds(
            series.values(),
            self.config.lower_quantile,
            self.config.upper_quantile,
        );
        let mut clipped = 0usize;
        let values = series
            .values()
            .iter()
            .map(|&v| {
                let c = v.clamp(low, high);
                if c != v {
                    clipped += 1;
                }
                c
            })
            .collect();
        debug!(series = series.name(), low, high, clipped, "winsorized series");
        Ok((series.with_values(values)?, clipped))
    }

    /// Reindex exogenous drivers onto the dates of a prepared target.
    ///
    /// Dates absent from a regressor are forward filled (a leading gap is
    /// back filled). A regressor sharing no date with the target is invalid.
    pub fn align_exogenous(
        &self,
        target: &TimeSeries,
        regressors: &[TimeSeries],
    ) -> Result<Vec<TimeSeries>> {
        regressors
            .iter()
            .map(|reg| {
                let lookup = reg.index_by_date();
                let raw: Vec<f64> = target
                    .dates()
                    .iter()
                    .map(|d| lookup.get(d).map(|&i| reg.values()[i]).unwrap_or(f64::NAN))
                    .collect();
                if raw.iter().all(|v| !v.is_finite()) {
                    return Err(ForecastError::InvalidSeries(format!(
                        "regressor '{}' has no dates in common with '{}'",
                        reg.name(),
                        target.name()
                    )));
                }
                TimeSeries::new(
                    reg.name(),
                    target.dates().to_vec(),
                    fill_forward_backward(&raw),
                )
            })
            .collect()
    }
}

fn apply_excluded_period(
    series: &TimeSeries,
    period: &ExcludedPeriod,
) -> Result<(TimeSeries, PeriodSummary)> {
    let inside: Vec<usize> = series
        .dates()
        .iter()
        .enumerate()
        .filter(|(_, d)| period.contains(**d))
        .map(|(i, _)| i)
        .collect();
    let affected = inside.len();
    let unchanged = PeriodSummary {
        applied: PeriodPolicy::Unchanged,
        affected,
    };
    if affected == 0 {
        return Ok((series.clone(), unchanged));
    }

    match period.policy {
        PeriodPolicy::Unchanged => Ok((series.clone(), unchanged)),
        PeriodPolicy::Remove => {
            let (dates, values): (Vec<NaiveDate>, Vec<f64>) = series
                .dates()
                .iter()
                .zip(series.values())
                .filter(|(d, _)| !period.contains(**d))
                .map(|(d, v)| (*d, *v))
                .unzip();
            debug!(series = series.name(), removed = affected, "removed excluded period");
            let kept = TimeSeries::new(series.name(), dates, values)?;
            Ok((
                kept,
                PeriodSummary {
                    applied: PeriodPolicy::Remove,
                    affected,
                },
            ))
        }
        PeriodPolicy::Interpolate => {
            let values = series.values();
            let before: Vec<f64> = series
                .dates()
                .iter()
                .zip(values)
                .filter(|(d, _)| **d < period.start)
                .map(|(_, v)| *v)
                .collect();
            let after: Vec<f64> = series
                .dates()
                .iter()
                .zip(values)
                .filter(|(d, _)| **d > period.end)
                .map(|(_, v)| *v)
                .collect();
            if before.len() <= PERIOD_EDGE_WINDOW || after.len() <= PERIOD_EDGE_WINDOW {
                warn!(
                    series = series.name(),
                    before = before.len(),
                    after = after.len(),
                    "not enough context to interpolate excluded period, left unchanged"
                );
                return Ok((series.clone(), unchanged));
            }

            let from = mean(&before[before.len() - PERIOD_EDGE_WINDOW..]);
            let to = mean(&after[..PERIOD_EDGE_WINDOW]);
            let step = if affected > 1 {
                (to - from) / (affected - 1) as f64
            } else {
                0.0
            };
            let mut out = values.to_vec();
            for (k, &i) in inside.iter().enumerate() {
                out[i] = from + step * k as f64;
            }
            debug!(series = series.name(), affected, from, to, "interpolated excluded period");
            Ok((
                series.with_values(out)?,
                PeriodSummary {
                    applied: PeriodPolicy::Interpolate,
                    affected,
                },
            ))
        }
    }
}

/// Data quality in `[0, 1]`: completeness × date continuity × variability.
///
/// Completeness is the share of finite values, continuity the share of
/// calendar days between the first and last date that carry an observation,
/// and variability `min(1, cv / 0.5)` with `cv` the coefficient of variation.
/// A constant series gets no variability penalty. An empty series scores 0.
pub fn quality_score(series: &TimeSeries) -> f64 {
    let total = series.len();
    let finite: Vec<f64> = series.values().iter().copied().filter(|v| v.is_finite()).collect();
    if total == 0 || finite.is_empty() {
        return 0.0;
    }
    let completeness = finite.len() as f64 / total as f64;

    let continuity = match (series.first_date(), series.last_date()) {
        (Some(first), Some(last)) => {
            let expected = (last - first).num_days() + 1;
            (total as f64 / expected as f64).min(1.0)
        }
        _ => 1.0,
    };

    let variability = if population_variance(&finite) > 0.0 {
        let m = mean(&finite);
        let cv = if m != 0.0 {
            (population_std(&finite) / m).abs()
        } else {
            f64::INFINITY
        };
        (cv / 0.5).min(1.0)
    } else {
        1.0
    };

    (completeness * continuity * variability).clamp(0.0, 1.0)
}

/// Percentile band using outward nearest-rank order statistics.
///
/// The lower bound is the order statistic at `floor(q·(n-1))`, the upper one at
/// `ceil(q·(n-1))`. Clipping to these bounds leaves both order statistics in
/// place, so a second pass finds the same band.
pub fn winsorize_bounds(values: &[f64], lower_q: f64, upper_q: f64) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NEG_INFINITY, f64::INFINITY);
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let last = (sorted.len() - 1) as f64;
    let lo = (lower_q.clamp(0.0, 1.0) * last).floor() as usize;
    let hi = (upper_q.clamp(0.0, 1.0) * last).ceil() as usize;
    (sorted[lo], sorted[hi])
}
