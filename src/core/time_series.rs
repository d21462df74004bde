//! Daily TimeSeries data structure.

use crate::error::{ForecastError, Result};
use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;

/// Policy for handling missing values (NaN/Inf).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MissingValuePolicy {
    /// Drop observations with missing values.
    Drop,
    /// Forward fill, then back fill a leading gap.
    ForwardFill,
    /// Return error if missing values found.
    Error,
}

/// A univariate daily series: strictly increasing calendar dates with one value each.
///
/// Transformations never mutate a series in place; they return a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    name: String,
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

/// Builder for constructing TimeSeries.
#[derive(Debug, Clone, Default)]
pub struct TimeSeriesBuilder {
    name: String,
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl TimeSeriesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn dates(mut self, dates: Vec<NaiveDate>) -> Self {
        self.dates = dates;
        self
    }

    /// Dates starting at `start`, one per day, for every pushed value.
    pub fn daily_from(mut self, start: NaiveDate, len: usize) -> Self {
        self.dates = (0..len as i64).map(|i| start + Duration::days(i)).collect();
        self
    }

    pub fn values(mut self, values: Vec<f64>) -> Self {
        self.values = values;
        self
    }

    pub fn build(self) -> Result<TimeSeries> {
        TimeSeries::new(self.name, self.dates, self.values)
    }
}

impl TimeSeries {
    /// Create a new named series.
    ///
    /// Fails with [`ForecastError::InvalidSeries`] when dates are not strictly
    /// increasing (this covers duplicates), when lengths differ, or when every
    /// value is missing.
    pub fn new(name: impl Into<String>, dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(ForecastError::InvalidSeries(format!(
                "{} dates for {} values",
                dates.len(),
                values.len()
            )));
        }
        for w in dates.windows(2) {
            if w[1] == w[0] {
                return Err(ForecastError::InvalidSeries(format!(
                    "duplicate date {}",
                    w[1]
                )));
            }
            if w[1] < w[0] {
                return Err(ForecastError::InvalidSeries(format!(
                    "dates not increasing at {}",
                    w[1]
                )));
            }
        }
        if !values.is_empty() && values.iter().all(|v| !v.is_finite()) {
            return Err(ForecastError::InvalidSeries(
                "series contains only missing values".to_string(),
            ));
        }

        Ok(Self {
            name: name.into(),
            dates,
            values,
        })
    }

    /// Create an unnamed series.
    pub fn univariate(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        Self::new(String::new(), dates, values)
    }

    /// Create a contiguous daily series starting at `start`.
    pub fn daily(start: NaiveDate, values: Vec<f64>) -> Result<Self> {
        TimeSeriesBuilder::new()
            .daily_from(start, values.len())
            .values(values)
            .build()
    }

    pub fn builder() -> TimeSeriesBuilder {
        TimeSeriesBuilder::new()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return a copy with a different name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Same dates and name, different values.
    pub fn with_values(&self, values: Vec<f64>) -> Result<Self> {
        if values.len() != self.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: self.len(),
                got: values.len(),
            });
        }
        Ok(Self {
            name: self.name.clone(),
            dates: self.dates.clone(),
            values,
        })
    }

    /// Extract the half-open range `[start, end)`.
    pub fn slice(&self, start: usize, end: usize) -> Result<TimeSeries> {
        if start > end || end > self.len() {
            return Err(ForecastError::InvalidParameter(format!(
                "slice {}..{} out of range for length {}",
                start,
                end,
                self.len()
            )));
        }
        Ok(Self {
            name: self.name.clone(),
            dates: self.dates[start..end].to_vec(),
            values: self.values[start..end].to_vec(),
        })
    }

    /// Observations strictly before `date`.
    pub fn before(&self, date: NaiveDate) -> TimeSeries {
        let end = self.dates.partition_point(|d| *d < date);
        Self {
            name: self.name.clone(),
            dates: self.dates[..end].to_vec(),
            values: self.values[..end].to_vec(),
        }
    }

    /// Check if series has missing values (NaN or Inf).
    pub fn has_missing_values(&self) -> bool {
        self.values.iter().any(|v| !v.is_finite())
    }

    /// Whether every consecutive pair of dates is exactly one day apart.
    pub fn is_daily_contiguous(&self) -> bool {
        self.dates
            .windows(2)
            .all(|w| w[1] - w[0] == Duration::days(1))
    }

    /// Lookup table from date to position.
    pub fn index_by_date(&self) -> BTreeMap<NaiveDate, usize> {
        self.dates.iter().enumerate().map(|(i, d)| (*d, i)).collect()
    }

    /// Return a sanitized copy with missing values handled.
    pub fn sanitized(&self, policy: MissingValuePolicy) -> Result<TimeSeries> {
        match policy {
            MissingValuePolicy::Error => {
                if self.has_missing_values() {
                    return Err(ForecastError::InvalidSeries(
                        "missing values detected".to_string(),
                    ));
                }
                Ok(self.clone())
            }
            MissingValuePolicy::Drop => {
                let (dates, values): (Vec<_>, Vec<_>) = self
                    .dates
                    .iter()
                    .zip(&self.values)
                    .filter(|(_, v)| v.is_finite())
                    .map(|(d, v)| (*d, *v))
                    .unzip();
                Ok(Self {
                    name: self.name.clone(),
                    dates,
                    values,
                })
            }
            MissingValuePolicy::ForwardFill => {
                let values = fill_forward_backward(&self.values);
                Ok(Self {
                    name: self.name.clone(),
                    dates: self.dates.clone(),
                    values,
                })
            }
        }
    }

    /// Reindex onto every calendar day between the first and last date.
    ///
    /// New days carry NaN; combine with [`MissingValuePolicy::ForwardFill`].
    pub fn reindexed_daily(&self) -> TimeSeries {
        let (first, last) = match (self.first_date(), self.last_date()) {
            (Some(f), Some(l)) => (f, l),
            _ => return self.clone(),
        };
        let days = (last - first).num_days() as usize + 1;
        let lookup = self.index_by_date();
        let dates: Vec<NaiveDate> = (0..days as i64).map(|i| first + Duration::days(i)).collect();
        let values = dates
            .iter()
            .map(|d| lookup.get(d).map(|&i| self.values[i]).unwrap_or(f64::NAN))
            .collect();
        Self {
            name: self.name.clone(),
            dates,
            values,
        }
    }

    /// Consecutive dates following the last observation.
    pub fn future_dates(&self, steps: usize) -> Vec<NaiveDate> {
        match self.last_date() {
            Some(last) => (1..=steps as i64).map(|h| last + Duration::days(h)).collect(),
            None => Vec::new(),
        }
    }
}

/// Forward fill missing values, then back fill any leading gap.
pub(crate) fn fill_forward_backward(values: &[f64]) -> Vec<f64> {
    let mut result = Vec::with_capacity(values.len());
    let mut last_valid = None;
    for &v in values {
        if v.is_finite() {
            last_valid = Some(v);
            result.push(v);
        } else {
            result.push(last_valid.unwrap_or(f64::NAN));
        }
    }
    if let Some(first_valid) = result.iter().copied().find(|v| v.is_finite()) {
        for v in result.iter_mut() {
            if v.is_finite() {
                break;
            }
            *v = first_valid;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn make_dates(n: usize) -> Vec<NaiveDate> {
        (0..n as i64)
            .map(|i| date(2024, 1, 1) + Duration::days(i))
            .collect()
    }

    #[test]
    fn time_series_constructs_daily_data() {
        let ts = TimeSeries::daily(date(2024, 1, 1), vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(ts.len(), 3);
        assert_eq!(ts.values(), &[1.0, 2.0, 3.0]);
        assert_eq!(ts.last_date(), Some(date(2024, 1, 3)));
        assert!(ts.is_daily_contiguous());
    }

    #[test]
    fn builder_assigns_daily_dates() {
        let ts = TimeSeries::builder()
            .name("lpg")
            .daily_from(date(2024, 12, 30), 3)
            .values(vec![950.0, 951.0, 949.5])
            .build()
            .unwrap();
        assert_eq!(ts.name(), "lpg");
        assert_eq!(ts.last_date(), Some(date(2025, 1, 1)));
        assert!(TimeSeries::builder().values(vec![1.0]).build().is_err());
    }

    #[test]
    fn time_series_rejects_duplicate_dates() {
        let dates = vec![date(2024, 1, 1), date(2024, 1, 1)];
        let result = TimeSeries::univariate(dates, vec![1.0, 2.0]);
        assert!(matches!(result, Err(ForecastError::InvalidSeries(_))));
    }

    #[test]
    fn time_series_rejects_non_monotonic_dates() {
        let dates = vec![date(2024, 1, 2), date(2024, 1, 1)];
        let result = TimeSeries::univariate(dates, vec![1.0, 2.0]);
        assert!(matches!(result, Err(ForecastError::InvalidSeries(_))));
    }

    #[test]
    fn time_series_rejects_all_missing() {
        let result = TimeSeries::univariate(make_dates(3), vec![f64::NAN; 3]);
        assert!(matches!(result, Err(ForecastError::InvalidSeries(_))));
    }

    #[test]
    fn time_series_rejects_length_mismatch() {
        let result = TimeSeries::univariate(make_dates(3), vec![1.0, 2.0]);
        assert!(matches!(result, Err(ForecastError::InvalidSeries(_))));
    }

    #[test]
    fn time_series_slice_and_before() {
        let ts = TimeSeries::univariate(make_dates(10), (0..10).map(|i| i as f64).collect())
            .unwrap();
        let s = ts.slice(2, 5).unwrap();
        assert_eq!(s.values(), &[2.0, 3.0, 4.0]);
        assert!(ts.slice(5, 11).is_err());

        let head = ts.before(date(2024, 1, 4));
        assert_eq!(head.len(), 3);
    }

    #[test]
    fn reindex_and_fill_closes_gaps() {
        let dates = vec![date(2024, 1, 1), date(2024, 1, 2), date(2024, 1, 5)];
        let ts = TimeSeries::univariate(dates, vec![1.0, 2.0, 5.0]).unwrap();
        let filled = ts
            .reindexed_daily()
            .sanitized(MissingValuePolicy::ForwardFill)
            .unwrap();
        assert_eq!(filled.len(), 5);
        assert_eq!(filled.values(), &[1.0, 2.0, 2.0, 2.0, 5.0]);
        assert!(filled.is_daily_contiguous());
    }

    #[test]
    fn leading_gap_is_back_filled() {
        let filled = fill_forward_backward(&[f64::NAN, f64::NAN, 3.0, f64::NAN]);
        assert_eq!(filled, vec![3.0, 3.0, 3.0, 3.0]);
    }

    #[test]
    fn drop_policy_removes_missing() {
        let ts =
            TimeSeries::univariate(make_dates(4), vec![1.0, f64::NAN, 3.0, f64::INFINITY]).unwrap();
        let clean = ts.sanitized(MissingValuePolicy::Drop).unwrap();
        assert_eq!(clean.values(), &[1.0, 3.0]);
        assert!(ts.sanitized(MissingValuePolicy::Error).is_err());
    }

    #[test]
    fn future_dates_start_the_day_after() {
        let ts = TimeSeries::daily(date(2024, 2, 27), vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(
            ts.future_dates(2),
            vec![date(2024, 3, 1), date(2024, 3, 2)]
        );
    }
}
