//! Forecast result structure for holding predictions.

use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Point forecasts with a confidence band and descriptive metadata.
///
/// `dates`, `values`, `lower` and `upper` always have the same length, which is
/// the forecast horizon.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForecastResult {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    model_info: BTreeMap<String, String>,
}

impl ForecastResult {
    /// Create a forecast, checking that all sequences share one length.
    pub fn new(
        dates: Vec<NaiveDate>,
        values: Vec<f64>,
        lower: Vec<f64>,
        upper: Vec<f64>,
    ) -> Result<Self> {
        let horizon = values.len();
        for len in [dates.len(), lower.len(), upper.len()] {
            if len != horizon {
                return Err(ForecastError::DimensionMismatch {
                    expected: horizon,
                    got: len,
                });
            }
        }
        Ok(Self {
            dates,
            values,
            lower,
            upper,
            model_info: BTreeMap::new(),
        })
    }

    /// Build a symmetric band `values ± z * sigma`.
    pub fn with_symmetric_band(
        dates: Vec<NaiveDate>,
        values: Vec<f64>,
        z: f64,
        sigma: f64,
    ) -> Result<Self> {
        let lower = values.iter().map(|v| v - z * sigma).collect();
        let upper = values.iter().map(|v| v + z * sigma).collect();
        Self::new(dates, values, lower, upper)
    }

    /// Attach a metadata entry.
    pub fn with_info(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.model_info.insert(key.into(), value.to_string());
        self
    }

    pub fn horizon(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Point forecasts.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    pub fn model_info(&self) -> &BTreeMap<String, String> {
        &self.model_info
    }

    pub fn info(&self, key: &str) -> Option<&str> {
        self.model_info.get(key).map(|s| s.as_str())
    }

    /// Mean width of the confidence band.
    pub fn mean_interval_width(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.upper
            .iter()
            .zip(&self.lower)
            .map(|(u, l)| u - l)
            .sum::<f64>()
            / self.values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::Duration;

    fn make_dates(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        (0..n as i64).map(|i| start + Duration::days(i)).collect()
    }

    #[test]
    fn forecast_holds_parallel_sequences() {
        let f = ForecastResult::new(
            make_dates(3),
            vec![1.0, 2.0, 3.0],
            vec![0.5, 1.5, 2.5],
            vec![1.5, 2.5, 3.5],
        )
        .unwrap()
        .with_info("model", "ARIMA(1,1,1)");

        assert_eq!(f.horizon(), 3);
        assert_eq!(f.info("model"), Some("ARIMA(1,1,1)"));
        assert_relative_eq!(f.mean_interval_width(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn forecast_rejects_length_mismatch() {
        let result = ForecastResult::new(make_dates(2), vec![1.0, 2.0, 3.0], vec![0.0; 3], vec![0.0; 3]);
        assert!(matches!(
            result,
            Err(ForecastError::DimensionMismatch { expected: 3, got: 2 })
        ));
    }

    #[test]
    fn symmetric_band_is_centered() {
        let f = ForecastResult::with_symmetric_band(make_dates(2), vec![10.0, 20.0], 1.96, 2.0)
            .unwrap();
        assert_relative_eq!(f.lower()[0], 10.0 - 3.92, epsilon = 1e-12);
        assert_relative_eq!(f.upper()[1], 20.0 + 3.92, epsilon = 1e-12);
    }
}
