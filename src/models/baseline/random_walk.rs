//! Random walk with drift.
//!
//! Forecasts the last value plus a drift term estimated from the history.

use crate::core::{ForecastResult, TimeSeries};
use crate::error::{ForecastError, Result};
use crate::models::Forecaster;
use crate::utils::stats::z_for_alpha;
use chrono::{Duration, NaiveDate};

/// Random walk with drift forecaster.
///
/// The forecast is: y_hat\[t+h\] = y\[t\] + h * drift
/// where drift is the average change in the series.
#[derive(Debug, Clone, Default)]
pub struct RandomWalkWithDrift {
    last_value: Option<f64>,
    last_date: Option<NaiveDate>,
    drift: Option<f64>,
    fitted: Option<Vec<f64>>,
    residuals: Option<Vec<f64>>,
    residual_variance: Option<f64>,
}

impl RandomWalkWithDrift {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the estimated drift parameter.
    pub fn drift(&self) -> Option<f64> {
        self.drift
    }
}

impl Forecaster for RandomWalkWithDrift {
    fn fit(&mut self, series: &TimeSeries) -> Result<()> {
        let values = series.values();
        if values.len() < 2 {
            return Err(ForecastError::InsufficientData {
                needed: 2,
                got: values.len(),
            });
        }

        let n = values.len();
        let drift = (values[n - 1] - values[0]) / (n - 1) as f64;

        // y_hat[t] = y[t-1] + drift
        let mut fitted = Vec::with_capacity(n);
        fitted.push(f64::NAN);
        fitted.extend(values.windows(2).map(|w| w[0] + drift));
        let residuals: Vec<f64> = values.iter().zip(&fitted).map(|(y, f)| y - f).collect();

        let valid: Vec<f64> = residuals.iter().copied().filter(|r| r.is_finite()).collect();
        self.residual_variance = Some(valid.iter().map(|r| r * r).sum::<f64>() / valid.len() as f64);
        self.last_value = Some(values[n - 1]);
        self.last_date = series.last_date();
        self.drift = Some(drift);
        self.fitted = Some(fitted);
        self.residuals = Some(residuals);
        Ok(())
    }

    fn forecast(&self, steps: usize, alpha: f64) -> Result<ForecastResult> {
        let last = self.last_value.ok_or(ForecastError::FitRequired)?;
        let last_date = self.last_date.ok_or(ForecastError::FitRequired)?;
        let drift = self.drift.ok_or(ForecastError::FitRequired)?;
        let sigma = self.residual_variance.unwrap_or(0.0).sqrt();
        let z = z_for_alpha(alpha);

        let mut dates = Vec::with_capacity(steps);
        let mut values = Vec::with_capacity(steps);
        let mut lower = Vec::with_capacity(steps);
        let mut upper = Vec::with_capacity(steps);
        for h in 1..=steps {
            let pred = last + h as f64 * drift;
            let se = sigma * (h as f64).sqrt();
            dates.push(last_date + Duration::days(h as i64));
            values.push(pred);
            lower.push(pred - z * se);
            upper.push(pred + z * se);
        }

        Ok(ForecastResult::new(dates, values, lower, upper)?
            .with_info("model", self.name())
            .with_info("drift", drift))
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.fitted.as_deref()
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.residuals.as_deref()
    }

    fn name(&self) -> &str {
        "RandomWalkWithDrift"
    }
}
