//! Holt's linear trend model with optional damping.
//!
//! Also known as double exponential smoothing. Damping keeps long-horizon
//! forecasts from extrapolating a short-lived price trend indefinitely.

use crate::core::{ForecastResult, TimeSeries};
use crate::error::{ForecastError, Result};
use crate::models::Forecaster;
use crate::utils::optimization::{nelder_mead, NelderMeadConfig};
use crate::utils::stats::z_for_alpha;
use chrono::{Duration, NaiveDate};

const PARAM_BOUNDS: (f64, f64) = (0.0001, 0.9999);
const PHI_BOUNDS: (f64, f64) = (0.8, 1.0);

/// Holt's linear trend forecaster.
///
/// The model equations are:
/// - Level: `l_t = α × y_t + (1-α) × (l_{t-1} + φ × b_{t-1})`
/// - Trend: `b_t = β × (l_t - l_{t-1}) + (1-β) × φ × b_{t-1}`
/// - Forecast: `ŷ_{t+h} = l_t + (φ + φ² + ... + φ^h) × b_t`
///
/// Without damping φ = 1.
#[derive(Debug, Clone)]
pub struct HoltLinearTrend {
    /// Level smoothing parameter (0 < alpha < 1).
    alpha: Option<f64>,
    /// Trend smoothing parameter (0 < beta < 1).
    beta: Option<f64>,
    /// Damping parameter; `None` means no damping.
    phi: Option<f64>,
    optimize: bool,
    level: Option<f64>,
    trend: Option<f64>,
    last_date: Option<NaiveDate>,
    fitted: Option<Vec<f64>>,
    residuals: Option<Vec<f64>>,
    residual_variance: Option<f64>,
}

impl HoltLinearTrend {
    fn with_params(alpha: Option<f64>, beta: Option<f64>, phi: Option<f64>, optimize: bool) -> Self {
        Self {
            alpha,
            beta,
            phi,
            optimize,
            level: None,
            trend: None,
            last_date: None,
            fitted: None,
            residuals: None,
            residual_variance: None,
        }
    }

    /// Fixed smoothing parameters, no damping.
    pub fn new(alpha: f64, beta: f64) -> Self {
        Self::with_params(
            Some(alpha.clamp(PARAM_BOUNDS.0, PARAM_BOUNDS.1)),
            Some(beta.clamp(PARAM_BOUNDS.0, PARAM_BOUNDS.1)),
            None,
            false,
        )
    }

    /// Fixed smoothing and damping parameters.
    pub fn damped(alpha: f64, beta: f64, phi: f64) -> Self {
        Self::with_params(
            Some(alpha.clamp(PARAM_BOUNDS.0, PARAM_BOUNDS.1)),
            Some(beta.clamp(PARAM_BOUNDS.0, PARAM_BOUNDS.1)),
            Some(phi.clamp(PHI_BOUNDS.0, PHI_BOUNDS.1)),
            false,
        )
    }

    /// Parameters chosen by minimizing the one-step SSE.
    pub fn auto() -> Self {
        Self::with_params(None, None, None, true)
    }

    /// Like [`auto`](Self::auto) with φ optimized too.
    pub fn auto_damped() -> Self {
        Self::with_params(None, None, Some(0.98), true)
    }

    pub fn alpha(&self) -> Option<f64> {
        self.alpha
    }

    pub fn beta(&self) -> Option<f64> {
        self.beta
    }

    pub fn phi(&self) -> Option<f64> {
        self.phi
    }

    pub fn level(&self) -> Option<f64> {
        self.level
    }

    pub fn trend(&self) -> Option<f64> {
        self.trend
    }

    /// Run the recursions, returning one-step predictions and the final state.
    fn filter(values: &[f64], alpha: f64, beta: f64, phi: f64) -> (Vec<f64>, f64, f64) {
        let mut l = values[0];
        let mut b = values[1] - values[0];
        let mut fitted = Vec::with_capacity(values.len());
        fitted.push(f64::NAN);
        for &y in &values[1..] {
            fitted.push(l + phi * b);
            let l_prev = l;
            l = alpha * y + (1.0 - alpha) * (l_prev + phi * b);
            b = beta * (l - l_prev) + (1.0 - beta) * phi * b;
        }
        (fitted, l, b)
    }

    fn sse(values: &[f64], alpha: f64, beta: f64, phi: f64) -> f64 {
        let (fitted, _, _) = Self::filter(values, alpha, beta, phi);
        values[1..]
            .iter()
            .zip(&fitted[1..])
            .map(|(y, f)| (y - f).powi(2))
            .sum()
    }

    fn optimize_params(values: &[f64], with_damping: bool) -> (f64, f64, Option<f64>) {
        let config = NelderMeadConfig::default();
        if with_damping {
            let result = nelder_mead(
                |p| Self::sse(values, p[0], p[1], p[2]),
                &[0.3, 0.1, 0.98],
                Some(&[PARAM_BOUNDS, PARAM_BOUNDS, PHI_BOUNDS]),
                config,
            );
            let p = result.optimal_point;
            (p[0], p[1], Some(p[2]))
        } else {
            let result = nelder_mead(
                |p| Self::sse(values, p[0], p[1], 1.0),
                &[0.3, 0.1],
                Some(&[PARAM_BOUNDS, PARAM_BOUNDS]),
                config,
            );
            let p = result.optimal_point;
            (p[0], p[1], None)
        }
    }

    /// phi + phi^2 + ... + phi^h
    fn damped_sum(phi: f64, h: usize) -> f64 {
        if (phi - 1.0).abs() < 1e-10 {
            h as f64
        } else {
            phi * (1.0 - phi.powi(h as i32)) / (1.0 - phi)
        }
    }
}

impl Default for HoltLinearTrend {
    fn default() -> Self {
        Self::auto_damped()
    }
}

impl Forecaster for HoltLinearTrend {
    fn fit(&mut self, series: &TimeSeries) -> Result<()> {
        let values = series.values();
        if values.len() < 3 {
            return Err(ForecastError::InsufficientData {
                needed: 3,
                got: values.len(),
            });
        }

        if self.optimize {
            let (alpha, beta, phi) = Self::optimize_params(values, self.phi.is_some());
            self.alpha = Some(alpha);
            self.beta = Some(beta);
            self.phi = phi;
        }
        let alpha = self.alpha.ok_or(ForecastError::FitRequired)?;
        let beta = self.beta.ok_or(ForecastError::FitRequired)?;

        let (fitted, l, b) = Self::filter(values, alpha, beta, self.phi.unwrap_or(1.0));
        let residuals: Vec<f64> = values.iter().zip(&fitted).map(|(y, f)| y - f).collect();
        let valid = &residuals[1..];
        self.residual_variance = Some(valid.iter().map(|r| r * r).sum::<f64>() / valid.len() as f64);
        self.level = Some(l);
        self.trend = Some(b);
        self.last_date = series.last_date();
        self.fitted = Some(fitted);
        self.residuals = Some(residuals);
        Ok(())
    }

    fn forecast(&self, steps: usize, alpha_level: f64) -> Result<ForecastResult> {
        let l = self.level.ok_or(ForecastError::FitRequired)?;
        let b = self.trend.ok_or(ForecastError::FitRequired)?;
        let last_date = self.last_date.ok_or(ForecastError::FitRequired)?;
        let alpha = self.alpha.ok_or(ForecastError::FitRequired)?;
        let beta = self.beta.ok_or(ForecastError::FitRequired)?;
        let phi = self.phi.unwrap_or(1.0);
        let variance = self.residual_variance.unwrap_or(0.0);
        let z = z_for_alpha(alpha_level);

        let mut dates = Vec::with_capacity(steps);
        let mut values = Vec::with_capacity(steps);
        let mut lower = Vec::with_capacity(steps);
        let mut upper = Vec::with_capacity(steps);
        for h in 1..=steps {
            let pred = l + Self::damped_sum(phi, h) * b;
            // ETS(A,Ad,N) variance multiplier
            let c: f64 = 1.0
                + (1..h)
                    .map(|j| (alpha + alpha * beta * Self::damped_sum(phi, j)).powi(2))
                    .sum::<f64>();
            let se = (variance * c).sqrt();
            dates.push(last_date + Duration::days(h as i64));
            values.push(pred);
            lower.push(pred - z * se);
            upper.push(pred + z * se);
        }

        Ok(ForecastResult::new(dates, values, lower, upper)?
            .with_info("model", self.name())
            .with_info("alpha", alpha)
            .with_info("beta", beta)
            .with_info("phi", phi))
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.fitted.as_deref()
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.residuals.as_deref()
    }

    fn name(&self) -> &str {
        if self.phi.is_some() {
            "HoltLinearTrend(damped)"
        } else {
            "HoltLinearTrend"
        }
    }
}
