//! ARIMA forecaster with exogenous regressors, residual checks and validation.

use crate::core::{ForecastResult, TimeSeries};
use crate::error::{ForecastError, Result};
use crate::models::arima::auto_arima::{
    grid_search, seasonal_differencing, stepwise_search, InformationCriterion, OrderSearch,
    SearchResult,
};
use crate::models::arima::diff::difference;
use crate::models::arima::model::{FittedArima, ModelOrder};
use crate::models::Forecaster;
use crate::utils::ols::{ols_fit, ols_residuals, OLSResult};
use crate::utils::stats::{kurtosis, mean, skewness, std_dev, z_for_alpha};
use crate::validation::{
    check_stationarity, durbin_watson, ljung_box, ndiffs, LjungBoxResult, StationarityDiagnostics,
};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Order used when the search yields no usable model.
pub const FALLBACK_ORDER: (usize, usize, usize) = (1, 1, 1);

/// Configuration for [`ArimaForecaster`].
#[derive(Debug, Clone, PartialEq)]
pub struct ArimaConfig {
    pub max_p: usize,
    pub max_d: usize,
    pub max_q: usize,
    /// Search seasonal orders too.
    pub seasonal: bool,
    pub seasonal_period: usize,
    /// Seasonal (P, D, Q) used by the grid search.
    pub seasonal_order: (usize, usize, usize),
    /// Upper bounds for the stepwise seasonal search.
    pub max_seasonal_orders: (usize, usize, usize),
    pub criterion: InformationCriterion,
    pub min_observations: usize,
    /// Lags of the Ljung-Box residual test.
    pub ljung_box_lags: usize,
    /// Significance of the residual whiteness check.
    pub significance: f64,
    /// Models scoring above this AIC fail validation.
    pub aic_ceiling: f64,
    /// Models with larger absolute residual skewness fail validation.
    pub max_abs_skewness: f64,
}

impl Default for ArimaConfig {
    fn default() -> Self {
        Self {
            max_p: 5,
            max_d: 2,
            max_q: 5,
            seasonal: false,
            seasonal_period: 365,
            seasonal_order: (1, 1, 1),
            max_seasonal_orders: (2, 1, 2),
            criterion: InformationCriterion::Aic,
            min_observations: 50,
            ljung_box_lags: 10,
            significance: 0.05,
            aic_ceiling: 1000.0,
            max_abs_skewness: 2.0,
        }
    }
}

impl ArimaConfig {
    pub fn with_max_orders(mut self, max_p: usize, max_d: usize, max_q: usize) -> Self {
        self.max_p = max_p;
        self.max_d = max_d;
        self.max_q = max_q;
        self
    }

    /// Enable seasonal terms with the given period.
    pub fn with_seasonal_period(mut self, period: usize) -> Self {
        self.seasonal = period > 1;
        self.seasonal_period = period;
        self
    }

    pub fn with_criterion(mut self, criterion: InformationCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_min_observations(mut self, min_observations: usize) -> Self {
        self.min_observations = min_observations;
        self
    }

    pub fn with_aic_ceiling(mut self, aic_ceiling: f64) -> Self {
        self.aic_ceiling = aic_ceiling;
        self
    }

    fn search(&self) -> OrderSearch {
        let (max_cap_p, max_cap_d, max_cap_q) = self.max_seasonal_orders;
        OrderSearch::default()
            .with_max_orders(self.max_p, self.max_d, self.max_q)
            .with_seasonal_orders(max_cap_p, max_cap_d, max_cap_q)
            .with_seasonal_period(if self.seasonal { self.seasonal_period } else { 0 })
            .with_criterion(self.criterion)
    }
}

/// Outcome of [`ArimaForecaster::validate_model`].
#[derive(Debug, Clone, PartialEq)]
pub struct ModelValidation {
    pub is_valid: bool,
    /// One entry per failed check.
    pub issues: Vec<String>,
    pub ljung_box_p_value: f64,
    pub aic: f64,
    pub residual_skewness: f64,
}

/// Residual summary of a fitted model.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidualDiagnostics {
    pub order: ModelOrder,
    pub aic: f64,
    pub bic: f64,
    pub residual_mean: f64,
    pub residual_std: f64,
    pub residual_skewness: f64,
    /// Excess kurtosis.
    pub residual_kurtosis: f64,
    pub ljung_box: LjungBoxResult,
    pub durbin_watson: f64,
}

#[derive(Debug, Clone)]
struct FittedState {
    model: FittedArima,
    regression: Option<OLSResult>,
    /// Last observed value of each regressor.
    exog_last: Vec<f64>,
    last_date: NaiveDate,
    fitted: Vec<f64>,
    ljung_box: LjungBoxResult,
    stationarity: StationarityDiagnostics,
    metadata: BTreeMap<String, String>,
}

/// ARIMA/SARIMA(X) component forecaster.
///
/// Exogenous drivers enter as a regression with ARIMA errors: the target is
/// regressed on the drivers by OLS and the ARIMA model is fitted to the
/// regression residuals.
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use fuelcast::core::TimeSeries;
/// use fuelcast::models::arima::{ArimaConfig, ArimaForecaster};
///
/// let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// let values: Vec<f64> = (0..120).map(|i| 1650.0 + 0.5 * i as f64 + (i as f64 * 0.8).sin()).collect();
/// let series = TimeSeries::daily(start, values).unwrap();
///
/// let mut model = ArimaForecaster::new(ArimaConfig::default().with_max_orders(2, 1, 2));
/// model.fit_with_exog(&series, None, true).unwrap();
/// let forecast = model.forecast_with_exog(7, None, 0.05).unwrap();
/// assert_eq!(forecast.horizon(), 7);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ArimaForecaster {
    config: ArimaConfig,
    state: Option<FittedState>,
}

impl ArimaForecaster {
    pub fn new(config: ArimaConfig) -> Self {
        Self {
            config,
            state: None,
        }
    }

    pub fn config(&self) -> &ArimaConfig {
        &self.config
    }

    /// Fit on `series`, optionally with exogenous drivers aligned to its dates.
    ///
    /// With `auto_select` the orders come from a stepwise search with `d`
    /// chosen by repeated KPSS tests; otherwise every order of the configured
    /// grid is fitted. If the search produces nothing, ARIMA(1,1,1) is used
    /// and the fallback is recorded in the metadata.
    pub fn fit_with_exog(
        &mut self,
        series: &TimeSeries,
        exog: Option<&[TimeSeries]>,
        auto_select: bool,
    ) -> Result<()> {
        let values = series.values();
        if values.len() < self.config.min_observations {
            return Err(ForecastError::InsufficientData {
                needed: self.config.min_observations,
                got: values.len(),
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::InvalidSeries(format!(
                "'{}' contains missing values",
                series.name()
            )));
        }
        let last_date = series.last_date().ok_or_else(|| {
            ForecastError::InvalidSeries(format!("'{}' is empty", series.name()))
        })?;

        let regressors = exog.unwrap_or(&[]);
        for reg in regressors {
            if reg.len() != values.len() {
                return Err(ForecastError::DimensionMismatch {
                    expected: values.len(),
                    got: reg.len(),
                });
            }
        }
        let columns: Vec<&[f64]> = regressors.iter().map(|r| r.values()).collect();
        let (regression, target) = if columns.is_empty() {
            (None, values.to_vec())
        } else {
            let fit = ols_fit(values, &columns)?;
            let residuals = ols_residuals(values, &fit, &columns)?;
            (Some(fit), residuals)
        };
        let exog_last: Vec<f64> = columns
            .iter()
            .map(|c| c.last().copied().unwrap_or(f64::NAN))
            .collect();

        let stationarity = check_stationarity(&target);
        debug!(
            series = series.name(),
            adf_p = stationarity.adf.p_value,
            kpss_p = stationarity.kpss.p_value,
            stationary = stationarity.overall_stationary(),
            "stationarity diagnostics"
        );

        let mut metadata = BTreeMap::new();
        metadata.insert("criterion".to_string(), self.config.criterion.as_str().to_string());
        metadata.insert(
            "selection".to_string(),
            if auto_select { "stepwise" } else { "grid" }.to_string(),
        );
        if regression.is_some() {
            metadata.insert("exogenous".to_string(), columns.len().to_string());
        }

        let model = match self.search(&target, auto_select) {
            Ok(result) => result.model,
            Err(err) => {
                let (p, d, q) = FALLBACK_ORDER;
                warn!(
                    series = series.name(),
                    error = %err,
                    "order search failed, falling back to ARIMA({p},{d},{q})"
                );
                metadata.insert("fallback".to_string(), "fixed_order".to_string());
                metadata.insert("fallback_reason".to_string(), err.to_string());
                FittedArima::fit(&target, ModelOrder::new(p, d, q)).map_err(|fallback_err| {
                    ForecastError::FitConvergence(format!(
                        "{err}; fallback ARIMA({p},{d},{q}) failed: {fallback_err}"
                    ))
                })?
            }
        };

        let order = model.order();
        let lb = ljung_box(
            &model.valid_residuals(),
            self.config.ljung_box_lags,
            order.num_coefficients() - usize::from(order.includes_mean()),
        );
        let white = lb.is_white_noise(self.config.significance);
        if !white {
            debug!(series = series.name(), p_value = lb.p_value, "residuals are autocorrelated");
        }
        metadata.insert("residuals_white_noise".to_string(), white.to_string());

        let fitted = match &regression {
            Some(fit) => {
                let level = fit.predict(&columns)?;
                model.fitted_values().iter().zip(&level).map(|(f, l)| f + l).collect()
            }
            None => model.fitted_values().to_vec(),
        };

        debug!(
            series = series.name(),
            order = %order,
            aic = model.aic(),
            bic = model.bic(),
            "arima fitted"
        );

        self.state = Some(FittedState {
            model,
            regression,
            exog_last,
            last_date,
            fitted,
            ljung_box: lb,
            stationarity,
            metadata,
        });
        Ok(())
    }

    fn search(&self, target: &[f64], auto_select: bool) -> Result<SearchResult> {
        let search = self.config.search();
        if auto_select {
            let d = ndiffs(target, self.config.max_d);
            let cap_d = if self.config.seasonal {
                let differenced = difference(target, d);
                seasonal_differencing(&differenced, self.config.seasonal_period)
                    .min(self.config.max_seasonal_orders.1)
            } else {
                0
            };
            stepwise_search(target, d, cap_d, &search)
        } else {
            grid_search(target, &search, self.config.seasonal_order)
        }
    }

    /// Forecast `steps` days with a `(1 - alpha)` band.
    ///
    /// Future regressor paths are given column by column; without them the
    /// last observed regressor values are held constant.
    pub fn forecast_with_exog(
        &self,
        steps: usize,
        exog_future: Option<&[&[f64]]>,
        alpha: f64,
    ) -> Result<ForecastResult> {
        let state = self.state.as_ref().ok_or(ForecastError::FitRequired)?;
        let (mut values, se) = state.model.forecast(steps);

        if let Some(fit) = &state.regression {
            let held: Vec<Vec<f64>> = state.exog_last.iter().map(|v| vec![*v; steps]).collect();
            let columns: Vec<&[f64]> = match exog_future {
                Some(future) => {
                    if future.len() != fit.num_regressors() {
                        return Err(ForecastError::DimensionMismatch {
                            expected: fit.num_regressors(),
                            got: future.len(),
                        });
                    }
                    if let Some(short) = future.iter().find(|c| c.len() < steps) {
                        return Err(ForecastError::DimensionMismatch {
                            expected: steps,
                            got: short.len(),
                        });
                    }
                    future.iter().map(|c| &c[..steps]).collect()
                }
                None => held.iter().map(|c| c.as_slice()).collect(),
            };
            let level = fit.predict(&columns)?;
            for (v, l) in values.iter_mut().zip(&level) {
                *v += l;
            }
        }

        let dates: Vec<NaiveDate> = (1..=steps as i64)
            .map(|h| state.last_date + chrono::Duration::days(h))
            .collect();

        let mut result = if se.iter().all(|s| s.is_finite()) {
            let z = z_for_alpha(alpha);
            let lower = values.iter().zip(&se).map(|(v, s)| v - z * s).collect();
            let upper = values.iter().zip(&se).map(|(v, s)| v + z * s).collect();
            ForecastResult::new(dates, values, lower, upper)?.with_info("interval", "psi_weights")
        } else {
            let sigma = std_dev(&state.model.valid_residuals());
            warn!(sigma, "native forecast variance unavailable, using residual sigma");
            ForecastResult::with_symmetric_band(dates, values, 1.96, sigma)?
                .with_info("interval", "residual_sigma")
        };

        result = result
            .with_info("model", self.name())
            .with_info("order", state.model.order())
            .with_info("aic", state.model.aic())
            .with_info("bic", state.model.bic());
        for (k, v) in &state.metadata {
            result = result.with_info(k.as_str(), v);
        }
        Ok(result)
    }

    /// Check residual whiteness, the AIC ceiling and residual skewness.
    pub fn validate_model(&self) -> Result<ModelValidation> {
        let state = self.state.as_ref().ok_or(ForecastError::FitRequired)?;
        let residuals = state.model.valid_residuals();
        let skew = skewness(&residuals);
        let aic = state.model.aic();
        let lb_p = state.ljung_box.p_value;

        let mut issues = Vec::new();
        if lb_p < self.config.significance {
            issues.push(format!(
                "residuals are autocorrelated (Ljung-Box p = {lb_p:.4})"
            ));
        }
        if aic > self.config.aic_ceiling {
            issues.push(format!(
                "AIC {aic:.2} exceeds ceiling {:.2}",
                self.config.aic_ceiling
            ));
        }
        if skew.abs() > self.config.max_abs_skewness {
            issues.push(format!("residual skewness {skew:.3} is extreme"));
        }
        if !issues.is_empty() {
            debug!(issues = issues.len(), "model validation failed");
        }

        Ok(ModelValidation {
            is_valid: issues.is_empty(),
            issues,
            ljung_box_p_value: lb_p,
            aic,
            residual_skewness: skew,
        })
    }

    /// Residual moments, Ljung-Box and Durbin-Watson statistics.
    pub fn diagnostics(&self) -> Result<ResidualDiagnostics> {
        let state = self.state.as_ref().ok_or(ForecastError::FitRequired)?;
        let residuals = state.model.valid_residuals();
        Ok(ResidualDiagnostics {
            order: state.model.order(),
            aic: state.model.aic(),
            bic: state.model.bic(),
            residual_mean: mean(&residuals),
            residual_std: std_dev(&residuals),
            residual_skewness: skewness(&residuals),
            residual_kurtosis: kurtosis(&residuals),
            ljung_box: state.ljung_box.clone(),
            durbin_watson: durbin_watson(&residuals),
        })
    }

    pub fn order(&self) -> Option<ModelOrder> {
        self.state.as_ref().map(|s| s.model.order())
    }

    pub fn model(&self) -> Option<&FittedArima> {
        self.state.as_ref().map(|s| &s.model)
    }

    pub fn regression(&self) -> Option<&OLSResult> {
        self.state.as_ref().and_then(|s| s.regression.as_ref())
    }

    pub fn stationarity(&self) -> Option<&StationarityDiagnostics> {
        self.state.as_ref().map(|s| &s.stationarity)
    }

    pub fn ljung_box(&self) -> Option<&LjungBoxResult> {
        self.state.as_ref().map(|s| &s.ljung_box)
    }

    pub fn metadata(&self) -> Option<&BTreeMap<String, String>> {
        self.state.as_ref().map(|s| &s.metadata)
    }

    /// Whether the fixed fallback order was used.
    pub fn is_fallback(&self) -> bool {
        self.metadata().map_or(false, |m| m.contains_key("fallback"))
    }
}

impl Forecaster for ArimaForecaster {
    fn fit(&mut self, series: &TimeSeries) -> Result<()> {
        self.fit_with_exog(series, None, true)
    }

    fn forecast(&self, steps: usize, alpha: f64) -> Result<ForecastResult> {
        self.forecast_with_exog(steps, None, alpha)
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.fitted.as_slice())
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.model.residuals())
    }

    fn name(&self) -> &str {
        "ARIMA"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 3, 1).unwrap()
    }

    fn noisy_trend(n: usize, seed: u64) -> TimeSeries {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = Normal::new(0.0, 2.0).unwrap();
        let values = (0..n)
            .map(|i| 1600.0 + 0.8 * i as f64 + noise.sample(&mut rng))
            .collect();
        TimeSeries::daily(start(), values).unwrap()
    }

    fn small() -> ArimaConfig {
        ArimaConfig::default().with_max_orders(2, 1, 2)
    }

    #[test]
    fn rejects_short_series() {
        let series = TimeSeries::daily(start(), vec![1.0; 30]).unwrap();
        let mut model = ArimaForecaster::new(small());
        let err = model.fit_with_exog(&series, None, true).unwrap_err();
        assert_eq!(err, ForecastError::InsufficientData { needed: 50, got: 30 });
    }

    #[test]
    fn forecast_before_fit_fails() {
        let model = ArimaForecaster::default();
        assert!(matches!(model.forecast(7, 0.05), Err(ForecastError::FitRequired)));
        assert!(matches!(model.validate_model(), Err(ForecastError::FitRequired)));
    }

    #[test]
    fn stepwise_fit_and_forecast() {
        let series = noisy_trend(150, 1);
        let mut model = ArimaForecaster::new(small());
        model.fit_with_exog(&series, None, true).unwrap();
        assert!(!model.is_fallback());

        let forecast = model.forecast_with_exog(14, None, 0.05).unwrap();
        assert_eq!(forecast.horizon(), 14);
        assert_eq!(forecast.dates()[0], series.last_date().unwrap() + chrono::Duration::days(1));
        assert!(forecast
            .values()
            .iter()
            .all(|v| (1650.0..1780.0).contains(v)));
        assert!(forecast
            .lower()
            .iter()
            .zip(forecast.values())
            .zip(forecast.upper())
            .all(|((l, v), u)| l < v && v < u));
        assert_eq!(forecast.info("selection"), Some("stepwise"));
        assert!(model.stationarity().is_some());
    }

    #[test]
    fn grid_fit_uses_configured_ranges() {
        let series = noisy_trend(100, 2);
        let mut model = ArimaForecaster::new(ArimaConfig::default().with_max_orders(1, 1, 1));
        model.fit_with_exog(&series, None, false).unwrap();
        let order = model.order().unwrap();
        assert!(order.p <= 1 && order.d <= 1 && order.q <= 1);
        assert_eq!(model.metadata().unwrap()["selection"], "grid");
    }

    #[test]
    fn falls_back_when_no_candidate_fits() {
        // every seasonal candidate needs more than 60 days at period 40
        let series = noisy_trend(60, 3);
        let config = ArimaConfig::default()
            .with_max_orders(1, 1, 1)
            .with_seasonal_period(40)
            .with_min_observations(50);
        let mut model = ArimaForecaster::new(config);
        model.fit_with_exog(&series, None, false).unwrap();
        assert!(model.is_fallback());
        assert_eq!(model.order(), Some(ModelOrder::new(1, 1, 1)));
        let forecast = model.forecast(3, 0.05).unwrap();
        assert_eq!(forecast.info("fallback"), Some("fixed_order"));
    }

    #[test]
    fn exogenous_driver_is_used() {
        let mut rng = StdRng::seed_from_u64(5);
        let noise = Normal::new(0.0, 1.0).unwrap();
        let crude: Vec<f64> = (0..120).map(|i| 80.0 + 5.0 * (i as f64 / 15.0).sin()).collect();
        let price: Vec<f64> = crude
            .iter()
            .map(|c| 900.0 + 10.0 * c + noise.sample(&mut rng))
            .collect();
        let series = TimeSeries::daily(start(), price).unwrap();
        let exog = vec![TimeSeries::new("crude", series.dates().to_vec(), crude).unwrap()];

        let mut model = ArimaForecaster::new(small());
        model.fit_with_exog(&series, Some(&exog), true).unwrap();
        assert_relative_eq!(model.regression().unwrap().coefficients[0], 10.0, epsilon = 0.2);

        let high = vec![90.0; 5];
        let low = vec![70.0; 5];
        let up = model.forecast_with_exog(5, Some(&[high.as_slice()]), 0.05).unwrap();
        let down = model.forecast_with_exog(5, Some(&[low.as_slice()]), 0.05).unwrap();
        assert!(up.values()[0] - down.values()[0] > 150.0);

        let wrong = model.forecast_with_exog(5, Some(&[high.as_slice(), low.as_slice()]), 0.05);
        assert!(matches!(wrong, Err(ForecastError::DimensionMismatch { .. })));
    }

    #[test]
    fn validation_flags_aic_ceiling() {
        let series = noisy_trend(200, 4);
        let mut model = ArimaForecaster::new(small().with_aic_ceiling(10.0));
        model.fit_with_exog(&series, None, true).unwrap();
        let validation = model.validate_model().unwrap();
        assert!(!validation.is_valid);
        assert!(validation.issues.iter().any(|i| i.contains("AIC")));
    }

    #[test]
    fn diagnostics_summarize_residuals() {
        let series = noisy_trend(150, 6);
        let mut model = ArimaForecaster::new(small());
        model.fit(&series).unwrap();
        let diag = model.diagnostics().unwrap();
        assert!(diag.residual_mean.abs() < 1.0);
        assert!(diag.residual_std > 0.5 && diag.residual_std < 5.0);
        assert!(diag.durbin_watson > 0.0 && diag.durbin_watson < 4.0);
        assert_eq!(diag.ljung_box.lags, 10);
        assert_eq!(model.fitted_values().unwrap().len(), 150);
    }
}
