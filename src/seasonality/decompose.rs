//! Trend / seasonal / residual decomposition of prepared daily series.

use super::classical::{classical_decompose, Components, SeasonalMode};
use super::hp_filter::{default_lambda, hp_filter};
use super::stl::STL;
use crate::core::TimeSeries;
use crate::error::{ForecastError, Result};
use crate::transform::savgol_filter;
use crate::utils::stats::population_variance;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Decomposition strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecompositionMethod {
    /// Centered moving-average trend with per-phase seasonal indices.
    Classical,
    /// Iterative LOESS (STL), robust by default.
    #[default]
    Stl,
    /// Hodrick-Prescott trend only; the seasonal component is zero.
    HpFilter,
    /// STL whose residual is Savitzky-Golay smoothed; the rough part moves into the trend.
    Enhanced,
}

impl DecompositionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecompositionMethod::Classical => "classical",
            DecompositionMethod::Stl => "stl",
            DecompositionMethod::HpFilter => "hp_filter",
            DecompositionMethod::Enhanced => "enhanced",
        }
    }
}

/// Configuration for [`Decomposer`].
#[derive(Debug, Clone, PartialEq)]
pub struct DecomposeConfig {
    /// Combination mode for the classical method.
    pub mode: SeasonalMode,
    /// Use robustness iterations in STL.
    pub stl_robust: bool,
    /// STL seasonal LOESS span.
    pub stl_seasonal_smoothness: usize,
    /// HP penalty; `None` picks 129600 for series longer than 365 days, else 1600.
    pub hp_lambda: Option<f64>,
    /// Savitzky-Golay window for the enhanced method.
    pub savgol_window: usize,
    /// Savitzky-Golay polynomial order for the enhanced method.
    pub savgol_polyorder: usize,
}

impl Default for DecomposeConfig {
    fn default() -> Self {
        Self {
            mode: SeasonalMode::Additive,
            stl_robust: true,
            stl_seasonal_smoothness: 7,
            hp_lambda: None,
            savgol_window: 21,
            savgol_polyorder: 3,
        }
    }
}

impl DecomposeConfig {
    pub fn with_mode(mut self, mode: SeasonalMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_stl_robust(mut self, robust: bool) -> Self {
        self.stl_robust = robust;
        self
    }

    pub fn with_hp_lambda(mut self, lambda: f64) -> Self {
        self.hp_lambda = Some(lambda);
        self
    }
}

/// Result of a decomposition.
///
/// Additive: `original = trend + seasonal + residual`.
/// Multiplicative: `original = trend × seasonal × (1 + residual)`.
#[derive(Debug, Clone)]
pub struct DecompositionResult {
    pub original: TimeSeries,
    pub trend: TimeSeries,
    pub seasonal: TimeSeries,
    pub residual: TimeSeries,
    pub seasonal_strength: f64,
    pub trend_strength: f64,
    /// Method that actually produced the components (after any fallback).
    pub method: DecompositionMethod,
    pub mode: SeasonalMode,
    pub metadata: BTreeMap<String, String>,
}

impl DecompositionResult {
    /// Rebuild the original values from the components.
    pub fn reconstruct(&self) -> Vec<f64> {
        let (t, s, r) = (
            self.trend.values(),
            self.seasonal.values(),
            self.residual.values(),
        );
        (0..t.len())
            .map(|i| match self.mode {
                SeasonalMode::Additive => t[i] + s[i] + r[i],
                SeasonalMode::Multiplicative => t[i] * s[i] * (1.0 + r[i]),
            })
            .collect()
    }

    /// Whether any fallback transition happened.
    pub fn fell_back(&self) -> bool {
        self.metadata.contains_key("fallback")
    }
}

/// `Var(component) / (Var(component) + Var(residual))`, clamped to [0, 1].
///
/// Returns 0 when the summed variance is below 1e-10 (rounding noise of a
/// constant series).
pub fn component_strength(component: &[f64], residual: &[f64]) -> f64 {
    let vc = population_variance(component);
    let vr = population_variance(residual);
    let total = vc + vr;
    if total < 1e-10 || !total.is_finite() {
        return 0.0;
    }
    (vc / total).clamp(0.0, 1.0)
}

/// Splits a series into trend, seasonal and residual components.
#[derive(Debug, Clone, Default)]
pub struct Decomposer {
    config: DecomposeConfig,
}

impl Decomposer {
    pub fn new(config: DecomposeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecomposeConfig {
        &self.config
    }

    /// Decompose `series` with `method` at the given seasonal period (days).
    ///
    /// STL that cannot run falls back to classical; multiplicative classical
    /// on non-positive data falls back to additive. Both transitions are
    /// logged and recorded under the `fallback` metadata key.
    pub fn decompose(
        &self,
        series: &TimeSeries,
        method: DecompositionMethod,
        seasonal_period: usize,
    ) -> Result<DecompositionResult> {
        if series.has_missing_values() {
            return Err(ForecastError::InvalidSeries(
                "decomposition requires a prepared series without missing values".to_string(),
            ));
        }
        let values = series.values();
        let mut metadata = BTreeMap::new();
        metadata.insert("period".to_string(), seasonal_period.to_string());
        debug!(
            series = series.name(),
            method = method.as_str(),
            period = seasonal_period,
            n = values.len(),
            "decomposing series"
        );

        let (components, used, mode) = match method {
            DecompositionMethod::Classical => {
                let (c, mode) = self.classical(values, seasonal_period, &mut metadata)?;
                (c, DecompositionMethod::Classical, mode)
            }
            DecompositionMethod::Stl => self.stl_or_classical(values, seasonal_period, &mut metadata)?,
            DecompositionMethod::HpFilter => {
                let lambda = self.config.hp_lambda.unwrap_or_else(|| default_lambda(values.len()));
                metadata.insert("lambda".to_string(), lambda.to_string());
                let trend = hp_filter(values, lambda)?;
                let residual = values.iter().zip(&trend).map(|(x, t)| x - t).collect();
                let c = Components {
                    seasonal: vec![0.0; values.len()],
                    trend,
                    residual,
                };
                (c, DecompositionMethod::HpFilter, SeasonalMode::Additive)
            }
            DecompositionMethod::Enhanced => {
                let (mut c, used, mode) = self.stl_or_classical(values, seasonal_period, &mut metadata)?;
                if mode == SeasonalMode::Additive && values.len() > self.config.savgol_window {
                    let smoothed = savgol_filter(
                        &c.residual,
                        self.config.savgol_window,
                        self.config.savgol_polyorder,
                    );
                    for i in 0..values.len() {
                        c.trend[i] += c.residual[i] - smoothed[i];
                    }
                    c.residual = smoothed;
                    metadata.insert("savgol_window".to_string(), self.config.savgol_window.to_string());
                }
                let used = if used == DecompositionMethod::Stl {
                    DecompositionMethod::Enhanced
                } else {
                    used
                };
                (c, used, mode)
            }
        };

        let (seasonal_strength, trend_strength) = strengths(values, &components, mode);
        metadata.insert("method".to_string(), used.as_str().to_string());
        metadata.insert("mode".to_string(), mode.as_str().to_string());

        Ok(DecompositionResult {
            original: series.clone(),
            trend: series.with_values(components.trend)?.renamed(format!("{}_trend", series.name())),
            seasonal: series
                .with_values(components.seasonal)?
                .renamed(format!("{}_seasonal", series.name())),
            residual: series
                .with_values(components.residual)?
                .renamed(format!("{}_residual", series.name())),
            seasonal_strength,
            trend_strength,
            method: used,
            mode,
            metadata,
        })
    }

    fn classical(
        &self,
        values: &[f64],
        period: usize,
        metadata: &mut BTreeMap<String, String>,
    ) -> Result<(Components, SeasonalMode)> {
        match classical_decompose(values, period, self.config.mode) {
            Ok(c) => Ok((c, self.config.mode)),
            Err(ForecastError::InvalidSeries(reason)) if self.config.mode == SeasonalMode::Multiplicative => {
                warn!(%reason, "multiplicative decomposition unavailable, using additive");
                metadata.insert("fallback".to_string(), "multiplicative->additive".to_string());
                metadata.insert("fallback_reason".to_string(), reason);
                Ok((
                    classical_decompose(values, period, SeasonalMode::Additive)?,
                    SeasonalMode::Additive,
                ))
            }
            Err(e) => Err(e),
        }
    }

    fn stl_or_classical(
        &self,
        values: &[f64],
        period: usize,
        metadata: &mut BTreeMap<String, String>,
    ) -> Result<(Components, DecompositionMethod, SeasonalMode)> {
        let mut stl = STL::new(period).with_seasonal_smoothness(self.config.stl_seasonal_smoothness);
        if self.config.stl_robust {
            stl = stl.robust();
        }
        let attempt = if period < 2 {
            Err(ForecastError::InvalidParameter(format!(
                "seasonal period must be at least 2, got {period}"
            )))
        } else {
            stl.decompose(values)
        };
        match attempt {
            Ok(r) => {
                metadata.insert("robust".to_string(), stl.is_robust().to_string());
                Ok((
                    Components {
                        trend: r.trend,
                        seasonal: r.seasonal,
                        residual: r.remainder,
                    },
                    DecompositionMethod::Stl,
                    SeasonalMode::Additive,
                ))
            }
            Err(err) => {
                warn!(error = %err, "STL failed, falling back to classical decomposition");
                metadata.insert("fallback".to_string(), "stl->classical".to_string());
                metadata.insert("fallback_reason".to_string(), err.to_string());
                let (c, mode) = self.classical(values, period, metadata)?;
                Ok((c, DecompositionMethod::Classical, mode))
            }
        }
    }
}

/// Strengths measured on the additive scale.
///
/// Multiplicative components are mapped to their additive contributions
/// (`t·(s-1)` and `t·s·r`) so that both modes compare like with like.
fn strengths(values: &[f64], c: &Components, mode: SeasonalMode) -> (f64, f64) {
    match mode {
        SeasonalMode::Additive => (
            component_strength(&c.seasonal, &c.residual),
            component_strength(&c.trend, &c.residual),
        ),
        SeasonalMode::Multiplicative => {
            let seasonal: Vec<f64> = c.trend.iter().zip(&c.seasonal).map(|(t, s)| t * (s - 1.0)).collect();
            let residual: Vec<f64> = (0..values.len())
                .map(|i| c.trend[i] * c.seasonal[i] * c.residual[i])
                .collect();
            (
                component_strength(&seasonal, &residual),
                component_strength(&c.trend, &residual),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn make_series(values: Vec<f64>) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        TimeSeries::daily(start, values).unwrap().renamed("diesel")
    }

    fn weekly_prices(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                1500.0 + 0.8 * i as f64
                    + 12.0 * (2.0 * std::f64::consts::PI * i as f64 / 7.0).sin()
                    + 2.0 * ((i * 17 % 13) as f64 / 13.0 - 0.5)
            })
            .collect()
    }

    #[test]
    fn every_method_reconstructs_additively() {
        let series = make_series(weekly_prices(150));
        let decomposer = Decomposer::default();
        for method in [
            DecompositionMethod::Classical,
            DecompositionMethod::Stl,
            DecompositionMethod::HpFilter,
            DecompositionMethod::Enhanced,
        ] {
            let result = decomposer.decompose(&series, method, 7).unwrap();
            assert_eq!(result.method, method);
            for (a, b) in result.reconstruct().iter().zip(series.values()) {
                assert_relative_eq!(a, b, epsilon = 1e-8);
            }
            assert!((0.0..=1.0).contains(&result.seasonal_strength));
            assert!((0.0..=1.0).contains(&result.trend_strength));
        }
    }

    #[test]
    fn weekly_cycle_has_strong_seasonality() {
        let series = make_series(weekly_prices(150));
        let result = Decomposer::default()
            .decompose(&series, DecompositionMethod::Stl, 7)
            .unwrap();
        assert!(result.seasonal_strength > 0.8);
        assert!(result.trend_strength > 0.9);
        assert_eq!(result.metadata["method"], "stl");
    }

    #[test]
    fn hp_filter_has_no_seasonal_component() {
        let series = make_series(weekly_prices(400));
        let result = Decomposer::default()
            .decompose(&series, DecompositionMethod::HpFilter, 7)
            .unwrap();
        assert!(result.seasonal.values().iter().all(|&s| s == 0.0));
        assert_eq!(result.seasonal_strength, 0.0);
        assert_eq!(result.metadata["lambda"], "129600");
    }

    #[test]
    fn constant_series_has_zero_strengths() {
        let series = make_series(vec![1650.0; 60]);
        for method in [
            DecompositionMethod::Classical,
            DecompositionMethod::Stl,
            DecompositionMethod::HpFilter,
        ] {
            let result = Decomposer::default().decompose(&series, method, 7).unwrap();
            assert_eq!(result.seasonal_strength, 0.0);
            assert_eq!(result.trend_strength, 0.0);
        }
    }

    #[test]
    fn multiplicative_falls_back_on_non_positive_values() {
        let mut values = weekly_prices(70);
        values[10] = -1.0;
        let decomposer = Decomposer::new(DecomposeConfig::default().with_mode(SeasonalMode::Multiplicative));
        let result = decomposer
            .decompose(&make_series(values), DecompositionMethod::Classical, 7)
            .unwrap();
        assert_eq!(result.mode, SeasonalMode::Additive);
        assert_eq!(result.metadata["fallback"], "multiplicative->additive");
        assert!(result.fell_back());
    }

    #[test]
    fn multiplicative_reconstructs_positive_prices() {
        let decomposer = Decomposer::new(DecomposeConfig::default().with_mode(SeasonalMode::Multiplicative));
        let series = make_series(weekly_prices(84));
        let result = decomposer
            .decompose(&series, DecompositionMethod::Classical, 7)
            .unwrap();
        assert_eq!(result.mode, SeasonalMode::Multiplicative);
        for (a, b) in result.reconstruct().iter().zip(series.values()) {
            assert_relative_eq!(a, b, epsilon = 1e-8);
        }
    }

    #[test]
    fn degenerate_period_surfaces_error_after_fallback() {
        // STL cannot run with period 1 and neither can the classical fallback.
        let series = make_series(weekly_prices(60));
        let result = Decomposer::default().decompose(&series, DecompositionMethod::Stl, 1);
        assert!(matches!(result, Err(ForecastError::InvalidParameter(_))));
    }

    #[test]
    fn missing_values_are_rejected() {
        let mut values = weekly_prices(60);
        values[5] = f64::NAN;
        let result =
            Decomposer::default().decompose(&make_series(values), DecompositionMethod::Classical, 7);
        assert!(matches!(result, Err(ForecastError::InvalidSeries(_))));
    }
}
