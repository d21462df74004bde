//! Inverse-error weighted combination of fitted forecasters.
//!
//! Each component receives weight `1 / (1 + MAE)`, normalized over the
//! ensemble. Components whose forecast fails are dropped and the weights are
//! renormalized over the survivors. The band of the combined forecast is the
//! weighted average of the component bands, not a proper mixture quantile.

use crate::core::ForecastResult;
use crate::error::{ForecastError, Result};
use crate::models::BoxedForecaster;
use crate::utils::metrics::{mae, rmse};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Combination weight per component name.
pub type EnsembleWeights = BTreeMap<String, f64>;

/// Recorded accuracy of a component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPerformance {
    pub mae: f64,
    pub rmse: f64,
    /// Mean absolute percentage error in percent.
    pub mape: Option<f64>,
}

impl ModelPerformance {
    /// Accuracy of in-sample residuals; undefined (NaN) entries are skipped.
    ///
    /// Returns `None` when no residual is defined.
    pub fn from_residuals(residuals: &[f64]) -> Option<Self> {
        let valid: Vec<f64> = residuals.iter().copied().filter(|r| r.is_finite()).collect();
        if valid.is_empty() {
            return None;
        }
        let zeros = vec![0.0; valid.len()];
        Some(Self {
            mae: mae(&valid, &zeros),
            rmse: rmse(&valid, &zeros),
            mape: None,
        })
    }
}

/// Configuration for [`EnsembleCombiner`].
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleConfig {
    /// Normalized weights below this are raised to it before renormalizing.
    pub min_weight: f64,
    /// Normalized weights above this are lowered to it before renormalizing.
    pub max_weight: f64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            min_weight: 0.0,
            max_weight: 1.0,
        }
    }
}

impl EnsembleConfig {
    pub fn with_weight_bounds(mut self, min_weight: f64, max_weight: f64) -> Self {
        self.min_weight = min_weight.max(0.0);
        self.max_weight = max_weight.max(self.min_weight);
        self
    }
}

/// Output of [`EnsembleCombiner::combine`].
#[derive(Debug, Clone)]
pub struct EnsembleForecast {
    pub forecast: ForecastResult,
    /// Weights applied to the components that forecast successfully; they sum to 1.
    pub weights: EnsembleWeights,
}

struct Member {
    name: String,
    model: BoxedForecaster,
    performance: Option<ModelPerformance>,
}

/// Weighted ensemble over independently fitted forecasters.
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use fuelcast::core::TimeSeries;
/// use fuelcast::models::baseline::RandomWalkWithDrift;
/// use fuelcast::models::ensemble::{EnsembleCombiner, EnsembleConfig, ModelPerformance};
/// use fuelcast::models::exponential::HoltLinearTrend;
/// use fuelcast::models::Forecaster;
///
/// let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// let series = TimeSeries::daily(start, (0..60).map(|i| 1700.0 + i as f64).collect()).unwrap();
///
/// let mut drift = RandomWalkWithDrift::new();
/// drift.fit(&series).unwrap();
/// let mut holt = HoltLinearTrend::new(0.5, 0.2);
/// holt.fit(&series).unwrap();
///
/// let mut ensemble = EnsembleCombiner::new(EnsembleConfig::default());
/// ensemble.add_model("drift", Box::new(drift), None).unwrap();
/// ensemble
///     .add_model("holt", Box::new(holt), Some(ModelPerformance { mae: 3.0, rmse: 4.0, mape: None }))
///     .unwrap();
///
/// let weights = ensemble.weights();
/// assert!((weights.values().sum::<f64>() - 1.0).abs() < 1e-9);
/// let combined = ensemble.combine(7, 0.05).unwrap();
/// assert_eq!(combined.forecast.horizon(), 7);
/// assert_eq!(combined.weights.len(), 2);
/// ```
pub struct EnsembleCombiner {
    config: EnsembleConfig,
    members: Vec<Member>,
}

impl EnsembleCombiner {
    pub fn new(config: EnsembleConfig) -> Self {
        Self {
            config,
            members: Vec::new(),
        }
    }

    /// Add a fitted component under a unique name.
    ///
    /// Without `performance` the component's MAE comes from its in-sample
    /// residuals, or it gets raw weight 1 when it has none.
    pub fn add_model(
        &mut self,
        name: impl Into<String>,
        model: BoxedForecaster,
        performance: Option<ModelPerformance>,
    ) -> Result<()> {
        let name = name.into();
        if self.members.iter().any(|m| m.name == name) {
            return Err(ForecastError::InvalidParameter(format!(
                "duplicate ensemble member '{name}'"
            )));
        }
        self.members.push(Member {
            name,
            model,
            performance,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.name.as_str()).collect()
    }

    /// MAE used for weighting, if known.
    fn member_mae(member: &Member) -> Option<f64> {
        member
            .performance
            .or_else(|| member.model.residuals().and_then(ModelPerformance::from_residuals))
            .map(|p| p.mae)
    }

    fn raw_weight(member: &Member) -> f64 {
        match Self::member_mae(member) {
            Some(mae) if mae.is_finite() && mae >= 0.0 => 1.0 / (1.0 + mae),
            Some(_) => 0.0,
            None => 1.0,
        }
    }

    /// Normalized weights; each is non-negative and they sum to 1.
    pub fn weights(&self) -> EnsembleWeights {
        let raw: Vec<f64> = self.members.iter().map(Self::raw_weight).collect();
        let mut weights = normalize(&raw);
        let (lo, hi) = (self.config.min_weight, self.config.max_weight);
        if lo > 0.0 || hi < 1.0 {
            let clamped: Vec<f64> = weights.iter().map(|w| w.clamp(lo, hi)).collect();
            weights = normalize(&clamped);
        }
        self.members
            .iter()
            .zip(weights)
            .map(|(m, w)| (m.name.clone(), w))
            .collect()
    }

    /// Weighted average of the component forecasts that succeed.
    ///
    /// Failed components are dropped and the weights of the rest renormalized;
    /// the returned weights are the ones applied.
    pub fn combine(&self, steps: usize, alpha: f64) -> Result<EnsembleForecast> {
        let weights = self.weights();
        let mut survivors: Vec<(&str, f64, ForecastResult)> = Vec::new();
        for member in &self.members {
            match member.model.forecast(steps, alpha) {
                Ok(f) if f.horizon() == steps && f.values().iter().all(|v| v.is_finite()) => {
                    let w = weights.get(&member.name).copied().unwrap_or(0.0);
                    survivors.push((member.name.as_str(), w, f));
                }
                Ok(_) => warn!(model = %member.name, "component forecast is not usable"),
                Err(err) => warn!(model = %member.name, error = %err, "component forecast failed"),
            }
        }
        if survivors.is_empty() {
            return Err(ForecastError::NoSurvivingModel);
        }

        let raw: Vec<f64> = survivors.iter().map(|(_, w, _)| *w).collect();
        let renormalized = normalize(&raw);
        let blend = |pick: fn(&ForecastResult) -> &[f64]| -> Vec<f64> {
            (0..steps)
                .map(|h| {
                    survivors
                        .iter()
                        .zip(&renormalized)
                        .map(|((_, _, f), w)| w * pick(f)[h])
                        .sum()
                })
                .collect()
        };
        let values = blend(ForecastResult::values);
        let lower = blend(ForecastResult::lower);
        let upper = blend(ForecastResult::upper);
        let dates = survivors[0].2.dates().to_vec();

        debug!(
            survivors = survivors.len(),
            members = self.members.len(),
            steps,
            "ensemble combined"
        );

        let names: Vec<&str> = survivors.iter().map(|(n, _, _)| *n).collect();
        let mut result = ForecastResult::new(dates, values, lower, upper)?
            .with_info("model", "ensemble")
            .with_info("components", names.join(","));
        for ((name, _, _), w) in survivors.iter().zip(&renormalized) {
            result = result.with_info(format!("weight.{name}"), format!("{w:.6}"));
        }
        let applied = survivors
            .iter()
            .zip(renormalized)
            .map(|((name, _, _), w)| (name.to_string(), w))
            .collect();
        Ok(EnsembleForecast {
            forecast: result,
            weights: applied,
        })
    }
}

fn normalize(raw: &[f64]) -> Vec<f64> {
    let total: f64 = raw.iter().sum();
    if total > 0.0 && total.is_finite() {
        raw.iter().map(|w| w / total).collect()
    } else if raw.is_empty() {
        Vec::new()
    } else {
        vec![1.0 / raw.len() as f64; raw.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TimeSeries;
    use crate::models::baseline::RandomWalkWithDrift;
    use crate::models::exponential::HoltLinearTrend;
    use crate::models::Forecaster;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn series() -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let values = (0..60).map(|i| 1700.0 + 0.5 * i as f64 + (i as f64).sin()).collect();
        TimeSeries::daily(start, values).unwrap()
    }

    fn fitted_drift() -> BoxedForecaster {
        let mut model = RandomWalkWithDrift::new();
        model.fit(&series()).unwrap();
        Box::new(model)
    }

    fn perf(mae: f64) -> Option<ModelPerformance> {
        Some(ModelPerformance {
            mae,
            rmse: mae,
            mape: None,
        })
    }

    #[test]
    fn weights_follow_inverse_mae() {
        let mut ensemble = EnsembleCombiner::new(EnsembleConfig::default());
        ensemble.add_model("a", fitted_drift(), perf(1.0)).unwrap();
        ensemble.add_model("b", fitted_drift(), perf(3.0)).unwrap();
        let w = ensemble.weights();
        // raw 1/2 and 1/4
        assert_relative_eq!(w["a"], 2.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(w["b"], 1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn residual_mae_used_when_performance_missing() {
        let mut ensemble = EnsembleCombiner::new(EnsembleConfig::default());
        let model = fitted_drift();
        let expected = ModelPerformance::from_residuals(model.residuals().unwrap()).unwrap().mae;
        ensemble.add_model("drift", model, None).unwrap();
        ensemble.add_model("perfect", fitted_drift(), perf(0.0)).unwrap();
        let w = ensemble.weights();
        assert_relative_eq!(w["perfect"] / w["drift"], 1.0 + expected, epsilon = 1e-9);
    }

    #[test]
    fn unfitted_component_without_residuals_weighs_one() {
        let mut ensemble = EnsembleCombiner::new(EnsembleConfig::default());
        ensemble.add_model("raw", Box::new(HoltLinearTrend::auto()), None).unwrap();
        ensemble.add_model("known", fitted_drift(), perf(1.0)).unwrap();
        let w = ensemble.weights();
        assert_relative_eq!(w["raw"], 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn failed_component_is_dropped() {
        let mut ensemble = EnsembleCombiner::new(EnsembleConfig::default());
        ensemble.add_model("unfitted", Box::new(HoltLinearTrend::auto()), perf(0.0)).unwrap();
        ensemble.add_model("drift", fitted_drift(), perf(5.0)).unwrap();

        let combined = ensemble.combine(5, 0.05).unwrap();
        let alone = fitted_drift().forecast(5, 0.05).unwrap();
        for (a, b) in combined.forecast.values().iter().zip(alone.values()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-9);
        }
        assert_eq!(combined.forecast.info("components"), Some("drift"));
    }

    #[test]
    fn applied_weights_cover_survivors_only() {
        let mut ensemble = EnsembleCombiner::new(EnsembleConfig::default());
        ensemble.add_model("unfitted", Box::new(HoltLinearTrend::auto()), perf(0.0)).unwrap();
        ensemble.add_model("a", fitted_drift(), perf(1.0)).unwrap();
        ensemble.add_model("b", fitted_drift(), perf(3.0)).unwrap();

        // the failing member still holds the largest configured weight
        assert_relative_eq!(ensemble.weights()["unfitted"], 4.0 / 7.0, epsilon = 1e-12);

        let combined = ensemble.combine(5, 0.05).unwrap();
        assert_eq!(combined.weights.len(), 2);
        assert!(!combined.weights.contains_key("unfitted"));
        assert_relative_eq!(combined.weights.values().sum::<f64>(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(combined.weights["a"], 2.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(combined.weights["b"], 1.0 / 3.0, epsilon = 1e-12);
        assert_eq!(combined.forecast.info("weight.a"), Some("0.666667"));
    }

    #[test]
    fn no_survivors_is_an_error() {
        let mut ensemble = EnsembleCombiner::new(EnsembleConfig::default());
        ensemble.add_model("unfitted", Box::new(HoltLinearTrend::auto()), None).unwrap();
        assert_eq!(ensemble.combine(3, 0.05).unwrap_err(), ForecastError::NoSurvivingModel);
        let empty = EnsembleCombiner::new(EnsembleConfig::default());
        assert_eq!(empty.combine(3, 0.05).unwrap_err(), ForecastError::NoSurvivingModel);
    }

    #[test]
    fn combination_is_weighted_average() {
        let mut holt = HoltLinearTrend::new(0.5, 0.2);
        holt.fit(&series()).unwrap();
        let holt_fc = holt.forecast(4, 0.05).unwrap();
        let drift_fc = fitted_drift().forecast(4, 0.05).unwrap();

        let mut ensemble = EnsembleCombiner::new(EnsembleConfig::default());
        ensemble.add_model("holt", Box::new(holt), perf(1.0)).unwrap();
        ensemble.add_model("drift", fitted_drift(), perf(3.0)).unwrap();
        let combined = ensemble.combine(4, 0.05).unwrap().forecast;
        for h in 0..4 {
            let expected = (2.0 * holt_fc.values()[h] + drift_fc.values()[h]) / 3.0;
            assert_relative_eq!(combined.values()[h], expected, epsilon = 1e-9);
            let lower = (2.0 * holt_fc.lower()[h] + drift_fc.lower()[h]) / 3.0;
            assert_relative_eq!(combined.lower()[h], lower, epsilon = 1e-9);
        }
    }

    #[test]
    fn clamping_caps_dominant_weight() {
        let config = EnsembleConfig::default().with_weight_bounds(0.0, 0.5);
        let mut ensemble = EnsembleCombiner::new(config);
        ensemble.add_model("a", fitted_drift(), perf(0.0)).unwrap();
        ensemble.add_model("b", fitted_drift(), perf(9.0)).unwrap();
        ensemble.add_model("c", fitted_drift(), perf(9.0)).unwrap();
        let w = ensemble.weights();
        assert_relative_eq!(w.values().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert!(w["a"] >= w["b"]);
        assert!(w["a"] < 10.0 / 12.0);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut ensemble = EnsembleCombiner::new(EnsembleConfig::default());
        ensemble.add_model("x", fitted_drift(), None).unwrap();
        assert!(ensemble.add_model("x", fitted_drift(), None).is_err());
        assert_eq!(ensemble.len(), 1);
    }
}
