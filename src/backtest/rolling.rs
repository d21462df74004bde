//! Rolling-origin backtesting over configured lookback windows.

use crate::core::{ForecastResult, TimeSeries};
use crate::error::{ForecastError, Result};
use crate::utils::metrics::{calculate_metrics, direction_hits, AccuracyMetrics};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Configuration for a [`Backtester`].
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    /// Days before the end of the series at which origins are placed.
    pub lookbacks: Vec<usize>,
    /// Forecast horizon compared at each origin.
    pub horizon: usize,
    /// Origins with less training history are skipped.
    pub min_train: usize,
    /// Extra origins every `step` days between `n - lookback` and the end.
    pub step: Option<usize>,
    /// Band significance passed to the pipeline.
    pub alpha: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            lookbacks: vec![30, 60, 90, 180],
            horizon: 7,
            min_train: 60,
            step: None,
            alpha: 0.05,
        }
    }
}

impl BacktestConfig {
    pub fn with_lookbacks(mut self, lookbacks: Vec<usize>) -> Self {
        self.lookbacks = lookbacks;
        self
    }

    pub fn with_horizon(mut self, horizon: usize) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn with_min_train(mut self, min_train: usize) -> Self {
        self.min_train = min_train;
        self
    }

    /// Evaluate additional origins every `step` days inside each window.
    pub fn with_step(mut self, step: usize) -> Self {
        self.step = (step > 0).then_some(step);
        self
    }
}

/// Forecast against actuals at one origin.
#[derive(Debug, Clone, PartialEq)]
pub struct OriginResult {
    pub lookback: usize,
    /// Index of the first forecast day; training covers `[0, origin)`.
    pub origin: usize,
    pub origin_date: NaiveDate,
    /// Last training value, the anchor for directional accuracy.
    pub anchor: f64,
    pub actual: Vec<f64>,
    pub predicted: Vec<f64>,
    pub metrics: AccuracyMetrics,
}

/// Backtest outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestReport {
    /// Metrics pooled over every evaluated origin; `None` if there were none.
    pub overall: Option<AccuracyMetrics>,
    pub by_lookback: BTreeMap<usize, AccuracyMetrics>,
    pub origins: Vec<OriginResult>,
    /// Origins without enough history or verifiable future data.
    pub skipped: usize,
    /// Origins whose pipeline run failed.
    pub failed: usize,
}

impl BacktestReport {
    pub fn n_origins(&self) -> usize {
        self.origins.len()
    }
}

/// Re-runs a forecasting pipeline from historical origins and scores it.
///
/// The pipeline is a closure receiving the training prefix and the horizon,
/// so any combination of preparation, decomposition and models can be
/// evaluated.
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use fuelcast::backtest::{BacktestConfig, Backtester};
/// use fuelcast::core::TimeSeries;
/// use fuelcast::models::baseline::RandomWalkWithDrift;
/// use fuelcast::models::Forecaster;
///
/// let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// let series = TimeSeries::daily(start, (0..250).map(|i| 1600.0 + i as f64).collect()).unwrap();
///
/// let backtester = Backtester::new(BacktestConfig::default());
/// let report = backtester
///     .run(&series, |train, horizon| {
///         let mut model = RandomWalkWithDrift::new();
///         model.fit(train)?;
///         model.forecast(horizon, 0.05)
///     })
///     .unwrap();
/// assert_eq!(report.n_origins(), 4);
/// assert!(report.overall.unwrap().mae < 1e-9);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Backtester {
    config: BacktestConfig,
}

impl Backtester {
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Candidate origins of one lookback window.
    fn origins(&self, n: usize, lookback: usize) -> Vec<usize> {
        if lookback == 0 || lookback > n {
            return Vec::new();
        }
        let first = n - lookback;
        match self.config.step {
            Some(step) => (first..n).step_by(step).collect(),
            None => vec![first],
        }
    }

    /// Evaluate `pipeline` at every origin of every lookback.
    pub fn run<F>(&self, series: &TimeSeries, pipeline: F) -> Result<BacktestReport>
    where
        F: Fn(&TimeSeries, usize) -> Result<ForecastResult>,
    {
        let horizon = self.config.horizon;
        if horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "backtest horizon must be positive".to_string(),
            ));
        }
        let n = series.len();
        let values = series.values();

        let mut origins = Vec::new();
        let mut skipped = 0;
        let mut failed = 0;

        for &lookback in &self.config.lookbacks {
            if lookback > n {
                debug!(lookback, n, "lookback exceeds series length");
                skipped += 1;
                continue;
            }
            for origin in self.origins(n, lookback) {
                if origin < self.config.min_train.max(1) {
                    debug!(lookback, origin, "origin lacks training history");
                    skipped += 1;
                    continue;
                }
                if origin + horizon > n {
                    debug!(
                        lookback,
                        origin,
                        available = n - origin,
                        horizon,
                        "origin lacks verifiable future data"
                    );
                    skipped += 1;
                    continue;
                }

                let train = series.slice(0, origin)?;
                let forecast = match pipeline(&train, horizon) {
                    Ok(f) => f,
                    Err(err) => {
                        warn!(lookback, origin, error = %err, "pipeline failed at origin");
                        failed += 1;
                        continue;
                    }
                };
                if forecast.horizon() < horizon {
                    warn!(
                        lookback,
                        origin,
                        got = forecast.horizon(),
                        horizon,
                        "pipeline returned a short forecast"
                    );
                    failed += 1;
                    continue;
                }

                let actual = values[origin..origin + horizon].to_vec();
                let predicted = forecast.values()[..horizon].to_vec();
                let anchor = values[origin - 1];
                let mut metrics = calculate_metrics(&actual, &predicted)?;
                metrics.directional_accuracy =
                    pooled_direction(std::iter::once((&actual, &predicted, anchor)));
                origins.push(OriginResult {
                    lookback,
                    origin,
                    origin_date: series.dates()[origin],
                    anchor,
                    actual,
                    predicted,
                    metrics,
                });
            }
        }

        let overall = summarize(origins.iter())?;
        let mut by_lookback = BTreeMap::new();
        for &lookback in &self.config.lookbacks {
            if let Some(m) = summarize(origins.iter().filter(|o| o.lookback == lookback))? {
                by_lookback.insert(lookback, m);
            }
        }

        info!(
            series = series.name(),
            evaluated = origins.len(),
            skipped,
            failed,
            mape = overall.as_ref().and_then(|m| m.mape).unwrap_or(f64::NAN),
            "backtest finished"
        );

        Ok(BacktestReport {
            overall,
            by_lookback,
            origins,
            skipped,
            failed,
        })
    }
}

fn pooled_direction<'a>(runs: impl Iterator<Item = (&'a Vec<f64>, &'a Vec<f64>, f64)>) -> Option<f64> {
    let (hits, total) = runs.fold((0, 0), |(h, t), (actual, predicted, anchor)| {
        let (dh, dt) = direction_hits(actual, predicted, Some(anchor));
        (h + dh, t + dt)
    });
    (total > 0).then(|| hits as f64 / total as f64)
}

/// Metrics pooled over origins, with anchored directional accuracy.
fn summarize<'a>(origins: impl Iterator<Item = &'a OriginResult> + Clone) -> Result<Option<AccuracyMetrics>> {
    let actual: Vec<f64> = origins.clone().flat_map(|o| o.actual.iter().copied()).collect();
    if actual.is_empty() {
        return Ok(None);
    }
    let predicted: Vec<f64> = origins.clone().flat_map(|o| o.predicted.iter().copied()).collect();
    let mut metrics = calculate_metrics(&actual, &predicted)?;
    metrics.directional_accuracy = pooled_direction(origins.map(|o| (&o.actual, &o.predicted, o.anchor)));
    Ok(Some(metrics))
}
