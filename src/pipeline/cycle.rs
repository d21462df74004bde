//! One forecast cycle for a (region, fuel type) unit.

use crate::changepoint::{detect_structural_breaks, BreakConfig, StructuralBreak};
use crate::core::{ForecastResult, TimeSeries};
use crate::detection::{
    analyze_anomaly_patterns, AnomalyDetector, AnomalyProfile, DetectionMethod, DetectorConfig,
    OutlierResult,
};
use crate::error::Result;
use crate::models::arima::{ArimaConfig, ArimaForecaster, ModelOrder, ModelValidation};
use crate::models::baseline::RandomWalkWithDrift;
use crate::models::ensemble::{EnsembleCombiner, EnsembleConfig, EnsembleWeights};
use crate::models::exponential::HoltLinearTrend;
use crate::models::{BoxedForecaster, Forecaster};
use crate::seasonality::{DecomposeConfig, Decomposer, DecompositionMethod, DecompositionResult};
use crate::transform::{PrepareConfig, SeriesPreparer};
use std::fmt;
use tracing::{debug, warn};

/// Identifies one unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitKey {
    pub region: String,
    pub fuel_type: String,
}

impl UnitKey {
    pub fn new(region: impl Into<String>, fuel_type: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            fuel_type: fuel_type.into(),
        }
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.region, self.fuel_type)
    }
}

/// Raw input of one unit: the price series and optional drivers.
#[derive(Debug, Clone)]
pub struct UnitInput {
    pub key: UnitKey,
    pub series: TimeSeries,
    /// Exogenous drivers such as crude price, exchange rate or tax rate.
    pub exogenous: Vec<TimeSeries>,
}

impl UnitInput {
    pub fn new(key: UnitKey, series: TimeSeries) -> Self {
        Self {
            key,
            series,
            exogenous: Vec::new(),
        }
    }

    pub fn with_exogenous(mut self, exogenous: Vec<TimeSeries>) -> Self {
        self.exogenous = exogenous;
        self
    }
}

/// Everything a cycle produces for one unit.
#[derive(Debug, Clone)]
pub struct UnitForecast {
    pub key: UnitKey,
    pub forecast: ForecastResult,
    /// Weights applied in the combination, over the components that forecast.
    pub weights: EnsembleWeights,
    pub outliers: OutlierResult,
    pub anomalies: AnomalyProfile,
    pub decomposition: DecompositionResult,
    pub breaks: Vec<StructuralBreak>,
    /// Selected ARIMA order, if the ARIMA component fitted.
    pub arima_order: Option<ModelOrder>,
    pub arima_validation: Option<ModelValidation>,
    /// Quality score of the prepared series, in `[0, 1]`.
    pub quality_score: f64,
}

/// Configuration of a [`ForecastCycle`].
#[derive(Debug, Clone, PartialEq)]
pub struct CycleConfig {
    pub prepare: PrepareConfig,
    pub decompose: DecomposeConfig,
    pub decomposition_method: DecompositionMethod,
    /// Seasonal period (days) for decomposition.
    pub seasonal_period: usize,
    pub detector: DetectorConfig,
    pub detection_method: DetectionMethod,
    /// Expected anomaly fraction for the isolation forest.
    pub contamination: f64,
    pub breaks: BreakConfig,
    pub arima: ArimaConfig,
    /// Stepwise order search instead of the full grid.
    pub auto_select: bool,
    pub ensemble: EnsembleConfig,
    /// Forecast horizon in days.
    pub horizon: usize,
    pub alpha: f64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            prepare: PrepareConfig::default(),
            decompose: DecomposeConfig::default(),
            decomposition_method: DecompositionMethod::Stl,
            seasonal_period: 7,
            detector: DetectorConfig::default(),
            detection_method: DetectionMethod::Ensemble,
            contamination: 0.1,
            breaks: BreakConfig::default(),
            arima: ArimaConfig::default(),
            auto_select: true,
            ensemble: EnsembleConfig::default(),
            horizon: 30,
            alpha: 0.05,
        }
    }
}

impl CycleConfig {
    pub fn with_horizon(mut self, horizon: usize) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn with_seasonal_period(mut self, period: usize) -> Self {
        self.seasonal_period = period;
        self
    }

    pub fn with_prepare(mut self, prepare: PrepareConfig) -> Self {
        self.prepare = prepare;
        self
    }

    pub fn with_arima(mut self, arima: ArimaConfig) -> Self {
        self.arima = arima;
        self
    }

    pub fn with_detection_method(mut self, method: DetectionMethod) -> Self {
        self.detection_method = method;
        self
    }
}

/// Fit outcome of one component.
type Fitted<T> = Result<T>;

/// prepare → decompose → detect → fit components → combine.
#[derive(Debug, Clone, Default)]
pub struct ForecastCycle {
    config: CycleConfig,
}

impl ForecastCycle {
    pub fn new(config: CycleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CycleConfig {
        &self.config
    }

    /// Run the full cycle for one unit.
    ///
    /// Anomaly detection sees the gap-filled but unclipped series; the
    /// decomposition, break detection and models see the winsorized one.
    pub fn run(&self, input: &UnitInput) -> Result<UnitForecast> {
        let cfg = &self.config;
        let unit = input.key.to_string();

        let raw = SeriesPreparer::new(cfg.prepare.clone().with_clip(false)).prepare(&input.series)?;
        let preparer = SeriesPreparer::new(cfg.prepare.clone());
        let report = preparer.prepare_with_report(&raw)?;
        let prepared = report.series;
        let exogenous = if input.exogenous.is_empty() {
            None
        } else {
            Some(preparer.align_exogenous(&prepared, &input.exogenous)?)
        };

        let decomposition = Decomposer::new(cfg.decompose.clone()).decompose(
            &prepared,
            cfg.decomposition_method,
            cfg.seasonal_period,
        )?;
        let breaks = detect_structural_breaks(&prepared, &cfg.breaks);
        let outliers = AnomalyDetector::new(cfg.detector.clone()).detect(
            &raw,
            cfg.detection_method,
            cfg.contamination,
        );
        let anomalies = analyze_anomaly_patterns(&raw);
        debug!(
            unit = %unit,
            n = prepared.len(),
            quality = report.quality_score,
            seasonal_strength = decomposition.seasonal_strength,
            trend_strength = decomposition.trend_strength,
            outliers = outliers.total_count,
            breaks = breaks.len(),
            "unit analyzed"
        );

        let (arima, (holt, drift)) = rayon::join(
            || -> Fitted<ArimaForecaster> {
                let mut model = ArimaForecaster::new(cfg.arima.clone());
                model.fit_with_exog(&prepared, exogenous.as_deref(), cfg.auto_select)?;
                Ok(model)
            },
            || {
                rayon::join(
                    || fit_component(HoltLinearTrend::default(), &prepared),
                    || fit_component(RandomWalkWithDrift::new(), &prepared),
                )
            },
        );

        let arima_order = arima.as_ref().ok().and_then(|m| m.order());
        let arima_validation = arima.as_ref().ok().and_then(|m| m.validate_model().ok());

        let mut ensemble = EnsembleCombiner::new(cfg.ensemble.clone());
        let components: [(&str, Fitted<BoxedForecaster>); 3] = [
            ("arima", arima.map(|m| Box::new(m) as BoxedForecaster)),
            ("holt", holt),
            ("drift", drift),
        ];
        for (name, fitted) in components {
            match fitted {
                Ok(model) => ensemble.add_model(name, model, None)?,
                Err(err) => warn!(unit = %unit, model = name, error = %err, "component fit failed"),
            }
        }

        let combined = ensemble.combine(cfg.horizon, cfg.alpha)?;
        Ok(UnitForecast {
            key: input.key.clone(),
            forecast: combined.forecast.with_info("unit", &unit),
            weights: combined.weights,
            outliers,
            anomalies,
            decomposition,
            breaks,
            arima_order,
            arima_validation,
            quality_score: report.quality_score,
        })
    }
}

fn fit_component<M: Forecaster + 'static>(mut model: M, series: &TimeSeries) -> Fitted<BoxedForecaster> {
    model.fit(series)?;
    Ok(Box::new(model))
}
