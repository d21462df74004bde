//! # fuelcast
//!
//! Decomposition, anomaly detection and ensemble forecasting for daily fuel
//! price series.
//!
//! A forecast cycle prepares a raw daily series, splits it into trend,
//! seasonal and residual components, flags and classifies anomalies, fits
//! several independent component models and combines them into one forecast
//! with an uncertainty band. Forecast quality is measured by rolling-origin
//! backtests.

// Allow some clippy warnings for cleaner code in specific cases
#![allow(clippy::upper_case_acronyms)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]
#![allow(clippy::needless_range_loop)]

pub mod backtest;
pub mod changepoint;
pub mod core;
pub mod detection;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod seasonality;
pub mod transform;
pub mod utils;
pub mod validation;

pub use error::{ForecastError, Result};

pub mod prelude {
    pub use crate::backtest::{BacktestConfig, Backtester};
    pub use crate::core::{ForecastResult, TimeSeries};
    pub use crate::detection::{AnomalyDetector, DetectionMethod, DetectorConfig};
    pub use crate::error::{ForecastError, Result};
    pub use crate::models::arima::{ArimaConfig, ArimaForecaster, InformationCriterion};
    pub use crate::models::ensemble::{EnsembleCombiner, EnsembleConfig};
    pub use crate::models::Forecaster;
    pub use crate::pipeline::{run_batch, CycleConfig, ForecastCycle, UnitInput, UnitKey};
    pub use crate::seasonality::{Decomposer, DecompositionMethod};
    pub use crate::transform::{PrepareConfig, SeriesPreparer};
    pub use crate::utils::{calculate_metrics, AccuracyMetrics};
}
