//! Ensemble forecasting.
//!
//! Combines independently fitted component models into one forecast.

mod combiner;

pub use combiner::{
    EnsembleCombiner, EnsembleConfig, EnsembleForecast, EnsembleWeights, ModelPerformance,
};
