//! Seasonality analysis and decomposition.
//!
//! - Classical moving-average decomposition (additive or multiplicative)
//! - STL: Seasonal-Trend decomposition using LOESS
//! - Hodrick-Prescott trend filter
//! - Calendar profiles, spectral peaks and a seasonality score

mod classical;
mod decompose;
mod hp_filter;
mod profile;
mod spectrum;
mod stl;

pub use classical::{classical_decompose, Components, SeasonalMode};
pub use decompose::{
    component_strength, DecomposeConfig, Decomposer, DecompositionMethod, DecompositionResult,
};
pub use hp_filter::{default_lambda, hp_filter, DAILY_LAMBDA, DEFAULT_LAMBDA};
pub use profile::{analyze_seasonality, seasonality_score, SeasonalityProfile, SEASONAL_LAGS};
pub use spectrum::{dominant_frequencies, fft_real, DominantFrequency};
pub use stl::{STLResult, STL};
