//! Forecasting models.
//!
//! - [`arima`]: ARIMA/SARIMA(X) component forecaster with order search
//! - [`exponential`]: damped Holt linear trend
//! - [`baseline`]: random walk with drift
//! - [`ensemble`]: inverse-MAE weighted combination

mod traits;

pub mod arima;
pub mod baseline;
pub mod ensemble;
pub mod exponential;

pub use traits::{BoxedForecaster, Forecaster};
