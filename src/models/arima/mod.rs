//! ARIMA and SARIMA(X) models.
//!
//! This module provides:
//! - Conditional-sum-of-squares estimation for (p, d, q)(P, D, Q)\[s\] orders
//! - Stepwise and grid order search by AIC or BIC
//! - A forecaster with exogenous regressors, residual checks and validation

mod auto_arima;
mod diff;
mod forecaster;
mod model;

pub use auto_arima::{
    grid_search, seasonal_differencing, stepwise_search, InformationCriterion, OrderSearch,
    SearchResult,
};
pub use diff::{difference, integrate, seasonal_difference};
pub use forecaster::{
    ArimaConfig, ArimaForecaster, ModelValidation, ResidualDiagnostics, FALLBACK_ORDER,
};
pub use model::{FittedArima, ModelOrder};
