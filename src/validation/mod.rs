//! Statistical tests for fitted models and input series.
//!
//! # Example
//!
//! ```
//! use fuelcast::validation::{adf_test, kpss_test, ljung_box, KpssRegression};
//!
//! let residuals = vec![0.1, -0.2, 0.15, -0.1, 0.05, -0.08, 0.12, -0.15, 0.1, -0.05, 0.02, -0.03];
//! let lb = ljung_box(&residuals, 5, 0);
//! assert_eq!(lb.lags, 5);
//!
//! let series: Vec<f64> = (0..60).map(|i| 10.0 + (i as f64 * 0.7).sin()).collect();
//! let adf = adf_test(&series, None);
//! let kpss = kpss_test(&series, KpssRegression::Level, None);
//! assert!(adf.statistic.is_finite() && kpss.statistic.is_finite());
//! ```

mod residual_tests;
mod stationarity;

pub use residual_tests::{durbin_watson, ljung_box, LjungBoxResult};
pub use stationarity::{
    adf_test, check_stationarity, kpss_test, ndiffs, CriticalValues, KpssRegression,
    StationarityDiagnostics, StationarityResult,
};
