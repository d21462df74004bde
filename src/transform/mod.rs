//! Data transformations for daily price series.
//!
//! Provides series preparation (gap filling, excluded periods,
//! winsorization, quality scoring, regressor alignment) and window functions.
//!
//! # Example
//!
//! ```
//! use fuelcast::transform::{pct_change, rolling_mean};
//!
//! let series = vec![100.0, 102.0, 101.0, 105.0, 104.0];
//! let changes = pct_change(&series);
//! let rm = rolling_mean(&series, 3);
//! assert!(changes[0].is_nan());
//! assert!(rm[2].is_finite());
//! ```

pub mod prepare;
pub mod window;

pub use prepare::{
    quality_score, winsorize_bounds, ExcludedPeriod, PeriodPolicy, PeriodSummary, PrepareConfig,
    PreparedSeries, SeriesPreparer,
};
pub use window::{
    centered_moving_average, diff, fill_nan, pct_change, rolling_apply, rolling_mean, rolling_std,
    savgol_filter,
};
