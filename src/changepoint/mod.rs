//! Structural break detection.
//!
//! Three detectors run over a price series and report where its behaviour changes:
//!
//! - **Level shift**: two-sided CUSUM against the global mean
//! - **Variance change**: jumps in the rolling standard deviation
//! - **Trend change**: jumps in the slope of the rolling mean
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use fuelcast::changepoint::{detect_structural_breaks, BreakConfig, BreakKind};
//! use fuelcast::core::TimeSeries;
//!
//! let values: Vec<f64> = (0..200).map(|i| if i < 100 { 100.0 } else { 120.0 }).collect();
//! let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
//! let series = TimeSeries::daily(start, values).unwrap();
//!
//! let breaks = detect_structural_breaks(&series, &BreakConfig::default());
//! assert!(breaks.iter().any(|b| b.kind == BreakKind::LevelShift));
//! ```

mod breaks;

pub use breaks::{
    cusum_level_shifts, detect_structural_breaks, trend_changes, variance_changes, BreakConfig,
    BreakKind, StructuralBreak,
};
