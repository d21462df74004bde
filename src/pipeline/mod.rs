//! Forecast cycles per (region, fuel type) unit, their backtests and the batch driver.
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use fuelcast::core::TimeSeries;
//! use fuelcast::models::arima::ArimaConfig;
//! use fuelcast::pipeline::{run_batch, CycleConfig, ForecastCycle, UnitInput, UnitKey, UnitStatus};
//!
//! let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
//! let values: Vec<f64> = (0..200)
//!     .map(|i| 1650.0 + 0.3 * i as f64 + 4.0 * (i as f64 * std::f64::consts::TAU / 7.0).sin())
//!     .collect();
//! let good = UnitInput::new(UnitKey::new("seoul", "gasoline"), TimeSeries::daily(start, values).unwrap());
//! let short = UnitInput::new(
//!     UnitKey::new("jeju", "diesel"),
//!     TimeSeries::daily(start, vec![1500.0; 10]).unwrap(),
//! );
//!
//! let config = CycleConfig::default()
//!     .with_horizon(14)
//!     .with_arima(ArimaConfig::default().with_max_orders(2, 1, 2));
//! let report = run_batch(&ForecastCycle::new(config), &[good, short]);
//!
//! assert_eq!(report.status(&UnitKey::new("seoul", "gasoline")), UnitStatus::Available);
//! assert!(matches!(report.status(&UnitKey::new("jeju", "diesel")), UnitStatus::Unavailable(_)));
//! ```

mod batch;
mod cycle;
mod evaluation;

pub use batch::{run_batch, BatchReport, UnitStatus};
pub use cycle::{CycleConfig, ForecastCycle, UnitForecast, UnitInput, UnitKey};
pub use evaluation::backtest_cycle;
