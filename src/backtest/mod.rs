//! Time-ordered backtesting of forecasting pipelines.

mod rolling;

pub use rolling::{BacktestConfig, BacktestReport, Backtester, OriginResult};
