//! Exponential smoothing models.

mod holt;

pub use holt::HoltLinearTrend;
