//! Core data structures for daily price series and forecasts.

mod forecast;
mod time_series;

pub use forecast::ForecastResult;
pub(crate) use time_series::fill_forward_backward;
pub use time_series::{MissingValuePolicy, TimeSeries, TimeSeriesBuilder};
