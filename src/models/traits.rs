//! Forecaster trait defining the common interface for component models.

use crate::core::{ForecastResult, TimeSeries};
use crate::error::Result;

/// Common interface for every component model of an ensemble.
///
/// Object-safe; models are combined as `Box<dyn Forecaster>` and may be
/// fitted on rayon worker threads.
pub trait Forecaster: Send + Sync {
    /// Fit the model to a gap-free daily series.
    fn fit(&mut self, series: &TimeSeries) -> Result<()>;

    /// Forecast `steps` days after the last training date with a `(1 - alpha)` band.
    fn forecast(&self, steps: usize, alpha: f64) -> Result<ForecastResult>;

    /// In-sample one-step predictions, aligned with the training series.
    fn fitted_values(&self) -> Option<&[f64]>;

    /// Training residuals (actual - fitted).
    fn residuals(&self) -> Option<&[f64]>;

    fn name(&self) -> &str;

    fn is_fitted(&self) -> bool {
        self.fitted_values().is_some()
    }
}

/// Type alias for boxed forecaster trait objects.
///
/// # Example
///
/// ```
/// use fuelcast::models::{BoxedForecaster, Forecaster};
/// use fuelcast::models::baseline::RandomWalkWithDrift;
///
/// let model: BoxedForecaster = Box::new(RandomWalkWithDrift::new());
/// assert_eq!(model.name(), "RandomWalkWithDrift");
/// assert!(!model.is_fitted());
/// ```
pub type BoxedForecaster = Box<dyn Forecaster>;
