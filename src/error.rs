//! Error types for the fuelcast library.

use thiserror::Error;

/// Result type alias for forecast operations.
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Errors that can occur while preparing, decomposing or forecasting a series.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    /// Series is shorter than the minimum length required by a method.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Order search exhausted every candidate without a usable model.
    #[error("fit did not converge: {0}")]
    FitConvergence(String),

    /// Ensemble combination had zero usable component forecasts.
    #[error("no surviving model: every component forecast failed")]
    NoSurvivingModel,

    /// Series is structurally invalid (non-monotonic or duplicate dates, all missing).
    #[error("invalid series: {0}")]
    InvalidSeries(String),

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Dimension mismatch between data structures.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Model has not been fitted yet.
    #[error("model must be fitted before prediction")]
    FitRequired,

    /// Computation error (e.g., numerical issues).
    #[error("computation error: {0}")]
    ComputationError(String),
}

impl ForecastError {
    /// Snake-case name of the variant, used as the `kind` log field.
    pub fn kind(&self) -> &'static str {
        match self {
            ForecastError::InsufficientData { .. } => "insufficient_data",
            ForecastError::FitConvergence(_) => "fit_convergence",
            ForecastError::NoSurvivingModel => "no_surviving_model",
            ForecastError::InvalidSeries(_) => "invalid_series",
            ForecastError::InvalidParameter(_) => "invalid_parameter",
            ForecastError::DimensionMismatch { .. } => "dimension_mismatch",
            ForecastError::FitRequired => "fit_required",
            ForecastError::ComputationError(_) => "computation_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_are_descriptive() {
        let err = ForecastError::InsufficientData { needed: 100, got: 10 };
        assert_eq!(
            err.to_string(),
            "insufficient data: need at least 100, got 10"
        );

        let err = ForecastError::InvalidSeries("duplicate date 2024-01-02".to_string());
        assert_eq!(err.to_string(), "invalid series: duplicate date 2024-01-02");

        let err = ForecastError::NoSurvivingModel;
        assert_eq!(
            err.to_string(),
            "no surviving model: every component forecast failed"
        );

        let err = ForecastError::FitConvergence("all 12 candidates failed".to_string());
        assert_eq!(
            err.to_string(),
            "fit did not converge: all 12 candidates failed"
        );

        let err = ForecastError::FitRequired;
        assert_eq!(err.to_string(), "model must be fitted before prediction");
    }

    #[test]
    fn errors_are_clonable_and_comparable() {
        let err1 = ForecastError::NoSurvivingModel;
        let err2 = err1.clone();
        assert_eq!(err1, err2);
        assert_eq!(err1.kind(), "no_surviving_model");
    }

    #[test]
    fn kind_names_the_variant() {
        assert_eq!(
            ForecastError::InsufficientData { needed: 100, got: 3 }.kind(),
            "insufficient_data"
        );
        assert_eq!(ForecastError::FitRequired.kind(), "fit_required");
        assert_eq!(
            ForecastError::InvalidParameter("duplicate unit key".to_string()).kind(),
            "invalid_parameter"
        );
    }
}
