//! Accuracy metrics for forecast evaluation.

use crate::error::{ForecastError, Result};

/// Accuracy metrics for evaluating forecast performance.
#[derive(Debug, Clone, PartialEq)]
pub struct AccuracyMetrics {
    /// Mean Absolute Error
    pub mae: f64,
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Percentage Error in percent (None if zeros in actual)
    pub mape: Option<f64>,
    /// Fraction of steps whose day-over-day change direction was predicted correctly
    pub directional_accuracy: Option<f64>,
    /// R-squared (coefficient of determination)
    pub r_squared: f64,
    /// Number of compared points
    pub count: usize,
}

/// Calculate accuracy metrics between actual and predicted values.
///
/// Directional accuracy is computed over consecutive pairs of the given
/// slices; see [`directional_accuracy`] for the per-origin variant.
pub fn calculate_metrics(actual: &[f64], predicted: &[f64]) -> Result<AccuracyMetrics> {
    if actual.is_empty() || predicted.is_empty() {
        return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
    }

    if actual.len() != predicted.len() {
        return Err(ForecastError::DimensionMismatch {
            expected: actual.len(),
            got: predicted.len(),
        });
    }

    let n = actual.len() as f64;
    let mae = mae(actual, predicted);
    let mse = mse(actual, predicted);

    // MAPE (only if no zeros in actual)
    let mape = if actual.contains(&0.0) {
        None
    } else {
        let sum: f64 = actual
            .iter()
            .zip(predicted.iter())
            .map(|(a, p)| ((a - p) / a).abs())
            .sum();
        Some(100.0 * sum / n)
    };

    let mean_actual = actual.iter().sum::<f64>() / n;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean_actual).powi(2)).sum();
    let ss_res: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    let r_squared = if ss_tot == 0.0 {
        1.0
    } else {
        1.0 - ss_res / ss_tot
    };

    Ok(AccuracyMetrics {
        mae,
        mse,
        rmse: mse.sqrt(),
        mape,
        directional_accuracy: directional_accuracy(actual, predicted, None),
        r_squared,
        count: actual.len(),
    })
}

/// Fraction of steps where the sign of the forecast change matches the actual change.
///
/// With `anchor` set, the first step's change is measured from that value (the
/// last observed value before the forecast origin), so a horizon of `h` yields
/// `h` comparisons; without it, `h - 1`. Returns None when nothing can be compared.
pub fn directional_accuracy(actual: &[f64], predicted: &[f64], anchor: Option<f64>) -> Option<f64> {
    let (hits, total) = direction_hits(actual, predicted, anchor);
    if total == 0 {
        None
    } else {
        Some(hits as f64 / total as f64)
    }
}

/// Count of direction matches and comparisons, for pooling across origins.
pub fn direction_hits(actual: &[f64], predicted: &[f64], anchor: Option<f64>) -> (usize, usize) {
    if actual.len() != predicted.len() {
        return (0, 0);
    }
    let mut prev: Option<(f64, f64)> = anchor.map(|a| (a, a));
    let mut hits = 0;
    let mut total = 0;
    for (&a, &p) in actual.iter().zip(predicted) {
        if let Some((pa, pp)) = prev {
            total += 1;
            if (a - pa).signum() == (p - pp).signum() {
                hits += 1;
            }
        }
        prev = Some((a, p));
    }
    (hits, total)
}

/// Calculate MAE between two slices.
pub fn mae(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() != predicted.len() || actual.is_empty() {
        return f64::NAN;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / actual.len() as f64
}

/// Calculate MSE between two slices.
pub fn mse(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() != predicted.len() || actual.is_empty() {
        return f64::NAN;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / actual.len() as f64
}

/// Calculate RMSE between two slices.
pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    mse(actual, predicted).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn perfect_forecast_has_zero_error() {
        let actual = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let metrics = calculate_metrics(&actual, &actual).unwrap();

        assert_relative_eq!(metrics.mae, 0.0, epsilon = 1e-10);
        assert_relative_eq!(metrics.rmse, 0.0, epsilon = 1e-10);
        assert_relative_eq!(metrics.mape.unwrap(), 0.0, epsilon = 1e-10);
        assert_relative_eq!(metrics.r_squared, 1.0, epsilon = 1e-10);
        assert_relative_eq!(metrics.directional_accuracy.unwrap(), 1.0, epsilon = 1e-10);
    }

    #[test]
    fn known_errors() {
        let actual = vec![100.0, 200.0];
        let predicted = vec![110.0, 180.0];
        let metrics = calculate_metrics(&actual, &predicted).unwrap();

        assert_relative_eq!(metrics.mae, 15.0, epsilon = 1e-10);
        assert_relative_eq!(metrics.rmse, 250.0_f64.sqrt(), epsilon = 1e-10);
        assert_relative_eq!(metrics.mape.unwrap(), 10.0, epsilon = 1e-10);
        assert_eq!(metrics.count, 2);
    }

    #[test]
    fn mape_is_none_with_zero_actuals() {
        let metrics = calculate_metrics(&[0.0, 1.0], &[0.5, 1.0]).unwrap();
        assert!(metrics.mape.is_none());
    }

    #[test]
    fn metrics_reject_bad_input() {
        assert!(calculate_metrics(&[], &[]).is_err());
        assert!(matches!(
            calculate_metrics(&[1.0, 2.0], &[1.0]),
            Err(ForecastError::DimensionMismatch { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn directional_accuracy_uses_anchor() {
        let actual = [11.0, 12.0, 11.0];
        let predicted = [10.5, 11.0, 12.0];
        // anchor 10: up/up, up/up, down/up
        assert_relative_eq!(
            directional_accuracy(&actual, &predicted, Some(10.0)).unwrap(),
            2.0 / 3.0,
            epsilon = 1e-12
        );
        // without anchor: up/up, down/up
        assert_relative_eq!(
            directional_accuracy(&actual, &predicted, None).unwrap(),
            0.5,
            epsilon = 1e-12
        );
        assert!(directional_accuracy(&[1.0], &[1.0], None).is_none());
    }
}
