//! Classical moving-average decomposition.

use crate::error::{ForecastError, Result};
use crate::transform::centered_moving_average;
use crate::utils::stats::linear_slope;

/// How trend and seasonal components combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeasonalMode {
    /// `x = trend + seasonal + residual`
    #[default]
    Additive,
    /// `x = trend × seasonal × (1 + residual)`
    Multiplicative,
}

impl SeasonalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeasonalMode::Additive => "additive",
            SeasonalMode::Multiplicative => "multiplicative",
        }
    }
}

/// Raw component vectors shared by the decomposition methods.
#[derive(Debug, Clone)]
pub struct Components {
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub residual: Vec<f64>,
}

/// Decompose with a centered moving-average trend and per-phase seasonal indices.
///
/// Trend ends lost to the moving average are extrapolated linearly from
/// the nearest `period` trend values. Multiplicative mode requires strictly
/// positive values and a strictly positive trend; otherwise it returns
/// [`ForecastError::InvalidSeries`] and the caller decides how to fall back.
pub fn classical_decompose(values: &[f64], period: usize, mode: SeasonalMode) -> Result<Components> {
    let n = values.len();
    if period < 2 {
        return Err(ForecastError::InvalidParameter(format!(
            "seasonal period must be at least 2, got {period}"
        )));
    }
    if n < 2 * period {
        return Err(ForecastError::InsufficientData {
            needed: 2 * period,
            got: n,
        });
    }
    if mode == SeasonalMode::Multiplicative && values.iter().any(|&v| v <= 0.0) {
        return Err(ForecastError::InvalidSeries(
            "multiplicative decomposition requires strictly positive values".to_string(),
        ));
    }

    let trend = extrapolate_ends(&centered_moving_average(values, period), period);
    if mode == SeasonalMode::Multiplicative && trend.iter().any(|&t| t <= 0.0) {
        return Err(ForecastError::InvalidSeries(
            "multiplicative decomposition produced a non-positive trend".to_string(),
        ));
    }

    let detrended: Vec<f64> = match mode {
        SeasonalMode::Additive => values.iter().zip(&trend).map(|(x, t)| x - t).collect(),
        SeasonalMode::Multiplicative => values.iter().zip(&trend).map(|(x, t)| x / t).collect(),
    };

    let mut sums = vec![0.0; period];
    let mut counts = vec![0usize; period];
    for (i, d) in detrended.iter().enumerate() {
        sums[i % period] += d;
        counts[i % period] += 1;
    }
    let mut index: Vec<f64> = sums
        .iter()
        .zip(&counts)
        .map(|(s, &c)| s / c as f64)
        .collect();
    let level = index.iter().sum::<f64>() / period as f64;
    match mode {
        SeasonalMode::Additive => index.iter_mut().for_each(|s| *s -= level),
        SeasonalMode::Multiplicative => index.iter_mut().for_each(|s| *s /= level),
    }

    let seasonal: Vec<f64> = (0..n).map(|i| index[i % period]).collect();
    let residual = (0..n)
        .map(|i| match mode {
            SeasonalMode::Additive => values[i] - trend[i] - seasonal[i],
            SeasonalMode::Multiplicative => values[i] / (trend[i] * seasonal[i]) - 1.0,
        })
        .collect();

    Ok(Components {
        trend,
        seasonal,
        residual,
    })
}

/// Fill leading and trailing NaN by extending a line fitted to the nearest `span` values.
fn extrapolate_ends(trend: &[f64], span: usize) -> Vec<f64> {
    let mut out = trend.to_vec();
    let first = match trend.iter().position(|v| v.is_finite()) {
        Some(i) => i,
        None => return out,
    };
    let last = trend.iter().rposition(|v| v.is_finite()).unwrap_or(first);
    let span = span.min(last - first + 1).max(1);

    let head = &trend[first..first + span];
    let slope = linear_slope(head);
    let intercept = head.iter().sum::<f64>() / span as f64 - slope * (span - 1) as f64 / 2.0;
    for (i, v) in out.iter_mut().enumerate().take(first) {
        *v = intercept + slope * (i as f64 - first as f64);
    }

    let tail = &trend[last + 1 - span..=last];
    let slope = linear_slope(tail);
    let end_value = tail.iter().sum::<f64>() / span as f64 + slope * (span - 1) as f64 / 2.0;
    for (i, v) in out.iter_mut().enumerate().skip(last + 1) {
        *v = end_value + slope * (i as f64 - last as f64);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn seasonal_line(n: usize, period: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                50.0 + 0.2 * i as f64
                    + 4.0 * (2.0 * std::f64::consts::PI * i as f64 / period as f64).sin()
            })
            .collect()
    }

    #[test]
    fn additive_reconstructs_exactly() {
        let values = seasonal_line(120, 12);
        let c = classical_decompose(&values, 12, SeasonalMode::Additive).unwrap();
        for i in 0..values.len() {
            assert_relative_eq!(c.trend[i] + c.seasonal[i] + c.residual[i], values[i], epsilon = 1e-9);
        }
        let index_sum: f64 = c.seasonal[..12].iter().sum();
        assert_relative_eq!(index_sum, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn additive_recovers_linear_trend() {
        let values = seasonal_line(120, 12);
        let c = classical_decompose(&values, 12, SeasonalMode::Additive).unwrap();
        assert_relative_eq!(c.trend[0], 50.0, epsilon = 1e-6);
        assert_relative_eq!(c.trend[119], 50.0 + 0.2 * 119.0, epsilon = 1e-6);
        assert!(c.residual.iter().all(|r| r.abs() < 1e-6));
    }

    #[test]
    fn multiplicative_reconstructs() {
        let values: Vec<f64> = (0..84)
            .map(|i| (100.0 + i as f64) * (1.0 + 0.1 * (i % 7) as f64))
            .collect();
        let c = classical_decompose(&values, 7, SeasonalMode::Multiplicative).unwrap();
        for i in 0..values.len() {
            let rebuilt = c.trend[i] * c.seasonal[i] * (1.0 + c.residual[i]);
            assert_relative_eq!(rebuilt, values[i], epsilon = 1e-9);
        }
        let mean_index: f64 = c.seasonal[..7].iter().sum::<f64>() / 7.0;
        assert_relative_eq!(mean_index, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn multiplicative_rejects_non_positive() {
        let mut values = seasonal_line(48, 12);
        values[3] = 0.0;
        let result = classical_decompose(&values, 12, SeasonalMode::Multiplicative);
        assert!(matches!(result, Err(ForecastError::InvalidSeries(_))));
    }

    #[test]
    fn short_series_is_rejected() {
        let result = classical_decompose(&[1.0; 10], 7, SeasonalMode::Additive);
        assert_eq!(
            result.unwrap_err(),
            ForecastError::InsufficientData { needed: 14, got: 10 }
        );
    }
}
