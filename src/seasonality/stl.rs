//! STL (Seasonal-Trend decomposition using LOESS).
//!
//! Follows Cleveland et al. (1990): an inner loop alternates cycle-subseries
//! smoothing, low-pass filtering and trend smoothing; an optional outer loop
//! recomputes bisquare robustness weights from the remainder so that
//! isolated price spikes do not leak into trend or seasonal components.

use crate::error::{ForecastError, Result};
use crate::utils::stats::median;

/// Components produced by [`STL::decompose`].
#[derive(Debug, Clone)]
pub struct STLResult {
    /// Trend component.
    pub trend: Vec<f64>,
    /// Seasonal component.
    pub seasonal: Vec<f64>,
    /// Remainder component.
    pub remainder: Vec<f64>,
    /// Final robustness weights (all 1.0 when not robust).
    pub weights: Vec<f64>,
}

/// STL decomposition configuration and algorithm.
#[derive(Debug, Clone)]
pub struct STL {
    seasonal_period: usize,
    /// Seasonal LOESS span (ns), odd.
    seasonal_smoothness: usize,
    /// Trend LOESS span (nt), odd.
    trend_smoothness: usize,
    /// Low-pass LOESS span (nl), odd.
    low_pass_smoothness: usize,
    inner_iterations: usize,
    outer_iterations: usize,
}

fn odd(n: usize) -> usize {
    if n % 2 == 0 {
        n + 1
    } else {
        n
    }
}

impl STL {
    /// Create a non-robust STL with seasonal span 7 and Cleveland's default trend span.
    pub fn new(seasonal_period: usize) -> Self {
        let ns = 7;
        let period = seasonal_period.max(2);
        let nt = (1.5 * period as f64 / (1.0 - 1.5 / ns as f64)).ceil() as usize;
        Self {
            seasonal_period: period,
            seasonal_smoothness: ns,
            trend_smoothness: odd(nt),
            low_pass_smoothness: odd(period),
            inner_iterations: 2,
            outer_iterations: 0,
        }
    }

    /// Set custom seasonal smoothness (ns parameter).
    pub fn with_seasonal_smoothness(mut self, ns: usize) -> Self {
        self.seasonal_smoothness = odd(ns.max(3));
        self
    }

    /// Set custom trend smoothness (nt parameter).
    pub fn with_trend_smoothness(mut self, nt: usize) -> Self {
        self.trend_smoothness = odd(nt.max(3));
        self
    }

    /// Enable robust fitting with six outer iterations.
    pub fn robust(mut self) -> Self {
        self.outer_iterations = 6;
        self
    }

    /// Set number of outer (robustness) iterations; 0 disables robustness.
    pub fn with_outer_iterations(mut self, n: usize) -> Self {
        self.outer_iterations = n;
        self
    }

    /// Set number of inner iterations (at least 2).
    pub fn with_inner_iterations(mut self, n: usize) -> Self {
        self.inner_iterations = n.max(2);
        self
    }

    pub fn seasonal_period(&self) -> usize {
        self.seasonal_period
    }

    pub fn is_robust(&self) -> bool {
        self.outer_iterations > 0
    }

    /// Decompose the series into trend, seasonal and remainder.
    ///
    /// Requires at least two full seasonal cycles.
    pub fn decompose(&self, series: &[f64]) -> Result<STLResult> {
        let n = series.len();
        let period = self.seasonal_period;
        if n < 2 * period {
            return Err(ForecastError::InsufficientData {
                needed: 2 * period,
                got: n,
            });
        }
        if series.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::InvalidSeries(
                "STL requires finite values".to_string(),
            ));
        }

        let mut seasonal = vec![0.0; n];
        let mut trend = vec![0.0; n];
        let mut weights = vec![1.0; n];

        for outer in 0..=self.outer_iterations {
            for _ in 0..self.inner_iterations {
                let detrended: Vec<f64> = series.iter().zip(&trend).map(|(y, t)| y - t).collect();
                let cycle = self.smooth_cycle_subseries(&detrended, &weights);
                let low_pass = self.low_pass_filter(&cycle);
                for i in 0..n {
                    seasonal[i] = cycle[i] - low_pass[i];
                }
                let deseasonalized: Vec<f64> =
                    series.iter().zip(&seasonal).map(|(y, s)| y - s).collect();
                trend = loess(&deseasonalized, self.trend_smoothness, &weights);
            }

            if outer < self.outer_iterations {
                let remainder: Vec<f64> = (0..n).map(|i| series[i] - seasonal[i] - trend[i]).collect();
                weights = bisquare_weights(&remainder);
            }
        }

        let remainder = (0..n).map(|i| series[i] - seasonal[i] - trend[i]).collect();
        Ok(STLResult {
            trend,
            seasonal,
            remainder,
            weights,
        })
    }

    fn smooth_cycle_subseries(&self, detrended: &[f64], weights: &[f64]) -> Vec<f64> {
        let n = detrended.len();
        let period = self.seasonal_period;
        let mut result = vec![0.0; n];

        for phase in 0..period {
            let indices: Vec<usize> = (phase..n).step_by(period).collect();
            let values: Vec<f64> = indices.iter().map(|&i| detrended[i]).collect();
            let w: Vec<f64> = indices.iter().map(|&i| weights[i]).collect();
            let smoothed = loess(&values, self.seasonal_smoothness, &w);
            for (&i, s) in indices.iter().zip(smoothed) {
                result[i] = s;
            }
        }
        result
    }

    fn low_pass_filter(&self, series: &[f64]) -> Vec<f64> {
        let period = self.seasonal_period;
        let ma = moving_average(&moving_average(&moving_average(series, period), period), 3);
        loess(&ma, self.low_pass_smoothness, &vec![1.0; series.len()])
    }
}

impl Default for STL {
    fn default() -> Self {
        Self::new(7)
    }
}

/// Centered moving average with windows truncated at the edges.
fn moving_average(series: &[f64], window: usize) -> Vec<f64> {
    let n = series.len();
    let half = window / 2;
    (0..n)
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + window - half).min(n);
            series[start..end].iter().sum::<f64>() / (end - start) as f64
        })
        .collect()
}

/// Local linear LOESS with tricube kernel and per-point robustness weights.
///
/// Each fit uses the `span` nearest observations; when `span` exceeds the
/// series length the bandwidth grows past the data range.
pub(crate) fn loess(values: &[f64], span: usize, weights: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    let q = span.max(2);

    (0..n)
        .map(|i| {
            let (start, end) = if q >= n {
                (0, n)
            } else {
                let start = i.saturating_sub(q / 2).min(n - q);
                (start, start + q)
            };
            let mut h = (i - start).max(end - 1 - i) as f64;
            if q > n {
                h += ((q - n) / 2) as f64;
            }
            let h = h + 1.0;

            let mut sw = 0.0;
            let mut sx = 0.0;
            let mut sy = 0.0;
            let kernel: Vec<(f64, f64, f64)> = (start..end)
                .filter_map(|j| {
                    let u = (j as f64 - i as f64).abs() / h;
                    let w = (1.0 - u.powi(3)).powi(3) * weights[j];
                    (w > 0.0).then_some((w, j as f64, values[j]))
                })
                .collect();
            for &(w, x, y) in &kernel {
                sw += w;
                sx += w * x;
                sy += w * y;
            }
            if sw <= 0.0 {
                return values[i];
            }
            let x_bar = sx / sw;
            let y_bar = sy / sw;
            let (num, den) = kernel.iter().fold((0.0, 0.0), |(num, den), &(w, x, y)| {
                (num + w * (x - x_bar) * (y - y_bar), den + w * (x - x_bar).powi(2))
            });
            if den > 1e-12 * sw {
                y_bar + num / den * (i as f64 - x_bar)
            } else {
                y_bar
            }
        })
        .collect()
}

/// Bisquare weights with scale `6 * median(|remainder|)`.
fn bisquare_weights(remainder: &[f64]) -> Vec<f64> {
    let abs: Vec<f64> = remainder.iter().map(|r| r.abs()).collect();
    let h = 6.0 * median(&abs);
    remainder
        .iter()
        .map(|r| {
            if h < 1e-10 {
                return 1.0;
            }
            let u = r.abs() / h;
            if u < 1.0 {
                (1.0 - u * u).powi(2)
            } else {
                0.0
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn weekly_series(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let trend = 100.0 + 0.05 * i as f64;
                let seasonal = 3.0 * (2.0 * std::f64::consts::PI * i as f64 / 7.0).sin();
                trend + seasonal
            })
            .collect()
    }

    #[test]
    fn stl_reconstructs_series() {
        let series = weekly_series(140);
        let result = STL::new(7).decompose(&series).unwrap();
        for i in 0..series.len() {
            let sum = result.trend[i] + result.seasonal[i] + result.remainder[i];
            assert_relative_eq!(sum, series[i], epsilon = 1e-9);
        }
    }

    #[test]
    fn stl_recovers_weekly_pattern() {
        let series = weekly_series(210);
        let result = STL::new(7).decompose(&series).unwrap();
        let mid = 105;
        let expected = 3.0 * (2.0 * std::f64::consts::PI * mid as f64 / 7.0).sin();
        assert!((result.seasonal[mid] - expected).abs() < 0.5);
        let rem_max = result.remainder[35..175]
            .iter()
            .fold(0.0_f64, |m, r| m.max(r.abs()));
        assert!(rem_max < 0.5, "remainder too large: {rem_max}");
    }

    #[test]
    fn loess_reproduces_lines() {
        let line: Vec<f64> = (0..30).map(|i| 2.0 + 0.3 * i as f64).collect();
        let smoothed = loess(&line, 7, &vec![1.0; 30]);
        for (a, b) in line.iter().zip(&smoothed) {
            assert_relative_eq!(a, b, epsilon = 1e-9);
        }
        let wide = loess(&line, 61, &vec![1.0; 30]);
        assert_relative_eq!(wide[0], line[0], epsilon = 1e-9);
    }

    #[test]
    fn robust_stl_downweights_spike() {
        let mut series: Vec<f64> = weekly_series(140)
            .iter()
            .enumerate()
            .map(|(i, v)| v + 0.2 * ((i * 37 % 11) as f64 / 11.0 - 0.5))
            .collect();
        series[70] += 50.0;
        let result = STL::new(7).robust().decompose(&series).unwrap();
        assert!(result.weights[70] < 0.1);
        assert!(result.remainder[70] > 40.0);
    }

    #[test]
    fn stl_constant_series() {
        let result = STL::new(7).decompose(&[5.0; 42]).unwrap();
        assert!(result.seasonal.iter().all(|s| s.abs() < 1e-9));
        assert!(result.trend.iter().all(|t| (t - 5.0).abs() < 1e-9));
    }

    #[test]
    fn stl_insufficient_data() {
        let result = STL::new(7).decompose(&[1.0; 10]);
        assert_eq!(
            result.unwrap_err(),
            ForecastError::InsufficientData { needed: 14, got: 10 }
        );
    }
}
