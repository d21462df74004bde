//! Rolling window functions and local polynomial smoothing.
//!
//! Trailing windows follow the "full window only" convention: positions
//! with fewer than `window` observations before them are NaN.

use crate::utils::ols::solve_symmetric;

/// Trailing rolling mean; NaN until a full window is available.
pub fn rolling_mean(series: &[f64], window: usize) -> Vec<f64> {
    rolling_apply(series, window, |s| s.iter().sum::<f64>() / s.len() as f64)
}

/// Trailing rolling sample standard deviation; NaN until a full window is available.
pub fn rolling_std(series: &[f64], window: usize) -> Vec<f64> {
    if window < 2 {
        return vec![f64::NAN; series.len()];
    }
    rolling_apply(series, window, |s| {
        let m = s.iter().sum::<f64>() / s.len() as f64;
        (s.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (s.len() - 1) as f64).sqrt()
    })
}

/// Generic trailing window application. Windows containing NaN yield NaN.
pub fn rolling_apply<F>(series: &[f64], window: usize, f: F) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let n = series.len();
    let mut result = vec![f64::NAN; n];
    if window == 0 || window > n {
        return result;
    }
    for i in (window - 1)..n {
        let segment = &series[i + 1 - window..=i];
        if segment.iter().all(|v| v.is_finite()) {
            result[i] = f(segment);
        }
    }
    result
}

/// Centered moving average of the given order.
///
/// Even orders use the 2×m average (half weights at both ends) so the
/// result stays aligned with the observation. Ends without a full window are NaN.
pub fn centered_moving_average(series: &[f64], order: usize) -> Vec<f64> {
    let n = series.len();
    let mut result = vec![f64::NAN; n];
    if order == 0 || order > n {
        return result;
    }
    let half = order / 2;
    if order % 2 == 1 {
        for i in half..n.saturating_sub(half) {
            result[i] = series[i - half..=i + half].iter().sum::<f64>() / order as f64;
        }
    } else {
        for i in half..n.saturating_sub(half) {
            let inner: f64 = series[i + 1 - half..i + half].iter().sum();
            let edges = 0.5 * (series[i - half] + series[i + half]);
            result[i] = (inner + edges) / order as f64;
        }
    }
    result
}

/// Day-over-day fractional change; the first element is NaN.
pub fn pct_change(series: &[f64]) -> Vec<f64> {
    let mut result = Vec::with_capacity(series.len());
    if series.is_empty() {
        return result;
    }
    result.push(f64::NAN);
    for w in series.windows(2) {
        result.push(if w[0] != 0.0 {
            (w[1] - w[0]) / w[0]
        } else {
            f64::NAN
        });
    }
    result
}

/// First difference; the first element is NaN.
pub fn diff(series: &[f64]) -> Vec<f64> {
    let mut result = Vec::with_capacity(series.len());
    if series.is_empty() {
        return result;
    }
    result.push(f64::NAN);
    result.extend(series.windows(2).map(|w| w[1] - w[0]));
    result
}

/// Replace non-finite values with `fill`.
pub fn fill_nan(series: &[f64], fill: f64) -> Vec<f64> {
    series
        .iter()
        .map(|&v| if v.is_finite() { v } else { fill })
        .collect()
}

/// Savitzky-Golay smoothing.
///
/// Each point is the value at that point of a least-squares polynomial of
/// degree `polyorder` fitted over `window` neighbours. At the edges the
/// window is shifted inside the series. A window longer than the series is
/// shrunk to the largest odd length that fits; if no window above `polyorder`
/// fits, the input is returned unchanged.
pub fn savgol_filter(series: &[f64], window: usize, polyorder: usize) -> Vec<f64> {
    let n = series.len();
    let mut window = window.min(n);
    if window % 2 == 0 {
        window = window.saturating_sub(1);
    }
    if window <= polyorder {
        return series.to_vec();
    }
    let half = window / 2;
    let terms = polyorder + 1;

    (0..n)
        .map(|i| {
            let start = i.saturating_sub(half).min(n - window);
            let mut xtx = vec![vec![0.0; terms]; terms];
            let mut xty = vec![0.0; terms];
            for j in start..start + window {
                let x = j as f64 - i as f64;
                let powers: Vec<f64> = (0..terms).map(|p| x.powi(p as i32)).collect();
                for a in 0..terms {
                    xty[a] += powers[a] * series[j];
                    for b in 0..terms {
                        xtx[a][b] += powers[a] * powers[b];
                    }
                }
            }
            // Evaluated at x = 0, the fitted polynomial is its constant term.
            solve_symmetric(&xtx, &xty, 0.0)
                .map(|beta| beta[0])
                .unwrap_or(series[i])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rolling_mean_is_trailing() {
        let result = rolling_mean(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert_relative_eq!(result[2], 2.0, epsilon = 1e-10);
        assert_relative_eq!(result[4], 4.0, epsilon = 1e-10);
    }

    #[test]
    fn rolling_std_uses_sample_variance() {
        let result = rolling_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], 8);
        assert_relative_eq!(result[7], 2.138089935, epsilon = 1e-6);
        assert!(rolling_std(&[1.0, 2.0], 1).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn rolling_window_larger_than_series() {
        assert!(rolling_mean(&[1.0, 2.0], 5).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn centered_average_odd_and_even() {
        let values: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let odd = centered_moving_average(&values, 3);
        assert!(odd[0].is_nan());
        assert_relative_eq!(odd[1], 1.0, epsilon = 1e-10);

        let even = centered_moving_average(&values, 4);
        assert!(even[1].is_nan());
        assert_relative_eq!(even[2], 2.0, epsilon = 1e-10);
        assert_relative_eq!(even[7], 7.0, epsilon = 1e-10);
        assert!(even[8].is_nan());
    }

    #[test]
    fn pct_change_and_diff() {
        let changes = pct_change(&[100.0, 110.0, 99.0]);
        assert!(changes[0].is_nan());
        assert_relative_eq!(changes[1], 0.1, epsilon = 1e-12);
        assert_relative_eq!(changes[2], -0.1, epsilon = 1e-12);

        let d = diff(&[1.0, 4.0, 9.0]);
        assert_eq!(&d[1..], &[3.0, 5.0]);
    }

    #[test]
    fn savgol_preserves_cubic() {
        let values: Vec<f64> = (0..40)
            .map(|i| {
                let x = i as f64 / 10.0;
                1.0 + x - 0.5 * x * x + 0.1 * x * x * x
            })
            .collect();
        let smoothed = savgol_filter(&values, 21, 3);
        for (a, b) in values.iter().zip(&smoothed) {
            assert_relative_eq!(a, b, epsilon = 1e-6);
        }
    }

    #[test]
    fn savgol_short_series_is_unchanged() {
        let values = vec![1.0, 5.0, 2.0];
        assert_eq!(savgol_filter(&values, 21, 3), values);
    }
}
