//! Residual diagnostic tests for fitted models.

use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Ljung-Box test result.
#[derive(Debug, Clone, PartialEq)]
pub struct LjungBoxResult {
    /// Test statistic Q
    pub statistic: f64,
    /// Upper-tail chi-squared probability of Q
    pub p_value: f64,
    /// Number of lags tested
    pub lags: usize,
    /// Degrees of freedom
    pub df: usize,
}

impl LjungBoxResult {
    /// True when the null of no autocorrelation is not rejected at `alpha`.
    pub fn is_white_noise(&self, alpha: f64) -> bool {
        self.p_value >= alpha
    }
}

/// Ljung-Box portmanteau test for autocorrelation up to `lags`.
///
/// `fitted_params` reduces the degrees of freedom (kept at least 1). Too-short
/// input yields NaN statistic and p-value; a zero-variance input passes trivially.
pub fn ljung_box(residuals: &[f64], lags: usize, fitted_params: usize) -> LjungBoxResult {
    let n = residuals.len();
    if n < 3 || lags == 0 {
        return LjungBoxResult {
            statistic: f64::NAN,
            p_value: f64::NAN,
            lags: 0,
            df: 0,
        };
    }
    let lags = lags.min(n - 1);
    let df = lags.saturating_sub(fitted_params).max(1);

    let mean = residuals.iter().sum::<f64>() / n as f64;
    let centered: Vec<f64> = residuals.iter().map(|&x| x - mean).collect();
    let var: f64 = centered.iter().map(|&x| x * x).sum();
    if var == 0.0 {
        return LjungBoxResult {
            statistic: 0.0,
            p_value: 1.0,
            lags,
            df,
        };
    }

    let q: f64 = (1..=lags)
        .map(|k| {
            let acf = centered
                .iter()
                .skip(k)
                .zip(centered.iter())
                .map(|(&a, &b)| a * b)
                .sum::<f64>()
                / var;
            acf * acf / (n - k) as f64
        })
        .sum::<f64>()
        * n as f64
        * (n + 2) as f64;

    LjungBoxResult {
        statistic: q,
        p_value: chi_squared_sf(q, df),
        lags,
        df,
    }
}

/// Durbin-Watson statistic in `[0, 4]`; 2 means no first-order autocorrelation.
pub fn durbin_watson(residuals: &[f64]) -> f64 {
    if residuals.len() < 2 {
        return f64::NAN;
    }
    let sum_sq: f64 = residuals.iter().map(|&r| r * r).sum();
    if sum_sq == 0.0 {
        return 2.0;
    }
    residuals.windows(2).map(|w| (w[1] - w[0]).powi(2)).sum::<f64>() / sum_sq
}

pub(crate) fn chi_squared_sf(x: f64, df: usize) -> f64 {
    if !x.is_finite() {
        return if x.is_nan() { f64::NAN } else { 0.0 };
    }
    if x <= 0.0 || df == 0 {
        return 1.0;
    }
    match ChiSquared::new(df as f64) {
        Ok(dist) => dist.sf(x),
        Err(_) => f64::NAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    #[test]
    fn white_noise_passes() {
        let mut rng = StdRng::seed_from_u64(11);
        let normal = Normal::new(0.0, 1.0).unwrap();
        let residuals: Vec<f64> = (0..300).map(|_| normal.sample(&mut rng)).collect();
        let result = ljung_box(&residuals, 10, 0);
        assert_eq!(result.lags, 10);
        assert_eq!(result.df, 10);
        assert!(result.is_white_noise(0.01));
    }

    #[test]
    fn autocorrelated_series_fails() {
        let residuals: Vec<f64> = (0..200).map(|i| (i as f64 * 0.2).sin()).collect();
        let result = ljung_box(&residuals, 10, 0);
        assert!(result.statistic > 100.0);
        assert!(result.p_value < 0.05);
        assert!(!result.is_white_noise(0.05));
    }

    #[test]
    fn degenerate_inputs() {
        assert!(ljung_box(&[1.0, 2.0], 10, 0).p_value.is_nan());
        let constant = ljung_box(&[3.0; 50], 10, 2);
        assert_eq!(constant.p_value, 1.0);
        assert_eq!(constant.df, 8);
    }

    #[test]
    fn chi_squared_tail_matches_tables() {
        // 95th percentile of chi-squared(10) is 18.307
        assert_relative_eq!(chi_squared_sf(18.307, 10), 0.05, epsilon = 1e-4);
        assert_eq!(chi_squared_sf(0.0, 3), 1.0);
    }

    #[test]
    fn durbin_watson_extremes() {
        let alternating: Vec<f64> = (0..100).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        assert!(durbin_watson(&alternating) > 3.5);
        let smooth: Vec<f64> = (0..100).map(|i| (i as f64 * 0.01).sin() + 1.0).collect();
        assert!(durbin_watson(&smooth) < 0.5);
        assert_eq!(durbin_watson(&[0.0; 10]), 2.0);
    }
}
