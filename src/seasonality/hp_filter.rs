//! Hodrick-Prescott low-pass trend filter.
//!
//! The trend τ minimizes `Σ(y - τ)² + λ Σ(Δ²τ)²`, i.e. solves the
//! pentadiagonal system `(I + λ DᵀD) τ = y` with D the second-difference
//! operator. The system is solved with a banded Cholesky factorization.

use crate::error::{ForecastError, Result};

/// Smoothing penalty for series longer than a year of daily observations.
pub const DAILY_LAMBDA: f64 = 129_600.0;

/// Smoothing penalty for shorter (lower-frequency style) series.
pub const DEFAULT_LAMBDA: f64 = 1_600.0;

/// Default λ for a series of `n` observations.
pub fn default_lambda(n: usize) -> f64 {
    if n > 365 {
        DAILY_LAMBDA
    } else {
        DEFAULT_LAMBDA
    }
}

/// Extract the HP trend of `values`.
pub fn hp_filter(values: &[f64], lambda: f64) -> Result<Vec<f64>> {
    let n = values.len();
    if lambda < 0.0 || !lambda.is_finite() {
        return Err(ForecastError::InvalidParameter(format!(
            "HP lambda must be a finite non-negative number, got {lambda}"
        )));
    }
    if n < 3 {
        return Ok(values.to_vec());
    }

    // Diagonals of I + λ DᵀD.
    let mut a0 = vec![6.0 * lambda + 1.0; n];
    a0[0] = lambda + 1.0;
    a0[1] = 5.0 * lambda + 1.0;
    a0[n - 2] = 5.0 * lambda + 1.0;
    a0[n - 1] = lambda + 1.0;
    if n == 3 {
        a0[1] = 4.0 * lambda + 1.0;
    }
    let mut a1 = vec![-4.0 * lambda; n - 1];
    a1[0] = -2.0 * lambda;
    a1[n - 2] = -2.0 * lambda;
    let a2 = vec![lambda; n - 2];

    let mut l0 = vec![0.0; n];
    let mut l1 = vec![0.0; n];
    let mut l2 = vec![0.0; n];
    for i in 0..n {
        if i >= 2 {
            l2[i] = a2[i - 2] / l0[i - 2];
        }
        if i >= 1 {
            let carry = if i >= 2 { l2[i] * l1[i - 1] } else { 0.0 };
            l1[i] = (a1[i - 1] - carry) / l0[i - 1];
        }
        let d = a0[i] - l1[i] * l1[i] - l2[i] * l2[i];
        if d <= 0.0 {
            return Err(ForecastError::ComputationError(
                "HP system is not positive definite".to_string(),
            ));
        }
        l0[i] = d.sqrt();
    }

    let mut z = vec![0.0; n];
    for i in 0..n {
        let mut s = values[i];
        if i >= 1 {
            s -= l1[i] * z[i - 1];
        }
        if i >= 2 {
            s -= l2[i] * z[i - 2];
        }
        z[i] = s / l0[i];
    }
    let mut trend = vec![0.0; n];
    for i in (0..n).rev() {
        let mut s = z[i];
        if i + 1 < n {
            s -= l1[i + 1] * trend[i + 1];
        }
        if i + 2 < n {
            s -= l2[i + 2] * trend[i + 2];
        }
        trend[i] = s / l0[i];
    }
    Ok(trend)
}
