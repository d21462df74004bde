//! Differencing and lag-polynomial helpers for ARIMA models.
//!
//! Lag polynomials are stored as coefficient vectors `c` standing for
//! `1 - c[0]·B - c[1]·B² - ...`, the convention used for AR operators.

/// Apply `d` rounds of first differencing.
pub fn difference(series: &[f64], d: usize) -> Vec<f64> {
    let mut result = series.to_vec();
    for _ in 0..d {
        if result.len() <= 1 {
            return Vec::new();
        }
        result = result.windows(2).map(|w| w[1] - w[0]).collect();
    }
    result
}

/// Apply `cap_d` rounds of lag-`period` differencing.
pub fn seasonal_difference(series: &[f64], cap_d: usize, period: usize) -> Vec<f64> {
    if period == 0 {
        return series.to_vec();
    }
    let mut result = series.to_vec();
    for _ in 0..cap_d {
        if result.len() <= period {
            return Vec::new();
        }
        result = (period..result.len()).map(|i| result[i] - result[i - period]).collect();
    }
    result
}

/// Product of two lag operators `(1 - Σa_i B^i)(1 - Σb_j B^j)` in the same convention.
pub fn multiply_lag_polynomials(a: &[f64], b: &[f64]) -> Vec<f64> {
    // full polynomials with leading 1 and negated coefficients
    let full = |c: &[f64]| -> Vec<f64> {
        std::iter::once(1.0).chain(c.iter().map(|x| -x)).collect()
    };
    let fa = full(a);
    let fb = full(b);
    let mut product = vec![0.0; fa.len() + fb.len() - 1];
    for (i, x) in fa.iter().enumerate() {
        for (j, y) in fb.iter().enumerate() {
            product[i + j] += x * y;
        }
    }
    let mut coefficients: Vec<f64> = product[1..].iter().map(|x| -x).collect();
    while coefficients.last().map_or(false, |c| *c == 0.0) {
        coefficients.pop();
    }
    coefficients
}

/// Seasonal lag operator with coefficients on multiples of `period`.
pub fn seasonal_lag_polynomial(coefficients: &[f64], period: usize) -> Vec<f64> {
    if coefficients.is_empty() || period == 0 {
        return Vec::new();
    }
    let mut poly = vec![0.0; coefficients.len() * period];
    for (k, c) in coefficients.iter().enumerate() {
        poly[(k + 1) * period - 1] = *c;
    }
    poly
}

/// The combined differencing operator `(1-B)^d (1-B^s)^D`.
pub fn differencing_polynomial(d: usize, cap_d: usize, period: usize) -> Vec<f64> {
    let mut poly = Vec::new();
    for _ in 0..d {
        poly = multiply_lag_polynomials(&poly, &[1.0]);
    }
    if period > 0 {
        let seasonal = seasonal_lag_polynomial(&[1.0], period);
        for _ in 0..cap_d {
            poly = multiply_lag_polynomials(&poly, &seasonal);
        }
    }
    poly
}

/// Extend `history` by `increments` using `y_t = w_t + Σ c_j·y_{t-j}`.
///
/// This inverts [`difference`]/[`seasonal_difference`] for the operator `poly`.
pub fn integrate(increments: &[f64], history: &[f64], poly: &[f64]) -> Vec<f64> {
    let mut extended = history.to_vec();
    for &w in increments {
        let t = extended.len();
        let carried: f64 = poly
            .iter()
            .enumerate()
            .filter(|(j, _)| t > *j)
            .map(|(j, c)| c * extended[t - 1 - j])
            .sum();
        extended.push(w + carried);
    }
    extended.split_off(history.len())
}
