//! Least-squares regression for exogenous drivers and local polynomial fits.

use crate::error::{ForecastError, Result};

/// Fitted linear regression `y = intercept + Σ coefficients[j] * x_j`.
#[derive(Debug, Clone, PartialEq)]
pub struct OLSResult {
    /// Regression coefficients, one per regressor column.
    pub coefficients: Vec<f64>,
    /// Intercept term.
    pub intercept: f64,
}

impl OLSResult {
    /// Predict from regressor columns (same order as at fit time).
    pub fn predict(&self, columns: &[&[f64]]) -> Result<Vec<f64>> {
        if columns.len() != self.coefficients.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: self.coefficients.len(),
                got: columns.len(),
            });
        }
        let n = columns.first().map(|c| c.len()).unwrap_or(0);
        if let Some(bad) = columns.iter().find(|c| c.len() != n) {
            return Err(ForecastError::DimensionMismatch {
                expected: n,
                got: bad.len(),
            });
        }
        Ok((0..n)
            .map(|i| {
                self.intercept
                    + self
                        .coefficients
                        .iter()
                        .zip(columns)
                        .map(|(b, col)| b * col[i])
                        .sum::<f64>()
            })
            .collect())
    }

    /// Get the number of regressors.
    pub fn num_regressors(&self) -> usize {
        self.coefficients.len()
    }
}

/// Fit OLS with an intercept by solving the ridge-stabilized normal equations.
pub fn ols_fit(y: &[f64], columns: &[&[f64]]) -> Result<OLSResult> {
    let n = y.len();
    if n == 0 {
        return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
    }
    for col in columns {
        if col.len() != n {
            return Err(ForecastError::DimensionMismatch {
                expected: n,
                got: col.len(),
            });
        }
    }

    let k = columns.len() + 1;
    let row = |i: usize| -> Vec<f64> {
        std::iter::once(1.0)
            .chain(columns.iter().map(|c| c[i]))
            .collect()
    };

    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for (i, &yi) in y.iter().enumerate() {
        let x = row(i);
        for a in 0..k {
            xty[a] += x[a] * yi;
            for b in 0..k {
                xtx[a][b] += x[a] * x[b];
            }
        }
    }

    let beta = solve_symmetric(&xtx, &xty, 1e-8).ok_or_else(|| {
        ForecastError::ComputationError("OLS normal equations are not positive definite".into())
    })?;

    Ok(OLSResult {
        intercept: beta[0],
        coefficients: beta[1..].to_vec(),
    })
}

/// Residuals `y - ŷ` of a fitted regression.
pub fn ols_residuals(y: &[f64], fit: &OLSResult, columns: &[&[f64]]) -> Result<Vec<f64>> {
    let predictions = fit.predict(columns)?;
    if predictions.len() != y.len() {
        return Err(ForecastError::DimensionMismatch {
            expected: y.len(),
            got: predictions.len(),
        });
    }
    Ok(y.iter().zip(&predictions).map(|(a, p)| a - p).collect())
}

/// Solve `(A + ridge·I) x = b` for symmetric positive definite `A` via Cholesky.
pub(crate) fn solve_symmetric(a: &[Vec<f64>], b: &[f64], ridge: f64) -> Option<Vec<f64>> {
    let n = b.len();
    if n == 0 || a.len() != n {
        return None;
    }

    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i][j] + if i == j { ridge } else { 0.0 };
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }
            if i == j {
                if sum <= 0.0 {
                    return None;
                }
                l[i][j] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }

    let mut y = vec![0.0; n];
    for i in 0..n {
        let sum: f64 = (0..i).map(|j| l[i][j] * y[j]).sum();
        y[i] = (b[i] - sum) / l[i][i];
    }
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let sum: f64 = ((i + 1)..n).map(|j| l[j][i] * x[j]).sum();
        x[i] = (y[i] - sum) / l[i][i];
    }
    Some(x)
}
