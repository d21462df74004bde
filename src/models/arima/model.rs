//! Seasonal ARIMA estimation by conditional sum of squares.

use crate::error::{ForecastError, Result};
use crate::models::arima::diff::{
    difference, differencing_polynomial, integrate, multiply_lag_polynomials,
    seasonal_difference, seasonal_lag_polynomial,
};
use crate::utils::optimization::{nelder_mead, NelderMeadConfig};
use std::fmt;

const COEFFICIENT_BOUND: f64 = 0.99;

/// Model order (p, d, q)(P, D, Q)\[s\].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelOrder {
    /// Non-seasonal AR order.
    pub p: usize,
    /// Non-seasonal differencing order.
    pub d: usize,
    /// Non-seasonal MA order.
    pub q: usize,
    /// Seasonal AR order.
    pub cap_p: usize,
    /// Seasonal differencing order.
    pub cap_d: usize,
    /// Seasonal MA order.
    pub cap_q: usize,
    /// Seasonal period (0 for non-seasonal).
    pub s: usize,
}

impl ModelOrder {
    /// Non-seasonal ARIMA(p, d, q).
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self {
            p,
            d,
            q,
            cap_p: 0,
            cap_d: 0,
            cap_q: 0,
            s: 0,
        }
    }

    /// SARIMA(p, d, q)(P, D, Q)\[s\].
    pub fn seasonal(p: usize, d: usize, q: usize, cap_p: usize, cap_d: usize, cap_q: usize, s: usize) -> Self {
        Self {
            p,
            d,
            q,
            cap_p,
            cap_d,
            cap_q,
            s,
        }
    }

    /// Check if this is a seasonal model.
    pub fn is_seasonal(&self) -> bool {
        self.s > 1 && (self.cap_p > 0 || self.cap_d > 0 || self.cap_q > 0)
    }

    /// A mean (or drift, after one difference) is estimated for low total differencing.
    pub fn includes_mean(&self) -> bool {
        self.d + self.seasonal_d() <= 1
    }

    /// Number of estimated coefficients, excluding the innovation variance.
    pub fn num_coefficients(&self) -> usize {
        let (cap_p, cap_q) = if self.s > 1 { (self.cap_p, self.cap_q) } else { (0, 0) };
        self.p + self.q + cap_p + cap_q + usize::from(self.includes_mean())
    }

    /// Observations consumed by differencing.
    pub fn differencing_loss(&self) -> usize {
        self.d + self.seasonal_d() * self.s
    }

    fn seasonal_d(&self) -> usize {
        if self.s > 1 {
            self.cap_d
        } else {
            0
        }
    }
}

impl fmt::Display for ModelOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_seasonal() {
            write!(
                f,
                "SARIMA({},{},{})({},{},{})[{}]",
                self.p, self.d, self.q, self.cap_p, self.cap_d, self.cap_q, self.s
            )
        } else {
            write!(f, "ARIMA({},{},{})", self.p, self.d, self.q)
        }
    }
}

/// A fitted ARIMA model. Immutable once estimated.
#[derive(Debug, Clone)]
pub struct FittedArima {
    order: ModelOrder,
    ar: Vec<f64>,
    ma: Vec<f64>,
    seasonal_ar: Vec<f64>,
    seasonal_ma: Vec<f64>,
    mean: f64,
    sigma2: f64,
    aic: f64,
    bic: f64,
    /// Training values on the original scale.
    history: Vec<f64>,
    /// Differenced training values.
    differenced: Vec<f64>,
    /// Innovations aligned with `differenced`.
    innovations: Vec<f64>,
    fitted: Vec<f64>,
    residuals: Vec<f64>,
    converged: bool,
}

impl FittedArima {
    /// Estimate `order` on `values` by minimizing the conditional sum of squares.
    pub fn fit(values: &[f64], order: ModelOrder) -> Result<Self> {
        let season = if order.s > 1 { order.s } else { 0 };
        let differenced = seasonal_difference(&difference(values, order.d), order.seasonal_d(), season);
        let include_mean = order.includes_mean();
        let cap_p = if season > 0 { order.cap_p } else { 0 };
        let cap_q = if season > 0 { order.cap_q } else { 0 };
        let start = order.p + cap_p * season;
        let k = order.num_coefficients();
        let needed = order.differencing_loss() + start.max(order.q + cap_q * season) + k + 2;
        if values.len() < needed || differenced.len() <= start + k + 1 {
            return Err(ForecastError::InsufficientData {
                needed,
                got: values.len(),
            });
        }

        let m = differenced.len();
        let w_mean = differenced.iter().sum::<f64>() / m as f64;
        let layout = Layout {
            include_mean,
            p: order.p,
            q: order.q,
            cap_p,
            cap_q,
            s: season,
        };

        let mut initial = Vec::with_capacity(k);
        let mut bounds = Vec::with_capacity(k);
        if include_mean {
            initial.push(w_mean);
            bounds.push((f64::NEG_INFINITY, f64::INFINITY));
        }
        for i in 0..(k - usize::from(include_mean)) {
            initial.push(0.1 / (1 + i % 3) as f64);
            bounds.push((-COEFFICIENT_BOUND, COEFFICIENT_BOUND));
        }

        let (params, converged) = if initial.is_empty() {
            (Vec::new(), true)
        } else {
            let config = NelderMeadConfig::default().with_max_iter(500 * k.max(1));
            let result = nelder_mead(
                |params| {
                    let (mean, phi, theta) = layout.polynomials(params);
                    conditional_innovations(&differenced, start, mean, &phi, &theta).0
                },
                &initial,
                Some(&bounds),
                config,
            );
            (result.optimal_point, result.converged)
        };

        let (mean, phi, theta) = layout.polynomials(&params);
        let (css, innovations) = conditional_innovations(&differenced, start, mean, &phi, &theta);
        let n_eff = (m - start) as f64;
        if !css.is_finite() || n_eff < 1.0 {
            return Err(ForecastError::ComputationError(format!(
                "{order}: conditional sum of squares is not finite"
            )));
        }
        let sigma2 = (css / n_eff).max(f64::EPSILON);
        let log_likelihood = -0.5 * n_eff * (1.0 + (2.0 * std::f64::consts::PI * sigma2).ln());
        let n_params = (k + 1) as f64;

        let offset = values.len() - m;
        let mut fitted = vec![f64::NAN; values.len()];
        let mut residuals = vec![f64::NAN; values.len()];
        for t in start..m {
            fitted[t + offset] = values[t + offset] - innovations[t];
            residuals[t + offset] = innovations[t];
        }

        let (ar, ma, seasonal_ar, seasonal_ma) = layout.split(&params);
        Ok(Self {
            order,
            ar,
            ma,
            seasonal_ar,
            seasonal_ma,
            mean,
            sigma2,
            aic: -2.0 * log_likelihood + 2.0 * n_params,
            bic: -2.0 * log_likelihood + n_params * n_eff.ln(),
            history: values.to_vec(),
            differenced,
            innovations,
            fitted,
            residuals,
            converged,
        })
    }

    pub fn order(&self) -> ModelOrder {
        self.order
    }

    pub fn ar_coefficients(&self) -> &[f64] {
        &self.ar
    }

    pub fn ma_coefficients(&self) -> &[f64] {
        &self.ma
    }

    pub fn seasonal_ar_coefficients(&self) -> &[f64] {
        &self.seasonal_ar
    }

    pub fn seasonal_ma_coefficients(&self) -> &[f64] {
        &self.seasonal_ma
    }

    /// Mean of the differenced series (a drift when d + D = 1).
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Innovation variance.
    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    pub fn aic(&self) -> f64 {
        self.aic
    }

    pub fn bic(&self) -> f64 {
        self.bic
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    /// One-step in-sample predictions; NaN where no prediction exists.
    pub fn fitted_values(&self) -> &[f64] {
        &self.fitted
    }

    /// In-sample one-step errors; NaN where no prediction exists.
    pub fn residuals(&self) -> &[f64] {
        &self.residuals
    }

    /// Residuals with the undefined head removed.
    pub fn valid_residuals(&self) -> Vec<f64> {
        self.residuals.iter().copied().filter(|r| r.is_finite()).collect()
    }

    fn ar_polynomial(&self) -> Vec<f64> {
        multiply_lag_polynomials(&self.ar, &seasonal_lag_polynomial(&self.seasonal_ar, self.order.s))
    }

    fn ma_polynomial(&self) -> Vec<f64> {
        ma_product(&self.ma, &self.seasonal_ma, self.order.s)
    }

    /// Point forecasts and their standard errors for `steps` days ahead.
    pub fn forecast(&self, steps: usize) -> (Vec<f64>, Vec<f64>) {
        let phi = self.ar_polynomial();
        let theta = self.ma_polynomial();
        let m = self.differenced.len();

        let mut w = self.differenced.clone();
        let mut e = self.innovations.clone();
        for _ in 0..steps {
            let t = w.len();
            let mut pred = self.mean;
            for (i, c) in phi.iter().enumerate() {
                if t > i {
                    pred += c * (w[t - 1 - i] - self.mean);
                }
            }
            for (j, c) in theta.iter().enumerate() {
                if t > j {
                    pred += c * e[t - 1 - j];
                }
            }
            w.push(pred);
            e.push(0.0);
        }

        let season = if self.order.s > 1 { self.order.s } else { 0 };
        let diff_poly = differencing_polynomial(self.order.d, self.order.seasonal_d(), season);
        let means = integrate(&w[m..], &self.history, &diff_poly);

        let psi = psi_weights(&multiply_lag_polynomials(&phi, &diff_poly), &theta, steps);
        let mut cumulative = 0.0;
        let se = psi
            .iter()
            .map(|p| {
                cumulative += p * p;
                (self.sigma2 * cumulative).sqrt()
            })
            .collect();
        (means, se)
    }
}

/// Parameter vector layout: `[mean?, ar.., ma.., seasonal ar.., seasonal ma..]`.
#[derive(Debug, Clone, Copy)]
struct Layout {
    include_mean: bool,
    p: usize,
    q: usize,
    cap_p: usize,
    cap_q: usize,
    s: usize,
}

impl Layout {
    fn split(&self, params: &[f64]) -> (Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>) {
        let mut at = usize::from(self.include_mean);
        let mut take = |len: usize| {
            let part = params[at..at + len].to_vec();
            at += len;
            part
        };
        let ar = take(self.p);
        let ma = take(self.q);
        let sar = take(self.cap_p);
        let sma = take(self.cap_q);
        (ar, ma, sar, sma)
    }

    /// Mean, expanded AR operator and expanded MA operator.
    fn polynomials(&self, params: &[f64]) -> (f64, Vec<f64>, Vec<f64>) {
        let mean = if self.include_mean { params[0] } else { 0.0 };
        let (ar, ma, sar, sma) = self.split(params);
        let phi = multiply_lag_polynomials(&ar, &seasonal_lag_polynomial(&sar, self.s));
        (mean, phi, ma_product(&ma, &sma, self.s))
    }
}

/// `(1 + Σθ_j B^j)(1 + ΣΘ_k B^{ks})` as plain coefficients on B, B², ...
fn ma_product(ma: &[f64], seasonal_ma: &[f64], s: usize) -> Vec<f64> {
    let neg = |c: &[f64]| c.iter().map(|x| -x).collect::<Vec<_>>();
    let product = multiply_lag_polynomials(&neg(ma), &seasonal_lag_polynomial(&neg(seasonal_ma), s));
    neg(&product)
}

/// CSS recursion from index `first`. Returns the sum of squares and the innovations.
fn conditional_innovations(w: &[f64], first: usize, mean: f64, phi: &[f64], theta: &[f64]) -> (f64, Vec<f64>) {
    let n = w.len();
    let mut e = vec![0.0; n];
    if n <= first || phi.len() > first {
        return (f64::INFINITY, e);
    }
    let mut css = 0.0;
    for t in first..n {
        let mut pred = mean;
        for (i, c) in phi.iter().enumerate() {
            pred += c * (w[t - 1 - i] - mean);
        }
        for (j, c) in theta.iter().enumerate() {
            if t > j {
                pred += c * e[t - 1 - j];
            }
        }
        e[t] = w[t] - pred;
        css += e[t] * e[t];
    }
    (css, e)
}

/// MA(∞) weights ψ_0..ψ_{h-1} of the operator `(1 - Σa_i B^i) y = (1 + Σθ_j B^j) e`.
fn psi_weights(ar: &[f64], theta: &[f64], h: usize) -> Vec<f64> {
    let mut psi = Vec::with_capacity(h);
    for j in 0..h {
        if j == 0 {
            psi.push(1.0);
            continue;
        }
        let mut value = theta.get(j - 1).copied().unwrap_or(0.0);
        for (i, a) in ar.iter().enumerate().take(j) {
            value += a * psi[j - 1 - i];
        }
        psi.push(value);
    }
    psi
}
