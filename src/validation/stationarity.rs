//! Unit-root and stationarity tests.
//!
//! The augmented Dickey-Fuller test has a unit root as its null; KPSS has
//! stationarity as its null. Running both gives a more reliable picture.

use crate::utils::ols::solve_symmetric;
use statrs::distribution::{ContinuousCDF, Normal};

/// Result of a stationarity test.
#[derive(Debug, Clone, PartialEq)]
pub struct StationarityResult {
    pub statistic: f64,
    pub p_value: f64,
    /// Lags used in the regression or the long-run variance
    pub lags: usize,
    /// Verdict at the 5% level
    pub is_stationary: bool,
    pub critical_values: CriticalValues,
}

impl StationarityResult {
    fn undefined() -> Self {
        Self {
            statistic: f64::NAN,
            p_value: f64::NAN,
            lags: 0,
            is_stationary: false,
            critical_values: CriticalValues::default(),
        }
    }
}

/// Critical values at common significance levels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CriticalValues {
    pub cv_1pct: f64,
    pub cv_5pct: f64,
    pub cv_10pct: f64,
}

/// Deterministic terms of the KPSS null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KpssRegression {
    /// Stationary around a constant.
    #[default]
    Level,
    /// Stationary around a linear trend.
    Trend,
}

/// Both tests together.
#[derive(Debug, Clone, PartialEq)]
pub struct StationarityDiagnostics {
    pub adf: StationarityResult,
    pub kpss: StationarityResult,
}

impl StationarityDiagnostics {
    /// ADF rejects a unit root and KPSS does not reject stationarity.
    pub fn overall_stationary(&self) -> bool {
        self.adf.is_stationary && self.kpss.is_stationary
    }
}

/// ADF (constant, AIC lag selection) plus trend-KPSS.
pub fn check_stationarity(series: &[f64]) -> StationarityDiagnostics {
    StationarityDiagnostics {
        adf: adf_test(series, None),
        kpss: kpss_test(series, KpssRegression::Trend, None),
    }
}

/// Least squares with the coefficient covariance diagonal.
struct Regression {
    coefficients: Vec<f64>,
    std_errors: Vec<f64>,
    rss: f64,
    nobs: usize,
}

fn regress(y: &[f64], columns: &[Vec<f64>]) -> Option<Regression> {
    let n = y.len();
    let k = columns.len();
    if n <= k {
        return None;
    }
    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for i in 0..k {
        xty[i] = columns[i].iter().zip(y).map(|(a, b)| a * b).sum();
        for j in i..k {
            let v: f64 = columns[i].iter().zip(&columns[j]).map(|(a, b)| a * b).sum();
            xtx[i][j] = v;
            xtx[j][i] = v;
        }
    }
    let coefficients = solve_symmetric(&xtx, &xty, 0.0)?;
    let rss: f64 = (0..n)
        .map(|t| {
            let fit: f64 = (0..k).map(|j| coefficients[j] * columns[j][t]).sum();
            (y[t] - fit).powi(2)
        })
        .sum();
    let sigma2 = rss / (n - k) as f64;
    let std_errors = (0..k)
        .map(|j| {
            let mut unit = vec![0.0; k];
            unit[j] = 1.0;
            solve_symmetric(&xtx, &unit, 0.0).map_or(f64::NAN, |col| (sigma2 * col[j]).sqrt())
        })
        .collect();
    Some(Regression {
        coefficients,
        std_errors,
        rss,
        nobs: n,
    })
}

/// ADF regression `Δy_t = α + β·y_{t-1} + Σγ_i·Δy_{t-i}` on observations `start..`.
fn adf_regression(series: &[f64], lag: usize, start: usize) -> Option<Regression> {
    let dy: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();
    let rows = start..dy.len();
    if rows.len() < lag + 3 {
        return None;
    }
    let y: Vec<f64> = rows.clone().map(|t| dy[t]).collect();
    let mut columns = vec![vec![1.0; y.len()], rows.clone().map(|t| series[t]).collect()];
    for i in 1..=lag {
        columns.push(rows.clone().map(|t| dy[t - i]).collect());
    }
    regress(&y, &columns)
}

/// Augmented Dickey-Fuller test with a constant.
///
/// The lag order minimizes AIC over `0..=max_lags` on a common sample
/// (default `max_lags = ceil(12·(n/100)^¼)`), then the chosen regression is
/// refitted on all usable observations. P-values follow MacKinnon's (1994)
/// response surface.
pub fn adf_test(series: &[f64], max_lags: Option<usize>) -> StationarityResult {
    let n = series.len();
    if n < 8 || series.iter().any(|v| !v.is_finite()) {
        return StationarityResult::undefined();
    }
    let default_max = (12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as usize;
    let max_lags = max_lags.unwrap_or(default_max).min((n / 2).saturating_sub(2));

    let best_lag = (0..=max_lags)
        .filter_map(|lag| {
            let reg = adf_regression(series, lag, max_lags)?;
            if reg.rss <= 0.0 {
                return None;
            }
            let k = (lag + 2) as f64;
            let aic = reg.nobs as f64 * (reg.rss / reg.nobs as f64).ln() + 2.0 * k;
            Some((lag, aic))
        })
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(lag, _)| lag);

    let Some(lag) = best_lag else {
        return StationarityResult::undefined();
    };
    let Some(reg) = adf_regression(series, lag, lag) else {
        return StationarityResult::undefined();
    };
    let se = reg.std_errors[1];
    if !(se.is_finite() && se > 0.0) {
        return StationarityResult::undefined();
    }

    let statistic = reg.coefficients[1] / se;
    let p_value = mackinnon_p_value(statistic);
    let t = reg.nobs as f64;
    StationarityResult {
        statistic,
        p_value,
        lags: lag,
        is_stationary: p_value < 0.05,
        critical_values: CriticalValues {
            cv_1pct: -3.43035 - 6.5393 / t - 16.786 / t.powi(2) - 79.433 / t.powi(3),
            cv_5pct: -2.86154 - 2.8903 / t - 4.234 / t.powi(2) - 40.040 / t.powi(3),
            cv_10pct: -2.56677 - 1.5384 / t - 2.809 / t.powi(2),
        },
    }
}

/// MacKinnon (1994) approximate p-value for the constant-only ADF statistic.
fn mackinnon_p_value(stat: f64) -> f64 {
    const TAU_MAX: f64 = 2.74;
    const TAU_MIN: f64 = -18.83;
    const TAU_STAR: f64 = -1.61;
    const SMALL_P: [f64; 3] = [2.1659, 1.4412, 0.038269];
    const LARGE_P: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];

    if stat.is_nan() {
        return f64::NAN;
    }
    if stat > TAU_MAX {
        return 1.0;
    }
    if stat < TAU_MIN {
        return 0.0;
    }
    let coefficients: &[f64] = if stat <= TAU_STAR { &SMALL_P } else { &LARGE_P };
    let z = coefficients
        .iter()
        .rev()
        .fold(0.0, |acc, c| acc * stat + c);
    match Normal::new(0.0, 1.0) {
        Ok(normal) => normal.cdf(z),
        Err(_) => f64::NAN,
    }
}

/// KPSS test with Bartlett-weighted long-run variance.
///
/// Default lags follow Hobijn et al.'s data-dependent rule. P-values are
/// interpolated in the tabulated range and clamped to `[0.01, 0.10]`.
pub fn kpss_test(series: &[f64], regression: KpssRegression, lags: Option<usize>) -> StationarityResult {
    let n = series.len();
    if n < 4 || series.iter().any(|v| !v.is_finite()) {
        return StationarityResult::undefined();
    }

    let residuals: Vec<f64> = match regression {
        KpssRegression::Level => {
            let m = series.iter().sum::<f64>() / n as f64;
            series.iter().map(|x| x - m).collect()
        }
        KpssRegression::Trend => {
            let columns = vec![vec![1.0; n], (0..n).map(|t| t as f64).collect()];
            let Some(reg) = regress(series, &columns) else {
                return StationarityResult::undefined();
            };
            series
                .iter()
                .enumerate()
                .map(|(t, y)| y - reg.coefficients[0] - reg.coefficients[1] * t as f64)
                .collect()
        }
    };

    let lags = lags.unwrap_or_else(|| hobijn_lags(&residuals)).min(n - 1);
    let autocov = |j: usize| -> f64 {
        residuals[j..].iter().zip(&residuals[..n - j]).map(|(a, b)| a * b).sum::<f64>() / n as f64
    };
    let long_run = autocov(0)
        + 2.0
            * (1..=lags)
                .map(|j| (1.0 - j as f64 / (lags + 1) as f64) * autocov(j))
                .sum::<f64>();
    if long_run <= 0.0 {
        return StationarityResult {
            lags,
            is_stationary: true,
            ..StationarityResult::undefined()
        };
    }

    let mut cumulative = 0.0;
    let eta = residuals
        .iter()
        .map(|r| {
            cumulative += r;
            cumulative * cumulative
        })
        .sum::<f64>()
        / (n * n) as f64;
    let statistic = eta / long_run;

    let table = match regression {
        KpssRegression::Level => [0.347, 0.463, 0.574, 0.739],
        KpssRegression::Trend => [0.119, 0.146, 0.176, 0.216],
    };
    let p_value = kpss_p_value(statistic, &table);
    StationarityResult {
        statistic,
        p_value,
        lags,
        is_stationary: p_value > 0.05,
        critical_values: CriticalValues {
            cv_1pct: table[3],
            cv_5pct: table[1],
            cv_10pct: table[0],
        },
    }
}

fn hobijn_lags(residuals: &[f64]) -> usize {
    let n = residuals.len();
    let cov_lags = (n as f64).powf(2.0 / 9.0) as usize;
    let mut s0 = residuals.iter().map(|r| r * r).sum::<f64>() / n as f64;
    let mut s1 = 0.0;
    for i in 1..=cov_lags.min(n - 1) {
        let prod = 2.0 * residuals[i..].iter().zip(&residuals[..n - i]).map(|(a, b)| a * b).sum::<f64>()
            / n as f64;
        s0 += prod;
        s1 += i as f64 * prod;
    }
    if s0 <= 0.0 {
        return 0;
    }
    let s_hat = s1 / s0;
    let gamma = 1.1447 * (s_hat * s_hat).powf(1.0 / 3.0);
    (gamma * (n as f64).powf(1.0 / 3.0)) as usize
}

fn kpss_p_value(stat: f64, table: &[f64; 4]) -> f64 {
    const P: [f64; 4] = [0.10, 0.05, 0.025, 0.01];
    if stat <= table[0] {
        return P[0];
    }
    if stat >= table[3] {
        return P[3];
    }
    for i in 0..3 {
        if stat <= table[i + 1] {
            let frac = (stat - table[i]) / (table[i + 1] - table[i]);
            return P[i] + frac * (P[i + 1] - P[i]);
        }
    }
    P[3]
}

/// Number of first differences until level-KPSS stops rejecting at 5%, capped at `max_d`.
pub fn ndiffs(series: &[f64], max_d: usize) -> usize {
    let mut current = series.to_vec();
    for d in 0..max_d {
        let test = kpss_test(&current, KpssRegression::Level, None);
        if test.p_value.is_nan() || test.is_stationary {
            return d;
        }
        current = current.windows(2).map(|w| w[1] - w[0]).collect();
    }
    max_d
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    fn noise(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0, 1.0).unwrap();
        (0..n).map(|_| normal.sample(&mut rng)).collect()
    }

    fn random_walk(n: usize, seed: u64) -> Vec<f64> {
        let mut level = 100.0;
        noise(n, seed)
            .into_iter()
            .map(|e| {
                level += e;
                level
            })
            .collect()
    }

    #[test]
    fn adf_rejects_unit_root_for_noise() {
        let result = adf_test(&noise(300, 1), None);
        assert!(result.statistic < result.critical_values.cv_1pct);
        assert!(result.p_value < 0.01);
        assert!(result.is_stationary);
    }

    #[test]
    fn adf_keeps_unit_root_for_random_walk() {
        let result = adf_test(&random_walk(300, 2), None);
        assert!(result.p_value > 0.01);
    }

    #[test]
    fn adf_critical_values_are_ordered() {
        let result = adf_test(&noise(200, 3), Some(2));
        let cv = &result.critical_values;
        assert!(cv.cv_1pct < cv.cv_5pct && cv.cv_5pct < cv.cv_10pct);
        assert!(result.lags <= 2);
    }

    #[test]
    fn mackinnon_matches_five_percent_point() {
        assert!((mackinnon_p_value(-2.86) - 0.05).abs() < 0.005);
        assert_eq!(mackinnon_p_value(3.0), 1.0);
        assert_eq!(mackinnon_p_value(-20.0), 0.0);
    }

    #[test]
    fn kpss_accepts_trend_stationary_series() {
        let series: Vec<f64> = noise(300, 4)
            .into_iter()
            .enumerate()
            .map(|(t, e)| 50.0 + 0.3 * t as f64 + e)
            .collect();
        assert!(kpss_test(&series, KpssRegression::Trend, None).p_value > 0.01);
        assert!(!kpss_test(&series, KpssRegression::Level, None).is_stationary);
    }

    #[test]
    fn kpss_rejects_drifting_level() {
        let series: Vec<f64> = noise(300, 5)
            .into_iter()
            .enumerate()
            .map(|(t, e)| 0.01 * (t * t) as f64 + e)
            .collect();
        let result = kpss_test(&series, KpssRegression::Level, None);
        assert_eq!(result.p_value, 0.01);
        assert!(!result.is_stationary);
    }

    #[test]
    fn short_input_is_undefined() {
        assert!(adf_test(&[1.0, 2.0, 3.0], None).statistic.is_nan());
        assert!(kpss_test(&[1.0, 2.0], KpssRegression::Level, None).statistic.is_nan());
    }

    #[test]
    fn ndiffs_for_trend() {
        let trend: Vec<f64> = noise(300, 6)
            .into_iter()
            .enumerate()
            .map(|(t, e)| 2.0 * t as f64 + e)
            .collect();
        assert_eq!(ndiffs(&trend, 2), 1);
        assert_eq!(ndiffs(&[1.0, 2.0, 3.0], 2), 0);
    }
}
