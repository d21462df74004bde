//! Calendar profiles and seasonality summary for daily series.

use super::spectrum::{dominant_frequencies, DominantFrequency};
use crate::core::TimeSeries;
use crate::utils::stats::autocorrelation;
use chrono::Datelike;
use std::collections::BTreeMap;

/// Lags (days) checked by the autocorrelation seasonality score: week, month,
/// quarter, half-year and year.
pub const SEASONAL_LAGS: [usize; 5] = [7, 30, 91, 182, 365];

/// Seasonality summary of a series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonalityProfile {
    /// Mean value per day of year (1..=366).
    pub day_of_year: BTreeMap<u32, f64>,
    /// Mean value per month (1..=12).
    pub month: BTreeMap<u32, f64>,
    /// Mean value per weekday (0 = Monday .. 6 = Sunday).
    pub day_of_week: BTreeMap<u32, f64>,
    /// Up to five strongest spectral components with period ≤ the requested maximum.
    pub dominant_frequencies: Vec<DominantFrequency>,
    /// Mean absolute autocorrelation over [`SEASONAL_LAGS`] below `min(365, n / 4)`.
    pub seasonality_score: f64,
}

/// Build calendar profiles, spectral peaks and the seasonality score.
pub fn analyze_seasonality(series: &TimeSeries, max_period: usize) -> SeasonalityProfile {
    let values = series.values();
    let dates = series.dates();

    SeasonalityProfile {
        day_of_year: group_mean(dates.iter().map(|d| d.ordinal()), values),
        month: group_mean(dates.iter().map(|d| d.month()), values),
        day_of_week: group_mean(
            dates.iter().map(|d| d.weekday().num_days_from_monday()),
            values,
        ),
        dominant_frequencies: dominant_frequencies(values, 5, max_period as f64),
        seasonality_score: seasonality_score(values),
    }
}

fn group_mean(keys: impl Iterator<Item = u32>, values: &[f64]) -> BTreeMap<u32, f64> {
    let mut acc: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
    for (k, &v) in keys.zip(values) {
        if v.is_finite() {
            let e = acc.entry(k).or_insert((0.0, 0));
            e.0 += v;
            e.1 += 1;
        }
    }
    acc.into_iter()
        .map(|(k, (sum, count))| (k, sum / count as f64))
        .collect()
}

/// Mean |ACF| at the seasonal lags that fit in `min(365, n / 4)`; 0 if none do.
pub fn seasonality_score(values: &[f64]) -> f64 {
    let max_lag = 365.min(values.len() / 4);
    let scores: Vec<f64> = SEASONAL_LAGS
        .iter()
        .filter(|&&lag| lag < max_lag)
        .map(|&lag| autocorrelation(values, lag))
        .filter(|a| a.is_finite())
        .map(f64::abs)
        .collect();
    if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn weekly(n: usize) -> TimeSeries {
        // 2024-01-01 is a Monday
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let values = (0..n).map(|i| if i % 7 == 5 || i % 7 == 6 { 110.0 } else { 100.0 }).collect();
        TimeSeries::daily(start, values).unwrap()
    }

    #[test]
    fn weekday_profile_captures_weekend_premium() {
        let profile = analyze_seasonality(&weekly(140), 365);
        assert_relative_eq!(profile.day_of_week[&0], 100.0, epsilon = 1e-12);
        assert_relative_eq!(profile.day_of_week[&6], 110.0, epsilon = 1e-12);
        assert_eq!(profile.month.len(), 5);
        assert!(profile.dominant_frequencies.len() <= 5);
        assert!(profile
            .dominant_frequencies
            .iter()
            .any(|f| (f.period - 7.0).abs() < 1e-9));
    }

    #[test]
    fn weekly_pattern_scores_high() {
        let profile = analyze_seasonality(&weekly(140), 365);
        // lags 7 and 30 fall below n / 4 = 35
        assert!(profile.seasonality_score > 0.3);
    }

    #[test]
    fn short_series_scores_zero() {
        assert_eq!(seasonality_score(&[1.0, 2.0, 3.0, 4.0, 5.0]), 0.0);
    }
}
