//! Anomaly detector front-end: method selection, ensemble voting and result assembly.

use super::isolation::{anomaly_features, most_anomalous, IsolationForest};
use super::outlier::{domain_flags, statistical_flags, Flag};
use crate::core::TimeSeries;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Detection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectionMethod {
    /// z-score, modified z-score and IQR fences.
    Statistical,
    /// Fuel-market rules on daily changes and volatility.
    DomainRules,
    /// Isolation forest over engineered features.
    IsolationForest,
    /// Majority vote of the three methods above.
    #[default]
    Ensemble,
}

impl DetectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::Statistical => "statistical",
            DetectionMethod::DomainRules => "domain_based",
            DetectionMethod::IsolationForest => "isolation_forest",
            DetectionMethod::Ensemble => "ensemble",
        }
    }
}

/// Thresholds for every detection method.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    /// Series shorter than this yield an empty result.
    pub min_observations: usize,
    pub z_threshold: f64,
    pub modified_z_threshold: f64,
    pub iqr_multiplier: f64,
    /// Single-day |change| limit.
    pub daily_change_limit: f64,
    /// Rolling volatility limit as a fraction of the series std.
    pub volatility_limit: f64,
    pub volatility_window: usize,
    /// |change| that counts towards a supply-disruption run.
    pub disruption_threshold: f64,
    /// Minimum run length of large consecutive moves.
    pub disruption_run: usize,
    /// Votes an index needs to survive the ensemble.
    pub min_votes: usize,
    pub n_trees: usize,
    pub subsample: usize,
    pub seed: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_observations: 30,
            z_threshold: 3.0,
            modified_z_threshold: 3.5,
            iqr_multiplier: 1.5,
            daily_change_limit: 0.10,
            volatility_limit: 0.15,
            volatility_window: 7,
            disruption_threshold: 0.20,
            disruption_run: 3,
            min_votes: 2,
            n_trees: 100,
            subsample: 256,
            seed: 42,
        }
    }
}

impl DetectorConfig {
    pub fn with_z_threshold(mut self, z: f64) -> Self {
        self.z_threshold = z;
        self
    }

    pub fn with_daily_change_limit(mut self, limit: f64) -> Self {
        self.daily_change_limit = limit;
        self
    }

    pub fn with_volatility_limit(mut self, limit: f64) -> Self {
        self.volatility_limit = limit;
        self
    }

    pub fn with_min_votes(mut self, votes: usize) -> Self {
        self.min_votes = votes;
        self
    }

    pub fn with_forest(mut self, n_trees: usize, subsample: usize, seed: u64) -> Self {
        self.n_trees = n_trees;
        self.subsample = subsample;
        self.seed = seed;
        self
    }
}

/// Flagged observations. All per-outlier vectors are parallel and ordered by index.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlierResult {
    pub indices: Vec<usize>,
    pub scores: Vec<f64>,
    pub types: Vec<String>,
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
    pub total_count: usize,
    /// Share of the series flagged, in percent.
    pub percentage: f64,
    pub method: DetectionMethod,
    /// z threshold, daily change limit, contamination or vote count, depending on `method`.
    pub threshold: f64,
}

impl OutlierResult {
    pub fn empty(method: DetectionMethod, threshold: f64) -> Self {
        Self {
            indices: Vec::new(),
            scores: Vec::new(),
            types: Vec::new(),
            dates: Vec::new(),
            values: Vec::new(),
            total_count: 0,
            percentage: 0.0,
            method,
            threshold,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_count == 0
    }

    pub fn is_outlier(&self, index: usize) -> bool {
        self.indices.binary_search(&index).is_ok()
    }

    fn from_flags(series: &TimeSeries, flags: Vec<Flag>, method: DetectionMethod, threshold: f64) -> Self {
        let mut result = Self::empty(method, threshold);
        for flag in flags {
            result.dates.push(series.dates()[flag.index]);
            result.values.push(series.values()[flag.index]);
            result.indices.push(flag.index);
            result.scores.push(flag.score);
            result.types.push(flag.tag);
        }
        result.total_count = result.indices.len();
        if !series.is_empty() {
            result.percentage = 100.0 * result.total_count as f64 / series.len() as f64;
        }
        result
    }
}

/// Runs the configured outlier detection methods over a price series.
#[derive(Debug, Clone, Default)]
pub struct AnomalyDetector {
    config: DetectorConfig,
}

impl AnomalyDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Detect outliers with `method`.
    ///
    /// Missing values are dropped first; indices refer to the cleaned series,
    /// which is the input itself when it has no gaps. `contamination` only
    /// affects the isolation forest (and through it the ensemble) and is
    /// clamped to `[0, 0.5]`.
    pub fn detect(&self, series: &TimeSeries, method: DetectionMethod, contamination: f64) -> OutlierResult {
        let contamination = if contamination.is_finite() {
            contamination.clamp(0.0, 0.5)
        } else {
            0.0
        };
        let threshold = match method {
            DetectionMethod::Statistical => self.config.z_threshold,
            DetectionMethod::DomainRules => self.config.daily_change_limit,
            DetectionMethod::IsolationForest => contamination,
            DetectionMethod::Ensemble => self.config.min_votes as f64,
        };

        let clean = match series.sanitized(crate::core::MissingValuePolicy::Drop) {
            Ok(clean) => clean,
            Err(err) => {
                warn!(error = %err, "outlier detection skipped");
                return OutlierResult::empty(method, threshold);
            }
        };
        if clean.len() < self.config.min_observations {
            warn!(
                n = clean.len(),
                needed = self.config.min_observations,
                "too few observations for outlier detection"
            );
            return OutlierResult::empty(method, threshold);
        }

        let values = clean.values();
        let flags = match method {
            DetectionMethod::Statistical => statistical_flags(values, &self.config),
            DetectionMethod::DomainRules => domain_flags(values, &self.config),
            DetectionMethod::IsolationForest => self.isolation_flags(values, contamination),
            DetectionMethod::Ensemble => self.ensemble_flags(values, contamination),
        };

        let result = OutlierResult::from_flags(&clean, flags, method, threshold);
        debug!(
            method = method.as_str(),
            outliers = result.total_count,
            percentage = result.percentage,
            "outlier detection finished"
        );
        result
    }

    fn isolation_flags(&self, values: &[f64], contamination: f64) -> Vec<Flag> {
        let rows = anomaly_features(values);
        let forest = IsolationForest::fit(&rows, self.config.n_trees, self.config.subsample, self.config.seed);
        most_anomalous(&forest.score_samples(&rows), contamination)
            .into_iter()
            .map(|(index, score)| Flag {
                index,
                score,
                tag: "isolation_forest".to_string(),
            })
            .collect()
    }

    fn ensemble_flags(&self, values: &[f64], contamination: f64) -> Vec<Flag> {
        let voters = [
            ("iso", self.isolation_flags(values, contamination)),
            ("stat", statistical_flags(values, &self.config)),
            ("domain", domain_flags(values, &self.config)),
        ];

        let mut tally: BTreeMap<usize, (usize, f64, Vec<String>)> = BTreeMap::new();
        for (name, flags) in voters {
            for flag in flags {
                let entry = tally.entry(flag.index).or_insert((0, 0.0, Vec::new()));
                entry.0 += 1;
                entry.1 += flag.score;
                entry.2.push(format!("{name}:{}", flag.tag));
            }
        }

        tally
            .into_iter()
            .filter(|(_, (votes, _, _))| *votes >= self.config.min_votes)
            .map(|(index, (votes, score_sum, tags))| Flag {
                index,
                score: score_sum / votes as f64,
                tag: tags.join(","),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series_with_spike(n: usize, spike_at: usize) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2023, 3, 1).unwrap();
        let values = (0..n)
            .map(|i| {
                let base = 1600.0 + 0.5 * i as f64 + 5.0 * (i as f64 * 0.2).sin();
                if i == spike_at {
                    base * 1.3
                } else {
                    base
                }
            })
            .collect();
        TimeSeries::daily(start, values).unwrap()
    }

    #[test]
    fn short_series_yields_empty_result() {
        let series = series_with_spike(20, 10);
        let detector = AnomalyDetector::default();
        for method in [
            DetectionMethod::Statistical,
            DetectionMethod::DomainRules,
            DetectionMethod::IsolationForest,
            DetectionMethod::Ensemble,
        ] {
            let result = detector.detect(&series, method, 0.1);
            assert!(result.is_empty());
            assert_eq!(result.method, method);
        }
    }

    #[test]
    fn spike_flagged_by_statistical_and_ensemble() {
        let series = series_with_spike(200, 100);
        let detector = AnomalyDetector::default();

        let stat = detector.detect(&series, DetectionMethod::Statistical, 0.05);
        assert!(stat.is_outlier(100));

        let ensemble = detector.detect(&series, DetectionMethod::Ensemble, 0.05);
        assert!(ensemble.is_outlier(100));
        let pos = ensemble.indices.iter().position(|&i| i == 100).unwrap();
        assert!(ensemble.types[pos].contains("stat:"));
        assert!(ensemble.types[pos].contains("domain:price_spike"));
        assert_eq!(ensemble.threshold, 2.0);
    }

    #[test]
    fn parallel_vectors_line_up() {
        let series = series_with_spike(120, 60);
        let result = AnomalyDetector::default().detect(&series, DetectionMethod::DomainRules, 0.1);
        assert_eq!(result.indices.len(), result.total_count);
        assert_eq!(result.scores.len(), result.total_count);
        assert_eq!(result.types.len(), result.total_count);
        assert_eq!(result.dates.len(), result.total_count);
        assert_eq!(result.values.len(), result.total_count);
        assert!(result.indices.windows(2).all(|w| w[0] < w[1]));
        for (k, &i) in result.indices.iter().enumerate() {
            assert_eq!(result.dates[k], series.dates()[i]);
        }
    }

    #[test]
    fn isolation_forest_returns_contamination_share() {
        let series = series_with_spike(200, 50);
        let detector = AnomalyDetector::default();
        let result = detector.detect(&series, DetectionMethod::IsolationForest, 0.05);
        assert_eq!(result.total_count, 10);
        assert!((result.percentage - 5.0).abs() < 1e-9);
        assert!(result.types.iter().all(|t| t == "isolation_forest"));
    }

    #[test]
    fn out_of_range_contamination_is_clamped() {
        let series = series_with_spike(100, 50);
        let detector = AnomalyDetector::default();
        let result = detector.detect(&series, DetectionMethod::IsolationForest, 0.9);
        assert_eq!(result.total_count, 50);
        assert_eq!(result.threshold, 0.5);
    }
}
