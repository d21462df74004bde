//! Outlier detection and anomaly classification for price series.
//!
//! - Statistical tests: z-score, modified z-score (MAD), IQR fences
//! - Domain rules: daily spikes, volatility bursts, supply-disruption runs
//! - Isolation forest over engineered features
//! - Ensemble voting across the three
//! - Pattern analysis into market-event categories
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use fuelcast::core::TimeSeries;
//! use fuelcast::detection::{AnomalyDetector, DetectionMethod};
//!
//! let mut values: Vec<f64> = (0..100).map(|i| 1650.0 + (i as f64 * 0.3).sin()).collect();
//! values[40] = 2100.0;
//! let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let series = TimeSeries::daily(start, values).unwrap();
//!
//! let result = AnomalyDetector::default().detect(&series, DetectionMethod::Statistical, 0.1);
//! assert!(result.is_outlier(40));
//! ```

mod detector;
mod isolation;
mod outlier;
mod patterns;

pub use detector::{AnomalyDetector, DetectionMethod, DetectorConfig, OutlierResult};
pub use isolation::{anomaly_features, IsolationForest, FEATURE_COUNT};
pub use outlier::{iqr_bounds, modified_z_scores, z_scores};
pub use patterns::{analyze_anomaly_patterns, AnomalyEvent, AnomalyLabel, AnomalyProfile};
