//! End-to-end scenarios over synthetic daily fuel prices.

use chrono::{Duration, NaiveDate};
use fuelcast::backtest::{BacktestConfig, Backtester};
use fuelcast::core::TimeSeries;
use fuelcast::detection::{AnomalyDetector, DetectionMethod};
use fuelcast::error::ForecastError;
use fuelcast::models::arima::ArimaConfig;
use fuelcast::models::baseline::RandomWalkWithDrift;
use fuelcast::models::Forecaster;
use fuelcast::pipeline::{CycleConfig, ForecastCycle, UnitInput, UnitKey, UnitStatus};
use fuelcast::seasonality::{Decomposer, DecompositionMethod};
use fuelcast::transform::{PrepareConfig, SeriesPreparer};
use fuelcast::utils::stats::linear_slope;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::f64::consts::TAU;
use tracing_subscriber::EnvFilter;

/// Route crate logs to the test harness; `RUST_LOG=fuelcast=debug` shows them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 1, 1).unwrap()
}

fn daily(name: &str, values: Vec<f64>) -> TimeSeries {
    let dates = (0..values.len()).map(|i| start() + Duration::days(i as i64)).collect();
    TimeSeries::new(name, dates, values).unwrap()
}

fn noisy_prices(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 2.0).unwrap();
    (0..n)
        .map(|i| {
            let t = i as f64;
            1600.0 + 0.3 * t + 6.0 * (TAU * t / 7.0).sin() + noise.sample(&mut rng)
        })
        .collect()
}

#[test]
fn yearly_sinusoid_with_trend_is_recovered() {
    let mut rng = StdRng::seed_from_u64(2024);
    let noise = Normal::new(0.0, 2.0).unwrap();
    let values: Vec<f64> = (0..730)
        .map(|i| {
            let t = i as f64;
            100.0 + 0.5 * t + 20.0 * (TAU * t / 365.0).sin() + noise.sample(&mut rng)
        })
        .collect();
    let series = daily("gasoline", values);

    let result = Decomposer::default()
        .decompose(&series, DecompositionMethod::Stl, 365)
        .unwrap();

    assert!(
        result.seasonal_strength > 0.8,
        "seasonal strength {}",
        result.seasonal_strength
    );
    let slope = linear_slope(result.trend.values());
    assert!((slope - 0.5).abs() < 0.05, "trend slope {slope}");
    for (a, b) in result.reconstruct().iter().zip(series.values()) {
        assert!((a - b).abs() < 1e-8);
    }
}

#[test]
fn single_spike_is_flagged() {
    let mut values = vec![100.0; 100];
    values[60] = 200.0;
    let series = daily("diesel", values);
    let detector = AnomalyDetector::default();

    let statistical = detector.detect(&series, DetectionMethod::Statistical, 0.1);
    assert!(statistical.is_outlier(60));
    let at = statistical.indices.iter().position(|&i| i == 60).unwrap();
    assert!(statistical.types[at].contains("zscore"));
    assert_eq!(statistical.dates[at], start() + Duration::days(60));

    let ensemble = detector.detect(&series, DetectionMethod::Ensemble, 0.1);
    assert!(ensemble.is_outlier(60));
    assert_eq!(ensemble.method, DetectionMethod::Ensemble);
}

#[test]
fn short_series_fails_preparation() {
    let series = daily("kerosene", vec![1500.0; 10]);
    let preparer = SeriesPreparer::new(PrepareConfig::default().with_min_length(100));
    assert_eq!(
        preparer.prepare(&series).unwrap_err(),
        ForecastError::InsufficientData { needed: 100, got: 10 }
    );
}

#[test]
fn backtest_skips_origins_without_future_data() {
    init_tracing();
    let series = daily("gasoline", noisy_prices(200, 3));
    let backtester = Backtester::new(
        BacktestConfig::default()
            .with_lookbacks(vec![5, 30])
            .with_horizon(7),
    );

    let report = backtester
        .run(&series, |train, horizon| {
            let mut model = RandomWalkWithDrift::new();
            model.fit(train)?;
            model.forecast(horizon, 0.05)
        })
        .unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(report.n_origins(), 1);
    assert!(report.overall.is_some());
    assert!(report.by_lookback.contains_key(&30));
    assert!(!report.by_lookback.contains_key(&5));
    let origin = &report.origins[0];
    assert_eq!(origin.origin, 170);
    assert_eq!(origin.actual.len(), 7);
}

#[test]
fn batch_isolates_failing_units() {
    init_tracing();
    let cycle = ForecastCycle::new(
        CycleConfig::default()
            .with_horizon(10)
            .with_arima(ArimaConfig::default().with_max_orders(2, 1, 2)),
    );
    let good = UnitKey::new("seoul", "gasoline");
    let short = UnitKey::new("daegu", "diesel");
    let units = vec![
        UnitInput::new(good.clone(), daily("gasoline", noisy_prices(160, 11))),
        UnitInput::new(short.clone(), daily("diesel", noisy_prices(20, 12))),
    ];

    let report = cycle.run_batch(&units);

    assert_eq!(report.total(), 2);
    assert_eq!(report.status(&good), UnitStatus::Available);
    assert!(matches!(report.status(&short), UnitStatus::Unavailable(_)));
    assert_eq!(
        report.status(&UnitKey::new("busan", "lpg")),
        UnitStatus::Unavailable("data unavailable".to_string())
    );

    let forecast = report.get(&good).unwrap();
    assert_eq!(forecast.forecast.horizon(), 10);
    assert!((forecast.weights.values().sum::<f64>() - 1.0).abs() < 1e-9);
    assert!(forecast.forecast.values().iter().all(|v| v.is_finite()));
}
