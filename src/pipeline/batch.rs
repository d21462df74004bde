//! Parallel batch driver over many units.

use super::cycle::{ForecastCycle, UnitForecast, UnitInput, UnitKey};
use crate::error::ForecastError;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

/// Serving-side availability of one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitStatus {
    Available,
    Unavailable(String),
}

/// Outcome of a batch run. Every distinct input key lands in exactly one map.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub successes: BTreeMap<UnitKey, UnitForecast>,
    pub failures: BTreeMap<UnitKey, ForecastError>,
    /// Keys submitted more than once; only the first input was run.
    pub duplicates: Vec<UnitKey>,
}

impl BatchReport {
    /// Availability of `key`; units never submitted are "data unavailable".
    pub fn status(&self, key: &UnitKey) -> UnitStatus {
        if self.successes.contains_key(key) {
            UnitStatus::Available
        } else if let Some(err) = self.failures.get(key) {
            UnitStatus::Unavailable(err.to_string())
        } else {
            UnitStatus::Unavailable("data unavailable".to_string())
        }
    }

    pub fn get(&self, key: &UnitKey) -> Option<&UnitForecast> {
        self.successes.get(key)
    }

    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len()
    }
}

/// Run `cycle` for every unit in parallel.
///
/// A failing unit is recorded with its error and never affects the others.
/// When a key appears more than once the first input is run and the later
/// ones are skipped with a warning.
pub fn run_batch(cycle: &ForecastCycle, units: &[UnitInput]) -> BatchReport {
    let mut report = BatchReport::default();
    let mut seen = BTreeSet::new();
    let mut distinct = Vec::with_capacity(units.len());
    for unit in units {
        if seen.insert(&unit.key) {
            distinct.push(unit);
        } else {
            warn!(unit = %unit.key, "duplicate unit key, later input skipped");
            report.duplicates.push(unit.key.clone());
        }
    }

    let outcomes: Vec<(UnitKey, Result<UnitForecast, ForecastError>)> = distinct
        .par_iter()
        .map(|unit| (unit.key.clone(), cycle.run(unit)))
        .collect();

    for (key, outcome) in outcomes {
        match outcome {
            Ok(forecast) => {
                report.successes.insert(key, forecast);
            }
            Err(err) => {
                warn!(unit = %key, kind = err.kind(), error = %err, "unit forecast failed");
                report.failures.insert(key, err);
            }
        }
    }

    info!(
        units = units.len(),
        succeeded = report.successes.len(),
        failed = report.failures.len(),
        duplicates = report.duplicates.len(),
        "batch finished"
    );
    report
}

impl ForecastCycle {
    /// See [`run_batch`].
    pub fn run_batch(&self, units: &[UnitInput]) -> BatchReport {
        run_batch(self, units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TimeSeries;
    use crate::models::arima::ArimaConfig;
    use crate::pipeline::CycleConfig;
    use chrono::NaiveDate;

    fn unit(region: &str, n: usize) -> UnitInput {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let values = (0..n)
            .map(|i| 1600.0 + 0.2 * i as f64 + 3.0 * ((i % 7) as f64 - 3.0))
            .collect();
        UnitInput::new(UnitKey::new(region, "gasoline"), TimeSeries::daily(start, values).unwrap())
    }

    fn cycle() -> ForecastCycle {
        ForecastCycle::new(
            CycleConfig::default()
                .with_horizon(7)
                .with_arima(ArimaConfig::default().with_max_orders(1, 1, 1)),
        )
    }

    #[test]
    fn failing_unit_does_not_abort_batch() {
        let units = vec![unit("seoul", 150), unit("jeju", 20), unit("busan", 140)];
        let report = cycle().run_batch(&units);

        assert_eq!(report.total(), 3);
        assert_eq!(report.successes.len(), 2);
        let jeju = UnitKey::new("jeju", "gasoline");
        assert!(matches!(
            report.failures.get(&jeju),
            Some(ForecastError::InsufficientData { .. })
        ));
        assert_eq!(report.status(&UnitKey::new("seoul", "gasoline")), UnitStatus::Available);
        assert!(report.get(&UnitKey::new("busan", "gasoline")).is_some());
    }

    #[test]
    fn duplicate_key_keeps_first_input() {
        // same key twice: the short second input would fail if it were run
        let units = vec![unit("ulsan", 150), unit("ulsan", 20)];
        let report = cycle().run_batch(&units);

        let key = UnitKey::new("ulsan", "gasoline");
        assert_eq!(report.total(), 1);
        assert_eq!(report.status(&key), UnitStatus::Available);
        assert!(report.failures.is_empty());
        assert_eq!(report.duplicates, vec![key]);
    }

    #[test]
    fn unknown_unit_is_data_unavailable() {
        let report = run_batch(&cycle(), &[]);
        assert_eq!(
            report.status(&UnitKey::new("sejong", "diesel")),
            UnitStatus::Unavailable("data unavailable".to_string())
        );
    }
}
