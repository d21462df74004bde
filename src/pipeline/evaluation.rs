//! Backtesting a full forecast cycle.

use super::cycle::{ForecastCycle, UnitInput, UnitKey};
use crate::backtest::{BacktestConfig, BacktestReport, Backtester};
use crate::core::TimeSeries;
use crate::error::Result;
use chrono::Duration;

impl ForecastCycle {
    /// Re-run the whole cycle at every backtest origin of `input`.
    ///
    /// Each origin sees only the target and regressor history before it; the
    /// cycle horizon is replaced by the backtest horizon. Origins the cycle
    /// cannot handle (for example a training prefix shorter than the
    /// preparer's `min_length`) are counted as failed.
    pub fn backtest(&self, input: &UnitInput, config: BacktestConfig) -> Result<BacktestReport> {
        Backtester::new(config).run(&input.series, |train, horizon| {
            let cycle = ForecastCycle::new(self.config().clone().with_horizon(horizon));
            let exogenous = match train.last_date() {
                Some(last) => input
                    .exogenous
                    .iter()
                    .map(|reg| reg.before(last + Duration::days(1)))
                    .filter(|reg| !reg.is_empty())
                    .collect(),
                None => Vec::new(),
            };
            let unit = UnitInput::new(input.key.clone(), train.clone()).with_exogenous(exogenous);
            Ok(cycle.run(&unit)?.forecast)
        })
    }
}

/// Convenience wrapper around [`ForecastCycle::backtest`] for a bare series.
pub fn backtest_cycle(
    cycle: &ForecastCycle,
    key: UnitKey,
    series: &TimeSeries,
    config: BacktestConfig,
) -> Result<BacktestReport> {
    cycle.backtest(&UnitInput::new(key, series.clone()), config)
}
