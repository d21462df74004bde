//! Classification of unusual price movements into market-event categories.
//!
//! Categories overlap: one date may appear under several of them.

use crate::core::TimeSeries;
use crate::transform::{pct_change, rolling_std};
use crate::utils::stats::{mean, median, quantile};
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeMap;

/// Market-event category of an anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AnomalyLabel {
    /// Sharp rise followed by sustained increases.
    GeopoliticalTension,
    /// Sharp fall followed by a partial recovery.
    MarketCrash,
    /// Persistent week-long climb.
    SupplyDisruption,
    /// Large deviation from the calendar-month mean.
    DemandShock,
    /// Volatility of daily changes in its top percentile.
    VolatilityAnomaly,
}

impl AnomalyLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyLabel::GeopoliticalTension => "geopolitical_tension",
            AnomalyLabel::MarketCrash => "market_crash",
            AnomalyLabel::SupplyDisruption => "supply_disruption",
            AnomalyLabel::DemandShock => "demand_shock",
            AnomalyLabel::VolatilityAnomaly => "volatility_anomaly",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnomalyEvent {
    pub date: NaiveDate,
    pub label: AnomalyLabel,
    /// Non-negative magnitude; its unit depends on the label.
    pub severity: f64,
}

/// Anomalies grouped by category.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnomalyProfile {
    pub geopolitical_events: Vec<AnomalyEvent>,
    pub market_crashes: Vec<AnomalyEvent>,
    pub supply_disruptions: Vec<AnomalyEvent>,
    pub demand_shocks: Vec<AnomalyEvent>,
    pub technical_anomalies: Vec<AnomalyEvent>,
}

impl AnomalyProfile {
    pub fn total(&self) -> usize {
        self.geopolitical_events.len()
            + self.market_crashes.len()
            + self.supply_disruptions.len()
            + self.demand_shocks.len()
            + self.technical_anomalies.len()
    }

    /// Every event, ordered by date then label.
    pub fn all_events(&self) -> Vec<AnomalyEvent> {
        let mut events: Vec<AnomalyEvent> = self
            .geopolitical_events
            .iter()
            .chain(&self.market_crashes)
            .chain(&self.supply_disruptions)
            .chain(&self.demand_shocks)
            .chain(&self.technical_anomalies)
            .copied()
            .collect();
        events.sort_by(|a, b| a.date.cmp(&b.date).then(a.label.cmp(&b.label)));
        events
    }
}

/// Classify anomalous movements of `series` into the five categories.
pub fn analyze_anomaly_patterns(series: &TimeSeries) -> AnomalyProfile {
    let changes: Vec<(NaiveDate, f64)> = series
        .dates()
        .iter()
        .copied()
        .zip(pct_change(series.values()))
        .filter(|(_, c)| c.is_finite())
        .collect();

    AnomalyProfile {
        geopolitical_events: geopolitical_events(&changes),
        market_crashes: market_crashes(&changes),
        supply_disruptions: supply_disruptions(&changes),
        demand_shocks: demand_shocks(series),
        technical_anomalies: volatility_anomalies(&changes),
    }
}

/// Changes dated within `[from, from + days]`.
fn window_after(changes: &[(NaiveDate, f64)], start: usize, days: i64) -> Vec<f64> {
    let from = changes[start].0;
    let until = from + Duration::days(days);
    changes[start..]
        .iter()
        .take_while(|(d, _)| *d <= until)
        .map(|(_, c)| *c)
        .collect()
}

fn geopolitical_events(changes: &[(NaiveDate, f64)]) -> Vec<AnomalyEvent> {
    changes
        .iter()
        .enumerate()
        .filter(|(_, (_, c))| *c > 0.03)
        .filter_map(|(i, &(date, c))| {
            let window = window_after(changes, i, 5);
            (window.len() >= 3 && mean(&window) > 0.01).then_some(AnomalyEvent {
                date,
                label: AnomalyLabel::GeopoliticalTension,
                severity: c,
            })
        })
        .collect()
}

fn market_crashes(changes: &[(NaiveDate, f64)]) -> Vec<AnomalyEvent> {
    changes
        .iter()
        .enumerate()
        .filter(|(_, (_, c))| *c < -0.05)
        .filter_map(|(i, &(date, c))| {
            let window = window_after(changes, i, 10);
            let recovery: f64 = window.iter().filter(|c| **c > 0.0).sum();
            (window.len() >= 5 && recovery > 0.02).then_some(AnomalyEvent {
                date,
                label: AnomalyLabel::MarketCrash,
                severity: c.abs(),
            })
        })
        .collect()
}

/// Seven trailing changes with at least five rises and a cumulative gain above 5%,
/// dated at the following change.
fn supply_disruptions(changes: &[(NaiveDate, f64)]) -> Vec<AnomalyEvent> {
    (7..changes.len())
        .filter_map(|i| {
            let week = &changes[i - 7..i];
            let rises = week.iter().filter(|(_, c)| *c > 0.0).count();
            let cumulative: f64 = week.iter().map(|(_, c)| c).sum();
            (rises >= 5 && cumulative > 0.05).then_some(AnomalyEvent {
                date: changes[i].0,
                label: AnomalyLabel::SupplyDisruption,
                severity: cumulative,
            })
        })
        .collect()
}

fn demand_shocks(series: &TimeSeries) -> Vec<AnomalyEvent> {
    let mut by_month: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
    for (d, &v) in series.dates().iter().zip(series.values()) {
        if v.is_finite() {
            let e = by_month.entry(d.month()).or_insert((0.0, 0));
            e.0 += v;
            e.1 += 1;
        }
    }

    series
        .dates()
        .iter()
        .zip(series.values())
        .filter_map(|(&date, &v)| {
            let (sum, count) = by_month.get(&date.month())?;
            let month_mean = sum / *count as f64;
            if month_mean == 0.0 || !v.is_finite() {
                return None;
            }
            let deviation = (v - month_mean).abs() / month_mean.abs();
            (deviation > 0.08).then_some(AnomalyEvent {
                date,
                label: AnomalyLabel::DemandShock,
                severity: deviation,
            })
        })
        .collect()
}

/// Severity is the volatility over its median (the raw volatility when the median is zero).
fn volatility_anomalies(changes: &[(NaiveDate, f64)]) -> Vec<AnomalyEvent> {
    let values: Vec<f64> = changes.iter().map(|(_, c)| *c).collect();
    let vol = rolling_std(&values, 7);
    let finite: Vec<f64> = vol.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return Vec::new();
    }
    let threshold = quantile(&finite, 0.95);
    let typical = median(&finite);

    vol.iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite() && **v > threshold)
        .map(|(i, &v)| AnomalyEvent {
            date: changes[i].0,
            label: AnomalyLabel::VolatilityAnomaly,
            severity: if typical > 0.0 { v / typical } else { v },
        })
        .collect()
}
