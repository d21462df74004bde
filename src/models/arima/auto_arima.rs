//! Automatic ARIMA and SARIMA order selection.
//!
//! Two strategies are offered: a stepwise neighbourhood search in the style
//! of Hyndman and Khandakar, and an exhaustive grid over bounded ranges.

use crate::error::{ForecastError, Result};
use crate::models::arima::model::{FittedArima, ModelOrder};
use crate::utils::stats::variance;
use std::collections::HashSet;
use tracing::debug;

/// Criterion minimized by the order search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InformationCriterion {
    #[default]
    Aic,
    Bic,
}

impl InformationCriterion {
    pub fn as_str(&self) -> &'static str {
        match self {
            InformationCriterion::Aic => "aic",
            InformationCriterion::Bic => "bic",
        }
    }

    pub fn score(&self, model: &FittedArima) -> f64 {
        match self {
            InformationCriterion::Aic => model.aic(),
            InformationCriterion::Bic => model.bic(),
        }
    }
}

/// Bounds of the order search.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSearch {
    /// Maximum non-seasonal AR order to consider.
    pub max_p: usize,
    /// Maximum non-seasonal differencing order.
    pub max_d: usize,
    /// Maximum non-seasonal MA order to consider.
    pub max_q: usize,
    /// Maximum seasonal AR order.
    pub max_cap_p: usize,
    /// Maximum seasonal differencing order.
    pub max_cap_d: usize,
    /// Maximum seasonal MA order.
    pub max_cap_q: usize,
    /// Seasonal period (0 for non-seasonal).
    pub seasonal_period: usize,
    pub criterion: InformationCriterion,
}

impl Default for OrderSearch {
    fn default() -> Self {
        Self {
            max_p: 5,
            max_d: 2,
            max_q: 5,
            max_cap_p: 2,
            max_cap_d: 1,
            max_cap_q: 2,
            seasonal_period: 0,
            criterion: InformationCriterion::Aic,
        }
    }
}

impl OrderSearch {
    /// Set maximum non-seasonal orders.
    pub fn with_max_orders(mut self, max_p: usize, max_d: usize, max_q: usize) -> Self {
        self.max_p = max_p;
        self.max_d = max_d;
        self.max_q = max_q;
        self
    }

    /// Set maximum seasonal orders.
    pub fn with_seasonal_orders(mut self, max_p: usize, max_d: usize, max_q: usize) -> Self {
        self.max_cap_p = max_p;
        self.max_cap_d = max_d;
        self.max_cap_q = max_q;
        self
    }

    pub fn with_seasonal_period(mut self, period: usize) -> Self {
        self.seasonal_period = period;
        self
    }

    pub fn with_criterion(mut self, criterion: InformationCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    fn is_seasonal(&self) -> bool {
        self.seasonal_period > 1
    }

    fn within_bounds(&self, order: &ModelOrder) -> bool {
        order.p <= self.max_p
            && order.q <= self.max_q
            && order.cap_p <= self.max_cap_p
            && order.cap_q <= self.max_cap_q
    }
}

/// Outcome of an order search.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub model: FittedArima,
    pub score: f64,
    /// Every successfully fitted order with its score, best first.
    pub scores: Vec<(ModelOrder, f64)>,
    /// Candidates whose fit failed or scored non-finite.
    pub failed: usize,
}

/// Evaluated candidates, tracking the best one.
struct Candidates<'a> {
    values: &'a [f64],
    criterion: InformationCriterion,
    visited: HashSet<ModelOrder>,
    scores: Vec<(ModelOrder, f64)>,
    failed: usize,
    best: Option<(FittedArima, f64)>,
}

impl<'a> Candidates<'a> {
    fn new(values: &'a [f64], criterion: InformationCriterion) -> Self {
        Self {
            values,
            criterion,
            visited: HashSet::new(),
            scores: Vec::new(),
            failed: 0,
            best: None,
        }
    }

    /// Fit `order` once; true if it became the new best.
    fn evaluate(&mut self, order: ModelOrder) -> bool {
        if !self.visited.insert(order) {
            return false;
        }
        let model = match FittedArima::fit(self.values, order) {
            Ok(model) => model,
            Err(err) => {
                debug!(%order, error = %err, "candidate order failed");
                self.failed += 1;
                return false;
            }
        };
        let score = self.criterion.score(&model);
        if !score.is_finite() {
            self.failed += 1;
            return false;
        }
        self.scores.push((order, score));
        let improved = self.best.as_ref().map_or(true, |(_, best)| score < *best);
        if improved {
            self.best = Some((model, score));
        }
        improved
    }

    fn best_order(&self) -> Option<ModelOrder> {
        self.best.as_ref().map(|(m, _)| m.order())
    }

    fn finish(self) -> Result<SearchResult> {
        let tried = self.visited.len();
        let Candidates {
            mut scores,
            failed,
            best,
            ..
        } = self;
        let (model, score) = best.ok_or_else(|| {
            ForecastError::FitConvergence(format!("all {tried} candidate orders failed"))
        })?;
        scores.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(SearchResult {
            model,
            score,
            scores,
            failed,
        })
    }
}

/// Stepwise search with fixed differencing orders `d` and `cap_d`.
///
/// Starts from (2,d,2), (0,d,0), (1,d,0) and (0,d,1) (with seasonal
/// (1,D,1), (0,D,0), (1,D,0), (0,D,1) when seasonal) and moves to the best
/// neighbour differing by one in p, q, P or Q, or in p and q together,
/// until no neighbour improves the criterion.
pub fn stepwise_search(values: &[f64], d: usize, cap_d: usize, search: &OrderSearch) -> Result<SearchResult> {
    let s = if search.is_seasonal() { search.seasonal_period } else { 0 };
    let cap_d = if s > 0 { cap_d } else { 0 };
    let order = |p: usize, q: usize, cap_p: usize, cap_q: usize| {
        ModelOrder::seasonal(
            p.min(search.max_p),
            d,
            q.min(search.max_q),
            cap_p.min(search.max_cap_p),
            cap_d,
            cap_q.min(search.max_cap_q),
            s,
        )
    };
    let seeds = if s > 0 {
        [order(2, 2, 1, 1), order(0, 0, 0, 0), order(1, 0, 1, 0), order(0, 1, 0, 1)]
    } else {
        [order(2, 2, 0, 0), order(0, 0, 0, 0), order(1, 0, 0, 0), order(0, 1, 0, 0)]
    };

    let mut candidates = Candidates::new(values, search.criterion);
    for seed in seeds {
        candidates.evaluate(seed);
    }

    while let Some(current) = candidates.best_order() {
        let moved = neighbours(current, s > 0)
            .into_iter()
            .filter(|o| search.within_bounds(o))
            .any(|o| candidates.evaluate(o));
        if !moved {
            break;
        }
    }

    let result = candidates.finish()?;
    debug!(
        order = %result.model.order(),
        criterion = search.criterion.as_str(),
        score = result.score,
        fitted = result.scores.len(),
        failed = result.failed,
        "stepwise order search finished"
    );
    Ok(result)
}

fn neighbours(o: ModelOrder, seasonal: bool) -> Vec<ModelOrder> {
    let shift = |v: usize, delta: i64| -> Option<usize> { v.checked_add_signed(delta as isize) };
    let mut out = Vec::new();
    for delta in [-1_i64, 1] {
        if let Some(p) = shift(o.p, delta) {
            out.push(ModelOrder { p, ..o });
        }
        if let Some(q) = shift(o.q, delta) {
            out.push(ModelOrder { q, ..o });
        }
        if let (Some(p), Some(q)) = (shift(o.p, delta), shift(o.q, delta)) {
            out.push(ModelOrder { p, q, ..o });
        }
        if seasonal {
            if let Some(cap_p) = shift(o.cap_p, delta) {
                out.push(ModelOrder { cap_p, ..o });
            }
            if let Some(cap_q) = shift(o.cap_q, delta) {
                out.push(ModelOrder { cap_q, ..o });
            }
        }
    }
    out
}

/// Exhaustive grid over `p ≤ max_p`, `d ≤ max_d`, `q ≤ max_q`.
///
/// When the search is seasonal every candidate carries the fixed seasonal
/// order `(P, D, Q)`.
pub fn grid_search(values: &[f64], search: &OrderSearch, seasonal_order: (usize, usize, usize)) -> Result<SearchResult> {
    let s = if search.is_seasonal() { search.seasonal_period } else { 0 };
    let (cap_p, cap_d, cap_q) = if s > 0 { seasonal_order } else { (0, 0, 0) };

    let mut candidates = Candidates::new(values, search.criterion);
    for p in 0..=search.max_p {
        for d in 0..=search.max_d {
            for q in 0..=search.max_q {
                candidates.evaluate(ModelOrder::seasonal(p, d, q, cap_p, cap_d, cap_q, s));
            }
        }
    }

    let result = candidates.finish()?;
    debug!(
        order = %result.model.order(),
        criterion = search.criterion.as_str(),
        score = result.score,
        fitted = result.scores.len(),
        failed = result.failed,
        "grid order search finished"
    );
    Ok(result)
}

/// Suggest one seasonal difference when it cuts the variance by 30% or more.
pub fn seasonal_differencing(values: &[f64], period: usize) -> usize {
    if period < 2 || values.len() < 2 * period {
        return 0;
    }
    let seasonal_diffs: Vec<f64> = (period..values.len())
        .map(|i| values[i] - values[i - period])
        .collect();
    if variance(&seasonal_diffs) < variance(values) * 0.7 {
        1
    } else {
        0
    }
}
