//! Isolation forest over engineered price features.
//!
//! Scores follow the usual convention: `score_samples` is `-2^(-E[h(x)] / c(ψ))`,
//! so lower means more anomalous.

use crate::transform::{fill_nan, pct_change, rolling_mean, rolling_std};
use crate::utils::stats::{mean, population_std, std_dev};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Number of columns produced by [`anomaly_features`].
pub const FEATURE_COUNT: usize = 6;

/// Per-observation features: value, daily change, deviation from the 7- and
/// 30-day means, 7-day volatility and z-score.
///
/// Warm-up gaps are filled with the series mean (moving averages), the
/// series standard deviation (volatility) or zero (change).
pub fn anomaly_features(values: &[f64]) -> Vec<[f64; FEATURE_COUNT]> {
    let m = mean(values);
    let sd = std_dev(values);
    let pop_sd = population_std(values);
    let change = fill_nan(&pct_change(values), 0.0);
    let ma7 = fill_nan(&rolling_mean(values, 7), m);
    let ma30 = fill_nan(&rolling_mean(values, 30), m);
    let vol7 = fill_nan(&rolling_std(values, 7), if sd.is_finite() { sd } else { 0.0 });

    values
        .iter()
        .enumerate()
        .map(|(i, &x)| {
            let z = if pop_sd > 0.0 { (x - m) / pop_sd } else { 0.0 };
            [x, change[i], x - ma7[i], x - ma30[i], vol7[i], z]
        })
        .collect()
}

/// Average path length of an unsuccessful BST search over `n` points.
pub(crate) fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// A fitted isolation forest.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<Node>,
    sample_size: usize,
}

impl IsolationForest {
    /// Grow `n_trees` trees on subsamples of `min(subsample, n)` rows drawn
    /// without replacement; depth is limited to `ceil(log2(sample_size))`.
    pub fn fit(rows: &[[f64; FEATURE_COUNT]], n_trees: usize, subsample: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let sample_size = subsample.min(rows.len()).max(1);
        let max_depth = (sample_size as f64).log2().ceil().max(0.0) as usize;

        let trees = if rows.is_empty() {
            Vec::new()
        } else {
            (0..n_trees)
                .map(|_| {
                    let picked: Vec<usize> = sample(&mut rng, rows.len(), sample_size).into_vec();
                    grow(rows, picked, 0, max_depth, &mut rng)
                })
                .collect()
        };

        Self { trees, sample_size }
    }

    /// Negated anomaly score per row; values closer to -1 are more anomalous.
    pub fn score_samples(&self, rows: &[[f64; FEATURE_COUNT]]) -> Vec<f64> {
        let norm = average_path_length(self.sample_size);
        rows.iter()
            .map(|row| {
                if self.trees.is_empty() || norm <= 0.0 {
                    return -0.5;
                }
                let depth: f64 = self.trees.iter().map(|t| path_length(t, row, 0)).sum::<f64>()
                    / self.trees.len() as f64;
                -(2.0_f64).powf(-depth / norm)
            })
            .collect()
    }
}

fn grow(
    rows: &[[f64; FEATURE_COUNT]],
    members: Vec<usize>,
    depth: usize,
    max_depth: usize,
    rng: &mut StdRng,
) -> Node {
    if depth >= max_depth || members.len() <= 1 {
        return Node::Leaf { size: members.len() };
    }

    let ranges: Vec<(usize, f64, f64)> = (0..FEATURE_COUNT)
        .filter_map(|f| {
            let (lo, hi) = members.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                (lo.min(rows[i][f]), hi.max(rows[i][f]))
            });
            (hi > lo).then_some((f, lo, hi))
        })
        .collect();
    if ranges.is_empty() {
        return Node::Leaf { size: members.len() };
    }

    let (feature, lo, hi) = ranges[rng.gen_range(0..ranges.len())];
    let threshold = rng.gen_range(lo..hi);
    let (left, right): (Vec<usize>, Vec<usize>) =
        members.into_iter().partition(|&i| rows[i][feature] < threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(grow(rows, left, depth + 1, max_depth, rng)),
        right: Box::new(grow(rows, right, depth + 1, max_depth, rng)),
    }
}

fn path_length(node: &Node, row: &[f64; FEATURE_COUNT], depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            if row[*feature] < *threshold {
                path_length(left, row, depth + 1)
            } else {
                path_length(right, row, depth + 1)
            }
        }
    }
}

/// Indices of the `ceil(contamination·n)` most anomalous rows, ascending,
/// paired with their positive anomaly score `-score_samples`.
pub(crate) fn most_anomalous(scores: &[f64], contamination: f64) -> Vec<(usize, f64)> {
    let n = scores.len();
    // tolerance keeps products like 0.1 * 30 from rounding up a whole point
    let k = ((contamination * n as f64 - 1e-9).ceil().max(0.0) as usize).min(n);
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        scores[a]
            .partial_cmp(&scores[b])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });
    let mut picked: Vec<(usize, f64)> = order.into_iter().take(k).map(|i| (i, -scores[i])).collect();
    picked.sort_by_key(|(i, _)| *i);
    picked
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn wavy(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + 2.0 * (i as f64 * 0.3).sin()).collect()
    }

    #[test]
    fn path_length_normalizer() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        // 2(H(255)) - 2·255/256 with H approximated by ln + γ
        assert_relative_eq!(average_path_length(256), 10.2448, epsilon = 1e-3);
    }

    #[test]
    fn feature_matrix_shape_and_fill() {
        let values = wavy(40);
        let rows = anomaly_features(&values);
        assert_eq!(rows.len(), 40);
        assert_eq!(rows[0][1], 0.0);
        assert!(rows.iter().flatten().all(|v| v.is_finite()));
    }

    #[test]
    fn spike_scores_lowest() {
        let mut values = wavy(200);
        values[120] = 160.0;
        let rows = anomaly_features(&values);
        let forest = IsolationForest::fit(&rows, 100, 256, 42);
        let scores = forest.score_samples(&rows);
        assert!(scores.iter().all(|s| (-1.0..0.0).contains(s)));

        let top = most_anomalous(&scores, 0.01);
        assert_eq!(top.len(), 2);
        assert!(top.iter().any(|(i, _)| *i == 120 || *i == 121));
    }

    #[test]
    fn fixed_seed_is_deterministic() {
        let rows = anomaly_features(&wavy(80));
        let a = IsolationForest::fit(&rows, 20, 64, 42).score_samples(&rows);
        let b = IsolationForest::fit(&rows, 20, 64, 42).score_samples(&rows);
        assert_eq!(a, b);
    }

    #[test]
    fn selection_grows_with_contamination() {
        let scores = vec![-0.4, -0.7, -0.5, -0.9, -0.45];
        let small = most_anomalous(&scores, 0.2);
        let large = most_anomalous(&scores, 0.5);
        assert_eq!(small, vec![(3, 0.9)]);
        assert_eq!(large.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![1, 2, 3]);
    }
}
