//! Baseline forecasting models.
//!
//! Simple methods that serve as benchmarks and ensemble anchors.

mod random_walk;

pub use random_walk::RandomWalkWithDrift;
