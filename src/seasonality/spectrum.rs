//! Frequency-domain analysis of daily series.

use rustfft::{num_complex::Complex64, FftPlanner};

/// A spectral peak: cycles per day, its period in days and its power `|X(f)|²`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DominantFrequency {
    pub frequency: f64,
    pub period: f64,
    pub power: f64,
}

/// Compute the FFT of a real-valued signal, keeping frequencies 0 through N/2.
pub fn fft_real(signal: &[f64]) -> Vec<Complex64> {
    let n = signal.len();
    if n == 0 {
        return Vec::new();
    }

    let mut buffer: Vec<Complex64> = signal.iter().map(|&x| Complex64::new(x, 0.0)).collect();
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    fft.process(&mut buffer);

    buffer.truncate(n / 2 + 1);
    buffer
}

/// The `top` strongest positive frequencies, then filtered to periods ≤ `max_period`.
///
/// Ranking happens before filtering, so fewer than `top` entries can be
/// returned when strong low-frequency components exceed `max_period`.
pub fn dominant_frequencies(signal: &[f64], top: usize, max_period: f64) -> Vec<DominantFrequency> {
    let n = signal.len();
    if n < 4 {
        return Vec::new();
    }
    let mut peaks: Vec<DominantFrequency> = fft_real(signal)
        .iter()
        .enumerate()
        .skip(1)
        .map(|(k, c)| {
            let frequency = k as f64 / n as f64;
            DominantFrequency {
                frequency,
                period: 1.0 / frequency,
                power: c.norm_sqr(),
            }
        })
        .collect();
    peaks.sort_by(|a, b| b.power.partial_cmp(&a.power).unwrap_or(std::cmp::Ordering::Equal));
    peaks.truncate(top);
    peaks.retain(|p| p.period <= max_period);
    peaks
}
