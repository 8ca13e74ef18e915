//! Sampling helpers over the kernel's master RNG.
//!
//! Gaussian and log-normal draws use the Box–Muller transform so the
//! whole simulation runs off one seeded `ChaCha8Rng` stream.

use rand::Rng;

/// One standard-normal sample via Box–Muller.
pub fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Normal sample with the given mean and standard deviation.
pub fn normal<R: Rng>(rng: &mut R, mean: f64, std_dev: f64) -> f64 {
    mean + std_dev * standard_normal(rng)
}

/// Normal sample clamped to a range. Traits are drawn this way: a
/// truncated normal centered in [0, 1].
pub fn normal_clamped<R: Rng>(rng: &mut R, mean: f64, std_dev: f64, lo: f64, hi: f64) -> f64 {
    normal(rng, mean, std_dev).clamp(lo, hi)
}

/// Log-normal sample: exp(N(log_mean, log_std)).
pub fn log_normal<R: Rng>(rng: &mut R, log_mean: f64, log_std: f64) -> f64 {
    normal(rng, log_mean, log_std).exp()
}

/// Sample from a piecewise-constant density over contiguous brackets.
/// `boundaries` has one more element than `weights`. Used for the initial
/// age pyramid.
pub fn piecewise_constant<R: Rng>(rng: &mut R, boundaries: &[f64], weights: &[f64]) -> f64 {
    debug_assert_eq!(boundaries.len(), weights.len() + 1);
    let total: f64 = weights.iter().sum();
    let mut target = rng.gen_range(0.0..total);
    for (i, &w) in weights.iter().enumerate() {
        if target < w || i == weights.len() - 1 {
            return rng.gen_range(boundaries[i]..boundaries[i + 1]);
        }
        target -= w;
    }
    boundaries[0]
}

/// Weighted index sample proportional to `weights` (all non-negative).
/// Degenerate all-zero weights fall back to uniform.
pub fn weighted_index<R: Rng>(rng: &mut R, weights: &[f64]) -> usize {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return rng.gen_range(0..weights.len());
    }
    let mut target = rng.gen_range(0.0..total);
    for (i, &w) in weights.iter().enumerate() {
        if target < w {
            return i;
        }
        target -= w;
    }
    weights.len() - 1
}
