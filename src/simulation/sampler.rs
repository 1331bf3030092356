//! Score samplers for the Monte Carlo trials

use rand::Rng;

use crate::config::ScoreDistribution;

/// Expected scores below this are lifted before sampling
pub const MIN_EXPECTED_SCORE: f64 = 0.5;

/// Above this rate Knuth's method is slow and the normal approximation is tight
const POISSON_NORMAL_CUTOFF: f64 = 30.0;

/// Draw one side's score
pub fn sample_score<R: Rng + ?Sized>(
    distribution: ScoreDistribution,
    mean: f64,
    std_dev: f64,
    rng: &mut R,
) -> f64 {
    let mean = mean.max(MIN_EXPECTED_SCORE);
    match distribution {
        ScoreDistribution::Poisson => poisson(mean, rng) as f64,
        ScoreDistribution::Normal => normal(mean, std_dev, rng).round(),
    }
}

/// Poisson draw (Knuth), normal approximation for large rates
pub fn poisson<R: Rng + ?Sized>(lambda: f64, rng: &mut R) -> u32 {
    if lambda > POISSON_NORMAL_CUTOFF {
        return normal(lambda, lambda.sqrt(), rng).round().max(0.0) as u32;
    }
    let limit = (-lambda).exp();
    let mut k = 0u32;
    let mut p = 1.0;
    loop {
        p *= rng.gen::<f64>();
        if p <= limit {
            return k;
        }
        k += 1;
    }
}

/// Box-Muller normal draw
pub fn normal<R: Rng + ?Sized>(mean: f64, std_dev: f64, rng: &mut R) -> f64 {
    // gen() is in [0, 1); flip it so ln never sees 0
    let u1 = 1.0 - rng.gen::<f64>();
    let u2 = rng.gen::<f64>();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + std_dev.max(0.0) * z
}

/// Value at index floor(n * q) of an ascending slice
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64 * q).floor() as usize).min(sorted.len() - 1);
    sorted[idx]
}
