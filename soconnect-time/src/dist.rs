//! Per-core distribution generators used by client workers to shape
//! offered load (spec §4.7 + §9 supplement). Grounded on
//! `original_source/include/sc_utils/distribution_gen.hpp`'s three
//! generator classes (`next()`/`last()` interface); the pack has no
//! `rand_distr` dependency anywhere, so exponential and normal samples are
//! drawn by inverse-transform sampling directly on top of `rand::Rng`
//! rather than pulling in a distributions crate the corpus never uses.

use rand::Rng;

/// Common interface every distribution generator implements: `next`
/// advances the generator and returns a fresh sample, `last` replays the
/// most recently generated value without advancing.
pub trait DistributionGenerator {
    fn next(&mut self) -> u64;
    fn last(&self) -> u64;
}

/// Exponential inter-arrival generator with mean `exp_mean` (in whatever
/// unit the caller treats as "time", typically nanoseconds).
pub struct ExponentialGenerator<R: Rng> {
    rng: R,
    lambda: f64,
    last_generated: u64,
}

impl<R: Rng> ExponentialGenerator<R> {
    pub fn new(rng: R, exp_mean: u64) -> Self {
        assert!(exp_mean > 0, "exponential mean must be positive");
        Self { rng, lambda: 1.0 / (exp_mean as f64), last_generated: 0 }
    }
}

impl<R: Rng> DistributionGenerator for ExponentialGenerator<R> {
    fn next(&mut self) -> u64 {
        let u: f64 = self.rng.gen_range(f64::MIN_POSITIVE..1.0);
        let sample = -u.ln() / self.lambda;
        self.last_generated = sample.ceil() as u64;
        self.last_generated
    }

    fn last(&self) -> u64 {
        self.last_generated
    }
}

/// Uniform generator over `[min, max]` inclusive.
pub struct UniformGenerator<R: Rng> {
    rng: R,
    min: u64,
    max: u64,
    last_generated: u64,
}

impl<R: Rng> UniformGenerator<R> {
    pub fn new(mut rng: R, min: u64, max: u64) -> Self {
        assert!(min <= max, "uniform generator requires min <= max");
        let last_generated = rng.gen_range(min..=max);
        Self { rng, min, max, last_generated }
    }
}

impl<R: Rng> DistributionGenerator for UniformGenerator<R> {
    fn next(&mut self) -> u64 {
        self.last_generated = self.rng.gen_range(self.min..=self.max);
        self.last_generated
    }

    fn last(&self) -> u64 {
        self.last_generated
    }
}

/// Bimodal generator: samples one of two normal modes, chosen by weighted
/// coin flip, then rounds up. Mirrors the original's two-`normal_distribution`
/// plus `discrete_distribution` selector, with a fixed stddev of `0.1` per
/// mode matching the original's hard-coded value.
pub struct BimodalGenerator<R: Rng> {
    rng: R,
    modes: [(f64, f64); 2],
    weights: [f64; 2],
    last_generated: u64,
}

impl<R: Rng> BimodalGenerator<R> {
    pub fn new(rng: R, first_modal: u64, first_prob: f64, second_modal: u64, second_prob: f64) -> Self {
        assert!(first_prob >= 0.0 && second_prob >= 0.0, "weights must be non-negative");
        Self {
            rng,
            modes: [(first_modal as f64, 0.1), (second_modal as f64, 0.1)],
            weights: [first_prob, second_prob],
            last_generated: 0,
        }
    }

    fn sample_normal(&mut self, mean: f64, stddev: f64) -> f64 {
        // Box-Muller transform.
        let u1: f64 = self.rng.gen_range(f64::MIN_POSITIVE..1.0);
        let u2: f64 = self.rng.gen_range(0.0..1.0);
        let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * core::f64::consts::PI * u2).cos();
        mean + z0 * stddev
    }
}

impl<R: Rng> DistributionGenerator for BimodalGenerator<R> {
    fn next(&mut self) -> u64 {
        let total = self.weights[0] + self.weights[1];
        let pick = self.rng.gen_range(0.0..total);
        let index = if pick < self.weights[0] { 0 } else { 1 };
        let (mean, stddev) = self.modes[index];
        let sample = self.sample_normal(mean, stddev);
        self.last_generated = sample.ceil().max(0.0) as u64;
        self.last_generated
    }

    fn last(&self) -> u64 {
        self.last_generated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn exponential_last_matches_next() {
        let mut gen = ExponentialGenerator::new(StdRng::seed_from_u64(1), 1000);
        let v = gen.next();
        assert_eq!(gen.last(), v);
    }

    #[test]
    fn uniform_stays_in_range() {
        let mut gen = UniformGenerator::new(StdRng::seed_from_u64(2), 10, 20);
        for _ in 0..100 {
            let v = gen.next();
            assert!((10..=20).contains(&v));
        }
    }

    #[test]
    fn bimodal_last_matches_next() {
        let mut gen = BimodalGenerator::new(StdRng::seed_from_u64(3), 100, 0.7, 500, 0.3);
        let v = gen.next();
        assert_eq!(gen.last(), v);
    }
}
