//! Reproducible pseudo-random sampling
//!
//! Every random choice the simulator makes — compaction overlap counts,
//! traffic jitter, read latencies — flows through a single seeded [`SimRng`]
//! instance owned by the [`crate::simulator::Simulator`]. No code in this
//! crate reads from a thread-local or global RNG: the determinism contract
//! (same config + seed ⇒ identical trajectory) depends on that discipline.
//!
//! # Example
//!
//! ```
//! use lsmsim_engine::distributions::SimRng;
//!
//! let mut rng = SimRng::from_seed(42);
//! let x = rng.exponential(1.0);
//! assert!(x >= 0.0);
//! ```

use lsmsim_core::{LatencySpec, OverlapDistribution};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

/// The simulator's single seeded source of randomness
///
/// Wraps a [`StdRng`] seeded from the configuration's `random_seed`. All
/// distribution helpers take `&mut SimRng` rather than reading ambient
/// state.
pub struct SimRng {
    inner: StdRng,
}

impl SimRng {
    /// Creates a new RNG from the given seed
    pub fn from_seed(seed: u64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed),
        }
    }

    /// Reseeds in place, as `reset()` does for the owning simulator
    pub fn reseed(&mut self, seed: u64) {
        self.inner = StdRng::seed_from_u64(seed);
    }

    /// A uniformly distributed integer in `0..n`
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn uniform_int(&mut self, n: usize) -> usize {
        assert!(n > 0, "uniform_int requires a non-empty range");
        self.inner.gen_range(0..n)
    }

    /// A uniformly distributed float in `[0, 1)`
    pub fn uniform_float(&mut self) -> f64 {
        self.inner.gen::<f64>()
    }

    /// An exponentially distributed value, `>= 0`
    ///
    /// Uses inverse-transform sampling: `-ln(1 - U) / lambda`.
    pub fn exponential(&mut self, lambda: f64) -> f64 {
        let u = self.uniform_float();
        -(1.0 - u).ln() / lambda
    }

    /// A geometrically distributed value (number of trials to first
    /// success), `>= 1`
    pub fn geometric(&mut self, p: f64) -> u64 {
        let mut trials = 1;
        loop {
            if self.uniform_float() < p {
                return trials;
            }
            trials += 1;
        }
    }

    /// A lognormally distributed value with the given arithmetic mean and
    /// sigma of the underlying normal distribution
    ///
    /// Uses Box-Muller to sample the underlying normal, with
    /// `mu = ln(mean) - sigma^2 / 2` so the lognormal's mean matches `mean`.
    pub fn lognormal(&mut self, mean: f64, sigma: f64) -> f64 {
        if mean <= 0.0 {
            return 0.0;
        }
        let mu = mean.ln() - sigma * sigma / 2.0;
        let u1 = self.uniform_float().max(f64::MIN_POSITIVE);
        let u2 = self.uniform_float();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
        (mu + sigma * z).exp()
    }

    /// An Erlang(k, mean)-distributed value: the sum of `k` exponential
    /// draws each with mean `mean / k`
    pub fn erlang(&mut self, k: u32, mean: f64) -> f64 {
        let k = k.max(1);
        let lambda = k as f64 / mean;
        (0..k).map(|_| self.exponential(lambda)).sum()
    }

    /// Returns `x` unconditionally
    pub fn fixed(&mut self, x: f64) -> f64 {
        x
    }

    /// Samples a non-negative latency from the given spec
    pub fn sample_latency(&mut self, spec: &LatencySpec) -> f64 {
        match spec {
            LatencySpec::Fixed { mean } => self.fixed(*mean).max(0.0),
            LatencySpec::Exponential { mean } => {
                if *mean <= 0.0 {
                    0.0
                } else {
                    self.exponential(1.0 / mean)
                }
            }
            LatencySpec::Lognormal { mean, sigma } => self.lognormal(*mean, *sigma),
        }
    }
}

/// File-count selection: given a population of `n` candidate files and a
/// named overlap distribution, returns how many of them a compaction job
/// should touch.
///
/// Returns `0` when `n == 0` (there is nothing to select); otherwise returns
/// a value in `1..=n`, biased per `dist`.
pub fn file_count_selection(n: usize, dist: OverlapDistribution, rng: &mut SimRng) -> usize {
    if n == 0 {
        return 0;
    }
    let picked = match dist {
        OverlapDistribution::Uniform => rng.uniform_int(n) + 1,
        OverlapDistribution::Exponential { lambda } => {
            let sample = rng.exponential(lambda).ceil() as usize;
            sample.clamp(1, n)
        }
        OverlapDistribution::Geometric { p } => (rng.geometric(p) as usize).min(n),
        OverlapDistribution::Fixed { percentage } => {
            let sample = (n as f64 * percentage).ceil() as usize;
            sample.clamp(1, n)
        }
    };
    picked.max(1).min(n)
}

/// Chooses `k` distinct indices from `0..n` uniformly at random, via a
/// partial Fisher-Yates shuffle
///
/// The caller is expected to have already ordered the underlying population
/// by a stable key (e.g. file id) so the *positions* sampled here are
/// reproducible given the RNG stream, per the engine's iteration-determinism
/// discipline.
pub fn sample_distinct_indices(rng: &mut SimRng, n: usize, k: usize) -> Vec<usize> {
    let k = k.min(n);
    let mut pool: Vec<usize> = (0..n).collect();
    let mut chosen = Vec::with_capacity(k);
    for i in 0..k {
        let remaining = n - i;
        let j = i + rng.uniform_int(remaining);
        pool.swap(i, j);
        chosen.push(pool[i]);
    }
    chosen
}
