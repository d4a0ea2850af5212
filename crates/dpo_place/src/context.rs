//! Per-run legalization context: random number generator and displacement limits.
//!
//! Every generator receives the context explicitly, so a fixed seed
//! reproduces the same sequence of proposals. Displacement limits are only
//! changed between generator invocations, never while a proposal is staged.

use crate::db::Architecture;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Maximum distance a cell may travel from its original position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplacementLimits {
    /// Maximum horizontal displacement in database units.
    pub max_x: i64,
    /// Maximum vertical displacement in database units.
    pub max_y: i64,
}

impl DisplacementLimits {
    /// Returns `true` if moving by `(dx, dy)` stays within the limits.
    pub fn allows(&self, dx: i64, dy: i64) -> bool {
        dx.abs() <= self.max_x && dy.abs() <= self.max_y
    }
}

/// State threaded through every legalization pass.
#[derive(Debug, Clone)]
pub struct LegalizationContext {
    rng: StdRng,
    limits: DisplacementLimits,
    cap: i64,
    row_height: i64,
}

impl LegalizationContext {
    /// Creates a context for the given architecture.
    ///
    /// Displacement starts unconstrained: both limits equal twice the larger
    /// chip dimension.
    pub fn new(seed: u64, arch: &Architecture) -> Self {
        let cap = 2 * arch.chip_width().max(arch.chip_height()).max(1);
        Self {
            rng: StdRng::seed_from_u64(seed),
            limits: DisplacementLimits {
                max_x: cap,
                max_y: cap,
            },
            cap,
            row_height: arch.row_height(),
        }
    }

    /// Sets displacement limits in row-height units. A zero argument keeps
    /// the current limit for that axis. Results are clamped to the chip-wide cap.
    pub fn set_max_displacement(&mut self, x_rows: u32, y_rows: u32) {
        if x_rows != 0 {
            self.limits.max_x = (i64::from(x_rows) * self.row_height).min(self.cap);
        }
        if y_rows != 0 {
            self.limits.max_y = (i64::from(y_rows) * self.row_height).min(self.cap);
        }
    }

    /// Replaces both limits, in database units, clamped to the chip-wide cap.
    pub fn set_limits(&mut self, limits: DisplacementLimits) {
        self.limits = DisplacementLimits {
            max_x: limits.max_x.clamp(0, self.cap),
            max_y: limits.max_y.clamp(0, self.cap),
        };
    }

    /// Current displacement limits.
    pub fn limits(&self) -> DisplacementLimits {
        self.limits
    }

    /// Largest value either limit may take.
    pub fn limit_cap(&self) -> i64 {
        self.cap
    }

    /// Returns a uniformly distributed integer in `0..n`. Returns 0 when `n` is 0.
    pub fn random(&mut self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        self.rng.gen_range(0..n)
    }

    /// Returns a uniformly distributed integer in `lo..=hi`.
    pub fn random_in(&mut self, lo: i64, hi: i64) -> i64 {
        if hi <= lo {
            return lo;
        }
        self.rng.gen_range(lo..=hi)
    }

    /// Shuffles a slice in place.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }

    /// Captures the generator state so a trial run can be replayed.
    pub fn snapshot_rng(&self) -> StdRng {
        self.rng.clone()
    }

    /// Restores a state captured by [`snapshot_rng`](Self::snapshot_rng).
    pub fn restore_rng(&mut self, rng: StdRng) {
        self.rng = rng;
    }
}
