//! Discretized probability-box arithmetic.
//!
//! A p-box is a pair of CDF bounds `(F̲, F̄)` with `F̲ ≤ F̄`.  This module
//! represents each bound by its quantile samples on a fixed grid: `lower[i]`
//! is the i-th quantile of the "as small as possible" extreme (drawn from
//! `F̄`) and `upper[i]` the i-th quantile of the "as large as possible"
//! extreme (drawn from `F̲`).  Both sample vectors are non-decreasing with
//! `lower[i] ≤ upper[i]`.
//!
//! Binary operations assume independence and work by forming all pairwise
//! combinations of the operands' samples, then condensing the sorted pool
//! back to the working resolution outward (first element of each block for
//! the lower bound, last for the upper), so the result always encloses the
//! operation on the underlying distributions at the chosen resolution.

use rn_core::{ensure, Real, Result};

use crate::{in_unit_range, Probability};

/// Default quantile-grid resolution for non-degenerate p-boxes.
pub const DEFAULT_RESOLUTION: usize = 32;

/// A discretized probability box.
#[derive(Debug, Clone, PartialEq)]
pub struct PBox {
    lower: Vec<Real>,
    upper: Vec<Real>,
}

impl PBox {
    /// Construct from explicit quantile samples.
    ///
    /// # Errors
    /// `InvalidInput` if the vectors are empty, have different lengths, are
    /// not non-decreasing, or violate `lower[i] ≤ upper[i]`.
    pub fn new(lower: Vec<Real>, upper: Vec<Real>) -> Result<Self> {
        ensure!(!lower.is_empty(), "p-box needs at least one quantile sample");
        ensure!(
            lower.len() == upper.len(),
            "p-box bounds must have equal resolution ({} vs {})",
            lower.len(),
            upper.len()
        );
        for w in lower.windows(2) {
            ensure!(w[0] <= w[1], "p-box lower quantiles must be non-decreasing");
        }
        for w in upper.windows(2) {
            ensure!(w[0] <= w[1], "p-box upper quantiles must be non-decreasing");
        }
        for (l, u) in lower.iter().zip(&upper) {
            ensure!(l <= u, "p-box lower quantile {l} exceeds upper quantile {u}");
        }
        Ok(Self { lower, upper })
    }

    /// The point-mass p-box at `x`.
    pub fn point(x: Real) -> Self {
        Self {
            lower: vec![x],
            upper: vec![x],
        }
    }

    /// The p-box of a value known only to lie in `[lo, hi]`.
    ///
    /// # Errors
    /// `InvalidInput` if `lo > hi`.
    pub fn from_bounds(lo: Real, hi: Real) -> Result<Self> {
        ensure!(lo <= hi, "p-box bound {lo} exceeds {hi}");
        Ok(Self {
            lower: vec![lo],
            upper: vec![hi],
        })
    }

    /// Lower-bound quantile samples.
    pub fn lower(&self) -> &[Real] {
        &self.lower
    }

    /// Upper-bound quantile samples.
    pub fn upper(&self) -> &[Real] {
        &self.upper
    }

    /// Grid resolution.
    pub fn resolution(&self) -> usize {
        self.lower.len()
    }

    /// The enclosing interval `[lower min, upper max]`.
    pub fn bounds(&self) -> (Real, Real) {
        (self.lower[0], *self.upper.last().expect("non-empty"))
    }

    /// Apply a binary operation pairwise under independence and condense.
    fn combine(&self, other: &Self, op: impl Fn(Real, Real) -> Real + Copy) -> Self {
        let target = self
            .resolution()
            .max(other.resolution())
            .min(DEFAULT_RESOLUTION);

        // Endpoints may be negative mid-expansion, so each pairwise cell
        // contributes its own envelope across the four bound combinations.
        let mut lower_pool = Vec::with_capacity(self.resolution() * other.resolution());
        let mut upper_pool = Vec::with_capacity(self.resolution() * other.resolution());
        for i in 0..self.resolution() {
            for j in 0..other.resolution() {
                let cell = [
                    op(self.lower[i], other.lower[j]),
                    op(self.lower[i], other.upper[j]),
                    op(self.upper[i], other.lower[j]),
                    op(self.upper[i], other.upper[j]),
                ];
                let mut lo = cell[0];
                let mut hi = cell[0];
                for &c in &cell[1..] {
                    lo = lo.min(c);
                    hi = hi.max(c);
                }
                lower_pool.push(lo);
                upper_pool.push(hi);
            }
        }
        Self {
            lower: condense_down(lower_pool, target),
            upper: condense_up(upper_pool, target),
        }
    }
}

/// Sort and condense a sample pool to `target` samples, rounding each block
/// down (keep the first element), so the result under-approximates.
fn condense_down(mut pool: Vec<Real>, target: usize) -> Vec<Real> {
    pool.sort_by(|a, b| a.partial_cmp(b).expect("finite samples"));
    let m = pool.len();
    (0..target).map(|i| pool[i * m / target]).collect()
}

/// Sort and condense a sample pool to `target` samples, rounding each block
/// up (keep the last element), so the result over-approximates.
fn condense_up(mut pool: Vec<Real>, target: usize) -> Vec<Real> {
    pool.sort_by(|a, b| a.partial_cmp(b).expect("finite samples"));
    let m = pool.len();
    (0..target).map(|i| pool[(i + 1) * m / target - 1]).collect()
}

impl Probability for PBox {
    fn zero() -> Self {
        Self::point(0.0)
    }

    fn one() -> Self {
        Self::point(1.0)
    }

    fn from_f64(x: Real) -> Self {
        Self::point(x)
    }

    fn add(&self, other: &Self) -> Self {
        self.combine(other, |a, b| a + b)
    }

    fn sub(&self, other: &Self) -> Self {
        // Subtraction pairs this bound with the opposite bound of the
        // operand; the per-cell envelope in `combine` covers that.
        self.combine(other, |a, b| a - b)
    }

    fn mul(&self, other: &Self) -> Self {
        self.combine(other, |a, b| a * b)
    }

    fn complement(&self) -> Self {
        // 1 − x reverses the quantile order and swaps the bounds.
        let lower: Vec<Real> = self.upper.iter().rev().map(|u| 1.0 - u).collect();
        let upper: Vec<Real> = self.lower.iter().rev().map(|l| 1.0 - l).collect();
        Self { lower, upper }
    }

    fn within_unit(&self, tol: Real) -> bool {
        let (lo, hi) = self.bounds();
        in_unit_range(lo, tol) && in_unit_range(hi, tol)
    }

    fn point_estimate(&self) -> Real {
        let n = self.resolution() as Real;
        let mean_lower: Real = self.lower.iter().sum::<Real>() / n;
        let mean_upper: Real = self.upper.iter().sum::<Real>() / n;
        0.5 * (mean_lower + mean_upper)
    }

    fn heap_footprint(&self) -> usize {
        (self.lower.capacity() + self.upper.capacity()) * std::mem::size_of::<Real>()
    }
}
