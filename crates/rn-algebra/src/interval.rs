//! Closed-interval probability arithmetic.

use rn_core::{ensure, Real, Result};

use crate::{in_unit_range, Probability};

/// A closed interval `[lo, hi]` bounding an imprecisely known probability.
///
/// Intermediate arithmetic may carry the endpoints outside `[0, 1]`
/// (inclusion–exclusion subtracts), so the invariant maintained here is
/// only `lo ≤ hi`; unit-range containment is checked where the engines
/// require it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    lo: Real,
    hi: Real,
}

impl Interval {
    /// Construct an interval.
    ///
    /// # Errors
    /// `InvalidInput` if `lo > hi` or either endpoint is not finite.
    pub fn new(lo: Real, hi: Real) -> Result<Self> {
        ensure!(lo.is_finite() && hi.is_finite(), "interval endpoints must be finite");
        ensure!(lo <= hi, "interval lower bound {lo} exceeds upper bound {hi}");
        Ok(Self { lo, hi })
    }

    /// The degenerate interval `[x, x]`.
    pub fn degenerate(x: Real) -> Self {
        Self { lo: x, hi: x }
    }

    /// Lower endpoint.
    pub fn lo(&self) -> Real {
        self.lo
    }

    /// Upper endpoint.
    pub fn hi(&self) -> Real {
        self.hi
    }

    /// Width `hi − lo`.
    pub fn width(&self) -> Real {
        self.hi - self.lo
    }

    /// Whether `other` is entirely contained in `self`.
    pub fn contains(&self, other: &Interval) -> bool {
        self.lo <= other.lo && other.hi <= self.hi
    }
}

impl Probability for Interval {
    fn zero() -> Self {
        Self::degenerate(0.0)
    }

    fn one() -> Self {
        Self::degenerate(1.0)
    }

    fn from_f64(x: Real) -> Self {
        Self::degenerate(x)
    }

    fn add(&self, other: &Self) -> Self {
        Self {
            lo: self.lo + other.lo,
            hi: self.hi + other.hi,
        }
    }

    fn sub(&self, other: &Self) -> Self {
        Self {
            lo: self.lo - other.hi,
            hi: self.hi - other.lo,
        }
    }

    fn mul(&self, other: &Self) -> Self {
        // Endpoints may be negative mid-expansion, so take the envelope of
        // all four products.
        let products = [
            self.lo * other.lo,
            self.lo * other.hi,
            self.hi * other.lo,
            self.hi * other.hi,
        ];
        let mut lo = products[0];
        let mut hi = products[0];
        for &p in &products[1..] {
            lo = lo.min(p);
            hi = hi.max(p);
        }
        Self { lo, hi }
    }

    fn within_unit(&self, tol: Real) -> bool {
        in_unit_range(self.lo, tol) && in_unit_range(self.hi, tol)
    }

    fn point_estimate(&self) -> Real {
        0.5 * (self.lo + self.hi)
    }
}
