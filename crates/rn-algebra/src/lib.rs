//! # rn-algebra
//!
//! The probability scalar abstraction and its three interchangeable
//! implementations: plain floats, closed intervals, and p-boxes.
//!
//! The inference engines are written once, generically over the
//! [`Probability`] trait; an analysis selects its algebra by instantiating
//! the engine at one of the concrete types.  All operations are total:
//! intermediate values of inclusion–exclusion expansions may legitimately
//! leave `[0, 1]`, so range checking happens only at the points the engines
//! choose, via [`Probability::within_unit`], and never by clamping.
//!
//! # Modules
//!
//! * [`interval`] — closed-interval arithmetic ([`Interval`])
//! * [`pbox`] — discretized probability-box arithmetic ([`PBox`])
//! * [`combinators`] — `product` and the signed-subset
//!   [`inclusion_exclusion`] expansion shared by the engines

#![warn(missing_docs)]
#![forbid(unsafe_code)]

use std::fmt::Debug;

use num_traits::Float;
use rn_core::Real;

pub mod combinators;
pub mod interval;
pub mod pbox;

pub use combinators::{inclusion_exclusion, product};
pub use interval::Interval;
pub use pbox::PBox;

/// A probability scalar.
///
/// The engines require `zero`/`one`, ring operations, the complement
/// `1 − a`, and a containment check against `[0, 1]` with tolerance.
/// Implementations must make all operations total and deterministic.
pub trait Probability: Clone + Debug + PartialEq + Send + Sync + 'static {
    /// The additive identity, representing an impossible event.
    fn zero() -> Self;

    /// The multiplicative identity, representing a certain event.
    fn one() -> Self;

    /// Embed a point probability.
    fn from_f64(x: Real) -> Self;

    /// Sum of two scalars.
    fn add(&self, other: &Self) -> Self;

    /// Difference of two scalars.  Used only inside expressions whose final
    /// value is a valid probability (inclusion–exclusion).
    fn sub(&self, other: &Self) -> Self;

    /// Product of two scalars, assuming independence.
    fn mul(&self, other: &Self) -> Self;

    /// The complement `1 − a`.
    fn complement(&self) -> Self {
        Self::one().sub(self)
    }

    /// Whether the scalar lies in `[0, 1]`, allowing `tol` of rounding
    /// drift on either side.
    fn within_unit(&self, tol: Real) -> bool;

    /// A representative point value, used for diagnostics and for coupling
    /// into the real-valued reliability rate model.
    fn point_estimate(&self) -> Real;

    /// Heap bytes owned by one scalar, for memory budgeting.  Zero for
    /// inline representations.
    fn heap_footprint(&self) -> usize {
        0
    }
}

/// Containment in `[0, 1]` with symmetric tolerance, shared by the
/// concrete algebras.
pub(crate) fn in_unit_range<F: Float>(x: F, tol: F) -> bool {
    x >= -tol && x <= F::one() + tol
}

impl Probability for Real {
    fn zero() -> Self {
        0.0
    }

    fn one() -> Self {
        1.0
    }

    fn from_f64(x: Real) -> Self {
        x
    }

    fn add(&self, other: &Self) -> Self {
        self + other
    }

    fn sub(&self, other: &Self) -> Self {
        self - other
    }

    fn mul(&self, other: &Self) -> Self {
        self * other
    }

    fn within_unit(&self, tol: Real) -> bool {
        in_unit_range(*self, tol)
    }

    fn point_estimate(&self) -> Real {
        *self
    }
}
