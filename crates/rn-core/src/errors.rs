//! Error types for reachnet-rs.
//!
//! The whole workspace reports failures through a single `thiserror`-derived
//! enum with one variant per error code in the analysis contract.  The
//! `ensure!`, `invariant!`, and `fail!` convenience macros defined here cover
//! the three recurring cases: caller-side input validation, engine-side
//! invariant checks, and unconditional internal failures.

use thiserror::Error;

use crate::{NodeId, Real};

/// The top-level error type used throughout reachnet-rs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// Malformed caller input: bad graph structure, out-of-range scalars,
    /// missing parameters.  Reported eagerly during validation; no
    /// computation is started.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A cycle was detected where a DAG is required.  Carries the nodes
    /// left unplaced when the layering queue drained.
    #[error("not a DAG: {remaining} node(s) remain on a cycle (e.g. node {witness})")]
    NotADag {
        /// Number of nodes that could not be assigned to an iteration set.
        remaining: usize,
        /// One of the offending nodes, for reproducibility.
        witness: NodeId,
    },

    /// A conditioning requirement exceeds its configured cap.
    #[error("conditioning too large at node {node}: {what} {size} exceeds limit {limit}")]
    ConditioningTooLarge {
        /// The join node whose diamond triggered the failure.
        node: NodeId,
        /// Which quantity blew up ("conditioning set", "union terms",
        /// "recursion depth").
        what: &'static str,
        /// The observed size.
        size: usize,
        /// The configured limit.
        limit: usize,
    },

    /// The discrete timestep violates `dt · max(λ_eff, μ) < 1`.
    #[error(
        "timestep too large at node {node}: dt = {dt} with rate {rate} \
         (need dt ≤ {dt_max})"
    )]
    TimestepTooLarge {
        /// The node at which the bound failed.
        node: NodeId,
        /// The offending effective rate.
        rate: Real,
        /// The requested timestep.
        dt: Real,
        /// The recommended maximum timestep, `0.99 / max_rate`.
        dt_max: Real,
    },

    /// A probability drifted outside the algebra's valid range by more than
    /// the configured tolerance, or conservation failed.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// The pre-allocation memory estimate exceeds the configured budget.
    #[error("out of budget: analysis needs ≈{required} bytes, limit is {limit}")]
    OutOfBudget {
        /// Estimated bytes required.
        required: usize,
        /// Configured limit in bytes.
        limit: usize,
    },

    /// Cancellation was requested and observed at a safe point.
    #[error("analysis cancelled")]
    Cancelled,

    /// An internal invariant broke.  Indicates a bug in the engine.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Shorthand `Result` type used throughout reachnet-rs.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Input-validation guard.
///
/// Returns `Err(Error::InvalidInput(...))` if `$cond` is false.
///
/// # Example
/// ```
/// use rn_core::ensure;
/// fn prior_in_range(p: f64) -> rn_core::Result<f64> {
///     ensure!((0.0..=1.0).contains(&p), "prior {p} outside [0, 1]");
///     Ok(p)
/// }
/// assert!(prior_in_range(0.5).is_ok());
/// assert!(prior_in_range(1.5).is_err());
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($msg:tt)*) => {
        if !$cond {
            return Err($crate::errors::Error::InvalidInput(
                format!($($msg)*)
            ));
        }
    };
}

/// Engine-side invariant guard.
///
/// Returns `Err(Error::InvariantViolation(...))` if `$cond` is false.
///
/// # Example
/// ```
/// use rn_core::invariant;
/// fn check_sum(total: f64, tol: f64) -> rn_core::Result<()> {
///     invariant!((total - 1.0).abs() <= tol, "state sum {total} not 1");
///     Ok(())
/// }
/// assert!(check_sum(1.0, 1e-9).is_ok());
/// assert!(check_sum(0.9, 1e-9).is_err());
/// ```
#[macro_export]
macro_rules! invariant {
    ($cond:expr, $($msg:tt)*) => {
        if !$cond {
            return Err($crate::errors::Error::InvariantViolation(
                format!($($msg)*)
            ));
        }
    };
}

/// Unconditional internal failure.
///
/// Returns `Err(Error::Internal(...))` immediately.
///
/// # Example
/// ```
/// use rn_core::fail;
/// fn unreachable_branch() -> rn_core::Result<()> {
///     fail!("parent union does not cover in-set");
/// }
/// assert!(unreachable_branch().is_err());
/// ```
#[macro_export]
macro_rules! fail {
    ($($msg:tt)*) => {
        return Err($crate::errors::Error::Internal(format!($($msg)*)))
    };
}
