//! Per-analysis configuration.
//!
//! Every analysis receives an explicit [`AnalysisConfig`] value; there is no
//! process-wide state.  The struct carries the caps and tolerances that the
//! engines enforce, plus the cooperative [`CancellationToken`] observed at
//! layer and timestep boundaries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::Real;

/// A cooperative cancellation flag shared between the caller and a running
/// analysis.
///
/// The engines poll the token at layer boundaries (reachability) and
/// timestep boundaries (reliability); a set token makes the analysis return
/// [`Error::Cancelled`](crate::Error::Cancelled) without publishing partial
/// results.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a fresh, unset token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.  Safe to call from any thread.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Configuration for a single analysis run.
///
/// # Example
/// ```
/// use rn_core::AnalysisConfig;
///
/// let config = AnalysisConfig::default()
///     .with_max_conditioning_nodes(8)
///     .with_parallel(false);
/// assert_eq!(config.max_conditioning_nodes, 8);
/// ```
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Cap on the size of a single conditioning set; `2^k` joint states are
    /// enumerated per diamond group, so this is the main performance knob.
    pub max_conditioning_nodes: usize,
    /// Cap on the number of contributors combined by one inclusion–exclusion
    /// expansion (`2^n − 1` signed terms).
    pub max_union_terms: usize,
    /// Cap on nested-diamond recursion depth in conditional sub-passes.
    pub max_recursion_depth: usize,
    /// Tolerance for probability-range and conservation checks.  Drift
    /// beyond it aborts the analysis; drift within it is tolerated, never
    /// clamped.
    pub numerical_tolerance: Real,
    /// Dispatch node computations within an iteration set to a thread pool.
    /// Results are identical either way.
    pub parallel: bool,
    /// Optional cap on the pre-allocation memory estimate, in bytes.
    pub memory_limit_bytes: Option<usize>,
    /// Cooperative cancellation flag.
    pub cancellation: CancellationToken,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_conditioning_nodes: 10,
            max_union_terms: 16,
            max_recursion_depth: 8,
            numerical_tolerance: 1e-9,
            parallel: true,
            memory_limit_bytes: None,
            cancellation: CancellationToken::new(),
        }
    }
}

impl AnalysisConfig {
    /// Set the conditioning-set size cap.
    pub fn with_max_conditioning_nodes(mut self, n: usize) -> Self {
        self.max_conditioning_nodes = n;
        self
    }

    /// Set the inclusion–exclusion contributor cap.
    pub fn with_max_union_terms(mut self, n: usize) -> Self {
        self.max_union_terms = n;
        self
    }

    /// Set the nested-diamond recursion depth cap.
    pub fn with_max_recursion_depth(mut self, n: usize) -> Self {
        self.max_recursion_depth = n;
        self
    }

    /// Set the numerical tolerance.
    pub fn with_numerical_tolerance(mut self, tol: Real) -> Self {
        self.numerical_tolerance = tol;
        self
    }

    /// Enable or disable intra-layer parallelism.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the memory budget in bytes.
    pub fn with_memory_limit_bytes(mut self, bytes: usize) -> Self {
        self.memory_limit_bytes = Some(bytes);
        self
    }

    /// Attach a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}
