//! # rn-belief
//!
//! The reachability core: an iteration-set-ordered exact marginal
//! computation over a probabilistic DAG.
//!
//! Naive belief propagation is wrong whenever two paths share ancestors:
//! a shared fork induces probabilistic dependence between a join's parents
//! that a product-of-parents update silently ignores.  This crate combines
//! independent contributors by inclusion–exclusion and resolves each
//! diamond by exact conditioning: it enumerates the joint states of the
//! shared fork ancestors, recomputes the parents' beliefs on the induced
//! sub-DAG under each state, and marginalizes with the joint state weights.
//!
//! # Modules
//!
//! * [`network`] — the validated analysis value ([`Network`]) binding
//!   graph, topology, diamonds, and parameters
//! * [`propagator`] — the layer-ordered pass and the conditioning machinery
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use rn_belief::{run_reachability, ReachabilityProblem};
//! use rn_core::AnalysisConfig;
//!
//! // 1 → 2 → 3 with certain priors and 0.9 edges.
//! let problem = ReachabilityProblem {
//!     node_count: 3,
//!     edges: vec![(1, 2), (2, 3)],
//!     node_prior: BTreeMap::from([(1, 1.0), (2, 1.0), (3, 1.0)]),
//!     edge_prob: BTreeMap::from([((1, 2), 0.9), ((2, 3), 0.9)]),
//! };
//! let result = run_reachability(&problem, &AnalysisConfig::default()).unwrap();
//! assert!((result.beliefs[&3] - 0.81).abs() < 1e-12);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod network;
pub mod propagator;

pub use network::{Network, ReachabilityProblem, ReachabilityResult};
pub use propagator::{arrival_probability, propagate, run_reachability, PassStats};
