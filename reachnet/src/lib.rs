//! # reachnet
//!
//! Exact reachability and state-reliability inference on directed acyclic
//! graphs whose nodes and edges carry independent activation probabilities.
//!
//! This crate is a **façade** that re-exports all public items from the
//! underlying workspace crates.  Application code should depend on this
//! crate rather than the individual `rn-*` crates.
//!
//! ## Quick start
//!
//! ```toml
//! [dependencies]
//! reachnet = "0.1"
//! ```
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use reachnet::belief::{run_reachability, ReachabilityProblem};
//! use reachnet::core::AnalysisConfig;
//!
//! // A diamond whose source is uncertain: the exact pass conditions on
//! // the shared fork instead of double-counting it.
//! let problem = ReachabilityProblem {
//!     node_count: 4,
//!     edges: vec![(1, 2), (1, 3), (2, 4), (3, 4)],
//!     node_prior: BTreeMap::from([(1, 0.5), (2, 1.0), (3, 1.0), (4, 1.0)]),
//!     edge_prob: BTreeMap::from([
//!         ((1, 2), 0.5),
//!         ((1, 3), 0.5),
//!         ((2, 4), 0.5),
//!         ((3, 4), 0.5),
//!     ]),
//! };
//! let result = run_reachability(&problem, &AnalysisConfig::default()).unwrap();
//! assert!((result.beliefs[&4] - 0.21875).abs() < 1e-12);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Core types, configuration, and error definitions.
pub use rn_core as core;

/// Directed-graph index and topological analysis.
pub use rn_graph as graph;

/// Probability scalar algebras and exact combinators.
pub use rn_algebra as algebra;

/// Shared-ancestor (diamond) detection.
pub use rn_diamond as diamond;

/// The exact belief propagator.
pub use rn_belief as belief;

/// The multi-state reliability engine.
pub use rn_reliability as reliability;
