//! # rn-reliability
//!
//! Discrete-time multi-state reliability evolution over a probabilistic
//! DAG: each node moves between `Working`, `Failed`, and `UnderRepair`
//! under a 3-state Markov step whose effective failure rate combines a base
//! rate, redundancy-group load sharing, and cascade failure from ancestors.
//!
//! The cascade aggregator is the belief propagator's arrival combinator
//! instantiated over failed-state marginals and per-edge cascade
//! multipliers, so shared-ancestor dependence between cascade paths is
//! resolved by the same exact diamond conditioning as reachability.
//!
//! # Modules
//!
//! * [`model`] — problem description, states, and trajectories
//! * [`time_grid`] — the uniform evolution grid
//! * [`engine`] — validation and the timestep loop

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod engine;
pub mod model;
pub mod time_grid;

pub use engine::run_reliability;
pub use model::{
    NodeRates, NodeState, ReliabilityProblem, ReliabilityResult, StateProbabilities,
};
pub use time_grid::TimeGrid;
