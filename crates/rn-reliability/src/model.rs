//! Problem description and state types for the reliability engine.

use std::collections::BTreeMap;

use rn_core::{Diagnostics, Edge, NodeId, Real};

/// The three node states of the cascading failure/repair model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Operating normally.
    Working,
    /// Freshly failed; moves to `UnderRepair` on the next step.
    Failed,
    /// Being repaired; returns to `Working` at the repair rate.
    UnderRepair,
}

/// Per-node base failure and repair rates, in events per unit time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeRates {
    /// Base failure rate λ.
    pub lambda: Real,
    /// Repair rate μ.
    pub mu: Real,
}

/// The probability distribution over the three states at one timestep.
///
/// Sums to one up to the configured tolerance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateProbabilities {
    /// P(Working).
    pub working: Real,
    /// P(Failed).
    pub failed: Real,
    /// P(Under-Repair).
    pub under_repair: Real,
}

impl StateProbabilities {
    /// The degenerate distribution of a known initial state.
    pub fn from_state(state: NodeState) -> Self {
        match state {
            NodeState::Working => Self {
                working: 1.0,
                failed: 0.0,
                under_repair: 0.0,
            },
            NodeState::Failed => Self {
                working: 0.0,
                failed: 1.0,
                under_repair: 0.0,
            },
            NodeState::UnderRepair => Self {
                working: 0.0,
                failed: 0.0,
                under_repair: 1.0,
            },
        }
    }

    /// Total probability mass.
    pub fn sum(&self) -> Real {
        self.working + self.failed + self.under_repair
    }
}

/// Caller-facing description of a reliability analysis.
#[derive(Debug, Clone)]
pub struct ReliabilityProblem {
    /// Number of nodes; ids are `1..=node_count`.
    pub node_count: usize,
    /// The edge list of the cascade DAG.
    pub edges: Vec<Edge>,
    /// Base failure and repair rates per node.
    pub rates: BTreeMap<NodeId, NodeRates>,
    /// Cascade multiplier per edge: the fraction of a parent's failure
    /// probability transmitted to the child, in `[0, 1]`.
    pub cascade: BTreeMap<Edge, Real>,
    /// Optional redundancy-group membership.  Nodes sharing a group id
    /// share load: survivors' failure rates grow as peers fail.
    pub redundancy_group: BTreeMap<NodeId, u32>,
    /// Load-sharing strength `s` in the load-factor model.
    pub sharing_strength: Real,
    /// Known state of every node at t = 0.
    pub initial_state: BTreeMap<NodeId, NodeState>,
    /// Total evolution time.
    pub time_horizon: Real,
    /// Discrete timestep; must satisfy `dt · max(λ_eff, μ) < 1`.
    pub dt: Real,
}

/// State trajectories and diagnostics produced by a reliability analysis.
#[derive(Debug, Clone)]
pub struct ReliabilityResult {
    /// Per node, the state distribution at `t = 0, dt, 2·dt, …`
    /// (`steps + 1` entries).
    pub trajectories: BTreeMap<NodeId, Vec<StateProbabilities>>,
    /// Run bookkeeping.
    pub diagnostics: Diagnostics,
}
