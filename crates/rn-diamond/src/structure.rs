//! Diamond record types.

use std::collections::BTreeSet;

use rn_core::{Edge, NodeId};

/// One conditioning problem at a join node: a set of shared fork ancestors,
/// the parents they make dependent, and the sub-DAG of all paths from the
/// ancestors to the join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiamondGroup {
    /// The shared fork ancestors, sorted ascending.  The propagator
    /// enumerates the `2^k` joint states of these nodes.
    pub conditioning_ancestors: Vec<NodeId>,
    /// The parents of the join whose belief must be computed under
    /// conditioning.
    pub participating_parents: BTreeSet<NodeId>,
    /// Nodes of the induced sub-DAG (conditioning ancestors, everything on
    /// a path from them to the join, and the join itself).
    pub relevant_nodes: BTreeSet<NodeId>,
    /// Edges of the induced sub-DAG, in ascending order.
    pub subgraph_edges: Vec<Edge>,
    /// Nodes of the sub-DAG with no predecessor inside it.  The
    /// conditional sub-pass seeds the non-clamped ones with their outer
    /// marginals, which carry their (entirely external) ancestry.
    pub highest_nodes: BTreeSet<NodeId>,
}

/// All diamond groups discovered at a single join node.
///
/// Invariant: the union of `participating_parents` across `groups` together
/// with `non_diamond_parents` equals the join's parent set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiamondsAtNode {
    /// The join node.
    pub join: NodeId,
    /// The conditioning problems at this join.  Groups are pairwise
    /// independent: overlapping groups are merged during detection.
    pub groups: Vec<DiamondGroup>,
    /// Parents that share no fork ancestor with any other parent; their
    /// contributions combine by plain inclusion–exclusion.
    pub non_diamond_parents: BTreeSet<NodeId>,
}

impl DiamondGroup {
    /// Number of joint states the propagator enumerates for this group.
    pub fn state_count(&self) -> usize {
        1usize << self.conditioning_ancestors.len()
    }
}
