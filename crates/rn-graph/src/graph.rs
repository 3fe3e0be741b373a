//! Validated, immutable directed-graph index.

use std::collections::BTreeSet;

use rn_core::{ensure, Edge, NodeId, Result};

/// An immutable directed graph over the dense node range `1..=node_count`.
///
/// Construction validates the edge list; afterwards the structure is frozen
/// and exposes read-only adjacency.  Edge order is preserved so that
/// iteration over [`DirectedGraph::edges`] is deterministic.
#[derive(Debug, Clone)]
pub struct DirectedGraph {
    node_count: usize,
    edges: Vec<Edge>,
    // Indexed by node id; slot 0 is unused.
    out: Vec<BTreeSet<NodeId>>,
    inc: Vec<BTreeSet<NodeId>>,
}

impl DirectedGraph {
    /// Build a graph from a validated edge list.
    ///
    /// # Errors
    /// `InvalidInput` if any edge is a self-loop, any node id is outside
    /// `1..=node_count`, or the edge list contains duplicates.
    pub fn new(node_count: usize, edges: Vec<Edge>) -> Result<Self> {
        ensure!(node_count > 0, "graph must have at least one node");

        let mut out = vec![BTreeSet::new(); node_count + 1];
        let mut inc = vec![BTreeSet::new(); node_count + 1];

        for &(u, v) in &edges {
            ensure!(u != v, "self-loop ({u}, {v}) is not allowed");
            ensure!(
                (1..=node_count).contains(&u) && (1..=node_count).contains(&v),
                "edge ({u}, {v}) references a node outside 1..={node_count}"
            );
            ensure!(
                out[u].insert(v),
                "duplicate edge ({u}, {v}) in the edge list"
            );
            inc[v].insert(u);
        }

        Ok(Self {
            node_count,
            edges,
            out,
            inc,
        })
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Iterate over all node ids in ascending order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        1..=self.node_count
    }

    /// The edge list, in construction order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Successors of `v`.
    pub fn successors(&self, v: NodeId) -> &BTreeSet<NodeId> {
        &self.out[v]
    }

    /// Predecessors of `v`.
    pub fn predecessors(&self, v: NodeId) -> &BTreeSet<NodeId> {
        &self.inc[v]
    }

    /// Out-degree of `v`.
    pub fn out_degree(&self, v: NodeId) -> usize {
        self.out[v].len()
    }

    /// In-degree of `v`.
    pub fn in_degree(&self, v: NodeId) -> usize {
        self.inc[v].len()
    }

    /// Whether the edge `(u, v)` exists.
    pub fn contains_edge(&self, u: NodeId, v: NodeId) -> bool {
        self.out[u].contains(&v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rn_core::Error;

    #[test]
    fn adjacency_mirrors_edge_list() {
        let g = DirectedGraph::new(4, vec![(1, 2), (1, 3), (2, 4), (3, 4)]).unwrap();
        assert_eq!(g.node_count(), 4);
        assert_eq!(g.out_degree(1), 2);
        assert_eq!(g.in_degree(4), 2);
        for &(u, v) in g.edges() {
            assert!(g.successors(u).contains(&v));
            assert!(g.predecessors(v).contains(&u));
        }
    }

    #[test]
    fn rejects_self_loop() {
        let err = DirectedGraph::new(2, vec![(1, 1)]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn rejects_out_of_range_node() {
        let err = DirectedGraph::new(2, vec![(1, 3)]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        let err = DirectedGraph::new(2, vec![(0, 1)]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn rejects_duplicate_edge() {
        let err = DirectedGraph::new(3, vec![(1, 2), (1, 2)]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn isolated_nodes_are_allowed() {
        let g = DirectedGraph::new(3, vec![(1, 2)]).unwrap();
        assert_eq!(g.in_degree(3), 0);
        assert_eq!(g.out_degree(3), 0);
    }
}
