//! Topological decomposition of a directed graph.
//!
//! [`Topology::analyze`] computes, in one pass over a [`DirectedGraph`]:
//!
//! * the **iteration sets** — a Kahn layering `L₁, L₂, …` such that every
//!   edge `(u, v)` crosses from an earlier layer to a strictly later one;
//! * **ancestor** closures (a node is its own ancestor by convention) and
//!   **descendant** closures (a node is not its own descendant);
//! * the **source / sink / fork / join** classification.
//!
//! All outputs are deterministic given the same graph.

use std::collections::BTreeSet;

use rn_core::{Error, NodeId, Result};

use crate::DirectedGraph;

/// Topological artefacts of a DAG, computed once and then read-only.
#[derive(Debug, Clone)]
pub struct Topology {
    iteration_sets: Vec<Vec<NodeId>>,
    // Layer index of each node; slot 0 unused.
    layer_of: Vec<usize>,
    sources: BTreeSet<NodeId>,
    sinks: BTreeSet<NodeId>,
    forks: BTreeSet<NodeId>,
    joins: BTreeSet<NodeId>,
    ancestors: Vec<BTreeSet<NodeId>>,
    descendants: Vec<BTreeSet<NodeId>>,
}

impl Topology {
    /// Analyze `graph`.
    ///
    /// # Errors
    /// `NotADag` if a cycle is detected (the layering queue empties while
    /// nodes remain unplaced).
    pub fn analyze(graph: &DirectedGraph) -> Result<Self> {
        let n = graph.node_count();
        let iteration_sets = kahn_layering(graph)?;

        let mut layer_of = vec![0usize; n + 1];
        for (k, layer) in iteration_sets.iter().enumerate() {
            for &v in layer {
                layer_of[v] = k;
            }
        }

        let mut sources = BTreeSet::new();
        let mut sinks = BTreeSet::new();
        let mut forks = BTreeSet::new();
        let mut joins = BTreeSet::new();
        for v in graph.nodes() {
            if graph.in_degree(v) == 0 {
                sources.insert(v);
            }
            if graph.out_degree(v) == 0 {
                sinks.insert(v);
            }
            if graph.out_degree(v) > 1 {
                forks.insert(v);
            }
            if graph.in_degree(v) > 1 {
                joins.insert(v);
            }
        }

        // Closures in dependency order: a node's ancestor set is the union
        // of its predecessors' sets plus itself, so one forward sweep over
        // the layering suffices (and one backward sweep for descendants).
        let mut ancestors: Vec<BTreeSet<NodeId>> = vec![BTreeSet::new(); n + 1];
        for layer in &iteration_sets {
            for &v in layer {
                let mut set = BTreeSet::new();
                set.insert(v);
                for &p in graph.predecessors(v) {
                    set.extend(ancestors[p].iter().copied());
                }
                ancestors[v] = set;
            }
        }

        let mut descendants: Vec<BTreeSet<NodeId>> = vec![BTreeSet::new(); n + 1];
        for layer in iteration_sets.iter().rev() {
            for &v in layer {
                let mut set = BTreeSet::new();
                for &c in graph.successors(v) {
                    set.insert(c);
                    set.extend(descendants[c].iter().copied());
                }
                descendants[v] = set;
            }
        }

        Ok(Self {
            iteration_sets,
            layer_of,
            sources,
            sinks,
            forks,
            joins,
            ancestors,
            descendants,
        })
    }

    /// The ordered iteration sets `L₁, L₂, …`; each inner vector is sorted.
    pub fn iteration_sets(&self) -> &[Vec<NodeId>] {
        &self.iteration_sets
    }

    /// Index of the iteration set containing `v` (0-based).
    pub fn layer_of(&self, v: NodeId) -> usize {
        self.layer_of[v]
    }

    /// Nodes with no incoming edges.
    pub fn sources(&self) -> &BTreeSet<NodeId> {
        &self.sources
    }

    /// Nodes with no outgoing edges.
    pub fn sinks(&self) -> &BTreeSet<NodeId> {
        &self.sinks
    }

    /// Nodes with more than one outgoing edge.
    pub fn forks(&self) -> &BTreeSet<NodeId> {
        &self.forks
    }

    /// Nodes with more than one incoming edge.
    pub fn joins(&self) -> &BTreeSet<NodeId> {
        &self.joins
    }

    /// Ancestors of `v`, including `v` itself.
    pub fn ancestors(&self, v: NodeId) -> &BTreeSet<NodeId> {
        &self.ancestors[v]
    }

    /// Descendants of `v`, excluding `v`.
    pub fn descendants(&self, v: NodeId) -> &BTreeSet<NodeId> {
        &self.descendants[v]
    }

    /// Whether `v` is a source.
    pub fn is_source(&self, v: NodeId) -> bool {
        self.sources.contains(&v)
    }
}

/// Kahn layering: `L₁` = sources; `L_{k+1}` = nodes all of whose
/// predecessors lie in `L₁ ∪ … ∪ L_k`.
fn kahn_layering(graph: &DirectedGraph) -> Result<Vec<Vec<NodeId>>> {
    let n = graph.node_count();
    let mut remaining_in: Vec<usize> = (0..=n).map(|v| graph.in_degree(v)).collect();
    let mut placed = vec![false; n + 1];
    let mut layers = Vec::new();

    let mut frontier: Vec<NodeId> = graph.nodes().filter(|&v| remaining_in[v] == 0).collect();
    let mut placed_count = 0usize;

    while !frontier.is_empty() {
        frontier.sort_unstable();
        for &v in &frontier {
            placed[v] = true;
        }
        placed_count += frontier.len();

        let mut next = Vec::new();
        for &v in &frontier {
            for &c in graph.successors(v) {
                remaining_in[c] -= 1;
                if remaining_in[c] == 0 && !placed[c] {
                    next.push(c);
                }
            }
        }
        layers.push(std::mem::replace(&mut frontier, next));
    }

    if placed_count < n {
        let witness = graph
            .nodes()
            .find(|&v| !placed[v])
            .unwrap_or(1);
        return Err(Error::NotADag {
            remaining: n - placed_count,
            witness,
        });
    }
    Ok(layers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> DirectedGraph {
        DirectedGraph::new(4, vec![(1, 2), (1, 3), (2, 4), (3, 4)]).unwrap()
    }

    #[test]
    fn layering_partitions_nodes() {
        let g = diamond();
        let t = Topology::analyze(&g).unwrap();
        assert_eq!(t.iteration_sets(), &[vec![1], vec![2, 3], vec![4]]);
        let total: usize = t.iteration_sets().iter().map(Vec::len).sum();
        assert_eq!(total, g.node_count());
    }

    #[test]
    fn every_edge_crosses_forward() {
        let g = DirectedGraph::new(
            6,
            vec![(1, 3), (2, 3), (3, 4), (3, 5), (4, 6), (5, 6), (2, 6)],
        )
        .unwrap();
        let t = Topology::analyze(&g).unwrap();
        for &(u, v) in g.edges() {
            assert!(t.layer_of(u) < t.layer_of(v), "edge ({u},{v}) not forward");
        }
    }

    #[test]
    fn node_classes() {
        let g = diamond();
        let t = Topology::analyze(&g).unwrap();
        assert_eq!(t.sources().iter().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(t.sinks().iter().copied().collect::<Vec<_>>(), vec![4]);
        assert_eq!(t.forks().iter().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(t.joins().iter().copied().collect::<Vec<_>>(), vec![4]);
    }

    #[test]
    fn closures_follow_conventions() {
        let g = diamond();
        let t = Topology::analyze(&g).unwrap();
        // Ancestors include the node itself.
        assert!(t.ancestors(4).contains(&4));
        assert_eq!(t.ancestors(4).len(), 4);
        assert_eq!(
            t.ancestors(2).iter().copied().collect::<Vec<_>>(),
            vec![1, 2]
        );
        // Descendants exclude the node itself.
        assert!(!t.descendants(1).contains(&1));
        assert_eq!(t.descendants(1).len(), 3);
        assert!(t.descendants(2).contains(&4));
    }

    #[test]
    fn cycle_is_rejected() {
        let g = DirectedGraph::new(2, vec![(1, 2), (2, 1)]).unwrap();
        match Topology::analyze(&g) {
            Err(Error::NotADag { remaining, .. }) => assert_eq!(remaining, 2),
            other => panic!("expected NotADag, got {other:?}"),
        }
    }

    #[test]
    fn partial_cycle_reports_remaining_nodes() {
        // 1 → 2 feeds a 3 ⇄ 4 cycle; only the cycle nodes stay unplaced.
        let g = DirectedGraph::new(4, vec![(1, 2), (2, 3), (3, 4), (4, 3)]).unwrap();
        match Topology::analyze(&g) {
            Err(Error::NotADag { remaining, witness }) => {
                assert_eq!(remaining, 2);
                assert!(witness == 3 || witness == 4);
            }
            other => panic!("expected NotADag, got {other:?}"),
        }
    }
}
