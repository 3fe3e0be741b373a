//! The validated analysis value: graph, topology, diamonds, parameters.

use std::collections::{BTreeMap, BTreeSet};

use rn_algebra::Probability;
use rn_core::{ensure, fail, AnalysisConfig, Diagnostics, Edge, Error, NodeId, Result};
use rn_diamond::{detect_diamonds, DiamondsAtNode};
use rn_graph::{DirectedGraph, Topology};

/// Caller-facing description of a reachability analysis.
#[derive(Debug, Clone)]
pub struct ReachabilityProblem<P: Probability> {
    /// Number of nodes; ids are `1..=node_count`.
    pub node_count: usize,
    /// The edge list.
    pub edges: Vec<Edge>,
    /// Probability each node is intrinsically active.
    pub node_prior: BTreeMap<NodeId, P>,
    /// Probability each edge transmits, conditional on its tail being
    /// active.
    pub edge_prob: BTreeMap<Edge, P>,
}

/// The belief table and diagnostics produced by a reachability analysis.
#[derive(Debug, Clone)]
pub struct ReachabilityResult<P: Probability> {
    /// Exact marginal probability that each node is reached.
    pub beliefs: BTreeMap<NodeId, P>,
    /// Run bookkeeping.
    pub diagnostics: Diagnostics,
}

/// A frozen analysis value: the graph, its topological artefacts, the
/// diamond records, and the per-node/per-edge parameters, all validated at
/// construction and read-only afterwards.
#[derive(Debug, Clone)]
pub struct Network<P: Probability> {
    graph: DirectedGraph,
    topology: Topology,
    diamonds: BTreeMap<NodeId, DiamondsAtNode>,
    // Indexed by node id; slot 0 carries `zero` and is unused.
    priors: Vec<P>,
    edge_probs: BTreeMap<Edge, P>,
    warnings: Vec<String>,
}

impl<P: Probability> Network<P> {
    /// Analyze and validate a network.
    ///
    /// Runs the topological analysis, diamond detection, and the full
    /// pre-analysis validation pass; any input error is reported here,
    /// before belief computation starts.
    ///
    /// # Errors
    /// `InvalidInput` for missing or out-of-range parameters,
    /// `ConditioningTooLarge` for structurally oversized conditioning, and
    /// `Internal` if the derived artefacts are inconsistent.
    pub fn new(
        graph: DirectedGraph,
        node_prior: &BTreeMap<NodeId, P>,
        edge_prob: &BTreeMap<Edge, P>,
        config: &AnalysisConfig,
    ) -> Result<Self> {
        let topology = Topology::analyze(&graph)?;
        let diamonds = detect_diamonds(&graph, &topology)?;

        let n = graph.node_count();
        let mut priors = vec![P::zero(); n + 1];
        for (&v, p) in node_prior {
            ensure!(
                (1..=n).contains(&v),
                "prior given for unknown node {v} (nodes are 1..={n})"
            );
            priors[v] = p.clone();
        }
        ensure!(
            node_prior.len() == n,
            "expected a prior for each of {n} nodes, got {}",
            node_prior.len()
        );
        for &(u, v) in graph.edges() {
            ensure!(
                edge_prob.contains_key(&(u, v)),
                "missing probability for edge ({u}, {v})"
            );
        }
        for edge in edge_prob.keys() {
            ensure!(
                graph.contains_edge(edge.0, edge.1),
                "probability given for non-edge ({}, {})",
                edge.0,
                edge.1
            );
        }

        let mut network = Self {
            graph,
            topology,
            diamonds,
            priors,
            edge_probs: edge_prob.clone(),
            warnings: Vec::new(),
        };
        network.warnings = network.validate(config)?;
        Ok(network)
    }

    /// The underlying graph.
    pub fn graph(&self) -> &DirectedGraph {
        &self.graph
    }

    /// The topological artefacts.
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// The diamond records, keyed by join node.
    pub fn diamonds(&self) -> &BTreeMap<NodeId, DiamondsAtNode> {
        &self.diamonds
    }

    /// Prior of node `v`.
    pub fn prior(&self, v: NodeId) -> &P {
        &self.priors[v]
    }

    /// Transmission probability of edge `(u, v)`.
    pub fn edge_prob(&self, u: NodeId, v: NodeId) -> &P {
        self.edge_probs
            .get(&(u, v))
            .expect("edge probability validated at construction")
    }

    /// Validation warnings gathered at construction.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub(crate) fn priors_slice(&self) -> &[P] {
        &self.priors
    }

    pub(crate) fn edge_probs_map(&self) -> &BTreeMap<Edge, P> {
        &self.edge_probs
    }

    /// Pre-allocation estimate of the pass's peak memory, in bytes: the
    /// belief table plus the largest conditional sub-network table.
    pub fn memory_estimate(&self) -> usize {
        let scalar = std::mem::size_of::<P>() + P::one().heap_footprint();
        let table = (self.graph.node_count() + 1) * scalar;
        let largest_subgraph = self
            .diamonds
            .values()
            .flat_map(|d| d.groups.iter())
            .map(|g| g.relevant_nodes.len() + 1)
            .max()
            .unwrap_or(0);
        table + largest_subgraph * scalar * 2
    }

    /// The full pre-analysis validation pass.  Returns non-fatal warnings.
    fn validate(&self, config: &AnalysisConfig) -> Result<Vec<String>> {
        let n = self.graph.node_count();
        let tol = config.numerical_tolerance;

        for v in self.graph.nodes() {
            ensure!(
                self.priors[v].within_unit(tol),
                "prior of node {v} is outside [0, 1]: {:?}",
                self.priors[v]
            );
        }
        for (&(u, v), p) in &self.edge_probs {
            ensure!(
                p.within_unit(tol),
                "probability of edge ({u}, {v}) is outside [0, 1]: {p:?}"
            );
        }

        // Iteration sets must partition the node set.
        let mut seen: BTreeSet<NodeId> = BTreeSet::new();
        for layer in self.topology.iteration_sets() {
            for &v in layer {
                if !seen.insert(v) {
                    fail!("node {v} appears in two iteration sets");
                }
            }
        }
        if seen.len() != n {
            fail!(
                "iteration sets cover {} of {n} nodes",
                seen.len()
            );
        }

        // Closures must agree with the edge list.
        for &(u, v) in self.graph.edges() {
            if !self.topology.ancestors(v).contains(&u)
                || !self.topology.descendants(u).contains(&v)
            {
                fail!("closures inconsistent with edge ({u}, {v})");
            }
        }

        // Oversized conditioning is an input property; report it eagerly.
        for (&join, record) in &self.diamonds {
            for group in &record.groups {
                let size = group.conditioning_ancestors.len();
                if size > config.max_conditioning_nodes {
                    return Err(Error::ConditioningTooLarge {
                        node: join,
                        what: "conditioning set",
                        size,
                        limit: config.max_conditioning_nodes,
                    });
                }
            }
        }
        for v in self.graph.nodes() {
            let contributors = match self.diamonds.get(&v) {
                Some(d) => d.groups.len() + d.non_diamond_parents.len(),
                None => self.graph.in_degree(v),
            };
            if contributors > config.max_union_terms {
                return Err(Error::ConditioningTooLarge {
                    node: v,
                    what: "union terms",
                    size: contributors,
                    limit: config.max_union_terms,
                });
            }
        }

        let mut warnings = Vec::new();
        for v in self.graph.nodes() {
            if self.graph.in_degree(v) == 0 && self.graph.out_degree(v) == 0 {
                warnings.push(format!("node {v} is isolated"));
            }
        }
        for (&join, record) in &self.diamonds {
            let states: usize = record.groups.iter().map(|g| g.state_count()).sum();
            if states > 256 {
                warnings.push(format!(
                    "join {join} enumerates {states} conditioning states"
                ));
            }
        }
        Ok(warnings)
    }
}
