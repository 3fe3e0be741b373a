//! The layer-ordered exact belief pass and the diamond conditioning
//! machinery.
//!
//! Within one iteration set every node's predecessors already carry final
//! beliefs, so the set's nodes are data-independent and are dispatched to
//! the rayon pool when parallelism is enabled.  All combination orders are
//! pinned (ascending node ids, ascending state bitmasks), so results are
//! bit-identical across runs and thread counts.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use rn_algebra::{inclusion_exclusion, Probability};
use rn_core::{AnalysisConfig, Diagnostics, Edge, Error, NodeId, Result};
use rn_diamond::{detect_diamonds_excluding, DiamondGroup, DiamondsAtNode};
use rn_graph::{DirectedGraph, Topology};
use tracing::debug;

use crate::network::{Network, ReachabilityProblem, ReachabilityResult};

// ─── Pass statistics ──────────────────────────────────────────────────────────

/// Counters shared by the workers of one pass.
#[derive(Debug, Default)]
pub struct PassStats {
    max_conditioning: AtomicUsize,
}

impl PassStats {
    /// Record an enumerated conditioning-set size.
    pub fn record_conditioning(&self, size: usize) {
        self.max_conditioning.fetch_max(size, Ordering::Relaxed);
    }

    /// Largest conditioning set seen so far.
    pub fn max_conditioning(&self) -> usize {
        self.max_conditioning.load(Ordering::Relaxed)
    }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

/// Run a complete reachability analysis: build and validate the network,
/// check the memory budget, run the pass, and package the result.
///
/// # Errors
/// Any validation error, plus `OutOfBudget`, `Cancelled`,
/// `ConditioningTooLarge`, or `InvariantViolation` from the pass itself.
/// No partial results are returned on failure.
pub fn run_reachability<P: Probability>(
    problem: &ReachabilityProblem<P>,
    config: &AnalysisConfig,
) -> Result<ReachabilityResult<P>> {
    let started = Instant::now();
    let graph = DirectedGraph::new(problem.node_count, problem.edges.clone())?;
    let network = Network::new(graph, &problem.node_prior, &problem.edge_prob, config)?;

    let estimate = network.memory_estimate();
    if let Some(limit) = config.memory_limit_bytes {
        if estimate > limit {
            return Err(Error::OutOfBudget {
                required: estimate,
                limit,
            });
        }
    }

    let stats = PassStats::default();
    let table = propagate(&network, config, &stats)?;

    let beliefs = network
        .graph()
        .nodes()
        .map(|v| (v, table[v].clone()))
        .collect();
    Ok(ReachabilityResult {
        beliefs,
        diagnostics: Diagnostics {
            elapsed: started.elapsed(),
            peak_memory_estimate: estimate,
            warnings: network.warnings().to_vec(),
            max_conditioning_size: stats.max_conditioning(),
        },
    })
}

/// Compute the full belief table of a validated network.
///
/// Index 0 of the returned vector is unused; entry `v` is the exact
/// marginal probability that node `v` is reached.
pub fn propagate<P: Probability>(
    network: &Network<P>,
    config: &AnalysisConfig,
    stats: &PassStats,
) -> Result<Vec<P>> {
    propagate_view(&network.view(), config, stats, 0)
}

/// Probability that at least one active contribution arrives at `v`, given
/// the marginals of all strict ancestors of `v` in `beliefs`.
///
/// This is the combinator the reliability engine reuses: instantiated over
/// failed-state marginals and cascade multipliers it becomes the exact
/// cascade aggregator.  The node's own prior is *not* applied.
pub fn arrival_probability<P: Probability>(
    network: &Network<P>,
    beliefs: &[P],
    v: NodeId,
    config: &AnalysisConfig,
    stats: &PassStats,
) -> Result<P> {
    arrival(&network.view(), beliefs, v, config, stats, 0)
}

// ─── Pass view ────────────────────────────────────────────────────────────────

/// Borrowed pieces of one propagation pass.  Conditional sub-passes build
/// their own view with substituted priors, so the pass machinery is written
/// once against this struct.
pub(crate) struct PassView<'a, P: Probability> {
    pub graph: &'a DirectedGraph,
    pub topology: &'a Topology,
    pub diamonds: &'a BTreeMap<NodeId, DiamondsAtNode>,
    pub priors: &'a [P],
    pub edge_probs: &'a BTreeMap<Edge, P>,
}

impl<P: Probability> Network<P> {
    pub(crate) fn view(&self) -> PassView<'_, P> {
        PassView {
            graph: self.graph(),
            topology: self.topology(),
            diamonds: self.diamonds(),
            priors: self.priors_slice(),
            edge_probs: self.edge_probs_map(),
        }
    }
}

impl<'a, P: Probability> PassView<'a, P> {
    fn edge_prob(&self, u: NodeId, v: NodeId) -> &P {
        self.edge_probs
            .get(&(u, v))
            .expect("edge probability validated at construction")
    }
}

// ─── The pass ─────────────────────────────────────────────────────────────────

fn propagate_view<P: Probability>(
    view: &PassView<'_, P>,
    config: &AnalysisConfig,
    stats: &PassStats,
    depth: usize,
) -> Result<Vec<P>> {
    let n = view.graph.node_count();
    let mut beliefs = vec![P::zero(); n + 1];

    for (index, layer) in view.topology.iteration_sets().iter().enumerate() {
        if config.cancellation.is_cancelled() {
            return Err(Error::Cancelled);
        }
        debug!(layer = index, nodes = layer.len(), depth, "belief pass layer");

        // Sub-passes stay serial: they are small, and the top-level layer
        // fan-out already saturates the pool.
        let computed: Vec<Result<P>> = if config.parallel && depth == 0 && layer.len() > 1 {
            layer
                .par_iter()
                .map(|&v| node_belief(view, &beliefs, v, config, stats, depth))
                .collect()
        } else {
            layer
                .iter()
                .map(|&v| node_belief(view, &beliefs, v, config, stats, depth))
                .collect()
        };
        for (&v, value) in layer.iter().zip(computed) {
            beliefs[v] = value?;
        }
    }
    Ok(beliefs)
}

fn node_belief<P: Probability>(
    view: &PassView<'_, P>,
    beliefs: &[P],
    v: NodeId,
    config: &AnalysisConfig,
    stats: &PassStats,
    depth: usize,
) -> Result<P> {
    let prior = &view.priors[v];
    let belief = if view.graph.in_degree(v) == 0 {
        prior.clone()
    } else {
        prior.mul(&arrival(view, beliefs, v, config, stats, depth)?)
    };
    if !belief.within_unit(config.numerical_tolerance) {
        return Err(Error::InvariantViolation(format!(
            "belief of node {v} left [0, 1]: {belief:?}"
        )));
    }
    Ok(belief)
}

/// Combine the contributions of `v`'s parents into the probability that at
/// least one of them delivers an active signal to `v`.
///
/// Diamond groups enter as one conditioned term each; the remaining parents
/// are independent and enter as `belief · edge_prob`.  After conditioning,
/// all terms are mutually independent and combine exactly by
/// inclusion–exclusion.
fn arrival<P: Probability>(
    view: &PassView<'_, P>,
    beliefs: &[P],
    v: NodeId,
    config: &AnalysisConfig,
    stats: &PassStats,
    depth: usize,
) -> Result<P> {
    let mut terms: Vec<P> = Vec::new();
    match view.diamonds.get(&v) {
        Some(record) => {
            for group in &record.groups {
                terms.push(conditioned_group(view, beliefs, v, group, config, stats, depth)?);
            }
            for &r in &record.non_diamond_parents {
                terms.push(beliefs[r].mul(view.edge_prob(r, v)));
            }
        }
        None => {
            for &r in view.graph.predecessors(v) {
                terms.push(beliefs[r].mul(view.edge_prob(r, v)));
            }
        }
    }
    if terms.len() > config.max_union_terms {
        return Err(Error::ConditioningTooLarge {
            node: v,
            what: "union terms",
            size: terms.len(),
            limit: config.max_union_terms,
        });
    }
    Ok(inclusion_exclusion(&terms))
}

// ─── Diamond conditioning ─────────────────────────────────────────────────────

/// Exact contribution of one diamond group: marginalize the conditional
/// arrival probability over the `2^k` joint states of the conditioning set,
/// weighting each state by the product of its members' marginals.
fn conditioned_group<P: Probability>(
    view: &PassView<'_, P>,
    beliefs: &[P],
    join: NodeId,
    group: &DiamondGroup,
    config: &AnalysisConfig,
    stats: &PassStats,
    depth: usize,
) -> Result<P> {
    let k = group.conditioning_ancestors.len();
    if k > config.max_conditioning_nodes {
        return Err(Error::ConditioningTooLarge {
            node: join,
            what: "conditioning set",
            size: k,
            limit: config.max_conditioning_nodes,
        });
    }
    if depth >= config.max_recursion_depth {
        return Err(Error::ConditioningTooLarge {
            node: join,
            what: "recursion depth",
            size: depth + 1,
            limit: config.max_recursion_depth,
        });
    }
    stats.record_conditioning(k);

    let sub = SubNetwork::build(view, join, group)?;
    let zero = P::zero();
    let mut total = P::zero();
    for mask in 0u64..(1u64 << k) {
        let mut weight = P::one();
        for (bit, &a) in group.conditioning_ancestors.iter().enumerate() {
            if mask & (1 << bit) != 0 {
                weight = weight.mul(&beliefs[a]);
            } else {
                weight = weight.mul(&beliefs[a].complement());
            }
        }
        // A weightless state contributes nothing; skipping it keeps
        // degenerate (0/1) conditioning marginals cheap and is the same
        // decision on every run.
        if weight == zero {
            continue;
        }
        let conditional = sub.conditional_arrival(mask, beliefs, config, stats, depth)?;
        total = total.add(&weight.mul(&conditional));
    }
    Ok(total)
}

/// A diamond group's induced sub-DAG, relabelled to dense local ids and
/// ready for per-state conditional passes.
///
/// Conditioning nodes lose their incoming edges (their state is given by
/// the enumeration).  The group's highest nodes are seeded with their
/// outer marginals, which already fold in their entirely external
/// ancestry.  An interior node may additionally have parents *outside*
/// the induced sub-DAG; each such parent joins the sub-network as an
/// extra source carrying its outer marginal, so its contribution is
/// combined instead of dropped.
struct SubNetwork<P: Probability> {
    graph: DirectedGraph,
    topology: Topology,
    diamonds: BTreeMap<NodeId, DiamondsAtNode>,
    edge_probs: BTreeMap<Edge, P>,
    /// Per-node priors with the join forced to `one`; clamped and seeded
    /// entries are overwritten per call.
    prior_template: Vec<P>,
    join_orig: NodeId,
    join_local: NodeId,
    /// Local ids of the conditioning ancestors, in enumeration bit order.
    clamped_local: Vec<NodeId>,
    /// `(local, original)` pairs of the marginal-seeded sub-sources: the
    /// non-clamped highest nodes plus the interior nodes' external parents.
    seeded: Vec<(NodeId, NodeId)>,
    /// Local id → original id, for error reporting.
    orig_of: Vec<NodeId>,
}

impl<P: Probability> SubNetwork<P> {
    fn build(view: &PassView<'_, P>, join: NodeId, group: &DiamondGroup) -> Result<Self> {
        let clamped_set: BTreeSet<NodeId> =
            group.conditioning_ancestors.iter().copied().collect();

        // Interior nodes may keep parents outside the induced sub-DAG; map
        // each such parent to the interior nodes it feeds.  Highest nodes
        // are skipped (their marginal seed covers their whole ancestry),
        // as is the join (its outside parents are the non-diamond parents,
        // combined by the caller).
        let mut external: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        for &w in &group.relevant_nodes {
            if w == join || clamped_set.contains(&w) || group.highest_nodes.contains(&w) {
                continue;
            }
            for &y in view.graph.predecessors(w) {
                if !group.relevant_nodes.contains(&y) {
                    external.entry(y).or_default().push(w);
                }
            }
        }

        let mut local_of: BTreeMap<NodeId, NodeId> = BTreeMap::new();
        let mut orig_of: Vec<NodeId> = vec![0];
        for &orig in group.relevant_nodes.iter().chain(external.keys()) {
            local_of.insert(orig, orig_of.len());
            orig_of.push(orig);
        }

        let kept_edges: Vec<Edge> = group
            .subgraph_edges
            .iter()
            .filter(|&&(_, v)| !clamped_set.contains(&v))
            .copied()
            .chain(
                external
                    .iter()
                    .flat_map(|(&y, targets)| targets.iter().map(move |&w| (y, w))),
            )
            .collect();

        let local_edges: Vec<Edge> = kept_edges
            .iter()
            .map(|&(u, v)| (local_of[&u], local_of[&v]))
            .collect();
        let graph = DirectedGraph::new(local_of.len(), local_edges)?;
        let topology = Topology::analyze(&graph)?;

        let clamped_local: Vec<NodeId> = group
            .conditioning_ancestors
            .iter()
            .map(|a| local_of[a])
            .collect();
        let clamped_local_set: BTreeSet<NodeId> = clamped_local.iter().copied().collect();
        let diamonds = detect_diamonds_excluding(&graph, &topology, &clamped_local_set)?;

        let edge_probs: BTreeMap<Edge, P> = kept_edges
            .iter()
            .map(|&(u, v)| ((local_of[&u], local_of[&v]), view.edge_prob(u, v).clone()))
            .collect();

        let join_local = local_of[&join];
        let mut prior_template: Vec<P> = vec![P::zero(); local_of.len() + 1];
        for (&orig, &local) in &local_of {
            prior_template[local] = view.priors[orig].clone();
        }
        // The join's own prior belongs to the outer combination; inside the
        // sub-pass it only aggregates its parents.
        prior_template[join_local] = P::one();

        let mut seeded: Vec<(NodeId, NodeId)> = group
            .highest_nodes
            .iter()
            .copied()
            .filter(|h| !clamped_set.contains(h))
            .map(|h| (local_of[&h], h))
            .collect();
        seeded.extend(external.keys().map(|&y| (local_of[&y], y)));

        Ok(Self {
            graph,
            topology,
            diamonds,
            edge_probs,
            prior_template,
            join_orig: join,
            join_local,
            clamped_local,
            seeded,
            orig_of,
        })
    }

    /// Arrival probability at the join under one joint state of the
    /// conditioning set.
    ///
    /// Clamped nodes take local belief `one`/`zero` — their priors were
    /// absorbed into the state weight by the caller and must not be applied
    /// again.
    fn conditional_arrival(
        &self,
        mask: u64,
        outer_beliefs: &[P],
        config: &AnalysisConfig,
        stats: &PassStats,
        depth: usize,
    ) -> Result<P> {
        let mut priors = self.prior_template.clone();
        for (bit, &local) in self.clamped_local.iter().enumerate() {
            priors[local] = if mask & (1 << bit) != 0 {
                P::one()
            } else {
                P::zero()
            };
        }
        for &(local, orig) in &self.seeded {
            priors[local] = outer_beliefs[orig].clone();
        }

        let view = PassView {
            graph: &self.graph,
            topology: &self.topology,
            diamonds: &self.diamonds,
            priors: &priors,
            edge_probs: &self.edge_probs,
        };
        let table = propagate_view(&view, config, stats, depth + 1)
            .map_err(|e| self.remap_error(e))?;
        Ok(table[self.join_local].clone())
    }

    /// Translate local node ids in nested errors back to the caller's ids.
    fn remap_error(&self, err: Error) -> Error {
        match err {
            Error::ConditioningTooLarge {
                node,
                what,
                size,
                limit,
            } => Error::ConditioningTooLarge {
                node: self.orig_of[node],
                what,
                size,
                limit,
            },
            Error::InvariantViolation(msg) => Error::InvariantViolation(format!(
                "in conditional sub-pass at join {}: {msg}",
                self.join_orig
            )),
            other => other,
        }
    }
}
