//! Diamond detection over a topologically analyzed DAG.

use std::collections::{BTreeMap, BTreeSet};

use rn_core::{fail, NodeId, Result};
use rn_graph::{DirectedGraph, Topology};
use tracing::warn;

use crate::{DiamondGroup, DiamondsAtNode};

/// Parent counts above this trip a diagnostic warning; the per-join scan is
/// quadratic in the parent count.
const WIDE_JOIN_WARN: usize = 20;

/// Find the diamond structure at every join node of `graph`.
///
/// Grouping is fine-grained: ancestors shared by exactly the same set of
/// parents form one group, and groups whose parent sets or conditioning
/// sets overlap are merged afterwards, so the emitted groups are pairwise
/// independent and cover each parent's full shared ancestry.
///
/// # Errors
/// `Internal` if the emitted records violate the parent-union invariant.
pub fn detect_diamonds(
    graph: &DirectedGraph,
    topology: &Topology,
) -> Result<BTreeMap<NodeId, DiamondsAtNode>> {
    detect_diamonds_excluding(graph, topology, &BTreeSet::new())
}

/// [`detect_diamonds`], ignoring the given nodes as conditioning candidates.
///
/// Conditional sub-passes use this to keep already clamped ancestors out of
/// nested conditioning sets: a clamped node is deterministic within its
/// sub-pass, so re-conditioning on it would recurse without progress.
pub fn detect_diamonds_excluding(
    graph: &DirectedGraph,
    topology: &Topology,
    excluded: &BTreeSet<NodeId>,
) -> Result<BTreeMap<NodeId, DiamondsAtNode>> {
    let mut result = BTreeMap::new();

    for &join in topology.joins() {
        let parents: BTreeSet<NodeId> = graph.predecessors(join).clone();
        if parents.len() > WIDE_JOIN_WARN {
            warn!(
                join,
                parents = parents.len(),
                "wide join: shared-ancestor scan is quadratic in parent count"
            );
        }

        // For each fork ancestor, the set of parents it reaches.
        let mut reached_by: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();
        for &p in &parents {
            for &a in topology.ancestors(p) {
                if topology.forks().contains(&a) && !excluded.contains(&a) {
                    reached_by.entry(a).or_default().insert(p);
                }
            }
        }

        // Keep ancestors shared by at least two parents, grouped by their
        // co-participating parent set.
        let mut by_parent_set: BTreeMap<BTreeSet<NodeId>, BTreeSet<NodeId>> = BTreeMap::new();
        for (a, parent_set) in reached_by {
            if parent_set.len() >= 2 {
                by_parent_set.entry(parent_set).or_default().insert(a);
            }
        }
        if by_parent_set.is_empty() {
            continue;
        }

        let merged = merge_overlapping(by_parent_set.into_iter().collect());

        let mut groups = Vec::with_capacity(merged.len());
        let mut covered: BTreeSet<NodeId> = BTreeSet::new();
        for (group_parents, ancestors) in merged {
            covered.extend(group_parents.iter().copied());
            groups.push(build_group(graph, topology, join, group_parents, ancestors));
        }

        let non_diamond_parents: BTreeSet<NodeId> =
            parents.difference(&covered).copied().collect();
        if !covered.is_subset(&parents) {
            fail!(
                "diamond groups at join {join} name non-parent nodes: {:?}",
                covered.difference(&parents).collect::<Vec<_>>()
            );
        }

        result.insert(
            join,
            DiamondsAtNode {
                join,
                groups,
                non_diamond_parents,
            },
        );
    }

    Ok(result)
}

/// Merge groups transitively until no two share a parent or a conditioning
/// ancestor.  Groups that stay separate are genuinely independent: distinct
/// parents with any common fork ancestor would have landed in one group.
fn merge_overlapping(
    mut entries: Vec<(BTreeSet<NodeId>, BTreeSet<NodeId>)>,
) -> Vec<(BTreeSet<NodeId>, BTreeSet<NodeId>)> {
    loop {
        let mut merged_any = false;
        let mut out: Vec<(BTreeSet<NodeId>, BTreeSet<NodeId>)> = Vec::new();
        'next: for (parents, ancestors) in entries {
            for existing in &mut out {
                let parents_overlap = !existing.0.is_disjoint(&parents);
                let ancestors_overlap = !existing.1.is_disjoint(&ancestors);
                if parents_overlap || ancestors_overlap {
                    existing.0.extend(parents.iter().copied());
                    existing.1.extend(ancestors.iter().copied());
                    merged_any = true;
                    continue 'next;
                }
            }
            out.push((parents, ancestors));
        }
        entries = out;
        if !merged_any {
            return entries;
        }
    }
}

/// Keep only the conditioning frontier: an ancestor whose every path to
/// the join runs through other conditioning nodes is screened by them, so
/// enumerating its state adds joint states without adding information (its
/// influence is already carried by the downstream members' marginals).
fn conditioning_frontier(
    graph: &DirectedGraph,
    topology: &Topology,
    join: NodeId,
    ancestors: &BTreeSet<NodeId>,
) -> BTreeSet<NodeId> {
    let join_ancestry = topology.ancestors(join);
    ancestors
        .iter()
        .copied()
        .filter(|&a| {
            // Search for a path a → join that avoids the other members.
            let mut stack = vec![a];
            let mut visited: BTreeSet<NodeId> = BTreeSet::new();
            visited.insert(a);
            while let Some(x) = stack.pop() {
                for &c in graph.successors(x) {
                    if c == join {
                        return true;
                    }
                    if !join_ancestry.contains(&c)
                        || ancestors.contains(&c)
                        || !visited.insert(c)
                    {
                        continue;
                    }
                    stack.push(c);
                }
            }
            false
        })
        .collect()
}

/// Build the induced sub-DAG record for one group: every node on a path
/// from a conditioning ancestor to the join, the edges between them, and
/// the local sources.
fn build_group(
    graph: &DirectedGraph,
    topology: &Topology,
    join: NodeId,
    participating_parents: BTreeSet<NodeId>,
    ancestors: BTreeSet<NodeId>,
) -> DiamondGroup {
    let ancestors = conditioning_frontier(graph, topology, join, &ancestors);
    let join_ancestry = topology.ancestors(join);
    let mut relevant: BTreeSet<NodeId> = BTreeSet::new();
    for &a in &ancestors {
        if join_ancestry.contains(&a) {
            relevant.insert(a);
        }
        for &d in topology.descendants(a) {
            if join_ancestry.contains(&d) {
                relevant.insert(d);
            }
        }
    }

    let subgraph_edges: Vec<_> = graph
        .edges()
        .iter()
        .copied()
        .filter(|&(u, v)| relevant.contains(&u) && relevant.contains(&v))
        .collect();

    let mut has_local_pred: BTreeSet<NodeId> = BTreeSet::new();
    for &(_, v) in &subgraph_edges {
        has_local_pred.insert(v);
    }
    let highest_nodes: BTreeSet<NodeId> = relevant
        .iter()
        .copied()
        .filter(|v| !has_local_pred.contains(v))
        .collect();

    let mut subgraph_edges = subgraph_edges;
    subgraph_edges.sort_unstable();

    DiamondGroup {
        conditioning_ancestors: ancestors.into_iter().collect(),
        participating_parents,
        relevant_nodes: relevant,
        subgraph_edges,
        highest_nodes,
    }
}
