//! End-to-end reachability scenarios checked against an exhaustive
//! world-enumeration oracle.
//!
//! The oracle enumerates every joint outcome of the node-activation and
//! edge-transmission events and sums the weights of the worlds in which a
//! node is reached, which is the model's exact marginal by definition.

use std::collections::BTreeMap;

use approx::assert_abs_diff_eq;
use rn_belief::{run_reachability, ReachabilityProblem};
use rn_core::{AnalysisConfig, Edge, Error, NodeId};

// ─── Oracle ───────────────────────────────────────────────────────────────────

/// Exact marginals by brute-force enumeration over all
/// `2^(nodes + edges)` worlds.  Only viable for small graphs.
fn oracle_beliefs(problem: &ReachabilityProblem<f64>) -> Vec<f64> {
    let n = problem.node_count;
    let e = problem.edges.len();
    assert!(n + e <= 20, "oracle blows up past ~20 binary events");

    let mut beliefs = vec![0.0; n + 1];
    for world in 0u64..(1 << (n + e)) {
        let active = |v: NodeId| world & (1 << (v - 1)) != 0;
        let transmits = |j: usize| world & (1 << (n + j)) != 0;

        let mut weight = 1.0;
        for v in 1..=n {
            let p = problem.node_prior[&v];
            weight *= if active(v) { p } else { 1.0 - p };
        }
        for (j, edge) in problem.edges.iter().enumerate() {
            let p = problem.edge_prob[edge];
            weight *= if transmits(j) { p } else { 1.0 - p };
        }
        if weight == 0.0 {
            continue;
        }

        // A node is reached if it is active and some incoming edge
        // transmits from a reached parent; active sources are reached.
        let mut reached = vec![false; n + 1];
        loop {
            let mut changed = false;
            for v in 1..=n {
                if reached[v] || !active(v) {
                    continue;
                }
                let has_parents = problem.edges.iter().any(|&(_, t)| t == v);
                let fed = !has_parents
                    || problem
                        .edges
                        .iter()
                        .enumerate()
                        .any(|(j, &(s, t))| t == v && transmits(j) && reached[s]);
                if fed {
                    reached[v] = true;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        for v in 1..=n {
            if reached[v] {
                beliefs[v] += weight;
            }
        }
    }
    beliefs
}

fn problem(
    node_count: usize,
    edges: Vec<Edge>,
    priors: Vec<f64>,
    probs: Vec<f64>,
) -> ReachabilityProblem<f64> {
    assert_eq!(priors.len(), node_count);
    assert_eq!(probs.len(), edges.len());
    ReachabilityProblem {
        node_count,
        edges: edges.clone(),
        node_prior: (1..=node_count).zip(priors).collect(),
        edge_prob: edges.into_iter().zip(probs).collect(),
    }
}

fn assert_matches_oracle(problem: &ReachabilityProblem<f64>) {
    let result = run_reachability(problem, &AnalysisConfig::default()).unwrap();
    let oracle = oracle_beliefs(problem);
    for v in 1..=problem.node_count {
        assert_abs_diff_eq!(result.beliefs[&v], oracle[v], epsilon = 1e-10);
    }
}

// ─── Spec scenarios ───────────────────────────────────────────────────────────

#[test]
fn trivial_chain() {
    let p = problem(
        3,
        vec![(1, 2), (2, 3)],
        vec![1.0, 1.0, 1.0],
        vec![0.9, 0.9],
    );
    let r = run_reachability(&p, &AnalysisConfig::default()).unwrap();
    assert_abs_diff_eq!(r.beliefs[&1], 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(r.beliefs[&2], 0.9, epsilon = 1e-12);
    assert_abs_diff_eq!(r.beliefs[&3], 0.81, epsilon = 1e-12);
    assert_matches_oracle(&p);
}

#[test]
fn diamond_with_deterministic_shared_source() {
    // With a certain source the two path events are independent, so the
    // conditioned result coincides with the enumeration: 0.4375.
    let p = problem(
        4,
        vec![(1, 2), (1, 3), (2, 4), (3, 4)],
        vec![1.0, 1.0, 1.0, 1.0],
        vec![0.5, 0.5, 0.5, 0.5],
    );
    let r = run_reachability(&p, &AnalysisConfig::default()).unwrap();
    assert_abs_diff_eq!(r.beliefs[&4], 0.4375, epsilon = 1e-12);
    assert_matches_oracle(&p);
}

#[test]
fn diamond_with_uncertain_shared_source() {
    // The discriminating seed: prior[1] = 0.5 makes the paths dependent.
    // Exact: 0.5 · 0.4375 = 0.21875.  Naive combination would give
    // 1 − (1 − 0.5·0.25)² = 0.234375.
    let p = problem(
        4,
        vec![(1, 2), (1, 3), (2, 4), (3, 4)],
        vec![0.5, 1.0, 1.0, 1.0],
        vec![0.5, 0.5, 0.5, 0.5],
    );
    let r = run_reachability(&p, &AnalysisConfig::default()).unwrap();
    assert_abs_diff_eq!(r.beliefs[&4], 0.21875, epsilon = 1e-12);
    assert!((r.beliefs[&4] - 0.234375).abs() > 1e-3, "must not equal naive");
    assert_matches_oracle(&p);
}

#[test]
fn two_disjoint_paths_without_shared_ancestor() {
    let p = problem(
        3,
        vec![(1, 3), (2, 3)],
        vec![1.0, 1.0, 1.0],
        vec![0.5, 0.5],
    );
    let r = run_reachability(&p, &AnalysisConfig::default()).unwrap();
    assert_abs_diff_eq!(r.beliefs[&3], 0.75, epsilon = 1e-12);
    assert_matches_oracle(&p);
}

#[test]
fn cycle_is_rejected() {
    let p = problem(2, vec![(1, 2), (2, 1)], vec![1.0, 1.0], vec![0.5, 0.5]);
    assert!(matches!(
        run_reachability(&p, &AnalysisConfig::default()),
        Err(Error::NotADag { .. })
    ));
}

// ─── Diamond correctness against the oracle ───────────────────────────────────

#[test]
fn interior_fork_diamond() {
    let p = problem(
        5,
        vec![(1, 2), (2, 3), (2, 4), (3, 5), (4, 5)],
        vec![1.0, 1.0, 1.0, 1.0, 1.0],
        vec![0.9, 0.9, 0.9, 0.9, 0.9],
    );
    let r = run_reachability(&p, &AnalysisConfig::default()).unwrap();
    assert_abs_diff_eq!(r.beliefs[&5], 0.86751, epsilon = 1e-12);
    assert_matches_oracle(&p);
}

#[test]
fn two_independent_conditioning_forks() {
    // Sources 1 and 2 both fork into parents 3 and 4 of join 5; the
    // conditioning set {1, 2} enumerates four joint states.
    let p = problem(
        6,
        vec![(1, 3), (1, 4), (2, 3), (2, 4), (3, 5), (4, 5), (5, 6)],
        vec![0.7, 0.6, 1.0, 1.0, 1.0, 0.9],
        vec![0.8, 0.8, 0.8, 0.8, 0.8, 0.8, 0.8],
    );
    let r = run_reachability(&p, &AnalysisConfig::default()).unwrap();
    assert_eq!(r.diagnostics.max_conditioning_size, 2);
    assert_matches_oracle(&p);
}

#[test]
fn chained_forks_are_exact_through_frontier_conditioning() {
    // Two diamonds in sequence; the downstream join conditions only on the
    // nearest fork, whose marginal already carries the upstream diamond.
    let p = problem(
        8,
        vec![
            (1, 2),
            (2, 3),
            (2, 4),
            (3, 5),
            (4, 5),
            (5, 6),
            (5, 7),
            (6, 8),
            (7, 8),
        ],
        vec![0.9, 0.95, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
        vec![0.7, 0.8, 0.6, 0.9, 0.75, 0.85, 0.7, 0.8, 0.9],
    );
    assert_matches_oracle(&p);
}

#[test]
fn parent_that_is_also_the_shared_fork() {
    // 1 → 2, 2 → 3, 2 → 4, 3 → 4: parent 2 of the join doubles as the
    // conditioning ancestor.
    let p = problem(
        4,
        vec![(1, 2), (2, 3), (2, 4), (3, 4)],
        vec![0.8, 1.0, 1.0, 1.0],
        vec![0.9, 0.7, 0.6, 0.8],
    );
    assert_matches_oracle(&p);
}

#[test]
fn diamond_interior_fed_from_outside_the_cone() {
    // Node 3 sits inside the diamond 1 → {3, 5} → 4 but has a second
    // parent 2 outside the shared-fork cone.  The conditional sub-pass
    // must fold 2's marginal in: with it, belief[3 | 1 active] is 0.75
    // (not 0.5), and the path through 2 keeps node 4 reachable even when
    // node 1 is inactive.  Exact: 0.5·0.53125 + 0.5·0.25 = 0.390625.
    let p = problem(
        5,
        vec![(1, 3), (2, 3), (3, 4), (1, 5), (5, 4)],
        vec![0.5, 1.0, 1.0, 1.0, 1.0],
        vec![0.5, 0.5, 0.5, 0.5, 0.5],
    );
    let r = run_reachability(&p, &AnalysisConfig::default()).unwrap();
    assert_abs_diff_eq!(r.beliefs[&4], 0.390625, epsilon = 1e-12);
    assert_matches_oracle(&p);
}

#[test]
fn external_parent_feeding_two_interior_nodes() {
    // At join 7 the cone of fork 1 is {1, 3, 4, 5, 6, 7}; node 2 stays
    // outside it yet feeds both interior nodes 3 and 4.  It must enter
    // the sub-pass as a single extra source (its activation is shared
    // between the two branches), where the nested diamond at 6 then
    // conditions on it.
    let p = problem(
        7,
        vec![
            (1, 3),
            (1, 4),
            (1, 5),
            (2, 3),
            (2, 4),
            (3, 6),
            (4, 6),
            (5, 7),
            (6, 7),
        ],
        vec![0.5, 0.5, 1.0, 1.0, 1.0, 1.0, 1.0],
        vec![0.5; 9],
    );
    let r = run_reachability(&p, &AnalysisConfig::default()).unwrap();
    assert_abs_diff_eq!(r.beliefs[&7], 0.27783203125, epsilon = 1e-12);
    assert_matches_oracle(&p);
}

#[test]
fn mixed_join_with_independent_extra_parent() {
    // A diamond pair plus an unrelated source feeding the same join.
    let p = problem(
        5,
        vec![(1, 2), (1, 3), (2, 4), (3, 4), (5, 4)],
        vec![0.6, 1.0, 1.0, 1.0, 0.9],
        vec![0.5, 0.5, 0.7, 0.7, 0.4],
    );
    assert_matches_oracle(&p);
}

// ─── Structural properties ────────────────────────────────────────────────────

#[test]
fn tree_matches_naive_product_propagation() {
    // No joins with shared ancestry: the exact pass must reduce to the
    // product-of-parents update.
    let edges = vec![(1, 2), (1, 3), (2, 4), (2, 5), (3, 6)];
    let priors = vec![0.9, 0.8, 0.7, 1.0, 0.6, 1.0];
    let probs = vec![0.5, 0.6, 0.7, 0.8, 0.9];
    let p = problem(6, edges.clone(), priors.clone(), probs.clone());
    let r = run_reachability(&p, &AnalysisConfig::default()).unwrap();

    let mut naive = vec![0.0; 7];
    for v in 1..=6 {
        let incoming: Vec<_> = edges
            .iter()
            .zip(&probs)
            .filter(|(&(_, t), _)| t == v)
            .map(|(&(s, _), &q)| naive[s] * q)
            .collect();
        naive[v] = if incoming.is_empty() {
            priors[v - 1]
        } else {
            priors[v - 1] * (1.0 - incoming.iter().map(|c| 1.0 - c).product::<f64>())
        };
    }
    for v in 1..=6 {
        assert_abs_diff_eq!(r.beliefs[&v], naive[v], epsilon = 1e-12);
    }
}

#[test]
fn certain_parameters_reach_everything() {
    let p = problem(
        5,
        vec![(1, 2), (1, 3), (2, 4), (3, 4), (4, 5)],
        vec![1.0; 5],
        vec![1.0; 5],
    );
    let r = run_reachability(&p, &AnalysisConfig::default()).unwrap();
    for v in 1..=5 {
        assert_abs_diff_eq!(r.beliefs[&v], 1.0, epsilon = 1e-12);
    }
}

#[test]
fn zero_edges_isolate_non_sources() {
    let p = problem(
        3,
        vec![(1, 2), (2, 3)],
        vec![0.4, 1.0, 1.0],
        vec![0.0, 0.0],
    );
    let r = run_reachability(&p, &AnalysisConfig::default()).unwrap();
    assert_abs_diff_eq!(r.beliefs[&1], 0.4, epsilon = 1e-12);
    assert_abs_diff_eq!(r.beliefs[&2], 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(r.beliefs[&3], 0.0, epsilon = 1e-12);
}

#[test]
fn zero_prior_forces_zero_belief() {
    let p = problem(
        4,
        vec![(1, 2), (1, 3), (2, 4), (3, 4)],
        vec![1.0, 0.0, 1.0, 1.0],
        vec![0.9, 0.9, 0.9, 0.9],
    );
    let r = run_reachability(&p, &AnalysisConfig::default()).unwrap();
    assert_eq!(r.beliefs[&2], 0.0);
    assert_matches_oracle(&p);
}

#[test]
fn results_are_bit_identical_across_thread_modes() {
    let p = problem(
        8,
        vec![
            (1, 2),
            (2, 3),
            (2, 4),
            (3, 5),
            (4, 5),
            (5, 6),
            (5, 7),
            (6, 8),
            (7, 8),
        ],
        vec![0.9, 0.95, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
        vec![0.7, 0.8, 0.6, 0.9, 0.75, 0.85, 0.7, 0.8, 0.9],
    );
    let serial = run_reachability(&p, &AnalysisConfig::default().with_parallel(false)).unwrap();
    let parallel = run_reachability(&p, &AnalysisConfig::default().with_parallel(true)).unwrap();
    let rerun = run_reachability(&p, &AnalysisConfig::default().with_parallel(true)).unwrap();
    for v in 1..=8 {
        assert_eq!(serial.beliefs[&v].to_bits(), parallel.beliefs[&v].to_bits());
        assert_eq!(parallel.beliefs[&v].to_bits(), rerun.beliefs[&v].to_bits());
    }
}

#[test]
fn conditioning_cap_fails_loudly() {
    let p = problem(
        6,
        vec![(1, 3), (1, 4), (2, 3), (2, 4), (3, 5), (4, 5), (5, 6)],
        vec![0.7, 0.6, 1.0, 1.0, 1.0, 0.9],
        vec![0.8; 7],
    );
    let config = AnalysisConfig::default().with_max_conditioning_nodes(1);
    match run_reachability(&p, &config) {
        Err(Error::ConditioningTooLarge {
            node, size, limit, ..
        }) => {
            assert_eq!(node, 5);
            assert_eq!(size, 2);
            assert_eq!(limit, 1);
        }
        other => panic!("expected ConditioningTooLarge, got {other:?}"),
    }
}

// ─── Random-DAG properties ────────────────────────────────────────────────────

proptest::proptest! {
    #![proptest_config(proptest::prelude::ProptestConfig::with_cases(64))]
    #[test]
    fn random_dags_respect_the_contract(
        n in 2usize..8,
        edge_seeds in proptest::collection::vec((1usize..7, 0usize..6), 0..14),
        prior_seeds in proptest::collection::vec(0.0f64..=1.0, 8),
        prob_seed in 0.0f64..=1.0,
    ) {
        use std::collections::BTreeSet;

        // Forward edges only, so the graph is a DAG by construction.
        let edges: Vec<Edge> = edge_seeds
            .into_iter()
            .filter_map(|(u, off)| {
                if u >= n { return None; }
                Some((u, (u + 1 + off % (n - u)).min(n)))
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let p = ReachabilityProblem {
            node_count: n,
            edges: edges.clone(),
            node_prior: (1..=n).map(|v| (v, prior_seeds[v - 1])).collect(),
            edge_prob: edges
                .iter()
                .enumerate()
                .map(|(i, &e)| (e, (prob_seed + 0.13 * i as f64) % 1.0))
                .collect(),
        };
        let r = run_reachability(&p, &AnalysisConfig::default()).unwrap();

        for v in 1..=n {
            let b = r.beliefs[&v];
            proptest::prop_assert!((-1e-9..=1.0 + 1e-9).contains(&b));
            // Sources carry their prior exactly; zero priors force zero.
            if !edges.iter().any(|&(_, t)| t == v) {
                proptest::prop_assert_eq!(b, p.node_prior[&v]);
            }
            if p.node_prior[&v] == 0.0 {
                proptest::prop_assert_eq!(b, 0.0);
            }
        }

        // Same input, same bits.
        let again = run_reachability(&p, &AnalysisConfig::default()).unwrap();
        for v in 1..=n {
            proptest::prop_assert_eq!(again.beliefs[&v].to_bits(), r.beliefs[&v].to_bits());
        }
    }
}

// ─── Monte-Carlo agreement ────────────────────────────────────────────────────

#[test]
fn monte_carlo_agrees_on_a_layered_network() {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let p = problem(
        8,
        vec![
            (1, 2),
            (2, 3),
            (2, 4),
            (3, 5),
            (4, 5),
            (5, 6),
            (5, 7),
            (6, 8),
            (7, 8),
        ],
        vec![0.9, 0.8, 1.0, 0.95, 1.0, 1.0, 0.85, 1.0],
        vec![0.7, 0.8, 0.6, 0.9, 0.75, 0.85, 0.7, 0.8, 0.9],
    );
    let r = run_reachability(&p, &AnalysisConfig::default()).unwrap();

    let mut rng = StdRng::seed_from_u64(0x5eed);
    let samples = 200_000usize;
    let mut hits = vec![0usize; p.node_count + 1];
    for _ in 0..samples {
        let mut reached = vec![false; p.node_count + 1];
        // Edges are (u, v) with u < v, so one ascending sweep settles
        // reachability.
        for v in 1..=p.node_count {
            if rng.gen::<f64>() >= p.node_prior[&v] {
                continue;
            }
            let has_parents = p.edges.iter().any(|&(_, t)| t == v);
            let fed = !has_parents
                || p.edges
                    .iter()
                    .any(|&(s, t)| t == v && reached[s] && rng.gen::<f64>() < p.edge_prob[&(s, t)]);
            reached[v] = fed;
        }
        for v in 1..=p.node_count {
            if reached[v] {
                hits[v] += 1;
            }
        }
    }
    // 3σ for a Bernoulli estimate at n = 200 000 is under 0.0034; allow a
    // little slack on top.
    for v in 1..=p.node_count {
        let estimate = hits[v] as f64 / samples as f64;
        assert!(
            (r.beliefs[&v] - estimate).abs() < 0.005,
            "node {v}: exact {} vs MC {estimate}",
            r.beliefs[&v]
        );
    }
}
