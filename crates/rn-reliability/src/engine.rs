//! Validation and the discrete-time evolution loop.

use std::collections::BTreeMap;
use std::time::Instant;

use rayon::prelude::*;
use rn_belief::{arrival_probability, Network, PassStats};
use rn_core::{ensure, AnalysisConfig, Diagnostics, Error, NodeId, Real, Result};
use rn_graph::DirectedGraph;
use tracing::debug;

use crate::model::{
    NodeRates, ReliabilityProblem, ReliabilityResult, StateProbabilities,
};
use crate::TimeGrid;

/// Run a complete reliability analysis.
///
/// Validates the problem eagerly, builds the cascade network (the belief
/// machinery instantiated over cascade multipliers), then evolves every
/// node's 3-state distribution across the time grid.  Each step reads only
/// the previous step's distributions, so the evolution is a true Markov
/// chain and is parallelizable within an iteration set.
///
/// # Errors
/// Validation errors before any computation; `TimestepTooLarge`,
/// `InvariantViolation`, `OutOfBudget`, or `Cancelled` during it.  No
/// partial trajectories are returned on failure.
pub fn run_reliability(
    problem: &ReliabilityProblem,
    config: &AnalysisConfig,
) -> Result<ReliabilityResult> {
    let started = Instant::now();
    let n = problem.node_count;
    let grid = TimeGrid::uniform(problem.time_horizon, problem.dt)?;
    let rates = validate_problem(problem)?;

    // The cascade network: unit priors, cascade multipliers as edge
    // probabilities.  Its diamonds drive the exact cascade aggregation.
    let graph = DirectedGraph::new(n, problem.edges.clone())?;
    let unit_priors: BTreeMap<NodeId, Real> = (1..=n).map(|v| (v, 1.0)).collect();
    let network = Network::new(graph, &unit_priors, &problem.cascade, config)?;

    let estimate = network.memory_estimate()
        + (n + 1) * (grid.steps() + 1) * std::mem::size_of::<StateProbabilities>();
    if let Some(limit) = config.memory_limit_bytes {
        if estimate > limit {
            return Err(Error::OutOfBudget {
                required: estimate,
                limit,
            });
        }
    }

    // Redundancy groups, resolved to member lists once.
    let mut groups: BTreeMap<u32, Vec<NodeId>> = BTreeMap::new();
    for (&v, &gid) in &problem.redundancy_group {
        groups.entry(gid).or_default().push(v);
    }

    let dt = grid.dt();
    let tol = config.numerical_tolerance;
    let stats = PassStats::default();

    // Slot 0 is unused; every node starts from its known initial state.
    let mut trajectories: Vec<Vec<StateProbabilities>> = (0..=n)
        .map(|v| {
            let state = if v == 0 {
                StateProbabilities::from_state(crate::NodeState::Working)
            } else {
                StateProbabilities::from_state(problem.initial_state[&v])
            };
            let mut trajectory = Vec::with_capacity(grid.steps() + 1);
            trajectory.push(state);
            trajectory
        })
        .collect();

    for t in 1..=grid.steps() {
        if config.cancellation.is_cancelled() {
            return Err(Error::Cancelled);
        }
        debug!(step = t, time = grid.time(t), "reliability step");

        let prev: Vec<StateProbabilities> =
            trajectories.iter().map(|trajectory| trajectory[t - 1]).collect();
        let f_prev: Vec<Real> = prev.iter().map(|s| s.failed).collect();
        let group_working: BTreeMap<u32, Real> = groups
            .iter()
            .map(|(&gid, members)| {
                (gid, members.iter().map(|&u| prev[u].working).sum())
            })
            .collect();

        let step_node = |v: NodeId| -> Result<StateProbabilities> {
            let load = match problem.redundancy_group.get(&v) {
                Some(gid) => load_factor(
                    groups[gid].len() as Real,
                    group_working[gid],
                    problem.sharing_strength,
                ),
                None => 1.0,
            };
            let cascade = arrival_probability(&network, &f_prev, v, config, &stats)?;
            let lambda_eff = rates[v].lambda * load + cascade;
            let max_rate = lambda_eff.max(rates[v].mu);
            if dt * max_rate >= 1.0 {
                return Err(Error::TimestepTooLarge {
                    node: v,
                    rate: max_rate,
                    dt,
                    dt_max: 0.99 / max_rate,
                });
            }

            let p_fail = lambda_eff * dt;
            let p_repair = rates[v].mu * dt;
            let s = prev[v];
            // Failed mass enters repair instantly and gets this step's
            // repair draw together with the mass already under repair.
            let down = s.failed + s.under_repair;
            let next = StateProbabilities {
                working: s.working * (1.0 - p_fail) + down * p_repair,
                failed: s.working * p_fail,
                under_repair: down * (1.0 - p_repair),
            };

            let in_range = |x: Real| (-tol..=1.0 + tol).contains(&x);
            if !(in_range(next.working)
                && in_range(next.failed)
                && in_range(next.under_repair))
                || (next.sum() - 1.0).abs() > tol
            {
                return Err(Error::InvariantViolation(format!(
                    "state of node {v} at step {t} invalid: \
                     ({}, {}, {}) sums to {}",
                    next.working,
                    next.failed,
                    next.under_repair,
                    next.sum()
                )));
            }
            Ok(next)
        };

        for layer in network.topology().iteration_sets() {
            let computed: Vec<Result<StateProbabilities>> =
                if config.parallel && layer.len() > 1 {
                    layer.par_iter().map(|&v| step_node(v)).collect()
                } else {
                    layer.iter().map(|&v| step_node(v)).collect()
                };
            for (&v, value) in layer.iter().zip(computed) {
                trajectories[v].push(value?);
            }
        }
    }

    let result = (1..=n).map(|v| (v, trajectories[v].clone())).collect();
    Ok(ReliabilityResult {
        trajectories: result,
        diagnostics: Diagnostics {
            elapsed: started.elapsed(),
            peak_memory_estimate: estimate,
            warnings: network.warnings().to_vec(),
            max_conditioning_size: stats.max_conditioning(),
        },
    })
}

/// Load multiplier for a redundancy-group member: survivors absorb the
/// load of failed peers at the configured sharing strength, and the factor
/// never drops below one.
fn load_factor(group_size: Real, expected_working: Real, strength: Real) -> Real {
    if expected_working <= 0.0 {
        group_size
    } else {
        (1.0 + strength * (group_size - expected_working) / expected_working).max(1.0)
    }
}

/// Eager validation of everything the cascade network does not cover.
/// Returns the rates as a dense per-node table.
fn validate_problem(problem: &ReliabilityProblem) -> Result<Vec<NodeRates>> {
    let n = problem.node_count;
    ensure!(n > 0, "reliability model must have at least one node");
    ensure!(
        problem.sharing_strength.is_finite() && problem.sharing_strength >= 0.0,
        "sharing strength must be non-negative, got {}",
        problem.sharing_strength
    );

    let mut rates = vec![
        NodeRates {
            lambda: 0.0,
            mu: 0.0
        };
        n + 1
    ];
    for v in 1..=n {
        let r = problem
            .rates
            .get(&v)
            .ok_or_else(|| Error::InvalidInput(format!("missing rates for node {v}")))?;
        ensure!(
            r.lambda.is_finite() && r.lambda >= 0.0,
            "failure rate of node {v} must be non-negative, got {}",
            r.lambda
        );
        ensure!(
            r.mu.is_finite() && r.mu >= 0.0,
            "repair rate of node {v} must be non-negative, got {}",
            r.mu
        );
        ensure!(
            problem.initial_state.contains_key(&v),
            "missing initial state for node {v}"
        );
        rates[v] = *r;
    }
    for &v in problem.rates.keys() {
        ensure!(
            (1..=n).contains(&v),
            "rates given for unknown node {v} (nodes are 1..={n})"
        );
    }
    for &v in problem.initial_state.keys() {
        ensure!(
            (1..=n).contains(&v),
            "initial state given for unknown node {v} (nodes are 1..={n})"
        );
    }
    for &v in problem.redundancy_group.keys() {
        ensure!(
            (1..=n).contains(&v),
            "redundancy group names unknown node {v}"
        );
    }

    // The base-rate timestep bound; cascade and load sharing can only
    // raise λ_eff, which the evolution re-checks every step.
    let mut max_rate = 0.0;
    let mut argmax = 1;
    for v in 1..=n {
        let node_max = rates[v].lambda.max(rates[v].mu);
        if node_max > max_rate {
            max_rate = node_max;
            argmax = v;
        }
    }
    if problem.dt * max_rate >= 1.0 {
        return Err(Error::TimestepTooLarge {
            node: argmax,
            rate: max_rate,
            dt: problem.dt,
            dt_max: 0.99 / max_rate,
        });
    }
    Ok(rates)
}
