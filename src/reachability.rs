//! Reachability probabilities, bounded and unbounded.
//!
//! For a goal set `G` and a forbidden set `B`, the probability of each state to
//! reach `G` (optionally within `k` steps) without first entering `B \ G` is
//! computed in three stages:
//!
//! 1. **Partition.** Goal states are fixed at 1, forbidden states (that are not
//!    goal states) at 0. Among the remaining states, the backward closure from
//!    `G` through non-forbidden states yields the *good* states; every other
//!    state cannot reach the goal and is fixed at 0 without numeric work.
//!    In the unbounded case, good states that cannot reach a zero state (or a
//!    state whose outgoing mass falls short of 1) without passing through `G`
//!    reach `G` almost surely and are fixed at exactly 1 as well.
//! 2. **Restriction.** `A` is the transition matrix restricted to the remaining
//!    good states, `b[i]` the mass flowing from state `i` directly into the
//!    states fixed at 1.
//! 3. **Solving.** Bounded: iterate `x <- A x + b` exactly `k` times from `x = 0`.
//!    Unbounded: solve `(I - A) x = b`, either directly or by iterating until
//!    the largest change drops below a tolerance.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, warn};

use crate::chain::{Dtmc, DEFAULT_EPSILON};
use crate::error::{Error, Result};
use crate::matrix::Matrix;
use crate::state_set::StateSet;

/// Cooperative cancellation flag, polled once per iteration by the
/// reachability loops.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Strategy for unbounded reachability.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum UnboundedMethod {
    /// Gaussian elimination on `(I - A) x = b`, falling back to
    /// [`UnboundedMethod::Iterative`] when the system is singular.
    #[default]
    Direct,
    /// Value iteration until the largest entry-wise change is below the tolerance.
    Iterative,
}

/// Configuration for reachability computations.
///
/// Use `ReachabilityOptions::default()` for standard settings.
#[derive(Debug, Clone)]
pub struct ReachabilityOptions {
    /// Strategy for the unbounded case (default: `Direct`)
    pub method: UnboundedMethod,
    /// Convergence threshold for iteration (default: `1e-9`)
    pub tolerance: f64,
    /// Iteration cap before reporting [`Error::DidNotConverge`] (default: `1_000_000`)
    pub max_iterations: usize,
    /// Optional cancellation flag (default: none)
    pub cancel: Option<CancelToken>,
}

impl Default for ReachabilityOptions {
    fn default() -> Self {
        Self {
            method: UnboundedMethod::Direct,
            tolerance: 1e-9,
            max_iterations: 1_000_000,
            cancel: None,
        }
    }
}

impl ReachabilityOptions {
    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }
}

impl Dtmc {
    /// States outside `goal` and `avoid` that can reach `goal` through states
    /// outside `avoid`.
    ///
    /// Least fixpoint: a state is marked once it has a transition into `goal`
    /// or into an already marked state.
    pub fn can_reach(&self, goal: &StateSet, avoid: &StateSet) -> StateSet {
        let mut predecessors = vec![Vec::new(); self.num_states()];
        for t in self.transitions() {
            predecessors[t.target.index()].push(t.source);
        }

        let mut marked = StateSet::with_capacity(self.num_states());
        let mut queue: VecDeque<_> = goal.iter().collect();
        while let Some(s) = queue.pop_front() {
            for &p in &predecessors[s.index()] {
                if goal.contains(p) || avoid.contains(p) {
                    continue;
                }
                if marked.insert(p) {
                    queue.push_back(p);
                }
            }
        }
        marked
    }

    /// Probability, for every state, of reaching `goal` without first entering
    /// `forbidden`, within `steps` transitions if given.
    ///
    /// See [`Dtmc::reachability_with`].
    pub fn reachability(&self, goal: &StateSet, forbidden: &StateSet, steps: Option<usize>) -> Result<Vec<f64>> {
        self.reachability_with(goal, forbidden, steps, &ReachabilityOptions::default())
    }

    /// Probability, for every state (by index), of reaching `goal` without first
    /// entering `forbidden`, within `steps` transitions if given.
    ///
    /// A state in both sets counts as a goal state.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyStateSpace`] if the chain has no states
    /// - [`Error::InvalidStateReference`] if `goal` or `forbidden` mention a foreign state
    /// - [`Error::DidNotConverge`] if iteration hits `options.max_iterations`
    /// - [`Error::Cancelled`] if `options.cancel` fires
    pub fn reachability_with(
        &self,
        goal: &StateSet,
        forbidden: &StateSet,
        steps: Option<usize>,
        options: &ReachabilityOptions,
    ) -> Result<Vec<f64>> {
        let n = self.num_states();
        if n == 0 {
            return Err(Error::EmptyStateSpace);
        }
        self.check_states(goal)?;
        self.check_states(forbidden)?;

        let blocked = forbidden.difference(goal);
        let good = self.can_reach(goal, &blocked);
        let sure = match steps {
            Some(_) => StateSet::new(),
            None => self.almost_sure(goal, &good),
        };
        let maybe = good.difference(&sure);
        debug!(
            "reachability: {} goal, {} blocked, {} almost sure, {} to solve, {} unreachable",
            goal.len(),
            blocked.len(),
            sure.len(),
            maybe.len(),
            n - goal.len() - blocked.len() - good.len()
        );

        let m = self.transition_matrix();
        let maybe_idx: Vec<usize> = maybe.iter().map(|s| s.index()).collect();
        let one_idx: Vec<usize> = goal.union(&sure).iter().map(|s| s.index()).collect();
        let a = m.submatrix(&maybe_idx, &maybe_idx);
        let b: Vec<f64> = maybe_idx
            .iter()
            .map(|&i| one_idx.iter().map(|&j| m.get(i, j)).sum())
            .collect();

        let x = match steps {
            Some(k) => bounded(&a, &b, k, options)?,
            None => match options.method {
                UnboundedMethod::Direct => match direct(&a, &b) {
                    Ok(x) => x,
                    Err(Error::Singular) => {
                        warn!("reachability: singular system, falling back to iteration");
                        iterate(&a, &b, options)?
                    }
                    Err(e) => return Err(e),
                },
                UnboundedMethod::Iterative => iterate(&a, &b, options)?,
            },
        };

        let mut result = vec![0.0; n];
        for &i in &one_idx {
            result[i] = 1.0;
        }
        for (&i, xi) in maybe_idx.iter().zip(x) {
            result[i] = xi.clamp(0.0, 1.0);
        }
        Ok(result)
    }

    /// States of `good` that reach `goal` with probability 1.
    ///
    /// A good state fails to do so iff, while avoiding `goal`, it can reach a
    /// state outside `goal ∪ good` (probability 0) or a state whose outgoing
    /// probabilities sum to less than 1.
    fn almost_sure(&self, goal: &StateSet, good: &StateSet) -> StateSet {
        let m = self.transition_matrix();
        let leaking: StateSet = good
            .iter()
            .filter(|s| m.row(s.index()).iter().sum::<f64>() < 1.0 - DEFAULT_EPSILON)
            .collect();
        let zero = goal.union(good).complement(self.num_states());
        let escaping = self.can_reach(&zero.union(&leaking), goal).union(&leaking);
        good.difference(&escaping)
    }
}

/// `x <- A x + b`, exactly `steps` times from `x = 0`.
fn bounded(a: &Matrix, b: &[f64], steps: usize, options: &ReachabilityOptions) -> Result<Vec<f64>> {
    let mut x = vec![0.0; b.len()];
    for _ in 0..steps {
        options.check_cancelled()?;
        x = step(a, b, &x);
    }
    Ok(x)
}

/// Solves `(I - A) x = b`.
fn direct(a: &Matrix, b: &[f64]) -> Result<Vec<f64>> {
    let n = b.len();
    let mut system = Matrix::identity(n);
    for i in 0..n {
        for j in 0..n {
            system.set(i, j, system.get(i, j) - a.get(i, j));
        }
    }
    system.solve(b)
}

/// Iterates `x <- A x + b` from `x = 0` until the largest change is below the tolerance.
fn iterate(a: &Matrix, b: &[f64], options: &ReachabilityOptions) -> Result<Vec<f64>> {
    let mut x = vec![0.0; b.len()];
    let mut delta = f64::INFINITY;
    for iteration in 1..=options.max_iterations {
        options.check_cancelled()?;
        let next = step(a, b, &x);
        delta = next.iter().zip(&x).map(|(p, q)| (p - q).abs()).fold(0.0, f64::max);
        x = next;
        if delta < options.tolerance {
            debug!("iterate: converged after {} iterations (delta = {:e})", iteration, delta);
            return Ok(x);
        }
    }
    Err(Error::DidNotConverge {
        iterations: options.max_iterations,
        delta,
    })
}

fn step(a: &Matrix, b: &[f64], x: &[f64]) -> Vec<f64> {
    a.mul_vec(x).into_iter().zip(b).map(|(ax, bi)| ax + bi).collect()
}
