//! Recursive PCTL evaluation.
//!
//! State formulas evaluate to satisfaction sets, path formulas to one probability
//! per state. Every node caches its result keyed by the chain identity and
//! version it was computed against (see [`ChainKey`]) together with the
//! reachability method and tolerance. A node shared between branches is only
//! computed once, and a mutated or different chain, or a request with other
//! numeric settings, is never served a stale result.

use std::rc::Rc;

use log::{debug, trace};

use crate::chain::{ChainKey, Dtmc};
use crate::error::{Error, Result};
use crate::formula::{PathFormula, PathKind, StateFormula, StateKind};
use crate::reachability::{ReachabilityOptions, UnboundedMethod};
use crate::state_set::StateSet;
use crate::types::StateId;

/// Cache key of a formula node.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) struct EvalKey {
    chain: ChainKey,
    method: UnboundedMethod,
    tolerance: u64,
}

impl EvalKey {
    fn new(chain: &Dtmc, options: &ReachabilityOptions) -> Self {
        Self {
            chain: chain.key(),
            method: options.method,
            tolerance: options.tolerance.to_bits(),
        }
    }
}

pub trait Eval {
    type Output;

    /// Evaluates with explicit reachability settings.
    ///
    /// A cached result is reused only for the same chain version, method and
    /// tolerance.
    fn eval_with(&self, chain: &Dtmc, options: &ReachabilityOptions) -> Result<Self::Output>;

    fn eval(&self, chain: &Dtmc) -> Result<Self::Output> {
        self.eval_with(chain, &ReachabilityOptions::default())
    }
}

impl Dtmc {
    pub fn eval<E: Eval + ?Sized>(&self, value: &E) -> Result<E::Output> {
        value.eval(self)
    }

    /// Satisfaction set of a state formula.
    pub fn check(&self, formula: &StateFormula) -> Result<StateSet> {
        formula.eval(self)
    }

    /// Like [`Dtmc::check`], with explicit reachability settings.
    pub fn check_with(&self, formula: &StateFormula, options: &ReachabilityOptions) -> Result<StateSet> {
        formula.eval_with(self, options)
    }

    /// Checks whether the initial state satisfies the formula.
    pub fn holds_initially(&self, formula: &StateFormula) -> Result<bool> {
        let initial = self.initial().ok_or(Error::EmptyStateSpace)?;
        Ok(formula.eval(self)?.contains(initial))
    }
}

impl Eval for StateFormula {
    type Output = StateSet;

    fn eval_with(&self, chain: &Dtmc, options: &ReachabilityOptions) -> Result<StateSet> {
        let key = EvalKey::new(chain, options);
        if let Some((cached_key, set)) = self.cache.borrow().as_ref() {
            if *cached_key == key {
                trace!("eval {}: cached", self);
                return Ok(set.clone());
            }
        }

        let n = chain.num_states();
        let set = match self.kind() {
            StateKind::True => chain.all_states(),
            StateKind::False => StateSet::new(),
            StateKind::Atom(label) => chain.labelled(label),
            StateKind::And(a, b) => {
                let sat_a = a.eval_with(chain, options)?;
                let sat_b = b.eval_with(chain, options)?;
                sat_a.intersection(&sat_b)
            }
            StateKind::Or(a, b) => {
                let sat_a = a.eval_with(chain, options)?;
                let sat_b = b.eval_with(chain, options)?;
                sat_a.union(&sat_b)
            }
            StateKind::Not(a) => a.eval_with(chain, options)?.complement(n),
            StateKind::Prob(interval, psi) => {
                let probabilities = psi.eval_with(chain, options)?;
                probabilities
                    .iter()
                    .enumerate()
                    .filter(|&(_, &p)| interval.contains(p))
                    .map(|(i, _)| StateId::new(i))
                    .collect()
            }
        };
        trace!("eval {} = {}", self, set);

        *self.cache.borrow_mut() = Some((key, set.clone()));
        Ok(set)
    }
}

impl Eval for PathFormula {
    type Output = Rc<Vec<f64>>;

    /// Probability of the path formula for every state, by index.
    fn eval_with(&self, chain: &Dtmc, options: &ReachabilityOptions) -> Result<Rc<Vec<f64>>> {
        if chain.num_states() == 0 {
            return Err(Error::EmptyStateSpace);
        }
        let key = EvalKey::new(chain, options);
        if let Some((cached_key, probabilities)) = self.cache.borrow().as_ref() {
            if *cached_key == key {
                trace!("eval {}: cached", self);
                return Ok(Rc::clone(probabilities));
            }
        }

        debug!("computing probabilities for {}", self);
        let probabilities = match self.kind() {
            PathKind::Next(phi) => {
                // Row i of M times the indicator of SAT(phi)
                let sat = phi.eval_with(chain, options)?;
                let mut indicator = vec![0.0; chain.num_states()];
                for s in &sat {
                    indicator[s.index()] = 1.0;
                }
                chain.transition_matrix().mul_vec(&indicator)
            }
            PathKind::Until(phi1, phi2) => {
                let sat1 = phi1.eval_with(chain, options)?;
                let sat2 = phi2.eval_with(chain, options)?;
                let forbidden = sat1.complement(chain.num_states());
                chain.reachability_with(&sat2, &forbidden, None, options)?
            }
            PathKind::BoundedUntil(phi1, phi2, steps) => {
                let sat1 = phi1.eval_with(chain, options)?;
                let sat2 = phi2.eval_with(chain, options)?;
                let forbidden = sat1.complement(chain.num_states());
                chain.reachability_with(&sat2, &forbidden, Some(*steps), options)?
            }
        };

        let probabilities = Rc::new(probabilities);
        *self.cache.borrow_mut() = Some((key, Rc::clone(&probabilities)));
        Ok(probabilities)
    }
}

impl PathFormula {
    /// Probability that a path starting in `state` satisfies this formula.
    pub fn compute_probability(&self, state: StateId, chain: &Dtmc) -> Result<f64> {
        let probabilities = self.eval(chain)?;
        probabilities
            .get(state.index())
            .copied()
            .ok_or(Error::InvalidStateReference(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::transient::Distribution;
    use crate::types::Interval;

    /// s0 (a), s1 (a), s2 (b).
    fn pctl_chain() -> (Dtmc, [StateId; 3]) {
        let mut chain = Dtmc::new();
        let s0 = chain.add_state(None, &["a"]);
        let s1 = chain.add_state(None, &["a"]);
        let s2 = chain.add_state(None, &["b"]);
        chain.add_transition(s0, s1, 0.6).unwrap();
        chain.add_transition(s0, s0, 0.3).unwrap();
        chain.add_transition(s0, s2, 0.1).unwrap();
        chain.add_transition(s2, s2, 0.8).unwrap();
        chain.add_transition(s2, s0, 0.2).unwrap();
        (chain, [s0, s1, s2])
    }

    fn set(states: &[StateId]) -> StateSet {
        states.iter().copied().collect()
    }

    #[test]
    fn test_constants_and_atoms() {
        let (chain, [s0, s1, s2]) = pctl_chain();
        assert_eq!(chain.check(&StateFormula::tt()).unwrap(), set(&[s0, s1, s2]));
        assert!(chain.check(&StateFormula::ff()).unwrap().is_empty());
        assert_eq!(chain.check(&StateFormula::atom("a")).unwrap(), set(&[s0, s1]));
        assert!(chain.check(&StateFormula::atom("zzz")).unwrap().is_empty());
    }

    #[test]
    fn test_boolean_connectives() {
        let (mut chain, [s0, s1, s2]) = pctl_chain();
        chain.add_label(s0, "b").unwrap();

        let a = Rc::new(StateFormula::atom("a"));
        let b = Rc::new(StateFormula::atom("b"));
        let and = StateFormula::conjunction(a.clone(), b.clone());
        let or = StateFormula::disjunction(a.clone(), b.clone());
        let not = StateFormula::negation(a.clone());

        assert_eq!(chain.check(&and).unwrap(), set(&[s0]));
        assert_eq!(chain.check(&or).unwrap(), set(&[s0, s1, s2]));
        assert_eq!(chain.check(&not).unwrap(), set(&[s2]));
    }

    #[test]
    fn test_negation_is_complement() {
        let (chain, _) = pctl_chain();
        let formulas = vec![
            StateFormula::tt(),
            StateFormula::ff(),
            StateFormula::atom("a"),
            StateFormula::atom("a") | StateFormula::atom("b"),
            StateFormula::prob(
                Interval::at_least(0.5).unwrap(),
                PathFormula::next(StateFormula::atom("a")),
            ),
        ];
        for phi in formulas {
            let phi = Rc::new(phi);
            let sat = chain.check(&phi).unwrap();
            let neg = chain.check(&StateFormula::negation(phi.clone())).unwrap();
            assert_eq!(neg, sat.complement(chain.num_states()), "formula {}", phi);
            assert!(neg.intersection(&sat).is_empty());
        }
    }

    #[test]
    fn test_connectives_are_associative_and_commutative() {
        let (mut chain, [s0, _, s2]) = pctl_chain();
        chain.add_label(s0, "c").unwrap();
        chain.add_label(s2, "c").unwrap();
        let atoms = || (StateFormula::atom("a"), StateFormula::atom("b"), StateFormula::atom("c"));

        let (a, b, c) = atoms();
        let left = chain.check(&((a & b) & c)).unwrap();
        let (a, b, c) = atoms();
        let right = chain.check(&(a & (b & c))).unwrap();
        assert_eq!(left, right);

        let (a, b, c) = atoms();
        let left = chain.check(&((a | b) | c)).unwrap();
        let (a, b, c) = atoms();
        let right = chain.check(&(a | (b | c))).unwrap();
        assert_eq!(left, right);

        let (a, b, _) = atoms();
        let ab = chain.check(&(a & b)).unwrap();
        let (a, b, _) = atoms();
        assert_eq!(ab, chain.check(&(b & a)).unwrap());

        let (a, _, c) = atoms();
        let ac = chain.check(&(a | c)).unwrap();
        let (a, _, c) = atoms();
        assert_eq!(ac, chain.check(&(c | a)).unwrap());
    }

    #[test]
    fn test_next() {
        let (chain, [s0, s1, s2]) = pctl_chain();
        let psi = PathFormula::next(StateFormula::atom("b"));
        assert!((psi.compute_probability(s0, &chain).unwrap() - 0.1).abs() < 1e-12);
        assert_eq!(psi.compute_probability(s1, &chain).unwrap(), 0.0);
        assert!((psi.compute_probability(s2, &chain).unwrap() - 0.8).abs() < 1e-12);

        // Agrees with the one-step transient distribution
        let sat_b = chain.check(&StateFormula::atom("b")).unwrap();
        for s in chain.all_states().iter() {
            let pi = chain.transient(1, &Distribution::point(&chain, s).unwrap()).unwrap();
            assert!((pi.mass_of(&sat_b) - psi.compute_probability(s, &chain).unwrap()).abs() < 1e-12);
        }
    }

    #[test]
    fn test_bounded_until() {
        let (chain, [s0, s1, s2]) = pctl_chain();
        let psi = PathFormula::bounded_until(StateFormula::atom("a"), StateFormula::atom("b"), 2);
        assert!((psi.compute_probability(s0, &chain).unwrap() - 0.13).abs() < 1e-12);
        assert_eq!(psi.compute_probability(s1, &chain).unwrap(), 0.0);
        assert_eq!(psi.compute_probability(s2, &chain).unwrap(), 1.0);

        let phi = StateFormula::prob(Interval::new(0.1, 1.0).unwrap(), psi);
        let sat = chain.check(&phi).unwrap();
        assert_eq!(sat, set(&[s0, s2]));
    }

    #[test]
    fn test_until() {
        let (chain, [s0, s1, s2]) = pctl_chain();
        // From s0: reach b before leaving a. Solve x = 0.3 x + 0.1  =>  x = 1/7
        let psi = PathFormula::until(StateFormula::atom("a"), StateFormula::atom("b"));
        assert!((psi.compute_probability(s0, &chain).unwrap() - 1.0 / 7.0).abs() < 1e-12);
        assert_eq!(psi.compute_probability(s1, &chain).unwrap(), 0.0);
        assert_eq!(psi.compute_probability(s2, &chain).unwrap(), 1.0);

        // true U b: s1 has no outgoing transitions, so the same equation holds
        let psi = PathFormula::until(StateFormula::tt(), StateFormula::atom("b"));
        assert!((psi.compute_probability(s0, &chain).unwrap() - 1.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_compute_probability_foreign_state() {
        let (chain, _) = pctl_chain();
        let psi = PathFormula::next(StateFormula::tt());
        let foreign = StateId::new(3);
        assert_eq!(psi.compute_probability(foreign, &chain), Err(Error::InvalidStateReference(foreign)));
    }

    #[test]
    fn test_shared_node_is_cached() {
        let (chain, _) = pctl_chain();
        let a = Rc::new(StateFormula::atom("a"));
        let phi = StateFormula::conjunction(a.clone(), StateFormula::negation(a.clone()));
        assert!(a.cached().is_none());
        assert!(chain.check(&phi).unwrap().is_empty());
        assert_eq!(a.cached(), Some(chain.labelled("a")));
        assert!(phi.cached().is_some());
    }

    #[test]
    fn test_cache_follows_chain_identity() {
        let (mut chain, [_, s1, s2]) = pctl_chain();
        let b = StateFormula::atom("b");
        assert_eq!(chain.check(&b).unwrap(), set(&[s2]));

        // Mutated chain: recomputed
        chain.add_label(s1, "b").unwrap();
        assert_eq!(chain.check(&b).unwrap(), set(&[s1, s2]));

        // Different chain: recomputed
        let mut other = Dtmc::new();
        let t0 = other.add_state(None, &["b"]);
        other.add_state(None, &[]);
        assert_eq!(other.check(&b).unwrap(), set(&[t0]));
    }

    #[test]
    fn test_reset() {
        let (chain, _) = pctl_chain();
        let a = Rc::new(StateFormula::atom("a"));
        let psi = Rc::new(PathFormula::until(a.clone(), StateFormula::atom("b")));
        let phi = StateFormula::prob(Interval::at_least(0.1).unwrap(), psi.clone());
        chain.check(&phi).unwrap();
        assert!(a.cached().is_some());
        assert!(psi.cached().is_some());
        phi.reset();
        assert!(phi.cached().is_none());
        assert!(psi.cached().is_none());
        assert!(a.cached().is_none());
    }

    #[test]
    fn test_holds_initially() {
        let (chain, _) = pctl_chain();
        assert!(chain.holds_initially(&StateFormula::atom("a")).unwrap());
        assert!(!chain.holds_initially(&StateFormula::atom("b")).unwrap());
        assert_eq!(Dtmc::new().holds_initially(&StateFormula::tt()), Err(Error::EmptyStateSpace));
    }

    #[test]
    fn test_check_with_options() {
        use crate::reachability::{CancelToken, UnboundedMethod};

        let (chain, [s0, _, s2]) = pctl_chain();
        let phi = StateFormula::prob(
            Interval::at_least(0.1).unwrap(),
            PathFormula::until(StateFormula::atom("a"), StateFormula::atom("b")),
        );

        let cancel = CancelToken::new();
        cancel.cancel();
        let options = ReachabilityOptions {
            method: UnboundedMethod::Iterative,
            cancel: Some(cancel),
            ..ReachabilityOptions::default()
        };
        assert_eq!(chain.check_with(&phi, &options), Err(Error::Cancelled));
        assert!(phi.cached().is_none());

        let options = ReachabilityOptions {
            method: UnboundedMethod::Iterative,
            ..ReachabilityOptions::default()
        };
        assert_eq!(chain.check_with(&phi, &options).unwrap(), set(&[s0, s2]));
    }

    #[test]
    fn test_path_formulas_on_empty_chain() {
        let chain = Dtmc::new();
        let paths = vec![
            Rc::new(PathFormula::next(StateFormula::tt())),
            Rc::new(PathFormula::until(StateFormula::tt(), StateFormula::tt())),
            Rc::new(PathFormula::bounded_until(StateFormula::tt(), StateFormula::tt(), 3)),
        ];
        for psi in paths {
            assert_eq!(chain.eval(psi.as_ref()), Err(Error::EmptyStateSpace), "formula {}", psi);
            assert!(psi.cached().is_none());
            let phi = StateFormula::prob(Interval::new(0.0, 1.0).unwrap(), psi.clone());
            assert_eq!(chain.check(&phi), Err(Error::EmptyStateSpace), "formula {}", phi);
        }

        // Pure set formulas need no probabilities
        assert!(chain.check(&StateFormula::atom("a")).unwrap().is_empty());
    }

    /// Retry loop that reaches `goal` with probability one, plus a separate sink.
    fn retry_chain() -> (Dtmc, [StateId; 5]) {
        let mut chain = Dtmc::new();
        let start = chain.add_state(Some("start"), &[]);
        let attempt = chain.add_state(Some("attempt"), &[]);
        let lost = chain.add_state(Some("lost"), &[]);
        let goal = chain.add_state(Some("goal"), &["goal"]);
        let sink = chain.add_state(Some("sink"), &[]);
        chain.add_transition(start, attempt, 1.0).unwrap();
        chain.add_transition(attempt, goal, 0.3).unwrap();
        chain.add_transition(attempt, lost, 0.7).unwrap();
        chain.add_transition(lost, attempt, 0.3).unwrap();
        chain.add_transition(lost, start, 0.7).unwrap();
        chain.add_transition(goal, goal, 1.0).unwrap();
        chain.add_transition(sink, sink, 1.0).unwrap();
        (chain, [start, attempt, lost, goal, sink])
    }

    #[test]
    fn test_probability_one_and_zero_bounds() {
        use crate::reachability::UnboundedMethod;

        let (chain, [start, attempt, lost, goal, sink]) = retry_chain();
        for method in [UnboundedMethod::Direct, UnboundedMethod::Iterative] {
            let options = ReachabilityOptions {
                method,
                ..ReachabilityOptions::default()
            };
            let until = || Rc::new(PathFormula::until(StateFormula::tt(), StateFormula::atom("goal")));

            let sure = StateFormula::prob(Interval::at_least(1.0).unwrap(), until());
            assert_eq!(chain.check_with(&sure, &options).unwrap(), set(&[start, attempt, lost, goal]));

            let never = StateFormula::prob(Interval::exactly(0.0).unwrap(), until());
            assert_eq!(chain.check_with(&never, &options).unwrap(), set(&[sink]));

            let any = StateFormula::prob(Interval::new(0.0, 1.0).unwrap(), until());
            assert_eq!(chain.check_with(&any, &options).unwrap(), chain.all_states());

            let probabilities = until().eval_with(&chain, &options).unwrap();
            assert_eq!(*probabilities, vec![1.0, 1.0, 1.0, 1.0, 0.0]);
        }
    }

    #[test]
    fn test_cache_follows_settings() {
        use crate::reachability::UnboundedMethod;

        // Symmetric walk on 0..=4 with both ends absorbing
        let mut chain = Dtmc::new();
        let s: Vec<_> = (0..=4).map(|_| chain.add_state(None, &[])).collect();
        chain.add_label(s[4], "won").unwrap();
        chain.add_transition(s[0], s[0], 1.0).unwrap();
        chain.add_transition(s[4], s[4], 1.0).unwrap();
        for i in 1..4 {
            chain.add_transition(s[i], s[i + 1], 0.5).unwrap();
            chain.add_transition(s[i], s[i - 1], 0.5).unwrap();
        }

        let psi = PathFormula::until(StateFormula::tt(), StateFormula::atom("won"));
        let coarse = ReachabilityOptions {
            method: UnboundedMethod::Iterative,
            tolerance: 1e-2,
            ..ReachabilityOptions::default()
        };
        let rough = psi.eval_with(&chain, &coarse).unwrap();
        assert!((rough[2] - 0.5).abs() > 1e-4);
        assert!(Rc::ptr_eq(&rough, &psi.eval_with(&chain, &coarse).unwrap()));

        let exact = chain.eval(&psi).unwrap();
        assert!((exact[2] - 0.5).abs() < 1e-12);
        assert!((psi.compute_probability(s[1], &chain).unwrap() - 0.25).abs() < 1e-12);
    }
}
