//! Discrete-time Markov chains.
//!
//! [`Dtmc`] is the owning aggregate of the crate: states and transitions are only
//! created through it and live exactly as long as it does. All numerical
//! analyses (`transient`, `reachability`) and formula evaluation go through the
//! chain, which lazily materializes and caches its transition matrix.
//!
//! # Identity and caching
//!
//! Every chain gets a process-unique identity at construction, and a version
//! counter that is bumped by every mutation. The pair is used as the cache key
//! for the transition matrix and for formula satisfaction sets, so a cached
//! result is never served for a different chain, nor for a chain that changed.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;

use crate::error::{Error, Result};
use crate::matrix::Matrix;
use crate::state_set::StateSet;
use crate::types::StateId;

static NEXT_CHAIN_ID: AtomicU64 = AtomicU64::new(0);

/// Default tolerance for [`Dtmc::validate`].
pub const DEFAULT_EPSILON: f64 = 1e-9;

/// A state of a chain.
///
/// Equality is by identifier only.
#[derive(Debug, Clone)]
pub struct State {
    id: StateId,
    name: String,
    labels: BTreeSet<String>,
}

impl State {
    pub fn id(&self) -> StateId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for State {}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A transition `source -- probability --> target`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transition {
    pub source: StateId,
    pub target: StateId,
    pub probability: f64,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -- {} --> {}", self.source, self.probability, self.target)
    }
}

/// Identity of a chain at a given point of its mutation history.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ChainKey {
    id: u64,
    version: u64,
}

/// Discrete-time Markov chain.
pub struct Dtmc {
    id: u64,
    version: u64,
    states: Vec<State>,
    /// Ordered by `(source, target)`; at most one entry per pair.
    transitions: BTreeMap<(StateId, StateId), f64>,
    initial: Option<StateId>,
    matrix: RefCell<Option<Rc<Matrix>>>,
}

impl Dtmc {
    pub fn new() -> Self {
        Self {
            id: NEXT_CHAIN_ID.fetch_add(1, Ordering::Relaxed),
            version: 0,
            states: Vec::new(),
            transitions: BTreeMap::new(),
            initial: None,
            matrix: RefCell::new(None),
        }
    }

    /// Identity of this chain in its current version.
    pub fn key(&self) -> ChainKey {
        ChainKey {
            id: self.id,
            version: self.version,
        }
    }

    fn touch(&mut self) {
        self.version += 1;
        *self.matrix.get_mut() = None;
    }

    fn check_state(&self, state: StateId) -> Result<()> {
        if state.index() < self.states.len() {
            Ok(())
        } else {
            Err(Error::InvalidStateReference(state))
        }
    }

    /// Checks that every member of `set` is a state of this chain.
    pub fn check_states(&self, set: &StateSet) -> Result<()> {
        match set.max() {
            Some(s) => self.check_state(s),
            None => Ok(()),
        }
    }
}

impl Default for Dtmc {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Dtmc {
    /// The clone is a distinct chain: it gets a fresh identity, so caches
    /// built against the original are never reused for it.
    fn clone(&self) -> Self {
        Self {
            id: NEXT_CHAIN_ID.fetch_add(1, Ordering::Relaxed),
            version: 0,
            states: self.states.clone(),
            transitions: self.transitions.clone(),
            initial: self.initial,
            matrix: RefCell::new(None),
        }
    }
}

impl fmt::Debug for Dtmc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dtmc")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("states", &self.states.len())
            .field("transitions", &self.transitions.len())
            .finish()
    }
}

impl fmt::Display for Dtmc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DTMC")?;
        for state in &self.states {
            write!(f, "  {}", state)?;
            if !state.labels.is_empty() {
                write!(f, " {:?}", state.labels)?;
            }
            writeln!(f)?;
        }
        for t in self.transitions() {
            writeln!(f, "  {}", t)?;
        }
        Ok(())
    }
}

// Construction
impl Dtmc {
    /// Allocates a fresh state with a unique index.
    ///
    /// The name defaults to `s{index}`. The first state created becomes the
    /// initial state unless [`Dtmc::set_initial`] picks another one.
    pub fn add_state(&mut self, name: Option<&str>, labels: &[&str]) -> StateId {
        let id = StateId::new(self.states.len());
        let name = match name {
            Some(name) => name.to_string(),
            None => id.to_string(),
        };
        self.states.push(State {
            id,
            name,
            labels: labels.iter().map(|l| l.to_string()).collect(),
        });
        if self.initial.is_none() {
            self.initial = Some(id);
        }
        self.touch();
        id
    }

    /// Attaches an atomic proposition to a state.
    pub fn add_label(&mut self, state: StateId, label: &str) -> Result<()> {
        self.check_state(state)?;
        if self.states[state.index()].labels.insert(label.to_string()) {
            self.touch();
        }
        Ok(())
    }

    /// Adds the transition `source -- p --> target`.
    ///
    /// Fails with [`Error::InvalidProbability`] unless `0 < p <= 1`.
    /// A second transition between the same pair of states replaces the first.
    pub fn add_transition(&mut self, source: StateId, target: StateId, p: f64) -> Result<Transition> {
        if !(p > 0.0 && p <= 1.0) {
            return Err(Error::InvalidProbability(p));
        }
        self.check_state(source)?;
        self.check_state(target)?;
        if let Some(old) = self.transitions.insert((source, target), p) {
            debug!("add_transition: replacing {} -> {} ({} => {})", source, target, old, p);
        }
        self.touch();
        Ok(Transition {
            source,
            target,
            probability: p,
        })
    }

    pub fn set_initial(&mut self, state: StateId) -> Result<()> {
        self.check_state(state)?;
        self.initial = Some(state);
        Ok(())
    }
}

// Read-only access
impl Dtmc {
    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn num_transitions(&self) -> usize {
        self.transitions.len()
    }

    pub fn initial(&self) -> Option<StateId> {
        self.initial
    }

    pub fn state(&self, id: StateId) -> Option<&State> {
        self.states.get(id.index())
    }

    /// Looks up a state by its display name.
    pub fn state_by_name(&self, name: &str) -> Option<StateId> {
        self.states.iter().find(|s| s.name == name).map(|s| s.id)
    }

    /// All states, in index order.
    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.states.iter()
    }

    /// All states as a set.
    pub fn all_states(&self) -> StateSet {
        StateSet::full(self.states.len())
    }

    /// All transitions, ordered by `(source, target)`.
    pub fn transitions(&self) -> impl Iterator<Item = Transition> + '_ {
        self.transitions.iter().map(|(&(source, target), &probability)| Transition {
            source,
            target,
            probability,
        })
    }

    /// Outgoing transitions of a state, ordered by target.
    pub fn successors(&self, state: StateId) -> impl Iterator<Item = Transition> + '_ {
        self.transitions
            .range((state, StateId::new(0))..=(state, StateId::new(usize::MAX)))
            .map(|(&(source, target), &probability)| Transition {
                source,
                target,
                probability,
            })
    }

    pub fn probability(&self, source: StateId, target: StateId) -> f64 {
        self.transitions.get(&(source, target)).copied().unwrap_or(0.0)
    }

    /// States carrying the given atomic proposition.
    pub fn labelled(&self, label: &str) -> StateSet {
        self.states.iter().filter(|s| s.has_label(label)).map(|s| s.id).collect()
    }

    /// Returns the transition matrix, building it if the chain changed since
    /// the last build.
    pub fn transition_matrix(&self) -> Rc<Matrix> {
        let mut cache = self.matrix.borrow_mut();
        match cache.as_ref() {
            Some(m) => Rc::clone(m),
            None => {
                let m = Rc::new(Matrix::build(self));
                *cache = Some(Rc::clone(&m));
                m
            }
        }
    }

    /// Checks that the outgoing probabilities of every state with at least one
    /// outgoing transition sum to 1 within `epsilon`.
    ///
    /// Reports the offending state with the smallest index.
    pub fn validate(&self, epsilon: f64) -> Result<()> {
        for state in &self.states {
            let mut outgoing = self.successors(state.id).peekable();
            if outgoing.peek().is_none() {
                continue;
            }
            let sum: f64 = outgoing.map(|t| t.probability).sum();
            if (sum - 1.0).abs() > epsilon {
                return Err(Error::NotStochastic { state: state.id, sum });
            }
        }
        Ok(())
    }
}
