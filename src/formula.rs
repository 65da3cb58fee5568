//! PCTL formula abstract syntax.
//!
//! PCTL distinguishes two mutually recursive sorts:
//!
//! - **State formulas** ([`StateFormula`]) hold or fail in a state and evaluate to
//!   a satisfaction set: `true`, `false`, atomic propositions, `&`, `|`, `!` and
//!   the probabilistic operator `P[lb, ub](ψ)`.
//! - **Path formulas** ([`PathFormula`]) assign every state a probability:
//!   `X φ`, `φ1 U φ2` and `φ1 U<=k φ2`.
//!
//! Children are held behind [`Rc`], so one node (typically an atomic
//! proposition) can be shared between branches and its cached satisfaction set
//! reused. The structure is still acyclic: nodes can only be built from
//! existing nodes.
//!
//! The typed constructors make sort errors impossible at compile time. The
//! dynamic [`Formula`] wrapper, which is what the parser produces, checks the
//! sorts at construction and fails with [`Error::TypeMismatch`].

use std::cell::RefCell;
use std::fmt;
use std::ops::{BitAnd, BitOr, Not};
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::eval::EvalKey;
use crate::state_set::StateSet;
use crate::types::Interval;

/// Result cache of a formula node, keyed by the chain and settings it was
/// computed with.
pub(crate) type Cache<T> = RefCell<Option<(EvalKey, T)>>;

/// State formula variants.
#[derive(Debug)]
pub enum StateKind {
    True,
    False,
    Atom(String),
    And(Rc<StateFormula>, Rc<StateFormula>),
    Or(Rc<StateFormula>, Rc<StateFormula>),
    Not(Rc<StateFormula>),
    Prob(Interval, Rc<PathFormula>),
}

/// A state formula node together with its satisfaction-set cache.
#[derive(Debug)]
pub struct StateFormula {
    kind: StateKind,
    pub(crate) cache: Cache<StateSet>,
}

/// Path formula variants.
#[derive(Debug)]
pub enum PathKind {
    Next(Rc<StateFormula>),
    Until(Rc<StateFormula>, Rc<StateFormula>),
    BoundedUntil(Rc<StateFormula>, Rc<StateFormula>, usize),
}

/// A path formula node together with its probability-vector cache.
#[derive(Debug)]
pub struct PathFormula {
    kind: PathKind,
    pub(crate) cache: Cache<Rc<Vec<f64>>>,
}

impl StateFormula {
    fn new(kind: StateKind) -> Self {
        Self {
            kind,
            cache: RefCell::new(None),
        }
    }

    pub fn kind(&self) -> &StateKind {
        &self.kind
    }

    pub fn tt() -> Self {
        Self::new(StateKind::True)
    }

    pub fn ff() -> Self {
        Self::new(StateKind::False)
    }

    pub fn atom(label: impl Into<String>) -> Self {
        Self::new(StateKind::Atom(label.into()))
    }

    pub fn conjunction(lhs: impl Into<Rc<StateFormula>>, rhs: impl Into<Rc<StateFormula>>) -> Self {
        Self::new(StateKind::And(lhs.into(), rhs.into()))
    }

    pub fn disjunction(lhs: impl Into<Rc<StateFormula>>, rhs: impl Into<Rc<StateFormula>>) -> Self {
        Self::new(StateKind::Or(lhs.into(), rhs.into()))
    }

    pub fn negation(phi: impl Into<Rc<StateFormula>>) -> Self {
        Self::new(StateKind::Not(phi.into()))
    }

    /// `P[interval](psi)`.
    pub fn prob(interval: Interval, psi: impl Into<Rc<PathFormula>>) -> Self {
        Self::new(StateKind::Prob(interval, psi.into()))
    }

    /// The satisfaction set cached by the last evaluation, if any.
    pub fn cached(&self) -> Option<StateSet> {
        self.cache.borrow().as_ref().map(|(_, set)| set.clone())
    }

    /// Clears the cache of this node and all its descendants.
    pub fn reset(&self) {
        self.cache.borrow_mut().take();
        match &self.kind {
            StateKind::True | StateKind::False | StateKind::Atom(_) => {}
            StateKind::And(a, b) | StateKind::Or(a, b) => {
                a.reset();
                b.reset();
            }
            StateKind::Not(a) => a.reset(),
            StateKind::Prob(_, psi) => psi.reset(),
        }
    }
}

impl PathFormula {
    fn new(kind: PathKind) -> Self {
        Self {
            kind,
            cache: RefCell::new(None),
        }
    }

    pub fn kind(&self) -> &PathKind {
        &self.kind
    }

    /// `X phi`.
    pub fn next(phi: impl Into<Rc<StateFormula>>) -> Self {
        Self::new(PathKind::Next(phi.into()))
    }

    /// `phi1 U phi2`.
    pub fn until(phi1: impl Into<Rc<StateFormula>>, phi2: impl Into<Rc<StateFormula>>) -> Self {
        Self::new(PathKind::Until(phi1.into(), phi2.into()))
    }

    /// `phi1 U<=steps phi2`.
    pub fn bounded_until(
        phi1: impl Into<Rc<StateFormula>>,
        phi2: impl Into<Rc<StateFormula>>,
        steps: usize,
    ) -> Self {
        Self::new(PathKind::BoundedUntil(phi1.into(), phi2.into(), steps))
    }

    /// The probabilities cached by the last evaluation, if any.
    pub fn cached(&self) -> Option<Rc<Vec<f64>>> {
        self.cache.borrow().as_ref().map(|(_, v)| Rc::clone(v))
    }

    /// Clears the cache of this node and all its descendants.
    pub fn reset(&self) {
        self.cache.borrow_mut().take();
        match &self.kind {
            PathKind::Next(phi) => phi.reset(),
            PathKind::Until(a, b) | PathKind::BoundedUntil(a, b, _) => {
                a.reset();
                b.reset();
            }
        }
    }
}

impl BitAnd for StateFormula {
    type Output = StateFormula;

    fn bitand(self, rhs: Self) -> Self::Output {
        StateFormula::conjunction(self, rhs)
    }
}

impl BitOr for StateFormula {
    type Output = StateFormula;

    fn bitor(self, rhs: Self) -> Self::Output {
        StateFormula::disjunction(self, rhs)
    }
}

impl Not for StateFormula {
    type Output = StateFormula;

    fn not(self) -> Self::Output {
        StateFormula::negation(self)
    }
}

impl fmt::Display for StateFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            StateKind::True => write!(f, "true"),
            StateKind::False => write!(f, "false"),
            StateKind::Atom(a) => write!(f, "{}", a),
            StateKind::And(a, b) => write!(f, "({} & {})", a, b),
            StateKind::Or(a, b) => write!(f, "({} | {})", a, b),
            StateKind::Not(a) => write!(f, "!{}", a),
            StateKind::Prob(interval, psi) => write!(f, "P{}({})", interval, psi),
        }
    }
}

impl fmt::Display for PathFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            PathKind::Next(phi) => write!(f, "X {}", phi),
            PathKind::Until(a, b) => write!(f, "{} U {}", a, b),
            PathKind::BoundedUntil(a, b, k) => write!(f, "{} U<={} {}", a, k, b),
        }
    }
}

/// A formula of either sort, as produced by the parser.
#[derive(Debug, Clone)]
pub enum Formula {
    State(Rc<StateFormula>),
    Path(Rc<PathFormula>),
}

impl Formula {
    /// Name of the sort, for error messages.
    pub fn sort(&self) -> &'static str {
        match self {
            Formula::State(_) => "state",
            Formula::Path(_) => "path",
        }
    }

    pub fn into_state(self) -> Result<Rc<StateFormula>> {
        match self {
            Formula::State(phi) => Ok(phi),
            Formula::Path(_) => Err(Error::TypeMismatch {
                expected: "state",
                found: "path",
            }),
        }
    }

    pub fn into_path(self) -> Result<Rc<PathFormula>> {
        match self {
            Formula::Path(psi) => Ok(psi),
            Formula::State(_) => Err(Error::TypeMismatch {
                expected: "path",
                found: "state",
            }),
        }
    }

    pub fn conjunction(lhs: Formula, rhs: Formula) -> Result<Formula> {
        Ok(StateFormula::conjunction(lhs.into_state()?, rhs.into_state()?).into())
    }

    pub fn disjunction(lhs: Formula, rhs: Formula) -> Result<Formula> {
        Ok(StateFormula::disjunction(lhs.into_state()?, rhs.into_state()?).into())
    }

    pub fn negation(phi: Formula) -> Result<Formula> {
        Ok(StateFormula::negation(phi.into_state()?).into())
    }

    pub fn prob(interval: Interval, psi: Formula) -> Result<Formula> {
        Ok(StateFormula::prob(interval, psi.into_path()?).into())
    }

    pub fn next(phi: Formula) -> Result<Formula> {
        Ok(PathFormula::next(phi.into_state()?).into())
    }

    pub fn until(phi1: Formula, phi2: Formula) -> Result<Formula> {
        Ok(PathFormula::until(phi1.into_state()?, phi2.into_state()?).into())
    }

    pub fn bounded_until(phi1: Formula, phi2: Formula, steps: usize) -> Result<Formula> {
        Ok(PathFormula::bounded_until(phi1.into_state()?, phi2.into_state()?, steps).into())
    }
}

impl From<StateFormula> for Formula {
    fn from(phi: StateFormula) -> Self {
        Formula::State(Rc::new(phi))
    }
}

impl From<PathFormula> for Formula {
    fn from(psi: PathFormula) -> Self {
        Formula::Path(Rc::new(psi))
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::State(phi) => write!(f, "{}", phi),
            Formula::Path(psi) => write!(f, "{}", psi),
        }
    }
}
