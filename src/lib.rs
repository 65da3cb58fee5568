//! # pctl-rs: PCTL model checking for discrete-time Markov chains
//!
//! **`pctl-rs`** answers quantitative questions about finite **discrete-time Markov chains (DTMCs)**:
//! where the probability mass is after `k` steps, how likely a set of goal states is reached,
//! and which states satisfy a formula of **Probabilistic Computation Tree Logic (PCTL)**.
//!
//! ## What is PCTL?
//!
//! PCTL extends propositional logic over labelled states with a probabilistic operator
//! `P[lb, ub](ψ)`, which holds in a state if the probability of the paths from that state
//! satisfying `ψ` lies in `[lb, ub]`. Path formulas are `X φ` (next), `φ1 U φ2` (until)
//! and `φ1 U<=k φ2` (bounded until).
//!
//! ## Key Features
//!
//! - **Chain-Centric Architecture**: States and transitions are created through the [`Dtmc`][crate::chain::Dtmc] and referenced by lightweight [`StateId`][crate::types::StateId] handles.
//! - **Exact where possible**: States that reach the goal almost surely get exactly 1. The rest of unbounded reachability solves the linear system directly, falling back to value iteration with a tolerance and an iteration cap.
//! - **Cached evaluation**: Every formula node caches its result, keyed by the identity and version of the chain and the numeric settings it was computed with.
//! - **Text syntax**: Formulas can be built in code or parsed from strings with [`parser::parse`].
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! pctl-rs = "0.1"
//! ```
//!
//! ## Basic Usage
//!
//! ```rust
//! use pctl_rs::chain::Dtmc;
//! use pctl_rs::formula::{PathFormula, StateFormula};
//! use pctl_rs::types::Interval;
//!
//! // 1. Build the chain
//! let mut chain = Dtmc::new();
//! let s0 = chain.add_state(None, &["a"]);
//! let s1 = chain.add_state(None, &["b"]);
//! let s2 = chain.add_state(None, &[]);
//! chain.add_transition(s0, s1, 0.5).unwrap();
//! chain.add_transition(s0, s2, 0.5).unwrap();
//! chain.add_transition(s1, s1, 1.0).unwrap();
//! chain.add_transition(s2, s2, 1.0).unwrap();
//! chain.validate(1e-9).unwrap();
//!
//! // 2. Build a formula: P>=0.5(a U b)
//! let until = PathFormula::until(StateFormula::atom("a"), StateFormula::atom("b"));
//! let phi = StateFormula::prob(Interval::at_least(0.5).unwrap(), until);
//!
//! // 3. Check it
//! let sat = chain.check(&phi).unwrap();
//! assert!(sat.contains(s0));
//! assert!(sat.contains(s1));
//! assert!(!sat.contains(s2));
//! assert!(chain.holds_initially(&phi).unwrap());
//! ```
//!
//! ## Core Components
//!
//! - **[`chain`]**: The [`Dtmc`][crate::chain::Dtmc] itself and its cached transition matrix.
//! - **[`transient`]**: Distributions after a number of steps.
//! - **[`reachability`]**: Bounded and unbounded constrained reachability.
//! - **[`formula`]** and **[`eval`]**: PCTL syntax trees and their evaluation.
//! - **[`structure`]**: Irreducibility, periodicity and ergodicity.
//! - **[`dot`]**: Visualizing chains using Graphviz.

pub mod chain;
pub mod dot;
pub mod error;
pub mod eval;
pub mod formula;
pub mod matrix;
pub mod parser;
pub mod reachability;
pub mod state_set;
pub mod structure;
pub mod transient;
pub mod types;

pub use chain::Dtmc;
pub use error::{Error, Result};
pub use formula::{Formula, PathFormula, StateFormula};
pub use state_set::StateSet;
pub use types::{Interval, StateId};
