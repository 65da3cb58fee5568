//! Error type shared by the whole crate.

use thiserror::Error;

use crate::types::StateId;

/// Errors raised by chain construction, numerical analysis and formula evaluation.
///
/// All errors are raised synchronously by the call that violates its contract.
/// None of them leave the chain or the formula caches half-updated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("transition probability must lie in (0, 1], got {0}")]
    InvalidProbability(f64),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid bound: {0}")]
    InvalidBound(String),

    #[error("state {0} does not belong to this chain")]
    InvalidStateReference(StateId),

    #[error("expected a {expected} formula, found a {found} formula")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("the chain has no states")]
    EmptyStateSpace,

    #[error("iteration did not converge after {iterations} iterations (last change {delta:e})")]
    DidNotConverge { iterations: usize, delta: f64 },

    #[error("outgoing probabilities of state {state} sum to {sum}, expected 1")]
    NotStochastic { state: StateId, sum: f64 },

    #[error("linear system is singular")]
    Singular,

    #[error("computation was cancelled")]
    Cancelled,

    #[error("parse error at position {position}: {message}")]
    Parse { position: usize, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
