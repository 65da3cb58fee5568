//! Type-safe wrappers for state identifiers and probability intervals.
//!
//! This module provides newtype wrappers that keep state indices distinct from
//! plain integers, plus the closed probability interval used by the `P` operator.

use std::fmt;

use crate::error::{Error, Result};

/// A state identifier (0-indexed).
///
/// Identifiers are assigned by [`Dtmc::add_state`][crate::chain::Dtmc::add_state]
/// in creation order and are never reused. They double as the row/column index
/// of the state in the transition matrix.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct StateId(usize);

impl StateId {
    /// Creates a state identifier with the given index.
    ///
    /// The identifier is not tied to any chain; operations taking a foreign
    /// identifier fail with [`Error::InvalidStateReference`].
    pub const fn new(index: usize) -> Self {
        StateId(index)
    }

    /// Returns the raw index as a `usize`.
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

impl From<StateId> for usize {
    fn from(id: StateId) -> Self {
        id.0
    }
}

/// A closed probability interval `[lb, ub]`.
///
/// # Invariants
///
/// - `0 <= lb <= ub <= 1` for intervals built via [`Interval::new`]
/// - Membership is inclusive on both ends
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Interval {
    lb: f64,
    ub: f64,
}

impl Interval {
    /// Creates the interval `[lb, ub]`.
    ///
    /// Fails with [`Error::InvalidBound`] unless `0 <= lb <= ub <= 1`.
    pub fn new(lb: f64, ub: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&lb) || !(0.0..=1.0).contains(&ub) || lb > ub {
            return Err(Error::InvalidBound(format!(
                "probability interval [{}, {}] must satisfy 0 <= lb <= ub <= 1",
                lb, ub
            )));
        }
        Ok(Interval { lb, ub })
    }

    /// `P>=p`, i.e. `[p, 1]`.
    pub fn at_least(p: f64) -> Result<Self> {
        Interval::new(p, 1.0)
    }

    /// `P<=p`, i.e. `[0, p]`.
    pub fn at_most(p: f64) -> Result<Self> {
        Interval::new(0.0, p)
    }

    /// `P==p`, i.e. `[p, p]`.
    pub fn exactly(p: f64) -> Result<Self> {
        Interval::new(p, p)
    }

    pub fn lower(&self) -> f64 {
        self.lb
    }

    pub fn upper(&self) -> f64 {
        self.ub
    }

    /// Checks whether `value` lies within the closed interval.
    pub fn contains(&self, value: f64) -> bool {
        self.lb <= value && value <= self.ub
    }

    /// Intersection of two intervals. The result may be empty.
    pub fn intersection(&self, other: &Interval) -> Interval {
        Interval {
            lb: self.lb.max(other.lb),
            ub: self.ub.min(other.ub),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lb > self.ub
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lb, self.ub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_id() {
        let s0 = StateId::new(0);
        let s1 = StateId::new(1);
        assert_eq!(s0.index(), 0);
        assert_eq!(usize::from(s1), 1);
        assert!(s0 < s1);
        assert_eq!(s1.to_string(), "s1");
    }

    #[test]
    fn test_interval_contains_is_inclusive() {
        let i = Interval::new(0.25, 0.5).unwrap();
        assert!(i.contains(0.25));
        assert!(i.contains(0.5));
        assert!(i.contains(0.3));
        assert!(!i.contains(0.2));
        assert!(!i.contains(0.51));
    }

    #[test]
    fn test_interval_comparators() {
        assert_eq!(Interval::at_least(0.3).unwrap(), Interval::new(0.3, 1.0).unwrap());
        assert_eq!(Interval::at_most(0.3).unwrap(), Interval::new(0.0, 0.3).unwrap());
        assert_eq!(Interval::exactly(0.3).unwrap(), Interval::new(0.3, 0.3).unwrap());
    }

    #[test]
    fn test_interval_rejects_bad_bounds() {
        assert!(matches!(Interval::new(0.6, 0.5), Err(Error::InvalidBound(_))));
        assert!(matches!(Interval::new(-0.1, 0.5), Err(Error::InvalidBound(_))));
        assert!(matches!(Interval::new(0.1, 1.5), Err(Error::InvalidBound(_))));
        assert!(matches!(Interval::new(f64::NAN, 0.5), Err(Error::InvalidBound(_))));
    }

    #[test]
    fn test_interval_intersection() {
        let a = Interval::new(0.1, 0.6).unwrap();
        let b = Interval::new(0.4, 0.9).unwrap();
        let c = a.intersection(&b);
        assert_eq!(c.lower(), 0.4);
        assert_eq!(c.upper(), 0.6);
        assert!(!c.is_empty());

        let d = Interval::new(0.0, 0.2).unwrap().intersection(&Interval::new(0.5, 1.0).unwrap());
        assert!(d.is_empty());
        assert_eq!(d.to_string(), "[0.5, 0.2]");
    }
}
