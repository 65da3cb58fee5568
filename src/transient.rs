//! Transient analysis: the distribution over states after a fixed number of steps.

use std::ops::Index;

use log::debug;

use crate::chain::Dtmc;
use crate::error::{Error, Result};
use crate::state_set::StateSet;
use crate::types::StateId;

/// Probability mass over the states of a chain, aligned to state index.
///
/// The mass need not sum to 1: callers may propagate partial mass.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution(Vec<f64>);

impl Distribution {
    /// Wraps a dense vector. Its length must equal the number of states of `chain`.
    pub fn dense(chain: &Dtmc, values: Vec<f64>) -> Result<Self> {
        if values.len() != chain.num_states() {
            return Err(Error::InvalidArgument(format!(
                "distribution has {} entries, but the chain has {} states",
                values.len(),
                chain.num_states()
            )));
        }
        Ok(Distribution(values))
    }

    /// Builds a distribution from `(state, mass)` pairs; unlisted states get 0.
    pub fn from_masses(chain: &Dtmc, masses: impl IntoIterator<Item = (StateId, f64)>) -> Result<Self> {
        let mut values = vec![0.0; chain.num_states()];
        for (state, mass) in masses {
            let slot = values.get_mut(state.index()).ok_or(Error::InvalidStateReference(state))?;
            *slot = mass;
        }
        Ok(Distribution(values))
    }

    /// Point mass 1 at `state`.
    pub fn point(chain: &Dtmc, state: StateId) -> Result<Self> {
        Self::from_masses(chain, [(state, 1.0)])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.0
    }

    /// Total mass.
    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    /// Mass of the given states. Members outside the chain contribute nothing.
    pub fn mass_of(&self, states: &StateSet) -> f64 {
        states.iter().filter_map(|s| self.0.get(s.index())).sum()
    }
}

impl Index<StateId> for Distribution {
    type Output = f64;

    fn index(&self, state: StateId) -> &f64 {
        &self.0[state.index()]
    }
}

impl Dtmc {
    /// Computes `init · M^steps`, the distribution after exactly `steps` steps.
    ///
    /// `steps == 0` returns the initial distribution unchanged. Long horizons
    /// raise `M` to the power by squaring instead of stepping the vector.
    pub fn transient(&self, steps: usize, init: &Distribution) -> Result<Distribution> {
        let n = self.num_states();
        if n == 0 {
            return Err(Error::EmptyStateSpace);
        }
        if init.0.len() != n {
            return Err(Error::InvalidArgument(format!(
                "distribution has {} entries, but the chain has {} states",
                init.0.len(),
                n
            )));
        }
        let m = self.transition_matrix();
        // Stepping costs k n^2, squaring about 2 n^3 log2(k)
        if steps > 0 && steps > 2 * n * (steps.ilog2() as usize + 1) {
            debug!("transient(steps = {}): by squaring", steps);
            return Ok(Distribution(m.pow(steps).vec_mul(&init.0)));
        }
        debug!("transient(steps = {})", steps);
        let mut pi = init.0.clone();
        for _ in 0..steps {
            pi = m.vec_mul(&pi);
        }
        Ok(Distribution(pi))
    }

    /// Transient distribution starting from a point mass at the initial state.
    pub fn transient_from_initial(&self, steps: usize) -> Result<Distribution> {
        let initial = self.initial().ok_or(Error::EmptyStateSpace)?;
        let init = Distribution::point(self, initial)?;
        self.transient(steps, &init)
    }
}
