//! Graph-structural properties of a chain: reachability in the underlying
//! graph, irreducibility, periodicity and ergodicity.

use std::collections::VecDeque;

use crate::chain::Dtmc;
use crate::state_set::StateSet;
use crate::types::StateId;

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

impl Dtmc {
    /// States reachable from `state` in zero or more steps.
    pub fn reachable_from(&self, state: StateId) -> StateSet {
        let mut visited = StateSet::with_capacity(self.num_states());
        if self.state(state).is_none() {
            return visited;
        }
        let mut queue = VecDeque::from([state]);
        visited.insert(state);
        while let Some(s) = queue.pop_front() {
            for t in self.successors(s) {
                if visited.insert(t.target) {
                    queue.push_back(t.target);
                }
            }
        }
        visited
    }

    /// States from which `state` is reachable in zero or more steps.
    pub fn reaching(&self, state: StateId) -> StateSet {
        let target: StateSet = [state].into_iter().collect();
        let mut set = self.can_reach(&target, &StateSet::new());
        if self.state(state).is_some() {
            set.insert(state);
        }
        set
    }

    /// Strongly connected component containing `state`.
    pub fn component(&self, state: StateId) -> StateSet {
        self.reachable_from(state).intersection(&self.reaching(state))
    }

    /// Checks whether every state can reach every other state.
    ///
    /// An empty chain is not irreducible; a single state always is.
    pub fn is_irreducible(&self) -> bool {
        match self.states().next() {
            Some(first) => self.component(first.id()).len() == self.num_states(),
            None => false,
        }
    }

    /// Period of `state`: the gcd of the lengths of all cycles through its
    /// strongly connected component. `None` if the state lies on no cycle.
    pub fn period(&self, state: StateId) -> Option<usize> {
        let component = self.component(state);
        if component.is_empty() {
            return None;
        }

        // BFS levels inside the component
        let mut level = vec![usize::MAX; self.num_states()];
        level[state.index()] = 0;
        let mut queue = VecDeque::from([state]);
        while let Some(s) = queue.pop_front() {
            for t in self.successors(s) {
                if component.contains(t.target) && level[t.target.index()] == usize::MAX {
                    level[t.target.index()] = level[s.index()] + 1;
                    queue.push_back(t.target);
                }
            }
        }

        let mut period = 0;
        for s in &component {
            for t in self.successors(s) {
                if component.contains(t.target) {
                    let diff = (level[s.index()] + 1).abs_diff(level[t.target.index()]);
                    period = gcd(period, diff);
                }
            }
        }
        if period == 0 {
            None
        } else {
            Some(period)
        }
    }

    /// Irreducible chain whose states have period 1.
    pub fn is_aperiodic(&self) -> bool {
        match self.initial() {
            Some(initial) => self.is_irreducible() && self.period(initial) == Some(1),
            None => false,
        }
    }

    /// Irreducible and aperiodic.
    pub fn is_ergodic(&self) -> bool {
        self.is_irreducible() && self.is_aperiodic()
    }
}
