//! Compact sets of states.
//!
//! Satisfaction sets, goal sets and forbidden sets are all [`StateSet`]s: bit sets
//! indexed by [`StateId`], so that set algebra over the states of a chain is a
//! word-wise operation and iteration is always in index order.

use std::fmt;

use crate::types::StateId;

/// A set of states backed by a vector of u64 words.
///
/// Each bit corresponds to a state index. The set grows as needed when
/// inserting states beyond the current capacity.
#[derive(Clone, Default)]
pub struct StateSet {
    /// Storage: each u64 holds 64 states
    words: Vec<u64>,
    /// Number of set bits (cached for O(1) len())
    count: usize,
}

impl StateSet {
    /// Number of bits per word.
    const BITS_PER_WORD: usize = 64;

    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty set with room for `capacity` states.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity.div_ceil(Self::BITS_PER_WORD)],
            count: 0,
        }
    }

    /// Creates the set `{s0, ..., s(n-1)}` of all states of an `n`-state chain.
    pub fn full(n: usize) -> Self {
        let mut set = Self::with_capacity(n);
        for word in set.words.iter_mut() {
            *word = u64::MAX;
        }
        let tail = n % Self::BITS_PER_WORD;
        if tail != 0 {
            if let Some(last) = set.words.last_mut() {
                *last = (1u64 << tail) - 1;
            }
        }
        set.count = n;
        set
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    fn word_and_bit(index: usize) -> (usize, usize) {
        (index / Self::BITS_PER_WORD, index % Self::BITS_PER_WORD)
    }

    /// Returns true if the state is in the set.
    #[inline]
    pub fn contains(&self, state: StateId) -> bool {
        let (word_idx, bit_idx) = Self::word_and_bit(state.index());
        match self.words.get(word_idx) {
            Some(word) => word & (1u64 << bit_idx) != 0,
            None => false,
        }
    }

    /// Adds a state. Returns true if it was not previously present.
    #[inline]
    pub fn insert(&mut self, state: StateId) -> bool {
        let (word_idx, bit_idx) = Self::word_and_bit(state.index());
        if word_idx >= self.words.len() {
            self.words.resize(word_idx + 1, 0);
        }
        let mask = 1u64 << bit_idx;
        let was_clear = self.words[word_idx] & mask == 0;
        if was_clear {
            self.words[word_idx] |= mask;
            self.count += 1;
        }
        was_clear
    }

    /// The largest state index in the set, if any.
    pub fn max(&self) -> Option<StateId> {
        self.words
            .iter()
            .enumerate()
            .rev()
            .find(|(_, &w)| w != 0)
            .map(|(i, &w)| StateId::new(i * Self::BITS_PER_WORD + 63 - w.leading_zeros() as usize))
    }

    fn combine(&self, other: &StateSet, op: impl Fn(u64, u64) -> u64) -> StateSet {
        let len = self.words.len().max(other.words.len());
        let words: Vec<u64> = (0..len)
            .map(|i| {
                let a = self.words.get(i).copied().unwrap_or(0);
                let b = other.words.get(i).copied().unwrap_or(0);
                op(a, b)
            })
            .collect();
        let count = words.iter().map(|w| w.count_ones() as usize).sum();
        StateSet { words, count }
    }

    pub fn intersection(&self, other: &StateSet) -> StateSet {
        self.combine(other, |a, b| a & b)
    }

    pub fn union(&self, other: &StateSet) -> StateSet {
        self.combine(other, |a, b| a | b)
    }

    pub fn difference(&self, other: &StateSet) -> StateSet {
        self.combine(other, |a, b| a & !b)
    }

    /// Complement relative to the states `s0..s(n-1)`.
    pub fn complement(&self, n: usize) -> StateSet {
        StateSet::full(n).difference(self)
    }

    /// Returns an iterator over the members in increasing index order.
    pub fn iter(&self) -> StateSetIter<'_> {
        StateSetIter {
            set: self,
            word_idx: 0,
            current_word: self.words.first().copied().unwrap_or(0),
        }
    }
}

impl PartialEq for StateSet {
    fn eq(&self, other: &Self) -> bool {
        if self.count != other.count {
            return false;
        }
        let len = self.words.len().max(other.words.len());
        (0..len).all(|i| self.words.get(i).copied().unwrap_or(0) == other.words.get(i).copied().unwrap_or(0))
    }
}

impl Eq for StateSet {}

impl fmt::Debug for StateSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for StateSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, s) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", s)?;
        }
        write!(f, "}}")
    }
}

impl FromIterator<StateId> for StateSet {
    fn from_iter<I: IntoIterator<Item = StateId>>(iter: I) -> Self {
        let mut set = StateSet::new();
        set.extend(iter);
        set
    }
}

impl Extend<StateId> for StateSet {
    fn extend<I: IntoIterator<Item = StateId>>(&mut self, iter: I) {
        for state in iter {
            self.insert(state);
        }
    }
}

impl<'a> IntoIterator for &'a StateSet {
    type Item = StateId;
    type IntoIter = StateSetIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the members of a [`StateSet`].
pub struct StateSetIter<'a> {
    set: &'a StateSet,
    word_idx: usize,
    current_word: u64,
}

impl Iterator for StateSetIter<'_> {
    type Item = StateId;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current_word != 0 {
                let bit_idx = self.current_word.trailing_zeros() as usize;
                self.current_word &= self.current_word - 1; // Clear lowest set bit
                return Some(StateId::new(self.word_idx * StateSet::BITS_PER_WORD + bit_idx));
            }

            self.word_idx += 1;
            if self.word_idx >= self.set.words.len() {
                return None;
            }
            self.current_word = self.set.words[self.word_idx];
        }
    }
}
