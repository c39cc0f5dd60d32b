//! Per-search transposition table
//!
//! A table lives for exactly one top-level search. Entries remember the window
//! they were searched with: a result that failed low or high is only a bound on
//! the true score and is reused only when that bound already decides the
//! current window.

use std::collections::HashMap;

use crate::game::StateKey;

use super::ScoredMove;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bound {
    /// Score lies strictly inside the search window
    Exact,
    /// True score is at least the stored score (search failed high)
    Lower,
    /// True score is at most the stored score (search failed low)
    Upper,
}

impl Bound {
    pub fn classify(score: f64, alpha: f64, beta: f64) -> Self {
        if score <= alpha {
            Bound::Upper
        } else if score >= beta {
            Bound::Lower
        } else {
            Bound::Exact
        }
    }

    fn decides(self, score: f64, alpha: f64, beta: f64) -> bool {
        match self {
            Bound::Exact => true,
            Bound::Lower => score >= beta,
            Bound::Upper => score <= alpha,
        }
    }
}

#[derive(Clone, Debug)]
struct Entry {
    depth: u32,
    bound: Bound,
    best: Vec<ScoredMove>,
}

#[derive(Debug, Default)]
pub struct TranspositionTable {
    entries: HashMap<StateKey, Entry>,
    hits: u64,
    misses: u64,
}

impl TranspositionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached tie list for `key`, if it was searched at least `depth` plies
    /// deep and its bound is usable inside `(alpha, beta)`.
    pub fn lookup(&mut self, key: &StateKey, depth: u32, alpha: f64, beta: f64) -> Option<Vec<ScoredMove>> {
        let usable = self.entries.get(key).filter(|entry| {
            entry.depth >= depth
                && entry
                    .best
                    .first()
                    .is_some_and(|top| entry.bound.decides(top.score, alpha, beta))
        });
        match usable {
            Some(entry) => {
                self.hits += 1;
                Some(entry.best.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn store(&mut self, key: StateKey, depth: u32, bound: Bound, best: Vec<ScoredMove>) {
        self.entries.insert(key, Entry { depth, bound, best });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
