//! Minimax Search Engine for the chain reaction game
//!
//! This module picks moves with a depth-limited minimax search. Player one
//! maximizes the evaluation and player two minimizes it. The search is
//! synchronous and single threaded: a host that needs bounded latency bounds
//! the depth or runs the engine on a worker (see [`crate::worker`]).
//!
//! # Features
//!
//! - Alpha-beta pruning with one-ply move ordering (best child first)
//! - Transposition table scoped to a single top-level search
//! - Tie lists: every move reaching the optimal score within [`compare::EPSILON`]
//! - Injected evaluation weights ([`Weights`])
//! - Statistics tracking (nodes, leaves, cutoffs, table hits and misses)
//!
//! # Ties and pruning
//!
//! Children are searched with the window widened by a small margin on the side
//! their parent compares against, so any sibling that ties the best score is
//! scored exactly. Ties hidden behind a real cutoff (for instance a second
//! winning move after a first one was found) are never explored and are
//! therefore absent from the result.
//!
//! # Example
//!
//! ```no_run
//! use chain_reaction::engine::{SearchEngine, SelectionPolicy, Weights};
//! use chain_reaction::GameState;
//!
//! let mut state = GameState::new(5, 5).expect("valid board");
//! let mut engine = SearchEngine::new(Weights::default());
//!
//! let ties = engine.best_moves(&state, 3);
//! println!("{} equally good moves scoring {}", ties.len(), ties[0].score);
//!
//! let mut rng = rand::thread_rng();
//! if let Some(position) = engine
//!     .best_move(&state, 3, SelectionPolicy::Random, &mut rng)
//!     .and_then(|chosen| chosen.mv)
//! {
//!     state.apply_move(position);
//! }
//!
//! let stats = engine.get_statistics();
//! println!("Nodes searched: {}", stats.nodes);
//! println!("Table hit rate: {:.2}%", stats.table_hit_rate() * 100.0);
//! ```

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::board::Position;
use crate::game::GameState;

pub mod compare;
mod evaluation;
mod transposition;

pub use evaluation::{Evaluator, Weights};
pub use transposition::{Bound, TranspositionTable};

use compare::{near_eq, near_gt, near_lt, EPSILON};

/// Window widening applied to children on the tie side.
const TIE_MARGIN: f64 = 2.0 * EPSILON;

/// A candidate move and the score the search proved for it. `mv` is `None`
/// for a leaf: depth exhausted or game already decided.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredMove {
    #[serde(rename = "move")]
    pub mv: Option<Position>,
    #[serde(with = "score_repr")]
    pub score: f64,
}

impl ScoredMove {
    pub fn new(mv: Position, score: f64) -> Self {
        Self { mv: Some(mv), score }
    }

    pub fn leaf(score: f64) -> Self {
        Self { mv: None, score }
    }
}

/// JSON has no infinity literal: decided games travel as `"inf"` / `"-inf"`.
mod score_repr {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(score: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if score.is_infinite() {
            serializer.serialize_str(if *score > 0.0 { "inf" } else { "-inf" })
        } else {
            serializer.serialize_f64(*score)
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(score) => Ok(score),
            Repr::Text(text) => match text.as_str() {
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                other => Err(de::Error::custom(format!("invalid score '{other}'"))),
            },
        }
    }
}

/// How a caller turns a tie list into a single move.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    First,
    #[default]
    Random,
}

impl SelectionPolicy {
    pub fn select<'a, R: Rng + ?Sized>(self, moves: &'a [ScoredMove], rng: &mut R) -> Option<&'a ScoredMove> {
        match self {
            SelectionPolicy::First => moves.first(),
            SelectionPolicy::Random => moves.choose(rng),
        }
    }
}

/// Engine configuration
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Search depth in plies
    pub depth: u32,
    /// Evaluation weights
    pub weights: Weights,
    /// Tie-breaking policy for single-move requests
    pub selection: SelectionPolicy,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            depth: 3,
            weights: Weights::default(),
            selection: SelectionPolicy::Random,
        }
    }
}

/// Statistics accumulated over the searches of one engine
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchStatistics {
    /// Number of top-level searches
    pub searches: u64,
    /// Positions visited, leaves included
    pub nodes: u64,
    /// Positions scored by the evaluator
    pub leaves: u64,
    /// Alpha-beta cutoffs
    pub cutoffs: u64,
    /// Transposition table hits
    pub table_hits: u64,
    /// Transposition table misses
    pub table_misses: u64,
    /// Size of the tie list returned by the most recent search
    pub last_tie_count: u64,
}

impl SearchStatistics {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn table_hit_rate(&self) -> f64 {
        let total = self.table_hits + self.table_misses;
        if total == 0 {
            0.0
        } else {
            self.table_hits as f64 / total as f64
        }
    }
}

/// Minimax search with alpha-beta pruning and a per-search transposition table
#[derive(Clone, Debug, Default)]
pub struct SearchEngine {
    evaluator: Evaluator,
    stats: SearchStatistics,
}

impl SearchEngine {
    pub fn new(weights: Weights) -> Self {
        Self {
            evaluator: Evaluator::new(weights),
            stats: SearchStatistics::default(),
        }
    }

    pub fn weights(&self) -> &Weights {
        self.evaluator.weights()
    }

    pub fn evaluate(&self, state: &GameState) -> f64 {
        self.evaluator.evaluate(state)
    }

    /// All moves reaching the optimal score at `depth`, in search order.
    ///
    /// Never empty. On a finished game (or at depth 0) this is the single leaf
    /// entry with no move.
    pub fn best_moves(&mut self, state: &GameState, depth: u32) -> Vec<ScoredMove> {
        let mut table = TranspositionTable::new();
        let nodes_before = self.stats.nodes;

        let best = self.search(state, depth, f64::NEG_INFINITY, f64::INFINITY, &mut table);

        self.stats.searches += 1;
        self.stats.table_hits += table.hits();
        self.stats.table_misses += table.misses();
        self.stats.last_tie_count = best.len() as u64;
        debug!(
            depth,
            nodes = self.stats.nodes - nodes_before,
            cached = table.len(),
            hits = table.hits(),
            ties = best.len(),
            score = ?best.first().map(|top| top.score),
            "search complete"
        );
        best
    }

    /// One element of [`SearchEngine::best_moves`], picked by `policy`.
    pub fn best_move<R: Rng + ?Sized>(
        &mut self,
        state: &GameState,
        depth: u32,
        policy: SelectionPolicy,
        rng: &mut R,
    ) -> Option<ScoredMove> {
        let best = self.best_moves(state, depth);
        policy.select(&best, rng).copied()
    }

    pub fn get_statistics(&self) -> SearchStatistics {
        self.stats.clone()
    }

    pub fn reset_statistics(&mut self) {
        self.stats.reset();
    }

    /// Legal moves with their resulting states, best one-ply evaluation first
    /// for the player to move.
    fn ordered_children(&self, state: &GameState) -> Vec<(Position, GameState)> {
        let mut children: Vec<(Position, GameState, f64)> = state
            .valid_moves()
            .into_iter()
            .filter_map(|mv| {
                let mut child = state.clone();
                child.apply_move(mv).then(|| {
                    let score = self.evaluator.evaluate(&child);
                    (mv, child, score)
                })
            })
            .collect();

        if state.current_player().is_maximizing() {
            children.sort_by(|a, b| b.2.total_cmp(&a.2));
        } else {
            children.sort_by(|a, b| a.2.total_cmp(&b.2));
        }
        children.into_iter().map(|(mv, child, _)| (mv, child)).collect()
    }

    fn search(
        &mut self,
        state: &GameState,
        depth: u32,
        mut alpha: f64,
        mut beta: f64,
        table: &mut TranspositionTable,
    ) -> Vec<ScoredMove> {
        self.stats.nodes += 1;
        if depth == 0 || state.is_game_over() {
            self.stats.leaves += 1;
            return vec![ScoredMove::leaf(self.evaluator.evaluate(state))];
        }

        let key = state.canonical_key();
        if let Some(best) = table.lookup(&key, depth, alpha, beta) {
            return best;
        }

        let children = self.ordered_children(state);
        if children.is_empty() {
            // Only reachable from a hand-built opening with a full board.
            self.stats.leaves += 1;
            return vec![ScoredMove::leaf(self.evaluator.evaluate(state))];
        }

        let maximizing = state.current_player().is_maximizing();
        let (alpha_start, beta_start) = (alpha, beta);
        let mut score = if maximizing {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
        let mut best: Vec<ScoredMove> = Vec::new();

        for (mv, child) in children {
            let (child_alpha, child_beta) = if maximizing {
                (alpha - TIE_MARGIN, beta)
            } else {
                (alpha, beta + TIE_MARGIN)
            };
            let child_score = self
                .search(&child, depth - 1, child_alpha, child_beta, table)
                .first()
                .map_or(score, |top| top.score);

            if maximizing {
                if near_gt(child_score, score) {
                    score = child_score;
                    best.clear();
                    best.push(ScoredMove::new(mv, score));
                } else if near_eq(child_score, score) {
                    best.push(ScoredMove::new(mv, score));
                }
                alpha = alpha.max(score);
            } else {
                if near_lt(child_score, score) {
                    score = child_score;
                    best.clear();
                    best.push(ScoredMove::new(mv, score));
                } else if near_eq(child_score, score) {
                    best.push(ScoredMove::new(mv, score));
                }
                beta = beta.min(score);
            }

            if beta <= alpha {
                self.stats.cutoffs += 1;
                break;
            }
        }

        table.store(
            key,
            depth,
            Bound::classify(score, alpha_start, beta_start),
            best.clone(),
        );
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Board, Cell, Player};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Integer-valued weights so exact ties are common.
    fn integer_weights() -> Weights {
        Weights {
            base_cell: 2.0,
            dot_exponent: 1.0,
            center: -1.0,
        }
    }

    /// Plain minimax: no pruning, no table, no ordering.
    fn exhaustive(evaluator: &Evaluator, state: &GameState, depth: u32) -> f64 {
        if depth == 0 || state.is_game_over() {
            return evaluator.evaluate(state);
        }
        let moves = state.valid_moves();
        if moves.is_empty() {
            return evaluator.evaluate(state);
        }
        let scores = moves.into_iter().map(|mv| {
            let mut child = state.clone();
            child.apply_move(mv);
            exhaustive(evaluator, &child, depth - 1)
        });
        if state.current_player().is_maximizing() {
            scores.fold(f64::NEG_INFINITY, f64::max)
        } else {
            scores.fold(f64::INFINITY, f64::min)
        }
    }

    fn same_score(a: f64, b: f64) -> bool {
        a == b || (a - b).abs() < 1e-4
    }

    /// Random positions reached by legal play from an empty board.
    fn random_positions(seed: u64, rows: usize, columns: usize, count: usize) -> Vec<GameState> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut positions = Vec::new();
        while positions.len() < count {
            let mut state = GameState::new(rows, columns).unwrap();
            let plies = rng.gen_range(2..12);
            for _ in 0..plies {
                if state.is_game_over() {
                    break;
                }
                let moves = state.valid_moves();
                state.apply_move(*moves.choose(&mut rng).unwrap());
            }
            if !state.is_game_over() {
                positions.push(state);
            }
        }
        positions
    }

    #[test]
    fn test_alpha_beta_matches_exhaustive_minimax() {
        for (rows, columns) in [(3, 3), (2, 4), (3, 4)] {
            for state in random_positions(rows as u64 * 31 + columns as u64, rows, columns, 12) {
                for depth in 1..=3 {
                    let mut engine = SearchEngine::new(Weights::default());
                    let pruned = engine.best_moves(&state, depth)[0].score;
                    let reference = exhaustive(&engine.evaluator, &state, depth);
                    assert!(
                        same_score(pruned, reference),
                        "depth {depth}: pruned {pruned} vs exhaustive {reference}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_tie_list_is_consistent() {
        for state in random_positions(5, 3, 3, 20) {
            let depth = 3;
            let mut engine = SearchEngine::new(integer_weights());
            let best = engine.best_moves(&state, depth);
            let evaluator = Evaluator::new(integer_weights());

            let child_scores: Vec<f64> = best
                .iter()
                .map(|scored| {
                    let mut child = state.clone();
                    assert!(child.apply_move(scored.mv.unwrap()));
                    exhaustive(&evaluator, &child, depth - 1)
                })
                .collect();
            for score in &child_scores {
                assert!(same_score(*score, best[0].score));
            }

            // Without a winning cutoff at the root every tied move is found.
            if best[0].score.is_finite() {
                let expected: Vec<Position> = state
                    .valid_moves()
                    .into_iter()
                    .filter(|&mv| {
                        let mut child = state.clone();
                        child.apply_move(mv);
                        same_score(exhaustive(&evaluator, &child, depth - 1), best[0].score)
                    })
                    .collect();
                let mut found: Vec<Position> = best.iter().filter_map(|scored| scored.mv).collect();
                found.sort();
                assert_eq!(found, expected);
            }
        }
    }

    #[test]
    fn test_finished_game_returns_leaf() {
        let mut board = Board::new(3, 3).unwrap();
        board.set(&Position::new(1, 1), Cell::new(2, Player::Two));
        let state = GameState::from_parts(board, Player::One, 8);
        let mut engine = SearchEngine::default();

        let best = engine.best_moves(&state, 4);
        assert_eq!(best, vec![ScoredMove::leaf(f64::NEG_INFINITY)]);
    }

    #[test]
    fn test_depth_zero_returns_evaluation() {
        let mut state = GameState::new(3, 3).unwrap();
        state.apply_move(Position::new(0, 0));
        let mut engine = SearchEngine::new(integer_weights());

        let best = engine.best_moves(&state, 0);
        assert_eq!(best, vec![ScoredMove::leaf(engine.evaluate(&state))]);
    }

    #[test]
    fn test_finds_winning_move() {
        // Player one can explode (0,0) and capture player two's only cell.
        let mut board = Board::new(2, 3).unwrap();
        board.set(&Position::new(0, 0), Cell::new(3, Player::One));
        board.set(&Position::new(1, 2), Cell::new(1, Player::One));
        board.set(&Position::new(0, 1), Cell::new(1, Player::Two));
        let state = GameState::from_parts(board, Player::One, 6);
        let mut engine = SearchEngine::default();

        let best = engine.best_moves(&state, 2);
        assert_eq!(best[0].score, f64::INFINITY);
        assert_eq!(best[0].mv, Some(Position::new(0, 0)));
    }

    #[test]
    fn test_opening_search_returns_legal_moves() {
        let state = GameState::new(3, 3).unwrap();
        let mut engine = SearchEngine::default();
        let best = engine.best_moves(&state, 2);

        assert!(!best.is_empty());
        for scored in &best {
            assert!(state.is_valid_move(&scored.mv.unwrap()));
        }
    }

    #[test]
    fn test_search_is_deterministic() {
        for state in random_positions(77, 3, 4, 5) {
            let first = SearchEngine::default().best_moves(&state, 3);
            let second = SearchEngine::default().best_moves(&state, 3);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_statistics() {
        let mut engine = SearchEngine::default();
        assert_eq!(engine.get_statistics(), SearchStatistics::default());
        assert_eq!(engine.get_statistics().table_hit_rate(), 0.0);

        let state = random_positions(3, 3, 3, 1).remove(0);
        let best = engine.best_moves(&state, 3);
        let stats = engine.get_statistics();
        assert_eq!(stats.searches, 1);
        assert!(stats.nodes > stats.leaves);
        assert!(stats.table_misses > 0);
        assert_eq!(stats.last_tie_count, best.len() as u64);

        engine.reset_statistics();
        assert_eq!(engine.get_statistics(), SearchStatistics::default());
    }

    #[test]
    fn test_selection_policies() {
        let moves = vec![
            ScoredMove::new(Position::new(0, 0), 1.0),
            ScoredMove::new(Position::new(0, 1), 1.0),
            ScoredMove::new(Position::new(1, 1), 1.0),
        ];
        let mut rng = StdRng::seed_from_u64(11);
        assert_eq!(SelectionPolicy::First.select(&moves, &mut rng), Some(&moves[0]));
        for _ in 0..10 {
            let picked = SelectionPolicy::Random.select(&moves, &mut rng).unwrap();
            assert!(moves.contains(picked));
        }
        assert_eq!(SelectionPolicy::Random.select(&[], &mut rng), None);
    }

    #[test]
    fn test_scored_move_json() {
        let won = ScoredMove::leaf(f64::INFINITY);
        let json = serde_json::to_string(&won).unwrap();
        assert_eq!(json, r#"{"move":null,"score":"inf"}"#);
        assert_eq!(serde_json::from_str::<ScoredMove>(&json).unwrap(), won);

        let regular = ScoredMove::new(Position::new(2, 1), -3.5);
        let json = serde_json::to_string(&regular).unwrap();
        assert_eq!(json, r#"{"move":{"row":2,"column":1},"score":-3.5}"#);
        assert_eq!(serde_json::from_str::<ScoredMove>(&json).unwrap(), regular);
        assert!(serde_json::from_str::<ScoredMove>(r#"{"move":null,"score":"nan"}"#).is_err());
    }
}
