//! Match orchestration
//!
//! A match alternates two [`Controller`]s over one [`GameState`]. Humans are
//! asked through the [`Presenter`], bots through their own [`SearchEngine`].
//! Every applied move is rendered together with its [`CascadeTrace`].
//!
//! [`tournament`] plays independent bot-only matches in parallel with `rayon`.
//! Each game owns its engines, its state and its random generator, so games
//! share nothing and a seed reproduces the whole run.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::board::Player;
use crate::engine::{SearchEngine, SelectionPolicy, Weights};
use crate::error::Result;
use crate::game::GameState;
use crate::presenter::{CascadeTrace, Presenter, ScriptedPresenter};

/// Who chooses the moves of one seat
#[derive(Debug)]
pub enum Controller {
    Human,
    Bot {
        engine: SearchEngine,
        depth: u32,
        policy: SelectionPolicy,
    },
}

impl Controller {
    pub fn bot(weights: Weights, depth: u32) -> Self {
        Controller::Bot {
            engine: SearchEngine::new(weights),
            depth,
            policy: SelectionPolicy::Random,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MatchConfig {
    /// Stop after this many turns; `None` plays until somebody wins
    pub max_turns: Option<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchOutcome {
    Won(Player),
    /// A human declined to move
    Abandoned,
    TurnLimit,
}

/// Plays `state` to completion and returns how the match ended.
pub fn run_match<P: Presenter, R: Rng + ?Sized>(
    state: &mut GameState,
    presenter: &mut P,
    one: &mut Controller,
    two: &mut Controller,
    config: MatchConfig,
    rng: &mut R,
) -> MatchOutcome {
    presenter.render(state, None);

    loop {
        if let Some(winner) = state.winner() {
            info!(%winner, turns = state.turn(), "match won");
            return MatchOutcome::Won(winner);
        }
        if config.max_turns.is_some_and(|limit| state.turn() >= limit) {
            info!(turns = state.turn(), "match stopped at turn limit");
            return MatchOutcome::TurnLimit;
        }

        let controller = match state.current_player() {
            Player::One => &mut *one,
            Player::Two => &mut *two,
        };
        let chosen = match controller {
            Controller::Human => presenter.request_move(state),
            Controller::Bot {
                engine,
                depth,
                policy,
            } => engine.best_move(state, *depth, *policy, rng).and_then(|best| best.mv),
        };
        let Some(position) = chosen else {
            info!(player = %state.current_player(), "match abandoned");
            return MatchOutcome::Abandoned;
        };

        let mut trace = CascadeTrace::new();
        let mover = state.current_player();
        if state.apply_move_observed(position, |pending| trace.record(pending)) {
            debug!(player = %mover, %position, explosions = trace.explosions(), "move applied");
            presenter.render(state, Some(&trace));
        }
    }
}

/// Self-play settings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TournamentConfig {
    pub rows: usize,
    pub columns: usize,
    pub games: usize,
    pub depth: u32,
    pub max_turns: Option<u32>,
    pub seed: u64,
}

impl Default for TournamentConfig {
    fn default() -> Self {
        Self {
            rows: 5,
            columns: 5,
            games: 10,
            depth: 2,
            max_turns: Some(200),
            seed: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TournamentReport {
    pub incumbent_wins: usize,
    pub challenger_wins: usize,
    pub unfinished: usize,
}

impl TournamentReport {
    pub fn games(&self) -> usize {
        self.incumbent_wins + self.challenger_wins + self.unfinished
    }

    fn merge(self, other: Self) -> Self {
        Self {
            incumbent_wins: self.incumbent_wins + other.incumbent_wins,
            challenger_wins: self.challenger_wins + other.challenger_wins,
            unfinished: self.unfinished + other.unfinished,
        }
    }
}

/// Plays `config.games` bot matches between two weight sets. The incumbent
/// takes the first seat on even games and the second seat on odd ones.
pub fn tournament(incumbent: Weights, challenger: Weights, config: TournamentConfig) -> Result<TournamentReport> {
    // Validates the dimensions once before fanning out.
    let initial = GameState::new(config.rows, config.columns)?;

    let report = (0..config.games)
        .into_par_iter()
        .map(|game| {
            let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(game as u64));
            let mut state = initial.clone();
            let incumbent_seat = if game % 2 == 0 { Player::One } else { Player::Two };
            let (mut one, mut two) = if incumbent_seat == Player::One {
                (Controller::bot(incumbent, config.depth), Controller::bot(challenger, config.depth))
            } else {
                (Controller::bot(challenger, config.depth), Controller::bot(incumbent, config.depth))
            };

            let outcome = run_match(
                &mut state,
                &mut ScriptedPresenter::default(),
                &mut one,
                &mut two,
                MatchConfig {
                    max_turns: config.max_turns,
                },
                &mut rng,
            );

            match outcome {
                MatchOutcome::Won(winner) if winner == incumbent_seat => TournamentReport {
                    incumbent_wins: 1,
                    ..TournamentReport::default()
                },
                MatchOutcome::Won(_) => TournamentReport {
                    challenger_wins: 1,
                    ..TournamentReport::default()
                },
                MatchOutcome::Abandoned | MatchOutcome::TurnLimit => TournamentReport {
                    unfinished: 1,
                    ..TournamentReport::default()
                },
            }
        })
        .reduce(TournamentReport::default, TournamentReport::merge);

    info!(
        games = report.games(),
        incumbent = report.incumbent_wins,
        challenger = report.challenger_wins,
        unfinished = report.unfinished,
        "tournament finished"
    );
    Ok(report)
}
