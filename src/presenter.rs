//! Presentation boundary
//!
//! The game core never draws or reads input. Frontends implement [`Presenter`]:
//! `render` is fire-and-forget, `request_move` blocks until a legal cell is
//! supplied or the player gives up (`None`).

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use tracing::warn;

use crate::board::Position;
use crate::cli_rendering::{player_to_char, render_board};
use crate::game::GameState;

/// Explosion steps of the last move, one entry per explosion holding the cells
/// still waiting to explode. Purely observational.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CascadeTrace {
    steps: Vec<Vec<Position>>,
}

impl CascadeTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, pending: &[Position]) {
        self.steps.push(pending.to_vec());
    }

    pub fn explosions(&self) -> usize {
        self.steps.len()
    }

    pub fn steps(&self) -> &[Vec<Position>] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

pub trait Presenter {
    fn render(&mut self, state: &GameState, hints: Option<&CascadeTrace>);

    fn request_move(&mut self, state: &GameState) -> Option<Position>;
}

pub fn status_line(state: &GameState) -> String {
    match state.winner() {
        Some(winner) => format!("{} ({}) wins after {} turns", winner, player_to_char(winner), state.turn()),
        None => format!(
            "Turn {} - {} ({}) to move",
            state.turn(),
            state.current_player(),
            player_to_char(state.current_player())
        ),
    }
}

/// Line-based terminal frontend. Moves are typed as `row,column`, `q` quits.
pub struct TextPresenter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> TextPresenter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_inner(self) -> (R, W) {
        (self.input, self.output)
    }

    fn write_frame(&mut self, state: &GameState, hints: Option<&CascadeTrace>) -> io::Result<()> {
        writeln!(self.output)?;
        write!(self.output, "{}", render_board(state.board()))?;
        if let Some(trace) = hints.filter(|trace| !trace.is_empty()) {
            let longest_queue = trace.steps().iter().map(Vec::len).max().unwrap_or(0);
            writeln!(
                self.output,
                "Chain reaction: {} explosions, longest queue {}",
                trace.explosions(),
                longest_queue
            )?;
        }
        writeln!(self.output, "{}", status_line(state))?;
        self.output.flush()
    }

    fn prompt(&mut self, state: &GameState) -> io::Result<Option<Position>> {
        let mut line = String::new();
        loop {
            write!(self.output, "{} > ", player_to_char(state.current_player()))?;
            self.output.flush()?;

            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            let text = line.trim();
            if text.eq_ignore_ascii_case("q") || text.eq_ignore_ascii_case("quit") {
                return Ok(None);
            }
            match text.parse::<Position>() {
                Ok(position) if state.is_valid_move(&position) => return Ok(Some(position)),
                Ok(position) => writeln!(self.output, "Illegal move {}", position)?,
                Err(e) => writeln!(self.output, "{}", e)?,
            }
        }
    }
}

impl<R: BufRead, W: Write> Presenter for TextPresenter<R, W> {
    fn render(&mut self, state: &GameState, hints: Option<&CascadeTrace>) {
        if let Err(e) = self.write_frame(state, hints) {
            warn!("failed to render board: {}", e);
        }
    }

    fn request_move(&mut self, state: &GameState) -> Option<Position> {
        self.prompt(state).unwrap_or_else(|e| {
            warn!("failed to read move: {}", e);
            None
        })
    }
}

/// Headless presenter replaying a fixed list of moves. Used by tests and by
/// bot-only matches, where nothing is ever requested.
#[derive(Debug, Default)]
pub struct ScriptedPresenter {
    moves: VecDeque<Position>,
    frames: usize,
    explosions: Vec<usize>,
}

impl ScriptedPresenter {
    pub fn new(moves: impl IntoIterator<Item = Position>) -> Self {
        Self {
            moves: moves.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Explosion count of every rendered move hint.
    pub fn explosions(&self) -> &[usize] {
        &self.explosions
    }
}

impl Presenter for ScriptedPresenter {
    fn render(&mut self, _state: &GameState, hints: Option<&CascadeTrace>) {
        self.frames += 1;
        if let Some(trace) = hints {
            self.explosions.push(trace.explosions());
        }
    }

    fn request_move(&mut self, _state: &GameState) -> Option<Position> {
        self.moves.pop_front()
    }
}
