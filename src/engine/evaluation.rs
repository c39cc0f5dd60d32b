//! Static evaluation of a position
//!
//! Every occupied cell contributes `base + value^exponent + center * distance`
//! where `distance` is the Manhattan distance to the geometric center of the
//! grid, signed positive for player one and negative for player two. A
//! finished game scores infinite toward the winner.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ChainError, Result};
use crate::game::GameState;

/// Evaluation weights. Never hard-coded in the search so engines can be tuned
/// from the outside.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    /// Flat bonus per occupied cell
    pub base_cell: f64,
    /// Exponent applied to the dot count of a cell
    pub dot_exponent: f64,
    /// Multiplier of the distance to the center (negative favors the center)
    pub center: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            base_cell: 2.0,
            dot_exponent: 1.2,
            center: -1.0,
        }
    }
}

impl fmt::Display for Weights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.base_cell, self.dot_exponent, self.center)
    }
}

impl FromStr for Weights {
    type Err = ChainError;

    /// Parses `base,exponent,center`.
    fn from_str(s: &str) -> Result<Self> {
        let values = s
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| ChainError::InvalidWeights(s.to_string()))?;
        match values.as_slice() {
            &[base_cell, dot_exponent, center] if values.iter().all(|v| v.is_finite()) => Ok(Weights {
                base_cell,
                dot_exponent,
                center,
            }),
            _ => Err(ChainError::InvalidWeights(s.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Evaluator {
    weights: Weights,
}

impl Evaluator {
    pub fn new(weights: Weights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    /// Score from player one's perspective.
    pub fn evaluate(&self, state: &GameState) -> f64 {
        if let Some(winner) = state.winner() {
            return winner.sign() * f64::INFINITY;
        }

        let board = state.board();
        let center_row = (board.rows() - 1) as f64 / 2.0;
        let center_column = (board.columns() - 1) as f64 / 2.0;

        board
            .cells()
            .filter_map(|(position, cell)| cell.owner.map(|owner| (position, cell.value, owner)))
            .map(|(position, value, owner)| {
                let distance = (position.row as f64 - center_row).abs()
                    + (position.column as f64 - center_column).abs();
                let contribution = self.weights.base_cell
                    + (value as f64).powf(self.weights.dot_exponent)
                    + self.weights.center * distance;
                owner.sign() * contribution
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Board, Cell, Player, Position};

    #[test]
    fn test_empty_board_is_zero() {
        let state = GameState::new(4, 6).unwrap();
        for weights in [
            Weights::default(),
            Weights {
                base_cell: 10.0,
                dot_exponent: 3.0,
                center: 2.5,
            },
            Weights {
                base_cell: -1.0,
                dot_exponent: 0.0,
                center: 0.0,
            },
        ] {
            assert_eq!(Evaluator::new(weights).evaluate(&state), 0.0);
        }
    }

    #[test]
    fn test_cell_contribution() {
        let mut state = GameState::new(3, 3).unwrap();
        state.apply_move(Position::new(0, 0));
        let evaluator = Evaluator::new(Weights {
            base_cell: 2.0,
            dot_exponent: 1.0,
            center: -1.0,
        });
        // 2 + 3 - (1 + 1)
        assert_eq!(evaluator.evaluate(&state), 3.0);

        state.apply_move(Position::new(2, 2));
        assert_eq!(evaluator.evaluate(&state), 0.0);
    }

    #[test]
    fn test_even_dimensions_use_fractional_center() {
        let mut board = Board::new(2, 2).unwrap();
        board.set(&Position::new(0, 0), Cell::new(1, Player::Two));
        let state = GameState::from_parts(board, Player::One, 1);
        let evaluator = Evaluator::new(Weights {
            base_cell: 0.0,
            dot_exponent: 0.0,
            center: 1.0,
        });
        // -(0 + 1^0 + 1.0 * (0.5 + 0.5))
        assert_eq!(evaluator.evaluate(&state), -2.0);
    }

    #[test]
    fn test_finished_game_is_infinite() {
        let mut board = Board::new(2, 2).unwrap();
        board.set(&Position::new(0, 0), Cell::new(2, Player::Two));
        let lost_for_one = GameState::from_parts(board.clone(), Player::One, 5);
        assert_eq!(Evaluator::default().evaluate(&lost_for_one), f64::NEG_INFINITY);

        board.set(&Position::new(0, 0), Cell::new(2, Player::One));
        let lost_for_two = GameState::from_parts(board, Player::Two, 6);
        assert_eq!(Evaluator::default().evaluate(&lost_for_two), f64::INFINITY);
    }

    #[test]
    fn test_parse_weights() {
        let weights: Weights = "2, 1.2,-1".parse().unwrap();
        assert_eq!(weights, Weights::default());
        assert_eq!(weights.to_string().parse::<Weights>().unwrap(), weights);
        assert!("1,2".parse::<Weights>().is_err());
        assert!("1,x,3".parse::<Weights>().is_err());
        assert!("1,inf,3".parse::<Weights>().is_err());
    }
}
