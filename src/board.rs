use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{ChainError, Result};

pub const CRITICAL_MASS: u8 = 4; // a cell explodes when it holds this many dots
pub const OPENING_CHARGE: u8 = 3; // dots placed by each player's opening move
pub const MAX_DIMENSION: usize = u16::MAX as usize; // binary states store each side as a u16

/// Number of cells of a `rows x columns` board, if those dimensions are playable.
fn cell_count(rows: usize, columns: usize) -> Result<usize> {
    let invalid = || ChainError::InvalidDimensions { rows, columns };
    if rows > MAX_DIMENSION || columns > MAX_DIMENSION {
        return Err(invalid());
    }
    match rows.checked_mul(columns) {
        Some(count) if count >= 2 => Ok(count),
        _ => Err(invalid()),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Player {
    One,
    Two,
}

impl Player {
    pub fn other(self) -> Self {
        match self {
            Player::One => Player::Two,
            Player::Two => Player::One,
        }
    }

    /// Score sign of the player: the evaluation is always from player one's point of view.
    pub fn sign(self) -> f64 {
        match self {
            Player::One => 1.0,
            Player::Two => -1.0,
        }
    }

    pub fn is_maximizing(self) -> bool {
        self == Player::One
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Player::One => 1,
            Player::Two => 2,
        }
    }

    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Player::One),
            2 => Ok(Player::Two),
            _ => Err(ChainError::InvalidPlayer(value)),
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Player::One => write!(f, "Player one"),
            Player::Two => write!(f, "Player two"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub column: usize,
}

impl Position {
    /// Neighbor visitation order of a cascade: up, down, left, right.
    pub const ORTHOGONAL_MOVES: [(isize, isize); 4] = [
        (-1, 0), // Up
        (1, 0),  // Down
        (0, -1), // Left
        (0, 1),  // Right
    ];

    pub fn new(row: usize, column: usize) -> Self {
        Position { row, column }
    }

    pub fn get_new(&self, d_row: isize, d_column: isize, rows: usize, columns: usize) -> Option<Self> {
        let row = self.row.checked_add_signed(d_row)?;
        let column = self.column.checked_add_signed(d_column)?;
        if row >= rows || column >= columns {
            return None; // Out of bounds
        }
        Some(Position { row, column })
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.row, self.column)
    }
}

impl FromStr for Position {
    type Err = ChainError;

    /// Accepts `row,column` or `row column`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ChainError::InvalidPosition(s.to_string());
        let mut parts = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|part| !part.is_empty());
        let row = parts.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
        let column = parts.next().ok_or_else(invalid)?.parse().map_err(|_| invalid())?;
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Position { row, column })
    }
}

/// A grid square. `value == 0` exactly when `owner` is `None`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub value: u8,
    pub owner: Option<Player>,
}

impl Cell {
    pub const EMPTY: Cell = Cell {
        value: 0,
        owner: None,
    };

    pub fn new(value: u8, owner: Player) -> Self {
        if value == 0 {
            return Cell::EMPTY;
        }
        Cell {
            value,
            owner: Some(owner),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value == 0
    }

    pub fn is_owned_by(&self, player: Player) -> bool {
        self.value > 0 && self.owner == Some(player)
    }

    /// Packs the cell as `00OO_0VVV`: owner in bits 4-5, value in bits 0-2.
    pub fn to_u8(&self) -> u8 {
        let owner_bits = self.owner.map_or(0, Player::to_u8);
        (owner_bits << 4) | (self.value & 0b111)
    }

    pub fn from_u8(byte: u8) -> Result<Self> {
        if byte & 0b1100_1000 != 0 {
            return Err(ChainError::InvalidCell(byte));
        }
        let value = byte & 0b111;
        let owner_bits = (byte >> 4) & 0b11;
        if value > CRITICAL_MASS {
            return Err(ChainError::InvalidCell(byte));
        }
        match (value, owner_bits) {
            (0, 0) => Ok(Cell::EMPTY),
            (0, _) | (_, 0) => Err(ChainError::InvalidCell(byte)),
            (value, bits) => Ok(Cell {
                value,
                owner: Some(Player::from_u8(bits).map_err(|_| ChainError::InvalidCell(byte))?),
            }),
        }
    }
}

#[derive(Deserialize)]
struct BoardRepr {
    rows: usize,
    columns: usize,
    cells: Vec<Cell>,
}

/// Rectangular grid stored as a flat row-major arena of cells.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "BoardRepr")]
pub struct Board {
    rows: usize,
    columns: usize,
    cells: Vec<Cell>,
}

impl TryFrom<BoardRepr> for Board {
    type Error = ChainError;

    fn try_from(repr: BoardRepr) -> Result<Self> {
        Board::from_cells(repr.rows, repr.columns, repr.cells)
    }
}

impl Board {
    pub fn new(rows: usize, columns: usize) -> Result<Self> {
        let count = cell_count(rows, columns)?;
        Ok(Board {
            rows,
            columns,
            cells: vec![Cell::EMPTY; count],
        })
    }

    /// Builds a board from row-major cells.
    ///
    /// Cells at critical mass are only accepted on a decided board, where an
    /// early-terminated cascade legitimately leaves them behind. Anywhere else
    /// they could never be captured and are rejected.
    pub fn from_cells(rows: usize, columns: usize, cells: Vec<Cell>) -> Result<Self> {
        let expected = cell_count(rows, columns)?;
        if cells.len() != expected {
            return Err(ChainError::CellCountMismatch {
                rows,
                columns,
                expected,
                actual: cells.len(),
            });
        }

        // Normalize so that the value/owner invariant holds for any input.
        let cells: Vec<Cell> = cells
            .into_iter()
            .map(|cell| match cell.owner {
                Some(owner) => Cell::new(cell.value.min(CRITICAL_MASS), owner),
                None => Cell::EMPTY,
            })
            .collect();
        let board = Board { rows, columns, cells };

        let decided = board.is_dominated_by(Player::One) || board.is_dominated_by(Player::Two);
        if !decided {
            if let Some((position, cell)) = board.cells().find(|(_, cell)| cell.value >= CRITICAL_MASS) {
                return Err(ChainError::UnstableCell {
                    row: position.row,
                    column: position.column,
                    value: cell.value,
                });
            }
        }
        Ok(board)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn contains(&self, position: &Position) -> bool {
        position.row < self.rows && position.column < self.columns
    }

    fn index_of(&self, position: &Position) -> Option<usize> {
        self.contains(position)
            .then(|| position.row * self.columns + position.column)
    }

    fn position_of(&self, index: usize) -> Position {
        Position::new(index / self.columns, index % self.columns)
    }

    pub fn get(&self, position: &Position) -> Option<&Cell> {
        self.index_of(position).map(|index| &self.cells[index])
    }

    pub(crate) fn get_mut(&mut self, position: &Position) -> Option<&mut Cell> {
        self.index_of(position).map(move |index| &mut self.cells[index])
    }

    /// Overwrites a cell, returning false when the position is off the board
    /// or the cell would rest at critical mass.
    pub fn set(&mut self, position: &Position, cell: Cell) -> bool {
        if cell.value >= CRITICAL_MASS {
            return false;
        }
        match self.get_mut(position) {
            Some(slot) => {
                *slot = match cell.owner {
                    Some(owner) => Cell::new(cell.value, owner),
                    None => Cell::EMPTY,
                };
                true
            }
            None => false,
        }
    }

    /// All cells with their positions, in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (Position, &Cell)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(move |(index, cell)| (self.position_of(index), cell))
    }

    pub(crate) fn raw_cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Existing orthogonal neighbors in cascade order.
    pub fn neighbors(&self, position: &Position) -> impl Iterator<Item = Position> + '_ {
        let position = *position;
        Position::ORTHOGONAL_MOVES
            .iter()
            .filter_map(move |&(d_row, d_column)| position.get_new(d_row, d_column, self.rows, self.columns))
    }

    pub fn count_owned(&self, player: Player) -> usize {
        self.cells.iter().filter(|cell| cell.is_owned_by(player)).count()
    }

    /// True when every occupied cell belongs to `player` (vacuously true on an empty board).
    pub fn is_dominated_by(&self, player: Player) -> bool {
        self.cells
            .iter()
            .filter(|cell| cell.value > 0)
            .all(|cell| cell.owner == Some(player))
    }

    /// Explodes `start` and propagates the chain reaction, stopping as soon as
    /// the exploding player owns every occupied cell.
    pub fn resolve_cascade(&mut self, start: &Position) -> usize {
        self.resolve(start, true, None)
    }

    /// Same as [`Board::resolve_cascade`] but never stops early.
    pub fn resolve_cascade_full(&mut self, start: &Position) -> usize {
        self.resolve(start, false, None)
    }

    /// Cascade with an observer called once per explosion with the cells still
    /// waiting to explode. The observer cannot touch the board.
    pub fn resolve_cascade_with<F>(&mut self, start: &Position, early_exit: bool, mut observer: F) -> usize
    where
        F: FnMut(&[Position]),
    {
        self.resolve(start, early_exit, Some(&mut observer))
    }

    /// Breadth-first explosion queue over cell indices. A cell sitting at
    /// critical mass is already queued and receives nothing until it explodes.
    /// Returns the number of explosions.
    fn resolve(
        &mut self,
        start: &Position,
        early_exit: bool,
        mut observer: Option<&mut dyn FnMut(&[Position])>,
    ) -> usize {
        let Some(start_index) = self.index_of(start) else {
            return 0;
        };
        let Some(owner) = self.cells[start_index].owner else {
            return 0;
        };
        let opponent = owner.other();
        let mut opponent_cells = self.count_owned(opponent);

        self.cells[start_index].value = CRITICAL_MASS;
        let mut queue = VecDeque::from([start_index]);
        let mut explosions = 0;

        while let Some(current) = queue.pop_front() {
            self.cells[current] = Cell::EMPTY;
            explosions += 1;

            let current_position = self.position_of(current);
            for &(d_row, d_column) in Position::ORTHOGONAL_MOVES.iter() {
                let Some(neighbor) = current_position.get_new(d_row, d_column, self.rows, self.columns) else {
                    continue;
                };
                let index = neighbor.row * self.columns + neighbor.column;
                let cell = &mut self.cells[index];
                if cell.value >= CRITICAL_MASS {
                    continue;
                }
                if cell.is_owned_by(opponent) {
                    opponent_cells -= 1;
                }
                cell.value += 1;
                cell.owner = Some(owner);
                if cell.value >= CRITICAL_MASS {
                    cell.value = CRITICAL_MASS;
                    queue.push_back(index);
                }
            }

            if let Some(observer) = observer.as_mut() {
                let pending: Vec<Position> = queue.iter().map(|&index| self.position_of(index)).collect();
                observer(&pending);
            }

            if early_exit && opponent_cells == 0 {
                break;
            }
        }

        trace!(explosions, pending = queue.len(), "cascade resolved");
        explosions
    }

    /// Packs every cell, row-major.
    pub fn to_binary(&self) -> Vec<u8> {
        self.cells.iter().map(Cell::to_u8).collect()
    }

    pub fn from_binary(rows: usize, columns: usize, bytes: &[u8]) -> Result<Self> {
        let cells = bytes
            .iter()
            .map(|&byte| Cell::from_u8(byte))
            .collect::<Result<Vec<_>>>()?;
        Board::from_cells(rows, columns, cells)
    }
}
