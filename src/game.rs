use serde::{Deserialize, Serialize};

use crate::board::{Board, Cell, Player, Position, CRITICAL_MASS, OPENING_CHARGE};
use crate::error::{ChainError, Result};

/// Size of the binary header: rows and columns as little-endian `u16`.
const HEADER_SIZE: usize = 4;
/// Bytes after the cells in a canonical key: player byte and `u32` turn.
const TRAILER_SIZE: usize = 5;

/// Canonical serialization of a game state, used as transposition table key.
///
/// Layout: one packed byte per cell in row-major order, one player byte, the
/// turn as little-endian `u32`. Board dimensions are not part of the key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateKey(Vec<u8>);

impl StateKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Turn and player bookkeeping on top of a board.
///
/// The first two turns are the opening: each player drops a fixed charge on
/// an empty cell. Afterwards a player may only add a dot to a cell it owns.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameState {
    board: Board,
    current_player: Player,
    turn: u32,
}

impl GameState {
    pub fn new(rows: usize, columns: usize) -> Result<Self> {
        Self::with_first_player(rows, columns, Player::One)
    }

    pub fn with_first_player(rows: usize, columns: usize, first: Player) -> Result<Self> {
        Ok(GameState {
            board: Board::new(rows, columns)?,
            current_player: first,
            turn: 0,
        })
    }

    pub fn from_parts(board: Board, current_player: Player, turn: u32) -> Self {
        GameState {
            board,
            current_player,
            turn,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn current_player(&self) -> Player {
        self.current_player
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn is_opening(&self) -> bool {
        self.turn < 2
    }

    /// Off-board positions are simply invalid.
    pub fn is_valid_move(&self, position: &Position) -> bool {
        let Some(cell) = self.board.get(position) else {
            return false;
        };
        if self.is_opening() {
            cell.is_empty()
        } else {
            cell.is_owned_by(self.current_player)
        }
    }

    pub fn valid_moves(&self) -> Vec<Position> {
        self.board
            .cells()
            .map(|(position, _)| position)
            .filter(|position| self.is_valid_move(position))
            .collect()
    }

    /// Plays `position` for the current player. Returns false and leaves the
    /// state untouched when the move is illegal.
    pub fn apply_move(&mut self, position: Position) -> bool {
        self.play(position, None)
    }

    /// Like [`GameState::apply_move`], forwarding every cascade step to `observer`.
    pub fn apply_move_observed<F>(&mut self, position: Position, mut observer: F) -> bool
    where
        F: FnMut(&[Position]),
    {
        self.play(position, Some(&mut observer))
    }

    fn play(&mut self, position: Position, observer: Option<&mut dyn FnMut(&[Position])>) -> bool {
        if !self.is_valid_move(&position) {
            return false;
        }

        let opening = self.is_opening();
        let player = self.current_player;
        let Some(cell) = self.board.get_mut(&position) else {
            return false;
        };
        if opening {
            *cell = Cell::new(OPENING_CHARGE, player);
        } else {
            cell.value += 1;
            if cell.value >= CRITICAL_MASS {
                match observer {
                    Some(observer) => {
                        self.board.resolve_cascade_with(&position, true, observer);
                    }
                    None => {
                        self.board.resolve_cascade(&position);
                    }
                }
            }
        }

        self.current_player = player.other();
        self.turn += 1;
        true
    }

    /// The game ends once the opening is over and the player to move has no
    /// dot left on the board.
    pub fn is_game_over(&self) -> bool {
        self.turn > 1 && self.board.is_dominated_by(self.current_player.other())
    }

    pub fn winner(&self) -> Option<Player> {
        self.is_game_over().then(|| self.current_player.other())
    }

    pub fn canonical_key(&self) -> StateKey {
        let cells = self.board.raw_cells();
        let mut bytes = Vec::with_capacity(cells.len() + TRAILER_SIZE);
        bytes.extend(cells.iter().map(Cell::to_u8));
        bytes.push(self.current_player.to_u8());
        bytes.extend_from_slice(&self.turn.to_le_bytes());
        StateKey(bytes)
    }

    /// Dimensions header followed by the canonical key. Each side fits the
    /// u16 header because `Board` caps it at [`crate::board::MAX_DIMENSION`].
    pub fn to_binary(&self) -> Vec<u8> {
        let key = self.canonical_key();
        let mut binary = Vec::with_capacity(HEADER_SIZE + key.0.len());
        for side in [self.board.rows(), self.board.columns()] {
            let side = u16::try_from(side).unwrap_or(u16::MAX);
            binary.extend_from_slice(&side.to_le_bytes());
        }
        binary.extend_from_slice(key.as_bytes());
        binary
    }

    pub fn from_binary(binary: &[u8]) -> Result<Self> {
        if binary.len() < HEADER_SIZE {
            return Err(ChainError::InvalidLength {
                expected: HEADER_SIZE,
                actual: binary.len(),
            });
        }
        let rows = u16::from_le_bytes([binary[0], binary[1]]) as usize;
        let columns = u16::from_le_bytes([binary[2], binary[3]]) as usize;
        let cell_count = rows * columns;
        let expected = HEADER_SIZE + cell_count + TRAILER_SIZE;
        if binary.len() != expected {
            return Err(ChainError::InvalidLength {
                expected,
                actual: binary.len(),
            });
        }

        let cells_end = HEADER_SIZE + cell_count;
        let board = Board::from_binary(rows, columns, &binary[HEADER_SIZE..cells_end])?;
        let current_player = Player::from_u8(binary[cells_end])?;
        let mut turn_bytes = [0u8; 4];
        turn_bytes.copy_from_slice(&binary[cells_end + 1..]);

        Ok(GameState {
            board,
            current_player,
            turn: u32::from_le_bytes(turn_bytes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::MAX_DIMENSION;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    fn pos(row: usize, column: usize) -> Position {
        Position::new(row, column)
    }

    #[test]
    fn test_opening_moves() {
        let mut state = GameState::new(3, 3).unwrap();
        assert!(state.apply_move(pos(1, 1)));
        assert!(state.apply_move(pos(0, 0)));

        assert_eq!(state.turn(), 2);
        assert_eq!(state.board().get(&pos(1, 1)), Some(&Cell::new(3, Player::One)));
        assert_eq!(state.board().get(&pos(0, 0)), Some(&Cell::new(3, Player::Two)));
        assert_eq!(state.current_player(), Player::One);
        assert_eq!(state.valid_moves(), vec![pos(1, 1)]);
        assert!(!state.is_game_over());
    }

    #[test]
    fn test_opening_rejects_occupied_cell() {
        let mut state = GameState::new(3, 3).unwrap();
        assert!(state.apply_move(pos(1, 1)));
        let before = state.clone();
        assert!(!state.apply_move(pos(1, 1)));
        assert_eq!(state, before);
    }

    #[test]
    fn test_midgame_requires_own_cell() {
        let mut state = GameState::new(3, 3).unwrap();
        state.apply_move(pos(1, 1));
        state.apply_move(pos(0, 0));
        let before = state.clone();

        assert!(!state.apply_move(pos(0, 0))); // opponent's cell
        assert!(!state.apply_move(pos(2, 2))); // empty cell
        assert!(!state.apply_move(pos(3, 0))); // off the board
        assert!(!state.apply_move(pos(usize::MAX, 0)));
        assert_eq!(state, before);
    }

    #[test]
    fn test_explosion_from_move() {
        let mut state = GameState::new(3, 3).unwrap();
        state.apply_move(pos(1, 1));
        state.apply_move(pos(2, 2));

        assert!(state.apply_move(pos(1, 1)));

        let board = state.board();
        assert_eq!(board.get(&pos(1, 1)), Some(&Cell::EMPTY));
        for neighbor in [pos(0, 1), pos(2, 1), pos(1, 0), pos(1, 2)] {
            assert_eq!(board.get(&neighbor), Some(&Cell::new(1, Player::One)));
        }
        assert_eq!(board.get(&pos(2, 2)), Some(&Cell::new(3, Player::Two)));
        assert_eq!(state.turn(), 3);
        assert_eq!(state.current_player(), Player::Two);
    }

    #[test]
    fn test_game_over_after_capture() {
        let mut state = GameState::new(1, 3).unwrap();
        state.apply_move(pos(0, 0));
        state.apply_move(pos(0, 1));
        assert!(!state.is_game_over());

        // Player one's explosion captures (0,1), player two's only cell.
        assert!(state.apply_move(pos(0, 0)));
        assert!(state.is_game_over());
        assert_eq!(state.winner(), Some(Player::One));
        assert!(state.valid_moves().is_empty());
    }

    #[test]
    fn test_never_over_during_opening() {
        let mut board = Board::new(2, 2).unwrap();
        board.set(&pos(0, 0), Cell::new(3, Player::One));
        for turn in 0..2 {
            for player in [Player::One, Player::Two] {
                let state = GameState::from_parts(board.clone(), player, turn);
                assert!(!state.is_game_over());
                assert_eq!(state.winner(), None);
            }
        }
    }

    #[test]
    fn test_turn_and_player_alternate_on_random_play() {
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..20 {
            let mut state = GameState::new(4, 4).unwrap();
            while !state.is_game_over() && state.turn() < 200 {
                let (turn, player) = (state.turn(), state.current_player());
                if rng.gen_bool(0.3) {
                    let bogus = pos(rng.gen_range(0..6), rng.gen_range(0..6));
                    if !state.is_valid_move(&bogus) {
                        assert!(!state.apply_move(bogus));
                        assert_eq!((state.turn(), state.current_player()), (turn, player));
                        continue;
                    }
                }
                let moves = state.valid_moves();
                let choice = *moves.choose(&mut rng).unwrap();
                assert!(state.apply_move(choice));
                assert_eq!(state.turn(), turn + 1);
                assert_eq!(state.current_player(), player.other());
            }
        }
    }

    #[test]
    fn test_clone_is_independent() {
        let mut state = GameState::new(3, 3).unwrap();
        state.apply_move(pos(0, 0));
        let snapshot = state.clone();
        state.apply_move(pos(2, 2));
        state.apply_move(pos(0, 0));

        assert_eq!(snapshot.turn(), 1);
        assert_eq!(snapshot.board().get(&pos(2, 2)), Some(&Cell::EMPTY));
        assert_eq!(snapshot.board().get(&pos(0, 0)), Some(&Cell::new(3, Player::One)));
    }

    #[test]
    fn test_canonical_key_identifies_state() {
        let mut a = GameState::new(3, 3).unwrap();
        let mut b = GameState::new(3, 3).unwrap();
        assert_eq!(a.canonical_key(), b.canonical_key());

        a.apply_move(pos(0, 0));
        assert_ne!(a.canonical_key(), b.canonical_key());
        b.apply_move(pos(0, 0));
        assert_eq!(a.canonical_key(), b.canonical_key());

        let other_player = GameState::from_parts(a.board().clone(), Player::One, a.turn());
        assert_ne!(a.canonical_key(), other_player.canonical_key());
        assert_eq!(a.canonical_key().as_bytes().len(), 9 + TRAILER_SIZE);
    }

    #[test]
    fn test_binary_rejects_bad_input() {
        let state = GameState::new(2, 3).unwrap();
        let mut binary = state.to_binary();
        assert_eq!(GameState::from_binary(&binary).unwrap(), state);

        binary.pop();
        assert!(matches!(
            GameState::from_binary(&binary),
            Err(ChainError::InvalidLength { .. })
        ));

        let mut bad_player = state.to_binary();
        bad_player[HEADER_SIZE + 6] = 7;
        assert!(matches!(
            GameState::from_binary(&bad_player),
            Err(ChainError::InvalidPlayer(7))
        ));
    }

    #[test]
    fn test_serde_rejects_mismatched_board() {
        let json = r#"{"board":{"rows":2,"columns":2,"cells":[]},"current_player":"one","turn":0}"#;
        assert!(serde_json::from_str::<GameState>(json).is_err());
    }

    #[test]
    fn test_serde_rejects_overflowing_board() {
        let json = r#"{"board":{"rows":8589934592,"columns":8589934592,"cells":[]},"current_player":"one","turn":0}"#;
        assert!(serde_json::from_str::<GameState>(json).is_err());
    }

    #[test]
    fn test_binary_round_trip_at_dimension_cap() {
        assert!(GameState::new(MAX_DIMENSION + 1, 1).is_err());

        let mut state = GameState::new(MAX_DIMENSION, 1).unwrap();
        state.apply_move(pos(MAX_DIMENSION - 1, 0));
        let binary = state.to_binary();
        assert_eq!(&binary[..HEADER_SIZE], &[0xff, 0xff, 1, 0]);
        assert_eq!(GameState::from_binary(&binary).unwrap(), state);
    }

    #[test]
    fn test_finished_game_round_trips() {
        // The capture stops the cascade with (0,1) still queued at critical mass.
        let mut state = GameState::new(1, 3).unwrap();
        state.apply_move(pos(0, 0));
        state.apply_move(pos(0, 1));
        state.apply_move(pos(0, 0));
        assert!(state.is_game_over());

        assert_eq!(GameState::from_binary(&state.to_binary()).unwrap(), state);
    }

    #[test]
    fn test_second_player_can_open() {
        let mut state = GameState::with_first_player(3, 3, Player::Two).unwrap();
        assert_eq!(state.current_player(), Player::Two);
        assert!(state.apply_move(pos(1, 1)));
        assert_eq!(state.board().get(&pos(1, 1)), Some(&Cell::new(3, Player::Two)));
        assert_eq!(state.current_player(), Player::One);
    }
}
