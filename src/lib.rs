pub mod arena;
pub mod board;
pub mod cli_rendering;
pub mod engine;
pub mod error;
pub mod game;
pub mod presenter;
pub mod tui;
pub mod worker;

// Re-export main types
pub use board::{Board, Cell, Player, Position, CRITICAL_MASS, OPENING_CHARGE};
pub use cli_rendering::display_board;
pub use error::{ChainError, Result};
pub use game::{GameState, StateKey};
pub use tui::run_tui;
// Re-export main engine types (others available via engine::*)
pub use engine::{ScoredMove, SearchConfig, SearchEngine, SearchStatistics, SelectionPolicy, Weights};
