//! Error types for the chain reaction crate
//!
//! The game core never fails on a move: illegal moves are reported through
//! `bool` returns. These errors only surface when building states, decoding
//! external data or talking to a search worker.

use thiserror::Error;

/// Errors raised at the edges of the crate
#[derive(Error, Debug)]
pub enum ChainError {
    /// Board dimensions cannot hold an opening cell for each player, or a
    /// side does not fit the 16-bit binary header
    #[error("invalid board dimensions {rows}x{columns} (need at least 2 cells and at most 65535 per side)")]
    InvalidDimensions { rows: usize, columns: usize },

    /// A resting cell at critical mass next to opponent dots
    #[error("cell {row},{column} holds {value} dots, at or above critical mass")]
    UnstableCell { row: usize, column: usize, value: u8 },

    /// Cell storage does not match the declared dimensions
    #[error("board of {rows}x{columns} expects {expected} cells, got {actual}")]
    CellCountMismatch {
        rows: usize,
        columns: usize,
        expected: usize,
        actual: usize,
    },

    /// Binary state has the wrong length for its header
    #[error("invalid state length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Cell byte outside the encoding
    #[error("invalid cell encoding 0b{0:08b}")]
    InvalidCell(u8),

    /// Player byte outside the encoding
    #[error("invalid player encoding {0}")]
    InvalidPlayer(u8),

    /// Text could not be parsed as a board position
    #[error("invalid position '{0}' (expected 'row,column')")]
    InvalidPosition(String),

    /// Text could not be parsed as evaluation weights
    #[error("invalid weights '{0}' (expected 'base,exponent,center')")]
    InvalidWeights(String),

    /// Base64 payload could not be decoded
    #[error("failed to decode base64 state: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The search worker thread is gone
    #[error("search worker channel closed")]
    WorkerClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for fallible crate operations
pub type Result<T> = std::result::Result<T, ChainError>;
