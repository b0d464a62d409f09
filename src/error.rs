//! Error types shared across the crate.
//!
//! The search core itself never fails: illegal moves are reported through
//! `MoveResult::changed` and a lost game through `Ok(None)` from
//! `choose_move`. The one board the strategies refuse is a board at the merge
//! limit. Everything else here covers the boundaries, where boards come in
//! from the outside world, where the native solver is spawned, and where
//! configuration is read from disk.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

/// Rejected board input.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    #[error("expected {expected} rows, got {got}")]
    RowCount { expected: usize, got: usize },
    #[error("row {row} has {got} cells, expected {expected}")]
    RowLength { row: usize, expected: usize, got: usize },
    #[error("negative tile {value} at ({row}, {col})")]
    Negative { row: usize, col: usize, value: i64 },
    #[error("tile {value} at ({row}, {col}) is not a power of two >= 2")]
    NotPowerOfTwo { row: usize, col: usize, value: i64 },
    #[error("tile {value} at ({row}, {col}) exceeds the largest supported tile {max}")]
    TooLarge { row: usize, col: usize, value: i64, max: u32 },
    /// Two largest tiles would merge into one the board cannot hold.
    #[error("two {} tiles would merge past the largest supported tile", crate::engine::MAX_TILE)]
    MergeLimit,
}

/// Malformed text on the native solver wire.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("empty reply")]
    EmptyReply,
    #[error("unknown direction token {0:?}")]
    UnknownToken(String),
    #[error("cell {index}: cannot parse {token:?} as an integer")]
    BadCell { index: usize, token: String },
    #[error("too many cells: expected 16, got {0}")]
    TooManyCells(usize),
    #[error(transparent)]
    Board(#[from] BoardError),
}

/// Failure while running the native solver process.
///
/// Apart from [`SolverError::Board`], these never escape
/// [`crate::strategy::ExternalSolver::choose_move`]; they exist so the bridge
/// can log what went wrong before reporting "no move".
#[derive(thiserror::Error, Debug)]
pub enum SolverError {
    #[error("solver binary not found at {0}")]
    Missing(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("solver did not answer within {0:?}")]
    Timeout(Duration),
    #[error("solver exited with {0}")]
    Exit(ExitStatus),
    #[error("solver output is not utf-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("bad solver reply: {0}")]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Board(#[from] BoardError),
}

/// Failure while loading a configuration file.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}
