//! Text protocol spoken with the native solver process.
//!
//! - argv: `depth_low depth_high serious_empty_threshold serious_max_tile
//!   max_empty_samples search_timeout_seconds`, all decimal.
//! - stdin: four newline-terminated lines of four space-separated tile values.
//! - stdout: one lower-case line, `up`, `down`, `left`, `right` or `none`.

use crate::config::SolverParams;
use crate::engine::{Board, Move, SIZE};
use crate::error::ProtocolError;

/// Token for "no legal move".
pub const NO_MOVE: &str = "none";

/// Positional arguments for the solver, in wire order.
pub fn solver_args(params: &SolverParams) -> Vec<String> {
    vec![
        params.depth_low.to_string(),
        params.depth_high.to_string(),
        params.serious_empty_threshold.to_string(),
        params.serious_max_tile.to_string(),
        params.max_empty_samples.to_string(),
        params.search_timeout_secs.to_string(),
    ]
}

/// Row-major board text.
///
/// ```
/// use merge_2048::engine::Board;
/// use merge_2048::protocol::encode_board;
/// let b = Board::from_rows([[2, 2, 4, 0], [0; 4], [0; 4], [0, 0, 0, 1024]]).unwrap();
/// assert_eq!(encode_board(b), "2 2 4 0\n0 0 0 0\n0 0 0 0\n0 0 0 1024\n");
/// ```
pub fn encode_board(board: Board) -> String {
    let mut out = String::with_capacity(64);
    for row in board.to_rows() {
        let cells: Vec<String> = row.iter().map(u32::to_string).collect();
        out.push_str(&cells.join(" "));
        out.push('\n');
    }
    out
}

/// Parse board text as written by [`encode_board`].
///
/// Any whitespace separates cells. Cells missing at the end of the input
/// are treated as empty; extra cells, non-integers and invalid tiles are
/// errors.
pub fn decode_board(text: &str) -> Result<Board, ProtocolError> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() > SIZE * SIZE {
        return Err(ProtocolError::TooManyCells(tokens.len()));
    }
    let mut grid = [[0i64; SIZE]; SIZE];
    for (index, token) in tokens.into_iter().enumerate() {
        grid[index / SIZE][index % SIZE] = token
            .parse()
            .map_err(|_| ProtocolError::BadCell { index, token: token.to_string() })?;
    }
    Ok(Board::from_grid(&grid)?)
}

/// The reply line for a decision.
pub fn encode_reply(choice: Option<Move>) -> &'static str {
    choice.map_or(NO_MOVE, Move::as_str)
}

/// Parse the solver's stdout.
///
/// Surrounding whitespace and letter case are ignored. `none` means the
/// solver found no legal move.
pub fn parse_reply(text: &str) -> Result<Option<Move>, ProtocolError> {
    let token = text.trim().to_ascii_lowercase();
    if token.is_empty() {
        return Err(ProtocolError::EmptyReply);
    }
    if token == NO_MOVE {
        return Ok(None);
    }
    token.parse::<Move>().map(Some)
}
