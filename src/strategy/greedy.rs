use crate::engine::{legal_moves, Board, Move};
use crate::error::BoardError;
use crate::heuristic::{score_after_move, Weights};

use super::argmax;

/// One-ply policy: the legal move whose resulting board scores best.
#[derive(Debug, Clone)]
pub struct Greedy {
    weights: Weights,
}

impl Greedy {
    pub fn new() -> Self { Self::with_weights(Weights::GREEDY) }

    pub fn with_weights(weights: Weights) -> Self {
        crate::heuristic::warm();
        Self { weights }
    }

    /// Best legal move by `gained + heuristic(result)`; the earlier direction
    /// in [`Move::ALL`] wins ties. `Ok(None)` when no move changes the board.
    ///
    /// ```
    /// use merge_2048::engine::{Board, Move};
    /// use merge_2048::strategy::Greedy;
    /// let b = Board::from_rows([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
    /// assert_eq!(Greedy::new().choose_move(b), Ok(Some(Move::Left)));
    /// ```
    pub fn choose_move(&self, board: Board) -> Result<Option<Move>, BoardError> {
        let board = board.check_merge_limit()?;
        Ok(argmax(legal_moves(board).map(|(dir, res)| (dir, self.move_value(res.board, res.gained)))))
    }

    #[inline]
    pub(crate) fn move_value(&self, board: Board, gained: u32) -> f64 {
        score_after_move(board, gained, &self.weights)
    }
}

impl Default for Greedy { fn default() -> Self { Self::new() } }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_merging_over_sliding() {
        // Left and Right both merge to a cornered 4 (1154); Down only slides (1150).
        let b = Board::from_rows([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
        let greedy = Greedy::new();
        assert_eq!(greedy.choose_move(b), Ok(Some(Move::Left)));
        assert_eq!(greedy.choose_move(b), greedy.choose_move(b));
    }

    #[test]
    fn ties_go_to_the_earlier_direction() {
        // Only Right and Down are legal and they mirror each other.
        let b = Board::from_rows([[2, 0, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
        assert_eq!(Greedy::new().choose_move(b), Ok(Some(Move::Right)));
    }

    #[test]
    fn merge_limit_is_refused() {
        let b = Board::from_rows([[32768, 32768, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]]).unwrap();
        assert_eq!(Greedy::new().choose_move(b), Err(BoardError::MergeLimit));
    }
}
