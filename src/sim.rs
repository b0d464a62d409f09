//! Self-play simulation.
//!
//! Stands in for the screen-reading loop: boards come from the engine's own
//! random tile spawns instead of a capture, and the chosen move is applied
//! directly instead of being sent as a key press.

use rand::Rng;
use serde::Serialize;
use std::time::Instant;

use log::warn;

use crate::engine::{Board, Move, MoveResult, SIZE};
use crate::strategy::Strategy;

/// A game in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Game {
    pub board: Board,
    /// Sum of all merge gains so far.
    pub score: u64,
    pub moves: u64,
}

impl Game {
    /// A fresh game with two random tiles.
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::from_board(Board::EMPTY.with_random_tile(rng).with_random_tile(rng))
    }

    pub fn from_board(board: Board) -> Self { Self { board, score: 0, moves: 0 } }

    /// Play `dir` and spawn a tile. Returns `None`, leaving the game untouched,
    /// if the move does not change the board.
    pub fn step<R: Rng + ?Sized>(&mut self, dir: Move, rng: &mut R) -> Option<MoveResult> {
        let res = self.board.apply(dir);
        if !res.changed {
            return None;
        }
        self.board = res.board.with_random_tile(rng);
        self.score += res.gained as u64;
        self.moves += 1;
        Some(res)
    }
}

/// When to stop a game before it is lost.
#[derive(Debug, Clone, Copy, Default)]
pub struct Limits {
    pub max_moves: Option<u64>,
    pub stop_tile: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GameSummary {
    pub strategy: String,
    pub moves: u64,
    pub score: u64,
    pub highest_tile: u32,
    pub game_over: bool,
    /// Stopped because two 32768 tiles would have had to merge.
    pub merge_limit: bool,
    pub elapsed_s: f64,
    pub final_board: [[u32; SIZE]; SIZE],
}

/// Play one game from `game` to the end or the first limit hit.
pub fn play<R: Rng + ?Sized>(strategy: &mut Strategy, game: Game, rng: &mut R, limits: Limits) -> GameSummary {
    play_with(strategy, game, rng, limits, |_, _| {})
}

/// [`play`] with a callback after every move.
pub fn play_with<R, F>(strategy: &mut Strategy, mut game: Game, rng: &mut R, limits: Limits, mut on_move: F) -> GameSummary
where
    R: Rng + ?Sized,
    F: FnMut(&Game, Move),
{
    let start = Instant::now();
    let mut game_over = false;
    let mut merge_limit = false;
    loop {
        if limits.max_moves.is_some_and(|m| game.moves >= m) {
            break;
        }
        if limits.stop_tile.is_some_and(|t| game.board.highest_tile() >= t) {
            break;
        }
        let dir = match strategy.choose_move(game.board) {
            Ok(Some(dir)) => dir,
            Ok(None) => {
                game_over = game.board.is_game_over();
                break;
            }
            Err(e) => {
                warn!("stopping after {} moves: {e}", game.moves);
                merge_limit = true;
                break;
            }
        };
        if game.step(dir, rng).is_none() {
            warn!("{} chose {dir}, which does not change the board; stopping", strategy.name());
            break;
        }
        on_move(&game, dir);
    }
    GameSummary {
        strategy: strategy.name().to_string(),
        moves: game.moves,
        score: game.score,
        highest_tile: game.board.highest_tile(),
        game_over,
        merge_limit,
        elapsed_s: start.elapsed().as_secs_f64(),
        final_board: game.board.to_rows(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::Greedy;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn greedy_plays_to_the_end() {
        let mut rng = StdRng::seed_from_u64(2048);
        let mut strategy = Strategy::from(Greedy::new());
        let start = Game::new(&mut rng);
        let mut gains = 0;
        let mut last = start;
        let summary = play_with(&mut strategy, start, &mut rng, Limits::default(), |g, _| {
            gains += g.score - last.score;
            last = *g;
        });
        assert!(summary.game_over);
        assert!(!summary.merge_limit);
        assert!(Board::from_rows(summary.final_board).unwrap().is_game_over());
        assert!(summary.moves > 20);
        assert_eq!(summary.score, gains);
        assert_eq!(summary.highest_tile, last.board.highest_tile());
    }

    #[test]
    fn limits_stop_early() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut strategy = Strategy::from(Greedy::new());
        let limited = play(&mut strategy, Game::new(&mut rng), &mut rng, Limits { max_moves: Some(5), stop_tile: None });
        assert_eq!(limited.moves, 5);
        assert!(!limited.game_over);

        let summary = play(&mut strategy, Game::new(&mut rng), &mut rng, Limits { max_moves: None, stop_tile: Some(32) });
        assert!(summary.highest_tile >= 32);
        assert!(!summary.game_over);
    }

    #[test]
    fn merge_limit_ends_the_game_without_losing_it() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut strategy = Strategy::from(Greedy::new());
        let b = Board::from_rows([[32768, 32768, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]]).unwrap();
        let summary = play(&mut strategy, Game::from_board(b), &mut rng, Limits::default());
        assert!(summary.merge_limit);
        assert!(!summary.game_over);
        assert_eq!(summary.moves, 0);
        assert_eq!(summary.highest_tile, 32768);
    }

    #[test]
    fn illegal_step_leaves_game_untouched() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut game = Game::from_board(Board::from_rows([[2, 0, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap());
        let before = game;
        assert_eq!(game.step(Move::Up, &mut rng), None);
        assert_eq!(game, before);
        let res = game.step(Move::Down, &mut rng).unwrap();
        assert!(res.changed);
        assert_eq!(game.moves, 1);
        assert_eq!(game.board.count_empty(), 14);
    }
}
