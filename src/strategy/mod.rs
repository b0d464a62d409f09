//! Move-selection policies.
//!
//! - [`Greedy`]: best single move by heuristic.
//! - [`Lookahead`]: fixed-depth search over the player's own moves, no spawns.
//! - [`Expectimax`]: player/chance alternation with adaptive depth and memoization.
//! - [`ExternalSolver`]: the same decision delegated to a native solver process.
//! - [`Fallback`]: native solver first, in-process expectimax when it has no answer.
//!
//! [`Strategy`] wraps them in one closed set. Every policy returns `Ok(None)`
//! only when it has no move to offer; for the in-process ones that means no
//! direction changes the board and the game is over. A board at the merge
//! limit (see [`Board::at_merge_limit`]) is refused by all of them with
//! [`BoardError::MergeLimit`].
//!
//! ```
//! use merge_2048::config::{LookaheadConfig, StrategyConfig};
//! use merge_2048::engine::Board;
//! use merge_2048::strategy::Strategy;
//! let mut s = Strategy::from_config(&StrategyConfig::Lookahead(LookaheadConfig::default()));
//! let b = Board::from_rows([[2, 2, 4, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
//! assert!(s.choose_move(b).unwrap().is_some());
//! assert_eq!(s.name(), "lookahead");
//! ```

use log::debug;

use crate::config::{ExpectimaxConfig, ExternalConfig, StrategyConfig};
use crate::engine::{Board, Move};
use crate::error::BoardError;

mod expectimax;
mod external;
mod greedy;
mod lookahead;

pub use expectimax::{BranchEval, Expectimax, Node, SearchStats};
pub use external::ExternalSolver;
pub use greedy::Greedy;
pub use lookahead::Lookahead;

/// Highest-scoring direction; the first one seen wins ties.
pub(crate) fn argmax(candidates: impl Iterator<Item = (Move, f64)>) -> Option<Move> {
    let mut best: Option<(Move, f64)> = None;
    for (dir, score) in candidates {
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((dir, score));
        }
    }
    best.map(|(dir, _)| dir)
}

/// Native solver backed by in-process expectimax.
pub struct Fallback {
    external: ExternalSolver,
    backup: Expectimax,
    used_backup: bool,
}

impl Fallback {
    pub fn new(external: ExternalSolver, backup: Expectimax) -> Self {
        Self { external, backup, used_backup: false }
    }

    pub fn with_config(external: &ExternalConfig, backup: ExpectimaxConfig) -> Self {
        Self::new(ExternalSolver::with_config(external), Expectimax::with_config(backup))
    }

    pub fn choose_move(&mut self, board: Board) -> Result<Option<Move>, BoardError> {
        self.used_backup = false;
        if let Some(dir) = self.external.choose_move(board)? {
            return Ok(Some(dir));
        }
        debug!("native solver gave no move, searching in-process");
        self.used_backup = true;
        self.backup.choose_move(board)
    }

    /// True if the last decision came from the in-process search.
    pub fn used_backup(&self) -> bool { self.used_backup }

    pub fn last_depth(&self) -> Option<u32> {
        if self.used_backup { Some(self.backup.last_stats().depth) } else { self.external.last_depth() }
    }
}

/// Any of the supported policies.
pub enum Strategy {
    Greedy(Greedy),
    Lookahead(Lookahead),
    Expectimax(Expectimax),
    External(ExternalSolver),
    Fallback(Fallback),
}

impl Strategy {
    pub fn from_config(cfg: &StrategyConfig) -> Self {
        match cfg {
            StrategyConfig::Greedy => Strategy::Greedy(Greedy::new()),
            StrategyConfig::Lookahead(c) => Strategy::Lookahead(Lookahead::with_config(*c)),
            StrategyConfig::Expectimax(c) => Strategy::Expectimax(Expectimax::with_config(*c)),
            StrategyConfig::External(c) => Strategy::External(ExternalSolver::with_config(c)),
            StrategyConfig::Fallback { external, backup } => Strategy::Fallback(Fallback::with_config(external, *backup)),
        }
    }

    /// Direction to play on `board`, or `None` if the policy has no move.
    pub fn choose_move(&mut self, board: Board) -> Result<Option<Move>, BoardError> {
        match self {
            Strategy::Greedy(s) => s.choose_move(board),
            Strategy::Lookahead(s) => s.choose_move(board),
            Strategy::Expectimax(s) => s.choose_move(board),
            Strategy::External(s) => s.choose_move(board),
            Strategy::Fallback(s) => s.choose_move(board),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Greedy(_) => "greedy",
            Strategy::Lookahead(_) => "lookahead",
            Strategy::Expectimax(_) => "expectimax",
            Strategy::External(_) => "external",
            Strategy::Fallback(_) => "fallback",
        }
    }

    /// Search depth behind the last decision, for policies that have one.
    pub fn last_depth(&self) -> Option<u32> {
        match self {
            Strategy::Greedy(_) => None,
            Strategy::Lookahead(s) => Some(s.config().depth),
            Strategy::Expectimax(s) => Some(s.last_stats().depth),
            Strategy::External(s) => s.last_depth(),
            Strategy::Fallback(s) => s.last_depth(),
        }
    }
}

impl From<Greedy> for Strategy { fn from(s: Greedy) -> Self { Strategy::Greedy(s) } }
impl From<Lookahead> for Strategy { fn from(s: Lookahead) -> Self { Strategy::Lookahead(s) } }
impl From<Expectimax> for Strategy { fn from(s: Expectimax) -> Self { Strategy::Expectimax(s) } }
impl From<ExternalSolver> for Strategy { fn from(s: ExternalSolver) -> Self { Strategy::External(s) } }
impl From<Fallback> for Strategy { fn from(s: Fallback) -> Self { Strategy::Fallback(s) } }

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LookaheadConfig, SolverParams};

    fn quick_expectimax() -> ExpectimaxConfig {
        ExpectimaxConfig { depth_low: 2, depth_high: 3, ..Default::default() }
    }

    fn missing_solver() -> ExternalConfig {
        ExternalConfig { binary: "/nonexistent/solver".into(), params: SolverParams::default(), timeout_secs: 1.0 }
    }

    fn all_strategies() -> Vec<Strategy> {
        vec![
            Strategy::from_config(&StrategyConfig::Greedy),
            Strategy::from_config(&StrategyConfig::Lookahead(LookaheadConfig::default())),
            Strategy::from_config(&StrategyConfig::Expectimax(quick_expectimax())),
            Strategy::from_config(&StrategyConfig::External(missing_solver())),
            Strategy::from_config(&StrategyConfig::Fallback { external: missing_solver(), backup: quick_expectimax() }),
        ]
    }

    #[test]
    fn argmax_keeps_first_of_equal_scores() {
        let picks = [(Move::Up, 1.0), (Move::Left, 3.0), (Move::Right, 3.0), (Move::Down, -1.0)];
        assert_eq!(argmax(picks.into_iter()), Some(Move::Left));
        assert_eq!(argmax(std::iter::empty()), None);
    }

    #[test]
    fn terminal_board_is_no_move_for_every_strategy() {
        let stuck = Board::from_rows([[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]]).unwrap();
        for mut s in all_strategies() {
            assert_eq!(s.choose_move(stuck), Ok(None), "{}", s.name());
        }
    }

    #[test]
    fn merge_limit_board_is_refused_not_lost() {
        // Nothing slides here, yet the two 32768s would merge.
        let limit = Board::from_rows([[32768, 32768, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]]).unwrap();
        assert!(!limit.is_game_over());
        for mut s in all_strategies() {
            assert_eq!(s.choose_move(limit), Err(BoardError::MergeLimit), "{}", s.name());
        }
    }

    #[test]
    fn fallback_uses_expectimax_when_solver_is_missing() {
        let b = Board::from_rows([[2, 2, 4, 8], [0, 0, 0, 4], [0; 4], [0, 0, 0, 2]]).unwrap();
        let mut fallback = Fallback::with_config(&missing_solver(), quick_expectimax());
        let mut direct = Expectimax::with_config(quick_expectimax());
        assert_eq!(fallback.choose_move(b), direct.choose_move(b));
        assert!(fallback.used_backup());
        assert_eq!(fallback.last_depth(), Some(2));
    }

    #[test]
    fn in_process_strategies_return_legal_moves() {
        let b = Board::from_rows([[0, 2, 0, 4], [2, 0, 8, 0], [0, 16, 0, 2], [4, 0, 2, 0]]).unwrap();
        for mut s in all_strategies().into_iter().filter(|s| !matches!(s, Strategy::External(_))) {
            let dir = s.choose_move(b).unwrap().unwrap();
            assert!(b.apply(dir).changed, "{} chose a no-op", s.name());
        }
    }
}
