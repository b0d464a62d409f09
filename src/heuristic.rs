//! Static board evaluation.
//!
//! Five sub-scores are computed from a board and combined linearly with a
//! strategy-specific [`Weights`] profile. The per-line parts (monotonicity and
//! roughness) are precomputed for every possible 16-bit line, the same way the
//! engine precomputes its move tables, and summed over the four rows and four
//! columns.

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::engine::{self, Board, SIZE};

/// Bonus for a board whose largest tile sits in a corner.
pub const CORNER_BONUS: u32 = 1000;
/// Bonus per row or column whose non-empty tiles are monotone.
pub const MONOTONE_LINE_BONUS: u32 = 5;

const CORNERS: [usize; 4] = [0, SIZE - 1, SIZE * (SIZE - 1), SIZE * SIZE - 1];

#[derive(Clone, Copy, Default)]
struct LineStats {
    monotone: bool,
    /// Sum of |a - b| over directly adjacent non-empty pairs.
    roughness: u32,
}

static LINE_STATS: OnceLock<Box<[LineStats]>> = OnceLock::new();

pub(crate) fn warm() {
    let _ = line_stats();
}

fn line_stats() -> &'static [LineStats] {
    LINE_STATS
        .get_or_init(|| {
            let mut v = vec![LineStats::default(); 0x1_0000];
            for (i, slot) in v.iter_mut().enumerate() {
                *slot = calc_line_stats(engine::line_to_tiles(i as u16));
            }
            v.into_boxed_slice()
        })
        .as_ref()
}

fn calc_line_stats(tiles: [u8; SIZE]) -> LineStats {
    let values: Vec<u32> = tiles.iter().map(|&e| engine::exponent_to_value(e)).collect();
    let present: Vec<u32> = values.iter().copied().filter(|&v| v != 0).collect();
    let monotone = present.len() > 1
        && (present.windows(2).all(|w| w[0] <= w[1]) || present.windows(2).all(|w| w[0] >= w[1]));
    let roughness = values
        .windows(2)
        .filter(|w| w[0] != 0 && w[1] != 0)
        .map(|w| w[0].abs_diff(w[1]))
        .sum();
    LineStats { monotone, roughness }
}

/// Raw (unweighted) sub-scores of a board.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Features {
    pub empty: u32,
    pub corner: u32,
    pub monotonicity: u32,
    /// Non-positive; more negative means rougher.
    pub smoothness: f64,
    pub max_tile: u32,
}

impl Features {
    pub fn of(board: Board) -> Self {
        let stats = line_stats();
        let transposed = engine::transpose(board.raw());
        let (monotone_lines, roughness) = (0..SIZE)
            .flat_map(|idx| [engine::extract_line(board.raw(), idx), engine::extract_line(transposed, idx)])
            .fold((0u32, 0u64), |(mono, rough), line| {
                let s = stats[line as usize];
                (mono + s.monotone as u32, rough + s.roughness as u64)
            });
        let max_exp = (0..SIZE * SIZE).map(|idx| board.exponent(idx)).max().unwrap_or(0);
        let cornered = CORNERS.iter().any(|&idx| board.exponent(idx) == max_exp);
        Features {
            empty: board.count_empty(),
            corner: if cornered { CORNER_BONUS } else { 0 },
            monotonicity: monotone_lines * MONOTONE_LINE_BONUS,
            smoothness: -(roughness as f64),
            max_tile: engine::exponent_to_value(max_exp),
        }
    }
}

/// Number of empty cells.
pub fn empty_cells(board: Board) -> u32 { board.count_empty() }

/// [`CORNER_BONUS`] if the largest value occupies a corner, else 0.
///
/// An empty board counts as cornered: its largest value, 0, is in every corner.
pub fn corner_bonus(board: Board) -> u32 { Features::of(board).corner }

/// [`MONOTONE_LINE_BONUS`] for every row and column whose non-empty tiles
/// never increase or never decrease. Lines with fewer than two tiles score 0.
pub fn monotonicity(board: Board) -> u32 { Features::of(board).monotonicity }

/// Negated sum of |a - b| over horizontally or vertically adjacent non-empty cells.
pub fn smoothness(board: Board) -> f64 { Features::of(board).smoothness }

/// The largest tile value.
pub fn max_tile(board: Board) -> u32 { board.highest_tile() }

/// Linear weights for combining [`Features`] (plus the merge score of the
/// move that produced the board) into one desirability value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub gained: f64,
    pub empty: f64,
    pub corner: f64,
    pub monotonicity: f64,
    pub smoothness: f64,
    pub max_tile: f64,
}

impl Weights {
    /// Profile used by the greedy and lookahead strategies.
    pub const GREEDY: Weights = Weights {
        gained: 1.0,
        empty: 10.0,
        corner: 1.0,
        monotonicity: 2.0,
        smoothness: 0.0,
        max_tile: 0.0,
    };

    /// Profile used by expectimax.
    pub const EXPECTIMAX: Weights = Weights {
        gained: 0.1,
        empty: 15.0,
        corner: 2.5,
        monotonicity: 4.0,
        smoothness: 0.1,
        max_tile: 0.01,
    };

    #[inline]
    pub fn combine(&self, f: &Features, gained: u32) -> f64 {
        gained as f64 * self.gained
            + f.empty as f64 * self.empty
            + f.corner as f64 * self.corner
            + f.monotonicity as f64 * self.monotonicity
            + f.smoothness * self.smoothness
            + f.max_tile as f64 * self.max_tile
    }
}

impl Default for Weights {
    fn default() -> Self { Weights::EXPECTIMAX }
}

/// Static evaluation of `board` with no move score.
///
/// ```
/// use merge_2048::engine::Board;
/// use merge_2048::heuristic::{evaluate, Weights};
/// let b = Board::from_rows([[2, 4, 8, 16], [0; 4], [0; 4], [0, 0, 0, 2]]).unwrap();
/// assert_eq!(evaluate(b, &Weights::GREEDY), 1130.0);
/// ```
#[inline]
pub fn evaluate(board: Board, weights: &Weights) -> f64 {
    weights.combine(&Features::of(board), 0)
}

/// Evaluation of a board reached by a move that merged `gained` points.
#[inline]
pub fn score_after_move(board: Board, gained: u32, weights: &Weights) -> f64 {
    weights.combine(&Features::of(board), gained)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(rows: [[u32; 4]; 4]) -> Board {
        Board::from_rows(rows).unwrap()
    }

    #[test]
    fn features_of_sample_board() {
        let b = board([[2, 4, 8, 16], [0; 4], [0; 4], [0, 0, 0, 2]]);
        let f = Features::of(b);
        assert_eq!(f.empty, 11);
        assert_eq!(f.corner, CORNER_BONUS);
        // row 0 ascends, column 3 reads 16, 2
        assert_eq!(f.monotonicity, 10);
        assert_eq!(f.smoothness, -14.0);
        assert_eq!(f.max_tile, 16);
    }

    #[test]
    fn weighted_profiles() {
        let b = board([[2, 4, 8, 16], [0; 4], [0; 4], [0, 0, 0, 2]]);
        assert_eq!(evaluate(b, &Weights::GREEDY), 1130.0);
        assert_eq!(score_after_move(b, 8, &Weights::GREEDY), 1138.0);
        let ev = evaluate(b, &Weights::EXPECTIMAX);
        assert!((ev - 2703.76).abs() < 1e-9, "{ev}");
    }

    #[test]
    fn corner_bonus_requires_max_in_corner() {
        assert_eq!(corner_bonus(board([[0, 0, 0, 0], [0, 64, 0, 0], [0; 4], [2, 0, 0, 0]])), 0);
        assert_eq!(corner_bonus(board([[0, 0, 0, 0], [0, 2, 0, 0], [0; 4], [64, 0, 0, 0]])), CORNER_BONUS);
        assert_eq!(corner_bonus(Board::EMPTY), CORNER_BONUS);
    }

    #[test]
    fn monotonicity_ignores_gaps_and_short_lines() {
        // row 0: 2 _ 8 4 is not monotone; row 1: 8 _ _ 2 is; single tiles score nothing
        let b = board([[2, 0, 8, 4], [8, 0, 0, 2], [0; 4], [0; 4]]);
        // columns: 2,8 ascending; 8 alone; 4,2 descending
        assert_eq!(monotonicity(b), 3 * MONOTONE_LINE_BONUS);
        assert_eq!(monotonicity(Board::EMPTY), 0);
        let flat = board([[4, 4, 4, 4], [0; 4], [0; 4], [0; 4]]);
        assert_eq!(monotonicity(flat), MONOTONE_LINE_BONUS);
    }

    #[test]
    fn smoothness_only_counts_adjacent_pairs() {
        let gap = board([[2, 0, 0, 64], [0; 4], [0; 4], [0; 4]]);
        assert_eq!(smoothness(gap), 0.0);
        let vertical = board([[2, 0, 0, 0], [32, 0, 0, 0], [0; 4], [0; 4]]);
        assert_eq!(smoothness(vertical), -30.0);
        assert_eq!(empty_cells(vertical), 14);
        assert_eq!(max_tile(vertical), 32);
    }
}
