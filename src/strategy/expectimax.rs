use std::collections::HashMap;
use std::time::{Duration, Instant};

use ahash::RandomState;
use log::debug;
use rayon::prelude::*;

use crate::config::ExpectimaxConfig;
use crate::engine::{self, legal_moves, Board, Move, MoveResult, SIZE};
use crate::error::BoardError;
use crate::heuristic::{self, evaluate, score_after_move, Weights};

const WEIGHTS: Weights = Weights::EXPECTIMAX;

/// Spawned tile exponents with their probabilities (2 at 90%, 4 at 10%).
const SPAWNS: [(u8, f64); 2] = [(1, 0.9), (2, 0.1)];

/// Whose turn it is at a search node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    /// The player picks the best direction.
    Max,
    /// A tile spawns on an empty cell.
    Chance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SearchKey { board: Board, depth: u32, node: Node }

type TranspositionTable = HashMap<SearchKey, f64, RandomState>;

/// Per-branch expected value at the root.
///
/// `legal` is false when the move is a no-op for the current board; `ev` is
/// then meaningless.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchEval {
    pub dir: Move,
    pub ev: f64,
    pub legal: bool,
}

/// Counters from the last decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub nodes: u64,
    pub cache_hits: u64,
    /// Depth the decision was searched to.
    pub depth: u32,
}

/// Expectimax over player moves and random tile spawns.
///
/// The memo table belongs to this instance and only ever holds entries from
/// the current decision: every top-level call clears it first.
///
/// The `choose_move*` entry points refuse a root board at the merge limit.
/// Inside the tree such a pair simply stays unmerged.
pub struct Expectimax {
    cfg: ExpectimaxConfig,
    table: TranspositionTable,
    stats: SearchStats,
}

impl Expectimax {
    pub fn new() -> Self { Self::with_config(ExpectimaxConfig::default()) }

    pub fn with_config(cfg: ExpectimaxConfig) -> Self {
        engine::new();
        heuristic::warm();
        Self { cfg, table: TranspositionTable::default(), stats: SearchStats::default() }
    }

    pub fn config(&self) -> &ExpectimaxConfig { &self.cfg }

    /// Serious positions (few empty cells or a big tile) get `depth_high`.
    #[inline]
    pub fn is_serious(&self, board: Board) -> bool { self.cfg.is_serious(board) }

    #[inline]
    pub fn search_depth(&self, board: Board) -> u32 { self.cfg.search_depth(board) }

    /// Compute the best move using expectimax.
    ///
    /// ```
    /// use merge_2048::config::ExpectimaxConfig;
    /// use merge_2048::engine::Board;
    /// use merge_2048::strategy::Expectimax;
    /// let cfg = ExpectimaxConfig { depth_low: 2, depth_high: 3, ..Default::default() };
    /// let mut ex = Expectimax::with_config(cfg);
    /// let b = Board::from_rows([[2, 2, 4, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
    /// assert!(ex.choose_move(b).unwrap().is_some());
    /// ```
    pub fn choose_move(&mut self, board: Board) -> Result<Option<Move>, BoardError> {
        let board = board.check_merge_limit()?;
        Ok(best_of(&self.branch_evals(board)))
    }

    /// Root value of every direction, in [`Move::ALL`] order.
    pub fn branch_evals(&mut self, board: Board) -> [BranchEval; 4] {
        self.table.clear();
        let depth = self.search_depth(board);
        let mut search = Search::new(&self.cfg, &mut self.table);
        let out = Move::ALL.map(|dir| search.root_branch(board, dir, depth));
        self.stats = SearchStats { nodes: search.nodes, cache_hits: search.hits, depth };
        debug!("expectimax depth {depth}: {} nodes, {} cache hits", self.stats.nodes, self.stats.cache_hits);
        out
    }

    /// Like [`Self::branch_evals`], with the four root directions searched
    /// on the rayon pool. Each branch gets its own memo table, so the
    /// instance table is left empty afterwards.
    pub fn branch_evals_parallel(&mut self, board: Board) -> [BranchEval; 4] {
        let depth = self.search_depth(board);
        self.branches_parallel(board, depth)
    }

    pub fn choose_move_parallel(&mut self, board: Board) -> Result<Option<Move>, BoardError> {
        let board = board.check_merge_limit()?;
        Ok(best_of(&self.branch_evals_parallel(board)))
    }

    /// Iterative deepening from `depth_low` up to the adaptive depth while
    /// `budget` lasts; the deepest completed iteration decides.
    ///
    /// Values from different depths are not compared: a shallower iteration
    /// with a higher score never overrides the deepest one.
    ///
    /// Only serious positions deepen, routine ones get one parallel search
    /// at `depth_low`. An iteration that starts inside the budget always
    /// runs to completion, so the budget is a soft limit.
    pub fn choose_move_within(&mut self, board: Board, budget: Duration) -> Result<Option<Move>, BoardError> {
        let board = board.check_merge_limit()?;
        if budget.is_zero() || !self.is_serious(board) {
            return self.choose_move_parallel(board);
        }
        let start = Instant::now();
        let target = self.search_depth(board);
        let first = self.cfg.depth_low.min(target);
        let mut best = None;
        let mut totals = SearchStats::default();
        for depth in first..=target {
            if depth > first && start.elapsed() >= budget {
                break;
            }
            best = best_of(&self.branches_parallel(board, depth));
            totals.nodes += self.stats.nodes;
            totals.cache_hits += self.stats.cache_hits;
            totals.depth = depth;
        }
        debug!("deepened to {} in {:?}", totals.depth, start.elapsed());
        self.stats = totals;
        Ok(best)
    }

    /// Memoized value from the last sequential decision, if that node was visited.
    pub fn cached_value(&self, board: Board, depth: u32, node: Node) -> Option<f64> {
        self.table.get(&SearchKey { board, depth, node }).copied()
    }

    /// Statistics collected from the last decision.
    #[inline]
    pub fn last_stats(&self) -> SearchStats { self.stats }

    fn branches_parallel(&mut self, board: Board, depth: u32) -> [BranchEval; 4] {
        self.table.clear();
        let cfg = &self.cfg;
        let results: Vec<(BranchEval, u64, u64)> = Move::ALL
            .par_iter()
            .map(|&dir| {
                let mut table = TranspositionTable::default();
                let mut search = Search::new(cfg, &mut table);
                let eval = search.root_branch(board, dir, depth);
                (eval, search.nodes, search.hits)
            })
            .collect();
        let mut out = Move::ALL.map(|dir| BranchEval { dir, ev: 0.0, legal: false });
        let mut stats = SearchStats { depth, ..SearchStats::default() };
        for (slot, (eval, nodes, hits)) in out.iter_mut().zip(results) {
            *slot = eval;
            stats.nodes += nodes;
            stats.cache_hits += hits;
        }
        self.stats = stats;
        out
    }
}

impl Default for Expectimax { fn default() -> Self { Self::new() } }

/// Highest legal branch; earlier branches win ties.
fn best_of(branches: &[BranchEval]) -> Option<Move> {
    super::argmax(branches.iter().filter(|b| b.legal).map(|b| (b.dir, b.ev)))
}

/// Empty cells a chance node expands: reverse row-major order (bottom-right
/// first), truncated to `cap`.
pub(crate) fn sample_cells(board: Board, cap: usize) -> Vec<usize> {
    (0..SIZE * SIZE).rev().filter(|&idx| board.exponent(idx) == 0).take(cap).collect()
}

/// One recursive evaluation sharing a memo table.
struct Search<'a> {
    cfg: &'a ExpectimaxConfig,
    table: &'a mut TranspositionTable,
    nodes: u64,
    hits: u64,
}

impl<'a> Search<'a> {
    fn new(cfg: &'a ExpectimaxConfig, table: &'a mut TranspositionTable) -> Self {
        Self { cfg, table, nodes: 0, hits: 0 }
    }

    fn root_branch(&mut self, board: Board, dir: Move, depth: u32) -> BranchEval {
        let res = board.apply(dir);
        if !res.changed {
            return BranchEval { dir, ev: 0.0, legal: false };
        }
        BranchEval { dir, ev: self.after_move(res, depth), legal: true }
    }

    /// Value of a player move made with `depth` plies left, spawn included.
    #[inline]
    fn after_move(&mut self, res: MoveResult, depth: u32) -> f64 {
        let future = self.expectimax(res.board, depth.saturating_sub(1), Node::Chance);
        score_after_move(res.board, res.gained, &WEIGHTS) + self.cfg.gamma * future
    }

    fn expectimax(&mut self, board: Board, depth: u32, node: Node) -> f64 {
        self.nodes += 1;
        let key = SearchKey { board, depth, node };
        if let Some(&value) = self.table.get(&key) {
            self.hits += 1;
            return value;
        }
        let value = if depth == 0 || board.count_empty() == 0 {
            evaluate(board, &WEIGHTS)
        } else {
            match node {
                Node::Max => self.evaluate_max(board, depth),
                Node::Chance => self.evaluate_chance(board, depth),
            }
        };
        self.table.insert(key, value);
        value
    }

    fn evaluate_max(&mut self, board: Board, depth: u32) -> f64 {
        let mut best: Option<f64> = None;
        for (_, res) in legal_moves(board) {
            let value = self.after_move(res, depth);
            best = Some(best.map_or(value, |b| b.max(value)));
        }
        best.unwrap_or_else(|| evaluate(board, &WEIGHTS))
    }

    fn evaluate_chance(&mut self, board: Board, depth: u32) -> f64 {
        let cells = sample_cells(board, self.sample_cap(depth));
        let mut expected = 0.0;
        let mut total_prob = 0.0;
        for idx in cells {
            for (exponent, prob) in SPAWNS {
                expected += prob * self.expectimax(board.with_exponent(idx, exponent), depth - 1, Node::Max);
                total_prob += prob;
            }
        }
        if total_prob > 0.0 { expected / total_prob } else { evaluate(board, &WEIGHTS) }
    }

    #[inline]
    fn sample_cap(&self, depth: u32) -> usize {
        match self.cfg.deep_sampling {
            Some(deep) if depth >= deep.min_depth => self.cfg.max_empty_samples.min(deep.cap),
            _ => self.cfg.max_empty_samples,
        }
    }
}
