//! Strategy configuration records.
//!
//! Every record has a `Default` matching the tuned profile and round-trips
//! through serde, so a whole strategy can be described in a JSON file:
//!
//! ```
//! use merge_2048::config::StrategyConfig;
//! let cfg = StrategyConfig::from_json_str(r#"{ "kind": "expectimax", "depth_high": 6 }"#).unwrap();
//! match cfg {
//!     StrategyConfig::Expectimax(ex) => assert_eq!((ex.depth_low, ex.depth_high), (4, 6)),
//!     _ => unreachable!(),
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::Board;
use crate::error::ConfigError;

/// Knobs for the fixed-depth self-play search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookaheadConfig {
    /// Plies searched, counting the first move.
    pub depth: u32,
    /// Discount applied to each deeper ply.
    pub gamma: f64,
}

impl Default for LookaheadConfig {
    fn default() -> Self { Self { depth: 3, gamma: 0.9 } }
}

/// Narrower chance-node sampling near the top of very deep searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeepSampling {
    /// Remaining depth from which the reduced cap applies.
    pub min_depth: u32,
    pub cap: usize,
}

/// Configurable knobs for Expectimax.
///
/// - `depth_low` / `depth_high`: search depth for routine / serious positions.
/// - A position is serious when it has at most `serious_empty_threshold`
///   empty cells or a tile of at least `serious_max_tile`.
/// - `max_empty_samples`: chance nodes expand at most this many empty cells.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpectimaxConfig {
    pub depth_low: u32,
    pub depth_high: u32,
    pub gamma: f64,
    pub max_empty_samples: usize,
    pub serious_empty_threshold: u32,
    pub serious_max_tile: u32,
    pub deep_sampling: Option<DeepSampling>,
}

impl Default for ExpectimaxConfig {
    fn default() -> Self {
        Self {
            depth_low: 4,
            depth_high: 8,
            gamma: 0.95,
            max_empty_samples: 10,
            serious_empty_threshold: 6,
            serious_max_tile: 512,
            deep_sampling: None,
        }
    }
}

impl ExpectimaxConfig {
    pub fn is_serious(&self, board: Board) -> bool {
        board.count_empty() <= self.serious_empty_threshold || board.highest_tile() >= self.serious_max_tile
    }

    /// Depth used for a decision on `board`.
    pub fn search_depth(&self, board: Board) -> u32 {
        if self.is_serious(board) { self.depth_high } else { self.depth_low }
    }
}

/// Search parameters handed to the native solver as positional arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverParams {
    pub depth_low: u32,
    pub depth_high: u32,
    pub serious_empty_threshold: u32,
    pub serious_max_tile: u32,
    pub max_empty_samples: usize,
    /// Advisory budget for iterative deepening inside the solver; 0 disables it.
    pub search_timeout_secs: u64,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            depth_low: 4,
            depth_high: 9,
            serious_empty_threshold: 5,
            serious_max_tile: 512,
            max_empty_samples: 10,
            search_timeout_secs: 4,
        }
    }
}

impl From<&SolverParams> for ExpectimaxConfig {
    /// The search the native solver runs for these parameters.
    fn from(p: &SolverParams) -> Self {
        Self {
            depth_low: p.depth_low,
            depth_high: p.depth_high,
            gamma: 0.95,
            max_empty_samples: p.max_empty_samples,
            serious_empty_threshold: p.serious_empty_threshold,
            serious_max_tile: p.serious_max_tile,
            deep_sampling: Some(DeepSampling { min_depth: 7, cap: 6 }),
        }
    }
}

/// Where to find the native solver and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalConfig {
    pub binary: PathBuf,
    pub params: SolverParams,
    /// Hard wall-clock limit; the process is killed when it expires.
    pub timeout_secs: f64,
}

impl ExternalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs).unwrap_or(Duration::ZERO)
    }
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self { binary: default_solver_path(), params: SolverParams::default(), timeout_secs: 30.0 }
    }
}

/// `solver` next to the running executable, which is where cargo puts the
/// in-tree solver binary.
pub fn default_solver_path() -> PathBuf {
    let name = format!("solver{}", std::env::consts::EXE_SUFFIX);
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(&name)))
        .unwrap_or_else(|| PathBuf::from(name))
}

/// A complete strategy description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StrategyConfig {
    Greedy,
    Lookahead(LookaheadConfig),
    Expectimax(ExpectimaxConfig),
    External(ExternalConfig),
    /// Native solver first, in-process expectimax when it gives no answer.
    Fallback {
        #[serde(default)]
        external: ExternalConfig,
        #[serde(default)]
        backup: ExpectimaxConfig,
    },
}

impl Default for StrategyConfig {
    fn default() -> Self { StrategyConfig::Expectimax(ExpectimaxConfig::default()) }
}

impl StrategyConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
