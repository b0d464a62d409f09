//! Native expectimax solver.
//!
//! Reads one board from stdin and prints the chosen direction. Positional
//! arguments follow the solver protocol (see `merge_2048::protocol`); all of
//! them are optional.

use anyhow::{Context, Result};
use clap::Parser;
use log::debug;
use std::io::Read;
use std::time::{Duration, Instant};

use merge_2048::config::{ExpectimaxConfig, SolverParams};
use merge_2048::engine as GameEngine;
use merge_2048::protocol;
use merge_2048::strategy::Expectimax;

#[derive(Debug, Parser)]
#[command(name = "solver", about = "Pick a 2048 move for the board on stdin")]
struct Args {
    #[arg(default_value_t = 4)]
    depth_low: u32,
    #[arg(default_value_t = 9)]
    depth_high: u32,
    /// Serious when empty cells <= this
    #[arg(default_value_t = 5)]
    serious_empty_threshold: u32,
    /// Serious when the highest tile >= this
    #[arg(default_value_t = 512)]
    serious_max_tile: u32,
    #[arg(default_value_t = 10)]
    max_empty_samples: usize,
    /// Iterative deepening budget in seconds; 0 searches straight to full depth
    #[arg(default_value_t = 0)]
    search_timeout_secs: u64,
}

impl From<&Args> for SolverParams {
    fn from(a: &Args) -> Self {
        SolverParams {
            depth_low: a.depth_low,
            depth_high: a.depth_high,
            serious_empty_threshold: a.serious_empty_threshold,
            serious_max_tile: a.serious_max_tile,
            max_empty_samples: a.max_empty_samples,
            search_timeout_secs: a.search_timeout_secs,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    let params = SolverParams::from(&args);
    GameEngine::new();

    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input).context("reading board from stdin")?;
    let board = protocol::decode_board(&input).context("invalid board")?;

    let start = Instant::now();
    let mut search = Expectimax::with_config(ExpectimaxConfig::from(&params));
    let choice = if params.search_timeout_secs > 0 {
        search.choose_move_within(board, Duration::from_secs(params.search_timeout_secs))
    } else {
        search.choose_move_parallel(board)
    }
    .context("unsupported board")?;
    let stats = search.last_stats();
    debug!("depth {} | {} nodes | {} cache hits | {:?}", stats.depth, stats.nodes, stats.cache_hits, start.elapsed());

    println!("{}", protocol::encode_reply(choice));
    Ok(())
}
