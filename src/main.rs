use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use rand::{rngs::StdRng, SeedableRng};
use std::path::PathBuf;
use std::time::Duration;

use merge_2048::config::{ExpectimaxConfig, ExternalConfig, LookaheadConfig, StrategyConfig};
use merge_2048::engine as GameEngine;
use merge_2048::sim::{self, Game, GameSummary, Limits};
use merge_2048::strategy::{ExternalSolver, Strategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Kind {
    Greedy,
    Lookahead,
    Expectimax,
    External,
    Fallback,
}

#[derive(Debug, Parser)]
#[command(name = "merge-2048", about = "Self-play 2048 with a chosen move policy")]
struct Args {
    /// Move policy (ignored when --config is given)
    #[arg(long, value_enum, default_value_t = Kind::Expectimax)]
    strategy: Kind,

    /// JSON strategy description, e.g. {"kind": "lookahead", "depth": 4}
    #[arg(long)]
    config: Option<PathBuf>,

    /// Native solver binary for the external and fallback policies
    #[arg(long)]
    solver: Option<PathBuf>,

    /// Number of games to play
    #[arg(long, default_value_t = 1)]
    games: u32,

    /// Seed for tile spawns; random when omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Stop each game after this many moves
    #[arg(long)]
    steps: Option<u64>,

    /// Stop each game once the highest tile reaches this value
    #[arg(long)]
    stop_tile: Option<u32>,

    /// Suppress the spinner status line
    #[arg(long)]
    quiet: bool,

    /// Print one JSON summary per game instead of the board
    #[arg(long)]
    json: bool,
}

fn strategy_config(args: &Args) -> Result<StrategyConfig> {
    if let Some(path) = &args.config {
        return StrategyConfig::from_json_file(path).with_context(|| format!("reading {}", path.display()));
    }
    let mut external = ExternalConfig::default();
    if let Some(path) = &args.solver {
        external.binary = path.clone();
    }
    Ok(match args.strategy {
        Kind::Greedy => StrategyConfig::Greedy,
        Kind::Lookahead => StrategyConfig::Lookahead(LookaheadConfig::default()),
        Kind::Expectimax => StrategyConfig::Expectimax(ExpectimaxConfig::default()),
        Kind::External => StrategyConfig::External(external),
        Kind::Fallback => StrategyConfig::Fallback { external, backup: ExpectimaxConfig::default() },
    })
}

fn spinner(quiet: bool) -> Option<ProgressBar> {
    if quiet {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner} {elapsed_precise} | {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠁⠃⠇⠧⠷⠿⠻⠟⠯⠷⠧⠇⠃");
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(120));
    Some(pb)
}

fn report(summary: &GameSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(summary)?);
        return Ok(());
    }
    let board = GameEngine::Board::from_rows(summary.final_board)?;
    println!("{board}");
    println!(
        "{} | moves: {} | score: {} | highest tile: {} | {:.1} moves/sec{}",
        summary.strategy,
        summary.moves,
        summary.score,
        summary.highest_tile,
        summary.moves as f64 / summary.elapsed_s.max(1e-6),
        if summary.game_over { " | game over" } else if summary.merge_limit { " | merge limit" } else { "" },
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    GameEngine::new();

    let cfg = strategy_config(&args)?;
    if let StrategyConfig::External(ext) = &cfg {
        if !ExternalSolver::with_config(ext).is_available() {
            bail!("no solver binary at {}", ext.binary.display());
        }
    }
    let mut strategy = Strategy::from_config(&cfg);
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let limits = Limits { max_moves: args.steps, stop_tile: args.stop_tile };
    info!("playing {} game(s) with {}", args.games, strategy.name());

    let mut best = 0;
    for n in 1..=args.games {
        let pb = spinner(args.quiet);
        let game = Game::new(&mut rng);
        let summary = sim::play_with(&mut strategy, game, &mut rng, limits, |g, _| {
            if let Some(pb) = &pb {
                pb.set_message(format!("game {n} | moves: {} | score: {} | max: {}", g.moves, g.score, g.board.highest_tile()));
            }
        });
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        best = best.max(summary.highest_tile);
        report(&summary, args.json)?;
    }
    info!("best tile over {} game(s): {best}", args.games);
    Ok(())
}
