//! merge-2048: a 2048 engine and move-selection policies
//!
//! This crate provides:
//! - A packed `Board` with table-driven moves (`engine` module)
//! - Board heuristics and their weight profiles (`heuristic` module)
//! - Greedy, lookahead and expectimax policies plus a bridge to a native solver process (`strategy` module)
//! - The line protocol spoken with that solver (`protocol` module)
//! - A self-play loop (`sim` module)
//!
//! Quick start:
//! ```
//! use merge_2048::engine::{Board, Move};
//! use merge_2048::strategy::{Greedy, Strategy};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let b0 = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
//! let mut policy = Strategy::from(Greedy::new());
//! let dir = policy.choose_move(b0).unwrap().unwrap();
//! assert!(b0.apply(dir).changed);
//! let b1 = b0.make_move(dir, &mut rng);
//! assert_eq!(b1.count_empty(), b0.apply(dir).board.count_empty() - 1);
//! ```
pub mod config;
pub mod engine;
pub mod error;
pub mod heuristic;
pub mod protocol;
pub mod sim;
pub mod strategy;
