use criterion::{criterion_group, criterion_main, Criterion};
use merge_2048::config::{ExpectimaxConfig, LookaheadConfig};
use merge_2048::engine::{self as GameEngine, Board, Move};
use merge_2048::error::BoardError;
use merge_2048::strategy::{Expectimax, Greedy, Lookahead};
use rand::{rngs::StdRng, SeedableRng};
use rayon::ThreadPoolBuilder;
use std::hint::black_box;

fn warm() { GameEngine::new(); }

fn corpus() -> Vec<Board> {
    let mut rng = StdRng::seed_from_u64(7777);
    let mut boards = Vec::new();
    let mut b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    boards.push(b);
    for i in 0..32 {
        let dir = Move::ALL[i % Move::ALL.len()];
        let nb = b.shift(dir);
        if nb != b { b = nb.with_random_tile(&mut rng); }
        boards.push(b);
    }
    boards
}

fn pick_all(boards: &[Board], mut pick: impl FnMut(Board) -> Result<Option<Move>, BoardError>) -> u64 {
    boards.iter().fold(0u64, |acc, &bd| acc ^ pick(bd).ok().flatten().map_or(0, |m| m as u64 + 1))
}

fn bench_shallow(c: &mut Criterion) {
    warm();
    let boards = corpus();
    let greedy = Greedy::new();
    c.bench_function("greedy/choose_move", |bch| bch.iter(|| black_box(pick_all(&boards, |b| greedy.choose_move(b)))));
    let la = Lookahead::with_config(LookaheadConfig::default());
    c.bench_function("lookahead/choose_move", |bch| bch.iter(|| black_box(pick_all(&boards, |b| la.choose_move(b)))));
}

fn bench_expectimax(c: &mut Criterion) {
    warm();
    // Pin a small pool for stability
    let pool = ThreadPoolBuilder::new().num_threads(4).build().expect("rayon pool");
    let boards = corpus();
    let cfg = ExpectimaxConfig { depth_low: 3, depth_high: 4, ..Default::default() };
    let mut ex = Expectimax::with_config(cfg);

    c.bench_function("expectimax/choose_move", |bch| bch.iter(|| black_box(pick_all(&boards, |b| ex.choose_move(b)))));
    c.bench_function("expectimax/choose_move_parallel", |bch| {
        bch.iter(|| pool.install(|| black_box(pick_all(&boards, |b| ex.choose_move_parallel(b)))))
    });
    c.bench_function("expectimax/branch_evals", |bch| {
        bch.iter(|| {
            let mut acc = 0.0;
            for &bd in &boards {
                for be in ex.branch_evals(bd) { if be.legal { acc += be.ev; } }
            }
            black_box(acc)
        })
    });
}

criterion_group!(benches, bench_shallow, bench_expectimax);
criterion_main!(benches);
