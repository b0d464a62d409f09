use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use merge_2048::engine::{self as GameEngine, legal_moves, Board, Move};
use merge_2048::heuristic::{evaluate, Features, Weights};
use merge_2048::protocol;
use rand::{rngs::StdRng, SeedableRng};
use std::hint::black_box;

fn warm() { GameEngine::new(); }

fn corpus() -> Vec<Board> {
    let mut rng = StdRng::seed_from_u64(42);
    let mut boards = vec![Board::EMPTY];
    let mut b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    boards.push(b);
    for i in 0..40 {
        let dir = Move::ALL[i % Move::ALL.len()];
        let nb = b.shift(dir);
        if nb != b { b = nb.with_random_tile(&mut rng); }
        boards.push(b);
    }
    boards
}

fn bench_moves(c: &mut Criterion) {
    warm();
    let boards = corpus();
    for dir in Move::ALL {
        c.bench_function(&format!("apply/{dir}"), |bch| {
            bch.iter(|| {
                let mut acc = 0u64;
                for &bd in &boards { acc ^= bd.apply(dir).board.raw(); }
                black_box(acc)
            })
        });
    }
    c.bench_function("legal_moves", |bch| {
        bch.iter(|| {
            let mut n = 0usize;
            for &bd in &boards { n += legal_moves(bd).count(); }
            black_box(n)
        })
    });
    c.bench_function("board/make_move", |bch| {
        bch.iter_batched(
            || StdRng::seed_from_u64(9),
            |mut rng| {
                let mut acc = 0u64;
                for &bd in &boards { acc ^= bd.make_move(Move::Left, &mut rng).raw(); }
                black_box(acc)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_heuristics(c: &mut Criterion) {
    warm();
    let boards = corpus();
    c.bench_function("heuristic/features", |bch| {
        bch.iter(|| {
            let mut acc = 0u32;
            for &bd in &boards { acc = acc.wrapping_add(Features::of(bd).monotonicity); }
            black_box(acc)
        })
    });
    for (name, w) in [("greedy", Weights::GREEDY), ("expectimax", Weights::EXPECTIMAX)] {
        c.bench_function(&format!("heuristic/evaluate_{name}"), |bch| {
            bch.iter(|| {
                let mut acc = 0.0;
                for &bd in &boards { acc += evaluate(bd, &w); }
                black_box(acc)
            })
        });
    }
}

fn bench_protocol(c: &mut Criterion) {
    let boards = corpus();
    let texts: Vec<String> = boards.iter().map(|&b| protocol::encode_board(b)).collect();
    c.bench_function("protocol/decode_board", |bch| {
        bch.iter(|| {
            let mut acc = 0u64;
            for t in &texts {
                if let Ok(b) = protocol::decode_board(t) { acc ^= b.raw(); }
            }
            black_box(acc)
        })
    });
}

criterion_group!(benches, bench_moves, bench_heuristics, bench_protocol);
criterion_main!(benches);
