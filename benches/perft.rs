/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use skink::{perft, Position, FEN_KIWIPETE, FEN_STARTPOS};

#[derive(Clone, Copy)]
struct BenchCase {
    name: &'static str,
    fen: &'static str,
    depth: usize,
    expected_nodes: u64,
}

const CASES: &[BenchCase] = &[
    BenchCase {
        name: "startpos",
        fen: FEN_STARTPOS,
        depth: 4,
        expected_nodes: 197_281,
    },
    BenchCase {
        name: "kiwipete",
        fen: FEN_KIWIPETE,
        depth: 3,
        expected_nodes: 97_862,
    },
    BenchCase {
        name: "endgame",
        fen: "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        depth: 5,
        expected_nodes: 674_624,
    },
];

fn perft_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("perft");

    for case in CASES {
        group.throughput(Throughput::Elements(case.expected_nodes));
        group.bench_with_input(
            BenchmarkId::new(case.name, case.depth),
            case,
            |b, case| {
                let mut pos = Position::from_fen(case.fen);
                b.iter(|| {
                    let nodes = perft(black_box(&mut pos), case.depth);
                    assert_eq!(nodes, case.expected_nodes);
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, perft_throughput);
criterion_main!(benches);
