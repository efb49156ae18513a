//! Benchmarks for the read-side reduction.

use auction_bidder::reduce_highest;
use auction_common::{BidResult, BidStatus};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn replica_views(n: usize, closed_every: usize) -> Vec<BidResult> {
    (0..n)
        .map(|i| {
            let status = if closed_every > 0 && i % closed_every == 0 {
                BidStatus::AuctionOver
            } else {
                BidStatus::Ok
            };
            BidResult::new((i * 7 % 101) as i32, format!("bidder_{}", i % 5), status)
        })
        .collect()
}

fn bench_reduce_highest(c: &mut Criterion) {
    let mut group = c.benchmark_group("reduce_highest");
    for n in [3, 7, 31] {
        let open = replica_views(n, 0);
        group.bench_with_input(BenchmarkId::new("open", n), &open, |b, views| {
            b.iter(|| reduce_highest(black_box(views.clone())))
        });

        let mixed = replica_views(n, 3);
        group.bench_with_input(BenchmarkId::new("mixed", n), &mixed, |b, views| {
            b.iter(|| reduce_highest(black_box(views.clone())))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_reduce_highest);
criterion_main!(benches);
