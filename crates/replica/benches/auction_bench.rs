//! Benchmarks for the replica state machine.

use auction_replica::Auction;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_make_bid(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("make_bid_accepted", |b| {
        let auction = Auction::new();
        let mut amount = 0;
        b.to_async(&rt).iter(|| {
            amount += 1;
            let auction = auction.clone();
            let bid = amount;
            async move { black_box(auction.make_bid(bid, "bench").await) }
        });
    });

    c.bench_function("make_bid_too_low", |b| {
        let auction = Auction::new();
        rt.block_on(auction.make_bid(i32::MAX, "leader"));
        b.to_async(&rt).iter(|| {
            let auction = auction.clone();
            async move { black_box(auction.make_bid(1, "bench").await) }
        });
    });

    c.bench_function("get_result", |b| {
        let auction = Auction::new();
        b.to_async(&rt).iter(|| {
            let auction = auction.clone();
            async move { black_box(auction.result().await) }
        });
    });
}

criterion_group!(benches, bench_make_bid);
criterion_main!(benches);
