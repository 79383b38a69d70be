//! Benchmarks for full market-pair executions.
//!
//! ## Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//!
//! # Run a specific benchmark
//! cargo bench -- crossing_books
//! ```
//!
//! Results are saved to `target/criterion/` with HTML reports.

use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput,
};
use std::time::Duration;

use basalt_dex::engine::MarketEngine;
use basalt_dex::state::{AssetRecord, ChainState};
use basalt_dex::types::{Address, MarketIndexKey, OrderRecord, Price, NATIVE_ASSET_ID};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const QUOTE: u32 = 1;

// ============================================================================
// HELPER FUNCTIONS - Deterministic book generation
// ============================================================================

fn base_chain() -> ChainState {
    let mut chain = ChainState::new();
    chain.store_asset_record(AssetRecord::new(NATIVE_ASSET_ID, "BSLT", false));
    chain.store_asset_record(AssetRecord::new(QUOTE, "BUSD", false));
    chain
}

fn key(ratio: u128, owner: u64) -> MarketIndexKey {
    MarketIndexKey::new(
        Price::new(ratio, QUOTE, NATIVE_ASSET_ID),
        Address::from_low_u64(owner),
    )
}

/// A book where every bid crosses every ask: `count` bids above, `count`
/// asks below, so one execution settles the whole region.
fn crossing_chain(count: usize) -> ChainState {
    let mut chain = base_chain();
    for i in 0..count {
        let step = i as u128 * 10_000;
        chain.store_bid_record(key(150_000_000 + step, i as u64 + 1), OrderRecord::new(500_000));
        chain.store_ask_record(
            key(100_000_000 + step, 100_000 + i as u64),
            OrderRecord::new(500_000),
        );
    }
    chain
}

/// A randomized book in the same shape the integration tests use.
fn random_chain(seed: u64, count: usize) -> ChainState {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut chain = base_chain();

    for i in 0..count {
        let is_bid = rng.gen_bool(0.5);
        let price_centi: u128 = rng.gen_range(50..=150);
        let price = Price::new(price_centi * 1_000_000, QUOTE, NATIVE_ASSET_ID);
        let balance: i64 = rng.gen_range(50_000..=2_000_000);
        let k = MarketIndexKey::new(price, Address::from_low_u64(i as u64 + 1));

        if is_bid {
            chain.store_bid_record(k, OrderRecord::new(balance));
        } else {
            chain.store_ask_record(k, OrderRecord::new(balance));
        }
    }
    chain
}

// ============================================================================
// BENCHMARK: Full executions over crossing books
// ============================================================================

fn bench_crossing_books(c: &mut Criterion) {
    let mut group = c.benchmark_group("crossing_books");
    group.measurement_time(Duration::from_secs(10));

    for count in [100usize, 1_000, 5_000] {
        group.throughput(Throughput::Elements(count as u64 * 2));
        group.bench_with_input(BenchmarkId::new("orders", count), &count, |b, &count| {
            let chain = crossing_chain(count);
            b.iter_batched(
                || chain.clone(),
                |mut chain| {
                    let result =
                        MarketEngine::new(&mut chain, QUOTE, NATIVE_ASSET_ID).execute(0);
                    black_box(result.transactions.len())
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

// ============================================================================
// BENCHMARK: No-crossing book (pure traversal + status update)
// ============================================================================

fn bench_no_crossing(c: &mut Criterion) {
    let mut group = c.benchmark_group("no_crossing");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("1k_resting_orders", |b| {
        let mut chain = base_chain();
        for i in 0..1_000u64 {
            // Bids all below, asks all above: nothing crosses
            chain.store_bid_record(key(90_000_000 - i as u128 * 1_000, i + 1), OrderRecord::new(500_000));
            chain.store_ask_record(
                key(110_000_000 + i as u128 * 1_000, 100_000 + i),
                OrderRecord::new(500_000),
            );
        }

        b.iter_batched(
            || chain.clone(),
            |mut chain| {
                let result = MarketEngine::new(&mut chain, QUOTE, NATIVE_ASSET_ID).execute(0);
                black_box(result.is_ok())
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

// ============================================================================
// BENCHMARK: Randomized books (mixed fills and rests)
// ============================================================================

fn bench_random_books(c: &mut Criterion) {
    let mut group = c.benchmark_group("random_books");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(50);

    for count in [1_000usize, 10_000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("orders", count), &count, |b, &count| {
            let chain = random_chain(42, count);
            b.iter_batched(
                || chain.clone(),
                |mut chain| {
                    let result =
                        MarketEngine::new(&mut chain, QUOTE, NATIVE_ASSET_ID).execute(0);
                    black_box(result.receipt.trade_root)
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

// ============================================================================
// CRITERION ENTRY POINT
// ============================================================================

criterion_group!(
    benches,
    bench_crossing_books,
    bench_no_crossing,
    bench_random_books
);

criterion_main!(benches);
