//! Criterion benchmarks for trickle-ledger.
//!
//! Covers: single pool update, share tracking, and the mass update run when a
//! period boundary is crossed.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use trickle_core::constants::{DEFAULT_MAX_POOLS, UNIT};
use trickle_core::store::MemoryRewardStore;
use trickle_core::types::{Address, ControllerState, Pool, PoolId, PoolKind};
use trickle_ledger::RewardLedger;

fn pool_id(i: usize) -> PoolId {
    let mut bytes = [0u8; 20];
    bytes[..8].copy_from_slice(&(i as u64).to_be_bytes());
    PoolId::new(Address(bytes), PoolKind::Lend)
}

/// Store with `pools` registered pools, each holding one participant.
fn populated(pools: usize) -> MemoryRewardStore {
    let mut state = ControllerState::genesis(0, UNIT / 20);
    state.total_weight = pools as u128;
    let mut store = MemoryRewardStore::new(state);
    for i in 0..pools {
        store.put_pool(Pool::new(pool_id(i), 1, 0));
    }
    let mut ledger = RewardLedger::new(&mut store);
    for i in 0..pools {
        ledger
            .track(&pool_id(i), &Address([0xAA; 20]), 1_000 * UNIT, 0)
            .expect("track");
    }
    store
}

fn bench_update_pool(c: &mut Criterion) {
    c.bench_function("update_pool", |b| {
        b.iter_batched(
            || populated(1),
            |mut store| RewardLedger::new(&mut store).update_pool(black_box(&pool_id(0)), 3_600),
            BatchSize::SmallInput,
        )
    });
}

fn bench_track(c: &mut Criterion) {
    c.bench_function("track_share_change", |b| {
        b.iter_batched(
            || populated(1),
            |mut store| {
                RewardLedger::new(&mut store).track(
                    black_box(&pool_id(0)),
                    black_box(&Address([0xBB; 20])),
                    black_box(250 * UNIT),
                    3_600,
                )
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_mass_update(c: &mut Criterion) {
    // Worst case for the boundary hook: the registration ceiling.
    c.bench_function("mass_update_max_pools", |b| {
        b.iter_batched(
            || populated(DEFAULT_MAX_POOLS),
            |mut store| RewardLedger::new(&mut store).update_all(black_box(3_600)),
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, bench_update_pool, bench_track, bench_mass_update);
criterion_main!(benches);
