//! Shared test helpers for scenario and adversarial tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use trickle_controller::boundary::{
    MemoryAdminRegistry, MemoryTokenAuthority, MemoryTreasury, RecordingRewarder,
};
use trickle_controller::{Boundaries, ControllerConfig, RewardController};
use trickle_core::constants::UNIT;
use trickle_core::store::{MemoryRewardStore, RewardStore};
use trickle_core::traits::TokenAuthority;
use trickle_core::types::{Address, ControllerState, PoolId, PoolKind};

/// Genesis time used by [`small_config`].
pub const GENESIS: u64 = 1_000_000;
/// Period length used by [`small_config`].
pub const PERIOD: u64 = 1_000;
/// Number of periods in [`small_config`].
pub const PERIODS: u64 = 4;

pub const ADMIN: Address = Address([0xAD; 20]);
pub const TOKEN: Address = Address([0xEE; 20]);

/// Simple address from a seed byte.
pub fn addr(seed: u8) -> Address {
    Address([seed; 20])
}

/// Lend pool of the market with the given seed.
pub fn lend(seed: u8) -> PoolId {
    PoolId::new(addr(seed), PoolKind::Lend)
}

/// Borrow pool of the market with the given seed.
pub fn borrow(seed: u8) -> PoolId {
    PoolId::new(addr(seed), PoolKind::Borrow)
}

/// A short schedule: 1,000 tokens over four 1,000-second periods, 10% decay.
pub fn small_config() -> ControllerConfig {
    ControllerConfig {
        total_budget_tokens: 1_000,
        decay_bps: 1_000,
        total_periods: PERIODS,
        period_secs: PERIOD,
        genesis_time: Some(GENESIS),
        rate_ceiling: UNIT as u64,
        ..ControllerConfig::default()
    }
}

/// A controller over in-memory collaborators with a manual clock.
pub struct Harness {
    pub ctl: RewardController<MemoryRewardStore>,
    pub time: Arc<AtomicU64>,
    pub token: Arc<MemoryTokenAuthority>,
    pub admin: Arc<MemoryAdminRegistry>,
    pub treasury: Arc<MemoryTreasury>,
    pub secondary: Arc<RecordingRewarder>,
}

impl Harness {
    /// Build a harness with an uncapped token, starting at the config's genesis
    /// (or [`GENESIS`] when the config leaves it unset).
    pub fn new(config: ControllerConfig) -> Self {
        Self::with_token(config, Arc::new(MemoryTokenAuthority::new(TOKEN, u128::MAX)))
    }

    pub fn with_token(config: ControllerConfig, token: Arc<MemoryTokenAuthority>) -> Self {
        let time = Arc::new(AtomicU64::new(config.genesis_time.unwrap_or(GENESIS)));
        let admin = Arc::new(MemoryAdminRegistry::new(ADMIN));
        let treasury = Arc::new(MemoryTreasury::new());
        let secondary = Arc::new(RecordingRewarder::new());
        let token_authority: Arc<dyn TokenAuthority> = token.clone();
        let boundaries = Boundaries::new(token_authority, admin.clone(), treasury.clone())
            .with_secondary(secondary.clone());
        let clock = time.clone();
        let ctl = RewardController::with_clock(
            config,
            MemoryRewardStore::new(ControllerState::genesis(0, 0)),
            boundaries,
            move || clock.load(Ordering::SeqCst),
        )
        .expect("valid test config");
        Self { ctl, time, token, admin, treasury, secondary }
    }

    pub fn now(&self) -> u64 {
        self.time.load(Ordering::SeqCst)
    }

    /// Set the clock to an absolute time.
    pub fn at(&self, t: u64) {
        self.time.store(t, Ordering::SeqCst);
    }

    /// Move the clock forward.
    pub fn advance(&self, secs: u64) {
        self.time.fetch_add(secs, Ordering::SeqCst);
    }

    /// Register `id` as the admin.
    pub fn register(&mut self, id: PoolId, weight: u128) {
        self.ctl.register_pool(&ADMIN, id, weight).expect("register pool");
    }

    /// Report `participant`'s balance in `id`.
    pub fn set_shares(&mut self, id: PoolId, participant: Address, shares: u128) {
        self.ctl
            .track(&id.market, &participant, shares, Default::default(), id.kind)
            .expect("track");
    }

    /// Sum of stored share counts across every participant of `id`.
    pub fn stored_share_sum(&self, id: &PoolId) -> u128 {
        let store = self.ctl.store();
        store
            .participants(id)
            .iter()
            .map(|p| store.position(id, p).shares)
            .sum()
    }
}
