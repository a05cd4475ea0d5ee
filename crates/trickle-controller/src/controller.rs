//! The reward controller.
//!
//! [`RewardController`] wires the emission curve, the period clock and the
//! ledger over one [`RewardStore`], and is the only thing that talks to the
//! external collaborators (token authority, admin registry, treasury,
//! secondary rewarder).
//!
//! Every mutating operation:
//! 1. refuses to run once the controller is destroyed,
//! 2. opens a store transaction,
//! 3. runs the clock hook: if a period boundary has been crossed, every pool
//!    is accrued at the old rate and the new period is entered,
//! 4. does its own work,
//! 5. commits, or rolls back every write (the hook's included) on any error.

use std::fmt;

use tracing::{debug, info, warn};
use trickle_core::constants::RATIO_PRECISION;
use trickle_core::error::{ArithmeticError, AuthError, ConfigError, LifecycleError, TrickleError};
use trickle_core::schedule::scaled_ratio;
use trickle_core::store::RewardStore;
use trickle_core::traits::EmissionSchedule;
use trickle_core::types::{
    Address, Asset, ClockPhase, ControllerState, Period, Pool, PoolId, PoolKind, Position,
    TerminationPolicy, TrackContext,
};
use trickle_emission::{EmissionCurve, PeriodClock, PeriodPlan, Transition};
use trickle_ledger::accumulator::accrue;
use trickle_ledger::ledger::pending_of;
use trickle_ledger::RewardLedger;

use crate::boundary::Boundaries;
use crate::config::{unix_now, ControllerConfig};

/// Orchestrates emission, clock and ledger over a store.
pub struct RewardController<S: RewardStore> {
    config: ControllerConfig,
    curve: EmissionCurve,
    periods: PeriodClock,
    store: S,
    boundaries: Boundaries,
    clock: Box<dyn Fn() -> u64 + Send + Sync>,
}

impl<S: RewardStore> fmt::Debug for RewardController<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewardController")
            .field("phase", &self.store.state().phase)
            .field("pools", &self.store.pool_count())
            .finish_non_exhaustive()
    }
}

impl<S: RewardStore> RewardController<S> {
    /// Create a controller with the system clock.
    ///
    /// A store without a period 0 record is initialised at genesis; a store
    /// that already has one (a restored snapshot) is resumed as-is.
    pub fn new(config: ControllerConfig, store: S, boundaries: Boundaries) -> Result<Self, TrickleError> {
        Self::with_clock(config, store, boundaries, unix_now)
    }

    /// Create a controller with a custom clock for testing and simulation.
    ///
    /// An unset genesis starts period 0 at the clock's current reading.
    pub fn with_clock(
        mut config: ControllerConfig,
        mut store: S,
        boundaries: Boundaries,
        clock: impl Fn() -> u64 + Send + Sync + 'static,
    ) -> Result<Self, TrickleError> {
        config.genesis_time.get_or_insert_with(&clock);
        config.validate()?;
        let curve = config.curve()?;
        let periods = PeriodClock::new(curve.params());

        if store.period(0).is_none() {
            let rate = curve.rate(0)?;
            let budget = curve.period_reward(0)?;
            store.set_state(ControllerState::genesis(periods.genesis(), rate));
            store.put_period(periods.genesis_record(rate, budget));
            info!(
                genesis = periods.genesis(),
                rate,
                budget,
                periods = periods.total_periods(),
                "controller: initialised at genesis"
            );
        }

        Ok(Self {
            config,
            curve,
            periods,
            store,
            boundaries,
            clock: Box::new(clock),
        })
    }

    // ------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------

    fn now(&self) -> u64 {
        (self.clock)()
    }

    fn require_admin(&self, caller: &Address) -> Result<Address, AuthError> {
        let admin = self.boundaries.admin.current_admin();
        if *caller != admin {
            warn!(%caller, "controller: caller is not the admin");
            return Err(AuthError::NotAdmin { caller: *caller });
        }
        Ok(admin)
    }

    /// Run `op` as one atomic unit: all of its writes land, or none do.
    fn atomically<T>(
        &mut self,
        op: impl FnOnce(&mut Self, u64) -> Result<T, TrickleError>,
    ) -> Result<T, TrickleError> {
        if self.store.state().phase == ClockPhase::Destroyed {
            return Err(LifecycleError::Destroyed.into());
        }
        let now = self.now();
        self.store.begin();
        match op(self, now) {
            Ok(value) => {
                self.store.commit();
                Ok(value)
            }
            Err(err) => {
                debug!(error = %err, "controller: operation rolled back");
                self.store.rollback()?;
                Err(err)
            }
        }
    }

    /// Cross any pending period boundary: accrue every pool at the old rate,
    /// then enter the new period (or the terminal state).
    fn sync_clock(&mut self, now: u64) -> Result<Transition, TrickleError> {
        let transition = self.periods.advance(self.store.state(), now);
        if transition == Transition::Stay {
            return Ok(transition);
        }
        RewardLedger::new(&mut self.store).update_all(now)?;
        self.periods.apply(
            &transition,
            &mut self.store,
            &self.curve,
            self.config.skipped_period_policy,
            now,
        )?;
        Ok(transition)
    }

    fn update_state(&mut self, f: impl FnOnce(&mut ControllerState)) {
        let mut state = self.store.state().clone();
        f(&mut state);
        self.store.set_state(state);
    }

    // ------------------------------------------------------------------
    // Pool administration
    // ------------------------------------------------------------------

    /// Register a reward stream with `weight`. Admin only.
    pub fn register_pool(&mut self, caller: &Address, id: PoolId, weight: u128) -> Result<Pool, TrickleError> {
        self.atomically(|this, now| {
            this.require_admin(caller)?;
            this.sync_clock(now)?;
            if this.store.pool(&id).is_some_and(|p| p.active) {
                return Err(LifecycleError::PoolAlreadyRegistered(id).into());
            }
            if this.store.pool_count() >= this.config.max_pools {
                warn!(pool = %id, max = this.config.max_pools, "controller: pool limit reached");
                return Err(LifecycleError::PoolLimitReached { max: this.config.max_pools }.into());
            }
            // Existing pools accrue at their old share of the rate up to now.
            RewardLedger::new(&mut this.store).update_all(now)?;

            let total_weight = this
                .store
                .state()
                .total_weight
                .checked_add(weight)
                .ok_or(ArithmeticError::Overflow)?;
            this.update_state(|s| s.total_weight = total_weight);
            // Nothing accrues before period 0 starts.
            let pool = Pool::new(id, weight, now.max(this.periods.genesis()));
            this.store.put_pool(pool.clone());
            info!(pool = %id, weight, total_weight, "controller: pool registered");
            Ok(pool)
        })
    }

    /// Change a pool's weight. Admin or artificer.
    pub fn adjust_weight(&mut self, caller: &Address, id: PoolId, weight: u128) -> Result<Pool, TrickleError> {
        self.atomically(|this, now| {
            let admin = this.boundaries.admin.current_admin();
            let artificer = this.store.state().artificer;
            if *caller != admin && Some(*caller) != artificer {
                warn!(%caller, pool = %id, "controller: weight adjustment refused");
                return Err(AuthError::NotAdjuster { caller: *caller }.into());
            }
            this.sync_clock(now)?;
            // Every pool accrues at the old weights up to now.
            let mut pool = {
                let mut ledger = RewardLedger::new(&mut this.store);
                ledger.update_all(now)?;
                ledger.update_pool(&id, now)?
            };

            let total_weight = this
                .store
                .state()
                .total_weight
                .checked_sub(pool.weight)
                .and_then(|w| w.checked_add(weight))
                .ok_or(ArithmeticError::Overflow)?;
            let old = pool.weight;
            pool.weight = weight;
            this.update_state(|s| s.total_weight = total_weight);
            this.store.put_pool(pool.clone());
            info!(pool = %id, old, weight, total_weight, "controller: pool weight adjusted");
            Ok(pool)
        })
    }

    /// Set or clear the delegate allowed to adjust weights. Admin only.
    pub fn set_artificer(&mut self, caller: &Address, artificer: Option<Address>) -> Result<(), TrickleError> {
        self.atomically(|this, _now| {
            this.require_admin(caller)?;
            this.update_state(|s| s.artificer = artificer);
            info!(artificer = ?artificer.map(|a| a.to_string()), "controller: artificer set");
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Tracking
    // ------------------------------------------------------------------

    /// Balance report from a market: `participant` now holds `balance`
    /// shares in the market's `kind` pool.
    ///
    /// An unchanged balance only bumps the pool's timestamp.
    pub fn track(
        &mut self,
        market: &Address,
        participant: &Address,
        balance: u128,
        context: TrackContext,
        kind: PoolKind,
    ) -> Result<Position, TrickleError> {
        let id = PoolId::new(*market, kind);
        self.atomically(|this, now| {
            this.sync_clock(now)?;
            let position = RewardLedger::new(&mut this.store).track(&id, participant, balance, now)?;
            if let Some(secondary) = &this.boundaries.secondary {
                secondary.on_shares_changed(&id, participant, balance)?;
            }
            debug!(pool = %id, %participant, balance, %context, "controller: balance tracked");
            Ok(position)
        })
    }

    /// Accrue one pool up to now.
    pub fn track_pool(&mut self, id: &PoolId) -> Result<Pool, TrickleError> {
        self.atomically(|this, now| {
            this.sync_clock(now)?;
            RewardLedger::new(&mut this.store).update_pool(id, now)
        })
    }

    /// Accrue every pool up to now. Returns the number of pools updated.
    pub fn track_all(&mut self) -> Result<usize, TrickleError> {
        self.atomically(|this, now| {
            this.sync_clock(now)?;
            RewardLedger::new(&mut this.store).update_all(now)
        })
    }

    /// Accrue at most `limit` pools from registration index `offset`.
    ///
    /// Bounded alternative to [`track_all`](Self::track_all). A crossed period
    /// boundary still updates every pool once.
    pub fn track_range(&mut self, offset: usize, limit: usize) -> Result<usize, TrickleError> {
        self.atomically(|this, now| {
            this.sync_clock(now)?;
            RewardLedger::new(&mut this.store).update_range(now, offset, limit)
        })
    }

    // ------------------------------------------------------------------
    // Collection
    // ------------------------------------------------------------------

    /// Collect `caller`'s pending reward in one pool, minted to `to`.
    ///
    /// Returns 0 when nothing is pending. Fails as a whole, with nothing
    /// minted and nothing recorded, if the active period's budget would be
    /// exceeded or the token authority refuses the mint.
    pub fn collect(&mut self, caller: &Address, id: &PoolId, to: &Address) -> Result<u128, TrickleError> {
        self.atomically(|this, now| {
            this.sync_clock(now)?;
            this.collect_one(caller, id, to, now)
        })
    }

    /// Collect `caller`'s pending reward across every pool.
    ///
    /// Every pool is settled against the period budget before anything is
    /// minted, so one pool over budget leaves all of them untouched.
    pub fn collect_all(&mut self, caller: &Address, to: &Address) -> Result<u128, TrickleError> {
        self.atomically(|this, now| {
            this.sync_clock(now)?;
            let ids = this.store.pool_ids();
            let mut settled = Vec::with_capacity(ids.len());
            {
                let mut ledger = RewardLedger::new(&mut this.store);
                for id in ids {
                    if let Some(collected) = ledger.collect(&id, caller, now)? {
                        settled.push((id, collected.amount));
                    }
                }
            }
            this.pay_out(caller, to, &settled)
        })
    }

    /// Settle one pool and pay it out.
    fn collect_one(&mut self, caller: &Address, id: &PoolId, to: &Address, now: u64) -> Result<u128, TrickleError> {
        let Some(collected) = RewardLedger::new(&mut self.store).collect(id, caller, now)? else {
            return Ok(0);
        };
        self.pay_out(caller, to, &[(*id, collected.amount)])
    }

    /// Mint settled amounts, then notify the secondary rewarder.
    ///
    /// Must run after every ledger write of the operation. A mint failure
    /// rolls the operation back; a failed secondary hook is logged and the
    /// collection stands.
    fn pay_out(&self, caller: &Address, to: &Address, settled: &[(PoolId, u128)]) -> Result<u128, TrickleError> {
        let total = settled
            .iter()
            .try_fold(0u128, |acc, (_, amount)| acc.checked_add(*amount))
            .ok_or(ArithmeticError::Overflow)?;
        if total == 0 {
            return Ok(0);
        }
        self.boundaries.token.mint(to, total).inspect_err(|e| {
            warn!(%caller, amount = total, pools = settled.len(), error = %e, "controller: mint failed");
        })?;
        if let Some(secondary) = &self.boundaries.secondary {
            for (id, amount) in settled {
                if let Err(e) = secondary.on_collect(id, caller, to, *amount) {
                    warn!(pool = %id, %caller, amount = *amount, error = %e, "controller: secondary collect hook failed");
                }
            }
        }
        Ok(total)
    }

    // ------------------------------------------------------------------
    // Rate, treasury and lifecycle
    // ------------------------------------------------------------------

    /// Replace the current rate until the next period boundary. Admin only.
    ///
    /// Refused once the schedule is over: no later boundary would reset it.
    pub fn override_rate(&mut self, caller: &Address, rate: u128) -> Result<(), TrickleError> {
        self.atomically(|this, now| {
            this.require_admin(caller)?;
            this.sync_clock(now)?;
            let phase = this.store.state().phase;
            if !matches!(phase, ClockPhase::Active(_)) {
                warn!(%phase, rate, "controller: override outside an active period refused");
                return Err(LifecycleError::NotActive { phase }.into());
            }
            let ceiling = this.config.rate_ceiling as u128;
            if rate > ceiling {
                warn!(rate, ceiling, "controller: override above ceiling refused");
                return Err(ConfigError::RateAboveCeiling { rate, ceiling }.into());
            }
            RewardLedger::new(&mut this.store).update_all(now)?;
            let previous = this.store.state().current_rate;
            this.update_state(|s| s.current_rate = rate);
            let index = this.store.state().current_period;
            if let Some(mut period) = this.store.period(index) {
                period.rate = rate;
                this.store.put_period(period);
            }
            info!(previous, rate, period = index, "controller: rate overridden");
            Ok(())
        })
    }

    /// Send the controller's whole balance of a non-reward asset to the
    /// admin. Admin only. Returns the amount moved.
    pub fn sweep(&mut self, caller: &Address, asset: Asset) -> Result<u128, TrickleError> {
        self.atomically(|this, _now| {
            let admin = this.require_admin(caller)?;
            if asset == Asset::Token(this.boundaries.token.reward_token()) {
                warn!(%asset, "controller: reward token sweep refused");
                return Err(LifecycleError::RewardTokenSweep.into());
            }
            let amount = this.boundaries.treasury.balance_of(&asset);
            if amount > 0 {
                this.boundaries.treasury.transfer(&asset, &admin, amount)?;
            }
            info!(%asset, amount, to = %admin, "controller: swept");
            Ok(amount)
        })
    }

    /// Arm termination. One-way. Admin only.
    pub fn arm_termination(&mut self, caller: &Address) -> Result<(), TrickleError> {
        self.atomically(|this, _now| {
            this.require_admin(caller)?;
            this.update_state(|s| s.termination_armed = true);
            info!("controller: termination armed");
            Ok(())
        })
    }

    /// Destroy the controller once the schedule is over, returning its native
    /// balance to the admin. Admin only. Returns the amount moved.
    ///
    /// Under [`TerminationPolicy::Armed`] termination must have been armed
    /// first.
    pub fn terminate(&mut self, caller: &Address) -> Result<u128, TrickleError> {
        self.atomically(|this, now| {
            let admin = this.require_admin(caller)?;
            this.sync_clock(now)?;
            let state = this.store.state();
            if state.phase != ClockPhase::Terminal {
                warn!(period = state.current_period, "controller: termination before terminal period");
                return Err(LifecycleError::NotTerminal { period: state.current_period }.into());
            }
            if this.config.termination_policy == TerminationPolicy::Armed && !state.termination_armed {
                warn!("controller: termination not armed");
                return Err(LifecycleError::NotArmed.into());
            }
            let residual = this.boundaries.treasury.balance_of(&Asset::Native);
            if residual > 0 {
                this.boundaries.treasury.transfer(&Asset::Native, &admin, residual)?;
            }
            this.update_state(|s| {
                s.phase = ClockPhase::Destroyed;
                s.current_rate = 0;
            });
            info!(residual, to = %admin, "controller: terminated");
            Ok(residual)
        })
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn curve(&self) -> &EmissionCurve {
        &self.curve
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn state(&self) -> &ControllerState {
        self.store.state()
    }

    pub fn phase(&self) -> ClockPhase {
        self.store.state().phase
    }

    /// Record of the most recently entered period.
    pub fn current_period(&self) -> Option<Period> {
        self.store.period(self.store.state().current_period)
    }

    pub fn period(&self, index: u64) -> Option<Period> {
        self.store.period(index)
    }

    pub fn pool(&self, id: &PoolId) -> Option<Pool> {
        self.store.pool(id)
    }

    /// Every pool in registration order.
    pub fn pools(&self) -> Vec<Pool> {
        self.store
            .pool_ids()
            .iter()
            .filter_map(|id| self.store.pool(id))
            .collect()
    }

    pub fn position(&self, id: &PoolId, participant: &Address) -> Position {
        self.store.position(id, participant)
    }

    /// Reward `participant` could collect from `id` right now.
    ///
    /// Accrues a copy of the pool up to now at the current rate, which is what
    /// the next mutating operation would do first.
    pub fn pending(&self, id: &PoolId, participant: &Address) -> Result<u128, TrickleError> {
        let mut pool = self
            .store
            .pool(id)
            .filter(|p| p.active)
            .ok_or(LifecycleError::PoolNotRegistered(*id))?;
        let state = self.store.state();
        accrue(&mut pool, self.now(), state.current_rate, state.total_weight)?;
        let position = self.store.position(id, participant);
        Ok(pending_of(&pool, participant, &position)?)
    }

    /// Seconds until the next period boundary can be crossed; `None` once
    /// the schedule is over.
    pub fn time_to_next_boundary(&self) -> Option<u64> {
        self.periods.time_to_next_boundary(self.store.state(), self.now())
    }

    /// Seconds until the schedule ends.
    pub fn time_to_terminal(&self) -> u64 {
        self.periods.time_to_terminal(self.now())
    }

    /// Progress through the current period, scaled by `RATIO_PRECISION`.
    pub fn period_progress(&self) -> u64 {
        self.periods.period_progress(self.store.state(), self.now())
    }

    /// Progress through the whole schedule, scaled by `RATIO_PRECISION`.
    pub fn overall_progress(&self) -> u64 {
        self.periods.overall_progress(self.now())
    }

    /// Share of the lifetime budget collected so far, scaled by `RATIO_PRECISION`.
    pub fn claimed_progress(&self) -> u64 {
        let claimed = self.store.state().total_claimed;
        let budget = self.curve.params().total_budget;
        // Scale both down so they fit u64.
        let scale = budget / RATIO_PRECISION as u128 + 1;
        scaled_ratio(
            (claimed / scale) as u64,
            (budget / scale) as u64,
            RATIO_PRECISION,
        )
    }

    /// The planned schedule.
    pub fn schedule(&self) -> Result<Vec<PeriodPlan>, TrickleError> {
        Ok(self.curve.schedule()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    use trickle_core::constants::UNIT;
    use trickle_core::error::{BoundaryError, BudgetError};
    use trickle_core::store::MemoryRewardStore;
    use trickle_core::traits::{SecondaryRewarder, Treasury};

    use crate::boundary::{MemoryAdminRegistry, MemoryTokenAuthority, MemoryTreasury, RecordingRewarder};

    const G: u64 = 1_000_000;
    const D: u64 = 1_000;
    const ADMIN: Address = Address([0xAD; 20]);
    const TOKEN: Address = Address([0xEE; 20]);
    const MARKET: Address = Address([0x01; 20]);
    const ALICE: Address = Address([0xA1; 20]);
    const BOB: Address = Address([0xB0; 20]);

    struct Harness {
        ctl: RewardController<MemoryRewardStore>,
        time: Arc<AtomicU64>,
        token: Arc<MemoryTokenAuthority>,
        admin: Arc<MemoryAdminRegistry>,
        treasury: Arc<MemoryTreasury>,
        secondary: Arc<RecordingRewarder>,
    }

    impl Harness {
        fn at(&self, t: u64) {
            self.time.store(t, Ordering::SeqCst);
        }
    }

    fn config() -> ControllerConfig {
        ControllerConfig {
            total_budget_tokens: 1_000,
            decay_bps: 1_000,
            total_periods: 4,
            period_secs: D,
            genesis_time: Some(G),
            rate_ceiling: UNIT as u64,
            ..ControllerConfig::default()
        }
    }

    fn harness_with(cfg: ControllerConfig) -> Harness {
        let time = Arc::new(AtomicU64::new(G));
        let token = Arc::new(MemoryTokenAuthority::new(TOKEN, u128::MAX));
        let admin = Arc::new(MemoryAdminRegistry::new(ADMIN));
        let treasury = Arc::new(MemoryTreasury::new());
        let secondary = Arc::new(RecordingRewarder::new());
        let boundaries = Boundaries::new(token.clone(), admin.clone(), treasury.clone())
            .with_secondary(secondary.clone());
        let t = time.clone();
        let ctl = RewardController::with_clock(
            cfg,
            MemoryRewardStore::new(ControllerState::genesis(0, 0)),
            boundaries,
            move || t.load(Ordering::SeqCst),
        )
        .unwrap();
        Harness { ctl, time, token, admin, treasury, secondary }
    }

    fn harness() -> Harness {
        harness_with(config())
    }

    fn lend() -> PoolId {
        PoolId::new(MARKET, PoolKind::Lend)
    }

    fn borrow() -> PoolId {
        PoolId::new(MARKET, PoolKind::Borrow)
    }

    #[test]
    fn genesis_initialises_period_zero() {
        let h = harness();
        let p0 = h.ctl.current_period().unwrap();
        assert_eq!(p0.index, 0);
        assert_eq!(p0.start, G);
        assert_eq!(p0.rate, h.ctl.curve().rate(0).unwrap());
        assert_eq!(h.ctl.phase(), ClockPhase::Active(0));
    }

    #[test]
    fn construction_rejects_rate_above_ceiling() {
        let cfg = ControllerConfig { rate_ceiling: 1, ..config() };
        let err = RewardController::with_clock(
            cfg,
            MemoryRewardStore::new(ControllerState::genesis(0, 0)),
            harness().ctl.boundaries.clone(),
            || G,
        )
        .unwrap_err();
        assert!(matches!(err, TrickleError::Config(ConfigError::RateAboveCeiling { .. })));
    }

    #[test]
    fn register_requires_admin() {
        let mut h = harness();
        let err = h.ctl.register_pool(&ALICE, lend(), 1).unwrap_err();
        assert_eq!(err, AuthError::NotAdmin { caller: ALICE }.into());
        assert!(h.ctl.pool(&lend()).is_none());
    }

    #[test]
    fn admin_is_read_on_every_call() {
        let mut h = harness();
        h.admin.set_admin(BOB);
        assert!(h.ctl.register_pool(&ADMIN, lend(), 1).is_err());
        h.ctl.register_pool(&BOB, lend(), 1).unwrap();
    }

    #[test]
    fn double_registration_rejected() {
        let mut h = harness();
        h.ctl.register_pool(&ADMIN, lend(), 1).unwrap();
        let err = h.ctl.register_pool(&ADMIN, lend(), 2).unwrap_err();
        assert_eq!(err, LifecycleError::PoolAlreadyRegistered(lend()).into());
        assert_eq!(h.ctl.state().total_weight, 1);
    }

    #[test]
    fn pool_limit_enforced() {
        let mut h = harness_with(ControllerConfig { max_pools: 1, ..config() });
        h.ctl.register_pool(&ADMIN, lend(), 1).unwrap();
        let err = h.ctl.register_pool(&ADMIN, borrow(), 1).unwrap_err();
        assert_eq!(err, LifecycleError::PoolLimitReached { max: 1 }.into());
    }

    #[test]
    fn track_unregistered_pool_fails() {
        let mut h = harness();
        let err = h
            .ctl
            .track(&MARKET, &ALICE, 10, TrackContext::Deposit, PoolKind::Lend)
            .unwrap_err();
        assert_eq!(err, LifecycleError::PoolNotRegistered(lend()).into());
    }

    #[test]
    fn track_notifies_secondary_rewarder() {
        let mut h = harness();
        h.ctl.register_pool(&ADMIN, lend(), 1).unwrap();
        h.ctl.track(&MARKET, &ALICE, 77, TrackContext::Deposit, PoolKind::Lend).unwrap();
        assert_eq!(h.secondary.shares(&lend(), &ALICE), 77);
        assert_eq!(h.ctl.position(&lend(), &ALICE).shares, 77);
    }

    #[test]
    fn collect_mints_pending_and_zeroes_it() {
        let mut h = harness();
        h.ctl.register_pool(&ADMIN, lend(), 1).unwrap();
        h.ctl.track(&MARKET, &ALICE, UNIT, TrackContext::Deposit, PoolKind::Lend).unwrap();
        h.at(G + 100);
        let pending = h.ctl.pending(&lend(), &ALICE).unwrap();
        assert!(pending > 0);
        let got = h.ctl.collect(&ALICE, &lend(), &BOB).unwrap();
        assert_eq!(got, pending);
        assert_eq!(h.token.balance_of(&BOB), pending);
        assert_eq!(h.ctl.pending(&lend(), &ALICE).unwrap(), 0);
        assert_eq!(h.ctl.current_period().unwrap().claimed, pending);
        assert_eq!(h.secondary.collections(), 1);
    }

    #[test]
    fn failed_mint_rolls_back_everything() {
        let mut h = harness();
        let capped = Arc::new(MemoryTokenAuthority::new(TOKEN, 1));
        let token: Arc<dyn trickle_core::traits::TokenAuthority> = capped.clone();
        h.ctl.boundaries.token = token;
        h.ctl.register_pool(&ADMIN, lend(), 1).unwrap();
        h.ctl.track(&MARKET, &ALICE, UNIT, TrackContext::Deposit, PoolKind::Lend).unwrap();
        h.at(G + 100);
        let before = h.ctl.pending(&lend(), &ALICE).unwrap();
        let err = h.ctl.collect(&ALICE, &lend(), &ALICE).unwrap_err();
        assert!(matches!(err, TrickleError::Boundary(BoundaryError::MintRejected(_))));
        assert_eq!(h.ctl.pending(&lend(), &ALICE).unwrap(), before);
        assert_eq!(h.ctl.current_period().unwrap().claimed, 0);
        assert_eq!(h.ctl.pool(&lend()).unwrap().last_update, G);
        assert_eq!(capped.total_minted(), 0);
    }

    #[test]
    fn collect_all_sums_pools() {
        let mut h = harness();
        h.ctl.register_pool(&ADMIN, lend(), 1).unwrap();
        h.ctl.register_pool(&ADMIN, borrow(), 1).unwrap();
        h.ctl.track(&MARKET, &ALICE, UNIT, TrackContext::Deposit, PoolKind::Lend).unwrap();
        h.ctl.track(&MARKET, &ALICE, UNIT, TrackContext::Deposit, PoolKind::Borrow).unwrap();
        h.at(G + 500);
        let expected = h.ctl.pending(&lend(), &ALICE).unwrap() + h.ctl.pending(&borrow(), &ALICE).unwrap();
        assert_eq!(h.ctl.collect_all(&ALICE, &ALICE).unwrap(), expected);
        assert_eq!(h.token.balance_of(&ALICE), expected);
    }

    #[test]
    fn collect_all_over_budget_mints_nothing() {
        let mut h = harness();
        h.ctl.register_pool(&ADMIN, lend(), 3).unwrap();
        h.ctl.register_pool(&ADMIN, borrow(), 1).unwrap();
        h.ctl.track(&MARKET, &ALICE, UNIT, TrackContext::Deposit, PoolKind::Lend).unwrap();
        h.ctl.track(&MARKET, &ALICE, UNIT, TrackContext::Deposit, PoolKind::Borrow).unwrap();
        h.ctl.override_rate(&ADMIN, UNIT).unwrap();
        // The lend pool alone fits period 0's budget; both together do not.
        h.at(G + 350);
        let budget = h.ctl.current_period().unwrap().budget;
        let lend_pending = h.ctl.pending(&lend(), &ALICE).unwrap();
        let borrow_pending = h.ctl.pending(&borrow(), &ALICE).unwrap();
        assert!(lend_pending <= budget);
        assert!(lend_pending + borrow_pending > budget);

        let err = h.ctl.collect_all(&ALICE, &ALICE).unwrap_err();
        assert!(matches!(err, TrickleError::Budget(BudgetError::PeriodBudgetExceeded { period: 0, .. })));
        assert_eq!(h.token.total_minted(), 0);
        assert_eq!(h.ctl.state().total_claimed, 0);
        assert_eq!(h.secondary.collections(), 0);
        assert_eq!(h.ctl.pending(&lend(), &ALICE).unwrap(), lend_pending);

        // The lend pool on its own still collects, exactly once.
        assert_eq!(h.ctl.collect(&ALICE, &lend(), &ALICE).unwrap(), lend_pending);
        assert_eq!(h.token.total_minted(), lend_pending);
        assert_eq!(h.ctl.state().total_claimed, lend_pending);
    }

    #[test]
    fn collect_all_mints_once_and_notifies_per_pool() {
        let mut h = harness();
        h.ctl.register_pool(&ADMIN, lend(), 1).unwrap();
        h.ctl.register_pool(&ADMIN, borrow(), 1).unwrap();
        h.ctl.track(&MARKET, &ALICE, UNIT, TrackContext::Deposit, PoolKind::Lend).unwrap();
        h.ctl.track(&MARKET, &ALICE, UNIT, TrackContext::Deposit, PoolKind::Borrow).unwrap();
        h.at(G + 200);
        let total = h.ctl.collect_all(&ALICE, &BOB).unwrap();
        assert_eq!(h.token.balance_of(&BOB), total);
        assert_eq!(h.secondary.collections(), 2);
    }

    struct RefusingRewarder;

    impl SecondaryRewarder for RefusingRewarder {
        fn on_shares_changed(&self, _: &PoolId, _: &Address, _: u128) -> Result<(), BoundaryError> {
            Ok(())
        }

        fn on_collect(&self, _: &PoolId, _: &Address, _: &Address, _: u128) -> Result<(), BoundaryError> {
            Err(BoundaryError::TransferFailed("secondary rewarder offline".to_string()))
        }
    }

    #[test]
    fn failing_collect_hook_does_not_undo_minted_reward() {
        let mut h = harness();
        h.ctl.boundaries.secondary = Some(Arc::new(RefusingRewarder));
        h.ctl.register_pool(&ADMIN, lend(), 1).unwrap();
        h.ctl.track(&MARKET, &ALICE, UNIT, TrackContext::Deposit, PoolKind::Lend).unwrap();
        h.at(G + 100);
        let pending = h.ctl.pending(&lend(), &ALICE).unwrap();
        assert_eq!(h.ctl.collect(&ALICE, &lend(), &ALICE).unwrap(), pending);
        assert_eq!(h.token.total_minted(), pending);
        assert_eq!(h.ctl.state().total_claimed, pending);
        assert_eq!(h.ctl.pending(&lend(), &ALICE).unwrap(), 0);
    }

    #[test]
    fn nothing_accrues_before_genesis() {
        let mut h = harness();
        h.at(G - 500);
        h.ctl.register_pool(&ADMIN, lend(), 1).unwrap();
        h.ctl.track(&MARKET, &ALICE, UNIT, TrackContext::Deposit, PoolKind::Lend).unwrap();
        assert_eq!(h.ctl.pool(&lend()).unwrap().last_update, G);
        assert_eq!(h.ctl.pending(&lend(), &ALICE).unwrap(), 0);

        h.at(G);
        h.ctl.track_all().unwrap();
        assert_eq!(h.ctl.pending(&lend(), &ALICE).unwrap(), 0);
        assert_eq!(h.ctl.pool(&lend()).unwrap().accrued, 0);

        h.at(G + 100);
        h.ctl.track_all().unwrap();
        let r0 = h.ctl.curve().rate(0).unwrap();
        assert_eq!(h.ctl.pool(&lend()).unwrap().accrued, r0 * 100);
    }

    #[test]
    fn unset_genesis_starts_at_construction() {
        let mut h = harness_with(ControllerConfig { genesis_time: None, ..config() });
        assert_eq!(h.ctl.config().genesis_time, Some(G));
        assert_eq!(h.ctl.current_period().unwrap().start, G);
        h.at(G + 10);
        h.ctl.track_all().unwrap();
        assert_eq!(h.ctl.phase(), ClockPhase::Active(0));
    }

    #[test]
    fn default_config_on_a_live_clock_starts_active() {
        let now = 1_700_000_000;
        let mut ctl = RewardController::with_clock(
            ControllerConfig::default(),
            MemoryRewardStore::new(ControllerState::genesis(0, 0)),
            harness().ctl.boundaries.clone(),
            move || now,
        )
        .unwrap();
        ctl.track_all().unwrap();
        assert_eq!(ctl.phase(), ClockPhase::Active(0));
        assert_eq!(ctl.time_to_terminal(), 48 * 30 * 86_400);
    }

    #[test]
    fn artificer_may_adjust_weight() {
        let mut h = harness();
        h.ctl.register_pool(&ADMIN, lend(), 1).unwrap();
        assert!(h.ctl.adjust_weight(&BOB, lend(), 3).is_err());
        h.ctl.set_artificer(&ADMIN, Some(BOB)).unwrap();
        h.ctl.adjust_weight(&BOB, lend(), 3).unwrap();
        assert_eq!(h.ctl.state().total_weight, 3);
        assert_eq!(h.ctl.pool(&lend()).unwrap().weight, 3);
    }

    #[test]
    fn adjust_weight_of_unknown_pool_fails() {
        let mut h = harness();
        let err = h.ctl.adjust_weight(&ADMIN, lend(), 3).unwrap_err();
        assert_eq!(err, LifecycleError::PoolNotRegistered(lend()).into());
    }

    #[test]
    fn override_rate_checks_ceiling_and_applies() {
        let mut h = harness();
        let err = h.ctl.override_rate(&ADMIN, UNIT + 1).unwrap_err();
        assert!(matches!(err, TrickleError::Config(ConfigError::RateAboveCeiling { .. })));
        h.ctl.override_rate(&ADMIN, 42).unwrap();
        assert_eq!(h.ctl.state().current_rate, 42);
        assert_eq!(h.ctl.current_period().unwrap().rate, 42);
    }

    #[test]
    fn override_refused_once_terminal() {
        let mut h = harness();
        h.at(G + 4 * D);
        h.ctl.track_all().unwrap();
        assert_eq!(h.ctl.phase(), ClockPhase::Terminal);
        let err = h.ctl.override_rate(&ADMIN, 42).unwrap_err();
        assert_eq!(err, LifecycleError::NotActive { phase: ClockPhase::Terminal }.into());
        assert_eq!(h.ctl.state().current_rate, 0);
    }

    #[test]
    fn override_refused_when_crossing_into_terminal() {
        let mut h = harness();
        h.at(G + 5 * D);
        let err = h.ctl.override_rate(&ADMIN, 42).unwrap_err();
        assert_eq!(err, LifecycleError::NotActive { phase: ClockPhase::Terminal }.into());
        // The refused call rolled back its clock hook too.
        assert_eq!(h.ctl.phase(), ClockPhase::Active(0));
    }

    #[test]
    fn override_is_replaced_at_next_boundary() {
        let mut h = harness();
        h.ctl.override_rate(&ADMIN, 42).unwrap();
        h.at(G + D);
        h.ctl.track_all().unwrap();
        assert_eq!(h.ctl.state().current_rate, h.ctl.curve().rate(1).unwrap());
    }

    #[test]
    fn boundary_accrues_at_old_rate() {
        let mut h = harness();
        h.ctl.register_pool(&ADMIN, lend(), 1).unwrap();
        h.ctl.track(&MARKET, &ALICE, UNIT, TrackContext::Deposit, PoolKind::Lend).unwrap();
        let r0 = h.ctl.state().current_rate;
        h.at(G + D);
        h.ctl.track_all().unwrap();
        let pool = h.ctl.pool(&lend()).unwrap();
        assert_eq!(pool.accrued, r0 * D as u128);
        assert_eq!(h.ctl.phase(), ClockPhase::Active(1));
    }

    #[test]
    fn sweep_refuses_reward_token() {
        let mut h = harness();
        let err = h.ctl.sweep(&ADMIN, Asset::Token(TOKEN)).unwrap_err();
        assert_eq!(err, LifecycleError::RewardTokenSweep.into());
    }

    #[test]
    fn sweep_moves_other_assets_to_admin() {
        let mut h = harness();
        let stray = Asset::Token(Address([0x55; 20]));
        h.treasury.deposit(stray, 900);
        assert_eq!(h.ctl.sweep(&ADMIN, stray).unwrap(), 900);
        assert_eq!(h.treasury.received(&stray, &ADMIN), 900);
        assert_eq!(h.treasury.balance_of(&stray), 0);
    }

    #[test]
    fn terminate_before_terminal_fails() {
        let mut h = harness();
        h.ctl.arm_termination(&ADMIN).unwrap();
        let err = h.ctl.terminate(&ADMIN).unwrap_err();
        assert_eq!(err, LifecycleError::NotTerminal { period: 0 }.into());
    }

    #[test]
    fn unconditional_policy_terminates_without_arming() {
        let mut h = harness_with(ControllerConfig {
            termination_policy: TerminationPolicy::Unconditional,
            ..config()
        });
        h.treasury.deposit(Asset::Native, 5);
        h.at(G + 4 * D);
        assert_eq!(h.ctl.terminate(&ADMIN).unwrap(), 5);
        assert_eq!(h.ctl.phase(), ClockPhase::Destroyed);
    }

    #[test]
    fn destroyed_controller_rejects_mutations() {
        let mut h = harness_with(ControllerConfig {
            termination_policy: TerminationPolicy::Unconditional,
            ..config()
        });
        h.at(G + 4 * D);
        h.ctl.terminate(&ADMIN).unwrap();
        assert_eq!(h.ctl.track_all().unwrap_err(), LifecycleError::Destroyed.into());
        assert_eq!(h.ctl.register_pool(&ADMIN, lend(), 1).unwrap_err(), LifecycleError::Destroyed.into());
        assert_eq!(h.ctl.time_to_next_boundary(), None);
    }

    #[test]
    fn budget_overrun_is_rejected_in_full() {
        let mut h = harness();
        h.ctl.register_pool(&ADMIN, lend(), 1).unwrap();
        h.ctl.track(&MARKET, &ALICE, UNIT, TrackContext::Deposit, PoolKind::Lend).unwrap();
        h.ctl.override_rate(&ADMIN, UNIT).unwrap();
        h.at(G + D - 1);
        let err = h.ctl.collect(&ALICE, &lend(), &ALICE).unwrap_err();
        assert!(matches!(err, TrickleError::Budget(BudgetError::PeriodBudgetExceeded { period: 0, .. })));
        assert_eq!(h.ctl.current_period().unwrap().claimed, 0);
        assert_eq!(h.token.total_minted(), 0);
    }

    #[test]
    fn progress_queries() {
        let h = harness();
        h.at(G + D / 2);
        assert_eq!(h.ctl.time_to_next_boundary(), Some(D / 2));
        assert_eq!(h.ctl.time_to_terminal(), 4 * D - D / 2);
        assert_eq!(h.ctl.period_progress(), RATIO_PRECISION / 2);
        assert_eq!(h.ctl.overall_progress(), RATIO_PRECISION / 8);
        assert_eq!(h.ctl.claimed_progress(), 0);
    }

    #[test]
    fn resumes_from_restored_store() {
        let mut h = harness();
        h.ctl.register_pool(&ADMIN, lend(), 1).unwrap();
        h.at(G + D + 1);
        h.ctl.track_all().unwrap();
        let bytes = h.ctl.store().encode_snapshot().unwrap();
        let restored = MemoryRewardStore::decode_snapshot(&bytes).unwrap();
        let ctl = RewardController::with_clock(config(), restored, h.ctl.boundaries.clone(), || G + D + 1).unwrap();
        assert_eq!(ctl.phase(), ClockPhase::Active(1));
        assert_eq!(ctl.pools().len(), 1);
    }
}
