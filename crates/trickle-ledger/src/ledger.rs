//! Store-backed reward ledger.
//!
//! [`RewardLedger`] borrows a [`RewardStore`] for the duration of one
//! operation and applies the accumulator arithmetic to pool and position
//! records. It reads the current rate and total weight from the controller
//! state; it never moves the clock and never mints.

use tracing::{debug, info, warn};
use trickle_core::error::{ArithmeticError, BudgetError, LifecycleError, TrickleError};
use trickle_core::store::RewardStore;
use trickle_core::types::{Address, Period, Pool, PoolId, Position};
use trickle_core::wide::SignedWide;

use crate::accumulator::{accrue, accrued_value, debt_delta, signed_pending};

/// Result of a successful collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collected {
    pub amount: u128,
    /// Period the amount was charged against.
    pub period: u64,
}

/// Reward accounting over a borrowed store.
pub struct RewardLedger<'a, S: RewardStore + ?Sized> {
    store: &'a mut S,
}

impl<'a, S: RewardStore + ?Sized> RewardLedger<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    fn load_pool(&self, id: &PoolId) -> Result<Pool, LifecycleError> {
        self.store
            .pool(id)
            .filter(|pool| pool.active)
            .ok_or(LifecycleError::PoolNotRegistered(*id))
    }

    /// Bring one pool's accumulator forward to `now` at the current rate.
    ///
    /// Idempotent for repeated calls at the same instant.
    pub fn update_pool(&mut self, id: &PoolId, now: u64) -> Result<Pool, TrickleError> {
        let mut pool = self.load_pool(id)?;
        if now <= pool.last_update {
            return Ok(pool);
        }
        let state = self.store.state();
        let (rate, total_weight) = (state.current_rate, state.total_weight);
        let reward = accrue(&mut pool, now, rate, total_weight)?;
        debug!(
            pool = %id,
            reward,
            accumulator = %pool.accumulator,
            total_shares = pool.total_shares,
            "ledger: pool updated"
        );
        self.store.put_pool(pool.clone());
        Ok(pool)
    }

    /// Update every registered pool, in registration order.
    pub fn update_all(&mut self, now: u64) -> Result<usize, TrickleError> {
        self.update_range(now, 0, usize::MAX)
    }

    /// Update at most `limit` pools starting at registration index `offset`.
    /// Returns the number of pools updated.
    pub fn update_range(&mut self, now: u64, offset: usize, limit: usize) -> Result<usize, TrickleError> {
        let ids = self.store.pool_ids();
        let mut updated = 0;
        for id in ids.iter().skip(offset).take(limit) {
            self.update_pool(id, now)?;
            updated += 1;
        }
        Ok(updated)
    }

    /// Record a participant's new share count in a pool.
    ///
    /// Moves the participant's debt by the value of the changed shares at the
    /// current accumulator so earlier accrual is left untouched.
    pub fn track(
        &mut self,
        id: &PoolId,
        participant: &Address,
        new_shares: u128,
        now: u64,
    ) -> Result<Position, TrickleError> {
        let mut pool = self.update_pool(id, now)?;
        let mut position = self.store.position(id, participant);

        let delta = debt_delta(position.shares, new_shares, pool.accumulator.get())?;
        let total_shares = if new_shares >= position.shares {
            pool.total_shares.checked_add(new_shares - position.shares)
        } else {
            pool.total_shares.checked_sub(position.shares - new_shares)
        };
        pool.total_shares = total_shares.ok_or(ArithmeticError::Overflow)?;
        position.debt = position.debt.checked_add(delta).ok_or(ArithmeticError::Overflow)?;
        position.shares = new_shares;

        debug!(
            pool = %id,
            %participant,
            shares = new_shares,
            debt = %position.debt,
            total_shares = pool.total_shares,
            "ledger: shares tracked"
        );
        self.store.put_pool(pool);
        self.store.put_position(id, participant, position);
        Ok(position)
    }

    /// Pending reward at the pool's last update.
    pub fn pending(&self, id: &PoolId, participant: &Address) -> Result<u128, TrickleError> {
        let pool = self.load_pool(id)?;
        let position = self.store.position(id, participant);
        Ok(pending_of(&pool, participant, &position)?)
    }

    /// Settle a participant's pending reward against the active period.
    ///
    /// Returns `None` when nothing is pending. Fails without writing anything
    /// if the amount would push the period's claimed total past its budget.
    pub fn collect(
        &mut self,
        id: &PoolId,
        participant: &Address,
        now: u64,
    ) -> Result<Option<Collected>, TrickleError> {
        let pool = self.update_pool(id, now)?;
        let mut position = self.store.position(id, participant);
        let amount = pending_of(&pool, participant, &position)?;
        if amount == 0 {
            return Ok(None);
        }

        let index = self.store.state().current_period;
        let mut period = self
            .store
            .period(index)
            .ok_or(BudgetError::MissingPeriod(index))?;
        charge(&mut period, amount)?;

        let accrued = accrued_value(position.shares, pool.accumulator.get())?;
        position.debt = SignedWide::from_unsigned(accrued);
        self.store.put_position(id, participant, position);
        self.store.put_period(period);

        let mut state = self.store.state().clone();
        state.total_claimed = state
            .total_claimed
            .checked_add(amount)
            .ok_or(ArithmeticError::Overflow)?;
        self.store.set_state(state);

        info!(pool = %id, %participant, amount, period = index, "ledger: reward collected");
        Ok(Some(Collected { amount, period: index }))
    }
}

/// Pending reward for a position, rejecting a negative balance.
pub fn pending_of(pool: &Pool, participant: &Address, position: &Position) -> Result<u128, ArithmeticError> {
    let pending = signed_pending(position.shares, position.debt, pool.accumulator.get())?
        .to_unsigned()
        .ok_or(ArithmeticError::NegativePending {
            pool: pool.id,
            participant: *participant,
        })?;
    u128::try_from(pending).map_err(|_| ArithmeticError::Overflow)
}

/// Add `amount` to a period's claimed total, refusing to exceed its budget.
pub fn charge(period: &mut Period, amount: u128) -> Result<(), BudgetError> {
    let claimed = period.claimed.checked_add(amount);
    match claimed {
        Some(claimed) if claimed <= period.budget => {
            period.claimed = claimed;
            Ok(())
        }
        _ => {
            warn!(
                period = period.index,
                claimed = period.claimed,
                amount,
                budget = period.budget,
                "ledger: collection exceeds period budget"
            );
            Err(BudgetError::PeriodBudgetExceeded {
                period: period.index,
                claimed: period.claimed,
                amount,
                budget: period.budget,
            })
        }
    }
}
