//! Reward-per-share arithmetic.
//!
//! A pool's accumulator is the reward earned by one share since the pool was
//! registered, scaled by [`ACC_PRECISION`]. A participant's pending reward at
//! any instant is
//!
//! ```text
//! pending = floor(shares * accumulator / ACC_PRECISION) - debt
//! ```
//!
//! and a share change of `diff` at accumulator `acc` moves the debt by
//! `floor(diff * acc / ACC_PRECISION)`. Flooring the signed delta (rather than
//! truncating toward zero) keeps `debt <= floor(shares * acc / ACC_PRECISION)`
//! for every sequence of changes, so pending never goes negative.
//!
//! Everything here is a pure function over plain values; the ledger applies
//! the results to the store.

use trickle_core::constants::ACC_PRECISION;
use trickle_core::error::ArithmeticError;
use trickle_core::types::Pool;
use trickle_core::wide::{SignedWide, U256};

fn precision() -> U256 {
    U256::from(ACC_PRECISION)
}

/// Reward released to a pool over `elapsed` seconds.
///
/// `elapsed * rate * weight / total_weight`. A zero total weight releases
/// nothing.
pub fn pool_reward(
    elapsed: u64,
    rate: u128,
    weight: u128,
    total_weight: u128,
) -> Result<u128, ArithmeticError> {
    if total_weight == 0 {
        return Ok(0);
    }
    (elapsed as u128)
        .checked_mul(rate)
        .and_then(|v| v.checked_mul(weight))
        .map(|v| v / total_weight)
        .ok_or(ArithmeticError::Overflow)
}

/// Accumulator increase for spreading `reward` over `total_shares`.
///
/// `total_shares` must be non-zero.
pub fn accumulator_increment(reward: u128, total_shares: u128) -> Result<U256, ArithmeticError> {
    if total_shares == 0 {
        return Err(ArithmeticError::Overflow);
    }
    U256::from(reward)
        .checked_mul(precision())
        .map(|v| v / U256::from(total_shares))
        .ok_or(ArithmeticError::Overflow)
}

/// Bring `pool` forward to `now` at `rate`, returning the reward folded in.
///
/// A no-op when `now <= pool.last_update`, so repeating a call at the same
/// instant changes nothing. Reward released while the pool has no shares is
/// not folded into the accumulator.
pub fn accrue(
    pool: &mut Pool,
    now: u64,
    rate: u128,
    total_weight: u128,
) -> Result<u128, ArithmeticError> {
    if now <= pool.last_update {
        return Ok(0);
    }
    let mut reward = 0;
    if pool.total_shares > 0 {
        reward = pool_reward(now - pool.last_update, rate, pool.weight, total_weight)?;
        let increment = accumulator_increment(reward, pool.total_shares)?;
        pool.accumulator = pool
            .accumulator
            .get()
            .checked_add(increment)
            .ok_or(ArithmeticError::Overflow)?
            .into();
        pool.accrued = pool.accrued.checked_add(reward).ok_or(ArithmeticError::Overflow)?;
    }
    pool.last_update = now;
    Ok(reward)
}

/// `floor(shares * accumulator / ACC_PRECISION)`.
pub fn accrued_value(shares: u128, accumulator: U256) -> Result<U256, ArithmeticError> {
    U256::from(shares)
        .checked_mul(accumulator)
        .map(|v| v / precision())
        .ok_or(ArithmeticError::Overflow)
}

/// Debt change for moving from `old_shares` to `new_shares` at `accumulator`.
///
/// `floor((new_shares - old_shares) * accumulator / ACC_PRECISION)` over
/// signed integers.
pub fn debt_delta(
    old_shares: u128,
    new_shares: u128,
    accumulator: U256,
) -> Result<SignedWide, ArithmeticError> {
    let negative = new_shares < old_shares;
    let diff = U256::from(new_shares.abs_diff(old_shares));
    let product = diff.checked_mul(accumulator).ok_or(ArithmeticError::Overflow)?;
    let (quotient, remainder) = product.div_mod(precision());
    // Flooring a negative value rounds its magnitude up.
    let magnitude = if negative && !remainder.is_zero() {
        quotient + U256::one()
    } else {
        quotient
    };
    Ok(SignedWide::new(negative, magnitude))
}

/// Signed pending reward: `floor(shares * accumulator / ACC_PRECISION) - debt`.
///
/// Negative only if the debt invariant has been broken; callers treat that as
/// an error.
pub fn signed_pending(
    shares: u128,
    debt: SignedWide,
    accumulator: U256,
) -> Result<SignedWide, ArithmeticError> {
    SignedWide::from_unsigned(accrued_value(shares, accumulator)?)
        .checked_sub(debt)
        .ok_or(ArithmeticError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use trickle_core::constants::UNIT;
    use trickle_core::types::{Address, PoolId, PoolKind};

    const P: u128 = ACC_PRECISION;

    fn pool(shares: u128, weight: u128, last_update: u64) -> Pool {
        let mut p = Pool::new(PoolId::new(Address([0x01; 20]), PoolKind::Lend), weight, last_update);
        p.total_shares = shares;
        p
    }

    fn wide(v: u128) -> U256 {
        U256::from(v)
    }

    fn signed(v: i128) -> SignedWide {
        SignedWide::from(v)
    }

    // --- pool_reward ---

    #[test]
    fn reward_splits_by_weight() {
        assert_eq!(pool_reward(10, 100, 4, 5).unwrap(), 800);
        assert_eq!(pool_reward(10, 100, 1, 5).unwrap(), 200);
    }

    #[test]
    fn reward_zero_without_weight() {
        assert_eq!(pool_reward(10, 100, 0, 0).unwrap(), 0);
    }

    #[test]
    fn reward_overflow_reported() {
        assert_eq!(pool_reward(u64::MAX, u128::MAX, 2, 1), Err(ArithmeticError::Overflow));
    }

    // --- accrue ---

    #[test]
    fn accrue_folds_reward_per_share() {
        let mut p = pool(1_000, 1, 100);
        let reward = accrue(&mut p, 110, 50, 1).unwrap();
        assert_eq!(reward, 500);
        assert_eq!(p.accumulator.get(), wide(500 * P / 1_000));
        assert_eq!(p.accrued, 500);
        assert_eq!(p.last_update, 110);
    }

    #[test]
    fn accrue_is_idempotent_at_same_instant() {
        let mut p = pool(1_000, 1, 100);
        accrue(&mut p, 110, 50, 1).unwrap();
        let snapshot = p.clone();
        assert_eq!(accrue(&mut p, 110, 50, 1).unwrap(), 0);
        assert_eq!(p, snapshot);
    }

    #[test]
    fn accrue_ignores_past_instants() {
        let mut p = pool(1_000, 1, 100);
        accrue(&mut p, 90, 50, 1).unwrap();
        assert_eq!(p.last_update, 100);
        assert!(p.accumulator.is_zero());
    }

    #[test]
    fn accrue_without_shares_only_moves_time() {
        let mut p = pool(0, 1, 100);
        assert_eq!(accrue(&mut p, 200, 50, 1).unwrap(), 0);
        assert!(p.accumulator.is_zero());
        assert_eq!(p.last_update, 200);
    }

    #[test]
    fn dust_holder_then_large_holder_values_past_u128() {
        // One base unit holds the pool while a whole period of reward lands.
        let mut p = pool(1, 1, 0);
        let reward = accrue(&mut p, 2_592_000, UNIT / 10, 1).unwrap();
        assert_eq!(p.accumulator.get(), wide(reward) * wide(P));
        // 10,000 tokens of shares valued at that accumulator.
        let value = accrued_value(10_000 * UNIT, p.accumulator.get()).unwrap();
        assert!(value > wide(u128::MAX));
        assert_eq!(value, wide(reward) * wide(10_000 * UNIT));
    }

    // --- debt_delta ---

    #[test]
    fn debt_delta_positive_floors() {
        // 3 * 1.5 = 4.5 -> 4
        assert_eq!(debt_delta(0, 3, wide(3 * P / 2)).unwrap(), signed(4));
    }

    #[test]
    fn debt_delta_negative_floors_away_from_zero() {
        // -3 * 1.5 = -4.5 -> -5
        assert_eq!(debt_delta(3, 0, wide(3 * P / 2)).unwrap(), signed(-5));
    }

    #[test]
    fn debt_delta_negative_exact_is_not_bumped() {
        assert_eq!(debt_delta(4, 0, wide(3 * P / 2)).unwrap(), signed(-6));
    }

    #[test]
    fn debt_delta_zero_for_unchanged_shares() {
        assert_eq!(debt_delta(7, 7, wide(123 * P)).unwrap(), SignedWide::ZERO);
    }

    #[test]
    fn debt_delta_handles_products_past_u128() {
        // 10,000 tokens of shares at an accumulator a dust holder left behind.
        let acc = wide(u128::MAX);
        let delta = debt_delta(0, 10_000 * UNIT, acc).unwrap();
        assert_eq!(delta.magnitude(), acc * wide(10_000 * UNIT) / wide(P));
        assert!(!delta.is_negative());
    }

    #[test]
    fn debt_delta_rejects_256_bit_overflow() {
        assert_eq!(debt_delta(0, 2, U256::MAX), Err(ArithmeticError::Overflow));
    }

    // --- pending ---

    #[test]
    fn pending_after_join_is_zero() {
        let acc = wide(7 * P / 3);
        let debt = debt_delta(0, 10, acc).unwrap();
        assert_eq!(signed_pending(10, debt, acc).unwrap(), SignedWide::ZERO);
    }

    #[test]
    fn pending_never_negative_after_partial_exit_with_rounding() {
        // 0 -> 3 -> 2 -> 1 shares at 1.5 per share. Truncating the deltas
        // would end at debt 2 against an accrued value of 1.
        let acc = wide(3 * P / 2);
        let mut debt = debt_delta(0, 3, acc).unwrap();
        debt = debt.checked_add(debt_delta(3, 2, acc).unwrap()).unwrap();
        debt = debt.checked_add(debt_delta(2, 1, acc).unwrap()).unwrap();
        assert_eq!(debt, SignedWide::ZERO);
        assert_eq!(signed_pending(1, debt, acc).unwrap(), signed(1));
    }

    proptest! {
        #[test]
        fn debt_stays_below_accrued_value(
            steps in prop::collection::vec((0u128..1_000_000_000_000_000_000_000u128, 0u128..u64::MAX as u128), 1..40),
        ) {
            let mut shares = 0u128;
            let mut debt = SignedWide::ZERO;
            let mut acc = U256::zero();
            for (new_shares, acc_step) in steps {
                acc += U256::from(acc_step) * U256::from(P);
                debt = debt.checked_add(debt_delta(shares, new_shares, acc).unwrap()).unwrap();
                shares = new_shares;
                prop_assert!(!signed_pending(shares, debt, acc).unwrap().is_negative());
            }
        }

        #[test]
        fn increments_never_overpay(
            reward in 0u128..1_000_000_000_000_000_000_000_000u128,
            shares in 1u128..1_000_000_000_000_000_000_000u128,
        ) {
            let inc = accumulator_increment(reward, shares).unwrap();
            prop_assert!(accrued_value(shares, inc).unwrap() <= wide(reward));
        }
    }
}
