//! Trait interfaces for the trickle reward system.
//!
//! These traits define the contracts between crates and with the outside:
//! - [`EmissionSchedule`] — decaying emission math (trickle-emission implements)
//! - [`TokenAuthority`] — the capped reward-token minter (external)
//! - [`AdminRegistry`] — the single admin lookup (external)
//! - [`Treasury`] — balances the controller holds, for sweep and termination (external)
//! - [`SecondaryRewarder`] — optional second-token rewarder notified of share changes (external)
//!
//! Boundary traits take `&self`; implementations own whatever interior
//! mutability they need.

use crate::constants::CURVE_PRECISION;
use crate::error::{ArithmeticError, BoundaryError};
use crate::types::{Address, Asset, EmissionParams, PoolId};

/// Pure computation of the decaying emission schedule.
///
/// All values are integers: fractions are scaled by [`CURVE_PRECISION`],
/// rewards are base units, rates are base units per second.
pub trait EmissionSchedule: Send + Sync {
    /// The immutable parameters this schedule was built from.
    fn params(&self) -> &EmissionParams;

    /// `(1 - decay) ^ (total_periods - period)`, scaled by [`CURVE_PRECISION`].
    ///
    /// Equals [`CURVE_PRECISION`] (1.0) for `period >= total_periods`.
    fn remaining_factor(&self, period: u64) -> Result<u128, ArithmeticError>;

    /// `1 - remaining_factor(period)`.
    ///
    /// Bounded in `(0, 1)` over `0..total_periods`. It shrinks as periods
    /// pass and equals the decay fraction in the last period.
    fn released_fraction(&self, period: u64) -> Result<u128, ArithmeticError> {
        let remaining = self.remaining_factor(period)?;
        CURVE_PRECISION
            .checked_sub(remaining)
            .ok_or(ArithmeticError::Overflow)
    }

    /// Reward planned for `period` (its budget). Zero once the schedule has expired.
    fn period_reward(&self, period: u64) -> Result<u128, ArithmeticError>;

    /// Emission rate for `period` in base units per second.
    ///
    /// Default implementation: `period_reward(period) / period_duration`.
    fn rate(&self, period: u64) -> Result<u128, ArithmeticError> {
        let reward = self.period_reward(period)?;
        Ok(reward / self.params().period_duration as u128)
    }

    /// Sum of budgets for periods `0..=period`.
    fn cumulative_reward(&self, period: u64) -> Result<u128, ArithmeticError>;
}

/// The reward token's minting authority.
///
/// The authority enforces its own supply cap; the controller's per-period
/// budget check is an independent bound.
pub trait TokenAuthority: Send + Sync {
    /// Address of the reward token. Sweeps refuse to move it.
    fn reward_token(&self) -> Address;

    /// Mint `amount` reward units to `to`.
    fn mint(&self, to: &Address, amount: u128) -> Result<(), BoundaryError>;
}

/// Registry exposing the current administrator.
///
/// Privileged operations compare the caller against this value on every call;
/// nothing caches it.
pub trait AdminRegistry: Send + Sync {
    fn current_admin(&self) -> Address;
}

/// Balances held by the controller itself.
pub trait Treasury: Send + Sync {
    fn balance_of(&self, asset: &Asset) -> u128;

    /// Move `amount` of `asset` out of the controller to `to`.
    fn transfer(&self, asset: &Asset, to: &Address, amount: u128) -> Result<(), BoundaryError>;
}

/// A secondary rewarder mirroring share changes for a second token.
pub trait SecondaryRewarder: Send + Sync {
    /// Called after every share change, with the participant's new share count.
    fn on_shares_changed(
        &self,
        pool: &PoolId,
        participant: &Address,
        shares: u128,
    ) -> Result<(), BoundaryError>;

    /// Called after a successful collection.
    ///
    /// Default implementation does nothing.
    fn on_collect(
        &self,
        _pool: &PoolId,
        _participant: &Address,
        _to: &Address,
        _amount: u128,
    ) -> Result<(), BoundaryError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ------------------------------------------------------------------
    // Mock: EmissionSchedule with a flat schedule
    // ------------------------------------------------------------------

    struct FlatSchedule {
        params: EmissionParams,
    }

    impl EmissionSchedule for FlatSchedule {
        fn params(&self) -> &EmissionParams {
            &self.params
        }

        fn remaining_factor(&self, period: u64) -> Result<u128, ArithmeticError> {
            let left = self.params.total_periods.saturating_sub(period) as u128;
            Ok(CURVE_PRECISION * left / (self.params.total_periods as u128 + 1))
        }

        fn period_reward(&self, period: u64) -> Result<u128, ArithmeticError> {
            if period >= self.params.total_periods {
                return Ok(0);
            }
            Ok(self.params.total_budget / self.params.total_periods as u128)
        }

        fn cumulative_reward(&self, period: u64) -> Result<u128, ArithmeticError> {
            let n = (period + 1).min(self.params.total_periods) as u128;
            Ok(n * self.params.total_budget / self.params.total_periods as u128)
        }
    }

    fn flat() -> FlatSchedule {
        FlatSchedule {
            params: EmissionParams {
                total_budget: 1_000,
                decay: 0,
                total_periods: 4,
                period_duration: 10,
                genesis: 0,
            },
        }
    }

    #[test]
    fn default_rate_divides_by_duration() {
        assert_eq!(flat().rate(0).unwrap(), 25);
    }

    #[test]
    fn default_rate_zero_after_expiry() {
        assert_eq!(flat().rate(4).unwrap(), 0);
    }

    #[test]
    fn default_released_fraction_complements_remaining() {
        let s = flat();
        for p in 0..4 {
            assert_eq!(
                s.released_fraction(p).unwrap() + s.remaining_factor(p).unwrap(),
                CURVE_PRECISION
            );
        }
    }

    // ------------------------------------------------------------------
    // Mock: SecondaryRewarder relying on the default on_collect
    // ------------------------------------------------------------------

    struct SilentRewarder;

    impl SecondaryRewarder for SilentRewarder {
        fn on_shares_changed(&self, _: &PoolId, _: &Address, _: u128) -> Result<(), BoundaryError> {
            Ok(())
        }
    }

    #[test]
    fn default_on_collect_is_noop() {
        let pool = PoolId::new(Address::ZERO, crate::types::PoolKind::Lend);
        assert!(SilentRewarder.on_collect(&pool, &Address::ZERO, &Address::ZERO, 5).is_ok());
    }
}
