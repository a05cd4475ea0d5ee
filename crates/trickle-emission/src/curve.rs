//! Emission curve implementing the [`EmissionSchedule`] trait.
//!
//! The budget is released over `total_periods` periods with the per-period
//! amount shrinking by the decay fraction each period. The reward of period
//! `p` is re-derived from period 0 on every call:
//!
//! ```text
//! remaining_factor(i)  = (1 - decay)^(total_periods - i)
//! released_fraction(i) = 1 - remaining_factor(i)
//! reward(i)            = (budget - released_before_i) * decay / released_fraction(i)
//! ```
//!
//! In the last period `released_fraction` equals `decay` exactly, so the last
//! reward is the whole remaining budget and the schedule sums to the budget
//! with no rounding residue. Recomputing from immutable parameters keeps the
//! schedule free of drift from earlier calls; periods are few, so the O(p)
//! loop is cheap.

use trickle_core::constants::CURVE_PRECISION;
use trickle_core::error::{ArithmeticError, ConfigError};
use trickle_core::schedule::period_start;
use trickle_core::traits::EmissionSchedule;
use trickle_core::types::EmissionParams;

use crate::fixed::{fixed_pow, mul_div};

/// One row of the planned schedule.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PeriodPlan {
    pub index: u64,
    pub start: u64,
    /// Reward planned for the period.
    pub budget: u128,
    /// Base units per second.
    pub rate: u128,
    /// Sum of budgets up to and including this period.
    pub cumulative: u128,
    /// Cumulative share of the total budget, scaled by `CURVE_PRECISION`.
    pub cumulative_fraction: u128,
}

/// The production decaying emission curve.
#[derive(Debug, Clone)]
pub struct EmissionCurve {
    params: EmissionParams,
}

impl EmissionCurve {
    /// Build a curve, validating the parameters.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidDecay`] unless `0 < decay < CURVE_PRECISION`
    /// - [`ConfigError::ZeroPeriods`], [`ConfigError::ZeroDuration`], [`ConfigError::ZeroBudget`]
    /// - [`ConfigError::Invalid`] if the budget is too large for checked arithmetic
    pub fn new(params: EmissionParams) -> Result<Self, ConfigError> {
        if params.decay == 0 || params.decay >= CURVE_PRECISION {
            return Err(ConfigError::InvalidDecay(params.decay));
        }
        if params.total_periods == 0 {
            return Err(ConfigError::ZeroPeriods);
        }
        if params.period_duration == 0 {
            return Err(ConfigError::ZeroDuration);
        }
        if params.total_budget == 0 {
            return Err(ConfigError::ZeroBudget);
        }
        if params.total_budget.checked_mul(params.decay).is_none() {
            return Err(ConfigError::Invalid(format!(
                "budget {} too large for decay {}",
                params.total_budget, params.decay
            )));
        }
        Ok(Self { params })
    }

    /// Per-period retention `1 - decay`, scaled by `CURVE_PRECISION`.
    fn retention(&self) -> u128 {
        CURVE_PRECISION - self.params.decay
    }

    /// Share of the total budget released through `period`, scaled by
    /// `CURVE_PRECISION`.
    ///
    /// Strictly increasing over the schedule, inside `(0, 1)` before the last
    /// period and exactly 1 from the last period on.
    pub fn cumulative_fraction(&self, period: u64) -> Result<u128, ArithmeticError> {
        let cumulative = self.cumulative_reward(period)?;
        mul_div(cumulative, CURVE_PRECISION, self.params.total_budget)
    }

    /// The full planned schedule, computed in one pass.
    pub fn schedule(&self) -> Result<Vec<PeriodPlan>, ArithmeticError> {
        let p = &self.params;
        let mut plans = Vec::with_capacity(p.total_periods as usize);
        let mut released: u128 = 0;
        for index in 0..p.total_periods {
            let budget = self.step(released, index)?;
            released = released.checked_add(budget).ok_or(ArithmeticError::Overflow)?;
            plans.push(PeriodPlan {
                index,
                start: period_start(p.genesis, p.period_duration, index),
                budget,
                rate: budget / p.period_duration as u128,
                cumulative: released,
                cumulative_fraction: mul_div(released, CURVE_PRECISION, p.total_budget)?,
            });
        }
        Ok(plans)
    }

    /// Reward of period `index` given what earlier periods released.
    fn step(&self, released: u128, index: u64) -> Result<u128, ArithmeticError> {
        let remaining = self
            .params
            .total_budget
            .checked_sub(released)
            .ok_or(ArithmeticError::Overflow)?;
        let fraction = self.released_fraction(index)?;
        mul_div(remaining, self.params.decay, fraction)
    }
}

impl EmissionSchedule for EmissionCurve {
    fn params(&self) -> &EmissionParams {
        &self.params
    }

    fn remaining_factor(&self, period: u64) -> Result<u128, ArithmeticError> {
        let periods_left = self.params.total_periods.saturating_sub(period);
        fixed_pow(self.retention(), periods_left, CURVE_PRECISION)
    }

    fn period_reward(&self, period: u64) -> Result<u128, ArithmeticError> {
        if period >= self.params.total_periods {
            return Ok(0);
        }
        let mut released: u128 = 0;
        let mut reward: u128 = 0;
        for index in 0..=period {
            reward = self.step(released, index)?;
            released = released.checked_add(reward).ok_or(ArithmeticError::Overflow)?;
        }
        Ok(reward)
    }

    fn cumulative_reward(&self, period: u64) -> Result<u128, ArithmeticError> {
        let last = period.min(self.params.total_periods.saturating_sub(1));
        let mut released: u128 = 0;
        for index in 0..=last {
            let reward = self.step(released, index)?;
            released = released.checked_add(reward).ok_or(ArithmeticError::Overflow)?;
        }
        Ok(released)
    }
}
