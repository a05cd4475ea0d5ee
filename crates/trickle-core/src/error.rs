//! Error types for the trickle reward system.
use thiserror::Error;

use crate::types::{Address, ClockPhase, PoolId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("rate {rate} exceeds ceiling {ceiling}")] RateAboveCeiling { rate: u128, ceiling: u128 },
    #[error("decay must be in (0, 1): got {0}")] InvalidDecay(u128),
    #[error("total periods must be non-zero")] ZeroPeriods,
    #[error("period duration must be non-zero")] ZeroDuration,
    #[error("total budget must be non-zero")] ZeroBudget,
    #[error("invalid configuration: {0}")] Invalid(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("caller {caller} is not the admin")] NotAdmin { caller: Address },
    #[error("caller {caller} may not adjust weights")] NotAdjuster { caller: Address },
    #[error("re-entrant call rejected")] Reentrant,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("pool not registered: {0}")] PoolNotRegistered(PoolId),
    #[error("pool already registered: {0}")] PoolAlreadyRegistered(PoolId),
    #[error("pool limit reached: {max}")] PoolLimitReached { max: usize },
    #[error("terminal period not reached (current period {period})")] NotTerminal { period: u64 },
    #[error("termination not armed")] NotArmed,
    #[error("no active period (clock is {phase})")] NotActive { phase: ClockPhase },
    #[error("controller destroyed")] Destroyed,
    #[error("the reward token cannot be swept")] RewardTokenSweep,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BudgetError {
    #[error("period {period} budget exceeded: claimed {claimed} + {amount} > {budget}")]
    PeriodBudgetExceeded { period: u64, claimed: u128, amount: u128, budget: u128 },
    #[error("no period record for index {0}")] MissingPeriod(u64),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArithmeticError {
    #[error("arithmetic overflow")] Overflow,
    #[error("negative pending reward for {participant} in {pool}")] NegativePending { pool: PoolId, participant: Address },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoundaryError {
    #[error("mint rejected: {0}")] MintRejected(String),
    #[error("transfer failed: {0}")] TransferFailed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("snapshot encode: {0}")] Encode(String),
    #[error("snapshot decode: {0}")] Decode(String),
    #[error("unsupported snapshot version: {0}")] Version(u32),
    #[error("rollback without an open transaction")] NoTransaction,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrickleError {
    #[error(transparent)] Config(#[from] ConfigError),
    #[error(transparent)] Auth(#[from] AuthError),
    #[error(transparent)] Lifecycle(#[from] LifecycleError),
    #[error(transparent)] Budget(#[from] BudgetError),
    #[error(transparent)] Arithmetic(#[from] ArithmeticError),
    #[error(transparent)] Boundary(#[from] BoundaryError),
    #[error(transparent)] Store(#[from] StoreError),
}
