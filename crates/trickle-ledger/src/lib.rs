//! # trickle-ledger — Share/accumulator/debt reward accounting.
//!
//! - **Accumulator math** ([`accumulator`]): pure reward-per-share functions
//!   over plain values, all checked, with floored signed debt deltas.
//! - **Ledger** ([`ledger`]): applies the math to pool, position and period
//!   records in a [`RewardStore`](trickle_core::store::RewardStore).
//!
//! Pending reward for any participant is recovered at any instant from
//! `shares * accumulator - debt`, without iterating over participants.

pub mod accumulator;
pub mod ledger;

pub use ledger::{Collected, RewardLedger};
